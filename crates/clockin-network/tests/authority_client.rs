//! Integration tests for HttpAuthority
//!
//! These tests run the client against an axum mock of the attendance server
//! and verify request bodies, reply classification and timeout handling over
//! real HTTP.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use clockin_network::{
    AuthorityClientConfig, AuthorityError, HttpAuthority, ProbeOutcome, RemoteAuthority,
    ScanSubmission,
};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

type Received = Arc<Mutex<Vec<Value>>>;

/// Start `router` on an ephemeral port and return its address.
async fn spawn_server(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    addr
}

/// Mock whose scan endpoint always answers `status` with `body`.
async fn spawn_authority(status: StatusCode, body: Value) -> (SocketAddr, Received) {
    let received: Received = Arc::default();

    let router = Router::new()
        .route(
            "/api/rfid/scan",
            post(move |State(received): State<Received>, Json(payload): Json<Value>| {
                let body = body.clone();
                async move {
                    received.lock().unwrap().push(payload);
                    (status, Json(body))
                }
            }),
        )
        .with_state(received.clone());

    (spawn_server(router).await, received)
}

fn client_for(addr: SocketAddr, timeout: Duration) -> HttpAuthority {
    let server_url = format!("http://{addr}/api/rfid/scan").parse().unwrap();
    HttpAuthority::new(AuthorityClientConfig::new(server_url).timeout(timeout)).unwrap()
}

fn submission(source_offline: bool) -> ScanSubmission {
    let observed_at = Utc.with_ymd_and_hms(2025, 5, 10, 12, 46, 6).unwrap();
    if source_offline {
        ScanSubmission::offline("12345", observed_at)
    } else {
        ScanSubmission::new("12345", observed_at, clockin_core::EventSource::Realtime)
    }
}

#[tokio::test]
async fn test_created_returns_receipt_and_sends_wire_body() {
    let (addr, received) = spawn_authority(
        StatusCode::CREATED,
        json!({
            "success": true,
            "message": "Attendance recorded",
            "attendance": {"agent": {"name": "Ana"}, "action": "CHECK_IN", "status": "ON_TIME"}
        }),
    )
    .await;

    let client = client_for(addr, Duration::from_secs(2));
    let receipt = client.submit(&submission(false)).await.unwrap();

    assert_eq!(receipt.agent_name.as_deref(), Some("Ana"));
    assert_eq!(receipt.action.as_deref(), Some("CHECK_IN"));

    let bodies = received.lock().unwrap();
    assert_eq!(bodies.len(), 1);
    assert_eq!(
        bodies[0],
        json!({
            "cardNumber": "12345",
            "timestamp": "2025-05-10T12:46:06.000000Z",
            "source": "RFIDR"
        })
    );
}

#[tokio::test]
async fn test_offline_replay_is_tagged() {
    let (addr, received) = spawn_authority(StatusCode::CREATED, json!({"success": true})).await;

    let client = client_for(addr, Duration::from_secs(2));
    client.submit(&submission(true)).await.unwrap();

    assert_eq!(received.lock().unwrap()[0]["source"], "RFIDO");
}

#[tokio::test]
async fn test_not_found_is_unknown_card() {
    let (addr, _) = spawn_authority(
        StatusCode::NOT_FOUND,
        json!({"statusCode": 404, "message": "No agent found with this RFID card"}),
    )
    .await;

    let client = client_for(addr, Duration::from_secs(2));
    let error = client.submit(&submission(false)).await.unwrap_err();

    assert_eq!(
        error,
        AuthorityError::UnknownCard {
            card: "12345".to_string()
        }
    );
    assert!(error.is_business_rejection());
}

#[tokio::test]
async fn test_server_error_keeps_status_and_detail() {
    let (addr, _) = spawn_authority(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"message": "Database error while finding agent"}),
    )
    .await;

    let client = client_for(addr, Duration::from_secs(2));
    let error = client.submit(&submission(false)).await.unwrap_err();

    match error {
        AuthorityError::Server { status, detail } => {
            assert_eq!(status, 500);
            assert!(detail.contains("Database error"));
        }
        other => panic!("expected server error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_created_with_explicit_failure_is_refusal() {
    let (addr, _) = spawn_authority(
        StatusCode::CREATED,
        json!({"success": false, "message": "rejected"}),
    )
    .await;

    let client = client_for(addr, Duration::from_secs(2));
    let error = client.submit(&submission(false)).await.unwrap_err();

    assert_eq!(
        error,
        AuthorityError::Refused {
            detail: "rejected".to_string()
        }
    );
    assert!(error.is_refusal());
}

#[tokio::test]
async fn test_created_with_non_json_body_is_malformed_reply() {
    let router = Router::new().route(
        "/api/rfid/scan",
        post(|| async { (StatusCode::CREATED, "<html>proxy error</html>") }),
    );
    let addr = spawn_server(router).await;

    let client = client_for(addr, Duration::from_secs(2));
    let error = client.submit(&submission(false)).await.unwrap_err();

    match error {
        AuthorityError::MalformedReply { status, ref detail } => {
            assert_eq!(status, 201);
            assert!(!detail.is_empty());
        }
        ref other => panic!("expected malformed reply, got {other:?}"),
    }
    assert!(error.is_unconfirmed_acceptance());
    assert!(!error.is_transport());
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let router = Router::new().route(
        "/api/rfid/scan",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            StatusCode::CREATED
        }),
    );
    let addr = spawn_server(router).await;

    let client = client_for(addr, Duration::from_millis(200));
    let error = client.submit(&submission(false)).await.unwrap_err();

    assert_eq!(error, AuthorityError::Timeout(200));
    assert!(error.is_transport());
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    // Bind then drop to get a port nobody listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(addr, Duration::from_secs(1));
    let error = client.submit(&submission(false)).await.unwrap_err();
    assert!(error.is_transport());

    let outcome = client.probe().await;
    assert!(!outcome.is_reachable());
}

#[tokio::test]
async fn test_probe_status_mapping() {
    let router = Router::new()
        .route("/ok/check/test", get(|| async { StatusCode::OK }))
        .route("/missing/check/test", get(|| async { StatusCode::NOT_FOUND }))
        .route(
            "/broken/check/test",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
    let addr = spawn_server(router).await;

    let probe = |prefix: &str| {
        let server_url = format!("http://{addr}/{prefix}/scan").parse().unwrap();
        HttpAuthority::new(AuthorityClientConfig::new(server_url)).unwrap()
    };

    assert_eq!(
        probe("ok").probe().await,
        ProbeOutcome::Reachable { status: 200 }
    );
    assert_eq!(
        probe("missing").probe().await,
        ProbeOutcome::Reachable { status: 404 }
    );
    assert!(!probe("broken").probe().await.is_reachable());
}

#[tokio::test]
async fn test_probe_hits_derived_url() {
    let hits = Arc::new(Mutex::new(0usize));
    let counter = hits.clone();
    let router = Router::new().route(
        "/api/rfid/check/test",
        get(move || {
            let counter = counter.clone();
            async move {
                *counter.lock().unwrap() += 1;
                StatusCode::NOT_FOUND
            }
        }),
    );
    let addr = spawn_server(router).await;

    let client = client_for(addr, Duration::from_secs(1));
    assert_eq!(
        client.probe_url().as_str(),
        format!("http://{addr}/api/rfid/check/test")
    );
    assert!(client.probe().await.is_reachable());
    assert_eq!(*hits.lock().unwrap(), 1);
}
