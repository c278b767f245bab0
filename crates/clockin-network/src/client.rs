//! HTTP client for the attendance server.
//!
//! The agent talks to two endpoints:
//!
//! - `POST <server_url>` submits one scan ([`ScanSubmission`]).
//! - `GET <probe_url>` checks reachability. The probe asks for a card that
//!   does not exist, so both 200 and 404 prove the server is up.
//!
//! # Architecture
//!
//! ```text
//! IngestionPipeline ─┐
//! SyncEngine ────────┼─> RemoteAuthority ── HttpAuthority ──(HTTP)──> server
//! ConnectivityMonitor┘
//! ```
//!
//! # Design Principles
//!
//! - **No automatic retry**: the offline queue is the retry mechanism
//! - **Every call bounded**: one timeout covers connect, send and reply
//! - **Classification only**: the client maps replies to
//!   [`AuthorityError`] variants and leaves the decision to the caller
//!
//! # Example Usage
//!
//! ```no_run
//! use clockin_core::CardPolicy;
//! use clockin_network::{AuthorityClientConfig, HttpAuthority, RemoteAuthority, ScanSubmission};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthorityClientConfig::new("http://localhost:3001/api/rfid/scan".parse()?);
//! let authority = HttpAuthority::new(config)?;
//!
//! if authority.probe().await.is_reachable() {
//!     let event = clockin_core::normalize("12345", &CardPolicy::default())?;
//!     let receipt = authority.submit(&ScanSubmission::realtime(&event)).await?;
//!     println!("Recorded: {receipt}");
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::AuthorityError;
use crate::wire::{AuthorityReply, Receipt, ScanSubmission};
use clockin_core::constants::{DEFAULT_REQUEST_TIMEOUT_SECS, PROBE_PATH};
use reqwest::StatusCode;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace, warn};
use url::Url;

/// Longest server error body kept in [`AuthorityError::Server`].
const MAX_DETAIL_LEN: usize = 256;

/// Result of a reachability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Server answered 200 or 404
    Reachable { status: u16 },

    /// Any other status or no answer
    Unreachable { reason: String },
}

impl ProbeOutcome {
    /// Classify a probe HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            200 | 404 => ProbeOutcome::Reachable { status },
            other => ProbeOutcome::Unreachable {
                reason: format!("HTTP {other}"),
            },
        }
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeOutcome::Reachable { .. })
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProbeOutcome::Reachable { status } => write!(f, "reachable (HTTP {status})"),
            ProbeOutcome::Unreachable { reason } => write!(f, "unreachable ({reason})"),
        }
    }
}

/// The attendance server, as seen by the agent.
///
/// Implemented by [`HttpAuthority`] in production and by scripted fakes in
/// tests. Futures are `Send` so the agent can drive them from spawned tasks.
pub trait RemoteAuthority: Send + Sync {
    /// Submit one scan.
    ///
    /// # Errors
    ///
    /// - [`AuthorityError::UnknownCard`] on HTTP 404
    /// - [`AuthorityError::Server`] on any other non-201 status
    /// - [`AuthorityError::Refused`] on a 201 that reports `success: false`
    /// - [`AuthorityError::MalformedReply`] on a 201 whose body cannot be read
    ///   or parsed
    /// - [`AuthorityError::Timeout`] / [`AuthorityError::Transport`] when no
    ///   reply arrives
    fn submit(
        &self,
        submission: &ScanSubmission,
    ) -> impl Future<Output = Result<Receipt, AuthorityError>> + Send;

    /// Check whether the server is reachable.
    fn probe(&self) -> impl Future<Output = ProbeOutcome> + Send;
}

/// Configuration for [`HttpAuthority`]
#[derive(Debug, Clone)]
pub struct AuthorityClientConfig {
    /// Scan submission endpoint
    pub server_url: Url,

    /// Reachability endpoint; derived from `server_url` when `None`
    pub probe_url: Option<Url>,

    /// Bound on every request (connect + send + reply)
    pub timeout: Duration,
}

impl AuthorityClientConfig {
    pub fn new(server_url: Url) -> Self {
        Self {
            server_url,
            probe_url: None,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Use an explicit probe endpoint
    pub fn probe_url(mut self, probe_url: Url) -> Self {
        self.probe_url = Some(probe_url);
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The probe endpoint that will actually be used.
    ///
    /// # Errors
    ///
    /// Fails only if `server_url` cannot be a base URL (e.g. `mailto:`).
    pub fn resolved_probe_url(&self) -> Result<Url, AuthorityError> {
        match &self.probe_url {
            Some(url) => Ok(url.clone()),
            None => derive_probe_url(&self.server_url),
        }
    }
}

/// Default probe endpoint: the last path segment of the submission URL is
/// replaced by `check/test`.
///
/// ```
/// use clockin_network::derive_probe_url;
///
/// let server = "http://10.0.0.5:3001/api/rfid/scan".parse().unwrap();
/// assert_eq!(
///     derive_probe_url(&server).unwrap().as_str(),
///     "http://10.0.0.5:3001/api/rfid/check/test"
/// );
/// ```
pub fn derive_probe_url(server_url: &Url) -> Result<Url, AuthorityError> {
    server_url
        .join(PROBE_PATH)
        .map_err(|e| AuthorityError::InvalidUrl(format!("{server_url}: {e}")))
}

/// reqwest-backed [`RemoteAuthority`].
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpAuthority {
    client: reqwest::Client,
    server_url: Url,
    probe_url: Url,
    timeout: Duration,
}

impl HttpAuthority {
    /// Build the client.
    ///
    /// # Errors
    ///
    /// Fails if the probe URL cannot be derived or the TLS backend cannot be
    /// initialized.
    pub fn new(config: AuthorityClientConfig) -> Result<Self, AuthorityError> {
        let probe_url = config.resolved_probe_url()?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| AuthorityError::Transport(e.to_string()))?;

        debug!(
            server_url = %config.server_url,
            probe_url = %probe_url,
            timeout_ms = config.timeout.as_millis() as u64,
            "Created attendance server client"
        );

        Ok(Self {
            client,
            server_url: config.server_url,
            probe_url,
            timeout: config.timeout,
        })
    }

    pub fn server_url(&self) -> &Url {
        &self.server_url
    }

    pub fn probe_url(&self) -> &Url {
        &self.probe_url
    }

    fn classify_send_error(&self, error: reqwest::Error) -> AuthorityError {
        if error.is_timeout() {
            AuthorityError::Timeout(self.timeout.as_millis() as u64)
        } else {
            AuthorityError::Transport(error.to_string())
        }
    }
}

impl RemoteAuthority for HttpAuthority {
    async fn submit(&self, submission: &ScanSubmission) -> Result<Receipt, AuthorityError> {
        trace!(
            card = %submission.card_number,
            source = %submission.source,
            timestamp = %submission.timestamp,
            "Submitting scan"
        );

        let response = self
            .client
            .post(self.server_url.clone())
            .json(submission)
            .send()
            .await
            .map_err(|e| self.classify_send_error(e))?;

        let status = response.status();
        match status {
            StatusCode::CREATED => {
                let body = response.bytes().await.map_err(|e| {
                    warn!(
                        card = %submission.card_number,
                        error = %e,
                        "Unreadable reply to accepted scan"
                    );
                    AuthorityError::MalformedReply {
                        status: status.as_u16(),
                        detail: e.to_string(),
                    }
                })?;

                let reply = serde_json::from_slice::<AuthorityReply>(&body).map_err(|e| {
                    warn!(
                        card = %submission.card_number,
                        error = %e,
                        "Unparseable reply to accepted scan"
                    );
                    AuthorityError::MalformedReply {
                        status: status.as_u16(),
                        detail: e.to_string(),
                    }
                })?;

                if reply.reports_failure() {
                    return Err(AuthorityError::Refused {
                        detail: reply.message.unwrap_or_default(),
                    });
                }

                let receipt = reply.into_receipt();
                debug!(card = %submission.card_number, receipt = %receipt, "Scan accepted");
                Ok(receipt)
            }
            StatusCode::NOT_FOUND => Err(AuthorityError::UnknownCard {
                card: submission.card_number.clone(),
            }),
            other => {
                let mut detail = response.text().await.unwrap_or_default();
                truncate_detail(&mut detail);
                Err(AuthorityError::Server {
                    status: other.as_u16(),
                    detail,
                })
            }
        }
    }

    async fn probe(&self) -> ProbeOutcome {
        trace!(probe_url = %self.probe_url, "Probing attendance server");

        match self.client.get(self.probe_url.clone()).send().await {
            Ok(response) => ProbeOutcome::from_status(response.status().as_u16()),
            Err(e) => ProbeOutcome::Unreachable {
                reason: self.classify_send_error(e).to_string(),
            },
        }
    }
}

fn truncate_detail(detail: &mut String) {
    if detail.len() > MAX_DETAIL_LEN {
        let mut cut = MAX_DETAIL_LEN;
        while !detail.is_char_boundary(cut) {
            cut -= 1;
        }
        detail.truncate(cut);
    }
}
