//! In-process attendance server double for unit tests.

use clockin_network::{AuthorityError, ProbeOutcome, Receipt, RemoteAuthority, ScanSubmission};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Answers submissions from a per-card script, falling back to a default.
#[derive(Debug)]
pub(crate) struct ScriptedAuthority {
    responses: Mutex<HashMap<String, Result<Receipt, AuthorityError>>>,
    fallback: Mutex<Result<Receipt, AuthorityError>>,
    probe: Mutex<ProbeOutcome>,
    delay: Mutex<Option<Duration>>,
    submissions: Mutex<Vec<ScanSubmission>>,
    probes: AtomicUsize,
}

impl ScriptedAuthority {
    /// Accepts every scan and answers probes with 200.
    pub fn accepting() -> Self {
        Self {
            responses: Mutex::default(),
            fallback: Mutex::new(Ok(Receipt::default())),
            probe: Mutex::new(ProbeOutcome::Reachable { status: 200 }),
            delay: Mutex::default(),
            submissions: Mutex::default(),
            probes: AtomicUsize::new(0),
        }
    }

    /// Fails every submission with a transport error; probes fail too.
    pub fn offline() -> Self {
        let authority = Self::accepting();
        authority.set_fallback(Err(AuthorityError::Transport("connection refused".into())));
        authority.set_reachable(false);
        authority
    }

    pub fn respond(&self, card: &str, result: Result<Receipt, AuthorityError>) {
        self.responses
            .lock()
            .unwrap()
            .insert(card.to_string(), result);
    }

    pub fn set_fallback(&self, result: Result<Receipt, AuthorityError>) {
        *self.fallback.lock().unwrap() = result;
    }

    pub fn set_reachable(&self, reachable: bool) {
        *self.probe.lock().unwrap() = if reachable {
            ProbeOutcome::Reachable { status: 404 }
        } else {
            ProbeOutcome::Unreachable {
                reason: "connection refused".into(),
            }
        };
    }

    /// Delay every submission by `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn submissions(&self) -> Vec<ScanSubmission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn submit_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

pub(crate) fn unknown_card(card: &str) -> AuthorityError {
    AuthorityError::UnknownCard {
        card: card.to_string(),
    }
}

pub(crate) fn server_error(status: u16) -> AuthorityError {
    AuthorityError::Server {
        status,
        detail: "scripted failure".to_string(),
    }
}

impl RemoteAuthority for ScriptedAuthority {
    async fn submit(&self, submission: &ScanSubmission) -> Result<Receipt, AuthorityError> {
        self.submissions.lock().unwrap().push(submission.clone());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .responses
            .lock()
            .unwrap()
            .get(&submission.card_number)
            .cloned();
        scripted.unwrap_or_else(|| self.fallback.lock().unwrap().clone())
    }

    async fn probe(&self) -> ProbeOutcome {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.probe.lock().unwrap().clone()
    }
}
