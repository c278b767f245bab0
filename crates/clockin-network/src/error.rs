use thiserror::Error;

/// Errors returned by the attendance server client.
///
/// The variants map one-to-one onto how the agent reacts:
///
/// | Variant          | Live scan              | Queued scan during sync      |
/// |------------------|------------------------|------------------------------|
/// | `Timeout`        | queue                  | keep, count attempt          |
/// | `Transport`      | queue                  | keep, count attempt          |
/// | `UnknownCard`    | drop, report           | keep, count attempt, report  |
/// | `Server`         | queue                  | keep, count attempt          |
/// | `Refused`        | queue, report refusal  | keep, count attempt          |
/// | `MalformedReply` | queue                  | delete if the status was 201 |
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorityError {
    /// No complete reply within the request timeout
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// Connection refused, DNS failure, reset, or unreadable reply
    #[error("Transport error: {0}")]
    Transport(String),

    /// Server answered 404: the card is not registered
    #[error("Card not registered: {card}")]
    UnknownCard { card: String },

    /// Any status other than 201 or 404
    #[error("Server error (HTTP {status}): {detail}")]
    Server { status: u16, detail: String },

    /// 201 whose body reports `success: false`
    #[error("Server refused the scan: {detail}")]
    Refused { detail: String },

    /// The reply body could not be read or parsed
    #[error("Malformed reply (HTTP {status}): {detail}")]
    MalformedReply { status: u16, detail: String },

    /// Endpoint URL cannot be used
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl AuthorityError {
    /// Returns `true` if the server gave a definitive business answer.
    pub fn is_business_rejection(&self) -> bool {
        matches!(self, AuthorityError::UnknownCard { .. })
    }

    /// Returns `true` if the server could not be reached at all.
    pub fn is_transport(&self) -> bool {
        matches!(self, AuthorityError::Timeout(_) | AuthorityError::Transport(_))
    }

    /// Returns `true` if the server explicitly reported that it did not
    /// record the scan.
    pub fn is_refusal(&self) -> bool {
        matches!(self, AuthorityError::Refused { .. })
    }

    /// Returns `true` if the server answered 201 but the body was unusable.
    /// The scan is on the server even though no receipt can be shown.
    pub fn is_unconfirmed_acceptance(&self) -> bool {
        matches!(self, AuthorityError::MalformedReply { status: 201, .. })
    }

    /// HTTP status carried by the error, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            AuthorityError::UnknownCard { .. } => Some(404),
            AuthorityError::Refused { .. } => Some(201),
            AuthorityError::Server { status, .. }
            | AuthorityError::MalformedReply { status, .. } => Some(*status),
            _ => None,
        }
    }
}
