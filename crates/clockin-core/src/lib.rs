//! Core types and pure scan-path logic for Clockin.
//!
//! Nothing in this crate performs I/O: it validates raw scans
//! ([`normalizer`]) and suppresses repeated reads of the same card
//! ([`cooldown`]). Storage, networking and scheduling build on these types
//! in the other workspace crates.

pub mod constants;
pub mod cooldown;
pub mod error;
pub mod normalizer;
pub mod types;

pub use cooldown::{Admission, CooldownGate};
pub use error::{Error, RejectionReason, Result};
pub use normalizer::{normalize, normalize_at};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
