//! Clockin scan agent runtime.
//!
//! Ties the pure scan logic (`clockin-core`), the offline queue
//! (`clockin-storage`) and the attendance server client (`clockin-network`)
//! into a running agent:
//!
//! - [`pipeline`]: live scan handling with queue fallback
//! - [`sync`]: offline queue draining, manual and periodic
//! - [`monitor`]: reachability probing
//! - [`input`]: keyboard-wedge scan source adapter
//! - [`agent`]: task wiring and the control handle
//! - [`config`]: TOML + environment configuration

pub mod agent;
pub mod config;
pub mod error;
pub mod events;
pub mod input;
pub mod monitor;
pub mod pipeline;
pub mod state;
pub mod sync;

#[cfg(test)]
mod testing;

pub use agent::{Agent, AgentHandle, AgentStatus};
pub use config::{AgentConfig, RuntimeSettings};
pub use error::{AgentError, AgentResult};
pub use events::{AgentEvent, QueueReason, ScanOutcome, ScanRejection};
pub use input::ScanReader;
pub use state::{ConnectivitySnapshot, ConnectivityState, Reachability};
pub use sync::{SyncEngine, SyncSummary};
