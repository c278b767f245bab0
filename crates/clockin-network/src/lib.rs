//! Network layer for Clockin
//!
//! This crate provides the HTTP client used to reach the attendance server:
//! scan submission, reply classification and the reachability probe.
//!
//! # Components
//!
//! - **wire**: JSON bodies ([`ScanSubmission`], [`Receipt`])
//! - **client**: the [`RemoteAuthority`] trait and its reqwest implementation
//!   [`HttpAuthority`]
//! - **error**: [`AuthorityError`], the classification the agent acts on

mod client;
mod error;
pub mod wire;

pub use client::{
    AuthorityClientConfig, HttpAuthority, ProbeOutcome, RemoteAuthority, derive_probe_url,
};
pub use error::AuthorityError;
pub use wire::{Receipt, ScanSubmission};
