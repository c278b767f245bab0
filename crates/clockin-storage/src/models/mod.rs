pub mod pending_scan;

pub use pending_scan::PendingScan;
