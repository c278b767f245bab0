//! CSV export of the offline queue.
//!
//! Operators export the queue when a terminal has been offline for a long
//! time and the backlog needs to be inspected or entered by hand. The file
//! has a `Timestamp,Card ID` header followed by one row per queued scan,
//! oldest first. Timestamps use the same UTC format as submissions.

use crate::error::StorageResult;
use crate::models::PendingScan;
use crate::repositories::PendingScanRepository;
use clockin_core::constants::WIRE_TIMESTAMP_FORMAT;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Header row of exported files.
pub const CSV_HEADER: [&str; 2] = ["Timestamp", "Card ID"];

/// Result of [`export_pending`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The queue was empty; no file was written.
    Empty,

    /// `rows` scans were written to `path`.
    Written { path: PathBuf, rows: usize },
}

/// Write `scans` as CSV to `out`, in the given order.
///
/// # Errors
///
/// Propagates write errors from `out`.
pub fn write_csv<W: Write>(scans: &[PendingScan], mut out: W) -> std::io::Result<()> {
    write_row(&mut out, &CSV_HEADER)?;
    for scan in scans {
        let timestamp = scan.observed_at.format(WIRE_TIMESTAMP_FORMAT).to_string();
        write_row(&mut out, &[timestamp.as_str(), scan.card_number.as_str()])?;
    }
    out.flush()
}

/// Export every queued scan to `path`, oldest first.
///
/// An empty queue is reported as [`ExportOutcome::Empty`] and leaves the
/// filesystem untouched. An existing file at `path` is overwritten.
///
/// # Errors
///
/// Returns a storage error if the queue cannot be read, or an IO error if the
/// file cannot be written.
pub async fn export_pending<R: PendingScanRepository>(
    repo: &R,
    path: impl AsRef<Path>,
) -> StorageResult<ExportOutcome> {
    let scans = repo.list_pending().await?;
    if scans.is_empty() {
        info!("No queued scans to export");
        return Ok(ExportOutcome::Empty);
    }

    let mut buffer = Vec::with_capacity(64 * (scans.len() + 1));
    write_csv(&scans, &mut buffer)?;

    let path = path.as_ref().to_path_buf();
    tokio::fs::write(&path, buffer).await?;

    info!(path = %path.display(), rows = scans.len(), "Queued scans exported");
    Ok(ExportOutcome::Written {
        path,
        rows: scans.len(),
    })
}

fn write_row<W: Write>(out: &mut W, fields: &[&str]) -> std::io::Result<()> {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.write_all(b",")?;
        }
        write_field(out, field)?;
    }
    // RFC 4180 line ending
    out.write_all(b"\r\n")
}

fn write_field<W: Write>(out: &mut W, field: &str) -> std::io::Result<()> {
    if field.contains([',', '"', '\r', '\n']) {
        write!(out, "\"{}\"", field.replace('"', "\"\""))
    } else {
        out.write_all(field.as_bytes())
    }
}
