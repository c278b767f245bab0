//! Scan source adapter.
//!
//! RFID readers in keyboard-wedge mode "type" the card number followed by
//! Enter. [`ScanReader`] turns any such byte stream (stdin, a HID text
//! device, a pipe) into raw scans.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tracing::trace;

/// Splits a byte stream into raw scans.
///
/// - printable ASCII is buffered as typed
/// - CR, LF, space or tab ends the scan; an empty buffer yields nothing
/// - NUL padding, other control bytes and non-ASCII bytes are ignored
/// - at end of stream a non-empty buffer is returned as a last scan
///
/// A separator never joins the pieces on either side of it: `"12 34"` is
/// two scans, each left for the normalizer to judge.
pub struct ScanReader<R> {
    reader: BufReader<R>,
    buffer: String,
}

impl<R: AsyncRead + Unpin> ScanReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            buffer: String::new(),
        }
    }

    /// Next complete scan, or `None` once the stream is exhausted.
    pub async fn next_scan(&mut self) -> io::Result<Option<String>> {
        loop {
            let byte = match self.reader.read_u8().await {
                Ok(byte) => byte,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(self.take_buffer());
                }
                Err(e) => return Err(e),
            };

            match byte {
                b'\r' | b'\n' | b' ' | b'\t' => {
                    if let Some(scan) = self.take_buffer() {
                        return Ok(Some(scan));
                    }
                }
                b if b.is_ascii_graphic() => self.buffer.push(char::from(b)),
                other => trace!(byte = other, "Ignoring unprintable input"),
            }
        }
    }

    fn take_buffer(&mut self) -> Option<String> {
        (!self.buffer.is_empty()).then(|| std::mem::take(&mut self.buffer))
    }
}
