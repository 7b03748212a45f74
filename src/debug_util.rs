//! Contains debug utilities that may be useful for users of this crate.

use crate::frame::{self, PAYLOAD_SIZE};

/// A wrapper struct whose [core::fmt::Display] implementation prints the
/// wrapped data as rows of 16 bytes in hexadecimal, each row prefixed with
/// its byte offset.
struct HexRows<'a>(&'a [u8]);

impl core::fmt::Display for HexRows<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (row_idx, row) in self.0.chunks(16).enumerate() {
            if row_idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{:04x}:", row_idx * 16)?;
            for byte in row {
                write!(f, " {byte:02x}")?;
            }
        }
        Ok(())
    }
}

/// Logs the given data buffer in a human-readable format, with each byte
/// printed in its hexadecimal representation, similar to how Wireshark
/// prints network packets.
pub fn log_data_hex(log_level: log::Level, data: &[u8]) {
    log::log!(log_level, "Length: {} bytes\n{}", data.len(), HexRows(data));
}

/// A wrapper struct whose [core::fmt::Display] implementation prints a
/// one-line summary of a frame: its length, the head of its payload, and the
/// trailer value when the frame is long enough to carry one.
pub struct FormatFrame<'a>(pub &'a [u8]);

impl core::fmt::Display for FormatFrame<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let data = self.0;
        write!(f, "Frame(len: {}", data.len())?;
        if !data.is_empty() {
            write!(f, ", head:")?;
            for byte in data.iter().take(4) {
                write!(f, " {byte:02x}")?;
            }
        }
        if data.len() > PAYLOAD_SIZE {
            write!(f, ", trailer: {:08X}", frame::read_trailer(data))?;
        }
        write!(f, ")")
    }
}
