//! Record Encoder

use crate::error::CodecError;
use crate::reading::Reading;
use crate::AUDIO_UNAVAILABLE;
use std::fmt::{self, Write};

/// Maximum encoded record length, terminator slot included
pub const MAX_RECORD_LEN: usize = 192;

/// `fmt::Write` sink that silently stops at a byte limit
struct TruncatingWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
    limit: usize,
    truncated: bool,
}

impl Write for TruncatingWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = self.limit - self.len;
        let take = s.len().min(room);
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        if take < s.len() {
            self.truncated = true;
        }
        Ok(())
    }
}

/// Encode into `buf`, returning the byte count and whether it was cut short
fn encode_into(reading: &Reading, buf: &mut [u8]) -> Result<(usize, bool), CodecError> {
    if buf.is_empty() {
        return Err(CodecError::NoCapacity);
    }

    // Last slot is reserved for the terminator.
    let limit = buf.len() - 1;
    let mut writer = TruncatingWriter {
        buf,
        len: 0,
        limit,
        truncated: false,
    };

    let [ax, ay, az] = reading.accel;
    let [gx, gy, gz] = reading.gyro;
    write!(
        writer,
        "{},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.2},{:.2}",
        reading.timestamp_ms,
        ax,
        ay,
        az,
        gx,
        gy,
        gz,
        reading.temperature_c,
        reading.audio_rms.unwrap_or(AUDIO_UNAVAILABLE),
    )?;

    writer.buf[writer.len] = 0;
    Ok((writer.len, writer.truncated))
}

/// Encode a reading as one CSV line body (no line terminator) into `buf`.
///
/// Returns the number of bytes written. Output never exceeds
/// `buf.len() - 1` bytes; a longer encoding is cut at that length. A NUL
/// terminator is written right after the returned length.
pub fn encode(reading: &Reading, buf: &mut [u8]) -> Result<usize, CodecError> {
    encode_into(reading, buf).map(|(len, _)| len)
}

/// An encoded record held in a fixed-size buffer
#[derive(Clone)]
pub struct Record {
    buf: [u8; MAX_RECORD_LEN],
    len: usize,
    truncated: bool,
}

impl Record {
    /// Encode a reading into a new record
    pub fn encode(reading: &Reading) -> Result<Self, CodecError> {
        let mut buf = [0u8; MAX_RECORD_LEN];
        let (len, truncated) = encode_into(reading, &mut buf)?;
        Ok(Self {
            buf,
            len,
            truncated,
        })
    }

    /// Encoded bytes, without terminator
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Encoded text, without terminator
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(self.as_bytes()).unwrap_or_default()
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the record is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the natural encoding did not fit
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("line", &self.as_str())
            .field("truncated", &self.truncated)
            .finish()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
