//! Line Reassembly for Fragmented Channel Output

use tracing::warn;

/// Default longest accepted line (bytes, terminator excluded)
pub const DEFAULT_MAX_LINE: usize = 256;

/// Collects arbitrarily fragmented bytes and yields complete lines.
///
/// Lines end at `\n`; a trailing `\r` is stripped, so both the reliable
/// (`\r\n`) and constrained (`\n`) framings reassemble. Empty lines are
/// skipped. A line growing past the limit is discarded up to its next
/// terminator.
#[derive(Debug)]
pub struct LineAssembler {
    buf: Vec<u8>,
    max_line: usize,
    discarding: bool,
    overflowed: u64,
}

impl LineAssembler {
    /// Create an assembler accepting lines up to `max_line` bytes
    pub fn new(max_line: usize) -> Self {
        Self {
            buf: Vec::with_capacity(max_line),
            max_line,
            discarding: false,
            overflowed: 0,
        }
    }

    /// Feed received bytes, returning every line they complete
    pub fn extend(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        for &byte in bytes {
            if byte == b'\n' {
                if self.discarding {
                    self.discarding = false;
                } else {
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                    if !self.buf.is_empty() {
                        lines.push(String::from_utf8_lossy(&self.buf).into_owned());
                    }
                }
                self.buf.clear();
            } else if self.discarding {
                continue;
            } else if self.buf.len() >= self.max_line {
                warn!("Discarding line longer than {} bytes", self.max_line);
                self.overflowed += 1;
                self.discarding = true;
                self.buf.clear();
            } else {
                self.buf.push(byte);
            }
        }

        lines
    }

    /// Bytes of the incomplete line held so far
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    /// Lines discarded for exceeding the limit
    pub fn overflowed(&self) -> u64 {
        self.overflowed
    }

    /// Drop any partial line, e.g. after the link went down
    pub fn reset(&mut self) {
        self.buf.clear();
        self.discarding = false;
    }
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE)
    }
}
