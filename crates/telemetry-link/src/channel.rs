//! Constrained Channel Interface

/// A lossy, rate-limited output link with a connection lifecycle.
///
/// Both methods are polled per write attempt and must return promptly.
pub trait ConstrainedChannel {
    /// Try to send `bytes`, returning how many were accepted (`0..=len`).
    ///
    /// Accepting zero bytes is backpressure, not an error.
    fn write(&mut self, bytes: &[u8]) -> usize;

    /// Whether a peer is currently connected
    fn is_connected(&self) -> bool;

    /// Number of disconnects seen since the link was created.
    ///
    /// Lets the caller notice a drop that was followed by a reconnect
    /// before it looked at `is_connected` again. Links that cannot report
    /// this return 0.
    fn disconnect_count(&self) -> u64 {
        0
    }
}

impl<T: ConstrainedChannel + ?Sized> ConstrainedChannel for &mut T {
    fn write(&mut self, bytes: &[u8]) -> usize {
        (**self).write(bytes)
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn disconnect_count(&self) -> u64 {
        (**self).disconnect_count()
    }
}

/// In-memory link for tests and dry runs.
///
/// Records every accepted byte. Acceptance can be limited per write call
/// (`max_chunk`) and in total (`allowance`); once the allowance is used up
/// every write returns 0.
#[derive(Debug, Default)]
pub struct MockChannel {
    connected: bool,
    max_chunk: Option<usize>,
    allowance: Option<usize>,
    received: Vec<u8>,
    write_calls: usize,
    disconnects: u64,
}

impl MockChannel {
    /// A connected link that accepts everything
    pub fn connected() -> Self {
        Self {
            connected: true,
            ..Default::default()
        }
    }

    /// A link with no peer
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Accept at most `n` bytes per write call
    pub fn with_max_chunk(mut self, n: usize) -> Self {
        self.max_chunk = Some(n);
        self
    }

    /// Accept `n` more bytes in total, then stall
    pub fn with_allowance(mut self, n: usize) -> Self {
        self.allowance = Some(n);
        self
    }

    /// Change the remaining allowance (`None` = unlimited)
    pub fn set_allowance(&mut self, allowance: Option<usize>) {
        self.allowance = allowance;
    }

    /// Connect or disconnect the simulated peer
    pub fn set_connected(&mut self, connected: bool) {
        if self.connected && !connected {
            self.disconnects += 1;
        }
        self.connected = connected;
    }

    /// Bytes accepted so far
    pub fn received(&self) -> &[u8] {
        &self.received
    }

    /// Accepted bytes as text
    pub fn received_text(&self) -> String {
        String::from_utf8_lossy(&self.received).into_owned()
    }

    /// Number of write calls, including ones that accepted nothing
    pub fn write_calls(&self) -> usize {
        self.write_calls
    }
}

impl ConstrainedChannel for MockChannel {
    fn write(&mut self, bytes: &[u8]) -> usize {
        self.write_calls += 1;
        if !self.connected {
            return 0;
        }

        let mut n = bytes.len();
        if let Some(chunk) = self.max_chunk {
            n = n.min(chunk);
        }
        if let Some(allowance) = self.allowance.as_mut() {
            n = n.min(*allowance);
            *allowance -= n;
        }

        self.received.extend_from_slice(&bytes[..n]);
        n
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn disconnect_count(&self) -> u64 {
        self.disconnects
    }
}
