//! Tunable thresholds of a connection.

use std::time::Duration;

/// How long an unacknowledged segment waits before it is sent again.
pub const RETRANSMIT_TIMEOUT: Duration = Duration::from_secs(1);
/// How long an open connection may go without hearing from its peer before
/// it sends a NUL segment.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(5);
/// How long a close handshake may stall before the connection gives up and
/// closes anyway.
pub const CLOSE_WAIT_TIMEOUT: Duration = Duration::from_secs(30);
/// The sequence number carried by our SYN unless configured otherwise.
pub const INITIAL_SEQUENCE: u32 = 1;

/// Per-connection settings. All durations are compared against the time
/// reported through [`Connection::clock`](crate::Connection::clock).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    pub retransmit_timeout: Duration,
    pub idle_timeout: Duration,
    pub close_wait_timeout: Duration,
    pub initial_sequence: u32,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            retransmit_timeout: RETRANSMIT_TIMEOUT,
            idle_timeout: IDLE_TIMEOUT,
            close_wait_timeout: CLOSE_WAIT_TIMEOUT,
            initial_sequence: INITIAL_SEQUENCE,
        }
    }

    pub const fn with_retransmit_timeout(mut self, timeout: Duration) -> Self {
        self.retransmit_timeout = timeout;
        self
    }

    pub const fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub const fn with_close_wait_timeout(mut self, timeout: Duration) -> Self {
        self.close_wait_timeout = timeout;
        self
    }

    pub const fn with_initial_sequence(mut self, seq: u32) -> Self {
        self.initial_sequence = seq;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
