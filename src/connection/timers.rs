use std::time::Duration;

/// Elapsed-time counters advanced by [`Connection::clock`](super::Connection::clock).
///
/// Nothing here reads a clock. The owner reports how much time passed and
/// the connection compares the counters against its [`Config`](crate::Config).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timers {
    /// Time since the buffered segment was last put on the wire
    pub retransmit: Duration,
    /// Time since the last valid segment arrived
    pub idle: Duration,
    /// Time spent in a close-wait state
    pub close_wait: Duration,
}

impl Timers {
    pub fn advance(&mut self, elapsed: Duration) {
        self.retransmit = self.retransmit.saturating_add(elapsed);
        self.idle = self.idle.saturating_add(elapsed);
        self.close_wait = self.close_wait.saturating_add(elapsed);
    }

    pub fn sent(&mut self) {
        self.retransmit = Duration::ZERO;
    }

    pub fn heard(&mut self) {
        self.idle = Duration::ZERO;
    }

    pub fn start_close_wait(&mut self) {
        self.close_wait = Duration::ZERO;
    }
}
