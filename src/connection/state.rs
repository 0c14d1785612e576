/// The state of the RDP connection state machine. Each peer runs its own
/// instance of the diagram below.
///
/// ```text
///                             +---------+
///            +--------------->| CLOSED  |<---------------------+
///            |                +---------+                      |
///            |       listen     |     |    connect             |
///            |      --------    |     |   ---------            |
///            |                  V     V   snd SYN              |
///            |          +--------+   +----------+              |
///            |          | LISTEN |   | SYN-SENT |-----+        |
///            |          +--------+   +----------+     |        |
///            |   rcv SYN    |          | rcv SYN      |        |
///            |  ----------- |          | -----------  |        |
///            |  snd SYN,ACK V          V snd SYN,ACK  |        |
///            |          +----------+                  |        |
///            |          | SYN-RCVD |     rcv SYN,ACK  |        |
///            |          +----------+     -----------  |        |
///            |   rcv ACK    |              snd ACK    |        |
///            |              V                         |        |
///            |          +----------+<-----------------+        |
///            |          |   OPEN   |                           |
///            |          +----------+                           |
///            |    close   |      | rcv RST                     |
///            |   -------  |      | -----------                 |
///            |   snd RST  V      V snd RST,ACK                 |
///   +-------------------+    +--------------------+  rcv ACK   |
///   | ACTIVE-CLOSE-WAIT |    | PASSIVE-CLOSE-WAIT |------------+
///   +-------------------+    +--------------------+
///     rcv RST,ACK: snd ACK
///     rcv RST: (simultaneous close)
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// No connection exists. Both the initial and the terminal state.
    #[default]
    Closed,
    /// Waiting for a connection request on the local channel.
    Listen,
    /// Waiting for a matching connection request after having sent a
    /// connection request.
    SynSent,
    /// Waiting for a confirming acknowledgment after having both received
    /// and sent a connection request.
    SynRcvd,
    /// An open connection, data can flow in both directions.
    Open,
    /// The local user closed the connection and a RST is awaiting its
    /// acknowledgment.
    ActiveCloseWait,
    /// The remote peer closed the connection and our RST,ACK is awaiting the
    /// final acknowledgment.
    PassiveCloseWait,
}

impl State {
    /// Whether the connection is in one of the two close-wait states.
    pub fn is_closing(self) -> bool {
        matches!(self, State::ActiveCloseWait | State::PassiveCloseWait)
    }
}

/// Which side of the close sequence a connection is on.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseRole {
    #[default]
    None,
    /// The local user called close.
    Active,
    /// The remote peer sent RST first.
    Passive,
}
