use super::modular_cmp::{mod_leq, mod_lt};

//      1         2          3
// ----------|----------|----------
//          ISS        NXT
//
// 1 - sequence numbers before the connection was synchronized
// 2 - sequence numbers already assigned to SYN, data, NUL and RST segments
// 3 - sequence numbers not yet assigned
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Default)]
pub struct SendSequenceSpace {
    /// Initial send sequence number, carried by our SYN
    pub iss: u32,
    /// Next sequence number to be assigned
    pub nxt: u32,
}

impl SendSequenceSpace {
    /// A send space whose SYN has consumed `iss`.
    pub fn new(iss: u32) -> Self {
        Self {
            iss,
            nxt: iss.wrapping_add(1),
        }
    }

    /// Hands out the next sequence number. Retransmissions reuse the number
    /// of the buffered segment and never come through here.
    pub fn assign(&mut self) -> u32 {
        let seq = self.nxt;
        self.nxt = self.nxt.wrapping_add(1);
        seq
    }
}

//      1          2          3
// ----------|----------|----------
//          CUR      CUR + 1
//
// 1 - sequence numbers already received, only acknowledged again
// 2 - the single sequence number acceptable next
// 3 - sequence numbers that cannot arrive with one segment in flight
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Default)]
pub struct ReceiveSequenceSpace {
    /// Initial receive sequence number, carried by the peer's SYN
    pub irs: u32,
    /// Highest sequence number validly received
    pub cur: u32,
}

impl ReceiveSequenceSpace {
    /// A receive space synchronized to the peer's SYN.
    pub fn new(irs: u32) -> Self {
        Self { irs, cur: irs }
    }

    /// Classifies the sequence number of an arriving sequenced segment.
    pub fn classify(&self, seq: u32) -> Arrival {
        if seq == self.cur.wrapping_add(1) {
            Arrival::New
        } else if mod_leq(seq, self.cur) {
            Arrival::Duplicate
        } else {
            Arrival::OutOfOrder
        }
    }

    /// Whether a RST numbered `seq` may close the connection. Closing abandons
    /// the segment in flight, so the RST can land one number past a gap.
    pub fn accepts_reset(&self, seq: u32) -> bool {
        mod_lt(self.cur, seq) && mod_leq(seq, self.cur.wrapping_add(2))
    }

    /// Records `seq` as the latest segment received in order.
    pub fn accept(&mut self, seq: u32) {
        self.cur = seq;
    }
}

/// How an arriving segment relates to what has already been received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arrival {
    /// The next segment in order.
    New,
    /// A segment that was already delivered. It is acknowledged again but
    /// not delivered twice.
    Duplicate,
    /// A segment from beyond the single-segment window.
    OutOfOrder,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assigns_consecutive_numbers() {
        let mut snd = SendSequenceSpace::new(100);
        assert_eq!(snd.nxt, 101);
        assert_eq!(snd.assign(), 101);
        assert_eq!(snd.assign(), 102);
        assert_eq!(snd.nxt, 103);
        assert_eq!(snd.iss, 100);
    }

    #[test]
    fn send_space_wraps() {
        let mut snd = SendSequenceSpace::new(u32::MAX);
        assert_eq!(snd.assign(), 0);
        assert_eq!(snd.nxt, 1);
    }

    #[test]
    fn classifies_arrivals() {
        let mut rcv = ReceiveSequenceSpace::new(300);
        assert_eq!(rcv.classify(301), Arrival::New);
        assert_eq!(rcv.classify(300), Arrival::Duplicate);
        assert_eq!(rcv.classify(250), Arrival::Duplicate);
        assert_eq!(rcv.classify(302), Arrival::OutOfOrder);

        rcv.accept(301);
        assert_eq!(rcv.cur, 301);
        assert_eq!(rcv.irs, 300);
        assert_eq!(rcv.classify(301), Arrival::Duplicate);
        assert_eq!(rcv.classify(302), Arrival::New);
    }

    #[test]
    fn reset_may_skip_one_abandoned_segment() {
        let rcv = ReceiveSequenceSpace::new(300);
        assert!(rcv.accepts_reset(301));
        assert!(rcv.accepts_reset(302));
        assert!(!rcv.accepts_reset(300));
        assert!(!rcv.accepts_reset(299));
        assert!(!rcv.accepts_reset(303));

        let rcv = ReceiveSequenceSpace::new(u32::MAX - 1);
        assert!(rcv.accepts_reset(u32::MAX));
        assert!(rcv.accepts_reset(0));
        assert!(!rcv.accepts_reset(1));
    }

    #[test]
    fn classification_wraps() {
        let rcv = ReceiveSequenceSpace::new(u32::MAX);
        assert_eq!(rcv.classify(0), Arrival::New);
        assert_eq!(rcv.classify(u32::MAX), Arrival::Duplicate);
        assert_eq!(rcv.classify(1), Arrival::OutOfOrder);
    }
}
