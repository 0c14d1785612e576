//! The per-connection state machine.

use crate::{
    config::Config,
    handler::{Callbacks, ChannelPair, Handler},
    logging::{self, Direction},
    rdp_parsing::{
        BuildHeaderError, ParseError, RdpHeaderBuilder, Segment, SegmentBuffer, HEADER_LEN,
        MAX_PAYLOAD,
    },
};
use std::time::Duration;
use thiserror::Error as ThisError;

mod modular_cmp;
mod outbound;
mod sequence_space;
mod state;
mod timers;


use outbound::{Outbound, SegmentKind};
use sequence_space::{Arrival, ReceiveSequenceSpace, SendSequenceSpace};
use timers::Timers;

pub use state::{CloseRole, State};

/// One end of an RDP connection.
///
/// A connection owns no memory of its own. It borrows two segment buffers
/// from its owner: `outbound` holds the single unacknowledged segment for
/// retransmission and `inbound` holds the payload of the last segment
/// delivered. Everything the connection wants done is handed to its
/// [`Handler`].
///
/// At most one sequenced segment (SYN, data, NUL or RST) is unacknowledged
/// at any time. Pure acknowledgments are built on the stack and never
/// retransmitted.
#[derive(Debug)]
pub struct Connection<'a, H = Callbacks<'a>> {
    config: Config,
    channels: ChannelPair,
    state: State,
    close_role: CloseRole,
    snd: SendSequenceSpace,
    rcv: ReceiveSequenceSpace,
    outbound: Outbound<'a>,
    inbound: &'a mut SegmentBuffer,
    inbound_len: usize,
    timers: Timers,
    handler: H,
}

impl<'a, H: Handler> Connection<'a, H> {
    /// Creates a closed connection with the default [`Config`].
    pub fn new(outbound: &'a mut SegmentBuffer, inbound: &'a mut SegmentBuffer, handler: H) -> Self {
        Self::with_config(Config::default(), outbound, inbound, handler)
    }

    pub fn with_config(
        config: Config,
        outbound: &'a mut SegmentBuffer,
        inbound: &'a mut SegmentBuffer,
        handler: H,
    ) -> Self {
        Self {
            config,
            channels: ChannelPair::default(),
            state: State::Closed,
            close_role: CloseRole::None,
            snd: SendSequenceSpace::default(),
            rcv: ReceiveSequenceSpace::default(),
            outbound: Outbound::new(outbound),
            inbound,
            inbound_len: 0,
            timers: Timers::default(),
            handler,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The local and remote channels. The remote channel of a listening
    /// connection is only known once a SYN arrives.
    pub fn channels(&self) -> ChannelPair {
        self.channels
    }

    pub fn close_role(&self) -> CloseRole {
        self.close_role
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Whether [`send`](Self::send) would currently accept data.
    pub fn can_send(&self) -> bool {
        self.state == State::Open && !self.outbound.is_occupied()
    }

    /// The unacknowledged segment awaiting retransmission, if any.
    pub fn pending_segment(&self) -> Option<&[u8]> {
        self.outbound.bytes()
    }

    /// The payload of the last segment delivered through
    /// [`Handler::data_received`].
    pub fn received_data(&self) -> &[u8] {
        &self.inbound[..self.inbound_len]
    }

    /// Waits for a connection request addressed to `local`.
    pub fn listen(&mut self, local: u8) -> Result<(), RdpError> {
        if self.state != State::Closed {
            return Err(self.refuse("listen", RdpError::GuardViolation));
        }
        self.channels = ChannelPair::new(local, 0);
        self.transition(State::Listen);
        Ok(())
    }

    /// Actively opens a connection from `local` to `remote` by sending a
    /// SYN.
    pub fn connect(&mut self, remote: u8, local: u8) -> Result<(), RdpError> {
        if self.state != State::Closed {
            return Err(self.refuse("connect", RdpError::GuardViolation));
        }
        self.channels = ChannelPair::new(local, remote);
        self.snd = SendSequenceSpace::new(self.config.initial_sequence);
        self.rcv = ReceiveSequenceSpace::default();
        let syn = self.header_builder(self.snd.iss).syn();
        self.transmit_buffered(SegmentKind::Syn, syn, &[])?;
        self.transition(State::SynSent);
        Ok(())
    }

    /// Sends `data` as a single segment. Only one data segment may be
    /// unacknowledged; wait for [`Handler::data_send_completed`] before
    /// sending the next.
    pub fn send(&mut self, data: &[u8]) -> Result<(), RdpError> {
        if !self.can_send() || data.is_empty() {
            return Err(self.refuse("send", RdpError::GuardViolation));
        }
        if data.len() > MAX_PAYLOAD {
            return Err(self.refuse("send", RdpError::CapacityExceeded));
        }
        let ack = self.rcv.cur;
        self.transmit_sequenced(SegmentKind::Data, |builder| builder.ack(ack), data)
    }

    /// Starts the active close handshake. Any unacknowledged data is
    /// abandoned.
    pub fn close(&mut self) -> Result<(), RdpError> {
        if self.state != State::Open {
            return Err(self.refuse("close", RdpError::GuardViolation));
        }
        self.outbound.clear();
        self.transmit_sequenced(SegmentKind::Reset, RdpHeaderBuilder::rst, &[])?;
        self.close_role = CloseRole::Active;
        self.timers.start_close_wait();
        self.transition(State::ActiveCloseWait);
        Ok(())
    }

    /// Forces the connection back to CLOSED without telling the peer or the
    /// handler.
    pub fn reset(&mut self) {
        self.clear();
        self.channels = ChannelPair::default();
        self.transition(State::Closed);
    }

    /// Processes a segment handed over by the owner. Trailing bytes past the
    /// encoded payload are ignored.
    ///
    /// An `Err` means the segment had no effect on the connection.
    pub fn received(&mut self, bytes: &[u8]) -> Result<(), RdpError> {
        let result = match Segment::parse(bytes) {
            Ok(segment) => self
                .segment_arrives(segment)
                .map(|_| segment),
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(segment) => {
                logging::segment_event(self.channels, Direction::Incoming, &segment.header);
                self.timers.heard();
                Ok(())
            }
            Err(e) => {
                logging::drop_event(self.channels, self.state, &e);
                Err(e)
            }
        }
    }

    /// Reports that `elapsed` time has passed and fires whatever timers
    /// expired.
    pub fn clock(&mut self, elapsed: Duration) {
        self.timers.advance(elapsed);

        if self.outbound.is_occupied() && self.timers.retransmit >= self.config.retransmit_timeout {
            self.retransmit();
        }

        if self.can_send() && self.timers.idle >= self.config.idle_timeout {
            let seq = self.snd.nxt;
            if self
                .transmit_sequenced(SegmentKind::Keepalive, RdpHeaderBuilder::nul, &[])
                .is_ok()
            {
                logging::keepalive_event(self.channels, seq);
            }
        }

        if self.state.is_closing() && self.timers.close_wait >= self.config.close_wait_timeout {
            logging::close_timeout_event(self.channels, self.state);
            self.finish_close();
        }
    }

    fn segment_arrives(&mut self, segment: Segment<'_>) -> Result<(), RdpError> {
        let header = segment.header;
        // The header names channels from the sender's side
        let channels = ChannelPair::new(header.src_channel, header.dst_channel).reverse();
        let addressed = match self.state {
            State::Closed => false,
            State::Listen => channels.local == self.channels.local,
            _ => channels == self.channels,
        };
        if !addressed {
            return Err(RdpError::NotApplicable);
        }

        match self.state {
            State::Closed => Err(RdpError::NotApplicable),
            State::Listen => self.listen_arrives(segment),
            State::SynSent => self.syn_sent_arrives(segment),
            State::SynRcvd => self.syn_rcvd_arrives(segment),
            State::Open => self.open_arrives(segment),
            State::ActiveCloseWait => self.active_close_wait_arrives(segment),
            State::PassiveCloseWait => self.passive_close_wait_arrives(segment),
        }
    }

    fn listen_arrives(&mut self, segment: Segment<'_>) -> Result<(), RdpError> {
        let header = segment.header;
        if !header.ctl.syn() || header.ctl.ack() {
            return Err(RdpError::NotApplicable);
        }
        self.channels = ChannelPair::new(header.src_channel, header.dst_channel).reverse();
        self.rcv = ReceiveSequenceSpace::new(header.seq);
        self.snd = SendSequenceSpace::new(self.config.initial_sequence);
        let syn_ack = self.header_builder(self.snd.iss).syn().ack(header.seq);
        self.transmit_buffered(SegmentKind::Syn, syn_ack, &[])?;
        self.transition(State::SynRcvd);
        Ok(())
    }

    fn syn_sent_arrives(&mut self, segment: Segment<'_>) -> Result<(), RdpError> {
        let header = segment.header;
        match (header.ctl.syn(), header.ctl.ack()) {
            (true, false) => {
                // Simultaneous open: answer with a SYN,ACK that reuses our ISS
                self.rcv = ReceiveSequenceSpace::new(header.seq);
                let syn_ack = self.header_builder(self.snd.iss).syn().ack(header.seq);
                self.transmit_buffered(SegmentKind::Syn, syn_ack, &[])?;
                self.transition(State::SynRcvd);
                Ok(())
            }
            (true, true) if self.outbound.acknowledges(header.ack) => {
                self.rcv = ReceiveSequenceSpace::new(header.seq);
                self.outbound.clear();
                self.transmit_ack(header.seq);
                self.establish();
                Ok(())
            }
            _ => Err(RdpError::NotApplicable),
        }
    }

    fn syn_rcvd_arrives(&mut self, segment: Segment<'_>) -> Result<(), RdpError> {
        let header = segment.header;
        let ctl = header.ctl;

        if ctl.syn() && !ctl.ack() {
            // The peer never saw our SYN,ACK
            if header.seq != self.rcv.irs {
                return Err(RdpError::NotApplicable);
            }
            self.retransmit();
            return Ok(());
        }

        if !ctl.ack() || ctl.rst() || !self.outbound.acknowledges(header.ack) {
            return Err(RdpError::NotApplicable);
        }

        if ctl.syn() {
            // The other half of a simultaneous open
            if header.seq != self.rcv.irs {
                return Err(RdpError::NotApplicable);
            }
            self.outbound.clear();
            self.transmit_ack(header.seq);
            self.establish();
            return Ok(());
        }

        self.outbound.clear();
        self.establish();
        if !segment.is_empty() {
            // Data riding on the handshake ACK is accepted as if it arrived
            // in OPEN.
            self.deliver(segment);
        }
        Ok(())
    }

    fn open_arrives(&mut self, segment: Segment<'_>) -> Result<(), RdpError> {
        let header = segment.header;
        let ctl = header.ctl;

        if ctl.rst() {
            if ctl.ack() || !self.rcv.accepts_reset(header.seq) {
                return Err(RdpError::NotApplicable);
            }
            self.rcv.accept(header.seq);
            self.outbound.clear();
            let seq = header.seq;
            self.transmit_sequenced(SegmentKind::Reset, |builder| builder.rst().ack(seq), &[])?;
            self.close_role = CloseRole::Passive;
            self.timers.start_close_wait();
            self.transition(State::PassiveCloseWait);
            return Ok(());
        }

        if ctl.syn() {
            // A handshake segment retransmitted after our ACK went missing
            if header.seq != self.rcv.irs {
                return Err(RdpError::NotApplicable);
            }
            self.transmit_ack(self.rcv.cur);
            return Ok(());
        }

        if ctl.nul() {
            return match self.rcv.classify(header.seq) {
                Arrival::New => {
                    self.rcv.accept(header.seq);
                    self.transmit_ack(header.seq);
                    Ok(())
                }
                Arrival::Duplicate => {
                    self.transmit_ack(header.seq);
                    Ok(())
                }
                Arrival::OutOfOrder => Err(RdpError::NotApplicable),
            };
        }

        let mut applied = false;
        if ctl.ack() && self.outbound.acknowledges(header.ack) {
            if let Some(pending) = self.outbound.clear() {
                if pending.kind == SegmentKind::Data {
                    self.handler.data_send_completed(self.channels);
                }
            }
            applied = true;
        }
        if !segment.is_empty() {
            applied |= self.deliver(segment);
        }

        if applied {
            Ok(())
        } else {
            Err(RdpError::NotApplicable)
        }
    }

    fn active_close_wait_arrives(&mut self, segment: Segment<'_>) -> Result<(), RdpError> {
        let header = segment.header;
        if !header.ctl.rst() {
            return Err(RdpError::NotApplicable);
        }

        if header.ctl.ack() {
            if !self.outbound.acknowledges(header.ack) {
                return Err(RdpError::NotApplicable);
            }
            self.transmit_ack(header.seq);
            self.finish_close();
            return Ok(());
        }

        // Simultaneous close: both sides sent RST
        if !self.rcv.accepts_reset(header.seq) {
            return Err(RdpError::NotApplicable);
        }
        self.finish_close();
        Ok(())
    }

    fn passive_close_wait_arrives(&mut self, segment: Segment<'_>) -> Result<(), RdpError> {
        let header = segment.header;
        let ctl = header.ctl;

        if ctl.rst() && !ctl.ack() {
            // The peer never saw our RST,ACK
            if header.seq != self.rcv.cur {
                return Err(RdpError::NotApplicable);
            }
            self.retransmit();
            return Ok(());
        }

        let pure_ack = ctl.ack() && !ctl.syn() && !ctl.rst() && segment.is_empty();
        if !pure_ack || !self.outbound.acknowledges(header.ack) {
            return Err(RdpError::NotApplicable);
        }
        self.finish_close();
        Ok(())
    }

    /// Hands an in-order payload to the handler. Returns whether the segment
    /// had any effect.
    fn deliver(&mut self, segment: Segment<'_>) -> bool {
        let seq = segment.header.seq;
        match self.rcv.classify(seq) {
            Arrival::New => {
                let len = segment.payload.len();
                self.inbound[..len].copy_from_slice(segment.payload);
                self.inbound_len = len;
                self.rcv.accept(seq);
                self.transmit_ack(seq);
                self.handler
                    .data_received(self.channels, &self.inbound[..len]);
                true
            }
            Arrival::Duplicate => {
                self.transmit_ack(seq);
                true
            }
            Arrival::OutOfOrder => false,
        }
    }

    fn establish(&mut self) {
        self.transition(State::Open);
        self.handler.connected(self.channels);
    }

    fn finish_close(&mut self) {
        self.clear();
        self.transition(State::Closed);
        self.handler.closed(self.channels);
    }

    /// Forgets everything about the current connection except its channels.
    fn clear(&mut self) {
        self.outbound.clear();
        self.snd = SendSequenceSpace::default();
        self.rcv = ReceiveSequenceSpace::default();
        self.timers = Timers::default();
        self.close_role = CloseRole::None;
        self.inbound_len = 0;
    }

    fn transition(&mut self, to: State) {
        if self.state != to {
            logging::state_event(self.channels, self.state, to);
            self.state = to;
        }
    }

    fn refuse(&self, operation: &'static str, error: RdpError) -> RdpError {
        logging::refused_event(self.channels, self.state, operation, &error);
        error
    }

    fn header_builder(&self, seq: u32) -> RdpHeaderBuilder {
        RdpHeaderBuilder::new(self.channels.local, self.channels.remote, seq)
    }

    /// Builds a segment with the next unassigned sequence number into the
    /// outbound slot and transmits it. The number is only consumed once the
    /// segment was built.
    fn transmit_sequenced(
        &mut self,
        kind: SegmentKind,
        flags: impl FnOnce(RdpHeaderBuilder) -> RdpHeaderBuilder,
        payload: &[u8],
    ) -> Result<(), RdpError> {
        let builder = flags(self.header_builder(self.snd.nxt));
        self.transmit_buffered(kind, builder, payload)?;
        self.snd.assign();
        Ok(())
    }

    /// Builds a segment into the outbound slot and transmits it.
    fn transmit_buffered(
        &mut self,
        kind: SegmentKind,
        builder: RdpHeaderBuilder,
        payload: &[u8],
    ) -> Result<(), RdpError> {
        let header = self.outbound.store(kind, builder, payload)?;
        logging::segment_event(self.channels, Direction::Outgoing, &header);
        if let Some(bytes) = self.outbound.bytes() {
            self.handler.transmit(self.channels, bytes);
        }
        self.timers.sent();
        Ok(())
    }

    /// Sends the buffered segment again, byte for byte.
    fn retransmit(&mut self) {
        if let (Some(pending), Some(bytes)) = (self.outbound.pending(), self.outbound.bytes()) {
            logging::retransmit_event(self.channels, pending.seq, pending.len);
            self.handler.transmit(self.channels, bytes);
            self.timers.sent();
        }
    }

    /// Sends a pure acknowledgment. It carries our next unassigned sequence
    /// number without consuming it and is never buffered.
    fn transmit_ack(&mut self, ack: u32) {
        let mut buf = [0; HEADER_LEN];
        let builder = self.header_builder(self.snd.nxt).ack(ack);
        if let Ok((header, len)) = builder.build(&[], &mut buf) {
            logging::segment_event(self.channels, Direction::Outgoing, &header);
            self.handler.transmit(self.channels, &buf[..len]);
        }
    }
}

/// Why an operation or an arriving segment had no effect.
#[derive(Debug, ThisError, PartialEq, Eq, Clone, Copy)]
pub enum RdpError {
    #[error("Malformed segment: {0}")]
    Malformed(#[from] ParseError),
    #[error("The segment does not apply to the connection in its current state")]
    NotApplicable,
    #[error("The operation is not permitted in the connection's current state")]
    GuardViolation,
    #[error("The payload does not fit into a single segment")]
    CapacityExceeded,
}

impl From<BuildHeaderError> for RdpError {
    fn from(_: BuildHeaderError) -> Self {
        Self::CapacityExceeded
    }
}
