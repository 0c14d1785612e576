//! A Reliable Data Protocol engine for carrying small messages over an
//! unreliable datagram service.
//!
//! Each [`Connection`] is one end of a point-to-point link identified by a
//! pair of 8-bit channel numbers. Connections open with a three-way
//! handshake, deliver data exactly once and in order with a single segment
//! in flight, keep idle peers alive with NUL segments and close with a RST
//! handshake.
//!
//! # Organization
//! - [`rdp_parsing`] encodes and decodes segments
//! - [`Connection`] is the state machine for one connection
//! - [`Handler`] and [`Callbacks`] receive everything a connection emits
//! - [`Config`] holds the timeouts
//!
//! # Driving a connection
//!
//! The crate does no I/O, owns no timers and never allocates. The owner of
//! a connection:
//!
//! 1. lends it two [`SegmentBuffer`]s,
//! 2. forwards whatever arrives from the network to
//!    [`Connection::received`],
//! 3. puts every segment passed to [`Handler::transmit`] on the network, and
//! 4. periodically reports elapsed time through [`Connection::clock`].
//!
//! Demultiplexing several connections over one datagram socket is left to
//! the owner; the channel numbers of a parsed [`Segment`] are enough to pick
//! the right connection.
//!
//! ```
//! use rdp::{Connection, SegmentBuffer, MAX_SEGMENT_SIZE};
//!
//! let (mut out_a, mut in_a): (SegmentBuffer, SegmentBuffer) =
//!     ([0; MAX_SEGMENT_SIZE], [0; MAX_SEGMENT_SIZE]);
//! let (mut out_b, mut in_b): (SegmentBuffer, SegmentBuffer) =
//!     ([0; MAX_SEGMENT_SIZE], [0; MAX_SEGMENT_SIZE]);
//!
//! let mut a = Connection::new(&mut out_a, &mut in_a, ());
//! let mut b = Connection::new(&mut out_b, &mut in_b, ());
//!
//! b.listen(1).unwrap();
//! a.connect(1, 2).unwrap();
//! let syn = a.pending_segment().unwrap().to_vec();
//! b.received(&syn).unwrap();
//! assert_eq!(b.state(), rdp::State::SynRcvd);
//! ```

mod config;
mod logging;

pub mod connection;
pub use connection::{CloseRole, Connection, RdpError, State};

pub mod handler;
pub use handler::{Callbacks, ChannelPair, Handler};

pub mod rdp_parsing;
pub use rdp_parsing::{Segment, SegmentBuffer, HEADER_LEN, MAX_PAYLOAD, MAX_SEGMENT_SIZE};

pub mod utility;

pub use config::{
    Config, CLOSE_WAIT_TIMEOUT, IDLE_TIMEOUT, INITIAL_SEQUENCE, RETRANSMIT_TIMEOUT,
};
