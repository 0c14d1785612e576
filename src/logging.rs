//! Wrappers around `tracing` events, one per kind of thing a connection does.
//! Nothing here installs a subscriber; that is left to the embedding
//! application.

use crate::{connection::State, handler::ChannelPair, rdp_parsing::RdpHeader, RdpError};
use tracing::{event, Level};

/// Which way a segment travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Outgoing,
    Incoming,
}

/// A segment was transmitted or accepted.
pub(crate) fn segment_event(channels: ChannelPair, direction: Direction, header: &RdpHeader) {
    event!(
        Level::DEBUG,
        local = channels.local,
        remote = channels.remote,
        ?direction,
        seq = header.seq,
        ack = header.ack,
        ctl = ?header.ctl,
        len = header.data_len,
        "segment"
    );
}

pub(crate) fn state_event(channels: ChannelPair, from: State, to: State) {
    event!(
        Level::DEBUG,
        local = channels.local,
        remote = channels.remote,
        ?from,
        ?to,
        "state change"
    );
}

/// The buffered segment went out again.
pub(crate) fn retransmit_event(channels: ChannelPair, seq: u32, len: usize) {
    event!(
        Level::DEBUG,
        local = channels.local,
        remote = channels.remote,
        seq,
        len,
        "retransmitting segment"
    );
}

pub(crate) fn keepalive_event(channels: ChannelPair, seq: u32) {
    event!(
        Level::DEBUG,
        local = channels.local,
        remote = channels.remote,
        seq,
        "sending keepalive"
    );
}

/// An arriving segment was discarded without effect.
pub(crate) fn drop_event(channels: ChannelPair, state: State, reason: &RdpError) {
    event!(
        Level::TRACE,
        local = channels.local,
        remote = channels.remote,
        ?state,
        %reason,
        "segment dropped"
    );
}

/// A user operation was refused.
pub(crate) fn refused_event(
    channels: ChannelPair,
    state: State,
    operation: &'static str,
    reason: &RdpError,
) {
    event!(
        Level::WARN,
        local = channels.local,
        remote = channels.remote,
        ?state,
        operation,
        %reason,
        "operation refused"
    );
}

/// A close-wait state timed out before its handshake finished.
pub(crate) fn close_timeout_event(channels: ChannelPair, state: State) {
    event!(
        Level::INFO,
        local = channels.local,
        remote = channels.remote,
        ?state,
        "close handshake timed out"
    );
}
