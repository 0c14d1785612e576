//! The boundary between a connection and its owner.
//!
//! A connection never performs I/O. Outgoing segments and lifecycle events
//! are handed to a [`Handler`] synchronously, from inside whichever
//! connection method caused them. Handlers must not call back into the
//! connection that invoked them; the borrow checker rules that out for the
//! owner-held handlers this crate hands out.

/// Identifies a connection by its local and remote channel numbers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelPair {
    /// The channel on the local host
    pub local: u8,
    /// The channel on the peer
    pub remote: u8,
}

impl ChannelPair {
    /// Creates a new channel pair.
    pub const fn new(local: u8, remote: u8) -> Self {
        Self { local, remote }
    }

    /// Gets the pair as seen from the peer.
    pub const fn reverse(self) -> Self {
        Self {
            local: self.remote,
            remote: self.local,
        }
    }
}

/// Receives the side effects of a connection.
///
/// Every method has a default that does nothing, so implementors only
/// write the events they care about.
pub trait Handler {
    /// A serialized segment must be carried to the peer. The bytes are only
    /// valid for the duration of the call.
    fn transmit(&mut self, _channels: ChannelPair, _segment: &[u8]) {}

    /// The handshake completed and the connection is open.
    fn connected(&mut self, _channels: ChannelPair) {}

    /// The connection reached CLOSED through a close handshake or the
    /// close-wait timeout. Not called for [`reset`](crate::Connection::reset).
    fn closed(&mut self, _channels: ChannelPair) {}

    /// New in-order data arrived. Duplicates are never delivered twice.
    fn data_received(&mut self, _channels: ChannelPair, _data: &[u8]) {}

    /// The peer acknowledged the last data segment and
    /// [`send`](crate::Connection::send) may be called again.
    fn data_send_completed(&mut self, _channels: ChannelPair) {}
}

impl Handler for () {}

impl<H: Handler + ?Sized> Handler for &mut H {
    fn transmit(&mut self, channels: ChannelPair, segment: &[u8]) {
        (**self).transmit(channels, segment)
    }

    fn connected(&mut self, channels: ChannelPair) {
        (**self).connected(channels)
    }

    fn closed(&mut self, channels: ChannelPair) {
        (**self).closed(channels)
    }

    fn data_received(&mut self, channels: ChannelPair, data: &[u8]) {
        (**self).data_received(channels, data)
    }

    fn data_send_completed(&mut self, channels: ChannelPair) {
        (**self).data_send_completed(channels)
    }
}

type BytesHook<'a> = &'a mut dyn FnMut(ChannelPair, &[u8]);
type EventHook<'a> = &'a mut dyn FnMut(ChannelPair);

/// A [`Handler`] assembled from individually registered closures. Any hook
/// left unset is a no-op.
///
/// ```
/// use rdp::{Callbacks, ChannelPair};
///
/// let mut sent = 0;
/// let mut count = |_: ChannelPair, _: &[u8]| sent += 1;
/// let callbacks = Callbacks::default().with_transmit(&mut count);
/// # drop(callbacks);
/// ```
#[derive(Default)]
pub struct Callbacks<'a> {
    transmit: Option<BytesHook<'a>>,
    connected: Option<EventHook<'a>>,
    closed: Option<EventHook<'a>>,
    data_received: Option<BytesHook<'a>>,
    data_send_completed: Option<EventHook<'a>>,
}

impl<'a> Callbacks<'a> {
    pub fn set_transmit_cb(&mut self, cb: BytesHook<'a>) {
        self.transmit = Some(cb);
    }

    pub fn set_connected_cb(&mut self, cb: EventHook<'a>) {
        self.connected = Some(cb);
    }

    pub fn set_closed_cb(&mut self, cb: EventHook<'a>) {
        self.closed = Some(cb);
    }

    pub fn set_data_received_cb(&mut self, cb: BytesHook<'a>) {
        self.data_received = Some(cb);
    }

    pub fn set_data_send_completed_cb(&mut self, cb: EventHook<'a>) {
        self.data_send_completed = Some(cb);
    }

    pub fn with_transmit(mut self, cb: BytesHook<'a>) -> Self {
        self.set_transmit_cb(cb);
        self
    }

    pub fn with_connected(mut self, cb: EventHook<'a>) -> Self {
        self.set_connected_cb(cb);
        self
    }

    pub fn with_closed(mut self, cb: EventHook<'a>) -> Self {
        self.set_closed_cb(cb);
        self
    }

    pub fn with_data_received(mut self, cb: BytesHook<'a>) -> Self {
        self.set_data_received_cb(cb);
        self
    }

    pub fn with_data_send_completed(mut self, cb: EventHook<'a>) -> Self {
        self.set_data_send_completed_cb(cb);
        self
    }
}

impl Handler for Callbacks<'_> {
    fn transmit(&mut self, channels: ChannelPair, segment: &[u8]) {
        if let Some(cb) = self.transmit.as_mut() {
            cb(channels, segment);
        }
    }

    fn connected(&mut self, channels: ChannelPair) {
        if let Some(cb) = self.connected.as_mut() {
            cb(channels);
        }
    }

    fn closed(&mut self, channels: ChannelPair) {
        if let Some(cb) = self.closed.as_mut() {
            cb(channels);
        }
    }

    fn data_received(&mut self, channels: ChannelPair, data: &[u8]) {
        if let Some(cb) = self.data_received.as_mut() {
            cb(channels, data);
        }
    }

    fn data_send_completed(&mut self, channels: ChannelPair) {
        if let Some(cb) = self.data_send_completed.as_mut() {
            cb(channels);
        }
    }
}

impl std::fmt::Debug for Callbacks<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("transmit", &self.transmit.is_some())
            .field("connected", &self.connected.is_some())
            .field("closed", &self.closed.is_some())
            .field("data_received", &self.data_received.is_some())
            .field("data_send_completed", &self.data_send_completed.is_some())
            .finish()
    }
}
