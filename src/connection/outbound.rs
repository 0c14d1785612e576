use crate::rdp_parsing::{BuildHeaderError, RdpHeader, RdpHeaderBuilder, SegmentBuffer};

/// The single retransmission slot of a connection. Holds a verbatim copy of
/// the last sequenced segment until the peer acknowledges it.
#[derive(Debug)]
pub struct Outbound<'a> {
    buf: &'a mut SegmentBuffer,
    pending: Option<Pending>,
}

/// Bookkeeping for the segment currently held in the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pending {
    pub kind: SegmentKind,
    pub seq: u32,
    pub len: usize,
}

/// What the buffered segment is for. Decides which callback fires once it is
/// acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// SYN or SYN,ACK
    Syn,
    Data,
    /// NUL keepalive
    Keepalive,
    /// RST or RST,ACK
    Reset,
}

impl<'a> Outbound<'a> {
    pub fn new(buf: &'a mut SegmentBuffer) -> Self {
        Self { buf, pending: None }
    }

    /// Serializes a segment into the slot, replacing whatever it held.
    pub fn store(
        &mut self,
        kind: SegmentKind,
        builder: RdpHeaderBuilder,
        payload: &[u8],
    ) -> Result<RdpHeader, BuildHeaderError> {
        let (header, len) = builder.build(payload, &mut self.buf[..])?;
        self.pending = Some(Pending {
            kind,
            seq: header.seq,
            len,
        });
        Ok(header)
    }

    pub fn is_occupied(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<Pending> {
        self.pending
    }

    /// The buffered segment exactly as it was first transmitted.
    pub fn bytes(&self) -> Option<&[u8]> {
        self.pending.map(|pending| &self.buf[..pending.len])
    }

    /// Whether `ack` acknowledges the buffered segment.
    pub fn acknowledges(&self, ack: u32) -> bool {
        self.pending.map_or(false, |pending| pending.seq == ack)
    }

    /// Empties the slot, returning what it held.
    pub fn clear(&mut self) -> Option<Pending> {
        self.pending.take()
    }
}
