//! The RDP segment codec.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  Ver  |S|A|R|N| Header Length |  Src Channel  |  Dst Channel  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |        Payload Length         |                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+                               +
//! |                        Sequence Number                        |
//! +                               +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                               |                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+                               +
//! |                     Acknowledgment Number                     |
//! +                               +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                               |           Checksum            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          Payload ...                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! All multi-byte fields are big-endian. The checksum covers the header and
//! the payload with the checksum field itself taken as zero.

use crate::utility::Checksum;
use thiserror::Error as ThisError;

/// The protocol version carried in the high nibble of the first octet.
pub const VERSION: u8 = 2;
/// The number of bytes in an RDP header
pub const HEADER_LEN: usize = 16;
/// The largest segment, header included, that a connection will build or
/// buffer.
pub const MAX_SEGMENT_SIZE: usize = 128;
/// The largest payload a single segment can carry.
pub const MAX_PAYLOAD: usize = MAX_SEGMENT_SIZE - HEADER_LEN;

/// Fixed-capacity storage for one segment. Connections borrow two of these
/// from their owner instead of allocating.
pub type SegmentBuffer = [u8; MAX_SEGMENT_SIZE];

const OFF_FLAGS: usize = 0;
const OFF_HEADER_LEN: usize = 1;
const OFF_SRC: usize = 2;
const OFF_DST: usize = 3;
const OFF_DATA_LEN: usize = 4;
const OFF_SEQ: usize = 6;
const OFF_ACK: usize = 10;
const OFF_CHECKSUM: usize = 14;

/// The data for an RDP header
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub struct RdpHeader {
    /// The channel of the sending connection
    pub src_channel: u8,
    /// The channel of the receiving connection
    pub dst_channel: u8,
    /// The sequence number of this segment. Pure acknowledgments carry the
    /// next unassigned number of their sender without consuming it.
    pub seq: u32,
    /// The sequence number being acknowledged. Only meaningful with ACK set.
    pub ack: u32,
    /// Flags that adjust how segments are handled
    pub ctl: Control,
    /// The number of payload octets following the header
    pub data_len: u16,
    /// The segment checksum
    pub checksum: u16,
}

/// A parsed segment borrowing its payload from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub header: RdpHeader,
    pub payload: &'a [u8],
}

impl<'a> Segment<'a> {
    /// Parses a serialized segment. Bytes past the end of the payload are
    /// ignored, so a whole receive buffer may be passed in.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ParseError> {
        if bytes.len() < HEADER_LEN {
            return Err(ParseError::HeaderTooShort);
        }

        let version = bytes[OFF_FLAGS] >> 4;
        if version != VERSION {
            return Err(ParseError::Version(version));
        }
        let ctl = Control::from(bytes[OFF_FLAGS] & Control::MASK);

        let header_len = bytes[OFF_HEADER_LEN];
        if header_len as usize != HEADER_LEN {
            return Err(ParseError::HeaderLength(header_len));
        }

        let data_len = read_u16(bytes, OFF_DATA_LEN);
        if data_len as usize > MAX_PAYLOAD {
            return Err(ParseError::PayloadTooLong(data_len));
        }
        let end = HEADER_LEN + data_len as usize;
        if end > bytes.len() {
            return Err(ParseError::LengthMismatch {
                claimed: data_len,
                available: bytes.len() - HEADER_LEN,
            });
        }

        if !ctl.is_valid(data_len as usize) {
            return Err(ParseError::InvalidControl(ctl));
        }

        let expected = read_u16(bytes, OFF_CHECKSUM);
        let actual = checksum_of(&bytes[..end]);
        if actual != expected {
            return Err(ParseError::Checksum { actual, expected });
        }

        Ok(Self {
            header: RdpHeader {
                src_channel: bytes[OFF_SRC],
                dst_channel: bytes[OFF_DST],
                seq: read_u32(bytes, OFF_SEQ),
                ack: read_u32(bytes, OFF_ACK),
                ctl,
                data_len,
                checksum: expected,
            },
            payload: &bytes[HEADER_LEN..end],
        })
    }

    /// The length of the serialized segment, header included
    pub fn len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Whether the segment carries no payload
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Computes the checksum of a serialized segment, skipping the checksum
/// field.
fn checksum_of(segment: &[u8]) -> u16 {
    let mut checksum = Checksum::new();
    checksum.accumulate(&segment[..OFF_CHECKSUM]);
    checksum.accumulate(&segment[HEADER_LEN..]);
    checksum.as_u16()
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// An error that occurred while parsing an RDP segment
#[derive(Debug, ThisError, PartialEq, Eq, Clone, Copy)]
pub enum ParseError {
    #[error("Too few bytes to constitute an RDP header")]
    HeaderTooShort,
    #[error("The header claims {claimed} payload bytes but only {available} are present")]
    LengthMismatch { claimed: u16, available: usize },
    #[error("A payload of {0} bytes does not fit into a segment buffer")]
    PayloadTooLong(u16),
    #[error("Unsupported protocol version {0}")]
    Version(u8),
    #[error("Unexpected header length {0}")]
    HeaderLength(u8),
    #[error("Invalid control flags {0:?} for this segment")]
    InvalidControl(Control),
    #[error(
        "The computed checksum {actual:#06x} did not match the header checksum {expected:#06x}"
    )]
    Checksum { actual: u16, expected: u16 },
}

/// Used for building a serialized RDP segment
#[derive(Debug)]
pub struct RdpHeaderBuilder(RdpHeader);

impl RdpHeaderBuilder {
    /// Initialize the RDP header with defaults and the given values
    pub fn new(src_channel: u8, dst_channel: u8, seq: u32) -> Self {
        Self(RdpHeader {
            src_channel,
            dst_channel,
            seq,
            ack: 0,
            ctl: Control::default(),

            // Filled in by .build()
            data_len: 0,
            checksum: 0,
        })
    }

    /// Set the acknowledgement number
    pub fn ack(mut self, ack: u32) -> Self {
        self.0.ack = ack;
        self.0.ctl.set_ack(true);
        self
    }

    /// Set the syn bit up
    pub fn syn(mut self) -> Self {
        self.0.ctl.set_syn(true);
        self
    }

    /// Set the rst bit up
    pub fn rst(mut self) -> Self {
        self.0.ctl.set_rst(true);
        self
    }

    /// Set the nul bit up
    pub fn nul(mut self) -> Self {
        self.0.ctl.set_nul(true);
        self
    }

    /// Serializes the header and `payload` into the front of `out` and
    /// returns the header that was written together with the number of bytes
    /// used.
    pub fn build(self, payload: &[u8], out: &mut [u8]) -> Result<(RdpHeader, usize), BuildHeaderError> {
        let len = HEADER_LEN + payload.len();
        if len > MAX_SEGMENT_SIZE || len > out.len() {
            return Err(BuildHeaderError::OverlyLongPayload);
        }

        let mut header = self.0;
        // Cannot truncate, MAX_SEGMENT_SIZE fits in a u16
        header.data_len = payload.len() as u16;

        let out = &mut out[..len];
        out[OFF_FLAGS] = VERSION << 4 | u8::from(header.ctl);
        out[OFF_HEADER_LEN] = HEADER_LEN as u8;
        out[OFF_SRC] = header.src_channel;
        out[OFF_DST] = header.dst_channel;
        out[OFF_DATA_LEN..OFF_SEQ].copy_from_slice(&header.data_len.to_be_bytes());
        out[OFF_SEQ..OFF_ACK].copy_from_slice(&header.seq.to_be_bytes());
        out[OFF_ACK..OFF_CHECKSUM].copy_from_slice(&header.ack.to_be_bytes());
        out[HEADER_LEN..].copy_from_slice(payload);

        header.checksum = checksum_of(out);
        out[OFF_CHECKSUM..HEADER_LEN].copy_from_slice(&header.checksum.to_be_bytes());
        Ok((header, len))
    }
}

/// An error that occurred while building an RDP segment
#[derive(Debug, ThisError, PartialEq, Eq, Clone, Copy)]
pub enum BuildHeaderError {
    #[error("The RDP payload is longer than can fit into a single segment")]
    OverlyLongPayload,
}

/// The control bits of an RDP header
#[derive(Default, Hash, PartialEq, Eq, Clone, Copy)]
pub struct Control(u8);

impl Control {
    const MASK: u8 = 0b1111;

    /// Create a new Control with the given bits
    pub const fn new(syn: bool, ack: bool, rst: bool, nul: bool) -> Self {
        Self(nul as u8 | (rst as u8) << 1 | (ack as u8) << 2 | (syn as u8) << 3)
    }

    /// Get whether to synchronize sequence numbers
    pub const fn syn(self) -> bool {
        self.bit(3)
    }

    /// Set whether to synchronize sequence numbers
    pub fn set_syn(&mut self, state: bool) {
        self.set_bit(3, state);
    }

    /// Get whether the acknowledgment field is significant
    pub const fn ack(self) -> bool {
        self.bit(2)
    }

    /// Set whether the acknowledgment field is significant
    pub fn set_ack(&mut self, state: bool) {
        self.set_bit(2, state);
    }

    /// Get whether the connection is being torn down
    pub const fn rst(self) -> bool {
        self.bit(1)
    }

    /// Set whether the connection is being torn down
    pub fn set_rst(&mut self, state: bool) {
        self.set_bit(1, state);
    }

    /// Get whether this is a keepalive
    pub const fn nul(self) -> bool {
        self.bit(0)
    }

    /// Set whether this is a keepalive
    pub fn set_nul(&mut self, state: bool) {
        self.set_bit(0, state);
    }

    /// Whether this combination of flags may appear on a segment carrying
    /// `payload_len` bytes.
    pub const fn is_valid(self, payload_len: usize) -> bool {
        if self.nul() {
            return self.0 == Self::new(false, false, false, true).0 && payload_len == 0;
        }
        if self.syn() && self.rst() {
            return false;
        }
        !((self.syn() || self.rst()) && payload_len > 0)
    }

    /// Get the given bit
    const fn bit(self, bit: u8) -> bool {
        (self.0 >> bit) & 0b1 == 1
    }

    /// Set the given bit
    fn set_bit(&mut self, bit: u8, state: bool) {
        self.0 = (self.0 & !(1 << bit)) | ((state as u8) << bit);
    }
}

impl From<u8> for Control {
    fn from(n: u8) -> Self {
        Self(n & Self::MASK)
    }
}

impl From<Control> for u8 {
    fn from(control: Control) -> Self {
        control.0
    }
}

impl std::fmt::Debug for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Control(")?;
        let names = [
            (self.syn(), "SYN"),
            (self.ack(), "ACK"),
            (self.rst(), "RST"),
            (self.nul(), "NUL"),
        ];
        let mut wrote = false;
        for (_, name) in names.iter().filter(|(set, _)| *set) {
            if wrote {
                write!(f, ", ")?;
            }
            wrote = true;
            write!(f, "{name}")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &[u8] = b"Hello, world!";
    const SRC_CHANNEL: u8 = 2;
    const DST_CHANNEL: u8 = 1;
    const SEQUENCE: u32 = 123456789;
    const ACKNOWLEDGEMENT: u32 = 10;

    fn build(builder: RdpHeaderBuilder, payload: &[u8]) -> (SegmentBuffer, usize) {
        let mut buf = [0; MAX_SEGMENT_SIZE];
        let (_, len) = builder.build(payload, &mut buf).unwrap();
        (buf, len)
    }

    #[test]
    fn builds_segment() {
        let (buf, len) = build(
            RdpHeaderBuilder::new(SRC_CHANNEL, DST_CHANNEL, SEQUENCE).ack(ACKNOWLEDGEMENT),
            PAYLOAD,
        );

        assert_eq!(len, HEADER_LEN + PAYLOAD.len());
        assert_eq!(buf[0], 0x24);
        assert_eq!(buf[1], 16);
        assert_eq!(buf[2], SRC_CHANNEL);
        assert_eq!(buf[3], DST_CHANNEL);
        assert_eq!(&buf[4..6], &[0, PAYLOAD.len() as u8]);
        assert_eq!(&buf[6..10], &SEQUENCE.to_be_bytes());
        assert_eq!(&buf[10..14], &ACKNOWLEDGEMENT.to_be_bytes());
        assert_eq!(&buf[HEADER_LEN..len], PAYLOAD);
    }

    #[test]
    fn parses_segment() {
        let (buf, len) = build(
            RdpHeaderBuilder::new(SRC_CHANNEL, DST_CHANNEL, SEQUENCE).ack(ACKNOWLEDGEMENT),
            PAYLOAD,
        );

        let segment = Segment::parse(&buf[..len]).unwrap();
        assert_eq!(segment.header.src_channel, SRC_CHANNEL);
        assert_eq!(segment.header.dst_channel, DST_CHANNEL);
        assert_eq!(segment.header.seq, SEQUENCE);
        assert_eq!(segment.header.ack, ACKNOWLEDGEMENT);
        assert_eq!(segment.header.ctl, Control::new(false, true, false, false));
        assert_eq!(segment.header.data_len as usize, PAYLOAD.len());
        assert_eq!(segment.payload, PAYLOAD);
        assert_eq!(segment.len(), len);
    }

    #[test]
    fn ignores_trailing_bytes() {
        let (buf, len) = build(RdpHeaderBuilder::new(1, 2, 7).syn(), &[]);
        // The whole fixed-size buffer, garbage past the segment included
        let segment = Segment::parse(&buf).unwrap();
        assert_eq!(segment.len(), len);
        assert!(segment.is_empty());
        assert!(segment.header.ctl.syn());
    }

    #[test]
    fn rejects_short_header() {
        let (buf, _) = build(RdpHeaderBuilder::new(1, 2, 7).syn(), &[]);
        assert_eq!(
            Segment::parse(&buf[..HEADER_LEN - 1]),
            Err(ParseError::HeaderTooShort)
        );
        assert_eq!(Segment::parse(&[]), Err(ParseError::HeaderTooShort));
    }

    #[test]
    fn rejects_truncated_payload() {
        let (buf, len) = build(RdpHeaderBuilder::new(1, 2, 7).ack(3), PAYLOAD);
        assert_eq!(
            Segment::parse(&buf[..len - 1]),
            Err(ParseError::LengthMismatch {
                claimed: PAYLOAD.len() as u16,
                available: PAYLOAD.len() - 1,
            })
        );
    }

    #[test]
    fn rejects_payload_beyond_segment_size() {
        let (mut buf, _) = build(RdpHeaderBuilder::new(1, 2, 7).ack(3), PAYLOAD);
        let claimed = (MAX_PAYLOAD + 1) as u16;
        buf[4..6].copy_from_slice(&claimed.to_be_bytes());
        let mut big = [0; 2 * MAX_SEGMENT_SIZE];
        big[..MAX_SEGMENT_SIZE].copy_from_slice(&buf);
        assert_eq!(
            Segment::parse(&big),
            Err(ParseError::PayloadTooLong(claimed))
        );
    }

    #[test]
    fn rejects_corruption() {
        let (mut buf, len) = build(RdpHeaderBuilder::new(1, 2, 7).ack(3), PAYLOAD);
        buf[HEADER_LEN] ^= 0xff;
        assert!(matches!(
            Segment::parse(&buf[..len]),
            Err(ParseError::Checksum { .. })
        ));
    }

    #[test]
    fn rejects_foreign_version_and_header_length() {
        let (mut buf, len) = build(RdpHeaderBuilder::new(1, 2, 7).syn(), &[]);
        buf[0] = 0x10 | (buf[0] & 0x0f);
        assert_eq!(Segment::parse(&buf[..len]), Err(ParseError::Version(1)));

        let (mut buf, len) = build(RdpHeaderBuilder::new(1, 2, 7).syn(), &[]);
        buf[1] = 20;
        assert_eq!(Segment::parse(&buf[..len]), Err(ParseError::HeaderLength(20)));
    }

    #[test]
    fn rejects_invalid_flag_combinations() {
        let (buf, len) = build(RdpHeaderBuilder::new(1, 2, 7).nul().ack(1), &[]);
        assert!(matches!(
            Segment::parse(&buf[..len]),
            Err(ParseError::InvalidControl(_))
        ));

        let (buf, len) = build(RdpHeaderBuilder::new(1, 2, 7).syn().rst(), &[]);
        assert!(matches!(
            Segment::parse(&buf[..len]),
            Err(ParseError::InvalidControl(_))
        ));

        let (buf, len) = build(RdpHeaderBuilder::new(1, 2, 7).rst(), b"bye");
        assert!(matches!(
            Segment::parse(&buf[..len]),
            Err(ParseError::InvalidControl(_))
        ));
    }

    #[test]
    fn refuses_oversized_payload() {
        let mut buf = [0; MAX_SEGMENT_SIZE];
        let fits = [0xab; MAX_PAYLOAD];
        assert!(RdpHeaderBuilder::new(1, 2, 3).ack(0).build(&fits, &mut buf).is_ok());

        let too_long = [0xab; MAX_PAYLOAD + 1];
        assert_eq!(
            RdpHeaderBuilder::new(1, 2, 3)
                .ack(0)
                .build(&too_long, &mut buf)
                .unwrap_err(),
            BuildHeaderError::OverlyLongPayload
        );

        let mut small = [0; HEADER_LEN];
        assert_eq!(
            RdpHeaderBuilder::new(1, 2, 3)
                .ack(0)
                .build(b"x", &mut small)
                .unwrap_err(),
            BuildHeaderError::OverlyLongPayload
        );
    }

    #[test]
    fn control_works() {
        let control = Control::new(true, true, false, false);
        assert!(control.syn());
        assert!(control.ack());
        assert!(!control.rst());
        assert!(!control.nul());
        assert_eq!(format!("{control:?}"), "Control(SYN, ACK)");

        let control = {
            let mut control = Control::default();
            control.set_rst(true);
            control.set_ack(true);
            control.set_ack(false);
            control
        };
        assert!(!control.syn());
        assert!(!control.ack());
        assert!(control.rst());
        assert!(!control.nul());

        assert!(Control::new(false, false, false, true).is_valid(0));
        assert!(!Control::new(false, false, false, true).is_valid(1));
        assert!(Control::new(false, true, true, false).is_valid(0));
        assert!(Control::new(false, true, false, false).is_valid(MAX_PAYLOAD));
    }
}
