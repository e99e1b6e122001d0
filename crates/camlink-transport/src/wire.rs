//! # Camlink Wire Format
//!
//! Positional framing, no sequence numbers:
//!
//! ```text
//!  client                                   server
//!    │ ── "connect" ─────────────────────────▶ │
//!    │ ◀──────────────── fragment count (5B) ── │
//!    │ ◀──────────────────────── fragment #1 ── │
//!    │ ── "ping" ────────────────────────────▶ │
//!    │ ◀──────────────────────── fragment #n ── │
//!    │ ── "ping" ────────────────────────────▶ │
//! ```
//!
//! The fragment count is an unsigned big-endian integer, 5 bytes wide.

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use std::time::Duration;

use crate::error::TransportError;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Handshake datagram sent once per connection attempt.
pub const CONNECT: &[u8] = b"connect";

/// Acknowledgment datagram sent after every received fragment.
pub const PING: &[u8] = b"ping";

/// Width of the fragment-count header.
pub const FRAGMENT_HEADER_LEN: usize = 5;

/// Largest fragment payload the client will read in one call.
pub const MAX_DATAGRAM_LEN: usize = 65536;

/// Requested kernel receive buffer.
pub const DEFAULT_RECV_BUFFER: usize = 65536;

/// Upper bound on every blocking read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(500);

// ─── Fragment Header ─────────────────────────────────────────────────────────

/// Number of fragments composing the next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FragmentHeader(u64);

impl FragmentHeader {
    /// Largest count a 40-bit header can carry.
    pub const MAX: u64 = (1 << 40) - 1;

    /// Create a header, returning `None` if `count` does not fit in 5 bytes.
    pub fn new(count: u64) -> Option<Self> {
        (count <= Self::MAX).then_some(FragmentHeader(count))
    }

    #[inline]
    pub fn count(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn is_single(self) -> bool {
        self.0 == 1
    }

    /// Parse a header datagram.
    ///
    /// The datagram must carry at least [`FRAGMENT_HEADER_LEN`] bytes; only
    /// the first five are significant.
    pub fn decode(buf: &[u8]) -> Result<Self, TransportError> {
        if buf.len() < FRAGMENT_HEADER_LEN {
            return Err(TransportError::ShortHeader { len: buf.len() });
        }
        let count = buf[..FRAGMENT_HEADER_LEN]
            .iter()
            .fold(0u64, |acc, &b| (acc << 8) | b as u64);
        Ok(FragmentHeader(count))
    }

    /// Encode into the 5-byte wire form.
    pub fn encode(self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FRAGMENT_HEADER_LEN);
        buf.put_uint(self.0, FRAGMENT_HEADER_LEN);
        buf.freeze()
    }
}

impl fmt::Display for FragmentHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fragment(s)", self.0)
    }
}

// ─── Control Messages ───────────────────────────────────────────────────────

/// Client-to-server datagrams. The protocol has no others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    Connect,
    Ping,
}

impl ControlMessage {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            ControlMessage::Connect => CONNECT,
            ControlMessage::Ping => PING,
        }
    }

    /// Recognise a control datagram (server side and tests).
    pub fn parse(buf: &[u8]) -> Option<Self> {
        match buf {
            CONNECT => Some(ControlMessage::Connect),
            PING => Some(ControlMessage::Ping),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_single_fragment_header() {
        let header = FragmentHeader::decode(&[0, 0, 0, 0, 1]).unwrap();
        assert!(header.is_single());
        assert_eq!(header.count(), 1);
    }

    #[test]
    fn decode_is_big_endian() {
        let header = FragmentHeader::decode(&[0x01, 0x02, 0x03, 0x04, 0x05]).unwrap();
        assert_eq!(header.count(), 0x01_0203_0405);
    }

    #[test]
    fn decode_zero_is_empty() {
        let header = FragmentHeader::decode(&[0; 5]).unwrap();
        assert!(header.is_empty());
    }

    #[test]
    fn decode_rejects_short_datagram() {
        let err = FragmentHeader::decode(&[0, 0, 3]).unwrap_err();
        assert!(matches!(err, TransportError::ShortHeader { len: 3 }));
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        let header = FragmentHeader::decode(&[0, 0, 0, 0, 3, 0xff]).unwrap();
        assert_eq!(header.count(), 3);
    }

    #[test]
    fn encode_matches_wire_layout() {
        let header = FragmentHeader::new(3).unwrap();
        assert_eq!(&header.encode()[..], &[0, 0, 0, 0, 3]);

        let max = FragmentHeader::new(FragmentHeader::MAX).unwrap();
        assert_eq!(&max.encode()[..], &[0xff; 5]);
    }

    #[test]
    fn new_rejects_values_above_40_bits() {
        assert!(FragmentHeader::new(FragmentHeader::MAX + 1).is_none());
    }

    #[test]
    fn control_messages_are_literal() {
        assert_eq!(ControlMessage::Connect.as_bytes(), b"connect");
        assert_eq!(ControlMessage::Ping.as_bytes(), b"ping");
        assert_eq!(ControlMessage::parse(b"ping"), Some(ControlMessage::Ping));
        assert_eq!(ControlMessage::parse(b"connect"), Some(ControlMessage::Connect));
        assert_eq!(ControlMessage::parse(b"pong"), None);
    }
}
