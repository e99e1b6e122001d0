//! # Frame Reassembler
//!
//! Turns a fragment header plus the datagrams that follow it into one raw
//! frame buffer. There are no sequence numbers: fragments are concatenated
//! in exactly the order they arrive.

use bytes::{Bytes, BytesMut};

use crate::datagram::Datagram;
use crate::error::TransportError;
use crate::keepalive::{AckKind, KeepAlive};
use crate::wire::{FragmentHeader, MAX_DATAGRAM_LEN};

/// Running totals over every frame reassembled by one reassembler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblyStats {
    /// Frames completed, empty ones included.
    pub frames: u64,
    /// Frames announced with a zero fragment count.
    pub empty_frames: u64,
    pub fragments: u64,
    pub bytes: u64,
}

pub struct FrameReassembler {
    max_datagram_len: usize,
    stats: ReassemblyStats,
}

impl FrameReassembler {
    pub fn new(max_datagram_len: usize) -> Self {
        FrameReassembler {
            max_datagram_len,
            stats: ReassemblyStats::default(),
        }
    }

    /// Read the fragments announced by `header` and return their
    /// concatenation.
    ///
    /// Exactly `header.count()` reads are issued and every fragment is
    /// acknowledged before the next read. The first failing read or
    /// acknowledgment aborts the frame and its partial data is dropped.
    pub fn reassemble(
        &mut self,
        transport: &mut dyn Datagram,
        keepalive: &mut KeepAlive,
        header: FragmentHeader,
    ) -> Result<Bytes, TransportError> {
        let frame = match header.count() {
            0 => {
                self.stats.empty_frames += 1;
                Bytes::new()
            }
            1 => {
                let payload = transport.recv(self.max_datagram_len)?;
                keepalive.acknowledge(transport, AckKind::Single)?;
                self.stats.fragments += 1;
                payload
            }
            n => {
                let mut buf = BytesMut::new();
                for _ in 0..n {
                    let fragment = transport.recv(self.max_datagram_len)?;
                    buf.extend_from_slice(&fragment);
                    keepalive.acknowledge(transport, AckKind::Fragment)?;
                    self.stats.fragments += 1;
                }
                buf.freeze()
            }
        };

        self.stats.frames += 1;
        self.stats.bytes += frame.len() as u64;
        Ok(frame)
    }

    pub fn stats(&self) -> ReassemblyStats {
        self.stats
    }
}

impl Default for FrameReassembler {
    fn default() -> Self {
        Self::new(MAX_DATAGRAM_LEN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::{ScriptStep, ScriptedDatagram};

    fn header(n: u64) -> FragmentHeader {
        FragmentHeader::new(n).unwrap()
    }

    #[test]
    fn empty_frame_reads_nothing() {
        let (mut transport, handle) = ScriptedDatagram::new();
        let mut keepalive = KeepAlive::new();
        let mut reassembler = FrameReassembler::default();

        let frame = reassembler
            .reassemble(&mut transport, &mut keepalive, header(0))
            .unwrap();
        assert!(frame.is_empty());
        assert_eq!(handle.reads(), 0);
        assert!(handle.sent().is_empty());
        assert_eq!(reassembler.stats().empty_frames, 1);
    }

    #[test]
    fn single_fragment_uses_single_ack() {
        let (mut transport, handle) = ScriptedDatagram::new();
        handle.push_datagram(vec![7u8; 100]);
        let mut keepalive = KeepAlive::new();
        let mut reassembler = FrameReassembler::default();

        let frame = reassembler
            .reassemble(&mut transport, &mut keepalive, header(1))
            .unwrap();
        assert_eq!(frame.len(), 100);
        assert_eq!(handle.reads(), 1);
        assert_eq!(keepalive.single_acks(), 1);
        assert_eq!(keepalive.fragment_acks(), 0);
    }

    #[test]
    fn multi_fragment_concatenates_in_arrival_order() {
        let (mut transport, handle) = ScriptedDatagram::new();
        handle
            .push_datagram(&b"cc"[..])
            .push_datagram(&b"a"[..])
            .push_datagram(&b"bbb"[..]);
        let mut keepalive = KeepAlive::new();
        let mut reassembler = FrameReassembler::default();

        let frame = reassembler
            .reassemble(&mut transport, &mut keepalive, header(3))
            .unwrap();
        assert_eq!(&frame[..], b"ccabbb");
        assert_eq!(handle.reads(), 3);
        assert_eq!(keepalive.fragment_acks(), 3);
        assert_eq!(handle.sent().len(), 3);

        let stats = reassembler.stats();
        assert_eq!(stats.frames, 1);
        assert_eq!(stats.fragments, 3);
        assert_eq!(stats.bytes, 6);
    }

    #[test]
    fn failure_mid_frame_aborts_without_further_reads() {
        let (mut transport, handle) = ScriptedDatagram::new();
        handle
            .push_datagram(&b"first"[..])
            .push(ScriptStep::Timeout)
            .push_datagram(&b"never read"[..]);
        let mut keepalive = KeepAlive::new();
        let mut reassembler = FrameReassembler::default();

        let err = reassembler
            .reassemble(&mut transport, &mut keepalive, header(3))
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(handle.reads(), 2);
        assert_eq!(keepalive.acks_sent(), 1);
        assert_eq!(handle.remaining(), 1);
        assert_eq!(reassembler.stats().frames, 0);
    }

    #[test]
    fn fragments_are_capped_at_max_datagram_len() {
        let (mut transport, handle) = ScriptedDatagram::new();
        handle.push_datagram(vec![1u8; 64]);
        let mut keepalive = KeepAlive::new();
        let mut reassembler = FrameReassembler::new(16);

        let frame = reassembler
            .reassemble(&mut transport, &mut keepalive, header(1))
            .unwrap();
        assert_eq!(frame.len(), 16);
    }
}
