//! Property-based tests for fragment reassembly.
//!
//! Frames are fed through a scripted transport so read and acknowledgment
//! counts can be observed exactly.

use bytes::Bytes;
use camlink_transport::scripted::ScriptedDatagram;
use camlink_transport::{FragmentHeader, FrameReassembler, KeepAlive};
use proptest::prelude::*;

/// Between zero and a dozen fragments of up to 2 KiB each.
fn fragments() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(any::<u8>(), 0..2048), 0..12)
}

fn run(fragments: &[Vec<u8>]) -> (Bytes, usize, Vec<Bytes>, KeepAlive) {
    let (mut transport, handle) = ScriptedDatagram::new();
    for fragment in fragments {
        handle.push_datagram(fragment.clone());
    }
    let header = FragmentHeader::new(fragments.len() as u64).unwrap();
    let mut keepalive = KeepAlive::new();
    let mut reassembler = FrameReassembler::default();
    let frame = reassembler
        .reassemble(&mut transport, &mut keepalive, header)
        .unwrap();
    (frame, handle.reads(), handle.sent(), keepalive)
}

proptest! {
    #[test]
    fn reads_and_acks_match_fragment_count(frags in fragments()) {
        let (_frame, reads, sent, keepalive) = run(&frags);
        prop_assert_eq!(reads, frags.len());
        prop_assert_eq!(sent.len(), frags.len());
        prop_assert!(sent.iter().all(|d| &d[..] == b"ping"));
        prop_assert_eq!(keepalive.acks_sent(), frags.len() as u64);
        if frags.len() == 1 {
            prop_assert_eq!(keepalive.single_acks(), 1);
        } else {
            prop_assert_eq!(keepalive.single_acks(), 0);
        }
    }

    #[test]
    fn frame_is_concatenation_in_receipt_order(frags in fragments()) {
        let (frame, _, _, _) = run(&frags);
        let expected: Vec<u8> = frags.concat();
        prop_assert_eq!(frame.len(), frags.iter().map(Vec::len).sum::<usize>());
        prop_assert_eq!(&frame[..], &expected[..]);
    }

    #[test]
    fn reordering_fragments_changes_the_frame(
        a in prop::collection::vec(any::<u8>(), 1..256),
        b in prop::collection::vec(any::<u8>(), 1..256),
    ) {
        prop_assume!([a.clone(), b.clone()].concat() != [b.clone(), a.clone()].concat());
        let (forward, _, _, _) = run(&[a.clone(), b.clone()]);
        let (reversed, _, _, _) = run(&[b, a]);
        prop_assert_ne!(forward, reversed);
    }
}

#[test]
fn zero_fragment_header_sends_nothing() {
    let (frame, reads, sent, keepalive) = run(&[]);
    assert!(frame.is_empty());
    assert_eq!(reads, 0);
    assert!(sent.is_empty());
    assert_eq!(keepalive.acks_sent(), 0);
}
