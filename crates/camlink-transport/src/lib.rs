//! # camlink-transport
//!
//! Datagram plumbing for the camlink frame streaming client.
//!
//! The camera server speaks a tiny positional protocol over UDP: the client
//! sends `connect`, the server answers with a 5-byte fragment count followed
//! by that many payload datagrams, and the client acknowledges every payload
//! with `ping`. This crate owns everything below the session state machine.
//!
//! ## Crate structure
//!
//! - [`wire`] — Protocol constants, fragment header, control messages
//! - [`datagram`] — Bounded-wait datagram transport (trait + UDP)
//! - [`scripted`] — In-memory transport driven by a receive script
//! - [`keepalive`] — Handshake and per-fragment acknowledgments
//! - [`reassembler`] — Fragment-count driven frame reassembly
//! - [`error`] — Transport error kinds

pub mod datagram;
pub mod error;
pub mod keepalive;
pub mod reassembler;
pub mod scripted;
pub mod wire;

pub use datagram::{Datagram, TransportConfig, UdpDatagram};
pub use error::TransportError;
pub use keepalive::{AckKind, KeepAlive};
pub use reassembler::{FrameReassembler, ReassemblyStats};
pub use wire::{ControlMessage, FragmentHeader};
