//! # camlink-client
//!
//! Ground-station side of the camlink video feed: connects to a camera's
//! frame server, reassembles and decodes frames on a dedicated worker, and
//! hands them to a [`FrameSink`] without ever blocking the caller.
//!
//! - [`session`] — Connection state machine and receive worker
//! - [`sink`] — Non-blocking frame/connection hand-off
//! - [`codec`] — Opaque frame decoding (JPEG)
//! - [`config`] — TOML configuration and endpoint validation
//! - [`control`] — Camera catalog and control-plane camera selection

pub mod codec;
pub mod config;
pub mod control;
pub mod error;
pub mod session;
pub mod sink;

pub use codec::{DecodeError, DecodedFrame, FrameCodec, JpegCodec, PixelLayout};
pub use config::{ClientConfig, Endpoint};
pub use error::SessionError;
pub use session::{ConnectionState, Connector, SessionStats, StreamingSession, UdpConnector};
pub use sink::{ChannelSink, FrameSink, SinkReceiver};
