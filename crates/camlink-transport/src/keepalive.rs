//! # Keep-Alive Driver
//!
//! The server only keeps emitting while it hears from the client: one
//! `connect` per connection attempt, then one `ping` per received fragment.

use tracing::trace;

use crate::datagram::Datagram;
use crate::error::TransportError;
use crate::wire::ControlMessage;

/// Which acknowledgment a `ping` stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckKind {
    /// The frame was exactly one fragment.
    Single,
    /// One fragment of a multi-fragment frame.
    Fragment,
}

/// Sends the handshake and acknowledgments, counting what went out.
#[derive(Debug, Default, Clone)]
pub struct KeepAlive {
    handshakes: u64,
    single_acks: u64,
    fragment_acks: u64,
}

impl KeepAlive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the server to start streaming.
    pub fn handshake(&mut self, transport: &mut dyn Datagram) -> Result<(), TransportError> {
        transport.send(ControlMessage::Connect.as_bytes())?;
        self.handshakes += 1;
        trace!(peer = %transport.peer(), "connect sent");
        Ok(())
    }

    /// Acknowledge one received datagram.
    pub fn acknowledge(
        &mut self,
        transport: &mut dyn Datagram,
        kind: AckKind,
    ) -> Result<(), TransportError> {
        transport.send(ControlMessage::Ping.as_bytes())?;
        match kind {
            AckKind::Single => self.single_acks += 1,
            AckKind::Fragment => self.fragment_acks += 1,
        }
        Ok(())
    }

    pub fn handshakes(&self) -> u64 {
        self.handshakes
    }

    /// Total `ping`s sent, of either kind.
    pub fn acks_sent(&self) -> u64 {
        self.single_acks + self.fragment_acks
    }

    pub fn single_acks(&self) -> u64 {
        self.single_acks
    }

    pub fn fragment_acks(&self) -> u64 {
        self.fragment_acks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedDatagram;
    use bytes::Bytes;

    #[test]
    fn handshake_sends_connect() {
        let (mut transport, handle) = ScriptedDatagram::new();
        let mut keepalive = KeepAlive::new();
        keepalive.handshake(&mut transport).unwrap();
        assert_eq!(handle.sent(), vec![Bytes::from_static(b"connect")]);
        assert_eq!(keepalive.handshakes(), 1);
        assert_eq!(keepalive.acks_sent(), 0);
    }

    #[test]
    fn acknowledgments_send_ping_and_count_by_kind() {
        let (mut transport, handle) = ScriptedDatagram::new();
        let mut keepalive = KeepAlive::new();
        keepalive.acknowledge(&mut transport, AckKind::Single).unwrap();
        keepalive.acknowledge(&mut transport, AckKind::Fragment).unwrap();
        keepalive.acknowledge(&mut transport, AckKind::Fragment).unwrap();

        assert!(handle.sent().iter().all(|d| &d[..] == b"ping"));
        assert_eq!(keepalive.single_acks(), 1);
        assert_eq!(keepalive.fragment_acks(), 2);
        assert_eq!(keepalive.acks_sent(), 3);
    }

    #[test]
    fn failed_send_is_not_counted() {
        let (mut transport, _handle) = ScriptedDatagram::new();
        transport.close();
        let mut keepalive = KeepAlive::new();
        assert!(keepalive.handshake(&mut transport).is_err());
        assert!(keepalive.acknowledge(&mut transport, AckKind::Single).is_err());
        assert_eq!(keepalive.handshakes(), 0);
        assert_eq!(keepalive.acks_sent(), 0);
    }
}
