use std::io;

use thiserror::Error;

// ── Errors ──────────────────────────────────────────────────────────

/// Failure kinds surfaced by a [`Datagram`](crate::Datagram) and the layers
/// built on it. Every one of them ends the current connection attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Nothing arrived within the configured wait bound.
    #[error("no datagram within the read timeout")]
    Timeout,
    /// The peer or the local handle is gone.
    #[error("transport closed")]
    Closed,
    /// A fragment header datagram carried fewer than the required bytes.
    #[error("short fragment header: got {len} bytes")]
    ShortHeader { len: usize },
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Map a socket error onto the transport's error kinds.
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => TransportError::Timeout,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe => TransportError::Closed,
            _ => TransportError::Io(err),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout)
    }

    /// True when the peer explicitly went away, as opposed to going quiet.
    pub fn is_link_lost(&self) -> bool {
        matches!(self, TransportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn would_block_maps_to_timeout() {
        let err = TransportError::from_io(io::Error::from(io::ErrorKind::WouldBlock));
        assert!(err.is_timeout());
        let err = TransportError::from_io(io::Error::from(io::ErrorKind::TimedOut));
        assert!(err.is_timeout());
    }

    #[test]
    fn refused_maps_to_closed() {
        let err = TransportError::from_io(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert!(err.is_link_lost());
        assert!(!err.is_timeout());
    }

    #[test]
    fn other_errors_stay_io() {
        let err = TransportError::from_io(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, TransportError::Io(_)));
    }
}
