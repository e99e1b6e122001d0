//! # Datagram Transport
//!
//! Thin wrapper over an unreliable, message-oriented socket. Every read is
//! bounded by [`TransportConfig::read_timeout`], which is also the worst-case
//! latency for a session to notice it has been asked to stop.

use bytes::Bytes;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::wire::{DEFAULT_READ_TIMEOUT, DEFAULT_RECV_BUFFER, MAX_DATAGRAM_LEN};

/// A bounded-wait, fire-and-forget datagram endpoint.
///
/// Implementations are owned by exactly one thread at a time.
pub trait Datagram: Send {
    /// Send one datagram to the peer. No delivery guarantee.
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Receive one datagram of at most `max_len` bytes, waiting no longer
    /// than the configured read timeout.
    fn recv(&mut self, max_len: usize) -> Result<Bytes, TransportError>;

    /// Best-effort teardown. Never fails; the handle is unusable afterwards.
    fn close(&mut self);

    /// Remote endpoint this handle talks to.
    fn peer(&self) -> SocketAddr;
}

/// Socket parameters applied by [`UdpDatagram::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Kernel receive buffer request (`SO_RCVBUF`).
    pub recv_buffer: usize,
    /// Upper bound on every blocking read.
    pub read_timeout: Duration,
    /// Largest fragment payload read in one call.
    pub max_datagram_len: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            recv_buffer: DEFAULT_RECV_BUFFER,
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_datagram_len: MAX_DATAGRAM_LEN,
        }
    }
}

// ─── UDP ─────────────────────────────────────────────────────────────────────

/// A connected UDP socket.
///
/// Connecting the socket filters out datagrams from other senders and lets
/// ICMP port-unreachable errors surface as [`TransportError::Closed`].
pub struct UdpDatagram {
    socket: UdpSocket,
    peer: SocketAddr,
    buf: Vec<u8>,
    closed: bool,
}

impl UdpDatagram {
    /// Bind an ephemeral local socket and connect it to `peer`.
    pub fn open(peer: SocketAddr, config: &TransportConfig) -> Result<Self, TransportError> {
        let local: SocketAddr = match peer {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local)?;
        set_recv_buffer(&socket, config.recv_buffer);
        // A zero timeout would mean "block forever" to std.
        socket.set_read_timeout(Some(config.read_timeout.max(Duration::from_millis(1))))?;
        socket.connect(peer)?;

        debug!(%peer, local = ?socket.local_addr().ok(), "datagram socket open");

        Ok(UdpDatagram {
            socket,
            peer,
            buf: vec![0u8; config.max_datagram_len.max(1)],
            closed: false,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }
}

impl Datagram for UdpDatagram {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.socket
            .send(payload)
            .map(|_| ())
            .map_err(TransportError::from_io)
    }

    fn recv(&mut self, max_len: usize) -> Result<Bytes, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if self.buf.len() < max_len {
            self.buf.resize(max_len, 0);
        }
        let n = self
            .socket
            .recv(&mut self.buf[..max_len])
            .map_err(TransportError::from_io)?;
        Ok(Bytes::copy_from_slice(&self.buf[..n]))
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        shutdown_both(&self.socket);
        debug!(peer = %self.peer, "datagram socket closed");
    }

    fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Drop for UdpDatagram {
    fn drop(&mut self) {
        self.close();
    }
}

// ─── Socket options ─────────────────────────────────────────────────────────

#[cfg(unix)]
fn set_recv_buffer(socket: &UdpSocket, bytes: usize) {
    use std::os::unix::io::AsRawFd;
    let fd = socket.as_raw_fd();
    let size = bytes.min(libc::c_int::MAX as usize) as libc::c_int;
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_RCVBUF,
            &size as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret != 0 {
        warn!(
            requested = bytes,
            error = %std::io::Error::last_os_error(),
            "SO_RCVBUF failed"
        );
    }
}

#[cfg(not(unix))]
fn set_recv_buffer(_socket: &UdpSocket, bytes: usize) {
    debug!(requested = bytes, "SO_RCVBUF not supported on this platform");
}

#[cfg(unix)]
fn shutdown_both(socket: &UdpSocket) {
    use std::os::unix::io::AsRawFd;
    let ret = unsafe { libc::shutdown(socket.as_raw_fd(), libc::SHUT_RDWR) };
    if ret != 0 {
        // Routinely ENOTCONN for UDP; teardown proceeds regardless.
        debug!(error = %std::io::Error::last_os_error(), "socket shutdown failed");
    }
}

#[cfg(not(unix))]
fn shutdown_both(_socket: &UdpSocket) {}
