//! In-memory [`Datagram`] for exercising the protocol layers without a
//! network.
//!
//! A [`ScriptedDatagram`] replays a queue of receive results and records
//! everything sent through it. Cloning a [`ScriptHandle`] lets a test keep
//! observing the transport after ownership has moved to a worker thread.

use bytes::Bytes;
use std::collections::VecDeque;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::datagram::Datagram;
use crate::error::TransportError;
use crate::wire::FragmentHeader;

/// One scripted outcome of a `recv` call.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Datagram(Bytes),
    Timeout,
    Closed,
}

#[derive(Debug, Default)]
struct ScriptState {
    steps: VecDeque<ScriptStep>,
    sent: Vec<Bytes>,
    reads: usize,
    closed: bool,
}

/// Shared view of a scripted transport's script and recorded traffic.
#[derive(Debug, Clone, Default)]
pub struct ScriptHandle {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptHandle {
    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, step: ScriptStep) -> &Self {
        self.lock().steps.push_back(step);
        self
    }

    pub fn push_datagram(&self, payload: impl Into<Bytes>) -> &Self {
        self.push(ScriptStep::Datagram(payload.into()))
    }

    /// Queue a fragment header followed by the given fragments.
    pub fn push_frame<I, B>(&self, fragments: I) -> &Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let fragments: Vec<Bytes> = fragments.into_iter().map(Into::into).collect();
        let header = FragmentHeader::new(fragments.len() as u64)
            .unwrap_or_else(|| panic!("too many fragments: {}", fragments.len()));
        self.push_datagram(header.encode());
        for fragment in fragments {
            self.push_datagram(fragment);
        }
        self
    }

    /// Datagrams sent so far, in order.
    pub fn sent(&self) -> Vec<Bytes> {
        self.lock().sent.clone()
    }

    /// Number of `recv` calls served so far.
    pub fn reads(&self) -> usize {
        self.lock().reads
    }

    pub fn remaining(&self) -> usize {
        self.lock().steps.len()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// A [`Datagram`] whose receives come from a script.
///
/// When the script runs dry, `recv` sleeps for `idle_wait` and reports a
/// timeout, mimicking a quiet peer.
#[derive(Debug)]
pub struct ScriptedDatagram {
    handle: ScriptHandle,
    peer: SocketAddr,
    idle_wait: Duration,
}

impl ScriptedDatagram {
    pub fn new() -> (Self, ScriptHandle) {
        let handle = ScriptHandle::default();
        let transport = ScriptedDatagram {
            handle: handle.clone(),
            peer: (Ipv4Addr::LOCALHOST, 9999).into(),
            idle_wait: Duration::from_millis(10),
        };
        (transport, handle)
    }

    /// Attach to an existing script. The new transport starts open even if
    /// an earlier one on the same script was closed.
    pub fn from_handle(handle: ScriptHandle) -> Self {
        handle.lock().closed = false;
        ScriptedDatagram {
            handle,
            peer: (Ipv4Addr::LOCALHOST, 9999).into(),
            idle_wait: Duration::from_millis(10),
        }
    }

    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = peer;
        self
    }

    pub fn with_idle_wait(mut self, wait: Duration) -> Self {
        self.idle_wait = wait;
        self
    }
}

impl Datagram for ScriptedDatagram {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let mut state = self.handle.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        state.sent.push(Bytes::copy_from_slice(payload));
        Ok(())
    }

    fn recv(&mut self, max_len: usize) -> Result<Bytes, TransportError> {
        let step = {
            let mut state = self.handle.lock();
            if state.closed {
                return Err(TransportError::Closed);
            }
            state.reads += 1;
            state.steps.pop_front()
        };
        match step {
            Some(ScriptStep::Datagram(mut payload)) => {
                payload.truncate(max_len);
                Ok(payload)
            }
            Some(ScriptStep::Timeout) => Err(TransportError::Timeout),
            Some(ScriptStep::Closed) => Err(TransportError::Closed),
            None => {
                thread::sleep(self.idle_wait);
                Err(TransportError::Timeout)
            }
        }
    }

    fn close(&mut self) {
        self.handle.lock().closed = true;
    }

    fn peer(&self) -> SocketAddr {
        self.peer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_script_in_order() {
        let (mut transport, handle) = ScriptedDatagram::new();
        handle.push_datagram(&b"a"[..]).push(ScriptStep::Closed);

        assert_eq!(&transport.recv(16).unwrap()[..], b"a");
        assert!(transport.recv(16).unwrap_err().is_link_lost());
        assert_eq!(handle.reads(), 2);
    }

    #[test]
    fn empty_script_times_out() {
        let (transport, _handle) = ScriptedDatagram::new();
        let mut transport = transport.with_idle_wait(Duration::from_millis(1));
        assert!(transport.recv(16).unwrap_err().is_timeout());
    }

    #[test]
    fn push_frame_prefixes_header() {
        let (mut transport, handle) = ScriptedDatagram::new();
        handle.push_frame([&b"xy"[..], &b"z"[..]]);
        assert_eq!(&transport.recv(5).unwrap()[..], &[0, 0, 0, 0, 2]);
        assert_eq!(handle.remaining(), 2);
    }

    #[test]
    fn records_sends_and_close() {
        let (mut transport, handle) = ScriptedDatagram::new();
        transport.send(b"connect").unwrap();
        transport.close();
        assert!(transport.send(b"ping").is_err());
        assert_eq!(handle.sent(), vec![Bytes::from_static(b"connect")]);
        assert!(handle.is_closed());
    }
}
