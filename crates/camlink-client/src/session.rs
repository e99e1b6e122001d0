//! # Streaming Session
//!
//! Owns one connection attempt at a time and the worker thread that drives
//! it. The state machine is:
//!
//! ```text
//!   Idle ──start──▶ Connecting ──connect sent──▶ Connected ──link lost──▶ Disconnected
//!    ▲                  │                           │  │                      │
//!    └──── open fails ──┘                    stop ──┘  └── disconnect ──▶ ────┤
//!    └───────────────────────────── start (reaps the old worker) ────────────┘
//! ```
//!
//! The worker checks a shared run flag once per iteration. Whoever moves the
//! flag off `ACTIVE` first (the worker on link loss, or the controller on
//! `stop`/`disconnect`) owns the exit, so exactly one party decides whether
//! the sink hears `on_connection_changed(false)`.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use camlink_transport::wire::FRAGMENT_HEADER_LEN;
use camlink_transport::{
    Datagram, FragmentHeader, FrameReassembler, KeepAlive, TransportConfig, TransportError,
    UdpDatagram,
};
use tracing::{debug, info, trace, warn};

use crate::codec::FrameCodec;
use crate::config::{ClientConfig, Endpoint, SessionConfig};
use crate::error::SessionError;
use crate::sink::FrameSink;

// ─── Connection State ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// No socket, no worker.
    Idle = 0,
    /// Socket being opened and handshake sent.
    Connecting = 1,
    /// Receive loop running.
    Connected = 2,
    /// Loop ended by link loss or a manual disconnect.
    Disconnected = 3,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Disconnected,
            _ => ConnectionState::Idle,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        };
        f.write_str(s)
    }
}

// Run flag values.
const RUN_ACTIVE: u8 = 0;
const RUN_CANCELLED: u8 = 1;
const RUN_LINK_LOST: u8 = 2;

// ─── Stats ──────────────────────────────────────────────────────────────────

/// Counters for the current connection attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_delivered: u64,
    /// Frames the codec rejected.
    pub frames_dropped: u64,
    pub empty_frames: u64,
    pub fragments: u64,
    pub bytes: u64,
    pub acks_sent: u64,
    /// Header timeouts absorbed by the timeout allowance.
    pub timeouts_tolerated: u64,
}

// ─── Connector ──────────────────────────────────────────────────────────────

/// Opens the transport for one connection attempt.
pub trait Connector: Send + Sync {
    fn open(
        &self,
        endpoint: &Endpoint,
        config: &TransportConfig,
    ) -> Result<Box<dyn Datagram>, TransportError>;
}

/// Opens real UDP sockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct UdpConnector;

impl Connector for UdpConnector {
    fn open(
        &self,
        endpoint: &Endpoint,
        config: &TransportConfig,
    ) -> Result<Box<dyn Datagram>, TransportError> {
        Ok(Box::new(UdpDatagram::open(endpoint.addr(), config)?))
    }
}

// ─── Session ────────────────────────────────────────────────────────────────

struct Shared {
    state: AtomicU8,
    stats: Mutex<SessionStats>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }
}

/// Client side of one camera feed.
pub struct StreamingSession {
    config: ClientConfig,
    codec: Arc<dyn FrameCodec>,
    sink: Arc<dyn FrameSink>,
    connector: Arc<dyn Connector>,
    shared: Arc<Shared>,
    /// Run flag of the current attempt; fresh per `start`.
    run: Option<Arc<AtomicU8>>,
    endpoint: Option<Endpoint>,
    worker: Option<thread::JoinHandle<()>>,
}

impl StreamingSession {
    pub fn new(config: ClientConfig, codec: Arc<dyn FrameCodec>, sink: Arc<dyn FrameSink>) -> Self {
        Self::with_connector(config, codec, sink, Arc::new(UdpConnector))
    }

    pub fn with_connector(
        config: ClientConfig,
        codec: Arc<dyn FrameCodec>,
        sink: Arc<dyn FrameSink>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        StreamingSession {
            config,
            codec,
            sink,
            connector,
            shared: Arc::new(Shared {
                state: AtomicU8::new(ConnectionState::Idle as u8),
                stats: Mutex::new(SessionStats::default()),
            }),
            run: None,
            endpoint: None,
            worker: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Endpoint of the current or most recent attempt.
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn stats(&self) -> SessionStats {
        *self.shared.stats.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Validate `host`/`port` as typed by the operator and start streaming.
    pub fn start(&mut self, host: &str, port: &str) -> Result<(), SessionError> {
        self.reap();
        if self.state() != ConnectionState::Idle {
            return Err(SessionError::AlreadyRunning);
        }
        let endpoint = Endpoint::parse(host, port)?;
        self.start_endpoint(endpoint)
    }

    /// Start streaming from an already validated endpoint.
    pub fn start_endpoint(&mut self, endpoint: Endpoint) -> Result<(), SessionError> {
        self.reap();
        if self.state() != ConnectionState::Idle {
            return Err(SessionError::AlreadyRunning);
        }

        info!(%endpoint, "socket client connecting");
        self.shared.set_state(ConnectionState::Connecting);

        let mut transport = match self.connector.open(&endpoint, &self.config.transport) {
            Ok(t) => t,
            Err(e) => {
                self.shared.set_state(ConnectionState::Idle);
                return Err(e.into());
            }
        };

        let mut keepalive = KeepAlive::new();
        if let Err(e) = keepalive.handshake(transport.as_mut()) {
            transport.close();
            self.shared.set_state(ConnectionState::Idle);
            return Err(e.into());
        }

        *self.shared.stats.lock().unwrap_or_else(|e| e.into_inner()) = SessionStats::default();
        let run = Arc::new(AtomicU8::new(RUN_ACTIVE));
        self.shared.set_state(ConnectionState::Connected);
        self.sink.on_connection_changed(true);

        let worker = Worker {
            transport,
            keepalive,
            reassembler: FrameReassembler::new(self.config.transport.max_datagram_len),
            codec: self.codec.clone(),
            sink: self.sink.clone(),
            shared: self.shared.clone(),
            run: run.clone(),
            config: self.config.session.clone(),
        };

        let handle = thread::Builder::new()
            .name(format!("camlink-rx-{}", endpoint.port()))
            .spawn(move || worker.drive());

        match handle {
            Ok(handle) => {
                self.worker = Some(handle);
                self.run = Some(run);
                self.endpoint = Some(endpoint);
                Ok(())
            }
            Err(e) => {
                // The closure, and with it the transport, was dropped.
                self.shared.set_state(ConnectionState::Idle);
                self.sink.on_connection_changed(false);
                Err(SessionError::Spawn(e))
            }
        }
    }

    /// Tear down without notifying the sink. Valid from any state.
    ///
    /// Blocks until the worker has exited, which can take up to one read
    /// timeout if it is parked in a receive.
    pub fn stop(&mut self) {
        if let Some(run) = &self.run {
            let _ = run.compare_exchange(RUN_ACTIVE, RUN_CANCELLED, Ordering::SeqCst, Ordering::SeqCst);
        }
        self.join_worker();
        self.run = None;
        self.shared.set_state(ConnectionState::Idle);
    }

    /// Operator-initiated disconnect of a running stream.
    ///
    /// Emits exactly one `on_connection_changed(false)` unless the worker
    /// already reported link loss. Returns `false` when not connected.
    pub fn disconnect(&mut self) -> bool {
        if self.state() != ConnectionState::Connected {
            return false;
        }
        let claimed = self.run.as_ref().is_some_and(|run| {
            run.compare_exchange(RUN_ACTIVE, RUN_CANCELLED, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        });
        self.join_worker();
        self.run = None;
        self.shared.set_state(ConnectionState::Disconnected);
        if claimed {
            info!(endpoint = ?self.endpoint.as_ref().map(ToString::to_string), "disconnected by user");
            self.sink.on_connection_changed(false);
        }
        true
    }

    /// Connect if not connected, otherwise disconnect. Returns whether the
    /// session is streaming afterwards.
    pub fn toggle(&mut self, host: &str, port: &str) -> Result<bool, SessionError> {
        if self.is_connected() {
            self.disconnect();
            Ok(false)
        } else {
            self.start(host, port)?;
            Ok(true)
        }
    }

    /// Return a session whose last attempt ended to `Idle`.
    fn reap(&mut self) {
        if self.state() == ConnectionState::Disconnected {
            self.join_worker();
            self.run = None;
            self.shared.set_state(ConnectionState::Idle);
        }
    }

    fn join_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("receive worker panicked");
            }
        }
    }
}

impl Drop for StreamingSession {
    fn drop(&mut self) {
        self.stop();
    }
}

// ─── Worker ─────────────────────────────────────────────────────────────────

struct Worker {
    transport: Box<dyn Datagram>,
    keepalive: KeepAlive,
    reassembler: FrameReassembler,
    codec: Arc<dyn FrameCodec>,
    sink: Arc<dyn FrameSink>,
    shared: Arc<Shared>,
    run: Arc<AtomicU8>,
    config: SessionConfig,
}

impl Worker {
    fn active(&self) -> bool {
        self.run.load(Ordering::SeqCst) == RUN_ACTIVE
    }

    fn drive(mut self) {
        let peer = self.transport.peer();
        let failure = self.receive_loop();

        match failure {
            Some(err) => {
                // Leave `Connected` before the socket goes away.
                let claimed = self
                    .run
                    .compare_exchange(RUN_ACTIVE, RUN_LINK_LOST, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok();
                if claimed {
                    self.shared.set_state(ConnectionState::Disconnected);
                }
                self.transport.close();
                if claimed {
                    info!(%peer, error = %err, "link lost");
                    self.sink.on_connection_changed(false);
                } else {
                    debug!(%peer, error = %err, "transport failure after stop request");
                }
            }
            None => {
                self.transport.close();
                info!(%peer, "disconnected socket");
            }
        }
    }

    /// Runs until cancelled (`None`) or the transport fails (`Some`).
    fn receive_loop(&mut self) -> Option<TransportError> {
        let mut consecutive_timeouts = 0u32;

        while self.active() {
            let header = match self
                .transport
                .recv(FRAGMENT_HEADER_LEN)
                .and_then(|buf| FragmentHeader::decode(&buf))
            {
                Ok(header) => {
                    consecutive_timeouts = 0;
                    trace!(%header, "frame header");
                    header
                }
                Err(TransportError::Timeout) => {
                    consecutive_timeouts = consecutive_timeouts.saturating_add(1);
                    if consecutive_timeouts < self.config.max_consecutive_timeouts {
                        debug!(consecutive_timeouts, "socket timed out, waiting");
                        self.update_stats(|s| s.timeouts_tolerated += 1);
                        continue;
                    }
                    debug!(consecutive_timeouts, "socket timed out");
                    return Some(TransportError::Timeout);
                }
                Err(e) => return Some(e),
            };

            let raw = match self.reassembler.reassemble(
                self.transport.as_mut(),
                &mut self.keepalive,
                header,
            ) {
                Ok(raw) => raw,
                Err(e) => return Some(e),
            };

            if !self.active() {
                break;
            }

            let decoded = self.codec.decode(&raw);
            let totals = self.reassembler.stats();
            let acks = self.keepalive.acks_sent();
            self.update_stats(|s| {
                s.fragments = totals.fragments;
                s.bytes = totals.bytes;
                s.empty_frames = totals.empty_frames;
                s.acks_sent = acks;
            });

            match decoded {
                Ok(frame) => {
                    self.update_stats(|s| s.frames_delivered += 1);
                    self.sink.on_frame(frame);
                }
                Err(e) => {
                    debug!(len = raw.len(), error = %e, "frame dropped");
                    self.update_stats(|s| s.frames_dropped += 1);
                }
            }
        }
        None
    }

    fn update_stats(&self, f: impl FnOnce(&mut SessionStats)) {
        let mut stats = self.shared.stats.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut stats);
    }
}
