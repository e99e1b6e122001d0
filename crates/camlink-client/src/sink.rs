//! # Frame Sink
//!
//! Where the receive worker hands its output. Calls arrive on the worker
//! thread and must return immediately; presentation happens elsewhere.

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::codec::DecodedFrame;

/// Consumer of session output. Implementations must not block.
pub trait FrameSink: Send + Sync {
    fn on_frame(&self, frame: DecodedFrame);
    fn on_connection_changed(&self, connected: bool);
}

/// A [`FrameSink`] that forwards everything over crossbeam channels.
///
/// Frames go through a bounded queue that evicts the oldest frame when
/// full, so a slow renderer sees the newest picture rather than a backlog.
/// Connection changes use an unbounded queue and are never dropped.
pub struct ChannelSink {
    frame_tx: Sender<DecodedFrame>,
    /// Held so a full queue can be trimmed from the producer side.
    frame_evict: Receiver<DecodedFrame>,
    state_tx: Sender<bool>,
    dropped: Arc<AtomicU64>,
}

/// Consumer half of a [`ChannelSink`].
pub struct SinkReceiver {
    frame_rx: Receiver<DecodedFrame>,
    state_rx: Receiver<bool>,
    dropped: Arc<AtomicU64>,
}

impl ChannelSink {
    pub fn new(frame_capacity: usize) -> (Self, SinkReceiver) {
        let (frame_tx, frame_rx) = bounded(frame_capacity.max(1));
        let (state_tx, state_rx) = unbounded();
        let dropped = Arc::new(AtomicU64::new(0));
        let sink = ChannelSink {
            frame_tx,
            frame_evict: frame_rx.clone(),
            state_tx,
            dropped: dropped.clone(),
        };
        let receiver = SinkReceiver {
            frame_rx,
            state_rx,
            dropped,
        };
        (sink, receiver)
    }
}

impl FrameSink for ChannelSink {
    fn on_frame(&self, frame: DecodedFrame) {
        let mut frame = frame;
        loop {
            match self.frame_tx.try_send(frame) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    if self.frame_evict.try_recv().is_ok() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    frame = back;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }

    fn on_connection_changed(&self, connected: bool) {
        let _ = self.state_tx.send(connected);
    }
}

impl SinkReceiver {
    pub fn frames(&self) -> &Receiver<DecodedFrame> {
        &self.frame_rx
    }

    pub fn connection_changes(&self) -> &Receiver<bool> {
        &self.state_rx
    }

    /// Wait for the next frame; `None` on timeout.
    pub fn recv_frame_timeout(&self, timeout: Duration) -> Option<DecodedFrame> {
        match self.frame_rx.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Wait for the next connection change; `None` on timeout.
    pub fn recv_connection_timeout(&self, timeout: Duration) -> Option<bool> {
        self.state_rx.recv_timeout(timeout).ok()
    }

    /// All connection changes queued right now.
    pub fn drain_connection_changes(&self) -> Vec<bool> {
        self.state_rx.try_iter().collect()
    }

    /// Frames evicted because the consumer fell behind.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
