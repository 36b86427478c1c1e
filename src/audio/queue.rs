//! Unbounded frame FIFO shared by one producer and the consumer.
//!
//! `clear()` holds the clearing gate for the whole drain. Producers only
//! `try_lock` the gate right before each push, so they never block, and a
//! frame offered while a clear is running is dropped instead of landing in a
//! queue that is being emptied.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, TryLockError};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use super::frame::Frame;

/// Running counters for one controller.
#[derive(Debug, Default)]
pub struct StreamStats {
    frames_pushed: AtomicU64,
    frames_dropped_clearing: AtomicU64,
    packets_decoded: AtomicU64,
    packets_discarded: AtomicU64,
    packets_malformed: AtomicU64,
}

/// Point-in-time copy of [`StreamStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_pushed: u64,
    pub frames_dropped_clearing: u64,
    pub packets_decoded: u64,
    pub packets_discarded: u64,
    pub packets_malformed: u64,
}

impl StreamStats {
    pub(crate) fn packet_decoded(&self) {
        self.packets_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn packet_discarded(&self) {
        self.packets_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn packet_malformed(&self) {
        self.packets_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_pushed: self.frames_pushed.load(Ordering::Relaxed),
            frames_dropped_clearing: self.frames_dropped_clearing.load(Ordering::Relaxed),
            packets_decoded: self.packets_decoded.load(Ordering::Relaxed),
            packets_discarded: self.packets_discarded.load(Ordering::Relaxed),
            packets_malformed: self.packets_malformed.load(Ordering::Relaxed),
        }
    }
}

pub struct OutputQueue {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
    clearing: Mutex<()>,
    stats: StreamStats,
}

impl OutputQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            clearing: Mutex::new(()),
            stats: StreamStats::default(),
        }
    }

    /// Offer a frame from a producer. Never blocks.
    ///
    /// Returns `false` when the frame was dropped because a clear is running.
    pub fn push(&self, frame: Frame) -> bool {
        let _gate = match self.clearing.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                self.stats.frames_dropped_clearing.fetch_add(1, Ordering::Relaxed);
                log::debug!("Dropped {}-byte frame pushed during clear", frame.len());
                return false;
            }
        };
        // The queue owns a receiver, so the channel cannot be disconnected.
        if self.tx.send(frame).is_err() {
            return false;
        }
        self.stats.frames_pushed.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Discard every queued frame. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let _gate = self.clearing.lock().unwrap_or_else(PoisonError::into_inner);
        let dropped = self.rx.try_iter().count();
        if dropped > 0 {
            log::debug!("Cleared {} pending frames", dropped);
        }
        dropped
    }

    /// Block until a frame is available.
    pub fn pop(&self) -> Result<Frame> {
        self.rx.recv().context("Output queue disconnected")
    }

    /// Wait up to `timeout` for a frame.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Frame> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_pop(&self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }
}

impl Default for OutputQueue {
    fn default() -> Self {
        Self::new()
    }
}
