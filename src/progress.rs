//! Progress reporting and cooperative cancellation for long pipelines.
//!
//! Sync, tagging and playlist generation can each run for minutes against a
//! large library. They take a [`Reporter`] to emit coarse progress events and
//! a [`CancelToken`] that they poll between batches. Cancellation is
//! cooperative: a batch already in flight completes before the pipeline
//! observes the token.

use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A single progress update from a running pipeline.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// Completion fraction in [0.0, 1.0]
    pub fraction: f32,
    /// Human-readable description of the current phase
    pub message: String,
}

/// Sending half of a progress channel.
///
/// Cheap to clone. Sends never block and silently drop events once the
/// receiver is gone, so a pipeline keeps running even when nobody listens.
#[derive(Debug, Clone)]
pub struct Reporter {
    tx: Option<Sender<ProgressEvent>>,
}

impl Reporter {
    /// Create a connected reporter/receiver pair.
    pub fn channel() -> (Self, Receiver<ProgressEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx: Some(tx) }, rx)
    }

    /// A reporter that discards all events.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Emit a progress event.
    pub fn report(&self, fraction: f32, message: impl Into<String>) {
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(ProgressEvent {
                fraction: fraction.clamp(0.0, 1.0),
                message: message.into(),
            });
        }
    }
}

/// Cooperative cancellation flag, shared between a pipeline and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The pipeline observes this at its next check.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
