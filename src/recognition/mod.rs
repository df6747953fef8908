//! Continuous speech recognition: platform seam and input controller.

mod controller;

pub use controller::{InputEvent, SpeechInputController};

use crate::error::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

/// Events produced by a platform recognition backend.
#[derive(Debug, Clone)]
pub enum RecognitionEvent {
    /// A result the backend marked final.
    Final {
        /// Raw transcript text as delivered by the backend.
        text: String,
    },
    /// The backend ended the pass on its own (silence timeout, platform
    /// session limit). Recoverable: continuous mode restarts it.
    Ended,
    /// Unrecoverable backend failure (permission revoked, device lost).
    /// Never auto-restarted.
    Error {
        /// Backend-reported failure description.
        message: String,
    },
}

/// Platform continuous recognizer.
///
/// Implementations deliver [`RecognitionEvent`]s on the channel the
/// application wires up at construction; `start` begins one recognition
/// pass and `stop` tears the current pass down.
#[async_trait]
pub trait RecognitionBackend: Send + Sync {
    /// Begin a recognition pass.
    async fn start(&self) -> Result<()>;

    /// Stop the current pass. Must be safe when no pass is running.
    async fn stop(&self);
}

/// Lifecycle flags for one recognition session.
///
/// Single source of truth for start/stop/restart decisions: both the
/// restart scheduler and `stop()` consult `continuous` here, so a stop that
/// lands while a restart is pending is observed before the restart fires.
#[derive(Debug, Default)]
pub struct RecognitionSession {
    active: AtomicBool,
    continuous: AtomicBool,
}

impl RecognitionSession {
    /// Whether a session is currently running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Whether natural ends should trigger automatic restarts.
    pub fn continuous_mode_enabled(&self) -> bool {
        self.continuous.load(Ordering::Acquire)
    }

    pub(crate) fn set_active(&self, value: bool) {
        self.active.store(value, Ordering::Release);
    }

    /// Flip to active; returns false when a session was already running.
    pub(crate) fn try_activate(&self) -> bool {
        !self.active.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn set_continuous(&self, value: bool) {
        self.continuous.store(value, Ordering::Release);
    }
}
