//! Single-slot audio playback: at most one sounding clip at a time.

use crate::audio::AudioSink;
use crate::synthesis::SpeechSynthesizer;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

/// Lifecycle of one synthesized-speech rendition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// Created; synthesis in flight.
    Pending,
    /// Audio is sounding.
    Playing,
    /// Playback ended naturally.
    Completed,
    /// Preempted before finishing.
    Canceled,
    /// Synthesis or output I/O failed.
    Failed,
}

impl PlaybackStatus {
    /// Terminal states never transition again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Canceled | Self::Failed)
    }
}

struct HandleShared {
    clip_id: Uuid,
    source_text: String,
    status: watch::Sender<PlaybackStatus>,
    cancel: CancellationToken,
}

/// Handle to one active (or finished) audio rendition.
#[derive(Clone)]
pub struct PlaybackHandle {
    shared: Arc<HandleShared>,
}

impl PlaybackHandle {
    fn new(source_text: &str) -> Self {
        let (status, _) = watch::channel(PlaybackStatus::Pending);
        Self {
            shared: Arc::new(HandleShared {
                clip_id: Uuid::new_v4(),
                source_text: source_text.to_owned(),
                status,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Identifier of this rendition.
    #[must_use]
    pub fn clip_id(&self) -> Uuid {
        self.shared.clip_id
    }

    /// Text this rendition was synthesized from.
    #[must_use]
    pub fn source_text(&self) -> &str {
        &self.shared.source_text
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> PlaybackStatus {
        *self.shared.status.borrow()
    }

    /// Move to `next` unless a terminal state was already latched.
    /// Returns whether the transition happened.
    fn transition(&self, next: PlaybackStatus) -> bool {
        self.shared.status.send_if_modified(|current| {
            if current.is_terminal() {
                false
            } else {
                *current = next;
                true
            }
        })
    }

    /// Stop this rendition. `Canceled` is latched before the playback task
    /// is signalled, so callers observe the terminal state as soon as this
    /// returns. No-op on already-terminal handles.
    pub fn cancel(&self) {
        if self.transition(PlaybackStatus::Canceled) {
            debug!(clip_id = %self.shared.clip_id, "playback canceled");
            self.shared.cancel.cancel();
        }
    }

    /// Suspend until the rendition reaches a terminal state.
    pub async fn wait(&self) -> PlaybackStatus {
        let mut rx = self.shared.status.subscribe();
        loop {
            let current = *rx.borrow_and_update();
            if current.is_terminal() {
                return current;
            }
            if rx.changed().await.is_err() {
                return *rx.borrow();
            }
        }
    }

    fn cancel_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }
}

/// Owns the single active rendition slot.
///
/// All playback state flows through `play`/`cancel_active`; nothing else
/// mutates the slot.
pub struct PlaybackController {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    sink: Arc<dyn AudioSink>,
    active: Mutex<Option<PlaybackHandle>>,
}

impl PlaybackController {
    /// Create a controller over the given synthesis collaborator and sink.
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, sink: Arc<dyn AudioSink>) -> Self {
        Self {
            synthesizer,
            sink,
            active: Mutex::new(None),
        }
    }

    /// Synthesize `text` and start playing it, preempting any rendition
    /// still in flight. The previous handle is canceled before the new task
    /// is spawned, so at most one rendition is ever `Playing`.
    pub fn play(&self, text: &str) -> PlaybackHandle {
        let handle = PlaybackHandle::new(text);
        {
            let mut slot = self
                .active
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = slot.take() {
                previous.cancel();
            }
            *slot = Some(handle.clone());
        }

        let synthesizer = Arc::clone(&self.synthesizer);
        let sink = Arc::clone(&self.sink);
        let task_handle = handle.clone();
        tokio::spawn(async move {
            drive_rendition(synthesizer, sink, task_handle).await;
        });

        handle
    }

    /// Cancel whatever occupies the slot, returning the preempted handle.
    /// Safe (and `None`) when nothing is active; canceling a rendition that
    /// already completed is a no-op.
    pub fn cancel_active(&self) -> Option<PlaybackHandle> {
        let slot = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        slot.as_ref().map(|handle| {
            handle.cancel();
            handle.clone()
        })
    }

    /// The rendition currently occupying the slot, if any.
    #[must_use]
    pub fn active(&self) -> Option<PlaybackHandle> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

async fn drive_rendition(
    synthesizer: Arc<dyn SpeechSynthesizer>,
    sink: Arc<dyn AudioSink>,
    handle: PlaybackHandle,
) {
    let cancel = handle.cancel_token();

    let clip = tokio::select! {
        () = cancel.cancelled() => return,
        result = synthesizer.synthesize(handle.source_text()) => match result {
            Ok(clip) => clip,
            Err(e) => {
                warn!("synthesis failed: {e}");
                handle.transition(PlaybackStatus::Failed);
                return;
            }
        },
    };

    if !handle.transition(PlaybackStatus::Playing) {
        // Canceled while synthesis was in flight; the clip drops here.
        return;
    }
    debug!(clip_id = %handle.clip_id(), bytes = clip.data.len(), "playback started");

    match sink.play(clip, cancel).await {
        Ok(()) => {
            // No-op if the rendition was canceled mid-play.
            handle.transition(PlaybackStatus::Completed);
        }
        Err(e) => {
            warn!("playback failed: {e}");
            handle.transition(PlaybackStatus::Failed);
        }
    }
}
