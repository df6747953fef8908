//! Session events emitted by the orchestrator for UI and observability.
//!
//! Delivery is lossy broadcast: slow observers lag, the conversation loop
//! never blocks on them.

use crate::playback::PlaybackStatus;
use crate::session::ConversationState;
use crate::transcript::Utterance;
use uuid::Uuid;

/// Events that describe what the conversation loop is doing "right now".
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The orchestrator moved to a new state.
    StateChanged(ConversationState),
    /// An utterance was appended to the transcript.
    UtteranceAdded(Utterance),
    /// Synthesis/playback of a reply began.
    PlaybackStarted {
        /// Rendition identifier.
        clip_id: Uuid,
    },
    /// A rendition reached a terminal state.
    PlaybackFinished {
        /// Rendition identifier.
        clip_id: Uuid,
        /// How it ended.
        status: PlaybackStatus,
    },
    /// The recognition backend failed fatally; the session is ending.
    RecognitionFatal {
        /// Failure description for the operator.
        message: String,
    },
}
