//! RoadTalk: real-time voice conversation core for an English-practice
//! coach.
//!
//! The crate implements the conversational concurrency loop:
//! recognizer → orchestrator → reply generation → synthesis → playback
//!
//! # Architecture
//!
//! Independent pieces connected by async channels and a shared playback
//! slot:
//! - **Recognition**: continuous speech input with restart-on-natural-end
//!   ([`recognition::SpeechInputController`])
//! - **Generation**: chat-completion collaborator over HTTP
//!   ([`generation::HttpReplyGenerator`])
//! - **Synthesis**: text-to-speech collaborator over HTTP
//!   ([`synthesis::HttpSynthesizer`])
//! - **Playback**: single-slot audio output with preemption
//!   ([`playback::PlaybackController`])
//! - **Session**: the listen → generate → speak driver
//!   ([`session::ConversationOrchestrator`])
//!
//! The platform speech recognizer and the audio device sit behind the
//! [`recognition::RecognitionBackend`] and [`audio::AudioSink`] traits;
//! everything else is plain tokio.

pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod generation;
pub mod playback;
pub mod recognition;
pub mod session;
pub mod synthesis;
pub mod transcript;

pub use config::CoachConfig;
pub use error::{CoachError, Result};
pub use events::SessionEvent;
pub use playback::{PlaybackController, PlaybackHandle, PlaybackStatus};
pub use recognition::{
    InputEvent, RecognitionBackend, RecognitionEvent, RecognitionSession, SpeechInputController,
};
pub use session::{ConversationOrchestrator, ConversationState};
pub use transcript::{Speaker, Transcript, Utterance};
