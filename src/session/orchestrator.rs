//! Top-level driver for the listen → generate → speak loop.

use super::ConversationState;
use crate::config::CoachConfig;
use crate::error::{CoachError, Result};
use crate::events::SessionEvent;
use crate::generation::ReplyGenerator;
use crate::playback::{PlaybackController, PlaybackHandle, PlaybackStatus};
use crate::recognition::{InputEvent, SpeechInputController};
use crate::transcript::{Speaker, Transcript, Utterance};
use rand::seq::SliceRandom;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Broadcast capacity for session events.
const EVENT_CHANNEL_SIZE: usize = 64;

/// Drives one conversation session.
///
/// The loop speaks the configured greeting, then alternates between
/// listening and replying until shutdown or a fatal recognition error. A
/// finalized user utterance always wins over an in-flight reply: the active
/// rendition is canceled before the new turn is processed.
pub struct ConversationOrchestrator {
    config: CoachConfig,
    input: SpeechInputController,
    input_rx: Option<mpsc::Receiver<InputEvent>>,
    playback: Arc<PlaybackController>,
    generator: Arc<dyn ReplyGenerator>,
    transcript: Arc<Mutex<Transcript>>,
    events: broadcast::Sender<SessionEvent>,
    cancel: CancellationToken,
    state: ConversationState,
}

impl ConversationOrchestrator {
    /// Assemble an orchestrator from its collaborators.
    ///
    /// `input_rx` is the utterance stream returned by
    /// [`SpeechInputController::new`].
    pub fn new(
        config: CoachConfig,
        input: SpeechInputController,
        input_rx: mpsc::Receiver<InputEvent>,
        playback: Arc<PlaybackController>,
        generator: Arc<dyn ReplyGenerator>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            config,
            input,
            input_rx: Some(input_rx),
            playback,
            generator,
            transcript: Arc::new(Mutex::new(Transcript::new())),
            events,
            cancel: CancellationToken::new(),
            state: ConversationState::NotStarted,
        }
    }

    /// Subscribe to session events (state changes, utterances, playback).
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Token external code can use to stop the session.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Shared transcript for snapshots.
    #[must_use]
    pub fn transcript(&self) -> Arc<Mutex<Transcript>> {
        Arc::clone(&self.transcript)
    }

    /// Run the conversation until shutdown or a fatal recognition error.
    ///
    /// # Errors
    ///
    /// Returns an error if the recognizer cannot start or the orchestrator
    /// was already run.
    pub async fn run(mut self) -> Result<()> {
        let cancel = self.cancel.clone();
        let mut input_rx = self
            .input_rx
            .take()
            .ok_or_else(|| CoachError::Channel("orchestrator already run".to_owned()))?;

        info!("conversation session starting");
        self.set_state(ConversationState::Greeting);
        let greeting = self.config.session.greeting.clone();
        self.append(Speaker::Coach, &greeting);
        let greeting_handle = self.playback.play(&greeting);
        self.emit(SessionEvent::PlaybackStarted {
            clip_id: greeting_handle.clip_id(),
        });

        tokio::select! {
            () = cancel.cancelled() => {
                self.end().await;
                return Ok(());
            }
            status = greeting_handle.wait() => {
                self.emit(SessionEvent::PlaybackFinished {
                    clip_id: greeting_handle.clip_id(),
                    status,
                });
            }
        }

        self.input.start().await?;
        self.set_state(ConversationState::ListeningForUser);

        let mut speaking: Option<PlaybackHandle> = None;
        loop {
            // Await the active rendition only while one exists.
            let current = speaking.clone();
            let playback_done = async move {
                match current {
                    Some(handle) => handle.wait().await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                () = cancel.cancelled() => break,
                status = playback_done => {
                    if let Some(handle) = speaking.take() {
                        self.emit(SessionEvent::PlaybackFinished {
                            clip_id: handle.clip_id(),
                            status,
                        });
                    }
                    self.set_state(ConversationState::ListeningForUser);
                }
                event = input_rx.recv() => {
                    match event {
                        Some(InputEvent::Utterance(text)) => {
                            speaking = self.handle_utterance(text).await;
                            if speaking.is_none() && cancel.is_cancelled() {
                                break;
                            }
                        }
                        Some(InputEvent::RecognitionFailed { message }) => {
                            warn!("recognition failed, ending session: {message}");
                            self.emit(SessionEvent::RecognitionFatal { message });
                            break;
                        }
                        None => break,
                    }
                }
            }
        }

        self.end().await;
        Ok(())
    }

    /// Process one finalized user utterance: preempt stale audio, generate
    /// a reply, start speaking it. Returns the new rendition handle, or
    /// `None` when shutdown interrupted the turn.
    async fn handle_utterance(&mut self, text: String) -> Option<PlaybackHandle> {
        self.arbitrate_interruption();

        self.set_state(ConversationState::Generating);
        self.append(Speaker::User, &text);
        let history = self.recent_history();

        let reply = tokio::select! {
            () = self.cancel.cancelled() => return None,
            result = self.generator.generate(&text, &history) => match result {
                Ok(reply) => reply,
                Err(e) => {
                    warn!("reply generation failed, substituting fallback: {e}");
                    self.fallback_reply()
                }
            },
        };

        self.append(Speaker::Coach, &reply);
        let handle = self.playback.play(&reply);
        self.emit(SessionEvent::PlaybackStarted {
            clip_id: handle.clip_id(),
        });
        self.set_state(ConversationState::Speaking);
        Some(handle)
    }

    /// Cancel-before-process: the user's new speech must never compete with
    /// an already-superseded reply. The preempted handle is terminal before
    /// this returns.
    fn arbitrate_interruption(&self) {
        if let Some(preempted) = self.playback.cancel_active()
            && preempted.status() == PlaybackStatus::Canceled
        {
            self.emit(SessionEvent::PlaybackFinished {
                clip_id: preempted.clip_id(),
                status: PlaybackStatus::Canceled,
            });
        }
    }

    fn recent_history(&self) -> Vec<Utterance> {
        let transcript = self
            .transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        transcript.recent(self.config.generation.history_turns)
    }

    fn fallback_reply(&self) -> String {
        let replies = &self.config.generation.fallback_replies;
        replies
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| "Keep going, you're doing great!".to_owned())
    }

    fn append(&self, speaker: Speaker, text: &str) {
        let utterance = Utterance::new(speaker, text);
        {
            let mut transcript = self
                .transcript
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            transcript.push(utterance.clone());
        }
        self.emit(SessionEvent::UtteranceAdded(utterance));
    }

    fn set_state(&mut self, state: ConversationState) {
        if self.state != state {
            self.state = state;
            self.emit(SessionEvent::StateChanged(state));
        }
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    async fn end(&mut self) {
        self.input.stop().await;
        self.playback.cancel_active();
        self.set_state(ConversationState::Ended);
        info!("conversation session ended");
    }
}
