//! Input controller: owns the recognizer lifecycle and emits finalized
//! utterances.

use super::{RecognitionBackend, RecognitionEvent, RecognitionSession};
use crate::config::RecognitionConfig;
use crate::error::{CoachError, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Capacity of the finalized-utterance channel to the orchestrator.
/// Utterances arriving while a turn is in flight buffer here.
const INPUT_CHANNEL_SIZE: usize = 8;

/// Events the controller hands to the orchestrator.
#[derive(Debug, Clone)]
pub enum InputEvent {
    /// A finalized utterance that passed the noise filter.
    Utterance(String),
    /// The backend failed fatally; continuous mode has been disabled and
    /// no further utterances will arrive.
    RecognitionFailed {
        /// Failure description for the operator.
        message: String,
    },
}

/// Drives a [`RecognitionBackend`] in continuous mode: filters noise out of
/// final results, restarts the backend after each natural end, and escalates
/// backend errors instead of looping on them.
///
/// One controller serves one session: after [`stop`](Self::stop) the
/// controller is spent and a fresh one is built for the next session.
pub struct SpeechInputController {
    backend: Arc<dyn RecognitionBackend>,
    config: RecognitionConfig,
    session: Arc<RecognitionSession>,
    event_rx: Option<mpsc::Receiver<RecognitionEvent>>,
    input_tx: mpsc::Sender<InputEvent>,
    cancel: CancellationToken,
}

impl SpeechInputController {
    /// Create a controller and the receiving end of its utterance stream.
    ///
    /// `event_rx` carries the backend's events; the application wires the
    /// sending half into its platform recognizer.
    pub fn new(
        backend: Arc<dyn RecognitionBackend>,
        event_rx: mpsc::Receiver<RecognitionEvent>,
        config: RecognitionConfig,
    ) -> (Self, mpsc::Receiver<InputEvent>) {
        let (input_tx, input_rx) = mpsc::channel(INPUT_CHANNEL_SIZE);
        let controller = Self {
            backend,
            config,
            session: Arc::new(RecognitionSession::default()),
            event_rx: Some(event_rx),
            input_tx,
            cancel: CancellationToken::new(),
        };
        (controller, input_rx)
    }

    /// Shared session flags (active / continuous mode).
    #[must_use]
    pub fn session(&self) -> Arc<RecognitionSession> {
        Arc::clone(&self.session)
    }

    /// Begin listening in continuous mode.
    ///
    /// No-op when already active.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to start the first pass, or if
    /// this controller was already consumed by an earlier session.
    pub async fn start(&mut self) -> Result<()> {
        if !self.session.try_activate() {
            debug!("recognition already active, ignoring start");
            return Ok(());
        }

        let Some(event_rx) = self.event_rx.take() else {
            self.session.set_active(false);
            return Err(CoachError::Recognition(
                "controller already served a session".to_owned(),
            ));
        };

        self.session.set_continuous(true);

        let ctx = InputLoop {
            backend: Arc::clone(&self.backend),
            config: self.config.clone(),
            session: Arc::clone(&self.session),
            input_tx: self.input_tx.clone(),
            cancel: self.cancel.clone(),
        };
        tokio::spawn(run_input_loop(ctx, event_rx));

        if let Err(e) = self.backend.start().await {
            self.session.set_continuous(false);
            self.cancel.cancel();
            self.session.set_active(false);
            return Err(e);
        }

        info!(language = %self.config.language, "recognition started (continuous)");
        Ok(())
    }

    /// End the session: disables auto-restart (a restart already scheduled
    /// observes the cleared flag and is discarded), then stops the backend.
    /// Safe to call when not started.
    pub async fn stop(&self) {
        self.session.set_continuous(false);
        self.cancel.cancel();
        self.backend.stop().await;
        self.session.set_active(false);
        info!("recognition stopped");
    }
}

/// Bundled state for the controller's event loop.
struct InputLoop {
    backend: Arc<dyn RecognitionBackend>,
    config: RecognitionConfig,
    session: Arc<RecognitionSession>,
    input_tx: mpsc::Sender<InputEvent>,
    cancel: CancellationToken,
}

async fn run_input_loop(ctx: InputLoop, mut event_rx: mpsc::Receiver<RecognitionEvent>) {
    let restart_delay = Duration::from_millis(ctx.config.restart_delay_ms);
    let restart_window = Duration::from_millis(ctx.config.rapid_restart_window_ms);
    let mut recent_restarts: VecDeque<Instant> = VecDeque::new();

    loop {
        tokio::select! {
            () = ctx.cancel.cancelled() => break,
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                match event {
                    RecognitionEvent::Final { text } => {
                        let trimmed = text.trim();
                        if trimmed.chars().count() <= ctx.config.min_utterance_chars {
                            debug!("discarding noise fragment: {trimmed:?}");
                            continue;
                        }
                        if ctx
                            .input_tx
                            .send(InputEvent::Utterance(trimmed.to_owned()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    RecognitionEvent::Ended => {
                        if !ctx.session.continuous_mode_enabled() {
                            info!("recognition ended after stop, not restarting");
                            break;
                        }

                        // A backend that keeps ending its passes instantly is
                        // treated as failed, not restarted forever.
                        let now = Instant::now();
                        while let Some(first) = recent_restarts.front() {
                            if now.duration_since(*first) > restart_window {
                                recent_restarts.pop_front();
                            } else {
                                break;
                            }
                        }
                        if recent_restarts.len() >= ctx.config.max_rapid_restarts {
                            warn!(
                                "{} recognition restarts within {:?}, giving up",
                                recent_restarts.len(),
                                restart_window
                            );
                            ctx.session.set_continuous(false);
                            let _ = ctx
                                .input_tx
                                .send(InputEvent::RecognitionFailed {
                                    message: "recognition keeps ending immediately".to_owned(),
                                })
                                .await;
                            break;
                        }

                        tokio::select! {
                            () = ctx.cancel.cancelled() => break,
                            () = tokio::time::sleep(restart_delay) => {}
                        }
                        // stop() may have landed while the delay ran.
                        if !ctx.session.continuous_mode_enabled() {
                            info!("discarding scheduled restart after stop");
                            break;
                        }

                        match ctx.backend.start().await {
                            Ok(()) => {
                                recent_restarts.push_back(Instant::now());
                                debug!("recognition restarted after natural end");
                            }
                            Err(e) => {
                                warn!("recognition restart failed: {e}");
                                ctx.session.set_continuous(false);
                                let _ = ctx
                                    .input_tx
                                    .send(InputEvent::RecognitionFailed {
                                        message: e.to_string(),
                                    })
                                    .await;
                                break;
                            }
                        }
                    }
                    RecognitionEvent::Error { message } => {
                        warn!("recognition backend error: {message}");
                        ctx.session.set_continuous(false);
                        let _ = ctx
                            .input_tx
                            .send(InputEvent::RecognitionFailed { message })
                            .await;
                        break;
                    }
                }
            }
        }
    }

    ctx.session.set_active(false);
}
