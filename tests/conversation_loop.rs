//! Full conversation-loop tests: scripted recognizer events, a mock chat
//! service, and an instant audio sink driving real `ConversationOrchestrator`
//! turns end to end.

use async_trait::async_trait;
use roadtalk::audio::AudioSink;
use roadtalk::config::CoachConfig;
use roadtalk::error::Result;
use roadtalk::generation::HttpReplyGenerator;
use roadtalk::playback::{PlaybackController, PlaybackStatus};
use roadtalk::recognition::{RecognitionBackend, RecognitionEvent, SpeechInputController};
use roadtalk::session::{ConversationOrchestrator, ConversationState};
use roadtalk::synthesis::{AudioClip, SpeechSynthesizer};
use roadtalk::transcript::Speaker;
use roadtalk::SessionEvent;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct NullBackend;

#[async_trait]
impl RecognitionBackend for NullBackend {
    async fn start(&self) -> Result<()> {
        Ok(())
    }
    async fn stop(&self) {}
}

struct TextSynth;

#[async_trait]
impl SpeechSynthesizer for TextSynth {
    async fn synthesize(&self, text: &str) -> Result<AudioClip> {
        Ok(AudioClip {
            data: text.as_bytes().to_vec().into(),
            media_type: "text/plain".to_owned(),
        })
    }
}

struct InstantSink;

#[async_trait]
impl AudioSink for InstantSink {
    async fn play(&self, _clip: AudioClip, _cancel: CancellationToken) -> Result<()> {
        Ok(())
    }
}

struct Session {
    event_tx: mpsc::Sender<RecognitionEvent>,
    events: broadcast::Receiver<SessionEvent>,
    transcript: Arc<std::sync::Mutex<roadtalk::Transcript>>,
    cancel: CancellationToken,
    join: tokio::task::JoinHandle<Result<()>>,
}

fn spawn_session(chat_url: String) -> Session {
    let mut config = CoachConfig::default();
    config.generation.api_url = chat_url;

    let (event_tx, event_rx) = mpsc::channel(8);
    let (input, input_rx) =
        SpeechInputController::new(Arc::new(NullBackend), event_rx, config.recognition.clone());
    let playback = Arc::new(PlaybackController::new(
        Arc::new(TextSynth),
        Arc::new(InstantSink),
    ));
    let generator = Arc::new(HttpReplyGenerator::new(config.generation.clone()).unwrap());
    let orchestrator = ConversationOrchestrator::new(config, input, input_rx, playback, generator);

    let events = orchestrator.subscribe();
    let transcript = orchestrator.transcript();
    let cancel = orchestrator.cancel_token();
    let join = tokio::spawn(orchestrator.run());

    Session {
        event_tx,
        events,
        transcript,
        cancel,
        join,
    }
}

async fn wait_for_event(
    events: &mut broadcast::Receiver<SessionEvent>,
    predicate: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => {
                    panic!("event channel closed before expected event")
                }
            }
        }
    })
    .await
    .expect("timed out waiting for session event")
}

#[tokio::test]
async fn greeting_then_turn_through_real_http_generator() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ai/chat"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "reply": "I'm hauling produce." })),
        )
        .mount(&server)
        .await;

    let mut session = spawn_session(format!("{}/api/ai/chat", server.uri()));

    // Greeting plays first, then the loop listens.
    wait_for_event(&mut session.events, |e| {
        matches!(e, SessionEvent::StateChanged(ConversationState::Greeting))
    })
    .await;
    wait_for_event(&mut session.events, |e| {
        matches!(
            e,
            SessionEvent::StateChanged(ConversationState::ListeningForUser)
        )
    })
    .await;

    session
        .event_tx
        .send(RecognitionEvent::Final {
            text: "What are you hauling?".to_owned(),
        })
        .await
        .unwrap();

    wait_for_event(&mut session.events, |e| {
        matches!(
            e,
            SessionEvent::PlaybackFinished {
                status: PlaybackStatus::Completed,
                ..
            }
        )
    })
    .await;
    wait_for_event(&mut session.events, |e| {
        matches!(
            e,
            SessionEvent::StateChanged(ConversationState::ListeningForUser)
        )
    })
    .await;

    {
        let transcript = session.transcript.lock().unwrap();
        let entries = transcript.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].speaker, Speaker::Coach); // greeting
        assert_eq!(entries[1].speaker, Speaker::User);
        assert_eq!(entries[1].text, "What are you hauling?");
        assert_eq!(entries[2].speaker, Speaker::Coach);
        assert_eq!(entries[2].text, "I'm hauling produce.");
    }

    session.cancel.cancel();
    session.join.await.unwrap().unwrap();
}

#[tokio::test]
async fn noise_fragments_never_reach_the_chat_service() {
    let server = MockServer::start().await;
    // Expect zero chat calls for the noise fragment.
    Mock::given(method("POST"))
        .and(path("/api/ai/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "reply": "unused" })))
        .expect(0)
        .mount(&server)
        .await;

    let mut session = spawn_session(format!("{}/api/ai/chat", server.uri()));
    wait_for_event(&mut session.events, |e| {
        matches!(
            e,
            SessionEvent::StateChanged(ConversationState::ListeningForUser)
        )
    })
    .await;

    session
        .event_tx
        .send(RecognitionEvent::Final {
            text: "uh".to_owned(),
        })
        .await
        .unwrap();

    // Give the loop a moment; the transcript must stay greeting-only.
    tokio::time::sleep(Duration::from_millis(200)).await;
    {
        let transcript = session.transcript.lock().unwrap();
        assert_eq!(transcript.len(), 1);
    }

    session.cancel.cancel();
    session.join.await.unwrap().unwrap();
    server.verify().await;
}

#[tokio::test]
async fn chat_outage_degrades_to_fallback_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ai/chat"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut session = spawn_session(format!("{}/api/ai/chat", server.uri()));
    wait_for_event(&mut session.events, |e| {
        matches!(
            e,
            SessionEvent::StateChanged(ConversationState::ListeningForUser)
        )
    })
    .await;

    session
        .event_tx
        .send(RecognitionEvent::Final {
            text: "Can we practice checkpoint questions?".to_owned(),
        })
        .await
        .unwrap();

    // The fallback reply is spoken like any other.
    wait_for_event(&mut session.events, |e| {
        matches!(
            e,
            SessionEvent::PlaybackFinished {
                status: PlaybackStatus::Completed,
                ..
            }
        )
    })
    .await;

    {
        let transcript = session.transcript.lock().unwrap();
        let entries = transcript.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].speaker, Speaker::Coach);
        assert!(
            CoachConfig::default()
                .generation
                .fallback_replies
                .contains(&entries[2].text)
        );
    }

    session.cancel.cancel();
    session.join.await.unwrap().unwrap();
}
