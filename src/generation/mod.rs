//! Response generation collaborator: one chat-completion call per turn.

use crate::config::GenerationConfig;
use crate::error::{CoachError, Result};
use crate::transcript::{Speaker, Utterance};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Reply used when the service answers with an empty string.
const EMPTY_REPLY_SUBSTITUTE: &str =
    "I'm here to help you practice English! What would you like to work on?";

/// Response generation collaborator. No retry logic lives here; a failed
/// call is the caller's cue to substitute a fallback reply.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Generate a reply to `message` given the recent transcript.
    async fn generate(&self, message: &str, history: &[Utterance]) -> Result<String>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    message: &'a str,
    system_prompt: &'a str,
    conversation_history: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
struct HistoryEntry {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    reply: String,
}

/// HTTP client for the chat-completion endpoint.
pub struct HttpReplyGenerator {
    client: reqwest::Client,
    config: GenerationConfig,
}

impl HttpReplyGenerator {
    /// Build a generator for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CoachError::Generation(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ReplyGenerator for HttpReplyGenerator {
    async fn generate(&self, message: &str, history: &[Utterance]) -> Result<String> {
        let request = ChatRequest {
            message,
            system_prompt: &self.config.system_prompt,
            conversation_history: history
                .iter()
                .map(|utterance| HistoryEntry {
                    role: match utterance.speaker {
                        Speaker::User => "user",
                        Speaker::Coach => "assistant",
                    },
                    content: utterance.text.clone(),
                })
                .collect(),
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| CoachError::Generation(format!("chat request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(CoachError::Generation(format!(
                "chat service returned {}",
                response.status()
            )));
        }

        let parsed: ChatReply = response
            .json()
            .await
            .map_err(|e| CoachError::Generation(format!("malformed chat response: {e}")))?;

        if parsed.reply.trim().is_empty() {
            debug!("chat service returned empty reply, substituting default");
            return Ok(EMPTY_REPLY_SUBSTITUTE.to_owned());
        }
        Ok(parsed.reply)
    }
}
