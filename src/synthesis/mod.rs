//! Speech synthesis collaborator: playable audio for a piece of text.

use crate::config::SynthesisConfig;
use crate::error::{CoachError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// One synthesized audio resource, ready for a sink to render.
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// Encoded audio bytes as returned by the synthesis service.
    pub data: Bytes,
    /// MIME type reported by the service.
    pub media_type: String,
}

/// Speech synthesis collaborator.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Produce playable audio for `text`.
    async fn synthesize(&self, text: &str) -> Result<AudioClip>;
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    voice: &'a str,
    speed: f32,
}

/// HTTP client for the text-to-speech endpoint.
pub struct HttpSynthesizer {
    client: reqwest::Client,
    config: SynthesisConfig,
}

impl HttpSynthesizer {
    /// Build a synthesizer for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: SynthesisConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CoachError::Synthesis(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioClip> {
        let request = SynthesisRequest {
            text,
            voice: &self.config.voice,
            speed: self.config.speed,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| CoachError::Synthesis(format!("synthesis request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(CoachError::Synthesis(format!(
                "synthesis service returned {}",
                response.status()
            )));
        }

        let media_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("audio/mpeg")
            .to_owned();
        let data = response
            .bytes()
            .await
            .map_err(|e| CoachError::Synthesis(format!("failed to read audio body: {e}")))?;

        debug!(
            "synthesized {} bytes ({media_type}) for {} chars",
            data.len(),
            text.chars().count()
        );
        Ok(AudioClip { data, media_type })
    }
}
