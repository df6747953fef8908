//! Configuration types for the voice conversation core.

use serde::{Deserialize, Serialize};

/// Top-level configuration for a conversation session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachConfig {
    /// Speech recognition settings.
    pub recognition: RecognitionConfig,
    /// Response generation settings.
    pub generation: GenerationConfig,
    /// Speech synthesis settings.
    pub synthesis: SynthesisConfig,
    /// Session/orchestration settings.
    pub session: SessionConfig,
    /// Audio output settings.
    pub audio: AudioConfig,
}

/// Speech recognition configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// BCP-47 language tag passed to the recognition backend.
    pub language: String,
    /// Final results at or below this many characters (after trimming) are
    /// discarded as noise rather than treated as utterances.
    pub min_utterance_chars: usize,
    /// Delay before restarting recognition after a natural end, in ms.
    ///
    /// Keeps the restart loop from hammering the platform recognizer when
    /// it ends sessions back-to-back.
    pub restart_delay_ms: u64,
    /// Maximum restarts within `rapid_restart_window_ms` before the
    /// backend is declared failed and continuous mode is disabled.
    pub max_rapid_restarts: usize,
    /// Sliding window for the rapid-restart cap, in ms.
    pub rapid_restart_window_ms: u64,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_owned(),
            min_utterance_chars: 2,
            restart_delay_ms: 100,
            max_rapid_restarts: 5,
            rapid_restart_window_ms: 10_000,
        }
    }
}

/// Response generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Chat-completion endpoint URL.
    pub api_url: String,
    /// System role prompt sent with every request.
    pub system_prompt: String,
    /// How many recent transcript utterances accompany each request.
    pub history_turns: usize,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Encouraging replies substituted when generation fails, so the
    /// conversation keeps moving instead of stalling on an error.
    pub fallback_replies: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:3001/api/ai/chat".to_owned(),
            system_prompt: "You are a warm, patient English coach for truck drivers. \
                            Keep replies short and conversational (2-3 sentences), \
                            correct mistakes gently, and end with encouragement."
                .to_owned(),
            history_turns: 10,
            request_timeout_secs: 30,
            fallback_replies: vec![
                "That's wonderful! You're making great progress. Keep practicing!".to_owned(),
                "Excellent work! I can see you're really trying. That's the spirit!".to_owned(),
                "Well done! Every word you practice makes you stronger in English.".to_owned(),
                "Amazing effort! You're getting better every day. I believe in you!".to_owned(),
            ],
        }
    }
}

/// Speech synthesis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Text-to-speech endpoint URL.
    pub api_url: String,
    /// Voice or language code requested from the synthesis service.
    pub voice: String,
    /// Speaking rate multiplier (1.0 = normal).
    pub speed: f32,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:3001/api/ai/text-to-speech".to_owned(),
            voice: "en-US".to_owned(),
            speed: 1.0,
            request_timeout_secs: 15,
        }
    }
}

/// Session/orchestration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Opening line spoken before listening begins. Scenario screens
    /// parameterize the loop with this plus `generation.system_prompt`.
    pub greeting: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            greeting: "Hi! I'm your English coach. Let's practice - tell me about \
                       your day on the road."
                .to_owned(),
        }
    }
}

/// Audio output configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device name (None = system default).
    pub output_device: Option<String>,
}

impl CoachConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not valid TOML.
    pub fn from_toml_str(content: &str) -> crate::error::Result<Self> {
        toml::from_str(content).map_err(|e| crate::error::CoachError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot
    /// be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::CoachError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn defaults_match_observed_policy() {
        let config = CoachConfig::default();
        assert_eq!(config.recognition.min_utterance_chars, 2);
        assert_eq!(config.recognition.restart_delay_ms, 100);
        assert_eq!(config.generation.history_turns, 10);
        assert_eq!(config.generation.request_timeout_secs, 30);
        assert_eq!(config.synthesis.request_timeout_secs, 15);
        assert!(!config.generation.fallback_replies.is_empty());
    }

    #[test]
    fn partial_toml_keeps_defaults_elsewhere() {
        let toml_str = r#"
            [recognition]
            language = "es-MX"
            restart_delay_ms = 250

            [session]
            greeting = "Hola!"
        "#;
        let config = CoachConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.recognition.language, "es-MX");
        assert_eq!(config.recognition.restart_delay_ms, 250);
        assert_eq!(config.recognition.min_utterance_chars, 2);
        assert_eq!(config.session.greeting, "Hola!");
        assert_eq!(config.generation.history_turns, 10);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("coach.toml");

        let mut config = CoachConfig::default();
        config.synthesis.voice = "en-GB".to_owned();
        config.synthesis.speed = 0.9;
        config.save_to_file(&path).unwrap();

        let loaded = CoachConfig::from_file(&path).unwrap();
        assert_eq!(loaded.synthesis.voice, "en-GB");
        assert!((loaded.synthesis.speed - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn garbage_toml_is_a_config_error() {
        let result = CoachConfig::from_toml_str("not [valid");
        assert!(matches!(result, Err(crate::error::CoachError::Config(_))));
    }
}
