//! Error types for the conversation core.

/// Top-level error type for the voice conversation loop.
#[derive(Debug, thiserror::Error)]
pub enum CoachError {
    /// Speech recognition backend error.
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Response generation (chat completion) error.
    #[error("generation error: {0}")]
    Generation(String),

    /// Speech synthesis error.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Audio playback error.
    #[error("playback error: {0}")]
    Playback(String),

    /// Audio device or decode error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, CoachError>;
