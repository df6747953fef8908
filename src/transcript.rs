//! Conversation transcript: an append-only record of utterances.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Who produced an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    /// The human practicing.
    User,
    /// The coach (generated replies, greeting).
    Coach,
}

/// One finalized unit of spoken input or generated reply text.
///
/// Immutable once created.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// Stable identifier for UI correlation.
    pub id: Uuid,
    /// The finalized text.
    pub text: String,
    /// Who said it.
    pub speaker: Speaker,
    /// When it was appended to the transcript.
    pub timestamp: DateTime<Utc>,
}

impl Utterance {
    /// Create an utterance stamped with the current time.
    #[must_use]
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            speaker,
            timestamp: Utc::now(),
        }
    }
}

/// Append-only ordered record of a conversation.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<Utterance>,
}

impl Transcript {
    /// Create an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an utterance. Entries are never mutated or removed.
    pub fn push(&mut self, utterance: Utterance) {
        self.entries.push(utterance);
    }

    /// All utterances in arrival order.
    #[must_use]
    pub fn entries(&self) -> &[Utterance] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The last `n` utterances, oldest first. Used to build the recent
    /// history sent with each generation request.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<Utterance> {
        let start = self.entries.len().saturating_sub(n);
        self.entries[start..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_preserves_order() {
        let mut transcript = Transcript::new();
        transcript.push(Utterance::new(Speaker::Coach, "Hello!"));
        transcript.push(Utterance::new(Speaker::User, "Hi there"));
        transcript.push(Utterance::new(Speaker::Coach, "How are you?"));

        let texts: Vec<&str> = transcript.entries().iter().map(|u| u.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello!", "Hi there", "How are you?"]);
    }

    #[test]
    fn recent_returns_tail_oldest_first() {
        let mut transcript = Transcript::new();
        for i in 0..5 {
            transcript.push(Utterance::new(Speaker::User, format!("u{i}")));
        }

        let recent = transcript.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].text, "u3");
        assert_eq!(recent[1].text, "u4");
    }

    #[test]
    fn recent_larger_than_len_returns_all() {
        let mut transcript = Transcript::new();
        transcript.push(Utterance::new(Speaker::User, "only one"));
        assert_eq!(transcript.recent(10).len(), 1);
        assert!(Transcript::new().recent(3).is_empty());
    }
}
