//! The shared record of a run.

use serde::{Deserialize, Serialize};

/// One line of the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Utterance {
    /// Who said it.
    pub speaker: String,
    /// What was said.
    pub text: String,
    /// True for seed messages pushed in by [`crate::Simulator::inject`].
    pub injected: bool,
}

impl Utterance {
    pub fn spoken(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            injected: false,
        }
    }

    pub fn injected(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            injected: true,
        }
    }
}

/// Append-only log of utterances for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    utterances: Vec<Utterance>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.utterances.clear();
    }

    pub fn push(&mut self, utterance: Utterance) {
        self.utterances.push(utterance);
    }

    /// Everything, seeds included.
    pub fn utterances(&self) -> &[Utterance] {
        &self.utterances
    }

    /// Lines produced by agents, without injected seeds.
    pub fn spoken(&self) -> impl Iterator<Item = &Utterance> {
        self.utterances.iter().filter(|u| !u.injected)
    }

    pub fn spoken_len(&self) -> usize {
        self.spoken().count()
    }

    pub fn len(&self) -> usize {
        self.utterances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utterances.is_empty()
    }

    pub fn last(&self) -> Option<&Utterance> {
        self.utterances.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spoken_excludes_injected() {
        let mut transcript = Transcript::new();
        transcript.push(Utterance::injected("Moderator", "topic"));
        transcript.push(Utterance::spoken("Ada", "first"));
        transcript.push(Utterance::spoken("Bob", "second"));

        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript.spoken_len(), 2);
        assert_eq!(transcript.last().map(|u| u.speaker.as_str()), Some("Bob"));
    }

    #[test]
    fn test_clear_empties_log() {
        let mut transcript = Transcript::new();
        transcript.push(Utterance::spoken("Ada", "hi"));
        transcript.clear();
        assert!(transcript.is_empty());
        assert_eq!(transcript.spoken_len(), 0);
    }
}
