//! Director capability.
//!
//! A director picks who speaks after it and may end the conversation. Both
//! decisions are delegated: the choice to a [`Decider`], the ending to a
//! seeded coin flip.

use crate::error::AgoraError;
use crate::model::ChatModel;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// Chooses one of several candidates given the conversation so far.
#[async_trait]
pub trait Decider: Send + Sync {
    async fn choose_index(
        &self,
        conversation: &str,
        candidates: &[String],
    ) -> Result<usize, AgoraError>;
}

/// [`Decider`] that asks a chat model to name the next speaker.
pub struct ModelDecider {
    model: Arc<dyn ChatModel>,
    system_message: String,
}

impl ModelDecider {
    pub fn new(model: Arc<dyn ChatModel>, system_message: impl Into<String>) -> Self {
        Self {
            model,
            system_message: system_message.into(),
        }
    }
}

#[async_trait]
impl Decider for ModelDecider {
    async fn choose_index(
        &self,
        conversation: &str,
        candidates: &[String],
    ) -> Result<usize, AgoraError> {
        let prompt = format!(
            "{conversation}\n\n\
             Given the conversation above, select the next person to speak.\n\
             Choose exactly one of: {names}.\n\
             Reply with the name only. Do nothing else.",
            names = candidates.join(", "),
        );
        let reply = self.model.complete(&self.system_message, &prompt).await?;
        resolve_choice(&reply, candidates)
    }
}

/// Map a reply to a candidate index. The reply must name a candidate exactly,
/// ignoring surrounding whitespace, quotes, angle brackets and a trailing period.
pub fn resolve_choice(reply: &str, candidates: &[String]) -> Result<usize, AgoraError> {
    let choice = reply
        .trim()
        .trim_end_matches('.')
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '<' | '>'))
        .trim();

    candidates
        .iter()
        .position(|name| name == choice)
        .ok_or_else(|| AgoraError::UnknownSpeaker {
            choice: choice.to_string(),
            candidates: candidates.to_vec(),
        })
}

/// Independent per-turn stop draw.
#[derive(Debug, Clone)]
pub struct StoppingRule {
    probability: f64,
    rng: StdRng,
}

impl StoppingRule {
    /// `probability` is clamped to `[0, 1]`; NaN counts as 0. Without a seed
    /// the generator is seeded from OS entropy.
    pub fn new(probability: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            probability: if probability.is_nan() {
                0.0
            } else {
                probability.clamp(0.0, 1.0)
            },
            rng,
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn draw(&mut self) -> bool {
        self.rng.gen_bool(self.probability)
    }
}

/// State a director carries on top of a normal agent.
pub struct Director {
    speakers: Vec<String>,
    decider: Arc<dyn Decider>,
    stopping: StoppingRule,
    stop: bool,
}

impl Director {
    /// `speakers` are the other agents, in simulator order, director excluded.
    pub fn new(speakers: Vec<String>, decider: Arc<dyn Decider>, stopping: StoppingRule) -> Self {
        Self {
            speakers,
            decider,
            stopping,
            stop: false,
        }
    }

    pub fn speakers(&self) -> &[String] {
        &self.speakers
    }

    pub fn should_stop(&self) -> bool {
        self.stop
    }

    pub fn reset(&mut self) {
        self.stop = false;
    }

    /// Called once after each of the director's own utterances.
    pub fn record_turn(&mut self) {
        self.stop = self.stopping.draw();
        if self.stop {
            log::info!(
                "director chose to stop (p = {})",
                self.stopping.probability()
            );
        }
    }

    /// Index into [`Director::speakers`] of whoever should speak next.
    pub async fn select_next_speaker(&self, conversation: &str) -> Result<usize, AgoraError> {
        let index = self
            .decider
            .choose_index(conversation, &self.speakers)
            .await?;
        match self.speakers.get(index) {
            Some(name) => {
                log::debug!("director selected {}", name);
                Ok(index)
            }
            None => Err(AgoraError::UnknownSpeaker {
                choice: format!("#{}", index),
                candidates: self.speakers.clone(),
            }),
        }
    }
}
