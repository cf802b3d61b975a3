//! Deterministic fakes shared by the unit tests.

use crate::error::AgoraError;
use crate::model::ChatModel;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replies from a script, then falls back to a fixed line.
pub(crate) struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    fallback: String,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedModel {
    pub(crate) fn new<'a>(replies: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(str::to_string).collect()),
            fallback: "...".to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn repeating(reply: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every `(system, human)` pair seen so far.
    pub(crate) fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, system: &str, human: &str) -> Result<String, AgoraError> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), human.to_string()));
        let next = self.replies.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Always fails, standing in for a network error.
pub(crate) struct FailingModel;

#[async_trait]
impl ChatModel for FailingModel {
    async fn complete(&self, _system: &str, _human: &str) -> Result<String, AgoraError> {
        Err(AgoraError::EmptyResponse("failing".to_string()))
    }
}
