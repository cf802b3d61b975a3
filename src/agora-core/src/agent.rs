//! Dialogue agents.
//!
//! One [`Agent`] type covers every participant. Optional capabilities are
//! attached with builder methods:
//!
//! - [`Agent::with_retrieval`]: inject a document passage before speaking
//! - [`Agent::with_tools`]: consult knowledge tools before speaking
//! - [`Agent::with_bidding`]: answer [`Agent::bid`] for auctions
//! - [`Agent::with_director`]: choose the next speaker and end the run

use crate::director::Director;
use crate::error::AgoraError;
use crate::model::ChatModel;
use crate::persona::{BiddingTemplate, Persona};
use crate::retrieval::Retriever;
use crate::tools::KnowledgeTool;

use std::sync::Arc;

/// First line of every private history.
pub const HISTORY_SENTINEL: &str = "Here is the conversation so far.";

/// Query issued by retrieval-augmented agents on every turn.
///
/// It is fixed and does not follow the conversation, so the same passage is
/// usually injected each turn.
pub const RETRIEVAL_QUERY: &str = "is there an email i can ask for help";

/// How many passages the retrieval query asks for. Only the best is used.
pub const RETRIEVAL_K: usize = 3;

struct DocumentRetrieval {
    retriever: Arc<dyn Retriever>,
    query: String,
    k: usize,
}

/// A persona-bound participant.
pub struct Agent {
    persona: Persona,
    model: Arc<dyn ChatModel>,
    history: Vec<String>,
    retrieval: Option<DocumentRetrieval>,
    tools: Vec<Arc<dyn KnowledgeTool>>,
    bidding: Option<BiddingTemplate>,
    director: Option<Director>,
}

impl Agent {
    pub fn new(persona: Persona, model: Arc<dyn ChatModel>) -> Self {
        Self {
            persona,
            model,
            history: vec![HISTORY_SENTINEL.to_string()],
            retrieval: None,
            tools: Vec::new(),
            bidding: None,
            director: None,
        }
    }

    /// Attach a document store queried with [`RETRIEVAL_QUERY`].
    pub fn with_retrieval(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retrieval = Some(DocumentRetrieval {
            retriever,
            query: RETRIEVAL_QUERY.to_string(),
            k: RETRIEVAL_K,
        });
        self
    }

    pub fn with_tools(mut self, tools: Vec<Arc<dyn KnowledgeTool>>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_bidding(mut self, template: BiddingTemplate) -> Self {
        self.bidding = Some(template);
        self
    }

    pub fn with_director(mut self, director: Director) -> Self {
        self.director = Some(director);
        self
    }

    pub fn name(&self) -> &str {
        &self.persona.name
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// Private view of the conversation, sentinel first.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn can_bid(&self) -> bool {
        self.bidding.is_some()
    }

    pub fn director(&self) -> Option<&Director> {
        self.director.as_ref()
    }

    pub fn is_director(&self) -> bool {
        self.director.is_some()
    }

    /// Forget everything heard. Also clears a director's stop flag.
    pub fn reset(&mut self) {
        self.history.clear();
        self.history.push(HISTORY_SENTINEL.to_string());
        if let Some(director) = self.director.as_mut() {
            director.reset();
        }
    }

    /// Record that `speaker` said `message`.
    pub fn receive(&mut self, speaker: &str, message: &str) {
        self.history.push(format!("{}: {}", speaker, message));
    }

    /// Generate this agent's next line.
    pub async fn send(&mut self) -> Result<String, AgoraError> {
        self.apply_retrieval().await?;
        let findings = self.consult_tools().await?;

        let mut lines: Vec<&str> = self.history.iter().map(String::as_str).collect();
        if let Some(findings) = findings.as_deref() {
            lines.push(findings);
        }
        let cue = self.persona.speaking_cue();
        lines.push(&cue);
        let prompt = lines.join("\n");

        let message = self
            .model
            .complete(&self.persona.system_message, &prompt)
            .await?;

        if let Some(director) = self.director.as_mut() {
            director.record_turn();
        }
        Ok(message)
    }

    /// Ask the model for a bid. The raw reply is returned unparsed.
    pub async fn bid(&self) -> Result<String, AgoraError> {
        let template = self
            .bidding
            .as_ref()
            .ok_or_else(|| AgoraError::MissingCapability {
                agent: self.persona.name.clone(),
                capability: "bidding",
            })?;

        let recent = self.history.last().map(String::as_str).unwrap_or_default();
        let prompt = template.render(&self.history.join("\n"), recent);
        self.model
            .complete(&self.persona.system_message, &prompt)
            .await
    }

    /// Director only: ask the decider who speaks next. The index refers to
    /// the director's candidate list, which excludes the director itself.
    pub async fn select_next_speaker(&self) -> Result<usize, AgoraError> {
        let director = self
            .director
            .as_ref()
            .ok_or_else(|| AgoraError::MissingCapability {
                agent: self.persona.name.clone(),
                capability: "director",
            })?;
        director
            .select_next_speaker(&self.history.join("\n"))
            .await
    }

    async fn apply_retrieval(&mut self) -> Result<(), AgoraError> {
        let Some(retrieval) = self.retrieval.as_ref() else {
            return Ok(());
        };
        let passages = retrieval
            .retriever
            .retrieve(&retrieval.query, retrieval.k)
            .await?;
        if let Some(best) = passages.into_iter().next() {
            log::debug!("{} pulled a {}-char passage", self.persona.name, best.len());
            self.history.push(best);
        }
        Ok(())
    }

    /// Look up the latest line with every tool. Findings go into this turn's
    /// prompt only and are not kept in the history.
    async fn consult_tools(&self) -> Result<Option<String>, AgoraError> {
        if self.tools.is_empty() || self.history.len() < 2 {
            return Ok(None);
        }
        let Some(latest) = self.history.last() else {
            return Ok(None);
        };
        let query = latest
            .split_once(": ")
            .map(|(_, text)| text)
            .unwrap_or(latest.as_str());

        let mut sections = Vec::with_capacity(self.tools.len());
        for tool in &self.tools {
            let found = tool
                .lookup(query)
                .await
                .map_err(|e| AgoraError::ToolError {
                    tool: tool.name().to_string(),
                    message: e.to_string(),
                })?;
            sections.push(format!("[{} results]\n{}", tool.name(), found));
        }
        Ok(Some(sections.join("\n\n")))
    }
}
