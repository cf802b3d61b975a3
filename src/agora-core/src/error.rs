//! Error types for the simulation.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgoraError {
    #[error("Invalid agent count: need at least {min}, got {actual}")]
    InvalidAgentCount { min: usize, actual: usize },

    #[error("Duplicate agent name: {0}")]
    DuplicateAgent(String),

    #[error("OpenAI API error: {0}")]
    OpenAIError(#[from] async_openai::error::OpenAIError),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Pattern error: {0}")]
    PatternError(#[from] regex::Error),

    #[error("Model returned no content for {0}")]
    EmptyResponse(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown selection strategy: {0}")]
    UnknownStrategy(String),

    #[error("Agent '{agent}' lacks the {capability} capability")]
    MissingCapability { agent: String, capability: &'static str },

    #[error("Director chose '{choice}', which is not one of: {}", candidates.join(", "))]
    UnknownSpeaker {
        choice: String,
        candidates: Vec<String>,
    },

    #[error("Retrieval error: {0}")]
    RetrievalError(String),

    #[error("Tool '{tool}' failed: {message}")]
    ToolError { tool: String, message: String },
}
