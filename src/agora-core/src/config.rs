//! Configuration module for loading TOML scenario files.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AgoraError;
use crate::selection::available_strategies;
use crate::tools::available_tools;

/// Which family of persona templates a scenario uses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    /// Talk-show panel with a host and guests.
    TelevisionDebate,
    /// Candidates arguing a policy topic.
    PresidentialDebate,
    /// Participants who look things up to support their view.
    Research,
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub kind: ScenarioKind,
    pub topic: String,
    #[serde(default = "default_word_limit")]
    pub word_limit: usize,
    #[serde(default = "default_max_iters")]
    pub max_iters: usize,
    /// One of [`available_strategies`].
    pub strategy: String,
    #[serde(default = "default_stopping_probability")]
    pub stopping_probability: f64,
    /// Seed for tie-breaks and stop draws. Entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Who injects the opening message.
    #[serde(default = "default_moderator")]
    pub moderator: String,
    /// Ask the model to sharpen the topic before the run.
    #[serde(default)]
    pub specify_topic: bool,
    /// Results per knowledge-tool lookup.
    #[serde(default = "default_top_k_results")]
    pub top_k_results: usize,
    #[serde(default)]
    pub model: ModelConfig,
    pub agents: Vec<AgentConfig>,
}

/// Model settings shared by every agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,
    /// Temperature for dialogue, bids and director choices.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Temperature for character descriptions and topic sharpening.
    #[serde(default = "default_creative_temperature")]
    pub creative_temperature: f32,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            temperature: default_temperature(),
            creative_temperature: default_creative_temperature(),
            embedding_model: default_embedding_model(),
        }
    }
}

/// One participant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// Fixed character description; generated by the model when absent.
    #[serde(default)]
    pub description: Option<String>,
    /// Knowledge tools, by name.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Plain-text files loaded into this agent's document store.
    #[serde(default)]
    pub documents: Vec<PathBuf>,
    #[serde(default)]
    pub director: bool,
    /// Summarise the debate in the third person instead of taking part.
    #[serde(default)]
    pub observer: bool,
}

impl AgentConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

fn default_word_limit() -> usize {
    50
}

fn default_max_iters() -> usize {
    10
}

fn default_stopping_probability() -> f64 {
    0.2
}

fn default_moderator() -> String {
    "Moderator".to_string()
}

fn default_top_k_results() -> usize {
    2
}

fn default_model_name() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_creative_temperature() -> f32 {
    1.0
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

impl ScenarioConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AgoraError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| AgoraError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    pub fn from_str(content: &str) -> Result<Self, AgoraError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AgoraError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the simulator could not run.
    pub fn validate(&self) -> Result<(), AgoraError> {
        let strategy = self.strategy.to_lowercase();
        if !available_strategies().contains(&strategy.as_str()) {
            return Err(AgoraError::UnknownStrategy(self.strategy.clone()));
        }

        let min = if strategy == "alternating" || strategy == "bidding" { 1 } else { 2 };
        if self.agents.len() < min {
            return Err(AgoraError::InvalidAgentCount {
                min,
                actual: self.agents.len(),
            });
        }

        let mut names = HashSet::new();
        for agent in &self.agents {
            if agent.name.trim().is_empty() {
                return Err(AgoraError::ConfigError("Agent name cannot be empty".into()));
            }
            if !names.insert(agent.name.as_str()) {
                return Err(AgoraError::DuplicateAgent(agent.name.clone()));
            }
            for tool in &agent.tools {
                if !available_tools().contains(&tool.to_lowercase().as_str()) {
                    return Err(AgoraError::ConfigError(format!(
                        "Unknown tool '{}' for {}. Available tools: {}",
                        tool,
                        agent.name,
                        available_tools().join(", ")
                    )));
                }
            }
        }

        let directors: Vec<usize> = self
            .agents
            .iter()
            .enumerate()
            .filter(|(_, a)| a.director)
            .map(|(i, _)| i)
            .collect();
        if strategy == "director" && directors != [0] {
            return Err(AgoraError::ConfigError(
                "The director strategy needs exactly one director, listed first".into(),
            ));
        }
        if strategy != "director" && !directors.is_empty() {
            return Err(AgoraError::ConfigError(format!(
                "Directors are only used by the director strategy, not '{}'",
                self.strategy
            )));
        }

        if !(0.0..=1.0).contains(&self.stopping_probability) {
            return Err(AgoraError::ConfigError(format!(
                "stopping_probability must be within [0, 1], got {}",
                self.stopping_probability
            )));
        }

        Ok(())
    }

    pub fn agent_names(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.name.clone()).collect()
    }
}

/// Default scenario embedded in the binary: a talk-show panel on machine
/// learning, run by its host.
pub fn default_config() -> ScenarioConfig {
    let guest = |name: &str, role: &str, location: &str| AgentConfig {
        role: Some(role.to_string()),
        location: Some(location.to_string()),
        ..AgentConfig::new(name)
    };

    ScenarioConfig {
        kind: ScenarioKind::TelevisionDebate,
        topic: "The basics of machine learning".to_string(),
        word_limit: default_word_limit(),
        max_iters: default_max_iters(),
        strategy: "director".to_string(),
        stopping_probability: default_stopping_probability(),
        seed: None,
        moderator: "Audience member".to_string(),
        specify_topic: true,
        top_k_results: default_top_k_results(),
        model: ModelConfig::default(),
        agents: vec![
            AgentConfig {
                director: true,
                ..guest("Andrew Ng", "Host of the show", "Palo Alto")
            },
            guest(
                "Geoffrey Hinton",
                "Pioneer of neural networks and deep learning",
                "Toronto",
            ),
            guest(
                "Yann LeCun",
                "Chief AI scientist at a large social media company",
                "New York",
            ),
            guest(
                "Fei-Fei Li",
                "Expert in computer vision and AI ethics",
                "Stanford",
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PRESIDENTIAL: &str = r#"
kind = "presidential_debate"
topic = "transcontinental high speed rail"
strategy = "bidding"
seed = 7

[model]
name = "gpt-4o"

[[agents]]
name = "Candidate A"

[[agents]]
name = "Candidate B"
description = "A cautious fiscal hawk."
"#;

    #[test]
    fn test_default_config_is_valid() {
        let config = default_config();
        config.validate().unwrap();
        assert!(config.agents[0].director);
        assert_eq!(config.agents.len(), 4);
    }

    #[test]
    fn test_from_str_applies_defaults() {
        let config = ScenarioConfig::from_str(PRESIDENTIAL).unwrap();
        assert_eq!(config.kind, ScenarioKind::PresidentialDebate);
        assert_eq!(config.word_limit, 50);
        assert_eq!(config.max_iters, 10);
        assert_eq!(config.moderator, "Moderator");
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.model.name, "gpt-4o");
        assert_eq!(config.model.temperature, 0.2);
        assert_eq!(
            config.agents[1].description.as_deref(),
            Some("A cautious fiscal hawk.")
        );
        assert_eq!(config.agent_names(), vec!["Candidate A", "Candidate B"]);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PRESIDENTIAL.as_bytes()).unwrap();
        let config = ScenarioConfig::load(file.path()).unwrap();
        assert_eq!(config.strategy, "bidding");
    }

    #[test]
    fn test_load_missing_file() {
        let result = ScenarioConfig::load("/nonexistent/agora.toml");
        assert!(matches!(result, Err(AgoraError::ConfigError(_))));
    }

    #[test]
    fn test_rejects_unknown_strategy() {
        let content = PRESIDENTIAL.replace("\"bidding\"", "\"shouting\"");
        assert!(matches!(
            ScenarioConfig::from_str(&content),
            Err(AgoraError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let content = PRESIDENTIAL.replace("Candidate B", "Candidate A");
        assert!(matches!(
            ScenarioConfig::from_str(&content),
            Err(AgoraError::DuplicateAgent(_))
        ));
    }

    #[test]
    fn test_director_must_come_first() {
        let mut config = default_config();
        config.agents.swap(0, 1);
        assert!(matches!(config.validate(), Err(AgoraError::ConfigError(_))));

        let mut config = default_config();
        config.strategy = "round_robin".into();
        assert!(matches!(config.validate(), Err(AgoraError::ConfigError(_))));
    }

    #[test]
    fn test_rejects_bad_probability_and_tools() {
        let mut config = default_config();
        config.stopping_probability = 1.5;
        assert!(matches!(config.validate(), Err(AgoraError::ConfigError(_))));

        let mut config = default_config();
        config.agents[1].tools = vec!["google".into()];
        assert!(matches!(config.validate(), Err(AgoraError::ConfigError(_))));
    }
}
