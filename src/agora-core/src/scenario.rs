//! Scenario assembly.
//!
//! Turns a [`ScenarioConfig`] into a ready [`Simulator`]: generates character
//! descriptions, fills the persona templates for the scenario kind, attaches
//! capabilities and picks the selection strategy.

use crate::agent::Agent;
use crate::config::{AgentConfig, ScenarioConfig, ScenarioKind};
use crate::director::{Director, ModelDecider, StoppingRule};
use crate::error::AgoraError;
use crate::model::ChatModel;
use crate::persona::{BiddingTemplate, Persona};
use crate::retrieval::{DocumentStore, Embedder, load_documents};
use crate::selection::strategy_by_name;
use crate::simulator::{SimulationCallback, Simulator, StopReason};
use crate::tools::{KnowledgeTool, tool_by_name};

use std::sync::Arc;

/// External services a scenario needs.
pub struct Backends {
    /// Dialogue, bids and director choices.
    pub chat: Arc<dyn ChatModel>,
    /// Character descriptions and topic sharpening.
    pub creative: Arc<dyn ChatModel>,
    /// Embeddings for agents with documents.
    pub embedder: Arc<dyn Embedder>,
}

/// Fixed wording shared by every persona in one scenario.
#[derive(Debug, Clone)]
pub struct Scenario {
    kind: ScenarioKind,
    topic: String,
    word_limit: usize,
    conversation_description: String,
}

impl Scenario {
    pub fn new(config: &ScenarioConfig) -> Self {
        let conversation_description = match config.kind {
            ScenarioKind::TelevisionDebate => {
                let panel: Vec<String> = config
                    .agents
                    .iter()
                    .map(|a| {
                        let mut line = format!("- {}", a.name);
                        if let Some(role) = &a.role {
                            line.push_str(&format!(": {}", role));
                        }
                        if let Some(location) = &a.location {
                            line.push_str(&format!(", located in {}", location));
                        }
                        line
                    })
                    .collect();
                format!(
                    "This is a talk-show episode discussing the following topic: {}.\n\n\
                     The episode features:\n{}",
                    config.topic,
                    panel.join("\n")
                )
            }
            ScenarioKind::PresidentialDebate => format!(
                "Here is the topic for the presidential debate: {}.\n\
                 The presidential candidates are: {}.",
                config.topic,
                config.agent_names().join(", ")
            ),
            ScenarioKind::Research => format!(
                "Here is the topic of conversation: {}\nThe participants are: {}",
                config.topic,
                config.agent_names().join(", ")
            ),
        };

        Self {
            kind: config.kind,
            topic: config.topic.clone(),
            word_limit: config.word_limit,
            conversation_description,
        }
    }

    pub fn conversation_description(&self) -> &str {
        &self.conversation_description
    }

    /// Ask the model for a short second-person character sketch.
    pub async fn describe(
        &self,
        model: &dyn ChatModel,
        agent: &AgentConfig,
    ) -> Result<String, AgoraError> {
        let subject = if agent.observer {
            format!(
                "the observer, {name}. Focus on how {name} should watch and report on the debate",
                name = agent.name
            )
        } else {
            match (self.kind, &agent.role, &agent.location) {
                (ScenarioKind::PresidentialDebate, _, _) => format!(
                    "the presidential candidate, {}, emphasizing their personality",
                    agent.name
                ),
                (_, Some(role), Some(location)) => format!(
                    "{}, who is a {} in {}, emphasizing their particular role and location",
                    agent.name, role, location
                ),
                (_, Some(role), None) => format!("{}, who is a {}", agent.name, role),
                _ => format!("{}. Give them a point of view", agent.name),
            }
        };

        let prompt = format!(
            "{}\nPlease reply with a creative description of {}.\n\
             Speak directly to {} in {} words or less.\nDo not add anything else.",
            self.conversation_description, subject, agent.name, self.word_limit
        );
        let description = model.complete(DESCRIBER_SYSTEM_MESSAGE, &prompt).await?;
        Ok(description.trim().to_string())
    }

    /// Context block identifying the participant.
    pub fn header(&self, agent: &AgentConfig, description: &str) -> String {
        match self.kind {
            ScenarioKind::TelevisionDebate => {
                let mut identity = format!("Your name is {}", agent.name);
                if let Some(role) = &agent.role {
                    identity.push_str(&format!(", your role is {}", role));
                }
                if let Some(location) = &agent.location {
                    identity.push_str(&format!(", and you are located in {}", location));
                }
                format!(
                    "{}\n\n{}.\n\nYour description is as follows: {}\n\n\
                     You are discussing the topic: {}.\n\n\
                     Your goal is to offer the most informative, creative and novel \
                     perspectives on the topic from the point of view of your role and location.",
                    self.conversation_description, identity, description, self.topic
                )
            }
            ScenarioKind::PresidentialDebate => format!(
                "{}\nYour name is {}.\nYou are a presidential candidate.\n\
                 Your description is as follows: {}\n\
                 You are debating the topic: {}.\n\
                 Your goal is to be as creative as possible and make the voters think you \
                 are the best candidate.",
                self.conversation_description, agent.name, description, self.topic
            ),
            ScenarioKind::Research => format!(
                "{}\n\nYour name is {}.\n\nYour description is as follows: {}\n\n\
                 Your goal is to persuade your conversation partner of your point of view.",
                self.conversation_description, agent.name, description
            ),
        }
    }

    /// Full system instruction for the participant.
    pub fn system_message(&self, agent: &AgentConfig, header: &str) -> String {
        if agent.observer {
            return format!(
                "{header}\nYou are the observer, {name}.\n\
                 As the debate unfolds, note the strengths and weaknesses of each side and \
                 give unbiased summaries.\n\
                 Speak in the third person and do not take sides.\n\
                 Keep each summary within {limit} words.\nDo not add anything else.",
                header = header,
                name = agent.name,
                limit = self.word_limit
            );
        }

        match self.kind {
            ScenarioKind::Research => format!(
                "{header}\n\n\
                 Use the lookup results you are given to refute your partner's claims.\n\
                 Cite your sources and never invent a citation.\n\
                 Do not cite any source you were not given.\n\
                 Do not add anything else.\n\
                 Stop speaking the moment you finish speaking from your perspective.",
                header = header
            ),
            ScenarioKind::TelevisionDebate | ScenarioKind::PresidentialDebate => format!(
                "{header}\n\
                 You will speak in the style of {name} and exaggerate their personality.\n\
                 Do not repeat yourself.\n\
                 Speak in the first person from the perspective of {name}.\n\
                 Describe your own body movements between '*'.\n\
                 Do not change roles and do not speak for anyone else.\n\
                 Stop speaking the moment you finish speaking from your perspective.\n\
                 Keep your response within {limit} words.\nDo not add anything else.",
                header = header,
                name = agent.name,
                limit = self.word_limit
            ),
        }
    }

    /// Ask the model to turn the raw topic into a sharper opening prompt.
    pub async fn specify_topic(
        &self,
        model: &dyn ChatModel,
        names: &[String],
    ) -> Result<String, AgoraError> {
        let framing = match self.kind {
            ScenarioKind::PresidentialDebate => {
                "You are the debate moderator. Frame the topic as a problem to be solved."
            }
            ScenarioKind::TelevisionDebate => "Frame the topic as a single question to be answered.",
            ScenarioKind::Research => "You are the moderator. Make the topic more specific.",
        };
        let prompt = format!(
            "{}\n\n{}\nBe creative and imaginative.\n\
             Please reply with the specified topic in {} words or less.\n\
             Speak directly to the participants: {}.\nDo not add anything else.",
            self.conversation_description,
            framing,
            self.word_limit,
            names.join(", ")
        );
        let topic = model.complete(TOPIC_SYSTEM_MESSAGE, &prompt).await?;
        Ok(topic.trim().to_string())
    }
}

const DESCRIBER_SYSTEM_MESSAGE: &str =
    "You can add detail to the description of each conversation participant.";
const TOPIC_SYSTEM_MESSAGE: &str = "You can make a topic more specific.";

/// A simulator plus the opening line to inject.
pub struct Simulation {
    pub simulator: Simulator,
    pub personas: Vec<Persona>,
    pub moderator: String,
    pub opening: String,
    pub max_iters: usize,
}

impl Simulation {
    pub fn with_callback(mut self, callback: SimulationCallback) -> Self {
        self.simulator = self.simulator.with_callback(callback);
        self
    }

    /// Reset, inject the opening line, then run to completion.
    pub async fn run(&mut self) -> Result<StopReason, AgoraError> {
        self.simulator.reset();
        self.simulator.inject(&self.moderator, &self.opening);
        self.simulator.run(self.max_iters).await
    }
}

/// Build every agent and the strategy described by `config`.
pub async fn build_simulation(
    config: &ScenarioConfig,
    backends: &Backends,
) -> Result<Simulation, AgoraError> {
    config.validate()?;
    let scenario = Scenario::new(config);
    let names = config.agent_names();
    let bidding = config.strategy.eq_ignore_ascii_case("bidding");

    let mut agents = Vec::with_capacity(config.agents.len());
    let mut personas = Vec::with_capacity(config.agents.len());
    for (index, agent_config) in config.agents.iter().enumerate() {
        let description = match &agent_config.description {
            Some(description) => description.clone(),
            None => scenario.describe(backends.creative.as_ref(), agent_config).await?,
        };
        let header = scenario.header(agent_config, &description);
        let system_message = scenario.system_message(agent_config, &header);

        let mut persona = Persona::new(&agent_config.name, system_message)
            .with_description(description)
            .with_header(header.clone());
        if let Some(role) = &agent_config.role {
            persona = persona.with_role(role);
        }
        if let Some(location) = &agent_config.location {
            persona = persona.with_location(location);
        }

        let mut agent = Agent::new(persona.clone(), backends.chat.clone());

        if !agent_config.tools.is_empty() {
            let mut tools: Vec<Arc<dyn KnowledgeTool>> = Vec::new();
            for name in &agent_config.tools {
                let tool = tool_by_name(name, config.top_k_results).ok_or_else(|| {
                    AgoraError::ConfigError(format!("Unknown tool '{}'", name))
                })?;
                tools.push(Arc::from(tool));
            }
            agent = agent.with_tools(tools);
        }

        if !agent_config.documents.is_empty() {
            let documents = load_documents(&agent_config.documents)?;
            let store = DocumentStore::build(backends.embedder.clone(), documents).await?;
            agent = agent.with_retrieval(Arc::new(store));
        }

        if bidding {
            agent = agent.with_bidding(BiddingTemplate::new(header));
        }

        if agent_config.director {
            let speakers = names
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != index)
                .map(|(_, name)| name.clone())
                .collect();
            let decider = ModelDecider::new(backends.chat.clone(), &persona.system_message);
            agent = agent.with_director(Director::new(
                speakers,
                Arc::new(decider),
                StoppingRule::new(config.stopping_probability, config.seed),
            ));
        }

        log::debug!("built agent {}", persona.display_name_with_role());
        agents.push(agent);
        personas.push(persona);
    }

    let opening = if config.specify_topic {
        scenario
            .specify_topic(backends.creative.as_ref(), &names)
            .await?
    } else {
        config.topic.clone()
    };

    let strategy = strategy_by_name(&config.strategy, config.seed)?;
    let simulator = Simulator::new(agents, strategy)?;

    Ok(Simulation {
        simulator,
        personas,
        moderator: config.moderator.clone(),
        opening,
        max_iters: config.max_iters,
    })
}
