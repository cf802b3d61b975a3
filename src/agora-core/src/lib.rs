//! Agora Core Library
//!
//! Runs scripted multi-agent conversations: persona-bound agents, speaker
//! selection strategies, an optional director and the turn loop that ties
//! them together.

pub mod agent;
pub mod bidding;
pub mod config;
pub mod director;
pub mod error;
pub mod model;
pub mod persona;
pub mod retrieval;
pub mod scenario;
pub mod selection;
pub mod simulator;
pub mod tools;
pub mod transcript;

#[cfg(test)]
mod testing;

pub use agent::Agent;
pub use config::{AgentConfig, ModelConfig, ScenarioConfig, ScenarioKind, default_config};
pub use director::{Decider, Director, ModelDecider, StoppingRule};
pub use error::AgoraError;
pub use model::{ApiSettings, ChatModel, OpenAIChatModel};
pub use persona::{BiddingTemplate, Persona};
pub use retrieval::{DocumentStore, Embedder, HashingEmbedder, OpenAIEmbedder, Retriever};
pub use scenario::{Backends, Scenario, Simulation, build_simulation};
pub use selection::{SelectionStrategy, available_strategies, strategy_by_name};
pub use simulator::{SimulationCallback, SimulationEvent, Simulator, StopReason};
pub use tools::{KnowledgeTool, available_tools, tool_by_name};
pub use transcript::{Transcript, Utterance};
