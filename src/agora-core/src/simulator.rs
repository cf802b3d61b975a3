//! Turn loop.
//!
//! The simulator owns the agents, the selection strategy and the transcript.
//! Each [`Simulator::step`] produces exactly one utterance and broadcasts it
//! to every agent.

use crate::agent::Agent;
use crate::error::AgoraError;
use crate::selection::SelectionStrategy;
use crate::transcript::{Transcript, Utterance};

use std::collections::HashSet;

/// Callback for simulation events.
pub type SimulationCallback = Box<dyn Fn(SimulationEvent) + Send + Sync>;

/// Events emitted during a run.
#[derive(Debug, Clone)]
pub enum SimulationEvent {
    /// A message was injected without generation.
    Seeded { speaker: String, text: String },
    /// An auction finished.
    Bids {
        bids: Vec<(String, i64)>,
        selected: String,
    },
    /// An agent spoke.
    Spoke {
        step: usize,
        speaker: String,
        text: String,
    },
    /// The run loop ended.
    Stopped { steps: usize, reason: StopReason },
}

/// Why [`Simulator::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The iteration cap was reached.
    IterationCap,
    /// A director drew its stop flag.
    DirectorStopped,
}

pub struct Simulator {
    agents: Vec<Agent>,
    strategy: Box<dyn SelectionStrategy>,
    step: usize,
    transcript: Transcript,
    callback: Option<SimulationCallback>,
}

impl Simulator {
    /// Create a simulator. Agent names must be unique and there must be
    /// enough agents for the strategy.
    pub fn new(
        agents: Vec<Agent>,
        strategy: Box<dyn SelectionStrategy>,
    ) -> Result<Self, AgoraError> {
        let min = strategy.min_agents();
        if agents.len() < min {
            return Err(AgoraError::InvalidAgentCount {
                min,
                actual: agents.len(),
            });
        }

        let mut seen = HashSet::new();
        for agent in &agents {
            if !seen.insert(agent.name()) {
                return Err(AgoraError::DuplicateAgent(agent.name().to_string()));
            }
        }

        strategy.validate(&agents)?;

        Ok(Self {
            agents,
            strategy,
            step: 0,
            transcript: Transcript::new(),
            callback: None,
        })
    }

    /// Set a callback for simulation events.
    pub fn with_callback(mut self, callback: SimulationCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Return every agent and the transcript to the empty state.
    pub fn reset(&mut self) {
        for agent in &mut self.agents {
            agent.reset();
        }
        self.transcript.clear();
        self.step = 0;
    }

    /// Put a line into every agent's history without anyone generating it.
    pub fn inject(&mut self, speaker: &str, text: &str) {
        for agent in &mut self.agents {
            agent.receive(speaker, text);
        }
        self.transcript.push(Utterance::injected(speaker, text));
        self.emit_event(SimulationEvent::Seeded {
            speaker: speaker.to_string(),
            text: text.to_string(),
        });
    }

    /// Select a speaker, let it speak, broadcast the line, advance the counter.
    pub async fn step(&mut self) -> Result<(String, String), AgoraError> {
        let speaker_idx = self.strategy.select(self.step, &self.agents).await?;
        let speaker_name = match self.agents.get(speaker_idx) {
            Some(agent) => agent.name().to_string(),
            None => {
                return Err(AgoraError::UnknownSpeaker {
                    choice: format!("#{}", speaker_idx),
                    candidates: self.agents.iter().map(|a| a.name().to_string()).collect(),
                });
            }
        };

        if let Some(bids) = self.strategy.last_bids() {
            let bids = self
                .agents
                .iter()
                .map(|a| a.name().to_string())
                .zip(bids.iter().copied())
                .collect();
            self.emit_event(SimulationEvent::Bids {
                bids,
                selected: speaker_name.clone(),
            });
        }

        let message = self.agents[speaker_idx].send().await?;
        log::debug!("step {}: {} spoke", self.step, speaker_name);

        for agent in &mut self.agents {
            agent.receive(&speaker_name, &message);
        }
        self.transcript
            .push(Utterance::spoken(speaker_name.clone(), message.clone()));

        self.emit_event(SimulationEvent::Spoke {
            step: self.step,
            speaker: speaker_name.clone(),
            text: message.clone(),
        });

        self.step += 1;
        Ok((speaker_name, message))
    }

    /// Step until `max_iters` turns have been taken or a director stops.
    pub async fn run(&mut self, max_iters: usize) -> Result<StopReason, AgoraError> {
        log::info!(
            "running up to {} steps with {} strategy",
            max_iters,
            self.strategy.name()
        );

        let mut reason = StopReason::IterationCap;
        for _ in 0..max_iters {
            self.step().await?;
            if self.director_stopped() {
                reason = StopReason::DirectorStopped;
                break;
            }
        }

        log::info!("simulation ended after {} steps ({:?})", self.step, reason);
        self.emit_event(SimulationEvent::Stopped {
            steps: self.step,
            reason,
        });
        Ok(reason)
    }

    /// True once any director has drawn its stop flag.
    pub fn director_stopped(&self) -> bool {
        self.agents
            .iter()
            .filter_map(Agent::director)
            .any(|d| d.should_stop())
    }

    /// Number of completed steps.
    pub fn step_count(&self) -> usize {
        self.step
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Emit an event if a callback is registered.
    fn emit_event(&self, event: SimulationEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::HISTORY_SENTINEL;
    use crate::director::{Decider, Director, StoppingRule};
    use crate::persona::{BiddingTemplate, Persona};
    use crate::selection::{Alternating, BiddingAuction, DirectorDelegated, PrivilegedRoundRobin};
    use crate::testing::{FailingModel, ScriptedModel};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    fn roster(names: &[&str]) -> Vec<Agent> {
        names
            .iter()
            .map(|name| {
                Agent::new(
                    Persona::new(*name, format!("You are {}.", name)),
                    Arc::new(ScriptedModel::repeating(&format!("{} speaking", name))),
                )
            })
            .collect()
    }

    struct CyclingDecider(Mutex<usize>);

    #[async_trait]
    impl Decider for CyclingDecider {
        async fn choose_index(&self, _: &str, candidates: &[String]) -> Result<usize, AgoraError> {
            let mut next = self.0.lock().unwrap();
            let index = *next % candidates.len();
            *next += 1;
            Ok(index)
        }
    }

    #[tokio::test]
    async fn test_alternating_end_to_end() {
        let mut sim = Simulator::new(roster(&["A", "B", "C"]), Box::new(Alternating)).unwrap();
        sim.reset();
        sim.inject("Moderator", "topic");

        let mut speakers = Vec::new();
        for _ in 0..3 {
            let (name, text) = sim.step().await.unwrap();
            assert_eq!(text, format!("{} speaking", name));
            speakers.push(name);
        }

        assert_eq!(speakers, vec!["A", "B", "C"]);
        assert_eq!(sim.transcript().spoken_len(), 3);
        assert_eq!(sim.transcript().len(), 4);
    }

    #[tokio::test]
    async fn test_histories_track_steps() {
        let mut sim =
            Simulator::new(roster(&["A", "B", "C", "D"]), Box::new(PrivilegedRoundRobin)).unwrap();
        sim.reset();
        sim.inject("X", "hello");

        let k = 5;
        for _ in 0..k {
            sim.step().await.unwrap();
        }

        assert_eq!(sim.step_count(), k);
        assert_eq!(sim.transcript().spoken_len(), sim.step_count());
        for agent in sim.agents() {
            assert_eq!(agent.history().len(), 1 + k + 1);
            assert_eq!(agent.history()[1], "X: hello");
        }
        let order: Vec<&str> = sim
            .transcript()
            .spoken()
            .map(|u| u.speaker.as_str())
            .collect();
        assert_eq!(order, vec!["A", "B", "A", "C", "A"]);
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let mut sim = Simulator::new(roster(&["A", "B"]), Box::new(Alternating)).unwrap();
        sim.inject("X", "hello");
        sim.step().await.unwrap();

        sim.reset();
        let once: Vec<Vec<String>> = sim.agents().iter().map(|a| a.history().to_vec()).collect();
        sim.reset();
        let twice: Vec<Vec<String>> = sim.agents().iter().map(|a| a.history().to_vec()).collect();

        assert_eq!(once, twice);
        assert!(once.iter().all(|h| h == &[HISTORY_SENTINEL]));
        assert_eq!(sim.step_count(), 0);
        assert!(sim.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_director_run_stops_on_flag() {
        let mut agents = roster(&["Host", "B", "C"]);
        let director = Director::new(
            vec!["B".into(), "C".into()],
            Arc::new(CyclingDecider(Mutex::new(0))),
            StoppingRule::new(1.0, Some(3)),
        );
        agents[0] = Agent::new(
            Persona::new("Host", "You host."),
            Arc::new(ScriptedModel::repeating("Thanks everyone.")),
        )
        .with_director(director);

        let events = Arc::new(Mutex::new(Vec::<SimulationEvent>::new()));
        let sink = events.clone();
        let mut sim = Simulator::new(agents, Box::new(DirectorDelegated))
            .unwrap()
            .with_callback(Box::new(move |event: SimulationEvent| sink.lock().unwrap().push(event)));

        sim.reset();
        sim.inject("Audience member", "What is ML?");
        let reason = sim.run(10).await.unwrap();

        assert_eq!(reason, StopReason::DirectorStopped);
        assert_eq!(sim.step_count(), 1);
        let events = events.lock().unwrap();
        assert!(matches!(events[0], SimulationEvent::Seeded { .. }));
        assert!(matches!(
            events.last(),
            Some(SimulationEvent::Stopped { steps: 1, reason: StopReason::DirectorStopped })
        ));
    }

    #[tokio::test]
    async fn test_director_run_alternates_with_choices() {
        let mut agents = roster(&["Host", "B", "C"]);
        let director = Director::new(
            vec!["B".into(), "C".into()],
            Arc::new(CyclingDecider(Mutex::new(0))),
            StoppingRule::new(0.0, Some(3)),
        );
        agents[0] = Agent::new(
            Persona::new("Host", "You host."),
            Arc::new(ScriptedModel::repeating("Next question.")),
        )
        .with_director(director);

        let mut sim = Simulator::new(agents, Box::new(DirectorDelegated)).unwrap();
        let reason = sim.run(4).await.unwrap();

        assert_eq!(reason, StopReason::IterationCap);
        let order: Vec<&str> = sim
            .transcript()
            .spoken()
            .map(|u| u.speaker.as_str())
            .collect();
        assert_eq!(order, vec!["Host", "B", "Host", "C"]);
    }

    #[tokio::test]
    async fn test_bidding_emits_bids() {
        let agents: Vec<Agent> = [("A", "<2>"), ("B", "<6>")]
            .iter()
            .map(|(name, bid)| {
                Agent::new(Persona::new(*name, ""), Arc::new(ScriptedModel::repeating(bid)))
                    .with_bidding(BiddingTemplate::new(*name))
            })
            .collect();

        let events = Arc::new(Mutex::new(Vec::<SimulationEvent>::new()));
        let sink = events.clone();
        let mut sim = Simulator::new(agents, Box::new(BiddingAuction::new(Some(1)).unwrap()))
            .unwrap()
            .with_callback(Box::new(move |event: SimulationEvent| sink.lock().unwrap().push(event)));

        let (speaker, _) = sim.step().await.unwrap();
        assert_eq!(speaker, "B");

        let events = events.lock().unwrap();
        match &events[0] {
            SimulationEvent::Bids { bids, selected } => {
                assert_eq!(bids, &vec![("A".to_string(), 2), ("B".to_string(), 6)]);
                assert_eq!(selected, "B");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_new_rejects_bad_rosters() {
        assert!(matches!(
            Simulator::new(roster(&["A"]), Box::new(PrivilegedRoundRobin)),
            Err(AgoraError::InvalidAgentCount { min: 2, actual: 1 })
        ));
        assert!(matches!(
            Simulator::new(roster(&["A", "A"]), Box::new(Alternating)),
            Err(AgoraError::DuplicateAgent(_))
        ));
        assert!(matches!(
            Simulator::new(roster(&["A", "B"]), Box::new(DirectorDelegated)),
            Err(AgoraError::MissingCapability { capability: "director", .. })
        ));
        assert!(matches!(
            Simulator::new(roster(&["A", "B"]), Box::new(BiddingAuction::new(None).unwrap())),
            Err(AgoraError::MissingCapability { capability: "bidding", .. })
        ));

        for speakers in [vec!["C", "B"], vec!["B"], vec!["A", "B", "C"]] {
            let mut agents = roster(&["A", "B", "C"]);
            let director = Director::new(
                speakers.iter().map(|s| s.to_string()).collect(),
                Arc::new(CyclingDecider(Mutex::new(0))),
                StoppingRule::new(0.0, Some(1)),
            );
            agents[0] = Agent::new(Persona::new("A", ""), Arc::new(ScriptedModel::repeating("")))
                .with_director(director);
            assert!(
                matches!(
                    Simulator::new(agents, Box::new(DirectorDelegated)),
                    Err(AgoraError::ConfigError(_))
                ),
                "accepted speakers {:?}",
                speakers
            );
        }
    }

    #[tokio::test]
    async fn test_failed_send_leaves_state_untouched() {
        let mut agents = roster(&["A", "B"]);
        agents[1] = Agent::new(Persona::new("B", ""), Arc::new(FailingModel));
        let mut sim = Simulator::new(agents, Box::new(Alternating)).unwrap();
        sim.inject("X", "hello");
        sim.step().await.unwrap();

        let before: Vec<Vec<String>> = sim.agents().iter().map(|a| a.history().to_vec()).collect();
        assert!(sim.step().await.is_err());

        assert_eq!(sim.step_count(), 1);
        assert_eq!(sim.transcript().spoken_len(), 1);
        assert_eq!(sim.transcript().len(), 2);
        let after: Vec<Vec<String>> = sim.agents().iter().map(|a| a.history().to_vec()).collect();
        assert_eq!(before, after);
    }
}
