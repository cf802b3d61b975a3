//! Speaker selection strategies.
//!
//! A strategy maps the step counter and the agent roster to the index of the
//! next speaker. The arithmetic lives in plain functions
//! ([`alternate`], [`privileged_round_robin`]) so it can be checked without
//! any agents; the [`SelectionStrategy`] implementations wrap them.

use crate::agent::Agent;
use crate::bidding::{BidParser, ask_for_bid, highest_bidder};
use crate::error::AgoraError;

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Decides who speaks on a given step.
#[async_trait]
pub trait SelectionStrategy: Send {
    /// Config name of the strategy.
    fn name(&self) -> &str;

    /// Fewest agents the strategy can schedule.
    fn min_agents(&self) -> usize {
        1
    }

    /// Check the roster carries the capabilities the strategy relies on.
    fn validate(&self, _agents: &[Agent]) -> Result<(), AgoraError> {
        Ok(())
    }

    /// Index into `agents` of the next speaker.
    async fn select(&mut self, step: usize, agents: &[Agent]) -> Result<usize, AgoraError>;

    /// Bids from the latest auction, in agent order. `None` for strategies
    /// that do not auction.
    fn last_bids(&self) -> Option<&[i64]> {
        None
    }
}

/// `step mod n`.
pub fn alternate(step: usize, n: usize) -> usize {
    if n == 0 { 0 } else { step % n }
}

/// Index 0 on even steps; the others in cyclic order on odd steps:
/// `0 1 0 2 0 3 0 1 ...` for four agents.
pub fn privileged_round_robin(step: usize, n: usize) -> usize {
    if step % 2 == 0 || n < 2 {
        0
    } else {
        1 + (step / 2) % (n - 1)
    }
}

/// Every agent in turn.
#[derive(Debug, Clone, Default)]
pub struct Alternating;

#[async_trait]
impl SelectionStrategy for Alternating {
    fn name(&self) -> &str {
        "alternating"
    }

    async fn select(&mut self, step: usize, agents: &[Agent]) -> Result<usize, AgoraError> {
        Ok(alternate(step, agents.len()))
    }
}

/// Agent 0 speaks every other turn; the rest rotate in between.
#[derive(Debug, Clone, Default)]
pub struct PrivilegedRoundRobin;

#[async_trait]
impl SelectionStrategy for PrivilegedRoundRobin {
    fn name(&self) -> &str {
        "round_robin"
    }

    fn min_agents(&self) -> usize {
        2
    }

    async fn select(&mut self, step: usize, agents: &[Agent]) -> Result<usize, AgoraError> {
        Ok(privileged_round_robin(step, agents.len()))
    }
}

/// The director (agent 0) speaks on even steps and picks the speaker for
/// each odd step.
#[derive(Debug, Clone, Default)]
pub struct DirectorDelegated;

#[async_trait]
impl SelectionStrategy for DirectorDelegated {
    fn name(&self) -> &str {
        "director"
    }

    fn min_agents(&self) -> usize {
        2
    }

    fn validate(&self, agents: &[Agent]) -> Result<(), AgoraError> {
        let first = agents.first().ok_or(AgoraError::InvalidAgentCount {
            min: self.min_agents(),
            actual: 0,
        })?;
        let director = first.director().ok_or_else(|| AgoraError::MissingCapability {
            agent: first.name().to_string(),
            capability: "director",
        })?;

        // Choices are offset by one, so the candidates must be agents[1..] in order.
        let others: Vec<&str> = agents[1..].iter().map(Agent::name).collect();
        if director.speakers().len() != others.len()
            || director.speakers().iter().zip(&others).any(|(a, b)| a.as_str() != *b)
        {
            return Err(AgoraError::ConfigError(format!(
                "Director {} lists speakers [{}] but the other agents are [{}]",
                first.name(),
                director.speakers().join(", "),
                others.join(", ")
            )));
        }
        Ok(())
    }

    async fn select(&mut self, step: usize, agents: &[Agent]) -> Result<usize, AgoraError> {
        if step % 2 == 0 {
            return Ok(0);
        }
        let director = agents.first().ok_or(AgoraError::InvalidAgentCount {
            min: self.min_agents(),
            actual: 0,
        })?;
        // Candidates exclude the director, so shift past slot 0.
        let index = director.select_next_speaker().await? + 1;
        if index >= agents.len() {
            return Err(AgoraError::UnknownSpeaker {
                choice: format!("#{}", index),
                candidates: agents.iter().map(|a| a.name().to_string()).collect(),
            });
        }
        Ok(index)
    }
}

/// Every agent bids each turn; the highest bid wins, ties broken at random.
pub struct BiddingAuction {
    parser: BidParser,
    rng: StdRng,
    last_bids: Vec<i64>,
}

impl BiddingAuction {
    /// Without a seed the tie-break generator is seeded from OS entropy.
    pub fn new(seed: Option<u64>) -> Result<Self, AgoraError> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            parser: BidParser::new()?,
            rng,
            last_bids: Vec::new(),
        })
    }
}

#[async_trait]
impl SelectionStrategy for BiddingAuction {
    fn name(&self) -> &str {
        "bidding"
    }

    fn validate(&self, agents: &[Agent]) -> Result<(), AgoraError> {
        match agents.iter().find(|a| !a.can_bid()) {
            Some(agent) => Err(AgoraError::MissingCapability {
                agent: agent.name().to_string(),
                capability: "bidding",
            }),
            None => Ok(()),
        }
    }

    async fn select(&mut self, _step: usize, agents: &[Agent]) -> Result<usize, AgoraError> {
        let mut bids = Vec::with_capacity(agents.len());
        for agent in agents {
            bids.push(ask_for_bid(agent, &self.parser).await?);
        }

        let winner =
            highest_bidder(&bids, &mut self.rng).ok_or(AgoraError::InvalidAgentCount {
                min: self.min_agents(),
                actual: 0,
            })?;

        for (agent, bid) in agents.iter().zip(&bids) {
            log::info!("{} bid {}", agent.name(), bid);
        }
        log::info!("selected {}", agents[winner].name());

        self.last_bids = bids;
        Ok(winner)
    }

    fn last_bids(&self) -> Option<&[i64]> {
        Some(&self.last_bids)
    }
}

/// Build a strategy by its config name.
pub fn strategy_by_name(
    name: &str,
    seed: Option<u64>,
) -> Result<Box<dyn SelectionStrategy>, AgoraError> {
    match name.to_lowercase().as_str() {
        "alternating" => Ok(Box::new(Alternating)),
        "round_robin" => Ok(Box::new(PrivilegedRoundRobin)),
        "director" => Ok(Box::new(DirectorDelegated)),
        "bidding" => Ok(Box::new(BiddingAuction::new(seed)?)),
        other => Err(AgoraError::UnknownStrategy(other.to_string())),
    }
}

/// List all available strategy names.
pub fn available_strategies() -> Vec<&'static str> {
    vec!["alternating", "round_robin", "director", "bidding"]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::director::{Decider, Director, StoppingRule};
    use crate::persona::{BiddingTemplate, Persona};
    use crate::testing::ScriptedModel;
    use std::sync::Arc;

    struct FixedDecider(usize);

    #[async_trait]
    impl Decider for FixedDecider {
        async fn choose_index(&self, _: &str, _: &[String]) -> Result<usize, AgoraError> {
            Ok(self.0)
        }
    }

    fn roster(names: &[&str]) -> Vec<Agent> {
        names
            .iter()
            .map(|name| {
                Agent::new(
                    Persona::new(*name, ""),
                    Arc::new(ScriptedModel::repeating("...")),
                )
            })
            .collect()
    }

    #[test]
    fn test_privileged_round_robin_pattern() {
        let picks: Vec<usize> = (0..11).map(|s| privileged_round_robin(s, 4)).collect();
        assert_eq!(picks, vec![0, 1, 0, 2, 0, 3, 0, 1, 0, 2, 0]);
    }

    #[test]
    fn test_alternate_is_periodic() {
        for n in 1..6 {
            for step in 0..50 {
                assert_eq!(alternate(step, n), step % n);
                assert_eq!(alternate(step, n), alternate(step + n, n));
            }
        }
    }

    #[test]
    fn test_degenerate_rosters() {
        assert_eq!(alternate(3, 0), 0);
        assert_eq!(privileged_round_robin(3, 1), 0);
    }

    #[tokio::test]
    async fn test_director_delegated_offsets_choice() {
        let director = Director::new(
            vec!["B".into(), "C".into()],
            Arc::new(FixedDecider(1)),
            StoppingRule::new(0.0, Some(1)),
        );
        let mut agents = roster(&["A", "B", "C"]);
        agents[0] = Agent::new(Persona::new("A", ""), Arc::new(ScriptedModel::repeating("")))
            .with_director(director);

        let mut strategy = DirectorDelegated;
        assert_eq!(strategy.select(0, &agents).await.unwrap(), 0);
        assert_eq!(strategy.select(1, &agents).await.unwrap(), 2);
        assert_eq!(strategy.select(2, &agents).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_director_delegated_without_director() {
        let agents = roster(&["A", "B"]);
        let result = DirectorDelegated.select(1, &agents).await;
        assert!(matches!(result, Err(AgoraError::MissingCapability { .. })));
    }

    #[tokio::test]
    async fn test_bidding_picks_highest() {
        let replies = ["<3>", "<9>", "<4>"];
        let agents: Vec<Agent> = ["A", "B", "C"]
            .iter()
            .zip(replies)
            .map(|(name, reply)| {
                Agent::new(Persona::new(*name, ""), Arc::new(ScriptedModel::repeating(reply)))
                    .with_bidding(BiddingTemplate::new(*name))
            })
            .collect();

        let mut auction = BiddingAuction::new(Some(5)).unwrap();
        assert_eq!(auction.select(0, &agents).await.unwrap(), 1);
        assert_eq!(auction.last_bids(), Some(&[3, 9, 4][..]));
    }

    #[tokio::test]
    async fn test_bidding_unparseable_bids_count_as_zero() {
        let agents: Vec<Agent> = [("A", "no"), ("B", "<1>")]
            .iter()
            .map(|(name, reply)| {
                Agent::new(Persona::new(*name, ""), Arc::new(ScriptedModel::repeating(reply)))
                    .with_bidding(BiddingTemplate::new(*name))
            })
            .collect();

        let mut auction = BiddingAuction::new(Some(5)).unwrap();
        assert_eq!(auction.select(0, &agents).await.unwrap(), 1);
        assert_eq!(auction.last_bids(), Some(&[0, 1][..]));
    }

    #[test]
    fn test_strategy_by_name() {
        for name in available_strategies() {
            assert_eq!(strategy_by_name(name, Some(1)).unwrap().name(), name);
        }
        assert!(matches!(
            strategy_by_name("chaos", None),
            Err(AgoraError::UnknownStrategy(_))
        ));
    }
}
