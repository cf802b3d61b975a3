//! Bid parsing and the auction tie-break.

use crate::agent::Agent;
use crate::error::AgoraError;

use rand::Rng;
use regex::Regex;

/// Bid used when an agent's reply never parses.
pub const DEFAULT_BID: i64 = 0;
/// First try plus one retry.
pub const BID_ATTEMPTS: usize = 2;

/// Extracts an integer wrapped in angle brackets, e.g. `<7>`.
#[derive(Debug, Clone)]
pub struct BidParser {
    pattern: Regex,
}

impl BidParser {
    pub fn new() -> Result<Self, AgoraError> {
        Ok(Self {
            pattern: Regex::new(r"<(\d+)>")?,
        })
    }

    pub fn parse(&self, reply: &str) -> Option<i64> {
        self.pattern
            .captures(reply)
            .and_then(|c| c[1].parse::<i64>().ok())
    }
}

/// Ask `agent` for a bid, retrying once on an unparseable reply.
///
/// Model errors propagate; only parse failures are absorbed, ending in
/// [`DEFAULT_BID`].
pub async fn ask_for_bid(agent: &Agent, parser: &BidParser) -> Result<i64, AgoraError> {
    for attempt in 1..=BID_ATTEMPTS {
        let reply = agent.bid().await?;
        match parser.parse(&reply) {
            Some(bid) => return Ok(bid),
            None => log::warn!(
                "unparseable bid from {} (attempt {}/{}): {:?}",
                agent.name(),
                attempt,
                BID_ATTEMPTS,
                reply
            ),
        }
    }
    log::warn!("{} bids {} by default", agent.name(), DEFAULT_BID);
    Ok(DEFAULT_BID)
}

/// Index of the highest bid, chosen uniformly among ties.
///
/// Returns `None` only for an empty slice.
pub fn highest_bidder<R: Rng + ?Sized>(bids: &[i64], rng: &mut R) -> Option<usize> {
    let max = *bids.iter().max()?;
    let tied: Vec<usize> = bids
        .iter()
        .enumerate()
        .filter(|(_, bid)| **bid == max)
        .map(|(i, _)| i)
        .collect();
    Some(tied[rng.gen_range(0..tied.len())])
}
