//! Observable events emitted by the engine.

use curation_types::{Address, AllocationId, BlockNumber, DisplayTokens, Epoch, SubgraphId, TokenAmount};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardsEvent {
    /// Rewards minted for a closed allocation (amount may be zero)
    RewardsAssigned {
        indexer: Address,
        allocation_id: AllocationId,
        epoch: Epoch,
        amount: TokenAmount,
    },
    /// Allocation closed on a denied subgraph; nothing was minted
    RewardsDenied {
        indexer: Address,
        allocation_id: AllocationId,
        epoch: Epoch,
    },
    /// Denylist entry changed; `since_block` is zero when the subgraph is allowed
    RewardsDenylistUpdated {
        subgraph_id: SubgraphId,
        since_block: BlockNumber,
    },
    ParameterUpdated { param: String },
}

/// Append-only event buffer drained by the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<RewardsEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event and mirror it to the log.
    pub fn emit(&mut self, event: RewardsEvent) {
        match &event {
            RewardsEvent::RewardsAssigned {
                indexer,
                allocation_id,
                epoch,
                amount,
            } => info!(
                target: "rewards",
                "Rewards assigned: {} to indexer {} for allocation {} (epoch {})",
                DisplayTokens(*amount),
                indexer,
                allocation_id,
                epoch
            ),
            RewardsEvent::RewardsDenied {
                indexer,
                allocation_id,
                epoch,
            } => warn!(
                target: "rewards",
                "Rewards denied for indexer {} allocation {} (epoch {})",
                indexer,
                allocation_id,
                epoch
            ),
            RewardsEvent::RewardsDenylistUpdated {
                subgraph_id,
                since_block,
            } => info!(
                target: "rewards",
                "Denylist updated for subgraph {}: since block {}",
                subgraph_id,
                since_block
            ),
            RewardsEvent::ParameterUpdated { param } => {
                info!(target: "rewards", "Parameter updated: {}", param)
            }
        }
        self.events.push(event);
    }

    pub fn events(&self) -> &[RewardsEvent] {
        &self.events
    }

    pub fn last(&self) -> Option<&RewardsEvent> {
        self.events.last()
    }

    /// Take all buffered events, leaving the log empty.
    pub fn drain(&mut self) -> Vec<RewardsEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
