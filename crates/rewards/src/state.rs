//! Engine state.
//!
//! All mutable bookkeeping lives in one [`RewardsState`] value owned by the
//! rewards manager. Each committed mutating call bumps `version` exactly once.

use crate::distribution::PayoutPlan;
use curation_types::{
    amount_string, Address, AllocationId, BlockNumber, FixedPoint, SubgraphId, TokenAmount,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Governance-controlled parameters applied at setup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardsParams {
    /// Tokens minted per block across the whole protocol
    #[serde(with = "amount_string")]
    pub issuance_per_block: TokenAmount,
    /// Subgraphs signalled below this floor accrue nothing
    #[serde(with = "amount_string")]
    pub minimum_subgraph_signal: TokenAmount,
}

/// Protocol-wide accumulator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalState {
    pub issuance_per_block: TokenAmount,
    /// Rewards per unit of signal since genesis; never decreases
    pub acc_rewards_per_signal: FixedPoint,
    pub last_updated_block: BlockNumber,
}

/// Per-subgraph snapshots. Created lazily and never deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubgraphState {
    /// Rewards accrued by the subgraph up to the last signal snapshot
    pub acc_rewards_for_subgraph: TokenAmount,
    /// Accrued rewards already spread into `acc_rewards_per_allocated_token`
    pub acc_rewards_for_subgraph_snapshot: TokenAmount,
    pub acc_rewards_per_allocated_token: FixedPoint,
    /// Global per-signal accumulator at the last signal snapshot
    pub acc_rewards_per_signal_snapshot: FixedPoint,
    /// Block the subgraph was denied at, `None` when rewards are allowed
    pub denied_since_block: Option<BlockNumber>,
}

impl SubgraphState {
    pub fn is_denied(&self) -> bool {
        self.denied_since_block.is_some()
    }
}

/// Allocation bookkeeping captured at open and retired at close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationSnapshot {
    pub subgraph_id: SubgraphId,
    pub indexer: Address,
    pub allocated_tokens: TokenAmount,
    pub acc_rewards_per_allocated_token_at_open: FixedPoint,
    pub opened_at_block: BlockNumber,
    pub closed_at_block: Option<BlockNumber>,
    /// Rewards already minted for this allocation whose payout has not settled
    #[serde(default)]
    pub pending_payout: Option<PayoutPlan>,
}

impl AllocationSnapshot {
    pub fn is_closed(&self) -> bool {
        self.closed_at_block.is_some()
    }
}

/// Complete engine state, threaded explicitly through every call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardsState {
    pub version: u64,
    pub minimum_subgraph_signal: TokenAmount,
    pub global: GlobalState,
    pub subgraphs: HashMap<SubgraphId, SubgraphState>,
    pub allocations: HashMap<AllocationId, AllocationSnapshot>,
}

impl RewardsState {
    /// Fresh state anchored at `genesis_block`.
    pub fn new(params: &RewardsParams, genesis_block: BlockNumber) -> Self {
        Self {
            version: 0,
            minimum_subgraph_signal: params.minimum_subgraph_signal,
            global: GlobalState {
                issuance_per_block: params.issuance_per_block,
                acc_rewards_per_signal: FixedPoint::ZERO,
                last_updated_block: genesis_block,
            },
            subgraphs: HashMap::new(),
            allocations: HashMap::new(),
        }
    }

    /// Snapshot for `id`, or the zero snapshot a lazily created subgraph starts from.
    pub fn subgraph_or_default(&self, id: &SubgraphId) -> SubgraphState {
        self.subgraphs.get(id).cloned().unwrap_or_default()
    }

    /// Signal that counts toward rewards after applying the minimum floor.
    pub fn effective_signal(&self, signal: TokenAmount) -> TokenAmount {
        if signal >= self.minimum_subgraph_signal {
            signal
        } else {
            0
        }
    }

    /// Serialize the state as JSON for persistence by the host.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
