//! Distribution engine
//!
//! Splits minted indexing rewards between an indexer and its delegation pool
//! and routes each share through the stake ledger. The split is exact: the
//! two cuts always sum to the minted amount.

use crate::collaborators::{IndexerRewardParams, StakeLedger};
use anyhow::Result;
use curation_types::{Address, AllocationId, DisplayTokens, Epoch, Ppm, SubgraphId, TokenAmount};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How a reward amount is divided.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSplit {
    pub indexer_cut: TokenAmount,
    pub delegators_cut: TokenAmount,
}

impl RewardSplit {
    pub fn total(&self) -> TokenAmount {
        self.indexer_cut.saturating_add(self.delegators_cut)
    }
}

/// Divide `owed` using the indexer's reward cut.
///
/// `indexer_cut` is rounded down and the delegators receive the rest. An
/// empty delegation pool cannot hold rewards, so its share goes to the
/// indexer instead.
pub fn split_rewards(
    owed: TokenAmount,
    indexing_reward_cut: Ppm,
    delegation_pool_tokens: TokenAmount,
) -> RewardSplit {
    if delegation_pool_tokens == 0 {
        return RewardSplit {
            indexer_cut: owed,
            delegators_cut: 0,
        };
    }

    let indexer_cut = indexing_reward_cut.apply(owed);
    RewardSplit {
        indexer_cut,
        delegators_cut: owed.saturating_sub(indexer_cut),
    }
}

/// Payout instructions for one closed allocation.
///
/// Tracks which cuts the ledger has already accepted, so a plan interrupted
/// by a ledger failure can be resumed without paying any cut twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutPlan {
    pub indexer: Address,
    /// Transfer target for the indexer cut; restaked when `None`
    pub rewards_destination: Option<Address>,
    pub split: RewardSplit,
    #[serde(default)]
    pub paid: RewardSplit,
}

impl PayoutPlan {
    pub fn new(
        indexer: Address,
        owed: TokenAmount,
        params: &IndexerRewardParams,
        rewards_destination: Option<Address>,
        delegation_pool_tokens: TokenAmount,
    ) -> Self {
        Self {
            indexer,
            rewards_destination,
            split: split_rewards(owed, params.indexing_reward_cut, delegation_pool_tokens),
            paid: RewardSplit::default(),
        }
    }

    /// Tokens the plan distributes in total.
    pub fn total(&self) -> TokenAmount {
        self.split.total()
    }

    pub fn is_settled(&self) -> bool {
        self.paid == self.split
    }

    /// Push the unpaid cuts through the ledger. Zero amounts are skipped.
    ///
    /// Each cut is marked paid as soon as the ledger accepts it.
    pub fn execute<L: StakeLedger + ?Sized>(&mut self, ledger: &mut L) -> Result<()> {
        let RewardSplit {
            indexer_cut,
            delegators_cut,
        } = self.split;

        if self.paid.delegators_cut < delegators_cut {
            ledger.add_delegation_rewards(&self.indexer, delegators_cut)?;
            self.paid.delegators_cut = delegators_cut;
        }

        if self.paid.indexer_cut < indexer_cut {
            match &self.rewards_destination {
                Some(destination) => ledger.transfer(destination, indexer_cut)?,
                None => ledger.restake(&self.indexer, indexer_cut)?,
            }
            self.paid.indexer_cut = indexer_cut;
        }

        debug!(
            target: "rewards",
            "Paid indexer {} {} (destination: {:?}), delegators {}",
            self.indexer,
            DisplayTokens(indexer_cut),
            self.rewards_destination,
            DisplayTokens(delegators_cut)
        );

        Ok(())
    }
}

/// Result of closing an allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseOutcome {
    pub allocation_id: AllocationId,
    pub indexer: Address,
    pub subgraph_id: SubgraphId,
    pub epoch: Epoch,
    /// Tokens minted for the allocation
    pub rewards: TokenAmount,
    pub split: RewardSplit,
    pub denied: bool,
}
