//! Interfaces the engine consumes from the rest of the protocol.
//!
//! The engine never holds tokens, stake or signal itself. It reads aggregate
//! values through the read-only traits and pushes payouts through
//! [`IssuanceAuthority`] and [`StakeLedger`].

use anyhow::Result;
use curation_types::{
    Address, AllocationId, BlockNumber, Epoch, Ppm, SubgraphId, TokenAmount,
};
use serde::{Deserialize, Serialize};

/// Shared block clock. Must never run backwards.
pub trait ChainClock {
    fn current_block(&self) -> BlockNumber;

    fn current_epoch(&self) -> Epoch;
}

/// Curation signal totals.
pub trait SignalSource {
    /// Tokens signalled across all subgraphs.
    fn total_signal(&self) -> TokenAmount;

    /// Tokens signalled on one subgraph.
    fn subgraph_signal(&self, subgraph_id: &SubgraphId) -> TokenAmount;
}

/// Allocation as recorded by the staking collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationInfo {
    pub indexer: Address,
    pub subgraph_id: SubgraphId,
    pub tokens: TokenAmount,
}

/// Per-indexer delegation parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerRewardParams {
    /// Share of indexing rewards kept by the indexer
    pub indexing_reward_cut: Ppm,
    /// Share of query fees kept by the indexer
    pub query_fee_cut: Ppm,
    /// Blocks that must pass before the parameters can change again
    pub cooldown_blocks: u32,
}

/// Stake and allocation totals.
///
/// The staking collaborator notifies the engine *before* it applies an
/// allocation change, so `subgraph_allocated_tokens` must still report the
/// total as it was prior to the open or close being processed.
pub trait StakeSource {
    fn subgraph_allocated_tokens(&self, subgraph_id: &SubgraphId) -> TokenAmount;

    fn allocation(&self, allocation_id: &AllocationId) -> Option<AllocationInfo>;

    fn indexer_params(&self, indexer: &Address) -> IndexerRewardParams;

    /// Where the indexer wants its cut sent instead of restaking it.
    fn rewards_destination(&self, indexer: &Address) -> Option<Address>;

    /// Tokens delegated to the indexer's pool.
    fn delegation_pool_tokens(&self, indexer: &Address) -> TokenAmount;
}

/// Mints newly issued tokens. The engine never pays from its own balance.
pub trait IssuanceAuthority {
    fn mint(&mut self, recipient: &Address, amount: TokenAmount) -> Result<()>;
}

/// Moves minted rewards to their final owners.
pub trait StakeLedger {
    /// Add tokens to the indexer's own stake.
    fn restake(&mut self, indexer: &Address, amount: TokenAmount) -> Result<()>;

    /// Add tokens to the indexer's delegation pool.
    fn add_delegation_rewards(&mut self, indexer: &Address, amount: TokenAmount) -> Result<()>;

    /// Transfer tokens out of the staking contract.
    fn transfer(&mut self, recipient: &Address, amount: TokenAmount) -> Result<()>;
}

/// Everything the engine reads.
pub trait ProtocolView: ChainClock + SignalSource + StakeSource {}

impl<T: ChainClock + SignalSource + StakeSource + ?Sized> ProtocolView for T {}

/// Everything the engine reads and writes.
pub trait Protocol: ProtocolView + IssuanceAuthority + StakeLedger {}

impl<T: ProtocolView + IssuanceAuthority + StakeLedger + ?Sized> Protocol for T {}
