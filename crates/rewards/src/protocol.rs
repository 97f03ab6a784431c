//! In-memory collaborators
//!
//! A self-contained stand-in for the clock, curation, staking and token
//! contracts. Hosts use it for simulation; tests use it to drive the engine
//! and to inspect every payout it makes.

use crate::collaborators::{
    AllocationInfo, ChainClock, IndexerRewardParams, IssuanceAuthority, SignalSource,
    StakeLedger, StakeSource,
};
use anyhow::{anyhow, bail, Result};
use curation_types::{Address, AllocationId, BlockNumber, Epoch, SubgraphId, TokenAmount};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default epoch length used by [`InMemoryProtocol::new`].
pub const DEFAULT_BLOCKS_PER_EPOCH: u64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InMemoryProtocol {
    staking: Address,
    block: BlockNumber,
    blocks_per_epoch: u64,
    signal: HashMap<SubgraphId, TokenAmount>,
    total_signal: TokenAmount,
    subgraph_allocated: HashMap<SubgraphId, TokenAmount>,
    allocations: HashMap<AllocationId, AllocationInfo>,
    indexer_params: HashMap<Address, IndexerRewardParams>,
    rewards_destinations: HashMap<Address, Address>,
    delegation_pools: HashMap<Address, TokenAmount>,
    delegation_rewards: HashMap<Address, TokenAmount>,
    stakes: HashMap<Address, TokenAmount>,
    balances: HashMap<Address, TokenAmount>,
    total_minted: TokenAmount,
    mint_calls: Vec<(Address, TokenAmount)>,
    fail_mints: bool,
    failing_payouts: u32,
}

impl InMemoryProtocol {
    /// `staking` is the account minted rewards are paid into before payout.
    pub fn new(staking: Address, start_block: BlockNumber) -> Self {
        Self::with_epoch_length(staking, start_block, DEFAULT_BLOCKS_PER_EPOCH)
    }

    pub fn with_epoch_length(
        staking: Address,
        start_block: BlockNumber,
        blocks_per_epoch: u64,
    ) -> Self {
        Self {
            staking,
            block: start_block,
            blocks_per_epoch: blocks_per_epoch.max(1),
            signal: HashMap::new(),
            total_signal: 0,
            subgraph_allocated: HashMap::new(),
            allocations: HashMap::new(),
            indexer_params: HashMap::new(),
            rewards_destinations: HashMap::new(),
            delegation_pools: HashMap::new(),
            delegation_rewards: HashMap::new(),
            stakes: HashMap::new(),
            balances: HashMap::new(),
            total_minted: 0,
            mint_calls: Vec::new(),
            fail_mints: false,
            failing_payouts: 0,
        }
    }

    // ------------------------------------------------------------------
    // Clock
    // ------------------------------------------------------------------

    pub fn advance_blocks(&mut self, blocks: u64) {
        self.block = self.block.saturating_add(blocks);
    }

    // ------------------------------------------------------------------
    // Curation
    // ------------------------------------------------------------------

    pub fn add_signal(&mut self, subgraph_id: SubgraphId, amount: TokenAmount) {
        let entry = self.signal.entry(subgraph_id).or_default();
        *entry = entry.saturating_add(amount);
        self.total_signal = self.total_signal.saturating_add(amount);
    }

    pub fn remove_signal(&mut self, subgraph_id: &SubgraphId, amount: TokenAmount) -> Result<()> {
        let entry = self
            .signal
            .get_mut(subgraph_id)
            .ok_or_else(|| anyhow!("no signal on subgraph {subgraph_id}"))?;
        if *entry < amount {
            bail!("insufficient signal on subgraph {subgraph_id}");
        }
        *entry -= amount;
        self.total_signal = self.total_signal.saturating_sub(amount);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Staking
    // ------------------------------------------------------------------

    /// Record an allocation without counting its tokens toward the subgraph yet.
    pub fn register_allocation(&mut self, allocation_id: AllocationId, info: AllocationInfo) {
        self.allocations.insert(allocation_id, info);
    }

    /// Count a registered allocation's tokens toward its subgraph.
    pub fn activate_allocation(&mut self, allocation_id: &AllocationId) -> Result<()> {
        let info = self
            .allocations
            .get(allocation_id)
            .ok_or_else(|| anyhow!("unknown allocation {allocation_id}"))?;
        let entry = self.subgraph_allocated.entry(info.subgraph_id).or_default();
        *entry = entry.saturating_add(info.tokens);
        Ok(())
    }

    /// Remove a closed allocation and its tokens from the subgraph total.
    pub fn release_allocation(&mut self, allocation_id: &AllocationId) -> Result<AllocationInfo> {
        let info = self
            .allocations
            .remove(allocation_id)
            .ok_or_else(|| anyhow!("unknown allocation {allocation_id}"))?;
        if let Some(entry) = self.subgraph_allocated.get_mut(&info.subgraph_id) {
            *entry = entry.saturating_sub(info.tokens);
        }
        Ok(info)
    }

    pub fn set_indexer_params(&mut self, indexer: Address, params: IndexerRewardParams) {
        self.indexer_params.insert(indexer, params);
    }

    pub fn set_rewards_destination(&mut self, indexer: Address, destination: Option<Address>) {
        match destination {
            Some(destination) => {
                self.rewards_destinations.insert(indexer, destination);
            }
            None => {
                self.rewards_destinations.remove(&indexer);
            }
        }
    }

    pub fn delegate(&mut self, indexer: Address, amount: TokenAmount) {
        let entry = self.delegation_pools.entry(indexer).or_default();
        *entry = entry.saturating_add(amount);
    }

    pub fn stake_of(&self, indexer: &Address) -> TokenAmount {
        self.stakes.get(indexer).copied().unwrap_or(0)
    }

    pub fn balance_of(&self, account: &Address) -> TokenAmount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Indexing rewards paid into the indexer's delegation pool so far.
    pub fn delegation_rewards_of(&self, indexer: &Address) -> TokenAmount {
        self.delegation_rewards.get(indexer).copied().unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Token
    // ------------------------------------------------------------------

    pub fn total_minted(&self) -> TokenAmount {
        self.total_minted
    }

    pub fn mint_calls(&self) -> &[(Address, TokenAmount)] {
        &self.mint_calls
    }

    /// Make every following mint fail, to exercise collaborator errors.
    pub fn set_fail_mints(&mut self, fail: bool) {
        self.fail_mints = fail;
    }

    /// Reject the next `count` ledger payouts.
    pub fn fail_next_payouts(&mut self, count: u32) {
        self.failing_payouts = count;
    }

    fn credit(&mut self, account: Address, amount: TokenAmount) {
        let entry = self.balances.entry(account).or_default();
        *entry = entry.saturating_add(amount);
    }

    /// Payouts leave the staking contract's balance, which only holds minted rewards.
    fn debit_staking(&mut self, amount: TokenAmount) -> Result<()> {
        if self.failing_payouts > 0 {
            self.failing_payouts -= 1;
            bail!("stake ledger unavailable");
        }
        let staking = self.staking;
        let balance = self.balances.entry(staking).or_default();
        if *balance < amount {
            bail!("staking balance {} cannot cover payout of {}", *balance, amount);
        }
        *balance -= amount;
        Ok(())
    }
}

impl ChainClock for InMemoryProtocol {
    fn current_block(&self) -> BlockNumber {
        self.block
    }

    fn current_epoch(&self) -> Epoch {
        self.block / self.blocks_per_epoch
    }
}

impl SignalSource for InMemoryProtocol {
    fn total_signal(&self) -> TokenAmount {
        self.total_signal
    }

    fn subgraph_signal(&self, subgraph_id: &SubgraphId) -> TokenAmount {
        self.signal.get(subgraph_id).copied().unwrap_or(0)
    }
}

impl StakeSource for InMemoryProtocol {
    fn subgraph_allocated_tokens(&self, subgraph_id: &SubgraphId) -> TokenAmount {
        self.subgraph_allocated.get(subgraph_id).copied().unwrap_or(0)
    }

    fn allocation(&self, allocation_id: &AllocationId) -> Option<AllocationInfo> {
        self.allocations.get(allocation_id).cloned()
    }

    fn indexer_params(&self, indexer: &Address) -> IndexerRewardParams {
        self.indexer_params.get(indexer).copied().unwrap_or_default()
    }

    fn rewards_destination(&self, indexer: &Address) -> Option<Address> {
        self.rewards_destinations.get(indexer).copied()
    }

    fn delegation_pool_tokens(&self, indexer: &Address) -> TokenAmount {
        self.delegation_pools.get(indexer).copied().unwrap_or(0)
    }
}

impl IssuanceAuthority for InMemoryProtocol {
    fn mint(&mut self, recipient: &Address, amount: TokenAmount) -> Result<()> {
        if self.fail_mints {
            bail!("minting is disabled");
        }
        self.credit(*recipient, amount);
        self.total_minted = self.total_minted.saturating_add(amount);
        self.mint_calls.push((*recipient, amount));
        Ok(())
    }
}

impl StakeLedger for InMemoryProtocol {
    fn restake(&mut self, indexer: &Address, amount: TokenAmount) -> Result<()> {
        self.debit_staking(amount)?;
        let entry = self.stakes.entry(*indexer).or_default();
        *entry = entry.saturating_add(amount);
        Ok(())
    }

    fn add_delegation_rewards(&mut self, indexer: &Address, amount: TokenAmount) -> Result<()> {
        self.debit_staking(amount)?;
        let entry = self.delegation_pools.entry(*indexer).or_default();
        *entry = entry.saturating_add(amount);
        let rewards = self.delegation_rewards.entry(*indexer).or_default();
        *rewards = rewards.saturating_add(amount);
        Ok(())
    }

    fn transfer(&mut self, recipient: &Address, amount: TokenAmount) -> Result<()> {
        self.debit_staking(amount)?;
        self.credit(*recipient, amount);
        Ok(())
    }
}
