//! Shared harness for integration tests.
//!
//! Drives [`RewardsManager`] and [`InMemoryProtocol`] in the order the real
//! curation and staking contracts would: the engine is notified first, then
//! the collaborator applies the signal or allocation change.

#![allow(dead_code)]

use curation_rewards::{
    AccessControl, AllocationInfo, CloseOutcome, IndexerRewardParams, InMemoryProtocol,
    RewardsManager, RewardsParams,
};
use curation_rewards::errors::Result as RewardsResult;
use curation_types::{Address, AllocationId, Ppm, SubgraphId, TokenAmount};

pub const GENESIS_BLOCK: u64 = 1_000;
pub const BLOCKS_PER_EPOCH: u64 = 100;

pub struct Harness {
    pub manager: RewardsManager,
    pub protocol: InMemoryProtocol,
    pub governor: Address,
    pub oracle: Address,
    pub staking: Address,
    pub curation: Address,
    next_allocation: u64,
}

impl Harness {
    pub fn new(issuance_per_block: TokenAmount, minimum_subgraph_signal: TokenAmount) -> Self {
        let governor = Address::from_label("governor");
        let oracle = Address::from_label("availability-oracle");
        let staking = Address::from_label("staking");
        let curation = Address::from_label("curation");

        let access = AccessControl::new(governor, staking, curation).with_availability_oracle(oracle);
        let params = RewardsParams {
            issuance_per_block,
            minimum_subgraph_signal,
        };

        Self {
            manager: RewardsManager::new(access, &params, GENESIS_BLOCK),
            protocol: InMemoryProtocol::with_epoch_length(staking, GENESIS_BLOCK, BLOCKS_PER_EPOCH),
            governor,
            oracle,
            staking,
            curation,
            next_allocation: 0,
        }
    }

    pub fn advance(&mut self, blocks: u64) {
        self.protocol.advance_blocks(blocks);
    }

    pub fn signal(&mut self, subgraph_id: SubgraphId, amount: TokenAmount) {
        self.manager
            .on_signal_changed(&self.protocol, &self.curation, &subgraph_id)
            .expect("signal snapshot");
        self.protocol.add_signal(subgraph_id, amount);
    }

    pub fn unsignal(&mut self, subgraph_id: SubgraphId, amount: TokenAmount) {
        self.manager
            .on_signal_changed(&self.protocol, &self.curation, &subgraph_id)
            .expect("signal snapshot");
        self.protocol
            .remove_signal(&subgraph_id, amount)
            .expect("signal removal");
    }

    pub fn set_indexer_cut(&mut self, indexer: Address, ppm: u32) {
        self.protocol.set_indexer_params(
            indexer,
            IndexerRewardParams {
                indexing_reward_cut: Ppm::new(ppm).expect("valid ppm"),
                ..Default::default()
            },
        );
    }

    /// Open an allocation and count its tokens toward the subgraph.
    pub fn open(
        &mut self,
        indexer: Address,
        subgraph_id: SubgraphId,
        tokens: TokenAmount,
    ) -> AllocationId {
        self.next_allocation += 1;
        let allocation_id = Address::from_label(&format!("allocation-{}", self.next_allocation));
        self.protocol.register_allocation(
            allocation_id,
            AllocationInfo {
                indexer,
                subgraph_id,
                tokens,
            },
        );
        self.manager
            .on_allocation_opened(&self.protocol, &self.staking, &allocation_id)
            .expect("allocation opened");
        self.protocol
            .activate_allocation(&allocation_id)
            .expect("allocation activated");
        allocation_id
    }

    /// Close an allocation; its tokens leave the subgraph only if the engine accepted the close.
    pub fn close(&mut self, allocation_id: &AllocationId) -> RewardsResult<CloseOutcome> {
        let outcome = self
            .manager
            .close_allocation(&mut self.protocol, &self.staking, allocation_id)?;
        self.protocol
            .release_allocation(allocation_id)
            .expect("allocation released");
        Ok(outcome)
    }

    pub fn deny(&mut self, subgraph_id: SubgraphId, deny: bool) {
        self.manager
            .set_denied(&self.protocol, &self.oracle, &subgraph_id, deny)
            .expect("denylist update");
    }
}
