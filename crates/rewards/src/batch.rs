//! Sequential multi-call execution.

use crate::collaborators::Protocol;
use crate::distribution::CloseOutcome;
use crate::errors::{Result, RewardsError};
use crate::manager::RewardsManager;
use curation_types::{Address, AllocationId, FixedPoint, SubgraphId, TokenAmount};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One engine operation, with the caller it is made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardsCall {
    UpdateAccRewardsPerSignal,
    SignalChanged {
        caller: Address,
        subgraph_id: SubgraphId,
    },
    AllocationOpened {
        caller: Address,
        allocation_id: AllocationId,
    },
    CloseAllocation {
        caller: Address,
        allocation_id: AllocationId,
    },
    SetIssuancePerBlock {
        caller: Address,
        issuance_per_block: TokenAmount,
    },
    SetMinimumSubgraphSignal {
        caller: Address,
        minimum_subgraph_signal: TokenAmount,
    },
    SetAvailabilityOracle {
        caller: Address,
        oracle: Address,
    },
    SetDenied {
        caller: Address,
        subgraph_id: SubgraphId,
        deny: bool,
    },
    SetDeniedMany {
        caller: Address,
        subgraph_ids: Vec<SubgraphId>,
        deny: Vec<bool>,
    },
}

/// Return value of a single call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallOutput {
    AccRewardsPerSignal(FixedPoint),
    AccRewardsForSubgraph(TokenAmount),
    AllocationOpened(FixedPoint),
    AllocationClosed(CloseOutcome),
    Updated,
}

impl RewardsManager {
    /// Run one call.
    pub fn execute<P: Protocol + ?Sized>(
        &mut self,
        protocol: &mut P,
        call: RewardsCall,
    ) -> Result<CallOutput> {
        let output = match call {
            RewardsCall::UpdateAccRewardsPerSignal => {
                CallOutput::AccRewardsPerSignal(self.update_acc_rewards_per_signal(&*protocol))
            }
            RewardsCall::SignalChanged {
                caller,
                subgraph_id,
            } => CallOutput::AccRewardsForSubgraph(self.on_signal_changed(
                &*protocol,
                &caller,
                &subgraph_id,
            )?),
            RewardsCall::AllocationOpened {
                caller,
                allocation_id,
            } => CallOutput::AllocationOpened(self.on_allocation_opened(
                &*protocol,
                &caller,
                &allocation_id,
            )?),
            RewardsCall::CloseAllocation {
                caller,
                allocation_id,
            } => CallOutput::AllocationClosed(self.close_allocation(
                protocol,
                &caller,
                &allocation_id,
            )?),
            RewardsCall::SetIssuancePerBlock {
                caller,
                issuance_per_block,
            } => {
                self.set_issuance_per_block(&*protocol, &caller, issuance_per_block)?;
                CallOutput::Updated
            }
            RewardsCall::SetMinimumSubgraphSignal {
                caller,
                minimum_subgraph_signal,
            } => {
                self.set_minimum_subgraph_signal(&caller, minimum_subgraph_signal)?;
                CallOutput::Updated
            }
            RewardsCall::SetAvailabilityOracle { caller, oracle } => {
                self.set_availability_oracle(&caller, oracle)?;
                CallOutput::Updated
            }
            RewardsCall::SetDenied {
                caller,
                subgraph_id,
                deny,
            } => {
                self.set_denied(&*protocol, &caller, &subgraph_id, deny)?;
                CallOutput::Updated
            }
            RewardsCall::SetDeniedMany {
                caller,
                subgraph_ids,
                deny,
            } => {
                self.set_denied_many(&*protocol, &caller, &subgraph_ids, &deny)?;
                CallOutput::Updated
            }
        };
        Ok(output)
    }

    /// Run calls in order, each seeing the state committed by the previous one.
    ///
    /// Stops at the first failure. Calls before it stay committed: their
    /// mints and payouts have already happened.
    pub fn batch<P, I>(&mut self, protocol: &mut P, calls: I) -> Result<Vec<CallOutput>>
    where
        P: Protocol + ?Sized,
        I: IntoIterator<Item = RewardsCall>,
    {
        let mut outputs = Vec::new();
        for (index, call) in calls.into_iter().enumerate() {
            match self.execute(protocol, call) {
                Ok(output) => outputs.push(output),
                Err(source) => {
                    warn!(target: "rewards", "Batch stopped at call {}: {}", index, source);
                    return Err(RewardsError::BatchCallFailed {
                        index,
                        source: Box::new(source),
                    });
                }
            }
        }
        debug!(target: "rewards", "Batch of {} calls committed", outputs.len());
        Ok(outputs)
    }
}
