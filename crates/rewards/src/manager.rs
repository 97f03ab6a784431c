//! Rewards manager
//!
//! Owns the engine state and exposes every operation the protocol calls.
//! Mutating operations follow the same shape:
//!
//! 1. authorize the caller
//! 2. compute new global/subgraph values on copies of the current state
//! 3. run collaborator side effects (mint, payouts)
//! 4. commit the copies, bump `version`, emit events
//!
//! A failure in steps 1-3 leaves the state exactly as it was. The one
//! exception is a payout failure after a successful mint in
//! [`RewardsManager::close_allocation`], which keeps the mint on record.

use crate::access::{AccessControl, Role};
use crate::collaborators::{ChainClock, Protocol, ProtocolView};
use crate::config::RewardsConfig;
use crate::distribution::{CloseOutcome, PayoutPlan};
use crate::errors::{Result, RewardsError};
use crate::events::{EventLog, RewardsEvent};
use crate::state::{AllocationSnapshot, GlobalState, RewardsParams, RewardsState, SubgraphState};
use curation_types::{
    Address, AllocationId, BlockNumber, DisplayTokens, FixedPoint, SubgraphId, TokenAmount,
};
use tracing::{debug, info, warn};

/// Engine values recomputed for one subgraph at the current block.
struct SubgraphRefresh {
    global: GlobalState,
    subgraph: SubgraphState,
    effective_signal: TokenAmount,
}

#[derive(Debug, Clone)]
pub struct RewardsManager {
    access: AccessControl,
    state: RewardsState,
    events: EventLog,
}

impl RewardsManager {
    pub fn new(access: AccessControl, params: &RewardsParams, genesis_block: BlockNumber) -> Self {
        info!(
            target: "rewards",
            "Rewards manager initialized at block {} (issuance {} per block, minimum signal {})",
            genesis_block,
            DisplayTokens(params.issuance_per_block),
            DisplayTokens(params.minimum_subgraph_signal)
        );
        Self {
            access,
            state: RewardsState::new(params, genesis_block),
            events: EventLog::new(),
        }
    }

    /// Validate `config` and anchor the accumulator at the clock's current block.
    pub fn from_config<C: ChainClock + ?Sized>(config: &RewardsConfig, clock: &C) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            config.access.clone(),
            &config.params,
            clock.current_block(),
        ))
    }

    /// Resume from a previously persisted state.
    pub fn from_state(access: AccessControl, state: RewardsState) -> Self {
        Self {
            access,
            state,
            events: EventLog::new(),
        }
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn state(&self) -> &RewardsState {
        &self.state
    }

    pub fn events(&self) -> &[RewardsEvent] {
        self.events.events()
    }

    pub fn drain_events(&mut self) -> Vec<RewardsEvent> {
        self.events.drain()
    }

    pub fn issuance_per_block(&self) -> TokenAmount {
        self.state.global.issuance_per_block
    }

    pub fn minimum_subgraph_signal(&self) -> TokenAmount {
        self.state.minimum_subgraph_signal
    }

    pub fn is_denied(&self, subgraph_id: &SubgraphId) -> bool {
        self.state
            .subgraphs
            .get(subgraph_id)
            .is_some_and(SubgraphState::is_denied)
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// Rewards per signal unit accrued since the last accumulator update.
    pub fn new_rewards_per_signal<P: ProtocolView + ?Sized>(&self, protocol: &P) -> FixedPoint {
        self.state
            .global
            .pending_rewards_per_signal(protocol.current_block(), protocol.total_signal())
    }

    pub fn acc_rewards_per_signal<P: ProtocolView + ?Sized>(&self, protocol: &P) -> FixedPoint {
        self.state
            .global
            .acc_rewards_per_signal_at(protocol.current_block(), protocol.total_signal())
    }

    /// Rewards accrued by a subgraph up to the current block.
    pub fn acc_rewards_for_subgraph<P: ProtocolView + ?Sized>(
        &self,
        protocol: &P,
        subgraph_id: &SubgraphId,
    ) -> TokenAmount {
        let acc = self.acc_rewards_per_signal(protocol);
        let effective_signal = self
            .state
            .effective_signal(protocol.subgraph_signal(subgraph_id));
        self.state
            .subgraph_or_default(subgraph_id)
            .accrued_for_subgraph(acc, effective_signal)
    }

    pub fn acc_rewards_per_allocated_token<P: ProtocolView + ?Sized>(
        &self,
        protocol: &P,
        subgraph_id: &SubgraphId,
    ) -> FixedPoint {
        let acc = self.acc_rewards_per_signal(protocol);
        let effective_signal = self
            .state
            .effective_signal(protocol.subgraph_signal(subgraph_id));
        let (per_token, _) = self.state.subgraph_or_default(subgraph_id).per_allocated_token(
            acc,
            effective_signal,
            protocol.subgraph_allocated_tokens(subgraph_id),
        );
        per_token
    }

    /// Rewards an open allocation would receive if it closed now.
    pub fn rewards<P: ProtocolView + ?Sized>(
        &self,
        protocol: &P,
        allocation_id: &AllocationId,
    ) -> Result<TokenAmount> {
        let allocation = self.open_allocation(allocation_id)?;
        let per_token = self.acc_rewards_per_allocated_token(protocol, &allocation.subgraph_id);
        Ok(allocation.rewards_owed(per_token, self.is_denied(&allocation.subgraph_id)))
    }

    // ------------------------------------------------------------------
    // Accrual
    // ------------------------------------------------------------------

    /// Fold pending rewards into the global accumulator. Callable by anyone.
    pub fn update_acc_rewards_per_signal<P: ProtocolView + ?Sized>(
        &mut self,
        protocol: &P,
    ) -> FixedPoint {
        let mut global = self.state.global.clone();
        let acc = global.advance(protocol.current_block(), protocol.total_signal());
        self.state.global = global;
        self.commit();
        acc
    }

    /// Snapshot a subgraph before its signal changes.
    ///
    /// The curation collaborator calls this before minting or burning signal,
    /// so `subgraph_signal` still reports the amount the rewards were earned on.
    pub fn on_signal_changed<P: ProtocolView + ?Sized>(
        &mut self,
        protocol: &P,
        caller: &Address,
        subgraph_id: &SubgraphId,
    ) -> Result<TokenAmount> {
        self.access.authorize(caller, Role::Curation)?;

        let SubgraphRefresh {
            global,
            mut subgraph,
            effective_signal,
        } = self.refresh_inputs(protocol, subgraph_id);
        let accrued = subgraph.on_signal_changed(global.acc_rewards_per_signal, effective_signal);

        self.state.global = global;
        self.state.subgraphs.insert(*subgraph_id, subgraph);
        self.commit();

        debug!(
            target: "rewards",
            "Subgraph {} accrued {} before signal change",
            subgraph_id,
            DisplayTokens(accrued)
        );
        Ok(accrued)
    }

    /// Record a new allocation before its tokens count toward the subgraph.
    ///
    /// Returns the per-allocated-token value the allocation starts from.
    pub fn on_allocation_opened<P: ProtocolView + ?Sized>(
        &mut self,
        protocol: &P,
        caller: &Address,
        allocation_id: &AllocationId,
    ) -> Result<FixedPoint> {
        self.access.authorize(caller, Role::Staking)?;

        if self.state.allocations.contains_key(allocation_id) {
            return Err(RewardsError::AllocationAlreadyExists(*allocation_id));
        }
        let info = protocol
            .allocation(allocation_id)
            .ok_or(RewardsError::AllocationNotFound(*allocation_id))?;

        let current_block = protocol.current_block();
        let SubgraphRefresh {
            global,
            mut subgraph,
            effective_signal,
        } = self.refresh_inputs(protocol, &info.subgraph_id);
        let per_token = subgraph.on_allocation_set_changed(
            global.acc_rewards_per_signal,
            effective_signal,
            protocol.subgraph_allocated_tokens(&info.subgraph_id),
        );

        self.state.global = global;
        self.state.subgraphs.insert(info.subgraph_id, subgraph);
        self.state.allocations.insert(
            *allocation_id,
            AllocationSnapshot {
                subgraph_id: info.subgraph_id,
                indexer: info.indexer,
                allocated_tokens: info.tokens,
                acc_rewards_per_allocated_token_at_open: per_token,
                opened_at_block: current_block,
                closed_at_block: None,
                pending_payout: None,
            },
        );
        self.commit();

        info!(
            target: "rewards",
            "Allocation {} opened by indexer {} on subgraph {} with {}",
            allocation_id,
            info.indexer,
            info.subgraph_id,
            DisplayTokens(info.tokens)
        );
        Ok(per_token)
    }

    /// Close an allocation, mint its rewards and distribute them.
    ///
    /// Called by the staking collaborator before it removes the allocation's
    /// tokens from the subgraph total. If the stake ledger fails after the
    /// mint, the accrual and the minted payout are kept on the allocation and
    /// the error is returned; closing again resumes the payout without minting.
    pub fn close_allocation<P: Protocol + ?Sized>(
        &mut self,
        protocol: &mut P,
        caller: &Address,
        allocation_id: &AllocationId,
    ) -> Result<CloseOutcome> {
        self.access.authorize(caller, Role::Staking)?;

        let allocation = self.open_allocation(allocation_id)?.clone();
        let current_block = protocol.current_block();
        let epoch = protocol.current_epoch();

        let (mut plan, denied) = match allocation.pending_payout.clone() {
            Some(plan) => {
                debug!(
                    target: "rewards",
                    "Resuming payout of {} for allocation {}",
                    DisplayTokens(plan.total()),
                    allocation_id
                );
                (plan, false)
            }
            None => {
                let allocated_tokens = protocol.subgraph_allocated_tokens(&allocation.subgraph_id);
                let SubgraphRefresh {
                    global,
                    mut subgraph,
                    effective_signal,
                } = self.refresh_inputs(protocol, &allocation.subgraph_id);
                let acc = global.acc_rewards_per_signal;
                let denied = subgraph.is_denied();

                let (per_token, _) =
                    subgraph.per_allocated_token(acc, effective_signal, allocated_tokens);
                let owed = allocation.rewards_owed(per_token, denied);
                subgraph.on_allocation_set_changed(acc, effective_signal, allocated_tokens);

                if owed > 0 {
                    protocol.mint(&self.access.staking, owed)?;
                }
                let plan = PayoutPlan::new(
                    allocation.indexer,
                    owed,
                    &protocol.indexer_params(&allocation.indexer),
                    protocol.rewards_destination(&allocation.indexer),
                    protocol.delegation_pool_tokens(&allocation.indexer),
                );

                self.state.global = global;
                self.state.subgraphs.insert(allocation.subgraph_id, subgraph);
                (plan, denied)
            }
        };

        if let Err(err) = plan.execute(protocol) {
            warn!(
                target: "rewards",
                "Payout for allocation {} interrupted with {} unpaid: {}",
                allocation_id,
                DisplayTokens(plan.total().saturating_sub(plan.paid.total())),
                err
            );
            if allocation.pending_payout.as_ref() != Some(&plan) {
                if let Some(snapshot) = self.state.allocations.get_mut(allocation_id) {
                    snapshot.pending_payout = Some(plan);
                }
                self.commit();
            }
            return Err(err.into());
        }

        if let Some(snapshot) = self.state.allocations.get_mut(allocation_id) {
            snapshot.closed_at_block = Some(current_block);
            snapshot.pending_payout = None;
        }
        self.commit();

        let rewards = plan.total();
        self.events.emit(if denied {
            RewardsEvent::RewardsDenied {
                indexer: allocation.indexer,
                allocation_id: *allocation_id,
                epoch,
            }
        } else {
            RewardsEvent::RewardsAssigned {
                indexer: allocation.indexer,
                allocation_id: *allocation_id,
                epoch,
                amount: rewards,
            }
        });

        Ok(CloseOutcome {
            allocation_id: *allocation_id,
            indexer: allocation.indexer,
            subgraph_id: allocation.subgraph_id,
            epoch,
            rewards,
            split: plan.split,
            denied,
        })
    }

    // ------------------------------------------------------------------
    // Governance
    // ------------------------------------------------------------------

    /// Change issuance. Blocks elapsed so far accrue at the previous rate.
    pub fn set_issuance_per_block<P: ProtocolView + ?Sized>(
        &mut self,
        protocol: &P,
        caller: &Address,
        issuance_per_block: TokenAmount,
    ) -> Result<()> {
        self.access.authorize(caller, Role::Governor)?;

        let mut global = self.state.global.clone();
        global.advance(protocol.current_block(), protocol.total_signal());
        global.issuance_per_block = issuance_per_block;

        self.state.global = global;
        self.commit();
        self.parameter_updated("issuancePerBlock");
        Ok(())
    }

    pub fn set_minimum_subgraph_signal(
        &mut self,
        caller: &Address,
        minimum_subgraph_signal: TokenAmount,
    ) -> Result<()> {
        self.access.authorize(caller, Role::Governor)?;

        self.state.minimum_subgraph_signal = minimum_subgraph_signal;
        self.commit();
        self.parameter_updated("minimumSubgraphSignal");
        Ok(())
    }

    pub fn set_availability_oracle(&mut self, caller: &Address, oracle: Address) -> Result<()> {
        self.access.authorize(caller, Role::Governor)?;
        if oracle.is_zero() {
            return Err(RewardsError::InvalidParameter {
                name: "subgraphAvailabilityOracle",
                reason: "address must not be zero".to_string(),
            });
        }

        self.access.availability_oracle = Some(oracle);
        self.commit();
        self.parameter_updated("subgraphAvailabilityOracle");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Denylist
    // ------------------------------------------------------------------

    pub fn set_denied<C: ChainClock + ?Sized>(
        &mut self,
        clock: &C,
        caller: &Address,
        subgraph_id: &SubgraphId,
        deny: bool,
    ) -> Result<()> {
        self.access.authorize(caller, Role::AvailabilityOracle)?;

        self.apply_denied(clock.current_block(), subgraph_id, deny);
        self.commit();
        Ok(())
    }

    /// Update several denylist entries in one call.
    pub fn set_denied_many<C: ChainClock + ?Sized>(
        &mut self,
        clock: &C,
        caller: &Address,
        subgraph_ids: &[SubgraphId],
        deny: &[bool],
    ) -> Result<()> {
        self.access.authorize(caller, Role::AvailabilityOracle)?;
        if subgraph_ids.len() != deny.len() {
            return Err(RewardsError::LengthMismatch {
                ids: subgraph_ids.len(),
                flags: deny.len(),
            });
        }

        let current_block = clock.current_block();
        for (subgraph_id, deny) in subgraph_ids.iter().zip(deny) {
            self.apply_denied(current_block, subgraph_id, *deny);
        }
        self.commit();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn open_allocation(&self, allocation_id: &AllocationId) -> Result<&AllocationSnapshot> {
        let allocation = self
            .state
            .allocations
            .get(allocation_id)
            .ok_or(RewardsError::AllocationNotFound(*allocation_id))?;
        if allocation.is_closed() {
            return Err(RewardsError::AllocationAlreadyClosed(*allocation_id));
        }
        Ok(allocation)
    }

    /// Advanced copy of the global state plus the subgraph's stored snapshot.
    fn refresh_inputs<P: ProtocolView + ?Sized>(
        &self,
        protocol: &P,
        subgraph_id: &SubgraphId,
    ) -> SubgraphRefresh {
        let mut global = self.state.global.clone();
        global.advance(protocol.current_block(), protocol.total_signal());
        SubgraphRefresh {
            global,
            subgraph: self.state.subgraph_or_default(subgraph_id),
            effective_signal: self
                .state
                .effective_signal(protocol.subgraph_signal(subgraph_id)),
        }
    }

    fn apply_denied(&mut self, current_block: BlockNumber, subgraph_id: &SubgraphId, deny: bool) {
        let since_block = if deny { current_block } else { 0 };
        self.state
            .subgraphs
            .entry(*subgraph_id)
            .or_default()
            .denied_since_block = deny.then_some(current_block);
        self.events.emit(RewardsEvent::RewardsDenylistUpdated {
            subgraph_id: *subgraph_id,
            since_block,
        });
    }

    fn parameter_updated(&mut self, param: &str) {
        self.events.emit(RewardsEvent::ParameterUpdated {
            param: param.to_string(),
        });
    }

    fn commit(&mut self) {
        self.state.version = self.state.version.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::AllocationInfo;
    use crate::protocol::InMemoryProtocol;
    use curation_types::tokens;

    struct Fixture {
        manager: RewardsManager,
        protocol: InMemoryProtocol,
        governor: Address,
        staking: Address,
        curation: Address,
    }

    fn fixture(issuance: TokenAmount) -> Fixture {
        let governor = Address::from_label("governor");
        let staking = Address::from_label("staking");
        let curation = Address::from_label("curation");
        let params = RewardsParams {
            issuance_per_block: issuance,
            minimum_subgraph_signal: 0,
        };
        Fixture {
            manager: RewardsManager::new(
                AccessControl::new(governor, staking, curation),
                &params,
                10,
            ),
            protocol: InMemoryProtocol::new(staking, 10),
            governor,
            staking,
            curation,
        }
    }

    #[test]
    fn test_scenario_pending_rewards_per_signal() {
        let mut f = fixture(tokens(200));
        f.protocol
            .add_signal(SubgraphId::from_label("subgraph"), tokens(1000));
        f.protocol.advance_blocks(4);

        assert_eq!(
            f.manager.new_rewards_per_signal(&f.protocol),
            FixedPoint::from_ratio(4, 5)
        );
        let acc = f.manager.update_acc_rewards_per_signal(&f.protocol);
        assert_eq!(acc, FixedPoint::from_ratio(4, 5));
        assert_eq!(f.manager.new_rewards_per_signal(&f.protocol), FixedPoint::ZERO);
        assert_eq!(f.manager.state().version, 1);
    }

    #[test]
    fn test_signal_change_requires_curation_role() {
        let mut f = fixture(tokens(1));
        let subgraph = SubgraphId::from_label("subgraph");

        let err = f
            .manager
            .on_signal_changed(&f.protocol, &f.governor, &subgraph)
            .unwrap_err();
        assert!(matches!(err, RewardsError::Unauthorized { role: Role::Curation, .. }));
        assert_eq!(f.manager.state().version, 0);

        f.manager
            .on_signal_changed(&f.protocol, &f.curation, &subgraph)
            .unwrap();
        assert!(f.manager.state().subgraphs.contains_key(&subgraph));
    }

    #[test]
    fn test_open_requires_known_allocation() {
        let mut f = fixture(tokens(1));
        let allocation = AllocationId::from_label("allocation");

        let err = f
            .manager
            .on_allocation_opened(&f.protocol, &f.staking, &allocation)
            .unwrap_err();
        assert!(matches!(err, RewardsError::AllocationNotFound(_)));

        f.protocol.register_allocation(
            allocation,
            AllocationInfo {
                indexer: Address::from_label("indexer"),
                subgraph_id: SubgraphId::from_label("subgraph"),
                tokens: tokens(10),
            },
        );
        f.manager
            .on_allocation_opened(&f.protocol, &f.staking, &allocation)
            .unwrap();
        let err = f
            .manager
            .on_allocation_opened(&f.protocol, &f.staking, &allocation)
            .unwrap_err();
        assert!(matches!(err, RewardsError::AllocationAlreadyExists(_)));
    }

    #[test]
    fn test_issuance_change_accrues_at_old_rate() {
        let mut f = fixture(tokens(100));
        f.protocol
            .add_signal(SubgraphId::from_label("subgraph"), tokens(100));
        f.protocol.advance_blocks(5);

        f.manager
            .set_issuance_per_block(&f.protocol, &f.governor, tokens(300))
            .unwrap();
        assert_eq!(
            f.manager.state().global.acc_rewards_per_signal,
            FixedPoint::from_integer(5)
        );

        f.protocol.advance_blocks(1);
        assert_eq!(
            f.manager.acc_rewards_per_signal(&f.protocol),
            FixedPoint::from_integer(8)
        );
        assert_eq!(
            f.manager.events().last(),
            Some(&RewardsEvent::ParameterUpdated {
                param: "issuancePerBlock".to_string()
            })
        );
    }

    #[test]
    fn test_denylist_updates() {
        let mut f = fixture(0);
        let oracle = Address::from_label("oracle");
        let subgraph = SubgraphId::from_label("subgraph");

        assert!(f
            .manager
            .set_denied(&f.protocol, &oracle, &subgraph, true)
            .is_err());

        f.manager
            .set_availability_oracle(&f.governor, oracle)
            .unwrap();
        f.manager
            .set_denied(&f.protocol, &oracle, &subgraph, true)
            .unwrap();
        assert!(f.manager.is_denied(&subgraph));
        assert_eq!(
            f.manager.events().last(),
            Some(&RewardsEvent::RewardsDenylistUpdated {
                subgraph_id: subgraph,
                since_block: 10
            })
        );

        f.manager
            .set_denied(&f.protocol, &oracle, &subgraph, false)
            .unwrap();
        assert!(!f.manager.is_denied(&subgraph));
        assert_eq!(
            f.manager.events().last(),
            Some(&RewardsEvent::RewardsDenylistUpdated {
                subgraph_id: subgraph,
                since_block: 0
            })
        );
    }

    #[test]
    fn test_zero_oracle_rejected() {
        let mut f = fixture(0);
        let err = f
            .manager
            .set_availability_oracle(&f.governor, Address::ZERO)
            .unwrap_err();
        assert!(matches!(err, RewardsError::InvalidParameter { .. }));
        assert!(f.manager.access().availability_oracle.is_none());
    }

    #[test]
    fn test_from_state_resumes() {
        let mut f = fixture(tokens(3));
        f.protocol.add_signal(SubgraphId::from_label("s"), tokens(1));
        f.protocol.advance_blocks(2);
        f.manager.update_acc_rewards_per_signal(&f.protocol);

        let json = f.manager.state().to_json().unwrap();
        let resumed = RewardsManager::from_state(
            f.manager.access().clone(),
            RewardsState::from_json(&json).unwrap(),
        );
        assert_eq!(resumed.state(), f.manager.state());
        assert!(resumed.events().is_empty());
    }

    #[test]
    fn test_payout_failure_keeps_mint_and_resumes() {
        let mut f = fixture(tokens(100));
        let subgraph = SubgraphId::from_label("subgraph");
        let indexer = Address::from_label("indexer");
        let allocation = AllocationId::from_label("allocation");
        f.protocol.add_signal(subgraph, tokens(1000));
        f.protocol.register_allocation(
            allocation,
            AllocationInfo {
                indexer,
                subgraph_id: subgraph,
                tokens: tokens(100),
            },
        );
        f.manager
            .on_allocation_opened(&f.protocol, &f.staking, &allocation)
            .unwrap();
        f.protocol.activate_allocation(&allocation).unwrap();
        f.protocol.advance_blocks(10);

        f.protocol.fail_next_payouts(1);
        let err = f
            .manager
            .close_allocation(&mut f.protocol, &f.staking, &allocation)
            .unwrap_err();
        assert!(matches!(err, RewardsError::Collaborator(_)));
        assert_eq!(f.protocol.total_minted(), tokens(1000));
        let snapshot = &f.manager.state().allocations[&allocation];
        assert!(!snapshot.is_closed());
        assert_eq!(
            snapshot.pending_payout.as_ref().map(PayoutPlan::total),
            Some(tokens(1000))
        );
        assert!(f.manager.events().is_empty());

        f.protocol.advance_blocks(5);
        assert_eq!(
            f.manager.rewards(&f.protocol, &allocation).unwrap(),
            tokens(1000)
        );

        let outcome = f
            .manager
            .close_allocation(&mut f.protocol, &f.staking, &allocation)
            .unwrap();
        assert_eq!(outcome.rewards, tokens(1000));
        assert_eq!(f.protocol.mint_calls().len(), 1);
        assert_eq!(f.protocol.total_minted(), tokens(1000));
        assert_eq!(f.protocol.stake_of(&indexer), tokens(1000));
        assert_eq!(f.protocol.balance_of(&f.staking), 0);
        assert!(f.manager.state().allocations[&allocation]
            .pending_payout
            .is_none());

        let err = f
            .manager
            .close_allocation(&mut f.protocol, &f.staking, &allocation)
            .unwrap_err();
        assert!(matches!(err, RewardsError::AllocationAlreadyClosed(_)));
    }
}
