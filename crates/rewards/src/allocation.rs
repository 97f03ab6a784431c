//! Allocation rewards calculator
//!
//! Rewards accrued by a subgraph are spread over the stake allocated to it
//! through a per-allocated-token accumulator. An allocation is owed the growth
//! of that accumulator between its open and close, times its allocated tokens.

use crate::state::{AllocationSnapshot, SubgraphState};
use curation_types::{FixedPoint, TokenAmount};
use tracing::debug;

/// Rewards for `tokens` that were allocated while the per-token accumulator
/// moved from `start` to `end`. Clamps to zero if `end` is behind `start`.
pub fn calc_rewards(tokens: TokenAmount, start: FixedPoint, end: FixedPoint) -> TokenAmount {
    end.saturating_sub(start).mul_amount(tokens)
}

impl SubgraphState {
    /// Current per-allocated-token accumulator and the accrued subgraph
    /// rewards it was derived from.
    ///
    /// With nothing allocated there is no stake to spread rewards over and
    /// the stored accumulator is returned unchanged.
    pub fn per_allocated_token(
        &self,
        acc_rewards_per_signal: FixedPoint,
        effective_signal: TokenAmount,
        allocated_tokens: TokenAmount,
    ) -> (FixedPoint, TokenAmount) {
        let accrued = self.accrued_for_subgraph(acc_rewards_per_signal, effective_signal);
        if allocated_tokens == 0 {
            return (self.acc_rewards_per_allocated_token, accrued);
        }

        let new_subgraph_rewards = accrued.saturating_sub(self.acc_rewards_for_subgraph_snapshot);
        let new_per_token = FixedPoint::from_ratio(new_subgraph_rewards, allocated_tokens);
        (
            self.acc_rewards_per_allocated_token
                .saturating_add(new_per_token),
            accrued,
        )
    }

    /// Spend pending subgraph rewards into the per-allocated-token accumulator.
    ///
    /// Must run with the allocated total as it was *before* the allocation set
    /// changes, so rewards earned so far go to the stake that earned them.
    pub fn on_allocation_set_changed(
        &mut self,
        acc_rewards_per_signal: FixedPoint,
        effective_signal: TokenAmount,
        allocated_tokens: TokenAmount,
    ) -> FixedPoint {
        self.on_signal_changed(acc_rewards_per_signal, effective_signal);

        let (per_token, accrued) =
            self.per_allocated_token(acc_rewards_per_signal, effective_signal, allocated_tokens);
        self.acc_rewards_per_allocated_token = per_token;
        // The snapshot only moves forward; a retroactive floor change can leave
        // `accrued` behind it and those rewards were already spent.
        self.acc_rewards_for_subgraph_snapshot =
            self.acc_rewards_for_subgraph_snapshot.max(accrued);

        debug!(
            target: "rewards",
            "Per-allocated-token accumulator now {} ({} tokens allocated)",
            per_token,
            allocated_tokens
        );

        per_token
    }
}

impl AllocationSnapshot {
    /// Rewards owed given the subgraph's current per-allocated-token value.
    ///
    /// Once rewards have been minted the owed amount is fixed to the minted total.
    pub fn rewards_owed(&self, acc_rewards_per_allocated_token: FixedPoint, denied: bool) -> TokenAmount {
        if let Some(plan) = &self.pending_payout {
            return plan.total();
        }
        if denied {
            return 0;
        }
        calc_rewards(
            self.allocated_tokens,
            self.acc_rewards_per_allocated_token_at_open,
            acc_rewards_per_allocated_token,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::IndexerRewardParams;
    use crate::distribution::PayoutPlan;
    use curation_types::{tokens, Address, SubgraphId};

    fn snapshot(tokens_allocated: TokenAmount, at_open: FixedPoint) -> AllocationSnapshot {
        AllocationSnapshot {
            subgraph_id: SubgraphId::from_label("subgraph"),
            indexer: Address::from_label("indexer"),
            allocated_tokens: tokens_allocated,
            acc_rewards_per_allocated_token_at_open: at_open,
            opened_at_block: 1,
            closed_at_block: None,
            pending_payout: None,
        }
    }

    #[test]
    fn test_rewards_spread_over_allocated_tokens() {
        let state = SubgraphState::default();
        // 2 reward tokens per signal unit on 100 signal => 200 tokens accrued
        let (per_token, accrued) =
            state.per_allocated_token(FixedPoint::from_integer(2), tokens(100), tokens(50));
        assert_eq!(accrued, tokens(200));
        assert_eq!(per_token, FixedPoint::from_integer(4));
    }

    #[test]
    fn test_nothing_allocated_keeps_accumulator() {
        let mut state = SubgraphState {
            acc_rewards_per_allocated_token: FixedPoint::from_integer(3),
            ..Default::default()
        };
        let value = state.on_allocation_set_changed(FixedPoint::from_integer(1), tokens(10), 0);
        assert_eq!(value, FixedPoint::from_integer(3));
        // Rewards accrued without stake are consumed, not carried over
        assert_eq!(state.acc_rewards_for_subgraph_snapshot, tokens(10));
    }

    #[test]
    fn test_pending_rewards_spent_once() {
        let mut state = SubgraphState::default();
        let acc = FixedPoint::from_integer(1);
        let first = state.on_allocation_set_changed(acc, tokens(100), tokens(10));
        assert_eq!(first, FixedPoint::from_integer(10));

        // Same global value again: nothing new to spread
        let second = state.on_allocation_set_changed(acc, tokens(100), tokens(20));
        assert_eq!(second, first);
    }

    #[test]
    fn test_snapshot_never_moves_backwards() {
        let mut state = SubgraphState {
            acc_rewards_for_subgraph: tokens(5),
            acc_rewards_for_subgraph_snapshot: tokens(8),
            ..Default::default()
        };
        let per_token = state.on_allocation_set_changed(FixedPoint::ZERO, 0, tokens(1));
        assert_eq!(per_token, FixedPoint::ZERO);
        assert_eq!(state.acc_rewards_for_subgraph_snapshot, tokens(8));
    }

    #[test]
    fn test_rewards_owed() {
        let allocation = snapshot(tokens(10), FixedPoint::from_integer(1));
        assert_eq!(
            allocation.rewards_owed(FixedPoint::from_integer(4), false),
            tokens(30)
        );
        assert_eq!(allocation.rewards_owed(FixedPoint::from_integer(4), true), 0);
        // Accumulator behind the open value clamps instead of underflowing
        assert_eq!(allocation.rewards_owed(FixedPoint::ZERO, false), 0);
    }

    #[test]
    fn test_minted_rewards_are_fixed() {
        let mut allocation = snapshot(tokens(10), FixedPoint::ZERO);
        allocation.pending_payout = Some(PayoutPlan::new(
            allocation.indexer,
            tokens(3),
            &IndexerRewardParams::default(),
            None,
            0,
        ));
        assert_eq!(allocation.rewards_owed(FixedPoint::from_integer(5), false), tokens(3));
        assert_eq!(allocation.rewards_owed(FixedPoint::from_integer(5), true), tokens(3));
    }
}
