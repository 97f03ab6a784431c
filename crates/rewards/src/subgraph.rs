//! Subgraph rewards tracker
//!
//! A subgraph earns its share of the global per-signal accumulator in
//! proportion to its effective signal. The share is materialized into
//! `acc_rewards_for_subgraph` whenever the subgraph's signal changes, so
//! rewards earned under the old signal are never re-weighted by the new one.

use crate::state::SubgraphState;
use curation_types::{FixedPoint, TokenAmount};

impl SubgraphState {
    /// Rewards accrued by the subgraph as of `acc_rewards_per_signal`.
    ///
    /// `effective_signal` must already have the minimum-signal floor applied.
    /// If the global value is behind the snapshot the delta clamps to zero.
    pub fn accrued_for_subgraph(
        &self,
        acc_rewards_per_signal: FixedPoint,
        effective_signal: TokenAmount,
    ) -> TokenAmount {
        let new_rewards_per_signal =
            acc_rewards_per_signal.saturating_sub(self.acc_rewards_per_signal_snapshot);
        self.acc_rewards_for_subgraph
            .saturating_add(new_rewards_per_signal.mul_amount(effective_signal))
    }

    /// Snapshot accrued rewards and the global accumulator they were measured at.
    ///
    /// Callers advance the global accumulator first and pass its new value.
    pub fn on_signal_changed(
        &mut self,
        acc_rewards_per_signal: FixedPoint,
        effective_signal: TokenAmount,
    ) -> TokenAmount {
        self.acc_rewards_for_subgraph =
            self.accrued_for_subgraph(acc_rewards_per_signal, effective_signal);
        self.acc_rewards_per_signal_snapshot = self
            .acc_rewards_per_signal_snapshot
            .max(acc_rewards_per_signal);
        self.acc_rewards_for_subgraph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curation_types::tokens;

    #[test]
    fn test_accrual_is_weighted_by_signal() {
        let state = SubgraphState::default();
        let acc = FixedPoint::from_ratio(4, 5);
        assert_eq!(state.accrued_for_subgraph(acc, tokens(1000)), tokens(800));
        assert_eq!(state.accrued_for_subgraph(acc, 0), 0);
    }

    #[test]
    fn test_snapshot_prevents_double_counting() {
        let mut state = SubgraphState::default();
        let acc = FixedPoint::from_integer(2);
        assert_eq!(state.on_signal_changed(acc, tokens(10)), tokens(20));
        assert_eq!(state.acc_rewards_per_signal_snapshot, acc);

        // No global movement since the snapshot: nothing new accrues
        assert_eq!(state.accrued_for_subgraph(acc, tokens(50)), tokens(20));

        // Further movement is weighted by the new signal
        let later = FixedPoint::from_integer(3);
        assert_eq!(state.accrued_for_subgraph(later, tokens(50)), tokens(70));
    }

    #[test]
    fn test_stale_global_value_clamps_to_zero() {
        let mut state = SubgraphState::default();
        state.on_signal_changed(FixedPoint::from_integer(5), tokens(1));
        let before = state.acc_rewards_for_subgraph;

        let accrued = state.accrued_for_subgraph(FixedPoint::from_integer(1), tokens(1));
        assert_eq!(accrued, before);

        state.on_signal_changed(FixedPoint::from_integer(1), tokens(1));
        assert_eq!(state.acc_rewards_per_signal_snapshot, FixedPoint::from_integer(5));
    }

    #[test]
    fn test_repeated_reads_are_identical() {
        let mut state = SubgraphState::default();
        state.on_signal_changed(FixedPoint::from_integer(1), tokens(3));
        let acc = FixedPoint::from_ratio(7, 3);
        assert_eq!(
            state.accrued_for_subgraph(acc, tokens(3)),
            state.accrued_for_subgraph(acc, tokens(3))
        );
    }
}
