//! Global accumulator
//!
//! Tracks cumulative rewards per unit of signal. The value is advanced lazily:
//! between updates, pending rewards are derived from the blocks elapsed since
//! `last_updated_block` and the protocol-wide signal at the time of the call.

use crate::state::GlobalState;
use curation_types::{BlockNumber, FixedPoint, TokenAmount};
use tracing::debug;

impl GlobalState {
    /// `issuance_per_block * elapsed_blocks / total_signal`.
    ///
    /// Zero when no block has elapsed or nothing is signalled.
    pub fn pending_rewards_per_signal(
        &self,
        current_block: BlockNumber,
        total_signal: TokenAmount,
    ) -> FixedPoint {
        let elapsed = current_block.saturating_sub(self.last_updated_block);
        if elapsed == 0 || total_signal == 0 {
            return FixedPoint::ZERO;
        }
        let issued = self.issuance_per_block.saturating_mul(elapsed as u128);
        FixedPoint::from_ratio(issued, total_signal)
    }

    /// Stored accumulator plus pending rewards, without mutating.
    pub fn acc_rewards_per_signal_at(
        &self,
        current_block: BlockNumber,
        total_signal: TokenAmount,
    ) -> FixedPoint {
        self.acc_rewards_per_signal
            .saturating_add(self.pending_rewards_per_signal(current_block, total_signal))
    }

    /// Fold pending rewards into the accumulator and return the new value.
    pub fn advance(&mut self, current_block: BlockNumber, total_signal: TokenAmount) -> FixedPoint {
        let pending = self.pending_rewards_per_signal(current_block, total_signal);
        self.acc_rewards_per_signal = self.acc_rewards_per_signal.saturating_add(pending);
        // A clock reading behind the last update must not rewind the anchor.
        self.last_updated_block = self.last_updated_block.max(current_block);

        debug!(
            target: "rewards",
            "Advanced acc rewards per signal to {} at block {} (+{})",
            self.acc_rewards_per_signal,
            self.last_updated_block,
            pending
        );

        self.acc_rewards_per_signal
    }
}
