//! Curation rewards engine
//!
//! Accrues inflation-funded indexing rewards and pays them out when
//! allocations close:
//!
//! - a global accumulator of rewards per unit of curation signal
//!   ([`accumulator`])
//! - per-subgraph snapshots of accrued rewards ([`subgraph`])
//! - per-allocation rewards from a per-allocated-token accumulator
//!   ([`allocation`])
//! - the indexer/delegator split and payout on close ([`distribution`])
//!
//! [`RewardsManager`] owns the state and is the only entry point that
//! mutates it. Token balances, stake and signal live in external
//! collaborators reached through the traits in [`collaborators`];
//! [`InMemoryProtocol`] implements all of them for simulations and tests.

pub mod access;
pub mod accumulator;
pub mod allocation;
pub mod batch;
pub mod collaborators;
pub mod config;
pub mod distribution;
pub mod errors;
pub mod events;
pub mod manager;
pub mod protocol;
pub mod state;
pub mod subgraph;

pub use access::{AccessControl, Role};
pub use allocation::calc_rewards;
pub use batch::{CallOutput, RewardsCall};
pub use collaborators::{
    AllocationInfo, ChainClock, IndexerRewardParams, IssuanceAuthority, Protocol, ProtocolView,
    SignalSource, StakeLedger, StakeSource,
};
pub use config::{init_logging, LoggingConfig, RewardsConfig};
pub use distribution::{split_rewards, CloseOutcome, PayoutPlan, RewardSplit};
pub use errors::{Result, RewardsError};
pub use events::{EventLog, RewardsEvent};
pub use manager::RewardsManager;
pub use protocol::InMemoryProtocol;
pub use state::{AllocationSnapshot, GlobalState, RewardsParams, RewardsState, SubgraphState};
