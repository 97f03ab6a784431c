//! Error types for the rewards engine

use crate::access::Role;
use curation_types::{Address, AllocationId};
use thiserror::Error;

/// Errors that can occur in the rewards engine.
///
/// Arithmetic never produces an error: accumulator math saturates instead.
#[derive(Error, Debug)]
pub enum RewardsError {
    /// Caller does not hold the role the operation requires
    #[error("caller {caller} is not authorized as {role}")]
    Unauthorized { caller: Address, role: Role },

    /// Allocation is unknown to the engine or the stake source
    #[error("allocation not found: {0}")]
    AllocationNotFound(AllocationId),

    /// Allocation was already closed and paid out
    #[error("allocation already closed: {0}")]
    AllocationAlreadyClosed(AllocationId),

    /// Allocation was already opened
    #[error("allocation already exists: {0}")]
    AllocationAlreadyExists(AllocationId),

    /// Invalid parameter value
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Denylist batch with mismatched lengths
    #[error("denylist update has {ids} subgraphs but {flags} flags")]
    LengthMismatch { ids: usize, flags: usize },

    /// A collaborator (issuance, stake ledger) failed
    #[error("collaborator call failed: {0}")]
    Collaborator(#[from] anyhow::Error),

    /// A call inside a batch failed; earlier calls stay committed
    #[error("batch call {index} failed: {source}")]
    BatchCallFailed {
        index: usize,
        #[source]
        source: Box<RewardsError>,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for rewards operations
pub type Result<T> = std::result::Result<T, RewardsError>;
