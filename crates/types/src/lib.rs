//! Shared primitives for the curation rewards engine: fixed-point
//! accumulators, token amounts, ratios and identifiers.

pub mod address;
pub mod amounts;
pub mod fixed_point;

pub use address::*;
pub use amounts::*;
pub use fixed_point::*;

/// Block height on the host chain.
pub type BlockNumber = u64;

/// Protocol epoch index.
pub type Epoch = u64;
