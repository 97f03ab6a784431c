use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors that can occur when parsing a hex-encoded identifier.
#[derive(Debug, thiserror::Error)]
pub enum IdentifierError {
    #[error("identifier must start with '0x'")]
    InvalidPrefix,
    #[error("identifier must be {expected} characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("identifier payload is not valid hexadecimal")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Number of raw bytes contained in an account address.
pub const ADDRESS_BYTES: usize = 20;

/// Number of raw bytes contained in a subgraph deployment identifier.
pub const SUBGRAPH_ID_BYTES: usize = 32;

/// Encode raw bytes as a `0x`-prefixed lowercase hex string.
pub fn encode_hex_id(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(2 + bytes.len() * 2);
    encoded.push_str("0x");
    encoded.push_str(&hex::encode(bytes));
    encoded
}

/// Decode a `0x`-prefixed hex string into exactly `N` bytes.
pub fn decode_hex_id<const N: usize>(value: &str) -> Result<[u8; N], IdentifierError> {
    let payload = value
        .strip_prefix("0x")
        .ok_or(IdentifierError::InvalidPrefix)?;

    if payload.len() != N * 2 {
        return Err(IdentifierError::InvalidLength {
            expected: 2 + N * 2,
            actual: value.len(),
        });
    }

    let mut bytes = [0u8; N];
    hex::decode_to_slice(payload, &mut bytes)?;
    Ok(bytes)
}

/// Account address of a protocol participant (indexer, governor, oracle,
/// collaborator contract).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(pub [u8; ADDRESS_BYTES]);

/// Allocations are identified by an address-sized key.
pub type AllocationId = Address;

impl Address {
    pub const ZERO: Self = Self([0u8; ADDRESS_BYTES]);

    /// Deterministic address derived from a human readable label.
    pub fn from_label(label: &str) -> Self {
        let hash = blake3::hash(label.as_bytes());
        let mut bytes = [0u8; ADDRESS_BYTES];
        bytes.copy_from_slice(&hash.as_bytes()[..ADDRESS_BYTES]);
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_BYTES]
    }
}

impl From<[u8; ADDRESS_BYTES]> for Address {
    fn from(value: [u8; ADDRESS_BYTES]) -> Self {
        Address(value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        encode_hex_id(&value.0)
    }
}

impl TryFrom<String> for Address {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        decode_hex_id(&value).map(Address)
    }
}

impl std::str::FromStr for Address {
    type Err = IdentifierError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        decode_hex_id(value).map(Address)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_hex_id(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

/// Subgraph deployment identifier (32-byte content hash).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubgraphId(pub [u8; SUBGRAPH_ID_BYTES]);

impl SubgraphId {
    /// Deterministic identifier derived from a human readable label.
    pub fn from_label(label: &str) -> Self {
        Self(*blake3::hash(label.as_bytes()).as_bytes())
    }
}

impl From<[u8; SUBGRAPH_ID_BYTES]> for SubgraphId {
    fn from(value: [u8; SUBGRAPH_ID_BYTES]) -> Self {
        SubgraphId(value)
    }
}

impl From<SubgraphId> for String {
    fn from(value: SubgraphId) -> Self {
        encode_hex_id(&value.0)
    }
}

impl TryFrom<String> for SubgraphId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        decode_hex_id(&value).map(SubgraphId)
    }
}

impl fmt::Display for SubgraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_hex_id(&self.0))
    }
}

impl fmt::Debug for SubgraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubgraphId({self})")
    }
}
