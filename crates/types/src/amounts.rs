//! Token amounts and parts-per-million ratios.
//!
//! Tokens are stored as integers with 18 decimal places. Ratios such as the
//! indexer reward cut are expressed in parts per million and applied with
//! floor rounding.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::fixed_point::mul_div;

/// Token amount in base units (10^-18 token precision).
pub type TokenAmount = u128;

/// Number of decimal places for token precision
pub const TOKEN_DECIMALS: u32 = 18;

/// Conversion factor: 1 token = 10^18 base units
pub const BASE_UNITS_PER_TOKEN: TokenAmount = 10u128.pow(TOKEN_DECIMALS);

/// Denominator for [`Ppm`] ratios.
pub const MAX_PPM: u32 = 1_000_000;

/// Convert whole tokens into base units, saturating on overflow.
pub fn tokens(whole: u128) -> TokenAmount {
    whole.saturating_mul(BASE_UNITS_PER_TOKEN)
}

/// Display adapter that renders base units as decimal tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayTokens(pub TokenAmount);

impl fmt::Display for DisplayTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / BASE_UNITS_PER_TOKEN;
        let fraction = self.0 % BASE_UNITS_PER_TOKEN;
        if fraction == 0 {
            return write!(f, "{whole} tokens");
        }
        let digits = format!("{:018}", fraction);
        write!(f, "{whole}.{} tokens", digits.trim_end_matches('0'))
    }
}

/// Serde adapter storing a [`TokenAmount`] as a decimal string of base units.
///
/// TOML integers are 64-bit, which cannot hold 18-decimal amounts. Plain
/// integers are still accepted on input for small values.
pub mod amount_string {
    use super::TokenAmount;
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Integer(u64),
    }

    pub fn serialize<S: Serializer>(amount: &TokenAmount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TokenAmount, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => text
                .trim()
                .replace('_', "")
                .parse::<TokenAmount>()
                .map_err(de::Error::custom),
            Repr::Integer(value) => Ok(TokenAmount::from(value)),
        }
    }
}

/// Errors raised when constructing a [`Ppm`] ratio.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PpmError {
    #[error("ratio {0} exceeds {MAX_PPM} parts per million")]
    OutOfRange(u32),
}

/// Ratio in parts per million, always within `0..=MAX_PPM`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Ppm(u32);

impl Ppm {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(MAX_PPM);

    pub fn new(value: u32) -> Result<Self, PpmError> {
        if value > MAX_PPM {
            return Err(PpmError::OutOfRange(value));
        }
        Ok(Self(value))
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// `amount * self / MAX_PPM`, rounded down.
    pub fn apply(self, amount: TokenAmount) -> TokenAmount {
        mul_div(amount, self.0 as u128, MAX_PPM as u128)
    }
}

impl TryFrom<u32> for Ppm {
    type Error = PpmError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Ppm> for u32 {
    fn from(value: Ppm) -> Self {
        value.0
    }
}

impl fmt::Display for Ppm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ppm", self.0)
    }
}
