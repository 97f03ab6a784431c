//! Deterministic fixed-point arithmetic for reward accumulators.
//!
//! Accumulators are stored as unsigned integers scaled by `10^18`. Every
//! division rounds toward zero (floor) and products are widened to arbitrary
//! precision before dividing, so no intermediate result can overflow. The
//! type never traps: subtraction clamps at zero and results that do not fit
//! in `u128` saturate at `u128::MAX`.

use core::fmt::{self, Display, Formatter};

use num_bigint::BigUint;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::amounts::TokenAmount;

/// Scaling factor: 1.0 = 10^18 raw units.
pub const FIXED_POINT_SCALE: u128 = 1_000_000_000_000_000_000;

/// Number of decimal places carried by [`FixedPoint`].
pub const FIXED_POINT_DECIMALS: u32 = 18;

/// Computes `floor(a * b / denominator)` without intermediate overflow.
///
/// A zero denominator yields zero: every caller in the rewards engine treats
/// an empty divisor (no signal, no allocated stake) as "nothing to spread".
/// Quotients that do not fit in `u128` saturate.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> u128 {
    if denominator == 0 {
        return 0;
    }
    match a.checked_mul(b) {
        Some(product) => product / denominator,
        None => {
            let wide = BigUint::from(a) * BigUint::from(b) / BigUint::from(denominator);
            wide.to_u128().unwrap_or(u128::MAX)
        }
    }
}

/// Unsigned fixed-point number with eighteen decimal places.
#[derive(
    Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(transparent)]
pub struct FixedPoint(pub u128);

impl FixedPoint {
    /// Zero constant.
    pub const ZERO: Self = Self(0);

    /// Construct from a raw scaled integer.
    #[inline]
    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    /// Return the raw scaled integer value.
    #[inline]
    pub const fn into_raw(self) -> u128 {
        self.0
    }

    /// Construct from a whole number, saturating on overflow.
    #[inline]
    pub fn from_integer(value: u128) -> Self {
        Self(value.saturating_mul(FIXED_POINT_SCALE))
    }

    /// `numerator / denominator` as fixed-point, rounded down.
    ///
    /// Returns zero when `denominator` is zero.
    #[inline]
    pub fn from_ratio(numerator: u128, denominator: u128) -> Self {
        Self(mul_div(numerator, FIXED_POINT_SCALE, denominator))
    }

    #[inline]
    pub fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Subtraction clamped at zero.
    #[inline]
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// `self * amount`, truncated to whole base units.
    #[inline]
    pub fn mul_amount(self, amount: TokenAmount) -> TokenAmount {
        mul_div(self.0, amount, FIXED_POINT_SCALE)
    }
}

impl Display for FixedPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let integer = self.0 / FIXED_POINT_SCALE;
        let fraction = self.0 % FIXED_POINT_SCALE;
        write!(
            f,
            "{}.{:0width$}",
            integer,
            fraction,
            width = FIXED_POINT_DECIMALS as usize
        )
    }
}
