//! Point amounts in integer minor units (hundredths).
//!
//! All sums and comparisons happen on integers; decimal values are only
//! produced or consumed at the edges (oracle responses, HTTP bodies).

use std::fmt;
use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};

/// Minor units per whole point
pub const MINOR_UNITS_PER_POINT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Points(i64);

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PointsError {
    #[error("not a decimal number: {0}")]
    NotANumber(String),

    #[error("amount must not be negative: {0}")]
    Negative(String),

    #[error("amount out of range: {0}")]
    OutOfRange(String),
}

impl Points {
    pub const ZERO: Points = Points(0);

    pub const fn from_minor(minor: i64) -> Self {
        Points(minor)
    }

    pub const fn minor(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Convert a decimal amount of whole points into minor units.
    ///
    /// Sub-minor fractions are rounded half-to-even.
    pub fn from_decimal(value: &BigDecimal) -> Result<Self, PointsError> {
        if *value < BigDecimal::from(0) {
            return Err(PointsError::Negative(value.to_string()));
        }

        let scaled = (value * BigDecimal::from(MINOR_UNITS_PER_POINT))
            .with_scale_round(0, RoundingMode::HalfEven);
        scaled
            .to_i64()
            .map(Points)
            .ok_or_else(|| PointsError::OutOfRange(value.to_string()))
    }

    /// Parse a textual decimal such as `"729.98"` or `"1e3"`
    pub fn parse_decimal(raw: &str) -> Result<Self, PointsError> {
        let value = BigDecimal::from_str(raw.trim())
            .map_err(|_| PointsError::NotANumber(raw.to_string()))?;
        Self::from_decimal(&value)
    }

    pub fn checked_add(self, rhs: Points) -> Option<Points> {
        self.0.checked_add(rhs.0).map(Points)
    }

    pub fn checked_sub(self, rhs: Points) -> Option<Points> {
        self.0.checked_sub(rhs.0).map(Points)
    }

    /// Total of `amounts`, or `None` once the running sum leaves the i64 range
    pub fn checked_sum<I: IntoIterator<Item = Points>>(amounts: I) -> Option<Points> {
        amounts
            .into_iter()
            .try_fold(Points::ZERO, |total, amount| total.checked_add(amount))
    }

    /// Decimal representation for display at the boundary
    pub fn as_decimal(&self) -> f64 {
        self.0 as f64 / MINOR_UNITS_PER_POINT as f64
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per_point = MINOR_UNITS_PER_POINT as u64;
        write!(f, "{}{}.{:02}", sign, abs / per_point, abs % per_point)
    }
}
