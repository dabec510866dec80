//! Fixed-point money and epoch-day dates.
//!
//! Every amount inside the core is a [`MinorUnits`] (øre, cents) and every
//! date is an [`EpochDay`]. Conversion from decimals and calendar dates
//! happens exactly once at the ingestion boundary; there is no way back
//! into floating point from these types.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub};
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::{Result, TallyError, constants};

// ---------------------------------------------------------------------------
// MinorUnits
// ---------------------------------------------------------------------------

/// A signed amount in integer minor currency units (amount × 100, rounded).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MinorUnits(pub i64);

impl MinorUnits {
    pub const ZERO: Self = Self(0);

    /// Largest magnitude accepted at ingestion. Sums of thousands of such
    /// amounts still fit in `i64`.
    pub const MAX: Self = Self(constants::MAX_ABS_MINOR_UNITS);

    /// Convert a decimal major-unit amount: `round(amount × 100)`, half away
    /// from zero.
    ///
    /// # Errors
    /// `AmountOutOfRange` if the result exceeds [`MinorUnits::MAX`] in
    /// magnitude.
    pub fn from_decimal(amount: Decimal) -> Result<Self> {
        let scaled = amount
            .checked_mul(Decimal::from(constants::MINOR_UNITS_PER_MAJOR))
            .ok_or_else(|| TallyError::AmountOutOfRange {
                amount: amount.to_string(),
            })?;
        scaled
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .filter(|minor| minor.unsigned_abs() <= Self::MAX.0.unsigned_abs())
            .map(Self)
            .ok_or_else(|| TallyError::AmountOutOfRange {
                amount: amount.to_string(),
            })
    }

    /// Convert a floating-point amount as stored by some backends.
    ///
    /// The float goes through `Decimal` first so the ×100 never happens in
    /// binary floating point.
    pub fn from_f64(amount: f64) -> Result<Self> {
        let decimal = Decimal::from_f64(amount).ok_or_else(|| TallyError::AmountOutOfRange {
            amount: amount.to_string(),
        })?;
        Self::from_decimal(decimal)
    }

    /// Parse a textual amount such as `"-150.50"`.
    pub fn parse(text: &str) -> Result<Self> {
        let decimal = Decimal::from_str(text.trim()).map_err(|_| TallyError::AmountOutOfRange {
            amount: text.to_string(),
        })?;
        Self::from_decimal(decimal)
    }

    #[must_use]
    pub fn abs(self) -> Self {
        Self(self.0.saturating_abs())
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[must_use]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// `true` when `self` and `other` are non-zero with opposite signs,
    /// i.e. they can partially cancel each other.
    #[must_use]
    pub fn opposes(self, other: Self) -> bool {
        (self.0 > 0 && other.0 < 0) || (self.0 < 0 && other.0 > 0)
    }
}

// Operators saturate. Ingested amounts stay within `MAX`; only rule
// tolerances reach the `i64` limits, where a clamped bound is still exact.

impl Add for MinorUnits {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for MinorUnits {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for MinorUnits {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for MinorUnits {
    type Output = Self;

    fn neg(self) -> Self {
        Self(self.0.saturating_neg())
    }
}

impl Sum for MinorUnits {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a MinorUnits> for MinorUnits {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for MinorUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = constants::MINOR_UNITS_PER_MAJOR.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / per, abs % per)
    }
}

// ---------------------------------------------------------------------------
// EpochDay
// ---------------------------------------------------------------------------

/// `NaiveDate::num_days_from_ce` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A calendar date as whole days since 1970-01-01 (UTC midnight semantics).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EpochDay(pub i32);

impl EpochDay {
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
    }

    /// Timestamps are truncated to their UTC calendar date.
    #[must_use]
    pub fn from_datetime(timestamp: DateTime<Utc>) -> Self {
        Self::from_date(timestamp.date_naive())
    }

    #[must_use]
    pub fn to_date(self) -> Option<NaiveDate> {
        NaiveDate::from_num_days_from_ce_opt(self.0 + UNIX_EPOCH_DAYS_FROM_CE)
    }

    /// Absolute distance in days.
    #[must_use]
    pub fn abs_diff(self, other: Self) -> u32 {
        self.0.abs_diff(other.0)
    }
}

impl fmt::Display for EpochDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_date() {
            Some(date) => write!(f, "{date}"),
            None => write!(f, "day:{}", self.0),
        }
    }
}
