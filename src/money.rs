//! Monetary amounts in integer minor units (cents).
//!
//! All core arithmetic is exact integer math. `Cents` is an unsigned amount
//! (entry amounts, transfer amounts); `SignedCents` is used for running
//! balances and discrepancies, which may be negative. Conversions to the
//! database layer go through `i64`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unsigned monetary amount in cents.
///
/// Internal value is private to force construction through audited money
/// logic. Serializes transparently as a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cents(u64);

/// Signed monetary amount in cents (running balances, discrepancies).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedCents(i64);

impl Cents {
    pub const ZERO: Cents = Cents(0);

    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    pub fn to_raw(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Saturating subtraction, clamping at zero.
    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    /// Convert to a signed balance delta.
    pub fn as_signed(self) -> SignedCents {
        SignedCents(self.0 as i64)
    }

    /// Database representation (Postgres BIGINT).
    pub fn as_db(self) -> i64 {
        self.0 as i64
    }

    /// Reconstruct from a database BIGINT. Negative values are invalid for
    /// unsigned amounts; callers reject them in row mapping.
    pub fn from_db(v: i64) -> Option<Self> {
        if v < 0 { None } else { Some(Self(v as u64)) }
    }
}

impl SignedCents {
    pub const ZERO: SignedCents = SignedCents(0);

    pub const fn new(v: i64) -> Self {
        Self(v)
    }

    pub fn to_raw(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn abs(self) -> Cents {
        Cents(self.0.unsigned_abs())
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn as_db(self) -> i64 {
        self.0
    }

    pub fn from_db(v: i64) -> Self {
        Self(v)
    }
}

impl From<u64> for Cents {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl From<i64> for SignedCents {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SignedCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_arithmetic() {
        let a = Cents::new(150);
        let b = Cents::new(50);

        assert_eq!(a.checked_add(b), Some(Cents::new(200)));
        assert_eq!(a.checked_sub(b), Some(Cents::new(100)));
        assert_eq!(b.checked_sub(a), None);
        assert_eq!(b.saturating_sub(a), Cents::ZERO);
    }

    #[test]
    fn test_no_overflow() {
        assert_eq!(Cents::new(u64::MAX).checked_add(Cents::new(1)), None);
        assert_eq!(
            SignedCents::new(i64::MAX).checked_add(SignedCents::new(1)),
            None
        );
    }

    #[test]
    fn test_db_roundtrip() {
        assert_eq!(
            Cents::from_db(Cents::new(12_345).as_db()),
            Some(Cents::new(12_345))
        );
        assert_eq!(Cents::from_db(-1), None);
        assert_eq!(SignedCents::from_db(-500).to_raw(), -500);
    }

    #[test]
    fn test_signed_abs() {
        assert_eq!(SignedCents::new(-500).abs(), Cents::new(500));
        assert_eq!(SignedCents::new(500).abs(), Cents::new(500));
    }
}
