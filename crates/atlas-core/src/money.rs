//! # Money Module
//!
//! Integer-cents money for plan prices, sale totals, and ledger amounts.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Floats drift: 0.1 + 0.2 = 0.30000000000000004.                         │
//! │  A financial ledger cannot drift.                                       │
//! │                                                                         │
//! │  Every amount is an i64 count of cents: a $45.00 plan is 4500,         │
//! │  a $3.50 shake is 350. Arithmetic stays exact; only Display            │
//! │  converts to dollars, and only for logs and receipts.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The database binds raw `i64` cents; `Money` is how code computes with
//! and prints them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in cents.
///
/// Signed so that derived quantities (differences in reports) stay
/// representable; the validators keep stored amounts strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// The value in cents, for binding into queries and payloads.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// The whole-dollar portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// The sub-dollar portion, always 0-99.
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Zero money.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// A line total: unit price times quantity.
    ///
    /// ## Example
    /// ```rust
    /// use atlas_core::money::Money;
    ///
    /// let shake = Money::from_cents(350);
    /// assert_eq!(shake.multiply_quantity(2).cents(), 700);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Human-readable dollars for logs and receipts. Localized formatting
/// belongs to whatever presents the data, not here.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

/// Default money is zero.
impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

/// Totals an iterator of line amounts.
impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(4599);
        assert_eq!(money.cents(), 4599);
        assert_eq!(money.dollars(), 45);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(4500)), "$45.00");
        assert_eq!(format!("{}", Money::from_cents(299)), "$2.99");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "$0.00");
    }

    #[test]
    fn test_line_math() {
        let unit_price = Money::from_cents(299);
        assert_eq!(unit_price.multiply_quantity(3).cents(), 897);

        let mut running = Money::zero();
        running += Money::from_cents(700);
        running += Money::from_cents(250);
        assert_eq!(running.cents(), 950);
    }

    #[test]
    fn test_sum_of_lines() {
        let total: Money = [350, 350, 250]
            .into_iter()
            .map(Money::from_cents)
            .sum();
        assert_eq!(total.cents(), 950);
        assert!(!total.is_zero());
    }
}
