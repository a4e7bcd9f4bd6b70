// 1.0: all the primitives live here. ids, order side, prices and cash.
// each is a newtype so the compiler catches a price passed where cash belongs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub u64);

/// Rounds are numbered from 1.
pub type RoundNumber = u32;

/// A cash or share amount left the representable range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("arithmetic overflow computing {0}")]
pub struct Overflow(pub &'static str);

// Bid = buy, Offer = sell. wire codes follow the experiment forms: -1 buy, 1 sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Bid,
    Offer,
}

impl OrderType {
    pub fn code(&self) -> i32 {
        match self {
            OrderType::Bid => -1,
            OrderType::Offer => 1,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(OrderType::Bid),
            1 => Some(OrderType::Offer),
            _ => None,
        }
    }

    // share delta per unit filled
    pub fn share_sign(&self) -> i64 {
        match self {
            OrderType::Bid => 1,
            OrderType::Offer => -1,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            OrderType::Bid => OrderType::Offer,
            OrderType::Offer => OrderType::Bid,
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Bid => write!(f, "BID"),
            OrderType::Offer => write!(f, "OFFER"),
        }
    }
}

// 1.1: price per share in currency units. zero is allowed: a market with no
// interest has a zero fundamental value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value >= Decimal::ZERO);
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Nearest whole currency unit, ties to even (`800.5 -> 800`, `801.5 -> 802`).
    pub fn round_to_unit(&self) -> Self {
        Self(self.0.round())
    }

    /// Scales by `factor`, flooring at zero.
    pub fn scale(&self, factor: Decimal) -> Result<Self, Overflow> {
        let scaled = self.0.checked_mul(factor).ok_or(Overflow("scaled price"))?;
        Ok(Self(scaled.max(Decimal::ZERO)))
    }

    /// Cost of `shares` shares at this price.
    pub fn notional(&self, shares: i64) -> Result<Decimal, Overflow> {
        self.0
            .checked_mul(Decimal::from(shares))
            .ok_or(Overflow("notional"))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.2: signed cash amount. balances, trade costs, dividends and interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Cash(Decimal);

impl Cash {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn checked_add(&self, other: Cash) -> Result<Self, Overflow> {
        self.0.checked_add(other.0).map(Self).ok_or(Overflow("cash sum"))
    }

    pub fn checked_sub(&self, other: Cash) -> Result<Self, Overflow> {
        self.0.checked_sub(other.0).map(Self).ok_or(Overflow("cash difference"))
    }

    pub fn checked_mul(&self, factor: Decimal) -> Result<Self, Overflow> {
        self.0.checked_mul(factor).map(Self).ok_or(Overflow("cash product"))
    }
}

impl From<i64> for Cash {
    fn from(value: i64) -> Self {
        Self(Decimal::from(value))
    }
}

impl fmt::Display for Cash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Cash {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cash {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn order_type_codes() {
        assert_eq!(OrderType::Bid.code(), -1);
        assert_eq!(OrderType::Offer.code(), 1);
        assert_eq!(OrderType::from_code(-1), Some(OrderType::Bid));
        assert_eq!(OrderType::from_code(2), None);
        assert_eq!(OrderType::Bid.opposite(), OrderType::Offer);
    }

    #[test]
    fn price_rejects_negative() {
        assert!(Price::new(dec!(-1)).is_none());
        assert!(Price::new(Decimal::ZERO).is_some());
    }

    #[test]
    fn round_to_unit_is_half_even() {
        assert_eq!(Price::new_unchecked(dec!(801.1)).round_to_unit().value(), dec!(801));
        assert_eq!(Price::new_unchecked(dec!(800.5)).round_to_unit().value(), dec!(800));
        assert_eq!(Price::new_unchecked(dec!(801.5)).round_to_unit().value(), dec!(802));
        assert_eq!(Price::new_unchecked(dec!(801.6)).round_to_unit().value(), dec!(802));
    }

    #[test]
    fn cash_arithmetic() {
        let c = Cash::from(200)
            .checked_sub(Cash::from(30))
            .and_then(|c| c.checked_add(Cash::new(dec!(17))))
            .unwrap();
        assert_eq!(c.value(), dec!(187));
        assert!(Cash::from(-5).is_negative());
        assert_eq!(Cash::from(-5).abs(), Cash::from(5));
    }

    #[test]
    fn overflow_is_an_error() {
        let huge = Price::new_unchecked(Decimal::MAX);
        assert_eq!(huge.notional(2), Err(Overflow("notional")));
        assert_eq!(huge.scale(dec!(1.1)), Err(Overflow("scaled price")));
        assert!(Cash::new(Decimal::MAX).checked_add(Cash::from(1)).is_err());
        assert_eq!(Price::new_unchecked(dec!(15)).notional(-2), Ok(dec!(-30)));
    }
}
