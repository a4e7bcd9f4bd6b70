//! Order submission checks.
//!
//! Raw form input is parsed into a typed order or rejected with every violation
//! found. Each violation knows the form field it belongs to and carries a bit so
//! a set of them can be reported as one combined code.

use crate::config::OrderLimits;
use crate::order::Order;
use crate::types::{OrderType, Price};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderField {
    Price,
    Quantity,
    Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum OrderViolation {
    #[error("Must be greater than zero")]
    PriceNegative,
    #[error("Must be an integer number")]
    PriceNotNum,
    #[error("Must be greater than zero")]
    QuantNegative,
    #[error("Must be an integer number")]
    QuantNotNum,
    #[error("Select a type")]
    BadType,
    #[error("Buy price must be less than all sell orders")]
    BidGreaterThanAsk,
    #[error("Sell price must be greater than all buy orders")]
    AskLessThanBid,
    #[error("Must not exceed the price limit")]
    PriceTooLarge,
    #[error("Must not exceed the quantity limit")]
    QuantTooLarge,
}

impl OrderViolation {
    pub fn code(&self) -> u32 {
        match self {
            OrderViolation::PriceNegative => 1,
            OrderViolation::PriceNotNum => 2,
            OrderViolation::QuantNegative => 4,
            OrderViolation::QuantNotNum => 8,
            OrderViolation::BadType => 16,
            OrderViolation::BidGreaterThanAsk => 32,
            OrderViolation::AskLessThanBid => 64,
            OrderViolation::PriceTooLarge => 128,
            OrderViolation::QuantTooLarge => 256,
        }
    }

    pub fn field(&self) -> OrderField {
        match self {
            OrderViolation::PriceNegative
            | OrderViolation::PriceNotNum
            | OrderViolation::BidGreaterThanAsk
            | OrderViolation::AskLessThanBid
            | OrderViolation::PriceTooLarge => OrderField::Price,
            OrderViolation::QuantNegative
            | OrderViolation::QuantNotNum
            | OrderViolation::QuantTooLarge => OrderField::Quantity,
            OrderViolation::BadType => OrderField::Type,
        }
    }
}

/// Every violation of one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violations(Vec<OrderViolation>);

impl Violations {
    pub fn push(&mut self, violation: OrderViolation) {
        if !self.0.contains(&violation) {
            self.0.push(violation);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, violation: OrderViolation) -> bool {
        self.0.contains(&violation)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OrderViolation> {
        self.0.iter()
    }

    /// Bitwise OR of the individual codes.
    pub fn code(&self) -> u32 {
        self.0.iter().fold(0, |acc, v| acc | v.code())
    }

    pub fn for_field(&self, field: OrderField) -> impl Iterator<Item = &OrderViolation> {
        self.0.iter().filter(move |v| v.field() == field)
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|v| format!("{:?}: {}", v.field(), v))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for Violations {}

/// Order form input as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOrder {
    pub order_type: String,
    pub price: String,
    pub quantity: String,
}

impl RawOrder {
    pub fn new(order_type: impl Into<String>, price: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self {
            order_type: order_type.into(),
            price: price.into(),
            quantity: quantity.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidOrder {
    pub order_type: OrderType,
    pub price: Price,
    pub quantity: u64,
}

/// Parses `raw`, bounds it by `limits` and checks it against the participant's
/// own `existing` orders in the round: a bid must sit below all of their offers,
/// an offer above all bids. Buy-ins and sell-ins placed by the market do not count.
pub fn validate_order(raw: &RawOrder, existing: &[Order], limits: &OrderLimits) -> Result<ValidOrder, Violations> {
    let mut violations = Violations::default();

    let order_type = raw
        .order_type
        .trim()
        .parse::<i32>()
        .ok()
        .and_then(OrderType::from_code);
    if order_type.is_none() {
        violations.push(OrderViolation::BadType);
    }

    let price = match raw.price.trim().parse::<i64>() {
        Ok(p) if p <= 0 => {
            violations.push(OrderViolation::PriceNegative);
            None
        }
        Ok(p) if p.unsigned_abs() > limits.max_price => {
            violations.push(OrderViolation::PriceTooLarge);
            None
        }
        Ok(p) => Some(Price::new_unchecked(Decimal::from(p))),
        Err(_) => {
            violations.push(OrderViolation::PriceNotNum);
            None
        }
    };

    let quantity = match raw.quantity.trim().parse::<i64>() {
        Ok(q) if q <= 0 => {
            violations.push(OrderViolation::QuantNegative);
            None
        }
        Ok(q) if q.unsigned_abs() > limits.max_quantity => {
            violations.push(OrderViolation::QuantTooLarge);
            None
        }
        Ok(q) => Some(q.unsigned_abs()),
        Err(_) => {
            violations.push(OrderViolation::QuantNotNum);
            None
        }
    };

    if let (Some(order_type), Some(price)) = (order_type, price) {
        let mut opposite = existing
            .iter()
            .filter(|o| !o.is_buy_in && o.order_type == order_type.opposite());
        match order_type {
            OrderType::Bid => {
                if opposite.any(|o| price >= o.price) {
                    violations.push(OrderViolation::BidGreaterThanAsk);
                }
            }
            OrderType::Offer => {
                if opposite.any(|o| price <= o.price) {
                    violations.push(OrderViolation::AskLessThanBid);
                }
            }
        }
    }

    match (order_type, price, quantity) {
        (Some(order_type), Some(price), Some(quantity)) if violations.is_empty() => Ok(ValidOrder {
            order_type,
            price,
            quantity,
        }),
        _ => Err(violations),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GroupId, OrderId, ParticipantId};

    const LIMITS: OrderLimits = OrderLimits {
        max_price: 1_000,
        max_quantity: 100,
    };

    fn existing(order_type: OrderType, price: i64) -> Order {
        Order {
            id: OrderId(1),
            participant: ParticipantId(2),
            group: GroupId(1),
            round: 1,
            order_type,
            price: Price::new_unchecked(Decimal::from(price)),
            quantity: 6,
            quantity_final: 0,
            is_buy_in: false,
        }
    }

    fn code_of(order_type: &str, price: &str, quantity: &str) -> u32 {
        validate_order(&RawOrder::new(order_type, price, quantity), &[], &LIMITS)
            .unwrap_err()
            .code()
    }

    #[test]
    fn valid_sell_order() {
        let order = validate_order(&RawOrder::new("1", "12", "6"), &[], &LIMITS).unwrap();
        assert_eq!(order.order_type, OrderType::Offer);
        assert_eq!(order.price.value(), Decimal::from(12));
        assert_eq!(order.quantity, 6);
    }

    #[test]
    fn single_field_rejections() {
        assert_eq!(code_of("2", "50", "10"), OrderViolation::BadType.code());
        assert_eq!(code_of("1", "-1", "10"), OrderViolation::PriceNegative.code());
        assert_eq!(code_of("1", "a", "10"), OrderViolation::PriceNotNum.code());
        assert_eq!(code_of("1", "50", "a"), OrderViolation::QuantNotNum.code());
        assert_eq!(code_of("1", "50", "-1"), OrderViolation::QuantNegative.code());
        assert_eq!(code_of("1", "50", "0"), OrderViolation::QuantNegative.code());
    }

    #[test]
    fn codes_combine() {
        // BadType | QuantNotNum | PriceNegative
        assert_eq!(code_of("2", "-1", "a"), 25);
    }

    #[test]
    fn violations_know_their_field() {
        let v = validate_order(&RawOrder::new("x", "a", "-3"), &[], &LIMITS).unwrap_err();
        assert_eq!(v.for_field(OrderField::Type).count(), 1);
        assert_eq!(v.for_field(OrderField::Price).count(), 1);
        assert!(v.contains(OrderViolation::QuantNegative));
        assert_eq!(OrderViolation::PriceNotNum.to_string(), "Must be an integer number");
    }

    #[test]
    fn bid_must_stay_below_own_offers() {
        let offers = [existing(OrderType::Offer, 50)];
        let v = validate_order(&RawOrder::new("-1", "50", "1"), &offers, &LIMITS).unwrap_err();
        assert_eq!(v.code(), OrderViolation::BidGreaterThanAsk.code());
        assert!(validate_order(&RawOrder::new("-1", "49", "1"), &offers, &LIMITS).is_ok());
    }

    #[test]
    fn offer_must_stay_above_own_bids() {
        let bids = [existing(OrderType::Bid, 50)];
        let v = validate_order(&RawOrder::new("1", "50", "1"), &bids, &LIMITS).unwrap_err();
        assert!(v.contains(OrderViolation::AskLessThanBid));
        assert!(validate_order(&RawOrder::new("1", "51", "1"), &bids, &LIMITS).is_ok());
    }

    #[test]
    fn same_side_orders_do_not_conflict() {
        let offers = [existing(OrderType::Offer, 12)];
        assert!(validate_order(&RawOrder::new("1", "12", "6"), &offers, &LIMITS).is_ok());
    }

    #[test]
    fn limits_bound_price_and_quantity() {
        assert!(validate_order(&RawOrder::new("-1", "1000", "100"), &[], &LIMITS).is_ok());
        assert_eq!(code_of("-1", "1001", "5"), OrderViolation::PriceTooLarge.code());
        assert_eq!(code_of("1", "50", "101"), OrderViolation::QuantTooLarge.code());
        assert_eq!(code_of("1", "1000000000000000", "1000000000000000"), 128 | 256);
        // a very negative price is still reported as negative
        assert_eq!(code_of("1", "-5000", "1"), OrderViolation::PriceNegative.code());
        assert_eq!(OrderViolation::QuantTooLarge.field(), OrderField::Quantity);
    }

    #[test]
    fn generated_orders_do_not_block_submissions() {
        let mut buy_in = existing(OrderType::Bid, 550);
        buy_in.is_buy_in = true;
        assert!(validate_order(&RawOrder::new("1", "500", "1"), &[buy_in.clone()], &LIMITS).is_ok());

        buy_in.is_buy_in = false;
        let v = validate_order(&RawOrder::new("1", "500", "1"), &[buy_in], &LIMITS).unwrap_err();
        assert!(v.contains(OrderViolation::AskLessThanBid));
    }
}
