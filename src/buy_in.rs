//! Forced corrective orders for sustained margin violations.
//!
//! A short violator is bought in: a bid priced at a premium over the reference
//! price, sized to cover part of the short. A debt violator is sold in: an offer
//! at a discount, sized to raise part of the debt. Both aim at the target margin
//! ratio rather than flattening the position.

use crate::margin::Position;
use crate::order::Order;
use crate::types::{OrderType, Overflow, Price};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionParams {
    pub margin_premium: Decimal,
    pub margin_target_ratio: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectiveOrder {
    pub order_type: OrderType,
    pub price: Price,
    pub quantity: u64,
}

impl CorrectiveOrder {
    pub fn is_empty(&self) -> bool {
        self.quantity == 0
    }

    /// Same side, price and size as a stored order.
    pub fn matches(&self, order: &Order) -> bool {
        self.order_type == order.order_type && self.price == order.price && self.quantity == order.quantity
    }
}

pub fn buy_in_price(reference_price: Price, margin_premium: Decimal) -> Result<Price, Overflow> {
    reference_price.scale(Decimal::ONE + margin_premium)
}

pub fn sell_in_price(reference_price: Price, margin_premium: Decimal) -> Result<Price, Overflow> {
    reference_price.scale(Decimal::ONE - margin_premium)
}

/// `ceil(|shares| - target * cash / price)`, floored at zero. At a zero price the
/// whole short is covered.
pub fn generate_buy_in_order(
    position: Position,
    reference_price: Price,
    params: &CorrectionParams,
) -> Result<CorrectiveOrder, Overflow> {
    let price = buy_in_price(reference_price, params.margin_premium)?;
    let short = Decimal::from(position.shares.unsigned_abs());

    let quantity = if price.is_zero() {
        short
    } else {
        let covered = params
            .margin_target_ratio
            .checked_mul(position.cash.value())
            .and_then(|c| c.checked_div(price.value()))
            .ok_or(Overflow("buy-in quantity"))?;
        short.checked_sub(covered).ok_or(Overflow("buy-in quantity"))?
    };

    Ok(CorrectiveOrder {
        order_type: OrderType::Bid,
        price,
        quantity: ceil_quantity(quantity),
    })
}

/// `ceil(|cash| / price - target * shares)`, floored at zero. Nothing is sold at
/// a zero price.
pub fn generate_sell_in_order(
    position: Position,
    reference_price: Price,
    params: &CorrectionParams,
) -> Result<CorrectiveOrder, Overflow> {
    let price = sell_in_price(reference_price, params.margin_premium)?;

    let quantity = if price.is_zero() {
        Decimal::ZERO
    } else {
        let owed = position
            .cash
            .value()
            .abs()
            .checked_div(price.value())
            .ok_or(Overflow("sell-in quantity"))?;
        let kept = params
            .margin_target_ratio
            .checked_mul(Decimal::from(position.shares))
            .ok_or(Overflow("sell-in quantity"))?;
        owed.checked_sub(kept).ok_or(Overflow("sell-in quantity"))?
    };

    Ok(CorrectiveOrder {
        order_type: OrderType::Offer,
        price,
        quantity: ceil_quantity(quantity),
    })
}

fn ceil_quantity(raw: Decimal) -> u64 {
    raw.ceil().max(Decimal::ZERO).to_u64().unwrap_or(u64::MAX)
}
