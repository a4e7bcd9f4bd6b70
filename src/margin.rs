//! Margin monitoring for short and debt positions.
//!
//! A short position is measured by its stock margin, the value of the shares
//! owed relative to cash held. A debt position is measured by its cash margin,
//! the cash owed relative to the value of shares held. Either ratio at or above
//! the configured margin ratio is a violation. Violations are tolerated for a
//! delay of rounds before a corrective order is forced; a participant both short
//! and in debt is bankrupt and is left alone.

use crate::types::{Cash, Overflow, Price};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub cash: Cash,
    pub shares: i64,
}

impl Position {
    pub fn new(cash: Cash, shares: i64) -> Self {
        Self { cash, shares }
    }

    pub fn is_short(&self) -> bool {
        self.shares < 0
    }

    pub fn is_debt(&self) -> bool {
        self.cash.is_negative()
    }

    pub fn is_bankrupt(&self) -> bool {
        self.is_short() && self.is_debt()
    }

    /// `|shares * price| / cash`, zero when there is no cash.
    pub fn stock_margin(&self, price: Price) -> Result<Decimal, Overflow> {
        if self.cash.is_zero() {
            return Ok(Decimal::ZERO);
        }
        let ratio = price
            .notional(self.shares)?
            .checked_div(self.cash.value())
            .ok_or(Overflow("stock margin"))?;
        Ok(ratio.abs())
    }

    /// `|cash| / |shares * price|`, zero when there is no share exposure.
    pub fn cash_margin(&self, price: Price) -> Result<Decimal, Overflow> {
        let stock_value = price.notional(self.shares)?;
        if stock_value.is_zero() {
            return Ok(Decimal::ZERO);
        }
        let ratio = self
            .cash
            .value()
            .checked_div(stock_value)
            .ok_or(Overflow("cash margin"))?;
        Ok(ratio.abs())
    }

    pub fn is_short_margin_violation(&self, price: Price, margin_ratio: Decimal) -> Result<bool, Overflow> {
        if self.is_bankrupt() || !self.is_short() {
            return Ok(false);
        }
        Ok(self.stock_margin(price)? >= margin_ratio)
    }

    pub fn is_debt_margin_violation(&self, price: Price, margin_ratio: Decimal) -> Result<bool, Overflow> {
        if self.is_bankrupt() || !self.is_debt() {
            return Ok(false);
        }
        Ok(self.cash_margin(price)? >= margin_ratio)
    }

    pub fn margin_status(&self, price: Price, margin_ratio: Decimal) -> Result<MarginStatus, Overflow> {
        let status = if self.is_bankrupt() {
            MarginStatus::Bankrupt
        } else if self.is_short_margin_violation(price, margin_ratio)? {
            MarginStatus::ShortViolation {
                stock_margin: self.stock_margin(price)?,
            }
        } else if self.is_debt_margin_violation(price, margin_ratio)? {
            MarginStatus::DebtViolation {
                cash_margin: self.cash_margin(price)?,
            }
        } else {
            MarginStatus::Healthy
        };
        Ok(status)
    }
}

// short and debt violations are exclusive: having both is bankruptcy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginStatus {
    Healthy,
    ShortViolation { stock_margin: Decimal },
    DebtViolation { cash_margin: Decimal },
    Bankrupt,
}

impl MarginStatus {
    pub fn is_short_violation(&self) -> bool {
        matches!(self, MarginStatus::ShortViolation { .. })
    }

    pub fn is_debt_violation(&self) -> bool {
        matches!(self, MarginStatus::DebtViolation { .. })
    }

    pub fn is_violation(&self) -> bool {
        self.is_short_violation() || self.is_debt_violation()
    }
}

/// Rounds left before a forced buy-in (short) or sell-in (debt). `None` means no
/// violation is being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MarginCounters {
    pub periods_until_auto_buy: Option<u32>,
    pub periods_until_auto_sell: Option<u32>,
}

impl MarginCounters {
    pub fn new(periods_until_auto_buy: Option<u32>, periods_until_auto_sell: Option<u32>) -> Self {
        Self {
            periods_until_auto_buy,
            periods_until_auto_sell,
        }
    }

    pub fn buy_in_due(&self) -> bool {
        self.periods_until_auto_buy == Some(0)
    }

    pub fn sell_in_due(&self) -> bool {
        self.periods_until_auto_sell == Some(0)
    }

    /// Counters carried into the next round given this round's status.
    pub fn next(&self, status: &MarginStatus, base_delay: u32) -> MarginCounters {
        if *status == MarginStatus::Bankrupt {
            return MarginCounters::default();
        }
        MarginCounters {
            periods_until_auto_buy: status
                .is_short_violation()
                .then(|| calculate_delay(self.periods_until_auto_buy, base_delay)),
            periods_until_auto_sell: status
                .is_debt_violation()
                .then(|| calculate_delay(self.periods_until_auto_sell, base_delay)),
        }
    }
}

/// Starts at `base` and counts down to zero, saturating.
pub fn calculate_delay(current: Option<u32>, base: u32) -> u32 {
    match current {
        None => base,
        Some(n) => n.saturating_sub(1),
    }
}
