//! Dividend draws and fundamental value.
//!
//! Each round pays one dividend per share, drawn from the configured discrete
//! distribution. The fundamental value prices the share as a perpetuity of the
//! expected dividend discounted at the interest rate.

use crate::config::DividendDistribution;
use crate::types::Price;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Dot product of outcomes and probabilities.
pub fn expected_dividend(dist: &DividendDistribution) -> Decimal {
    dist.iter()
        .map(|(outcome, p)| Decimal::from(outcome) * p)
        .sum()
}

/// `E[dividend] / r`, or zero when there is no interest to discount with.
pub fn fundamental_value(dist: &DividendDistribution, interest_rate: Decimal) -> Price {
    if interest_rate <= Decimal::ZERO {
        return Price::zero();
    }
    Price::new(expected_dividend(dist) / interest_rate).unwrap_or_else(Price::zero)
}

/// Inverse-CDF draw of one outcome.
pub fn draw_dividend<R: Rng + ?Sized>(dist: &DividendDistribution, rng: &mut R) -> i64 {
    let u: f64 = rng.random();
    let mut cumulative = 0.0;
    for (outcome, p) in dist.iter() {
        cumulative += p.to_f64().unwrap_or(0.0);
        if u < cumulative {
            return outcome;
        }
    }
    // float residue when the probabilities sum to just under one
    dist.outcomes.last().copied().unwrap_or(0)
}
