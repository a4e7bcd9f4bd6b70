// 7.0 config.rs: all experiment settings in one place. rates, margin params,
// dividend distribution, round count and opening endowments.
// 7.1 DividendDistribution parses the whitespace separated session strings.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::types::RoundNumber;

// probabilities must sum to one within this tolerance
const PROBABILITY_TOLERANCE: Decimal = dec!(0.000000001);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("dividend outcomes ({outcomes}) and probabilities ({probabilities}) differ in length")]
    DividendLengthMismatch { outcomes: usize, probabilities: usize },

    #[error("dividend distribution is empty")]
    EmptyDividendDistribution,

    #[error("dividend probabilities sum to {0}, expected 1")]
    ProbabilitySum(Decimal),

    #[error("dividend probability {0} is negative")]
    NegativeProbability(Decimal),

    #[error("could not parse {field}: {value:?}")]
    Parse { field: &'static str, value: String },

    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: Decimal },

    #[error("num_rounds must be at least 1")]
    NoRounds,

    #[error("{0} must be at least 1")]
    ZeroLimit(&'static str),

    #[error("invalid config json: {0}")]
    Json(String),
}

/** 7.1: discrete dividend distribution. outcomes[i] is paid with probabilities[i] */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividendDistribution {
    pub outcomes: Vec<i64>,
    pub probabilities: Vec<Decimal>,
}

impl Default for DividendDistribution {
    fn default() -> Self {
        Self {
            outcomes: vec![40, 100],
            probabilities: vec![dec!(0.5), dec!(0.5)],
        }
    }
}

impl DividendDistribution {
    pub fn new(outcomes: Vec<i64>, probabilities: Vec<Decimal>) -> Result<Self, ConfigError> {
        let dist = Self {
            outcomes,
            probabilities,
        };
        dist.validate()?;
        Ok(dist)
    }

    /// A distribution that always pays `amount`.
    pub fn constant(amount: i64) -> Self {
        Self {
            outcomes: vec![amount],
            probabilities: vec![Decimal::ONE],
        }
    }

    /// Parses session strings such as `"40 100"` and `"0.5 0.5"`.
    pub fn parse(amounts: &str, probabilities: &str) -> Result<Self, ConfigError> {
        let outcomes = amounts
            .split_whitespace()
            .map(|s| {
                s.parse::<i64>().map_err(|_| ConfigError::Parse {
                    field: "div_amount",
                    value: s.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let probabilities = probabilities
            .split_whitespace()
            .map(|s| {
                Decimal::from_str(s).map_err(|_| ConfigError::Parse {
                    field: "div_dist",
                    value: s.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(outcomes, probabilities)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outcomes.len() != self.probabilities.len() {
            return Err(ConfigError::DividendLengthMismatch {
                outcomes: self.outcomes.len(),
                probabilities: self.probabilities.len(),
            });
        }
        if self.outcomes.is_empty() {
            return Err(ConfigError::EmptyDividendDistribution);
        }
        if let Some(p) = self.probabilities.iter().find(|p| **p < Decimal::ZERO) {
            return Err(ConfigError::NegativeProbability(*p));
        }
        let total: Decimal = self.probabilities.iter().sum();
        if (total - Decimal::ONE).abs() > PROBABILITY_TOLERANCE {
            return Err(ConfigError::ProbabilitySum(total));
        }
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, Decimal)> + '_ {
        self.outcomes
            .iter()
            .copied()
            .zip(self.probabilities.iter().copied())
    }
}

/// 7.2: largest price and quantity one submitted order may carry. keeps every
/// trade cost and position well inside the decimal range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderLimits {
    pub max_price: u64,
    pub max_quantity: u64,
}

impl Default for OrderLimits {
    fn default() -> Self {
        Self {
            max_price: 1_000_000,
            max_quantity: 1_000_000,
        }
    }
}

// Complete configuration for one experiment session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    // Per-round interest paid on cash after trading
    pub interest_rate: Decimal,
    // Stock or cash margin at or above this is a violation
    pub margin_ratio: Decimal,
    // Buy-ins pay reference * (1 + premium), sell-ins accept reference * (1 - premium)
    pub margin_premium: Decimal,
    // Corrective orders cover the position back toward this ratio
    pub margin_target_ratio: Decimal,
    pub dividends: DividendDistribution,
    // Rounds a violation may persist before a corrective order is placed
    pub auto_trans_delay: u32,
    // Round 1 reference price. falls back to the fundamental value
    pub initial_price: Option<Decimal>,
    pub initial_cash: Decimal,
    pub initial_shares: i64,
    pub num_rounds: RoundNumber,
    pub order_limits: OrderLimits,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            interest_rate: dec!(0.1),
            margin_ratio: dec!(0.6),
            margin_premium: dec!(0.25),
            margin_target_ratio: dec!(0.3),
            dividends: DividendDistribution::default(),
            auto_trans_delay: 1,
            initial_price: None,
            initial_cash: dec!(1000),
            initial_shares: 50,
            num_rounds: 10,
            order_limits: OrderLimits::default(),
        }
    }
}

impl MarketConfig {
    // The scripted scenario parameters: no carry, immediate corrections.
    pub fn scripted() -> Self {
        Self {
            interest_rate: Decimal::ZERO,
            margin_ratio: dec!(0.5),
            margin_premium: dec!(0.1),
            margin_target_ratio: dec!(0.3),
            dividends: DividendDistribution::constant(0),
            auto_trans_delay: 0,
            initial_price: Some(dec!(500)),
            initial_cash: dec!(1000),
            initial_shares: 5,
            num_rounds: 7,
            order_limits: OrderLimits::default(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dividends.validate()?;

        let non_negative = [
            ("interest_rate", self.interest_rate),
            ("margin_ratio", self.margin_ratio),
            ("margin_premium", self.margin_premium),
            ("margin_target_ratio", self.margin_target_ratio),
        ];
        for (field, value) in non_negative {
            if value < Decimal::ZERO {
                return Err(ConfigError::Negative { field, value });
            }
        }
        if let Some(price) = self.initial_price {
            if price < Decimal::ZERO {
                return Err(ConfigError::Negative {
                    field: "initial_price",
                    value: price,
                });
            }
        }
        if self.num_rounds == 0 {
            return Err(ConfigError::NoRounds);
        }
        if self.order_limits.max_price == 0 {
            return Err(ConfigError::ZeroLimit("max_price"));
        }
        if self.order_limits.max_quantity == 0 {
            return Err(ConfigError::ZeroLimit("max_quantity"));
        }
        Ok(())
    }
}
