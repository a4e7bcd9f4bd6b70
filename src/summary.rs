// 10.0 summary.rs: participant-facing view of a round's settlement, and the
// fixed field schema scripted expectations compare against.

use crate::store::GroupRound;
use crate::types::Cash;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub cash: Option<Cash>,
    pub shares: Option<i64>,
    pub periods_until_auto_buy: Option<u32>,
    pub periods_until_auto_sell: Option<u32>,
    pub shares_transacted: Option<i64>,
    pub trans_cost: Option<Cash>,
    pub cash_after_trade: Option<Cash>,
    pub interest_earned: Option<Cash>,
    pub dividend_earned: Option<Cash>,
    pub cash_result: Option<Cash>,
    pub shares_result: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementField {
    Cash,
    Shares,
    PeriodsUntilAutoBuy,
    PeriodsUntilAutoSell,
    SharesTransacted,
    TransCost,
    CashAfterTrade,
    InterestEarned,
    DividendEarned,
    CashResult,
    SharesResult,
}

impl SettlementField {
    pub const ALL: [SettlementField; 11] = [
        SettlementField::Cash,
        SettlementField::Shares,
        SettlementField::PeriodsUntilAutoBuy,
        SettlementField::PeriodsUntilAutoSell,
        SettlementField::SharesTransacted,
        SettlementField::TransCost,
        SettlementField::CashAfterTrade,
        SettlementField::InterestEarned,
        SettlementField::DividendEarned,
        SettlementField::CashResult,
        SettlementField::SharesResult,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SettlementField::Cash => "cash",
            SettlementField::Shares => "shares",
            SettlementField::PeriodsUntilAutoBuy => "periods_until_auto_buy",
            SettlementField::PeriodsUntilAutoSell => "periods_until_auto_sell",
            SettlementField::SharesTransacted => "shares_transacted",
            SettlementField::TransCost => "trans_cost",
            SettlementField::CashAfterTrade => "cash_after_trade",
            SettlementField::InterestEarned => "interest_earned",
            SettlementField::DividendEarned => "dividend_earned",
            SettlementField::CashResult => "cash_result",
            SettlementField::SharesResult => "shares_result",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupField {
    Price,
    Volume,
    Dividend,
}

impl GroupField {
    pub fn name(&self) -> &'static str {
        match self {
            GroupField::Price => "price",
            GroupField::Volume => "volume",
            GroupField::Dividend => "dividend",
        }
    }
}

/// A typed field value. Counts and amounts compare numerically with each other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum FieldValue {
    Count(i64),
    Amount(Decimal),
    Unset,
}

impl FieldValue {
    fn numeric(&self) -> Option<Decimal> {
        match self {
            FieldValue::Count(n) => Some(Decimal::from(*n)),
            FieldValue::Amount(d) => Some(*d),
            FieldValue::Unset => None,
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        self.numeric() == other.numeric()
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Count(n) => write!(f, "{n}"),
            FieldValue::Amount(d) => write!(f, "{d}"),
            FieldValue::Unset => write!(f, "unset"),
        }
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Count(i64::from(value))
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Count(value)
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Amount(value)
    }
}

impl From<Option<Cash>> for FieldValue {
    fn from(value: Option<Cash>) -> Self {
        value.map_or(FieldValue::Unset, |c| FieldValue::Amount(c.value()))
    }
}

impl From<Option<i64>> for FieldValue {
    fn from(value: Option<i64>) -> Self {
        value.map_or(FieldValue::Unset, FieldValue::Count)
    }
}

impl From<Option<u32>> for FieldValue {
    fn from(value: Option<u32>) -> Self {
        value.map_or(FieldValue::Unset, |n| FieldValue::Count(i64::from(n)))
    }
}

impl From<Option<u64>> for FieldValue {
    fn from(value: Option<u64>) -> Self {
        value.map_or(FieldValue::Unset, |n| {
            i64::try_from(n).map_or(FieldValue::Amount(Decimal::from(n)), FieldValue::Count)
        })
    }
}

impl PlayerSummary {
    pub fn get(&self, field: SettlementField) -> FieldValue {
        match field {
            SettlementField::Cash => self.cash.into(),
            SettlementField::Shares => self.shares.into(),
            SettlementField::PeriodsUntilAutoBuy => self.periods_until_auto_buy.into(),
            SettlementField::PeriodsUntilAutoSell => self.periods_until_auto_sell.into(),
            SettlementField::SharesTransacted => self.shares_transacted.into(),
            SettlementField::TransCost => self.trans_cost.into(),
            SettlementField::CashAfterTrade => self.cash_after_trade.into(),
            SettlementField::InterestEarned => self.interest_earned.into(),
            SettlementField::DividendEarned => self.dividend_earned.into(),
            SettlementField::CashResult => self.cash_result.into(),
            SettlementField::SharesResult => self.shares_result.into(),
        }
    }
}

impl GroupRound {
    pub fn get(&self, field: GroupField) -> FieldValue {
        match field {
            GroupField::Price => self
                .price
                .map_or(FieldValue::Unset, |p| FieldValue::Amount(p.value())),
            GroupField::Volume => self.volume.into(),
            GroupField::Dividend => self.dividend.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GroupId, Price};
    use rust_decimal_macros::dec;

    #[test]
    fn count_and_amount_compare_numerically() {
        assert_eq!(FieldValue::Count(500), FieldValue::Amount(dec!(500.0)));
        assert_ne!(FieldValue::Count(500), FieldValue::Amount(dec!(500.5)));
        assert_ne!(FieldValue::Count(0), FieldValue::Unset);
        assert_eq!(FieldValue::Unset, FieldValue::Unset);
        assert_eq!(FieldValue::from(Some(7u64)), FieldValue::Count(7));
        assert_eq!(
            FieldValue::from(Some(u64::MAX)),
            FieldValue::Amount(Decimal::from(u64::MAX))
        );
    }

    #[test]
    fn summary_lookup_by_field() {
        let summary = PlayerSummary {
            cash: Some(Cash::from(500)),
            shares: Some(6),
            periods_until_auto_buy: None,
            periods_until_auto_sell: Some(0),
            ..PlayerSummary::default()
        };
        assert_eq!(summary.get(SettlementField::Cash), FieldValue::Count(500));
        assert_eq!(summary.get(SettlementField::Shares), FieldValue::Count(6));
        assert_eq!(summary.get(SettlementField::PeriodsUntilAutoBuy), FieldValue::Unset);
        assert_eq!(summary.get(SettlementField::PeriodsUntilAutoSell), FieldValue::Count(0));
        assert_eq!(summary.get(SettlementField::InterestEarned), FieldValue::Unset);
    }

    #[test]
    fn summary_json_exposes_exactly_the_settlement_fields() {
        let json = serde_json::to_value(PlayerSummary::default()).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        let mut expected: Vec<_> = SettlementField::ALL.iter().map(|f| f.name().to_string()).collect();
        expected.sort();
        let mut keys_sorted = keys;
        keys_sorted.sort();
        assert_eq!(keys_sorted, expected);
    }

    #[test]
    fn group_lookup_by_field() {
        let mut g = GroupRound::new(GroupId(1), 1);
        assert_eq!(g.get(GroupField::Price), FieldValue::Unset);
        g.price = Some(Price::new_unchecked(dec!(550)));
        g.volume = Some(1);
        assert_eq!(g.get(GroupField::Price), FieldValue::Count(550));
        assert_eq!(g.get(GroupField::Volume), FieldValue::Count(1));
    }
}
