//! Reference prices and the per-round dividend.

use super::core::CallMarket;
use super::results::EngineError;
use crate::dividend::{draw_dividend, fundamental_value};
use crate::store::{RoundStore, StoreError};
use crate::types::{GroupId, Price, RoundNumber};
use tracing::debug;

impl<S: RoundStore> CallMarket<S> {
    /// Discounted expected dividend under the configured distribution.
    pub fn fundamental_value(&self) -> Price {
        fundamental_value(&self.config.dividends, self.config.interest_rate)
    }

    /// Price a round is anchored to. Round 1 uses the configured initial price,
    /// else the fundamental value rounded; later rounds use the previous clearing
    /// price rounded to a whole unit, half to even.
    pub fn reference_price(&self, group: GroupId, round: RoundNumber) -> Result<Price, EngineError> {
        self.check_round(round)?;

        if round == 1 {
            if let Some(price) = self.config.initial_price.and_then(Price::new) {
                return Ok(price);
            }
            return Ok(self.fundamental_value().round_to_unit());
        }

        let previous = round - 1;
        let group_round = self
            .store
            .group_round(group, previous)
            .ok_or(StoreError::MissingGroupRound { group, round: previous })?;
        group_round
            .price
            .map(|p| p.round_to_unit())
            .ok_or(EngineError::RoundNotCleared { group, round: previous })
    }

    /// The round's dividend, drawn on first use and stored so a re-clear pays the same.
    pub fn round_dividend(&mut self, group: GroupId, round: RoundNumber) -> Result<i64, EngineError> {
        self.check_round(round)?;

        let group_round = self
            .store
            .group_round_mut(group, round)
            .ok_or(StoreError::MissingGroupRound { group, round })?;
        if let Some(dividend) = group_round.dividend {
            return Ok(dividend);
        }

        let dividend = draw_dividend(&self.config.dividends, &mut self.rng);
        group_round.dividend = Some(dividend);
        debug!(target: "clearing", group = group.0, round, dividend, "dividend drawn");
        Ok(dividend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DividendDistribution, MarketConfig};
    use crate::engine::EngineConfig;
    use crate::store::MemoryStore;
    use crate::types::ParticipantId;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    const GROUP: GroupId = GroupId(1);

    fn setup_engine(config: MarketConfig) -> CallMarket {
        let store = MemoryStore::seed(&config, GROUP, &[ParticipantId(1)]);
        CallMarket::new(config, EngineConfig::default(), store, 7).unwrap()
    }

    fn set_price(engine: &mut CallMarket, round: RoundNumber, price: Decimal) {
        engine.store_mut().group_round_mut(GROUP, round).unwrap().price = Some(Price::new_unchecked(price));
    }

    #[test]
    fn first_round_uses_fundamental_value() {
        let config = MarketConfig {
            dividends: DividendDistribution::new(vec![0, 100], vec![dec!(0.5), dec!(0.5)]).unwrap(),
            interest_rate: dec!(0.1),
            ..MarketConfig::default()
        };
        let engine = setup_engine(config);
        assert_eq!(engine.fundamental_value().value(), dec!(500));
        assert_eq!(engine.reference_price(GROUP, 1).unwrap().value(), dec!(500));
    }

    #[test]
    fn first_round_rounds_fundamental_value() {
        // 70 / 0.3 = 233.33..
        let config = MarketConfig {
            interest_rate: dec!(0.3),
            ..MarketConfig::default()
        };
        let engine = setup_engine(config);
        assert_eq!(engine.reference_price(GROUP, 1).unwrap().value(), dec!(233));
    }

    #[test]
    fn initial_price_overrides_fundamental_value() {
        let engine = setup_engine(MarketConfig::scripted());
        assert_eq!(engine.reference_price(GROUP, 1).unwrap().value(), dec!(500));
    }

    #[test]
    fn later_rounds_round_the_previous_price() {
        let mut engine = setup_engine(MarketConfig::default());
        set_price(&mut engine, 1, dec!(801.1));
        assert_eq!(engine.reference_price(GROUP, 2).unwrap().value(), dec!(801));

        set_price(&mut engine, 1, dec!(800.5));
        assert_eq!(engine.reference_price(GROUP, 2).unwrap().value(), dec!(800));

        set_price(&mut engine, 1, dec!(801.5));
        assert_eq!(engine.reference_price(GROUP, 2).unwrap().value(), dec!(802));
    }

    #[test]
    fn uncleared_previous_round_is_an_error() {
        let engine = setup_engine(MarketConfig::default());
        assert_eq!(
            engine.reference_price(GROUP, 3),
            Err(EngineError::RoundNotCleared { group: GROUP, round: 2 })
        );
    }

    #[test]
    fn round_out_of_range() {
        let engine = setup_engine(MarketConfig::default());
        assert!(matches!(
            engine.reference_price(GROUP, 0),
            Err(EngineError::RoundOutOfRange { .. })
        ));
        assert!(matches!(
            engine.reference_price(GROUP, 11),
            Err(EngineError::RoundOutOfRange { round: 11, num_rounds: 10 })
        ));
    }

    #[test]
    fn dividend_is_drawn_once() {
        let mut engine = setup_engine(MarketConfig::default());
        let first = engine.round_dividend(GROUP, 1).unwrap();
        assert!(first == 40 || first == 100);
        for _ in 0..20 {
            assert_eq!(engine.round_dividend(GROUP, 1).unwrap(), first);
        }
        assert_eq!(engine.group_round(GROUP, 1).unwrap().dividend, Some(first));
    }

    #[test]
    fn same_seed_same_dividends() {
        let mut a = setup_engine(MarketConfig::default());
        let mut b = setup_engine(MarketConfig::default());
        for round in 1..=10 {
            assert_eq!(a.round_dividend(GROUP, round).unwrap(), b.round_dividend(GROUP, round).unwrap());
        }
    }
}
