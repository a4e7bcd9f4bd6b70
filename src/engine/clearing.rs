//! Round clearing: price discovery, fills, settlement and carry-forward.
//!
//! Everything a round decides is computed first and written second, so a round
//! that fails leaves the store as it found it.

use super::core::CallMarket;
use super::results::{EngineError, RoundOutcome};
use crate::clearing::{clear, ClearingResult};
use crate::events::{
    BankruptcyEvent, EventPayload, FillEvent, MarginViolationEvent, PlayerSettledEvent,
    RoundClearedEvent,
};
use crate::margin::MarginStatus;
use crate::order::{Order, OrderTransfer};
use crate::settlement::PlayerSettlement;
use crate::store::{RoundStore, StoreError};
use crate::types::{GroupId, OrderType, Overflow, ParticipantId, Price, RoundNumber};
use tracing::{debug, info, warn};

impl<S: RoundStore> CallMarket<S> {
    /// Clear one group-round. Every order gets its fill, every participant is
    /// settled, the next round's rows are set up and any due buy-ins or sell-ins
    /// are queued for it. Running it again on the same orders gives the same result.
    pub fn clear_round(&mut self, group: GroupId, round: RoundNumber) -> Result<RoundOutcome, EngineError> {
        self.check_round(round)?;
        let participants = self.participants_of(group)?;

        let reference_price = self.reference_price(group, round)?;
        let dividend = self.round_dividend(group, round)?;

        let orders = self.store.orders(group, round);
        let result = clear(&orders, reference_price);
        let transfers = reconcile_fills(&orders, &result)?;
        let filled: Vec<Order> = orders
            .iter()
            .zip(&transfers)
            .map(|(order, transfer)| Order {
                quantity_final: transfer.quantity_final,
                ..order.clone()
            })
            .collect();
        let settlements = self.settle_players(round, &participants, &filled, dividend, result.price)?;
        let corrections = self.plan_corrections(round, &settlements, result.price)?;

        for mut transfer in transfers {
            transfer.update_order(&mut self.store)?;
        }
        let group_round = self
            .store
            .group_round_mut(group, round)
            .ok_or(StoreError::MissingGroupRound { group, round })?;
        group_round.price = Some(result.price);
        group_round.volume = Some(result.volume);

        info!(
            target: "clearing",
            group = group.0,
            round,
            reference = %reference_price,
            price = %result.price,
            volume = result.volume,
            dividend,
            orders = orders.len(),
            "round cleared"
        );
        self.emit_event(
            group,
            round,
            EventPayload::RoundCleared(RoundClearedEvent {
                reference_price,
                price: result.price,
                volume: result.volume,
                dividend,
            }),
        );
        for order in filled.iter().filter(|o| o.quantity_final > 0) {
            self.emit_event(
                group,
                round,
                EventPayload::Fill(FillEvent {
                    order_id: order.id,
                    participant: order.participant,
                    order_type: order.order_type,
                    quantity: order.quantity_final,
                    price: result.price,
                    is_buy_in: order.is_buy_in,
                }),
            );
        }

        self.record_settlements(group, round, &settlements)?;
        let corrective_orders = self.queue_corrections(group, round, corrections)?;

        Ok(RoundOutcome {
            group,
            round,
            reference_price,
            price: result.price,
            volume: result.volume,
            dividend,
            settlements,
            corrective_orders,
        })
    }

    /// Settles every participant against the filled orders. Reads only.
    fn settle_players(
        &self,
        round: RoundNumber,
        participants: &[ParticipantId],
        filled: &[Order],
        dividend: i64,
        price: Price,
    ) -> Result<Vec<PlayerSettlement>, EngineError> {
        let mut settlements = Vec::with_capacity(participants.len());

        for &participant in participants {
            let player = self
                .store
                .player(participant, round)
                .ok_or(StoreError::MissingPlayer { participant, round })?;
            if round < self.config.num_rounds && self.store.player(participant, round + 1).is_none() {
                return Err(StoreError::MissingPlayer {
                    participant,
                    round: round + 1,
                }
                .into());
            }
            let own: Vec<Order> = filled
                .iter()
                .filter(|o| o.participant == participant)
                .cloned()
                .collect();

            let mut settlement =
                PlayerSettlement::compute(player, &own, dividend, self.config.interest_rate, price)?;
            settlement.set_margin_status(self.config.margin_ratio, price)?;
            settlements.push(settlement);
        }

        Ok(settlements)
    }

    /// Writes each settlement onto its row and carries the result into the next round.
    fn record_settlements(
        &mut self,
        group: GroupId,
        round: RoundNumber,
        settlements: &[PlayerSettlement],
    ) -> Result<(), EngineError> {
        for settlement in settlements {
            let participant = settlement.participant;
            let status = settlement.margin_status;
            let next_counters = settlement.next_counters(self.config.auto_trans_delay);

            let row = self
                .store
                .player_mut(participant, round)
                .ok_or(StoreError::MissingPlayer { participant, round })?;
            settlement.apply_to(row);

            // the last round has no successor to carry into
            if round < self.config.num_rounds {
                let next_round = round + 1;
                let next = self
                    .store
                    .player_mut(participant, next_round)
                    .ok_or(StoreError::MissingPlayer {
                        participant,
                        round: next_round,
                    })?;
                next.cash = settlement.cash_result;
                next.shares = settlement.shares_result;
                next.margin_violation = settlement.margin_violation_future();
                next.periods_until_auto_buy = next_counters.periods_until_auto_buy;
                next.periods_until_auto_sell = next_counters.periods_until_auto_sell;
            }

            debug!(
                target: "settlement",
                participant = participant.0,
                round,
                shares_transacted = settlement.shares_transacted,
                cash_result = %settlement.cash_result,
                shares_result = settlement.shares_result,
                "player settled"
            );
            self.emit_event(
                group,
                round,
                EventPayload::PlayerSettled(PlayerSettledEvent {
                    participant,
                    shares_transacted: settlement.shares_transacted,
                    cash_result: settlement.cash_result,
                    shares_result: settlement.shares_result,
                }),
            );

            match status {
                MarginStatus::Healthy => {}
                MarginStatus::Bankrupt => {
                    warn!(
                        target: "margin",
                        participant = participant.0,
                        round,
                        cash = %settlement.cash_result,
                        shares = settlement.shares_result,
                        "participant bankrupt"
                    );
                    self.emit_event(
                        group,
                        round,
                        EventPayload::Bankruptcy(BankruptcyEvent {
                            participant,
                            cash: settlement.cash_result,
                            shares: settlement.shares_result,
                        }),
                    );
                }
                MarginStatus::ShortViolation { .. } | MarginStatus::DebtViolation { .. } => {
                    warn!(
                        target: "margin",
                        participant = participant.0,
                        round,
                        status = ?status,
                        auto_buy = ?next_counters.periods_until_auto_buy,
                        auto_sell = ?next_counters.periods_until_auto_sell,
                        "margin violation"
                    );
                    self.emit_event(
                        group,
                        round,
                        EventPayload::MarginViolation(MarginViolationEvent {
                            participant,
                            status,
                            periods_until_auto_buy: next_counters.periods_until_auto_buy,
                            periods_until_auto_sell: next_counters.periods_until_auto_sell,
                        }),
                    );
                }
            }
        }

        Ok(())
    }
}

/// Turns the clearing result into one transfer per order, checking each fill
/// against its order and both sides against the volume.
fn reconcile_fills(orders: &[Order], result: &ClearingResult) -> Result<Vec<OrderTransfer>, EngineError> {
    let mut transfers = Vec::with_capacity(orders.len());
    let mut bids = 0u64;
    let mut offers = 0u64;

    for (order, fill) in orders.iter().zip(&result.fills) {
        let mut transfer = OrderTransfer::from_order(order);
        transfer.fill(fill.quantity)?;
        let side = match order.order_type {
            OrderType::Bid => &mut bids,
            OrderType::Offer => &mut offers,
        };
        *side = side.checked_add(fill.quantity).ok_or(Overflow("filled volume"))?;
        transfers.push(transfer);
    }

    if bids != result.volume || offers != result.volume {
        return Err(EngineError::VolumeMismatch {
            bids,
            offers,
            volume: result.volume,
        });
    }
    Ok(transfers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clearing::OrderFill;
    use crate::config::{DividendDistribution, MarketConfig};
    use crate::engine::EngineConfig;
    use crate::order::{total_filled, OrderError};
    use crate::store::MemoryStore;
    use crate::types::{Cash, OrderId};
    use crate::validation::RawOrder;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    const GROUP: GroupId = GroupId(1);
    const BUYER: ParticipantId = ParticipantId(1);
    const SELLER: ParticipantId = ParticipantId(2);
    const SHORT: ParticipantId = ParticipantId(3);

    fn setup_engine(config: MarketConfig) -> CallMarket {
        let store = MemoryStore::seed(&config, GROUP, &[BUYER, SELLER, SHORT]);
        CallMarket::new(config, EngineConfig::default(), store, 42).unwrap()
    }

    fn price(p: i64) -> Price {
        Price::new_unchecked(Decimal::from(p))
    }

    fn submit(engine: &mut CallMarket, who: ParticipantId, round: RoundNumber, side: &str, at: i64, qty: u64) {
        engine
            .submit_order(who, round, &RawOrder::new(side, at.to_string(), qty.to_string()))
            .unwrap();
    }

    fn make_short(engine: &mut CallMarket, round: RoundNumber, cash: i64, shares: i64) {
        let row = engine.store_mut().player_mut(SHORT, round).unwrap();
        row.cash = Cash::from(cash);
        row.shares = shares;
    }

    #[test]
    fn empty_round_keeps_reference_price() {
        let mut engine = setup_engine(MarketConfig::scripted());
        let outcome = engine.clear_round(GROUP, 1).unwrap();

        assert_eq!(outcome.price, price(500));
        assert_eq!(outcome.volume, 0);
        assert_eq!(outcome.settlements.len(), 3);
        let group_round = engine.group_round(GROUP, 1).unwrap();
        assert_eq!(group_round.price, Some(price(500)));
        assert_eq!(group_round.volume, Some(0));
        assert_eq!(group_round.dividend, Some(0));
    }

    #[test]
    fn trade_settles_and_carries_forward() {
        let mut engine = setup_engine(MarketConfig::scripted());
        submit(&mut engine, BUYER, 1, "-1", 500, 1);
        submit(&mut engine, SELLER, 1, "1", 500, 1);

        let outcome = engine.clear_round(GROUP, 1).unwrap();
        assert_eq!(outcome.price, price(500));
        assert_eq!(outcome.volume, 1);

        let buyer = engine.player(BUYER, 1).unwrap();
        assert_eq!(buyer.shares_transacted, Some(1));
        assert_eq!(buyer.trans_cost, Some(Cash::from(-500)));
        assert_eq!(buyer.cash_result, Some(Cash::from(500)));
        assert_eq!(buyer.shares_result, Some(6));

        let next = engine.player(SELLER, 2).unwrap();
        assert_eq!(next.cash, Cash::from(1500));
        assert_eq!(next.shares, 4);
        assert_eq!(next.periods_until_auto_buy, None);

        let (bids, offers) = engine.get_orders_for_group(GROUP, 1);
        assert_eq!(total_filled(&bids), 1);
        assert_eq!(total_filled(&offers), 1);
    }

    #[test]
    fn accrues_dividend_and_interest() {
        let config = MarketConfig {
            interest_rate: dec!(0.1),
            dividends: DividendDistribution::constant(10),
            ..MarketConfig::scripted()
        };
        let mut engine = setup_engine(config);
        let outcome = engine.clear_round(GROUP, 1).unwrap();
        let s = outcome.settlement_for(BUYER).unwrap();
        assert_eq!(s.dividend_earned, Cash::from(50));
        assert_eq!(s.interest_earned, Cash::from(100));
        assert_eq!(s.cash_result, Cash::from(1150));
        assert_eq!(engine.player(BUYER, 2).unwrap().cash, Cash::from(1150));
    }

    #[test]
    fn violation_starts_counter_then_buys_in() {
        let mut engine = setup_engine(MarketConfig::scripted());
        make_short(&mut engine, 1, 2000, -2);

        engine.clear_round(GROUP, 1).unwrap();
        let row = engine.player(SHORT, 2).unwrap();
        assert!(row.margin_violation);
        assert_eq!(row.periods_until_auto_buy, Some(0));
        assert_eq!(row.periods_until_auto_sell, None);

        let outcome = engine.clear_round(GROUP, 2).unwrap();
        assert_eq!(outcome.corrective_orders.len(), 1);
        let buy_in = &outcome.corrective_orders[0];
        assert_eq!(buy_in.round, 3);
        assert_eq!(buy_in.participant, SHORT);
        assert_eq!(buy_in.order_type, OrderType::Bid);
        assert_eq!(buy_in.price, price(550));
        assert_eq!(buy_in.quantity, 1);
        assert!(buy_in.is_buy_in);

        submit(&mut engine, SELLER, 3, "1", 500, 1);
        let outcome = engine.clear_round(GROUP, 3).unwrap();
        assert_eq!(outcome.price, price(550));
        assert_eq!(outcome.volume, 1);
        let s = outcome.settlement_for(SHORT).unwrap();
        assert_eq!(s.cash_result, Cash::from(1450));
        assert_eq!(s.shares_result, -1);
        assert_eq!(engine.player(SHORT, 4).unwrap().periods_until_auto_buy, None);
    }

    #[test]
    fn counter_decays_with_delay() {
        let config = MarketConfig {
            auto_trans_delay: 2,
            ..MarketConfig::scripted()
        };
        let mut engine = setup_engine(config);
        make_short(&mut engine, 1, 2000, -2);

        engine.clear_round(GROUP, 1).unwrap();
        assert_eq!(engine.player(SHORT, 2).unwrap().periods_until_auto_buy, Some(2));
        let outcome = engine.clear_round(GROUP, 2).unwrap();
        assert!(outcome.corrective_orders.is_empty());
        assert_eq!(engine.player(SHORT, 3).unwrap().periods_until_auto_buy, Some(1));
        engine.clear_round(GROUP, 3).unwrap();
        assert_eq!(engine.player(SHORT, 4).unwrap().periods_until_auto_buy, Some(0));
        let outcome = engine.clear_round(GROUP, 4).unwrap();
        assert_eq!(outcome.corrective_orders.len(), 1);
    }

    #[test]
    fn bankrupt_participant_is_left_alone() {
        let mut engine = setup_engine(MarketConfig::scripted());
        make_short(&mut engine, 1, -100, -2);
        engine.store_mut().player_mut(SHORT, 1).unwrap().periods_until_auto_buy = Some(0);

        let outcome = engine.clear_round(GROUP, 1).unwrap();
        assert!(outcome.corrective_orders.is_empty());
        let row = engine.player(SHORT, 2).unwrap();
        assert!(!row.margin_violation);
        assert_eq!(row.periods_until_auto_buy, None);
        assert_eq!(row.periods_until_auto_sell, None);
        assert!(engine
            .events()
            .iter()
            .any(|e| matches!(e.payload, EventPayload::Bankruptcy(_))));
    }

    #[test]
    fn last_round_writes_nothing_forward() {
        let mut engine = setup_engine(MarketConfig::scripted());
        for round in 1..=7 {
            engine.clear_round(GROUP, round).unwrap();
        }
        assert!(engine.player(BUYER, 8).is_none());
        assert!(engine.player(BUYER, 7).unwrap().cash_result.is_some());
    }

    #[test]
    fn clearing_twice_is_idempotent() {
        let mut engine = setup_engine(MarketConfig::default());
        submit(&mut engine, BUYER, 1, "-1", 60, 5);
        submit(&mut engine, SELLER, 1, "1", 55, 3);
        submit(&mut engine, SHORT, 1, "1", 58, 4);

        let first = engine.clear_round(GROUP, 1).unwrap();
        let second = engine.clear_round(GROUP, 1).unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.player(BUYER, 2).unwrap().shares, 55);
    }

    #[test]
    fn overflow_aborts_round_without_writing() {
        let mut engine = setup_engine(MarketConfig::scripted());
        let huge = 1_000_000_000_000_000u64;
        for (who, side) in [(BUYER, OrderType::Bid), (SELLER, OrderType::Offer)] {
            OrderTransfer::new(who, GROUP, 1, side, price(huge as i64), huge)
                .update_order(engine.store_mut())
                .unwrap();
        }

        let err = engine.clear_round(GROUP, 1).unwrap_err();
        assert_eq!(err, EngineError::Overflow(Overflow("notional")));

        assert!(engine.store().orders(GROUP, 1).iter().all(|o| o.quantity_final == 0));
        let group_round = engine.group_round(GROUP, 1).unwrap();
        assert_eq!(group_round.price, None);
        assert_eq!(group_round.volume, None);
        assert_eq!(engine.player(BUYER, 1).unwrap().cash_result, None);
        assert_eq!(engine.player(BUYER, 2).unwrap().shares, 5);
        assert!(!engine
            .events()
            .iter()
            .any(|e| matches!(e.payload, EventPayload::RoundCleared(_))));
    }

    fn book_order(id: u64, order_type: OrderType, quantity: u64) -> Order {
        Order {
            id: OrderId(id),
            participant: ParticipantId(id as u32),
            group: GROUP,
            round: 1,
            order_type,
            price: price(10),
            quantity,
            quantity_final: 0,
            is_buy_in: false,
        }
    }

    fn result_with(volume: u64, bid_fill: u64, offer_fill: u64) -> ClearingResult {
        ClearingResult {
            price: price(10),
            volume,
            fills: vec![
                OrderFill {
                    order_id: OrderId(1),
                    quantity: bid_fill,
                },
                OrderFill {
                    order_id: OrderId(2),
                    quantity: offer_fill,
                },
            ],
        }
    }

    #[test]
    fn unbalanced_fills_are_fatal() {
        let orders = vec![book_order(1, OrderType::Bid, 5), book_order(2, OrderType::Offer, 5)];

        assert_eq!(
            reconcile_fills(&orders, &result_with(5, 5, 3)),
            Err(EngineError::VolumeMismatch {
                bids: 5,
                offers: 3,
                volume: 5
            })
        );
        assert_eq!(
            reconcile_fills(&orders, &result_with(6, 6, 5)),
            Err(EngineError::Order(OrderError::FillExceedsQuantity {
                order_id: Some(OrderId(1)),
                filled: 6,
                quantity: 5
            }))
        );
        let transfers = reconcile_fills(&orders, &result_with(4, 4, 4)).unwrap();
        assert!(transfers.iter().all(|t| t.quantity_final == 4));
    }

    #[test]
    fn requires_previous_round() {
        let mut engine = setup_engine(MarketConfig::scripted());
        assert_eq!(
            engine.clear_round(GROUP, 2),
            Err(EngineError::RoundNotCleared { group: GROUP, round: 1 })
        );
    }

    #[test]
    fn unknown_group() {
        let mut engine = setup_engine(MarketConfig::scripted());
        assert_eq!(
            engine.clear_round(GroupId(9), 1),
            Err(EngineError::UnknownGroup(GroupId(9)))
        );
    }
}
