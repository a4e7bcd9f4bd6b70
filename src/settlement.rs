// 4.0 settlement.rs: per-participant settlement of one round.
// turns fills into a new position, accrues dividend and interest, and records the
// forward margin status used to schedule buy-ins and sell-ins.

use crate::buy_in::{generate_buy_in_order, generate_sell_in_order, CorrectionParams, CorrectiveOrder};
use crate::margin::{MarginCounters, MarginStatus, Position};
use crate::order::Order;
use crate::store::PlayerRound;
use crate::types::{Cash, Overflow, ParticipantId, Price};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSettlement {
    pub participant: ParticipantId,
    pub opening: Position,
    // counters carried into this round
    pub counters: MarginCounters,

    pub shares_transacted: i64,
    pub trans_cost: Cash,
    pub cash_after_trade: Cash,
    pub dividend_earned: Cash,
    pub interest_earned: Cash,
    pub cash_result: Cash,
    pub shares_result: i64,

    // status of the resulting position at the clearing price
    pub margin_status: MarginStatus,
}

impl PlayerSettlement {
    /// 4.1: settle `orders` (this participant's, with fills written) at `price`.
    pub fn compute(
        player: &PlayerRound,
        orders: &[Order],
        dividend: i64,
        interest_rate: Decimal,
        price: Price,
    ) -> Result<Self, Overflow> {
        let opening = Position::new(player.cash, player.shares);

        let shares_transacted = orders
            .iter()
            .try_fold(0i64, |acc, o| acc.checked_add(o.signed_fill()?))
            .ok_or(Overflow("shares transacted"))?;
        let shares_result = opening
            .shares
            .checked_add(shares_transacted)
            .ok_or(Overflow("shares result"))?;
        // buying costs cash, selling raises it
        let trans_cost = Cash::new(-price.notional(shares_transacted)?);
        let cash_after_trade = opening.cash.checked_add(trans_cost)?;
        let dividend_earned = Decimal::from(dividend)
            .checked_mul(Decimal::from(shares_result))
            .map(Cash::new)
            .ok_or(Overflow("dividend earned"))?;
        let interest_earned = cash_after_trade.checked_mul(interest_rate)?;
        let cash_result = cash_after_trade
            .checked_add(dividend_earned)?
            .checked_add(interest_earned)?;

        Ok(Self {
            participant: player.participant,
            opening,
            counters: MarginCounters::new(player.periods_until_auto_buy, player.periods_until_auto_sell),
            shares_transacted,
            trans_cost,
            cash_after_trade,
            dividend_earned,
            interest_earned,
            cash_result,
            shares_result,
            margin_status: MarginStatus::Healthy,
        })
    }

    pub fn result_position(&self) -> Position {
        Position::new(self.cash_result, self.shares_result)
    }

    /// Evaluates the resulting position at the round's clearing price.
    pub fn set_margin_status(&mut self, margin_ratio: Decimal, price: Price) -> Result<MarginStatus, Overflow> {
        self.margin_status = self.result_position().margin_status(price, margin_ratio)?;
        Ok(self.margin_status)
    }

    pub fn margin_violation_future(&self) -> bool {
        self.margin_status.is_violation()
    }

    /// The counter carried in ran out and the short is still in violation.
    pub fn is_buy_in_required(&self) -> bool {
        self.counters.buy_in_due() && self.margin_status.is_short_violation()
    }

    pub fn is_sell_in_required(&self) -> bool {
        self.counters.sell_in_due() && self.margin_status.is_debt_violation()
    }

    pub fn next_counters(&self, base_delay: u32) -> MarginCounters {
        self.counters.next(&self.margin_status, base_delay)
    }

    /// The corrective order due this round, if any, priced off `reference_price`.
    pub fn corrective_order(
        &self,
        reference_price: Price,
        params: &CorrectionParams,
    ) -> Result<Option<CorrectiveOrder>, Overflow> {
        let order = if self.is_buy_in_required() {
            Some(generate_buy_in_order(self.result_position(), reference_price, params)?)
        } else if self.is_sell_in_required() {
            Some(generate_sell_in_order(self.result_position(), reference_price, params)?)
        } else {
            None
        };
        Ok(order)
    }

    /// Copies the settlement onto the participant's row for this round.
    pub fn apply_to(&self, player: &mut PlayerRound) {
        player.shares_transacted = Some(self.shares_transacted);
        player.trans_cost = Some(self.trans_cost);
        player.cash_after_trade = Some(self.cash_after_trade);
        player.dividend_earned = Some(self.dividend_earned);
        player.interest_earned = Some(self.interest_earned);
        player.cash_result = Some(self.cash_result);
        player.shares_result = Some(self.shares_result);
    }
}
