//! Round-indexed repository of participants, orders and group state.
//!
//! The engine only talks to [`RoundStore`]. [`MemoryStore`] keeps everything in
//! ordered maps so iteration, and therefore clearing, is deterministic.

use crate::config::MarketConfig;
use crate::order::Order;
use crate::summary::PlayerSummary;
use crate::types::{Cash, GroupId, OrderId, ParticipantId, Price, RoundNumber};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no state for participant {participant:?} in round {round}")]
    MissingPlayer {
        participant: ParticipantId,
        round: RoundNumber,
    },

    #[error("no state for group {group:?} in round {round}")]
    MissingGroupRound { group: GroupId, round: RoundNumber },

    #[error("order {0:?} not found")]
    MissingOrder(OrderId),
}

/// One participant's state for one round. Opening `cash`/`shares` are carried
/// from the prior round's results; the settlement fields stay unset until the
/// round clears.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRound {
    pub participant: ParticipantId,
    pub group: GroupId,
    pub round: RoundNumber,
    pub cash: Cash,
    pub shares: i64,
    pub margin_violation: bool,
    pub periods_until_auto_buy: Option<u32>,
    pub periods_until_auto_sell: Option<u32>,

    pub shares_transacted: Option<i64>,
    pub trans_cost: Option<Cash>,
    pub cash_after_trade: Option<Cash>,
    pub dividend_earned: Option<Cash>,
    pub interest_earned: Option<Cash>,
    pub cash_result: Option<Cash>,
    pub shares_result: Option<i64>,
}

impl PlayerRound {
    pub fn new(
        participant: ParticipantId,
        group: GroupId,
        round: RoundNumber,
        cash: Cash,
        shares: i64,
    ) -> Self {
        Self {
            participant,
            group,
            round,
            cash,
            shares,
            margin_violation: false,
            periods_until_auto_buy: None,
            periods_until_auto_sell: None,
            shares_transacted: None,
            trans_cost: None,
            cash_after_trade: None,
            dividend_earned: None,
            interest_earned: None,
            cash_result: None,
            shares_result: None,
        }
    }

    pub fn to_summary(&self) -> PlayerSummary {
        PlayerSummary {
            cash: Some(self.cash),
            shares: Some(self.shares),
            periods_until_auto_buy: self.periods_until_auto_buy,
            periods_until_auto_sell: self.periods_until_auto_sell,
            shares_transacted: self.shares_transacted,
            trans_cost: self.trans_cost,
            cash_after_trade: self.cash_after_trade,
            interest_earned: self.interest_earned,
            dividend_earned: self.dividend_earned,
            cash_result: self.cash_result,
            shares_result: self.shares_result,
        }
    }

    /// Inverse of `to_summary`. The opening position is not taken from the summary.
    pub fn apply_summary(&mut self, summary: &PlayerSummary) {
        self.shares_result = summary.shares_result;
        self.shares_transacted = summary.shares_transacted;
        self.trans_cost = summary.trans_cost;
        self.cash_after_trade = summary.cash_after_trade;
        self.dividend_earned = summary.dividend_earned;
        self.interest_earned = summary.interest_earned;
        self.cash_result = summary.cash_result;
        self.periods_until_auto_buy = summary.periods_until_auto_buy;
        self.periods_until_auto_sell = summary.periods_until_auto_sell;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRound {
    pub group: GroupId,
    pub round: RoundNumber,
    pub price: Option<Price>,
    pub volume: Option<u64>,
    pub dividend: Option<i64>,
}

impl GroupRound {
    pub fn new(group: GroupId, round: RoundNumber) -> Self {
        Self {
            group,
            round,
            price: None,
            volume: None,
            dividend: None,
        }
    }
}

/// Read/write access the engine needs. Lookups outside the seeded rounds return `None`.
pub trait RoundStore {
    fn participants(&self, group: GroupId) -> Vec<ParticipantId>;

    /// Orders for a group-round in submission order.
    fn orders(&self, group: GroupId, round: RoundNumber) -> Vec<Order>;
    fn order(&self, id: OrderId) -> Option<&Order>;
    fn order_mut(&mut self, id: OrderId) -> Option<&mut Order>;
    fn next_order_id(&mut self) -> OrderId;
    fn insert_order(&mut self, order: Order);
    fn remove_order(&mut self, id: OrderId) -> Option<Order>;

    fn player(&self, participant: ParticipantId, round: RoundNumber) -> Option<&PlayerRound>;
    fn player_mut(&mut self, participant: ParticipantId, round: RoundNumber) -> Option<&mut PlayerRound>;

    fn group_round(&self, group: GroupId, round: RoundNumber) -> Option<&GroupRound>;
    fn group_round_mut(&mut self, group: GroupId, round: RoundNumber) -> Option<&mut GroupRound>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    groups: BTreeMap<GroupId, Vec<ParticipantId>>,
    orders: BTreeMap<OrderId, Order>,
    players: BTreeMap<(ParticipantId, RoundNumber), PlayerRound>,
    group_rounds: BTreeMap<(GroupId, RoundNumber), GroupRound>,
    next_order_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_order_id: 1,
            ..Self::default()
        }
    }

    /// Creates rows for rounds `1..=num_rounds`. Round 1 opens with the configured
    /// endowment; later rounds are overwritten as earlier ones settle.
    pub fn seed(config: &MarketConfig, group: GroupId, participants: &[ParticipantId]) -> Self {
        let mut store = Self::new();
        store.add_group(config, group, participants);
        store
    }

    pub fn add_group(&mut self, config: &MarketConfig, group: GroupId, participants: &[ParticipantId]) {
        self.groups.insert(group, participants.to_vec());
        let opening_cash = Cash::new(config.initial_cash);
        for round in 1..=config.num_rounds {
            self.group_rounds.insert((group, round), GroupRound::new(group, round));
            for &participant in participants {
                self.players.insert(
                    (participant, round),
                    PlayerRound::new(participant, group, round, opening_cash, config.initial_shares),
                );
            }
        }
    }

    pub fn all_orders(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }
}

impl RoundStore for MemoryStore {
    fn participants(&self, group: GroupId) -> Vec<ParticipantId> {
        self.groups.get(&group).cloned().unwrap_or_default()
    }

    fn orders(&self, group: GroupId, round: RoundNumber) -> Vec<Order> {
        self.orders
            .values()
            .filter(|o| o.group == group && o.round == round)
            .cloned()
            .collect()
    }

    fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    fn order_mut(&mut self, id: OrderId) -> Option<&mut Order> {
        self.orders.get_mut(&id)
    }

    fn next_order_id(&mut self) -> OrderId {
        // Default-built stores start at zero; ids are handed out from 1.
        self.next_order_id = self.next_order_id.max(1);
        let id = OrderId(self.next_order_id);
        self.next_order_id += 1;
        id
    }

    fn insert_order(&mut self, order: Order) {
        self.orders.insert(order.id, order);
    }

    fn remove_order(&mut self, id: OrderId) -> Option<Order> {
        self.orders.remove(&id)
    }

    fn player(&self, participant: ParticipantId, round: RoundNumber) -> Option<&PlayerRound> {
        self.players.get(&(participant, round))
    }

    fn player_mut(&mut self, participant: ParticipantId, round: RoundNumber) -> Option<&mut PlayerRound> {
        self.players.get_mut(&(participant, round))
    }

    fn group_round(&self, group: GroupId, round: RoundNumber) -> Option<&GroupRound> {
        self.group_rounds.get(&(group, round))
    }

    fn group_round_mut(&mut self, group: GroupId, round: RoundNumber) -> Option<&mut GroupRound> {
        self.group_rounds.get_mut(&(group, round))
    }
}
