// 11.0: every state change of a round produces an event. used for audit trails and
// for replaying what the engine decided. the EventPayload enum lists all event types.

use crate::margin::MarginStatus;
use crate::types::{Cash, GroupId, OrderId, OrderType, ParticipantId, Price, RoundNumber};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub group: GroupId,
    pub round: RoundNumber,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, group: GroupId, round: RoundNumber, payload: EventPayload) -> Self {
        Self {
            id,
            group,
            round,
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    // Trade events
    OrderPlaced(OrderPlacedEvent),
    OrderCanceled(OrderCanceledEvent),
    Fill(FillEvent),
    RoundCleared(RoundClearedEvent),

    // Account events
    PlayerSettled(PlayerSettledEvent),

    // Risk events
    MarginViolation(MarginViolationEvent),
    Bankruptcy(BankruptcyEvent),
    CorrectiveOrderQueued(CorrectiveOrderEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlacedEvent {
    pub order_id: OrderId,
    pub participant: ParticipantId,
    pub order_type: OrderType,
    pub price: Price,
    pub quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCanceledEvent {
    pub order_id: OrderId,
    pub participant: ParticipantId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillEvent {
    pub order_id: OrderId,
    pub participant: ParticipantId,
    pub order_type: OrderType,
    pub quantity: u64,
    pub price: Price,
    pub is_buy_in: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundClearedEvent {
    pub reference_price: Price,
    pub price: Price,
    pub volume: u64,
    pub dividend: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSettledEvent {
    pub participant: ParticipantId,
    pub shares_transacted: i64,
    pub cash_result: Cash,
    pub shares_result: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginViolationEvent {
    pub participant: ParticipantId,
    pub status: MarginStatus,
    pub periods_until_auto_buy: Option<u32>,
    pub periods_until_auto_sell: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankruptcyEvent {
    pub participant: ParticipantId,
    pub cash: Cash,
    pub shares: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectiveOrderEvent {
    pub order_id: OrderId,
    pub participant: ParticipantId,
    pub order_type: OrderType,
    pub price: Price,
    pub quantity: u64,
    // round the order will clear in
    pub for_round: RoundNumber,
}
