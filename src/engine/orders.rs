//! Order submission and lookup before a round clears.

use super::core::CallMarket;
use super::results::EngineError;
use crate::events::{EventPayload, OrderCanceledEvent, OrderPlacedEvent};
use crate::order::{Order, OrderTransfer};
use crate::store::{RoundStore, StoreError};
use crate::types::{GroupId, OrderId, ParticipantId, RoundNumber};
use crate::validation::{validate_order, RawOrder};
use tracing::debug;

impl<S: RoundStore> CallMarket<S> {
    /// Validate form input against the participant's own orders for the round and
    /// store it. Rejections carry every violation found.
    pub fn submit_order(
        &mut self,
        participant: ParticipantId,
        round: RoundNumber,
        raw: &RawOrder,
    ) -> Result<OrderId, EngineError> {
        self.check_round(round)?;
        let group = self
            .store
            .player(participant, round)
            .ok_or(StoreError::MissingPlayer { participant, round })?
            .group;
        self.ensure_open(group, round)?;

        let existing = self.orders_for_participant(participant, round)?;
        let valid = validate_order(raw, &existing, &self.config.order_limits)?;

        let mut transfer = OrderTransfer::new(
            participant,
            group,
            round,
            valid.order_type,
            valid.price,
            valid.quantity,
        );
        let order_id = transfer.update_order(&mut self.store)?;

        debug!(
            target: "clearing",
            order_id = order_id.0,
            participant = participant.0,
            round,
            side = %valid.order_type,
            price = %valid.price,
            quantity = valid.quantity,
            "order placed"
        );
        self.emit_event(
            group,
            round,
            EventPayload::OrderPlaced(OrderPlacedEvent {
                order_id,
                participant,
                order_type: valid.order_type,
                price: valid.price,
                quantity: valid.quantity,
            }),
        );

        Ok(order_id)
    }

    /// Withdraw a participant's order before its round clears. Buy-ins and
    /// sell-ins stay.
    pub fn cancel_order(&mut self, order_id: OrderId) -> Result<Order, EngineError> {
        let order = self
            .store
            .order(order_id)
            .ok_or(EngineError::OrderNotFound(order_id))?;
        if order.is_buy_in {
            return Err(EngineError::CorrectiveOrder(order_id));
        }
        let (group, round, participant) = (order.group, order.round, order.participant);
        self.ensure_open(group, round)?;

        let order = self
            .store
            .remove_order(order_id)
            .ok_or(EngineError::OrderNotFound(order_id))?;

        self.emit_event(
            group,
            round,
            EventPayload::OrderCanceled(OrderCanceledEvent {
                order_id,
                participant,
            }),
        );
        Ok(order)
    }

    pub fn orders_for_participant(
        &self,
        participant: ParticipantId,
        round: RoundNumber,
    ) -> Result<Vec<Order>, EngineError> {
        let group = self
            .store
            .player(participant, round)
            .ok_or(StoreError::MissingPlayer { participant, round })?
            .group;
        Ok(self
            .store
            .orders(group, round)
            .into_iter()
            .filter(|o| o.participant == participant)
            .collect())
    }

    /// Bids and offers of a group-round, each in submission order.
    pub fn get_orders_for_group(&self, group: GroupId, round: RoundNumber) -> (Vec<Order>, Vec<Order>) {
        self.store.orders(group, round).into_iter().partition(Order::is_bid)
    }

    fn ensure_open(&self, group: GroupId, round: RoundNumber) -> Result<(), EngineError> {
        let cleared = self
            .store
            .group_round(group, round)
            .is_some_and(|g| g.price.is_some());
        if cleared {
            return Err(EngineError::RoundAlreadyCleared { group, round });
        }
        Ok(())
    }
}
