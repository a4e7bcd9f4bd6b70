// 8.3: buy-ins and sell-ins. a violator whose counter ran out gets a corrective
// order in the next round, priced off that round's reference price. clearing a
// round again rewrites its generated orders in place, so they keep their queue
// position against orders submitted since.

use super::core::CallMarket;
use super::results::EngineError;
use crate::buy_in::{CorrectionParams, CorrectiveOrder};
use crate::events::{CorrectiveOrderEvent, EventPayload};
use crate::order::{Order, OrderTransfer};
use crate::settlement::PlayerSettlement;
use crate::store::{RoundStore, StoreError};
use crate::types::{GroupId, ParticipantId, Price, RoundNumber};
use std::collections::BTreeMap;
use tracing::{debug, info};

impl<S: RoundStore> CallMarket<S> {
    /// Corrections due after this round, sized off the next round's reference price.
    pub(super) fn plan_corrections(
        &self,
        round: RoundNumber,
        settlements: &[PlayerSettlement],
        clearing_price: Price,
    ) -> Result<Vec<(ParticipantId, CorrectiveOrder)>, EngineError> {
        if round >= self.config.num_rounds {
            return Ok(Vec::new());
        }

        let reference_price = clearing_price.round_to_unit();
        let params = CorrectionParams {
            margin_premium: self.config.margin_premium,
            margin_target_ratio: self.config.margin_target_ratio,
        };

        let mut planned = Vec::new();
        for settlement in settlements {
            let Some(correction) = settlement.corrective_order(reference_price, &params)? else {
                continue;
            };
            if correction.is_empty() {
                debug!(
                    target: "buy_in",
                    participant = settlement.participant.0,
                    round,
                    "correction sized to zero, nothing queued"
                );
                continue;
            }
            planned.push((settlement.participant, correction));
        }
        Ok(planned)
    }

    pub(super) fn queue_corrections(
        &mut self,
        group: GroupId,
        round: RoundNumber,
        planned: Vec<(ParticipantId, CorrectiveOrder)>,
    ) -> Result<Vec<Order>, EngineError> {
        if round >= self.config.num_rounds {
            return Ok(Vec::new());
        }
        let next_round = round + 1;

        // left by an earlier clearing of this round
        let mut previous: BTreeMap<ParticipantId, Order> = self
            .store
            .orders(group, next_round)
            .into_iter()
            .filter(|o| o.is_buy_in)
            .map(|o| (o.participant, o))
            .collect();

        let mut queued = Vec::with_capacity(planned.len());
        for (participant, correction) in planned {
            let order_id = match previous.remove(&participant) {
                Some(existing) if correction.matches(&existing) => existing.id,
                Some(existing) => {
                    let mut transfer = OrderTransfer::from_order(&existing);
                    transfer.order_type = correction.order_type;
                    transfer.price = correction.price;
                    transfer.quantity = correction.quantity;
                    transfer.quantity_final = 0;
                    transfer.update_order(&mut self.store)?
                }
                None => {
                    let mut transfer = OrderTransfer::new(
                        participant,
                        group,
                        next_round,
                        correction.order_type,
                        correction.price,
                        correction.quantity,
                    );
                    transfer.is_buy_in = true;
                    transfer.update_order(&mut self.store)?
                }
            };
            let order = self
                .store
                .order(order_id)
                .cloned()
                .ok_or(StoreError::MissingOrder(order_id))?;

            info!(
                target: "buy_in",
                participant = participant.0,
                round = next_round,
                side = %order.order_type,
                price = %order.price,
                quantity = order.quantity,
                "corrective order queued"
            );
            self.emit_event(
                group,
                round,
                EventPayload::CorrectiveOrderQueued(CorrectiveOrderEvent {
                    order_id,
                    participant,
                    order_type: order.order_type,
                    price: order.price,
                    quantity: order.quantity,
                    for_round: next_round,
                }),
            );
            queued.push(order);
        }

        for stale in previous.into_values() {
            self.store.remove_order(stale.id);
            debug!(
                target: "buy_in",
                participant = stale.participant.0,
                round = next_round,
                order = stale.id.0,
                "corrective order withdrawn"
            );
        }

        Ok(queued)
    }
}
