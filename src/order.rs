// 2.0: call-market orders and the transfer record used while clearing.
// an order is written once per round: the engine sets quantity_final through an
// OrderTransfer and reconciles it back to the store exactly once.

use crate::store::{RoundStore, StoreError};
use crate::types::{GroupId, OrderId, OrderType, ParticipantId, Price, RoundNumber};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub participant: ParticipantId,
    pub group: GroupId,
    pub round: RoundNumber,
    pub order_type: OrderType,
    pub price: Price,
    pub quantity: u64,
    // filled amount, written by the engine during clearing
    pub quantity_final: u64,
    // system-generated buy-in or sell-in
    pub is_buy_in: bool,
}

impl Order {
    pub fn is_bid(&self) -> bool {
        self.order_type == OrderType::Bid
    }

    pub fn is_offer(&self) -> bool {
        self.order_type == OrderType::Offer
    }

    /// Signed share delta from the filled amount: bids add, offers remove.
    /// `None` when the fill does not fit a share count.
    pub fn signed_fill(&self) -> Option<i64> {
        i64::try_from(self.quantity_final)
            .ok()
            .map(|q| q * self.order_type.share_sign())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("fill of {filled} exceeds order {order_id:?} quantity {quantity}")]
    FillExceedsQuantity {
        order_id: Option<OrderId>,
        filled: u64,
        quantity: u64,
    },

    #[error("order {0:?} already reconciled this round")]
    AlreadyReconciled(Option<OrderId>),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Sums `quantity` over the orders; an absent sequence counts as empty.
pub fn total_quantity(orders: Option<&[Order]>) -> u64 {
    orders
        .map(|os| os.iter().map(|o| o.quantity).sum())
        .unwrap_or(0)
}

/// Sums `quantity_final` over the orders.
pub fn total_filled<'a>(orders: impl IntoIterator<Item = &'a Order>) -> u64 {
    orders.into_iter().map(|o| o.quantity_final).sum()
}

/** 2.1: mutable working copy of an order. built from a stored order, or blank for
 * a generated one, and written back with update_order. */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTransfer {
    order_id: Option<OrderId>,
    pub participant: ParticipantId,
    pub group: GroupId,
    pub round: RoundNumber,
    pub order_type: OrderType,
    pub price: Price,
    pub quantity: u64,
    pub quantity_final: u64,
    pub is_buy_in: bool,
    reconciled: bool,
}

impl OrderTransfer {
    pub fn from_order(order: &Order) -> Self {
        Self {
            order_id: Some(order.id),
            participant: order.participant,
            group: order.group,
            round: order.round,
            order_type: order.order_type,
            price: order.price,
            quantity: order.quantity,
            quantity_final: order.quantity_final,
            is_buy_in: order.is_buy_in,
            reconciled: false,
        }
    }

    /// A record with no stored order behind it yet.
    pub fn new(
        participant: ParticipantId,
        group: GroupId,
        round: RoundNumber,
        order_type: OrderType,
        price: Price,
        quantity: u64,
    ) -> Self {
        Self {
            order_id: None,
            participant,
            group,
            round,
            order_type,
            price,
            quantity,
            quantity_final: 0,
            is_buy_in: false,
            reconciled: false,
        }
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn is_reconciled(&self) -> bool {
        self.reconciled
    }

    pub fn fill(&mut self, quantity: u64) -> Result<(), OrderError> {
        if quantity > self.quantity {
            return Err(OrderError::FillExceedsQuantity {
                order_id: self.order_id,
                filled: quantity,
                quantity: self.quantity,
            });
        }
        self.quantity_final = quantity;
        Ok(())
    }

    /// Writes the record back. A stored order keeps its id, and with it its place
    /// in the queue; a blank record is inserted as a new order.
    pub fn update_order<S: RoundStore + ?Sized>(&mut self, store: &mut S) -> Result<OrderId, OrderError> {
        if self.reconciled {
            return Err(OrderError::AlreadyReconciled(self.order_id));
        }
        if self.quantity_final > self.quantity {
            return Err(OrderError::FillExceedsQuantity {
                order_id: self.order_id,
                filled: self.quantity_final,
                quantity: self.quantity,
            });
        }

        let id = match self.order_id {
            Some(id) => {
                let order = store.order_mut(id).ok_or(StoreError::MissingOrder(id))?;
                order.order_type = self.order_type;
                order.price = self.price;
                order.quantity = self.quantity;
                order.quantity_final = self.quantity_final;
                order.is_buy_in = self.is_buy_in;
                id
            }
            None => {
                let id = store.next_order_id();
                store.insert_order(self.to_order(id));
                self.order_id = Some(id);
                id
            }
        };

        self.reconciled = true;
        Ok(id)
    }

    fn to_order(&self, id: OrderId) -> Order {
        Order {
            id,
            participant: self.participant,
            group: self.group,
            round: self.round,
            order_type: self.order_type,
            price: self.price,
            quantity: self.quantity,
            quantity_final: self.quantity_final,
            is_buy_in: self.is_buy_in,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rust_decimal::Decimal;

    fn order(id: u64, order_type: OrderType, price: i64, quantity: u64) -> Order {
        Order {
            id: OrderId(id),
            participant: ParticipantId(1),
            group: GroupId(1),
            round: 1,
            order_type,
            price: Price::new_unchecked(Decimal::from(price)),
            quantity,
            quantity_final: 0,
            is_buy_in: false,
        }
    }

    fn book() -> Vec<Order> {
        vec![
            order(1, OrderType::Bid, 10, 5),
            order(2, OrderType::Bid, 10, 6),
            order(3, OrderType::Bid, 11, 5),
            order(4, OrderType::Bid, 11, 6),
            order(5, OrderType::Offer, 5, 5),
            order(6, OrderType::Offer, 5, 6),
            order(7, OrderType::Offer, 6, 5),
            order(8, OrderType::Offer, 6, 7),
        ]
    }

    #[test]
    fn total_quantity_sums_and_handles_absent() {
        let orders = book();
        assert_eq!(total_quantity(Some(orders.as_slice())), 45);
        assert_eq!(total_quantity(Some(&[][..])), 0);
        assert_eq!(total_quantity(None), 0);
    }

    #[test]
    fn signed_fill_by_side() {
        let mut bid = order(1, OrderType::Bid, 10, 5);
        bid.quantity_final = 3;
        let mut offer = order(2, OrderType::Offer, 10, 5);
        offer.quantity_final = 2;
        assert_eq!(bid.signed_fill(), Some(3));
        assert_eq!(offer.signed_fill(), Some(-2));
    }

    #[test]
    fn blank_transfer_defaults() {
        let t = OrderTransfer::new(
            ParticipantId(1),
            GroupId(1),
            1,
            OrderType::Offer,
            Price::zero(),
            0,
        );
        assert!(t.order_id().is_none());
        assert_eq!(t.quantity_final, 0);
        assert!(!t.is_buy_in);
        assert!(!t.is_reconciled());
    }

    #[test]
    fn transfer_copies_order() {
        let o = order(99, OrderType::Bid, 10, 5);
        let t = OrderTransfer::from_order(&o);
        assert_eq!(t.order_id(), Some(OrderId(99)));
        assert_eq!(t.participant, o.participant);
        assert_eq!(t.group, o.group);
        assert_eq!(t.price, o.price);
        assert_eq!(t.quantity, 5);
        assert_eq!(t.quantity_final, 0);
        assert!(!t.is_buy_in);
    }

    #[test]
    fn fill_beyond_quantity_is_rejected() {
        let mut t = OrderTransfer::from_order(&order(1, OrderType::Bid, 10, 5));
        assert!(t.fill(5).is_ok());
        assert_eq!(
            t.fill(6),
            Err(OrderError::FillExceedsQuantity {
                order_id: Some(OrderId(1)),
                filled: 6,
                quantity: 5
            })
        );
    }

    #[test]
    fn update_order_writes_fill_back() {
        let mut store = MemoryStore::new();
        let id = store.next_order_id();
        let mut o = order(0, OrderType::Bid, 10, 5);
        o.id = id;
        store.insert_order(o.clone());

        let mut t = OrderTransfer::from_order(&o);
        t.fill(4).unwrap();
        t.is_buy_in = true;
        assert_eq!(t.update_order(&mut store), Ok(id));

        let stored = store.order(id).unwrap();
        assert_eq!(stored.quantity_final, 4);
        assert!(stored.is_buy_in);
        assert_eq!(stored.quantity, 5);
        assert_eq!(stored.price, o.price);
    }

    #[test]
    fn update_order_inserts_blank_record() {
        let mut store = MemoryStore::new();
        let mut t = OrderTransfer::new(
            ParticipantId(3),
            GroupId(2),
            4,
            OrderType::Offer,
            Price::new_unchecked(Decimal::from(54)),
            55,
        );
        t.is_buy_in = true;
        let id = t.update_order(&mut store).unwrap();

        assert_eq!(t.order_id(), Some(id));
        let stored = store.order(id).unwrap();
        assert_eq!(stored.participant, ParticipantId(3));
        assert_eq!(stored.group, GroupId(2));
        assert_eq!(stored.round, 4);
        assert_eq!(stored.quantity, 55);
        assert!(stored.is_buy_in);
    }

    #[test]
    fn update_order_only_once() {
        let mut store = MemoryStore::new();
        let mut t = OrderTransfer::new(
            ParticipantId(1),
            GroupId(1),
            1,
            OrderType::Bid,
            Price::zero(),
            1,
        );
        let id = t.update_order(&mut store).unwrap();
        assert_eq!(t.update_order(&mut store), Err(OrderError::AlreadyReconciled(Some(id))));
    }

    #[test]
    fn update_order_missing_row() {
        let mut store = MemoryStore::new();
        let mut t = OrderTransfer::from_order(&order(42, OrderType::Bid, 10, 5));
        assert_eq!(
            t.update_order(&mut store),
            Err(OrderError::Store(StoreError::MissingOrder(OrderId(42))))
        );
    }
}
