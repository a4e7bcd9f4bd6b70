// 2.2 clearing.rs: uniform-price call auction.
// every limit price is a candidate; the one that maximizes matched volume wins,
// ties going to the highest price. fills follow price priority, then submission
// order, so the long side is cut at the margin.

use crate::order::Order;
use crate::types::{OrderId, Price};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFill {
    pub order_id: OrderId,
    pub quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearingResult {
    pub price: Price,
    pub volume: u64,
    // one entry per order, in the order given; unmatched orders fill 0
    pub fills: Vec<OrderFill>,
}

impl ClearingResult {
    pub fn fill_for(&self, order_id: OrderId) -> u64 {
        self.fills
            .iter()
            .find(|f| f.order_id == order_id)
            .map_or(0, |f| f.quantity)
    }
}

/// Splits orders into bids and offers, each keeping submission order.
pub fn split_orders(orders: &[Order]) -> (Vec<&Order>, Vec<&Order>) {
    orders.iter().partition(|o| o.is_bid())
}

/// Bid quantity willing to pay at least `price`.
pub fn demand_at(bids: &[&Order], price: Price) -> u64 {
    bids.iter()
        .filter(|o| o.price >= price)
        .fold(0, |acc, o| acc.saturating_add(o.quantity))
}

/// Offer quantity willing to sell at or below `price`.
pub fn supply_at(offers: &[&Order], price: Price) -> u64 {
    offers
        .iter()
        .filter(|o| o.price <= price)
        .fold(0, |acc, o| acc.saturating_add(o.quantity))
}

/// Volume-maximizing price and its volume, `None` when the curves never cross.
pub fn discover_price(bids: &[&Order], offers: &[&Order]) -> Option<(Price, u64)> {
    let mut candidates: Vec<Price> = bids.iter().chain(offers.iter()).map(|o| o.price).collect();
    candidates.sort();
    candidates.dedup();

    let mut best: Option<(Price, u64)> = None;
    // ascending scan with >= keeps the highest price among equal volumes
    for price in candidates {
        let volume = demand_at(bids, price).min(supply_at(offers, price));
        if volume == 0 {
            continue;
        }
        match best {
            Some((_, best_volume)) if volume < best_volume => {}
            _ => best = Some((price, volume)),
        }
    }
    best
}

/// Clears one group-round. Without a cross, volume is zero and the price falls
/// back to `reference_price`.
pub fn clear(orders: &[Order], reference_price: Price) -> ClearingResult {
    let (bids, offers) = split_orders(orders);

    let Some((price, volume)) = discover_price(&bids, &offers) else {
        return ClearingResult {
            price: reference_price,
            volume: 0,
            fills: orders
                .iter()
                .map(|o| OrderFill {
                    order_id: o.id,
                    quantity: 0,
                })
                .collect(),
        };
    };

    let mut eligible_bids: Vec<&Order> = bids.into_iter().filter(|o| o.price >= price).collect();
    // stable sorts keep submission order inside a price level
    eligible_bids.sort_by(|a, b| b.price.cmp(&a.price));
    let mut eligible_offers: Vec<&Order> = offers.into_iter().filter(|o| o.price <= price).collect();
    eligible_offers.sort_by(|a, b| a.price.cmp(&b.price));

    let mut allocated = ration(&eligible_bids, volume);
    allocated.extend(ration(&eligible_offers, volume));

    let fills = orders
        .iter()
        .map(|o| OrderFill {
            order_id: o.id,
            quantity: allocated
                .iter()
                .find(|f| f.order_id == o.id)
                .map_or(0, |f| f.quantity),
        })
        .collect();

    ClearingResult {
        price,
        volume,
        fills,
    }
}

/// Fills orders in the given priority until `volume` runs out.
pub fn ration(orders: &[&Order], volume: u64) -> Vec<OrderFill> {
    let mut remaining = volume;
    orders
        .iter()
        .map(|o| {
            let quantity = o.quantity.min(remaining);
            remaining -= quantity;
            OrderFill {
                order_id: o.id,
                quantity,
            }
        })
        .collect()
}
