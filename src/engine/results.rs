// 8.0.2: result types and errors for engine operations.

use crate::config::ConfigError;
use crate::order::{Order, OrderError};
use crate::settlement::PlayerSettlement;
use crate::store::StoreError;
use crate::types::{GroupId, OrderId, Overflow, ParticipantId, Price, RoundNumber};
use crate::validation::Violations;
use serde::Serialize;

/// Everything one clearing of a group-round decided.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundOutcome {
    pub group: GroupId,
    pub round: RoundNumber,
    pub reference_price: Price,
    pub price: Price,
    pub volume: u64,
    pub dividend: i64,
    pub settlements: Vec<PlayerSettlement>,
    // queued for round + 1
    pub corrective_orders: Vec<Order>,
}

impl RoundOutcome {
    pub fn settlement_for(&self, participant: ParticipantId) -> Option<&PlayerSettlement> {
        self.settlements.iter().find(|s| s.participant == participant)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Group {0:?} has no participants")]
    UnknownGroup(GroupId),

    #[error("Round {round} outside 1..={num_rounds}")]
    RoundOutOfRange { round: RoundNumber, num_rounds: RoundNumber },

    #[error("Group {group:?} round {round} has not cleared")]
    RoundNotCleared { group: GroupId, round: RoundNumber },

    #[error("Group {group:?} round {round} already cleared")]
    RoundAlreadyCleared { group: GroupId, round: RoundNumber },

    #[error("Bid fills {bids} and offer fills {offers} do not match volume {volume}")]
    VolumeMismatch { bids: u64, offers: u64, volume: u64 },

    #[error("Order {0:?} not found")]
    OrderNotFound(OrderId),

    #[error("Order {0:?} was generated by the market and cannot be canceled")]
    CorrectiveOrder(OrderId),

    #[error("Order rejected: {0}")]
    Rejected(#[from] Violations),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Round aborted: {0}")]
    Overflow(#[from] Overflow),
}
