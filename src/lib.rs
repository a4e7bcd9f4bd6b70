// call-market: repeated call-auction engine for trading experiments.
// each round clears at one uniform price, settles every participant, and feeds
// sustained margin violations back as forced orders in the next round.
// all computation is deterministic given the store and the dividend seed.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: ParticipantId, OrderType, Price, Cash
//   2.x  order.rs: orders and the transfer record written back once per round
//   2.2  clearing.rs: price discovery and rationing
//   2.3  validation.rs: order form checks and error codes
//   3.x  margin.rs: short/debt margins, violation delay counters
//   3.1  buy_in.rs: buy-in and sell-in order sizing
//   4.x  settlement.rs: per-participant trade, dividend and interest settlement
//   5.x  dividend.rs: dividend draw, fundamental value
//   7.x  config.rs: market parameters, dividend distribution, presets
//   8.x  engine/: round clearing, pricing, orders, corrections
//   9.x  store.rs: round-indexed repository (in memory)
//   10.x summary.rs: participant summary and field schema
//   11.x events.rs: state transition events for audit
//   12.x scenario.rs: scripted multi-round sessions

// core market modules
pub mod clearing;
pub mod engine;
pub mod events;
pub mod order;
pub mod settlement;
pub mod types;

// risk modules
pub mod buy_in;
pub mod margin;

// session modules
pub mod config;
pub mod dividend;
pub mod scenario;
pub mod store;
pub mod summary;
pub mod validation;

// re exports for convenience
pub use buy_in::*;
pub use clearing::*;
pub use engine::*;
pub use events::*;
pub use margin::*;
pub use order::*;
pub use settlement::*;
pub use types::*;
pub use config::{ConfigError, DividendDistribution, MarketConfig, OrderLimits};
pub use dividend::{draw_dividend, expected_dividend, fundamental_value};
pub use scenario::{scripted_market, Scenario, ScenarioError, ScenarioReport, ScenarioRun};
pub use store::{GroupRound, MemoryStore, PlayerRound, RoundStore, StoreError};
pub use summary::{FieldValue, GroupField, PlayerSummary, SettlementField};
pub use validation::{validate_order, OrderField, OrderViolation, RawOrder, ValidOrder, Violations};
