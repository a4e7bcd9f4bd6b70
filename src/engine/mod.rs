// 8.0: call-market engine. gathers a group-round's orders, clears them at one
// price, settles every participant and feeds margin corrections into the next
// round. deterministic given the store contents and the rng seed.

mod clearing;
mod config;
mod core;
mod corrections;
mod orders;
mod pricing;
mod results;

pub use config::EngineConfig;
pub use core::CallMarket;
pub use results::{EngineError, RoundOutcome};
