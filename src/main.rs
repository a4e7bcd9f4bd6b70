//! Call-market session simulation.
//!
//! Replays the scripted reference session, then runs a randomized market with
//! noisy traders around the fundamental value. Pass a JSON market config path to
//! override the randomized market's parameters. Set `RUST_LOG` for engine logs.

use call_market::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::env;
use std::fs;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    println!("Call Market Simulation");
    println!("Uniform-price rounds, margin buy-ins and sell-ins\n");

    scenario_1_scripted_session();

    let config = match env::args().nth(1) {
        Some(path) => {
            let json = fs::read_to_string(&path).unwrap();
            MarketConfig::from_json(&json).unwrap()
        }
        None => MarketConfig::default(),
    };
    scenario_2_random_market(config, 2024);

    println!("\nAll simulations completed.");
}

/// The reference session: trade, buy-in of a short, sell-in of a debtor.
fn scenario_1_scripted_session() {
    println!("Scenario 1: Scripted Session\n");

    let report = scripted_market().run(MarketConfig::scripted(), 0).unwrap();

    for outcome in &report.outcomes {
        println!(
            "  Round {}: reference {}, price {}, volume {}",
            outcome.round, outcome.reference_price, outcome.price, outcome.volume
        );
        for order in &outcome.corrective_orders {
            println!(
                "    queued {} {} @ {} for participant {} in round {}",
                order.order_type, order.quantity, order.price, order.participant.0, order.round
            );
        }
    }

    if report.is_success() {
        println!("\n  All expectations met\n");
    } else {
        for mismatch in &report.mismatches {
            println!("  MISMATCH {}", mismatch);
        }
        for rejection in &report.rejected {
            println!("  REJECTED round {} {}: {}", rejection.round, rejection.actor, rejection.violations);
        }
        println!();
    }
}

/// Noisy traders quoting around the last price for a full session.
fn scenario_2_random_market(config: MarketConfig, seed: u64) {
    println!("Scenario 2: Random Market\n");

    let group = GroupId(1);
    let traders: Vec<ParticipantId> = (1..=8).map(ParticipantId).collect();
    let store = MemoryStore::seed(&config, group, &traders);
    let mut engine = CallMarket::new(config, EngineConfig::default(), store, seed).unwrap();
    let mut rng = StdRng::seed_from_u64(seed ^ 0x5eed);

    println!("  Fundamental value: {}", engine.fundamental_value());

    for round in 1..=engine.config().num_rounds {
        let anchor = engine.reference_price(group, round).unwrap().value();

        for &trader in &traders {
            let spread: f64 = rng.random_range(-0.15..0.15);
            let price = (anchor * Decimal::try_from(1.0 + spread).unwrap_or(Decimal::ONE)).round();
            let quantity: u64 = rng.random_range(1..=5);
            let side = if rng.random_bool(0.5) { OrderType::Bid } else { OrderType::Offer };
            let raw = RawOrder::new(side.code().to_string(), price.to_string(), quantity.to_string());
            match engine.submit_order(trader, round, &raw) {
                Ok(_) | Err(EngineError::Rejected(_)) => {}
                Err(e) => panic!("order submission failed: {e}"),
            }
        }

        let outcome = engine.clear_round(group, round).unwrap();
        let violators = outcome
            .settlements
            .iter()
            .filter(|s| s.margin_violation_future())
            .count();
        println!(
            "  Round {:>2}: price {:>5}, volume {:>3}, dividend {:>3}, violators {}, corrections {}",
            round,
            outcome.price,
            outcome.volume,
            outcome.dividend,
            violators,
            outcome.corrective_orders.len()
        );
    }

    let last = engine.config().num_rounds;
    println!("\n  Final positions:");
    for &trader in &traders {
        let player = engine.player(trader, last).unwrap();
        println!(
            "    Trader {}: cash {}, shares {}",
            trader.0,
            player.cash_result.unwrap_or(player.cash),
            player.shares_result.unwrap_or(player.shares)
        );
    }
    println!("  Events recorded: {}", engine.events().len());
}
