//! Scripted multi-round market sessions.
//!
//! A [`Scenario`] lists, round by round, what each named actor does (an opening
//! position override and some orders) and what the round should produce. Running
//! it drives a [`CallMarket`] over a fresh [`MemoryStore`] and collects every
//! expectation that did not hold.
//!
//! Player expectations for round n are read from the actor's round n+1 row before
//! that round is set up: the row that carries round n's results forward, with its
//! own settlement fields still unset.

use crate::config::MarketConfig;
use crate::engine::{CallMarket, EngineConfig, EngineError, RoundOutcome};
use crate::store::{MemoryStore, RoundStore, StoreError};
use crate::summary::{FieldValue, GroupField, SettlementField};
use crate::types::{Cash, GroupId, OrderType, ParticipantId, RoundNumber};
use crate::validation::{RawOrder, Violations};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

const SCENARIO_GROUP: GroupId = GroupId(1);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScenarioError {
    #[error("actor {0} is not part of the scenario")]
    UnknownActor(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<StoreError> for ScenarioError {
    fn from(e: StoreError) -> Self {
        ScenarioError::Engine(e.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptedOrder {
    pub order_type: OrderType,
    pub quantity: u64,
    pub price: i64,
}

/// One actor's part in one round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActorScript {
    opening: Option<(Cash, i64)>,
    orders: Vec<ScriptedOrder>,
    expectations: Vec<(SettlementField, FieldValue)>,
}

impl ActorScript {
    /// Overrides the opening position before the round's orders go in.
    pub fn set(mut self, cash: i64, shares: i64) -> Self {
        self.opening = Some((Cash::from(cash), shares));
        self
    }

    pub fn buy(mut self, quantity: u64, at: i64) -> Self {
        self.orders.push(ScriptedOrder {
            order_type: OrderType::Bid,
            quantity,
            price: at,
        });
        self
    }

    pub fn sell(mut self, quantity: u64, at: i64) -> Self {
        self.orders.push(ScriptedOrder {
            order_type: OrderType::Offer,
            quantity,
            price: at,
        });
        self
    }

    pub fn expect(mut self, field: SettlementField, value: impl Into<FieldValue>) -> Self {
        self.expectations.push((field, value.into()));
        self
    }

    pub fn expect_unset(mut self, field: SettlementField) -> Self {
        self.expectations.push((field, FieldValue::Unset));
        self
    }

    pub fn orders(&self) -> &[ScriptedOrder] {
        &self.orders
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundScript {
    group_expectations: Vec<(GroupField, FieldValue)>,
    // first-mention order
    actors: Vec<(String, ActorScript)>,
}

impl RoundScript {
    pub fn expect_group(mut self, field: GroupField, value: impl Into<FieldValue>) -> Self {
        self.group_expectations.push((field, value.into()));
        self
    }

    pub fn actor(mut self, name: &str, setup: impl FnOnce(ActorScript) -> ActorScript) -> Self {
        let script = setup(ActorScript::default());
        match self.actors.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = script,
            None => self.actors.push((name.to_string(), script)),
        }
        self
    }

    pub fn actor_script(&self, name: &str) -> Option<&ActorScript> {
        self.actors.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scenario {
    rounds: BTreeMap<RoundNumber, RoundScript>,
}

impl Scenario {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn round(mut self, round: RoundNumber, setup: impl FnOnce(RoundScript) -> RoundScript) -> Self {
        let script = setup(RoundScript::default());
        self.rounds.insert(round, script);
        self
    }

    pub fn for_round(&self, round: RoundNumber) -> Option<&RoundScript> {
        self.rounds.get(&round)
    }

    pub fn last_round(&self) -> RoundNumber {
        self.rounds.keys().next_back().copied().unwrap_or(0)
    }

    /// Actor names in order of first appearance.
    pub fn actors(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for script in self.rounds.values() {
            for (name, _) in &script.actors {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    /// Plays every scripted round, plus one more round of checks for the last
    /// round's results. `config.num_rounds` is raised to fit if needed.
    pub fn run(&self, config: MarketConfig, seed: u64) -> Result<ScenarioReport, ScenarioError> {
        let mut run = ScenarioRun::new(self, config, seed)?;
        for round in 1..=self.last_round() + 1 {
            run.play_round(round)?;
        }
        Ok(run.finish())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    Group,
    Actor(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub round: RoundNumber,
    pub subject: Subject,
    pub field: &'static str,
    pub expected: FieldValue,
    pub actual: FieldValue,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subject {
            Subject::Group => write!(f, "Round {}: Testing {}", self.round, self.field)?,
            Subject::Actor(name) => write!(f, "Round {}: Actor {}: Testing {}", self.round, name, self.field)?,
        }
        write!(f, ": expected {}, got {}", self.expected, self.actual)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub round: RoundNumber,
    pub actor: String,
    pub order: ScriptedOrder,
    pub violations: Violations,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScenarioReport {
    pub mismatches: Vec<Mismatch>,
    pub rejected: Vec<Rejection>,
    pub outcomes: Vec<RoundOutcome>,
}

impl ScenarioReport {
    pub fn is_success(&self) -> bool {
        self.mismatches.is_empty() && self.rejected.is_empty()
    }

    pub fn outcome(&self, round: RoundNumber) -> Option<&RoundOutcome> {
        self.outcomes.iter().find(|o| o.round == round)
    }
}

/// State of one scenario run. Everything a round needs is held here and passed
/// along explicitly.
#[derive(Debug)]
pub struct ScenarioRun<'a> {
    scenario: &'a Scenario,
    engine: CallMarket<MemoryStore>,
    participants: BTreeMap<String, ParticipantId>,
    report: ScenarioReport,
}

impl<'a> ScenarioRun<'a> {
    pub fn new(scenario: &'a Scenario, mut config: MarketConfig, seed: u64) -> Result<Self, ScenarioError> {
        config.num_rounds = config.num_rounds.max(scenario.last_round() + 1);

        let participants: BTreeMap<String, ParticipantId> = scenario
            .actors()
            .into_iter()
            .zip(1..)
            .map(|(name, id)| (name, ParticipantId(id)))
            .collect();
        let ids: Vec<ParticipantId> = participants.values().copied().collect();
        let store = MemoryStore::seed(&config, SCENARIO_GROUP, &ids);
        let engine = CallMarket::new(config, EngineConfig::default(), store, seed)?;

        Ok(Self {
            scenario,
            engine,
            participants,
            report: ScenarioReport::default(),
        })
    }

    pub fn engine(&self) -> &CallMarket<MemoryStore> {
        &self.engine
    }

    pub fn participant(&self, actor: &str) -> Option<ParticipantId> {
        self.participants.get(actor).copied()
    }

    /// Checks the previous round's expectations, then sets up and clears `round`.
    /// Rounds past the last scripted one are only checked.
    pub fn play_round(&mut self, round: RoundNumber) -> Result<(), ScenarioError> {
        if round > 1 {
            self.check_expectations(round - 1)?;
        }
        if round > self.scenario.last_round() {
            return Ok(());
        }

        let scenario = self.scenario;
        let script = scenario.for_round(round);
        let actors = script.map(|s| s.actors.as_slice()).unwrap_or_default();

        for (name, actor) in actors {
            let participant = self.participant_for(name)?;
            if let Some((cash, shares)) = actor.opening {
                let row = self
                    .engine
                    .store_mut()
                    .player_mut(participant, round)
                    .ok_or(StoreError::MissingPlayer { participant, round })?;
                row.cash = cash;
                row.shares = shares;
            }
        }

        for (name, actor) in actors {
            let participant = self.participant_for(name)?;
            for order in &actor.orders {
                let raw = RawOrder::new(
                    order.order_type.code().to_string(),
                    order.price.to_string(),
                    order.quantity.to_string(),
                );
                match self.engine.submit_order(participant, round, &raw) {
                    Ok(_) => {}
                    Err(EngineError::Rejected(violations)) => {
                        warn!(target: "scenario", round, actor = %name, code = violations.code(), "order rejected");
                        self.report.rejected.push(Rejection {
                            round,
                            actor: name.clone(),
                            order: *order,
                            violations,
                        });
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let outcome = self.engine.clear_round(SCENARIO_GROUP, round)?;
        info!(
            target: "scenario",
            round,
            price = %outcome.price,
            volume = outcome.volume,
            "scripted round played"
        );
        self.report.outcomes.push(outcome);
        Ok(())
    }

    pub fn finish(self) -> ScenarioReport {
        self.report
    }

    fn participant_for(&self, name: &str) -> Result<ParticipantId, ScenarioError> {
        self.participant(name)
            .ok_or_else(|| ScenarioError::UnknownActor(name.to_string()))
    }

    fn check_expectations(&mut self, round: RoundNumber) -> Result<(), ScenarioError> {
        let scenario = self.scenario;
        let Some(script) = scenario.for_round(round) else {
            return Ok(());
        };

        if !script.group_expectations.is_empty() {
            let group_round = self
                .engine
                .group_round(SCENARIO_GROUP, round)
                .ok_or(StoreError::MissingGroupRound {
                    group: SCENARIO_GROUP,
                    round,
                })?;
            for &(field, expected) in &script.group_expectations {
                let actual = group_round.get(field);
                if actual != expected {
                    self.report.mismatches.push(Mismatch {
                        round,
                        subject: Subject::Group,
                        field: field.name(),
                        expected,
                        actual,
                    });
                }
            }
        }

        let carried_round = round + 1;
        for (name, actor) in &script.actors {
            if actor.expectations.is_empty() {
                continue;
            }
            let participant = self.participant_for(name)?;
            let summary = self
                .engine
                .player_summary(participant, carried_round)
                .ok_or(StoreError::MissingPlayer {
                    participant,
                    round: carried_round,
                })?;
            for &(field, expected) in &actor.expectations {
                let actual = summary.get(field);
                if actual != expected {
                    self.report.mismatches.push(Mismatch {
                        round,
                        subject: Subject::Actor(name.clone()),
                        field: field.name(),
                        expected,
                        actual,
                    });
                }
            }
        }

        Ok(())
    }
}

/// The reference session: an ordinary trade, a short squeezed by a buy-in, then a
/// debtor sold in.
pub fn scripted_market() -> Scenario {
    use GroupField::{Price, Volume};
    use SettlementField::{
        Cash, DividendEarned, InterestEarned, PeriodsUntilAutoBuy, PeriodsUntilAutoSell, Shares,
    };

    Scenario::new()
        .round(1, |r| {
            r.expect_group(Price, 500)
                .expect_group(Volume, 1)
                .actor("Buyer", |a| {
                    a.set(1000, 5)
                        .buy(1, 500)
                        .expect(Cash, 500)
                        .expect(Shares, 6)
                        .expect_unset(PeriodsUntilAutoBuy)
                })
                .actor("Seller", |a| {
                    a.set(1000, 5)
                        .sell(1, 500)
                        .expect(Cash, 1500)
                        .expect(Shares, 4)
                        .expect_unset(PeriodsUntilAutoBuy)
                })
                .actor("Treated", |a| {
                    a.set(2000, -2)
                        .expect(Cash, 2000)
                        .expect(Shares, -2)
                        .expect(PeriodsUntilAutoBuy, 0)
                })
        })
        .round(2, |r| {
            r.expect_group(Price, 500)
                .expect_group(Volume, 0)
                .actor("Buyer", |a| {
                    a.expect(Cash, 500).expect(Shares, 6).expect_unset(PeriodsUntilAutoBuy)
                })
                .actor("Seller", |a| {
                    a.expect(Cash, 1500)
                        .expect(Shares, 4)
                        .expect_unset(PeriodsUntilAutoBuy)
                        .expect_unset(InterestEarned)
                        .expect_unset(DividendEarned)
                })
                .actor("Treated", |a| {
                    a.expect(Cash, 2000).expect(Shares, -2).expect(PeriodsUntilAutoBuy, 0)
                })
        })
        .round(3, |r| {
            r.expect_group(Price, 550)
                .expect_group(Volume, 1)
                .actor("Buyer", |a| {
                    a.expect(Cash, 500).expect(Shares, 6).expect_unset(PeriodsUntilAutoBuy)
                })
                .actor("Seller", |a| {
                    a.sell(1, 500)
                        .expect(Cash, 2050)
                        .expect(Shares, 3)
                        .expect_unset(PeriodsUntilAutoBuy)
                })
                .actor("Treated", |a| {
                    a.expect(Cash, 1450).expect(Shares, -1).expect_unset(PeriodsUntilAutoBuy)
                })
        })
        .round(4, |r| {
            r.expect_group(Price, 500)
                .expect_group(Volume, 1)
                .actor("Buyer", |a| {
                    a.set(2000, 5)
                        .buy(1, 500)
                        .expect(Cash, 1500)
                        .expect(Shares, 6)
                        .expect_unset(PeriodsUntilAutoSell)
                })
                .actor("Seller", |a| {
                    a.set(1000, 5)
                        .sell(1, 500)
                        .expect(Cash, 1500)
                        .expect(Shares, 4)
                        .expect_unset(PeriodsUntilAutoSell)
                })
                .actor("Treated", |a| {
                    a.set(-1000, 4)
                        .expect(Cash, -1000)
                        .expect(Shares, 4)
                        .expect(PeriodsUntilAutoSell, 0)
                        .expect_unset(PeriodsUntilAutoBuy)
                })
        })
        .round(5, |r| {
            r.expect_group(Price, 500)
                .expect_group(Volume, 0)
                .actor("Buyer", |a| {
                    a.expect(Cash, 1500).expect(Shares, 6).expect_unset(PeriodsUntilAutoBuy)
                })
                .actor("Seller", |a| {
                    a.expect(Cash, 1500).expect(Shares, 4).expect_unset(PeriodsUntilAutoBuy)
                })
                .actor("Treated", |a| {
                    a.expect(Cash, -1000).expect(Shares, 4).expect(PeriodsUntilAutoSell, 0)
                })
        })
        .round(6, |r| {
            r.expect_group(Price, 450)
                .expect_group(Volume, 2)
                .actor("Buyer", |a| {
                    a.buy(4, 450)
                        .expect(Cash, 600)
                        .expect(Shares, 8)
                        .expect_unset(PeriodsUntilAutoSell)
                })
                .actor("Seller", |a| {
                    a.expect(Cash, 1500).expect(Shares, 4).expect_unset(PeriodsUntilAutoSell)
                })
                .actor("Treated", |a| {
                    a.expect(Cash, -100).expect(Shares, 2).expect_unset(PeriodsUntilAutoSell)
                })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actors_in_first_mention_order() {
        let scenario = Scenario::new()
            .round(2, |r| r.actor("Late", |a| a))
            .round(1, |r| r.actor("B", |a| a).actor("A", |a| a));
        assert_eq!(scenario.actors(), vec!["B", "A", "Late"]);
        assert_eq!(scenario.last_round(), 2);
    }

    #[test]
    fn actor_script_collects_orders() {
        let script = ActorScript::default().buy(2, 10).sell(1, 12);
        assert_eq!(script.orders().len(), 2);
        assert_eq!(script.orders()[0].order_type, OrderType::Bid);
        assert_eq!(script.orders()[1].price, 12);
    }

    #[test]
    fn wrong_expectation_is_reported() {
        let scenario = Scenario::new().round(1, |r| {
            r.expect_group(GroupField::Price, 999)
                .actor("Solo", |a| a.set(1000, 5).expect(SettlementField::Cash, 1))
        });
        let report = scenario.run(MarketConfig::scripted(), 0).unwrap();
        assert_eq!(report.mismatches.len(), 2);
        assert_eq!(report.mismatches[0].subject, Subject::Group);
        assert_eq!(
            report.mismatches[1].to_string(),
            "Round 1: Actor Solo: Testing cash: expected 1, got 1000"
        );
    }

    #[test]
    fn rejected_orders_are_recorded() {
        let scenario = Scenario::new().round(1, |r| {
            r.actor("Solo", |a| a.sell(1, 500).buy(1, 600))
        });
        let report = scenario.run(MarketConfig::scripted(), 0).unwrap();
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].violations.code(), 32);
        assert!(!report.is_success());
    }

    #[test]
    fn rounds_are_added_for_the_final_check() {
        let scenario = Scenario::new().round(9, |r| r.expect_group(GroupField::Volume, 0));
        let report = scenario.run(MarketConfig::scripted(), 0).unwrap();
        assert!(report.mismatches.is_empty());
        assert_eq!(report.outcomes.len(), 9);
        assert!(report.outcome(9).is_some());
    }
}
