// 8.0 engine/core.rs: main engine. owns the market config, the round store, the
// dividend rng and the audit log.

use super::config::EngineConfig;
use super::results::EngineError;
use crate::config::MarketConfig;
use crate::events::{Event, EventId, EventPayload};
use crate::store::{GroupRound, MemoryStore, PlayerRound, RoundStore, StoreError};
use crate::summary::PlayerSummary;
use crate::types::{GroupId, ParticipantId, RoundNumber};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

/** 8.1: main engine struct. round state lives in the store, everything else here */
#[derive(Debug)]
pub struct CallMarket<S: RoundStore = MemoryStore> {
    pub(super) config: MarketConfig,
    pub(super) engine_config: EngineConfig,
    pub(super) store: S,
    pub(super) rng: StdRng,
    pub(super) events: Vec<Event>,
    pub(super) next_event_id: u64,
}

impl<S: RoundStore> CallMarket<S> {
    /// `seed` drives the dividend draws so a session can be replayed.
    pub fn new(
        config: MarketConfig,
        engine_config: EngineConfig,
        store: S,
        seed: u64,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            engine_config,
            store,
            rng: StdRng::seed_from_u64(seed),
            events: Vec::new(),
            next_event_id: 1,
        })
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn player(&self, participant: ParticipantId, round: RoundNumber) -> Option<&PlayerRound> {
        self.store.player(participant, round)
    }

    pub fn group_round(&self, group: GroupId, round: RoundNumber) -> Option<&GroupRound> {
        self.store.group_round(group, round)
    }

    pub fn player_summary(&self, participant: ParticipantId, round: RoundNumber) -> Option<PlayerSummary> {
        self.store.player(participant, round).map(PlayerRound::to_summary)
    }

    /// Writes an externally edited summary back onto the participant's row.
    pub fn apply_player_summary(
        &mut self,
        participant: ParticipantId,
        round: RoundNumber,
        summary: &PlayerSummary,
    ) -> Result<(), EngineError> {
        let player = self
            .store
            .player_mut(participant, round)
            .ok_or(StoreError::MissingPlayer { participant, round })?;
        player.apply_summary(summary);
        Ok(())
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(super) fn check_round(&self, round: RoundNumber) -> Result<(), EngineError> {
        if round == 0 || round > self.config.num_rounds {
            return Err(EngineError::RoundOutOfRange {
                round,
                num_rounds: self.config.num_rounds,
            });
        }
        Ok(())
    }

    pub(super) fn participants_of(&self, group: GroupId) -> Result<Vec<ParticipantId>, EngineError> {
        let participants = self.store.participants(group);
        if participants.is_empty() {
            return Err(EngineError::UnknownGroup(group));
        }
        Ok(participants)
    }

    pub(super) fn emit_event(&mut self, group: GroupId, round: RoundNumber, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), group, round, payload);
        self.next_event_id += 1;

        debug!(target: "events", id = event.id.0, group = group.0, round, payload = ?event.payload);

        self.events.push(event);

        if self.events.len() > self.engine_config.max_events {
            let drain_count = self.events.len() - self.engine_config.max_events;
            self.events.drain(0..drain_count);
        }
    }
}
