//! In-process store.
//!
//! Holds everything behind one async mutex, so each call is a single atomic
//! check-and-write just like a Postgres transaction.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

use super::repository::{StoredBracket, TournamentStore};
use crate::bracket::{Bracket, Seed};
use crate::errors::{TournamentError, TournamentResult};
use crate::registration::{Couple, CoupleId, Entrant, EntrantId, Player, PlayerId, normalize_pair};
use crate::tournament::{NewTournament, Tournament, TournamentId, TournamentStatus};
use crate::zone::{Zone, ZoneDraft, ZoneId, ZoneMatch, ZoneMatchId, ZoneMatchStatus};

#[derive(Default)]
struct State {
    sequence: i64,
    tournaments: BTreeMap<TournamentId, Tournament>,
    players: HashMap<PlayerId, Player>,
    couples: BTreeMap<CoupleId, Couple>,
    couple_pairs: HashMap<(PlayerId, PlayerId), CoupleId>,
    entrants: BTreeMap<EntrantId, Entrant>,
    zones: BTreeMap<ZoneId, Zone>,
    zone_matches: BTreeMap<ZoneMatchId, ZoneMatch>,
    seeds: HashMap<TournamentId, Vec<Seed>>,
    brackets: HashMap<TournamentId, StoredBracket>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.sequence += 1;
        self.sequence
    }

    fn tournament(&self, id: TournamentId) -> TournamentResult<&Tournament> {
        self.tournaments
            .get(&id)
            .ok_or(TournamentError::TournamentNotFound(id))
    }

    fn tournament_mut(&mut self, id: TournamentId) -> TournamentResult<&mut Tournament> {
        self.tournaments
            .get_mut(&id)
            .ok_or(TournamentError::TournamentNotFound(id))
    }

    fn active_entrants(&self, tournament_id: TournamentId) -> impl Iterator<Item = &Entrant> {
        self.entrants
            .values()
            .filter(move |e| e.tournament_id == tournament_id && e.active)
    }

    fn set_status(&mut self, id: TournamentId, status: TournamentStatus) -> TournamentResult<()> {
        let tournament = self.tournament_mut(id)?;
        if tournament.status != status {
            log::debug!("Tournament {} {} -> {}", id, tournament.status, status);
        }
        tournament.status = status;
        tournament.updated_at = Utc::now();
        Ok(())
    }
}

/// Store keeping all state in memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TournamentStore for MemoryStore {
    async fn create_tournament(&self, new: &NewTournament) -> TournamentResult<Tournament> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let now = Utc::now();
        let tournament = Tournament {
            id: state.next_id(),
            name: new.name.clone(),
            club_id: new.club_id,
            format: new.format,
            category: new.category,
            status: TournamentStatus::NotStarted,
            config: new.config.clone(),
            zone_stage_started_at: None,
            created_at: now,
            updated_at: now,
        };
        state.tournaments.insert(tournament.id, tournament.clone());
        Ok(tournament)
    }

    async fn get_tournament(&self, id: TournamentId) -> TournamentResult<Option<Tournament>> {
        Ok(self.state.lock().await.tournaments.get(&id).cloned())
    }

    async fn transition_tournament(
        &self,
        id: TournamentId,
        from: &[TournamentStatus],
        to: TournamentStatus,
        action: &'static str,
    ) -> TournamentResult<Tournament> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let tournament = state.tournament(id)?;
        if !from.contains(&tournament.status) {
            return Err(tournament.state_error(action));
        }
        state.set_status(id, to)?;
        state.tournament(id).cloned()
    }

    async fn cancel_tournament(&self, id: TournamentId) -> TournamentResult<Tournament> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let tournament = state.tournament(id)?;
        if tournament.status.is_terminal() {
            return Err(tournament.state_error("cancel the tournament"));
        }
        state.set_status(id, TournamentStatus::Canceled)?;

        for entrant in state.entrants.values_mut() {
            if entrant.tournament_id == id {
                entrant.active = false;
            }
        }

        state.tournament(id).cloned()
    }

    async fn upsert_player(&self, player: &Player) -> TournamentResult<Player> {
        let mut guard = self.state.lock().await;
        guard.players.insert(player.id, player.clone());
        Ok(player.clone())
    }

    async fn get_player(&self, id: PlayerId) -> TournamentResult<Option<Player>> {
        Ok(self.state.lock().await.players.get(&id).cloned())
    }

    async fn find_or_create_couple(
        &self,
        a: PlayerId,
        b: PlayerId,
    ) -> TournamentResult<Couple> {
        if a == b {
            return Err(TournamentError::SamePlayer(a));
        }

        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        for player in [a, b] {
            if !state.players.contains_key(&player) {
                return Err(TournamentError::PlayerNotFound(player));
            }
        }

        let pair = normalize_pair(a, b);
        if let Some(couple) = state
            .couple_pairs
            .get(&pair)
            .and_then(|id| state.couples.get(id))
        {
            return Ok(couple.clone());
        }

        let couple = Couple {
            id: state.next_id(),
            player_low: pair.0,
            player_high: pair.1,
            created_at: Utc::now(),
        };
        state.couple_pairs.insert(pair, couple.id);
        state.couples.insert(couple.id, couple.clone());
        Ok(couple)
    }

    async fn insert_entrant(
        &self,
        tournament_id: TournamentId,
        couple: &Couple,
    ) -> TournamentResult<Entrant> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let tournament = state.tournament(tournament_id)?;
        tournament.ensure_registration_open("register a couple")?;
        let max_entrants = tournament.config.max_entrants;

        let players = couple.players();
        let mut active = 0;
        for entrant in state.active_entrants(tournament_id) {
            if entrant.couple_id == couple.id {
                return Err(TournamentError::CoupleAlreadyEntered {
                    tournament_id,
                    couple_id: couple.id,
                });
            }
            if let Some(player_id) = entrant.shares_player_with(&players) {
                return Err(TournamentError::PlayerAlreadyEntered {
                    tournament_id,
                    player_id,
                });
            }
            active += 1;
        }

        if active >= max_entrants {
            return Err(TournamentError::TournamentFull(tournament_id));
        }

        let entrant = Entrant {
            id: state.next_id(),
            tournament_id,
            couple_id: couple.id,
            players,
            zone_id: None,
            active: true,
            registered_at: Utc::now(),
        };
        state.entrants.insert(entrant.id, entrant.clone());
        Ok(entrant)
    }

    async fn withdraw_entrant(
        &self,
        tournament_id: TournamentId,
        entrant_id: EntrantId,
    ) -> TournamentResult<Entrant> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        state
            .tournament(tournament_id)?
            .ensure_registration_open("withdraw an entrant")?;

        match state.entrants.get_mut(&entrant_id) {
            Some(entrant) if entrant.tournament_id == tournament_id && entrant.active => {
                entrant.active = false;
                Ok(entrant.clone())
            }
            _ => Err(TournamentError::EntrantNotFound {
                tournament_id,
                entrant_id,
            }),
        }
    }

    async fn list_entrants(&self, tournament_id: TournamentId) -> TournamentResult<Vec<Entrant>> {
        let guard = self.state.lock().await;
        Ok(guard.active_entrants(tournament_id).cloned().collect())
    }

    async fn start_zone_stage(
        &self,
        tournament_id: TournamentId,
        drafts: &[ZoneDraft],
        status_after: TournamentStatus,
    ) -> TournamentResult<Vec<Zone>> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        state
            .tournament(tournament_id)?
            .ensure_zone_stage_startable()?;

        let active: Vec<EntrantId> = state.active_entrants(tournament_id).map(|e| e.id).collect();
        let mut drawn: Vec<EntrantId> = drafts
            .iter()
            .flat_map(|d| d.entrant_ids.iter().copied())
            .collect();
        drawn.sort_unstable();
        if drawn != active {
            return Err(TournamentError::ConcurrentModification(format!(
                "entrant list of tournament {tournament_id}"
            )));
        }

        let now = Utc::now();
        let mut zones = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let zone = Zone {
                id: state.next_id(),
                tournament_id,
                name: draft.name.clone(),
                entrant_ids: draft.entrant_ids.clone(),
                created_at: now,
            };

            for entrant_id in &zone.entrant_ids {
                if let Some(entrant) = state.entrants.get_mut(entrant_id) {
                    entrant.zone_id = Some(zone.id);
                }
            }

            for fixture in &draft.fixtures {
                let m = ZoneMatch {
                    id: state.next_id(),
                    zone_id: zone.id,
                    tournament_id,
                    round: fixture.round,
                    entrant_a: fixture.entrant_a,
                    entrant_b: fixture.entrant_b,
                    status: ZoneMatchStatus::Pending,
                    score: None,
                    version: 1,
                    created_at: now,
                    updated_at: now,
                };
                state.zone_matches.insert(m.id, m);
            }

            state.zones.insert(zone.id, zone.clone());
            zones.push(zone);
        }

        state.tournament_mut(tournament_id)?.zone_stage_started_at = Some(now);
        state.set_status(tournament_id, status_after)?;
        Ok(zones)
    }

    async fn list_zones(&self, tournament_id: TournamentId) -> TournamentResult<Vec<Zone>> {
        let guard = self.state.lock().await;
        Ok(guard
            .zones
            .values()
            .filter(|z| z.tournament_id == tournament_id)
            .cloned()
            .collect())
    }

    async fn get_zone(&self, zone_id: ZoneId) -> TournamentResult<Option<Zone>> {
        Ok(self.state.lock().await.zones.get(&zone_id).cloned())
    }

    async fn list_zone_matches(&self, zone_id: ZoneId) -> TournamentResult<Vec<ZoneMatch>> {
        let guard = self.state.lock().await;
        let mut matches: Vec<ZoneMatch> = guard
            .zone_matches
            .values()
            .filter(|m| m.zone_id == zone_id)
            .cloned()
            .collect();
        matches.sort_by_key(|m| (m.round, m.id));
        Ok(matches)
    }

    async fn list_tournament_zone_matches(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Vec<ZoneMatch>> {
        let guard = self.state.lock().await;
        Ok(guard
            .zone_matches
            .values()
            .filter(|m| m.tournament_id == tournament_id)
            .cloned()
            .collect())
    }

    async fn get_zone_match(&self, id: ZoneMatchId) -> TournamentResult<Option<ZoneMatch>> {
        Ok(self.state.lock().await.zone_matches.get(&id).cloned())
    }

    async fn save_zone_match(&self, m: &ZoneMatch) -> TournamentResult<ZoneMatch> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let tournament_id = state
            .zone_matches
            .get(&m.id)
            .map(|stored| stored.tournament_id)
            .ok_or(TournamentError::ZoneMatchNotFound(m.id))?;

        let bracket_exists = state.brackets.contains_key(&tournament_id);
        state
            .tournament(tournament_id)?
            .ensure_zone_results_open(m.id, bracket_exists)?;

        let stored = state
            .zone_matches
            .get_mut(&m.id)
            .ok_or(TournamentError::ZoneMatchNotFound(m.id))?;
        if stored.version != m.version {
            return Err(TournamentError::ConcurrentModification(format!(
                "zone match {}",
                m.id
            )));
        }

        stored.status = m.status;
        stored.score = m.score;
        stored.version += 1;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn insert_bracket(
        &self,
        tournament_id: TournamentId,
        zone_versions: &[(ZoneMatchId, i64)],
        seeds: &[Seed],
        bracket: &Bracket,
        status_after: TournamentStatus,
    ) -> TournamentResult<i64> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let matches: Vec<&ZoneMatch> = state
            .zone_matches
            .values()
            .filter(|m| m.tournament_id == tournament_id)
            .collect();
        let pending = matches.iter().filter(|m| !m.is_finished()).count();
        let bracket_exists = state.brackets.contains_key(&tournament_id);
        state
            .tournament(tournament_id)?
            .ensure_bracket_buildable(bracket_exists, pending)?;

        let stored: Vec<(ZoneMatchId, i64)> = matches.iter().map(|m| (m.id, m.version)).collect();
        if stored != zone_versions {
            return Err(TournamentError::ConcurrentModification(format!(
                "zone results of tournament {tournament_id}"
            )));
        }

        state.seeds.insert(tournament_id, seeds.to_vec());
        state.brackets.insert(
            tournament_id,
            StoredBracket {
                bracket: bracket.clone(),
                version: 1,
            },
        );
        state.set_status(tournament_id, status_after)?;
        Ok(1)
    }

    async fn load_bracket(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Option<StoredBracket>> {
        Ok(self.state.lock().await.brackets.get(&tournament_id).cloned())
    }

    async fn save_bracket(
        &self,
        tournament_id: TournamentId,
        bracket: &Bracket,
        expected_version: i64,
        status_after: Option<TournamentStatus>,
    ) -> TournamentResult<i64> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        state
            .tournament(tournament_id)?
            .ensure_status(TournamentStatus::InProgress, "update the bracket")?;

        let stored = state
            .brackets
            .get_mut(&tournament_id)
            .ok_or(TournamentError::BracketNotFound(tournament_id))?;
        if stored.version != expected_version {
            return Err(TournamentError::ConcurrentModification(format!(
                "bracket of tournament {tournament_id}"
            )));
        }

        stored.bracket = bracket.clone();
        stored.version += 1;
        let version = stored.version;

        if let Some(status) = status_after {
            state.set_status(tournament_id, status)?;
        }
        Ok(version)
    }

    async fn list_seeds(&self, tournament_id: TournamentId) -> TournamentResult<Vec<Seed>> {
        Ok(self
            .state
            .lock()
            .await
            .seeds
            .get(&tournament_id)
            .cloned()
            .unwrap_or_default())
    }
}
