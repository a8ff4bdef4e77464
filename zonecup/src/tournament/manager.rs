//! Tournament manager: command and query surface of the engine.

use std::sync::Arc;

use super::models::{NewTournament, Tournament, TournamentFormat, TournamentId, TournamentStatus};
use crate::bracket::{self, Bracket, BracketView, MatchSlot, MatchStatus, Seed, ZoneRanking};
use crate::db::{StoredBracket, TournamentStore};
use crate::errors::{TournamentError, TournamentResult};
use crate::registration::{Entrant, EntrantId, Player, PlayerId, RegistrationGuard};
use crate::zone::{
    self, DrawEntrant, Standing, Zone, ZoneId, ZoneMatch, ZoneMatchId, ZoneStandingsCalculator,
    standings_for,
};

/// What a completed zone stage led to
#[derive(Debug, Clone)]
pub enum StageAdvance {
    /// The bracket was seeded and built; a single entrant is already champion
    BracketBuilt(BracketView),
    /// The round-robin league finished
    LeagueFinished,
}

/// Zones drawn by [`TournamentManager::start_zone_stage`]
#[derive(Debug, Clone)]
pub struct ZoneStageStarted {
    pub zones: Vec<Zone>,
    /// Set when the draw had no matches to play
    pub advance: Option<StageAdvance>,
}

/// Saved match from [`TournamentManager::record_zone_match_result`]
#[derive(Debug, Clone)]
pub struct ZoneResultRecorded {
    pub zone_match: ZoneMatch,
    /// Set when this result completed the zone stage
    pub advance: Option<StageAdvance>,
}

/// Tournament manager
#[derive(Clone)]
pub struct TournamentManager {
    store: Arc<dyn TournamentStore>,
    registration: RegistrationGuard,
    standings: ZoneStandingsCalculator,
}

impl TournamentManager {
    /// Create a new tournament manager
    pub fn new(store: Arc<dyn TournamentStore>) -> Self {
        Self {
            registration: RegistrationGuard::new(store.clone()),
            standings: ZoneStandingsCalculator::new(store.clone()),
            store,
        }
    }

    async fn load_tournament(&self, id: TournamentId) -> TournamentResult<Tournament> {
        self.store
            .get_tournament(id)
            .await?
            .ok_or(TournamentError::TournamentNotFound(id))
    }

    // ---- setup ------------------------------------------------------------

    /// Create a tournament in `NotStarted`
    ///
    /// # Errors
    ///
    /// * `InvalidInput` - Blank name
    /// * `InvalidConfig` - Configuration rejected for the format
    pub async fn create_tournament(&self, new: NewTournament) -> TournamentResult<Tournament> {
        let name = new.name.trim().to_string();
        if name.is_empty() {
            return Err(TournamentError::InvalidInput(
                "tournament name must not be empty".to_string(),
            ));
        }
        new.config.validate(new.format)?;

        let tournament = self
            .store
            .create_tournament(&NewTournament { name, ..new })
            .await?;

        log::info!(
            "Created tournament {} '{}' ({}, club {})",
            tournament.id,
            tournament.name,
            tournament.format,
            tournament.club_id
        );

        Ok(tournament)
    }

    /// Open registration: `NotStarted → Pairing`
    pub async fn open_registration(&self, id: TournamentId) -> TournamentResult<Tournament> {
        let tournament = self
            .store
            .transition_tournament(
                id,
                &[TournamentStatus::NotStarted],
                TournamentStatus::Pairing,
                "open registration",
            )
            .await?;

        log::info!("Tournament {} opened registration", id);
        Ok(tournament)
    }

    /// Insert or refresh a roster player
    pub async fn upsert_player(&self, player: Player) -> TournamentResult<Player> {
        if player.display_name.trim().is_empty() {
            return Err(TournamentError::InvalidInput(
                "player display name must not be empty".to_string(),
            ));
        }
        self.store.upsert_player(&player).await
    }

    // ---- registration -----------------------------------------------------

    pub async fn register_couple(
        &self,
        tournament_id: TournamentId,
        player_a: PlayerId,
        player_b: PlayerId,
    ) -> TournamentResult<Entrant> {
        self.registration
            .register_couple(tournament_id, player_a, player_b)
            .await
    }

    pub async fn withdraw_entrant(
        &self,
        tournament_id: TournamentId,
        entrant_id: EntrantId,
    ) -> TournamentResult<Entrant> {
        self.registration
            .withdraw_entrant(tournament_id, entrant_id)
            .await
    }

    // ---- zone stage -------------------------------------------------------

    /// Close registration, draw the zones and schedule their round robins
    ///
    /// Zone-then-bracket tournaments stay in `Pairing` until the bracket is
    /// built; round-robin-only tournaments move to `InProgress`. A draw with
    /// no matches to play completes the zone stage immediately.
    ///
    /// # Errors
    ///
    /// * `InvalidState` / `ZoneStageAlreadyStarted` - Not in a startable state
    /// * `InsufficientEntrants` - Fewer active entrants than `min_entrants`
    /// * `TooManyEntrants` - More active entrants than `max_entrants`
    /// * `ConcurrentModification` - The field changed while drawing
    pub async fn start_zone_stage(&self, id: TournamentId) -> TournamentResult<ZoneStageStarted> {
        let tournament = self.load_tournament(id).await?;
        tournament.ensure_zone_stage_startable()?;

        let config = &tournament.config;
        let entrants = self.store.list_entrants(id).await?;
        if entrants.len() < config.min_entrants {
            return Err(TournamentError::InsufficientEntrants {
                needed: config.min_entrants,
                current: entrants.len(),
            });
        }
        if entrants.len() > config.max_entrants {
            return Err(TournamentError::TooManyEntrants {
                max: config.max_entrants,
                current: entrants.len(),
            });
        }

        let (drafts, status_after) = match tournament.format {
            TournamentFormat::ZoneThenBracket => {
                let mut field = Vec::with_capacity(entrants.len());
                for entrant in &entrants {
                    field.push(DrawEntrant {
                        entrant_id: entrant.id,
                        strength: self.couple_strength(entrant).await?,
                    });
                }
                (
                    zone::draw_zones(&field, config.zone_size),
                    TournamentStatus::Pairing,
                )
            }
            TournamentFormat::RoundRobinOnly => {
                let ids: Vec<EntrantId> = entrants.iter().map(|e| e.id).collect();
                (vec![zone::league(&ids)], TournamentStatus::InProgress)
            }
        };

        let zones = self.store.start_zone_stage(id, &drafts, status_after).await?;
        let fixtures: usize = drafts.iter().map(|d| d.fixtures.len()).sum();

        log::info!(
            "Tournament {} zone stage started: {} entrants in {} zone(s), {} match(es)",
            id,
            entrants.len(),
            zones.len(),
            fixtures
        );

        let advance = if fixtures == 0 {
            self.advance_after_zone_stage(id).await
        } else {
            None
        };

        Ok(ZoneStageStarted { zones, advance })
    }

    async fn couple_strength(&self, entrant: &Entrant) -> TournamentResult<i64> {
        let mut strength = 0;
        for player_id in entrant.players {
            let player = self
                .store
                .get_player(player_id)
                .await?
                .ok_or(TournamentError::PlayerNotFound(player_id))?;
            strength += player.ranking;
        }
        Ok(strength)
    }

    /// Record or correct a zone match score
    ///
    /// Ties are allowed. Corrections are accepted until the bracket is built.
    /// When the last pending zone match finishes, the bracket is built (or the
    /// league is finished) automatically.
    ///
    /// # Errors
    ///
    /// * `InvalidInput` - Score too large to store
    /// * `ZoneMatchNotFound` - Unknown match
    /// * `ZoneResultsLocked` - The bracket already exists
    /// * `ConcurrentModification` - Another writer saved the match first
    pub async fn record_zone_match_result(
        &self,
        match_id: ZoneMatchId,
        score_a: u32,
        score_b: u32,
    ) -> TournamentResult<ZoneResultRecorded> {
        let mut m = self
            .store
            .get_zone_match(match_id)
            .await?
            .ok_or(TournamentError::ZoneMatchNotFound(match_id))?;

        let correction = m.is_finished();
        m.record(score_a, score_b)?;
        let saved = self.store.save_zone_match(&m).await?;

        if correction {
            log::info!("Zone match {} corrected to {}-{}", match_id, score_a, score_b);
        } else {
            log::info!("Zone match {} finished {}-{}", match_id, score_a, score_b);
        }

        let pending = self
            .store
            .list_tournament_zone_matches(saved.tournament_id)
            .await?
            .iter()
            .filter(|m| !m.is_finished())
            .count();

        let advance = if pending == 0 {
            self.advance_after_zone_stage(saved.tournament_id).await
        } else {
            None
        };

        Ok(ZoneResultRecorded {
            zone_match: saved,
            advance,
        })
    }

    /// Move past a completed zone stage.
    ///
    /// The triggering write is already stored, so failures are logged rather
    /// than returned; `build_bracket` can be called again explicitly.
    async fn advance_after_zone_stage(&self, id: TournamentId) -> Option<StageAdvance> {
        match self.complete_zone_stage(id).await {
            Ok(advance) => advance,
            Err(e) => {
                log::warn!(
                    "Tournament {} finished its zone stage but could not advance: {}",
                    id,
                    e
                );
                None
            }
        }
    }

    /// `None` when a concurrent writer already advanced the tournament
    async fn complete_zone_stage(
        &self,
        id: TournamentId,
    ) -> TournamentResult<Option<StageAdvance>> {
        let tournament = self.load_tournament(id).await?;

        match tournament.format {
            TournamentFormat::ZoneThenBracket => match self.build_bracket(id).await {
                Ok(view) => Ok(Some(StageAdvance::BracketBuilt(view))),
                Err(TournamentError::BracketAlreadyBuilt(_)) => {
                    log::debug!("Tournament {} bracket built by a concurrent writer", id);
                    Ok(None)
                }
                Err(e) => Err(e),
            },
            TournamentFormat::RoundRobinOnly => {
                let result = self
                    .store
                    .transition_tournament(
                        id,
                        &[TournamentStatus::InProgress],
                        TournamentStatus::Finished,
                        "finish the league",
                    )
                    .await;

                match result {
                    Ok(_) => {
                        log::info!("Tournament {} league finished", id);
                        Ok(Some(StageAdvance::LeagueFinished))
                    }
                    Err(TournamentError::InvalidState {
                        actual: TournamentStatus::Finished,
                        ..
                    }) => Ok(None),
                    Err(e) => Err(e),
                }
            }
        }
    }

    // ---- bracket ----------------------------------------------------------

    /// Seed and build the bracket from final zone standings
    ///
    /// A single entrant is crowned immediately and the tournament finishes;
    /// otherwise the tournament moves to `InProgress`.
    ///
    /// # Errors
    ///
    /// * `UnsupportedFormat` - Round-robin-only tournament
    /// * `ZoneStageNotStarted` / `ZoneStageIncomplete` - Zone play not done
    /// * `BracketAlreadyBuilt` - Built before (including concurrently)
    /// * `ConcurrentModification` - A zone result changed while seeding
    pub async fn build_bracket(&self, id: TournamentId) -> TournamentResult<BracketView> {
        let tournament = self.load_tournament(id).await?;
        let mut matches = self.store.list_tournament_zone_matches(id).await?;
        matches.sort_by_key(|m| m.id);
        let pending = matches.iter().filter(|m| !m.is_finished()).count();
        let exists = self.store.load_bracket(id).await?.is_some();
        tournament.ensure_bracket_buildable(exists, pending)?;

        let rankings: Vec<ZoneRanking> = self
            .store
            .list_zones(id)
            .await?
            .into_iter()
            .map(|zone| {
                let played: Vec<ZoneMatch> = matches
                    .iter()
                    .filter(|m| m.zone_id == zone.id)
                    .cloned()
                    .collect();
                ZoneRanking {
                    standings: standings_for(
                        &zone.entrant_ids,
                        &played,
                        &tournament.config.scoring,
                    ),
                    zone_name: zone.name,
                }
            })
            .collect();

        let plan = bracket::seed(&rankings)?;
        let built = bracket::build(&plan.seeds, plan.bracket_size)?;

        let status_after = if built.is_complete() {
            TournamentStatus::Finished
        } else {
            TournamentStatus::InProgress
        };
        // The store refuses the bracket if any result changed since this read
        let zone_versions: Vec<(ZoneMatchId, i64)> =
            matches.iter().map(|m| (m.id, m.version)).collect();
        let version = self
            .store
            .insert_bracket(id, &zone_versions, &plan.seeds, &built, status_after)
            .await?;

        log::info!(
            "Tournament {} bracket built: {} entrants, size {}, {} bye(s)",
            id,
            plan.seeds.len(),
            plan.bracket_size,
            plan.byes
        );
        if let Some(champion) = built.champion() {
            log::info!("Tournament {} finished, champion entrant {}", id, champion);
        }

        Ok(built.view(version))
    }

    /// Load the bracket, apply one transition and save it under the version
    /// it was loaded with. Finishes the tournament once a champion exists.
    async fn mutate_bracket<T, F>(
        &self,
        id: TournamentId,
        action: &'static str,
        apply: F,
    ) -> TournamentResult<(T, BracketView)>
    where
        T: Send,
        F: FnOnce(&mut Bracket) -> TournamentResult<T> + Send,
    {
        self.load_tournament(id)
            .await?
            .ensure_status(TournamentStatus::InProgress, action)?;

        let StoredBracket {
            mut bracket,
            version,
        } = self
            .store
            .load_bracket(id)
            .await?
            .ok_or(TournamentError::BracketNotFound(id))?;

        let outcome = apply(&mut bracket)?;

        let status_after = bracket
            .is_complete()
            .then_some(TournamentStatus::Finished);
        let version = self
            .store
            .save_bracket(id, &bracket, version, status_after)
            .await?;

        if let Some(champion) = status_after.and(bracket.champion()) {
            log::info!("Tournament {} finished, champion entrant {}", id, champion);
        }

        Ok((outcome, bracket.view(version)))
    }

    /// Put a bracket match on court
    pub async fn start_bracket_match(
        &self,
        id: TournamentId,
        slot: MatchSlot,
        court: &str,
    ) -> TournamentResult<BracketView> {
        let ((), view) = self
            .mutate_bracket(id, "start a bracket match", |b| b.start(slot, court))
            .await?;
        Ok(view)
    }

    /// Record the score of a match in play and advance its winner
    pub async fn record_bracket_match_result(
        &self,
        id: TournamentId,
        slot: MatchSlot,
        score_a: u32,
        score_b: u32,
    ) -> TournamentResult<BracketView> {
        let (_, view) = self
            .mutate_bracket(id, "record a bracket result", |b| {
                b.record_result(slot, score_a, score_b)
            })
            .await?;
        Ok(view)
    }

    /// Correct the score of a finished match
    pub async fn correct_bracket_match_result(
        &self,
        id: TournamentId,
        slot: MatchSlot,
        score_a: u32,
        score_b: u32,
    ) -> TournamentResult<BracketView> {
        let (_, view) = self
            .mutate_bracket(id, "correct a bracket result", |b| {
                b.correct_result(slot, score_a, score_b)
            })
            .await?;
        Ok(view)
    }

    pub async fn cancel_match(
        &self,
        id: TournamentId,
        slot: MatchSlot,
    ) -> TournamentResult<BracketView> {
        let ((), view) = self
            .mutate_bracket(id, "cancel a bracket match", |b| b.cancel(slot))
            .await?;
        Ok(view)
    }

    /// Administrative undo of a cancellation or a result
    pub async fn reactivate_match(
        &self,
        id: TournamentId,
        slot: MatchSlot,
    ) -> TournamentResult<BracketView> {
        let (status, view) = self
            .mutate_bracket(id, "reactivate a bracket match", |b| b.reactivate(slot))
            .await?;

        if status == MatchStatus::InProgress {
            log::warn!(
                "Tournament {} match {} result cleared by reactivation",
                id,
                slot
            );
        }
        Ok(view)
    }

    // ---- cancellation -----------------------------------------------------

    /// Cancel a tournament that has not finished; deactivates every entrant
    pub async fn cancel_tournament(&self, id: TournamentId) -> TournamentResult<Tournament> {
        let tournament = self.store.cancel_tournament(id).await?;
        log::info!("Tournament {} canceled", id);
        Ok(tournament)
    }

    // ---- queries ----------------------------------------------------------

    pub async fn get_tournament(&self, id: TournamentId) -> TournamentResult<Tournament> {
        self.load_tournament(id).await
    }

    /// Active entrants in registration order
    pub async fn list_entrants(&self, id: TournamentId) -> TournamentResult<Vec<Entrant>> {
        self.load_tournament(id).await?;
        self.store.list_entrants(id).await
    }

    pub async fn list_zones(&self, id: TournamentId) -> TournamentResult<Vec<Zone>> {
        self.load_tournament(id).await?;
        self.store.list_zones(id).await
    }

    pub async fn list_zone_matches(&self, zone_id: ZoneId) -> TournamentResult<Vec<ZoneMatch>> {
        if self.store.get_zone(zone_id).await?.is_none() {
            return Err(TournamentError::ZoneNotFound(zone_id));
        }
        self.store.list_zone_matches(zone_id).await
    }

    pub async fn get_standings(&self, zone_id: ZoneId) -> TournamentResult<Vec<Standing>> {
        self.standings.compute_standings(zone_id).await
    }

    /// Seeds in seed order; empty until the bracket is built
    pub async fn get_seeds(&self, id: TournamentId) -> TournamentResult<Vec<Seed>> {
        self.load_tournament(id).await?;
        self.store.list_seeds(id).await
    }

    /// Full round and match tree of the bracket
    pub async fn get_bracket(&self, id: TournamentId) -> TournamentResult<BracketView> {
        self.load_tournament(id).await?;
        let stored = self
            .store
            .load_bracket(id)
            .await?
            .ok_or(TournamentError::BracketNotFound(id))?;
        Ok(stored.bracket.view(stored.version))
    }
}
