//! Storage seam for the engine.
//!
//! Every method that checks an invariant before writing does the check and the
//! write as one atomic operation: a transaction holding the tournament row
//! lock (Postgres) or the store lock (memory). Callers may pre-check for
//! friendlier errors but must not rely on their own reads.

use async_trait::async_trait;

use crate::bracket::{Bracket, Seed};
use crate::errors::TournamentResult;
use crate::registration::{Couple, Entrant, EntrantId, Player, PlayerId};
use crate::tournament::{NewTournament, Tournament, TournamentId, TournamentStatus};
use crate::zone::{Zone, ZoneDraft, ZoneId, ZoneMatch, ZoneMatchId};

/// Bracket together with its optimistic-lock version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBracket {
    pub bracket: Bracket,
    pub version: i64,
}

/// Persistence operations used by the tournament engine
#[async_trait]
pub trait TournamentStore: Send + Sync {
    // ---- tournaments ------------------------------------------------------

    /// Create a tournament in `NotStarted`
    async fn create_tournament(&self, new: &NewTournament) -> TournamentResult<Tournament>;

    async fn get_tournament(&self, id: TournamentId) -> TournamentResult<Option<Tournament>>;

    /// Compare-and-swap the tournament status.
    ///
    /// Fails with `InvalidState { action, .. }` unless the current status is
    /// one of `from`.
    async fn transition_tournament(
        &self,
        id: TournamentId,
        from: &[TournamentStatus],
        to: TournamentStatus,
        action: &'static str,
    ) -> TournamentResult<Tournament>;

    /// Cancel a non-terminal tournament and deactivate all its entrants
    async fn cancel_tournament(&self, id: TournamentId) -> TournamentResult<Tournament>;

    // ---- roster -----------------------------------------------------------

    /// Insert or refresh a roster player
    async fn upsert_player(&self, player: &Player) -> TournamentResult<Player>;

    async fn get_player(&self, id: PlayerId) -> TournamentResult<Option<Player>>;

    /// Couple for an unordered pair of distinct players, created on first use
    async fn find_or_create_couple(&self, a: PlayerId, b: PlayerId)
    -> TournamentResult<Couple>;

    // ---- registration -----------------------------------------------------

    /// Register a couple.
    ///
    /// Atomically checks that registration is open, the field is not full,
    /// the couple is not already entered and neither player holds another
    /// active entry, then inserts the entrant.
    async fn insert_entrant(
        &self,
        tournament_id: TournamentId,
        couple: &Couple,
    ) -> TournamentResult<Entrant>;

    /// Deactivate an entrant while registration is open
    async fn withdraw_entrant(
        &self,
        tournament_id: TournamentId,
        entrant_id: EntrantId,
    ) -> TournamentResult<Entrant>;

    /// Active entrants in registration order
    async fn list_entrants(&self, tournament_id: TournamentId) -> TournamentResult<Vec<Entrant>>;

    // ---- zone stage -------------------------------------------------------

    /// Persist the zone draw and its fixtures, stamp the zone stage start and
    /// move the tournament to `status_after`.
    ///
    /// Fails if the stage already started or the active entrants changed
    /// since the draw was made.
    async fn start_zone_stage(
        &self,
        tournament_id: TournamentId,
        drafts: &[ZoneDraft],
        status_after: TournamentStatus,
    ) -> TournamentResult<Vec<Zone>>;

    async fn list_zones(&self, tournament_id: TournamentId) -> TournamentResult<Vec<Zone>>;

    async fn get_zone(&self, zone_id: ZoneId) -> TournamentResult<Option<Zone>>;

    async fn list_zone_matches(&self, zone_id: ZoneId) -> TournamentResult<Vec<ZoneMatch>>;

    async fn list_tournament_zone_matches(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Vec<ZoneMatch>>;

    async fn get_zone_match(&self, id: ZoneMatchId) -> TournamentResult<Option<ZoneMatch>>;

    /// Save a zone match if its stored version still equals `m.version`.
    ///
    /// Returns the stored match with the bumped version. Refused once the
    /// bracket exists.
    async fn save_zone_match(&self, m: &ZoneMatch) -> TournamentResult<ZoneMatch>;

    // ---- bracket ----------------------------------------------------------

    /// Persist seeds and a freshly built bracket, then move the tournament to
    /// `status_after`. Returns the bracket version.
    ///
    /// `zone_versions` lists every zone match of the tournament with the
    /// version the seeds were computed from, ordered by match id. Fails if a
    /// bracket already exists, a zone match is still pending, or the stored
    /// zone matches differ from `zone_versions` (`ConcurrentModification`).
    async fn insert_bracket(
        &self,
        tournament_id: TournamentId,
        zone_versions: &[(ZoneMatchId, i64)],
        seeds: &[Seed],
        bracket: &Bracket,
        status_after: TournamentStatus,
    ) -> TournamentResult<i64>;

    async fn load_bracket(&self, tournament_id: TournamentId)
    -> TournamentResult<Option<StoredBracket>>;

    /// Replace the bracket if its version still equals `expected_version`.
    ///
    /// Returns the new version. Optionally moves the tournament to
    /// `status_after` in the same transaction.
    async fn save_bracket(
        &self,
        tournament_id: TournamentId,
        bracket: &Bracket,
        expected_version: i64,
        status_after: Option<TournamentStatus>,
    ) -> TournamentResult<i64>;

    /// Seeds in seed order
    async fn list_seeds(&self, tournament_id: TournamentId) -> TournamentResult<Vec<Seed>>;
}
