//! Couple registration guard.

use std::sync::Arc;

use super::models::{Entrant, EntrantId, PlayerId};
use crate::db::TournamentStore;
use crate::errors::{TournamentError, TournamentResult};
use crate::tournament::TournamentId;

/// Admits couples into tournaments.
///
/// The checks made here only give callers precise errors early. The store
/// repeats every check atomically with the insert, so two racing submissions
/// for the same player cannot both succeed.
#[derive(Clone)]
pub struct RegistrationGuard {
    store: Arc<dyn TournamentStore>,
}

impl RegistrationGuard {
    pub fn new(store: Arc<dyn TournamentStore>) -> Self {
        Self { store }
    }

    /// Register the couple formed by two players
    ///
    /// # Arguments
    ///
    /// * `tournament_id` - Tournament to enter
    /// * `player_a` / `player_b` - The two players, in any order
    ///
    /// # Errors
    ///
    /// - `SamePlayer` if both ids are equal
    /// - `TournamentNotFound` / `PlayerNotFound` for unknown references
    /// - `InvalidState` if registration is not open
    /// - `PlayerAlreadyEntered` / `CoupleAlreadyEntered` / `TournamentFull`
    pub async fn register_couple(
        &self,
        tournament_id: TournamentId,
        player_a: PlayerId,
        player_b: PlayerId,
    ) -> TournamentResult<Entrant> {
        if player_a == player_b {
            return Err(TournamentError::SamePlayer(player_a));
        }

        let tournament = self
            .store
            .get_tournament(tournament_id)
            .await?
            .ok_or(TournamentError::TournamentNotFound(tournament_id))?;
        tournament.ensure_registration_open("register a couple")?;

        for player_id in [player_a, player_b] {
            if self.store.get_player(player_id).await?.is_none() {
                return Err(TournamentError::PlayerNotFound(player_id));
            }
        }

        let players = [player_a, player_b];
        for entrant in self.store.list_entrants(tournament_id).await? {
            if let Some(player_id) = entrant.shares_player_with(&players) {
                // Same pair registered again reads better as a couple conflict
                if entrant.has_player(player_a) && entrant.has_player(player_b) {
                    return Err(TournamentError::CoupleAlreadyEntered {
                        tournament_id,
                        couple_id: entrant.couple_id,
                    });
                }
                return Err(TournamentError::PlayerAlreadyEntered {
                    tournament_id,
                    player_id,
                });
            }
        }

        let couple = self.store.find_or_create_couple(player_a, player_b).await?;
        let entrant = self.store.insert_entrant(tournament_id, &couple).await?;

        log::info!(
            "Registered couple {} ({} & {}) in tournament {} as entrant {}",
            couple.id,
            couple.player_low,
            couple.player_high,
            tournament_id,
            entrant.id
        );

        Ok(entrant)
    }

    /// Withdraw an entrant while registration is still open
    pub async fn withdraw_entrant(
        &self,
        tournament_id: TournamentId,
        entrant_id: EntrantId,
    ) -> TournamentResult<Entrant> {
        let entrant = self.store.withdraw_entrant(tournament_id, entrant_id).await?;

        log::info!(
            "Entrant {} withdrew from tournament {}",
            entrant_id,
            tournament_id
        );

        Ok(entrant)
    }
}
