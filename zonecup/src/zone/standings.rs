//! Zone standings.
//!
//! Standings are a pure function of the zone's finished match history. They
//! are recomputed on every read and never edited by hand.

use std::collections::HashMap;
use std::sync::Arc;

use super::models::{Standing, ZoneId, ZoneMatch};
use crate::db::TournamentStore;
use crate::errors::{TournamentError, TournamentResult};
use crate::registration::EntrantId;
use crate::tournament::ScoringRule;

/// Aggregate finished matches into ranked standings.
///
/// `members` must be in registration order; it provides the final tie-break
/// so the result is a strict total order:
/// points desc, game differential desc, games-for desc, registration order.
/// Matches that are not finished, or involve an entrant outside `members`,
/// are ignored.
pub fn standings_for(
    members: &[EntrantId],
    matches: &[ZoneMatch],
    scoring: &ScoringRule,
) -> Vec<Standing> {
    let mut table: Vec<Standing> = members.iter().map(|id| Standing::empty(*id)).collect();
    let index: HashMap<EntrantId, usize> = members
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, i))
        .collect();

    for m in matches.iter().filter(|m| m.is_finished()) {
        let Some((score_a, score_b)) = m.score else {
            continue;
        };
        let (Some(&ia), Some(&ib)) = (index.get(&m.entrant_a), index.get(&m.entrant_b)) else {
            log::warn!(
                "Zone match {} references an entrant outside its zone, skipping",
                m.id
            );
            continue;
        };

        apply_side(&mut table[ia], score_a, score_b, scoring);
        apply_side(&mut table[ib], score_b, score_a, scoring);
    }

    // Stable sort keeps registration order for complete ties
    table.sort_by(|x, y| y.ranking_key().cmp(&x.ranking_key()));

    for (i, standing) in table.iter_mut().enumerate() {
        standing.position = i as u32 + 1;
    }

    table
}

fn apply_side(standing: &mut Standing, own: u32, other: u32, scoring: &ScoringRule) {
    standing.played += 1;
    standing.games_for += own;
    standing.games_against += other;
    standing.differential += own as i64 - other as i64;
    standing.points += scoring.points(own, other);

    match own.cmp(&other) {
        std::cmp::Ordering::Greater => standing.wins += 1,
        std::cmp::Ordering::Equal => standing.ties += 1,
        std::cmp::Ordering::Less => standing.losses += 1,
    }
}

/// Computes standings for stored zones
#[derive(Clone)]
pub struct ZoneStandingsCalculator {
    store: Arc<dyn TournamentStore>,
}

impl ZoneStandingsCalculator {
    pub fn new(store: Arc<dyn TournamentStore>) -> Self {
        Self { store }
    }

    /// Ranked standings for one zone
    ///
    /// # Errors
    ///
    /// * `TournamentError::ZoneNotFound` - Unknown zone
    pub async fn compute_standings(&self, zone_id: ZoneId) -> TournamentResult<Vec<Standing>> {
        let zone = self
            .store
            .get_zone(zone_id)
            .await?
            .ok_or(TournamentError::ZoneNotFound(zone_id))?;

        let tournament = self
            .store
            .get_tournament(zone.tournament_id)
            .await?
            .ok_or(TournamentError::TournamentNotFound(zone.tournament_id))?;

        let matches = self.store.list_zone_matches(zone_id).await?;

        Ok(standings_for(
            &zone.entrant_ids,
            &matches,
            &tournament.config.scoring,
        ))
    }
}
