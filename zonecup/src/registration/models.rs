//! Player, couple and entrant models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tournament::TournamentId;
use crate::zone::ZoneId;

/// Player ID type
pub type PlayerId = i64;

/// Couple ID type
pub type CoupleId = i64;

/// Entrant ID type. Ids are assigned in registration order.
pub type EntrantId = i64;

/// Roster player, synced from the external directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    /// Ranking score; read-only to the engine
    #[serde(default)]
    pub ranking: i64,
}

/// Order two player ids so an unordered pair has one canonical form
pub fn normalize_pair(a: PlayerId, b: PlayerId) -> (PlayerId, PlayerId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Two players competing as one unit, reused across tournaments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Couple {
    pub id: CoupleId,
    pub player_low: PlayerId,
    pub player_high: PlayerId,
    pub created_at: DateTime<Utc>,
}

impl Couple {
    pub fn players(&self) -> [PlayerId; 2] {
        [self.player_low, self.player_high]
    }

    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.player_low == player_id || self.player_high == player_id
    }
}

/// A couple's registration into one tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entrant {
    pub id: EntrantId,
    pub tournament_id: TournamentId,
    pub couple_id: CoupleId,
    pub players: [PlayerId; 2],
    /// Zone assignment, set by the zone draw
    pub zone_id: Option<ZoneId>,
    /// False once withdrawn or the tournament is canceled
    pub active: bool,
    pub registered_at: DateTime<Utc>,
}

impl Entrant {
    pub fn has_player(&self, player_id: PlayerId) -> bool {
        self.players.contains(&player_id)
    }

    pub fn shares_player_with(&self, players: &[PlayerId; 2]) -> Option<PlayerId> {
        players.iter().copied().find(|p| self.has_player(*p))
    }
}
