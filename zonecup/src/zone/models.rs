//! Zone-stage data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{TournamentError, TournamentResult};
use crate::registration::EntrantId;
use crate::tournament::TournamentId;

/// Largest score a match side can hold; scores are stored as 32-bit integers
pub const MAX_SCORE: u32 = i32::MAX as u32;

/// Reject scores above [`MAX_SCORE`]
pub fn check_scores(score_a: u32, score_b: u32) -> TournamentResult<()> {
    match [score_a, score_b].into_iter().find(|s| *s > MAX_SCORE) {
        Some(score) => Err(TournamentError::InvalidInput(format!(
            "score {score} exceeds the maximum of {MAX_SCORE}"
        ))),
        None => Ok(()),
    }
}

/// Zone ID type
pub type ZoneId = i64;

/// Zone match ID type
pub type ZoneMatchId = i64;

/// Round-robin group of entrants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub tournament_id: TournamentId,
    pub name: String,
    /// Members in registration order
    pub entrant_ids: Vec<EntrantId>,
    pub created_at: DateTime<Utc>,
}

/// Zone match status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneMatchStatus {
    Pending,
    Finished,
}

impl ZoneMatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneMatchStatus::Pending => "pending",
            ZoneMatchStatus::Finished => "finished",
        }
    }
}

impl fmt::Display for ZoneMatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ZoneMatchStatus {
    type Err = TournamentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ZoneMatchStatus::Pending),
            "finished" => Ok(ZoneMatchStatus::Finished),
            other => Err(TournamentError::Corrupt(format!(
                "unknown zone match status '{other}'"
            ))),
        }
    }
}

/// Round-robin match between two entrants of one zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneMatch {
    pub id: ZoneMatchId,
    pub zone_id: ZoneId,
    pub tournament_id: TournamentId,
    /// Round-robin round, 1-based
    pub round: u32,
    pub entrant_a: EntrantId,
    pub entrant_b: EntrantId,
    pub status: ZoneMatchStatus,
    /// Games won by (entrant_a, entrant_b)
    pub score: Option<(u32, u32)>,
    /// Optimistic lock, bumped by every successful save
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ZoneMatch {
    pub fn is_finished(&self) -> bool {
        self.status == ZoneMatchStatus::Finished
    }

    pub fn involves(&self, entrant_id: EntrantId) -> bool {
        self.entrant_a == entrant_id || self.entrant_b == entrant_id
    }

    /// Record (or correct) the score. Ties are allowed in zone play.
    pub fn record(&mut self, score_a: u32, score_b: u32) -> TournamentResult<()> {
        check_scores(score_a, score_b)?;
        self.score = Some((score_a, score_b));
        self.status = ZoneMatchStatus::Finished;
        Ok(())
    }
}

/// Zone and its round-robin schedule, before persistence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneDraft {
    pub name: String,
    /// Members in registration order
    pub entrant_ids: Vec<EntrantId>,
    pub fixtures: Vec<Fixture>,
}

/// Scheduled pairing inside a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fixture {
    pub round: u32,
    pub entrant_a: EntrantId,
    pub entrant_b: EntrantId,
}

/// Derived zone standing; never stored as authoritative state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub entrant_id: EntrantId,
    /// 1-based rank inside the zone
    pub position: u32,
    pub played: u32,
    pub wins: u32,
    pub ties: u32,
    pub losses: u32,
    pub points: u32,
    pub games_for: u32,
    pub games_against: u32,
    pub differential: i64,
}

impl Standing {
    pub(crate) fn empty(entrant_id: EntrantId) -> Self {
        Self {
            entrant_id,
            position: 0,
            played: 0,
            wins: 0,
            ties: 0,
            losses: 0,
            points: 0,
            games_for: 0,
            games_against: 0,
            differential: 0,
        }
    }

    /// Ranking key compared across entrants and across zones, best first
    pub fn ranking_key(&self) -> (u32, i64, u32) {
        (self.points, self.differential, self.games_for)
    }
}
