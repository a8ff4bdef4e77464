//! Tournament data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{TournamentError, TournamentResult};
use crate::zone::ZoneMatchId;

/// Tournament ID type
pub type TournamentId = i64;

/// Club ID type (the club owning a tournament)
pub type ClubId = i64;

/// Largest bracket the canonical round names can describe (`ROUND_OF_32`).
pub const MAX_BRACKET_ENTRANTS: usize = 32;

/// Competition format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TournamentFormat {
    /// Round-robin zones followed by a single-elimination bracket
    ZoneThenBracket,
    /// One round-robin table, no bracket
    RoundRobinOnly,
}

impl TournamentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentFormat::ZoneThenBracket => "zone_then_bracket",
            TournamentFormat::RoundRobinOnly => "round_robin_only",
        }
    }
}

impl fmt::Display for TournamentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TournamentFormat {
    type Err = TournamentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zone_then_bracket" => Ok(TournamentFormat::ZoneThenBracket),
            "round_robin_only" => Ok(TournamentFormat::RoundRobinOnly),
            other => Err(TournamentError::Corrupt(format!(
                "unknown tournament format '{other}'"
            ))),
        }
    }
}

/// Gender category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Male,
    Female,
    Mixed,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Male => "male",
            Category::Female => "female",
            Category::Mixed => "mixed",
        }
    }
}

impl FromStr for Category {
    type Err = TournamentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Category::Male),
            "female" => Ok(Category::Female),
            "mixed" => Ok(Category::Mixed),
            other => Err(TournamentError::Corrupt(format!(
                "unknown category '{other}'"
            ))),
        }
    }
}

/// Tournament status.
///
/// Forward-only: `NotStarted → Pairing → InProgress → Finished`. `Canceled`
/// is reachable from every state except `Finished` and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TournamentStatus {
    /// Created, registration not yet open
    NotStarted,
    /// Registration open, then zone play
    Pairing,
    /// Bracket (or round-robin-only table) in play
    InProgress,
    /// Champion decided
    Finished,
    /// Canceled by the club
    Canceled,
}

impl TournamentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentStatus::NotStarted => "not_started",
            TournamentStatus::Pairing => "pairing",
            TournamentStatus::InProgress => "in_progress",
            TournamentStatus::Finished => "finished",
            TournamentStatus::Canceled => "canceled",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            TournamentStatus::NotStarted => 0,
            TournamentStatus::Pairing => 1,
            TournamentStatus::InProgress => 2,
            TournamentStatus::Finished => 3,
            TournamentStatus::Canceled => 4,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TournamentStatus::Finished | TournamentStatus::Canceled)
    }

    /// Whether the state machine permits moving from `self` to `next`
    pub fn can_transition_to(&self, next: TournamentStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            TournamentStatus::Canceled => true,
            _ => next.rank() > self.rank(),
        }
    }
}

impl fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TournamentStatus {
    type Err = TournamentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(TournamentStatus::NotStarted),
            "pairing" => Ok(TournamentStatus::Pairing),
            "in_progress" => Ok(TournamentStatus::InProgress),
            "finished" => Ok(TournamentStatus::Finished),
            "canceled" => Ok(TournamentStatus::Canceled),
            other => Err(TournamentError::Corrupt(format!(
                "unknown tournament status '{other}'"
            ))),
        }
    }
}

/// Points awarded per zone match outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringRule {
    pub win: u32,
    pub tie: u32,
    pub loss: u32,
}

impl ScoringRule {
    /// Points earned by a side that scored `own` against `other`
    pub fn points(&self, own: u32, other: u32) -> u32 {
        match own.cmp(&other) {
            std::cmp::Ordering::Greater => self.win,
            std::cmp::Ordering::Equal => self.tie,
            std::cmp::Ordering::Less => self.loss,
        }
    }
}

impl Default for ScoringRule {
    fn default() -> Self {
        Self {
            win: 2,
            tie: 1,
            loss: 0,
        }
    }
}

/// Tournament configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentConfig {
    /// Zone-stage scoring rule
    pub scoring: ScoringRule,
    /// Minimum active entrants required to start the zone stage
    pub min_entrants: usize,
    /// Maximum active entrants accepted at registration
    pub max_entrants: usize,
    /// Target entrants per zone
    pub zone_size: usize,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringRule::default(),
            min_entrants: 2,
            max_entrants: MAX_BRACKET_ENTRANTS,
            zone_size: 3,
        }
    }
}

impl TournamentConfig {
    /// Build club defaults from environment variables
    ///
    /// - `DEFAULT_ZONE_SIZE` (default: 3)
    /// - `DEFAULT_MIN_ENTRANTS` (default: 2)
    /// - `DEFAULT_MAX_ENTRANTS` (default: 32)
    /// - `POINTS_WIN` / `POINTS_TIE` / `POINTS_LOSS` (default: 2 / 1 / 0)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            scoring: ScoringRule {
                win: parse_env_or("POINTS_WIN", defaults.scoring.win),
                tie: parse_env_or("POINTS_TIE", defaults.scoring.tie),
                loss: parse_env_or("POINTS_LOSS", defaults.scoring.loss),
            },
            min_entrants: parse_env_or("DEFAULT_MIN_ENTRANTS", defaults.min_entrants),
            max_entrants: parse_env_or("DEFAULT_MAX_ENTRANTS", defaults.max_entrants),
            zone_size: parse_env_or("DEFAULT_ZONE_SIZE", defaults.zone_size),
        }
    }

    /// Validate the configuration for a given format
    pub fn validate(&self, format: TournamentFormat) -> TournamentResult<()> {
        if self.min_entrants == 0 {
            return Err(TournamentError::InvalidConfig(
                "min_entrants must be at least 1".to_string(),
            ));
        }

        if self.max_entrants < self.min_entrants {
            return Err(TournamentError::InvalidConfig(format!(
                "max_entrants ({}) must not be below min_entrants ({})",
                self.max_entrants, self.min_entrants
            )));
        }

        if format == TournamentFormat::ZoneThenBracket && self.max_entrants > MAX_BRACKET_ENTRANTS {
            return Err(TournamentError::InvalidConfig(format!(
                "max_entrants must be at most {MAX_BRACKET_ENTRANTS} for a bracket"
            )));
        }

        if self.zone_size < 2 {
            return Err(TournamentError::InvalidConfig(
                "zone_size must be at least 2".to_string(),
            ));
        }

        if self.scoring.win <= self.scoring.tie || self.scoring.tie < self.scoring.loss {
            return Err(TournamentError::InvalidConfig(format!(
                "scoring must satisfy win > tie >= loss, got {}/{}/{}",
                self.scoring.win, self.scoring.tie, self.scoring.loss
            )));
        }

        Ok(())
    }
}

/// Request to create a tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTournament {
    pub name: String,
    pub club_id: ClubId,
    pub format: TournamentFormat,
    pub category: Category,
    #[serde(default)]
    pub config: TournamentConfig,
}

/// Persisted tournament
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub club_id: ClubId,
    pub format: TournamentFormat,
    pub category: Category,
    pub status: TournamentStatus,
    pub config: TournamentConfig,
    /// Set once the zone draw has been made
    pub zone_stage_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tournament {
    /// Registration is open while pairing and before the zone draw
    pub fn accepts_registrations(&self) -> bool {
        self.status == TournamentStatus::Pairing && self.zone_stage_started_at.is_none()
    }

    /// Zone matches may be played and corrected
    pub fn zone_stage_in_play(&self) -> bool {
        if self.zone_stage_started_at.is_none() {
            return false;
        }
        match self.format {
            TournamentFormat::ZoneThenBracket => self.status == TournamentStatus::Pairing,
            TournamentFormat::RoundRobinOnly => self.status == TournamentStatus::InProgress,
        }
    }

    pub fn state_error(&self, action: &'static str) -> TournamentError {
        TournamentError::InvalidState {
            action,
            actual: self.status,
        }
    }

    /// Fail with `InvalidState` unless the tournament is in `expected`
    pub fn ensure_status(
        &self,
        expected: TournamentStatus,
        action: &'static str,
    ) -> TournamentResult<()> {
        if self.status == expected {
            Ok(())
        } else {
            Err(self.state_error(action))
        }
    }

    pub fn ensure_registration_open(&self, action: &'static str) -> TournamentResult<()> {
        if self.accepts_registrations() {
            Ok(())
        } else {
            Err(self.state_error(action))
        }
    }

    /// Zone draw may be made: pairing, not drawn yet
    pub fn ensure_zone_stage_startable(&self) -> TournamentResult<()> {
        if self.zone_stage_started_at.is_some() && !self.status.is_terminal() {
            return Err(TournamentError::ZoneStageAlreadyStarted(self.id));
        }
        self.ensure_status(TournamentStatus::Pairing, "start the zone stage")
    }

    /// Zone results may be written; they freeze once the bracket exists
    pub fn ensure_zone_results_open(
        &self,
        match_id: ZoneMatchId,
        bracket_exists: bool,
    ) -> TournamentResult<()> {
        if bracket_exists {
            return Err(TournamentError::ZoneResultsLocked(match_id));
        }
        if self.zone_stage_in_play() {
            Ok(())
        } else {
            Err(self.state_error("record a zone result"))
        }
    }

    /// Bracket may be built from the zone stage
    pub fn ensure_bracket_buildable(
        &self,
        bracket_exists: bool,
        pending_zone_matches: usize,
    ) -> TournamentResult<()> {
        if self.format != TournamentFormat::ZoneThenBracket {
            return Err(TournamentError::UnsupportedFormat {
                action: "build a bracket",
                format: self.format,
            });
        }
        if bracket_exists {
            return Err(TournamentError::BracketAlreadyBuilt(self.id));
        }
        self.ensure_status(TournamentStatus::Pairing, "build the bracket")?;
        if self.zone_stage_started_at.is_none() {
            return Err(TournamentError::ZoneStageNotStarted(self.id));
        }
        if pending_zone_matches > 0 {
            return Err(TournamentError::ZoneStageIncomplete {
                pending: pending_zone_matches,
            });
        }
        Ok(())
    }
}

fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
