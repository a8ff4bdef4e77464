//! Engine error types.
//!
//! Every failure the engine reports is a [`TournamentError`]. Callers that need
//! to decide on user messaging or transport status codes should branch on
//! [`TournamentError::kind`] rather than on individual variants.

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::bracket::{MatchSlot, MatchStatus};
use crate::db::timeouts::TimeoutError;
use crate::registration::{CoupleId, EntrantId, PlayerId};
use crate::tournament::{TournamentFormat, TournamentId, TournamentStatus};
use crate::zone::{ZoneId, ZoneMatchId};

/// Coarse error taxonomy shared by every engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input
    Validation,
    /// An invariant or state-transition rule would be violated
    Conflict,
    /// A referenced entity does not exist
    NotFound,
    /// The operation was attempted before its dependencies were resolved
    Precondition,
    /// Storage or infrastructure failure
    Internal,
}

/// Tournament engine errors
#[derive(Debug, Error)]
pub enum TournamentError {
    // ---- validation -------------------------------------------------------
    #[error("A couple needs two distinct players, got player {0} twice")]
    SamePlayer(PlayerId),

    #[error("Bracket matches need a winner: {score_a}-{score_b} is a draw")]
    DrawnScore { score_a: u32, score_b: u32 },

    #[error("A court is required to start a match")]
    MissingCourt,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid bracket: {0}")]
    InvalidBracket(String),

    #[error("Cannot {action} in a {format} tournament")]
    UnsupportedFormat {
        action: &'static str,
        format: TournamentFormat,
    },

    #[error("Too many entrants: at most {max}, have {current}")]
    TooManyEntrants { max: usize, current: usize },

    // ---- conflict ---------------------------------------------------------
    #[error("Player {player_id} already holds an active entry in tournament {tournament_id}")]
    PlayerAlreadyEntered {
        tournament_id: TournamentId,
        player_id: PlayerId,
    },

    #[error("Couple {couple_id} is already registered in tournament {tournament_id}")]
    CoupleAlreadyEntered {
        tournament_id: TournamentId,
        couple_id: CoupleId,
    },

    #[error("Tournament {0} is full")]
    TournamentFull(TournamentId),

    #[error("Cannot {action} while the tournament is {actual}")]
    InvalidState {
        action: &'static str,
        actual: TournamentStatus,
    },

    #[error("Cannot {action} match {slot}: it is {from}")]
    InvalidTransition {
        slot: MatchSlot,
        action: &'static str,
        from: MatchStatus,
    },

    #[error("Zone results are locked once the bracket is built (zone match {0})")]
    ZoneResultsLocked(ZoneMatchId),

    #[error("{0} was modified concurrently; reload and retry")]
    ConcurrentModification(String),

    #[error("Bracket already built for tournament {0}")]
    BracketAlreadyBuilt(TournamentId),

    #[error("Zone stage already started for tournament {0}")]
    ZoneStageAlreadyStarted(TournamentId),

    #[error("Match {0} feeds a match that has already started")]
    DownstreamStarted(MatchSlot),

    #[error("Match {0} was decided by a bye")]
    ByeMatch(MatchSlot),

    // ---- not found --------------------------------------------------------
    #[error("Tournament not found: {0}")]
    TournamentNotFound(TournamentId),

    #[error("Player not found: {0}")]
    PlayerNotFound(PlayerId),

    #[error("Entrant {entrant_id} not found in tournament {tournament_id}")]
    EntrantNotFound {
        tournament_id: TournamentId,
        entrant_id: EntrantId,
    },

    #[error("Zone not found: {0}")]
    ZoneNotFound(ZoneId),

    #[error("Zone match not found: {0}")]
    ZoneMatchNotFound(ZoneMatchId),

    #[error("Bracket match not found: {0}")]
    MatchNotFound(MatchSlot),

    #[error("No bracket for tournament {0}")]
    BracketNotFound(TournamentId),

    // ---- precondition -----------------------------------------------------
    #[error("Insufficient entrants: need {needed}, have {current}")]
    InsufficientEntrants { needed: usize, current: usize },

    #[error("Cannot seed a bracket without entrants")]
    NoEntrants,

    #[error("Zone stage has not started for tournament {0}")]
    ZoneStageNotStarted(TournamentId),

    #[error("Zone stage incomplete: {pending} match(es) still pending")]
    ZoneStageIncomplete { pending: usize },

    #[error("Match {0} is waiting for an opponent")]
    SlotUnresolved(MatchSlot),

    #[error("Match {slot} is blocked by canceled match {blocker}")]
    BlockedByCanceledMatch { slot: MatchSlot, blocker: MatchSlot },

    // ---- internal ---------------------------------------------------------
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt stored state: {0}")]
    Corrupt(String),
}

impl TournamentError {
    /// Classify the error into the engine taxonomy
    pub fn kind(&self) -> ErrorKind {
        use TournamentError::*;

        match self {
            SamePlayer(_)
            | DrawnScore { .. }
            | MissingCourt
            | InvalidInput(_)
            | InvalidConfig(_)
            | InvalidBracket(_)
            | UnsupportedFormat { .. }
            | TooManyEntrants { .. } => ErrorKind::Validation,

            PlayerAlreadyEntered { .. }
            | CoupleAlreadyEntered { .. }
            | TournamentFull(_)
            | InvalidState { .. }
            | InvalidTransition { .. }
            | ZoneResultsLocked(_)
            | ConcurrentModification(_)
            | BracketAlreadyBuilt(_)
            | ZoneStageAlreadyStarted(_)
            | DownstreamStarted(_)
            | ByeMatch(_) => ErrorKind::Conflict,

            TournamentNotFound(_)
            | PlayerNotFound(_)
            | EntrantNotFound { .. }
            | ZoneNotFound(_)
            | ZoneMatchNotFound(_)
            | MatchNotFound(_)
            | BracketNotFound(_) => ErrorKind::NotFound,

            InsufficientEntrants { .. }
            | NoEntrants
            | ZoneStageNotStarted(_)
            | ZoneStageIncomplete { .. }
            | SlotUnresolved(_)
            | BlockedByCanceledMatch { .. } => ErrorKind::Precondition,

            Database(_) | Timeout(_) | Serialization(_) | Corrupt(_) => ErrorKind::Internal,
        }
    }

    /// Get a client-safe error message that doesn't leak storage details
    pub fn client_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<TimeoutError> for TournamentError {
    fn from(err: TimeoutError) -> Self {
        match err {
            TimeoutError::Timeout(duration) => TournamentError::Timeout(duration),
            TimeoutError::Database(e) => TournamentError::Database(e),
        }
    }
}

/// Result type for engine operations
pub type TournamentResult<T> = Result<T, TournamentError>;
