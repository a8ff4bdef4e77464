//! # zonecup
//!
//! Zone-then-bracket tournament engine for club padel tournaments.
//!
//! Couples register into a tournament, play a round robin inside small zones,
//! and the zone standings seed a single-elimination bracket that runs to a
//! champion.
//!
//! ## Architecture
//!
//! A tournament moves forward through a fixed set of statuses:
//!
//! - **NotStarted**: Created, registration closed
//! - **Pairing**: Registration open, then the zone draw and zone play
//! - **InProgress**: Bracket (or a round-robin-only league) in play
//! - **Finished**: Champion decided
//! - **Canceled**: Stopped by the club; terminal
//!
//! ## Core Modules
//!
//! - [`registration`]: Couples, entrants and the registration guard
//! - [`zone`]: Zone draw, round-robin fixtures and standings
//! - [`bracket`]: Seeding, bracket construction and the match state machine
//! - [`tournament`]: The [`TournamentManager`] command and query surface
//! - [`db`]: Storage trait with PostgreSQL and in-memory implementations
//!
//! ## Example
//!
//! ```
//! use zonecup::bracket::{seeding_order, round_names, RoundName};
//!
//! assert_eq!(seeding_order(8), vec![1, 8, 4, 5, 2, 7, 3, 6]);
//! assert_eq!(
//!     round_names(8).unwrap(),
//!     vec![RoundName::Quarterfinal, RoundName::Semifinal, RoundName::Final]
//! );
//! ```

/// Single-elimination bracket: seeding, construction and match progression.
pub mod bracket;

/// Storage seam and implementations.
pub mod db;

pub mod errors;
pub mod registration;
pub mod tournament;
pub mod zone;

pub use errors::{ErrorKind, TournamentError, TournamentResult};
pub use tournament::TournamentManager;
