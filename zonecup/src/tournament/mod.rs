//! Tournament lifecycle orchestration.
//!
//! This module ties the stages of a club tournament together:
//! - Tournament creation and registration window
//! - Zone draw and round-robin results
//! - Bracket seeding, construction and match progression
//! - Cancellation
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use zonecup::db::MemoryStore;
//! use zonecup::tournament::{
//!     Category, NewTournament, TournamentConfig, TournamentFormat, TournamentManager,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = TournamentManager::new(Arc::new(MemoryStore::new()));
//!
//!     let tournament = manager
//!         .create_tournament(NewTournament {
//!             name: "Spring Open".to_string(),
//!             club_id: 1,
//!             format: TournamentFormat::ZoneThenBracket,
//!             category: Category::Mixed,
//!             config: TournamentConfig::default(),
//!         })
//!         .await?;
//!     manager.open_registration(tournament.id).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod manager;
pub mod models;

pub use manager::{StageAdvance, TournamentManager, ZoneResultRecorded, ZoneStageStarted};
pub use models::{
    Category, ClubId, MAX_BRACKET_ENTRANTS, NewTournament, ScoringRule, Tournament,
    TournamentConfig, TournamentFormat, TournamentId, TournamentStatus,
};
