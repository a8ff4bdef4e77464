//! Single-elimination bracket: seeding, construction and match progression.

pub mod builder;
pub mod lifecycle;
pub mod models;
pub mod seeder;

pub use builder::{build, round_names, seeding_order};
pub use lifecycle::{
    Bracket, BracketMatch, BracketMatchRecord, BracketView, MatchState, MatchStatus, MatchView,
    NextSlotView, RoundView,
};
pub use models::{MatchResult, MatchSlot, RoundName, Seed, SeedPlan, Side, Slot};
pub use seeder::{ZoneRanking, seed};
