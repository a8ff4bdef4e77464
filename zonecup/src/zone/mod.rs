//! Round-robin zone stage: the draw, fixtures and standings.

pub mod draw;
pub mod models;
pub mod standings;

pub use draw::{DrawEntrant, LEAGUE_ZONE_NAME, draw_zones, league, round_robin};
pub use models::{
    Fixture, MAX_SCORE, Standing, Zone, ZoneDraft, ZoneId, ZoneMatch, ZoneMatchId,
    ZoneMatchStatus, check_scores,
};
pub use standings::{ZoneStandingsCalculator, standings_for};
