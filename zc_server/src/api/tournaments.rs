//! Tournament, roster, registration and zone-stage handlers.
//!
//! # Examples
//!
//! Register a couple:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/tournaments/1/registrations \
//!   -H "Content-Type: application/json" \
//!   -d '{"player_a": 11, "player_b": 12}'
//! ```

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use zonecup::bracket::Seed;
use zonecup::registration::{Entrant, EntrantId, Player, PlayerId};
use zonecup::tournament::{
    Category, ClubId, NewTournament, StageAdvance, Tournament, TournamentConfig, TournamentFormat,
    TournamentId,
};
use zonecup::zone::{Standing, Zone, ZoneId, ZoneMatch, ZoneMatchId};

use super::AppState;
use super::bracket;
use super::errors::ApiResult;
use crate::{logging, metrics};

#[derive(Debug, Deserialize)]
pub struct CreateTournamentRequest {
    pub name: String,
    pub club_id: ClubId,
    pub format: TournamentFormat,
    pub category: Category,
    /// Club defaults apply when omitted
    pub config: Option<TournamentConfig>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterCoupleRequest {
    pub player_a: PlayerId,
    pub player_b: PlayerId,
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub score_a: u32,
    pub score_b: u32,
}

/// Insert or refresh a roster player.
///
/// # Errors
///
/// - `400 Bad Request`: Blank display name
pub async fn upsert_player(
    State(state): State<AppState>,
    Json(player): Json<Player>,
) -> ApiResult<Json<Player>> {
    Ok(Json(state.manager.upsert_player(player).await?))
}

/// Create a tournament in `NOT_STARTED`.
///
/// # Response
///
/// Returns `201 Created` with the persisted tournament.
///
/// # Errors
///
/// - `400 Bad Request`: Blank name or invalid configuration
pub async fn create_tournament(
    State(state): State<AppState>,
    Json(req): Json<CreateTournamentRequest>,
) -> ApiResult<(StatusCode, Json<Tournament>)> {
    let new = NewTournament {
        name: req.name,
        club_id: req.club_id,
        format: req.format,
        category: req.category,
        config: req.config.unwrap_or_else(|| state.tournament_defaults.clone()),
    };

    let tournament = state.manager.create_tournament(new).await?;
    logging::log_domain_event("tournament_created", tournament.id, &tournament.name);
    Ok((StatusCode::CREATED, Json(tournament)))
}

pub async fn get_tournament(
    State(state): State<AppState>,
    Path(id): Path<TournamentId>,
) -> ApiResult<Json<Tournament>> {
    Ok(Json(state.manager.get_tournament(id).await?))
}

/// Open registration (`NOT_STARTED` to `PAIRING`).
///
/// # Errors
///
/// - `404 Not Found`: Unknown tournament
/// - `409 Conflict`: Registration already opened, or tournament closed
pub async fn open_registration(
    State(state): State<AppState>,
    Path(id): Path<TournamentId>,
) -> ApiResult<Json<Tournament>> {
    Ok(Json(state.manager.open_registration(id).await?))
}

pub async fn cancel_tournament(
    State(state): State<AppState>,
    Path(id): Path<TournamentId>,
) -> ApiResult<Json<Tournament>> {
    let tournament = state.manager.cancel_tournament(id).await?;
    logging::log_domain_event("tournament_canceled", id, "Tournament canceled");
    Ok(Json(tournament))
}

/// Register a couple as an entrant.
///
/// # Response
///
/// Returns `201 Created` with the entrant.
///
/// # Errors
///
/// - `400 Bad Request`: The same player twice
/// - `404 Not Found`: Unknown tournament or player
/// - `409 Conflict`: A player already entered, the couple already entered,
///   the field is full, or registration is closed
pub async fn register_couple(
    State(state): State<AppState>,
    Path(id): Path<TournamentId>,
    Json(req): Json<RegisterCoupleRequest>,
) -> ApiResult<(StatusCode, Json<Entrant>)> {
    let entrant = state
        .manager
        .register_couple(id, req.player_a, req.player_b)
        .await?;
    metrics::registrations_total();
    Ok((StatusCode::CREATED, Json(entrant)))
}

pub async fn withdraw_entrant(
    State(state): State<AppState>,
    Path((id, entrant_id)): Path<(TournamentId, EntrantId)>,
) -> ApiResult<Json<Entrant>> {
    Ok(Json(state.manager.withdraw_entrant(id, entrant_id).await?))
}

pub async fn list_entrants(
    State(state): State<AppState>,
    Path(id): Path<TournamentId>,
) -> ApiResult<Json<Vec<Entrant>>> {
    Ok(Json(state.manager.list_entrants(id).await?))
}

/// Close registration and draw the zones.
///
/// # Errors
///
/// - `409 Conflict`: Zone stage already started or wrong status
/// - `422 Unprocessable Entity`: Not enough entrants
pub async fn start_zone_stage(
    State(state): State<AppState>,
    Path(id): Path<TournamentId>,
) -> ApiResult<Json<Vec<Zone>>> {
    let started = state.manager.start_zone_stage(id).await?;
    logging::log_domain_event(
        "zone_stage_started",
        id,
        &format!("Drew {} zone(s)", started.zones.len()),
    );
    if let Some(advance) = &started.advance {
        stage_advanced(id, advance);
    }
    Ok(Json(started.zones))
}

pub async fn list_zones(
    State(state): State<AppState>,
    Path(id): Path<TournamentId>,
) -> ApiResult<Json<Vec<Zone>>> {
    Ok(Json(state.manager.list_zones(id).await?))
}

pub async fn get_standings(
    State(state): State<AppState>,
    Path(zone_id): Path<ZoneId>,
) -> ApiResult<Json<Vec<Standing>>> {
    Ok(Json(state.manager.get_standings(zone_id).await?))
}

pub async fn list_zone_matches(
    State(state): State<AppState>,
    Path(zone_id): Path<ZoneId>,
) -> ApiResult<Json<Vec<ZoneMatch>>> {
    Ok(Json(state.manager.list_zone_matches(zone_id).await?))
}

/// Record or correct a zone match result.
///
/// Recording the last pending zone match builds the bracket (or finishes a
/// round-robin-only league).
///
/// # Errors
///
/// - `404 Not Found`: Unknown zone match
/// - `409 Conflict`: Zone results are locked by the bracket, or the match
///   was saved concurrently
pub async fn record_zone_match_result(
    State(state): State<AppState>,
    Path(match_id): Path<ZoneMatchId>,
    Json(req): Json<ScoreRequest>,
) -> ApiResult<Json<ZoneMatch>> {
    let recorded = state
        .manager
        .record_zone_match_result(match_id, req.score_a, req.score_b)
        .await?;
    metrics::results_recorded_total("zone");
    if let Some(advance) = &recorded.advance {
        stage_advanced(recorded.zone_match.tournament_id, advance);
    }
    Ok(Json(recorded.zone_match))
}

fn stage_advanced(id: TournamentId, advance: &StageAdvance) {
    match advance {
        StageAdvance::BracketBuilt(view) => bracket::bracket_built(id, view),
        StageAdvance::LeagueFinished => {
            logging::log_domain_event("league_finished", id, "Round robin complete")
        }
    }
}

/// Seeds in seed order; empty until the bracket is built
pub async fn get_seeds(
    State(state): State<AppState>,
    Path(id): Path<TournamentId>,
) -> ApiResult<Json<Vec<Seed>>> {
    Ok(Json(state.manager.get_seeds(id).await?))
}
