//! Knockout bracket handlers.
//!
//! Matches are addressed by round name and 0-based position, e.g.
//! `/api/v1/tournaments/1/bracket/QUARTERFINAL/2/result`. Every command
//! returns the updated bracket with its new version.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use zonecup::bracket::{BracketView, MatchSlot, RoundName};
use zonecup::tournament::TournamentId;

use super::AppState;
use super::errors::ApiResult;
use super::tournaments::ScoreRequest;
use crate::{logging, metrics};

#[derive(Debug, Deserialize)]
pub struct StartMatchRequest {
    pub court: String,
}

/// Path of a bracket match
#[derive(Debug, Deserialize)]
pub struct MatchPath {
    pub id: TournamentId,
    pub round: String,
    pub position: u32,
}

impl MatchPath {
    fn slot(&self) -> ApiResult<MatchSlot> {
        let round: RoundName = self.round.parse()?;
        Ok(MatchSlot::new(round, self.position))
    }
}

/// Seed the bracket from the final zone standings.
///
/// # Response
///
/// Returns `201 Created` with the bracket.
///
/// # Errors
///
/// - `409 Conflict`: Bracket already built
/// - `422 Unprocessable Entity`: Zone matches still pending
pub async fn build_bracket(
    State(state): State<AppState>,
    Path(id): Path<TournamentId>,
) -> ApiResult<(StatusCode, Json<BracketView>)> {
    let view = state.manager.build_bracket(id).await?;
    bracket_built(id, &view);
    Ok((StatusCode::CREATED, Json(view)))
}

/// Count a freshly built bracket, and the champion of a one-entrant field
pub(crate) fn bracket_built(id: TournamentId, view: &BracketView) {
    metrics::brackets_built_total();
    logging::log_domain_event(
        "bracket_built",
        id,
        &format!(
            "{} entrant(s) in a bracket of {}",
            view.entrant_count, view.bracket_size
        ),
    );
    champion_crowned(id, view);
}

/// Count the champion of a view returned by a bracket command.
///
/// Commands are refused once the tournament finishes, so a champion in a
/// command's result was crowned by that command.
pub(crate) fn champion_crowned(id: TournamentId, view: &BracketView) {
    if let Some(champion) = view.champion {
        metrics::champions_crowned_total();
        logging::log_domain_event(
            "champion_crowned",
            id,
            &format!("Entrant {champion} won the tournament"),
        );
    }
}

pub async fn get_bracket(
    State(state): State<AppState>,
    Path(id): Path<TournamentId>,
) -> ApiResult<Json<BracketView>> {
    Ok(Json(state.manager.get_bracket(id).await?))
}

/// Put a match on court.
///
/// # Errors
///
/// - `400 Bad Request`: Unknown round name or empty court
/// - `409 Conflict`: The match is not pending
/// - `422 Unprocessable Entity`: An opponent is still undecided
pub async fn start_match(
    State(state): State<AppState>,
    Path(path): Path<MatchPath>,
    Json(req): Json<StartMatchRequest>,
) -> ApiResult<Json<BracketView>> {
    let view = state
        .manager
        .start_bracket_match(path.id, path.slot()?, &req.court)
        .await?;
    Ok(Json(view))
}

/// Record the result of a match in play; the winner advances.
///
/// # Errors
///
/// - `400 Bad Request`: Drawn score
/// - `409 Conflict`: The match is not in progress, or the bracket was
///   updated concurrently
pub async fn record_result(
    State(state): State<AppState>,
    Path(path): Path<MatchPath>,
    Json(req): Json<ScoreRequest>,
) -> ApiResult<Json<BracketView>> {
    let view = state
        .manager
        .record_bracket_match_result(path.id, path.slot()?, req.score_a, req.score_b)
        .await?;
    metrics::results_recorded_total("bracket");
    champion_crowned(path.id, &view);
    Ok(Json(view))
}

/// Correct a finished match.
///
/// # Errors
///
/// - `409 Conflict`: The winner changes after the next match started
pub async fn correct_result(
    State(state): State<AppState>,
    Path(path): Path<MatchPath>,
    Json(req): Json<ScoreRequest>,
) -> ApiResult<Json<BracketView>> {
    let view = state
        .manager
        .correct_bracket_match_result(path.id, path.slot()?, req.score_a, req.score_b)
        .await?;
    champion_crowned(path.id, &view);
    Ok(Json(view))
}

pub async fn cancel_match(
    State(state): State<AppState>,
    Path(path): Path<MatchPath>,
) -> ApiResult<Json<BracketView>> {
    let view = state.manager.cancel_match(path.id, path.slot()?).await?;
    Ok(Json(view))
}

/// Administrative undo of a cancellation or a result
pub async fn reactivate_match(
    State(state): State<AppState>,
    Path(path): Path<MatchPath>,
) -> ApiResult<Json<BracketView>> {
    let view = state.manager.reactivate_match(path.id, path.slot()?).await?;
    logging::log_domain_event(
        "match_reactivated",
        path.id,
        &format!("{} {} reactivated", path.round, path.position),
    );
    Ok(Json(view))
}
