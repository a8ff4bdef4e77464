//! HTTP API for the tournament engine.
//!
//! A thin command/query surface over [`TournamentManager`]: handlers parse the
//! request, call one manager operation and render the result. Engine errors
//! become JSON bodies through [`errors::ApiError`].
//!
//! # Modules
//!
//! - [`tournaments`]: Roster, tournaments, registration and zone stage
//! - [`bracket`]: Bracket build and match commands
//! - [`middleware`]: Request ids and request metrics
//! - [`errors`]: Error to status-code mapping
//!
//! # Endpoints
//!
//! ```text
//! GET    /health
//! POST   /api/v1/players
//! POST   /api/v1/tournaments
//! GET    /api/v1/tournaments/{id}
//! POST   /api/v1/tournaments/{id}/open
//! POST   /api/v1/tournaments/{id}/cancel
//! POST   /api/v1/tournaments/{id}/registrations
//! DELETE /api/v1/tournaments/{id}/registrations/{entrant_id}
//! GET    /api/v1/tournaments/{id}/entrants
//! POST   /api/v1/tournaments/{id}/zones/start
//! GET    /api/v1/tournaments/{id}/zones
//! GET    /api/v1/zones/{zone_id}/standings
//! GET    /api/v1/zones/{zone_id}/matches
//! POST   /api/v1/zone-matches/{match_id}/result
//! POST   /api/v1/tournaments/{id}/bracket
//! GET    /api/v1/tournaments/{id}/bracket
//! GET    /api/v1/tournaments/{id}/seeds
//! POST   /api/v1/tournaments/{id}/bracket/{round}/{position}/start
//! POST   /api/v1/tournaments/{id}/bracket/{round}/{position}/result
//! POST   /api/v1/tournaments/{id}/bracket/{round}/{position}/correction
//! POST   /api/v1/tournaments/{id}/bracket/{round}/{position}/cancel
//! POST   /api/v1/tournaments/{id}/bracket/{round}/{position}/reactivate
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively. Restrict origins in front of the server
//! when exposing it publicly.

pub mod bracket;
pub mod errors;
pub mod middleware;
pub mod tournaments;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get, post},
};
use serde_json::json;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use zonecup::TournamentManager;
use zonecup::db::Database;
use zonecup::tournament::TournamentConfig;

use crate::logging;

/// Application state shared across all handlers.
///
/// Cloned per request; the manager and pool are reference counted.
#[derive(Clone)]
pub struct AppState {
    pub manager: TournamentManager,
    /// Present for the Postgres backend; used by the health check
    pub database: Option<Database>,
    /// Applied to tournaments created without a configuration
    pub tournament_defaults: TournamentConfig,
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use zc_server::api::{AppState, create_router};
/// use zonecup::TournamentManager;
/// use zonecup::db::MemoryStore;
/// use zonecup::tournament::TournamentConfig;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let state = AppState {
///     manager: TournamentManager::new(Arc::new(MemoryStore::new())),
///     database: None,
///     tournament_defaults: TournamentConfig::default(),
/// };
///
/// let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
/// axum::serve(listener, create_router(state)).await?;
/// # Ok(())
/// # }
/// ```
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", create_v1_router())
        .layer(axum::middleware::from_fn(middleware::track_request))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn create_v1_router() -> Router<AppState> {
    let tournament_routes = Router::new()
        .route("/tournaments", post(tournaments::create_tournament))
        .route("/tournaments/{id}", get(tournaments::get_tournament))
        .route("/tournaments/{id}/open", post(tournaments::open_registration))
        .route("/tournaments/{id}/cancel", post(tournaments::cancel_tournament))
        .route(
            "/tournaments/{id}/registrations",
            post(tournaments::register_couple),
        )
        .route(
            "/tournaments/{id}/registrations/{entrant_id}",
            delete(tournaments::withdraw_entrant),
        )
        .route("/tournaments/{id}/entrants", get(tournaments::list_entrants))
        .route("/tournaments/{id}/seeds", get(tournaments::get_seeds));

    let zone_routes = Router::new()
        .route(
            "/tournaments/{id}/zones/start",
            post(tournaments::start_zone_stage),
        )
        .route("/tournaments/{id}/zones", get(tournaments::list_zones))
        .route("/zones/{zone_id}/standings", get(tournaments::get_standings))
        .route("/zones/{zone_id}/matches", get(tournaments::list_zone_matches))
        .route(
            "/zone-matches/{match_id}/result",
            post(tournaments::record_zone_match_result),
        );

    let bracket_routes = Router::new()
        .route(
            "/tournaments/{id}/bracket",
            post(bracket::build_bracket).get(bracket::get_bracket),
        )
        .route(
            "/tournaments/{id}/bracket/{round}/{position}/start",
            post(bracket::start_match),
        )
        .route(
            "/tournaments/{id}/bracket/{round}/{position}/result",
            post(bracket::record_result),
        )
        .route(
            "/tournaments/{id}/bracket/{round}/{position}/correction",
            post(bracket::correct_result),
        )
        .route(
            "/tournaments/{id}/bracket/{round}/{position}/cancel",
            post(bracket::cancel_match),
        )
        .route(
            "/tournaments/{id}/bracket/{round}/{position}/reactivate",
            post(bracket::reactivate_match),
        );

    Router::new()
        .route("/players", post(tournaments::upsert_player))
        .merge(tournament_routes)
        .merge(zone_routes)
        .merge(bracket_routes)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when the store is reachable, `503 Service Unavailable`
/// otherwise. The memory backend is always healthy.
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"healthy","version":"0.1.0","database":true,"timestamp":"2026-03-14T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = match &state.database {
        Some(db) => {
            let started = Instant::now();
            let healthy = db.health_check().await.is_ok();
            logging::log_database_operation("health_check", started.elapsed().as_millis() as u64);
            healthy
        }
        None => true,
    };

    let status_code = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if db_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
