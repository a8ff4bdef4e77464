//! Router tests against the in-memory store.
//!
//! Requests go through the full middleware stack with `tower::ServiceExt::oneshot`.

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use zc_server::api::{AppState, create_router, middleware::REQUEST_ID_HEADER};
use zonecup::TournamentManager;
use zonecup::db::MemoryStore;
use zonecup::tournament::TournamentConfig;

fn app() -> Router {
    create_router(AppState {
        manager: TournamentManager::new(Arc::new(MemoryStore::new())),
        database: None,
        tournament_defaults: TournamentConfig::default(),
    })
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn seed_players(app: &Router, ids: impl IntoIterator<Item = i64>) {
    for id in ids {
        let (status, _) = send(
            app,
            Method::POST,
            "/api/v1/players",
            Some(json!({ "id": id, "display_name": format!("Player {id}"), "ranking": 100 - id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}

/// Create a zone-then-bracket tournament and open registration
async fn open_tournament(app: &Router) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/v1/tournaments",
        Some(json!({
            "name": "Spring Cup",
            "club_id": 7,
            "format": "ZONE_THEN_BRACKET",
            "category": "MIXED",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "NOT_STARTED");
    let id = body["id"].as_i64().unwrap();

    let (status, body) = send(app, Method::POST, &format!("/api/v1/tournaments/{id}/open"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "PAIRING");
    id
}

async fn register(app: &Router, id: i64, a: i64, b: i64) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        &format!("/api/v1/tournaments/{id}/registrations"),
        Some(json!({ "player_a": a, "player_b": b })),
    )
    .await
}

#[tokio::test]
async fn test_health_check_with_memory_store() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_request_id_is_echoed_or_generated() {
    let app = app();

    let request = Request::builder()
        .uri("/health")
        .header(REQUEST_ID_HEADER, "cup-req-1")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()[REQUEST_ID_HEADER], "cup-req-1");

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));
}

#[tokio::test]
async fn test_error_kinds_map_to_status_codes() {
    let app = app();
    seed_players(&app, 1..=4).await;

    // NotFound
    let (status, body) = send(&app, Method::GET, "/api/v1/tournaments/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let id = open_tournament(&app).await;

    // Validation
    let (status, body) = register(&app, id, 1, 1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    // Conflict
    let (status, _) = register(&app, id, 1, 2).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = register(&app, id, 2, 3).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "conflict");

    let (status, _) = send(&app, Method::POST, &format!("/api/v1/tournaments/{id}/open"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Precondition
    let (status, body) = send(&app, Method::POST, &format!("/api/v1/tournaments/{id}/bracket"), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "precondition");

    let (status, _) = send(&app, Method::POST, &format!("/api/v1/tournaments/{id}/zones/start"), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_unknown_round_is_a_bad_request() {
    let app = app();
    let id = open_tournament(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/v1/tournaments/{id}/bracket/EIGHTHFINAL/0/cancel"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn test_create_tournament_rejects_invalid_config() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/tournaments",
        Some(json!({
            "name": "Broken Cup",
            "club_id": 7,
            "format": "ZONE_THEN_BRACKET",
            "category": "MALE",
            "config": {
                "scoring": { "win": 2, "tie": 1, "loss": 0 },
                "min_entrants": 2,
                "max_entrants": 64,
                "zone_size": 3
            }
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("max_entrants"));
}

#[tokio::test]
async fn test_two_couples_play_to_a_champion() {
    let app = app();
    seed_players(&app, 1..=4).await;
    let id = open_tournament(&app).await;

    let (_, first) = register(&app, id, 1, 2).await;
    let (_, second) = register(&app, id, 3, 4).await;
    let entrants = [first["id"].as_i64().unwrap(), second["id"].as_i64().unwrap()];

    let (status, entrant_list) =
        send(&app, Method::GET, &format!("/api/v1/tournaments/{id}/entrants"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entrant_list.as_array().unwrap().len(), 2);

    // One zone of two: a single zone match
    let (status, zones) =
        send(&app, Method::POST, &format!("/api/v1/tournaments/{id}/zones/start"), None).await;
    assert_eq!(status, StatusCode::OK);
    let zones = zones.as_array().unwrap();
    assert_eq!(zones.len(), 1);
    let zone_id = zones[0]["id"].as_i64().unwrap();

    let (_, matches) = send(&app, Method::GET, &format!("/api/v1/zones/{zone_id}/matches"), None).await;
    let matches = matches.as_array().unwrap();
    assert_eq!(matches.len(), 1);
    let match_id = matches[0]["id"].as_i64().unwrap();

    // Recording the last zone result builds the bracket
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/v1/zone-matches/{match_id}/result"),
        Some(json!({ "score_a": 6, "score_b": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, standings) =
        send(&app, Method::GET, &format!("/api/v1/zones/{zone_id}/standings"), None).await;
    assert_eq!(standings[0]["position"], 1);
    assert_eq!(standings[0]["wins"], 1);

    let (status, tournament) = send(&app, Method::GET, &format!("/api/v1/tournaments/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tournament["status"], "IN_PROGRESS");

    let (_, seeds) = send(&app, Method::GET, &format!("/api/v1/tournaments/{id}/seeds"), None).await;
    assert_eq!(seeds.as_array().unwrap().len(), 2);
    assert_eq!(seeds[0]["seed"], 1);

    let (status, bracket) = send(&app, Method::GET, &format!("/api/v1/tournaments/{id}/bracket"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bracket["bracket_size"], 2);
    assert_eq!(bracket["rounds"][0]["name"], "FINAL");

    // Zone results are frozen once the bracket exists
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/v1/zone-matches/{match_id}/result"),
        Some(json!({ "score_a": 2, "score_b": 6 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let final_uri = format!("/api/v1/tournaments/{id}/bracket/FINAL/0");

    // A result before the match is on court is rejected
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("{final_uri}/result"),
        Some(json!({ "score_a": 6, "score_b": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("{final_uri}/start"),
        Some(json!({ "court": "Court 1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Draws cannot decide a knockout match
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("{final_uri}/result"),
        Some(json!({ "score_a": 5, "score_b": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, bracket) = send(
        &app,
        Method::POST,
        &format!("{final_uri}/result"),
        Some(json!({ "score_a": 6, "score_b": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let champion = bracket["champion"].as_i64().unwrap();
    assert!(entrants.contains(&champion));

    let (_, tournament) = send(&app, Method::GET, &format!("/api/v1/tournaments/{id}"), None).await;
    assert_eq!(tournament["status"], "FINISHED");

    // Finished tournaments reject further bracket commands
    let (status, _) = send(&app, Method::POST, &format!("{final_uri}/reactivate"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_withdraw_and_cancel() {
    let app = app();
    seed_players(&app, 1..=4).await;
    let id = open_tournament(&app).await;

    let (_, entrant) = register(&app, id, 1, 2).await;
    let entrant_id = entrant["id"].as_i64().unwrap();

    let (status, withdrawn) = send(
        &app,
        Method::DELETE,
        &format!("/api/v1/tournaments/{id}/registrations/{entrant_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(withdrawn["active"], false);

    // Player 1 is free to enter again
    let (status, _) = register(&app, id, 1, 3).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, tournament) =
        send(&app, Method::POST, &format!("/api/v1/tournaments/{id}/cancel"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tournament["status"], "CANCELED");

    let (status, _) = register(&app, id, 2, 4).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
