//! PostgreSQL store.
//!
//! Invariant-checking writes run in one transaction that first locks the
//! tournament row (`FOR UPDATE`). Registration is additionally backed by
//! partial unique indexes, so a racing writer that slips past the checks still
//! fails on insert and is reported as a conflict.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use std::collections::HashMap;
use std::sync::Arc;

use super::repository::{StoredBracket, TournamentStore};
use super::timeouts::{DEFAULT_TRANSACTION_TIMEOUT, with_default_timeout, within};
use crate::bracket::{Bracket, BracketMatchRecord, MatchResult, MatchSlot, Seed, Slot};
use crate::errors::{TournamentError, TournamentResult};
use crate::registration::{Couple, Entrant, EntrantId, Player, PlayerId, normalize_pair};
use crate::tournament::{NewTournament, Tournament, TournamentId, TournamentStatus};
use crate::zone::{
    Zone, ZoneDraft, ZoneId, ZoneMatch, ZoneMatchId, ZoneMatchStatus, check_scores,
};

const TOURNAMENT_COLUMNS: &str = "id, name, club_id, format, category, status, config, \
     zone_stage_started_at, created_at, updated_at";

const ENTRANT_SELECT: &str = "SELECT e.id, e.tournament_id, e.couple_id, c.player_low, \
     c.player_high, e.zone_id, e.active, e.registered_at \
     FROM entrants e JOIN couples c ON c.id = e.couple_id";

const ZONE_MATCH_COLUMNS: &str = "id, zone_id, tournament_id, round, entrant_a, entrant_b, \
     status, score_a, score_b, version, created_at, updated_at";

/// PostgreSQL implementation of [`TournamentStore`]
#[derive(Clone)]
pub struct PgTournamentStore {
    pool: Arc<PgPool>,
}

impl PgTournamentStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Score pair as bound to the `INT` score columns
fn score_columns(score: Option<(u32, u32)>) -> TournamentResult<(Option<i32>, Option<i32>)> {
    let Some((a, b)) = score else {
        return Ok((None, None));
    };
    check_scores(a, b)?;
    // Both fit in i32 once checked
    Ok((Some(a as i32), Some(b as i32)))
}

fn tournament_from_row(row: &PgRow) -> TournamentResult<Tournament> {
    Ok(Tournament {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        club_id: row.try_get("club_id")?,
        format: row.try_get::<String, _>("format")?.parse()?,
        category: row.try_get::<String, _>("category")?.parse()?,
        status: row.try_get::<String, _>("status")?.parse()?,
        config: serde_json::from_value(row.try_get("config")?)?,
        zone_stage_started_at: row
            .try_get::<Option<NaiveDateTime>, _>("zone_stage_started_at")?
            .map(|dt| dt.and_utc()),
        created_at: row.try_get::<NaiveDateTime, _>("created_at")?.and_utc(),
        updated_at: row.try_get::<NaiveDateTime, _>("updated_at")?.and_utc(),
    })
}

fn entrant_from_row(row: &PgRow) -> TournamentResult<Entrant> {
    Ok(Entrant {
        id: row.try_get("id")?,
        tournament_id: row.try_get("tournament_id")?,
        couple_id: row.try_get("couple_id")?,
        players: [row.try_get("player_low")?, row.try_get("player_high")?],
        zone_id: row.try_get("zone_id")?,
        active: row.try_get("active")?,
        registered_at: row.try_get::<NaiveDateTime, _>("registered_at")?.and_utc(),
    })
}

fn couple_from_row(row: &PgRow) -> TournamentResult<Couple> {
    Ok(Couple {
        id: row.try_get("id")?,
        player_low: row.try_get("player_low")?,
        player_high: row.try_get("player_high")?,
        created_at: row.try_get::<NaiveDateTime, _>("created_at")?.and_utc(),
    })
}

fn zone_match_from_row(row: &PgRow) -> TournamentResult<ZoneMatch> {
    let score_a: Option<i32> = row.try_get("score_a")?;
    let score_b: Option<i32> = row.try_get("score_b")?;

    Ok(ZoneMatch {
        id: row.try_get("id")?,
        zone_id: row.try_get("zone_id")?,
        tournament_id: row.try_get("tournament_id")?,
        round: row.try_get::<i32, _>("round")? as u32,
        entrant_a: row.try_get("entrant_a")?,
        entrant_b: row.try_get("entrant_b")?,
        status: row.try_get::<String, _>("status")?.parse()?,
        score: score_a.zip(score_b).map(|(a, b)| (a as u32, b as u32)),
        version: row.try_get("version")?,
        created_at: row.try_get::<NaiveDateTime, _>("created_at")?.and_utc(),
        updated_at: row.try_get::<NaiveDateTime, _>("updated_at")?.and_utc(),
    })
}

fn slot_from_row(row: &PgRow, kind: &str, entrant: &str) -> TournamentResult<Slot> {
    let kind: String = row.try_get(kind)?;
    Slot::from_parts(&kind, row.try_get(entrant)?)
}

fn bracket_record_from_row(row: &PgRow) -> TournamentResult<BracketMatchRecord> {
    let score_a: Option<i32> = row.try_get("score_a")?;
    let score_b: Option<i32> = row.try_get("score_b")?;
    let winner_kind: Option<String> = row.try_get("winner_kind")?;
    let winner = match winner_kind {
        Some(kind) => Some(Slot::from_parts(&kind, row.try_get("winner_entrant")?)?),
        None => None,
    };

    Ok(BracketMatchRecord {
        slot: MatchSlot::new(
            row.try_get::<String, _>("round")?
                .parse()
                .map_err(|e: TournamentError| TournamentError::Corrupt(e.to_string()))?,
            row.try_get::<i32, _>("position")? as u32,
        ),
        side_a: slot_from_row(row, "side_a_kind", "side_a_entrant")?,
        side_b: slot_from_row(row, "side_b_kind", "side_b_entrant")?,
        status: row.try_get::<String, _>("status")?.parse()?,
        court: row.try_get("court")?,
        result: score_a.zip(score_b).map(|(a, b)| MatchResult {
            score_a: a as u32,
            score_b: b as u32,
        }),
        winner,
    })
}

fn seed_from_row(row: &PgRow) -> TournamentResult<Seed> {
    Ok(Seed {
        seed: row.try_get::<i32, _>("seed")? as u32,
        entrant_id: row.try_get("entrant_id")?,
        zone_name: row.try_get("zone_name")?,
        zone_position: row.try_get::<i32, _>("zone_position")? as u32,
        has_bye: row.try_get("has_bye")?,
    })
}

/// Load and row-lock a tournament inside a transaction
async fn lock_tournament(
    conn: &mut PgConnection,
    id: TournamentId,
) -> TournamentResult<Tournament> {
    let row = sqlx::query(&format!(
        "SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(TournamentError::TournamentNotFound(id))?;

    tournament_from_row(&row)
}

async fn set_status(
    conn: &mut PgConnection,
    id: TournamentId,
    status: TournamentStatus,
) -> TournamentResult<()> {
    sqlx::query("UPDATE tournaments SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(status.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn bracket_exists(conn: &mut PgConnection, id: TournamentId) -> TournamentResult<bool> {
    let row = sqlx::query("SELECT 1 AS present FROM brackets WHERE tournament_id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.is_some())
}

async fn insert_bracket_matches(
    conn: &mut PgConnection,
    tournament_id: TournamentId,
    bracket: &Bracket,
) -> TournamentResult<()> {
    for record in bracket.records() {
        let (score_a, score_b) =
            score_columns(record.result.map(|r| (r.score_a, r.score_b)))?;
        sqlx::query(
            r#"
            INSERT INTO bracket_matches (
                tournament_id, round, position,
                side_a_kind, side_a_entrant, side_b_kind, side_b_entrant,
                status, court, score_a, score_b, winner_kind, winner_entrant
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(tournament_id)
        .bind(record.slot.round.as_str())
        .bind(record.slot.position as i32)
        .bind(record.side_a.kind_str())
        .bind(record.side_a.entrant())
        .bind(record.side_b.kind_str())
        .bind(record.side_b.entrant())
        .bind(record.status.as_str())
        .bind(record.court.as_deref())
        .bind(score_a)
        .bind(score_b)
        .bind(record.winner.map(|w| w.kind_str()))
        .bind(record.winner.and_then(|w| w.entrant()))
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

impl PgTournamentStore {
    async fn insert_entrant_tx(
        &self,
        tournament_id: TournamentId,
        couple: &Couple,
    ) -> TournamentResult<Entrant> {
        let mut tx = self.pool.begin().await?;

        let tournament = lock_tournament(&mut tx, tournament_id).await?;
        tournament.ensure_registration_open("register a couple")?;

        let couple_taken = sqlx::query(
            "SELECT id FROM entrants WHERE tournament_id = $1 AND couple_id = $2 AND active",
        )
        .bind(tournament_id)
        .bind(couple.id)
        .fetch_optional(&mut *tx)
        .await?;

        if couple_taken.is_some() {
            return Err(TournamentError::CoupleAlreadyEntered {
                tournament_id,
                couple_id: couple.id,
            });
        }

        let players = couple.players();
        let player_taken = sqlx::query(
            r#"
            SELECT player_id FROM entrant_players
            WHERE tournament_id = $1 AND player_id = ANY($2) AND active
            ORDER BY player_id
            LIMIT 1
            "#,
        )
        .bind(tournament_id)
        .bind(players.as_slice())
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = player_taken {
            return Err(TournamentError::PlayerAlreadyEntered {
                tournament_id,
                player_id: row.try_get("player_id")?,
            });
        }

        let active: i64 =
            sqlx::query("SELECT COUNT(*) AS active FROM entrants WHERE tournament_id = $1 AND active")
                .bind(tournament_id)
                .fetch_one(&mut *tx)
                .await?
                .try_get("active")?;

        if active as usize >= tournament.config.max_entrants {
            return Err(TournamentError::TournamentFull(tournament_id));
        }

        let row = sqlx::query(
            r#"
            INSERT INTO entrants (tournament_id, couple_id)
            VALUES ($1, $2)
            RETURNING id, registered_at
            "#,
        )
        .bind(tournament_id)
        .bind(couple.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                TournamentError::CoupleAlreadyEntered {
                    tournament_id,
                    couple_id: couple.id,
                }
            } else {
                e.into()
            }
        })?;

        let entrant_id: EntrantId = row.try_get("id")?;

        // One row per player so a violation names the player
        for player_id in players {
            sqlx::query(
                "INSERT INTO entrant_players (entrant_id, tournament_id, player_id) VALUES ($1, $2, $3)",
            )
            .bind(entrant_id)
            .bind(tournament_id)
            .bind(player_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    TournamentError::PlayerAlreadyEntered {
                        tournament_id,
                        player_id,
                    }
                } else {
                    e.into()
                }
            })?;
        }

        tx.commit().await?;

        Ok(Entrant {
            id: entrant_id,
            tournament_id,
            couple_id: couple.id,
            players,
            zone_id: None,
            active: true,
            registered_at: row.try_get::<NaiveDateTime, _>("registered_at")?.and_utc(),
        })
    }

    async fn withdraw_entrant_tx(
        &self,
        tournament_id: TournamentId,
        entrant_id: EntrantId,
    ) -> TournamentResult<Entrant> {
        let mut tx = self.pool.begin().await?;

        lock_tournament(&mut tx, tournament_id)
            .await?
            .ensure_registration_open("withdraw an entrant")?;

        let updated = sqlx::query(
            "UPDATE entrants SET active = FALSE WHERE id = $1 AND tournament_id = $2 AND active RETURNING id",
        )
        .bind(entrant_id)
        .bind(tournament_id)
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            return Err(TournamentError::EntrantNotFound {
                tournament_id,
                entrant_id,
            });
        }

        sqlx::query("UPDATE entrant_players SET active = FALSE WHERE entrant_id = $1")
            .bind(entrant_id)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(&format!("{ENTRANT_SELECT} WHERE e.id = $1"))
            .bind(entrant_id)
            .fetch_one(&mut *tx)
            .await?;
        let entrant = entrant_from_row(&row)?;

        tx.commit().await?;
        Ok(entrant)
    }

    async fn cancel_tournament_tx(&self, id: TournamentId) -> TournamentResult<Tournament> {
        let mut tx = self.pool.begin().await?;

        let tournament = lock_tournament(&mut tx, id).await?;
        if tournament.status.is_terminal() {
            return Err(tournament.state_error("cancel the tournament"));
        }

        let row = sqlx::query(&format!(
            "UPDATE tournaments SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {TOURNAMENT_COLUMNS}"
        ))
        .bind(id)
        .bind(TournamentStatus::Canceled.as_str())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE entrants SET active = FALSE WHERE tournament_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE entrant_players SET active = FALSE WHERE tournament_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tournament_from_row(&row)
    }

    async fn start_zone_stage_tx(
        &self,
        tournament_id: TournamentId,
        drafts: &[ZoneDraft],
        status_after: TournamentStatus,
    ) -> TournamentResult<Vec<Zone>> {
        let mut tx = self.pool.begin().await?;

        lock_tournament(&mut tx, tournament_id)
            .await?
            .ensure_zone_stage_startable()?;

        let active: Vec<EntrantId> = sqlx::query(
            "SELECT id FROM entrants WHERE tournament_id = $1 AND active ORDER BY id",
        )
        .bind(tournament_id)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|row| row.try_get("id"))
        .collect::<Result<_, _>>()?;

        let mut drawn: Vec<EntrantId> = drafts
            .iter()
            .flat_map(|d| d.entrant_ids.iter().copied())
            .collect();
        drawn.sort_unstable();
        if drawn != active {
            return Err(TournamentError::ConcurrentModification(format!(
                "entrant list of tournament {tournament_id}"
            )));
        }

        let mut zones = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let row = sqlx::query(
                "INSERT INTO zones (tournament_id, name) VALUES ($1, $2) RETURNING id, created_at",
            )
            .bind(tournament_id)
            .bind(&draft.name)
            .fetch_one(&mut *tx)
            .await?;
            let zone_id: ZoneId = row.try_get("id")?;

            sqlx::query("UPDATE entrants SET zone_id = $1 WHERE id = ANY($2)")
                .bind(zone_id)
                .bind(draft.entrant_ids.as_slice())
                .execute(&mut *tx)
                .await?;

            for fixture in &draft.fixtures {
                sqlx::query(
                    r#"
                    INSERT INTO zone_matches (zone_id, tournament_id, round, entrant_a, entrant_b)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(zone_id)
                .bind(tournament_id)
                .bind(fixture.round as i32)
                .bind(fixture.entrant_a)
                .bind(fixture.entrant_b)
                .execute(&mut *tx)
                .await?;
            }

            zones.push(Zone {
                id: zone_id,
                tournament_id,
                name: draft.name.clone(),
                entrant_ids: draft.entrant_ids.clone(),
                created_at: row.try_get::<NaiveDateTime, _>("created_at")?.and_utc(),
            });
        }

        sqlx::query(
            r#"
            UPDATE tournaments
            SET status = $2, zone_stage_started_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(tournament_id)
        .bind(status_after.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(zones)
    }

    async fn save_zone_match_tx(&self, m: &ZoneMatch) -> TournamentResult<ZoneMatch> {
        let mut tx = self.pool.begin().await?;

        let tournament_id: TournamentId =
            sqlx::query("SELECT tournament_id FROM zone_matches WHERE id = $1")
                .bind(m.id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(TournamentError::ZoneMatchNotFound(m.id))?
                .try_get("tournament_id")?;

        let tournament = lock_tournament(&mut tx, tournament_id).await?;
        let locked = bracket_exists(&mut tx, tournament_id).await?;
        tournament.ensure_zone_results_open(m.id, locked)?;
        let (score_a, score_b) = score_columns(m.score)?;

        let row = sqlx::query(&format!(
            r#"
            UPDATE zone_matches
            SET status = $2, score_a = $3, score_b = $4, version = version + 1, updated_at = NOW()
            WHERE id = $1 AND version = $5
            RETURNING {ZONE_MATCH_COLUMNS}
            "#
        ))
        .bind(m.id)
        .bind(m.status.as_str())
        .bind(score_a)
        .bind(score_b)
        .bind(m.version)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| TournamentError::ConcurrentModification(format!("zone match {}", m.id)))?;

        let saved = zone_match_from_row(&row)?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn insert_bracket_tx(
        &self,
        tournament_id: TournamentId,
        zone_versions: &[(ZoneMatchId, i64)],
        seeds: &[Seed],
        bracket: &Bracket,
        status_after: TournamentStatus,
    ) -> TournamentResult<i64> {
        let mut tx = self.pool.begin().await?;

        // Zone results are saved under the same row lock, so they cannot
        // change between this read and the commit
        let tournament = lock_tournament(&mut tx, tournament_id).await?;
        let exists = bracket_exists(&mut tx, tournament_id).await?;
        let rows = sqlx::query(
            "SELECT id, version, status FROM zone_matches WHERE tournament_id = $1 ORDER BY id",
        )
        .bind(tournament_id)
        .fetch_all(&mut *tx)
        .await?;

        let mut stored = Vec::with_capacity(rows.len());
        let mut pending = 0;
        for row in &rows {
            let status: ZoneMatchStatus = row.try_get::<String, _>("status")?.parse()?;
            if status != ZoneMatchStatus::Finished {
                pending += 1;
            }
            let id: ZoneMatchId = row.try_get("id")?;
            let version: i64 = row.try_get("version")?;
            stored.push((id, version));
        }

        tournament.ensure_bracket_buildable(exists, pending)?;

        if stored != zone_versions {
            return Err(TournamentError::ConcurrentModification(format!(
                "zone results of tournament {tournament_id}"
            )));
        }

        for seed in seeds {
            sqlx::query(
                r#"
                INSERT INTO seeds (tournament_id, seed, entrant_id, zone_name, zone_position, has_bye)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(tournament_id)
            .bind(seed.seed as i32)
            .bind(seed.entrant_id)
            .bind(&seed.zone_name)
            .bind(seed.zone_position as i32)
            .bind(seed.has_bye)
            .execute(&mut *tx)
            .await?;
        }

        let version: i64 = sqlx::query(
            r#"
            INSERT INTO brackets (tournament_id, bracket_size, entrant_count, champion_entrant_id)
            VALUES ($1, $2, $3, $4)
            RETURNING version
            "#,
        )
        .bind(tournament_id)
        .bind(bracket.bracket_size() as i32)
        .bind(bracket.entrant_count() as i32)
        .bind(bracket.champion())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                TournamentError::BracketAlreadyBuilt(tournament_id)
            } else {
                e.into()
            }
        })?
        .try_get("version")?;

        insert_bracket_matches(&mut tx, tournament_id, bracket).await?;
        set_status(&mut tx, tournament_id, status_after).await?;

        tx.commit().await?;
        Ok(version)
    }

    async fn save_bracket_tx(
        &self,
        tournament_id: TournamentId,
        bracket: &Bracket,
        expected_version: i64,
        status_after: Option<TournamentStatus>,
    ) -> TournamentResult<i64> {
        let mut tx = self.pool.begin().await?;

        lock_tournament(&mut tx, tournament_id)
            .await?
            .ensure_status(TournamentStatus::InProgress, "update the bracket")?;

        let updated = sqlx::query(
            r#"
            UPDATE brackets
            SET version = version + 1, champion_entrant_id = $3, updated_at = NOW()
            WHERE tournament_id = $1 AND version = $2
            RETURNING version
            "#,
        )
        .bind(tournament_id)
        .bind(expected_version)
        .bind(bracket.champion())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = updated else {
            if bracket_exists(&mut tx, tournament_id).await? {
                return Err(TournamentError::ConcurrentModification(format!(
                    "bracket of tournament {tournament_id}"
                )));
            }
            return Err(TournamentError::BracketNotFound(tournament_id));
        };
        let version: i64 = row.try_get("version")?;

        sqlx::query("DELETE FROM bracket_matches WHERE tournament_id = $1")
            .bind(tournament_id)
            .execute(&mut *tx)
            .await?;
        insert_bracket_matches(&mut tx, tournament_id, bracket).await?;

        if let Some(status) = status_after {
            set_status(&mut tx, tournament_id, status).await?;
        }

        tx.commit().await?;
        Ok(version)
    }

    async fn load_bracket_inner(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Option<StoredBracket>> {
        let Some(header) = sqlx::query(
            r#"
            SELECT bracket_size, entrant_count, champion_entrant_id, version
            FROM brackets WHERE tournament_id = $1
            "#,
        )
        .bind(tournament_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        else {
            return Ok(None);
        };

        let rows = sqlx::query(
            "SELECT * FROM bracket_matches WHERE tournament_id = $1 ORDER BY round, position",
        )
        .bind(tournament_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        let records = rows
            .iter()
            .map(bracket_record_from_row)
            .collect::<TournamentResult<Vec<_>>>()?;

        let bracket = Bracket::restore(
            header.try_get::<i32, _>("bracket_size")? as usize,
            header.try_get::<i32, _>("entrant_count")? as usize,
            header.try_get("champion_entrant_id")?,
            &records,
        )?;

        Ok(Some(StoredBracket {
            bracket,
            version: header.try_get("version")?,
        }))
    }

    async fn zone_members(
        &self,
        filter: &str,
        id: i64,
    ) -> TournamentResult<HashMap<ZoneId, Vec<EntrantId>>> {
        let rows = sqlx::query(&format!(
            "SELECT id, zone_id FROM entrants WHERE {filter} = $1 AND zone_id IS NOT NULL ORDER BY id"
        ))
        .bind(id)
        .fetch_all(self.pool.as_ref())
        .await?;

        let mut members: HashMap<ZoneId, Vec<EntrantId>> = HashMap::new();
        for row in &rows {
            members
                .entry(row.try_get("zone_id")?)
                .or_default()
                .push(row.try_get("id")?);
        }
        Ok(members)
    }
}

#[async_trait]
impl TournamentStore for PgTournamentStore {
    async fn create_tournament(&self, new: &NewTournament) -> TournamentResult<Tournament> {
        let config_json = serde_json::to_value(&new.config)?;

        let row = with_default_timeout(
            sqlx::query(&format!(
                r#"
                INSERT INTO tournaments (name, club_id, format, category, status, config)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING {TOURNAMENT_COLUMNS}
                "#
            ))
            .bind(&new.name)
            .bind(new.club_id)
            .bind(new.format.as_str())
            .bind(new.category.as_str())
            .bind(TournamentStatus::NotStarted.as_str())
            .bind(config_json)
            .fetch_one(self.pool.as_ref()),
        )
        .await?;

        tournament_from_row(&row)
    }

    async fn get_tournament(&self, id: TournamentId) -> TournamentResult<Option<Tournament>> {
        let row = with_default_timeout(
            sqlx::query(&format!(
                "SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1"
            ))
            .bind(id)
            .fetch_optional(self.pool.as_ref()),
        )
        .await?;

        row.as_ref().map(tournament_from_row).transpose()
    }

    async fn transition_tournament(
        &self,
        id: TournamentId,
        from: &[TournamentStatus],
        to: TournamentStatus,
        action: &'static str,
    ) -> TournamentResult<Tournament> {
        let from: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();

        let row = with_default_timeout(
            sqlx::query(&format!(
                r#"
                UPDATE tournaments SET status = $2, updated_at = NOW()
                WHERE id = $1 AND status = ANY($3)
                RETURNING {TOURNAMENT_COLUMNS}
                "#
            ))
            .bind(id)
            .bind(to.as_str())
            .bind(&from)
            .fetch_optional(self.pool.as_ref()),
        )
        .await?;

        match row {
            Some(row) => tournament_from_row(&row),
            None => {
                let current = self
                    .get_tournament(id)
                    .await?
                    .ok_or(TournamentError::TournamentNotFound(id))?;
                Err(current.state_error(action))
            }
        }
    }

    async fn cancel_tournament(&self, id: TournamentId) -> TournamentResult<Tournament> {
        within(DEFAULT_TRANSACTION_TIMEOUT, self.cancel_tournament_tx(id)).await
    }

    async fn upsert_player(&self, player: &Player) -> TournamentResult<Player> {
        let row = with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO players (id, display_name, ranking)
                VALUES ($1, $2, $3)
                ON CONFLICT (id)
                DO UPDATE SET
                    display_name = EXCLUDED.display_name,
                    ranking = EXCLUDED.ranking,
                    updated_at = NOW()
                RETURNING id, display_name, ranking
                "#,
            )
            .bind(player.id)
            .bind(&player.display_name)
            .bind(player.ranking)
            .fetch_one(self.pool.as_ref()),
        )
        .await?;

        Ok(Player {
            id: row.try_get("id")?,
            display_name: row.try_get("display_name")?,
            ranking: row.try_get("ranking")?,
        })
    }

    async fn get_player(&self, id: PlayerId) -> TournamentResult<Option<Player>> {
        let row = with_default_timeout(
            sqlx::query("SELECT id, display_name, ranking FROM players WHERE id = $1")
                .bind(id)
                .fetch_optional(self.pool.as_ref()),
        )
        .await?;

        match row {
            Some(row) => Ok(Some(Player {
                id: row.try_get("id")?,
                display_name: row.try_get("display_name")?,
                ranking: row.try_get("ranking")?,
            })),
            None => Ok(None),
        }
    }

    async fn find_or_create_couple(
        &self,
        a: PlayerId,
        b: PlayerId,
    ) -> TournamentResult<Couple> {
        if a == b {
            return Err(TournamentError::SamePlayer(a));
        }
        let (low, high) = normalize_pair(a, b);

        with_default_timeout(
            sqlx::query(
                r#"
                INSERT INTO couples (player_low, player_high)
                VALUES ($1, $2)
                ON CONFLICT (player_low, player_high) DO NOTHING
                "#,
            )
            .bind(low)
            .bind(high)
            .execute(self.pool.as_ref()),
        )
        .await?;

        let row = with_default_timeout(
            sqlx::query(
                r#"
                SELECT id, player_low, player_high, created_at
                FROM couples WHERE player_low = $1 AND player_high = $2
                "#,
            )
            .bind(low)
            .bind(high)
            .fetch_one(self.pool.as_ref()),
        )
        .await?;

        couple_from_row(&row)
    }

    async fn insert_entrant(
        &self,
        tournament_id: TournamentId,
        couple: &Couple,
    ) -> TournamentResult<Entrant> {
        within(
            DEFAULT_TRANSACTION_TIMEOUT,
            self.insert_entrant_tx(tournament_id, couple),
        )
        .await
    }

    async fn withdraw_entrant(
        &self,
        tournament_id: TournamentId,
        entrant_id: EntrantId,
    ) -> TournamentResult<Entrant> {
        within(
            DEFAULT_TRANSACTION_TIMEOUT,
            self.withdraw_entrant_tx(tournament_id, entrant_id),
        )
        .await
    }

    async fn list_entrants(&self, tournament_id: TournamentId) -> TournamentResult<Vec<Entrant>> {
        let rows = with_default_timeout(
            sqlx::query(&format!(
                "{ENTRANT_SELECT} WHERE e.tournament_id = $1 AND e.active ORDER BY e.id"
            ))
            .bind(tournament_id)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        rows.iter().map(entrant_from_row).collect()
    }

    async fn start_zone_stage(
        &self,
        tournament_id: TournamentId,
        drafts: &[ZoneDraft],
        status_after: TournamentStatus,
    ) -> TournamentResult<Vec<Zone>> {
        within(
            DEFAULT_TRANSACTION_TIMEOUT,
            self.start_zone_stage_tx(tournament_id, drafts, status_after),
        )
        .await
    }

    async fn list_zones(&self, tournament_id: TournamentId) -> TournamentResult<Vec<Zone>> {
        let rows = with_default_timeout(
            sqlx::query(
                "SELECT id, tournament_id, name, created_at FROM zones WHERE tournament_id = $1 ORDER BY id",
            )
            .bind(tournament_id)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        let mut members = self.zone_members("tournament_id", tournament_id).await?;

        rows.iter()
            .map(|row| {
                let id: ZoneId = row.try_get("id")?;
                Ok(Zone {
                    id,
                    tournament_id: row.try_get("tournament_id")?,
                    name: row.try_get("name")?,
                    entrant_ids: members.remove(&id).unwrap_or_default(),
                    created_at: row.try_get::<NaiveDateTime, _>("created_at")?.and_utc(),
                })
            })
            .collect()
    }

    async fn get_zone(&self, zone_id: ZoneId) -> TournamentResult<Option<Zone>> {
        let Some(row) = with_default_timeout(
            sqlx::query("SELECT id, tournament_id, name, created_at FROM zones WHERE id = $1")
                .bind(zone_id)
                .fetch_optional(self.pool.as_ref()),
        )
        .await?
        else {
            return Ok(None);
        };

        let mut members = self.zone_members("zone_id", zone_id).await?;

        Ok(Some(Zone {
            id: zone_id,
            tournament_id: row.try_get("tournament_id")?,
            name: row.try_get("name")?,
            entrant_ids: members.remove(&zone_id).unwrap_or_default(),
            created_at: row.try_get::<NaiveDateTime, _>("created_at")?.and_utc(),
        }))
    }

    async fn list_zone_matches(&self, zone_id: ZoneId) -> TournamentResult<Vec<ZoneMatch>> {
        let rows = with_default_timeout(
            sqlx::query(&format!(
                "SELECT {ZONE_MATCH_COLUMNS} FROM zone_matches WHERE zone_id = $1 ORDER BY round, id"
            ))
            .bind(zone_id)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        rows.iter().map(zone_match_from_row).collect()
    }

    async fn list_tournament_zone_matches(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Vec<ZoneMatch>> {
        let rows = with_default_timeout(
            sqlx::query(&format!(
                "SELECT {ZONE_MATCH_COLUMNS} FROM zone_matches WHERE tournament_id = $1 ORDER BY id"
            ))
            .bind(tournament_id)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        rows.iter().map(zone_match_from_row).collect()
    }

    async fn get_zone_match(&self, id: ZoneMatchId) -> TournamentResult<Option<ZoneMatch>> {
        let row = with_default_timeout(
            sqlx::query(&format!(
                "SELECT {ZONE_MATCH_COLUMNS} FROM zone_matches WHERE id = $1"
            ))
            .bind(id)
            .fetch_optional(self.pool.as_ref()),
        )
        .await?;

        row.as_ref().map(zone_match_from_row).transpose()
    }

    async fn save_zone_match(&self, m: &ZoneMatch) -> TournamentResult<ZoneMatch> {
        within(DEFAULT_TRANSACTION_TIMEOUT, self.save_zone_match_tx(m)).await
    }

    async fn insert_bracket(
        &self,
        tournament_id: TournamentId,
        zone_versions: &[(ZoneMatchId, i64)],
        seeds: &[Seed],
        bracket: &Bracket,
        status_after: TournamentStatus,
    ) -> TournamentResult<i64> {
        within(
            DEFAULT_TRANSACTION_TIMEOUT,
            self.insert_bracket_tx(tournament_id, zone_versions, seeds, bracket, status_after),
        )
        .await
    }

    async fn load_bracket(
        &self,
        tournament_id: TournamentId,
    ) -> TournamentResult<Option<StoredBracket>> {
        within(
            DEFAULT_TRANSACTION_TIMEOUT,
            self.load_bracket_inner(tournament_id),
        )
        .await
    }

    async fn save_bracket(
        &self,
        tournament_id: TournamentId,
        bracket: &Bracket,
        expected_version: i64,
        status_after: Option<TournamentStatus>,
    ) -> TournamentResult<i64> {
        within(
            DEFAULT_TRANSACTION_TIMEOUT,
            self.save_bracket_tx(tournament_id, bracket, expected_version, status_after),
        )
        .await
    }

    async fn list_seeds(&self, tournament_id: TournamentId) -> TournamentResult<Vec<Seed>> {
        let rows = with_default_timeout(
            sqlx::query(
                r#"
                SELECT seed, entrant_id, zone_name, zone_position, has_bye
                FROM seeds WHERE tournament_id = $1 ORDER BY seed
                "#,
            )
            .bind(tournament_id)
            .fetch_all(self.pool.as_ref()),
        )
        .await?;

        rows.iter().map(seed_from_row).collect()
    }
}
