//! Durable storage for anticipations.
//!
//! `trigger`, `metadata`, and `context_entities` are JSON columns. Timestamps
//! are written through [`crate::time::to_db`], so every stored instant is UTC.
//! The expiry check in [`AnticipationStore::active`] runs on parsed values
//! rather than in SQL, which keeps rows written with a local offset correct.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::anticipation::types::{self, Anticipation};
use crate::context::RequestContext;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::time;

const COLUMNS: &str = "id, description, context, context_entities_json, trigger_json, \
     metadata_json, recurring, cooldown_seconds, created_at, expires_at, resolved_at, \
     deleted_at, last_fired_at";

#[derive(Debug, Clone)]
pub struct AnticipationStore {
    db: Database,
}

impl AnticipationStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Insert a new anticipation, assigning a UUID v7 when `id` is empty.
    pub fn create(&self, ctx: &RequestContext, anticipation: &Anticipation) -> Result<Anticipation> {
        if anticipation.description.trim().is_empty() {
            return Err(Error::Invalid("anticipation description must not be empty".into()));
        }

        let mut stored = anticipation.clone();
        if stored.id.is_empty() {
            stored.id = uuid::Uuid::now_v7().to_string();
        }
        // Return exactly what later reads will see.
        stored.created_at = time::stored_precision(stored.created_at);
        for ts in [
            &mut stored.expires_at,
            &mut stored.resolved_at,
            &mut stored.deleted_at,
            &mut stored.last_fired_at,
        ] {
            *ts = ts.map(time::stored_precision);
        }
        let trigger_json = serde_json::to_string(&stored.trigger)?;
        let metadata_json = serde_json::to_string(&stored.metadata)?;
        let entities_json = serde_json::to_string(&stored.context_entities)?;

        self.db.with_conn(ctx, |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO anticipations ({COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    stored.id,
                    stored.description,
                    stored.context,
                    entities_json,
                    trigger_json,
                    metadata_json,
                    stored.recurring,
                    stored.cooldown_seconds,
                    time::to_db(stored.created_at),
                    stored.expires_at.map(time::to_db),
                    stored.resolved_at.map(time::to_db),
                    stored.deleted_at.map(time::to_db),
                    stored.last_fired_at.map(time::to_db),
                ],
            )?;
            Ok(())
        })?;

        tracing::info!(
            id = %stored.id,
            description = %stored.description,
            recurring = stored.recurring,
            "anticipation created"
        );
        Ok(stored)
    }

    /// Fetch by id, including resolved and soft-deleted rows.
    pub fn get(&self, ctx: &RequestContext, id: &str) -> Result<Anticipation> {
        self.db
            .with_conn(ctx, |conn| fetch(conn, id))?
            .ok_or_else(|| Error::anticipation_not_found(id))
    }

    /// Active anticipations, oldest first.
    pub fn active(&self, ctx: &RequestContext) -> Result<Vec<Anticipation>> {
        self.active_at(ctx, Utc::now())
    }

    /// Active anticipations as of `now`, oldest first.
    pub fn active_at(&self, ctx: &RequestContext, now: DateTime<Utc>) -> Result<Vec<Anticipation>> {
        let rows = self.db.with_conn(ctx, |conn| {
            query(
                conn,
                &format!(
                    "SELECT {COLUMNS} FROM anticipations \
                     WHERE resolved_at IS NULL AND deleted_at IS NULL \
                     ORDER BY created_at ASC, rowid ASC"
                ),
            )
        })?;

        let active: Vec<Anticipation> = rows.into_iter().filter(|a| a.is_active_at(now)).collect();
        tracing::debug!(count = active.len(), "active anticipations loaded");
        Ok(active)
    }

    /// Every row when `include_inactive`, otherwise the active set.
    pub fn all(&self, ctx: &RequestContext, include_inactive: bool) -> Result<Vec<Anticipation>> {
        if !include_inactive {
            return self.active(ctx);
        }
        self.db.with_conn(ctx, |conn| {
            query(
                conn,
                &format!("SELECT {COLUMNS} FROM anticipations ORDER BY created_at ASC, rowid ASC"),
            )
        })
    }

    /// Mark resolved. Resolving an already-resolved row changes nothing.
    pub fn resolve(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        self.db.with_conn(ctx, |conn| {
            let rows = conn.execute(
                "UPDATE anticipations SET resolved_at = ?1 WHERE id = ?2 AND resolved_at IS NULL",
                params![time::now_db(), id],
            )?;
            if rows == 0 {
                require_exists(conn, id)?;
                tracing::debug!(id, "anticipation already resolved");
            } else {
                tracing::info!(id, "anticipation resolved");
            }
            Ok(())
        })
    }

    /// Soft delete. Fails with `NotFound` if absent or already deleted.
    pub fn delete(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        self.db.with_conn(ctx, |conn| {
            let rows = conn.execute(
                "UPDATE anticipations SET deleted_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
                params![time::now_db(), id],
            )?;
            if rows == 0 {
                return Err(Error::anticipation_not_found(id));
            }
            tracing::info!(id, "anticipation deleted");
            Ok(())
        })
    }

    /// Record a firing at the current time.
    ///
    /// `last_fired_at` only moves forward: a call that would not advance it
    /// leaves the row untouched.
    pub fn mark_fired(&self, ctx: &RequestContext, id: &str) -> Result<()> {
        self.db.with_conn(ctx, |conn| {
            let now = time::now_db();
            let rows = conn.execute(
                "UPDATE anticipations SET last_fired_at = ?1 \
                 WHERE id = ?2 AND (last_fired_at IS NULL OR last_fired_at < ?1)",
                params![now, id],
            )?;
            if rows == 0 {
                require_exists(conn, id)?;
            }
            tracing::debug!(id, "anticipation fired");
            Ok(())
        })
    }

    /// Whether `id` fired within its cooldown (`default` when the row has
    /// none). Unknown ids are never on cooldown.
    pub fn on_cooldown(&self, ctx: &RequestContext, id: &str, default: Duration) -> Result<bool> {
        let state = self.db.with_conn(ctx, |conn| firing_state(conn, id))?;
        Ok(match state {
            Some(state) => state.on_cooldown(default, Utc::now()),
            None => false,
        })
    }

    /// Atomically claim a firing.
    ///
    /// Reads the firing state and, if the row is off cooldown, advances
    /// `last_fired_at` only while it still holds the value that was read.
    /// Returns `true` for the single caller that wins; `false` if the row is
    /// on cooldown, unknown, or another writer got there first.
    pub fn claim_firing(&self, ctx: &RequestContext, id: &str, default: Duration) -> Result<bool> {
        self.db.with_conn(ctx, |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let now = Utc::now();

            let Some(state) = firing_state(&tx, id)? else {
                return Ok(false);
            };
            if state.on_cooldown(default, now) {
                tracing::debug!(id, "anticipation on cooldown");
                return Ok(false);
            }

            let rows = tx.execute(
                "UPDATE anticipations SET last_fired_at = ?1 WHERE id = ?2 AND last_fired_at IS ?3",
                params![time::to_db(now), id, state.last_fired_raw],
            )?;
            tx.commit()?;

            let claimed = rows == 1;
            tracing::debug!(id, claimed, "anticipation firing claim");
            Ok(claimed)
        })
    }
}

/// The columns that decide cooldown, with `last_fired_at` kept verbatim for
/// the compare-and-set.
struct FiringState {
    cooldown_seconds: u32,
    last_fired_raw: Option<String>,
    last_fired: Option<DateTime<Utc>>,
}

impl FiringState {
    fn on_cooldown(&self, default: Duration, now: DateTime<Utc>) -> bool {
        types::on_cooldown(self.cooldown_seconds, self.last_fired, default, now)
    }
}

fn firing_state(conn: &Connection, id: &str) -> Result<Option<FiringState>> {
    let row = conn
        .query_row(
            "SELECT cooldown_seconds, last_fired_at FROM anticipations WHERE id = ?1",
            params![id],
            |row| Ok((row.get::<_, u32>(0)?, row.get::<_, Option<String>>(1)?)),
        )
        .optional()?;

    let Some((cooldown_seconds, last_fired_raw)) = row else {
        return Ok(None);
    };
    let last_fired = last_fired_raw
        .as_deref()
        .map(time::parse)
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;

    Ok(Some(FiringState {
        cooldown_seconds,
        last_fired_raw,
        last_fired,
    }))
}

fn require_exists(conn: &Connection, id: &str) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM anticipations WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )?;
    if exists {
        Ok(())
    } else {
        Err(Error::anticipation_not_found(id))
    }
}

fn fetch(conn: &Connection, id: &str) -> Result<Option<Anticipation>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM anticipations WHERE id = ?1"),
            params![id],
            anticipation_from_row,
        )
        .optional()?)
}

fn query(conn: &Connection, sql: &str) -> Result<Vec<Anticipation>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([], anticipation_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn json_column<T: serde::de::DeserializeOwned + Default>(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let raw: Option<String> = row.get(idx)?;
    match raw.as_deref() {
        None | Some("") | Some("null") => Ok(T::default()),
        Some(json) => serde_json::from_str(json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
    }
}

fn anticipation_from_row(row: &Row<'_>) -> rusqlite::Result<Anticipation> {
    Ok(Anticipation {
        id: row.get(0)?,
        description: row.get(1)?,
        context: row.get(2)?,
        context_entities: json_column(row, 3)?,
        trigger: json_column(row, 4)?,
        metadata: json_column(row, 5)?,
        recurring: row.get(6)?,
        cooldown_seconds: row.get(7)?,
        created_at: time::column(row, 8)?,
        expires_at: time::opt_column(row, 9)?,
        resolved_at: time::opt_column(row, 10)?,
        deleted_at: time::opt_column(row, 11)?,
        last_fired_at: time::opt_column(row, 12)?,
    })
}
