use crate::db::Database;
use crate::error::Result;
use crate::models::HealthSnapshot;
use chrono::{DateTime, Local};
use rusqlite::{params, Row};
use tracing::warn;

// Schedule Bookkeeping

impl Database {
    /// When the named schedule last fired
    pub fn last_run(&self, schedule: &str) -> Result<Option<DateTime<Local>>> {
        let raw: Option<String> = self.with_conn(|conn| {
            conn.query_row(
                "SELECT last_run FROM schedule_runs WHERE schedule = ?1",
                [schedule],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
        })?;

        Ok(raw.and_then(|s| match DateTime::parse_from_rfc3339(&s) {
            Ok(dt) => Some(dt.with_timezone(&Local)),
            Err(e) => {
                warn!(schedule, value = %s, error = %e, "Unreadable last_run in database, ignoring");
                None
            }
        }))
    }

    pub fn record_run(&self, schedule: &str, at: DateTime<Local>, zones_watered: usize) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO schedule_runs (schedule, last_run, zones_watered, updated_at)
                VALUES (?1, ?2, ?3, datetime('now'))
                ON CONFLICT(schedule) DO UPDATE SET
                    last_run = excluded.last_run,
                    zones_watered = excluded.zones_watered,
                    updated_at = excluded.updated_at
                "#,
                params![schedule, at.to_rfc3339(), zones_watered as i64],
            )?;
            Ok(())
        })
    }
}

// Health Snapshot Queries

impl Database {
    pub fn save_health_snapshot(&self, snapshot: &HealthSnapshot) -> Result<i64> {
        let payload = serde_json::to_string(snapshot)?;
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO health_snapshots
                    (taken_at, config_version, zone_count, failure_count, payload)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    snapshot.taken_at.to_rfc3339(),
                    snapshot.config_version as i64,
                    snapshot.zones.len() as i64,
                    snapshot.failures.len() as i64,
                    payload,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn latest_health_snapshot(&self) -> Result<Option<HealthSnapshot>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT payload FROM health_snapshots ORDER BY taken_at DESC, id DESC LIMIT 1",
                [],
                row_to_health_snapshot,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Delete all but the newest `keep` snapshots. Returns how many were removed.
    pub fn prune_health_snapshots(&self, keep: usize) -> Result<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                r#"
                DELETE FROM health_snapshots WHERE id NOT IN (
                    SELECT id FROM health_snapshots ORDER BY taken_at DESC, id DESC LIMIT ?1
                )
                "#,
                [keep as i64],
            )?;
            Ok(removed)
        })
    }
}

fn row_to_health_snapshot(row: &Row) -> rusqlite::Result<HealthSnapshot> {
    let payload: String = row.get("payload")?;
    serde_json::from_str(&payload).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

trait OptionalExt<T> {
    fn optional(self) -> rusqlite::Result<Option<T>>;
}

impl<T> OptionalExt<T> for rusqlite::Result<T> {
    fn optional(self) -> rusqlite::Result<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
