//! Persisted build statistics, one row per run that got past the lock.
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::build::BuildRun;

pub async fn insert(db: &SqlitePool, run: &BuildRun) -> sqlx::Result<i64> {
    let res = sqlx::query(
        r#"
        INSERT INTO build_runs (
            run_id,
            started_at,
            finished_at,
            outcome,
            zones_rebuilt,
            zones_unchanged,
            zones_without_data,
            zones_failed,
            files_written,
            views_skipped,
            tasks_drained,
            error
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(run.run_id.to_string())
    .bind(run.started_at)
    .bind(run.finished_at.unwrap_or_else(Utc::now))
    .bind(run.outcome.as_str())
    .bind(run.zones_rebuilt as i64)
    .bind(run.zones_unchanged as i64)
    .bind(run.zones_without_data as i64)
    .bind(run.zones_failed as i64)
    .bind(run.files_written as i64)
    .bind(run.views_skipped as i64)
    .bind(run.tasks_drained as i64)
    .bind(run.error.as_deref())
    .execute(db)
    .await?;

    Ok(res.last_insert_rowid())
}

/// `(run_id, outcome)` of the most recent run, for the status report.
pub async fn latest(db: &SqlitePool) -> sqlx::Result<Option<(String, String)>> {
    let row = sqlx::query("SELECT run_id, outcome FROM build_runs ORDER BY id DESC LIMIT 1")
        .fetch_optional(db)
        .await?;
    Ok(row.map(|row| (row.get("run_id"), row.get("outcome"))))
}
