//! The `build_tasks` queue: one row per "this zone changed" marker.
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

#[derive(Debug, Clone)]
pub struct BuildTask {
    pub id: i64,
    pub zone_id: i64,
    pub created_at: DateTime<Utc>,
}

pub async fn enqueue(db: &SqlitePool, zone_id: i64) -> sqlx::Result<i64> {
    let res = sqlx::query("INSERT INTO build_tasks (zone_id, created_at) VALUES (?, ?)")
        .bind(zone_id)
        .bind(Utc::now())
        .execute(db)
        .await?;
    Ok(res.last_insert_rowid())
}

/// Snapshot of every queued task. Tasks inserted after this returns are not
/// part of the snapshot and survive [`delete_by_ids`] on it.
pub async fn list_pending(db: &SqlitePool) -> sqlx::Result<Vec<BuildTask>> {
    let rows = sqlx::query("SELECT id, zone_id, created_at FROM build_tasks ORDER BY id")
        .fetch_all(db)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| BuildTask {
            id: row.get("id"),
            zone_id: row.get("zone_id"),
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
        })
        .collect())
}

pub async fn count(db: &SqlitePool) -> sqlx::Result<i64> {
    let cnt: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM build_tasks")
        .fetch_one(db)
        .await?;
    Ok(cnt.0)
}

pub async fn delete_by_ids(db: &SqlitePool, ids: &[i64]) -> sqlx::Result<()> {
    let mut tx = db.begin().await?;
    for id in ids {
        sqlx::query("DELETE FROM build_tasks WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await
}
