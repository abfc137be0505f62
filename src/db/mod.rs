pub mod build_run_repo;
pub mod task_repo;
pub mod zone_repo;

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::build::BuildRun;
use task_repo::BuildTask;
use zone_repo::{RootZone, View};

pub type Db = SqlitePool;

pub async fn init_db(path: &std::path::Path) -> anyhow::Result<Db> {
    let opts = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(opts).await?;
    sqlx::migrate!().run(&pool).await?;
    Ok(pool)
}

/// Single-connection in-memory database, mostly for tests and dry runs.
pub async fn init_memory_db() -> anyhow::Result<Db> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    sqlx::migrate!().run(&pool).await?;
    Ok(pool)
}

/// What the build pipeline needs from the record store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn views(&self) -> anyhow::Result<Vec<View>>;

    /// All root zones, ordered by id so config output is stable run to run.
    async fn root_zones(&self) -> anyhow::Result<Vec<RootZone>>;

    async fn pending_tasks(&self) -> anyhow::Result<Vec<BuildTask>>;

    async fn delete_tasks(&self, ids: &[i64]) -> anyhow::Result<()>;

    async fn set_dirty(&self, zone_id: i64, dirty: bool) -> anyhow::Result<()>;

    async fn set_serial(&self, zone_id: i64, serial: u32) -> anyhow::Result<()>;

    async fn record_build_run(&self, run: &BuildRun) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct SqliteStore {
    db: Db,
}

impl SqliteStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &Db {
        &self.db
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn views(&self) -> anyhow::Result<Vec<View>> {
        Ok(zone_repo::list_views(&self.db).await?)
    }

    async fn root_zones(&self) -> anyhow::Result<Vec<RootZone>> {
        zone_repo::list_zones(&self.db).await
    }

    async fn pending_tasks(&self) -> anyhow::Result<Vec<BuildTask>> {
        Ok(task_repo::list_pending(&self.db).await?)
    }

    async fn delete_tasks(&self, ids: &[i64]) -> anyhow::Result<()> {
        Ok(task_repo::delete_by_ids(&self.db, ids).await?)
    }

    async fn set_dirty(&self, zone_id: i64, dirty: bool) -> anyhow::Result<()> {
        Ok(zone_repo::set_dirty(&self.db, zone_id, dirty).await?)
    }

    async fn set_serial(&self, zone_id: i64, serial: u32) -> anyhow::Result<()> {
        Ok(zone_repo::set_serial(&self.db, zone_id, serial).await?)
    }

    async fn record_build_run(&self, run: &BuildRun) -> anyhow::Result<()> {
        build_run_repo::insert(&self.db, run).await?;
        Ok(())
    }
}
