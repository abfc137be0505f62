//! Crate entrypoint wiring together configuration, the record store and the
//! zone build pipeline.

pub mod build;
pub mod config;
pub mod db;
pub mod error;
pub mod notify;
pub mod render;
pub mod validation;
pub mod vcs;

use build::BuildOrchestrator;
use config::BuildConfig;
use db::{Db, SqliteStore};
use notify::{LogNotifier, Notifier, WebhookNotifier};
use render::SqlZoneRenderer;
use vcs::GitRepo;

/// Everything a build invocation needs, built once from the configuration.
pub struct AppState {
    pub config: BuildConfig,
    pub db: Db,
    pub store: SqliteStore,
    pub renderer: SqlZoneRenderer,
    pub repo: GitRepo,
    pub notifier: Box<dyn Notifier>,
}

impl AppState {
    pub async fn init(config: BuildConfig) -> anyhow::Result<Self> {
        let db = db::init_db(&config.db_path).await?;
        let notifier: Box<dyn Notifier> = match &config.alert_webhook {
            Some(url) => Box::new(WebhookNotifier::new(url)),
            None => Box::new(LogNotifier),
        };
        Ok(Self {
            store: SqliteStore::new(db.clone()),
            renderer: SqlZoneRenderer::new(db.clone()),
            repo: GitRepo::new(&config.prod_dir, config.max_allowed_lines_changed),
            notifier,
            db,
            config,
        })
    }

    pub fn orchestrator(&self) -> BuildOrchestrator<'_> {
        BuildOrchestrator::new(
            &self.config,
            &self.store,
            &self.renderer,
            &self.repo,
            self.notifier.as_ref(),
        )
    }
}
