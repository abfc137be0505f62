//! One build run, start to finish.
//!
//! stop check -> lock -> wipe staging -> drain tasks -> zones (sorted by id)
//! -> config fragments -> publish -> delete drained tasks. Every failure
//! aborts the whole run; recovery is the next run, driven by the dirty flags
//! and the task queue.
use std::collections::BTreeSet;

use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::build::assembler::{ConfigAssembler, ZoneStatement};
use crate::build::file_meta::{FileMeta, TreeLayout};
use crate::build::lock::BuildLock;
use crate::build::serial::{self, next_serial, time_serial};
use crate::build::stop::StopSwitch;
use crate::build::validator::Validator;
use crate::build::writer::StageWriter;
use crate::build::{BuildOptions, BuildRun, RunOutcome};
use crate::config::BuildConfig;
use crate::db::RecordStore;
use crate::db::zone_repo::{RootZone, View};
use crate::error::{BuildError, Result};
use crate::notify::{self, Notifier};
use crate::render::{ZoneBody, ZoneRenderer};
use crate::vcs::{Publisher, VcsBackend};

pub struct BuildOrchestrator<'a> {
    store: &'a dyn RecordStore,
    renderer: &'a dyn ZoneRenderer,
    vcs: &'a dyn VcsBackend,
    notifier: &'a dyn Notifier,
    validator: Validator,
    layout: TreeLayout,
    writer: StageWriter,
    lock: BuildLock,
    stop: StopSwitch,
    zone_role: String,
    commit_message: String,
}

enum ZoneResult {
    Rebuilt,
    Unchanged,
    /// No view had data; nothing written, nothing configured.
    Empty,
}

impl<'a> BuildOrchestrator<'a> {
    pub fn new(
        cfg: &BuildConfig,
        store: &'a dyn RecordStore,
        renderer: &'a dyn ZoneRenderer,
        vcs: &'a dyn VcsBackend,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            store,
            renderer,
            vcs,
            notifier,
            validator: Validator::from_config(cfg),
            layout: TreeLayout {
                stage_dir: cfg.stage_dir.clone(),
                prod_dir: cfg.prod_dir.clone(),
                bind_prefix: cfg.bind_prefix.clone(),
            },
            writer: StageWriter::new(&cfg.stage_dir),
            lock: BuildLock::new(&cfg.lock_file),
            stop: StopSwitch::new(&cfg.stop_file, cfg.stop_file_notify_interval()),
            zone_role: cfg.zone_role.clone(),
            commit_message: cfg.commit_message.clone(),
        }
    }

    pub async fn run(&self, opts: &BuildOptions) -> Result<BuildRun> {
        let mut run = BuildRun::start();
        let span = info_span!("build", run_id = %run.run_id);
        async move {
            self.stop.check(self.notifier).await?;

            let guard = match self.lock.acquire() {
                Ok(guard) => guard,
                Err(e @ BuildError::LockHeld { .. }) => {
                    error!("another process already holds the build lock: {e}");
                    notify::alert(
                        self.notifier,
                        "Concurrent DNS builds attempted.",
                        "An attempt was made to start the DNS build while another \
                         instance was already running. The attempt was denied.",
                    )
                    .await;
                    return Err(e);
                }
                Err(e) => return Err(e),
            };

            let result = self.run_locked(&mut run, opts).await;
            run.finish(&result);

            if let Err(e) = self.store.record_build_run(&run).await {
                warn!("failed to record build statistics: {e:#}");
            }
            if let Err(e) = &result {
                error!("error during build: {e}");
                if e.is_alert_worthy() {
                    notify::alert(self.notifier, "DNS build failed", &e.to_string()).await;
                }
            }
            if let Err(e) = guard.release() {
                error!("{e}");
            }

            result.map(|()| run)
        }
        .instrument(span)
        .await
    }

    async fn run_locked(&self, run: &mut BuildRun, opts: &BuildOptions) -> Result<()> {
        self.writer.wipe()?;

        // Fixed for the whole run; tasks queued from here on wait for the next one.
        let tasks = self.store.pending_tasks().await?;
        run.tasks_drained = tasks.len();
        info!(
            "{} zone{} requested to be rebuilt",
            tasks.len(),
            if tasks.len() == 1 { "" } else { "s" }
        );
        if tasks.is_empty() && !opts.force {
            info!("nothing to do");
            run.outcome = RunOutcome::NoOp;
            return Ok(());
        }
        let requested: BTreeSet<i64> = tasks.iter().map(|t| t.zone_id).collect();
        let task_ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();

        let views = self.store.views().await?;
        let mut zones = self.store.root_zones().await?;
        zones.sort_by_key(|z| z.id);

        let mut assembler = ConfigAssembler::new();
        let mut rebuilt = Vec::new();
        for zone in &zones {
            let span = info_span!("zone", zone = %zone.name);
            let res = self
                .build_zone(zone, &views, &requested, &mut assembler, run)
                .instrument(span)
                .await;
            match res {
                Ok(ZoneResult::Rebuilt) => {
                    run.zones_rebuilt += 1;
                    rebuilt.push(zone.id);
                }
                Ok(ZoneResult::Unchanged) => run.zones_unchanged += 1,
                Ok(ZoneResult::Empty) => run.zones_without_data += 1,
                Err(e) => {
                    run.zones_failed += 1;
                    error!(zone = %zone.name, "zone build failed: {e}");
                    rebuilt.push(zone.id);
                    self.mark_all_dirty(&rebuilt).await;
                    return Err(e);
                }
            }
        }

        let res = self.finish_run(&assembler, &task_ids, run, opts).await;
        if res.is_err() || run.outcome == RunOutcome::Staged {
            self.mark_all_dirty(&rebuilt).await;
        }
        res
    }

    async fn finish_run(
        &self,
        assembler: &ConfigAssembler,
        task_ids: &[i64],
        run: &mut BuildRun,
        opts: &BuildOptions,
    ) -> Result<()> {
        if assembler.is_empty() {
            warn!("no zone has data in any view; no config fragments will be written");
        }
        assembler
            .assemble(&self.zone_role, &self.writer, &self.validator)
            .await?;

        if opts.stage_only {
            info!(stage = %self.layout.stage_dir.display(), "stage only; not publishing");
            run.outcome = RunOutcome::Staged;
            return Ok(());
        }

        Publisher::new(self.vcs, self.commit_message.clone())
            .publish(&self.layout.stage_dir, &self.layout.prod_dir, opts.sanity_check)
            .await?;

        // Only the tasks seen at drain time.
        self.store.delete_tasks(task_ids).await?;
        run.outcome = RunOutcome::Published;
        info!("build successful");
        Ok(())
    }

    async fn build_zone(
        &self,
        zone: &RootZone,
        views: &[View],
        requested: &BTreeSet<i64>,
        assembler: &mut ConfigAssembler,
        run: &mut BuildRun,
    ) -> Result<ZoneResult> {
        let mut force = zone.dirty || requested.contains(&zone.id);
        if force {
            // Any failure below sets it again.
            self.store.set_dirty(zone.id, false).await?;
        }
        debug!(serial = zone.serial, dirty = force, "processing zone");

        let mut candidates: Vec<(&View, FileMeta, ZoneBody)> = Vec::new();
        let mut serial_base: Option<u32> = None;
        for view in views {
            let body = self
                .renderer
                .render(view, zone)
                .await
                .map_err(|source| BuildError::Render {
                    zone: zone.name.clone(),
                    view: view.name.clone(),
                    source,
                })?;
            let Some(body) = body else {
                debug!(view = %view.name, "no data in this view; no zone file or config entry");
                run.views_skipped += 1;
                continue;
            };

            let meta = FileMeta::new(view, zone, &self.layout)?;
            let published = serial::published_serial(&meta.prod_path)?;
            let rec = serial::reconcile(zone.serial, published, time_serial());
            if rec.force_rebuild {
                match published {
                    None => debug!(
                        view = %view.name,
                        path = %meta.prod_path.display(),
                        "no published serial; treating as a new zone"
                    ),
                    Some(p) => warn!(
                        view = %view.name,
                        path = %meta.prod_path.display(),
                        published = p,
                        database = zone.serial,
                        "published serial differs from the database; zone will be rebuilt"
                    ),
                }
                force = true;
                if let Some(s) = rec.new_serial {
                    serial_base = Some(serial_base.map_or(s, |b| b.max(s)));
                }
            }
            candidates.push((view, meta, body));
        }

        let new_serial = next_serial(serial_base.unwrap_or(zone.serial));
        if force {
            debug!(serial = new_serial, "zone will be rebuilt");
        } else {
            debug!(serial = zone.serial, "zone is stable");
        }

        let mut stmts = Vec::with_capacity(candidates.len());
        for (view, meta, body) in &candidates {
            if force {
                let path = self
                    .writer
                    .write_zone(meta, &body.with_serial(new_serial))
                    .await?;
                self.validator.check_zone(&path, &zone.name, &view.name).await?;
                run.files_written += 1;
            } else {
                debug!(view = %view.name, path = %meta.prod_path.display(), "no rebuild needed");
                self.validator
                    .check_zone(&meta.prod_path, &zone.name, &view.name)
                    .await?;
            }
            stmts.push((view.name.as_str(), ZoneStatement::render(zone, meta)));
        }

        // Every file of this zone passed its check.
        for (view, stmt) in stmts {
            assembler.push(view, stmt);
        }
        if candidates.is_empty() {
            Ok(ZoneResult::Empty)
        } else if force {
            self.store.set_serial(zone.id, new_serial).await?;
            Ok(ZoneResult::Rebuilt)
        } else {
            Ok(ZoneResult::Unchanged)
        }
    }

    /// Nothing from this run reached production; make the next run redo it.
    async fn mark_all_dirty(&self, zone_ids: &[i64]) {
        for &zone_id in zone_ids {
            if let Err(e) = self.store.set_dirty(zone_id, true).await {
                error!(zone_id, "failed to re-mark zone dirty: {e:#}");
            }
        }
    }
}
