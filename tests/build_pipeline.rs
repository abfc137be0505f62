//! End-to-end runs of the build pipeline against an in-memory record store,
//! shell stand-ins for named-checkzone/named-checkconf and a fake VCS that
//! snapshots the production tree on reset and restores it on clean.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use cybind::build::serial::parse_soa_serial;
use cybind::build::{BuildOptions, BuildOrchestrator, RunOutcome};
use cybind::config::BuildConfig;
use cybind::db::zone_repo::{self, NewZone, RootZone, View, ZoneRecord};
use cybind::db::{self, Db, SqliteStore, task_repo};
use cybind::error::BuildError;
use cybind::notify::{Notifier, WebhookNotifier};
use cybind::render::{SqlZoneRenderer, ZoneBody, ZoneRenderer};
use cybind::vcs::VcsBackend;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// -----------------------------------------------------------------------------
// Fakes
// -----------------------------------------------------------------------------

fn read_tree(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_path_buf();
                out.insert(rel, std::fs::read(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(dir, dir, &mut out);
    out
}

struct FakeVcs {
    prod: PathBuf,
    fail_commit: bool,
    snapshot: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
    commits: Mutex<usize>,
    cleans: Mutex<usize>,
}

impl FakeVcs {
    fn new(prod: &Path, fail_commit: bool) -> Self {
        Self {
            prod: prod.to_path_buf(),
            fail_commit,
            snapshot: Mutex::new(BTreeMap::new()),
            commits: Mutex::new(0),
            cleans: Mutex::new(0),
        }
    }

    fn commits(&self) -> usize {
        *self.commits.lock().unwrap()
    }

    fn cleans(&self) -> usize {
        *self.cleans.lock().unwrap()
    }
}

#[async_trait]
impl VcsBackend for FakeVcs {
    async fn reset_and_pull(&self) -> cybind::error::Result<()> {
        *self.snapshot.lock().unwrap() = read_tree(&self.prod);
        Ok(())
    }

    async fn commit_and_push(&self, _message: &str, _sanity_check: bool) -> cybind::error::Result<()> {
        if self.fail_commit {
            return Err(BuildError::publish("remote rejected the push"));
        }
        *self.commits.lock().unwrap() += 1;
        Ok(())
    }

    async fn clean(&self) -> cybind::error::Result<()> {
        *self.cleans.lock().unwrap() += 1;
        std::fs::remove_dir_all(&self.prod).unwrap();
        std::fs::create_dir_all(&self.prod).unwrap();
        for (rel, bytes) in self.snapshot.lock().unwrap().iter() {
            let path = self.prod.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, bytes).unwrap();
        }
        Ok(())
    }
}

#[derive(Default)]
struct Recorder(Mutex<Vec<String>>);

impl Recorder {
    fn subjects(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for Recorder {
    async fn notify(&self, subject: &str, _body: &str) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(subject.to_string());
        Ok(())
    }
}

/// Renders from the database and queues a new task on its first call, the
/// way a record edit landing mid-build would.
struct EnqueueingRenderer {
    inner: SqlZoneRenderer,
    db: Db,
    zone_id: i64,
    fired: Mutex<bool>,
}

#[async_trait]
impl ZoneRenderer for EnqueueingRenderer {
    async fn render(&self, view: &View, zone: &RootZone) -> anyhow::Result<Option<ZoneBody>> {
        let first = {
            let mut fired = self.fired.lock().unwrap();
            !std::mem::replace(&mut *fired, true)
        };
        if first {
            task_repo::enqueue(&self.db, self.zone_id).await?;
        }
        self.inner.render(view, zone).await
    }
}

struct BrokenRenderer;

#[async_trait]
impl ZoneRenderer for BrokenRenderer {
    async fn render(&self, _view: &View, _zone: &RootZone) -> anyhow::Result<Option<ZoneBody>> {
        anyhow::bail!("record store returned a CNAME at the apex")
    }
}

/// Alert endpoint that is down: answers one request with a 500 and returns
/// what it was sent.
async fn broken_webhook() -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/", listener.local_addr().unwrap());
    let handle = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = sock.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client hung up mid-request");
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).into_owned();
            // The JSON body is one object; its closing brace ends the request.
            if let Some((_, body)) = text.split_once("\r\n\r\n") {
                if body.trim_end().ends_with('}') {
                    break;
                }
            }
        }
        sock.write_all(
            b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
        )
        .await
        .unwrap();
        String::from_utf8_lossy(&buf).into_owned()
    });
    (url, handle)
}

// -----------------------------------------------------------------------------
// Harness
// -----------------------------------------------------------------------------

struct Harness {
    tmp: TempDir,
    cfg: BuildConfig,
    db: Db,
    store: SqliteStore,
    renderer: SqlZoneRenderer,
    notifier: Recorder,
}

impl Harness {
    async fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("prod")).unwrap();

        let checkzone_log = root.join("checkzone.log");
        let checkconf_log = root.join("checkconf.log");
        let cfg = BuildConfig {
            stage_dir: root.join("stage"),
            prod_dir: root.join("prod"),
            lock_file: root.join("cybind.lock"),
            stop_file: root.join("STOP"),
            stop_file_notify_interval_secs: 1800,
            bind_prefix: PathBuf::from("/etc/named"),
            named_checkzone: "sh".into(),
            named_checkzone_opts: vec![
                "-c".into(),
                format!(
                    "echo \"$1 $2\" >> {}; case \"$1\" in bad.example.com) exit 1;; esac",
                    checkzone_log.display()
                ),
                "checkzone".into(),
            ],
            named_checkconf: "sh".into(),
            named_checkconf_opts: vec![
                "-c".into(),
                format!("echo \"$1\" >> {}", checkconf_log.display()),
                "checkconf".into(),
            ],
            max_allowed_lines_changed: 500,
            zone_role: "master".into(),
            commit_message: "Update config file".into(),
            db_path: root.join("unused.db"),
            alert_webhook: None,
        };

        let db = db::init_memory_db().await.unwrap();
        Self {
            store: SqliteStore::new(db.clone()),
            renderer: SqlZoneRenderer::new(db.clone()),
            db,
            cfg,
            notifier: Recorder::default(),
            tmp,
        }
    }

    fn root(&self) -> &Path {
        self.tmp.path()
    }

    fn prod(&self) -> &Path {
        &self.cfg.prod_dir
    }

    fn stage(&self) -> &Path {
        &self.cfg.stage_dir
    }

    fn checkzone_calls(&self) -> String {
        std::fs::read_to_string(self.root().join("checkzone.log")).unwrap_or_default()
    }

    async fn view(&self, name: &str) -> i64 {
        zone_repo::insert_view(&self.db, name).await.unwrap()
    }

    async fn zone(&self, zone: NewZone) -> i64 {
        zone_repo::insert_zone(&self.db, &zone).await.unwrap()
    }

    async fn record(&self, zone_id: i64, view_id: i64, name: &str, rtype: &str, data: &str) {
        zone_repo::insert_record(
            &self.db,
            zone_id,
            view_id,
            &ZoneRecord {
                name: name.into(),
                ttl: None,
                rtype: rtype.into(),
                data: data.into(),
            },
        )
        .await
        .unwrap();
    }

    async fn zone_row(&self, name: &str) -> RootZone {
        zone_repo::find_zone_by_name(&self.db, name)
            .await
            .unwrap()
            .unwrap()
    }

    async fn task_count(&self) -> i64 {
        task_repo::count(&self.db).await.unwrap()
    }

    fn publish_file(&self, rel: &str, serial: &str) {
        let path = self.prod().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            path,
            format!(
                "$TTL 3600\n@ IN SOA ns1.example.net. hostmaster.example.net. (\n\t\t{serial}\t; serial\n\t\t180 86400 1209600 180 )\n@ IN NS ns1.example.net.\n"
            ),
        )
        .unwrap();
    }

    fn orchestrator<'a>(&'a self, vcs: &'a FakeVcs) -> BuildOrchestrator<'a> {
        BuildOrchestrator::new(&self.cfg, &self.store, &self.renderer, vcs, &self.notifier)
    }
}

fn read_serial(path: &Path) -> u32 {
    parse_soa_serial(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn forced() -> BuildOptions {
    BuildOptions {
        force: true,
        ..BuildOptions::default()
    }
}

// -----------------------------------------------------------------------------
// Scenarios
// -----------------------------------------------------------------------------

#[tokio::test]
async fn new_zone_is_built_published_and_its_task_cleared() {
    let h = Harness::new().await;
    let public = h.view("public").await;
    let zone = h.zone(NewZone::forward("example.com", 5)).await;
    h.record(zone, public, "@", "NS", "ns1.example.net.").await;
    h.record(zone, public, "www", "A", "192.0.2.10").await;
    task_repo::enqueue(&h.db, zone).await.unwrap();
    let before = Utc::now().timestamp() as u32;

    let vcs = FakeVcs::new(h.prod(), false);
    let run = h.orchestrator(&vcs).run(&BuildOptions::default()).await.unwrap();

    assert_eq!(run.outcome, RunOutcome::Published);
    assert_eq!(run.zones_rebuilt, 1);
    assert_eq!(run.files_written, 1);
    assert_eq!(vcs.commits(), 1);

    let published = h.prod().join("com/example/example.com.public");
    let file_serial = read_serial(&published);
    let row = h.zone_row("example.com").await;
    assert_eq!(row.serial, file_serial);
    assert!(file_serial > before, "serial {file_serial} should be time-derived");
    assert!(!row.dirty);

    let config = std::fs::read_to_string(h.prod().join("config/master.public")).unwrap();
    assert_eq!(config.matches("zone \"example.com\" IN {").count(), 1);
    assert!(config.contains("type master;"));
    assert!(config.contains("file \"/etc/named/com/example/example.com.public\";"));

    assert_eq!(h.task_count().await, 0);
}

#[tokio::test]
async fn stable_zone_is_only_rechecked() {
    let h = Harness::new().await;
    let public = h.view("public").await;
    let zone = h.zone(NewZone::forward("b.example.com", 10)).await;
    h.record(zone, public, "@", "NS", "ns1.example.net.").await;
    h.publish_file("com/example/b/b.example.com.public", "10");

    let vcs = FakeVcs::new(h.prod(), false);
    let run = h.orchestrator(&vcs).run(&forced()).await.unwrap();

    assert_eq!(run.zones_unchanged, 1);
    assert_eq!(run.files_written, 0);
    assert!(!h.stage().join("com/example/b/b.example.com.public").exists());

    let prod_file = h.prod().join("com/example/b/b.example.com.public");
    assert!(
        h.checkzone_calls()
            .contains(&format!("b.example.com {}", prod_file.display()))
    );
    assert_eq!(read_serial(&prod_file), 10);
    assert_eq!(h.zone_row("b.example.com").await.serial, 10);

    let config = std::fs::read_to_string(h.stage().join("config/master.public")).unwrap();
    assert!(config.contains("zone \"b.example.com\""));
}

#[tokio::test]
async fn tampered_serial_never_goes_backwards() {
    let h = Harness::new().await;
    let public = h.view("public").await;
    let zone = h.zone(NewZone::forward("example.org", 10)).await;
    h.record(zone, public, "@", "NS", "ns1.example.net.").await;
    h.publish_file("org/example/example.org.public", "50");

    let vcs = FakeVcs::new(h.prod(), false);
    let run = h.orchestrator(&vcs).run(&forced()).await.unwrap();

    assert_eq!(run.zones_rebuilt, 1);
    let row = h.zone_row("example.org").await;
    assert!(row.serial > 50);
    assert_eq!(row.serial, 51);
    assert_eq!(read_serial(&h.prod().join("org/example/example.org.public")), 51);
}

#[tokio::test]
async fn unparseable_published_serial_forces_time_serial() {
    let h = Harness::new().await;
    let public = h.view("public").await;
    let zone = h.zone(NewZone::forward("example.net", 10)).await;
    h.record(zone, public, "@", "NS", "ns1.example.net.").await;
    h.publish_file("net/example/example.net.public", "20231x01");
    let before = Utc::now().timestamp() as u32;

    let vcs = FakeVcs::new(h.prod(), false);
    h.orchestrator(&vcs).run(&forced()).await.unwrap();

    let row = h.zone_row("example.net").await;
    assert!(!row.dirty);
    assert!(row.serial > before);
    assert_eq!(read_serial(&h.prod().join("net/example/example.net.public")), row.serial);
}

#[tokio::test]
async fn checkzone_failure_aborts_before_any_config() {
    let h = Harness::new().await;
    let public = h.view("public").await;
    let good = h.zone(NewZone::forward("example.com", 5)).await;
    let bad = h.zone(NewZone::forward("bad.example.com", 5)).await;
    for z in [good, bad] {
        h.record(z, public, "@", "NS", "ns1.example.net.").await;
        task_repo::enqueue(&h.db, z).await.unwrap();
    }

    let vcs = FakeVcs::new(h.prod(), false);
    let err = h
        .orchestrator(&vcs)
        .run(&BuildOptions::default())
        .await
        .unwrap_err();

    match err {
        BuildError::ZoneValidation { zone, view, .. } => {
            assert_eq!(zone, "bad.example.com");
            assert_eq!(view, "public");
        }
        other => panic!("expected ZoneValidation, got {other:?}"),
    }
    assert!(!h.stage().join("config").exists());
    assert!(h.zone_row("bad.example.com").await.dirty);
    assert!(h.zone_row("example.com").await.dirty);
    assert_eq!(h.zone_row("bad.example.com").await.serial, 5);
    assert_eq!(h.task_count().await, 2);
    assert_eq!(vcs.commits(), 0);
    assert!(read_tree(h.prod()).is_empty());
    assert_eq!(h.notifier.subjects(), vec!["DNS build failed".to_string()]);

    let (outcome,): (String,) = sqlx::query_as("SELECT outcome FROM build_runs")
        .fetch_one(&h.db)
        .await
        .unwrap();
    assert_eq!(outcome, "failed");
}

#[tokio::test]
async fn failed_commit_leaves_production_untouched() {
    let h = Harness::new().await;
    let public = h.view("public").await;
    let stable = h.zone(NewZone::forward("b.example.com", 10)).await;
    h.record(stable, public, "@", "NS", "ns1.example.net.").await;
    h.publish_file("com/example/b/b.example.com.public", "10");
    let fresh = h.zone(NewZone::forward("example.com", 5)).await;
    h.record(fresh, public, "@", "NS", "ns1.example.net.").await;
    task_repo::enqueue(&h.db, fresh).await.unwrap();
    let before = read_tree(h.prod());

    let vcs = FakeVcs::new(h.prod(), true);
    let err = h
        .orchestrator(&vcs)
        .run(&BuildOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::Publish { .. }), "got {err:?}");
    assert_eq!(vcs.cleans(), 1);
    assert_eq!(read_tree(h.prod()), before);
    assert_eq!(h.task_count().await, 1);
    assert!(h.zone_row("example.com").await.dirty);
}

#[tokio::test]
async fn tasks_queued_during_a_run_survive_it() {
    let h = Harness::new().await;
    let public = h.view("public").await;
    let zone = h.zone(NewZone::forward("example.com", 5)).await;
    h.record(zone, public, "@", "NS", "ns1.example.net.").await;
    task_repo::enqueue(&h.db, zone).await.unwrap();

    let renderer = EnqueueingRenderer {
        inner: h.renderer.clone(),
        db: h.db.clone(),
        zone_id: zone,
        fired: Mutex::new(false),
    };
    let vcs = FakeVcs::new(h.prod(), false);
    let run = BuildOrchestrator::new(&h.cfg, &h.store, &renderer, &vcs, &h.notifier)
        .run(&BuildOptions::default())
        .await
        .unwrap();

    assert_eq!(run.tasks_drained, 1);
    assert_eq!(run.outcome, RunOutcome::Published);
    let left = task_repo::list_pending(&h.db).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].zone_id, zone);
}

#[tokio::test]
async fn empty_queue_without_force_is_a_noop() {
    let h = Harness::new().await;
    let public = h.view("public").await;
    let zone = h.zone(NewZone::forward("example.com", 5)).await;
    h.record(zone, public, "@", "NS", "ns1.example.net.").await;

    let vcs = FakeVcs::new(h.prod(), false);
    let run = h.orchestrator(&vcs).run(&BuildOptions::default()).await.unwrap();

    assert_eq!(run.outcome, RunOutcome::NoOp);
    assert!(h.checkzone_calls().is_empty());
    assert_eq!(vcs.commits(), 0);
    assert_eq!(h.zone_row("example.com").await.serial, 5);
}

#[tokio::test]
async fn stop_file_cancels_before_touching_anything() {
    let h = Harness::new().await;
    std::fs::create_dir_all(h.stage()).unwrap();
    std::fs::write(h.stage().join("leftover"), "inspect me").unwrap();
    std::fs::write(&h.cfg.stop_file, "maintenance window\n").unwrap();
    let zone = h.zone(NewZone::forward("example.com", 5)).await;
    task_repo::enqueue(&h.db, zone).await.unwrap();

    let vcs = FakeVcs::new(h.prod(), false);
    let err = h.orchestrator(&vcs).run(&forced()).await.unwrap_err();

    assert!(matches!(err, BuildError::Cancelled { ref reason } if reason == "maintenance window"));
    assert!(h.stage().join("leftover").exists());
    assert!(!h.cfg.lock_file.exists());
    assert_eq!(h.task_count().await, 1);
    // Fresh stop file: still inside the alert cooldown.
    assert!(h.notifier.subjects().is_empty());
}

#[tokio::test]
async fn held_lock_alerts_once_and_leaves_staging_alone() {
    let h = Harness::new().await;
    std::fs::create_dir_all(h.stage()).unwrap();
    std::fs::write(h.stage().join("leftover"), "other run's output").unwrap();
    std::fs::write(&h.cfg.lock_file, "pid 1 since earlier\n").unwrap();

    let vcs = FakeVcs::new(h.prod(), false);
    let err = h.orchestrator(&vcs).run(&forced()).await.unwrap_err();

    match err {
        BuildError::LockHeld { holder, .. } => assert_eq!(holder, "pid 1 since earlier"),
        other => panic!("expected LockHeld, got {other:?}"),
    }
    assert_eq!(
        h.notifier.subjects(),
        vec!["Concurrent DNS builds attempted.".to_string()]
    );
    assert!(h.stage().join("leftover").exists());
    assert!(h.cfg.lock_file.exists());
}

#[tokio::test]
async fn stage_only_publishes_nothing_and_keeps_tasks() {
    let h = Harness::new().await;
    let public = h.view("public").await;
    let zone = h.zone(NewZone::forward("example.com", 5)).await;
    h.record(zone, public, "@", "NS", "ns1.example.net.").await;
    task_repo::enqueue(&h.db, zone).await.unwrap();

    let vcs = FakeVcs::new(h.prod(), false);
    let opts = BuildOptions {
        stage_only: true,
        ..BuildOptions::default()
    };
    let run = h.orchestrator(&vcs).run(&opts).await.unwrap();

    assert_eq!(run.outcome, RunOutcome::Staged);
    assert!(h.stage().join("com/example/example.com.public").exists());
    assert!(h.stage().join("config/master.public").exists());
    assert!(read_tree(h.prod()).is_empty());
    assert_eq!(vcs.commits(), 0);
    assert_eq!(h.task_count().await, 1);
    assert!(!h.cfg.lock_file.exists());
}

#[tokio::test]
async fn views_without_data_get_no_file_and_no_config() {
    let h = Harness::new().await;
    let public = h.view("public").await;
    h.view("private").await;
    let zone = h.zone(NewZone::forward("example.com", 5)).await;
    h.record(zone, public, "@", "NS", "ns1.example.net.").await;
    task_repo::enqueue(&h.db, zone).await.unwrap();

    let vcs = FakeVcs::new(h.prod(), false);
    let run = h.orchestrator(&vcs).run(&BuildOptions::default()).await.unwrap();

    assert_eq!(run.views_skipped, 1);
    assert!(h.prod().join("com/example/example.com.public").exists());
    assert!(!h.prod().join("com/example/example.com.private").exists());
    assert!(h.prod().join("config/master.public").exists());
    assert!(!h.prod().join("config/master.private").exists());
}

#[tokio::test]
async fn render_failure_marks_the_zone_dirty_and_aborts() {
    let h = Harness::new().await;
    h.view("public").await;
    let zone = h.zone(NewZone::forward("example.com", 5)).await;
    task_repo::enqueue(&h.db, zone).await.unwrap();

    let vcs = FakeVcs::new(h.prod(), false);
    let err = BuildOrchestrator::new(&h.cfg, &h.store, &BrokenRenderer, &vcs, &h.notifier)
        .run(&BuildOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::Render { .. }), "got {err:?}");
    assert!(h.zone_row("example.com").await.dirty);
    assert_eq!(h.task_count().await, 1);
    assert!(!h.cfg.lock_file.exists());
}

#[tokio::test]
async fn second_run_after_success_is_idempotent() {
    let h = Harness::new().await;
    let public = h.view("public").await;
    let zone = h.zone(NewZone::forward("example.com", 5)).await;
    h.record(zone, public, "@", "NS", "ns1.example.net.").await;
    task_repo::enqueue(&h.db, zone).await.unwrap();

    let vcs = FakeVcs::new(h.prod(), false);
    h.orchestrator(&vcs).run(&BuildOptions::default()).await.unwrap();
    let serial = h.zone_row("example.com").await.serial;
    let published = read_tree(h.prod());

    let run = h.orchestrator(&vcs).run(&forced()).await.unwrap();
    assert_eq!(run.zones_rebuilt, 0);
    assert_eq!(run.files_written, 0);
    assert_eq!(h.zone_row("example.com").await.serial, serial);
    assert_eq!(read_tree(h.prod()), published);
}

#[tokio::test]
async fn dirty_zone_bumps_serial_by_one() {
    let h = Harness::new().await;
    let public = h.view("public").await;
    let zone = h
        .zone(NewZone {
            dirty: true,
            ..NewZone::forward("example.com", 41)
        })
        .await;
    h.record(zone, public, "@", "NS", "ns1.example.net.").await;
    h.publish_file("com/example/example.com.public", "41");

    let vcs = FakeVcs::new(h.prod(), false);
    h.orchestrator(&vcs).run(&forced()).await.unwrap();

    let row = h.zone_row("example.com").await;
    assert_eq!(row.serial, 42);
    assert!(!row.dirty);
    assert_eq!(read_serial(&h.prod().join("com/example/example.com.public")), 42);
}

#[tokio::test]
async fn undeliverable_alert_does_not_change_the_failure() {
    let h = Harness::new().await;
    let public = h.view("public").await;
    let bad = h.zone(NewZone::forward("bad.example.com", 5)).await;
    h.record(bad, public, "@", "NS", "ns1.example.net.").await;
    task_repo::enqueue(&h.db, bad).await.unwrap();

    let (url, server) = broken_webhook().await;
    let http = reqwest::Client::builder().no_proxy().build().unwrap();
    let webhook = WebhookNotifier::with_client(http, url);
    let vcs = FakeVcs::new(h.prod(), false);
    let err = BuildOrchestrator::new(&h.cfg, &h.store, &h.renderer, &vcs, &webhook)
        .run(&BuildOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::ZoneValidation { .. }), "got {err:?}");
    let request = server.await.unwrap();
    assert!(request.contains("\"subject\":\"DNS build failed\""), "{request}");
    assert!(h.zone_row("bad.example.com").await.dirty);
    assert!(!h.cfg.lock_file.exists());
}

#[tokio::test]
async fn requested_zone_without_data_is_not_counted_as_unchanged() {
    let h = Harness::new().await;
    h.view("public").await;
    let zone = h
        .zone(NewZone {
            dirty: true,
            ..NewZone::forward("example.com", 5)
        })
        .await;
    task_repo::enqueue(&h.db, zone).await.unwrap();

    let vcs = FakeVcs::new(h.prod(), false);
    let run = h.orchestrator(&vcs).run(&BuildOptions::default()).await.unwrap();

    assert_eq!(run.zones_without_data, 1);
    assert_eq!(run.zones_unchanged, 0);
    assert_eq!(run.zones_rebuilt, 0);
    assert_eq!(run.files_written, 0);

    let (without_data,): (i64,) = sqlx::query_as("SELECT zones_without_data FROM build_runs")
        .fetch_one(&h.db)
        .await
        .unwrap();
    assert_eq!(without_data, 1);
}
