//! Operator stop switch: while the stop file exists no build starts.
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::info;

use crate::error::{BuildError, Result};
use crate::notify::{self, Notifier};

#[derive(Debug, Clone)]
pub struct StopSwitch {
    path: PathBuf,
    notify_interval: Duration,
}

impl StopSwitch {
    pub fn new(path: impl Into<PathBuf>, notify_interval: Duration) -> Self {
        Self {
            path: path.into(),
            notify_interval,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_engaged(&self) -> bool {
        self.path.exists()
    }

    /// Fails with [`BuildError::Cancelled`] when the stop file exists.
    ///
    /// The file's mtime doubles as the alert cooldown: an alert goes out only
    /// when it is older than the interval, and sending one touches it.
    pub async fn check(&self, notifier: &dyn Notifier) -> Result<()> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(BuildError::io(&self.path, e)),
        };
        let now = SystemTime::now();
        let last = std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .map_err(|e| BuildError::io(&self.path, e))?;

        let reason = contents.trim().to_string();
        let msg = format!(
            "The stop file ({}) exists. Build canceled.\nReason for skipped build:\n{}",
            self.path.display(),
            reason
        );
        info!(stop_file = %self.path.display(), %reason, "build cancelled by stop file");

        if cooldown_elapsed(last, now, self.notify_interval) {
            File::options()
                .write(true)
                .open(&self.path)
                .and_then(|f| f.set_modified(now))
                .map_err(|e| BuildError::io(&self.path, e))?;
            notify::alert(notifier, "DNS builds have stopped", &msg).await;
        }

        Err(BuildError::Cancelled { reason })
    }
}

fn cooldown_elapsed(last: SystemTime, now: SystemTime, interval: Duration) -> bool {
    now.duration_since(last)
        .map(|age| age > interval)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    #[async_trait]
    impl Notifier for Recorder {
        async fn notify(&self, subject: &str, _body: &str) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(subject.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn absent_file_lets_the_build_run() {
        let tmp = tempfile::tempdir().unwrap();
        let stop = StopSwitch::new(tmp.path().join("STOP"), Duration::from_secs(60));
        let rec = Recorder::default();
        stop.check(&rec).await.unwrap();
        assert!(rec.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn realerts_only_after_cooldown() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("STOP");
        std::fs::write(&path, "zone migration in progress\n").unwrap();
        let two_hours_ago = SystemTime::now() - Duration::from_secs(7200);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(two_hours_ago)
            .unwrap();

        let stop = StopSwitch::new(&path, Duration::from_secs(1800));
        let rec = Recorder::default();

        match stop.check(&rec).await {
            Err(BuildError::Cancelled { reason }) => {
                assert_eq!(reason, "zone migration in progress")
            }
            other => panic!("expected Cancelled, got {other:?}"),
        }
        assert_eq!(rec.0.lock().unwrap().len(), 1);
        let touched = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert!(touched > two_hours_ago);

        assert!(stop.check(&rec).await.is_err());
        assert_eq!(rec.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn future_mtime_never_alerts() {
        let now = SystemTime::now();
        assert!(!cooldown_elapsed(now + Duration::from_secs(5), now, Duration::ZERO));
        assert!(cooldown_elapsed(now - Duration::from_secs(5), now, Duration::ZERO));
    }
}
