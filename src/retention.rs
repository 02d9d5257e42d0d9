//! Delayed deletion of produced media files.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use tokio::{fs, task::JoinHandle, time};

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(120);

/// Owns the obligation to delete every file the service hands out. Each call
/// arms an independent one-shot timer on a detached task; nothing is ever
/// cancelled.
#[derive(Debug, Clone, Copy)]
pub struct RetentionScheduler {
    delay: Duration,
}

impl Default for RetentionScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl RetentionScheduler {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Deletes `path` once the retention delay has elapsed. The returned
    /// handle may be dropped; the task keeps running either way.
    pub fn schedule_deletion(&self, path: impl Into<PathBuf>) -> JoinHandle<()> {
        let path = path.into();
        let delay = self.delay;
        tracing::debug!(path = %path.display(), ?delay, "scheduled deletion");
        tokio::spawn(async move {
            time::sleep(delay).await;
            delete_expired(&path).await;
        })
    }

    /// Hands every regular file already sitting in `dir` to
    /// [`schedule_deletion`](Self::schedule_deletion). Used at startup so files
    /// left behind by a previous process still expire.
    pub async fn adopt_existing(&self, dir: &Path) -> Result<usize> {
        let mut entries = fs::read_dir(dir)
            .await
            .with_context(|| format!("listing {}", dir.display()))?;
        let mut adopted = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("listing {}", dir.display()))?
        {
            let file_type = entry
                .file_type()
                .await
                .with_context(|| format!("inspecting {}", entry.path().display()))?;
            if file_type.is_file() {
                self.schedule_deletion(entry.path());
                adopted += 1;
            }
        }
        Ok(adopted)
    }
}

async fn delete_expired(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => tracing::info!(path = %path.display(), "deleted expired file"),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "expired file already gone");
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to delete expired file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn file_survives_until_delay_then_disappears() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"bytes").unwrap();

        let scheduler = RetentionScheduler::new(Duration::from_millis(200));
        let handle = scheduler.schedule_deletion(&path);

        time::sleep(Duration::from_millis(50)).await;
        assert!(path.exists());

        handle.await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn repeated_schedules_are_independent_and_quiet() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("twice.webm");
        std::fs::write(&path, b"bytes").unwrap();

        let scheduler = RetentionScheduler::new(Duration::from_millis(20));
        let first = scheduler.schedule_deletion(&path);
        let second = scheduler.schedule_deletion(&path);
        first.await.unwrap();
        second.await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn missing_file_does_not_fail_the_task() {
        let dir = tempdir().unwrap();
        let scheduler = RetentionScheduler::new(Duration::from_millis(1));
        scheduler
            .schedule_deletion(dir.path().join("never-written.mp4"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn deletion_outlives_dropped_handle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("detached.mp4");
        std::fs::write(&path, b"bytes").unwrap();

        drop(RetentionScheduler::new(Duration::from_millis(10)).schedule_deletion(&path));
        time::sleep(Duration::from_millis(300)).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn adopt_existing_schedules_only_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"a").unwrap();
        std::fs::write(dir.path().join("b.mp4"), b"b").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let scheduler = RetentionScheduler::new(Duration::from_millis(10));
        let adopted = scheduler.adopt_existing(dir.path()).await.unwrap();
        assert_eq!(adopted, 2);

        time::sleep(Duration::from_millis(300)).await;
        assert!(!dir.path().join("a.mp4").exists());
        assert!(!dir.path().join("b.mp4").exists());
        assert!(dir.path().join("nested").exists());
    }
}
