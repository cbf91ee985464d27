//! Age-based cleanup of staged files
//!
//! Staged inputs and outputs are never deleted when a job finishes; the
//! sweeper reclaims them by modification time, regardless of job state.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;

/// What one sweep did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Regular files examined
    pub scanned: usize,
    /// Files deleted
    pub removed: usize,
    /// Files that were old enough but could not be inspected or deleted
    pub failed: usize,
    /// Total size of the deleted files
    pub bytes_freed: u64,
}

/// Delete regular files directly inside `dir` last modified more than `max_age` ago.
///
/// A missing directory is a no-op. Failures on individual files are logged and
/// counted; they never stop the sweep. Subdirectories are left alone.
pub fn sweep(dir: &Path, max_age: Duration) -> SweepReport {
    sweep_with(dir, max_age, |path| std::fs::remove_file(path))
}

/// [`sweep`] with the deletion step supplied by the caller
pub(crate) fn sweep_with<F>(dir: &Path, max_age: Duration, remove: F) -> SweepReport
where
    F: Fn(&Path) -> std::io::Result<()>,
{
    let mut report = SweepReport::default();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return report,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Cannot read retention directory");
            return report;
        },
    };

    let now = SystemTime::now();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Skipping unreadable entry");
                report.failed += 1;
                continue;
            },
        };
        let path = entry.path();

        let metadata = match entry.metadata() {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot stat file");
                report.failed += 1;
                continue;
            },
        };
        report.scanned += 1;

        let modified = match metadata.modified() {
            Ok(modified) => modified,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "No modification time");
                report.failed += 1;
                continue;
            },
        };

        // Modification times in the future count as fresh
        let is_expired = now
            .duration_since(modified)
            .is_ok_and(|age| age > max_age);
        if !is_expired {
            continue;
        }

        match remove(&path) {
            Ok(()) => {
                report.removed += 1;
                report.bytes_freed += metadata.len();
                tracing::info!(path = %path.display(), "Removed expired file");
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => {
                report.failed += 1;
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove expired file");
            },
        }
    }

    report
}

/// Run [`sweep`] on `dir` every `interval`, starting immediately.
///
/// Each sweep runs on a blocking thread. The task runs until aborted.
pub fn spawn_periodic(dir: PathBuf, max_age: Duration, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let dir = dir.clone();
            match tokio::task::spawn_blocking(move || sweep(&dir, max_age)).await {
                Ok(report) if report.removed > 0 || report.failed > 0 => {
                    tracing::info!(
                        removed = report.removed,
                        failed = report.failed,
                        bytes_freed = report.bytes_freed,
                        "Retention sweep finished"
                    );
                },
                Ok(_) => {},
                Err(e) => tracing::error!(error = %e, "Retention sweep task failed"),
            }
        }
    })
}
