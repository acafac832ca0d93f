//! Repository metadata watcher.
//!
//! Polls modification times under the git common dir and turns changes into
//! `UiEvent::GitDirChanged`. Bursts collapse in a capacity-1 channel, and the
//! reducer drops refreshes that come sooner than [`MIN_REFRESH_INTERVAL`]
//! after the previous one. If the watcher cannot start, the periodic tick
//! refresh is the only freshness mechanism left.
//!
//! Each poll stats every file under the watched roots, so its cost grows
//! with the number of loose refs and reflogs (packed refs are one file).
//! Walks run on the blocking pool, and a tree with more than
//! [`MAX_WATCHED_FILES`] files stops the watcher in favour of the periodic
//! refresh.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::events::UiEvent;
use crate::runtime::UiEventSender;

/// Minimum spacing between two watch-triggered refreshes.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(600);

/// How often modification times are sampled.
pub const POLL_INTERVAL: Duration = Duration::from_millis(300);

/// Largest metadata tree that is polled.
pub const MAX_WATCHED_FILES: usize = 20_000;

/// Rate limit for watch-triggered refreshes (owned by the reducer).
#[derive(Debug, Clone)]
pub struct WatchThrottle {
    last_refresh: Option<Instant>,
    min_interval: Duration,
}

impl Default for WatchThrottle {
    fn default() -> Self {
        Self::new(MIN_REFRESH_INTERVAL)
    }
}

impl WatchThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_refresh: None,
            min_interval,
        }
    }

    /// Returns true (and records `now`) if a refresh may run.
    pub fn should_refresh(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_refresh
            && now.saturating_duration_since(last) < self.min_interval
        {
            return false;
        }
        self.last_refresh = Some(now);
        true
    }
}

/// Metadata paths that change when worktrees, branches or the index change.
pub fn watched_paths(common_dir: &Path) -> Vec<PathBuf> {
    ["HEAD", "index", "refs", "logs", "worktrees"]
        .iter()
        .map(|name| common_dir.join(name))
        .collect()
}

type Snapshot = BTreeMap<PathBuf, SystemTime>;

/// Modification times of every file below `roots`, or `None` once more
/// than `limit` files were seen.
///
/// Missing roots are skipped, so directories created later show up on the
/// next walk.
fn snapshot(roots: &[PathBuf], limit: usize) -> Option<Snapshot> {
    let mut out = Snapshot::new();
    let mut stack: Vec<PathBuf> = roots.to_vec();
    while let Some(path) = stack.pop() {
        let Ok(meta) = fs::metadata(&path) else {
            continue;
        };
        if meta.is_dir() {
            if let Ok(entries) = fs::read_dir(&path) {
                stack.extend(entries.flatten().map(|entry| entry.path()));
            }
        } else if let Ok(modified) = meta.modified() {
            out.insert(path, modified);
            if out.len() > limit {
                return None;
            }
        }
    }
    Some(out)
}

/// Outcome of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    Unchanged,
    Changed,
    TooLarge,
}

/// Polls the metadata tree and signals when it changes.
pub struct MetadataWatcher {
    roots: Vec<PathBuf>,
    last: Option<Snapshot>,
    limit: usize,
    signal_tx: mpsc::Sender<()>,
}

impl MetadataWatcher {
    pub fn new(common_dir: &Path, signal_tx: mpsc::Sender<()>) -> Self {
        Self {
            roots: watched_paths(common_dir),
            last: None,
            limit: MAX_WATCHED_FILES,
            signal_tx,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Takes one snapshot and compares it with the previous one.
    ///
    /// The first call only records a baseline.
    pub fn poll(&mut self) -> Poll {
        let Some(current) = snapshot(&self.roots, self.limit) else {
            return Poll::TooLarge;
        };
        let changed = self.last.as_ref().is_some_and(|last| *last != current);
        self.last = Some(current);
        if changed {
            Poll::Changed
        } else {
            Poll::Unchanged
        }
    }

    pub fn check_once(&mut self) -> bool {
        self.poll() == Poll::Changed
    }

    /// Runs until the receiving side of the signal channel is gone or the
    /// tree outgrows [`MAX_WATCHED_FILES`].
    pub async fn run(self) {
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut watcher = self;
        loop {
            interval.tick().await;
            let polled = tokio::task::spawn_blocking(move || {
                let poll = watcher.poll();
                (watcher, poll)
            })
            .await;
            let (next, poll) = match polled {
                Ok(polled) => polled,
                Err(error) => {
                    warn!(%error, "metadata poll failed; falling back to periodic refresh");
                    break;
                }
            };
            watcher = next;
            match poll {
                Poll::Unchanged => continue,
                Poll::Changed => {}
                Poll::TooLarge => {
                    warn!(
                        limit = watcher.limit,
                        "git metadata has too many files to poll; falling back to periodic refresh"
                    );
                    break;
                }
            }
            match watcher.signal_tx.try_send(()) {
                // A pending signal already covers this change.
                Ok(()) | Err(TrySendError::Full(())) => {}
                Err(TrySendError::Closed(())) => break,
            }
        }
        debug!("metadata watcher stopped");
    }
}

/// Starts watching `common_dir`, forwarding changes to the inbox.
///
/// Returns `None` (after logging a warning) when the directory cannot be
/// watched.
pub fn spawn_watcher(common_dir: &Path, inbox_tx: UiEventSender) -> Option<JoinHandle<()>> {
    if !common_dir.is_dir() {
        warn!(
            dir = %common_dir.display(),
            "git metadata directory not found; falling back to periodic refresh"
        );
        return None;
    }
    let (signal_tx, mut signal_rx) = mpsc::channel(1);
    let mut watcher = MetadataWatcher::new(common_dir, signal_tx);
    // Baseline before returning, so changes made right after attach count.
    if watcher.poll() == Poll::TooLarge {
        warn!(
            dir = %common_dir.display(),
            "git metadata has too many files to poll; falling back to periodic refresh"
        );
        return None;
    }

    info!(dir = %common_dir.display(), "watching git metadata");
    tokio::spawn(watcher.run());
    Some(tokio::spawn(async move {
        while signal_rx.recv().await.is_some() {
            if inbox_tx.send(UiEvent::GitDirChanged).is_err() {
                break;
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_throttle_suppresses_within_interval() {
        let start = Instant::now();
        let mut throttle = WatchThrottle::default();
        assert!(throttle.should_refresh(start));
        assert!(!throttle.should_refresh(start + Duration::from_millis(300)));
        assert!(!throttle.should_refresh(start + Duration::from_millis(599)));
        assert!(throttle.should_refresh(start + Duration::from_millis(600)));
    }

    #[test]
    fn test_suppressed_event_does_not_extend_window() {
        let start = Instant::now();
        let mut throttle = WatchThrottle::default();
        assert!(throttle.should_refresh(start));
        assert!(!throttle.should_refresh(start + Duration::from_millis(500)));
        assert!(throttle.should_refresh(start + Duration::from_millis(700)));
    }

    #[test]
    fn test_watched_paths() {
        let paths = watched_paths(Path::new("/repo/.git"));
        assert!(paths.contains(&PathBuf::from("/repo/.git/HEAD")));
        assert!(paths.contains(&PathBuf::from("/repo/.git/refs")));
        assert!(paths.contains(&PathBuf::from("/repo/.git/worktrees")));
    }

    #[test]
    fn test_check_once_detects_new_ref() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("refs/heads")).unwrap();
        fs::write(dir.path().join("HEAD"), "ref: refs/heads/main\n").unwrap();
        let (tx, _rx) = mpsc::channel(1);
        let mut watcher = MetadataWatcher::new(dir.path(), tx);

        assert!(!watcher.check_once());
        assert!(!watcher.check_once());

        // Directories created after the watcher started are still seen.
        fs::create_dir_all(dir.path().join("worktrees/feature")).unwrap();
        fs::write(dir.path().join("worktrees/feature/HEAD"), "abc\n").unwrap();
        assert!(watcher.check_once());
        assert!(!watcher.check_once());
    }

    #[tokio::test]
    async fn test_missing_dir_degrades_silently() {
        let dir = tempdir().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(spawn_watcher(&dir.path().join("missing"), tx).is_none());
    }

    #[tokio::test]
    async fn test_run_signals_change() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("refs/heads")).unwrap();
        let (tx, mut rx) = mpsc::channel(1);
        let mut watcher = MetadataWatcher::new(dir.path(), tx);
        watcher.check_once();
        let handle = tokio::spawn(watcher.run());

        fs::write(dir.path().join("refs/heads/feature"), "abc\n").unwrap();
        let signal = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(matches!(signal, Ok(Some(()))));

        drop(rx);
        handle.abort();
    }

    #[tokio::test]
    async fn test_oversized_tree_stops_polling() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("refs/heads")).unwrap();
        fs::write(dir.path().join("refs/heads/a"), "a\n").unwrap();
        let (tx, _rx) = mpsc::channel(1);
        let mut watcher = MetadataWatcher::new(dir.path(), tx).with_limit(2);
        assert_eq!(watcher.poll(), Poll::Unchanged);

        fs::write(dir.path().join("refs/heads/b"), "b\n").unwrap();
        fs::write(dir.path().join("refs/heads/c"), "c\n").unwrap();
        assert_eq!(watcher.poll(), Poll::TooLarge);

        let stopped = tokio::time::timeout(Duration::from_secs(5), tokio::spawn(watcher.run())).await;
        assert!(matches!(stopped, Ok(Ok(()))));
    }
}
