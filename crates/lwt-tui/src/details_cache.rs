//! TTL-bounded cache of per-worktree status and log snapshots.
//!
//! Background fetch tasks write through the exclusive lock; the reducer and
//! render paths only take the shared lock. The lock is never held across a
//! fetch, so a fetch may finish after its path was invalidated; each path
//! carries a generation that `invalidate` and `reset` bump, and a fetch only
//! stores its result if the generation it started under is still current.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use anyhow::Result;
use tokio::time::Instant;

/// How long a snapshot stays valid for reads.
pub const DETAILS_TTL: Duration = Duration::from_secs(2);

/// Raw repository output for one worktree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailsSnapshot {
    pub status: String,
    pub log: String,
    pub unpushed: HashSet<String>,
    pub unmerged: HashSet<String>,
}

#[derive(Debug, Clone)]
pub struct DetailsCacheEntry {
    pub snapshot: DetailsSnapshot,
    pub fetched_at: Instant,
}

impl DetailsCacheEntry {
    fn is_fresh(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.fetched_at) < ttl
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<PathBuf, DetailsCacheEntry>,
    generations: HashMap<PathBuf, u64>,
    /// Bumped by `reset`; covers paths with no generation of their own yet.
    epoch: u64,
}

impl Inner {
    fn generation(&self, path: &Path) -> (u64, u64) {
        (self.epoch, self.generations.get(path).copied().unwrap_or(0))
    }
}

#[derive(Debug)]
pub struct DetailsCache {
    ttl: Duration,
    inner: RwLock<Inner>,
}

impl Default for DetailsCache {
    fn default() -> Self {
        Self::new(DETAILS_TTL)
    }
}

impl DetailsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Returns the snapshot if it was fetched less than one TTL ago.
    pub fn get_fresh(&self, path: &Path) -> Option<DetailsSnapshot> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .entries
            .get(path)
            .filter(|entry| entry.is_fresh(Instant::now(), self.ttl))
            .map(|entry| entry.snapshot.clone())
    }

    pub fn fetched_at(&self, path: &Path) -> Option<Instant> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.entries.get(path).map(|entry| entry.fetched_at)
    }

    pub fn insert(&self, path: PathBuf, snapshot: DetailsSnapshot) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.entries.insert(
            path,
            DetailsCacheEntry {
                snapshot,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Drops the entry so the next read fetches fresh data. Fetches already
    /// in flight for `path` will not store their result.
    pub fn invalidate(&self, path: &Path) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *inner.generations.entry(path.to_path_buf()).or_insert(0) += 1;
        if inner.entries.remove(path).is_some() {
            tracing::debug!(path = %path.display(), "details cache invalidated");
        }
    }

    pub fn reset(&self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.entries.clear();
        inner.generations.clear();
        inner.epoch += 1;
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the fresh snapshot, or runs `fetch` exactly once and stores
    /// its result.
    ///
    /// The fetched snapshot is always returned, but it is only stored if the
    /// path was not invalidated or reset while the fetch ran.
    ///
    /// # Errors
    /// Propagates the fetch error; the cache is left unchanged.
    pub async fn read_or_fetch<F, Fut>(&self, path: &Path, fetch: F) -> Result<DetailsSnapshot>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<DetailsSnapshot>>,
    {
        let started = {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = inner
                .entries
                .get(path)
                .filter(|entry| entry.is_fresh(Instant::now(), self.ttl))
            {
                return Ok(entry.snapshot.clone());
            }
            inner.generation(path)
        };

        let snapshot = fetch().await?;

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.generation(path) == started {
            inner.entries.insert(
                path.to_path_buf(),
                DetailsCacheEntry {
                    snapshot: snapshot.clone(),
                    fetched_at: Instant::now(),
                },
            );
        } else {
            tracing::debug!(path = %path.display(), "discarding details fetched before invalidation");
        }
        Ok(snapshot)
    }
}
