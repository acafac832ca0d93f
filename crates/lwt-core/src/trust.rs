//! Trust-on-first-use store for repository command files.
//!
//! A file is identified by its canonical path and fingerprinted by the
//! SHA-256 of its content. Editing a trusted or blocked file makes it
//! `Unknown` again.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::persistence::write_atomic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustStatus {
    Trusted,
    /// Never seen, or changed since the last decision.
    Unknown,
    Blocked,
}

/// Persistent trust decisions, keyed by config file path.
pub trait TrustStore: Send + Sync {
    /// A missing file is `Trusted`: there is nothing to run from it.
    fn check_trust(&self, path: &Path) -> Result<TrustStatus>;
    fn record_trust(&self, path: &Path) -> Result<()>;
    fn record_block(&self, path: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TrustRecord {
    sha256: String,
    #[serde(default)]
    blocked: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TrustFile {
    #[serde(default)]
    files: HashMap<String, TrustRecord>,
}

/// JSON-backed store (`$LWT_HOME/trusted.json`).
pub struct FileTrustStore {
    db_path: PathBuf,
    lock: Mutex<()>,
}

impl FileTrustStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn default_location() -> Self {
        Self::new(crate::config::paths::trust_path())
    }

    fn load(&self) -> Result<TrustFile> {
        match fs::read_to_string(&self.db_path) {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("parse trust db {}", self.db_path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(TrustFile::default()),
            Err(e) => {
                Err(e).with_context(|| format!("read trust db {}", self.db_path.display()))
            }
        }
    }

    fn record(&self, path: &Path, blocked: bool) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sha256) = fingerprint(path)? else {
            return Ok(());
        };
        let mut db = self.load()?;
        db.files
            .insert(trust_key(path), TrustRecord { sha256, blocked });
        let json = serde_json::to_string_pretty(&db).context("serialize trust db")?;
        write_atomic(&self.db_path, json.as_bytes())
    }
}

impl TrustStore for FileTrustStore {
    fn check_trust(&self, path: &Path) -> Result<TrustStatus> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(current) = fingerprint(path)? else {
            return Ok(TrustStatus::Trusted);
        };
        let db = self.load()?;
        Ok(match db.files.get(&trust_key(path)) {
            Some(record) if record.sha256 == current && record.blocked => TrustStatus::Blocked,
            Some(record) if record.sha256 == current => TrustStatus::Trusted,
            _ => TrustStatus::Unknown,
        })
    }

    fn record_trust(&self, path: &Path) -> Result<()> {
        tracing::info!(path = %path.display(), "trusting repository commands");
        self.record(path, false)
    }

    fn record_block(&self, path: &Path) -> Result<()> {
        tracing::info!(path = %path.display(), "blocking repository commands");
        self.record(path, true)
    }
}

/// SHA-256 hex digest of the file, or `None` when it does not exist.
pub fn fingerprint(path: &Path) -> Result<Option<String>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(format!("{:x}", Sha256::digest(&bytes)))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
    }
}

fn trust_key(path: &Path) -> String {
    path.canonicalize()
        .unwrap_or_else(|_| path.to_path_buf())
        .display()
        .to_string()
}

/// In-memory store; statuses are set directly.
#[derive(Default)]
pub struct MemoryTrustStore {
    statuses: Mutex<HashMap<PathBuf, TrustStatus>>,
}

impl MemoryTrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, path: impl Into<PathBuf>, status: TrustStatus) {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), status);
    }

    pub fn status(&self, path: &Path) -> Option<TrustStatus> {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .copied()
    }
}

impl TrustStore for MemoryTrustStore {
    fn check_trust(&self, path: &Path) -> Result<TrustStatus> {
        Ok(self.status(path).unwrap_or(TrustStatus::Unknown))
    }

    fn record_trust(&self, path: &Path) -> Result<()> {
        self.set(path, TrustStatus::Trusted);
        Ok(())
    }

    fn record_block(&self, path: &Path) -> Result<()> {
        self.set(path, TrustStatus::Blocked);
        Ok(())
    }
}
