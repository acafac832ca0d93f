//! Repository discovery and session files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lwt_core::persistence::RepoStore;
use tracing::warn;

use super::{blocking, describe};
use crate::events::{RepoHandle, SessionData, UiEvent};
use crate::runtime::executor::RepoConnector;

pub async fn discover_repository(connector: Arc<dyn RepoConnector>, dir: PathBuf) -> UiEvent {
    let result = connector
        .connect(&dir)
        .await
        .map(RepoHandle)
        .map_err(|e| describe(&e));
    UiEvent::RepositoryDiscovered { result }
}

/// Reads every session file. A damaged file costs only its own data.
pub async fn load_session(store: RepoStore) -> UiEvent {
    match blocking(move || Ok(read_session(&store))).await {
        Ok(session) => UiEvent::SessionLoaded(session),
        Err(error) => {
            warn!(error = %describe(&error), "session files unreadable");
            UiEvent::SessionLoaded(SessionData::default())
        }
    }
}

fn read_session(store: &RepoStore) -> SessionData {
    fn or_default<T: Default>(result: anyhow::Result<T>, what: &str, dir: &Path) -> T {
        result.unwrap_or_else(|error| {
            warn!(dir = %dir.display(), error = %describe(&error), "failed to load {what}");
            T::default()
        })
    }

    let dir = store.dir();
    SessionData {
        worktrees: or_default(store.load_worktree_cache(), "worktree cache", dir),
        access_history: or_default(store.load_access_history(), "access history", dir),
        last_selected: or_default(store.load_last_selected(), "last selection", dir),
        command_history: or_default(store.load_command_history(), "command history", dir),
        palette_history: or_default(store.load_palette_history(), "palette history", dir),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn test_load_session_from_empty_dir() {
        let dir = tempdir().unwrap();
        let event = load_session(RepoStore::new(dir.path())).await;
        let UiEvent::SessionLoaded(session) = event else {
            panic!("expected session");
        };
        assert!(session.worktrees.is_empty());
        assert!(session.last_selected.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_only_loses_its_own_data() {
        let dir = tempdir().unwrap();
        let store = RepoStore::new(dir.path());
        store.push_command_history("make").unwrap();
        std::fs::write(dir.path().join(".worktree-access.json"), "{not json").unwrap();

        let UiEvent::SessionLoaded(session) = load_session(store).await else {
            panic!("expected session");
        };
        assert!(session.access_history.is_empty());
        assert_eq!(session.command_history, vec!["make"]);
    }
}
