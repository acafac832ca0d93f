//! Derived views over worktree data: filtering, sorting, the status file
//! tree and the annotated commit log.
//!
//! Everything here is pure and cheap, so the reducer recomputes views on
//! every keystroke without touching the repository.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use lwt_core::config::SortMode;
use lwt_core::models::{CommitLogEntry, StatusFile, WorktreeInfo, parse_log};

use crate::details_cache::DetailsSnapshot;

/// Case-insensitive substring match; an empty filter matches everything.
pub fn matches_filter(haystack: &str, filter: &str) -> bool {
    let filter = filter.trim();
    filter.is_empty() || haystack.to_lowercase().contains(&filter.to_lowercase())
}

pub fn worktree_matches(wt: &WorktreeInfo, filter: &str) -> bool {
    matches_filter(&wt.path.to_string_lossy(), filter) || matches_filter(&wt.branch, filter)
}

/// Orders worktrees in place. The main worktree leads in path order.
pub fn sort_worktrees(worktrees: &mut [WorktreeInfo], mode: SortMode) {
    match mode {
        SortMode::Path => {
            worktrees.sort_by(|a, b| b.is_main.cmp(&a.is_main).then_with(|| a.path.cmp(&b.path)));
        }
        SortMode::Active => {
            worktrees.sort_by(|a, b| {
                b.last_active_ts
                    .cmp(&a.last_active_ts)
                    .then_with(|| a.path.cmp(&b.path))
            });
        }
        SortMode::Switched => {
            worktrees.sort_by(|a, b| {
                b.last_switched_ts
                    .cmp(&a.last_switched_ts)
                    .then_with(|| a.path.cmp(&b.path))
            });
        }
    }
}

/// Index of `previous` in `paths`, or `fallback` clamped to bounds.
pub fn restore_selection<'a, I>(paths: I, previous: Option<&Path>, fallback: usize) -> usize
where
    I: IntoIterator<Item = &'a Path>,
{
    let paths: Vec<&Path> = paths.into_iter().collect();
    if let Some(prev) = previous
        && let Some(idx) = paths.iter().position(|p| *p == prev)
    {
        return idx;
    }
    clamp_index(fallback, paths.len())
}

pub fn clamp_index(idx: usize, len: usize) -> usize {
    if len == 0 { 0 } else { idx.min(len - 1) }
}

// ============================================================================
// Status tree
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusRow {
    Dir {
        /// Full directory path, used as the collapse key.
        path: String,
        /// Display label; single-child chains are joined (`a/b/c`).
        label: String,
        depth: usize,
        collapsed: bool,
    },
    File {
        file: StatusFile,
        label: String,
        depth: usize,
    },
}

impl StatusRow {
    pub fn depth(&self) -> usize {
        match self {
            StatusRow::Dir { depth, .. } | StatusRow::File { depth, .. } => *depth,
        }
    }
}

#[derive(Default)]
struct Node {
    dirs: BTreeMap<String, Node>,
    files: BTreeMap<String, StatusFile>,
}

impl Node {
    fn insert(&mut self, file: &StatusFile) {
        let mut parts: Vec<&str> = file.path.split('/').filter(|p| !p.is_empty()).collect();
        let Some(name) = parts.pop() else {
            return;
        };
        let mut node = self;
        for part in parts {
            node = node.dirs.entry(part.to_string()).or_default();
        }
        node.files.insert(name.to_string(), file.clone());
    }
}

/// Builds visible tree rows from `files`, honouring collapsed directories.
pub fn build_status_rows(
    files: &[StatusFile],
    collapsed: &HashSet<String>,
    filter: &str,
) -> Vec<StatusRow> {
    let mut root = Node::default();
    for file in files.iter().filter(|f| matches_filter(&f.path, filter)) {
        root.insert(file);
    }
    let mut rows = Vec::new();
    flatten(&root, "", 0, collapsed, &mut rows);
    rows
}

fn flatten(
    node: &Node,
    prefix: &str,
    depth: usize,
    collapsed: &HashSet<String>,
    rows: &mut Vec<StatusRow>,
) {
    for (name, child) in &node.dirs {
        let mut label = name.clone();
        let mut path = join_path(prefix, name);
        let mut current = child;
        while current.files.is_empty() && current.dirs.len() == 1 {
            let Some((next_name, next)) = current.dirs.iter().next() else {
                break;
            };
            label = format!("{label}/{next_name}");
            path = join_path(&path, next_name);
            current = next;
        }
        let is_collapsed = collapsed.contains(&path);
        rows.push(StatusRow::Dir {
            path: path.clone(),
            label,
            depth,
            collapsed: is_collapsed,
        });
        if !is_collapsed {
            flatten(current, &path, depth + 1, collapsed, rows);
        }
    }
    for (name, file) in &node.files {
        rows.push(StatusRow::File {
            file: file.clone(),
            label: name.clone(),
            depth,
        });
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

// ============================================================================
// Annotated log
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedCommit {
    pub entry: CommitLogEntry,
    /// Not on any remote.
    pub unpushed: bool,
    /// Not yet in the main branch.
    pub unmerged: bool,
}

pub fn annotate_log(snapshot: &DetailsSnapshot) -> Vec<AnnotatedCommit> {
    parse_log(&snapshot.log)
        .into_iter()
        .map(|entry| AnnotatedCommit {
            unpushed: snapshot.unpushed.contains(&entry.sha),
            unmerged: snapshot.unmerged.contains(&entry.sha),
            entry,
        })
        .collect()
}
