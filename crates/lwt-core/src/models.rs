//! Worktree data model and git porcelain parsing.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Branch label used for detached worktrees.
pub const DETACHED: &str = "(detached)";

/// One worktree of the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    pub branch: String,
    pub is_main: bool,
    pub dirty: bool,
    pub ahead: u32,
    pub behind: u32,
    pub has_upstream: bool,
    /// Tracking ref as `remote/branch`, when one is configured.
    #[serde(default)]
    pub upstream: Option<String>,
    /// Unix seconds of the branch's last commit.
    pub last_active_ts: i64,
    /// Unix seconds of the last switch to this worktree (from access history).
    #[serde(default)]
    pub last_switched_ts: i64,
    pub untracked: u32,
    pub modified: u32,
    pub staged: u32,
}

impl WorktreeInfo {
    pub fn new(path: impl Into<PathBuf>, branch: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            branch: branch.into(),
            is_main: false,
            dirty: false,
            ahead: 0,
            behind: 0,
            has_upstream: false,
            upstream: None,
            last_active_ts: 0,
            last_switched_ts: 0,
            untracked: 0,
            modified: 0,
            staged: 0,
        }
    }

    /// Directory name of the worktree.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn has_changes(&self) -> bool {
        self.dirty || self.untracked > 0 || self.modified > 0 || self.staged > 0
    }
}

/// Entry of `git worktree list --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeEntry {
    pub path: PathBuf,
    pub branch: Option<String>,
}

/// Parses `git worktree list --porcelain` output.
pub fn parse_worktree_list(raw: &str) -> Vec<WorktreeEntry> {
    let mut entries = Vec::new();
    let mut current: Option<WorktreeEntry> = None;
    for line in raw.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
            current = Some(WorktreeEntry {
                path: PathBuf::from(path.trim()),
                branch: None,
            });
        } else if let Some(branch) = line.strip_prefix("branch ")
            && let Some(entry) = current.as_mut()
        {
            let branch = branch.trim();
            entry.branch = Some(
                branch
                    .strip_prefix("refs/heads/")
                    .unwrap_or(branch)
                    .to_string(),
            );
        }
    }
    if let Some(entry) = current {
        entries.push(entry);
    }
    entries
}

/// Upstream tracking and change counts from `git status --porcelain=v2 --branch`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BranchStatus {
    pub ahead: u32,
    pub behind: u32,
    pub has_upstream: bool,
    pub upstream: Option<String>,
    pub counts: StatusCounts,
}

pub fn parse_branch_status(raw: &str) -> BranchStatus {
    let mut status = BranchStatus::default();
    for line in raw.lines() {
        if let Some(upstream) = line.strip_prefix("# branch.upstream ") {
            status.has_upstream = true;
            status.upstream = Some(upstream.trim().to_string());
        } else if let Some(ab) = line.strip_prefix("# branch.ab ") {
            status.has_upstream = true;
            let mut parts = ab.split_whitespace();
            status.ahead = parts
                .next()
                .and_then(|a| a.trim_start_matches('+').parse().ok())
                .unwrap_or(0);
            status.behind = parts
                .next()
                .and_then(|b| b.trim_start_matches('-').parse().ok())
                .unwrap_or(0);
        }
    }
    status.counts = StatusCounts::from_files(&parse_status_files(raw));
    status
}

/// Splits `remote/branch` at the first slash. Both parts must be non-empty;
/// the branch part may itself contain slashes.
pub fn parse_upstream_ref(input: &str) -> Option<(String, String)> {
    let (remote, branch) = input.trim().split_once('/')?;
    let (remote, branch) = (remote.trim(), branch.trim());
    if remote.is_empty() || branch.is_empty() {
        return None;
    }
    Some((remote.to_string(), branch.to_string()))
}

/// Parses `git for-each-ref --format=%(refname:short)|%(committerdate:unix)`.
pub fn parse_branch_activity(raw: &str) -> HashMap<String, i64> {
    raw.lines()
        .filter_map(|line| {
            let (branch, ts) = line.rsplit_once('|')?;
            Some((branch.to_string(), ts.trim().parse().ok()?))
        })
        .collect()
}

// ============================================================================
// Status files
// ============================================================================

/// A changed file from `git status --porcelain=v2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFile {
    pub path: String,
    /// Two-character XY status (`.` for unchanged, `?` for untracked).
    pub xy: String,
    pub untracked: bool,
}

impl StatusFile {
    pub fn is_staged(&self) -> bool {
        !self.untracked && self.xy.chars().next().is_some_and(|c| c != '.' && c != ' ')
    }

    pub fn is_modified(&self) -> bool {
        !self.untracked && self.xy.chars().nth(1).is_some_and(|c| c != '.' && c != ' ')
    }

    /// True when the file has staged changes and nothing left in the worktree.
    pub fn is_fully_staged(&self) -> bool {
        self.is_staged() && !self.is_modified()
    }
}

/// Parses `git status --porcelain=v2` records.
///
/// Paths are the trailing field of each record and may contain spaces, so
/// records are split on a fixed number of separators rather than on all
/// whitespace.
pub fn parse_status_files(raw: &str) -> Vec<StatusFile> {
    let mut files = Vec::new();
    for line in raw.lines() {
        let Some((kind, rest)) = line.split_once(' ') else {
            continue;
        };
        match kind {
            "1" => {
                let fields: Vec<&str> = line.splitn(9, ' ').collect();
                if let &[_, xy, .., path] = fields.as_slice()
                    && fields.len() == 9
                {
                    files.push(StatusFile {
                        path: path.to_string(),
                        xy: xy.to_string(),
                        untracked: false,
                    });
                }
            }
            "2" => {
                let fields: Vec<&str> = line.splitn(10, ' ').collect();
                if let &[_, xy, .., paths] = fields.as_slice()
                    && fields.len() == 10
                {
                    // "<path>\t<origPath>"; keep the new path.
                    let path = paths.split('\t').next().unwrap_or(paths);
                    files.push(StatusFile {
                        path: path.to_string(),
                        xy: xy.to_string(),
                        untracked: false,
                    });
                }
            }
            "?" if !rest.is_empty() => files.push(StatusFile {
                path: rest.to_string(),
                xy: " ?".to_string(),
                untracked: true,
            }),
            _ => {}
        }
    }
    files
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub staged: u32,
    pub modified: u32,
    pub untracked: u32,
}

impl StatusCounts {
    pub fn from_files(files: &[StatusFile]) -> Self {
        let mut counts = Self::default();
        for file in files {
            if file.untracked {
                counts.untracked += 1;
                continue;
            }
            if file.is_staged() {
                counts.staged += 1;
            }
            if file.is_modified() {
                counts.modified += 1;
            }
        }
        counts
    }

    pub fn is_clean(&self) -> bool {
        self.staged == 0 && self.modified == 0 && self.untracked == 0
    }
}

// ============================================================================
// Commit log
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitLogEntry {
    pub sha: String,
    pub author: String,
    pub message: String,
}

impl CommitLogEntry {
    pub fn short_sha(&self) -> &str {
        self.sha.get(..7).unwrap_or(&self.sha)
    }
}

/// Parses `git log --pretty=format:%H%x09%an%x09%s`.
pub fn parse_log(raw: &str) -> Vec<CommitLogEntry> {
    raw.lines()
        .filter_map(|line| {
            let mut parts = line.splitn(3, '\t');
            let sha = parts.next()?.trim();
            if sha.is_empty() {
                return None;
            }
            Some(CommitLogEntry {
                sha: sha.to_string(),
                author: parts.next().unwrap_or_default().to_string(),
                message: parts.next().unwrap_or_default().to_string(),
            })
        })
        .collect()
}

/// A file touched by a commit (`git show --name-status`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFile {
    pub status: String,
    pub path: String,
}

pub fn parse_name_status(raw: &str) -> Vec<CommitFile> {
    raw.lines()
        .filter_map(|line| {
            let mut parts = line.split('\t');
            let status = parts.next()?.trim();
            let path = parts.last()?.trim();
            if status.is_empty() || path.is_empty() {
                return None;
            }
            Some(CommitFile {
                status: status.to_string(),
                path: path.to_string(),
            })
        })
        .collect()
}

// ============================================================================
// Pull requests / issues
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub head_ref_name: String,
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: String,
}

/// Turns a free-form title into a branch-safe name.
///
/// Lowercases, replaces runs of anything outside `[a-z0-9/._-]` with `-`,
/// and caps the length.
pub fn sanitize_branch_name(input: &str, max_len: usize) -> String {
    let mut out = String::new();
    let mut last_dash = false;
    for ch in input.trim().chars() {
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_alphanumeric() || matches!(ch, '/' | '.' | '_') {
            out.push(ch);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    let trimmed: String = out
        .trim_matches(|c| c == '-' || c == '/' || c == '.')
        .chars()
        .take(max_len)
        .collect();
    trimmed.trim_end_matches(['-', '/', '.']).to_string()
}

/// Default branch name suggested for a PR or issue.
pub fn default_branch_name(prefix: &str, number: u64, title: &str) -> String {
    let slug = sanitize_branch_name(title, 40);
    if slug.is_empty() {
        format!("{prefix}-{number}")
    } else {
        format!("{prefix}-{number}-{slug}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_worktree_list_marks_detached() {
        let raw = "worktree /repo\nHEAD abc\nbranch refs/heads/main\n\n\
                   worktree /wt/feature\nHEAD def\nbranch refs/heads/feature/x\n\n\
                   worktree /wt/detached\nHEAD 123\ndetached\n";
        let entries = parse_worktree_list(raw);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].branch.as_deref(), Some("main"));
        assert_eq!(entries[1].branch.as_deref(), Some("feature/x"));
        assert_eq!(entries[2].branch, None);
    }

    #[test]
    fn test_parse_status_files_v2() {
        let raw = "# branch.oid abc\n\
                   # branch.head main\n\
                   1 M. N... 100644 100644 100644 aaa bbb src/lib.rs\n\
                   1 .M N... 100644 100644 100644 aaa bbb README.md\n\
                   2 R. N... 100644 100644 100644 aaa bbb R100 new name.rs\told.rs\n\
                   ? notes.txt\n";
        let files = parse_status_files(raw);
        assert_eq!(files.len(), 4);
        assert_eq!(files[0].path, "src/lib.rs");
        assert!(files[0].is_staged());
        assert!(!files[0].is_modified());
        assert!(files[1].is_modified());
        assert_eq!(files[2].path, "new name.rs");
        assert!(files[3].untracked);

        let counts = StatusCounts::from_files(&files);
        assert_eq!(
            counts,
            StatusCounts {
                staged: 2,
                modified: 1,
                untracked: 1
            }
        );
    }

    #[test]
    fn test_parse_status_files_keeps_spaces_in_paths() {
        let raw = "1 .M N... 100644 100644 100644 aaa bbb docs/release  notes.md\n\
                   2 RM N... 100644 100644 100644 aaa bbb R087 src/my file.rs\tsrc/old file.rs\n\
                   ? scratch pad.txt\n\
                   1 M. N... truncated\n";
        let files = parse_status_files(raw);
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["docs/release  notes.md", "src/my file.rs", "scratch pad.txt"]
        );
        assert!(files[1].is_staged());
        assert!(files[1].is_modified());
    }

    #[test]
    fn test_parse_branch_status_ahead_behind() {
        let raw = "# branch.upstream origin/main\n# branch.ab +3 -1\n? x\n";
        let status = parse_branch_status(raw);
        assert!(status.has_upstream);
        assert_eq!(status.upstream.as_deref(), Some("origin/main"));
        assert_eq!(status.ahead, 3);
        assert_eq!(status.behind, 1);
        assert_eq!(status.counts.untracked, 1);
    }

    #[test]
    fn test_parse_upstream_ref() {
        assert_eq!(
            parse_upstream_ref(" origin/feature/login "),
            Some(("origin".to_string(), "feature/login".to_string()))
        );
        assert_eq!(parse_upstream_ref("origin"), None);
        assert_eq!(parse_upstream_ref("origin/"), None);
        assert_eq!(parse_upstream_ref("/main"), None);
        assert_eq!(parse_upstream_ref(""), None);
    }

    #[test]
    fn test_parse_log_splits_on_tabs() {
        let raw = "abcdef0123\tAda\tFix: handle a\ttab\n\n0123456789\tBob\tInit\n";
        let log = parse_log(raw);
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].message, "Fix: handle a\ttab");
        assert_eq!(log[0].short_sha(), "abcdef0");
        assert_eq!(log[1].author, "Bob");
    }

    #[test]
    fn test_parse_branch_activity() {
        let map = parse_branch_activity("main|1700000000\nfeat|x|1700000100\nbad|\n");
        assert_eq!(map.get("main"), Some(&1_700_000_000));
        assert_eq!(map.get("feat|x"), Some(&1_700_000_100));
        assert!(!map.contains_key("bad"));
    }

    #[test]
    fn test_sanitize_branch_name() {
        assert_eq!(
            sanitize_branch_name("  Fix: the Login bug!! ", 40),
            "fix-the-login-bug"
        );
        assert_eq!(default_branch_name("issue", 42, "???"), "issue-42");
        assert_eq!(
            default_branch_name("pr", 7, "Add feature/flags"),
            "pr-7-add-feature/flags"
        );
    }
}
