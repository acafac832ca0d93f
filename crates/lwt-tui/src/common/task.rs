use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

#[derive(Debug, Default)]
pub struct TaskSeq {
    next: u64,
}

impl TaskSeq {
    pub fn next_id(&mut self) -> TaskId {
        let id = TaskId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }
}

/// Logical task kinds.
///
/// Recurring kinds (queries, timers, validation) keep one live task: a newer
/// task supersedes the older one and only the latest result is applied.
/// One-shot kinds (mutations, command batches) may overlap and every result
/// is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    WorktreeList,
    Details,
    Debounce,
    Validate,
    Create,
    Delete,
    Rename,
    Absorb,
    Upstream,
    PruneScan,
    Commands,
    TrustCheck,
    FileOp,
    Shell,
    Diff,
    CommitFiles,
    PullRequests,
    Issues,
    Branches,
    BranchName,
}

impl TaskKind {
    pub fn is_recurring(self) -> bool {
        matches!(
            self,
            TaskKind::WorktreeList
                | TaskKind::Details
                | TaskKind::Debounce
                | TaskKind::Validate
                | TaskKind::PruneScan
                | TaskKind::Diff
                | TaskKind::CommitFiles
                | TaskKind::PullRequests
                | TaskKind::Issues
                | TaskKind::Branches
                | TaskKind::BranchName
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TaskMeta {
    #[default]
    None,
    /// Human-readable label shown while the task runs.
    Label(String),
}

#[derive(Debug, Clone)]
pub struct TaskStarted {
    pub id: TaskId,
    pub cancel: Option<CancellationToken>,
    pub meta: TaskMeta,
}

#[derive(Debug)]
pub struct TaskCompleted<E> {
    pub id: TaskId,
    pub result: E,
}

/// Task lifecycle state (stored in AppState, mutated only by reducer).
#[derive(Debug, Default, Clone)]
pub struct TaskState {
    pub active: Option<TaskId>,
    pub cancel: Option<CancellationToken>,
    pub meta: TaskMeta,
    /// Older one-shot tasks still running alongside `active`.
    overlapped: Vec<TaskId>,
}

impl TaskState {
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn on_started(&mut self, started: &TaskStarted) {
        self.active = Some(started.id);
        self.cancel = started.cancel.clone();
        self.meta = started.meta.clone();
    }

    /// Starts a one-shot task without superseding the running one.
    pub fn on_started_alongside(&mut self, started: &TaskStarted) {
        if let Some(previous) = self.active {
            self.overlapped.push(previous);
        }
        self.on_started(started);
    }

    /// Finishes a one-shot task. Every started id finishes exactly once.
    pub fn finish_any(&mut self, id: TaskId) -> bool {
        if self.active == Some(id) {
            match self.overlapped.pop() {
                Some(previous) => {
                    self.active = Some(previous);
                    self.cancel = None;
                }
                None => self.clear(),
            }
            return true;
        }
        if let Some(pos) = self.overlapped.iter().position(|&other| other == id) {
            self.overlapped.remove(pos);
            return true;
        }
        false
    }

    pub fn finish_if_active(&mut self, id: TaskId) -> bool {
        let ok = self.active == Some(id);
        if ok {
            self.clear();
        }
        ok
    }

    pub fn clear(&mut self) {
        self.active = None;
        self.overlapped.clear();
        self.cancel = None;
        self.meta = TaskMeta::None;
    }

    pub fn label(&self) -> Option<&str> {
        match &self.meta {
            TaskMeta::Label(label) if self.is_running() => Some(label),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct Tasks {
    pub worktree_list: TaskState,
    pub details: TaskState,
    pub debounce: TaskState,
    pub validate: TaskState,
    pub create: TaskState,
    pub delete: TaskState,
    pub rename: TaskState,
    pub absorb: TaskState,
    pub upstream: TaskState,
    pub prune_scan: TaskState,
    pub commands: TaskState,
    pub trust_check: TaskState,
    pub file_op: TaskState,
    pub shell: TaskState,
    pub diff: TaskState,
    pub commit_files: TaskState,
    pub pull_requests: TaskState,
    pub issues: TaskState,
    pub branches: TaskState,
    pub branch_name: TaskState,
}

impl Tasks {
    pub fn on_started(&mut self, kind: TaskKind, started: &TaskStarted) {
        let state = self.state_mut(kind);
        if kind.is_recurring() {
            state.on_started(started);
        } else {
            state.on_started_alongside(started);
        }
    }

    /// Whether a completion should be applied: recurring kinds apply only
    /// the latest task, one-shot kinds apply every task.
    pub fn on_finished(&mut self, kind: TaskKind, id: TaskId) -> bool {
        let state = self.state_mut(kind);
        if kind.is_recurring() {
            state.finish_if_active(id)
        } else {
            state.finish_any(id)
        }
    }

    pub fn state(&self, kind: TaskKind) -> &TaskState {
        match kind {
            TaskKind::WorktreeList => &self.worktree_list,
            TaskKind::Details => &self.details,
            TaskKind::Debounce => &self.debounce,
            TaskKind::Validate => &self.validate,
            TaskKind::Create => &self.create,
            TaskKind::Delete => &self.delete,
            TaskKind::Rename => &self.rename,
            TaskKind::Absorb => &self.absorb,
            TaskKind::Upstream => &self.upstream,
            TaskKind::PruneScan => &self.prune_scan,
            TaskKind::Commands => &self.commands,
            TaskKind::TrustCheck => &self.trust_check,
            TaskKind::FileOp => &self.file_op,
            TaskKind::Shell => &self.shell,
            TaskKind::Diff => &self.diff,
            TaskKind::CommitFiles => &self.commit_files,
            TaskKind::PullRequests => &self.pull_requests,
            TaskKind::Issues => &self.issues,
            TaskKind::Branches => &self.branches,
            TaskKind::BranchName => &self.branch_name,
        }
    }

    pub fn state_mut(&mut self, kind: TaskKind) -> &mut TaskState {
        match kind {
            TaskKind::WorktreeList => &mut self.worktree_list,
            TaskKind::Details => &mut self.details,
            TaskKind::Debounce => &mut self.debounce,
            TaskKind::Validate => &mut self.validate,
            TaskKind::Create => &mut self.create,
            TaskKind::Delete => &mut self.delete,
            TaskKind::Rename => &mut self.rename,
            TaskKind::Absorb => &mut self.absorb,
            TaskKind::Upstream => &mut self.upstream,
            TaskKind::PruneScan => &mut self.prune_scan,
            TaskKind::Commands => &mut self.commands,
            TaskKind::TrustCheck => &mut self.trust_check,
            TaskKind::FileOp => &mut self.file_op,
            TaskKind::Shell => &mut self.shell,
            TaskKind::Diff => &mut self.diff,
            TaskKind::CommitFiles => &mut self.commit_files,
            TaskKind::PullRequests => &mut self.pull_requests,
            TaskKind::Issues => &mut self.issues,
            TaskKind::Branches => &mut self.branches,
            TaskKind::BranchName => &mut self.branch_name,
        }
    }

    fn all(&self) -> [&TaskState; 20] {
        [
            &self.worktree_list,
            &self.details,
            &self.debounce,
            &self.validate,
            &self.create,
            &self.delete,
            &self.rename,
            &self.absorb,
            &self.upstream,
            &self.prune_scan,
            &self.commands,
            &self.trust_check,
            &self.file_op,
            &self.shell,
            &self.diff,
            &self.commit_files,
            &self.pull_requests,
            &self.issues,
            &self.branches,
            &self.branch_name,
        ]
    }

    /// Debounce timers are not user-visible work and are excluded.
    pub fn is_any_running(&self) -> bool {
        self.all()
            .iter()
            .any(|s| s.is_running() && !std::ptr::eq(*s, &self.debounce))
    }

    /// Label of the first running task that has one.
    pub fn busy_label(&self) -> Option<&str> {
        self.all().into_iter().find_map(TaskState::label)
    }
}
