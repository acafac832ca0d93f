//! Modal screens.
//!
//! A screen takes over keyboard input until it is dismissed. At most one
//! screen is active; a screen opened mid-flow (`OpenChild`) suspends the
//! current one as its parent, and cancelling the child restores it. The
//! parent never receives input while suspended.
//!
//! Screens never touch `TuiState` or spawn work. Key handlers return a
//! [`ScreenUpdate`]: a transition for the stack plus intents
//! ([`ScreenAction`]) that the reducer turns into state changes and effects.

pub mod checklist;
pub mod commit;
pub mod commit_files;
pub mod confirm;
pub mod diff;
pub mod help;
pub mod info;
pub mod input;
pub mod loading;
pub mod palette;
pub mod picker;
pub mod render_utils;
pub mod trust;
pub mod welcome;

use std::path::PathBuf;

pub use checklist::ChecklistState;
pub use commit::CommitState;
pub use commit_files::CommitFilesState;
pub use confirm::{ConfirmAction, ConfirmState};
use crossterm::event::KeyEvent;
pub use diff::DiffState;
pub use help::HelpState;
pub use info::InfoState;
pub use input::{InputPurpose, InputState};
pub use loading::LoadingState;
use lwt_core::models::{Issue, PullRequest};
pub use palette::{PaletteItem, PaletteState};
pub use picker::{PickerItem, PickerOutcome, PickerState};
use ratatui::Frame;
use ratatui::layout::Rect;
pub use trust::TrustState;
pub use welcome::WelcomeState;

use crate::operations::{CreateSource, PruneCandidate};
use crate::state::TuiState;
use crate::trust_gate::{CommandHook, TrustResolution};

// ============================================================================
// ScreenRequest / ScreenTransition / ScreenAction / ScreenUpdate
// ============================================================================

/// Requests to open a screen.
#[derive(Debug, Clone)]
pub enum ScreenRequest {
    Confirm {
        message: String,
        action: ConfirmAction,
    },
    Input {
        title: String,
        purpose: InputPurpose,
        initial: String,
    },
    Help,
    Trust {
        trust_path: Option<PathBuf>,
        hook: CommandHook,
        commands: Vec<String>,
    },
    Welcome {
        error: Option<String>,
    },
    Commit {
        path: PathBuf,
    },
    Palette,
    PrSelect,
    IssueSelect,
    /// Base branch for a new worktree.
    ListSelect {
        title: String,
    },
    Diff {
        title: String,
    },
    CommitFiles {
        path: PathBuf,
        sha: String,
        title: String,
    },
    Checklist {
        candidates: Vec<PruneCandidate>,
    },
    Loading {
        message: String,
    },
    Info {
        message: String,
    },
}

#[derive(Debug, Clone)]
pub enum ScreenTransition {
    Stay,
    /// Dismiss the screen and any suspended parent.
    Close,
    /// Return to the parent if there is one, else to the base view.
    Cancel,
    Open(ScreenRequest),
    /// Open on top of the current screen, which becomes the parent.
    OpenChild(ScreenRequest),
}

/// Intents produced by screens, applied by the reducer.
#[derive(Debug, Clone)]
pub enum ScreenAction {
    Confirm(ConfirmAction),
    SubmitInput { purpose: InputPurpose, value: String },
    ResolveTrust(TrustResolution),
    Retry,
    Quit,
    Commit { path: PathBuf, message: String },
    ShowStagedDiff { path: PathBuf },
    RunPalette(String),
    SelectPr(PullRequest),
    SelectIssue(Issue),
    ShowCommitFileDiff {
        path: PathBuf,
        sha: String,
        file: String,
    },
    Prune(Vec<PruneCandidate>),
}

#[derive(Debug)]
pub struct ScreenUpdate {
    pub transition: ScreenTransition,
    pub actions: Vec<ScreenAction>,
}

impl ScreenUpdate {
    fn new(transition: ScreenTransition) -> Self {
        Self {
            transition,
            actions: Vec::new(),
        }
    }

    pub fn stay() -> Self {
        Self::new(ScreenTransition::Stay)
    }

    pub fn close() -> Self {
        Self::new(ScreenTransition::Close)
    }

    pub fn cancel() -> Self {
        Self::new(ScreenTransition::Cancel)
    }

    pub fn open(request: ScreenRequest) -> Self {
        Self::new(ScreenTransition::Open(request))
    }

    pub fn open_child(request: ScreenRequest) -> Self {
        Self::new(ScreenTransition::OpenChild(request))
    }

    #[must_use]
    pub fn with_action(mut self, action: ScreenAction) -> Self {
        self.actions.push(action);
        self
    }
}

// ============================================================================
// Screen
// ============================================================================

#[derive(Debug)]
pub enum Screen {
    Confirm(ConfirmState),
    Input(InputState),
    Help(HelpState),
    Trust(TrustState),
    Welcome(WelcomeState),
    Commit(CommitState),
    Palette(PaletteState),
    PrSelect(PickerState<PullRequest>),
    IssueSelect(PickerState<Issue>),
    ListSelect(PickerState<String>),
    Diff(DiffState),
    CommitFiles(CommitFilesState),
    Checklist(ChecklistState),
    Loading(LoadingState),
    Info(InfoState),
}

/// Discriminant of the active screen; `None` is the base view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenKind {
    None,
    Confirm,
    Input,
    Help,
    Trust,
    Welcome,
    Commit,
    Palette,
    PrSelect,
    IssueSelect,
    ListSelect,
    Diff,
    CommitFiles,
    Checklist,
    Loading,
    Info,
}

impl Screen {
    /// Builds the screen for `request`. Some screens seed themselves from
    /// session state (histories).
    pub fn from_request(request: ScreenRequest, tui: &TuiState) -> Self {
        match request {
            ScreenRequest::Confirm { message, action } => {
                Screen::Confirm(ConfirmState::new(message, action))
            }
            ScreenRequest::Input {
                title,
                purpose,
                initial,
            } => {
                let history = match purpose {
                    InputPurpose::RunShell { .. } => tui.command_history.clone(),
                    _ => Vec::new(),
                };
                Screen::Input(InputState::new(title, purpose, initial, history))
            }
            ScreenRequest::Help => Screen::Help(HelpState::default()),
            ScreenRequest::Trust {
                trust_path,
                hook,
                commands,
            } => Screen::Trust(TrustState::new(trust_path, hook, commands)),
            ScreenRequest::Welcome { error } => Screen::Welcome(WelcomeState { error }),
            ScreenRequest::Commit { path } => Screen::Commit(CommitState::new(path)),
            ScreenRequest::Palette => Screen::Palette(PaletteState::new(
                palette::palette_items(tui),
                &tui.palette_history,
            )),
            ScreenRequest::PrSelect => Screen::PrSelect(PickerState::new("Pull Requests")),
            ScreenRequest::IssueSelect => Screen::IssueSelect(PickerState::new("Issues")),
            ScreenRequest::ListSelect { title } => Screen::ListSelect(PickerState::new(title)),
            ScreenRequest::Diff { title } => Screen::Diff(DiffState::new(title)),
            ScreenRequest::CommitFiles { path, sha, title } => {
                Screen::CommitFiles(CommitFilesState::new(path, sha, title))
            }
            ScreenRequest::Checklist { candidates } => {
                Screen::Checklist(ChecklistState::new(candidates))
            }
            ScreenRequest::Loading { message } => Screen::Loading(LoadingState { message }),
            ScreenRequest::Info { message } => Screen::Info(InfoState::new(message)),
        }
    }

    pub fn kind(&self) -> ScreenKind {
        match self {
            Screen::Confirm(_) => ScreenKind::Confirm,
            Screen::Input(_) => ScreenKind::Input,
            Screen::Help(_) => ScreenKind::Help,
            Screen::Trust(_) => ScreenKind::Trust,
            Screen::Welcome(_) => ScreenKind::Welcome,
            Screen::Commit(_) => ScreenKind::Commit,
            Screen::Palette(_) => ScreenKind::Palette,
            Screen::PrSelect(_) => ScreenKind::PrSelect,
            Screen::IssueSelect(_) => ScreenKind::IssueSelect,
            Screen::ListSelect(_) => ScreenKind::ListSelect,
            Screen::Diff(_) => ScreenKind::Diff,
            Screen::CommitFiles(_) => ScreenKind::CommitFiles,
            Screen::Checklist(_) => ScreenKind::Checklist,
            Screen::Loading(_) => ScreenKind::Loading,
            Screen::Info(_) => ScreenKind::Info,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ScreenUpdate {
        match self {
            Screen::Confirm(s) => s.handle_key(key),
            Screen::Input(s) => s.handle_key(key),
            Screen::Help(s) => s.handle_key(key),
            Screen::Trust(s) => s.handle_key(key),
            Screen::Welcome(s) => s.handle_key(key),
            Screen::Commit(s) => s.handle_key(key),
            Screen::Palette(s) => s.handle_key(key),
            Screen::PrSelect(p) => match p.handle_key(key) {
                PickerOutcome::Stay => ScreenUpdate::stay(),
                PickerOutcome::Cancel => ScreenUpdate::cancel(),
                PickerOutcome::Chosen(pr) => {
                    ScreenUpdate::close().with_action(ScreenAction::SelectPr(pr))
                }
            },
            Screen::IssueSelect(p) => match p.handle_key(key) {
                PickerOutcome::Stay => ScreenUpdate::stay(),
                PickerOutcome::Cancel => ScreenUpdate::cancel(),
                PickerOutcome::Chosen(issue) => {
                    ScreenUpdate::close().with_action(ScreenAction::SelectIssue(issue))
                }
            },
            Screen::ListSelect(p) => match p.handle_key(key) {
                PickerOutcome::Stay => ScreenUpdate::stay(),
                PickerOutcome::Cancel => ScreenUpdate::cancel(),
                PickerOutcome::Chosen(base) => ScreenUpdate::open_child(ScreenRequest::Input {
                    title: format!("New branch from {base}"),
                    purpose: InputPurpose::CreateBranch {
                        source: CreateSource::Branch(base),
                    },
                    initial: String::new(),
                }),
            },
            Screen::Diff(s) => s.handle_key(key),
            Screen::CommitFiles(s) => s.handle_key(key),
            Screen::Checklist(s) => s.handle_key(key),
            Screen::Loading(s) => s.handle_key(key),
            Screen::Info(s) => s.handle_key(key),
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, tui: &TuiState) {
        match self {
            Screen::Confirm(s) => s.render(frame, area),
            Screen::Input(s) => s.render(frame, area),
            Screen::Help(s) => s.render(frame, area),
            Screen::Trust(s) => s.render(frame, area),
            Screen::Welcome(s) => s.render(frame, area),
            Screen::Commit(s) => s.render(frame, area),
            Screen::Palette(s) => s.render(frame, area),
            Screen::PrSelect(p) => p.render(frame, area),
            Screen::IssueSelect(p) => p.render(frame, area),
            Screen::ListSelect(p) => p.render(frame, area),
            Screen::Diff(s) => s.render(frame, area),
            Screen::CommitFiles(s) => s.render(frame, area),
            Screen::Checklist(s) => s.render(frame, area),
            Screen::Loading(s) => s.render(frame, area, tui.spinner_frame),
            Screen::Info(s) => s.render(frame, area),
        }
    }
}

// ============================================================================
// ScreenStack
// ============================================================================

/// The active screen plus at most one suspended parent.
#[derive(Debug, Default)]
pub struct ScreenStack {
    active: Option<Screen>,
    parent: Option<Screen>,
}

impl ScreenStack {
    pub fn active(&self) -> Option<&Screen> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut Screen> {
        self.active.as_mut()
    }

    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }

    pub fn kind(&self) -> ScreenKind {
        self.active.as_ref().map_or(ScreenKind::None, Screen::kind)
    }

    pub fn parent_kind(&self) -> ScreenKind {
        self.parent.as_ref().map_or(ScreenKind::None, Screen::kind)
    }

    /// Replaces whatever is open.
    pub fn open(&mut self, screen: Screen) {
        self.parent = None;
        self.active = Some(screen);
    }

    pub fn open_child(&mut self, screen: Screen) {
        self.parent = self.active.take();
        self.active = Some(screen);
    }

    pub fn close(&mut self) {
        self.active = None;
        self.parent = None;
    }

    pub fn cancel(&mut self) {
        self.active = self.parent.take();
    }

    /// Closes the active screen only if it is of `kind`.
    pub fn close_if(&mut self, kind: ScreenKind) {
        if self.kind() == kind {
            self.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crossterm::event::{KeyCode, KeyModifiers};
    use lwt_core::config::Config;

    use super::*;
    use crate::details_cache::DetailsCache;

    fn tui() -> TuiState {
        TuiState::new(
            Config::default(),
            PathBuf::from("/repo"),
            Arc::new(DetailsCache::default()),
        )
    }

    fn info(message: &str) -> Screen {
        Screen::Info(InfoState::new(message.to_string()))
    }

    fn esc() -> KeyEvent {
        KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)
    }

    #[test]
    fn test_open_replaces_active_screen() {
        let mut stack = ScreenStack::default();
        stack.open(info("one"));
        stack.open(Screen::Help(HelpState::default()));
        assert_eq!(stack.kind(), ScreenKind::Help);
        assert_eq!(stack.parent_kind(), ScreenKind::None);
        stack.cancel();
        assert_eq!(stack.kind(), ScreenKind::None);
    }

    #[test]
    fn test_child_cancel_restores_parent() {
        let mut stack = ScreenStack::default();
        stack.open(Screen::Commit(CommitState::new(PathBuf::from("/wt/a"))));
        stack.open_child(Screen::Diff(DiffState::new("Staged".to_string())));
        assert_eq!(stack.kind(), ScreenKind::Diff);
        assert_eq!(stack.parent_kind(), ScreenKind::Commit);

        stack.cancel();
        assert_eq!(stack.kind(), ScreenKind::Commit);
        assert_eq!(stack.parent_kind(), ScreenKind::None);
    }

    #[test]
    fn test_close_drops_parent() {
        let mut stack = ScreenStack::default();
        stack.open(Screen::ListSelect(PickerState::new("Base")));
        stack.open_child(info("child"));
        stack.close();
        assert!(!stack.is_open());
        assert_eq!(stack.parent_kind(), ScreenKind::None);
    }

    #[test]
    fn test_esc_cancels_every_screen() {
        let tui = tui();
        let requests = vec![
            ScreenRequest::Help,
            ScreenRequest::Palette,
            ScreenRequest::PrSelect,
            ScreenRequest::IssueSelect,
            ScreenRequest::ListSelect {
                title: "Base".to_string(),
            },
            ScreenRequest::Diff {
                title: "diff".to_string(),
            },
            ScreenRequest::Commit {
                path: PathBuf::from("/wt/a"),
            },
            ScreenRequest::Checklist { candidates: vec![] },
            ScreenRequest::Loading {
                message: "Working".to_string(),
            },
            ScreenRequest::Info {
                message: "hi".to_string(),
            },
            ScreenRequest::Confirm {
                message: "sure?".to_string(),
                action: ConfirmAction::DeleteBranch {
                    branch: "x".to_string(),
                },
            },
            ScreenRequest::Input {
                title: "Rename".to_string(),
                purpose: InputPurpose::RunShell {
                    path: PathBuf::from("/wt/a"),
                },
                initial: String::new(),
            },
        ];
        for request in requests {
            let mut screen = Screen::from_request(request, &tui);
            let update = screen.handle_key(esc());
            assert!(
                matches!(update.transition, ScreenTransition::Cancel),
                "{:?} did not cancel",
                screen.kind()
            );
            assert!(update.actions.is_empty());
        }
    }

    #[test]
    fn test_list_select_opens_branch_input_as_child() {
        let tui = tui();
        let mut screen = Screen::from_request(
            ScreenRequest::ListSelect {
                title: "Base".to_string(),
            },
            &tui,
        );
        if let Screen::ListSelect(p) = &mut screen {
            p.set_items(Ok(vec!["main".to_string(), "develop".to_string()]));
        }
        let update = screen.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
        assert!(matches!(
            update.transition,
            ScreenTransition::OpenChild(ScreenRequest::Input {
                purpose: InputPurpose::CreateBranch {
                    source: CreateSource::Branch(ref base)
                },
                ..
            }) if base == "main"
        ));
    }
}
