//! Single-line text input.
//!
//! Enter never closes the input by itself: the reducer validates the value
//! and either closes the screen or sets [`InputState::error`].

use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::Color;

use super::render_utils::{
    InputLine, KeyHint, ScreenConfig, render_input_line, render_screen, render_separator,
    render_status_line,
};
use super::{ScreenAction, ScreenUpdate};
use crate::operations::CreateSource;
use crate::operations::upstream::UpstreamAction;

/// What the submitted value is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputPurpose {
    CreateBranch { source: CreateSource },
    Rename { path: PathBuf, branch: String },
    RunShell { path: PathBuf },
    SetUpstream {
        action: UpstreamAction,
        path: PathBuf,
        branch: String,
    },
}

impl InputPurpose {
    fn help(&self) -> &'static str {
        match self {
            InputPurpose::CreateBranch { .. } => "Name of the new branch",
            InputPurpose::Rename { .. } => "New branch name (the directory follows)",
            InputPurpose::RunShell { .. } => "Runs in the selected worktree (Up/Down: history)",
            InputPurpose::SetUpstream { .. } => "Upstream as remote/branch; recorded on push",
        }
    }
}

#[derive(Debug, Clone)]
pub struct InputState {
    pub title: String,
    pub purpose: InputPurpose,
    pub value: String,
    pub error: Option<String>,
    /// Most recent first.
    history: Vec<String>,
    history_index: Option<usize>,
}

impl InputState {
    pub fn new(title: String, purpose: InputPurpose, initial: String, history: Vec<String>) -> Self {
        Self {
            title,
            purpose,
            value: initial,
            error: None,
            history,
            history_index: None,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ScreenUpdate {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if !matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            self.error = None;
        }

        match key.code {
            KeyCode::Esc => ScreenUpdate::cancel(),
            KeyCode::Char('c') if ctrl => ScreenUpdate::cancel(),
            KeyCode::Enter => ScreenUpdate::stay().with_action(ScreenAction::SubmitInput {
                purpose: self.purpose.clone(),
                value: self.value.trim().to_string(),
            }),
            KeyCode::Up => {
                self.history_prev();
                ScreenUpdate::stay()
            }
            KeyCode::Down => {
                self.history_next();
                ScreenUpdate::stay()
            }
            KeyCode::Backspace => {
                self.value.pop();
                self.history_index = None;
                ScreenUpdate::stay()
            }
            KeyCode::Char('u') if ctrl => {
                self.value.clear();
                ScreenUpdate::stay()
            }
            KeyCode::Char(c) if !ctrl => {
                self.value.push(c);
                self.history_index = None;
                ScreenUpdate::stay()
            }
            _ => ScreenUpdate::stay(),
        }
    }

    fn history_prev(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let next = match self.history_index {
            None => 0,
            Some(i) => (i + 1).min(self.history.len() - 1),
        };
        self.history_index = Some(next);
        self.value = self.history[next].clone();
    }

    fn history_next(&mut self) {
        match self.history_index {
            None => {}
            Some(0) => {
                self.history_index = None;
                self.value.clear();
            }
            Some(i) => {
                self.history_index = Some(i - 1);
                self.value = self.history[i - 1].clone();
            }
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let hints = [KeyHint::new("Enter", "submit"), KeyHint::new("Esc", "cancel")];
        let layout = render_screen(
            frame,
            area,
            &ScreenConfig {
                title: &self.title,
                border_color: Color::Yellow,
                width: 64,
                height: 7,
                hints: &hints,
            },
        );

        let input_area = Rect::new(layout.body.x, layout.body.y, layout.body.width, 1);
        render_input_line(
            frame,
            input_area,
            &InputLine {
                value: &self.value,
                placeholder: None,
                prompt: "> ",
                accent: Color::Yellow,
            },
        );
        render_separator(frame, layout.body, 1);
        let status_area = Rect::new(layout.body.x, layout.body.y + 2, layout.body.width, 1);
        render_status_line(frame, status_area, self.error.as_deref(), self.purpose.help());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screens::ScreenTransition;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn shell_input(history: &[&str]) -> InputState {
        InputState::new(
            "Run".to_string(),
            InputPurpose::RunShell {
                path: PathBuf::from("/wt/a"),
            },
            String::new(),
            history.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_enter_submits_trimmed_and_stays_open() {
        let mut input = shell_input(&[]);
        for c in " ls ".chars() {
            input.handle_key(key(KeyCode::Char(c)));
        }
        let update = input.handle_key(key(KeyCode::Enter));
        assert!(matches!(update.transition, ScreenTransition::Stay));
        assert!(matches!(
            update.actions.as_slice(),
            [ScreenAction::SubmitInput { value, .. }] if value == "ls"
        ));
    }

    #[test]
    fn test_typing_clears_error() {
        let mut input = shell_input(&[]);
        input.error = Some("bad".to_string());
        input.handle_key(key(KeyCode::Enter));
        assert!(input.error.is_some());
        input.handle_key(key(KeyCode::Char('a')));
        assert!(input.error.is_none());
    }

    #[test]
    fn test_history_navigation() {
        let mut input = shell_input(&["make test", "ls"]);
        input.handle_key(key(KeyCode::Up));
        assert_eq!(input.value, "make test");
        input.handle_key(key(KeyCode::Up));
        assert_eq!(input.value, "ls");
        input.handle_key(key(KeyCode::Up));
        assert_eq!(input.value, "ls");
        input.handle_key(key(KeyCode::Down));
        assert_eq!(input.value, "make test");
        input.handle_key(key(KeyCode::Down));
        assert_eq!(input.value, "");
    }
}
