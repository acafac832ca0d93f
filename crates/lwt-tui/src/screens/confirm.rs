//! Yes/no confirmation.

use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyEvent};
use lwt_core::models::WorktreeInfo;
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::Color;
use ratatui::widgets::{Paragraph, Wrap};

use super::render_utils::{KeyHint, ScreenConfig, render_screen};
use super::{ScreenAction, ScreenUpdate};

/// What a confirmed prompt goes on to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    DeleteWorktree { path: PathBuf, branch: String },
    DeleteBranch { branch: String },
    Absorb { worktree: WorktreeInfo },
    DiscardFile {
        path: PathBuf,
        file: String,
        untracked: bool,
    },
}

#[derive(Debug, Clone)]
pub struct ConfirmState {
    pub message: String,
    pub action: ConfirmAction,
}

impl ConfirmState {
    pub fn new(message: String, action: ConfirmAction) -> Self {
        Self { message, action }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ScreenUpdate {
        match key.code {
            KeyCode::Char('y' | 'Y') | KeyCode::Enter => {
                ScreenUpdate::close().with_action(ScreenAction::Confirm(self.action.clone()))
            }
            KeyCode::Char('n' | 'N' | 'q') | KeyCode::Esc => ScreenUpdate::cancel(),
            _ => ScreenUpdate::stay(),
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let hints = [KeyHint::new("y", "confirm"), KeyHint::new("n", "cancel")];
        let lines = u16::try_from(self.message.lines().count()).unwrap_or(u16::MAX);
        let layout = render_screen(
            frame,
            area,
            &ScreenConfig {
                title: "Confirm",
                border_color: Color::Red,
                width: 70,
                height: lines.saturating_add(5),
                hints: &hints,
            },
        );
        frame.render_widget(
            Paragraph::new(self.message.as_str()).wrap(Wrap { trim: false }),
            layout.body,
        );
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::KeyModifiers;

    use super::*;
    use crate::screens::ScreenTransition;

    fn state() -> ConfirmState {
        ConfirmState::new(
            "Delete branch 'x'?".to_string(),
            ConfirmAction::DeleteBranch {
                branch: "x".to_string(),
            },
        )
    }

    #[test]
    fn test_yes_closes_with_action() {
        let update = state().handle_key(KeyEvent::new(KeyCode::Char('y'), KeyModifiers::NONE));
        assert!(matches!(update.transition, ScreenTransition::Close));
        assert!(matches!(
            update.actions.as_slice(),
            [ScreenAction::Confirm(ConfirmAction::DeleteBranch { branch })] if branch == "x"
        ));
    }

    #[test]
    fn test_no_cancels_without_action() {
        let update = state().handle_key(KeyEvent::new(KeyCode::Char('n'), KeyModifiers::NONE));
        assert!(matches!(update.transition, ScreenTransition::Cancel));
        assert!(update.actions.is_empty());
    }
}
