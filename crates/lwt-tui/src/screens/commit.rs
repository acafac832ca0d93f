//! Commit message editor for the selected worktree.

use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use super::render_utils::{KeyHint, ScreenConfig, render_screen, render_separator, render_status_line};
use super::{ScreenAction, ScreenRequest, ScreenUpdate};

#[derive(Debug, Clone)]
pub struct CommitState {
    pub path: PathBuf,
    pub message: String,
    pub error: Option<String>,
}

impl CommitState {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            message: String::new(),
            error: None,
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
            KeyCode::Char('j') if ctrl => {
                self.message.push('\n');
                ScreenUpdate::stay()
            }
            KeyCode::Char('d') if ctrl => ScreenUpdate::open_child(ScreenRequest::Diff {
                title: "Staged changes".to_string(),
            })
            .with_action(ScreenAction::ShowStagedDiff {
                path: self.path.clone(),
            }),
            KeyCode::Enter => {
                let message = self.message.trim();
                if message.is_empty() {
                    self.error = Some("Commit message cannot be empty.".to_string());
                    return ScreenUpdate::stay();
                }
                ScreenUpdate::close().with_action(ScreenAction::Commit {
                    path: self.path.clone(),
                    message: message.to_string(),
                })
            }
            KeyCode::Backspace => {
                self.message.pop();
                ScreenUpdate::stay()
            }
            KeyCode::Char(c) if !ctrl => {
                self.message.push(c);
                ScreenUpdate::stay()
            }
            _ => ScreenUpdate::stay(),
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let hints = [
            KeyHint::new("Enter", "commit"),
            KeyHint::new("Ctrl+J", "newline"),
            KeyHint::new("Ctrl+D", "staged diff"),
            KeyHint::new("Esc", "cancel"),
        ];
        let layout = render_screen(
            frame,
            area,
            &ScreenConfig {
                title: "Commit",
                border_color: Color::Green,
                width: 76,
                height: 14,
                hints: &hints,
            },
        );

        let text_height = layout.body.height.saturating_sub(2);
        let mut lines: Vec<Line> = self.message.split('\n').map(Line::from).collect();
        if let Some(last) = lines.last_mut() {
            last.push_span(Span::styled("█", Style::default().fg(Color::Green)));
        }
        // Keep the cursor line visible.
        let overflow = u16::try_from(lines.len())
            .unwrap_or(u16::MAX)
            .saturating_sub(text_height);
        frame.render_widget(
            Paragraph::new(lines).scroll((overflow, 0)),
            Rect::new(layout.body.x, layout.body.y, layout.body.width, text_height),
        );

        render_separator(frame, layout.body, text_height);
        let status = Rect::new(
            layout.body.x,
            layout.body.y + text_height + 1,
            layout.body.width,
            1,
        );
        render_status_line(
            frame,
            status,
            self.error.as_deref(),
            "Commits the staged changes",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screens::ScreenTransition;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn test_empty_message_is_rejected() {
        let mut state = CommitState::new(PathBuf::from("/wt/a"));
        state.handle_key(key(KeyCode::Char(' ')));
        let update = state.handle_key(key(KeyCode::Enter));
        assert!(matches!(update.transition, ScreenTransition::Stay));
        assert_eq!(
            state.error.as_deref(),
            Some("Commit message cannot be empty.")
        );
    }

    #[test]
    fn test_multiline_message_commits() {
        let mut state = CommitState::new(PathBuf::from("/wt/a"));
        for c in "fix".chars() {
            state.handle_key(key(KeyCode::Char(c)));
        }
        state.handle_key(ctrl('j'));
        state.handle_key(ctrl('j'));
        for c in "body".chars() {
            state.handle_key(key(KeyCode::Char(c)));
        }
        let update = state.handle_key(key(KeyCode::Enter));
        assert!(matches!(update.transition, ScreenTransition::Close));
        assert!(matches!(
            update.actions.as_slice(),
            [ScreenAction::Commit { message, .. }] if message == "fix\n\nbody"
        ));
    }

    #[test]
    fn test_ctrl_d_opens_staged_diff_as_child() {
        let mut state = CommitState::new(PathBuf::from("/wt/a"));
        let update = state.handle_key(ctrl('d'));
        assert!(matches!(
            update.transition,
            ScreenTransition::OpenChild(ScreenRequest::Diff { .. })
        ));
        assert!(matches!(
            update.actions.as_slice(),
            [ScreenAction::ShowStagedDiff { .. }]
        ));
    }
}
