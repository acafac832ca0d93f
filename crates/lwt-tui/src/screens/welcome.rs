//! Shown when no repository could be opened.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Wrap};

use super::render_utils::{KeyHint, ScreenConfig, render_screen};
use super::{ScreenAction, ScreenUpdate};

#[derive(Debug, Clone, Default)]
pub struct WelcomeState {
    pub error: Option<String>,
}

impl WelcomeState {
    pub fn handle_key(&mut self, key: KeyEvent) -> ScreenUpdate {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('r') if !ctrl => ScreenUpdate::close().with_action(ScreenAction::Retry),
            KeyCode::Char('q') | KeyCode::Esc => ScreenUpdate::close().with_action(ScreenAction::Quit),
            KeyCode::Char('c') if ctrl => ScreenUpdate::close().with_action(ScreenAction::Quit),
            _ => ScreenUpdate::stay(),
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let hints = [KeyHint::new("r", "retry"), KeyHint::new("q", "quit")];
        let layout = render_screen(
            frame,
            area,
            &ScreenConfig {
                title: "lwt",
                border_color: Color::Cyan,
                width: 70,
                height: 10,
                hints: &hints,
            },
        );
        let mut lines = vec![
            Line::from("No git repository found here."),
            Line::from("Run lwt inside a repository, or pass --repo <path>."),
        ];
        if let Some(error) = &self.error {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                error.as_str(),
                Style::default().fg(Color::Red),
            )));
        }
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), layout.body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screens::ScreenTransition;

    #[test]
    fn test_retry_and_quit() {
        let mut state = WelcomeState::default();
        let retry = state.handle_key(KeyEvent::new(KeyCode::Char('r'), KeyModifiers::NONE));
        assert!(matches!(retry.actions.as_slice(), [ScreenAction::Retry]));

        let quit = state.handle_key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
        assert!(matches!(quit.transition, ScreenTransition::Close));
        assert!(matches!(quit.actions.as_slice(), [ScreenAction::Quit]));
    }
}
