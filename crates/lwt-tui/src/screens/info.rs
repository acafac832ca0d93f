//! Plain message box for results and errors.

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::Color;
use ratatui::widgets::{Paragraph, Wrap};

use super::ScreenUpdate;
use super::render_utils::{KeyHint, ScreenConfig, render_screen};

#[derive(Debug, Clone)]
pub struct InfoState {
    pub message: String,
    scroll: u16,
}

impl InfoState {
    pub fn new(message: String) -> Self {
        Self { message, scroll: 0 }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ScreenUpdate {
        match key.code {
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => ScreenUpdate::cancel(),
            KeyCode::Down | KeyCode::Char('j') => {
                self.scroll = self.scroll.saturating_add(1);
                ScreenUpdate::stay()
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.scroll = self.scroll.saturating_sub(1);
                ScreenUpdate::stay()
            }
            _ => ScreenUpdate::stay(),
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let hints = [KeyHint::new("Enter", "close")];
        let is_error = self.message.starts_with("Error") || self.message.contains("failed");
        let lines = u16::try_from(self.message.lines().count()).unwrap_or(u16::MAX);
        let layout = render_screen(
            frame,
            area,
            &ScreenConfig {
                title: if is_error { "Error" } else { "Info" },
                border_color: if is_error { Color::Red } else { Color::Green },
                width: 76,
                height: lines.saturating_add(4).min(area.height),
                hints: &hints,
            },
        );
        frame.render_widget(
            Paragraph::new(self.message.as_str())
                .wrap(Wrap { trim: false })
                .scroll((self.scroll, 0)),
            layout.body,
        );
    }
}
