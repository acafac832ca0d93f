//! Progress indicator for long operations.

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use super::ScreenUpdate;
use super::render_utils::{KeyHint, ScreenConfig, render_screen};

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

#[derive(Debug, Clone)]
pub struct LoadingState {
    pub message: String,
}

impl LoadingState {
    /// Esc only hides the indicator; the operation keeps running.
    pub fn handle_key(&mut self, key: KeyEvent) -> ScreenUpdate {
        match key.code {
            KeyCode::Esc => ScreenUpdate::cancel(),
            _ => ScreenUpdate::stay(),
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, spinner_frame: usize) {
        let hints = [KeyHint::new("Esc", "hide")];
        let width = u16::try_from(self.message.chars().count())
            .unwrap_or(u16::MAX)
            .saturating_add(10)
            .max(30);
        let layout = render_screen(
            frame,
            area,
            &ScreenConfig {
                title: "Working",
                border_color: Color::Blue,
                width,
                height: 5,
                hints: &hints,
            },
        );
        let glyph = SPINNER[spinner_frame % SPINNER.len()];
        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled(format!("{glyph} "), Style::default().fg(Color::Blue)),
                Span::raw(self.message.as_str()),
            ])),
            layout.body,
        );
    }
}
