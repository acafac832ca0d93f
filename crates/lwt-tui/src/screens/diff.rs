//! Scrollable diff viewer.

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use super::ScreenUpdate;
use super::render_utils::{KeyHint, ScreenConfig, render_screen};
use crate::common::sanitize_for_display;

const PAGE: u16 = 20;

#[derive(Debug, Clone)]
pub struct DiffState {
    pub title: String,
    /// `None` while loading.
    content: Option<Result<String, String>>,
    scroll: u16,
}

impl DiffState {
    pub fn new(title: String) -> Self {
        Self {
            title,
            content: None,
            scroll: 0,
        }
    }

    pub fn set_content(&mut self, content: Result<String, String>) {
        self.content = Some(content);
        self.scroll = 0;
    }

    fn line_count(&self) -> u16 {
        match &self.content {
            Some(Ok(text)) => u16::try_from(text.lines().count()).unwrap_or(u16::MAX),
            _ => 0,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ScreenUpdate {
        let max = self.line_count().saturating_sub(1);
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return ScreenUpdate::cancel(),
            KeyCode::Down | KeyCode::Char('j') => self.scroll = self.scroll.saturating_add(1),
            KeyCode::Up | KeyCode::Char('k') => self.scroll = self.scroll.saturating_sub(1),
            KeyCode::PageDown | KeyCode::Char(' ') => self.scroll = self.scroll.saturating_add(PAGE),
            KeyCode::PageUp => self.scroll = self.scroll.saturating_sub(PAGE),
            KeyCode::Char('g') | KeyCode::Home => self.scroll = 0,
            KeyCode::Char('G') | KeyCode::End => self.scroll = max,
            _ => {}
        }
        self.scroll = self.scroll.min(max);
        ScreenUpdate::stay()
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let hints = [
            KeyHint::new("j/k", "scroll"),
            KeyHint::new("g/G", "top/bottom"),
            KeyHint::new("Esc", "close"),
        ];
        let layout = render_screen(
            frame,
            area,
            &ScreenConfig {
                title: &self.title,
                border_color: Color::Blue,
                width: area.width.saturating_sub(4),
                height: area.height.saturating_sub(2),
                hints: &hints,
            },
        );

        let lines: Vec<Line> = match &self.content {
            None => vec![Line::from(Span::styled(
                "Loading…",
                Style::default().fg(Color::DarkGray),
            ))],
            Some(Err(err)) => vec![Line::from(Span::styled(
                format!("Error: {err}"),
                Style::default().fg(Color::Red),
            ))],
            Some(Ok(text)) if text.trim().is_empty() => vec![Line::from(Span::styled(
                "No changes",
                Style::default().fg(Color::DarkGray),
            ))],
            Some(Ok(text)) => text.lines().map(diff_line).collect(),
        };
        frame.render_widget(Paragraph::new(lines).scroll((self.scroll, 0)), layout.body);
    }
}

fn diff_line(line: &str) -> Line<'static> {
    let style = if line.starts_with("+++") || line.starts_with("---") {
        Style::default().add_modifier(Modifier::BOLD)
    } else if line.starts_with('+') {
        Style::default().fg(Color::Green)
    } else if line.starts_with('-') {
        Style::default().fg(Color::Red)
    } else if line.starts_with("@@") {
        Style::default().fg(Color::Cyan)
    } else if line.starts_with("diff ") || line.starts_with("== ") {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    Line::from(Span::styled(sanitize_for_display(line).into_owned(), style))
}
