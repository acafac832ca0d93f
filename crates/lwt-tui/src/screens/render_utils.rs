use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::common::truncate_start_with_ellipsis;

/// Centers a popup of at most `width` x `height` inside `area`.
pub fn calculate_popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));

    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

/// Clears the background and draws the bordered, titled frame.
pub fn render_screen_container(frame: &mut Frame, area: Rect, title: &str, border_color: Color) {
    frame.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" {title} "))
        .title_style(
            Style::default()
                .fg(border_color)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(block, area);
}

pub struct ScreenConfig<'a> {
    pub title: &'a str,
    pub border_color: Color,
    pub width: u16,
    pub height: u16,
    pub hints: &'a [KeyHint<'a>],
}

/// Layout rectangles for a modal screen.
pub struct ScreenLayout {
    pub popup: Rect,
    pub body: Rect,
    pub footer: Rect,
}

/// Renders a standard modal container and returns its layout.
pub fn render_screen(frame: &mut Frame, area: Rect, config: &ScreenConfig<'_>) -> ScreenLayout {
    let popup = calculate_popup_area(area, config.width, config.height);
    render_screen_container(frame, popup, config.title, config.border_color);

    let inner = Rect::new(
        popup.x + 1,
        popup.y + 1,
        popup.width.saturating_sub(2),
        popup.height.saturating_sub(2),
    );

    if !config.hints.is_empty() {
        render_hints(frame, inner, config.hints, config.border_color);
    }

    let footer_height = u16::from(!config.hints.is_empty());
    let body_height = inner.height.saturating_sub(footer_height);
    let footer = Rect::new(inner.x, inner.y + body_height, inner.width, footer_height);
    let body = Rect::new(inner.x, inner.y, inner.width, body_height);

    ScreenLayout {
        popup,
        body,
        footer,
    }
}

pub struct KeyHint<'a> {
    pub key: &'a str,
    pub action: &'a str,
}

impl<'a> KeyHint<'a> {
    pub fn new(key: &'a str, action: &'a str) -> Self {
        Self { key, action }
    }
}

/// A prompt-style text line: `> text█`.
pub struct InputLine<'a> {
    pub value: &'a str,
    pub placeholder: Option<&'a str>,
    pub prompt: &'a str,
    pub accent: Color,
}

pub fn render_input_line(frame: &mut Frame, area: Rect, input: &InputLine<'_>) {
    let is_placeholder = input.value.is_empty() && input.placeholder.is_some();
    let max_text_width = usize::from(area.width).saturating_sub(input.prompt.len() + 1);

    let display_text = if is_placeholder {
        truncate_start_with_ellipsis(input.placeholder.unwrap_or(""), max_text_width)
    } else {
        truncate_start_with_ellipsis(input.value, max_text_width)
    };

    let mut spans = vec![Span::styled(
        input.prompt,
        Style::default().fg(Color::DarkGray),
    )];
    let cursor = Span::styled("█", Style::default().fg(input.accent));
    if is_placeholder {
        spans.push(cursor);
        spans.push(Span::styled(
            display_text,
            Style::default().fg(Color::DarkGray),
        ));
    } else {
        spans.push(Span::styled(display_text, Style::default().fg(input.accent)));
        spans.push(cursor);
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// Renders a line of key hints along the bottom of `area`.
pub fn render_hints(frame: &mut Frame, area: Rect, hints: &[KeyHint], highlight_color: Color) {
    let hints_y = area.y + area.height.saturating_sub(1);
    let hints_area = Rect::new(area.x, hints_y, area.width, 1);

    let mut spans = Vec::new();
    for (i, hint) in hints.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" • ", Style::default().fg(Color::DarkGray)));
        }
        spans.push(Span::styled(hint.key, Style::default().fg(highlight_color)));
        spans.push(Span::styled(
            format!(" {}", hint.action),
            Style::default().fg(Color::DarkGray),
        ));
    }

    let para = Paragraph::new(Line::from(spans)).alignment(Alignment::Center);
    frame.render_widget(para, hints_area);
}

pub fn render_separator(frame: &mut Frame, area: Rect, y_offset: u16) {
    if y_offset >= area.height {
        return;
    }
    let separator = "─".repeat(usize::from(area.width));
    let separator_area = Rect::new(area.x, area.y + y_offset, area.width, 1);
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            separator,
            Style::default().fg(Color::DarkGray),
        ))),
        separator_area,
    );
}

/// One line of error or help text below an input.
pub fn render_status_line(frame: &mut Frame, area: Rect, error: Option<&str>, help: &str) {
    let (text, style) = match error {
        Some(error) => (error, Style::default().fg(Color::Red)),
        None => (help, Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(Paragraph::new(Line::from(Span::styled(text, style))), area);
}

/// Keeps `selected` visible in a window of `height` rows; returns the offset.
pub fn scroll_offset(selected: usize, height: usize) -> usize {
    if height == 0 {
        return 0;
    }
    selected.saturating_sub(height - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_popup_is_centered_and_clamped() {
        let area = Rect::new(0, 0, 100, 40);
        let popup = calculate_popup_area(area, 60, 10);
        assert_eq!(popup, Rect::new(20, 15, 60, 10));

        let small = calculate_popup_area(Rect::new(0, 0, 30, 8), 60, 20);
        assert_eq!(small.width, 26);
        assert_eq!(small.height, 6);
    }

    #[test]
    fn test_scroll_offset_keeps_selection_visible() {
        assert_eq!(scroll_offset(3, 10), 0);
        assert_eq!(scroll_offset(12, 10), 3);
        assert_eq!(scroll_offset(5, 0), 0);
    }
}
