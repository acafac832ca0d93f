//! Filterable single-choice list, shared by the pull request, issue and base
//! branch pickers.
//!
//! Items arrive asynchronously; until then the picker shows a loading line.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use lwt_core::models::{Issue, PullRequest};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{List, ListItem, ListState, Paragraph};

use super::render_utils::{
    InputLine, KeyHint, ScreenConfig, render_input_line, render_screen, render_separator,
};
use crate::common::truncate_with_ellipsis;
use crate::views::matches_filter;

/// Something a picker can list.
pub trait PickerItem: Clone {
    fn label(&self) -> String;
}

impl PickerItem for PullRequest {
    fn label(&self) -> String {
        format!("#{} {} ({})", self.number, self.title, self.head_ref_name)
    }
}

impl PickerItem for Issue {
    fn label(&self) -> String {
        format!("#{} {}", self.number, self.title)
    }
}

impl PickerItem for String {
    fn label(&self) -> String {
        self.clone()
    }
}

pub enum PickerOutcome<T> {
    Stay,
    Cancel,
    Chosen(T),
}

#[derive(Debug, Clone)]
pub struct PickerState<T> {
    pub title: String,
    /// `None` while loading.
    items: Option<Result<Vec<T>, String>>,
    pub filter: String,
    pub selected: usize,
}

impl<T: PickerItem> PickerState<T> {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            items: None,
            filter: String::new(),
            selected: 0,
        }
    }

    pub fn set_items(&mut self, items: Result<Vec<T>, String>) {
        self.items = Some(items);
        self.clamp_selection();
    }

    pub fn is_loading(&self) -> bool {
        self.items.is_none()
    }

    pub fn filtered(&self) -> Vec<&T> {
        match &self.items {
            Some(Ok(items)) => items
                .iter()
                .filter(|item| matches_filter(&item.label(), &self.filter))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn clamp_selection(&mut self) {
        let count = self.filtered().len();
        self.selected = if count == 0 {
            0
        } else {
            self.selected.min(count - 1)
        };
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> PickerOutcome<T> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => PickerOutcome::Cancel,
            KeyCode::Char('c') if ctrl => PickerOutcome::Cancel,
            KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
                PickerOutcome::Stay
            }
            KeyCode::Down => {
                let count = self.filtered().len();
                if count > 0 && self.selected < count - 1 {
                    self.selected += 1;
                }
                PickerOutcome::Stay
            }
            KeyCode::Enter => match self.filtered().get(self.selected) {
                Some(item) => PickerOutcome::Chosen((*item).clone()),
                None => PickerOutcome::Stay,
            },
            KeyCode::Backspace => {
                self.filter.pop();
                self.clamp_selection();
                PickerOutcome::Stay
            }
            KeyCode::Char(c) if !ctrl => {
                self.filter.push(c);
                self.clamp_selection();
                PickerOutcome::Stay
            }
            _ => PickerOutcome::Stay,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let hints = [
            KeyHint::new("↑↓", "navigate"),
            KeyHint::new("Enter", "select"),
            KeyHint::new("Esc", "cancel"),
        ];
        let layout = render_screen(
            frame,
            area,
            &ScreenConfig {
                title: &self.title,
                border_color: Color::Magenta,
                width: 90,
                height: 22,
                hints: &hints,
            },
        );

        let filter_area = Rect::new(layout.body.x, layout.body.y, layout.body.width, 1);
        render_input_line(
            frame,
            filter_area,
            &InputLine {
                value: &self.filter,
                placeholder: Some("type to filter"),
                prompt: "> ",
                accent: Color::Magenta,
            },
        );
        render_separator(frame, layout.body, 1);

        let list_area = Rect::new(
            layout.body.x,
            layout.body.y + 2,
            layout.body.width,
            layout.body.height.saturating_sub(2),
        );
        let placeholder = match &self.items {
            None => Some(("Loading…".to_string(), Color::DarkGray)),
            Some(Err(err)) => Some((format!("Error: {err}"), Color::Red)),
            Some(Ok(_)) if self.filtered().is_empty() => {
                Some(("No matches".to_string(), Color::DarkGray))
            }
            Some(Ok(_)) => None,
        };
        if let Some((text, color)) = placeholder {
            frame.render_widget(
                Paragraph::new(Line::from(Span::styled(
                    format!("  {text}"),
                    Style::default().fg(color),
                ))),
                list_area,
            );
            return;
        }

        let width = usize::from(list_area.width.saturating_sub(3));
        let items: Vec<ListItem> = self
            .filtered()
            .iter()
            .map(|item| ListItem::new(truncate_with_ellipsis(&item.label(), width)))
            .collect();
        let list = List::new(items)
            .highlight_style(Style::default().bg(Color::Magenta).fg(Color::Black))
            .highlight_symbol("▶ ");
        let mut state = ListState::default();
        state.select(Some(self.selected));
        frame.render_stateful_widget(list, list_area, &mut state);
    }
}
