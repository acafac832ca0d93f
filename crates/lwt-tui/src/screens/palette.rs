//! Command palette.
//!
//! Lists every base-view action plus previously run shell commands. With an
//! empty filter, recently used entries come first; otherwise entries are
//! ranked by fuzzy score and ties go to the most recently used.

use std::cmp::Reverse;
use std::collections::HashMap;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use lwt_core::persistence::PaletteUsage;
use nucleo_matcher::pattern::{CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Config, Matcher, Utf32Str};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{List, ListItem, ListState, Paragraph};

use super::render_utils::{
    InputLine, KeyHint, ScreenConfig, render_input_line, render_screen, render_separator,
};
use super::{ScreenAction, ScreenUpdate};
use crate::state::TuiState;

/// Prefix of palette ids that re-run a shell command.
pub const SHELL_COMMAND_PREFIX: &str = "cmd:";

/// (id, label, key)
const ACTIONS: &[(&str, &str, &str)] = &[
    ("refresh", "Refresh worktrees", "r"),
    ("create", "Create worktree from branch", "c"),
    ("pr", "Create worktree from pull request", "p"),
    ("issue", "Create worktree from issue", "i"),
    ("delete", "Delete worktree", "D"),
    ("rename", "Rename worktree", "m"),
    ("absorb", "Absorb worktree into main", "A"),
    ("push", "Push branch to upstream", "P"),
    ("sync", "Synchronise with upstream (pull + push)", "S"),
    ("prune", "Prune merged worktrees", "X"),
    ("commit", "Commit staged changes", "C"),
    ("diff", "Show diff of selected worktree", ""),
    ("shell", "Run shell command", "!"),
    ("sort", "Cycle sort order", "s"),
    ("help", "Show key bindings", "?"),
    ("quit", "Quit", "q"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteItem {
    pub id: String,
    pub label: String,
    pub key: String,
}

/// Actions followed by the shell command history.
pub fn palette_items(tui: &TuiState) -> Vec<PaletteItem> {
    let actions = ACTIONS.iter().map(|(id, label, key)| PaletteItem {
        id: (*id).to_string(),
        label: (*label).to_string(),
        key: (*key).to_string(),
    });
    let commands = tui.command_history.iter().map(|cmd| PaletteItem {
        id: format!("{SHELL_COMMAND_PREFIX}{cmd}"),
        label: format!("Run: {cmd}"),
        key: String::new(),
    });
    actions.chain(commands).collect()
}

/// Orders `items` for display, returning indices into `items`.
pub fn rank(items: &[PaletteItem], history: &[PaletteUsage], filter: &str) -> Vec<usize> {
    let recency: HashMap<&str, (i64, u32)> = history
        .iter()
        .map(|u| (u.id.as_str(), (u.timestamp, u.count)))
        .collect();
    let recency_of = |idx: usize| recency.get(items[idx].id.as_str()).copied();

    let filter = filter.trim();
    if filter.is_empty() {
        let mut order: Vec<usize> = (0..items.len()).collect();
        // Stable: unused entries keep their default order at the end.
        order.sort_by_key(|&idx| Reverse(recency_of(idx)));
        return order;
    }

    let mut matcher = Matcher::new(Config::DEFAULT);
    let pattern = Pattern::parse(filter, CaseMatching::Ignore, Normalization::Smart);
    let mut buf = Vec::new();
    let mut scored: Vec<(usize, u32)> = items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| {
            let haystack = format!("{} {}", item.label, item.id);
            let score = pattern.score(Utf32Str::new(&haystack, &mut buf), &mut matcher)?;
            Some((idx, score))
        })
        .collect();
    scored.sort_by_key(|&(idx, score)| (Reverse(score), Reverse(recency_of(idx))));
    scored.into_iter().map(|(idx, _)| idx).collect()
}

#[derive(Debug, Clone)]
pub struct PaletteState {
    items: Vec<PaletteItem>,
    history: Vec<PaletteUsage>,
    pub filter: String,
    pub selected: usize,
    order: Vec<usize>,
}

impl PaletteState {
    pub fn new(items: Vec<PaletteItem>, history: &[PaletteUsage]) -> Self {
        let order = rank(&items, history, "");
        Self {
            items,
            history: history.to_vec(),
            filter: String::new(),
            selected: 0,
            order,
        }
    }

    pub fn visible(&self) -> impl Iterator<Item = &PaletteItem> {
        self.order.iter().map(|&idx| &self.items[idx])
    }

    fn refilter(&mut self) {
        self.order = rank(&self.items, &self.history, &self.filter);
        self.selected = self.selected.min(self.order.len().saturating_sub(1));
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ScreenUpdate {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => ScreenUpdate::cancel(),
            KeyCode::Char('c') if ctrl => ScreenUpdate::cancel(),
            KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
                ScreenUpdate::stay()
            }
            KeyCode::Down => {
                if self.selected + 1 < self.order.len() {
                    self.selected += 1;
                }
                ScreenUpdate::stay()
            }
            KeyCode::Enter => match self.order.get(self.selected) {
                Some(&idx) => ScreenUpdate::close()
                    .with_action(ScreenAction::RunPalette(self.items[idx].id.clone())),
                None => ScreenUpdate::stay(),
            },
            KeyCode::Backspace => {
                self.filter.pop();
                self.refilter();
                ScreenUpdate::stay()
            }
            KeyCode::Char(c) if !ctrl => {
                self.filter.push(c);
                self.refilter();
                ScreenUpdate::stay()
            }
            _ => ScreenUpdate::stay(),
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let hints = [
            KeyHint::new("↑↓", "navigate"),
            KeyHint::new("Enter", "run"),
            KeyHint::new("Esc", "cancel"),
        ];
        let height = u16::try_from(self.order.len()).unwrap_or(u16::MAX).saturating_add(5).clamp(8, 24);
        let layout = render_screen(
            frame,
            area,
            &ScreenConfig {
                title: "Command Palette",
                border_color: Color::Magenta,
                width: 70,
                height,
                hints: &hints,
            },
        );

        let filter_area = Rect::new(layout.body.x, layout.body.y, layout.body.width, 1);
        render_input_line(
            frame,
            filter_area,
            &InputLine {
                value: &self.filter,
                placeholder: None,
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
        if self.order.is_empty() {
            frame.render_widget(
                Paragraph::new(Line::from(Span::styled(
                    "  No matching commands",
                    Style::default().fg(Color::DarkGray),
                ))),
                list_area,
            );
            return;
        }

        let label_width = usize::from(list_area.width.saturating_sub(8));
        let items: Vec<ListItem> = self
            .visible()
            .enumerate()
            .map(|(idx, item)| {
                let style = if idx == self.selected {
                    Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{:<label_width$}", item.label), style),
                    Span::styled(format!("{:>3}", item.key), Style::default().fg(Color::DarkGray)),
                ]))
            })
            .collect();
        let list = List::new(items)
            .highlight_style(Style::default().bg(Color::Magenta))
            .highlight_symbol("▶ ");
        let mut state = ListState::default();
        state.select(Some(self.selected));
        frame.render_stateful_widget(list, list_area, &mut state);
    }
}
