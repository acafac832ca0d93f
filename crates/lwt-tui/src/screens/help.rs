//! Key binding reference.

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use super::ScreenUpdate;
use super::render_utils::{KeyHint, ScreenConfig, render_screen};

const SECTIONS: &[(&str, &[(&str, &str)])] = &[
    (
        "Navigation",
        &[
            ("j / k", "move selection"),
            ("Tab", "next pane"),
            ("f, /", "filter the focused pane"),
            ("Enter", "switch to worktree (list) / open (status, log)"),
            ("q", "quit"),
        ],
    ),
    (
        "Worktrees",
        &[
            ("c", "create from a branch"),
            ("p", "create from a pull request"),
            ("i", "create from an issue"),
            ("D", "delete"),
            ("m", "rename"),
            ("A", "absorb into main"),
            ("P", "push to upstream"),
            ("S", "pull + push upstream"),
            ("X", "prune merged"),
            ("r", "refresh"),
            ("s", "cycle sort order"),
        ],
    ),
    (
        "Changes",
        &[
            ("space", "stage / unstage file"),
            ("d", "discard file changes"),
            ("C", "commit"),
            ("!", "run shell command"),
            ("Ctrl+p", "command palette"),
        ],
    ),
];

#[derive(Debug, Clone, Default)]
pub struct HelpState {
    scroll: u16,
}

impl HelpState {
    pub fn handle_key(&mut self, key: KeyEvent) -> ScreenUpdate {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q' | '?') => ScreenUpdate::cancel(),
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
        let hints = [KeyHint::new("j/k", "scroll"), KeyHint::new("Esc", "close")];
        let layout = render_screen(
            frame,
            area,
            &ScreenConfig {
                title: "Help",
                border_color: Color::Cyan,
                width: 64,
                height: 32,
                hints: &hints,
            },
        );

        let mut lines = Vec::new();
        for (title, bindings) in SECTIONS {
            if !lines.is_empty() {
                lines.push(Line::default());
            }
            lines.push(Line::from(Span::styled(
                *title,
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
            for (key, action) in *bindings {
                lines.push(Line::from(vec![
                    Span::styled(format!("  {key:<10}"), Style::default().fg(Color::Yellow)),
                    Span::raw(*action),
                ]));
            }
        }
        frame.render_widget(Paragraph::new(lines).scroll((self.scroll, 0)), layout.body);
    }
}
