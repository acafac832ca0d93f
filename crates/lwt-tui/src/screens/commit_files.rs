//! Files changed by one commit; Enter shows that file's diff.

use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyEvent};
use lwt_core::models::CommitFile;
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{List, ListItem, ListState, Paragraph};

use super::render_utils::{KeyHint, ScreenConfig, render_screen};
use super::{ScreenAction, ScreenRequest, ScreenUpdate};

#[derive(Debug, Clone)]
pub struct CommitFilesState {
    pub path: PathBuf,
    pub sha: String,
    pub title: String,
    files: Option<Result<Vec<CommitFile>, String>>,
    pub selected: usize,
}

impl CommitFilesState {
    pub fn new(path: PathBuf, sha: String, title: String) -> Self {
        Self {
            path,
            sha,
            title,
            files: None,
            selected: 0,
        }
    }

    pub fn set_files(&mut self, files: Result<Vec<CommitFile>, String>) {
        self.files = Some(files);
        self.selected = 0;
    }

    fn files(&self) -> &[CommitFile] {
        match &self.files {
            Some(Ok(files)) => files,
            _ => &[],
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ScreenUpdate {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => ScreenUpdate::cancel(),
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.files().len() {
                    self.selected += 1;
                }
                ScreenUpdate::stay()
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
                ScreenUpdate::stay()
            }
            KeyCode::Enter => {
                let Some(file) = self.files().get(self.selected) else {
                    return ScreenUpdate::stay();
                };
                let file = file.path.clone();
                ScreenUpdate::open_child(ScreenRequest::Diff {
                    title: format!("{} {file}", short(&self.sha)),
                })
                .with_action(ScreenAction::ShowCommitFileDiff {
                    path: self.path.clone(),
                    sha: self.sha.clone(),
                    file,
                })
            }
            _ => ScreenUpdate::stay(),
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let hints = [
            KeyHint::new("j/k", "navigate"),
            KeyHint::new("Enter", "diff"),
            KeyHint::new("Esc", "close"),
        ];
        let layout = render_screen(
            frame,
            area,
            &ScreenConfig {
                title: &self.title,
                border_color: Color::Blue,
                width: 90,
                height: 24,
                hints: &hints,
            },
        );

        let message = match &self.files {
            None => Some(("Loading…".to_string(), Color::DarkGray)),
            Some(Err(err)) => Some((format!("Error: {err}"), Color::Red)),
            Some(Ok(files)) if files.is_empty() => {
                Some(("No files changed".to_string(), Color::DarkGray))
            }
            Some(Ok(_)) => None,
        };
        if let Some((text, color)) = message {
            frame.render_widget(
                Paragraph::new(Line::from(Span::styled(text, Style::default().fg(color)))),
                layout.body,
            );
            return;
        }

        let items: Vec<ListItem> = self
            .files()
            .iter()
            .map(|f| {
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{:<4}", f.status), status_style(&f.status)),
                    Span::raw(f.path.clone()),
                ]))
            })
            .collect();
        let list = List::new(items)
            .highlight_style(Style::default().bg(Color::Blue))
            .highlight_symbol("▶ ");
        let mut state = ListState::default();
        state.select(Some(self.selected));
        frame.render_stateful_widget(list, layout.body, &mut state);
    }
}

fn short(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

fn status_style(status: &str) -> Style {
    match status.chars().next() {
        Some('A') => Style::default().fg(Color::Green),
        Some('D') => Style::default().fg(Color::Red),
        Some('R' | 'C') => Style::default().fg(Color::Cyan),
        _ => Style::default().fg(Color::Yellow),
    }
}
