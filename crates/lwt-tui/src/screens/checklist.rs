//! Multi-select list of prune candidates.
//!
//! Clean candidates start checked; ones with uncommitted changes start
//! unchecked and are flagged.

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{List, ListItem, ListState};

use super::render_utils::{KeyHint, ScreenConfig, render_screen};
use super::{ScreenAction, ScreenUpdate};
use crate::operations::PruneCandidate;

#[derive(Debug, Clone)]
pub struct ChecklistState {
    pub candidates: Vec<PruneCandidate>,
    pub checked: Vec<bool>,
    pub selected: usize,
}

impl ChecklistState {
    pub fn new(candidates: Vec<PruneCandidate>) -> Self {
        let checked = candidates.iter().map(|c| !c.dirty).collect();
        Self {
            candidates,
            checked,
            selected: 0,
        }
    }

    fn chosen(&self) -> Vec<PruneCandidate> {
        self.candidates
            .iter()
            .zip(&self.checked)
            .filter(|(_, checked)| **checked)
            .map(|(c, _)| c.clone())
            .collect()
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ScreenUpdate {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => ScreenUpdate::cancel(),
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.candidates.len() {
                    self.selected += 1;
                }
                ScreenUpdate::stay()
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
                ScreenUpdate::stay()
            }
            KeyCode::Char(' ') => {
                if let Some(checked) = self.checked.get_mut(self.selected) {
                    *checked = !*checked;
                }
                ScreenUpdate::stay()
            }
            KeyCode::Char('a') => {
                let all = self.checked.iter().all(|c| *c);
                self.checked.iter_mut().for_each(|c| *c = !all);
                ScreenUpdate::stay()
            }
            KeyCode::Enter => {
                let chosen = self.chosen();
                if chosen.is_empty() {
                    return ScreenUpdate::cancel();
                }
                ScreenUpdate::close().with_action(ScreenAction::Prune(chosen))
            }
            _ => ScreenUpdate::stay(),
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let hints = [
            KeyHint::new("space", "toggle"),
            KeyHint::new("a", "all"),
            KeyHint::new("Enter", "prune"),
            KeyHint::new("Esc", "cancel"),
        ];
        let height = u16::try_from(self.candidates.len())
            .unwrap_or(u16::MAX)
            .saturating_add(4)
            .clamp(6, 24);
        let layout = render_screen(
            frame,
            area,
            &ScreenConfig {
                title: "Prune merged worktrees",
                border_color: Color::Yellow,
                width: 90,
                height,
                hints: &hints,
            },
        );

        let items: Vec<ListItem> = self
            .candidates
            .iter()
            .zip(&self.checked)
            .map(|(c, checked)| {
                let mut spans = vec![
                    Span::raw(if *checked { "[x] " } else { "[ ] " }),
                    Span::raw(format!("{} ({})", c.branch, c.path.display())),
                ];
                if c.dirty {
                    spans.push(Span::styled(
                        " - HAS UNCOMMITTED CHANGES!",
                        Style::default().fg(Color::Red),
                    ));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();
        let list = List::new(items)
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol("▶ ");
        let mut state = ListState::default();
        state.select(Some(self.selected));
        frame.render_stateful_widget(list, layout.body, &mut state);
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crossterm::event::KeyModifiers;

    use super::*;
    use crate::screens::ScreenTransition;

    fn candidate(branch: &str, dirty: bool) -> PruneCandidate {
        PruneCandidate {
            path: PathBuf::from(format!("/wt/{branch}")),
            branch: branch.to_string(),
            dirty,
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_dirty_candidates_start_unchecked() {
        let state = ChecklistState::new(vec![candidate("a", false), candidate("b", true)]);
        assert_eq!(state.checked, vec![true, false]);
    }

    #[test]
    fn test_toggle_and_submit() {
        let mut state = ChecklistState::new(vec![candidate("a", false), candidate("b", true)]);
        state.handle_key(key(KeyCode::Char(' ')));
        state.handle_key(key(KeyCode::Down));
        state.handle_key(key(KeyCode::Char(' ')));
        let update = state.handle_key(key(KeyCode::Enter));
        assert!(matches!(update.transition, ScreenTransition::Close));
        assert!(matches!(
            update.actions.as_slice(),
            [ScreenAction::Prune(chosen)] if chosen.len() == 1 && chosen[0].branch == "b"
        ));
    }

    #[test]
    fn test_toggle_all() {
        let mut state = ChecklistState::new(vec![candidate("a", false), candidate("b", true)]);
        state.handle_key(key(KeyCode::Char('a')));
        assert_eq!(state.checked, vec![true, true]);
        state.handle_key(key(KeyCode::Char('a')));
        assert_eq!(state.checked, vec![false, false]);
    }

    #[test]
    fn test_nothing_checked_cancels() {
        let mut state = ChecklistState::new(vec![candidate("a", true)]);
        let update = state.handle_key(key(KeyCode::Enter));
        assert!(matches!(update.transition, ScreenTransition::Cancel));
        assert!(update.actions.is_empty());
    }
}
