//! Trust prompt for repository hook commands.

use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Wrap};

use super::render_utils::{KeyHint, ScreenConfig, render_screen};
use super::{ScreenAction, ScreenUpdate};
use crate::trust_gate::{CommandHook, TrustResolution};

#[derive(Debug, Clone)]
pub struct TrustState {
    pub trust_path: Option<PathBuf>,
    pub hook: CommandHook,
    pub commands: Vec<String>,
}

impl TrustState {
    pub fn new(trust_path: Option<PathBuf>, hook: CommandHook, commands: Vec<String>) -> Self {
        Self {
            trust_path,
            hook,
            commands,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> ScreenUpdate {
        let resolution = match key.code {
            KeyCode::Char('t' | 'T' | 'y') => TrustResolution::TrustAndRun,
            KeyCode::Char('b' | 'B') => TrustResolution::Block,
            KeyCode::Char('c' | 'C' | 'q') | KeyCode::Esc => TrustResolution::Cancel,
            _ => return ScreenUpdate::stay(),
        };
        // The pending operation must be resolved either way, so even Esc
        // goes through the reducer.
        ScreenUpdate::close().with_action(ScreenAction::ResolveTrust(resolution))
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let hints = [
            KeyHint::new("t", "trust & run"),
            KeyHint::new("b", "block"),
            KeyHint::new("Esc", "cancel"),
        ];
        let height = u16::try_from(self.commands.len()).unwrap_or(20).min(20) + 8;
        let layout = render_screen(
            frame,
            area,
            &ScreenConfig {
                title: "Trust repository commands?",
                border_color: Color::Yellow,
                width: 76,
                height,
                hints: &hints,
            },
        );

        let source = self
            .trust_path
            .as_ref()
            .map_or_else(|| "global config".to_string(), |p| p.display().to_string());
        let mut lines = vec![
            Line::from(vec![
                Span::raw("Hook: "),
                Span::styled(self.hook.label(), Style::default().add_modifier(Modifier::BOLD)),
            ]),
            Line::from(format!("Source: {source}")),
            Line::default(),
        ];
        lines.extend(self.commands.iter().map(|cmd| {
            Line::from(Span::styled(
                format!("  $ {cmd}"),
                Style::default().fg(Color::Yellow),
            ))
        }));
        frame.render_widget(
            Paragraph::new(lines).wrap(Wrap { trim: false }),
            layout.body,
        );
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::KeyModifiers;

    use super::*;
    use crate::screens::ScreenTransition;

    fn resolve(code: KeyCode) -> Option<TrustResolution> {
        let mut state = TrustState::new(None, CommandHook::Init, vec!["make".to_string()]);
        let update = state.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
        match update.actions.as_slice() {
            [ScreenAction::ResolveTrust(r)] => {
                assert!(matches!(update.transition, ScreenTransition::Close));
                Some(*r)
            }
            _ => None,
        }
    }

    #[test]
    fn test_keys_map_to_resolutions() {
        assert_eq!(resolve(KeyCode::Char('t')), Some(TrustResolution::TrustAndRun));
        assert_eq!(resolve(KeyCode::Char('b')), Some(TrustResolution::Block));
        assert_eq!(resolve(KeyCode::Esc), Some(TrustResolution::Cancel));
        assert_eq!(resolve(KeyCode::Char('x')), None);
    }
}
