//! Pure view/render functions for the TUI.
//!
//! Functions here take `&AppState`, draw to a ratatui `Frame`, and never
//! mutate state or return effects.
//!
//! ```text
//! ┌ Worktrees ──────────┐┌ Status ─────────────┐
//! │                     ││                     │
//! │                     │└─────────────────────┘
//! │                     │┌ Log ────────────────┐
//! │                     ││                     │
//! └─────────────────────┘└─────────────────────┘
//!  status bar
//! ```

use lwt_core::models::{StatusFile, WorktreeInfo};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::common::TaskKind;
use crate::common::text::{relative_age, sanitize_for_display, truncate_with_ellipsis};
use crate::screens::render_utils::scroll_offset;
use crate::state::{AppState, Pane, TuiState};
use crate::views::{AnnotatedCommit, StatusRow};

/// Height of the status bar below the panes.
const STATUS_HEIGHT: u16 = 1;

/// Share of the width given to the worktree list.
const LIST_PERCENT: u16 = 45;

/// Spinner frames for the status bar.
const SPINNER_FRAMES: &[&str] = &["◐", "◓", "◑", "◒"];

const FOCUS_COLOR: Color = Color::Cyan;

/// Renders the entire TUI to the frame.
pub fn render(app: &AppState, frame: &mut Frame) {
    let area = frame.area();
    let tui = &app.tui;

    let [main, status] = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(STATUS_HEIGHT)])
        .areas(area);
    let [list, details] = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(LIST_PERCENT),
            Constraint::Percentage(100 - LIST_PERCENT),
        ])
        .areas(main);
    let [status_pane, log_pane] = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .areas(details);

    render_worktrees(tui, frame, list);
    render_status_pane(tui, frame, status_pane);
    render_log_pane(tui, frame, log_pane);
    render_status_bar(tui, frame, status);

    if let Some(screen) = app.screens.active() {
        screen.render(frame, area, tui);
    }
}

/// Bordered pane block; the title carries the filter when one is set.
fn pane_block(tui: &TuiState, pane: Pane, extra: Option<String>) -> Block<'static> {
    let focused = tui.focus == pane;
    let filter = tui.filters.get(pane);
    let editing = tui.filter_editing == Some(pane);

    let mut title = format!(" {} ", pane.title());
    if let Some(extra) = extra {
        title.push_str(&format!("{extra} "));
    }
    if editing {
        title.push_str(&format!("/{filter}▏ "));
    } else if !filter.is_empty() {
        title.push_str(&format!("[{filter}] "));
    }

    let border = if focused { FOCUS_COLOR } else { Color::DarkGray };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(title)
        .title_style(if focused {
            Style::default().fg(FOCUS_COLOR).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        })
}

fn inner_height(area: Rect) -> usize {
    usize::from(area.height.saturating_sub(2))
}

fn selected_style(focused: bool) -> Style {
    if focused {
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::BOLD)
    }
}

// ============================================================================
// Worktree list
// ============================================================================

fn render_worktrees(tui: &TuiState, frame: &mut Frame, area: Rect) {
    let count = if tui.filters.worktrees.is_empty() {
        format!("({})", tui.worktrees.len())
    } else {
        format!("({}/{})", tui.visible.len(), tui.worktrees.len())
    };
    let block = pane_block(tui, Pane::Worktrees, Some(count));

    let height = inner_height(area);
    let width = usize::from(area.width.saturating_sub(2));
    let offset = scroll_offset(tui.selected, height);
    let now = chrono::Utc::now().timestamp();
    let focused = tui.focus == Pane::Worktrees;

    let lines: Vec<Line> = tui
        .visible
        .iter()
        .enumerate()
        .skip(offset)
        .take(height)
        .filter_map(|(row, &idx)| tui.worktrees.get(idx).map(|wt| (row, wt)))
        .map(|(row, wt)| {
            let line = worktree_line(wt, now, width);
            if row == tui.selected {
                line.style(selected_style(focused))
            } else {
                line
            }
        })
        .collect();

    let body = if lines.is_empty() {
        let text = if tui.repo.is_none() {
            "Opening repository…"
        } else if tui.worktrees.is_empty() {
            "Loading worktrees…"
        } else {
            "No worktrees match the filter."
        };
        Paragraph::new(Line::from(Span::styled(
            text,
            Style::default().fg(Color::DarkGray),
        )))
    } else {
        Paragraph::new(lines)
    };
    frame.render_widget(body.block(block), area);
}

fn worktree_line(wt: &WorktreeInfo, now: i64, width: usize) -> Line<'static> {
    let marker = if wt.is_main {
        Span::styled("★ ", Style::default().fg(Color::Yellow))
    } else if wt.has_changes() {
        Span::styled("● ", Style::default().fg(Color::Red))
    } else {
        Span::raw("  ")
    };

    let mut sync = String::new();
    if wt.ahead > 0 {
        sync.push_str(&format!("↑{}", wt.ahead));
    }
    if wt.behind > 0 {
        sync.push_str(&format!("↓{}", wt.behind));
    }
    let age = relative_age(wt.last_active_ts, now);
    let suffix = format!(" {sync} {age:>4}");

    let label = if wt.name() == wt.branch {
        wt.branch.clone()
    } else {
        format!("{} ({})", wt.branch, wt.name())
    };
    let label_width = width.saturating_sub(2 + suffix.chars().count());
    let label = truncate_with_ellipsis(&label, label_width);
    let pad = label_width.saturating_sub(unicode_width::UnicodeWidthStr::width(label.as_str()));

    Line::from(vec![
        marker,
        Span::raw(label),
        Span::raw(" ".repeat(pad)),
        Span::styled(sync, Style::default().fg(Color::Magenta)),
        Span::styled(format!(" {age:>4}"), Style::default().fg(Color::DarkGray)),
    ])
}

// ============================================================================
// Status pane
// ============================================================================

fn render_status_pane(tui: &TuiState, frame: &mut Frame, area: Rect) {
    let rows = tui.status_rows();
    let block = pane_block(tui, Pane::Status, None);
    if let Some(error) = &tui.details.error {
        let text = Paragraph::new(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red),
        )));
        frame.render_widget(text.block(block), area);
        return;
    }
    if rows.is_empty() {
        let text = if tui.details.path.is_none() {
            ""
        } else if tui.filters.status.is_empty() {
            "Working tree clean."
        } else {
            "No files match the filter."
        };
        let text = Paragraph::new(Line::from(Span::styled(
            text,
            Style::default().fg(Color::DarkGray),
        )));
        frame.render_widget(text.block(block), area);
        return;
    }

    let height = inner_height(area);
    let focused = tui.focus == Pane::Status;
    let offset = scroll_offset(tui.status_selected, height);
    let lines: Vec<Line> = rows
        .iter()
        .enumerate()
        .skip(offset)
        .take(height)
        .map(|(i, row)| {
            let line = status_line(row);
            if focused && i == tui.status_selected {
                line.style(selected_style(true))
            } else {
                line
            }
        })
        .collect();
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn status_line(row: &StatusRow) -> Line<'static> {
    let indent = "  ".repeat(row.depth());
    match row {
        StatusRow::Dir {
            label, collapsed, ..
        } => {
            let arrow = if *collapsed { "▸" } else { "▾" };
            Line::from(vec![
                Span::raw(indent),
                Span::styled(
                    format!("{arrow} {label}/"),
                    Style::default().fg(Color::Blue),
                ),
            ])
        }
        StatusRow::File { file, label, .. } => Line::from(vec![
            Span::raw(indent),
            Span::styled(format!("{} ", file.xy), file_style(file)),
            Span::raw(sanitize_for_display(label).into_owned()),
        ]),
    }
}

fn file_style(file: &StatusFile) -> Style {
    if file.untracked {
        Style::default().fg(Color::DarkGray)
    } else if file.is_fully_staged() {
        Style::default().fg(Color::Green)
    } else if file.is_staged() {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::Red)
    }
}

// ============================================================================
// Log pane
// ============================================================================

fn render_log_pane(tui: &TuiState, frame: &mut Frame, area: Rect) {
    let rows = tui.log_rows();
    let block = pane_block(tui, Pane::Log, None);
    let height = inner_height(area);
    let focused = tui.focus == Pane::Log;
    let offset = scroll_offset(tui.log_selected, height);
    let lines: Vec<Line> = rows
        .iter()
        .enumerate()
        .skip(offset)
        .take(height)
        .map(|(i, commit)| {
            let line = log_line(commit);
            if focused && i == tui.log_selected {
                line.style(selected_style(true))
            } else {
                line
            }
        })
        .collect();
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn log_line(commit: &AnnotatedCommit) -> Line<'static> {
    let marker = if commit.unpushed {
        Span::styled("↑ ", Style::default().fg(Color::Magenta))
    } else if commit.unmerged {
        Span::styled("◆ ", Style::default().fg(Color::Yellow))
    } else {
        Span::raw("  ")
    };
    Line::from(vec![
        marker,
        Span::styled(
            format!("{} ", commit.entry.short_sha()),
            Style::default().fg(Color::Yellow),
        ),
        Span::raw(sanitize_for_display(&commit.entry.message).into_owned()),
        Span::styled(
            format!("  {}", commit.entry.author),
            Style::default().fg(Color::DarkGray),
        ),
    ])
}

// ============================================================================
// Status bar
// ============================================================================

fn render_status_bar(tui: &TuiState, frame: &mut Frame, area: Rect) {
    let mut left: Vec<Span> = Vec::new();
    let loading = tui.tasks.state(TaskKind::WorktreeList).is_running();
    if loading || tui.tasks.is_any_running() {
        let label = tui.tasks.busy_label().unwrap_or("Loading");
        let glyph = SPINNER_FRAMES[tui.spinner_frame % SPINNER_FRAMES.len()];
        left.push(Span::styled(
            format!(" {glyph} {label}"),
            Style::default().fg(FOCUS_COLOR),
        ));
    } else if let Some(error) = &tui.list_error {
        left.push(Span::styled(
            format!(" {error}"),
            Style::default().fg(Color::Red),
        ));
    } else if let Some(message) = &tui.message {
        left.push(Span::raw(format!(" {message}")));
    }

    let right = format!(
        "{} · sort: {} · ? help ",
        tui.repo_name(),
        tui.config.sort_mode.as_str()
    );
    let right_width = u16::try_from(right.chars().count()).unwrap_or(u16::MAX);
    let [left_area, right_area] = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(right_width)])
        .areas(area);

    frame.render_widget(Paragraph::new(Line::from(left)), left_area);
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            right,
            Style::default().fg(Color::DarkGray),
        ))),
        right_area,
    );
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use lwt_core::config::Config;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    use super::*;
    use crate::details_cache::{DetailsCache, DetailsSnapshot};

    fn buffer_text(app: &AppState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(usize::from(buffer.area.width))
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn app() -> AppState {
        let mut app = AppState::new(
            Config::default(),
            PathBuf::from("/repo"),
            Arc::new(DetailsCache::default()),
        );
        let mut main = WorktreeInfo::new("/repo", "main");
        main.is_main = true;
        let mut feature = WorktreeInfo::new("/wt/feature", "feature");
        feature.ahead = 2;
        app.tui.worktrees = vec![main, feature];
        app.tui.refresh_visible();
        app
    }

    #[test]
    fn test_renders_worktrees_and_status_bar() {
        let mut app = app();
        app.tui.message = Some("Sort: recent".to_string());
        let text = buffer_text(&app);
        assert!(text.contains("Worktrees (2)"));
        assert!(text.contains("feature"));
        assert!(text.contains("↑2"));
        assert!(text.contains("Sort: recent"));
    }

    #[test]
    fn test_renders_details_of_selection() {
        let mut app = app();
        let snapshot = DetailsSnapshot {
            status: "1 .M N... 100644 100644 100644 abc abc src/lib.rs\n".to_string(),
            log: "0123456789abcdef\tAda\tAdd parser".to_string(),
            ..DetailsSnapshot::default()
        };
        app.tui.apply_details(&PathBuf::from("/repo"), &snapshot);
        let text = buffer_text(&app);
        assert!(text.contains("lib.rs"));
        assert!(text.contains("Add parser"));
    }

    #[test]
    fn test_filter_shows_in_title() {
        let mut app = app();
        app.tui.filters.worktrees = "feat".to_string();
        app.tui.refresh_visible();
        let text = buffer_text(&app);
        assert!(text.contains("(1/2)"));
        assert!(text.contains("[feat]"));
    }
}
