//! Selection debounce.
//!
//! Navigation restarts a single timer; only when it fires with the index
//! still selected does the reducer fetch details. Holding `j` through a long
//! list therefore costs one fetch, not one per row.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::common::TaskKind;
use crate::effects::UiEffect;
use crate::events::UiEvent;
use crate::state::TuiState;

/// Delay between the last navigation key and the details fetch.
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(200);

/// Restarts the debounce timer for the current selection.
pub fn schedule(tui: &mut TuiState) -> Vec<UiEffect> {
    let mut effects = Vec::new();
    let task = tui.begin_task(TaskKind::Debounce, &mut effects);
    effects.push(UiEffect::ScheduleDebounce {
        task,
        index: tui.selected,
    });
    effects
}

/// Whether a fired timer still matches the selection.
pub fn is_current(tui: &TuiState, index: usize) -> bool {
    index == tui.selected && index < tui.visible.len()
}

/// Timer body run by the executor. Resolves to `None` when cancelled.
pub async fn timer(index: usize, delay: Duration, cancel: Option<CancellationToken>) -> Option<UiEvent> {
    match cancel {
        Some(token) => tokio::select! {
            () = token.cancelled() => None,
            () = tokio::time::sleep(delay) => Some(UiEvent::DebouncedSelection { index }),
        },
        None => {
            tokio::time::sleep(delay).await;
            Some(UiEvent::DebouncedSelection { index })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use lwt_core::config::Config;
    use lwt_core::models::WorktreeInfo;

    use super::*;
    use crate::details_cache::DetailsCache;

    fn tui(n: usize) -> TuiState {
        let mut tui = TuiState::new(
            Config::default(),
            PathBuf::from("/repo"),
            Arc::new(DetailsCache::default()),
        );
        tui.worktrees = (0..n)
            .map(|i| WorktreeInfo::new(format!("/wt/{i}"), format!("b{i}")))
            .collect();
        tui.refresh_visible();
        tui
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let token = CancellationToken::new();
        let event = timer(3, DEBOUNCE_DELAY, Some(token)).await;
        assert!(matches!(event, Some(UiEvent::DebouncedSelection { index: 3 })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_yields_nothing() {
        let token = CancellationToken::new();
        let handle = tokio::spawn(timer(1, DEBOUNCE_DELAY, Some(token.clone())));
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
        assert!(handle.await.unwrap().is_none());
    }

    #[test]
    fn test_stale_index_is_rejected() {
        let mut tui = tui(3);
        tui.selected = 2;
        assert!(is_current(&tui, 2));
        assert!(!is_current(&tui, 1));

        tui.filters.worktrees = "/wt/0".to_string();
        tui.refresh_visible();
        tui.selected = 2;
        assert!(!is_current(&tui, 2));
    }

    #[test]
    fn test_schedule_carries_current_index() {
        let mut tui = tui(3);
        tui.selected = 1;
        let effects = schedule(&mut tui);
        assert!(matches!(
            effects.as_slice(),
            [UiEffect::ScheduleDebounce { index: 1, .. }]
        ));
    }
}
