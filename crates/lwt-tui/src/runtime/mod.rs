//! TUI runtime - owns terminal, runs event loop, executes effects.
//!
//! This is the "Elm runtime" boundary: all side effects happen here.
//! The reducer stays pure and produces effects; this module executes them.
//!
//! ## Inbox Pattern
//!
//! - Handlers, the metadata watcher and debounce timers send `UiEvent`s to
//!   the inbox
//! - The runtime drains the inbox each frame, together with terminal input
//! - Every event goes through `update::update`, and the effects it returns
//!   go to the executor
//!
//! Structure:
//! - `mod.rs`: Core runtime (TuiRuntime, event loop)
//! - `executor.rs`: Effect dispatch and task lifecycle
//! - `inbox.rs`: Inbox channel types
//! - `handlers/`: Effect handler implementations (git, files, trust)

mod executor;
#[cfg(test)]
mod fake;
mod handlers;
mod inbox;

use std::io::Stdout;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event;
use executor::EffectExecutor;
pub use executor::{GitConnector, RepoConnector, Services};
pub use inbox::{UiEventReceiver, UiEventSender};
use lwt_core::config::Config;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing::info;

use crate::details_cache::DetailsCache;
use crate::effects::UiEffect;
use crate::events::UiEvent;
use crate::state::AppState;
use crate::{refresh, render, terminal, update};

/// Frame cadence while tasks run or the user is typing.
pub const FRAME_DURATION: Duration = Duration::from_millis(16);

/// Poll duration when idle. Also the spinner and auto-refresh cadence.
pub const IDLE_POLL_DURATION: Duration = Duration::from_millis(100);

/// Full-screen TUI runtime.
///
/// Owns the terminal and state. Runs the event loop and executes effects.
/// Terminal state is restored on drop and on panic.
pub struct TuiRuntime {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    pub state: AppState,
    executor: EffectExecutor,
    /// Inbox receiver - runtime drains this each frame.
    inbox_rx: UiEventReceiver,
    /// Last time a Tick event was emitted.
    last_tick: Instant,
    /// Last time a terminal event was received (for fast tick during interaction).
    last_terminal_event: Instant,
}

impl TuiRuntime {
    pub fn new(config: Config, start_dir: PathBuf, services: Services) -> Result<Self> {
        // Set up panic hook BEFORE entering alternate screen
        terminal::install_panic_hook();

        let terminal = terminal::setup_terminal().context("Failed to setup terminal")?;

        let cache = Arc::new(DetailsCache::default());
        let (inbox_tx, inbox_rx) = inbox::channel();
        let executor = EffectExecutor::new(
            inbox_tx,
            services,
            Arc::clone(&cache),
            config.clone(),
            start_dir.clone(),
        );
        let state = AppState::new(config, start_dir, cache);

        let now = Instant::now();
        Ok(Self {
            terminal,
            state,
            executor,
            inbox_rx,
            last_tick: now,
            last_terminal_event: now,
        })
    }

    /// Runs the main event loop.
    ///
    /// Returns the worktree path the user switched to, if any.
    pub fn run(&mut self) -> Result<Option<PathBuf>> {
        let effects = refresh::discover_repository(&mut self.state.tui);
        self.execute_effects(effects);
        self.event_loop()?;
        Ok(self.state.tui.selected_output.take())
    }

    fn event_loop(&mut self) -> Result<()> {
        let mut dirty = true;

        while !self.state.tui.should_quit {
            let mut events = self.collect_events()?;

            // Layout updates happen before other events.
            let size = self.terminal.size()?;
            events.insert(
                0,
                UiEvent::Frame {
                    width: size.width,
                    height: size.height,
                },
            );

            for event in events {
                if matches!(&event, UiEvent::Terminal(_)) {
                    self.last_terminal_event = Instant::now();
                }
                // Anything but a bare Frame can change what is on screen.
                if !matches!(&event, UiEvent::Frame { .. }) {
                    dirty = true;
                }
                let effects = update::update(&mut self.state, event);
                self.execute_effects(effects);
                if self.state.tui.should_quit {
                    break;
                }
            }

            if dirty && !self.state.tui.should_quit {
                self.terminal.draw(|frame| {
                    render::render(&self.state, frame);
                })?;
                dirty = false;
            }
        }

        info!("event loop finished");
        Ok(())
    }

    // ========================================================================
    // Event Collection
    // ========================================================================

    /// Collects events from the inbox and the terminal, plus a Tick when due.
    fn collect_events(&mut self) -> Result<Vec<UiEvent>> {
        let mut events = Vec::new();

        let recent_terminal_activity = self.last_terminal_event.elapsed() < IDLE_POLL_DURATION;
        let needs_fast_poll = self.state.tui.tasks.is_any_running() || recent_terminal_activity;
        let tick_interval = if needs_fast_poll {
            FRAME_DURATION
        } else {
            IDLE_POLL_DURATION
        };

        while let Ok(ev) = self.inbox_rx.try_recv() {
            events.push(ev);
        }

        // Block until the next tick only when there is nothing to process.
        let time_until_tick = IDLE_POLL_DURATION.saturating_sub(self.last_tick.elapsed());
        let poll_duration = if events.is_empty() {
            time_until_tick.min(tick_interval)
        } else {
            Duration::ZERO
        };

        if event::poll(poll_duration)? {
            events.push(UiEvent::Terminal(event::read()?));
            while event::poll(Duration::ZERO)? {
                events.push(UiEvent::Terminal(event::read()?));
            }
        }

        if self.last_tick.elapsed() >= IDLE_POLL_DURATION {
            events.push(UiEvent::Tick);
            self.last_tick = Instant::now();
        }

        Ok(events)
    }

    // ========================================================================
    // Effect Dispatch
    // ========================================================================

    fn execute_effects(&mut self, effects: Vec<UiEffect>) {
        for effect in effects {
            match effect {
                UiEffect::Quit => self.state.tui.should_quit = true,
                effect => self.executor.execute(effect),
            }
        }
    }
}

impl Drop for TuiRuntime {
    fn drop(&mut self) {
        let _ = terminal::restore_terminal();
    }
}
