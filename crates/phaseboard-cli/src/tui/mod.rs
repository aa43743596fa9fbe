//! Terminal user interface (TUI) for phaseboard.
//!
//! ## Entry points
//!
//! - [`run_dashboard`]: full-screen dashboard with live refresh, filters and
//!   debounced search.

pub mod dashboard;

use crate::output::OutputMode;
use crate::session::Session;
use anyhow::{Context, Result};
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyEventKind},
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use dashboard::{Dashboard, InputMode};
use phaseboard_core::fetch::{DefaultTransport, Fetcher};
use phaseboard_core::refresh::{Reconciler, SystemClock};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{self, Stdout};
use std::path::Path;
use std::time::{Duration, Instant};

/// Event poll timeout; bounds how late debounce and refresh ticks can fire.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Redraw at least this often so the clock and transient messages update.
const REDRAW_INTERVAL: Duration = Duration::from_secs(1);

type Term = Terminal<CrosstermBackend<Stdout>>;

fn setup_terminal() -> Result<Term> {
    terminal::enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    if let Err(err) = stdout.execute(EnterAlternateScreen) {
        let _ = terminal::disable_raw_mode();
        return Err(err).context("enter alternate screen");
    }
    match Terminal::new(CrosstermBackend::new(stdout)) {
        Ok(term) => Ok(term),
        Err(err) => {
            let _ = io::stdout().execute(LeaveAlternateScreen);
            let _ = terminal::disable_raw_mode();
            Err(err).context("create terminal")
        }
    }
}

fn restore_terminal(term: &mut Term) -> Result<()> {
    terminal::disable_raw_mode().context("disable raw mode")?;
    term.backend_mut()
        .execute(LeaveAlternateScreen)
        .context("leave alternate screen")?;
    term.show_cursor().context("show cursor")?;
    Ok(())
}

fn event_loop(term: &mut Term, view: &mut Dashboard<Fetcher<DefaultTransport>>) -> Result<()> {
    let mut dirty = true;
    let mut last_draw = Instant::now();
    loop {
        if dirty || last_draw.elapsed() >= REDRAW_INTERVAL {
            term.draw(|frame| view.render(frame, frame.area()))?;
            dirty = false;
            last_draw = Instant::now();
        }

        if event::poll(POLL_INTERVAL)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    view.handle_key(key);
                    dirty = true;
                }
            } else {
                dirty = true;
            }
        }
        if view.should_quit() {
            return Ok(());
        }
        dirty |= view.tick(Instant::now()) || view.input_mode() == InputMode::Search;
    }
}

/// Execute `pb tui`.
///
/// # Errors
///
/// Returns an error if config loading fails or the terminal cannot be driven.
pub fn run_dashboard(output: OutputMode, project_root: &Path, source: Option<&str>) -> Result<()> {
    let Session {
        project,
        status,
        fetcher,
    } = Session::open(project_root, source, output)?;

    let reconciler = Reconciler::new(fetcher, SystemClock, project.refresh.timing());
    let mut view = Dashboard::new(
        reconciler,
        status,
        project.status.progress_all_subtasks,
        project.refresh.debounce(),
    );

    let mut term = setup_terminal()?;
    let result = event_loop(&mut term, &mut view);
    let restored = restore_terminal(&mut term);
    result.and(restored)
}
