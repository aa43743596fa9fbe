//! `pb watch`: run the refresh cycle headless and report each outcome.

use crate::output::OutputMode;
use crate::session::Session;
use chrono::{DateTime, SecondsFormat, Utc};
use clap::Args;
use phaseboard_core::refresh::{Clock, CycleOutcome, LoadStatus, SnapshotLoader, SystemClock};
use phaseboard_core::Reconciler;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Upper bound on a single sleep so notices expire close to on time.
const MAX_SLEEP: Duration = Duration::from_secs(1);

#[derive(Args, Debug, Default)]
pub struct WatchArgs {
    /// Stop after this many refresh cycles (default: run until interrupted).
    #[arg(long, value_name = "N")]
    pub max_cycles: Option<u32>,

    /// Override the refresh interval in seconds.
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Refreshed,
    Stale,
    Failed,
    NoticeCleared,
}

/// One line of watch output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchEvent {
    pub at: String,
    pub event: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl WatchEvent {
    fn new(now: DateTime<Utc>, event: EventKind) -> Self {
        Self {
            at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            event,
            source: None,
            issues: None,
            generated_at: None,
            message: None,
            error_code: None,
        }
    }

    /// Describe a completed cycle using the reconciler's post-cycle state.
    #[must_use]
    pub fn from_outcome<L, C>(outcome: &CycleOutcome, reconciler: &Reconciler<L, C>) -> Self
    where
        L: SnapshotLoader,
        C: Clock,
    {
        let now = reconciler.refreshed_at().unwrap_or_else(Utc::now);
        match outcome {
            CycleOutcome::Refreshed { source, changed } => Self {
                source: Some(source.clone()),
                issues: reconciler.snapshot().map(|s| s.issue_count()),
                generated_at: reconciler.generated_at().map(str::to_string),
                message: changed
                    .then(|| reconciler.notice().map(|n| n.message.clone()))
                    .flatten(),
                ..Self::new(now, EventKind::Refreshed)
            },
            CycleOutcome::Stale(err) => Self {
                source: reconciler.source().map(str::to_string),
                message: reconciler.status().message().map(str::to_string),
                error_code: Some(err.code().code().to_string()),
                ..Self::new(Utc::now(), EventKind::Stale)
            },
            CycleOutcome::Failed(err) => Self {
                message: reconciler.status().message().map(str::to_string),
                error_code: Some(err.code().code().to_string()),
                ..Self::new(Utc::now(), EventKind::Failed)
            },
        }
    }
}

fn write_event(event: &WatchEvent, mode: OutputMode, w: &mut dyn Write) -> io::Result<()> {
    match mode {
        OutputMode::Json => {
            serde_json::to_writer(&mut *w, event)?;
            writeln!(w)
        }
        OutputMode::Text => {
            let kind = serde_json::to_value(event.event)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            writeln!(
                w,
                "{}\t{}\t{}\t{}",
                event.at,
                kind,
                event.source.as_deref().unwrap_or("-"),
                event.message.as_deref().unwrap_or("-"),
            )
        }
        OutputMode::Pretty => {
            let line = match event.event {
                EventKind::Refreshed => format!(
                    "✓ refreshed from {} ({} issues)",
                    event.source.as_deref().unwrap_or("?"),
                    event.issues.unwrap_or_default()
                ),
                EventKind::Stale | EventKind::Failed => {
                    format!("✗ {}", event.message.as_deref().unwrap_or("refresh failed"))
                }
                EventKind::NoticeCleared => "· update notice cleared".to_string(),
            };
            writeln!(w, "{}  {line}", event.at)?;
            if event.event == EventKind::Refreshed {
                if let Some(message) = &event.message {
                    writeln!(w, "{:>22}{message}", "")?;
                }
            }
            Ok(())
        }
    }
}

fn sleep_until_due<L: SnapshotLoader, C: Clock>(reconciler: &Reconciler<L, C>) {
    let wait = reconciler
        .next_due()
        .and_then(|due| (due - Utc::now()).to_std().ok())
        .unwrap_or_default()
        .min(MAX_SLEEP);
    if !wait.is_zero() {
        std::thread::sleep(wait);
    }
}

/// Execute `pb watch`.
///
/// # Errors
///
/// Returns an error if config loading fails, output cannot be written, or the
/// last completed cycle left nothing to display.
pub fn run_watch(
    args: &WatchArgs,
    output: OutputMode,
    project_root: &Path,
    source: Option<&str>,
) -> anyhow::Result<()> {
    let Session {
        project, fetcher, ..
    } = Session::open(project_root, source, output)?;

    let mut timing = project.refresh.timing();
    if let Some(secs) = args.interval {
        timing.interval = Duration::from_secs(secs.max(1));
    }
    debug!(?timing, max_cycles = ?args.max_cycles, "starting watch");

    let mut reconciler = Reconciler::new(fetcher, SystemClock, timing);
    let mut cycles = 0_u32;
    let stdout = io::stdout();

    loop {
        let had_notice = reconciler.notice().is_some();
        let outcome = reconciler.poll();
        let mut out = stdout.lock();
        if had_notice && reconciler.notice().is_none() {
            write_event(
                &WatchEvent::new(Utc::now(), EventKind::NoticeCleared),
                output,
                &mut out,
            )?;
        }
        if let Some(outcome) = outcome {
            cycles += 1;
            write_event(&WatchEvent::from_outcome(&outcome, &reconciler), output, &mut out)?;
        }
        out.flush()?;
        drop(out);

        if args.max_cycles.is_some_and(|max| cycles >= max) {
            break;
        }
        sleep_until_due(&reconciler);
    }

    if let LoadStatus::Failed { message } = reconciler.status() {
        anyhow::bail!("{message}");
    }
    Ok(())
}
