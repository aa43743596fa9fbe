//! `pb list`: filtered per-phase issue list.

use crate::output::{OutputMode, pretty_section, render_mode, truncate};
use crate::session::Session;
use clap::Args;
use phaseboard_core::filter::{FilterState, FilteredSnapshot};
use phaseboard_core::model::{Issue, Phase};
use phaseboard_core::status::{StatusConfig, issue_progress};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Free-text query over keys, summaries, phases, subtasks and links.
    #[arg(short, long)]
    pub query: Option<String>,

    /// ISA classification: isa | non-isa.
    #[arg(long)]
    pub isa: Option<String>,

    /// Processing track: regular | fast-track.
    #[arg(long)]
    pub track: Option<String>,

    /// Only show one phase (aliases such as "dev" are accepted).
    #[arg(long)]
    pub phase: Option<String>,
}

/// One issue as shown in list output.
#[derive(Debug, Serialize)]
pub struct IssueRow {
    pub key: String,
    pub summary: String,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isa: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_in_phase: Option<u32>,
    pub tasks_done: usize,
    pub tasks_total: usize,
    pub approvals_done: usize,
    pub approvals_total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_approval: Option<String>,
}

impl IssueRow {
    #[must_use]
    pub fn new(issue: &Issue, status: &StatusConfig, all_subtasks: bool) -> Self {
        let progress = issue_progress(issue, status, all_subtasks);
        let isa = issue.isa_value();
        Self {
            key: issue.key.clone(),
            summary: issue.summary.clone(),
            phase: issue.phase,
            isa: (!isa.is_empty()).then_some(isa),
            track: issue.track().map(|t| t.to_string()),
            days_in_phase: issue.days_in_phase,
            tasks_done: progress.tasks.done,
            tasks_total: progress.tasks.total,
            approvals_done: progress.approvals.done,
            approvals_total: progress.approvals.total,
            next_approval: progress.next_approval,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PhaseGroup {
    pub phase: Phase,
    pub issues: Vec<IssueRow>,
}

#[derive(Debug, Serialize)]
pub struct ListReport {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    pub filter: FilterState,
    pub match_count: usize,
    pub phases: Vec<PhaseGroup>,
}

/// Build the report from an already-filtered view.
#[must_use]
pub fn build_report(
    source: String,
    filter: FilterState,
    view: &FilteredSnapshot,
    status: &StatusConfig,
    all_subtasks: bool,
) -> ListReport {
    let phases = view
        .non_empty_phases()
        .map(|(phase, issues)| PhaseGroup {
            phase,
            issues: issues
                .iter()
                .map(|issue| IssueRow::new(issue, status, all_subtasks))
                .collect(),
        })
        .collect();
    ListReport {
        source,
        generated_at: view.snapshot.generated_at.clone(),
        filter,
        match_count: view.match_count,
        phases,
    }
}

fn write_text(report: &ListReport, w: &mut dyn Write) -> io::Result<()> {
    for group in &report.phases {
        for row in &group.issues {
            writeln!(
                w,
                "{}\t{}\t{}\t{}\t{}\t{}/{}",
                group.phase,
                row.key,
                row.summary,
                row.isa.as_deref().unwrap_or("-"),
                row.track.as_deref().unwrap_or("-"),
                row.tasks_done,
                row.tasks_total,
            )?;
        }
    }
    Ok(())
}

fn write_pretty(report: &ListReport, w: &mut dyn Write) -> io::Result<()> {
    if report.phases.is_empty() {
        writeln!(w, "No issues match the current filters.")?;
        return Ok(());
    }
    for group in &report.phases {
        pretty_section(w, &format!("{} ({})", group.phase, group.issues.len()))?;
        for row in &group.issues {
            let mut tags = Vec::new();
            if let Some(isa) = &row.isa {
                tags.push(isa.clone());
            }
            if let Some(track) = &row.track {
                tags.push(track.clone());
            }
            if let Some(days) = row.days_in_phase {
                tags.push(format!("{days}d"));
            }
            writeln!(
                w,
                "  {:<12} {:<48} [{}/{}] {}",
                row.key,
                truncate(&row.summary, 48),
                row.tasks_done,
                row.tasks_total,
                tags.join(" · "),
            )?;
        }
        writeln!(w)?;
    }
    writeln!(w, "{} match(es)", report.match_count)
}

/// Execute `pb list`.
///
/// # Errors
///
/// Returns an error if a filter value is invalid, the snapshot cannot be
/// loaded, or output rendering fails.
pub fn run_list(
    args: &ListArgs,
    output: OutputMode,
    project_root: &Path,
    source: Option<&str>,
) -> anyhow::Result<()> {
    let filter = super::build_filter(
        args.query.as_deref(),
        args.isa.as_deref(),
        args.track.as_deref(),
        args.phase.as_deref(),
        output,
    )?;
    let mut session = Session::open(project_root, source, output)?;
    let loaded = session.load(output)?;

    let view = filter.apply(&loaded.snapshot);
    let report = build_report(
        loaded.source,
        filter,
        &view,
        &session.status,
        session.progress_all_subtasks(),
    );
    render_mode(output, &report, write_text, write_pretty)
}
