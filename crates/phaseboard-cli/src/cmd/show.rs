//! `pb show`: display full details of a single issue.

use crate::output::{CliError, OutputMode, pretty_kv, pretty_section, render_error, render_mode};
use crate::session::Session;
use clap::Args;
use phaseboard_core::ErrorCode;
use phaseboard_core::model::{Issue, LinkedIssue, Phase};
use phaseboard_core::status::{
    IssueProgress, StatusClass, StatusConfig, belongs_to_phase, is_approval, issue_progress,
};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Issue key, e.g. RVS-1234 (case-insensitive).
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct SubtaskDetail {
    pub key: String,
    pub summary: String,
    pub status: String,
    pub class: StatusClass,
    #[serde(rename = "type")]
    pub kind: String,
    pub approval: bool,
    /// Counted toward the current phase's progress.
    pub current_phase: bool,
}

#[derive(Debug, Serialize)]
pub struct ShowIssue {
    pub key: String,
    pub summary: String,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_in_phase: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isa: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    pub progress: IssueProgress,
    pub subtasks: Vec<SubtaskDetail>,
    pub linked_issues: Vec<LinkedIssue>,
}

impl ShowIssue {
    #[must_use]
    pub fn new(issue: &Issue, status: &StatusConfig, all_subtasks: bool) -> Self {
        let isa = issue.isa_value();
        Self {
            key: issue.key.clone(),
            summary: issue.summary.clone(),
            phase: issue.phase,
            days_in_phase: issue.days_in_phase,
            isa: (!isa.is_empty()).then_some(isa),
            track: issue.track().map(|t| t.to_string()),
            github: issue.github.clone(),
            progress: issue_progress(issue, status, all_subtasks),
            subtasks: issue
                .subtasks
                .iter()
                .map(|s| SubtaskDetail {
                    key: s.key.clone(),
                    summary: s.summary.clone(),
                    status: s.status.clone(),
                    class: status.classify(&s.status),
                    kind: s.kind.clone(),
                    approval: is_approval(s),
                    current_phase: all_subtasks || belongs_to_phase(s, issue.phase),
                })
                .collect(),
            linked_issues: issue.surfaced_links().cloned().collect(),
        }
    }
}

fn write_text(item: &ShowIssue, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "key\t{}", item.key)?;
    writeln!(w, "summary\t{}", item.summary)?;
    writeln!(w, "phase\t{}", item.phase)?;
    if let Some(days) = item.days_in_phase {
        writeln!(w, "days_in_phase\t{days}")?;
    }
    writeln!(w, "isa\t{}", item.isa.as_deref().unwrap_or("-"))?;
    writeln!(w, "track\t{}", item.track.as_deref().unwrap_or("-"))?;
    if let Some(github) = &item.github {
        writeln!(w, "github\t{github}")?;
    }
    let p = &item.progress;
    writeln!(w, "tasks\t{}/{}", p.tasks.done, p.tasks.total)?;
    writeln!(w, "approvals\t{}/{}", p.approvals.done, p.approvals.total)?;
    if let Some(next) = &p.next_approval {
        writeln!(w, "next_approval\t{next}")?;
    }
    for s in &item.subtasks {
        writeln!(w, "subtask\t{}\t{}\t{}\t{}", s.key, s.class, s.status, s.summary)?;
    }
    for link in &item.linked_issues {
        writeln!(w, "link\t{}\t{}\t{}", link.relationship, link.key, link.summary)?;
    }
    Ok(())
}

fn write_pretty(item: &ShowIssue, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("{}  {}", item.key, item.summary))?;
    let phase = item.days_in_phase.map_or_else(
        || item.phase.to_string(),
        |days| format!("{} ({days}d)", item.phase),
    );
    pretty_kv(w, "Phase", phase)?;
    pretty_kv(w, "ISA", item.isa.as_deref().unwrap_or("-"))?;
    pretty_kv(w, "Track", item.track.as_deref().unwrap_or("-"))?;
    if let Some(github) = &item.github {
        pretty_kv(w, "GitHub", github)?;
    }

    let p = &item.progress;
    pretty_kv(
        w,
        "Tasks",
        format!(
            "{}/{} done, {} in progress ({}%)",
            p.tasks.done,
            p.tasks.total,
            p.tasks.in_progress,
            p.tasks.percent()
        ),
    )?;
    pretty_kv(
        w,
        "Approvals",
        format!("{}/{} done", p.approvals.done, p.approvals.total),
    )?;
    if let Some(next) = &p.next_approval {
        pretty_kv(w, "Next approval", next)?;
    }

    if !item.subtasks.is_empty() {
        writeln!(w)?;
        pretty_section(w, "Subtasks")?;
        for s in &item.subtasks {
            let marker = match s.class {
                StatusClass::Done => "✓",
                StatusClass::InProgress => "◐",
                StatusClass::NotStarted => "○",
            };
            let dim = if s.current_phase { "" } else { "  (other phase)" };
            writeln!(w, "  {marker} {:<12} {:<14} {}{dim}", s.key, s.status, s.summary)?;
        }
    }

    if !item.linked_issues.is_empty() {
        writeln!(w)?;
        pretty_section(w, "Linked issues")?;
        for link in &item.linked_issues {
            writeln!(w, "  {} {}  {}", link.relationship, link.key, link.summary)?;
        }
    }
    Ok(())
}

/// Execute `pb show <key>`.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be loaded, the key is unknown, or
/// output rendering fails.
pub fn run_show(
    args: &ShowArgs,
    output: OutputMode,
    project_root: &Path,
    source: Option<&str>,
) -> anyhow::Result<()> {
    let mut session = Session::open(project_root, source, output)?;
    let loaded = session.load(output)?;

    let Some(issue) = loaded.snapshot.find_issue(&args.key) else {
        let code = ErrorCode::IssueNotFound;
        render_error(
            output,
            &CliError::with_details(
                format!("issue '{}' not found", args.key.trim()),
                code.hint().unwrap_or_default(),
                code.code(),
            ),
        )?;
        anyhow::bail!("issue '{}' not found", args.key.trim());
    };

    let item = ShowIssue::new(issue, &session.status, session.progress_all_subtasks());
    render_mode(output, &item, write_text, write_pretty)
}
