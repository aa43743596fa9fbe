//! `pb counts`: snapshot metadata and per-phase counts.

use crate::output::{OutputMode, pretty_kv, pretty_section, render_mode};
use crate::session::Session;
use clap::Args;
use phaseboard_core::model::{Phase, Snapshot};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug, Default)]
pub struct CountsArgs {}

#[derive(Debug, Serialize)]
pub struct PhaseCount {
    pub phase: Phase,
    /// Count written by the producer, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared: Option<u64>,
    /// Issues actually present in the phase list.
    pub actual: usize,
}

impl PhaseCount {
    fn mismatch(&self) -> bool {
        self.declared
            .is_some_and(|declared| usize::try_from(declared).ok() != Some(self.actual))
    }
}

#[derive(Debug, Serialize)]
pub struct CountsReport {
    pub source: String,
    pub schema_version: serde_yaml::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    pub total: usize,
    pub phases: Vec<PhaseCount>,
}

impl CountsReport {
    #[must_use]
    pub fn new(source: String, snapshot: &Snapshot) -> Self {
        let phases = Phase::ALL
            .into_iter()
            .map(|phase| PhaseCount {
                phase,
                declared: snapshot.declared_count(phase),
                actual: snapshot.issues(phase).len(),
            })
            .filter(|count| count.declared.is_some() || count.actual > 0)
            .collect();
        Self {
            source,
            schema_version: snapshot.schema_version.clone(),
            project: snapshot.project.clone(),
            generated_at: snapshot.generated_at.clone(),
            total: snapshot.issue_count(),
            phases,
        }
    }
}

fn scalar(value: &serde_yaml::Value) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn write_text(report: &CountsReport, w: &mut dyn Write) -> io::Result<()> {
    for count in &report.phases {
        let declared = count
            .declared
            .map_or_else(|| "-".to_string(), |d| d.to_string());
        writeln!(w, "{}\t{}\t{}", count.phase, declared, count.actual)?;
    }
    Ok(())
}

fn write_pretty(report: &CountsReport, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, "Snapshot")?;
    pretty_kv(w, "Source", &report.source)?;
    pretty_kv(w, "Schema", scalar(&report.schema_version))?;
    pretty_kv(w, "Project", report.project.as_deref().unwrap_or("-"))?;
    pretty_kv(w, "Generated", report.generated_at.as_deref().unwrap_or("-"))?;
    pretty_kv(w, "Issues", report.total.to_string())?;
    writeln!(w)?;

    pretty_section(w, "Phases")?;
    writeln!(w, "  {:<20} {:>8} {:>8}", "phase", "declared", "actual")?;
    for count in &report.phases {
        let declared = count
            .declared
            .map_or_else(|| "-".to_string(), |d| d.to_string());
        let flag = if count.mismatch() { "  ≠" } else { "" };
        writeln!(
            w,
            "  {:<20} {:>8} {:>8}{flag}",
            count.phase.as_str(),
            declared,
            count.actual
        )?;
    }
    Ok(())
}

/// Execute `pb counts`.
///
/// # Errors
///
/// Returns an error if the snapshot cannot be loaded or output rendering fails.
pub fn run_counts(
    _args: &CountsArgs,
    output: OutputMode,
    project_root: &Path,
    source: Option<&str>,
) -> anyhow::Result<()> {
    let mut session = Session::open(project_root, source, output)?;
    let loaded = session.load(output)?;
    let report = CountsReport::new(loaded.source, &loaded.snapshot);
    render_mode(output, &report, write_text, write_pretty)
}
