//! `pb validate`: fetch the snapshot and report every shape problem.

use crate::output::{CliError, OutputMode, pretty_kv, pretty_section, render_error, render_mode};
use crate::session::Session;
use clap::Args;
use phaseboard_core::RefreshError;
use phaseboard_core::validate::{check_shape, parse_snapshot};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug, Default)]
pub struct ValidateArgs {}

#[derive(Debug, Serialize)]
pub struct Problem {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub source: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues: Option<usize>,
    pub problems: Vec<Problem>,
}

impl ValidationReport {
    /// Run the shape checks and, when they pass, the typed conversion.
    #[must_use]
    pub fn check(source: String, document: serde_yaml::Value) -> Self {
        let mut problems: Vec<Problem> = check_shape(&document)
            .into_iter()
            .map(|v| Problem {
                field: v.field().to_string(),
                message: v.message().to_string(),
            })
            .collect();

        let mut issues = None;
        if problems.is_empty() {
            match parse_snapshot(document) {
                Ok(snapshot) => issues = Some(snapshot.issue_count()),
                Err(RefreshError::InvalidShape { problems: found }) => {
                    problems.extend(found.into_iter().map(|message| Problem {
                        field: "phases".to_string(),
                        message,
                    }));
                }
                Err(err @ RefreshError::SourceUnavailable { .. }) => problems.push(Problem {
                    field: "$".to_string(),
                    message: err.to_string(),
                }),
            }
        }

        Self {
            source,
            valid: problems.is_empty(),
            issues,
            problems,
        }
    }
}

fn write_text(report: &ValidationReport, w: &mut dyn Write) -> io::Result<()> {
    if report.valid {
        writeln!(w, "ok\t{}", report.source)?;
    }
    for problem in &report.problems {
        writeln!(w, "invalid\t{}\t{}", problem.field, problem.message)?;
    }
    Ok(())
}

fn write_pretty(report: &ValidationReport, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, "Validation")?;
    pretty_kv(w, "Source", &report.source)?;
    if report.valid {
        pretty_kv(w, "Result", "✓ valid")?;
        if let Some(issues) = report.issues {
            pretty_kv(w, "Issues", issues.to_string())?;
        }
        return Ok(());
    }
    pretty_kv(w, "Result", format!("✗ {} problem(s)", report.problems.len()))?;
    for problem in &report.problems {
        writeln!(w, "  - {}: {}", problem.field, problem.message)?;
    }
    Ok(())
}

/// Execute `pb validate`.
///
/// # Errors
///
/// Returns an error if no source could be read, the document is invalid, or
/// output rendering fails.
pub fn run_validate(
    _args: &ValidateArgs,
    output: OutputMode,
    project_root: &Path,
    source: Option<&str>,
) -> anyhow::Result<()> {
    let session = Session::open(project_root, source, output)?;
    let token = chrono::Utc::now().timestamp_millis();
    let fetched = match session.fetcher.fetch(token) {
        Ok(fetched) => fetched,
        Err(err) => {
            render_error(output, &CliError::from(&err))?;
            anyhow::bail!(err);
        }
    };

    let report = ValidationReport::check(fetched.source, fetched.document);
    render_mode(output, &report, write_text, write_pretty)?;
    if !report.valid {
        anyhow::bail!("snapshot has {} shape problem(s)", report.problems.len());
    }
    Ok(())
}
