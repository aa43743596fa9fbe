//! Subtask status classification and per-issue progress.

use crate::error::ErrorCode;
use crate::fetch::{Transport, read_text};
use crate::model::{Issue, Phase, Subtask};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Subtask types that count as approvals regardless of the explicit flag.
pub const APPROVAL_TYPES: [&str; 3] = ["BoD Approval", "Approval", "ARC Review"];

static PHASE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| match Regex::new(r"^\s*\[([^\]]+)\]\s*-") {
        Ok(re) => re,
        Err(_) => unreachable!("static regex pattern"),
    });

/// Three-way classification of a free-text status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    Done,
    NotStarted,
    InProgress,
}

impl StatusClass {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::NotStarted => "not started",
            Self::InProgress => "in progress",
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configurable status sets. Missing keys keep their defaults, so a partial
/// override object is merged shallowly over [`StatusConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusConfig {
    pub done_statuses: BTreeSet<String>,
    pub not_started_statuses: BTreeSet<String>,
    pub approval_done_statuses: BTreeSet<String>,
}

fn set(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            done_statuses: set(&[
                "done",
                "closed",
                "resolved",
                "complete",
                "completed",
                "approved",
                "cancelled",
            ]),
            not_started_statuses: set(&["to do", "todo", "open", "backlog", "new", "not started"]),
            approval_done_statuses: set(&[
                "approved",
                "done",
                "closed",
                "resolved",
                "complete",
                "completed",
                "accepted",
            ]),
        }
    }
}

/// Malformed status configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{location}: invalid status config: {message}")]
pub struct StatusConfigError {
    pub location: String,
    pub message: String,
}

impl StatusConfigError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::StatusConfigParseError
    }
}

impl StatusConfig {
    /// Parse a JSON override object and merge it over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`StatusConfigError`] if the text is not a JSON object of
    /// string arrays.
    pub fn from_json(location: &str, text: &str) -> Result<Self, StatusConfigError> {
        let parsed: Self = serde_json::from_str(text).map_err(|err| StatusConfigError {
            location: location.to_string(),
            message: err.to_string(),
        })?;
        Ok(parsed.normalized())
    }

    /// Load from a path or URL; an unreachable resource falls back to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`StatusConfigError`] when the resource was read but is malformed.
    pub fn load<T: Transport + ?Sized>(
        transport: &T,
        location: Option<&str>,
    ) -> Result<Self, StatusConfigError> {
        let Some(location) = location.map(str::trim).filter(|l| !l.is_empty()) else {
            return Ok(Self::default());
        };
        match read_text(transport, location) {
            Ok(text) => {
                debug!(location, "loaded status config");
                Self::from_json(location, &text)
            }
            Err(err) => {
                warn!(error = %err, "status config unavailable; using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Trim and lowercase every entry.
    #[must_use]
    pub fn normalized(self) -> Self {
        let norm = |values: BTreeSet<String>| -> BTreeSet<String> {
            values
                .into_iter()
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty())
                .collect()
        };
        Self {
            done_statuses: norm(self.done_statuses),
            not_started_statuses: norm(self.not_started_statuses),
            approval_done_statuses: norm(self.approval_done_statuses),
        }
    }

    #[must_use]
    pub fn classify(&self, status: &str) -> StatusClass {
        let key = status.trim().to_lowercase();
        if self.done_statuses.contains(&key) {
            StatusClass::Done
        } else if self.not_started_statuses.contains(&key) {
            StatusClass::NotStarted
        } else {
            StatusClass::InProgress
        }
    }

    /// Done-ness under the approval-specific set.
    #[must_use]
    pub fn is_approval_done(&self, status: &str) -> bool {
        self.approval_done_statuses
            .contains(&status.trim().to_lowercase())
    }
}

/// True if the subtask is an approval by type or explicit flag.
#[must_use]
pub fn is_approval(subtask: &Subtask) -> bool {
    if subtask.is_approval == Some(true) {
        return true;
    }
    let kind = subtask.kind.trim();
    APPROVAL_TYPES
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(kind))
}

/// The `Tag` of a `[Tag] - ...` summary prefix.
#[must_use]
pub fn phase_tag(summary: &str) -> Option<&str> {
    PHASE_TAG_RE
        .captures(summary)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// True when the subtask's summary is tagged with an alias of `phase`.
#[must_use]
pub fn belongs_to_phase(subtask: &Subtask, phase: Phase) -> bool {
    phase_tag(&subtask.summary).is_some_and(|tag| phase.matches_tag(tag))
}

/// Done / in-progress / total tallies for one group of subtasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TaskCounts {
    pub done: usize,
    pub in_progress: usize,
    pub total: usize,
}

impl TaskCounts {
    fn record(&mut self, class: StatusClass) {
        self.total += 1;
        match class {
            StatusClass::Done => self.done += 1,
            StatusClass::InProgress => self.in_progress += 1,
            StatusClass::NotStarted => {}
        }
    }

    /// Whole-number completion percentage; zero when there is nothing to do.
    #[must_use]
    pub fn percent(&self) -> usize {
        if self.total == 0 {
            0
        } else {
            self.done * 100 / self.total
        }
    }
}

/// Completion of an issue within its current phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueProgress {
    pub tasks: TaskCounts,
    pub approvals: TaskCounts,
    /// Key of the first approval not yet done, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_approval: Option<String>,
}

/// Subtasks counted toward the issue's current phase.
pub fn phase_subtasks(issue: &Issue, all_subtasks: bool) -> impl Iterator<Item = &Subtask> {
    issue
        .subtasks
        .iter()
        .filter(move |s| all_subtasks || belongs_to_phase(s, issue.phase))
}

/// Tally plain tasks and approvals over the issue's current-phase subtasks.
#[must_use]
pub fn issue_progress(issue: &Issue, config: &StatusConfig, all_subtasks: bool) -> IssueProgress {
    let mut tasks = TaskCounts::default();
    let mut approvals = TaskCounts::default();
    for subtask in phase_subtasks(issue, all_subtasks) {
        let class = config.classify(&subtask.status);
        if is_approval(subtask) {
            approvals.record(class);
        } else {
            tasks.record(class);
        }
    }
    IssueProgress {
        tasks,
        approvals,
        next_approval: next_approval(issue, config, all_subtasks).map(|s| s.key.clone()),
    }
}

/// First approval (in list order) not done under the approval done-set.
#[must_use]
pub fn next_approval<'a>(
    issue: &'a Issue,
    config: &StatusConfig,
    all_subtasks: bool,
) -> Option<&'a Subtask> {
    phase_subtasks(issue, all_subtasks)
        .find(|s| is_approval(s) && !config.is_approval_done(&s.status))
}
