//! Derive filtered views of a snapshot.
//!
//! Filtering is a pure function of the snapshot and a [`FilterState`]; the
//! source snapshot is never touched.

use crate::model::{Issue, IsaFilter, Phase, Snapshot, Subtask, Track};
use serde::Serialize;

/// Active filter criteria. Absent criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterState {
    /// Free-text query, matched case-insensitively as a substring.
    pub query: String,
    pub isa: Option<IsaFilter>,
    pub track: Option<Track>,
    /// Restrict output to a single phase; other phases are emitted empty.
    pub phase: Option<Phase>,
}

/// A snapshot-shaped view holding only the retained issues.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredSnapshot {
    pub snapshot: Snapshot,
    /// Retained issues matching the query themselves plus matching subtasks
    /// of retained issues.
    pub match_count: usize,
}

impl FilteredSnapshot {
    #[must_use]
    pub fn issues(&self, phase: Phase) -> &[Issue] {
        self.snapshot.issues(phase)
    }

    /// Phases that retained at least one issue, in enumeration order.
    pub fn non_empty_phases(&self) -> impl Iterator<Item = (Phase, &[Issue])> {
        self.snapshot
            .phases
            .iter()
            .filter(|(_, issues)| !issues.is_empty())
            .map(|(phase, issues)| (*phase, issues.as_slice()))
    }
}

impl FilterState {
    /// Returns true if no filter criteria are active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.query.trim().is_empty()
            && self.isa.is_none()
            && self.track.is_none()
            && self.phase.is_none()
    }

    /// Apply this filter to a snapshot, producing a new view.
    #[must_use]
    pub fn apply(&self, snapshot: &Snapshot) -> FilteredSnapshot {
        let needle = self.query.trim().to_lowercase();
        let mut match_count = 0;

        let phases = snapshot
            .phases
            .iter()
            .map(|(phase, issues)| {
                let retained: Vec<Issue> = if self.phase.is_some_and(|only| only != *phase) {
                    Vec::new()
                } else {
                    issues
                        .iter()
                        .filter(|issue| self.matches(issue, &needle))
                        .cloned()
                        .collect()
                };
                match_count += retained
                    .iter()
                    .map(|issue| count_matches(issue, &needle))
                    .sum::<usize>();
                (*phase, retained)
            })
            .collect();

        FilteredSnapshot {
            snapshot: Snapshot {
                schema_version: snapshot.schema_version.clone(),
                project: snapshot.project.clone(),
                generated_at: snapshot.generated_at.clone(),
                counts: snapshot.counts.clone(),
                phases,
            },
            match_count,
        }
    }

    /// Returns true if the issue satisfies every active criterion.
    ///
    /// `needle` must already be trimmed and lowercased.
    fn matches(&self, issue: &Issue, needle: &str) -> bool {
        if let Some(isa) = self.isa {
            if issue.isa_value() != isa.as_str() {
                return false;
            }
        }
        if let Some(track) = self.track {
            if issue.track() != Some(track) {
                return false;
            }
        }
        needle.is_empty()
            || issue_matches(issue, needle)
            || issue.subtasks.iter().any(|s| subtask_matches(s, needle))
    }
}

/// Step an optional filter through `all`, wrapping back to `None`.
#[must_use]
pub fn cycle_option<T: Copy + PartialEq>(current: Option<T>, all: &[T]) -> Option<T> {
    match current {
        None => all.first().copied(),
        Some(value) => all
            .iter()
            .position(|candidate| *candidate == value)
            .and_then(|idx| all.get(idx + 1).copied()),
    }
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Key, summary, phase and linked-issue text of the issue itself.
#[must_use]
pub fn issue_matches(issue: &Issue, needle: &str) -> bool {
    contains(&issue.key, needle)
        || contains(&issue.summary, needle)
        || contains(issue.phase.as_str(), needle)
        || issue.linked_issues.iter().any(|link| {
            contains(&link.key, needle)
                || contains(&link.summary, needle)
                || contains(&link.relationship, needle)
                || contains(&link.direction, needle)
        })
}

#[must_use]
pub fn subtask_matches(subtask: &Subtask, needle: &str) -> bool {
    contains(&subtask.key, needle)
        || contains(&subtask.summary, needle)
        || contains(&subtask.status, needle)
        || contains(&subtask.kind, needle)
}

fn count_matches(issue: &Issue, needle: &str) -> usize {
    if needle.is_empty() {
        return 1 + issue.subtasks.len();
    }
    usize::from(issue_matches(issue, needle))
        + issue
            .subtasks
            .iter()
            .filter(|s| subtask_matches(s, needle))
            .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sub(key: &str, summary: &str) -> Subtask {
        Subtask {
            key: key.into(),
            summary: summary.into(),
            status: "To Do".into(),
            kind: "Sub-task".into(),
            is_approval: None,
        }
    }

    fn issue(key: &str, summary: &str, isa: &str, fast: &str, subtasks: Vec<Subtask>) -> Issue {
        Issue {
            key: key.into(),
            summary: summary.into(),
            phase: Phase::Development,
            days_in_phase: None,
            isa_or_non_isa: Some(isa.into()),
            is_fast_track: Some(fast.into()),
            github: None,
            progress: None,
            subtasks,
            linked_issues: vec![],
        }
    }

    fn snapshot() -> Snapshot {
        let mut planning = issue("RVS-2", "Vector crypto", "NON-ISA", "Yes", vec![]);
        planning.phase = Phase::Planning;
        Snapshot {
            schema_version: serde_yaml::Value::from(1),
            project: Some("RVS".into()),
            generated_at: None,
            counts: BTreeMap::new(),
            phases: BTreeMap::from([
                (Phase::Planning, vec![planning]),
                (
                    Phase::Development,
                    vec![
                        issue(
                            "RVS-1",
                            "Server platform",
                            "ISA",
                            "No",
                            vec![sub("RVS-10", "[Dev] - UART driver"), sub("RVS-11", "Docs")],
                        ),
                        issue("RVS-3", "UART profile", "isa", "", vec![]),
                    ],
                ),
            ]),
        }
    }

    #[test]
    fn empty_filter_is_identity() {
        let snap = snapshot();
        let view = FilterState::default().apply(&snap);
        assert_eq!(view.snapshot, snap);
        assert_eq!(view.match_count, 3 + 2);
    }

    #[test]
    fn uart_matches_issue_summary_and_subtask() {
        let snap = snapshot();
        let view = FilterState {
            query: "uart".into(),
            ..FilterState::default()
        }
        .apply(&snap);

        let keys: Vec<&str> = view
            .issues(Phase::Development)
            .iter()
            .map(|i| i.key.as_str())
            .collect();
        assert_eq!(keys, ["RVS-1", "RVS-3"]);
        assert!(view.issues(Phase::Planning).is_empty());
        // RVS-10 subtask plus RVS-3 itself
        assert_eq!(view.match_count, 2);
    }

    #[test]
    fn query_matches_phase_name() {
        let view = FilterState {
            query: "  PLANNING ".into(),
            ..FilterState::default()
        }
        .apply(&snapshot());
        assert_eq!(view.issues(Phase::Planning).len(), 1);
        assert!(view.issues(Phase::Development).is_empty());
    }

    #[test]
    fn isa_filter_uses_uppercased_value() {
        let view = FilterState {
            isa: Some(IsaFilter::Isa),
            ..FilterState::default()
        }
        .apply(&snapshot());
        assert_eq!(view.issues(Phase::Development).len(), 2);
        assert!(view.issues(Phase::Planning).is_empty());
    }

    #[test]
    fn unclassified_track_never_matches_active_filter() {
        let view = FilterState {
            track: Some(Track::Regular),
            ..FilterState::default()
        }
        .apply(&snapshot());
        let keys: Vec<&str> = view
            .issues(Phase::Development)
            .iter()
            .map(|i| i.key.as_str())
            .collect();
        assert_eq!(keys, ["RVS-1"]);
    }

    #[test]
    fn phase_filter_empties_other_phases() {
        let snap = snapshot();
        let view = FilterState {
            phase: Some(Phase::Planning),
            ..FilterState::default()
        }
        .apply(&snap);
        assert_eq!(view.issues(Phase::Planning).len(), 1);
        assert!(view.issues(Phase::Development).is_empty());
        assert!(view.snapshot.phases.contains_key(&Phase::Development));
        assert_eq!(view.non_empty_phases().count(), 1);
    }

    #[test]
    fn linked_issue_text_is_searched() {
        let mut snap = snapshot();
        if let Some(issues) = snap.phases.get_mut(&Phase::Planning) {
            issues[0].linked_issues.push(crate::model::LinkedIssue {
                key: "RVG-4".into(),
                summary: "Governance".into(),
                relationship: "is governed by".into(),
                direction: "inward".into(),
                url: None,
            });
        }
        let view = FilterState {
            query: "rvg-4".into(),
            ..FilterState::default()
        }
        .apply(&snap);
        assert_eq!(view.issues(Phase::Planning).len(), 1);
    }

    #[test]
    fn cycle_option_wraps_to_none() {
        let all = IsaFilter::ALL;
        assert_eq!(cycle_option(None, &all), Some(IsaFilter::Isa));
        assert_eq!(cycle_option(Some(IsaFilter::Isa), &all), Some(IsaFilter::NonIsa));
        assert_eq!(cycle_option(Some(IsaFilter::NonIsa), &all), None);
    }

    #[test]
    fn is_empty_ignores_blank_query() {
        let state = FilterState {
            query: "   ".into(),
            ..FilterState::default()
        };
        assert!(state.is_empty());
    }
}
