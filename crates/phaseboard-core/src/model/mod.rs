//! Snapshot data model.
//!
//! The public types here are the normalized, immutable form of one roll-up
//! document. Deserialization goes through the lenient [`wire`] structs so that
//! nulls, Jira option objects, and legacy one-line issue entries all land in
//! the same shape.

mod classify;
mod phase;
pub(crate) mod wire;

pub use classify::{IsaFilter, Track, UnknownClassification};
pub use phase::{Phase, UnknownPhase};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// One complete roll-up document as currently displayed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Raw scalar; only required to be present and non-null.
    pub schema_version: serde_yaml::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    /// Declared per-phase counts, keyed as written by the producer.
    pub counts: BTreeMap<String, u64>,
    /// Issues bucketed by phase, iterated in enumeration order.
    pub phases: BTreeMap<Phase, Vec<Issue>>,
}

impl Snapshot {
    /// Issues of one phase, empty when the phase is absent.
    #[must_use]
    pub fn issues(&self, phase: Phase) -> &[Issue] {
        self.phases.get(&phase).map_or(&[], Vec::as_slice)
    }

    /// All issues across phases, in enumeration order.
    pub fn all_issues(&self) -> impl Iterator<Item = &Issue> {
        self.phases.values().flatten()
    }

    /// Total number of issues across all phases.
    #[must_use]
    pub fn issue_count(&self) -> usize {
        self.phases.values().map(Vec::len).sum()
    }

    /// Find an issue by key (case-insensitive).
    #[must_use]
    pub fn find_issue(&self, key: &str) -> Option<&Issue> {
        let key = key.trim();
        self.all_issues()
            .find(|issue| issue.key.eq_ignore_ascii_case(key))
    }

    /// Declared count for a phase, if the producer wrote one.
    ///
    /// Keys that fold into the same phase (every unknown name lands in
    /// `Other`) are summed.
    #[must_use]
    pub fn declared_count(&self, phase: Phase) -> Option<u64> {
        self.counts
            .iter()
            .filter(|(name, _)| Phase::from_name_lossy(name) == phase)
            .map(|(_, count)| *count)
            .reduce(u64::saturating_add)
    }

    /// `generated_at` parsed as RFC 3339, when it is one.
    #[must_use]
    pub fn generated_at_utc(&self) -> Option<DateTime<Utc>> {
        self.generated_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw.trim()).ok())
            .map(|ts| ts.with_timezone(&Utc))
    }
}

/// Completion block as emitted by the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Progress {
    pub done: u64,
    pub total: u64,
    pub pct: u64,
}

/// A top-level tracked issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub key: String,
    pub summary: String,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_in_phase: Option<u32>,
    /// The `value` of the ISA/NON-ISA select field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isa_or_non_isa: Option<String>,
    /// The `value` of the fast-track select field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_fast_track: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
    pub subtasks: Vec<Subtask>,
    pub linked_issues: Vec<LinkedIssue>,
}

impl Issue {
    /// Uppercased, trimmed ISA classification; empty when unset.
    #[must_use]
    pub fn isa_value(&self) -> String {
        self.isa_or_non_isa
            .as_deref()
            .map(|v| v.trim().to_uppercase())
            .unwrap_or_default()
    }

    /// Processing lane, or `None` when the field is neither yes nor no.
    #[must_use]
    pub fn track(&self) -> Option<Track> {
        self.is_fast_track.as_deref().and_then(Track::from_flag)
    }

    /// Linked issues worth surfacing in the dashboard.
    pub fn surfaced_links(&self) -> impl Iterator<Item = &LinkedIssue> {
        self.linked_issues.iter().filter(|link| link.is_surfaced())
    }
}

/// A unit of work or sign-off beneath an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subtask {
    pub key: String,
    pub summary: String,
    pub status: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_approval: Option<bool>,
}

/// A tracker link from an issue to another issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedIssue {
    pub key: String,
    pub summary: String,
    pub relationship: String,
    pub direction: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Relationships shown in issue detail; everything else is kept but hidden.
pub const SURFACED_RELATIONSHIPS: [&str; 2] = ["is developed by", "is governed by"];

impl LinkedIssue {
    #[must_use]
    pub fn is_surfaced(&self) -> bool {
        let rel = self.relationship.trim();
        SURFACED_RELATIONSHIPS
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(rel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(key: &str, isa: Option<&str>, fast: Option<&str>) -> Issue {
        Issue {
            key: key.into(),
            summary: String::new(),
            phase: Phase::Development,
            days_in_phase: None,
            isa_or_non_isa: isa.map(str::to_string),
            is_fast_track: fast.map(str::to_string),
            github: None,
            progress: None,
            subtasks: vec![],
            linked_issues: vec![],
        }
    }

    #[test]
    fn isa_value_is_trimmed_and_uppercased() {
        assert_eq!(issue("A-1", Some(" isa "), None).isa_value(), "ISA");
        assert_eq!(issue("A-1", Some("Non-ISA"), None).isa_value(), "NON-ISA");
        assert_eq!(issue("A-1", None, None).isa_value(), "");
    }

    #[test]
    fn track_classification() {
        assert_eq!(issue("A-1", None, Some("Yes")).track(), Some(Track::FastTrack));
        assert_eq!(issue("A-1", None, Some(" no ")).track(), Some(Track::Regular));
        assert_eq!(issue("A-1", None, Some("maybe")).track(), None);
        assert_eq!(issue("A-1", None, None).track(), None);
    }

    #[test]
    fn only_development_and_governance_links_are_surfaced() {
        let link = |rel: &str| LinkedIssue {
            key: "X-1".into(),
            summary: String::new(),
            relationship: rel.into(),
            direction: "inward".into(),
            url: None,
        };
        assert!(link("is developed by").is_surfaced());
        assert!(link("Is Governed By").is_surfaced());
        assert!(!link("relates to").is_surfaced());
    }

    #[test]
    fn generated_at_parses_rfc3339() {
        let snapshot = Snapshot {
            schema_version: serde_yaml::Value::from(1),
            project: None,
            generated_at: Some("2025-10-28T23:37:03Z".into()),
            counts: BTreeMap::new(),
            phases: BTreeMap::new(),
        };
        let ts = snapshot.generated_at_utc().expect("timestamp");
        assert_eq!(ts.to_rfc3339(), "2025-10-28T23:37:03+00:00");
    }

    #[test]
    fn declared_count_sums_keys_folded_into_other() {
        let counts = [("Planning", 2), ("Mystery", 3), ("Legacy Bucket", 4)]
            .into_iter()
            .map(|(name, n)| (name.to_string(), n))
            .collect();
        let snapshot = Snapshot {
            schema_version: serde_yaml::Value::from(1),
            project: None,
            generated_at: None,
            counts,
            phases: BTreeMap::new(),
        };
        assert_eq!(snapshot.declared_count(Phase::Planning), Some(2));
        assert_eq!(snapshot.declared_count(Phase::Other), Some(7));
        assert_eq!(snapshot.declared_count(Phase::Freeze), None);
    }
}
