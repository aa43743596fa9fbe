//! Lenient on-disk shapes for the roll-up document.
//!
//! The producer writes `null` for absent strings, Jira option objects
//! (`{value: ISA, id: ...}`) for select fields, and, in legacy mode, one-line
//! strings instead of issue objects. Everything is normalized here before it
//! reaches the public model.

use super::{Issue, LinkedIssue, Phase, Progress, Snapshot, Subtask};
use serde::{Deserialize, Deserializer};
use serde_yaml::Value;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
pub(crate) struct WireSnapshot {
    schema_version: Value,
    #[serde(default, deserialize_with = "scalar_text")]
    project: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    generated_at: Option<String>,
    counts: BTreeMap<String, u64>,
    phases: BTreeMap<String, Option<Vec<WireIssue>>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireIssue {
    Structured(Box<WireIssueFields>),
    Legacy(String),
}

#[derive(Debug, Deserialize)]
struct WireIssueFields {
    #[serde(deserialize_with = "text")]
    key: String,
    #[serde(default, deserialize_with = "text")]
    summary: String,
    #[serde(default, deserialize_with = "scalar_text")]
    phase: Option<String>,
    #[serde(default)]
    days_in_phase: Option<u32>,
    #[serde(default, deserialize_with = "select_value")]
    isa_or_non_isa: Option<String>,
    #[serde(default, deserialize_with = "select_value")]
    is_fast_track: Option<String>,
    #[serde(default, deserialize_with = "scalar_text")]
    github: Option<String>,
    #[serde(default)]
    progress: Option<WireProgress>,
    #[serde(default, deserialize_with = "list_or_null")]
    subtasks: Vec<WireSubtask>,
    #[serde(default, deserialize_with = "list_or_null")]
    linked_issues: Vec<WireLink>,
}

#[derive(Debug, Deserialize)]
struct WireProgress {
    #[serde(default)]
    done: u64,
    #[serde(default)]
    total: u64,
    #[serde(default)]
    pct: u64,
}

#[derive(Debug, Deserialize)]
struct WireSubtask {
    #[serde(deserialize_with = "text")]
    key: String,
    #[serde(default, deserialize_with = "text")]
    summary: String,
    #[serde(default, deserialize_with = "text")]
    status: String,
    #[serde(rename = "type", default, deserialize_with = "text")]
    kind: String,
    #[serde(default)]
    is_approval: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct WireLink {
    #[serde(deserialize_with = "text")]
    key: String,
    #[serde(default, deserialize_with = "text")]
    summary: String,
    #[serde(default, deserialize_with = "text")]
    relationship: String,
    #[serde(default, deserialize_with = "text")]
    direction: String,
    #[serde(default, deserialize_with = "scalar_text")]
    url: Option<String>,
}

impl WireSnapshot {
    pub(crate) fn into_snapshot(self) -> Snapshot {
        let mut phases: BTreeMap<Phase, Vec<Issue>> = BTreeMap::new();
        for (name, entries) in self.phases {
            let bucket = Phase::from_name_lossy(&name);
            let list = phases.entry(bucket).or_default();
            list.extend(
                entries
                    .unwrap_or_default()
                    .into_iter()
                    .map(|entry| entry.into_issue(bucket)),
            );
        }

        Snapshot {
            schema_version: self.schema_version,
            project: non_blank(self.project),
            generated_at: non_blank(self.generated_at),
            counts: self.counts,
            phases,
        }
    }
}

impl WireIssue {
    fn into_issue(self, bucket: Phase) -> Issue {
        match self {
            Self::Structured(fields) => fields.into_issue(bucket),
            Self::Legacy(line) => legacy_issue(&line, bucket),
        }
    }
}

impl WireIssueFields {
    fn into_issue(self, bucket: Phase) -> Issue {
        let phase = self
            .phase
            .as_deref()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(bucket);

        Issue {
            key: self.key,
            summary: self.summary,
            phase,
            days_in_phase: self.days_in_phase,
            isa_or_non_isa: non_blank(self.isa_or_non_isa),
            is_fast_track: non_blank(self.is_fast_track),
            github: non_blank(self.github),
            progress: self.progress.map(|p| Progress {
                done: p.done,
                total: p.total,
                pct: p.pct,
            }),
            subtasks: self
                .subtasks
                .into_iter()
                .map(|s| Subtask {
                    key: s.key,
                    summary: s.summary,
                    status: s.status,
                    kind: s.kind,
                    is_approval: s.is_approval,
                })
                .collect(),
            linked_issues: self
                .linked_issues
                .into_iter()
                .map(|l| LinkedIssue {
                    key: l.key,
                    summary: l.summary,
                    relationship: l.relationship,
                    direction: l.direction,
                    url: non_blank(l.url),
                })
                .collect(),
        }
    }
}

/// Legacy entries look like `SPEC-1 — Summary [1/4 (25% done) - 3d in Planning] → subtasks: ...`.
fn legacy_issue(line: &str, bucket: Phase) -> Issue {
    let line = line.trim();
    let line = line.split(" → ").next().unwrap_or(line);
    let (key, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let summary = rest.trim().trim_start_matches('—').trim();

    Issue {
        key: key.to_string(),
        summary: summary.to_string(),
        phase: bucket,
        days_in_phase: None,
        isa_or_non_isa: None,
        is_fast_track: None,
        github: None,
        progress: None,
        subtasks: Vec::new(),
        linked_issues: Vec::new(),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

fn scalar_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(scalar_to_string))
}

fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text(deserializer)?.unwrap_or_default())
}

/// Accepts `{value: X, ...}`, a bare scalar, or a list of either.
fn select_value<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    fn extract(value: &Value) -> Option<String> {
        match value {
            Value::Mapping(map) => map.get("value").and_then(scalar_to_string),
            Value::Sequence(items) => {
                let parts: Vec<String> = items.iter().filter_map(extract).collect();
                (!parts.is_empty()).then(|| parts.join(", "))
            }
            other => scalar_to_string(other),
        }
    }

    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(extract))
}

fn list_or_null<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Snapshot {
        let wire: WireSnapshot = serde_yaml::from_str(yaml).expect("wire parse");
        wire.into_snapshot()
    }

    #[test]
    fn structured_issue_with_jira_option_fields() {
        let snapshot = parse(
            r"
schema_version: 1
project: RVS
generated_at: '2025-10-28T23:37:03Z'
counts: {Development: 1}
phases:
  Development:
    - key: RVS-1
      summary: UART profile
      phase: Development
      isa_or_non_isa: {value: ISA, id: '10042'}
      is_fast_track: {value: 'Yes'}
      github: https://github.com/riscv/uart
      days_in_phase: 12
      progress: {done: 1, total: 2, pct: 50}
      subtasks:
        - key: RVS-2
          status: Done
          summary: '[Dev] - Write spec'
          type: Sub-task
          is_approval: false
      linked_issues:
        - key: RVG-9
          summary: null
          relationship: is governed by
          direction: inward
",
        );

        let issues = snapshot.issues(Phase::Development);
        assert_eq!(issues.len(), 1);
        let issue = &issues[0];
        assert_eq!(issue.key, "RVS-1");
        assert_eq!(issue.isa_or_non_isa.as_deref(), Some("ISA"));
        assert_eq!(issue.is_fast_track.as_deref(), Some("Yes"));
        assert_eq!(issue.days_in_phase, Some(12));
        assert_eq!(issue.progress.map(|p| p.pct), Some(50));
        assert_eq!(issue.subtasks[0].kind, "Sub-task");
        assert_eq!(issue.linked_issues[0].summary, "");
        assert_eq!(snapshot.project.as_deref(), Some("RVS"));
    }

    #[test]
    fn nulls_become_empty_values() {
        let snapshot = parse(
            r"
schema_version: 1
counts: {}
phases:
  Planning:
    - key: RVS-3
      summary: null
      isa_or_non_isa: null
      github: ''
      subtasks: null
  Freeze: null
",
        );
        let issue = &snapshot.issues(Phase::Planning)[0];
        assert_eq!(issue.summary, "");
        assert!(issue.isa_or_non_isa.is_none());
        assert!(issue.github.is_none());
        assert!(issue.subtasks.is_empty());
        assert!(snapshot.issues(Phase::Freeze).is_empty());
        assert_eq!(issue.phase, Phase::Planning);
    }

    #[test]
    fn legacy_string_entries_are_accepted() {
        let snapshot = parse(
            "
schema_version: 1
counts: {Planning: 1}
phases:
  Planning:
    - 'RVS-7 — Vector crypto [1/4 (25% done) - 3d in Planning] → subtasks: RVS-8(Done)'
",
        );
        let issue = &snapshot.issues(Phase::Planning)[0];
        assert_eq!(issue.key, "RVS-7");
        assert_eq!(issue.summary, "Vector crypto [1/4 (25% done) - 3d in Planning]");
    }

    #[test]
    fn unknown_phase_keys_fold_into_other() {
        let snapshot = parse(
            "
schema_version: 1
counts: {}
phases:
  Triage:
    - key: RVS-10
",
        );
        let issue = &snapshot.issues(Phase::Other)[0];
        assert_eq!(issue.key, "RVS-10");
        assert_eq!(issue.phase, Phase::Other);
    }

    #[test]
    fn bare_string_select_fields_are_accepted() {
        let snapshot = parse(
            "
schema_version: 1
counts: {}
phases:
  Freeze:
    - key: RVS-11
      isa_or_non_isa: NON-ISA
      is_fast_track: 'No'
",
        );
        let issue = &snapshot.issues(Phase::Freeze)[0];
        assert_eq!(issue.isa_value(), "NON-ISA");
        assert_eq!(issue.track(), Some(super::super::Track::Regular));
    }
}
