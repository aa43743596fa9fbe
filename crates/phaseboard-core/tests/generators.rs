#![allow(dead_code)]

use phaseboard_core::model::{Issue, LinkedIssue, Phase, Snapshot, Subtask};
use proptest::prelude::*;
use std::collections::BTreeMap;

pub fn arb_phase() -> impl Strategy<Value = Phase> + Clone {
    prop::sample::select(Phase::ALL.to_vec())
}

fn arb_word() -> impl Strategy<Value = String> + Clone {
    prop::sample::select(vec![
        "uart", "vector", "crypto", "profile", "server", "Done", "To Do", "Blocked", "ISA",
        "dev", "plan", "",
    ])
    .prop_map(str::to_string)
}

fn arb_text() -> impl Strategy<Value = String> + Clone {
    prop::collection::vec(arb_word(), 0..4).prop_map(|words| words.join(" "))
}

pub fn arb_subtask() -> impl Strategy<Value = Subtask> + Clone {
    (0u32..500, arb_text(), arb_word(), arb_word(), any::<Option<bool>>()).prop_map(
        |(n, summary, status, kind, is_approval)| Subtask {
            key: format!("SUB-{n}"),
            summary,
            status,
            kind,
            is_approval,
        },
    )
}

pub fn arb_link() -> impl Strategy<Value = LinkedIssue> + Clone {
    (0u32..500, arb_text()).prop_map(|(n, summary)| LinkedIssue {
        key: format!("LNK-{n}"),
        summary,
        relationship: "is developed by".to_string(),
        direction: "inward".to_string(),
        url: None,
    })
}

pub fn arb_issue(phase: Phase) -> impl Strategy<Value = Issue> + Clone {
    (
        0u32..1000,
        arb_text(),
        prop::option::of(prop::sample::select(vec!["ISA", "NON-ISA", " isa ", "other"])),
        prop::option::of(prop::sample::select(vec!["Yes", "No", "yes", "maybe"])),
        prop::collection::vec(arb_subtask(), 0..4),
        prop::collection::vec(arb_link(), 0..2),
    )
        .prop_map(move |(n, summary, isa, fast, subtasks, linked_issues)| Issue {
            key: format!("RVS-{n}"),
            summary,
            phase,
            days_in_phase: None,
            isa_or_non_isa: isa.map(str::to_string),
            is_fast_track: fast.map(str::to_string),
            github: None,
            progress: None,
            subtasks,
            linked_issues,
        })
}

pub fn arb_snapshot() -> impl Strategy<Value = Snapshot> {
    prop::collection::btree_set(arb_phase(), 0..5)
        .prop_flat_map(|phases| {
            phases
                .into_iter()
                .map(|phase| {
                    prop::collection::vec(arb_issue(phase), 0..6).prop_map(move |issues| (phase, issues))
                })
                .collect::<Vec<_>>()
        })
        .prop_map(|entries| Snapshot {
            schema_version: serde_yaml::Value::from(1),
            project: Some("RVS".to_string()),
            generated_at: None,
            counts: entries
                .iter()
                .map(|(phase, issues)| (phase.to_string(), issues.len() as u64))
                .collect(),
            phases: entries.into_iter().collect::<BTreeMap<_, _>>(),
        })
}

pub fn arb_query() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), arb_word(), arb_text()]
}
