use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use phaseboard_core::filter::FilterState;
use phaseboard_core::model::{Issue, Phase, Snapshot, Subtask};
use phaseboard_core::status::{StatusConfig, issue_progress};
use phaseboard_core::{IsaFilter, Track};
use std::collections::BTreeMap;

const TIERS: [(&str, usize); 3] = [("small", 50), ("medium", 500), ("large", 5_000)];

fn synthetic_snapshot(issue_count: usize) -> Snapshot {
    let mut phases: BTreeMap<Phase, Vec<Issue>> = BTreeMap::new();
    for n in 0..issue_count {
        let phase = Phase::ALL[n % Phase::ALL.len()];
        let subtasks = (0..6)
            .map(|s| Subtask {
                key: format!("RVS-{n}-{s}"),
                summary: format!("[{}] - Task {s} for item {n}", phase.aliases()[0]),
                status: ["Done", "To Do", "In Review"][s % 3].to_string(),
                kind: if s == 5 { "Approval" } else { "Sub-task" }.to_string(),
                is_approval: None,
            })
            .collect();
        phases.entry(phase).or_default().push(Issue {
            key: format!("RVS-{n}"),
            summary: format!("Extension {n} {}", if n % 7 == 0 { "uart" } else { "vector" }),
            phase,
            days_in_phase: Some(u32::try_from(n % 90).unwrap_or(0)),
            isa_or_non_isa: Some(if n % 2 == 0 { "ISA" } else { "NON-ISA" }.to_string()),
            is_fast_track: Some(if n % 3 == 0 { "Yes" } else { "No" }.to_string()),
            github: None,
            progress: None,
            subtasks,
            linked_issues: Vec::new(),
        });
    }
    Snapshot {
        schema_version: serde_yaml::Value::from(1),
        project: Some("RVS".to_string()),
        generated_at: None,
        counts: BTreeMap::new(),
        phases,
    }
}

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter.apply");

    for (name, size) in TIERS {
        let snapshot = synthetic_snapshot(size);
        group.throughput(Throughput::Elements(size as u64));

        let query_only = FilterState {
            query: "uart".to_string(),
            ..FilterState::default()
        };
        group.bench_with_input(BenchmarkId::new("query", name), &snapshot, |b, snap| {
            b.iter(|| black_box(query_only.apply(snap)));
        });

        let combined = FilterState {
            query: "task 3".to_string(),
            isa: Some(IsaFilter::Isa),
            track: Some(Track::Regular),
            phase: None,
        };
        group.bench_with_input(BenchmarkId::new("combined", name), &snapshot, |b, snap| {
            b.iter(|| black_box(combined.apply(snap)));
        });
    }
    group.finish();

    let config = StatusConfig::default();
    let snapshot = synthetic_snapshot(5_000);
    c.bench_function("status.issue_progress/large", |b| {
        b.iter(|| {
            for issue in snapshot.all_issues() {
                black_box(issue_progress(issue, &config, false));
            }
        });
    });
}

criterion_group!(benches, bench_filter);
criterion_main!(benches);
