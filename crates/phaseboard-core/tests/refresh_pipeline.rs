//! End-to-end refresh tests over real files.
//!
//! These wire the file-backed fetcher into the reconciler and exercise:
//! - fallback from a missing override to the local path
//! - keeping the last good snapshot when the source turns bad
//! - raising the update notice only when the fingerprint moves

use chrono::{DateTime, TimeDelta, Utc};
use phaseboard_core::fetch::{FileTransport, Fetcher};
use phaseboard_core::refresh::{Clock, CycleOutcome, LoadStatus, Reconciler, RefreshTiming};
use phaseboard_core::{Phase, RefreshError};
use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;
use tempfile::TempDir;

#[derive(Clone)]
struct TestClock(Rc<Cell<DateTime<Utc>>>);

impl TestClock {
    fn new() -> Self {
        Self(Rc::new(Cell::new(
            DateTime::parse_from_rfc3339("2025-10-28T00:00:00Z")
                .expect("t0")
                .with_timezone(&Utc),
        )))
    }

    fn advance_secs(&self, secs: i64) {
        self.0.set(self.0.get() + TimeDelta::seconds(secs));
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        self.0.get()
    }
}

fn rollup(generated_at: &str, summary: &str) -> String {
    format!(
        "schema_version: 1\nproject: RVS\ngenerated_at: '{generated_at}'\ncounts:\n  Development: 1\nphases:\n  Development:\n    - key: RVS-1\n      summary: {summary}\n      isa_or_non_isa: {{value: ISA}}\n      is_fast_track: {{value: 'No'}}\n      subtasks: []\n      linked_issues: []\n"
    )
}

fn write(path: &Path, body: &str) {
    std::fs::write(path, body).expect("write rollup");
}

fn setup() -> (TempDir, Reconciler<Fetcher<FileTransport>, TestClock>, TestClock) {
    let dir = TempDir::new().expect("tempdir");
    let local = dir.path().join("rollup.yaml");
    write(&local, &rollup("2025-10-28T00:00:00Z", "UART profile"));

    let missing = dir.path().join("override.yaml");
    let fetcher = Fetcher::new(
        FileTransport,
        [missing.display().to_string(), local.display().to_string()],
    );
    let clock = TestClock::new();
    let reconciler = Reconciler::new(fetcher, clock.clone(), RefreshTiming::default());
    (dir, reconciler, clock)
}

#[test]
fn missing_override_falls_back_to_local_file() {
    let (dir, mut rec, _) = setup();
    let outcome = rec.poll().expect("due at startup");
    let CycleOutcome::Refreshed { source, changed } = outcome else {
        panic!("expected refresh, got {outcome:?}");
    };
    assert!(source.ends_with("rollup.yaml"));
    assert!(!changed);
    assert_eq!(rec.status(), &LoadStatus::Ready);

    let snapshot = rec.snapshot().expect("snapshot");
    assert_eq!(snapshot.issues(Phase::Development)[0].key, "RVS-1");
    drop(dir);
}

#[test]
fn corrupt_source_keeps_last_good_snapshot() {
    let (dir, mut rec, clock) = setup();
    rec.poll().expect("startup");
    let before = rec.snapshot().cloned().expect("snapshot");

    write(&dir.path().join("rollup.yaml"), "schema_version: [unclosed");
    clock.advance_secs(300);
    let outcome = rec.poll().expect("due");

    assert!(matches!(
        outcome,
        CycleOutcome::Stale(RefreshError::SourceUnavailable { attempts: 2, .. })
    ));
    assert_eq!(rec.snapshot(), Some(&before));
    assert!(matches!(rec.status(), LoadStatus::Stale { .. }));
}

#[test]
fn invalid_shape_is_reported_as_stale() {
    let (dir, mut rec, clock) = setup();
    rec.poll().expect("startup");

    write(&dir.path().join("rollup.yaml"), "counts: {}\nphases: {}\n");
    clock.advance_secs(300);
    let outcome = rec.poll().expect("due");
    let CycleOutcome::Stale(err) = outcome else {
        panic!("expected stale, got {outcome:?}");
    };
    assert!(err.to_string().contains("schema_version"));
}

#[test]
fn new_generation_raises_notice_that_expires() {
    let (dir, mut rec, clock) = setup();
    rec.poll().expect("startup");
    assert!(rec.notice().is_none());

    write(
        &dir.path().join("rollup.yaml"),
        &rollup("2025-10-28T00:05:00Z", "UART profile v2"),
    );
    clock.advance_secs(300);
    let outcome = rec.poll().expect("due");
    assert!(matches!(outcome, CycleOutcome::Refreshed { changed: true, .. }));
    assert!(rec.notice().is_some());

    clock.advance_secs(4);
    assert!(rec.poll().is_none());
    assert!(rec.notice().is_none());
}
