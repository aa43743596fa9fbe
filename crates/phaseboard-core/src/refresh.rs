//! Refresh cycle state machine.
//!
//! A [`Reconciler`] owns the displayed snapshot and moves between
//! [`CycleState::Idle`] and [`CycleState::Refreshing`]. Loading and time are
//! injected through [`SnapshotLoader`] and [`Clock`], so every transition can
//! be driven deterministically in tests.
//!
//! Scheduling is fixed-interval from cycle *start*: a cycle that overruns the
//! interval makes the next one due immediately, and missed ticks are never
//! queued.

use crate::error::{ErrorCode, RefreshError};
use crate::model::Snapshot;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Source of wall-clock time.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A successfully loaded and validated snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded {
    pub source: String,
    pub snapshot: Snapshot,
}

/// Produces snapshots for the reconciler; one call is one fetch+validate.
pub trait SnapshotLoader {
    /// # Errors
    ///
    /// Returns the cycle's [`RefreshError`] when no valid snapshot was loaded.
    fn load(&mut self) -> Result<Loaded, RefreshError>;
}

impl<L: SnapshotLoader + ?Sized> SnapshotLoader for Box<L> {
    fn load(&mut self) -> Result<Loaded, RefreshError> {
        (**self).load()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Refreshing,
}

/// Cadence of the refresh cycle and lifetime of the update notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTiming {
    pub interval: Duration,
    pub notice: Duration,
}

impl Default for RefreshTiming {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            notice: Duration::from_secs(4),
        }
    }
}

/// What the presentation layer should show about the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// No cycle has completed yet.
    Loading,
    Ready,
    /// Last refresh failed; the previous snapshot is still displayed.
    Stale { message: String },
    /// No snapshot has ever loaded.
    Failed { message: String },
}

impl LoadStatus {
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Stale { message } | Self::Failed { message } => Some(message),
            Self::Loading | Self::Ready => None,
        }
    }
}

/// Transient "data updated" notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub shown_at: DateTime<Utc>,
}

/// Proof that a cycle was started; consumed by [`Reconciler::complete`].
#[derive(Debug)]
#[must_use = "a started cycle must be completed"]
pub struct CycleTicket {
    started_at: DateTime<Utc>,
}

/// Returned by [`Reconciler::begin`] while a cycle is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("refresh already in flight")]
pub struct RefreshInFlight;

impl RefreshInFlight {
    #[must_use]
    pub const fn code(self) -> ErrorCode {
        ErrorCode::RefreshInFlight
    }
}

/// Result of one completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A new snapshot replaced the old one; `changed` is true when the
    /// fingerprint moved and an update notice was raised.
    Refreshed { source: String, changed: bool },
    /// Refresh failed but the previous snapshot is retained.
    Stale(RefreshError),
    /// Refresh failed and there is nothing to display.
    Failed(RefreshError),
}

/// Owns the displayed snapshot and the refresh state machine.
#[derive(Debug)]
pub struct Reconciler<L, C = SystemClock> {
    loader: L,
    clock: C,
    timing: RefreshTiming,
    state: CycleState,
    snapshot: Option<Arc<Snapshot>>,
    status: LoadStatus,
    last_error: Option<RefreshError>,
    source: Option<String>,
    fingerprint: Option<String>,
    notice: Option<Notice>,
    refreshed_at: Option<DateTime<Utc>>,
    last_started: Option<DateTime<Utc>>,
}

impl<L: SnapshotLoader, C: Clock> Reconciler<L, C> {
    pub const fn new(loader: L, clock: C, timing: RefreshTiming) -> Self {
        Self {
            loader,
            clock,
            timing,
            state: CycleState::Idle,
            snapshot: None,
            status: LoadStatus::Loading,
            last_error: None,
            source: None,
            fingerprint: None,
            notice: None,
            refreshed_at: None,
            last_started: None,
        }
    }

    /// True when idle and one interval has passed since the last cycle
    /// started (or no cycle has run yet).
    #[must_use]
    pub fn is_due(&self) -> bool {
        if self.state == CycleState::Refreshing {
            return false;
        }
        self.last_started
            .is_none_or(|started| elapsed(started, self.clock.now()) >= self.timing.interval)
    }

    /// When the next cycle becomes due, if one has run.
    #[must_use]
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        let interval = chrono::TimeDelta::from_std(self.timing.interval).ok()?;
        self.last_started.map(|started| started + interval)
    }

    /// Enter [`CycleState::Refreshing`].
    ///
    /// # Errors
    ///
    /// Returns [`RefreshInFlight`] if a cycle is already outstanding.
    pub fn begin(&mut self) -> Result<CycleTicket, RefreshInFlight> {
        if self.state == CycleState::Refreshing {
            warn!("refresh requested while a cycle is in flight; ignoring");
            return Err(RefreshInFlight);
        }
        let started_at = self.clock.now();
        self.state = CycleState::Refreshing;
        self.last_started = Some(started_at);
        Ok(CycleTicket { started_at })
    }

    /// Apply the result of a cycle and return to [`CycleState::Idle`].
    #[allow(clippy::needless_pass_by_value)]
    pub fn complete(
        &mut self,
        ticket: CycleTicket,
        result: Result<Loaded, RefreshError>,
    ) -> CycleOutcome {
        self.state = CycleState::Idle;
        let now = self.clock.now();

        match result {
            Ok(loaded) => self.accept(loaded, now, ticket.started_at),
            Err(err) => self.reject(err),
        }
    }

    /// Run one full cycle through the injected loader.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshInFlight`] if a cycle is already outstanding.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome, RefreshInFlight> {
        let ticket = self.begin()?;
        let result = self.loader.load();
        Ok(self.complete(ticket, result))
    }

    /// Timer tick: expire the notice, then run a cycle if one is due.
    pub fn poll(&mut self) -> Option<CycleOutcome> {
        self.expire_notice();
        if self.is_due() {
            self.run_cycle().ok()
        } else {
            None
        }
    }

    /// Clear the update notice once its lifetime has passed. Returns true
    /// when a notice was cleared.
    pub fn expire_notice(&mut self) -> bool {
        let now = self.clock.now();
        let expired = self
            .notice
            .as_ref()
            .is_some_and(|notice| elapsed(notice.shown_at, now) >= self.timing.notice);
        if expired {
            self.notice = None;
        }
        expired
    }

    fn accept(
        &mut self,
        loaded: Loaded,
        now: DateTime<Utc>,
        started_at: DateTime<Utc>,
    ) -> CycleOutcome {
        let fingerprint = fingerprint(&loaded.snapshot);
        let changed = self
            .fingerprint
            .as_ref()
            .is_some_and(|previous| *previous != fingerprint);

        if changed {
            let message = loaded.snapshot.generated_at.as_deref().map_or_else(
                || "Data updated".to_string(),
                |ts| format!("Data updated (generated {ts})"),
            );
            self.notice = Some(Notice {
                message,
                shown_at: now,
            });
        }

        info!(
            source = %loaded.source,
            issues = loaded.snapshot.issue_count(),
            changed,
            elapsed_ms = elapsed(started_at, now).as_millis(),
            "snapshot refreshed"
        );

        self.fingerprint = Some(fingerprint);
        self.snapshot = Some(Arc::new(loaded.snapshot));
        self.source = Some(loaded.source.clone());
        self.status = LoadStatus::Ready;
        self.last_error = None;
        self.refreshed_at = Some(now);

        CycleOutcome::Refreshed {
            source: loaded.source,
            changed,
        }
    }

    fn reject(&mut self, err: RefreshError) -> CycleOutcome {
        self.last_error = Some(err.clone());
        if self.snapshot.is_some() {
            warn!(error = %err, "refresh failed; keeping last good snapshot");
            self.status = LoadStatus::Stale {
                message: format!("Showing last good data: {err}"),
            };
            CycleOutcome::Stale(err)
        } else {
            error!(error = %err, "failed to load snapshot");
            self.status = LoadStatus::Failed {
                message: format!("Failed to load data: {err}"),
            };
            CycleOutcome::Failed(err)
        }
    }

    #[must_use]
    pub const fn state(&self) -> CycleState {
        self.state
    }

    #[must_use]
    pub const fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        self.snapshot.as_ref()
    }

    #[must_use]
    pub const fn status(&self) -> &LoadStatus {
        &self.status
    }

    #[must_use]
    pub const fn last_error(&self) -> Option<&RefreshError> {
        self.last_error.as_ref()
    }

    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    #[must_use]
    pub const fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    #[must_use]
    pub const fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    #[must_use]
    pub fn generated_at(&self) -> Option<&str> {
        self.snapshot.as_ref()?.generated_at.as_deref()
    }
}

/// Change fingerprint: `generated_at` when present, else a BLAKE3 hash of the
/// declared counts in canonical (sorted-key) JSON.
#[must_use]
pub fn fingerprint(snapshot: &Snapshot) -> String {
    if let Some(ts) = snapshot.generated_at.as_deref() {
        return format!("generated:{ts}");
    }
    let canonical = serde_json::to_string(&snapshot.counts).unwrap_or_default();
    format!("counts:{}", blake3::hash(canonical.as_bytes()).to_hex())
}

fn elapsed(from: DateTime<Utc>, to: DateTime<Utc>) -> Duration {
    (to - from).to_std().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AttemptError;
    use std::cell::Cell;
    use std::collections::{BTreeMap, VecDeque};
    use std::rc::Rc;

    #[derive(Clone)]
    struct ManualClock(Rc<Cell<DateTime<Utc>>>);

    impl ManualClock {
        fn start() -> Self {
            let t0 = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("t0")
                .with_timezone(&Utc);
            Self(Rc::new(Cell::new(t0)))
        }

        fn advance(&self, secs: i64) {
            self.0.set(self.0.get() + chrono::TimeDelta::seconds(secs));
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            self.0.get()
        }
    }

    #[derive(Default)]
    struct Script(VecDeque<Result<Loaded, RefreshError>>);

    impl SnapshotLoader for Script {
        fn load(&mut self) -> Result<Loaded, RefreshError> {
            self.0.pop_front().unwrap_or_else(|| Err(unavailable()))
        }
    }

    fn unavailable() -> RefreshError {
        RefreshError::SourceUnavailable {
            attempts: 1,
            last: Some(AttemptError::Transport {
                location: "https://a.test/r.yaml".into(),
                message: "connection reset".into(),
            }),
        }
    }

    fn snapshot(generated_at: Option<&str>, planning: u64) -> Loaded {
        Loaded {
            source: "https://a.test/r.yaml".into(),
            snapshot: Snapshot {
                schema_version: serde_yaml::Value::from(1),
                project: None,
                generated_at: generated_at.map(str::to_string),
                counts: BTreeMap::from([("Planning".to_string(), planning)]),
                phases: BTreeMap::new(),
            },
        }
    }

    fn reconciler(
        steps: Vec<Result<Loaded, RefreshError>>,
    ) -> (Reconciler<Script, ManualClock>, ManualClock) {
        let clock = ManualClock::start();
        let rec = Reconciler::new(
            Script(steps.into()),
            clock.clone(),
            RefreshTiming::default(),
        );
        (rec, clock)
    }

    #[test]
    fn first_failure_is_fatal_with_no_data() {
        let (mut rec, _) = reconciler(vec![Err(unavailable())]);
        let outcome = rec.run_cycle().expect("idle");
        assert!(matches!(outcome, CycleOutcome::Failed(_)));
        assert!(rec.snapshot().is_none());
        assert!(matches!(rec.status(), LoadStatus::Failed { .. }));
        assert_eq!(rec.state(), CycleState::Idle);
    }

    #[test]
    fn failure_keeps_last_good_snapshot() {
        let a = snapshot(Some("2025-01-01T00:00:00Z"), 1);
        let (mut rec, _) = reconciler(vec![Ok(a.clone()), Err(unavailable())]);

        rec.run_cycle().expect("idle");
        let outcome = rec.run_cycle().expect("idle");

        assert!(matches!(outcome, CycleOutcome::Stale(_)));
        assert_eq!(rec.snapshot().map(|s| s.as_ref()), Some(&a.snapshot));
        let message = rec.status().message().expect("stale message");
        assert!(message.contains("connection reset"));
        assert!(rec.last_error().is_some());
    }

    #[test]
    fn success_after_failure_clears_error() {
        let (mut rec, _) = reconciler(vec![
            Ok(snapshot(Some("t1"), 1)),
            Err(unavailable()),
            Ok(snapshot(Some("t1"), 1)),
        ]);
        for _ in 0..3 {
            rec.run_cycle().expect("idle");
        }
        assert_eq!(rec.status(), &LoadStatus::Ready);
        assert!(rec.last_error().is_none());
    }

    #[test]
    fn first_load_does_not_notify() {
        let (mut rec, _) = reconciler(vec![Ok(snapshot(Some("t1"), 1))]);
        let outcome = rec.run_cycle().expect("idle");
        assert_eq!(
            outcome,
            CycleOutcome::Refreshed {
                source: "https://a.test/r.yaml".into(),
                changed: false
            }
        );
        assert!(rec.notice().is_none());
    }

    #[test]
    fn changed_generated_at_notifies_and_notice_expires() {
        let (mut rec, clock) = reconciler(vec![
            Ok(snapshot(Some("t1"), 1)),
            Ok(snapshot(Some("t2"), 1)),
        ]);
        rec.run_cycle().expect("idle");
        rec.run_cycle().expect("idle");
        assert!(rec.notice().is_some_and(|n| n.message.contains("t2")));

        clock.advance(3);
        assert!(!rec.expire_notice());
        assert!(rec.notice().is_some());

        clock.advance(1);
        assert!(rec.expire_notice());
        assert!(rec.notice().is_none());
    }

    #[test]
    fn unchanged_fingerprint_does_not_notify() {
        let (mut rec, _) = reconciler(vec![
            Ok(snapshot(Some("t1"), 1)),
            Ok(snapshot(Some("t1"), 5)),
        ]);
        rec.run_cycle().expect("idle");
        rec.run_cycle().expect("idle");
        assert!(rec.notice().is_none());
    }

    #[test]
    fn counts_hash_is_used_without_generated_at() {
        let a = snapshot(None, 1).snapshot;
        let b = snapshot(None, 2).snapshot;
        assert_ne!(fingerprint(&a), fingerprint(&b));
        assert_eq!(fingerprint(&a), fingerprint(&a.clone()));
        assert!(fingerprint(&a).starts_with("counts:"));

        let (mut rec, _) = reconciler(vec![Ok(snapshot(None, 1)), Ok(snapshot(None, 2))]);
        rec.run_cycle().expect("idle");
        rec.run_cycle().expect("idle");
        assert!(rec.notice().is_some());
    }

    #[test]
    fn second_begin_is_refused_while_in_flight() {
        let (mut rec, _) = reconciler(vec![]);
        let ticket = rec.begin().expect("first");
        assert_eq!(rec.state(), CycleState::Refreshing);
        assert_eq!(rec.begin().expect_err("in flight"), RefreshInFlight);
        assert!(!rec.is_due());
        assert!(rec.run_cycle().is_err());

        let _ = rec.complete(ticket, Ok(snapshot(Some("t1"), 1)));
        assert_eq!(rec.state(), CycleState::Idle);
    }

    #[test]
    fn schedule_is_fixed_interval_from_cycle_start() {
        let (mut rec, clock) = reconciler(vec![
            Ok(snapshot(Some("t1"), 1)),
            Ok(snapshot(Some("t1"), 1)),
        ]);
        assert!(rec.is_due());
        assert!(rec.poll().is_some());
        assert!(!rec.is_due());

        clock.advance(299);
        assert!(rec.poll().is_none());
        clock.advance(1);
        assert!(rec.poll().is_some());
    }

    #[test]
    fn overrun_yields_one_catch_up_only() {
        let (mut rec, clock) = reconciler(vec![Ok(snapshot(Some("t1"), 1))]);
        let ticket = rec.begin().expect("idle");
        clock.advance(1000);
        let _ = rec.complete(ticket, Ok(snapshot(Some("t1"), 1)));

        assert!(rec.is_due());
        rec.run_cycle().expect("idle");
        assert!(!rec.is_due());
    }

    #[test]
    fn refreshed_at_follows_the_clock() {
        let (mut rec, clock) = reconciler(vec![Ok(snapshot(Some("t1"), 1))]);
        clock.advance(10);
        rec.run_cycle().expect("idle");
        assert_eq!(rec.refreshed_at(), Some(clock.now()));
        assert_eq!(rec.generated_at(), Some("t1"));
    }
}
