//! Debounced query input.
//!
//! Keystrokes edit the raw buffer immediately; the committed query used for
//! filtering only catches up once input has been quiet for the debounce delay.

use std::time::{Duration, Instant};

/// Default quiet period before a typed query is applied.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Returns true when `raw` differs from `committed` and the last keystroke is
/// at least `delay` old.
#[must_use]
pub fn should_commit(raw: &str, committed: &str, since_keystroke: Duration, delay: Duration) -> bool {
    raw != committed && since_keystroke >= delay
}

#[derive(Debug, Clone)]
pub struct QueryInput {
    raw: String,
    committed: String,
    last_keystroke: Option<Instant>,
    delay: Duration,
}

impl Default for QueryInput {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl QueryInput {
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            raw: String::new(),
            committed: String::new(),
            last_keystroke: None,
            delay,
        }
    }

    /// The text as typed.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The query currently applied to filtering.
    #[must_use]
    pub fn committed(&self) -> &str {
        &self.committed
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.raw != self.committed
    }

    pub fn push(&mut self, c: char, now: Instant) {
        self.raw.push(c);
        self.last_keystroke = Some(now);
    }

    pub fn pop(&mut self, now: Instant) {
        if self.raw.pop().is_some() {
            self.last_keystroke = Some(now);
        }
    }

    /// Replace the raw text, as a paste or programmatic edit.
    pub fn set(&mut self, text: &str, now: Instant) {
        text.clone_into(&mut self.raw);
        self.last_keystroke = Some(now);
    }

    /// Clear both buffers immediately, bypassing the delay.
    pub fn clear(&mut self) {
        self.raw.clear();
        self.committed.clear();
        self.last_keystroke = None;
    }

    /// Commit the raw text if the quiet period has elapsed. Returns true when
    /// the committed query changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let since = self
            .last_keystroke
            .map_or(self.delay, |at| now.saturating_duration_since(at));
        if should_commit(&self.raw, &self.committed, since, self.delay) {
            self.committed.clone_from(&self.raw);
            true
        } else {
            false
        }
    }

    /// Commit immediately, as on Enter.
    pub fn flush(&mut self) -> bool {
        if self.is_pending() {
            self.committed.clone_from(&self.raw);
            true
        } else {
            false
        }
    }
}
