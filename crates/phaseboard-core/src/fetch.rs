//! Fallback-chain fetch of the roll-up document.
//!
//! Candidates are tried in order; the first one that answers 200 with a body
//! that parses as YAML wins. Remote candidates get a `_=<millis>` cache-buster
//! and no-cache headers. Local paths are read from disk through the same
//! [`Transport`] seam so the chain logic is identical for both.

use crate::error::{AttemptError, RefreshError};
use crate::refresh::{Loaded, SnapshotLoader};
use crate::validate::parse_snapshot;
use anyhow::{Context, Result};
use serde_yaml::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Default timeout applied to remote reads.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// A raw answer from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Read access to a location.
///
/// An `Err` means the read never produced a response (network error, missing
/// file). A non-success HTTP status is an `Ok` response.
pub trait Transport {
    /// # Errors
    ///
    /// Returns an error when no response could be obtained.
    fn get(&self, location: &str) -> Result<Response>;
}

/// Blocking HTTP transport sending no-cache headers.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("phaseboard/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Transport for UreqTransport {
    fn get(&self, location: &str) -> Result<Response> {
        let result = self
            .agent
            .get(location)
            .set("Cache-Control", "no-cache")
            .set("Pragma", "no-cache")
            .call();

        match result {
            Ok(response) => {
                let status = response.status();
                let body = response
                    .into_string()
                    .with_context(|| format!("failed to read response body from {location}"))?;
                Ok(Response { status, body })
            }
            Err(ureq::Error::Status(status, _)) => Ok(Response {
                status,
                body: String::new(),
            }),
            Err(err) => Err(anyhow::anyhow!("GET {location} failed: {err}")),
        }
    }
}

/// Reads local paths (optionally `file://`-prefixed); a successful read is 200.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTransport;

impl Transport for FileTransport {
    fn get(&self, location: &str) -> Result<Response> {
        let path = Path::new(location.strip_prefix("file://").unwrap_or(location));
        let body = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Response { status: 200, body })
    }
}

/// Routes remote locations to HTTP and everything else to the filesystem.
#[derive(Debug, Clone, Default)]
pub struct DefaultTransport {
    http: UreqTransport,
    file: FileTransport,
}

impl Transport for DefaultTransport {
    fn get(&self, location: &str) -> Result<Response> {
        if is_remote(location) {
            self.http.get(location)
        } else {
            self.file.get(location)
        }
    }
}

/// Returns true for `http://` and `https://` locations.
#[must_use]
pub fn is_remote(location: &str) -> bool {
    let lower = location.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Append `_=<token>` to a remote location; local paths are returned as-is.
#[must_use]
pub fn cache_busted(location: &str, token: i64) -> String {
    if !is_remote(location) {
        return location.to_string();
    }
    let separator = if location.contains('?') { '&' } else { '?' };
    format!("{location}{separator}_={token}")
}

/// Read a location as text, requiring a success status.
///
/// # Errors
///
/// Returns [`AttemptError::Transport`] when no response was obtained and
/// [`AttemptError::Status`] for a non-success status.
pub fn read_text<T: Transport + ?Sized>(
    transport: &T,
    location: &str,
) -> Result<String, AttemptError> {
    let response = transport
        .get(location)
        .map_err(|err| AttemptError::Transport {
            location: location.to_string(),
            message: format!("{err:#}"),
        })?;
    if !response.is_success() {
        return Err(AttemptError::Status {
            location: location.to_string(),
            status: response.status,
        });
    }
    Ok(response.body)
}

/// The document returned by the first candidate that worked.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedDocument {
    /// Candidate location as configured, without the cache-buster.
    pub source: String,
    pub document: Value,
}

/// Tries an ordered list of candidate locations.
#[derive(Debug, Clone)]
pub struct Fetcher<T> {
    transport: T,
    candidates: Vec<String>,
}

impl<T: Transport> Fetcher<T> {
    /// Blank candidates are dropped; order is preserved.
    pub fn new<I, S>(transport: T, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let candidates = candidates
            .into_iter()
            .map(Into::into)
            .map(|c: String| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        Self {
            transport,
            candidates,
        }
    }

    #[must_use]
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch and parse the first working candidate.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::SourceUnavailable`] carrying the last attempt's
    /// failure when every candidate fails, or immediately when there are none.
    pub fn fetch(&self, cache_token: i64) -> Result<FetchedDocument, RefreshError> {
        let mut last = None;

        for (index, candidate) in self.candidates.iter().enumerate() {
            let url = cache_busted(candidate, cache_token);
            debug!(source = %candidate, attempt = index + 1, "fetching snapshot");

            match self.attempt(candidate, &url) {
                Ok(document) => {
                    return Ok(FetchedDocument {
                        source: candidate.clone(),
                        document,
                    });
                }
                Err(err) => {
                    let remaining = self.candidates.len() - index - 1;
                    warn!(source = %candidate, remaining, error = %err, "snapshot source failed");
                    last = Some(err);
                }
            }
        }

        Err(RefreshError::SourceUnavailable {
            attempts: self.candidates.len(),
            last,
        })
    }

    fn attempt(&self, candidate: &str, url: &str) -> Result<Value, AttemptError> {
        let body = read_text(&self.transport, url).map_err(|err| relocate(err, candidate))?;
        serde_yaml::from_str(&body).map_err(|err| AttemptError::Parse {
            location: candidate.to_string(),
            message: err.to_string(),
        })
    }
}

/// Report errors against the configured location rather than the busted URL.
fn relocate(err: AttemptError, candidate: &str) -> AttemptError {
    let location = candidate.to_string();
    match err {
        AttemptError::Transport { message, .. } => AttemptError::Transport { location, message },
        AttemptError::Status { status, .. } => AttemptError::Status { location, status },
        AttemptError::Parse { message, .. } => AttemptError::Parse { location, message },
    }
}

impl<T: Transport> SnapshotLoader for Fetcher<T> {
    fn load(&mut self) -> Result<Loaded, RefreshError> {
        let token = chrono::Utc::now().timestamp_millis();
        let fetched = self.fetch(token)?;
        let snapshot = parse_snapshot(fetched.document)?;
        Ok(Loaded {
            source: fetched.source,
            snapshot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    const VALID: &str = "schema_version: 1\ncounts: {Planning: 1}\nphases:\n  Planning:\n    - key: A-1\n";

    #[derive(Default)]
    struct Scripted {
        answers: HashMap<String, std::result::Result<Response, String>>,
        calls: RefCell<Vec<String>>,
    }

    impl Scripted {
        fn answer(mut self, location: &str, status: u16, body: &str) -> Self {
            self.answers.insert(
                location.to_string(),
                Ok(Response {
                    status,
                    body: body.to_string(),
                }),
            );
            self
        }

        fn fail(mut self, location: &str, message: &str) -> Self {
            self.answers
                .insert(location.to_string(), Err(message.to_string()));
            self
        }
    }

    impl Transport for Scripted {
        fn get(&self, location: &str) -> Result<Response> {
            self.calls.borrow_mut().push(location.to_string());
            let base = location.split("?_=").next().unwrap_or(location);
            match self.answers.get(base) {
                Some(Ok(response)) => Ok(response.clone()),
                Some(Err(message)) => Err(anyhow::anyhow!("{message}")),
                None => Err(anyhow::anyhow!("no route to {base}")),
            }
        }
    }

    #[test]
    fn cache_buster_respects_existing_query() {
        assert_eq!(cache_busted("https://a.test/x.yaml", 7), "https://a.test/x.yaml?_=7");
        assert_eq!(
            cache_busted("https://a.test/x.yaml?ref=main", 7),
            "https://a.test/x.yaml?ref=main&_=7"
        );
        assert_eq!(cache_busted("data/x.yaml", 7), "data/x.yaml");
    }

    #[test]
    fn remote_detection() {
        assert!(is_remote("https://a.test"));
        assert!(is_remote("HTTP://a.test"));
        assert!(!is_remote("/srv/rollup.yaml"));
        assert!(!is_remote("file:///srv/rollup.yaml"));
    }

    #[test]
    fn blank_candidates_are_dropped() {
        let fetcher = Fetcher::new(Scripted::default(), ["", "  ", "https://a.test/x"]);
        assert_eq!(fetcher.candidates(), ["https://a.test/x"]);
    }

    #[test]
    fn falls_through_error_then_status_then_succeeds() {
        let transport = Scripted::default()
            .fail("https://one.test/r.yaml", "connection refused")
            .answer("https://two.test/r.yaml", 404, "")
            .answer("https://three.test/r.yaml", 200, VALID);
        let fetcher = Fetcher::new(
            transport,
            [
                "https://one.test/r.yaml",
                "https://two.test/r.yaml",
                "https://three.test/r.yaml",
            ],
        );

        let fetched = fetcher.fetch(42).expect("third candidate");
        assert_eq!(fetched.source, "https://three.test/r.yaml");
        let calls = fetcher.transport().calls.borrow();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|c| c.ends_with("?_=42")));
    }

    #[test]
    fn every_candidate_failing_reports_last_cause() {
        let transport = Scripted::default()
            .fail("https://one.test/r.yaml", "timeout")
            .answer("https://two.test/r.yaml", 503, "");
        let fetcher = Fetcher::new(transport, ["https://one.test/r.yaml", "https://two.test/r.yaml"]);

        let err = fetcher.fetch(1).expect_err("all fail");
        let RefreshError::SourceUnavailable { attempts, last } = err else {
            panic!("expected SourceUnavailable");
        };
        assert_eq!(attempts, 2);
        assert_eq!(
            last,
            Some(AttemptError::Status {
                location: "https://two.test/r.yaml".into(),
                status: 503,
            })
        );
    }

    #[test]
    fn unparsable_body_falls_through() {
        let transport = Scripted::default()
            .answer("https://one.test/r.yaml", 200, "key: [unclosed")
            .answer("https://two.test/r.yaml", 200, VALID);
        let fetcher = Fetcher::new(transport, ["https://one.test/r.yaml", "https://two.test/r.yaml"]);
        assert_eq!(fetcher.fetch(1).expect("second").source, "https://two.test/r.yaml");
    }

    #[test]
    fn empty_candidate_list_fails_immediately() {
        let fetcher = Fetcher::new(Scripted::default(), Vec::<String>::new());
        let err = fetcher.fetch(1).expect_err("no candidates");
        assert!(matches!(
            err,
            RefreshError::SourceUnavailable {
                attempts: 0,
                last: None
            }
        ));
        assert!(fetcher.transport().calls.borrow().is_empty());
    }

    #[test]
    fn loader_validates_after_fetch() {
        let transport = Scripted::default().answer("https://one.test/r.yaml", 200, "counts: {}\n");
        let mut fetcher = Fetcher::new(transport, ["https://one.test/r.yaml"]);
        let err = fetcher.load().expect_err("invalid shape");
        assert!(matches!(err, RefreshError::InvalidShape { .. }));
    }

    #[test]
    fn file_transport_reads_local_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rollup.yaml");
        std::fs::write(&path, VALID).expect("write");

        let mut fetcher = Fetcher::new(FileTransport, [path.display().to_string()]);
        let loaded = fetcher.load().expect("load");
        assert_eq!(loaded.snapshot.issue_count(), 1);

        let missing = FileTransport.get("/definitely/not/here.yaml");
        assert!(missing.is_err());
    }
}
