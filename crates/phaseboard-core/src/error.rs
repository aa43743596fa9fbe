use std::fmt;
use thiserror::Error;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    StatusConfigParseError,
    SourceUnavailable,
    InvalidShape,
    IssueNotFound,
    InvalidFilterValue,
    RefreshInFlight,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::StatusConfigParseError => "E1002",
            Self::SourceUnavailable => "E2001",
            Self::InvalidShape => "E2002",
            Self::IssueNotFound => "E3001",
            Self::InvalidFilterValue => "E3002",
            Self::RefreshInFlight => "E4001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::StatusConfigParseError => "Status config parse error",
            Self::SourceUnavailable => "No snapshot source available",
            Self::InvalidShape => "Snapshot has invalid shape",
            Self::IssueNotFound => "Issue not found",
            Self::InvalidFilterValue => "Invalid filter value",
            Self::RefreshInFlight => "Refresh already in flight",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .phaseboard/config.toml and retry."),
            Self::StatusConfigParseError => {
                Some("The status config must be a JSON object of string arrays.")
            }
            Self::SourceUnavailable => Some(
                "Check --source / PHASEBOARD_SOURCE and the [sources] section of the config.",
            ),
            Self::InvalidShape => Some(
                "The snapshot needs schema_version, a counts mapping, and a phases mapping.",
            ),
            Self::IssueNotFound => Some("Run `pb list` to see the keys in the current snapshot."),
            Self::InvalidFilterValue => Some("Use isa/non-isa for --isa and regular/fast-track for --track."),
            Self::RefreshInFlight => None,
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One failed read of a single candidate source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    #[error("{location}: request failed: {message}")]
    Transport { location: String, message: String },

    #[error("{location}: unexpected status {status}")]
    Status { location: String, status: u16 },

    #[error("{location}: YAML parse error: {message}")]
    Parse { location: String, message: String },
}

impl AttemptError {
    /// The candidate location this attempt was made against.
    #[must_use]
    pub fn location(&self) -> &str {
        match self {
            Self::Transport { location, .. }
            | Self::Status { location, .. }
            | Self::Parse { location, .. } => location,
        }
    }
}

/// Failure of one refresh cycle.
///
/// A parse failure is reported as [`RefreshError::SourceUnavailable`] because
/// fallback treats it exactly like a network failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error("{}", describe_unavailable(.attempts, .last))]
    SourceUnavailable {
        attempts: usize,
        last: Option<AttemptError>,
    },

    #[error("snapshot has invalid shape: {}", .problems.join("; "))]
    InvalidShape { problems: Vec<String> },
}

impl RefreshError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::SourceUnavailable { .. } => ErrorCode::SourceUnavailable,
            Self::InvalidShape { .. } => ErrorCode::InvalidShape,
        }
    }

    /// Optional remediation hint for operators and agents.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

#[allow(clippy::trivially_copy_pass_by_ref, clippy::ref_option)]
fn describe_unavailable(attempts: &usize, last: &Option<AttemptError>) -> String {
    match last {
        Some(err) => format!("no snapshot source available after {attempts} attempt(s): {err}"),
        None => "no snapshot source available: no candidate sources configured".to_string(),
    }
}
