use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The fixed lifecycle stages, in display order.
///
/// `Other` collects issues whose tracker status maps to no named stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    Inception,
    Planning,
    Development,
    Stabilization,
    Freeze,
    #[serde(rename = "Ratification-Ready")]
    RatificationReady,
    Publication,
    Ratified,
    Cancelled,
    Other,
}

impl Phase {
    /// Every phase in enumeration order.
    pub const ALL: [Self; 10] = [
        Self::Inception,
        Self::Planning,
        Self::Development,
        Self::Stabilization,
        Self::Freeze,
        Self::RatificationReady,
        Self::Publication,
        Self::Ratified,
        Self::Cancelled,
        Self::Other,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inception => "Inception",
            Self::Planning => "Planning",
            Self::Development => "Development",
            Self::Stabilization => "Stabilization",
            Self::Freeze => "Freeze",
            Self::RatificationReady => "Ratification-Ready",
            Self::Publication => "Publication",
            Self::Ratified => "Ratified",
            Self::Cancelled => "Cancelled",
            Self::Other => "Other",
        }
    }

    /// Tags that subtask summaries use for this phase, e.g. `[Plan] - ...`.
    #[must_use]
    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Inception => &["Inception"],
            Self::Planning => &["Plan", "Planning"],
            Self::Development => &["Development", "Dev"],
            Self::Stabilization => &["Stabilization", "Stabilisation"],
            Self::Freeze => &["Freeze"],
            Self::RatificationReady => &["Ratification-Ready", "Ratification Ready"],
            Self::Publication => &["Publication", "Publish"],
            Self::Ratified => &["Ratified"],
            Self::Cancelled => &["Cancelled"],
            Self::Other => &["Other"],
        }
    }

    /// Returns true if `tag` (case-insensitive, trimmed) is an alias of this phase.
    #[must_use]
    pub fn matches_tag(self, tag: &str) -> bool {
        let tag = tag.trim();
        self.aliases()
            .iter()
            .any(|alias| alias.eq_ignore_ascii_case(tag))
    }

    /// Parse a phase name; unknown names fold into [`Phase::Other`].
    #[must_use]
    pub fn from_name_lossy(raw: &str) -> Self {
        raw.parse().unwrap_or(Self::Other)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a phase name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown phase '{0}': expected one of {}", Phase::ALL.map(Phase::as_str).join(", "))]
pub struct UnknownPhase(pub String);

impl FromStr for Phase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|phase| phase.as_str().eq_ignore_ascii_case(trimmed) || phase.matches_tag(trimmed))
            .ok_or_else(|| UnknownPhase(trimmed.to_string()))
    }
}
