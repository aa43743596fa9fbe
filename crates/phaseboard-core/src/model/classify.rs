use serde::Serialize;
use std::{fmt, str::FromStr};

/// ISA scoping of an issue, as used by the ISA filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IsaFilter {
    #[serde(rename = "ISA")]
    Isa,
    #[serde(rename = "NON-ISA")]
    NonIsa,
}

impl IsaFilter {
    pub const ALL: [Self; 2] = [Self::Isa, Self::NonIsa];

    /// The uppercased classification value this filter selects.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Isa => "ISA",
            Self::NonIsa => "NON-ISA",
        }
    }
}

impl fmt::Display for IsaFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing lane of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Track {
    Regular,
    #[serde(rename = "Fast-Track")]
    FastTrack,
}

impl Track {
    pub const ALL: [Self; 2] = [Self::Regular, Self::FastTrack];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "Regular",
            Self::FastTrack => "Fast-Track",
        }
    }

    /// Classify a yes/no fast-track flag; anything else is unclassified.
    #[must_use]
    pub fn from_flag(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "yes" => Some(Self::FastTrack),
            "no" => Some(Self::Regular),
            _ => None,
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a filter value names no classification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value '{value}': expected one of {expected}")]
pub struct UnknownClassification {
    pub kind: &'static str,
    pub value: String,
    pub expected: &'static str,
}

fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase().replace(['_', ' '], "-")
}

impl FromStr for IsaFilter {
    type Err = UnknownClassification;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "isa" => Ok(Self::Isa),
            "non-isa" | "nonisa" => Ok(Self::NonIsa),
            _ => Err(UnknownClassification {
                kind: "ISA",
                value: s.to_string(),
                expected: "isa, non-isa",
            }),
        }
    }
}

impl FromStr for Track {
    type Err = UnknownClassification;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "regular" => Ok(Self::Regular),
            "fast-track" | "fasttrack" | "fast" => Ok(Self::FastTrack),
            _ => Err(UnknownClassification {
                kind: "track",
                value: s.to_string(),
                expected: "regular, fast-track",
            }),
        }
    }
}
