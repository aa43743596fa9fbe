//! Minimal structural validation of a fetched document.
//!
//! Only the top level is checked: the rest of the document is handled by the
//! lenient deserializer. Every failed check is reported, not just the first.

use crate::error::RefreshError;
use crate::model::{Snapshot, wire::WireSnapshot};
use serde_yaml::Value;
use std::fmt;

/// One failed top-level shape check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeViolation {
    NotMapping,
    MissingSchemaVersion,
    CountsNotMapping,
    PhasesNotMapping,
}

impl ShapeViolation {
    /// The document field this violation concerns (`$` for the root).
    #[must_use]
    pub const fn field(self) -> &'static str {
        match self {
            Self::NotMapping => "$",
            Self::MissingSchemaVersion => "schema_version",
            Self::CountsNotMapping => "counts",
            Self::PhasesNotMapping => "phases",
        }
    }

    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotMapping => "document is not a mapping",
            Self::MissingSchemaVersion => "schema_version is missing or null",
            Self::CountsNotMapping => "counts is missing or not a mapping",
            Self::PhasesNotMapping => "phases is missing or not a mapping",
        }
    }
}

impl fmt::Display for ShapeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Run every shape check and return the violations in check order.
///
/// A non-mapping document fails all four checks.
#[must_use]
pub fn check_shape(document: &Value) -> Vec<ShapeViolation> {
    let Value::Mapping(map) = document else {
        return vec![
            ShapeViolation::NotMapping,
            ShapeViolation::MissingSchemaVersion,
            ShapeViolation::CountsNotMapping,
            ShapeViolation::PhasesNotMapping,
        ];
    };

    let mut violations = Vec::new();
    if map.get("schema_version").is_none_or(Value::is_null) {
        violations.push(ShapeViolation::MissingSchemaVersion);
    }
    if !map.get("counts").is_some_and(Value::is_mapping) {
        violations.push(ShapeViolation::CountsNotMapping);
    }
    if !map.get("phases").is_some_and(Value::is_mapping) {
        violations.push(ShapeViolation::PhasesNotMapping);
    }
    violations
}

/// Check the shape, returning `InvalidShape` naming every violation.
///
/// # Errors
///
/// Returns [`RefreshError::InvalidShape`] when any check fails.
pub fn validate(document: &Value) -> Result<(), RefreshError> {
    let violations = check_shape(document);
    if violations.is_empty() {
        return Ok(());
    }
    Err(RefreshError::InvalidShape {
        problems: violations
            .iter()
            .map(|v| v.message().to_string())
            .collect(),
    })
}

/// Validate a parsed document and convert it into a [`Snapshot`].
///
/// # Errors
///
/// Returns [`RefreshError::InvalidShape`] when the shape checks fail, or when
/// the phase lists hold values that cannot be read as issues.
pub fn parse_snapshot(document: Value) -> Result<Snapshot, RefreshError> {
    validate(&document)?;
    let wire: WireSnapshot =
        serde_yaml::from_value(document).map_err(|err| RefreshError::InvalidShape {
            problems: vec![format!("cannot read snapshot: {err}")],
        })?;
    Ok(wire.into_snapshot())
}
