pub mod completions;
pub mod counts;
pub mod list;
pub mod show;
pub mod validate;
pub mod watch;

use crate::output::{CliError, OutputMode, render_error};
use phaseboard_core::ErrorCode;
use phaseboard_core::filter::FilterState;
use phaseboard_core::model::{IsaFilter, Phase, Track};
use std::fmt::Display;
use std::str::FromStr;

fn parse_filter_value<T>(raw: Option<&str>, output: OutputMode) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };
    match raw.parse::<T>() {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            let code = ErrorCode::InvalidFilterValue;
            render_error(
                output,
                &CliError::with_details(
                    err.to_string(),
                    code.hint().unwrap_or_default(),
                    code.code(),
                ),
            )?;
            anyhow::bail!("{err}");
        }
    }
}

/// Build a [`FilterState`] from raw command-line values.
///
/// # Errors
///
/// Returns an error (already rendered) when a categorical value is unknown.
pub fn build_filter(
    query: Option<&str>,
    isa: Option<&str>,
    track: Option<&str>,
    phase: Option<&str>,
    output: OutputMode,
) -> anyhow::Result<FilterState> {
    Ok(FilterState {
        query: query.unwrap_or_default().to_string(),
        isa: parse_filter_value::<IsaFilter>(isa, output)?,
        track: parse_filter_value::<Track>(track, output)?,
        phase: parse_filter_value::<Phase>(phase, output)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_mean_no_filter() {
        let filter = build_filter(None, Some(" "), None, Some(""), OutputMode::Text).expect("ok");
        assert_eq!(filter, FilterState::default());
    }

    #[test]
    fn known_values_are_parsed() {
        let filter = build_filter(
            Some("uart"),
            Some("non-isa"),
            Some("fast-track"),
            Some("dev"),
            OutputMode::Text,
        )
        .expect("ok");
        assert_eq!(filter.isa, Some(IsaFilter::NonIsa));
        assert_eq!(filter.track, Some(Track::FastTrack));
        assert_eq!(filter.phase, Some(Phase::Development));
        assert_eq!(filter.query, "uart");
    }

    #[test]
    fn unknown_value_is_error() {
        assert!(build_filter(None, Some("both"), None, None, OutputMode::Json).is_err());
    }
}
