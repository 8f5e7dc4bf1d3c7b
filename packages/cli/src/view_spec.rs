//! Parsing of `--at` / `--time` arguments into a [`ViewDate`].

use chrono::{NaiveDateTime, NaiveTime, Timelike};
use parking_map_records::SLOT_KEY_FORMAT;
use parking_map_records_models::{DayGroup, ViewDate};

/// Errors that can occur while parsing a view date argument.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewSpecError {
    /// `--at` is neither an instant nor a day group name.
    #[error("'{0}' is neither 'YYYY-MM-DD HH:MM' nor a day group")]
    Unrecognized(String),

    /// The time of day is not `HH:MM`.
    #[error("Invalid time of day '{0}', expected HH:MM")]
    InvalidTime(String),

    /// A day group was given without `--time`.
    #[error("Day group '{0}' needs --time")]
    MissingTime(String),

    /// `--time` was given alongside an instant.
    #[error("--time only applies to day groups")]
    UnexpectedTime,

    /// The time is not on a half-hour boundary.
    #[error("{0} is not on the half-hour grid")]
    OffGrid(String),
}

/// Parses `HH:MM`, which must fall on a half-hour boundary.
///
/// # Errors
///
/// Returns [`ViewSpecError`] if the text is not a time or is off the grid.
pub fn parse_time(text: &str) -> Result<NaiveTime, ViewSpecError> {
    let time = NaiveTime::parse_from_str(text.trim(), "%H:%M")
        .map_err(|_| ViewSpecError::InvalidTime(text.to_string()))?;
    ensure_on_grid(time, text)?;
    Ok(time)
}

/// Parses `at` as an instant (`YYYY-MM-DD HH:MM`) or as a day group name
/// combined with `time`.
///
/// # Errors
///
/// Returns [`ViewSpecError`] if `at` is unrecognized, the time is missing or
/// invalid, or the result is off the half-hour grid.
pub fn parse_view_date(at: &str, time: Option<&str>) -> Result<ViewDate, ViewSpecError> {
    let at = at.trim();

    if let Ok(group) = at.parse::<DayGroup>() {
        let time = time.ok_or_else(|| ViewSpecError::MissingTime(at.to_string()))?;
        return Ok(ViewDate::aggregate(group, parse_time(time)?));
    }

    let timestamp = NaiveDateTime::parse_from_str(at, SLOT_KEY_FORMAT)
        .map_err(|_| ViewSpecError::Unrecognized(at.to_string()))?;
    if time.is_some() {
        return Err(ViewSpecError::UnexpectedTime);
    }
    ensure_on_grid(timestamp.time(), at)?;
    Ok(ViewDate::instant(timestamp))
}

fn ensure_on_grid(time: NaiveTime, text: &str) -> Result<(), ViewSpecError> {
    if time.minute() % 30 == 0 && time.second() == 0 {
        Ok(())
    } else {
        Err(ViewSpecError::OffGrid(text.to_string()))
    }
}
