#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The "viewed moment" a user selects.
//!
//! A [`ViewDate`] is either one concrete half-hour slot or an aggregate over
//! every observed day of a [`DayGroup`] at a fixed time of day. All times are
//! local wall-clock times, matching the slot keys of the status records.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Prefix of the encoded form of [`ViewDate::Instant`].
pub const TIMESTAMP_PREFIX: &str = "timestamp";

/// Prefix of the encoded form of [`ViewDate::Aggregate`].
pub const DAY_GROUP_PREFIX: &str = "dayGroup";

/// Errors produced when decoding an encoded [`ViewDate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ViewDateParseError {
    /// The encoding does not start with a known prefix.
    #[error("Unrecognized view date encoding: '{input}'")]
    UnknownPrefix {
        /// The full encoded input.
        input: String,
    },

    /// The day timestamp is not a valid epoch millisecond value.
    #[error("Invalid day timestamp: '{value}'")]
    InvalidTimestamp {
        /// The offending value.
        value: String,
    },

    /// The day group name is not recognized.
    #[error("Unknown day group: '{name}'")]
    UnknownGroup {
        /// The offending group name.
        name: String,
    },
}

/// A set of weekdays that an aggregate view averages over.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum DayGroup {
    /// Every day.
    AllDays,
    /// Sunday through Thursday.
    Weekdays,
    /// Friday and Saturday.
    Weekends,
    /// Fridays only.
    Fridays,
    /// Saturdays only.
    Saturdays,
}

impl DayGroup {
    /// All day groups, in menu order.
    pub const ALL: [Self; 5] = [
        Self::AllDays,
        Self::Weekdays,
        Self::Weekends,
        Self::Fridays,
        Self::Saturdays,
    ];

    /// Weekday indexes (days from Sunday) that belong to this group.
    #[must_use]
    pub const fn day_indexes(self) -> &'static [u32] {
        match self {
            Self::AllDays => &[0, 1, 2, 3, 4, 5, 6],
            Self::Weekdays => &[0, 1, 2, 3, 4],
            Self::Weekends => &[5, 6],
            Self::Fridays => &[5],
            Self::Saturdays => &[6],
        }
    }

    /// Whether `weekday` belongs to this group.
    #[must_use]
    pub fn contains(self, weekday: Weekday) -> bool {
        self.day_indexes()
            .contains(&weekday.num_days_from_sunday())
    }
}

/// Identifies the computation for one [`ViewDate`].
///
/// Two view dates have equal keys exactly when they are equal, so a result
/// tagged with a key can be checked against whatever is currently viewed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewKey(String);

impl ViewKey {
    /// The key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ViewKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The moment (or aggregate of moments) being viewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ViewDate {
    /// A single half-hour slot.
    #[serde(rename = "timestamp")]
    Instant {
        /// Local wall-clock time of the slot.
        timestamp: NaiveDateTime,
    },
    /// Every observed day in `group`, each at `time`.
    #[serde(rename = "dayGroup")]
    Aggregate {
        /// Which weekdays to include.
        group: DayGroup,
        /// Time of day applied to each matching day.
        time: NaiveTime,
    },
}

impl ViewDate {
    /// Convenience constructor for [`ViewDate::Instant`].
    #[must_use]
    pub const fn instant(timestamp: NaiveDateTime) -> Self {
        Self::Instant { timestamp }
    }

    /// Convenience constructor for [`ViewDate::Aggregate`].
    #[must_use]
    pub const fn aggregate(group: DayGroup, time: NaiveTime) -> Self {
        Self::Aggregate { group, time }
    }

    /// The time-of-day component.
    #[must_use]
    pub fn time_of_day(&self) -> NaiveTime {
        match self {
            Self::Instant { timestamp } => timestamp.time(),
            Self::Aggregate { time, .. } => *time,
        }
    }

    /// Encodes the day-selection part of this view date.
    ///
    /// The time of day is deliberately left out: `"timestamp:<ms>"` carries
    /// the epoch milliseconds of the start of the instant's day and
    /// `"dayGroup:<name>"` carries the group name. Use [`ViewDate::decode`]
    /// with a base view date to restore the time of day.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Instant { timestamp } => {
                format!("{TIMESTAMP_PREFIX}:{}", day_start_millis(timestamp.date()))
            }
            Self::Aggregate { group, .. } => format!("{DAY_GROUP_PREFIX}:{group}"),
        }
    }

    /// Decodes an encoding produced by [`ViewDate::encode`], taking the time
    /// of day from `base`.
    ///
    /// # Errors
    ///
    /// Returns [`ViewDateParseError`] if the prefix, the day timestamp, or
    /// the group name is not recognized. Callers should keep their previous
    /// view date in that case.
    pub fn decode(encoded: &str, base: &Self) -> Result<Self, ViewDateParseError> {
        let Some((prefix, value)) = encoded.split_once(':') else {
            return Err(ViewDateParseError::UnknownPrefix {
                input: encoded.to_string(),
            });
        };

        let time = base.time_of_day();

        match prefix {
            TIMESTAMP_PREFIX => {
                let day = value
                    .parse::<i64>()
                    .ok()
                    .and_then(DateTime::from_timestamp_millis)
                    .map(|dt| dt.naive_utc().date())
                    .ok_or_else(|| ViewDateParseError::InvalidTimestamp {
                        value: value.to_string(),
                    })?;
                Ok(Self::instant(day.and_time(time)))
            }
            DAY_GROUP_PREFIX => {
                let group =
                    value
                        .parse::<DayGroup>()
                        .map_err(|_| ViewDateParseError::UnknownGroup {
                            name: value.to_string(),
                        })?;
                Ok(Self::aggregate(group, time))
            }
            _ => Err(ViewDateParseError::UnknownPrefix {
                input: encoded.to_string(),
            }),
        }
    }

    /// The key identifying computations for this exact view date.
    #[must_use]
    pub fn key(&self) -> ViewKey {
        match self {
            Self::Instant { timestamp } => ViewKey(format!(
                "{TIMESTAMP_PREFIX}:{}",
                timestamp.and_utc().timestamp_millis()
            )),
            Self::Aggregate { group, time } => ViewKey(format!(
                "{DAY_GROUP_PREFIX}:{group}@{}",
                time.format("%H:%M")
            )),
        }
    }
}

impl std::fmt::Display for ViewDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Instant { timestamp } => write!(f, "{}", timestamp.format("%a %Y-%m-%d %H:%M")),
            Self::Aggregate { group, time } => write!(f, "{group} at {}", time.format("%H:%M")),
        }
    }
}

/// Epoch milliseconds of midnight at the start of `day`, reading the wall
/// clock as UTC.
fn day_start_millis(day: NaiveDate) -> i64 {
    day.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn time(h: u32, min: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, min, 0).unwrap()
    }

    #[test]
    fn round_trips_every_variant() {
        let mut dates = vec![
            ViewDate::instant(at(2023, 3, 10, 19, 0)),
            ViewDate::instant(at(2023, 3, 11, 0, 30)),
            ViewDate::instant(at(2023, 12, 31, 23, 30)),
        ];
        dates.extend(
            DayGroup::ALL
                .iter()
                .map(|group| ViewDate::aggregate(*group, time(19, 0))),
        );

        for date in dates {
            let encoded = date.encode();
            let decoded = ViewDate::decode(&encoded, &date).unwrap();
            assert_eq!(decoded, date, "round trip of {encoded}");
        }
    }

    #[test]
    fn decode_takes_time_from_base() {
        let base = ViewDate::aggregate(DayGroup::Fridays, time(8, 30));
        let target = ViewDate::instant(at(2023, 3, 12, 22, 0));

        let decoded = ViewDate::decode(&target.encode(), &base).unwrap();
        assert_eq!(decoded, ViewDate::instant(at(2023, 3, 12, 8, 30)));

        let decoded = ViewDate::decode("dayGroup:saturdays", &target).unwrap();
        assert_eq!(
            decoded,
            ViewDate::aggregate(DayGroup::Saturdays, time(22, 0))
        );
    }

    #[test]
    fn encodes_day_start_millis() {
        let date = ViewDate::instant(at(1970, 1, 2, 13, 30));
        assert_eq!(date.encode(), "timestamp:86400000");
    }

    #[test]
    fn rejects_bad_encodings() {
        let base = ViewDate::aggregate(DayGroup::AllDays, time(12, 0));

        assert!(matches!(
            ViewDate::decode("hour:12", &base),
            Err(ViewDateParseError::UnknownPrefix { .. })
        ));
        assert!(matches!(
            ViewDate::decode("no-separator", &base),
            Err(ViewDateParseError::UnknownPrefix { .. })
        ));
        assert!(matches!(
            ViewDate::decode("dayGroup:mondays", &base),
            Err(ViewDateParseError::UnknownGroup { .. })
        ));
        assert!(matches!(
            ViewDate::decode("timestamp:yesterday", &base),
            Err(ViewDateParseError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn keys_distinguish_time_of_day() {
        let a = ViewDate::instant(at(2023, 3, 10, 19, 0));
        let b = ViewDate::instant(at(2023, 3, 10, 19, 30));
        assert_eq!(a.encode(), b.encode());
        assert_ne!(a.key(), b.key());

        let c = ViewDate::aggregate(DayGroup::Weekends, time(19, 0));
        assert_eq!(c.key().as_str(), "dayGroup:weekends@19:00");
    }

    #[test]
    fn day_group_membership() {
        assert!(DayGroup::Fridays.contains(Weekday::Fri));
        assert!(DayGroup::Weekdays.contains(Weekday::Sun));
        assert!(!DayGroup::Weekdays.contains(Weekday::Fri));
        assert!(DayGroup::Weekends.contains(Weekday::Sat));
        for weekday in [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ] {
            assert!(DayGroup::AllDays.contains(weekday), "{weekday:?}");
        }
    }

    #[test]
    fn group_names() {
        assert_eq!(DayGroup::AllDays.to_string(), "allDays");
        assert_eq!("weekends".parse::<DayGroup>().unwrap(), DayGroup::Weekends);
    }

    #[test]
    fn serializes_tagged() {
        let date = ViewDate::aggregate(DayGroup::Fridays, time(19, 0));
        let json = serde_json::to_value(date).unwrap();
        assert_eq!(json["type"], "dayGroup");
        assert_eq!(json["group"], "fridays");
    }
}
