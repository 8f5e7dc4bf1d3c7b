#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Parking lot status taxonomy.
//!
//! The status fetcher records an open set of raw codes per lot (`available`,
//! `few`, `full`, `active`, `na`, `closed`, ...). Everything downstream of
//! ingestion works with the normalized three-valued [`LotStatus`] and its
//! numeric grade, which drives both region composition and marker coloring.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Grade used for lots with no graded observations.
///
/// Sits below every real grade so such lots sort to the front of any
/// ascending grade ordering.
pub const UNKNOWN_GRADE: f64 = -1.0;

/// Normalized status of a parking lot.
///
/// Variant order is priority order: where walking-distance areas of lots
/// with different statuses overlap, the earlier variant wins.
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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LotStatus {
    /// Spaces available (including "few spaces left").
    Available,
    /// Full or closed.
    Full,
    /// No usable observation.
    Unknown,
}

impl LotStatus {
    /// All statuses, highest priority first.
    pub const ALL: [Self; 3] = [Self::Available, Self::Full, Self::Unknown];

    /// Normalizes a raw status code. A missing record counts as unknown.
    ///
    /// This mapping is total: unrecognized codes are never an error.
    #[must_use]
    pub fn classify(raw: Option<&str>) -> Self {
        raw.map_or(Self::Unknown, |code| RawStatus::parse(code).status())
    }

    /// Numeric grade of this status, `None` for [`LotStatus::Unknown`].
    #[must_use]
    pub const fn grade(self) -> Option<f64> {
        match self {
            Self::Available => Some(1.0),
            Self::Full => Some(0.0),
            Self::Unknown => None,
        }
    }

    /// Priority rank, `0` being the highest.
    #[must_use]
    pub const fn priority(self) -> usize {
        self as usize
    }
}

/// A raw status code as recorded by the fetcher.
///
/// The code set is open; anything unrecognized is kept verbatim in
/// [`RawStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RawStatus {
    /// Plenty of spaces.
    Available,
    /// Only a few spaces left.
    Few,
    /// No spaces.
    Full,
    /// Lot is operating but the sign shows no count.
    Active,
    /// The status page could not be read.
    Na,
    /// Lot is closed.
    Closed,
    /// Any other code.
    Other(String),
}

impl RawStatus {
    /// Parses a raw code. Never fails.
    #[must_use]
    pub fn parse(code: &str) -> Self {
        match code {
            "available" => Self::Available,
            "few" => Self::Few,
            "full" => Self::Full,
            "active" => Self::Active,
            "na" => Self::Na,
            "closed" => Self::Closed,
            other => Self::Other(other.to_string()),
        }
    }

    /// Returns the code as it appears in the raw records.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Available => "available",
            Self::Few => "few",
            Self::Full => "full",
            Self::Active => "active",
            Self::Na => "na",
            Self::Closed => "closed",
            Self::Other(code) => code,
        }
    }

    /// Normalized status for this code.
    #[must_use]
    pub const fn status(&self) -> LotStatus {
        match self {
            Self::Available | Self::Few => LotStatus::Available,
            Self::Full | Self::Closed => LotStatus::Full,
            Self::Active | Self::Na | Self::Other(_) => LotStatus::Unknown,
        }
    }
}

impl std::fmt::Display for RawStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mean grade of a status history.
///
/// Unknown entries are excluded from the average. Returns [`UNKNOWN_GRADE`]
/// when nothing in the history is graded.
#[must_use]
pub fn mean_grade(history: &[LotStatus]) -> f64 {
    let (sum, count) = history
        .iter()
        .filter_map(|status| status.grade())
        .fold((0.0, 0_u32), |(sum, count), grade| (sum + grade, count + 1));

    if count == 0 {
        UNKNOWN_GRADE
    } else {
        sum / f64::from(count)
    }
}

/// Number of occurrences of each status in a history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    /// Entries classified as available.
    pub available: usize,
    /// Entries classified as full.
    pub full: usize,
    /// Entries classified as unknown.
    pub unknown: usize,
}

impl StatusCounts {
    /// Count for a single status.
    #[must_use]
    pub const fn get(&self, status: LotStatus) -> usize {
        match status {
            LotStatus::Available => self.available,
            LotStatus::Full => self.full,
            LotStatus::Unknown => self.unknown,
        }
    }

    /// Sum of all counts; equals the length of the counted history.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.available + self.full + self.unknown
    }

    /// The most frequent status, ties going to the higher-priority status.
    ///
    /// An empty history yields [`LotStatus::Unknown`].
    #[must_use]
    pub fn dominant(&self) -> LotStatus {
        if self.total() == 0 {
            return LotStatus::Unknown;
        }

        let mut best = LotStatus::Available;
        for status in LotStatus::ALL {
            if self.get(status) > self.get(best) {
                best = status;
            }
        }
        best
    }
}

/// Tallies a status history.
#[must_use]
pub fn counts_by_status(history: &[LotStatus]) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for status in history {
        match status {
            LotStatus::Available => counts.available += 1,
            LotStatus::Full => counts.full += 1,
            LotStatus::Unknown => counts.unknown += 1,
        }
    }
    counts
}
