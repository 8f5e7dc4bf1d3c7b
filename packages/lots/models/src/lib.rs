#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Parking lot geometry and per-view summary types.
//!
//! A [`LotGeometry`] is loaded once from the isochrone input and never
//! changes. A [`LotSummary`] is derived for every lot each time the viewed
//! date changes.

use geo::{Point, Polygon};
use parking_map_status_models::{LotStatus, StatusCounts, counts_by_status, mean_grade};
use serde::{Deserialize, Serialize};

/// Numeric lot identifier.
pub type LotId = u32;

/// A parking lot and its precomputed walking-distance polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct LotGeometry {
    /// Stable lot identity.
    pub id: LotId,
    /// Key of this lot in the status records, if it is tracked at all.
    pub record_id: Option<LotId>,
    /// Display name.
    pub name: Option<String>,
    /// Street address.
    pub address: Option<String>,
    /// Lot entrance location (lng/lat).
    pub location: Point<f64>,
    /// Area reachable on foot from the lot.
    pub isochrone: Polygon<f64>,
}

/// Status of one lot aggregated over the resolved timestamps of a view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotSummary {
    /// The lot this summary describes.
    pub lot_id: LotId,
    /// One entry per resolved timestamp that had data for the lot.
    pub history: Vec<LotStatus>,
    /// Mean grade of the history (`-1` when nothing is graded).
    pub grade: f64,
    /// Per-status tally of the history.
    pub counts: StatusCounts,
}

impl LotSummary {
    /// Summarizes a status history.
    #[must_use]
    pub fn from_history(lot_id: LotId, history: Vec<LotStatus>) -> Self {
        let grade = mean_grade(&history);
        let counts = counts_by_status(&history);
        Self {
            lot_id,
            history,
            grade,
            counts,
        }
    }

    /// Representative status of the lot for this view.
    ///
    /// The most frequent status in the history, ties going to the
    /// higher-priority status. A lot with no history is unknown.
    #[must_use]
    pub fn status(&self) -> LotStatus {
        self.counts.dominant()
    }
}
