#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory catalog of parking lots and their walking-distance polygons.
//!
//! Loads the precomputed isochrone `GeoJSON` once at startup, builds an
//! R-tree over the isochrone envelopes for "which lots can I walk to from
//! here" lookups, and turns per-view status histories into lot summaries
//! and marker features.

pub mod features;
pub mod parse;

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::Path;

use geo::{BoundingRect, Contains, Point};
use parking_map_lots_models::{LotGeometry, LotId, LotSummary};
use parking_map_status_models::LotStatus;
use rstar::{AABB, RTree, RTreeObject};

pub use features::lot_points;

/// Errors that can occur while loading the lot catalog.
#[derive(Debug, thiserror::Error)]
pub enum LotsError {
    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The input is valid `GeoJSON` but not a `FeatureCollection`.
    #[error("Expected a GeoJSON FeatureCollection of lot isochrones")]
    NotFeatureCollection,
}

/// An isochrone envelope stored in the R-tree, pointing back at its lot.
struct CoverageEntry {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for CoverageEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// All parking lots, loaded once and shared read-only.
pub struct LotCatalog {
    lots: Vec<LotGeometry>,
    by_id: BTreeMap<LotId, usize>,
    coverage: RTree<CoverageEntry>,
}

impl LotCatalog {
    /// Builds the catalog and its coverage index.
    #[must_use]
    pub fn new(lots: Vec<LotGeometry>) -> Self {
        let entries = lots
            .iter()
            .enumerate()
            .map(|(index, lot)| CoverageEntry {
                index,
                envelope: compute_envelope(lot),
            })
            .collect();

        let mut by_id = BTreeMap::new();
        for (index, lot) in lots.iter().enumerate() {
            match by_id.entry(lot.id) {
                Entry::Vacant(entry) => {
                    entry.insert(index);
                }
                Entry::Occupied(_) => {
                    log::warn!("Duplicate lot id {}; keeping the first", lot.id);
                }
            }
        }

        Self {
            lots,
            by_id,
            coverage: RTree::bulk_load(entries),
        }
    }

    /// Parses an isochrone `FeatureCollection`.
    ///
    /// Features without a usable id or polygon are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`LotsError`] if the input is not a `GeoJSON`
    /// `FeatureCollection`.
    pub fn from_geojson(geojson_str: &str) -> Result<Self, LotsError> {
        let lots = parse::parse_isochrones(geojson_str)?;
        Ok(Self::new(lots))
    }

    /// Reads and parses an isochrone file.
    ///
    /// # Errors
    ///
    /// Returns [`LotsError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, LotsError> {
        let geojson_str = std::fs::read_to_string(path)?;
        let catalog = Self::from_geojson(&geojson_str)?;
        log::info!(
            "Loaded {} lot isochrones from {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// All lots in input order.
    #[must_use]
    pub fn lots(&self) -> &[LotGeometry] {
        &self.lots
    }

    /// Looks up a lot by id. With duplicate ids the first lot wins.
    #[must_use]
    pub fn get(&self, id: LotId) -> Option<&LotGeometry> {
        self.by_id.get(&id).map(|index| &self.lots[*index])
    }

    /// Number of lots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lots.len()
    }

    /// Whether the catalog holds no lots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    /// Summarizes every lot against per-record status histories.
    ///
    /// Histories are keyed by status-record id. Lots without a record id, or
    /// whose record id has no history, get an empty history. The result is
    /// sorted by ascending grade, so lots with no graded data come first.
    #[must_use]
    pub fn summaries(&self, histories: &BTreeMap<LotId, Vec<LotStatus>>) -> Vec<LotSummary> {
        let mut summaries: Vec<LotSummary> = self
            .lots
            .iter()
            .map(|lot| {
                let history = lot
                    .record_id
                    .and_then(|record_id| histories.get(&record_id))
                    .cloned()
                    .unwrap_or_default();
                LotSummary::from_history(lot.id, history)
            })
            .collect();

        summaries.sort_by(|a, b| a.grade.total_cmp(&b.grade));
        summaries
    }

    /// Lots whose isochrone contains the point (lng/lat), in id order.
    #[must_use]
    pub fn lots_covering(&self, lng: f64, lat: f64) -> Vec<&LotGeometry> {
        let point = Point::new(lng, lat);
        let query_env = AABB::from_point([lng, lat]);

        let mut covering: Vec<&LotGeometry> = self
            .coverage
            .locate_in_envelope_intersecting(&query_env)
            .map(|entry| &self.lots[entry.index])
            .filter(|lot| lot.isochrone.contains(&point))
            .collect();

        covering.sort_by_key(|lot| lot.id);
        covering
    }
}

/// Representative status of each lot, keyed by lot id.
#[must_use]
pub fn status_map(summaries: &[LotSummary]) -> BTreeMap<LotId, LotStatus> {
    summaries
        .iter()
        .map(|summary| (summary.lot_id, summary.status()))
        .collect()
}

/// Compute the bounding box envelope of a lot's isochrone.
fn compute_envelope(lot: &LotGeometry) -> AABB<[f64; 2]> {
    lot.isochrone.bounding_rect().map_or_else(
        || AABB::from_point([lot.location.x(), lot.location.y()]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    fn square_lot(id: LotId, record_id: Option<LotId>, x: f64, y: f64) -> LotGeometry {
        LotGeometry {
            id,
            record_id,
            name: None,
            address: None,
            location: Point::new(x + 0.5, y + 0.5),
            isochrone: polygon![
                (x: x, y: y),
                (x: x + 1.0, y: y),
                (x: x + 1.0, y: y + 1.0),
                (x: x, y: y + 1.0),
                (x: x, y: y),
            ],
        }
    }

    #[test]
    fn looks_lots_up_by_id() {
        let catalog = LotCatalog::new(vec![
            square_lot(7, Some(1), 0.0, 0.0),
            square_lot(3, None, 2.0, 0.0),
            square_lot(7, Some(2), 4.0, 0.0),
        ]);

        assert_eq!(catalog.get(3).map(|lot| lot.record_id), Some(None));
        assert_eq!(catalog.get(7).map(|lot| lot.record_id), Some(Some(1)));
        assert!(catalog.get(8).is_none());
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn finds_covering_lots() {
        let catalog = LotCatalog::new(vec![
            square_lot(1, Some(1), 0.0, 0.0),
            square_lot(2, Some(2), 0.5, 0.5),
            square_lot(3, Some(3), 5.0, 5.0),
        ]);

        let ids: Vec<LotId> = catalog
            .lots_covering(0.75, 0.75)
            .iter()
            .map(|lot| lot.id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(catalog.lots_covering(3.0, 3.0).is_empty());
    }

    #[test]
    fn summaries_use_record_ids_and_sort_by_grade() {
        let catalog = LotCatalog::new(vec![
            square_lot(10, Some(1), 0.0, 0.0),
            square_lot(20, Some(2), 2.0, 0.0),
            square_lot(30, None, 4.0, 0.0),
        ]);
        let histories = BTreeMap::from([
            (1, vec![LotStatus::Available]),
            (2, vec![LotStatus::Full, LotStatus::Available]),
        ]);

        let summaries = catalog.summaries(&histories);
        let order: Vec<LotId> = summaries.iter().map(|s| s.lot_id).collect();
        assert_eq!(order, vec![30, 20, 10]);

        let statuses = status_map(&summaries);
        assert_eq!(statuses.get(&10), Some(&LotStatus::Available));
        assert_eq!(statuses.get(&20), Some(&LotStatus::Available));
        assert_eq!(statuses.get(&30), Some(&LotStatus::Unknown));
    }
}
