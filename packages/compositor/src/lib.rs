#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Region compositor.
//!
//! Every lot contributes its walking-distance polygon tagged with the lot's
//! status. Those polygons overlap heavily, so shading them directly would
//! mix colors. The compositor merges them into at most three disjoint
//! regions, one per [`LotStatus`], where a point reachable from lots of
//! different statuses belongs to the highest-priority one:
//!
//! ```text
//! available = ∪ available polygons
//! full      = ∪ full polygons    − available
//! unknown   = ∪ unknown polygons − full − available
//! ```
//!
//! Composition is fail-soft. A polygon the geometry kernel cannot handle is
//! dropped and reported in [`Composition::errors`]; the rest of the map is
//! still produced.

mod output;

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use geo::{Area, BooleanOps, MultiPolygon, Polygon, Validation};
use parking_map_lots::LotCatalog;
use parking_map_lots_models::LotId;
use parking_map_status_models::LotStatus;

pub use output::{Composition, StatusRegion};

/// Errors recorded (not raised) while composing regions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    /// The lot's isochrone is not a valid polygon.
    #[error("Lot {lot_id} has an invalid isochrone: {reason}")]
    InvalidPolygon {
        /// Lot whose polygon was dropped.
        lot_id: LotId,
        /// What the validity check found.
        reason: String,
    },

    /// The geometry kernel failed to union the lot's isochrone.
    #[error("Union with the isochrone of lot {lot_id} failed")]
    UnionFailed {
        /// Lot whose polygon was dropped.
        lot_id: LotId,
    },

    /// The geometry kernel failed to subtract higher-priority regions.
    #[error("Subtracting higher-priority regions from the {status} region failed")]
    DifferenceFailed {
        /// Status whose region was dropped.
        status: LotStatus,
    },
}

/// One lot's contribution to a composition.
#[derive(Debug, Clone, Copy)]
pub struct CompositorInput<'a> {
    /// Lot the polygon belongs to, used in error reports.
    pub lot_id: LotId,
    /// The lot's walking-distance polygon.
    pub polygon: &'a Polygon<f64>,
    /// The lot's status for the viewed date.
    pub status: LotStatus,
}

/// Composes lot polygons into disjoint, priority-ordered status regions.
///
/// Regions are returned in priority order and only when non-empty. The
/// result does not depend on the order of inputs within a status, up to
/// floating-point noise along region boundaries.
#[must_use]
pub fn compose<'a>(inputs: impl IntoIterator<Item = CompositorInput<'a>>) -> Composition {
    let mut errors = Vec::new();
    let mut buckets: [Vec<(LotId, &Polygon<f64>)>; 3] = Default::default();

    for input in inputs {
        if let Err(reason) = validate(input.polygon) {
            record(
                &mut errors,
                GeometryError::InvalidPolygon {
                    lot_id: input.lot_id,
                    reason,
                },
            );
            continue;
        }
        buckets[input.status.priority()].push((input.lot_id, input.polygon));
    }

    let [available, full, unknown] =
        buckets.map(|bucket| union_bucket(&bucket, &mut errors, |a, b| a.union(b)));

    let full = subtract(
        full,
        &[available.as_ref()],
        LotStatus::Full,
        &mut errors,
        |a, b| a.difference(b),
    );
    let unknown = subtract(
        unknown,
        &[full.as_ref(), available.as_ref()],
        LotStatus::Unknown,
        &mut errors,
        |a, b| a.difference(b),
    );

    let regions = LotStatus::ALL
        .into_iter()
        .zip([available, full, unknown])
        .filter_map(|(status, geometry)| {
            geometry
                .filter(|geometry| !geometry.0.is_empty())
                .map(|geometry| StatusRegion { status, geometry })
        })
        .collect::<Vec<_>>();

    log::debug!(
        "Composed {} status regions ({} geometry errors)",
        regions.len(),
        errors.len()
    );

    Composition { regions, errors }
}

/// Composes every lot of `catalog`, looking statuses up by lot id.
///
/// Lots missing from `statuses` are treated as unknown.
#[must_use]
pub fn compose_catalog(catalog: &LotCatalog, statuses: &BTreeMap<LotId, LotStatus>) -> Composition {
    compose(catalog.lots().iter().map(|lot| CompositorInput {
        lot_id: lot.id,
        polygon: &lot.isochrone,
        status: statuses
            .get(&lot.id)
            .copied()
            .unwrap_or(LotStatus::Unknown),
    }))
}

fn record(errors: &mut Vec<GeometryError>, error: GeometryError) {
    log::warn!("{error}");
    errors.push(error);
}

/// Rejects polygons the boolean operations cannot be trusted with:
/// self-intersections, too few points, non-finite coordinates, and
/// zero-area rings.
fn validate(polygon: &Polygon<f64>) -> Result<(), String> {
    polygon.check_validation().map_err(|e| e.to_string())?;
    if polygon.unsigned_area() <= 0.0 {
        return Err("polygon has zero area".to_string());
    }
    Ok(())
}

/// Runs a boolean operation, turning a kernel panic into `None`.
fn guarded(op: impl FnOnce() -> MultiPolygon<f64>) -> Option<MultiPolygon<f64>> {
    catch_unwind(AssertUnwindSafe(op)).ok()
}

/// Folds a bucket into a single union, left to right.
///
/// A polygon whose union fails is dropped and the accumulator carries on
/// without it. An empty bucket has no union.
fn union_bucket(
    bucket: &[(LotId, &Polygon<f64>)],
    errors: &mut Vec<GeometryError>,
    union: impl Fn(&MultiPolygon<f64>, &Polygon<f64>) -> MultiPolygon<f64>,
) -> Option<MultiPolygon<f64>> {
    let mut accumulator: Option<MultiPolygon<f64>> = None;

    for (lot_id, polygon) in bucket {
        accumulator = Some(match accumulator {
            None => MultiPolygon::new(vec![(*polygon).clone()]),
            Some(current) => match guarded(|| union(&current, *polygon)) {
                Some(merged) => merged,
                None => {
                    record(errors, GeometryError::UnionFailed { lot_id: *lot_id });
                    current
                }
            },
        });
    }

    accumulator
}

/// Subtracts each higher-priority region from `region` in turn.
///
/// If any difference fails the whole region is dropped, so the result
/// never overlaps a higher-priority region.
fn subtract(
    region: Option<MultiPolygon<f64>>,
    higher: &[Option<&MultiPolygon<f64>>],
    status: LotStatus,
    errors: &mut Vec<GeometryError>,
    difference: impl Fn(&MultiPolygon<f64>, &MultiPolygon<f64>) -> MultiPolygon<f64>,
) -> Option<MultiPolygon<f64>> {
    let mut remaining = region?;

    for cutter in higher.iter().flatten() {
        match guarded(|| difference(&remaining, *cutter)) {
            Some(cut) => remaining = cut,
            None => {
                record(errors, GeometryError::DifferenceFailed { status });
                return None;
            }
        }
    }

    Some(remaining)
}

#[cfg(test)]
mod tests {
    use geo::{Contains, Point, polygon};

    use super::*;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        polygon![
            (x: x0, y: y0),
            (x: x1, y: y0),
            (x: x1, y: y1),
            (x: x0, y: y1),
            (x: x0, y: y0),
        ]
    }

    fn input(lot_id: LotId, polygon: &Polygon<f64>, status: LotStatus) -> CompositorInput<'_> {
        CompositorInput {
            lot_id,
            polygon,
            status,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9 * expected.abs().max(1.0),
            "expected area {expected}, got {actual}"
        );
    }

    #[test]
    fn higher_priority_wins_overlap() {
        let a = rect(0.0, 0.0, 2.0, 2.0);
        let b = rect(1.0, 0.0, 3.0, 2.0);

        let composition = compose([
            input(1, &a, LotStatus::Available),
            input(2, &b, LotStatus::Full),
        ]);

        assert!(composition.errors.is_empty());
        let available = composition.region(LotStatus::Available).unwrap();
        let full = composition.region(LotStatus::Full).unwrap();
        assert!(composition.region(LotStatus::Unknown).is_none());

        assert_close(available.geometry.unsigned_area(), 4.0);
        assert_close(full.geometry.unsigned_area(), 2.0);

        let overlap = Point::new(1.5, 1.0);
        assert!(available.geometry.contains(&overlap));
        assert!(!full.geometry.contains(&overlap));
        assert!(full.geometry.contains(&Point::new(2.5, 1.0)));
    }

    #[test]
    fn unknown_is_cut_by_both_higher_regions() {
        let a = rect(0.0, 0.0, 2.0, 2.0);
        let b = rect(1.0, 0.0, 3.0, 2.0);
        let c = rect(0.0, 1.0, 4.0, 3.0);

        let composition = compose([
            input(3, &c, LotStatus::Unknown),
            input(2, &b, LotStatus::Full),
            input(1, &a, LotStatus::Available),
        ]);

        let statuses: Vec<LotStatus> = composition.regions.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![LotStatus::Available, LotStatus::Full, LotStatus::Unknown]
        );

        let unknown = composition.region(LotStatus::Unknown).unwrap();
        assert_close(unknown.geometry.unsigned_area(), 5.0);
        assert_close(composition.total_area(), 11.0);
    }

    #[test]
    fn every_covered_point_has_exactly_one_highest_status() {
        let polygons = [
            (rect(0.0, 0.0, 2.0, 2.0), LotStatus::Full),
            (rect(1.0, 1.0, 3.0, 3.0), LotStatus::Available),
            (rect(2.0, 0.0, 4.0, 2.0), LotStatus::Unknown),
            (rect(0.5, 2.5, 3.5, 4.0), LotStatus::Unknown),
            (rect(3.0, 3.0, 4.0, 4.0), LotStatus::Full),
        ];

        let composition = compose(
            polygons
                .iter()
                .enumerate()
                .map(|(i, (polygon, status))| input(LotId::try_from(i).unwrap(), polygon, *status)),
        );
        assert!(composition.errors.is_empty());

        for xi in 0..18 {
            for yi in 0..18 {
                let point = Point::new(0.125 + 0.25 * f64::from(xi), 0.125 + 0.25 * f64::from(yi));

                let expected = polygons
                    .iter()
                    .filter(|(polygon, _)| polygon.contains(&point))
                    .map(|(_, status)| *status)
                    .min();

                let covering: Vec<LotStatus> = composition
                    .regions
                    .iter()
                    .filter(|region| region.geometry.contains(&point))
                    .map(|region| region.status)
                    .collect();

                match expected {
                    Some(status) => assert_eq!(covering, vec![status], "at {point:?}"),
                    None => assert!(covering.is_empty(), "uncovered {point:?} got {covering:?}"),
                }
            }
        }
    }

    #[test]
    fn union_ignores_bucket_order() {
        let squares = [
            rect(0.0, 0.0, 2.0, 2.0),
            rect(1.0, 1.0, 3.0, 3.0),
            rect(2.5, 0.0, 4.0, 1.5),
            rect(10.0, 10.0, 11.0, 11.0),
        ];

        let forward = compose(
            squares
                .iter()
                .map(|square| input(1, square, LotStatus::Available)),
        );
        let backward = compose(
            squares
                .iter()
                .rev()
                .map(|square| input(1, square, LotStatus::Available)),
        );

        assert_close(forward.total_area(), backward.total_area());
        assert_close(forward.total_area(), 4.0 + 4.0 - 1.0 + 1.5 * 1.5 - 0.5 * 0.5 + 1.0);
    }

    #[test]
    fn failed_union_drops_only_that_polygon() {
        let a = rect(0.0, 0.0, 1.0, 1.0);
        let b = rect(2.0, 0.0, 3.0, 1.0);
        let c = rect(4.0, 0.0, 5.0, 1.0);
        let bucket = [(1, &a), (2, &b), (3, &c)];
        let mut errors = Vec::new();

        let merged = union_bucket(&bucket, &mut errors, |current, polygon| {
            assert!(polygon != &b, "kernel rejected lot 2");
            current.union(polygon)
        })
        .unwrap();

        assert_eq!(errors, vec![GeometryError::UnionFailed { lot_id: 2 }]);
        assert_close(merged.unsigned_area(), 2.0);
        assert!(merged.contains(&Point::new(4.5, 0.5)));
        assert!(!merged.contains(&Point::new(2.5, 0.5)));
    }

    #[test]
    fn failed_difference_drops_the_region() {
        let region = MultiPolygon::new(vec![rect(0.0, 0.0, 2.0, 2.0)]);
        let cutter = MultiPolygon::new(vec![rect(1.0, 0.0, 3.0, 2.0)]);
        let mut errors = Vec::new();

        let result = subtract(
            Some(region.clone()),
            &[Some(&cutter)],
            LotStatus::Full,
            &mut errors,
            |_, _| panic!("kernel failure"),
        );

        assert!(result.is_none());
        assert_eq!(
            errors,
            vec![GeometryError::DifferenceFailed {
                status: LotStatus::Full
            }]
        );

        let mut errors = Vec::new();
        let result = subtract(
            Some(region),
            &[None, Some(&cutter)],
            LotStatus::Unknown,
            &mut errors,
            |a, b| a.difference(b),
        )
        .unwrap();
        assert!(errors.is_empty());
        assert_close(result.unsigned_area(), 2.0);
    }

    #[test]
    fn empty_bucket_has_no_union() {
        let mut errors = Vec::new();
        assert!(union_bucket(&[], &mut errors, |a, b| a.union(b)).is_none());
        assert!(errors.is_empty());
    }

    #[test]
    fn invalid_polygons_are_dropped() {
        let bowtie = polygon![
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 2.0),
            (x: 2.0, y: 0.0),
            (x: 0.0, y: 2.0),
            (x: 0.0, y: 0.0),
        ];
        let flat = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 2.0, y: 0.0),
            (x: 0.0, y: 0.0),
        ];
        let good = rect(5.0, 5.0, 6.0, 6.0);

        let composition = compose([
            input(1, &bowtie, LotStatus::Full),
            input(2, &good, LotStatus::Full),
            input(3, &flat, LotStatus::Available),
        ]);

        assert_eq!(composition.errors.len(), 2);
        assert!(matches!(
            composition.errors[0],
            GeometryError::InvalidPolygon { lot_id: 1, .. }
        ));
        assert!(matches!(
            composition.errors[1],
            GeometryError::InvalidPolygon { lot_id: 3, .. }
        ));

        assert_eq!(composition.regions.len(), 1);
        let full = composition.region(LotStatus::Full).unwrap();
        assert_close(full.geometry.unsigned_area(), 1.0);
    }

    #[test]
    fn fully_covered_region_is_omitted() {
        let big = rect(0.0, 0.0, 4.0, 4.0);
        let small = rect(1.0, 1.0, 2.0, 2.0);

        let composition = compose([
            input(1, &big, LotStatus::Available),
            input(2, &small, LotStatus::Full),
        ]);

        assert_eq!(composition.regions.len(), 1);
        assert_eq!(composition.regions[0].status, LotStatus::Available);
    }

    #[test]
    fn empty_input_has_no_regions() {
        let composition = compose(std::iter::empty());
        assert!(composition.is_empty());
        assert!(composition.to_feature_collection().features.is_empty());
    }

    #[test]
    fn catalog_lots_without_status_are_unknown() {
        use parking_map_lots_models::LotGeometry;

        let lot = |id, polygon: Polygon<f64>| LotGeometry {
            id,
            record_id: Some(id),
            name: None,
            address: None,
            location: Point::new(0.0, 0.0),
            isochrone: polygon,
        };
        let catalog = LotCatalog::new(vec![
            lot(1, rect(0.0, 0.0, 1.0, 1.0)),
            lot(2, rect(2.0, 0.0, 3.0, 1.0)),
        ]);

        let composition =
            compose_catalog(&catalog, &BTreeMap::from([(1, LotStatus::Full)]));

        let statuses: Vec<LotStatus> = composition.regions.iter().map(|r| r.status).collect();
        assert_eq!(statuses, vec![LotStatus::Full, LotStatus::Unknown]);
    }
}
