//! Composition results and their `GeoJSON` rendering.

use geo::{Area, MultiPolygon};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use parking_map_status_models::LotStatus;

use crate::GeometryError;

/// The merged walking-distance area of every lot with one status.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRegion {
    /// Status shared by every lot contributing to this region.
    pub status: LotStatus,
    /// Merged area, minus any higher-priority regions.
    pub geometry: MultiPolygon<f64>,
}

/// Output of one composition run.
#[derive(Debug, Clone, Default)]
pub struct Composition {
    /// Non-empty regions, highest priority first. Pairwise disjoint up to
    /// shared boundaries.
    pub regions: Vec<StatusRegion>,
    /// Polygons or operations that were skipped along the way.
    pub errors: Vec<GeometryError>,
}

impl Composition {
    /// The region for `status`, if it is non-empty.
    #[must_use]
    pub fn region(&self, status: LotStatus) -> Option<&StatusRegion> {
        self.regions.iter().find(|region| region.status == status)
    }

    /// Whether no region survived composition.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Summed area of all regions, in squared coordinate units.
    #[must_use]
    pub fn total_area(&self) -> f64 {
        self.regions
            .iter()
            .map(|region| region.geometry.unsigned_area())
            .sum()
    }

    /// Renders the regions as a `FeatureCollection` with one `MultiPolygon`
    /// feature per region and a `status` property for styling.
    #[must_use]
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self
            .regions
            .iter()
            .map(|region| {
                let mut properties = JsonObject::new();
                properties.insert(
                    "status".to_string(),
                    serde_json::Value::String(region.status.to_string()),
                );

                Feature {
                    bbox: None,
                    geometry: Some(Geometry::new(geojson::Value::from(&region.geometry))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    #[test]
    fn features_are_tagged_with_status() {
        let square = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ];
        let composition = Composition {
            regions: vec![
                StatusRegion {
                    status: LotStatus::Available,
                    geometry: MultiPolygon::new(vec![square.clone()]),
                },
                StatusRegion {
                    status: LotStatus::Unknown,
                    geometry: MultiPolygon::new(vec![square]),
                },
            ],
            errors: vec![],
        };

        let collection = composition.to_feature_collection();
        let statuses: Vec<_> = collection
            .features
            .iter()
            .map(|feature| feature.property("status").cloned())
            .collect();
        assert_eq!(
            statuses,
            vec![
                Some(serde_json::json!("available")),
                Some(serde_json::json!("unknown")),
            ]
        );

        let value = serde_json::to_value(&collection).unwrap();
        assert_eq!(value["features"][0]["geometry"]["type"], "MultiPolygon");
    }
}
