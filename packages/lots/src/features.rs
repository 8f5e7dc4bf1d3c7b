//! Marker features for the lot points layer.

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, feature::Id};
use parking_map_lots_models::LotSummary;

use crate::LotCatalog;

/// Builds one point feature per summarized lot, in summary order.
///
/// Each feature carries the lot's `id`, `name`, `address`, representative
/// `status`, mean `grade`, full `statuses` history and per-status `counts`,
/// which the renderer uses for marker color, size and popup content.
#[must_use]
pub fn lot_points(catalog: &LotCatalog, summaries: &[LotSummary]) -> FeatureCollection {
    let features = summaries
        .iter()
        .filter_map(|summary| {
            let Some(lot) = catalog.get(summary.lot_id) else {
                log::warn!("No geometry for summarized lot {}", summary.lot_id);
                return None;
            };

            let mut properties = JsonObject::new();
            properties.insert("id".to_string(), serde_json::json!(lot.id));
            properties.insert("name".to_string(), serde_json::json!(lot.name));
            properties.insert("address".to_string(), serde_json::json!(lot.address));
            properties.insert(
                "status".to_string(),
                serde_json::json!(summary.status()),
            );
            properties.insert("grade".to_string(), serde_json::json!(summary.grade));
            properties.insert("statuses".to_string(), serde_json::json!(summary.history));
            properties.insert("counts".to_string(), serde_json::json!(summary.counts));

            Some(Feature {
                bbox: None,
                geometry: Some(Geometry::new(geojson::Value::from(&lot.location))),
                id: Some(Id::Number(lot.id.into())),
                properties: Some(properties),
                foreign_members: None,
            })
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}
