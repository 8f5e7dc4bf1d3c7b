//! Parses lot isochrone features into [`LotGeometry`] values.
//!
//! Expected feature properties:
//!
//! * `gis_id` (or `id`): numeric lot id, required.
//! * `ahuzot_id`: status-record id, may be `null` for untracked lots. When
//!   the property is absent the lot id doubles as the record id.
//! * `gis_name` (or `name`), `address`: optional display fields.
//! * `lot_longitude`, `lot_latitude`: optional entrance location. The
//!   isochrone centroid is used when missing.

use geo::{Centroid, Point, Polygon};
use geojson::{Feature, GeoJson};
use parking_map_lots_models::{LotGeometry, LotId};
use serde_json::Value;

use crate::LotsError;

/// Parses an isochrone `FeatureCollection`.
///
/// # Errors
///
/// Returns [`LotsError`] if the input is not a `GeoJSON` `FeatureCollection`.
pub fn parse_isochrones(geojson_str: &str) -> Result<Vec<LotGeometry>, LotsError> {
    let GeoJson::FeatureCollection(collection) = geojson_str.parse::<GeoJson>()? else {
        return Err(LotsError::NotFeatureCollection);
    };

    let total = collection.features.len();
    let lots: Vec<LotGeometry> = collection
        .features
        .into_iter()
        .enumerate()
        .filter_map(|(position, feature)| {
            let lot = parse_feature(feature);
            if lot.is_none() {
                log::warn!("Skipping isochrone feature #{position}: missing id or polygon");
            }
            lot
        })
        .collect();

    if lots.len() < total {
        log::warn!("Parsed {} of {total} isochrone features", lots.len());
    }

    Ok(lots)
}

/// Parses a single feature. Returns `None` if it has no usable id or
/// polygon.
fn parse_feature(mut feature: Feature) -> Option<LotGeometry> {
    let id = feature
        .property("gis_id")
        .or_else(|| feature.property("id"))
        .and_then(json_lot_id)?;

    let record_id = if feature.contains_property("ahuzot_id") {
        feature.property("ahuzot_id").and_then(json_lot_id)
    } else {
        feature.property("id").and_then(json_lot_id)
    };

    let name = feature
        .property("gis_name")
        .or_else(|| feature.property("name"))
        .and_then(json_text);
    let address = feature.property("address").and_then(json_text);

    let isochrone = extract_polygon(feature.geometry.take()?)?;

    let location = feature
        .property("lot_longitude")
        .and_then(Value::as_f64)
        .zip(feature.property("lot_latitude").and_then(Value::as_f64))
        .map(|(lng, lat)| Point::new(lng, lat))
        .or_else(|| isochrone.centroid())?;

    Some(LotGeometry {
        id,
        record_id,
        name,
        address,
        location,
        isochrone,
    })
}

/// Converts a `GeoJSON` geometry into a single polygon. A `MultiPolygon`
/// is only accepted if it holds exactly one polygon.
fn extract_polygon(geometry: geojson::Geometry) -> Option<Polygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::Polygon(polygon) => Some(polygon),
        geo::Geometry::MultiPolygon(mut multi) if multi.0.len() == 1 => multi.0.pop(),
        _ => None,
    }
}

/// Reads a lot id from a number (integral float allowed) or numeric string.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn json_lot_id(value: &Value) -> Option<LotId> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .and_then(|n| LotId::try_from(n).ok())
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|f| f.fract() == 0.0 && (0.0..=f64::from(LotId::MAX)).contains(f))
                    .map(|f| f as LotId)
            }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn json_text(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}
