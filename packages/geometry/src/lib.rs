#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry and feature builder.
//!
//! Turns derived area records into the two `GeoJSON` sources the map
//! renders: polygons for the area fills and one point per area for labels.
//! Authoritative rings are used verbatim; areas without one get a
//! deterministic synthetic polygon around their centroid (see
//! [`synthetic`]). Feature ids are the area ids, so feature-state
//! addressing stays stable across rebuilds.

pub mod bounds;
pub mod synthetic;

use geo::{Centroid, LineString, Polygon};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value, feature::Id};
use realty_map_area_models::{Area, AreaId, DataIntegrityError, LatLng, Ring};
use realty_map_merge::DerivedArea;

pub use bounds::Bounds;
pub use synthetic::{SyntheticShape, fnv1a32, synthetic_ring};

/// Output of [`build_features`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBuild {
    /// Polygon features, one per accepted area.
    pub areas: FeatureCollection,
    /// Point features at each accepted area's label anchor.
    pub labels: FeatureCollection,
    /// Areas that were excluded from both collections.
    pub rejected: Vec<DataIntegrityError>,
}

impl FeatureBuild {
    /// Ids of the emitted features, in output order.
    #[must_use]
    pub fn ids(&self) -> Vec<AreaId> {
        self.areas
            .features
            .iter()
            .filter_map(|feature| match &feature.id {
                Some(Id::String(id)) => Some(AreaId::from(id.as_str())),
                _ => None,
            })
            .collect()
    }
}

/// The ring rendered for `area`: its own geometry or a synthetic one.
///
/// Returns `None` when the area has neither a ring nor a centroid.
#[must_use]
pub fn area_ring(area: &Area, shape: SyntheticShape) -> Option<Ring> {
    area.geometry().cloned().or_else(|| {
        area.centroid
            .map(|center| synthetic_ring(center, &area.id, shape))
    })
}

/// Label anchor: the centroid, or the centroid of the authoritative ring.
#[must_use]
pub fn label_point(area: &Area) -> Option<LatLng> {
    area.centroid.or_else(|| {
        let ring = area.geometry()?;
        Polygon::new(LineString::from(ring.clone()), vec![])
            .centroid()
            .map(|point| LatLng::new(point.x(), point.y()))
    })
}

/// Builds the polygon and label sources for `areas`.
///
/// Areas with neither geometry nor centroid are reported in
/// [`FeatureBuild::rejected`] and left out; everything else is emitted in
/// input order.
#[must_use]
pub fn build_features(areas: &[DerivedArea], shape: SyntheticShape) -> FeatureBuild {
    let mut polygons = Vec::with_capacity(areas.len());
    let mut points = Vec::with_capacity(areas.len());
    let mut rejected = Vec::new();

    for derived in areas {
        let area = &derived.area;
        let (Some(ring), Some(anchor)) = (area_ring(area, shape), label_point(area)) else {
            log::warn!("Area {} has neither geometry nor centroid, skipping", area.id);
            rejected.push(DataIntegrityError::MissingGeometry {
                id: area.id.clone(),
            });
            continue;
        };

        let properties = feature_properties(derived);
        let ring = ring.into_iter().map(Vec::from).collect();
        polygons.push(feature(
            &area.id,
            Value::Polygon(vec![ring]),
            properties.clone(),
        ));
        points.push(feature(
            &area.id,
            Value::Point(vec![anchor.lng, anchor.lat]),
            properties,
        ));
    }

    log::debug!(
        "Built {} area features ({} rejected)",
        polygons.len(),
        rejected.len()
    );

    FeatureBuild {
        areas: collection(polygons),
        labels: collection(points),
        rejected,
    }
}

fn feature(id: &AreaId, value: Value, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(value)),
        id: Some(Id::String(id.to_string())),
        properties: Some(properties),
        foreign_members: None,
    }
}

const fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Feature properties shared by the polygon and label features.
///
/// `color` is the purchase price band; `mapColor` follows the active
/// selector.
#[must_use]
pub fn feature_properties(derived: &DerivedArea) -> JsonObject {
    let area = &derived.area;
    let mut props = JsonObject::new();
    props.insert("id".to_string(), area.id.as_str().into());
    props.insert("name".to_string(), area.name.as_str().into());
    props.insert("shortName".to_string(), area.short_name.as_str().into());
    props.insert("zone".to_string(), area.zone_code.as_str().into());
    props.insert("tier".to_string(), area.tier.as_str().into());
    props.insert("purchasePrice".to_string(), area.purchase_price.into());
    props.insert("rentPrice".to_string(), area.rent_price.into());
    props.insert("semiAnnualChange".to_string(), area.semi_annual_change.into());
    props.insert("color".to_string(), derived.price_color.into());
    props.insert("mapColor".to_string(), derived.color.into());
    props.insert("mapMetricValue".to_string(), derived.metric_value.into());
    props.insert(
        "mapMetricLabel".to_string(),
        derived.metric_label.as_str().into(),
    );
    props
}
