#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Area, timeline and remote data contract types.
//!
//! These are the flat records every other realty-map crate consumes. An
//! [`Area`] is the immutable base record, joined across subsystems by its
//! [`AreaId`]. [`AreaOverride`] and [`TimelineResponse`] mirror the JSON the
//! REST API returns; every numeric field is optional and absent values
//! deserialize to `None` instead of failing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable join key for an area across data refreshes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AreaId(String);

impl AreaId {
    /// Creates an id from anything string-like.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AreaId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for AreaId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for AreaId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A WGS84 position. Serialized as a `[lng, lat]` pair, matching `GeoJSON`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LatLng {
    /// Longitude in degrees.
    pub lng: f64,
    /// Latitude in degrees.
    pub lat: f64,
}

impl LatLng {
    #[must_use]
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

impl From<[f64; 2]> for LatLng {
    fn from([lng, lat]: [f64; 2]) -> Self {
        Self { lng, lat }
    }
}

impl From<LatLng> for [f64; 2] {
    fn from(value: LatLng) -> Self {
        [value.lng, value.lat]
    }
}

/// A single exterior ring of `[lng, lat]` positions.
pub type Ring = Vec<[f64; 2]>;

/// Immutable base record for one area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Area {
    /// Stable join key.
    pub id: AreaId,
    /// Full display name.
    #[serde(default)]
    pub name: String,
    /// Short name used for map labels.
    #[serde(default)]
    pub short_name: String,
    /// Market zone code (e.g. `"C17"`).
    #[serde(default)]
    pub zone_code: String,
    /// Market tier letter (e.g. `"C"`).
    #[serde(default)]
    pub tier: String,
    /// Authoritative polygon exterior ring, when known.
    #[serde(default)]
    pub base_geometry: Option<Ring>,
    /// Label anchor and synthetic-geometry center.
    #[serde(default)]
    pub centroid: Option<LatLng>,
    /// Average purchase price per square meter.
    #[serde(default)]
    pub purchase_price: Option<f64>,
    /// Average monthly rent per square meter.
    #[serde(default)]
    pub rent_price: Option<f64>,
    /// Semi-annual purchase price change, in percent.
    #[serde(default)]
    pub semi_annual_change: Option<f64>,
}

impl Area {
    /// Returns the authoritative ring if it has any positions.
    #[must_use]
    pub fn geometry(&self) -> Option<&Ring> {
        self.base_geometry.as_ref().filter(|ring| !ring.is_empty())
    }
}

/// Authoritative numeric fields for one area, as returned by the REST API.
///
/// Fields left as `None` keep the base value when merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaOverride {
    /// Area this record applies to.
    #[serde(alias = "id")]
    pub area_id: AreaId,
    #[serde(default)]
    pub purchase_price: Option<f64>,
    #[serde(default)]
    pub rent_price: Option<f64>,
    #[serde(default)]
    pub semi_annual_change: Option<f64>,
}

/// One area's prices inside a [`TimeBucket`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineAreaRecord {
    pub area_id: AreaId,
    #[serde(default)]
    pub purchase_price: Option<f64>,
    #[serde(default)]
    pub rent_price: Option<f64>,
    /// Additional areas that share this record's values (one market zone
    /// can cover several map areas).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linked_area_ids: Vec<AreaId>,
}

impl TimelineAreaRecord {
    /// Iterates the record's own id followed by its linked ids.
    pub fn target_ids(&self) -> impl Iterator<Item = &AreaId> {
        std::iter::once(&self.area_id).chain(self.linked_area_ids.iter())
    }
}

/// A single historical snapshot (e.g. `"2024_H1"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBucket {
    pub key: String,
    #[serde(default)]
    pub areas: Vec<TimelineAreaRecord>,
}

/// Aggregate figures for one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketStats {
    pub average_purchase_price: Option<f64>,
    pub average_rent_price: Option<f64>,
    pub min_purchase_price: Option<f64>,
    pub max_purchase_price: Option<f64>,
    /// Number of records in the bucket.
    pub area_count: usize,
}

impl TimeBucket {
    /// Human-readable key: `"2024_H1"` becomes `"2024 H1"`.
    #[must_use]
    pub fn label(&self) -> String {
        self.key.replacen('_', " ", 1)
    }

    /// Looks up the record for `id`, either by its own id or a linked id.
    #[must_use]
    pub fn record_for(&self, id: &AreaId) -> Option<&TimelineAreaRecord> {
        self.areas
            .iter()
            .rev()
            .find(|record| record.target_ids().any(|target| target == id))
    }

    /// Computes averages and the purchase price range over all records.
    ///
    /// Records with a missing price are left out of that price's figures.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> BucketStats {
        let purchases: Vec<f64> = self
            .areas
            .iter()
            .filter_map(|r| r.purchase_price)
            .filter(|v| v.is_finite())
            .collect();
        let rents: Vec<f64> = self
            .areas
            .iter()
            .filter_map(|r| r.rent_price)
            .filter(|v| v.is_finite())
            .collect();

        let average = |values: &[f64]| {
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        };

        BucketStats {
            average_purchase_price: average(&purchases),
            average_rent_price: average(&rents),
            min_purchase_price: purchases.iter().copied().reduce(f64::min),
            max_purchase_price: purchases.iter().copied().reduce(f64::max),
            area_count: self.areas.len(),
        }
    }
}

/// Timeline payload as returned by the REST API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineResponse {
    /// Bucket keys in chronological order.
    #[serde(default)]
    pub bucket_keys: Vec<String>,
    #[serde(default)]
    pub buckets: Vec<TimeBucket>,
}

/// Ordered, gap-free sequence of buckets. Immutable once built.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Timeline {
    buckets: Vec<TimeBucket>,
}

impl Timeline {
    #[must_use]
    pub const fn new(buckets: Vec<TimeBucket>) -> Self {
        Self { buckets }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TimeBucket> {
        self.buckets.get(index)
    }

    /// Index of the most recent bucket.
    #[must_use]
    pub fn last_index(&self) -> Option<usize> {
        self.buckets.len().checked_sub(1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|b| b.key.as_str())
    }

    #[must_use]
    pub fn buckets(&self) -> &[TimeBucket] {
        &self.buckets
    }
}

impl From<TimelineResponse> for Timeline {
    /// Orders buckets by `bucket_keys`.
    ///
    /// A listed key without a bucket becomes an empty bucket so the sequence
    /// stays gap-free; buckets whose key is not listed are dropped. When no
    /// keys are listed the bucket order is taken as-is.
    fn from(response: TimelineResponse) -> Self {
        if response.bucket_keys.is_empty() {
            return Self::new(response.buckets);
        }

        let mut remaining = response.buckets;
        let buckets = response
            .bucket_keys
            .into_iter()
            .map(|key| {
                remaining
                    .iter()
                    .position(|b| b.key == key)
                    .map_or_else(
                        || TimeBucket {
                            key: key.clone(),
                            areas: Vec::new(),
                        },
                        |pos| remaining.swap_remove(pos),
                    )
            })
            .collect();

        Self::new(buckets)
    }
}

/// A recoverable problem with one input record.
///
/// The affected record is dropped and processing continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataIntegrityError {
    /// The area has neither a polygon nor a centroid.
    #[error("area {id} has neither geometry nor centroid")]
    MissingGeometry {
        /// Offending area.
        id: AreaId,
    },

    /// A record references an area that is not in the base dataset.
    #[error("record references unknown area {id}")]
    UnknownArea {
        /// The unknown id.
        id: AreaId,
    },

    /// The same id appears more than once in the base dataset.
    #[error("duplicate area id {id}")]
    DuplicateArea {
        /// The repeated id.
        id: AreaId,
    },
}

impl DataIntegrityError {
    /// The area id the problem concerns.
    #[must_use]
    pub const fn area_id(&self) -> &AreaId {
        match self {
            Self::MissingGeometry { id } | Self::UnknownArea { id } | Self::DuplicateArea { id } => {
                id
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, purchase: Option<f64>, rent: Option<f64>) -> TimelineAreaRecord {
        TimelineAreaRecord {
            area_id: AreaId::from(id),
            purchase_price: purchase,
            rent_price: rent,
            linked_area_ids: Vec::new(),
        }
    }

    #[test]
    fn area_missing_fields_default_to_none() {
        let area: Area = serde_json::from_str(r#"{"id":"brera","name":"BRERA"}"#).unwrap();
        assert_eq!(area.id.as_str(), "brera");
        assert!(area.centroid.is_none());
        assert!(area.purchase_price.is_none());
        assert!(area.geometry().is_none());
    }

    #[test]
    fn centroid_deserializes_from_lng_lat_pair() {
        let area: Area =
            serde_json::from_str(r#"{"id":"a","centroid":[9.19,45.47],"purchasePrice":null}"#)
                .unwrap();
        assert_eq!(area.centroid, Some(LatLng::new(9.19, 45.47)));
        assert!(area.purchase_price.is_none());
    }

    #[test]
    fn empty_ring_is_not_geometry() {
        let area: Area = serde_json::from_str(r#"{"id":"a","baseGeometry":[]}"#).unwrap();
        assert!(area.geometry().is_none());
    }

    #[test]
    fn override_accepts_id_alias() {
        let records: Vec<AreaOverride> =
            serde_json::from_str(r#"[{"id":"a","purchasePrice":3100},{"areaId":"b"}]"#).unwrap();
        assert_eq!(records[0].area_id.as_str(), "a");
        assert_eq!(records[0].purchase_price, Some(3100.0));
        assert_eq!(records[1].area_id.as_str(), "b");
        assert!(records[1].rent_price.is_none());
    }

    #[test]
    fn bucket_label_replaces_first_underscore() {
        let bucket = TimeBucket {
            key: "2024_H1".to_string(),
            areas: Vec::new(),
        };
        assert_eq!(bucket.label(), "2024 H1");
    }

    #[test]
    fn bucket_stats_skip_missing_prices() {
        let bucket = TimeBucket {
            key: "2024_H1".to_string(),
            areas: vec![
                record("a", Some(3000.0), Some(12.0)),
                record("b", Some(5000.0), None),
                record("c", None, Some(18.0)),
            ],
        };
        let stats = bucket.stats();
        assert_eq!(stats.area_count, 3);
        assert_eq!(stats.average_purchase_price, Some(4000.0));
        assert_eq!(stats.average_rent_price, Some(15.0));
        assert_eq!(stats.min_purchase_price, Some(3000.0));
        assert_eq!(stats.max_purchase_price, Some(5000.0));
    }

    #[test]
    fn empty_bucket_stats_are_none() {
        let stats = TimeBucket {
            key: "2020_H1".to_string(),
            areas: Vec::new(),
        }
        .stats();
        assert_eq!(stats.area_count, 0);
        assert!(stats.average_purchase_price.is_none());
        assert!(stats.max_purchase_price.is_none());
    }

    #[test]
    fn record_for_matches_linked_ids() {
        let mut shared = record("zone-d21", Some(3400.0), Some(12.7));
        shared.linked_area_ids = vec![AreaId::from("ronchetto"), AreaId::from("barona")];
        let bucket = TimeBucket {
            key: "2024_H1".to_string(),
            areas: vec![shared],
        };
        assert!(bucket.record_for(&AreaId::from("barona")).is_some());
        assert!(bucket.record_for(&AreaId::from("zone-d21")).is_some());
        assert!(bucket.record_for(&AreaId::from("brera")).is_none());
    }

    #[test]
    fn timeline_follows_bucket_key_order_and_fills_gaps() {
        let response: TimelineResponse = serde_json::from_str(
            r#"{
                "bucketKeys": ["2023_H2", "2024_H1", "2024_H2"],
                "buckets": [
                    {"key": "2024_H1", "areas": [{"areaId": "a", "purchasePrice": 3300}]},
                    {"key": "2023_H2", "areas": [{"areaId": "a", "purchasePrice": 3000}]},
                    {"key": "1999_H1", "areas": []}
                ]
            }"#,
        )
        .unwrap();

        let timeline = Timeline::from(response);
        let keys: Vec<&str> = timeline.keys().collect();
        assert_eq!(keys, vec!["2023_H2", "2024_H1", "2024_H2"]);
        assert!(timeline.get(2).unwrap().areas.is_empty());
        assert_eq!(timeline.last_index(), Some(2));
    }

    #[test]
    fn timeline_without_keys_keeps_bucket_order() {
        let response: TimelineResponse =
            serde_json::from_str(r#"{"buckets":[{"key":"b"},{"key":"a"}]}"#).unwrap();
        let timeline = Timeline::from(response);
        assert_eq!(timeline.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn empty_timeline_has_no_last_index() {
        assert_eq!(Timeline::default().last_index(), None);
        assert!(Timeline::default().is_empty());
    }
}
