#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Remote data sources for area overrides and the price timeline.
//!
//! A [`DataSource`] returns the two JSON payloads the map consumes: an
//! array of [`AreaOverride`] records and a [`TimelineResponse`]. The REST
//! API ([`HttpDataSource`]) and local files ([`FileDataSource`]) both
//! implement it. Responses are matched to their requests with
//! [`generation::RequestGenerations`] so a slow response never overwrites
//! newer state.

pub mod generation;
pub mod retry;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use realty_map_area_models::{AreaOverride, TimeBucket, TimelineResponse};
use serde::Deserialize;
use serde::de::DeserializeOwned;

pub use generation::{FetchChannel, RequestGenerations, RequestToken, StaleResponseError};
pub use retry::RetryPolicy;

/// Errors that can occur while fetching remote data.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an error status.
    #[error("Unexpected response: {message}")]
    Status { message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error reading a local payload.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The source has no payload for this request.
    #[error("{what} is not available from {source_name}")]
    Unavailable { what: String, source_name: String },
}

/// Provider of the remote map data.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Fetches the authoritative per-area overrides.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the payload cannot be fetched or parsed.
    async fn fetch_overrides(&self) -> Result<Vec<AreaOverride>, SourceError>;

    /// Fetches the historical timeline.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the payload cannot be fetched or parsed.
    async fn fetch_timeline(&self) -> Result<TimelineResponse, SourceError>;
}

/// Parses an override payload. Missing fields become `None`.
///
/// Records that cannot be read (e.g. without an area id) are logged and
/// skipped; the rest of the array is kept.
///
/// # Errors
///
/// Returns [`SourceError::Json`] if the value is not an array.
pub fn parse_overrides(value: serde_json::Value) -> Result<Vec<AreaOverride>, SourceError> {
    let values: Vec<serde_json::Value> = serde_json::from_value(value)?;
    Ok(parse_records(values, "override"))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTimeline {
    #[serde(default)]
    bucket_keys: Vec<String>,
    #[serde(default)]
    buckets: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct RawBucket {
    key: String,
    #[serde(default)]
    areas: Vec<serde_json::Value>,
}

/// Parses a timeline payload. Missing fields become empty or `None`.
///
/// Buckets without a key and area records without an area id are logged
/// and skipped.
///
/// # Errors
///
/// Returns [`SourceError::Json`] if the value is not a timeline object.
pub fn parse_timeline(value: serde_json::Value) -> Result<TimelineResponse, SourceError> {
    let raw: RawTimeline = serde_json::from_value(value)?;
    let buckets = parse_records::<RawBucket>(raw.buckets, "timeline bucket")
        .into_iter()
        .map(|bucket| TimeBucket {
            areas: parse_records(bucket.areas, "timeline record"),
            key: bucket.key,
        })
        .collect();

    Ok(TimelineResponse {
        bucket_keys: raw.bucket_keys,
        buckets,
    })
}

fn parse_records<T: DeserializeOwned>(values: Vec<serde_json::Value>, what: &str) -> Vec<T> {
    let total = values.len();
    let records: Vec<T> = values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Skipping {what} #{index}: {e}");
                None
            }
        })
        .collect();
    if records.len() < total {
        log::warn!("Kept {} of {total} {what} entries", records.len());
    }
    records
}

/// The REST API.
#[derive(Debug, Clone)]
pub struct HttpDataSource {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpDataSource {
    /// Creates a source rooted at `base_url` (e.g. `http://localhost:3001/api`).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_overrides(&self) -> Result<Vec<AreaOverride>, SourceError> {
        let url = self.endpoint("quartieri");
        log::info!("Fetching area overrides from {url}");
        let body = retry::send_json(|| self.client.get(&url), self.retry).await?;
        let records = parse_overrides(body)?;
        log::info!("Fetched {} area overrides", records.len());
        Ok(records)
    }

    async fn fetch_timeline(&self) -> Result<TimelineResponse, SourceError> {
        let url = self.endpoint("timeline");
        log::info!("Fetching timeline from {url}");
        let body = retry::send_json(|| self.client.get(&url), self.retry).await?;
        let timeline = parse_timeline(body)?;
        log::info!("Fetched timeline with {} buckets", timeline.buckets.len());
        Ok(timeline)
    }
}

/// JSON payloads on disk, for offline runs.
#[derive(Debug, Clone, Default)]
pub struct FileDataSource {
    overrides: Option<PathBuf>,
    timeline: Option<PathBuf>,
}

impl FileDataSource {
    #[must_use]
    pub const fn new(overrides: Option<PathBuf>, timeline: Option<PathBuf>) -> Self {
        Self {
            overrides,
            timeline,
        }
    }

    async fn read_json(&self, path: Option<&Path>, what: &str) -> Result<serde_json::Value, SourceError> {
        let Some(path) = path else {
            return Err(SourceError::Unavailable {
                what: what.to_string(),
                source_name: self.name().to_string(),
            });
        };
        log::info!("Reading {what} from {}", path.display());
        let text = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl DataSource for FileDataSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch_overrides(&self) -> Result<Vec<AreaOverride>, SourceError> {
        parse_overrides(self.read_json(self.overrides.as_deref(), "overrides").await?)
    }

    async fn fetch_timeline(&self) -> Result<TimelineResponse, SourceError> {
        parse_timeline(self.read_json(self.timeline.as_deref(), "timeline").await?)
    }
}

#[cfg(test)]
mod tests {
    use realty_map_area_models::AreaId;

    use super::*;

    #[test]
    fn overrides_tolerate_missing_fields() {
        let records = parse_overrides(serde_json::json!([
            { "areaId": "brera", "purchasePrice": 9100.0 },
            { "id": "isola", "rentPrice": null },
        ]))
        .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].purchase_price, Some(9100.0));
        assert_eq!(records[0].rent_price, None);
        assert_eq!(records[1].area_id, AreaId::from("isola"));
    }

    #[test]
    fn timeline_payload_contract() {
        let timeline = parse_timeline(serde_json::json!({
            "bucketKeys": ["2023_H2", "2024_H1"],
            "buckets": [
                { "key": "2023_H2", "areas": [{ "areaId": "x", "purchasePrice": 3000.0 }] },
                { "key": "2024_H1", "areas": [{ "areaId": "x", "purchasePrice": 3300.0, "rentPrice": 12.0 }] }
            ]
        }))
        .unwrap();
        assert_eq!(timeline.bucket_keys.len(), 2);
        assert_eq!(timeline.buckets[1].areas[0].rent_price, Some(12.0));
        assert_eq!(timeline.buckets[0].areas[0].rent_price, None);
    }

    #[test]
    fn overrides_must_be_an_array() {
        assert!(matches!(
            parse_overrides(serde_json::json!({ "areaId": "x" })),
            Err(SourceError::Json(_))
        ));
    }

    #[test]
    fn override_without_area_id_is_skipped() {
        let records = parse_overrides(serde_json::json!([
            { "areaId": "brera", "purchasePrice": 9100.0 },
            { "purchasePrice": 3000.0 },
            { "areaId": "isola", "purchasePrice": "n/a" },
            { "areaId": "isola", "rentPrice": 24.5 },
        ]))
        .unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.area_id.as_str()).collect();
        assert_eq!(ids, ["brera", "isola"]);
        assert_eq!(records[1].rent_price, Some(24.5));
    }

    #[test]
    fn timeline_keeps_valid_records_around_bad_ones() {
        let timeline = parse_timeline(serde_json::json!({
            "bucketKeys": ["2023_H2", "2024_H1"],
            "buckets": [
                { "areas": [{ "areaId": "lost", "purchasePrice": 1.0 }] },
                {
                    "key": "2023_H2",
                    "areas": [
                        { "purchasePrice": 2800.0 },
                        { "areaId": "x", "purchasePrice": 3000.0 }
                    ]
                },
                { "key": "2024_H1", "areas": [{ "areaId": "x", "purchasePrice": 3300.0 }] }
            ]
        }))
        .unwrap();
        assert_eq!(timeline.buckets.len(), 2);
        assert_eq!(timeline.buckets[0].key, "2023_H2");
        assert_eq!(timeline.buckets[0].areas.len(), 1);
        assert_eq!(timeline.buckets[0].areas[0].area_id, AreaId::from("x"));
        assert_eq!(timeline.buckets[1].areas[0].purchase_price, Some(3300.0));
    }

    #[test]
    fn timeline_must_be_an_object() {
        assert!(matches!(
            parse_timeline(serde_json::json!([1, 2])),
            Err(SourceError::Json(_))
        ));
    }

    #[test]
    fn http_endpoints_are_joined_to_base() {
        let source = HttpDataSource::new("http://localhost:3001/api/");
        assert_eq!(source.base_url(), "http://localhost:3001/api");
        assert_eq!(source.endpoint("timeline"), "http://localhost:3001/api/timeline");
    }

    #[tokio::test]
    async fn file_source_reads_payloads() {
        let dir = std::env::temp_dir().join(format!("realty_map_source_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let overrides = dir.join("overrides.json");
        std::fs::write(&overrides, r#"[{"areaId":"brera","semiAnnualChange":1.5}]"#).unwrap();

        let source = FileDataSource::new(Some(overrides), None);
        let records = source.fetch_overrides().await.unwrap();
        assert_eq!(records[0].semi_annual_change, Some(1.5));

        let err = source.fetch_timeline().await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable { .. }), "got {err}");

        std::fs::remove_dir_all(&dir).ok();
    }
}
