#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Data merge and derivation layer.
//!
//! Projects the static base dataset through two overlay sources into the
//! [`DerivedArea`] records the map renders:
//!
//! 1. **Authoritative overrides** fetched from the REST API. A field present
//!    in the override replaces the base field; an absent field keeps it.
//! 2. **Timeline layer** built from the currently scrubbed time bucket. It
//!    has the higher priority and replaces all three numeric fields of every
//!    area it covers. It is never folded into the override map, so
//!    recomputing without it reproduces the pre-timeline output exactly.
//!
//! The derived color, value and label come from the metric engine for the
//! selector passed in. Inputs are only borrowed; nothing here mutates them.

use std::collections::{BTreeMap, BTreeSet};

use realty_map_area_models::{Area, AreaId, AreaOverride, DataIntegrityError};
use realty_map_metrics::{MetricFields, MetricSelector, evaluate, purchase_band_color};
use serde::Serialize;

/// Authoritative overrides keyed by area id.
pub type OverrideMap = BTreeMap<AreaId, AreaOverride>;

/// Indexes override records by area id. Later records win.
#[must_use]
pub fn index_overrides(records: Vec<AreaOverride>) -> OverrideMap {
    records
        .into_iter()
        .map(|record| (record.area_id.clone(), record))
        .collect()
}

/// An area with its metric projection for the active selector.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedArea {
    /// The area with overlays applied.
    #[serde(flatten)]
    pub area: Area,
    /// Purchase price band color, independent of the selector.
    pub price_color: &'static str,
    /// Value under the active selector.
    pub metric_value: Option<f64>,
    /// Formatted value under the active selector.
    pub metric_label: String,
    /// Legend color under the active selector.
    pub color: &'static str,
}

impl DerivedArea {
    #[must_use]
    pub const fn id(&self) -> &AreaId {
        &self.area.id
    }
}

/// Values for one area taken from a time bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineValues {
    pub purchase_price: Option<f64>,
    pub rent_price: Option<f64>,
    /// Period-over-period purchase price change, in percent.
    pub semi_annual_change: Option<f64>,
}

/// Temporary, higher-priority overlay produced while the timeline is open.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimelineOverride {
    values: BTreeMap<AreaId, TimelineValues>,
}

impl TimelineOverride {
    #[must_use]
    pub const fn new(values: BTreeMap<AreaId, TimelineValues>) -> Self {
        Self { values }
    }

    #[must_use]
    pub fn get(&self, id: &AreaId) -> Option<&TimelineValues> {
        self.values.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Output of a derivation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Derivation {
    /// Derived areas in base order, duplicates removed.
    pub areas: Vec<DerivedArea>,
    /// Records that were dropped or ignored.
    pub issues: Vec<DataIntegrityError>,
}

/// Merges overrides onto the base dataset for `selector`.
#[must_use]
pub fn merge(base: &[Area], overrides: &OverrideMap, selector: MetricSelector) -> Derivation {
    recompute(selector, base, overrides, None)
}

/// Full derivation pipeline: base, then overrides, then the optional
/// timeline layer, then the metric projection.
///
/// The first occurrence of a duplicated id wins; later ones are reported.
/// Overrides for ids missing from the base are reported and ignored.
#[must_use]
pub fn recompute(
    selector: MetricSelector,
    base: &[Area],
    overrides: &OverrideMap,
    timeline: Option<&TimelineOverride>,
) -> Derivation {
    let mut seen = BTreeSet::new();
    let mut issues = Vec::new();
    let mut areas = Vec::with_capacity(base.len());

    for area in base {
        if !seen.insert(&area.id) {
            log::debug!("Skipping duplicate area {}", area.id);
            issues.push(DataIntegrityError::DuplicateArea {
                id: area.id.clone(),
            });
            continue;
        }

        let mut effective = apply_override(area, overrides.get(&area.id));
        if let Some(values) = timeline.and_then(|layer| layer.get(&area.id)) {
            effective.purchase_price = values.purchase_price;
            effective.rent_price = values.rent_price;
            effective.semi_annual_change = values.semi_annual_change;
        }

        areas.push(derive(selector, effective));
    }

    for id in overrides.keys().filter(|id| !seen.contains(id)) {
        log::debug!("Ignoring override for unknown area {id}");
        issues.push(DataIntegrityError::UnknownArea { id: id.clone() });
    }

    Derivation { areas, issues }
}

fn apply_override(area: &Area, record: Option<&AreaOverride>) -> Area {
    let mut effective = area.clone();
    if let Some(record) = record {
        effective.purchase_price = record.purchase_price.or(area.purchase_price);
        effective.rent_price = record.rent_price.or(area.rent_price);
        effective.semi_annual_change = record.semi_annual_change.or(area.semi_annual_change);
    }
    effective
}

fn derive(selector: MetricSelector, area: Area) -> DerivedArea {
    let reading = evaluate(selector, &MetricFields::from(&area));
    DerivedArea {
        price_color: purchase_band_color(area.purchase_price),
        metric_value: reading.value,
        metric_label: reading.label,
        color: reading.color,
        area,
    }
}
