#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Metric engine: maps an area and a [`MetricSelector`] to a value, a
//! formatted label and a legend color.
//!
//! Every function here is pure. The same `(selector, fields)` pair always
//! produces the same [`MetricReading`], so callers may memoize on it.
//! Computation failures never surface as errors: an undefined value is
//! `None`, rendered as [`format::NOT_AVAILABLE`] and colored
//! [`legend::NEUTRAL_COLOR`].

pub mod format;
pub mod legend;

use realty_map_area_models::Area;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use legend::{LegendBucket, LegendTable, NEUTRAL_COLOR, legend_for, purchase_band_color};

/// The scalar metric used to color and label areas.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum MetricSelector {
    /// Average purchase price per square meter.
    #[default]
    PurchasePrice,
    /// Average monthly rent per square meter.
    RentPrice,
    /// Annual rent over purchase price, in percent.
    GrossYield,
    /// Semi-annual purchase price change, in percent.
    Trend,
}

impl MetricSelector {
    /// Returns all selectors in menu order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::PurchasePrice,
            Self::RentPrice,
            Self::GrossYield,
            Self::Trend,
        ]
    }

    /// Short menu label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PurchasePrice => "Prezzo",
            Self::RentPrice => "Affitto",
            Self::GrossYield => "Yield",
            Self::Trend => "Trend",
        }
    }

    /// Secondary menu label describing the unit.
    #[must_use]
    pub const fn sublabel(self) -> &'static str {
        match self {
            Self::PurchasePrice => "€/mq acquisto",
            Self::RentPrice => "€/mq mese",
            Self::GrossYield => "Rendimento lordo",
            Self::Trend => "Var. semestrale",
        }
    }

    /// Heading shown above the legend.
    #[must_use]
    pub const fn legend_title(self) -> &'static str {
        match self {
            Self::PurchasePrice => "Prezzo acquisto €/mq",
            Self::RentPrice => "Affitto €/mq mese",
            Self::GrossYield => "Yield lordo annuo",
            Self::Trend => "Variazione semestrale",
        }
    }
}

/// The numeric inputs a metric is computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricFields {
    pub purchase_price: Option<f64>,
    pub rent_price: Option<f64>,
    pub semi_annual_change: Option<f64>,
}

impl From<&Area> for MetricFields {
    fn from(area: &Area) -> Self {
        Self {
            purchase_price: area.purchase_price,
            rent_price: area.rent_price,
            semi_annual_change: area.semi_annual_change,
        }
    }
}

/// Value, label and color for one area under one selector.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricReading {
    pub value: Option<f64>,
    pub label: String,
    pub color: &'static str,
}

/// Computes the raw metric value.
///
/// Gross yield is `rent * 12 / purchase * 100` and is `None` when either
/// price is missing or the purchase price is zero. Non-finite results are
/// never returned.
#[must_use]
pub fn value(selector: MetricSelector, fields: &MetricFields) -> Option<f64> {
    let raw = match selector {
        MetricSelector::PurchasePrice => fields.purchase_price,
        MetricSelector::RentPrice => fields.rent_price,
        MetricSelector::GrossYield => gross_yield(fields.purchase_price, fields.rent_price),
        MetricSelector::Trend => fields.semi_annual_change,
    };
    raw.filter(|v| v.is_finite())
}

fn gross_yield(purchase: Option<f64>, rent: Option<f64>) -> Option<f64> {
    let purchase = purchase.filter(|p| *p != 0.0)?;
    let rent = rent?;
    Some(rent * 12.0 / purchase * 100.0)
}

/// Renders a value for map labels.
#[must_use]
pub fn format_label(selector: MetricSelector, value: Option<f64>) -> String {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return format::NOT_AVAILABLE.to_string();
    };

    match selector {
        MetricSelector::PurchasePrice => format!("{}/mq", format::format_currency(value, 0)),
        MetricSelector::RentPrice => format!("{}/mq/mese", format::format_currency(value, 1)),
        MetricSelector::GrossYield => format::format_signed_percent(value, 2),
        MetricSelector::Trend => format::format_signed_percent(value, 1),
    }
}

/// Resolves the legend color for a value.
#[must_use]
pub fn color(selector: MetricSelector, value: Option<f64>) -> &'static str {
    legend_for(selector).color_for(value)
}

/// Computes value, label and color in one pass.
#[must_use]
pub fn evaluate(selector: MetricSelector, fields: &MetricFields) -> MetricReading {
    let value = value(selector, fields);
    MetricReading {
        value,
        label: format_label(selector, value),
        color: color(selector, value),
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn fields(purchase: Option<f64>, rent: Option<f64>, change: Option<f64>) -> MetricFields {
        MetricFields {
            purchase_price: purchase,
            rent_price: rent,
            semi_annual_change: change,
        }
    }

    #[test]
    fn gross_yield_is_none_for_zero_purchase_price() {
        let f = fields(Some(0.0), Some(15.0), None);
        assert_eq!(value(MetricSelector::GrossYield, &f), None);
        let reading = evaluate(MetricSelector::GrossYield, &f);
        assert_eq!(reading.label, format::NOT_AVAILABLE);
        assert_eq!(reading.color, NEUTRAL_COLOR);
    }

    #[test]
    fn gross_yield_is_none_for_missing_prices() {
        assert_eq!(
            value(MetricSelector::GrossYield, &fields(None, Some(15.0), None)),
            None
        );
        assert_eq!(
            value(MetricSelector::GrossYield, &fields(Some(3000.0), None, None)),
            None
        );
    }

    #[test]
    fn gross_yield_formula() {
        let y = value(
            MetricSelector::GrossYield,
            &fields(Some(3600.0), Some(15.0), None),
        )
        .unwrap();
        assert!((y - 5.0).abs() < 1e-9, "expected 5%, got {y}");
        assert_eq!(format_label(MetricSelector::GrossYield, Some(y)), "+5.00%");
    }

    #[test]
    fn passthrough_selectors() {
        let f = fields(Some(3406.0), Some(12.75), Some(-1.5));
        assert_eq!(value(MetricSelector::PurchasePrice, &f), Some(3406.0));
        assert_eq!(value(MetricSelector::RentPrice, &f), Some(12.75));
        assert_eq!(value(MetricSelector::Trend, &f), Some(-1.5));
    }

    #[test]
    fn non_finite_raw_values_are_dropped() {
        let f = fields(Some(f64::NAN), Some(f64::INFINITY), None);
        assert_eq!(value(MetricSelector::PurchasePrice, &f), None);
        assert_eq!(value(MetricSelector::RentPrice, &f), None);
    }

    #[test]
    fn labels_per_selector() {
        assert_eq!(
            format_label(MetricSelector::PurchasePrice, Some(3406.0)),
            "3.406 €/mq"
        );
        assert_eq!(
            format_label(MetricSelector::RentPrice, Some(12.75)),
            "12,8 €/mq/mese"
        );
        assert_eq!(format_label(MetricSelector::Trend, Some(-2.345)), "-2.3%");
        assert_eq!(format_label(MetricSelector::Trend, None), "N/D");
    }

    #[test]
    fn evaluate_is_referentially_transparent() {
        let f = fields(Some(5200.0), Some(21.0), Some(1.2));
        for selector in MetricSelector::all() {
            assert_eq!(evaluate(*selector, &f), evaluate(*selector, &f));
        }
    }

    #[test]
    fn selector_round_trips_through_strings() {
        for selector in MetricSelector::all() {
            let parsed = MetricSelector::from_str(selector.as_ref()).unwrap();
            assert_eq!(parsed, *selector);
        }
        assert_eq!(MetricSelector::GrossYield.to_string(), "grossYield");
        let json = serde_json::to_string(&MetricSelector::RentPrice).unwrap();
        assert_eq!(json, "\"rentPrice\"");
    }
}
