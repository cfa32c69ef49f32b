//! Value-range to color tables, one per [`MetricSelector`].
//!
//! Buckets use half-open `[min, max)` intervals. The first and last bucket
//! of every table are open-ended, so each table partitions the real line.
//! Tables are listed from the highest range down, which is also the order
//! the map legend displays them in.

use serde::Serialize;

use crate::MetricSelector;

/// Color used for missing values and values no bucket claims.
pub const NEUTRAL_COLOR: &str = "#6b7280";

/// One legend row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LegendBucket {
    /// Inclusive lower bound, `None` for negative infinity.
    pub min: Option<f64>,
    /// Exclusive upper bound, `None` for positive infinity.
    pub max: Option<f64>,
    /// Hex color token.
    pub color: &'static str,
    /// Display label.
    pub label: &'static str,
}

impl LegendBucket {
    const fn new(
        min: Option<f64>,
        max: Option<f64>,
        color: &'static str,
        label: &'static str,
    ) -> Self {
        Self {
            min,
            max,
            color,
            label,
        }
    }

    /// Whether `value` falls in `[min, max)`.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value < max)
    }
}

/// Ordered list of buckets for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LegendTable {
    buckets: &'static [LegendBucket],
}

impl LegendTable {
    #[must_use]
    pub const fn buckets(&self) -> &'static [LegendBucket] {
        self.buckets
    }

    /// First bucket containing `value`, scanning in table order.
    #[must_use]
    pub fn bucket_for(&self, value: f64) -> Option<&'static LegendBucket> {
        if !value.is_finite() {
            return None;
        }
        self.buckets.iter().find(|bucket| bucket.contains(value))
    }

    /// Color for `value`, falling back to [`NEUTRAL_COLOR`].
    #[must_use]
    pub fn color_for(&self, value: Option<f64>) -> &'static str {
        value
            .and_then(|v| self.bucket_for(v))
            .map_or(NEUTRAL_COLOR, |bucket| bucket.color)
    }
}

const PURCHASE_BUCKETS: &[LegendBucket] = &[
    LegendBucket::new(Some(8000.0), None, "#ef4444", "> €8000/mq"),
    LegendBucket::new(Some(5000.0), Some(8000.0), "#f97316", "€5000 - €8000/mq"),
    LegendBucket::new(Some(3500.0), Some(5000.0), "#84cc16", "€3500 - €5000/mq"),
    LegendBucket::new(Some(2500.0), Some(3500.0), "#22c55e", "€2500 - €3500/mq"),
    LegendBucket::new(None, Some(2500.0), "#3b82f6", "< €2500/mq"),
];

const RENT_BUCKETS: &[LegendBucket] = &[
    LegendBucket::new(Some(30.0), None, "#ef4444", "> €30/mq"),
    LegendBucket::new(Some(24.0), Some(30.0), "#f97316", "€24 - €30/mq"),
    LegendBucket::new(Some(20.0), Some(24.0), "#eab308", "€20 - €24/mq"),
    LegendBucket::new(Some(16.0), Some(20.0), "#84cc16", "€16 - €20/mq"),
    LegendBucket::new(Some(12.0), Some(16.0), "#22c55e", "€12 - €16/mq"),
    LegendBucket::new(None, Some(12.0), "#3b82f6", "< €12/mq"),
];

const YIELD_BUCKETS: &[LegendBucket] = &[
    LegendBucket::new(Some(6.0), None, "#16a34a", ">= 6%"),
    LegendBucket::new(Some(5.0), Some(6.0), "#22c55e", "5% - 6%"),
    LegendBucket::new(Some(4.0), Some(5.0), "#84cc16", "4% - 5%"),
    LegendBucket::new(Some(3.0), Some(4.0), "#eab308", "3% - 4%"),
    LegendBucket::new(Some(2.0), Some(3.0), "#f97316", "2% - 3%"),
    LegendBucket::new(None, Some(2.0), "#ef4444", "< 2%"),
];

const TREND_BUCKETS: &[LegendBucket] = &[
    LegendBucket::new(Some(4.0), None, "#16a34a", ">= +4%"),
    LegendBucket::new(Some(2.0), Some(4.0), "#22c55e", "+2% - +4%"),
    LegendBucket::new(Some(0.0), Some(2.0), "#84cc16", "0% - +2%"),
    LegendBucket::new(Some(-2.0), Some(0.0), "#f59e0b", "-2% - 0%"),
    LegendBucket::new(Some(-4.0), Some(-2.0), "#f97316", "-4% - -2%"),
    LegendBucket::new(None, Some(-4.0), "#ef4444", "< -4%"),
];

/// Returns the legend table for `selector`.
#[must_use]
pub const fn legend_for(selector: MetricSelector) -> LegendTable {
    let buckets = match selector {
        MetricSelector::PurchasePrice => PURCHASE_BUCKETS,
        MetricSelector::RentPrice => RENT_BUCKETS,
        MetricSelector::GrossYield => YIELD_BUCKETS,
        MetricSelector::Trend => TREND_BUCKETS,
    };
    LegendTable { buckets }
}

/// The purchase price band color, independent of the active selector.
#[must_use]
pub fn purchase_band_color(purchase_price: Option<f64>) -> &'static str {
    legend_for(MetricSelector::PurchasePrice).color_for(purchase_price)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Buckets sorted ascending by lower bound, `None` first.
    fn ascending(table: LegendTable) -> Vec<LegendBucket> {
        let mut buckets = table.buckets().to_vec();
        buckets.sort_by(|a, b| {
            a.min
                .unwrap_or(f64::NEG_INFINITY)
                .total_cmp(&b.min.unwrap_or(f64::NEG_INFINITY))
        });
        buckets
    }

    #[test]
    fn every_legend_partitions_the_real_line() {
        for selector in MetricSelector::all() {
            let buckets = ascending(legend_for(*selector));
            assert!(
                buckets.first().unwrap().min.is_none(),
                "{selector:?} lowest bucket must be open below"
            );
            assert!(
                buckets.last().unwrap().max.is_none(),
                "{selector:?} highest bucket must be open above"
            );
            for pair in buckets.windows(2) {
                assert_eq!(
                    pair[0].max, pair[1].min,
                    "{selector:?} has a gap or overlap between {} and {}",
                    pair[0].label, pair[1].label
                );
            }
        }
    }

    #[test]
    fn every_finite_value_maps_to_exactly_one_bucket() {
        let samples = [
            -1.0e9, -4.0, -3.999, -2.0, -0.0, 0.0, 1.999, 2.0, 5.5, 12.0, 2500.0, 7999.99,
            8000.0, 1.0e12,
        ];
        for selector in MetricSelector::all() {
            let table = legend_for(*selector);
            for value in samples {
                let hits = table.buckets().iter().filter(|b| b.contains(value)).count();
                assert_eq!(hits, 1, "{selector:?} value {value} hit {hits} buckets");
            }
        }
    }

    #[test]
    fn boundaries_are_half_open() {
        let trend = legend_for(MetricSelector::Trend);
        assert_eq!(trend.bucket_for(4.0).unwrap().label, ">= +4%");
        assert_eq!(trend.bucket_for(3.999).unwrap().label, "+2% - +4%");
        assert_eq!(trend.bucket_for(0.0).unwrap().label, "0% - +2%");
        assert_eq!(trend.bucket_for(-0.001).unwrap().label, "-2% - 0%");
    }

    #[test]
    fn missing_and_non_finite_values_are_neutral() {
        let table = legend_for(MetricSelector::GrossYield);
        assert_eq!(table.color_for(None), NEUTRAL_COLOR);
        assert_eq!(table.color_for(Some(f64::NAN)), NEUTRAL_COLOR);
        assert_eq!(table.color_for(Some(f64::INFINITY)), NEUTRAL_COLOR);
    }

    #[test]
    fn purchase_band_matches_price_legend() {
        assert_eq!(purchase_band_color(Some(8425.0)), "#ef4444");
        assert_eq!(purchase_band_color(Some(3406.0)), "#22c55e");
        assert_eq!(purchase_band_color(Some(1200.0)), "#3b82f6");
        assert_eq!(purchase_band_color(None), NEUTRAL_COLOR);
    }
}
