//! Builds the temporary override layer for one timeline position.

use std::collections::BTreeMap;

use realty_map_area_models::{AreaId, TimeBucket};
use realty_map_merge::{TimelineOverride, TimelineValues};

/// Percent change from `previous` to `current`.
///
/// `None` when either side is missing, the previous value is not positive,
/// or the result is not finite.
#[must_use]
pub fn period_change(previous: Option<f64>, current: Option<f64>) -> Option<f64> {
    let previous = previous.filter(|p| *p > 0.0)?;
    let current = current?;
    Some((current - previous) / previous * 100.0).filter(|v| v.is_finite())
}

/// Values of `current` for every area it covers, with the purchase price
/// change against `previous` as the trend.
///
/// A record applies to its own area and to each linked area. When the same
/// area is covered twice the later record wins.
#[must_use]
pub fn override_layer(current: &TimeBucket, previous: Option<&TimeBucket>) -> TimelineOverride {
    let mut values = BTreeMap::<AreaId, TimelineValues>::new();

    for record in &current.areas {
        for target in record.target_ids() {
            let before = previous
                .and_then(|bucket| bucket.record_for(target))
                .and_then(|prev| prev.purchase_price);
            values.insert(
                target.clone(),
                TimelineValues {
                    purchase_price: record.purchase_price,
                    rent_price: record.rent_price,
                    semi_annual_change: period_change(before, record.purchase_price),
                },
            );
        }
    }

    TimelineOverride::new(values)
}
