//! Deterministic placeholder polygons for areas without authoritative
//! geometry.
//!
//! The shape is an 8-vertex star around the area centroid. Each vertex
//! radius is perturbed by the 32-bit FNV-1a hash of the area id, so the same
//! id always yields the same ring on every run and every platform. No random
//! source is involved.

use realty_map_area_models::{AreaId, LatLng, Ring};
use serde::{Deserialize, Serialize};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Number of distinct vertices in a synthetic ring.
pub const SYNTHETIC_VERTICES: usize = 8;

/// Maximum relative radius perturbation (plus or minus half of this).
const VARIATION_SPREAD: f64 = 0.3;

/// 32-bit FNV-1a over the UTF-8 bytes of `input`.
#[must_use]
pub fn fnv1a32(input: &str) -> u32 {
    input.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Size parameters of synthetic polygons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticShape {
    /// Nominal radius in degrees of longitude.
    pub synthetic_radius: f64,
    /// Latitude radius as a fraction of the longitude radius.
    pub synthetic_aspect: f64,
}

impl Default for SyntheticShape {
    fn default() -> Self {
        Self {
            synthetic_radius: 0.012,
            synthetic_aspect: 0.8,
        }
    }
}

/// Builds the closed synthetic ring for `id` centered on `center`.
///
/// The returned ring has [`SYNTHETIC_VERTICES`] + 1 positions; the last
/// equals the first.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn synthetic_ring(center: LatLng, id: &AreaId, shape: SyntheticShape) -> Ring {
    let hash = u64::from(fnv1a32(id.as_str()));

    let mut ring: Ring = (0..SYNTHETIC_VERTICES)
        .map(|i| {
            let angle = (i as f64 / SYNTHETIC_VERTICES as f64) * std::f64::consts::TAU;
            let step = (hash * (i as u64 + 1)) % 100;
            let variation = ((step as f64) / 100.0 - 0.5).mul_add(VARIATION_SPREAD, 1.0);
            let radius = shape.synthetic_radius * variation;
            [
                radius.mul_add(angle.cos(), center.lng),
                (radius * shape.synthetic_aspect).mul_add(angle.sin(), center.lat),
            ]
        })
        .collect();

    if let Some(first) = ring.first().copied() {
        ring.push(first);
    }
    ring
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1a32_reference_values() {
        assert_eq!(fnv1a32(""), 0x811c_9dc5);
        assert_eq!(fnv1a32("a"), 0xe40c_292c);
        assert_eq!(fnv1a32("foobar"), 0xbf9c_f968);
    }

    #[test]
    fn ring_is_closed_with_eight_vertices() {
        let ring = synthetic_ring(
            LatLng::new(9.19, 45.46),
            &AreaId::from("brera"),
            SyntheticShape::default(),
        );
        assert_eq!(ring.len(), SYNTHETIC_VERTICES + 1);
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn ring_is_deterministic_per_id() {
        let center = LatLng::new(9.19, 45.46);
        let shape = SyntheticShape::default();
        let a = synthetic_ring(center, &AreaId::from("navigli"), shape);
        let b = synthetic_ring(center, &AreaId::from("navigli"), shape);
        assert_eq!(a, b);

        let other = synthetic_ring(center, &AreaId::from("isola"), shape);
        assert_ne!(a, other, "different ids should perturb differently");
    }

    #[test]
    fn vertices_stay_within_perturbation_envelope() {
        let center = LatLng::new(9.0, 45.0);
        let shape = SyntheticShape::default();
        let ring = synthetic_ring(center, &AreaId::from("qt8"), shape);
        let max = shape.synthetic_radius * (1.0 + VARIATION_SPREAD / 2.0) + 1e-12;
        for [lng, lat] in &ring {
            let dx = lng - center.lng;
            let dy = (lat - center.lat) / shape.synthetic_aspect;
            assert!(
                dx.hypot(dy) <= max,
                "vertex ({lng}, {lat}) is outside the envelope"
            );
        }
    }
}
