//! Axis-aligned geographic bounding boxes for camera framing.

use geo::{BoundingRect, LineString, Rect};
use realty_map_area_models::LatLng;
use serde::Serialize;

/// A `[west, south, east, north]` box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Bounds {
    #[must_use]
    pub fn from_rect(rect: Rect<f64>) -> Self {
        Self {
            west: rect.min().x,
            south: rect.min().y,
            east: rect.max().x,
            north: rect.max().y,
        }
    }

    /// Envelope of a ring, or `None` if it has no positions.
    #[must_use]
    pub fn of_ring(ring: &[[f64; 2]]) -> Option<Self> {
        LineString::from(ring.to_vec())
            .bounding_rect()
            .map(Self::from_rect)
    }

    /// Square box of `half_size` degrees around `center`.
    #[must_use]
    pub fn around(center: LatLng, half_size: f64) -> Self {
        Self {
            west: center.lng - half_size,
            south: center.lat - half_size,
            east: center.lng + half_size,
            north: center.lat + half_size,
        }
    }

    /// Smallest box containing both.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            west: self.west.min(other.west),
            south: self.south.min(other.south),
            east: self.east.max(other.east),
            north: self.north.max(other.north),
        }
    }

    #[must_use]
    pub fn center(&self) -> LatLng {
        LatLng::new(
            f64::midpoint(self.west, self.east),
            f64::midpoint(self.south, self.north),
        )
    }

    /// `[[west, south], [east, north]]`, the corner form renderers expect.
    #[must_use]
    pub const fn corners(&self) -> [[f64; 2]; 2] {
        [[self.west, self.south], [self.east, self.north]]
    }
}
