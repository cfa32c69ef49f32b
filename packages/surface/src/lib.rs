#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Adapter interface to the map rendering engine.
//!
//! The renderer is a black box exposing sources, layers, per-feature state
//! and camera primitives. It is modelled as three narrow traits so each
//! component only sees the primitives it is allowed to use:
//!
//! - [`SourceSurface`]: data sources and layer visibility.
//! - [`FeatureStateSurface`]: per-feature interaction flags. Only
//!   [`FeatureStateSync`] writes through it.
//! - [`CameraSurface`]: camera transitions and the highlight layer paint.
//!
//! [`RenderSurface`] bundles all three. [`RecordingSurface`] is an
//! in-memory implementation used by tests and the headless replay tool.

pub mod recording;
pub mod sync;

use realty_map_area_models::{AreaId, LatLng};
use realty_map_geometry::Bounds;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

pub use geojson::FeatureCollection;
pub use recording::{RecordingSurface, SurfaceCommand};
pub use sync::{CapacityError, CompareSet, FeatureStateSync};

/// Interaction flags of one feature. The three channels are independent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeatureFlags {
    pub selected: bool,
    pub compared: bool,
    pub hovered: bool,
}

impl FeatureFlags {
    #[must_use]
    pub const fn is_clear(self) -> bool {
        !self.selected && !self.compared && !self.hovered
    }
}

/// Partial feature-state update; `None` leaves a flag untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeatureStatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compared: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hovered: Option<bool>,
}

impl FeatureStatePatch {
    #[must_use]
    pub const fn selected(value: bool) -> Self {
        Self {
            selected: Some(value),
            compared: None,
            hovered: None,
        }
    }

    #[must_use]
    pub const fn compared(value: bool) -> Self {
        Self {
            selected: None,
            compared: Some(value),
            hovered: None,
        }
    }

    #[must_use]
    pub const fn hovered(value: bool) -> Self {
        Self {
            selected: None,
            compared: None,
            hovered: Some(value),
        }
    }

    /// A patch that sets every flag to its value in `flags`.
    #[must_use]
    pub const fn full(flags: FeatureFlags) -> Self {
        Self {
            selected: Some(flags.selected),
            compared: Some(flags.compared),
            hovered: Some(flags.hovered),
        }
    }

    /// Applies the patch to `flags`.
    pub fn apply(self, flags: &mut FeatureFlags) {
        if let Some(value) = self.selected {
            flags.selected = value;
        }
        if let Some(value) = self.compared {
            flags.compared = value;
        }
        if let Some(value) = self.hovered {
            flags.hovered = value;
        }
    }
}

/// Toggleable map layers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum MapLayer {
    /// Colored area polygons.
    AreaFill,
    /// Area outlines.
    AreaOutline,
    /// Area name and value labels.
    AreaLabels,
    /// Extruded 3D buildings of the base map.
    Buildings3d,
}

impl MapLayer {
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::AreaFill,
            Self::AreaOutline,
            Self::AreaLabels,
            Self::Buildings3d,
        ]
    }
}

/// Screen-space padding in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Padding {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Padding {
    #[must_use]
    pub const fn uniform(value: f64) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }
}

/// Options for [`CameraSurface::fit_bounds`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub padding: Padding,
    /// Zoom ceiling; the fit never zooms in further.
    pub max_zoom: Option<f64>,
    pub pitch: Option<f64>,
    pub duration_ms: u64,
}

/// Target of [`CameraSurface::fly_to`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlyTo {
    pub center: LatLng,
    pub zoom: f64,
    pub pitch: f64,
    pub bearing: f64,
    pub duration_ms: u64,
}

/// Paint values of the highlight outline for one pulse frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighlightStyle {
    pub opacity: f64,
    pub width: f64,
}

/// Sources and layers.
pub trait SourceSurface {
    fn add_source(&mut self, name: &str, data: &FeatureCollection);

    fn update_source_data(&mut self, name: &str, data: &FeatureCollection);

    fn has_source(&self, name: &str) -> bool;

    fn set_layer_visibility(&mut self, layer: MapLayer, visible: bool);
}

/// Per-feature interaction state.
pub trait FeatureStateSurface {
    fn set_feature_state(&mut self, source: &str, id: &AreaId, patch: FeatureStatePatch);

    fn feature_state(&self, source: &str, id: &AreaId) -> FeatureFlags;
}

/// Camera transitions and highlight paint. All commands are
/// fire-and-forget.
pub trait CameraSurface {
    fn fit_bounds(&mut self, bounds: Bounds, options: &FitOptions);

    fn fly_to(&mut self, target: &FlyTo);

    /// Restricts the highlight layer to `id` and paints it with `style`.
    fn set_highlight(&mut self, id: &AreaId, style: HighlightStyle);

    /// Hides the highlight layer.
    fn clear_highlight(&mut self);
}

/// The full rendering engine contract.
pub trait RenderSurface: SourceSurface + FeatureStateSurface + CameraSurface {}

impl<T: SourceSurface + FeatureStateSurface + CameraSurface> RenderSurface for T {}
