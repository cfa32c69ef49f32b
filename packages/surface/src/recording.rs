//! In-memory rendering surface.
//!
//! Records every command in order and keeps a real feature-state table,
//! source map and layer visibility map so callers can assert on the final
//! rendered state as well as on the command sequence.

use std::collections::BTreeMap;

use realty_map_area_models::AreaId;
use realty_map_geometry::Bounds;

use crate::{
    CameraSurface, FeatureCollection, FeatureFlags, FeatureStatePatch, FeatureStateSurface,
    FitOptions, FlyTo, HighlightStyle, MapLayer, SourceSurface,
};

/// One command received by a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCommand {
    AddSource {
        name: String,
        features: usize,
    },
    UpdateSource {
        name: String,
        features: usize,
    },
    SetLayerVisibility {
        layer: MapLayer,
        visible: bool,
    },
    SetFeatureState {
        source: String,
        id: AreaId,
        patch: FeatureStatePatch,
    },
    FitBounds {
        bounds: Bounds,
        options: FitOptions,
    },
    FlyTo(FlyTo),
    SetHighlight {
        id: AreaId,
        style: HighlightStyle,
    },
    ClearHighlight,
}

impl SurfaceCommand {
    #[must_use]
    pub const fn is_camera(&self) -> bool {
        matches!(self, Self::FitBounds { .. } | Self::FlyTo(_))
    }
}

/// Headless [`crate::RenderSurface`].
#[derive(Debug, Default)]
pub struct RecordingSurface {
    commands: Vec<SurfaceCommand>,
    sources: BTreeMap<String, FeatureCollection>,
    states: BTreeMap<(String, AreaId), FeatureFlags>,
    hidden_layers: BTreeMap<MapLayer, bool>,
    highlight: Option<(AreaId, HighlightStyle)>,
}

impl RecordingSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn commands(&self) -> &[SurfaceCommand] {
        &self.commands
    }

    /// Returns and forgets the recorded commands. State is kept.
    pub fn take_commands(&mut self) -> Vec<SurfaceCommand> {
        std::mem::take(&mut self.commands)
    }

    #[must_use]
    pub fn source(&self, name: &str) -> Option<&FeatureCollection> {
        self.sources.get(name)
    }

    /// Layers are visible until hidden.
    #[must_use]
    pub fn layer_visible(&self, layer: MapLayer) -> bool {
        !self.hidden_layers.get(&layer).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn highlight(&self) -> Option<(&AreaId, HighlightStyle)> {
        self.highlight.as_ref().map(|(id, style)| (id, *style))
    }

    /// Camera commands in the order they were issued.
    pub fn camera_commands(&self) -> impl Iterator<Item = &SurfaceCommand> {
        self.commands.iter().filter(|command| command.is_camera())
    }

    fn record(&mut self, command: SurfaceCommand) {
        log::debug!("surface: {command:?}");
        self.commands.push(command);
    }
}

impl SourceSurface for RecordingSurface {
    fn add_source(&mut self, name: &str, data: &FeatureCollection) {
        self.record(SurfaceCommand::AddSource {
            name: name.to_string(),
            features: data.features.len(),
        });
        self.sources.insert(name.to_string(), data.clone());
    }

    fn update_source_data(&mut self, name: &str, data: &FeatureCollection) {
        self.record(SurfaceCommand::UpdateSource {
            name: name.to_string(),
            features: data.features.len(),
        });
        self.sources.insert(name.to_string(), data.clone());
    }

    fn has_source(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    fn set_layer_visibility(&mut self, layer: MapLayer, visible: bool) {
        self.record(SurfaceCommand::SetLayerVisibility { layer, visible });
        self.hidden_layers.insert(layer, !visible);
    }
}

impl FeatureStateSurface for RecordingSurface {
    fn set_feature_state(&mut self, source: &str, id: &AreaId, patch: FeatureStatePatch) {
        self.record(SurfaceCommand::SetFeatureState {
            source: source.to_string(),
            id: id.clone(),
            patch,
        });
        let flags = self
            .states
            .entry((source.to_string(), id.clone()))
            .or_default();
        patch.apply(flags);
    }

    fn feature_state(&self, source: &str, id: &AreaId) -> FeatureFlags {
        self.states
            .get(&(source.to_string(), id.clone()))
            .copied()
            .unwrap_or_default()
    }
}

impl CameraSurface for RecordingSurface {
    fn fit_bounds(&mut self, bounds: Bounds, options: &FitOptions) {
        self.record(SurfaceCommand::FitBounds {
            bounds,
            options: *options,
        });
    }

    fn fly_to(&mut self, target: &FlyTo) {
        self.record(SurfaceCommand::FlyTo(*target));
    }

    fn set_highlight(&mut self, id: &AreaId, style: HighlightStyle) {
        self.record(SurfaceCommand::SetHighlight {
            id: id.clone(),
            style,
        });
        self.highlight = Some((id.clone(), style));
    }

    fn clear_highlight(&mut self) {
        self.record(SurfaceCommand::ClearHighlight);
        self.highlight = None;
    }
}
