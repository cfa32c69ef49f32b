#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Camera director.
//!
//! Issues fire-and-forget camera commands for focusing one area, framing
//! the compare set and returning to the default pose, and owns the
//! highlight pulse of the selected area. The pulse runs as a scheduler
//! task; starting a new pulse or stopping the current one cancels the old
//! task before anything else happens, so no frame ever targets a stale id.

pub mod pulse;

use realty_map_area_models::{Area, AreaId, LatLng};
use realty_map_geometry::Bounds;
use realty_map_schedule::{Scheduler, TaskHandle, TaskKind};
use realty_map_surface::{CameraSurface, FitOptions, FlyTo, Padding};
use serde::{Deserialize, Serialize};

pub use pulse::{Pulse, PulseConfig, pulse_style};

/// Camera poses, paddings and durations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Default pose center, `[lng, lat]`.
    pub center: LatLng,
    pub zoom: f64,
    pub pitch: f64,
    pub bearing: f64,
    pub focus_padding: f64,
    /// Zoom ceiling when focusing one area.
    pub focus_max_zoom: f64,
    pub focus_pitch: f64,
    pub focus_duration_ms: u64,
    pub compare_padding: Padding,
    pub compare_duration_ms: u64,
    pub reset_duration_ms: u64,
    /// Half-size in degrees of the box used when an area has no polygon.
    pub centroid_half_size: f64,
    pub pulse: PulseConfig,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            center: LatLng::new(9.14, 45.445),
            zoom: 11.3,
            pitch: 45.0,
            bearing: -17.6,
            focus_padding: 80.0,
            focus_max_zoom: 14.5,
            focus_pitch: 50.0,
            focus_duration_ms: 1200,
            compare_padding: Padding {
                top: 100.0,
                right: 100.0,
                bottom: 100.0,
                left: 400.0,
            },
            compare_duration_ms: 1000,
            reset_duration_ms: 1500,
            centroid_half_size: 0.006,
            pulse: PulseConfig::default(),
        }
    }
}

impl CameraConfig {
    /// The default camera pose.
    #[must_use]
    pub const fn default_pose(&self) -> FlyTo {
        FlyTo {
            center: self.center,
            zoom: self.zoom,
            pitch: self.pitch,
            bearing: self.bearing,
            duration_ms: self.reset_duration_ms,
        }
    }
}

/// Computes and issues camera transitions.
#[derive(Debug, Default)]
pub struct CameraDirector {
    config: CameraConfig,
    pulse: Option<Pulse>,
}

impl CameraDirector {
    #[must_use]
    pub const fn new(config: CameraConfig) -> Self {
        Self {
            config,
            pulse: None,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &CameraConfig {
        &self.config
    }

    #[must_use]
    pub const fn pulse(&self) -> Option<&Pulse> {
        self.pulse.as_ref()
    }

    /// Bounds of the area's own polygon, or a small box around its
    /// centroid.
    #[must_use]
    pub fn area_bounds(&self, area: &Area) -> Option<Bounds> {
        area.geometry()
            .and_then(|ring| Bounds::of_ring(ring))
            .or_else(|| {
                area.centroid
                    .map(|center| Bounds::around(center, self.config.centroid_half_size))
            })
    }

    /// Fits the camera to one area. Returns `false` if the area has no
    /// location at all.
    pub fn focus_area(&self, area: &Area, surface: &mut dyn CameraSurface) -> bool {
        let Some(bounds) = self.area_bounds(area) else {
            log::warn!("Cannot focus area {}: no geometry or centroid", area.id);
            return false;
        };
        surface.fit_bounds(
            bounds,
            &FitOptions {
                padding: Padding::uniform(self.config.focus_padding),
                max_zoom: Some(self.config.focus_max_zoom),
                pitch: Some(self.config.focus_pitch),
                duration_ms: self.config.focus_duration_ms,
            },
        );
        true
    }

    /// Fits the camera to the union of the compare set. Needs at least two
    /// locatable areas; returns `false` otherwise.
    pub fn focus_compare_set(&self, areas: &[&Area], surface: &mut dyn CameraSurface) -> bool {
        let boxes: Vec<Bounds> = areas
            .iter()
            .filter_map(|area| self.area_bounds(area))
            .collect();
        if boxes.len() < 2 {
            return false;
        }
        let Some(union) = boxes.into_iter().reduce(Bounds::union) else {
            return false;
        };
        surface.fit_bounds(
            union,
            &FitOptions {
                padding: self.config.compare_padding,
                max_zoom: None,
                pitch: None,
                duration_ms: self.config.compare_duration_ms,
            },
        );
        true
    }

    /// Flies back to the default pose.
    pub fn reset_view(&self, surface: &mut dyn CameraSurface) {
        surface.fly_to(&self.config.default_pose());
    }

    /// Starts the highlight pulse on `id`, stopping any previous one first.
    pub fn start_pulse(
        &mut self,
        id: &AreaId,
        scheduler: &mut Scheduler,
        surface: &mut dyn CameraSurface,
    ) {
        self.stop_pulse(scheduler, surface);
        let handle = scheduler.start(TaskKind::HighlightFrame, self.config.pulse.frame_interval());
        self.pulse = Some(Pulse {
            area_id: id.clone(),
            handle: Some(handle),
            frame: 0,
        });
    }

    /// Cancels the pulse task and hides the highlight. Returns whether a
    /// pulse existed.
    pub fn stop_pulse(&mut self, scheduler: &mut Scheduler, surface: &mut dyn CameraSurface) -> bool {
        let Some(pulse) = self.pulse.take() else {
            return false;
        };
        if let Some(handle) = pulse.handle {
            scheduler.cancel(handle);
        }
        surface.clear_highlight();
        true
    }

    /// Draws one pulse frame. Frames from a handle that is not the current
    /// pulse are stale and their task is cancelled.
    pub fn on_frame(
        &mut self,
        handle: TaskHandle,
        scheduler: &mut Scheduler,
        surface: &mut dyn CameraSurface,
    ) {
        let max_frames = self.config.pulse.max_frames;
        let Some(pulse) = self
            .pulse
            .as_mut()
            .filter(|pulse| pulse.handle == Some(handle))
        else {
            log::debug!("Cancelling stale highlight frame {}", handle.id());
            scheduler.cancel(handle);
            return;
        };

        surface.set_highlight(&pulse.area_id, pulse_style(pulse.frame));
        pulse.frame += 1;
        if pulse.frame >= max_frames {
            scheduler.cancel(handle);
            pulse.handle = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use realty_map_surface::{RecordingSurface, SurfaceCommand};

    use super::*;

    fn area(id: &str, ring: Option<Vec<[f64; 2]>>, centroid: Option<LatLng>) -> Area {
        Area {
            id: AreaId::from(id),
            name: id.to_string(),
            short_name: id.to_string(),
            zone_code: String::new(),
            tier: String::new(),
            base_geometry: ring,
            centroid,
            purchase_price: None,
            rent_price: None,
            semi_annual_change: None,
        }
    }

    fn run_frames(
        director: &mut CameraDirector,
        scheduler: &mut Scheduler,
        surface: &mut RecordingSurface,
        until: Duration,
    ) {
        while let Some(firing) = scheduler.pop_due(until) {
            director.on_frame(firing.handle, scheduler, surface);
        }
        scheduler.settle(until);
    }

    #[test]
    fn focus_uses_polygon_bounds_with_capped_zoom() {
        let director = CameraDirector::default();
        let mut surface = RecordingSurface::new();
        let a = area(
            "a",
            Some(vec![[9.0, 45.0], [9.1, 45.0], [9.1, 45.1], [9.0, 45.0]]),
            Some(LatLng::new(9.05, 45.05)),
        );
        assert!(director.focus_area(&a, &mut surface));
        let SurfaceCommand::FitBounds { bounds, options } = &surface.commands()[0] else {
            panic!("expected fit_bounds, got {:?}", surface.commands());
        };
        assert_eq!(bounds.corners(), [[9.0, 45.0], [9.1, 45.1]]);
        assert_eq!(options.padding, Padding::uniform(80.0));
        assert_eq!(options.max_zoom, Some(14.5));
        assert_eq!(options.duration_ms, 1200);
    }

    #[test]
    fn focus_falls_back_to_centroid_box() {
        let director = CameraDirector::default();
        let mut surface = RecordingSurface::new();
        let a = area("a", None, Some(LatLng::new(9.0, 45.0)));
        assert!(director.focus_area(&a, &mut surface));
        let bounds = director.area_bounds(&a).unwrap();
        assert!((bounds.east - bounds.west - 0.012).abs() < 1e-12);

        let lost = area("lost", None, None);
        assert!(!director.focus_area(&lost, &mut surface));
        assert_eq!(surface.commands().len(), 1);
    }

    #[test]
    fn compare_framing_needs_two_areas_and_uses_asymmetric_padding() {
        let director = CameraDirector::default();
        let mut surface = RecordingSurface::new();
        let a = area("a", None, Some(LatLng::new(9.0, 45.0)));
        let b = area("b", None, Some(LatLng::new(9.2, 45.2)));

        assert!(!director.focus_compare_set(&[&a], &mut surface));
        assert!(director.focus_compare_set(&[&a, &b], &mut surface));

        let SurfaceCommand::FitBounds { bounds, options } = &surface.commands()[0] else {
            panic!("expected fit_bounds");
        };
        assert!((bounds.west - 8.994).abs() < 1e-9);
        assert!((bounds.north - 45.206).abs() < 1e-9);
        assert!((options.padding.left - 400.0).abs() < f64::EPSILON);
        assert_eq!(options.duration_ms, 1000);
    }

    #[test]
    fn reset_flies_to_default_pose() {
        let director = CameraDirector::default();
        let mut surface = RecordingSurface::new();
        director.reset_view(&mut surface);
        assert_eq!(
            surface.commands(),
            &[SurfaceCommand::FlyTo(FlyTo {
                center: LatLng::new(9.14, 45.445),
                zoom: 11.3,
                pitch: 45.0,
                bearing: -17.6,
                duration_ms: 1500,
            })]
        );
    }

    #[test]
    fn pulse_runs_max_frames_then_settles() {
        let mut director = CameraDirector::default();
        let mut scheduler = Scheduler::new();
        let mut surface = RecordingSurface::new();
        let id = AreaId::from("a");

        director.start_pulse(&id, &mut scheduler, &mut surface);
        run_frames(&mut director, &mut scheduler, &mut surface, Duration::from_secs(10));

        let frames = surface
            .commands()
            .iter()
            .filter(|c| matches!(c, SurfaceCommand::SetHighlight { .. }))
            .count();
        assert_eq!(frames, 100);
        assert_eq!(scheduler.active_count(), 0);
        assert_eq!(surface.highlight().map(|(id, _)| id.clone()), Some(id));
    }

    #[test]
    fn restarting_pulse_cancels_previous_loop() {
        let mut director = CameraDirector::default();
        let mut scheduler = Scheduler::new();
        let mut surface = RecordingSurface::new();

        director.start_pulse(&AreaId::from("a"), &mut scheduler, &mut surface);
        let first = director.pulse().and_then(|p| p.handle).unwrap();
        run_frames(&mut director, &mut scheduler, &mut surface, Duration::from_millis(48));

        director.start_pulse(&AreaId::from("b"), &mut scheduler, &mut surface);
        assert!(!scheduler.is_active(first));
        assert_eq!(scheduler.active_of(TaskKind::HighlightFrame), 1);

        surface.take_commands();
        run_frames(&mut director, &mut scheduler, &mut surface, Duration::from_millis(200));
        assert!(surface.commands().iter().all(|c| match c {
            SurfaceCommand::SetHighlight { id, .. } => id.as_str() == "b",
            _ => true,
        }));
    }

    #[test]
    fn stop_pulse_is_deterministic() {
        let mut director = CameraDirector::default();
        let mut scheduler = Scheduler::new();
        let mut surface = RecordingSurface::new();

        director.start_pulse(&AreaId::from("a"), &mut scheduler, &mut surface);
        run_frames(&mut director, &mut scheduler, &mut surface, Duration::from_millis(32));
        assert!(director.stop_pulse(&mut scheduler, &mut surface));
        assert_eq!(scheduler.active_count(), 0);
        assert_eq!(surface.highlight(), None);
        assert!(!director.stop_pulse(&mut scheduler, &mut surface));
    }

    #[test]
    fn config_parses_partial_toml() {
        let config: CameraConfig = toml::from_str(
            "zoom = 12.0\n[pulse]\nmax_frames = 10\n",
        )
        .unwrap();
        assert!((config.zoom - 12.0).abs() < f64::EPSILON);
        assert_eq!(config.pulse.max_frames, 10);
        assert_eq!(config.pulse.frame_interval_ms, 16);
        assert!((config.focus_max_zoom - 14.5).abs() < f64::EPSILON);
    }
}
