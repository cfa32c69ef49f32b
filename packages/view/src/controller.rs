//! The map view orchestrator.
//!
//! [`MapController`] owns every piece of view state and is the only thing
//! that calls into the components. Each input goes through
//! [`MapController::dispatch`], which runs to completion before the next
//! one: data and feature-state writes happen first, camera commands after,
//! and observers are told last.
//!
//! Recoloring is an explicit pipeline. Any change to the base data, the
//! overrides, the active metric or the timeline position calls
//! [`realty_map_merge::recompute`] and pushes both feature collections to
//! the surface before returning.

use std::sync::Arc;
use std::time::Duration;

use realty_map_area_models::{Area, AreaId, AreaOverride, Timeline, TimelineResponse};
use realty_map_camera::CameraDirector;
use realty_map_geometry::{FeatureBuild, build_features};
use realty_map_merge::{DerivedArea, OverrideMap, index_overrides, recompute};
use realty_map_metrics::MetricSelector;
use realty_map_schedule::{Scheduler, TaskKind};
use realty_map_source::{FetchChannel, RequestGenerations, RequestToken, SourceError};
use realty_map_surface::{FeatureCollection, FeatureStateSync, RenderSurface, SourceSurface};
use realty_map_timeline::{PlaybackEvent, PlaybackState, TimelineController, TimelineError};

use crate::ViewError;
use crate::config::{ConfigurationError, MapConfig};
use crate::event::{MapEvent, MapObserver, ViewEvent};

/// Orchestrates data, interaction state, playback and camera for one
/// mounted map.
pub struct MapController<S: RenderSurface> {
    config: MapConfig,
    surface: S,
    scheduler: Scheduler,
    sync: FeatureStateSync,
    timeline: TimelineController,
    camera: CameraDirector,
    generations: RequestGenerations,
    observers: Vec<Arc<dyn MapObserver>>,
    base: Vec<Area>,
    overrides: OverrideMap,
    metric: MetricSelector,
    derived: Vec<DerivedArea>,
    compare_mode: bool,
    timeline_data: Option<Timeline>,
    pending_open: bool,
}

impl<S: RenderSurface> MapController<S> {
    /// Validates `config` and takes ownership of `surface`.
    ///
    /// # Errors
    ///
    /// * [`ConfigurationError`] if the configuration cannot drive a map,
    ///   most commonly a missing access token.
    pub fn mount(config: MapConfig, surface: S) -> Result<Self, ConfigurationError> {
        config.validate()?;
        log::info!(
            "Mounting map view (sources {}/{}, compare capacity {})",
            config.area_source,
            config.label_source,
            config.compare_capacity
        );

        Ok(Self {
            sync: FeatureStateSync::new(config.area_source.clone(), config.compare_capacity),
            timeline: TimelineController::new(config.timeline.interval()),
            camera: CameraDirector::new(config.camera),
            config,
            surface,
            scheduler: Scheduler::new(),
            generations: RequestGenerations::new(),
            observers: Vec::new(),
            base: Vec::new(),
            overrides: OverrideMap::new(),
            metric: MetricSelector::default(),
            derived: Vec::new(),
            compare_mode: false,
            timeline_data: None,
            pending_open: false,
        })
    }

    pub fn add_observer(&mut self, observer: Arc<dyn MapObserver>) {
        self.observers.push(observer);
    }

    #[must_use]
    pub const fn config(&self) -> &MapConfig {
        &self.config
    }

    #[must_use]
    pub const fn surface(&self) -> &S {
        &self.surface
    }

    /// Gives the surface back, e.g. after [`Self::unmount`].
    #[must_use]
    pub fn into_surface(self) -> S {
        self.surface
    }

    #[must_use]
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Derived areas as last pushed to the surface.
    #[must_use]
    pub fn derived(&self) -> &[DerivedArea] {
        &self.derived
    }

    #[must_use]
    pub fn derived_area(&self, id: &AreaId) -> Option<&DerivedArea> {
        self.derived.iter().find(|derived| derived.id() == id)
    }

    /// The map's own metric, used while the timeline is closed.
    #[must_use]
    pub const fn metric(&self) -> MetricSelector {
        self.metric
    }

    /// The metric currently coloring the map.
    #[must_use]
    pub fn active_metric(&self) -> MetricSelector {
        if self.timeline.is_open() {
            self.timeline.metric()
        } else {
            self.metric
        }
    }

    #[must_use]
    pub const fn compare_mode(&self) -> bool {
        self.compare_mode
    }

    #[must_use]
    pub const fn selected(&self) -> Option<&AreaId> {
        self.sync.selected()
    }

    #[must_use]
    pub const fn hovered(&self) -> Option<&AreaId> {
        self.sync.hovered()
    }

    #[must_use]
    pub fn compare_members(&self) -> &[AreaId] {
        self.sync.compare_set().members()
    }

    #[must_use]
    pub const fn playback(&self) -> &TimelineController {
        &self.timeline
    }

    #[must_use]
    pub fn playback_state(&self) -> PlaybackState {
        self.timeline.state()
    }

    /// Whether an open request is waiting for timeline data.
    #[must_use]
    pub const fn is_timeline_pending(&self) -> bool {
        self.pending_open
    }

    /// Replaces the base dataset and re-derives everything.
    ///
    /// Interaction state on areas that no longer exist is dropped, and a
    /// pulse on a vanished selection is stopped.
    pub fn load_base(&mut self, areas: Vec<Area>) {
        log::info!("Loaded {} base areas", areas.len());
        self.base = areas;
        let build = self.refresh(true);

        let had_selection = self.sync.selected().is_some();
        let had_hover = self.sync.hovered().is_some();
        let compared = self.compare_members().to_vec();
        self.sync.set_feature_ids(build.ids(), &mut self.surface);

        if had_selection && self.sync.selected().is_none() {
            self.camera.stop_pulse(&mut self.scheduler, &mut self.surface);
            self.notify(&ViewEvent::SelectionChanged(None));
        }
        if had_hover && self.sync.hovered().is_none() {
            self.notify(&ViewEvent::HoverChanged(None));
        }
        if self.compare_members() != compared.as_slice() {
            self.notify(&ViewEvent::CompareChanged(self.compare_members().to_vec()));
        }
    }

    /// Starts a fetch on `channel`, superseding any in flight.
    pub fn begin_fetch(&mut self, channel: FetchChannel) -> RequestToken {
        let token = self.generations.issue(channel);
        log::debug!("Requesting {channel} (generation {})", token.generation);
        token
    }

    /// Applies an override fetch result.
    ///
    /// # Errors
    ///
    /// * [`ViewError::StaleResponse`] if a newer request superseded `token`;
    ///   nothing is applied.
    /// * [`ViewError::Source`] if the fetch itself failed; the previous
    ///   overrides stay in place.
    pub fn complete_overrides(
        &mut self,
        token: RequestToken,
        result: Result<Vec<AreaOverride>, SourceError>,
    ) -> Result<(), ViewError> {
        self.accept(token)?;
        let records = match result {
            Ok(records) => records,
            Err(e) => return Err(self.fetch_failed(FetchChannel::Overrides, e)),
        };

        log::info!("Applying {} area overrides", records.len());
        self.overrides = index_overrides(records);
        self.refresh(true);
        Ok(())
    }

    /// Applies a timeline fetch result, opening the timeline if an open
    /// was requested before the data arrived or it is already open.
    ///
    /// # Errors
    ///
    /// * [`ViewError::StaleResponse`] if a newer request superseded `token`
    /// * [`ViewError::Source`] if the fetch itself failed
    /// * [`ViewError::Timeline`] if an open was due and the timeline is
    ///   empty
    pub fn complete_timeline(
        &mut self,
        token: RequestToken,
        result: Result<TimelineResponse, SourceError>,
    ) -> Result<(), ViewError> {
        self.accept(token)?;
        let response = match result {
            Ok(response) => response,
            Err(e) => return Err(self.fetch_failed(FetchChannel::Timeline, e)),
        };

        let timeline = Timeline::from(response);
        log::info!("Timeline data loaded ({} buckets)", timeline.len());
        self.timeline_data = Some(timeline.clone());

        if self.pending_open || self.timeline.is_open() {
            self.pending_open = false;
            self.open_with(timeline)?;
        }
        Ok(())
    }

    /// Handles one input event to completion.
    ///
    /// Returns the channel the caller should fetch when the event needs
    /// data that has not arrived yet.
    pub fn dispatch(&mut self, event: MapEvent) -> Option<FetchChannel> {
        log::trace!("Dispatching {event:?}");
        match event {
            MapEvent::PointerMove(Some(id)) => self.hover(&id),
            MapEvent::PointerMove(None) | MapEvent::PointerLeave => self.clear_hover(),
            MapEvent::Click {
                feature_id: Some(id),
                modifier,
            } => {
                if modifier || self.compare_mode {
                    self.toggle_compare(&id);
                } else {
                    self.select(&id);
                }
            }
            MapEvent::Click {
                feature_id: None, ..
            } => {}
            MapEvent::SetMetric(metric) => self.set_metric(metric),
            MapEvent::ToggleCompareMode => self.toggle_compare_mode(),
            MapEvent::Deselect => self.deselect(),
            MapEvent::RemoveFromCompare(id) => self.remove_from_compare(&id),
            MapEvent::ClearCompare => self.clear_compare(),
            MapEvent::ResetView => self.reset_view(),
            MapEvent::OpenTimeline => return self.open_timeline(),
            MapEvent::CloseTimeline => self.close_timeline(),
            MapEvent::PlayPause => {
                let events = self.timeline.toggle(&mut self.scheduler);
                self.apply_playback(&events);
            }
            MapEvent::StepTimeline(delta) => {
                let events = self.timeline.step(delta, &mut self.scheduler);
                self.apply_playback(&events);
            }
            MapEvent::SeekTimeline(index) => {
                let events = self.timeline.seek(index, &mut self.scheduler);
                self.apply_playback(&events);
            }
            MapEvent::SetTimelineMetric(metric) => {
                let events = self.timeline.set_metric(metric);
                self.apply_playback(&events);
            }
            MapEvent::SetLayerVisibility { layer, visible } => {
                self.surface.set_layer_visibility(layer, visible);
                self.notify(&ViewEvent::LayerVisibility { layer, visible });
            }
        }
        None
    }

    /// Moves the scheduler clock forward by `elapsed`, running every task
    /// firing that falls due on the way in time order.
    pub fn advance(&mut self, elapsed: Duration) {
        let until = self.scheduler.now() + elapsed;
        while let Some(firing) = self.scheduler.pop_due(until) {
            match firing.kind {
                TaskKind::PlaybackTick => {
                    let events = self.timeline.on_tick(firing.handle, &mut self.scheduler);
                    self.apply_playback(&events);
                }
                TaskKind::HighlightFrame => {
                    self.camera
                        .on_frame(firing.handle, &mut self.scheduler, &mut self.surface);
                }
            }
        }
        self.scheduler.settle(until);
    }

    /// Resets interaction and playback state and cancels every task and
    /// outstanding fetch. Loaded data is kept.
    pub fn unmount(&mut self) {
        log::info!("Unmounting map view");
        self.pending_open = false;
        let mut events = self.timeline.close(&mut self.scheduler);
        events.extend(self.timeline.set_metric(MetricSelector::default()));
        self.apply_playback(&events);
        self.camera.stop_pulse(&mut self.scheduler, &mut self.surface);

        let had_selection = self.sync.selected().is_some();
        let had_hover = self.sync.hovered().is_some();
        let had_compare = !self.compare_members().is_empty();
        self.sync.clear_all(&mut self.surface);
        if had_selection {
            self.notify(&ViewEvent::SelectionChanged(None));
        }
        if had_hover {
            self.notify(&ViewEvent::HoverChanged(None));
        }
        if had_compare {
            self.notify(&ViewEvent::CompareChanged(Vec::new()));
        }
        if self.compare_mode {
            self.compare_mode = false;
            self.notify(&ViewEvent::CompareModeChanged(false));
        }

        self.scheduler.clear();
        self.generations.invalidate(FetchChannel::Overrides);
        self.generations.invalidate(FetchChannel::Timeline);
    }

    fn refresh(&mut self, report: bool) -> FeatureBuild {
        let layer = self.timeline.override_layer();
        let derivation = recompute(
            self.active_metric(),
            &self.base,
            &self.overrides,
            layer.as_ref(),
        );
        let build = build_features(&derivation.areas, self.config.geometry);

        if report {
            for issue in derivation.issues.iter().chain(&build.rejected) {
                log::warn!("Dropped record: {issue}");
            }
        }

        push_source(&mut self.surface, &self.config.area_source, &build.areas);
        push_source(&mut self.surface, &self.config.label_source, &build.labels);
        self.derived = derivation.areas;

        self.notify(&ViewEvent::DataApplied {
            areas: build.areas.features.len(),
            rejected: derivation.issues.len() + build.rejected.len(),
        });
        build
    }

    fn accept(&mut self, token: RequestToken) -> Result<(), ViewError> {
        if let Err(stale) = self.generations.accept(token) {
            log::debug!("Dropping response: {stale}");
            self.notify(&ViewEvent::StaleResponse(stale));
            return Err(stale.into());
        }
        Ok(())
    }

    fn fetch_failed(&self, channel: FetchChannel, error: SourceError) -> ViewError {
        log::warn!("Fetching {channel} failed: {error}");
        self.notify(&ViewEvent::FetchFailed {
            channel,
            message: error.to_string(),
        });
        ViewError::Source(error)
    }

    fn hover(&mut self, id: &AreaId) {
        if self.sync.set_hovered(id, true, &mut self.surface) {
            self.notify(&ViewEvent::HoverChanged(Some(id.clone())));
        }
    }

    fn clear_hover(&mut self) {
        if self.sync.hovered().is_some() {
            self.sync.clear_hover(&mut self.surface);
            self.notify(&ViewEvent::HoverChanged(None));
        }
    }

    fn select(&mut self, id: &AreaId) {
        if !self.sync.set_selected(id, true, &mut self.surface) {
            return;
        }
        if let Some(area) = find_area(&self.base, id) {
            self.camera.focus_area(area, &mut self.surface);
        }
        self.camera
            .start_pulse(id, &mut self.scheduler, &mut self.surface);
        self.notify(&ViewEvent::SelectionChanged(Some(id.clone())));
    }

    fn deselect(&mut self) {
        if self.sync.clear_selection(&mut self.surface).is_none() {
            return;
        }
        self.camera.stop_pulse(&mut self.scheduler, &mut self.surface);
        self.camera.reset_view(&mut self.surface);
        self.notify(&ViewEvent::SelectionChanged(None));
    }

    fn toggle_compare(&mut self, id: &AreaId) {
        let before = self.compare_members().len();
        match self.sync.toggle_compare(id, &mut self.surface) {
            Ok(_) if self.compare_members().len() != before => {
                self.frame_compare_set();
                self.notify(&ViewEvent::CompareChanged(self.compare_members().to_vec()));
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("{e}");
                self.notify(&ViewEvent::CompareRejected(e));
            }
        }
    }

    fn remove_from_compare(&mut self, id: &AreaId) {
        if matches!(self.sync.set_compared(id, false, &mut self.surface), Ok(true)) {
            self.frame_compare_set();
            self.notify(&ViewEvent::CompareChanged(self.compare_members().to_vec()));
        }
    }

    fn clear_compare(&mut self) {
        if self.sync.clear_compare(&mut self.surface).is_empty() {
            return;
        }
        if !self.compare_mode {
            self.camera.reset_view(&mut self.surface);
        }
        self.notify(&ViewEvent::CompareChanged(Vec::new()));
    }

    fn toggle_compare_mode(&mut self) {
        self.compare_mode = !self.compare_mode;
        log::debug!("Compare mode {}", if self.compare_mode { "on" } else { "off" });
        if !self.compare_mode && !self.sync.clear_compare(&mut self.surface).is_empty() {
            self.notify(&ViewEvent::CompareChanged(Vec::new()));
        }
        self.notify(&ViewEvent::CompareModeChanged(self.compare_mode));
    }

    fn frame_compare_set(&mut self) {
        let areas: Vec<&Area> = self
            .sync
            .compare_set()
            .members()
            .iter()
            .filter_map(|id| find_area(&self.base, id))
            .collect();
        self.camera.focus_compare_set(&areas, &mut self.surface);
    }

    fn set_metric(&mut self, metric: MetricSelector) {
        if self.metric == metric {
            return;
        }
        self.metric = metric;
        if !self.timeline.is_open() {
            self.refresh(false);
        }
        self.notify(&ViewEvent::MetricChanged(metric));
    }

    fn open_timeline(&mut self) -> Option<FetchChannel> {
        let Some(timeline) = self.timeline_data.clone() else {
            let first_request = !self.pending_open;
            self.pending_open = true;
            log::info!("Timeline requested before its data arrived");
            self.notify(&ViewEvent::TimelinePending);
            return first_request.then_some(FetchChannel::Timeline);
        };
        if let Err(e) = self.open_with(timeline) {
            log::warn!("Cannot open timeline: {e}");
        }
        None
    }

    fn open_with(&mut self, timeline: Timeline) -> Result<(), TimelineError> {
        let events = self.timeline.open(timeline, &mut self.scheduler)?;
        self.apply_playback(&events);
        Ok(())
    }

    fn close_timeline(&mut self) {
        self.pending_open = false;
        let events = self.timeline.close(&mut self.scheduler);
        self.apply_playback(&events);
    }

    fn reset_view(&mut self) {
        log::debug!("Resetting view");
        self.pending_open = false;
        let mut events = self.timeline.close(&mut self.scheduler);
        events.extend(self.timeline.set_metric(MetricSelector::default()));
        self.apply_playback(&events);

        self.camera.stop_pulse(&mut self.scheduler, &mut self.surface);
        self.sync.clear_all(&mut self.surface);
        self.compare_mode = false;
        self.camera.reset_view(&mut self.surface);

        self.notify(&ViewEvent::SelectionChanged(None));
        self.notify(&ViewEvent::HoverChanged(None));
        self.notify(&ViewEvent::CompareChanged(Vec::new()));
        self.notify(&ViewEvent::CompareModeChanged(false));
    }

    fn apply_playback(&mut self, events: &[PlaybackEvent]) {
        if events.is_empty() {
            return;
        }

        let recolor = events.iter().any(|event| {
            matches!(
                event,
                PlaybackEvent::Opened { .. }
                    | PlaybackEvent::IndexChanged { .. }
                    | PlaybackEvent::MetricChanged(_)
                    | PlaybackEvent::Closed
            )
        });
        if recolor {
            self.refresh(false);
        }

        for event in events {
            match event {
                PlaybackEvent::IndexChanged { key, .. } => {
                    if let Some(bucket) = self.timeline.current_bucket() {
                        let bucket_event = ViewEvent::TimelineBucket {
                            key: key.clone(),
                            label: bucket.label(),
                            stats: bucket.stats(),
                            progress: self.timeline.progress(),
                        };
                        self.notify(&bucket_event);
                    }
                }
                PlaybackEvent::Closed => self.notify(&ViewEvent::TimelineClosed),
                PlaybackEvent::Opened { .. }
                | PlaybackEvent::Started
                | PlaybackEvent::Paused
                | PlaybackEvent::MetricChanged(_) => {}
            }
        }
        self.notify(&ViewEvent::Playback(self.timeline.state()));
    }

    fn notify(&self, event: &ViewEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}

fn find_area<'a>(base: &'a [Area], id: &AreaId) -> Option<&'a Area> {
    base.iter().find(|area| &area.id == id)
}

fn push_source<S: SourceSurface + ?Sized>(surface: &mut S, name: &str, data: &FeatureCollection) {
    if surface.has_source(name) {
        surface.update_source_data(name, data);
    } else {
        surface.add_source(name, data);
    }
}
