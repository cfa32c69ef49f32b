#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Timeline playback controller.
//!
//! A small state machine over an ordered [`Timeline`]:
//!
//! ```text
//! Idle --open--> Paused <--play/pause--> Playing
//!   ^              |                        |
//!   +----close-----+-----------close--------+
//! ```
//!
//! While playing, a periodic [`TaskKind::PlaybackTick`] task advances the
//! index by one. The tick that reaches the last bucket also stops playback;
//! playback never wraps. `play` at the last bucket rewinds to the first.
//! Exactly one tick task exists while playing and none otherwise.
//!
//! Every operation returns the [`PlaybackEvent`]s it caused so the owner
//! can recompute colors before the next tick is processed.

pub mod layer;

use std::time::Duration;

use realty_map_area_models::{BucketStats, TimeBucket, Timeline};
use realty_map_merge::TimelineOverride;
use realty_map_metrics::MetricSelector;
use realty_map_schedule::{Scheduler, TaskHandle, TaskKind};
use serde::Serialize;
use strum_macros::{AsRefStr, Display};

pub use layer::{override_layer, period_change};

/// Timeline failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimelineError {
    #[error("Timeline has no buckets")]
    Empty,
}

/// Controller phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PlaybackPhase {
    /// Closed; no override layer is active.
    #[default]
    Idle,
    Paused,
    Playing,
}

/// Snapshot of the playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub current_index: usize,
    pub is_playing: bool,
    pub active_metric: MetricSelector,
}

/// A change caused by a controller operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Opened { len: usize },
    IndexChanged { index: usize, key: String },
    Started,
    Paused,
    MetricChanged(MetricSelector),
    Closed,
}

/// Default period between playback ticks.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1200);

/// Playback state machine.
#[derive(Debug)]
pub struct TimelineController {
    timeline: Timeline,
    phase: PlaybackPhase,
    index: usize,
    metric: MetricSelector,
    tick: Option<TaskHandle>,
    interval: Duration,
}

impl Default for TimelineController {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl TimelineController {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            timeline: Timeline::default(),
            phase: PlaybackPhase::Idle,
            index: 0,
            metric: MetricSelector::default(),
            tick: None,
            interval,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.phase != PlaybackPhase::Idle
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.phase == PlaybackPhase::Playing
    }

    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub const fn metric(&self) -> MetricSelector {
        self.metric
    }

    #[must_use]
    pub const fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Handle of the running tick task, if playing.
    #[must_use]
    pub const fn tick_handle(&self) -> Option<TaskHandle> {
        self.tick
    }

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            current_index: self.index,
            is_playing: self.is_playing(),
            active_metric: self.metric,
        }
    }

    #[must_use]
    pub fn current_bucket(&self) -> Option<&TimeBucket> {
        self.timeline.get(self.index)
    }

    #[must_use]
    pub fn previous_bucket(&self) -> Option<&TimeBucket> {
        self.index
            .checked_sub(1)
            .and_then(|index| self.timeline.get(index))
    }

    #[must_use]
    pub fn current_stats(&self) -> Option<BucketStats> {
        self.current_bucket().map(TimeBucket::stats)
    }

    /// Position within the timeline in percent, 0 at the first bucket and
    /// 100 at the last.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self) -> f64 {
        match self.timeline.last_index() {
            None => 0.0,
            Some(0) => 100.0,
            Some(last) => self.index as f64 / last as f64 * 100.0,
        }
    }

    /// The override layer for the current position, while open.
    #[must_use]
    pub fn override_layer(&self) -> Option<TimelineOverride> {
        if !self.is_open() {
            return None;
        }
        self.current_bucket()
            .map(|current| override_layer(current, self.previous_bucket()))
    }

    /// Loads `timeline` and opens it paused at the most recent bucket.
    ///
    /// # Errors
    ///
    /// * [`TimelineError::Empty`] if the timeline has no buckets.
    pub fn open(
        &mut self,
        timeline: Timeline,
        scheduler: &mut Scheduler,
    ) -> Result<Vec<PlaybackEvent>, TimelineError> {
        let last = timeline.last_index().ok_or(TimelineError::Empty)?;
        self.cancel_tick(scheduler);
        self.timeline = timeline;
        self.phase = PlaybackPhase::Paused;
        self.index = last;
        log::info!(
            "Opened timeline with {} buckets at {}",
            self.timeline.len(),
            self.current_key()
        );
        Ok(vec![
            PlaybackEvent::Opened {
                len: self.timeline.len(),
            },
            self.index_changed(),
        ])
    }

    /// Starts playback, rewinding first when at the last bucket.
    pub fn play(&mut self, scheduler: &mut Scheduler) -> Vec<PlaybackEvent> {
        let Some(last) = self.timeline.last_index() else {
            return vec![];
        };
        if !self.is_open() || self.is_playing() {
            return vec![];
        }

        let mut events = Vec::new();
        if self.index >= last {
            self.index = 0;
            events.push(self.index_changed());
        }

        self.cancel_tick(scheduler);
        self.tick = Some(scheduler.start(TaskKind::PlaybackTick, self.interval));
        self.phase = PlaybackPhase::Playing;
        events.push(PlaybackEvent::Started);
        events
    }

    pub fn pause(&mut self, scheduler: &mut Scheduler) -> Vec<PlaybackEvent> {
        if !self.is_playing() {
            return vec![];
        }
        self.cancel_tick(scheduler);
        self.phase = PlaybackPhase::Paused;
        vec![PlaybackEvent::Paused]
    }

    pub fn toggle(&mut self, scheduler: &mut Scheduler) -> Vec<PlaybackEvent> {
        if self.is_playing() {
            self.pause(scheduler)
        } else {
            self.play(scheduler)
        }
    }

    /// Moves by `delta` buckets, clamped, and stops playback.
    pub fn step(&mut self, delta: isize, scheduler: &mut Scheduler) -> Vec<PlaybackEvent> {
        let target = self.index.saturating_add_signed(delta);
        self.seek(target, scheduler)
    }

    /// Jumps to `index`, clamped, and stops playback.
    pub fn seek(&mut self, index: usize, scheduler: &mut Scheduler) -> Vec<PlaybackEvent> {
        let Some(last) = self.timeline.last_index() else {
            return vec![];
        };
        if !self.is_open() {
            return vec![];
        }

        let mut events = self.pause(scheduler);
        let target = index.min(last);
        if target != self.index {
            self.index = target;
            events.push(self.index_changed());
        }
        events
    }

    /// Handles a playback tick firing.
    ///
    /// Firings from a handle other than the current one are stale and
    /// their task is cancelled.
    pub fn on_tick(&mut self, handle: TaskHandle, scheduler: &mut Scheduler) -> Vec<PlaybackEvent> {
        if self.tick != Some(handle) {
            log::debug!("Cancelling stale playback tick {}", handle.id());
            scheduler.cancel(handle);
            return vec![];
        }

        let Some(last) = self.timeline.last_index() else {
            return self.pause(scheduler);
        };

        let mut events = Vec::new();
        if self.index < last {
            self.index += 1;
            events.push(self.index_changed());
        }
        if self.index >= last {
            log::debug!("Playback reached {}, stopping", self.current_key());
            events.extend(self.pause(scheduler));
        }
        events
    }

    pub fn set_metric(&mut self, metric: MetricSelector) -> Vec<PlaybackEvent> {
        if self.metric == metric {
            return vec![];
        }
        self.metric = metric;
        vec![PlaybackEvent::MetricChanged(metric)]
    }

    /// Closes the timeline and cancels any pending tick. The loaded
    /// timeline is kept for the next `open`.
    pub fn close(&mut self, scheduler: &mut Scheduler) -> Vec<PlaybackEvent> {
        self.cancel_tick(scheduler);
        if !self.is_open() {
            return vec![];
        }
        self.phase = PlaybackPhase::Idle;
        log::info!("Closed timeline");
        vec![PlaybackEvent::Closed]
    }

    fn cancel_tick(&mut self, scheduler: &mut Scheduler) {
        if let Some(handle) = self.tick.take() {
            scheduler.cancel(handle);
        }
    }

    fn current_key(&self) -> &str {
        self.current_bucket().map_or("", |bucket| bucket.key.as_str())
    }

    fn index_changed(&self) -> PlaybackEvent {
        PlaybackEvent::IndexChanged {
            index: self.index,
            key: self.current_key().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use realty_map_area_models::{AreaId, TimelineAreaRecord};

    use super::*;

    fn timeline(keys: &[&str]) -> Timeline {
        Timeline::new(
            keys.iter()
                .enumerate()
                .map(|(i, key)| TimeBucket {
                    key: (*key).to_string(),
                    areas: vec![TimelineAreaRecord {
                        area_id: AreaId::from("x"),
                        purchase_price: Some(3000.0 + 300.0 * i as f64),
                        rent_price: Some(12.0),
                        linked_area_ids: vec![],
                    }],
                })
                .collect(),
        )
    }

    /// Fires every due tick up to `ticks` periods from now.
    fn run_ticks(
        controller: &mut TimelineController,
        scheduler: &mut Scheduler,
        ticks: u32,
    ) -> Vec<PlaybackEvent> {
        let until = scheduler.now() + DEFAULT_INTERVAL * ticks;
        let mut events = Vec::new();
        while let Some(firing) = scheduler.pop_due(until) {
            events.extend(controller.on_tick(firing.handle, scheduler));
        }
        scheduler.settle(until);
        events
    }

    #[test]
    fn open_lands_paused_on_last_bucket() {
        let mut scheduler = Scheduler::new();
        let mut controller = TimelineController::default();
        let events = controller
            .open(timeline(&["2023_H1", "2023_H2", "2024_H1"]), &mut scheduler)
            .unwrap();
        assert_eq!(controller.phase(), PlaybackPhase::Paused);
        assert_eq!(controller.index(), 2);
        assert_eq!(
            events,
            vec![
                PlaybackEvent::Opened { len: 3 },
                PlaybackEvent::IndexChanged {
                    index: 2,
                    key: "2024_H1".to_string()
                },
            ]
        );
    }

    #[test]
    fn open_empty_timeline_fails() {
        let mut scheduler = Scheduler::new();
        let mut controller = TimelineController::default();
        assert_eq!(
            controller.open(Timeline::default(), &mut scheduler),
            Err(TimelineError::Empty)
        );
        assert!(!controller.is_open());
    }

    #[test]
    fn playback_terminates_on_last_bucket() {
        let n = 5;
        let keys = ["a", "b", "c", "d", "e"];
        let mut scheduler = Scheduler::new();
        let mut controller = TimelineController::default();
        controller.open(timeline(&keys), &mut scheduler).unwrap();

        let events = controller.play(&mut scheduler);
        assert_eq!(controller.index(), 0, "play at the end rewinds");
        assert!(events.contains(&PlaybackEvent::Started));

        run_ticks(&mut controller, &mut scheduler, n - 1);
        let state = controller.state();
        assert!(!state.is_playing);
        assert_eq!(state.current_index, keys.len() - 1);
        assert_eq!(scheduler.active_count(), 0, "no timer left behind");

        assert!(run_ticks(&mut controller, &mut scheduler, 10).is_empty());
        assert_eq!(controller.index(), keys.len() - 1);
    }

    #[test]
    fn play_from_middle_does_not_rewind() {
        let mut scheduler = Scheduler::new();
        let mut controller = TimelineController::default();
        controller
            .open(timeline(&["a", "b", "c"]), &mut scheduler)
            .unwrap();
        controller.seek(1, &mut scheduler);
        let events = controller.play(&mut scheduler);
        assert_eq!(events, vec![PlaybackEvent::Started]);
        assert_eq!(controller.index(), 1);
    }

    #[test]
    fn step_and_seek_clamp_and_stop() {
        let mut scheduler = Scheduler::new();
        let mut controller = TimelineController::default();
        controller
            .open(timeline(&["a", "b", "c"]), &mut scheduler)
            .unwrap();
        controller.seek(0, &mut scheduler);
        controller.play(&mut scheduler);

        let events = controller.step(-1, &mut scheduler);
        assert_eq!(events, vec![PlaybackEvent::Paused]);
        assert_eq!(controller.index(), 0);
        assert_eq!(scheduler.active_count(), 0);

        controller.seek(99, &mut scheduler);
        assert_eq!(controller.index(), 2);
        controller.step(-1, &mut scheduler);
        assert_eq!(controller.index(), 1);
    }

    #[test]
    fn only_one_interval_across_play_and_reopen() {
        let mut scheduler = Scheduler::new();
        let mut controller = TimelineController::default();
        controller
            .open(timeline(&["a", "b", "c"]), &mut scheduler)
            .unwrap();
        controller.play(&mut scheduler);
        controller.play(&mut scheduler);
        assert_eq!(scheduler.active_of(TaskKind::PlaybackTick), 1);

        controller
            .open(timeline(&["a", "b"]), &mut scheduler)
            .unwrap();
        assert_eq!(scheduler.active_count(), 0);
    }

    #[test]
    fn close_cancels_timer_across_cycles() {
        let mut scheduler = Scheduler::new();
        let mut controller = TimelineController::default();
        for _ in 0..3 {
            controller
                .open(timeline(&["a", "b", "c"]), &mut scheduler)
                .unwrap();
            controller.play(&mut scheduler);
            run_ticks(&mut controller, &mut scheduler, 1);
            assert_eq!(controller.close(&mut scheduler), vec![PlaybackEvent::Closed]);
            assert_eq!(scheduler.active_count(), 0);
            assert!(controller.override_layer().is_none());
        }
    }

    #[test]
    fn stale_tick_is_cancelled_and_ignored() {
        let mut scheduler = Scheduler::new();
        let mut controller = TimelineController::default();
        controller
            .open(timeline(&["a", "b", "c"]), &mut scheduler)
            .unwrap();
        let stray = scheduler.start(TaskKind::PlaybackTick, DEFAULT_INTERVAL);
        assert!(controller.on_tick(stray, &mut scheduler).is_empty());
        assert!(!scheduler.is_active(stray));
        assert_eq!(controller.index(), 2);
    }

    #[test]
    fn override_layer_reports_trend_from_previous_bucket() {
        let mut scheduler = Scheduler::new();
        let mut controller = TimelineController::default();
        controller
            .open(timeline(&["2023_H2", "2024_H1"]), &mut scheduler)
            .unwrap();
        controller.set_metric(MetricSelector::Trend);

        let layer = controller.override_layer().unwrap();
        let values = layer.get(&AreaId::from("x")).unwrap();
        assert_eq!(values.purchase_price, Some(3300.0));
        let change = values.semi_annual_change.unwrap();
        assert_eq!(
            realty_map_metrics::format_label(MetricSelector::Trend, Some(change)),
            "+10.0%"
        );
    }

    #[test]
    fn progress_and_stats() {
        let mut scheduler = Scheduler::new();
        let mut controller = TimelineController::default();
        controller
            .open(timeline(&["a", "b", "c"]), &mut scheduler)
            .unwrap();
        assert!((controller.progress() - 100.0).abs() < 1e-9);
        controller.seek(1, &mut scheduler);
        assert!((controller.progress() - 50.0).abs() < 1e-9);
        let stats = controller.current_stats().unwrap();
        assert_eq!(stats.area_count, 1);
        assert_eq!(stats.average_purchase_price, Some(3300.0));
    }
}
