//! Input events and change notifications.
//!
//! [`MapEvent`]s flow into [`crate::MapController::dispatch`] from the
//! pointer and the surrounding UI. [`ViewEvent`]s flow out to every
//! registered [`MapObserver`] after the state they describe has been
//! written.

use std::sync::{Mutex, PoisonError};

use realty_map_area_models::{AreaId, BucketStats};
use realty_map_metrics::MetricSelector;
use realty_map_source::{FetchChannel, StaleResponseError};
use realty_map_surface::{CapacityError, MapLayer};
use realty_map_timeline::PlaybackState;

/// An input to the map view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapEvent {
    /// The pointer moved; `None` when it is over no area.
    PointerMove(Option<AreaId>),
    /// The pointer left the map.
    PointerLeave,
    /// A click or tap. `modifier` is the multi-select key.
    Click {
        feature_id: Option<AreaId>,
        modifier: bool,
    },
    SetMetric(MetricSelector),
    ToggleCompareMode,
    Deselect,
    RemoveFromCompare(AreaId),
    ClearCompare,
    /// Clears every interaction, closes the timeline and flies home.
    ResetView,
    OpenTimeline,
    CloseTimeline,
    PlayPause,
    StepTimeline(isize),
    SeekTimeline(usize),
    SetTimelineMetric(MetricSelector),
    SetLayerVisibility { layer: MapLayer, visible: bool },
}

/// A state change published to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// Derived areas were pushed to the surface.
    DataApplied { areas: usize, rejected: usize },
    SelectionChanged(Option<AreaId>),
    HoverChanged(Option<AreaId>),
    CompareChanged(Vec<AreaId>),
    CompareRejected(CapacityError),
    CompareModeChanged(bool),
    MetricChanged(MetricSelector),
    Playback(PlaybackState),
    /// The timeline moved to a new bucket.
    TimelineBucket {
        key: String,
        label: String,
        stats: BucketStats,
        progress: f64,
    },
    /// An open request is waiting for timeline data.
    TimelinePending,
    TimelineClosed,
    StaleResponse(StaleResponseError),
    FetchFailed {
        channel: FetchChannel,
        message: String,
    },
    LayerVisibility { layer: MapLayer, visible: bool },
}

/// Receives [`ViewEvent`]s.
pub trait MapObserver: Send + Sync {
    fn on_event(&self, event: &ViewEvent);
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl MapObserver for NullObserver {
    fn on_event(&self, _event: &ViewEvent) {}
}

/// Observer that keeps every event, for replays and tests.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<ViewEvent>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies the events received so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ViewEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Removes and returns the events received so far.
    pub fn drain(&self) -> Vec<ViewEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl MapObserver for EventLog {
    fn on_event(&self, event: &ViewEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// Observer that logs every event at `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl MapObserver for LogObserver {
    fn on_event(&self, event: &ViewEvent) {
        log::debug!("view event: {event:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_log_collects_in_order() {
        let log = EventLog::new();
        log.on_event(&ViewEvent::CompareModeChanged(true));
        log.on_event(&ViewEvent::TimelineClosed);

        assert_eq!(
            log.snapshot(),
            vec![ViewEvent::CompareModeChanged(true), ViewEvent::TimelineClosed]
        );
        assert_eq!(log.drain().len(), 2);
        assert!(log.snapshot().is_empty());
    }
}
