#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map view orchestration.
//!
//! Ties the data, metric, geometry, feature-state, timeline and camera
//! components together behind one [`MapController`]. Inputs arrive as
//! [`MapEvent`]s, state changes leave as [`ViewEvent`]s to registered
//! [`MapObserver`]s, and [`driver::run`] drives a controller from a tokio
//! task with a [`realty_map_source::DataSource`] for remote data.

pub mod config;
pub mod controller;
pub mod driver;
pub mod event;

pub use config::{ConfigurationError, MapConfig};
pub use controller::MapController;
pub use event::{EventLog, LogObserver, MapEvent, MapObserver, NullObserver, ViewEvent};

use realty_map_source::{SourceError, StaleResponseError};
use realty_map_timeline::TimelineError;

/// Errors surfaced by the map view.
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    StaleResponse(#[from] StaleResponseError),

    #[error(transparent)]
    Timeline(#[from] TimelineError),
}

impl ViewError {
    /// Whether the error is routine and needs no attention.
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::StaleResponse(_))
    }
}
