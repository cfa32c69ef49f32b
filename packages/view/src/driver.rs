//! Async driver for a [`MapController`].
//!
//! [`run`] owns the controller on one task and multiplexes three inputs:
//! commands from a [`DriverHandle`], completed fetches, and a frame timer
//! that advances the controller's scheduler by real elapsed time. Fetches
//! run on spawned tasks and come back tagged with the request token they
//! were issued under, so a superseded response is dropped by the
//! controller rather than applied.

use std::sync::Arc;
use std::time::Duration;

use realty_map_area_models::{Area, AreaOverride, TimelineResponse};
use realty_map_source::{DataSource, FetchChannel, RequestToken, SourceError};
use realty_map_surface::RenderSurface;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::controller::MapController;
use crate::event::MapEvent;

/// Commands buffered between the handle and the driver.
pub const COMMAND_BUFFER: usize = 64;

/// Default frame cadence.
pub const DEFAULT_FRAME: Duration = Duration::from_millis(16);

/// Input to [`run`].
#[derive(Debug)]
pub enum DriverCommand {
    Event(MapEvent),
    LoadBase(Vec<Area>),
    Fetch(FetchChannel),
    Shutdown,
}

/// Sending side of a driver's command channel.
#[derive(Debug, Clone)]
pub struct DriverHandle {
    tx: mpsc::Sender<DriverCommand>,
}

impl DriverHandle {
    /// Queues an input event. Returns `false` once the driver has stopped.
    pub async fn send(&self, event: MapEvent) -> bool {
        self.tx.send(DriverCommand::Event(event)).await.is_ok()
    }

    pub async fn load_base(&self, areas: Vec<Area>) -> bool {
        self.tx.send(DriverCommand::LoadBase(areas)).await.is_ok()
    }

    /// Requests a fresh fetch on `channel`, superseding any in flight.
    pub async fn fetch(&self, channel: FetchChannel) -> bool {
        self.tx.send(DriverCommand::Fetch(channel)).await.is_ok()
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(DriverCommand::Shutdown).await;
    }
}

/// Creates a command channel for [`run`].
#[must_use]
pub fn channel() -> (DriverHandle, mpsc::Receiver<DriverCommand>) {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    (DriverHandle { tx }, rx)
}

enum FetchOutcome {
    Overrides(RequestToken, Result<Vec<AreaOverride>, SourceError>),
    Timeline(RequestToken, Result<TimelineResponse, SourceError>),
}

/// Drives `controller` until a shutdown command arrives or every handle is
/// dropped, then unmounts it and hands it back.
pub async fn run<S: RenderSurface>(
    mut controller: MapController<S>,
    source: Arc<dyn DataSource>,
    mut commands: mpsc::Receiver<DriverCommand>,
    frame: Duration,
) -> MapController<S> {
    let (fetch_tx, mut fetch_rx) = mpsc::unbounded_channel();
    let mut ticker = tokio::time::interval(frame);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();

    log::info!("Map driver started with {} data source", source.name());

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                None | Some(DriverCommand::Shutdown) => break,
                Some(DriverCommand::LoadBase(areas)) => controller.load_base(areas),
                Some(DriverCommand::Fetch(channel)) => {
                    spawn_fetch(&mut controller, &source, channel, &fetch_tx);
                }
                Some(DriverCommand::Event(event)) => {
                    if let Some(channel) = controller.dispatch(event) {
                        spawn_fetch(&mut controller, &source, channel, &fetch_tx);
                    }
                }
            },
            Some(outcome) = fetch_rx.recv() => complete(&mut controller, outcome),
            now = ticker.tick() => {
                controller.advance(now.duration_since(last));
                last = now;
            }
        }
    }

    log::info!("Map driver stopping");
    controller.unmount();
    controller
}

fn spawn_fetch<S: RenderSurface>(
    controller: &mut MapController<S>,
    source: &Arc<dyn DataSource>,
    channel: FetchChannel,
    tx: &mpsc::UnboundedSender<FetchOutcome>,
) {
    let token = controller.begin_fetch(channel);
    let source = Arc::clone(source);
    let tx = tx.clone();

    tokio::spawn(async move {
        let outcome = match channel {
            FetchChannel::Overrides => {
                FetchOutcome::Overrides(token, source.fetch_overrides().await)
            }
            FetchChannel::Timeline => FetchOutcome::Timeline(token, source.fetch_timeline().await),
        };
        let _ = tx.send(outcome);
    });
}

fn complete<S: RenderSurface>(controller: &mut MapController<S>, outcome: FetchOutcome) {
    let result = match outcome {
        FetchOutcome::Overrides(token, result) => controller.complete_overrides(token, result),
        FetchOutcome::Timeline(token, result) => controller.complete_timeline(token, result),
    };
    match result {
        Ok(()) => {}
        Err(e) if e.is_stale() => {}
        Err(e) => log::error!("Fetch not applied: {e}"),
    }
}
