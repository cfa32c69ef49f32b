#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Headless replay of a map session.
//!
//! ```text
//! realty_map_replay --areas packages/view/data/areas.json \
//!     --overrides packages/view/data/overrides.json \
//!     --timeline packages/view/data/timeline.json \
//!     --select navigli --metric trend
//! ```
//!
//! Loads a base dataset, fetches overrides and the timeline (from the REST
//! API unless files are given), selects an area, plays the whole timeline
//! against a recording surface and prints what the map ended up showing.
//! Set `RUST_LOG=debug` to trace every surface command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use realty_map_area_models::{Area, AreaId};
use realty_map_metrics::MetricSelector;
use realty_map_source::{DataSource, FetchChannel, FileDataSource, HttpDataSource};
use realty_map_surface::RecordingSurface;
use realty_map_view::driver::{self, DEFAULT_FRAME};
use realty_map_view::{EventLog, LogObserver, MapConfig, MapController, MapEvent, ViewEvent};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Parser)]
#[command(
    name = "realty_map_replay",
    about = "Replay a scripted map session against a headless surface"
)]
struct Cli {
    /// Base dataset: a JSON array of areas
    #[arg(long, default_value = "packages/view/data/areas.json")]
    areas: PathBuf,

    /// Map config file (TOML); the embedded defaults are used otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read overrides from this file instead of the REST API
    #[arg(long)]
    overrides: Option<PathBuf>,

    /// Read the timeline from this file instead of the REST API
    #[arg(long)]
    timeline: Option<PathBuf>,

    /// Area to select before playback
    #[arg(long)]
    select: Option<String>,

    /// Metric shown during playback (purchasePrice, rentPrice, grossYield, trend)
    #[arg(long, default_value = "trend")]
    metric: MetricSelector,

    /// Playback tick interval in milliseconds, overriding the config
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Seconds to wait for data before giving up
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Write the final area source as GeoJSON
    #[arg(long)]
    geojson: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    let mut config = MapConfig::load(cli.config.as_deref())?;
    if let Some(interval_ms) = cli.interval_ms {
        config.timeline.interval_ms = interval_ms;
    }

    let source: Arc<dyn DataSource> = if cli.overrides.is_some() || cli.timeline.is_some() {
        Arc::new(FileDataSource::new(cli.overrides.clone(), cli.timeline.clone()))
    } else {
        Arc::new(HttpDataSource::new(config.api_base_url.clone()))
    };

    let areas: Vec<Area> = serde_json::from_str(&std::fs::read_to_string(&cli.areas)?)?;
    log::info!("Read {} areas from {}", areas.len(), cli.areas.display());

    let area_source = config.area_source.clone();
    let mut controller = MapController::mount(config, RecordingSurface::new())?;
    let events = Arc::new(EventLog::new());
    controller.add_observer(events.clone());
    controller.add_observer(Arc::new(LogObserver));

    let timeout = Duration::from_secs(cli.timeout);
    let (handle, commands) = driver::channel();
    let script = async {
        handle.load_base(areas).await;
        handle.fetch(FetchChannel::Overrides).await;
        if let Some(id) = &cli.select {
            handle
                .send(MapEvent::Click {
                    feature_id: Some(AreaId::from(id.as_str())),
                    modifier: false,
                })
                .await;
        }
        handle.send(MapEvent::SetTimelineMetric(cli.metric)).await;
        handle.send(MapEvent::OpenTimeline).await;

        let opened = wait_for(&events, timeout, |event| {
            matches!(event, ViewEvent::TimelineBucket { .. }) || is_timeline_failure(event)
        })
        .await;
        if opened && !events.snapshot().iter().any(is_timeline_failure) {
            events.drain();
            handle.send(MapEvent::PlayPause).await;
            let finished = wait_for(&events, timeout, |event| {
                matches!(event, ViewEvent::Playback(state) if !state.is_playing)
            })
            .await;
            if !finished {
                log::warn!("Playback did not finish within {}s", cli.timeout);
            }
        } else {
            log::warn!("Timeline unavailable, skipping playback");
        }

        handle.shutdown().await;
    };

    let (controller, ()) = tokio::join!(
        driver::run(controller, source, commands, DEFAULT_FRAME),
        script
    );

    for event in events.snapshot() {
        if let ViewEvent::TimelineBucket {
            label,
            stats,
            progress,
            ..
        } = event
        {
            println!(
                "{label:<10} {progress:>5.1}%  areas {:>3}  avg {}",
                stats.area_count,
                stats
                    .average_purchase_price
                    .map_or_else(|| "N/D".to_string(), |price| format!("{price:.0}"))
            );
        }
    }

    println!();
    for derived in controller.derived() {
        println!(
            "{:<28} {:>18}  {}",
            derived.area.name, derived.metric_label, derived.color
        );
    }

    let surface = controller.surface();
    println!(
        "\n{} surface commands ({} camera)",
        surface.commands().len(),
        surface.camera_commands().count()
    );

    if let Some(path) = &cli.geojson
        && let Some(collection) = surface.source(&area_source)
    {
        std::fs::write(path, serde_json::to_string_pretty(collection)?)?;
        println!("Wrote {}", path.display());
    }

    Ok(())
}

fn is_timeline_failure(event: &ViewEvent) -> bool {
    matches!(
        event,
        ViewEvent::FetchFailed {
            channel: FetchChannel::Timeline,
            ..
        }
    )
}

async fn wait_for(
    events: &EventLog,
    timeout: Duration,
    predicate: impl Fn(&ViewEvent) -> bool,
) -> bool {
    let poll = async {
        while !events.snapshot().iter().any(&predicate) {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    };
    tokio::time::timeout(timeout, poll).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_flag_parses_selector_names() {
        let cli = Cli::try_parse_from(["realty_map_replay", "--metric", "grossYield"]).unwrap();
        assert_eq!(cli.metric, MetricSelector::GrossYield);
        assert_eq!(cli.areas, PathBuf::from("packages/view/data/areas.json"));

        let default = Cli::try_parse_from(["realty_map_replay"]).unwrap();
        assert_eq!(default.metric, MetricSelector::Trend);
    }

    #[test]
    fn unknown_metric_is_rejected() {
        assert!(Cli::try_parse_from(["realty_map_replay", "--metric", "volume"]).is_err());
    }
}
