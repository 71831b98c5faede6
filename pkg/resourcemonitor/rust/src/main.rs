// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use resource_monitor::config::{config_dir, load_settings};
use resource_monitor::{
    AvailDataPoint, CompletionHandler, EndpointConfig, EndpointService, Error, ID,
    MeasurementScheduler, MetricDataPoint, PathLocationResolver, ResourceTypeManager,
    SamplingService, ScanRequest, SnapshotConnector, SnapshotDriver,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};

const DEFAULT_ENDPOINT: &str = "local";
const DEFAULT_FEED_ID: &str = "resource-monitor";

/// Discover a managed endpoint's resources and sample their measurements
#[derive(Parser, Debug)]
#[command(name = "resource-monitor")]
#[command(about = "Discover resources of a managed endpoint and collect their measurements")]
struct Args {
    /// Directory holding the type set configuration files
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// YAML snapshot of the endpoint's management tree
    #[arg(long)]
    snapshot: PathBuf,

    /// Endpoint name, overrides the configured one
    #[arg(long)]
    endpoint: Option<String>,

    /// Feed id, overrides the configured one
    #[arg(long)]
    feed_id: Option<String>,
}

/// Writes every data point to the log as JSON.
struct LogCompletionHandler;

impl CompletionHandler for LogCompletionHandler {
    fn on_metric(&self, point: MetricDataPoint) {
        match serde_json::to_string(&point) {
            Ok(json) => info!("metric {json}"),
            Err(e) => warn!("could not encode metric [{}]: {e}", point.key),
        }
    }

    fn on_avail(&self, point: AvailDataPoint) {
        match serde_json::to_string(&point) {
            Ok(json) => info!("avail {json}"),
            Err(e) => warn!("could not encode avail [{}]: {e}", point.key),
        }
    }

    fn on_failure(&self, instance: &ID, error: &Error) {
        warn!("failed to sample [{instance}]: {error}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    simple_logger::init_with_level(log::Level::Info)?;
    let args = Args::parse();
    info!(
        "resource-monitor starting (version {})",
        env!("CARGO_PKG_VERSION")
    );

    let dir = args.config_dir.clone().unwrap_or_else(config_dir);
    let settings = load_settings(&dir)?;
    info!("read config from [{}]", settings.sources.join(", "));
    let type_manager = Arc::new(ResourceTypeManager::new(settings.type_sets)?);
    info!("loaded [{}] resource types", type_manager.len());

    let mut endpoint_config = settings
        .endpoint
        .unwrap_or_else(|| EndpointConfig::new(DEFAULT_ENDPOINT, DEFAULT_FEED_ID));
    if let Some(name) = args.endpoint {
        endpoint_config.name = name;
    }
    if let Some(feed_id) = args.feed_id {
        endpoint_config.feed_id = feed_id;
    }

    let contents = std::fs::read_to_string(&args.snapshot)
        .with_context(|| format!("reading snapshot {}", args.snapshot.display()))?;
    let driver = SnapshotDriver::from_yaml(&contents)
        .with_context(|| format!("parsing snapshot {}", args.snapshot.display()))?;
    let connector = Arc::new(SnapshotConnector::new(
        endpoint_config.name.as_str(),
        Some(driver),
    ));

    let service = Arc::new(EndpointService::new(
        endpoint_config,
        connector,
        Arc::new(PathLocationResolver::new()),
        type_manager,
    ));
    let scheduler = Arc::new(MeasurementScheduler::new(Arc::new(LogCompletionHandler)));
    service.add_inventory_listener(scheduler.clone());

    service.start()?;
    service.wait_until_ready().await;
    if let ScanRequest::Started(scan) = service.discover_all()? {
        scan.await.context("discovery task failed")?;
    }
    let sampling: Arc<dyn SamplingService<_>> = service.clone();
    scheduler.start_collector(sampling);

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }

    info!("resource-monitor shutting down");
    scheduler.stop().await;
    service.stop()?;
    Ok(())
}
