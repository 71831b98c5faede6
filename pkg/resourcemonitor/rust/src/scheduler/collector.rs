// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use super::queue::ScheduledCollectionsQueue;
use crate::api::{CompletionHandler, SamplingService};
use crate::location::Location;
use crate::measurement::MeasurementInstance;
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, Instant, sleep_until};

/// How long to wait when nothing is scheduled at all.
pub const IDLE_SLEEP: Duration = Duration::from_secs(10);

/// Drives the collections of one endpoint. Single-threaded in its own cadence;
/// a round in flight always runs to completion.
pub struct MeasurementCollector<L: Location> {
    queue: Arc<ScheduledCollectionsQueue<L>>,
    sampling: Arc<dyn SamplingService<L>>,
    handler: Arc<dyn CompletionHandler>,
}

impl<L: Location> MeasurementCollector<L> {
    pub fn new(
        queue: Arc<ScheduledCollectionsQueue<L>>,
        sampling: Arc<dyn SamplingService<L>>,
        handler: Arc<dyn CompletionHandler>,
    ) -> Self {
        Self {
            queue,
            sampling,
            handler,
        }
    }

    /// Loops until `shutdown` turns true or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let endpoint = self.sampling.endpoint_name().to_string();
        info!("[{endpoint}] measurement collector started");

        while !*shutdown.borrow() {
            let deadline = match self.queue.next_expected_collection_time() {
                None => Instant::now() + IDLE_SLEEP,
                Some(due) if due <= Instant::now() => {
                    self.collect_due(&endpoint).await;
                    continue;
                }
                Some(due) => due,
            };

            tokio::select! {
                _ = sleep_until(deadline) => {}
                _ = self.queue.scheduled() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("[{endpoint}] measurement collector stopped");
    }

    async fn collect_due(&self, endpoint: &str) {
        let due = self.queue.pop_next_scheduled_set();
        if due.is_empty() {
            return;
        }
        debug!("[{endpoint}] collecting [{}] measurements", due.len());

        let (avails, metrics): (Vec<Arc<MeasurementInstance<L>>>, Vec<_>) =
            due.into_iter().partition(|i| i.is_availability());
        let sampling = Arc::clone(&self.sampling);
        let handler = Arc::clone(&self.handler);

        let round = tokio::task::spawn_blocking(move || {
            let metrics_result = if metrics.is_empty() {
                Ok(())
            } else {
                sampling.measure_metrics(&metrics, handler.as_ref())
            };
            let avails_result = if avails.is_empty() {
                Ok(())
            } else {
                sampling.measure_avails(&avails, handler.as_ref())
            };
            metrics_result.and(avails_result)
        })
        .await;

        match round {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.is_not_ready() => {
                debug!("[{endpoint}] endpoint is not ready yet, skipping round: {e}")
            }
            Ok(Err(e)) => warn!("[{endpoint}] failed to collect measurements: {e}"),
            Err(e) => error!("[{endpoint}] collection round panicked: {e}"),
        }
    }
}
