// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Interval-based measurement scheduling
//! One priority queue and one collector task per endpoint

mod collector;
mod queue;
mod scheduled;

pub use collector::{IDLE_SLEEP, MeasurementCollector};
pub use queue::ScheduledCollectionsQueue;
pub use scheduled::ScheduledMeasurementInstance;

use crate::api::{
    CompletionHandler, DiscoveryCompletedEvent, InventoryEvent, InventoryListener, SamplingService,
};
use crate::location::Location;
use crate::resource::Resource;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

struct EndpointSchedule<L> {
    queue: Arc<ScheduledCollectionsQueue<L>>,
    collector: Option<JoinHandle<()>>,
}

pub struct MeasurementScheduler<L: Location> {
    handler: Arc<dyn CompletionHandler>,
    endpoints: Mutex<HashMap<String, EndpointSchedule<L>>>,
    shutdown: watch::Sender<bool>,
}

impl<L: Location> MeasurementScheduler<L> {
    pub fn new(handler: Arc<dyn CompletionHandler>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            handler,
            endpoints: Mutex::new(HashMap::new()),
            shutdown,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, EndpointSchedule<L>>> {
        self.endpoints.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create_or_get_queue(&self, endpoint: &str) -> Arc<ScheduledCollectionsQueue<L>> {
        let mut endpoints = self.lock();
        let schedule = endpoints
            .entry(endpoint.to_string())
            .or_insert_with(|| EndpointSchedule {
                queue: Arc::new(ScheduledCollectionsQueue::new()),
                collector: None,
            });
        Arc::clone(&schedule.queue)
    }

    /// Spawn the collector loop of the endpoint served by `sampling`. Must be
    /// called from within a tokio runtime.
    pub fn start_collector(&self, sampling: Arc<dyn SamplingService<L>>) {
        let endpoint = sampling.endpoint_name().to_string();
        let queue = self.create_or_get_queue(&endpoint);

        let mut endpoints = self.lock();
        let Some(schedule) = endpoints.get_mut(&endpoint) else {
            return;
        };
        if schedule.collector.is_some() {
            warn!("[{endpoint}] measurement collector already running");
            return;
        }
        let collector = MeasurementCollector::new(queue, sampling, Arc::clone(&self.handler));
        schedule.collector = Some(tokio::spawn(collector.run(self.shutdown.subscribe())));
    }

    pub fn schedule(&self, endpoint: &str, resources: &[Arc<Resource<L>>]) {
        let now = Instant::now();
        let batch: Vec<_> = resources
            .iter()
            .flat_map(|r| ScheduledMeasurementInstance::for_resource(r, now))
            .collect();
        if batch.is_empty() {
            return;
        }
        debug!("[{endpoint}] scheduling [{}] measurements", batch.len());
        self.create_or_get_queue(endpoint).schedule(batch);
    }

    pub fn unschedule(&self, endpoint: &str, resources: &[Arc<Resource<L>>]) {
        let queue = self.lock().get(endpoint).map(|s| Arc::clone(&s.queue));
        if let Some(queue) = queue {
            queue.unschedule(resources);
        }
    }

    /// Signal every collector and wait for the rounds in flight to finish.
    pub async fn stop(&self) {
        self.shutdown.send_replace(true);
        let collectors: Vec<(String, JoinHandle<()>)> = self
            .lock()
            .iter_mut()
            .filter_map(|(name, s)| s.collector.take().map(|c| (name.clone(), c)))
            .collect();
        for (endpoint, collector) in collectors {
            if let Err(e) = collector.await {
                warn!("[{endpoint}] measurement collector ended abnormally: {e}");
            }
        }
        info!("measurement scheduler stopped");
    }
}

impl<L: Location> InventoryListener<L> for MeasurementScheduler<L> {
    /// Modified resources are rescheduled from scratch.
    fn resources_added(&self, event: &InventoryEvent<L>) {
        self.unschedule(&event.endpoint, &event.resources);
        self.schedule(&event.endpoint, &event.resources);
    }

    fn resources_removed(&self, event: &InventoryEvent<L>) {
        self.unschedule(&event.endpoint, &event.resources);
    }

    fn discovery_completed(&self, event: &DiscoveryCompletedEvent<L>) {
        debug!(
            "[{}] discovery completed: [{}] added or modified, [{}] removed",
            event.endpoint,
            event.added_or_modified.len(),
            event.removed.len()
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::api::{AvailDataPoint, MetricDataPoint};
    use crate::errors::{Error, Result};
    use crate::ids::ID;
    use crate::measurement::MeasurementInstance;
    use crate::path::PathLocation;
    use crate::discovery::{Discovery, DiscoveryConsumer};
    use crate::interval::{Interval, MAX_INTERVAL};
    use crate::location::AttributeLocation;
    use crate::measurement::{MeasurementKind, MeasurementType, MetricKind};
    use crate::path::PathLocationResolver;
    use crate::resource_type::{ResourceType, TypeSet};
    use crate::snapshot::SnapshotDriver;
    use crate::test_utils::{avail_type, metric_type, resource_with};
    use crate::type_manager::ResourceTypeManager;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::time::Duration;

    #[derive(Default)]
    struct Recorder {
        metrics: Mutex<Vec<String>>,
        avails: Mutex<Vec<String>>,
        failures: Mutex<Vec<String>>,
    }

    impl CompletionHandler for Recorder {
        fn on_metric(&self, point: MetricDataPoint) {
            self.metrics.lock().unwrap().push(point.key);
        }

        fn on_avail(&self, point: AvailDataPoint) {
            self.avails.lock().unwrap().push(point.key);
        }

        fn on_failure(&self, instance: &ID, _error: &Error) {
            self.failures.lock().unwrap().push(instance.to_string());
        }
    }

    struct FakeSampling {
        ready: AtomicBool,
    }

    impl SamplingService<PathLocation> for FakeSampling {
        fn endpoint_name(&self) -> &str {
            "local"
        }

        fn measure_metrics(
            &self,
            instances: &[Arc<MeasurementInstance<PathLocation>>],
            handler: &dyn CompletionHandler,
        ) -> Result<()> {
            if !self.ready.load(Ordering::SeqCst) {
                return Err(Error::NotReady {
                    endpoint: "local".to_string(),
                    reason: "starting".to_string(),
                });
            }
            for instance in instances {
                if instance.id().as_str() == "broken" {
                    handler.on_failure(instance.id(), &Error::driver("boom"));
                    continue;
                }
                handler.on_metric(MetricDataPoint {
                    key: self.generate_metric_id(instance),
                    timestamp_ms: 0,
                    value: 1.0,
                    kind: Default::default(),
                    family: self.generate_metric_family(instance),
                    labels: self.generate_metric_labels(instance),
                });
            }
            Ok(())
        }

        fn measure_avails(
            &self,
            instances: &[Arc<MeasurementInstance<PathLocation>>],
            handler: &dyn CompletionHandler,
        ) -> Result<()> {
            for instance in instances {
                handler.on_avail(AvailDataPoint {
                    key: self.generate_metric_id(instance),
                    timestamp_ms: 0,
                    value: crate::api::Avail::Up,
                    family: self.generate_metric_family(instance),
                    labels: Default::default(),
                });
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Discovered {
        resources: Vec<Arc<Resource<PathLocation>>>,
        errors: usize,
    }

    impl DiscoveryConsumer<PathLocation> for Discovered {
        fn accept(&mut self, resource: Arc<Resource<PathLocation>>) {
            self.resources.push(resource);
        }

        fn report(&mut self, _error: Error) {
            self.errors += 1;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_expected_time_after_discovery() {
        let server = ResourceType::new("Server", PathLocation::empty()).with_measurement(
            MeasurementType::new(
                "HeapUsed",
                AttributeLocation::new(PathLocation::empty(), "heap-used"),
                Interval::seconds(5).unwrap(),
                MeasurementKind::Metric(MetricKind::Gauge),
            ),
        );
        let type_manager =
            ResourceTypeManager::new(vec![TypeSet::new("main", true, vec![server])]).unwrap();
        let driver = SnapshotDriver::from_yaml("nodes:\n  \"/\":\n    heap-used: 1024\n").unwrap();
        let resolver = PathLocationResolver::new();

        let mut discovered = Discovered::default();
        Discovery::new(&resolver, &type_manager, "feed", "main")
            .discover_all_resources(&driver, &mut discovered);
        assert_eq!(discovered.errors, 0);
        assert_eq!(discovered.resources.len(), 1);
        let resource = &discovered.resources[0];
        assert_eq!(resource.name().as_str(), "Server");
        assert_eq!(resource.measurements().len(), 1);

        let scheduler = MeasurementScheduler::new(Arc::new(Recorder::default()));
        let now = Instant::now();
        scheduler.resources_added(&InventoryEvent {
            endpoint: "main".to_string(),
            resources: discovered.resources,
        });

        let next = scheduler
            .create_or_get_queue("main")
            .next_expected_collection_time()
            .unwrap();
        assert!(next >= now + Duration::from_millis(4900));
        assert!(next <= now + Duration::from_millis(5100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_longest_interval_is_schedulable() {
        let scheduler = MeasurementScheduler::new(Arc::new(Recorder::default()));
        let yearly = metric_type("yearly", MAX_INTERVAL.as_secs());
        let now = Instant::now();
        scheduler.resources_added(&InventoryEvent {
            endpoint: "local".to_string(),
            resources: vec![resource_with("r", vec![("y", yearly)])],
        });

        let queue = scheduler.create_or_get_queue("local");
        assert_eq!(queue.next_expected_collection_time(), Some(now + MAX_INTERVAL));
        assert!(queue.pop_next_scheduled_set_at(now + Duration::from_secs(1)).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_added_twice_is_not_scheduled_twice() {
        let scheduler = MeasurementScheduler::new(Arc::new(Recorder::default()));
        let resource = resource_with("r", vec![("m", metric_type("m", 5))]);
        let event = InventoryEvent {
            endpoint: "local".to_string(),
            resources: vec![resource],
        };

        scheduler.resources_added(&event);
        tokio::time::advance(Duration::from_secs(1)).await;
        scheduler.resources_added(&event);
        assert_eq!(scheduler.create_or_get_queue("local").len(), 1);

        scheduler.resources_removed(&event);
        assert!(scheduler.create_or_get_queue("local").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_collector_dispatches_due_work() {
        let recorder = Arc::new(Recorder::default());
        let scheduler = MeasurementScheduler::new(recorder.clone());
        scheduler.start_collector(Arc::new(FakeSampling {
            ready: AtomicBool::new(true),
        }));

        let resource = resource_with(
            "r",
            vec![
                ("m", metric_type("m", 1)),
                ("broken", metric_type("broken", 1)),
                ("up", avail_type("up", 2)),
            ],
        );
        scheduler.schedule("local", &[resource]);

        tokio::time::sleep(Duration::from_millis(2500)).await;
        scheduler.stop().await;

        let metrics = recorder.metrics.lock().unwrap().clone();
        assert!(metrics.len() >= 2);
        assert!(metrics.iter().all(|k| k == "m"));
        assert!(!recorder.failures.lock().unwrap().is_empty());
        assert!(recorder.avails.lock().unwrap().contains(&"up".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_collector_survives_not_ready_endpoint() {
        let recorder = Arc::new(Recorder::default());
        let sampling = Arc::new(FakeSampling {
            ready: AtomicBool::new(false),
        });
        let scheduler = MeasurementScheduler::new(recorder.clone());
        scheduler.start_collector(sampling.clone());
        scheduler.schedule("local", &[resource_with("r", vec![("m", metric_type("m", 1))])]);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(recorder.metrics.lock().unwrap().is_empty());

        sampling.ready.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(2)).await;
        scheduler.stop().await;
        assert!(!recorder.metrics.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_without_work() {
        let scheduler = MeasurementScheduler::<PathLocation>::new(Arc::new(Recorder::default()));
        scheduler.start_collector(Arc::new(FakeSampling {
            ready: AtomicBool::new(true),
        }));
        scheduler.stop().await;
        assert!(scheduler.create_or_get_queue("local").is_empty());
    }
}
