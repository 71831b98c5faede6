// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Discovery and sampling for one managed endpoint
//!
//! The service owns the endpoint's resource graph, serializes full discovery
//! scans, notifies inventory listeners and samples measurement instances.

use crate::api::{
    Avail, AvailDataPoint, CompletionHandler, DiscoveryCompletedEvent, InventoryEvent,
    InventoryListener, MetricDataPoint, SamplingService,
};
use crate::discovery::{Discovery, DiscoveryConsumer};
use crate::driver::{Connector, Driver};
use crate::errors::{Error, Result};
use crate::ids::ID;
use crate::location::{Location, LocationResolver};
use crate::measurement::{MeasurementInstance, MeasurementKind, MetricKind};
use crate::resource::Resource;
use crate::resource_manager::{Effect, ResourceManager};
use crate::resource_type::ResourceType;
use crate::type_manager::ResourceTypeManager;
use log::{debug, error, info, warn};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tokio::time::Duration;

fn default_wait_for_ready_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    pub feed_id: String,
    #[serde(default)]
    pub metric_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub metric_id_template: Option<String>,
    #[serde(default = "default_wait_for_ready_secs")]
    pub wait_for_ready_secs: u64,
}

impl EndpointConfig {
    pub fn new(name: impl Into<String>, feed_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            feed_id: feed_id.into(),
            metric_labels: BTreeMap::new(),
            metric_id_template: None,
            wait_for_ready_secs: default_wait_for_ready_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    Initial,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl ServiceStatus {
    pub(crate) fn can_transition_to(self, next: ServiceStatus) -> bool {
        use ServiceStatus::*;
        matches!(
            (self, next),
            (Initial, Starting)
                | (Stopped, Starting)
                | (Starting, Running)
                | (Starting, Stopping)
                | (Running, Stopping)
                | (Stopping, Stopped)
        )
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceStatus::Initial => write!(f, "initial"),
            ServiceStatus::Starting => write!(f, "starting"),
            ServiceStatus::Running => write!(f, "running"),
            ServiceStatus::Stopping => write!(f, "stopping"),
            ServiceStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// Outcome of a [`EndpointService::discover_all`] request.
#[derive(Debug)]
pub enum ScanRequest {
    /// A scan was started; the handle resolves once it and any scan queued
    /// behind it have finished.
    Started(JoinHandle<()>),
    /// A scan is in flight; this request will run right after it.
    Queued,
    /// A scan is in flight and another is already queued.
    Rejected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoverySummary {
    pub added: usize,
    pub modified: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub errors: usize,
}

#[derive(Debug, Default)]
struct ScanState {
    running: bool,
    queued: bool,
}

/// Clears the scan flags when the scan thread exits, including by panic, so
/// later requests can start a new scan.
struct ScanGuard<'a> {
    endpoint: &'a str,
    scan: &'a Mutex<ScanState>,
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!("[{}] full discovery aborted by a panic", self.endpoint);
        }
        *self.scan.lock().unwrap_or_else(PoisonError::into_inner) = ScanState::default();
    }
}

/// Collects what one discovery run did to the resource graph.
struct DiscoveryResults<'a, L: Location> {
    endpoint: &'a str,
    resource_manager: &'a ResourceManager<L>,
    added_or_modified: Vec<Arc<Resource<L>>>,
    discovered: HashSet<ID>,
    summary: DiscoverySummary,
}

impl<'a, L: Location> DiscoveryResults<'a, L> {
    fn new(endpoint: &'a str, resource_manager: &'a ResourceManager<L>) -> Self {
        Self {
            endpoint,
            resource_manager,
            added_or_modified: Vec::new(),
            discovered: HashSet::new(),
            summary: DiscoverySummary::default(),
        }
    }
}

impl<L: Location> DiscoveryConsumer<L> for DiscoveryResults<'_, L> {
    fn accept(&mut self, resource: Arc<Resource<L>>) {
        match self.resource_manager.add_resource(resource) {
            Ok(result) => {
                self.discovered.insert(result.resource.id().clone());
                match result.effect {
                    Effect::Added => {
                        self.summary.added += 1;
                        self.added_or_modified.push(result.resource);
                    }
                    Effect::Modified => {
                        self.summary.modified += 1;
                        self.added_or_modified.push(result.resource);
                    }
                    Effect::Unchanged => self.summary.unchanged += 1,
                }
            }
            Err(e) => self.report(e),
        }
    }

    fn report(&mut self, error: Error) {
        error!("[{}] could not access endpoint: {error}", self.endpoint);
        self.summary.errors += 1;
    }
}

pub struct EndpointService<L: Location> {
    config: EndpointConfig,
    connector: Arc<dyn Connector<L>>,
    resolver: Arc<dyn LocationResolver<L>>,
    type_manager: Arc<ResourceTypeManager<L>>,
    resource_manager: ResourceManager<L>,
    listeners: RwLock<Vec<Arc<dyn InventoryListener<L>>>>,
    scan: Mutex<ScanState>,
    status: Mutex<ServiceStatus>,
}

impl<L: Location> EndpointService<L> {
    pub fn new(
        config: EndpointConfig,
        connector: Arc<dyn Connector<L>>,
        resolver: Arc<dyn LocationResolver<L>>,
        type_manager: Arc<ResourceTypeManager<L>>,
    ) -> Self {
        Self {
            config,
            connector,
            resolver,
            type_manager,
            resource_manager: ResourceManager::new(),
            listeners: RwLock::new(Vec::new()),
            scan: Mutex::new(ScanState::default()),
            status: Mutex::new(ServiceStatus::Initial),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn feed_id(&self) -> &str {
        &self.config.feed_id
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub fn resource_manager(&self) -> &ResourceManager<L> {
        &self.resource_manager
    }

    pub fn type_manager(&self) -> &ResourceTypeManager<L> {
        &self.type_manager
    }

    pub fn status(&self) -> ServiceStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, next: ServiceStatus) -> Result<()> {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        if !status.can_transition_to(next) {
            return Err(Error::invalid_argument(format!(
                "[{}] cannot go from {} to {next}",
                self.config.name, *status
            )));
        }
        debug!("[{}] {} -> {next}", self.config.name, *status);
        *status = next;
        Ok(())
    }

    pub fn start(&self) -> Result<()> {
        self.transition(ServiceStatus::Starting)?;
        self.transition(ServiceStatus::Running)?;
        info!("[{}] endpoint service started", self.config.name);
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        self.transition(ServiceStatus::Stopping)?;
        self.transition(ServiceStatus::Stopped)?;
        info!("[{}] endpoint service stopped", self.config.name);
        Ok(())
    }

    fn assert_running(&self, operation: &str) -> Result<()> {
        let status = self.status();
        if status != ServiceStatus::Running {
            return Err(Error::NotReady {
                endpoint: self.config.name.clone(),
                reason: format!("{operation} called while {status}"),
            });
        }
        Ok(())
    }

    pub fn add_inventory_listener(&self, listener: Arc<dyn InventoryListener<L>>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    fn listeners(&self) -> Vec<Arc<dyn InventoryListener<L>>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn inventory_event(&self, resources: Vec<Arc<Resource<L>>>) -> InventoryEvent<L> {
        InventoryEvent {
            endpoint: self.config.name.clone(),
            resources,
        }
    }

    fn fire_resources_added(&self, resources: &[Arc<Resource<L>>]) {
        if resources.is_empty() {
            return;
        }
        debug!(
            "[{}] firing inventory event for [{}] added resources",
            self.config.name,
            resources.len()
        );
        let event = self.inventory_event(resources.to_vec());
        for listener in self.listeners() {
            listener.resources_added(&event);
        }
    }

    fn fire_resources_removed(&self, resources: &[Arc<Resource<L>>]) {
        if resources.is_empty() {
            return;
        }
        debug!(
            "[{}] firing inventory event for [{}] removed resources",
            self.config.name,
            resources.len()
        );
        let event = self.inventory_event(resources.to_vec());
        for listener in self.listeners() {
            listener.resources_removed(&event);
        }
    }

    fn fire_discovery_completed(
        &self,
        added_or_modified: Vec<Arc<Resource<L>>>,
        removed: Vec<Arc<Resource<L>>>,
    ) {
        let event = DiscoveryCompletedEvent {
            endpoint: self.config.name.clone(),
            added_or_modified,
            removed,
        };
        for listener in self.listeners() {
            listener.discovery_completed(&event);
        }
    }

    /// Poll the endpoint until a session can be opened.
    pub async fn wait_until_ready(&self) {
        let retry = Duration::from_secs(self.config.wait_for_ready_secs.max(1));
        loop {
            let connector = Arc::clone(&self.connector);
            match tokio::task::spawn_blocking(move || connector.open().map(drop)).await {
                Ok(Ok(())) => {
                    info!("[{}] endpoint is ready", self.config.name);
                    return;
                }
                Ok(Err(e)) => info!(
                    "[{}] endpoint is not ready, retrying in {}s: {e}",
                    self.config.name,
                    retry.as_secs()
                ),
                Err(e) => warn!("[{}] endpoint not ready yet: {e}", self.config.name),
            }
            tokio::time::sleep(retry).await;
        }
    }

    /// Request a full discovery scan. At most one scan runs at a time with at
    /// most one more queued behind it; further requests are rejected.
    pub fn discover_all(self: &Arc<Self>) -> Result<ScanRequest> {
        self.assert_running("discover_all")?;
        {
            let mut scan = self.lock_scan();
            if scan.running {
                if scan.queued {
                    debug!(
                        "[{}] redundant full discovery scan will be ignored",
                        self.config.name
                    );
                    return Ok(ScanRequest::Rejected);
                }
                scan.queued = true;
                return Ok(ScanRequest::Queued);
            }
            scan.running = true;
        }

        let service = Arc::clone(self);
        Ok(ScanRequest::Started(tokio::task::spawn_blocking(move || {
            service.run_scans()
        })))
    }

    fn lock_scan(&self) -> MutexGuard<'_, ScanState> {
        self.scan.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_scans(&self) {
        let _guard = ScanGuard {
            endpoint: &self.config.name,
            scan: &self.scan,
        };
        loop {
            if let Err(e) = self.run_full_discovery() {
                warn!("[{}] full discovery failed: {e}", self.config.name);
            }
            let mut scan = self.lock_scan();
            if scan.queued {
                scan.queued = false;
                continue;
            }
            scan.running = false;
            return;
        }
    }

    /// Run one full scan on the calling thread.
    ///
    /// Resources that were not rediscovered are removed only when the scan had
    /// no errors, and only then is the discovery-completed event fired.
    pub fn run_full_discovery(&self) -> Result<DiscoverySummary> {
        self.assert_running("run_full_discovery")?;
        info!("[{}] full discovery requested", self.config.name);
        let started = std::time::Instant::now();

        let mut results = DiscoveryResults::new(&self.config.name, &self.resource_manager);
        match self.connector.open() {
            Ok(driver) => self
                .discovery()
                .discover_all_resources(driver.as_ref(), &mut results),
            Err(e) => results.report(e),
        }

        self.resource_manager.log_tree_graph(
            &format!("discovered all resources for [{}]", self.config.name),
            started.elapsed(),
        );

        let DiscoveryResults {
            added_or_modified,
            discovered,
            mut summary,
            ..
        } = results;

        self.fire_resources_added(&added_or_modified);

        if summary.errors > 0 {
            debug!(
                "[{}] [{}] discovery errors occurred, keeping undiscovered resources",
                self.config.name, summary.errors
            );
            return Ok(summary);
        }

        let mut removed = Vec::new();
        for resource in self.resource_manager.get_resources_breadth_first() {
            if !discovered.contains(resource.id()) {
                removed.extend(self.resource_manager.remove_resource(&resource));
            }
        }
        summary.removed = removed.len();
        self.fire_resources_removed(&removed);
        self.fire_discovery_completed(added_or_modified, removed);

        info!(
            "[{}] discovery finished in {}ms: {summary:?}",
            self.config.name,
            started.elapsed().as_millis()
        );
        Ok(summary)
    }

    /// Discover resources of `child_type` under every resource matching
    /// `parent_location`, or from the top when it is `None`.
    pub fn discover_children(
        &self,
        parent_location: Option<&L>,
        child_type: &Arc<ResourceType<L>>,
    ) -> Result<Vec<Arc<Resource<L>>>> {
        self.assert_running("discover_children")?;
        debug!(
            "[{}] discovering children of type [{child_type}] under [{}]",
            self.config.name,
            parent_location.map_or_else(|| "-".to_string(), ToString::to_string)
        );

        let driver = self.connector.open()?;
        let parents: Vec<Option<Arc<Resource<L>>>> = match parent_location {
            Some(location) => self
                .resource_manager
                .find_resources(location, self.resolver.as_ref())
                .into_iter()
                .map(Some)
                .collect(),
            None => vec![None],
        };

        let mut results = DiscoveryResults::new(&self.config.name, &self.resource_manager);
        let discovery = self.discovery();
        for parent in &parents {
            discovery.discover_children(parent.as_ref(), child_type, driver.as_ref(), &mut results);
        }
        let added = results.added_or_modified;
        self.fire_resources_added(&added);
        Ok(added)
    }

    /// Remove resources matching `location`, with all of their descendants.
    pub fn remove_resources(&self, location: &L) -> Result<Vec<Arc<Resource<L>>>> {
        self.assert_running("remove_resources")?;
        let removed = self
            .resource_manager
            .remove_resources(location, self.resolver.as_ref());
        self.fire_resources_removed(&removed);
        Ok(removed)
    }

    fn discovery(&self) -> Discovery<'_, L> {
        Discovery::new(
            self.resolver.as_ref(),
            &self.type_manager,
            &self.config.feed_id,
            &self.config.name,
        )
    }

    fn owning_resource(&self, instance: &MeasurementInstance<L>) -> Option<Arc<Resource<L>>> {
        instance
            .owner()
            .and_then(|id| self.resource_manager.get_resource(id))
    }

    fn replace_tokens(
        &self,
        location: &L,
        instance: &MeasurementInstance<L>,
        resource: Option<&Resource<L>>,
        text: &str,
    ) -> String {
        let measurement_type = instance.measurement_type();
        let replaced = text
            .replace("%FeedId", &self.config.feed_id)
            .replace("%ManagedServerName", &self.config.name)
            .replace(
                "%ResourceName",
                resource.map(|r| r.name().as_str()).unwrap_or_default(),
            )
            .replace("%AttributeName", instance.attribute_location().attribute())
            .replace("%MetricTypeName", measurement_type.name().as_str())
            .replace("%MetricTypeUnits", measurement_type.units());
        self.resolver
            .apply_template(&replaced, location, &self.config.name)
    }

    fn sample<T>(
        &self,
        instances: &[Arc<MeasurementInstance<L>>],
        handler: &dyn CompletionHandler,
        convert: impl Fn(&MeasurementInstance<L>, Value) -> Result<T>,
        deliver: impl Fn(&MeasurementInstance<L>, T, u64),
    ) -> Result<()> {
        let driver: Box<dyn Driver<L>> = self.connector.open()?;
        for instance in instances.iter().map(Arc::as_ref) {
            let sampled = driver
                .fetch_attribute(instance.attribute_location())
                .and_then(|value| convert(instance, value));
            match sampled {
                Ok(value) => deliver(instance, value, now_millis()),
                Err(e) => handler.on_failure(instance.id(), &e),
            }
        }
        Ok(())
    }
}

impl<L: Location> SamplingService<L> for EndpointService<L> {
    fn endpoint_name(&self) -> &str {
        &self.config.name
    }

    fn measure_metrics(
        &self,
        instances: &[Arc<MeasurementInstance<L>>],
        handler: &dyn CompletionHandler,
    ) -> Result<()> {
        self.assert_running("measure_metrics")?;
        debug!(
            "[{}] collecting [{}] metrics",
            self.config.name,
            instances.len()
        );
        self.sample(
            instances,
            handler,
            |instance, value| to_f64(&value, instance),
            |instance, value, timestamp_ms| {
                let kind = match instance.measurement_type().kind() {
                    MeasurementKind::Metric(kind) => *kind,
                    MeasurementKind::Availability { .. } => MetricKind::Gauge,
                };
                handler.on_metric(MetricDataPoint {
                    key: self.generate_metric_id(instance),
                    timestamp_ms,
                    value,
                    kind,
                    family: self.generate_metric_family(instance),
                    labels: self.generate_metric_labels(instance),
                });
            },
        )
    }

    fn measure_avails(
        &self,
        instances: &[Arc<MeasurementInstance<L>>],
        handler: &dyn CompletionHandler,
    ) -> Result<()> {
        self.assert_running("measure_avails")?;
        debug!(
            "[{}] checking [{}] avails",
            self.config.name,
            instances.len()
        );
        self.sample(
            instances,
            handler,
            |instance, value| {
                let up_pattern = match instance.measurement_type().kind() {
                    MeasurementKind::Availability { up_pattern } => up_pattern.as_ref(),
                    MeasurementKind::Metric(_) => None,
                };
                to_avail(up_pattern, &value, instance)
            },
            |instance, value, timestamp_ms| {
                handler.on_avail(AvailDataPoint {
                    key: self.generate_metric_id(instance),
                    timestamp_ms,
                    value,
                    family: self.generate_metric_family(instance),
                    labels: self.generate_metric_labels(instance),
                });
            },
        )
    }

    fn generate_metric_id(&self, instance: &MeasurementInstance<L>) -> String {
        let template = instance
            .measurement_type()
            .metric_id_template()
            .or(self.config.metric_id_template.as_deref());
        match template {
            Some(template) => {
                let resource = self.owning_resource(instance);
                self.replace_tokens(
                    instance.attribute_location().location(),
                    instance,
                    resource.as_deref(),
                    template,
                )
            }
            None => instance.id().to_string(),
        }
    }

    /// Endpoint labels, overridden by measurement type labels, overridden by
    /// the labels of the resource types up the resource's ancestry.
    fn generate_metric_labels(&self, instance: &MeasurementInstance<L>) -> BTreeMap<String, String> {
        let resource = self.owning_resource(instance);
        let location = instance.attribute_location().location();
        let mut labels = BTreeMap::new();

        let tokenized = self
            .config
            .metric_labels
            .iter()
            .chain(instance.measurement_type().metric_labels());
        for (name, value) in tokenized {
            labels.insert(
                self.replace_tokens(location, instance, resource.as_deref(), name),
                self.replace_tokens(location, instance, resource.as_deref(), value),
            );
        }

        let mut current = resource.clone();
        while let Some(r) = current {
            for (name, value) in r.resource_type().metric_labels() {
                labels.insert(
                    self.replace_tokens(r.location(), instance, resource.as_deref(), name),
                    self.replace_tokens(r.location(), instance, resource.as_deref(), value),
                );
            }
            current = self.resource_manager.get_parent(&r);
        }
        labels
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

fn conversion_error<L: Location>(instance: &MeasurementInstance<L>, reason: String) -> Error {
    Error::Attribute {
        attribute: instance.attribute_location().to_string(),
        reason,
    }
}

/// Null reads as NaN and arrays (wildcard reads) are summed.
fn to_f64<L: Location>(value: &Value, instance: &MeasurementInstance<L>) -> Result<f64> {
    match value {
        Value::Null => Ok(f64::NAN),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| conversion_error(instance, format!("[{n}] is not a finite number"))),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| conversion_error(instance, format!("[{s}] is not numeric: {e}"))),
        Value::Array(items) => items
            .iter()
            .map(|item| to_f64(item, instance))
            .sum::<Result<f64>>(),
        other => Err(conversion_error(
            instance,
            format!("cannot convert [{other}] to a number"),
        )),
    }
}

/// An array (wildcard read) is DOWN if any element is DOWN.
fn to_avail<L: Location>(
    up_pattern: Option<&Regex>,
    value: &Value,
    instance: &MeasurementInstance<L>,
) -> Result<Avail> {
    if let Value::Array(items) = value {
        if items.is_empty() {
            return Err(conversion_error(instance, "no values to aggregate".to_string()));
        }
        let mut avail = Avail::Up;
        for item in items {
            if to_avail(up_pattern, item, instance)? == Avail::Down {
                avail = Avail::Down;
            }
        }
        return Ok(avail);
    }

    let up = match (up_pattern, value) {
        (Some(pattern), Value::String(s)) => pattern.is_match(s),
        (Some(pattern), other) => pattern.is_match(&other.to_string()),
        (None, Value::Bool(b)) => *b,
        (None, Value::Number(n)) => n.as_f64().is_some_and(|f| f.trunc() != 0.0),
        (None, Value::String(s)) => s.eq_ignore_ascii_case("up") || s.eq_ignore_ascii_case("ok"),
        (None, other) => {
            return Err(conversion_error(
                instance,
                format!("cannot handle an availability value of [{other}]"),
            ));
        }
    };
    Ok(if up { Avail::Up } else { Avail::Down })
}
