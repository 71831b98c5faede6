// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Contracts between the inventory, the scheduler and the surrounding agent

use crate::errors::{Error, Result};
use crate::ids::ID;
use crate::location::Location;
use crate::measurement::{MeasurementInstance, MetricKind};
use crate::resource::Resource;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct InventoryEvent<L> {
    pub endpoint: String,
    pub resources: Vec<Arc<Resource<L>>>,
}

#[derive(Debug, Clone)]
pub struct DiscoveryCompletedEvent<L> {
    pub endpoint: String,
    pub added_or_modified: Vec<Arc<Resource<L>>>,
    pub removed: Vec<Arc<Resource<L>>>,
}

/// Notified by an endpoint service whenever its resource graph changes.
pub trait InventoryListener<L: Location>: Send + Sync {
    /// Added or modified resources.
    fn resources_added(&self, event: &InventoryEvent<L>);

    /// Removed resources, descendants included.
    fn resources_removed(&self, event: &InventoryEvent<L>);

    /// Only fired for full scans that finished without errors.
    fn discovery_completed(&self, _event: &DiscoveryCompletedEvent<L>) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Avail {
    Up,
    Down,
}

impl fmt::Display for Avail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Avail::Up => write!(f, "up"),
            Avail::Down => write!(f, "down"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDataPoint {
    pub key: String,
    pub timestamp_ms: u64,
    pub value: f64,
    pub kind: MetricKind,
    pub family: String,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AvailDataPoint {
    pub key: String,
    pub timestamp_ms: u64,
    pub value: Avail,
    pub family: String,
    pub labels: BTreeMap<String, String>,
}

/// Receives the outcome of every sampled instance.
pub trait CompletionHandler: Send + Sync {
    fn on_metric(&self, point: MetricDataPoint);

    fn on_avail(&self, point: AvailDataPoint);

    fn on_failure(&self, instance: &ID, error: &Error);
}

/// Samples measurement instances of one endpoint. Calls block on endpoint I/O.
pub trait SamplingService<L: Location>: Send + Sync {
    fn endpoint_name(&self) -> &str;

    /// Returns an error only when the whole round failed, for example because
    /// no session could be opened. Per-instance failures go to `handler`.
    fn measure_metrics(
        &self,
        instances: &[Arc<MeasurementInstance<L>>],
        handler: &dyn CompletionHandler,
    ) -> Result<()>;

    fn measure_avails(
        &self,
        instances: &[Arc<MeasurementInstance<L>>],
        handler: &dyn CompletionHandler,
    ) -> Result<()>;

    /// Key under which the samples of `instance` are stored.
    fn generate_metric_id(&self, instance: &MeasurementInstance<L>) -> String {
        instance.id().to_string()
    }

    fn generate_metric_family(&self, instance: &MeasurementInstance<L>) -> String {
        instance.measurement_type().metric_family().to_string()
    }

    fn generate_metric_labels(&self, _instance: &MeasurementInstance<L>) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}
