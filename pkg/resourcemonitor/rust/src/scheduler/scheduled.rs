// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::interval::MAX_INTERVAL;
use crate::location::Location;
use crate::measurement::MeasurementInstance;
use crate::resource::Resource;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;

/// A measurement instance with the time it is next due.
///
/// Ordered by due time, then resource ID, then instance ID.
#[derive(Debug, Clone)]
pub struct ScheduledMeasurementInstance<L> {
    resource: Arc<Resource<L>>,
    instance: Arc<MeasurementInstance<L>>,
    next_collection_time: Instant,
}

impl<L: Location> ScheduledMeasurementInstance<L> {
    pub fn new(resource: Arc<Resource<L>>, instance: Arc<MeasurementInstance<L>>, now: Instant) -> Self {
        let next_collection_time = next_due(&instance, now);
        Self {
            resource,
            instance,
            next_collection_time,
        }
    }

    /// Every instance of `resource`, all measured from the same `now`.
    pub fn for_resource(resource: &Arc<Resource<L>>, now: Instant) -> Vec<Self> {
        resource
            .measurements()
            .iter()
            .map(|instance| Self::new(Arc::clone(resource), Arc::clone(instance), now))
            .collect()
    }

    pub fn resource(&self) -> &Arc<Resource<L>> {
        &self.resource
    }

    pub fn instance(&self) -> &Arc<MeasurementInstance<L>> {
        &self.instance
    }

    pub fn next_collection_time(&self) -> Instant {
        self.next_collection_time
    }

    pub(crate) fn reschedule(&mut self, now: Instant) {
        self.next_collection_time = next_due(&self.instance, now);
    }

    fn sort_key(&self) -> (Instant, &str, &str) {
        (
            self.next_collection_time,
            self.resource.id().as_str(),
            self.instance.id().as_str(),
        )
    }
}

fn next_due<L: Location>(instance: &MeasurementInstance<L>, now: Instant) -> Instant {
    let interval = instance.measurement_type().interval().as_duration();
    now.checked_add(interval)
        .or_else(|| now.checked_add(MAX_INTERVAL))
        .unwrap_or(now)
}

impl<L: Location> PartialEq for ScheduledMeasurementInstance<L> {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl<L: Location> Eq for ScheduledMeasurementInstance<L> {}

impl<L: Location> PartialOrd for ScheduledMeasurementInstance<L> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<L: Location> Ord for ScheduledMeasurementInstance<L> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl<L: Location> fmt::Display for ScheduledMeasurementInstance<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ScheduledMeasurementInstance[resource={}, instance={}, interval={}]",
            self.resource.id(),
            self.instance.id(),
            self.instance.measurement_type().interval()
        )
    }
}
