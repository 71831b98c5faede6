// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Shared fixtures for unit tests

#![allow(clippy::unwrap_used)]

use crate::ids::{ID, Name};
use crate::interval::Interval;
use crate::location::AttributeLocation;
use crate::measurement::{MeasurementInstance, MeasurementKind, MeasurementType, MetricKind};
use crate::path::PathLocation;
use crate::resource::Resource;
use crate::resource_type::ResourceType;
use std::sync::Arc;

pub fn loc(s: &str) -> PathLocation {
    PathLocation::parse(s).unwrap()
}

pub fn server_type() -> Arc<ResourceType<PathLocation>> {
    Arc::new(ResourceType::new("Server", PathLocation::empty()))
}

pub fn metric_type(name: &str, interval_secs: u64) -> Arc<MeasurementType<PathLocation>> {
    Arc::new(MeasurementType::new(
        name,
        AttributeLocation::new(PathLocation::empty(), name),
        Interval::seconds(interval_secs).unwrap(),
        MeasurementKind::Metric(MetricKind::Gauge),
    ))
}

pub fn avail_type(name: &str, interval_secs: u64) -> Arc<MeasurementType<PathLocation>> {
    Arc::new(MeasurementType::new(
        name,
        AttributeLocation::new(PathLocation::empty(), name),
        Interval::seconds(interval_secs).unwrap(),
        MeasurementKind::availability(None).unwrap(),
    ))
}

pub fn metric_instance(id: &str) -> MeasurementInstance<PathLocation> {
    instance_of(id, metric_type("Heap Used", 30))
}

pub fn instance_of(
    id: &str,
    measurement_type: Arc<MeasurementType<PathLocation>>,
) -> MeasurementInstance<PathLocation> {
    MeasurementInstance::new(
        ID::new(id),
        measurement_type.name().clone(),
        measurement_type.attribute_location().clone(),
        measurement_type,
    )
}

pub fn resource(
    id: &str,
    parent: Option<&Arc<Resource<PathLocation>>>,
) -> Arc<Resource<PathLocation>> {
    resource_at(id, "/", parent)
}

pub fn resource_at(
    id: &str,
    location: &str,
    parent: Option<&Arc<Resource<PathLocation>>>,
) -> Arc<Resource<PathLocation>> {
    let mut builder = Resource::builder(ID::new(id), Name::new(id), server_type(), loc(location));
    if let Some(parent) = parent {
        builder = builder.parent(Arc::clone(parent));
    }
    builder.build().unwrap()
}

/// A resource owning one instance per `(instance id, type)` pair.
pub fn resource_with(
    id: &str,
    instances: Vec<(&str, Arc<MeasurementType<PathLocation>>)>,
) -> Arc<Resource<PathLocation>> {
    let mut builder =
        Resource::builder(ID::new(id), Name::new(id), server_type(), PathLocation::empty());
    for (instance_id, measurement_type) in instances {
        builder = builder.measurement(instance_of(instance_id, measurement_type));
    }
    builder.build().unwrap()
}
