// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

// Correctness
#![deny(clippy::indexing_slicing)]
#![deny(clippy::string_slice)]
#![deny(clippy::cast_possible_wrap)]
#![deny(clippy::undocumented_unsafe_blocks)]
// Panicking code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unimplemented)]
#![deny(clippy::todo)]
// Debug code that shouldn't be in production
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]

pub mod api;
pub mod config;
pub mod discovery;
pub mod driver;
pub mod endpoint;
mod errors;
mod ids;
mod interval;
mod location;
mod measurement;
pub mod path;
mod resource;
pub mod resource_manager;
mod resource_type;
pub mod scheduler;
pub mod snapshot;
pub mod type_manager;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export the public API
pub use api::{
    Avail, AvailDataPoint, CompletionHandler, DiscoveryCompletedEvent, InventoryEvent,
    InventoryListener, MetricDataPoint, SamplingService,
};
pub use discovery::{Discovery, DiscoveryConsumer};
pub use driver::{Connector, Driver};
pub use endpoint::{DiscoverySummary, EndpointConfig, EndpointService, ScanRequest, ServiceStatus};
pub use errors::{Error, Result};
pub use ids::{ID, Name};
pub use interval::{Interval, TimeUnit};
pub use location::{AttributeLocation, Location, LocationResolver};
pub use measurement::{MeasurementInstance, MeasurementKind, MeasurementType, MetricKind};
pub use path::{PathLocation, PathLocationResolver, PathSegment};
pub use resource::{ConfigPropertyInstance, Resource, ResourceBuilder};
pub use resource_manager::{AddResult, Effect, ResourceManager};
pub use resource_type::{ConfigPropertyType, Operation, ResourceType, TypeSet};
pub use scheduler::{MeasurementScheduler, ScheduledCollectionsQueue, ScheduledMeasurementInstance};
pub use snapshot::{SnapshotConnector, SnapshotDriver};
pub use type_manager::ResourceTypeManager;
