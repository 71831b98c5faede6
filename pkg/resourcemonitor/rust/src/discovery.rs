// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Recursive resource discovery
//! Walks the type graph from a parent resource downwards and builds resources for
//! every node the driver reports

use crate::driver::Driver;
use crate::errors::{Error, Result};
use crate::ids::{ID, Name};
use crate::location::{AttributeLocation, Location, LocationResolver};
use crate::measurement::MeasurementInstance;
use crate::resource::{ConfigPropertyInstance, Resource, ResourceBuilder};
use crate::resource_type::{ConfigPropertyType, ResourceType};
use crate::type_manager::ResourceTypeManager;
use log::{debug, error, warn};
use serde_json::Value;
use std::sync::Arc;

/// Receives every resource as it is built, and every failure that made
/// discovery skip part of the tree.
pub trait DiscoveryConsumer<L: Location> {
    fn accept(&mut self, resource: Arc<Resource<L>>);

    fn report(&mut self, error: Error);
}

pub struct Discovery<'a, L: Location> {
    resolver: &'a dyn LocationResolver<L>,
    type_manager: &'a ResourceTypeManager<L>,
    feed_id: &'a str,
    endpoint_name: &'a str,
}

impl<'a, L: Location> Discovery<'a, L> {
    pub fn new(
        resolver: &'a dyn LocationResolver<L>,
        type_manager: &'a ResourceTypeManager<L>,
        feed_id: &'a str,
        endpoint_name: &'a str,
    ) -> Self {
        Self {
            resolver,
            type_manager,
            feed_id,
            endpoint_name,
        }
    }

    /// Discover the whole tree, starting at every root type.
    pub fn discover_all_resources(
        &self,
        driver: &dyn Driver<L>,
        consumer: &mut dyn DiscoveryConsumer<L>,
    ) {
        for root_type in self.type_manager.root_resource_types() {
            self.discover_children(None, &root_type, driver, consumer);
        }
    }

    /// Discover resources of `child_type` under `parent` (or at the top when
    /// `parent` is `None`), then recurse into the child types.
    ///
    /// A failure to enumerate nodes is reported and only skips this subtree.
    pub fn discover_children(
        &self,
        parent: Option<&Arc<Resource<L>>>,
        child_type: &Arc<ResourceType<L>>,
        driver: &dyn Driver<L>,
        consumer: &mut dyn DiscoveryConsumer<L>,
    ) {
        let parent_location = parent.map(|p| p.location());
        debug!(
            "discovering children of [{}] of type [{}] in [{}]",
            parent_location.map_or_else(|| "-".to_string(), ToString::to_string),
            child_type,
            self.endpoint_name
        );

        let query = self.resolver.absolutize(parent_location, child_type.location());
        let nodes = match driver.fetch_nodes(&query) {
            Ok(nodes) => nodes,
            Err(e) => {
                error!(
                    "failed to discover resources in [{}] at [{query}]: {e}",
                    self.endpoint_name
                );
                consumer.report(e);
                return;
            }
        };

        for location in nodes.into_keys() {
            let resource = match self.build_resource(parent, child_type, location, driver) {
                Ok(resource) => resource,
                Err(e) => {
                    error!(
                        "failed to build resource of type [{child_type}] in [{}]: {e}",
                        self.endpoint_name
                    );
                    consumer.report(e);
                    continue;
                }
            };
            debug!("discovered resource [{resource}]");
            consumer.accept(Arc::clone(&resource));

            for next_type in self.type_manager.children(child_type) {
                self.discover_children(Some(&resource), &next_type, driver, consumer);
            }
        }
    }

    fn build_resource(
        &self,
        parent: Option<&Arc<Resource<L>>>,
        resource_type: &Arc<ResourceType<L>>,
        location: L,
        driver: &dyn Driver<L>,
    ) -> Result<Arc<Resource<L>>> {
        let name = self.resolver.apply_template(
            resource_type.resource_name_template(),
            &location,
            self.endpoint_name,
        );
        let id = ID::resource(self.feed_id, self.endpoint_name, &location.to_string());

        let mut builder = Resource::builder(
            id.clone(),
            Name::new(name),
            Arc::clone(resource_type),
            location.clone(),
        );
        if let Some(parent) = parent {
            builder = builder.parent(Arc::clone(parent));
        }

        for property_type in resource_type.config_property_types() {
            match self.read_config_property(&location, property_type, driver) {
                Ok(property) => builder = builder.config_property(property),
                Err(e) => warn!(
                    "failed to discover config [{}] for resource [{location}]: {e}",
                    property_type.name
                ),
            }
        }

        builder = self.add_measurement_instances(&id, resource_type, &location, builder, driver);
        builder.build()
    }

    fn read_config_property(
        &self,
        location: &L,
        property_type: &ConfigPropertyType<L>,
        driver: &dyn Driver<L>,
    ) -> Result<ConfigPropertyInstance<L>> {
        let instance_location = self
            .resolver
            .absolutize_attribute(Some(location), &property_type.attribute_location);

        let value = if self.resolver.is_multi_target(instance_location.location()) {
            let mut aggregated = serde_json::Map::new();
            for (matched, value) in driver.fetch_attribute_as_map(&instance_location)? {
                let key = self
                    .resolver
                    .find_wildcard_match(instance_location.location(), &matched)?;
                aggregated.insert(key, value);
            }
            Some(Value::Object(aggregated).to_string())
        } else {
            value_to_string(driver.fetch_attribute(&instance_location)?)
        };

        Ok(ConfigPropertyInstance {
            name: property_type.name.clone(),
            attribute_location: instance_location,
            value,
        })
    }

    /// Instances are only created for attributes the driver confirms exist.
    fn add_measurement_instances(
        &self,
        resource_id: &ID,
        resource_type: &ResourceType<L>,
        location: &L,
        mut builder: ResourceBuilder<L>,
        driver: &dyn Driver<L>,
    ) -> ResourceBuilder<L> {
        for measurement_type in resource_type.measurement_types() {
            let instance_location: AttributeLocation<L> = self
                .resolver
                .absolutize_attribute(Some(location), measurement_type.attribute_location());
            match driver.attribute_exists(&instance_location) {
                Ok(true) => {
                    let id = if measurement_type.is_availability() {
                        ID::avail_instance(self.feed_id, resource_id, measurement_type.id())
                    } else {
                        ID::metric_instance(self.feed_id, resource_id, measurement_type.id())
                    };
                    builder = builder.measurement(MeasurementInstance::new(
                        id,
                        measurement_type.name().clone(),
                        instance_location,
                        Arc::clone(measurement_type),
                    ));
                }
                Ok(false) => debug!(
                    "attribute [{instance_location}] does not exist, skipping [{}]",
                    measurement_type.name()
                ),
                Err(e) => warn!(
                    "failed to locate [{}] at [{instance_location}]: {e}",
                    measurement_type.name()
                ),
            }
        }
        builder
    }
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::interval::Interval;
    use crate::measurement::{MeasurementKind, MeasurementType, MetricKind};
    use crate::path::{PathLocation, PathLocationResolver};
    use crate::resource_type::TypeSet;
    use crate::snapshot::SnapshotDriver;
    use crate::test_utils::loc;

    #[derive(Default)]
    struct Collect {
        resources: Vec<Arc<Resource<PathLocation>>>,
        errors: Vec<Error>,
    }

    impl DiscoveryConsumer<PathLocation> for Collect {
        fn accept(&mut self, resource: Arc<Resource<PathLocation>>) {
            self.resources.push(resource);
        }

        fn report(&mut self, error: Error) {
            self.errors.push(error);
        }
    }

    const SNAPSHOT: &str = r#"
nodes:
  "/":
    heap-used: 1024
    server-state: running
    release-version: "1.2.3"
  "/subsystem=datasources/data-source=ExampleDS":
    jndi-name: "java:jboss/datasources/ExampleDS"
    active-count: 3
  "/subsystem=datasources/data-source=OtherDS":
    jndi-name: "java:jboss/datasources/OtherDS"
"#;

    fn types() -> ResourceTypeManager<PathLocation> {
        let server = ResourceType::new("Server", PathLocation::empty())
            .with_resource_name_template("Server [%ManagedServerName]")
            .with_measurement(MeasurementType::new(
                "Heap Used",
                AttributeLocation::new(PathLocation::empty(), "heap-used"),
                Interval::seconds(5).unwrap(),
                MeasurementKind::Metric(MetricKind::Gauge),
            ))
            .with_measurement(MeasurementType::new(
                "Missing",
                AttributeLocation::new(PathLocation::empty(), "no-such-attribute"),
                Interval::seconds(5).unwrap(),
                MeasurementKind::Metric(MetricKind::Gauge),
            ))
            .with_config_property(ConfigPropertyType {
                name: Name::new("Version"),
                attribute_location: AttributeLocation::new(PathLocation::empty(), "release-version"),
            });
        let datasource = ResourceType::new("Datasource", loc("/subsystem=datasources/data-source=*"))
            .with_parents(["Server"])
            .with_resource_name_template("Datasource [%-]")
            .with_measurement(MeasurementType::new(
                "Active Count",
                AttributeLocation::new(PathLocation::empty(), "active-count"),
                Interval::seconds(10).unwrap(),
                MeasurementKind::Metric(MetricKind::Gauge),
            ))
            .with_config_property(ConfigPropertyType {
                name: Name::new("JNDI Name"),
                attribute_location: AttributeLocation::new(PathLocation::empty(), "jndi-name"),
            });
        ResourceTypeManager::new(vec![TypeSet::new("set", true, vec![server, datasource])]).unwrap()
    }

    #[test]
    fn test_discover_all_resources() {
        let driver = SnapshotDriver::from_yaml(SNAPSHOT).unwrap();
        let types = types();
        let resolver = PathLocationResolver::new();
        let discovery = Discovery::new(&resolver, &types, "feed", "local");
        let mut collect = Collect::default();

        discovery.discover_all_resources(&driver, &mut collect);

        assert!(collect.errors.is_empty());
        let names: Vec<&str> = collect.resources.iter().map(|r| r.name().as_str()).collect();
        assert_eq!(
            names,
            vec!["Server [local]", "Datasource [ExampleDS]", "Datasource [OtherDS]"]
        );

        let server = &collect.resources[0];
        assert_eq!(server.id().as_str(), "feed~local~/");
        assert_eq!(server.measurements().len(), 1);
        assert_eq!(
            server.measurements()[0].id().as_str(),
            "MI~R~[feed/feed~local~/]~MT~Heap Used"
        );
        assert_eq!(server.config()[0].value.as_deref(), Some("1.2.3"));

        let example = &collect.resources[1];
        assert_eq!(example.parent().unwrap().id(), server.id());
        assert_eq!(example.measurements().len(), 1);
        assert_eq!(
            example.config()[0].value.as_deref(),
            Some("java:jboss/datasources/ExampleDS")
        );

        // active-count only exists on ExampleDS
        assert!(collect.resources[2].measurements().is_empty());
    }

    #[test]
    fn test_wildcard_config_property_is_aggregated() {
        let driver = SnapshotDriver::from_yaml(SNAPSHOT).unwrap();
        let server = ResourceType::new("Server", PathLocation::empty()).with_config_property(
            ConfigPropertyType {
                name: Name::new("Datasources"),
                attribute_location: AttributeLocation::new(
                    loc("/subsystem=datasources/data-source=*"),
                    "jndi-name",
                ),
            },
        );
        let types =
            ResourceTypeManager::new(vec![TypeSet::new("set", true, vec![server])]).unwrap();
        let resolver = PathLocationResolver::new();
        let discovery = Discovery::new(&resolver, &types, "feed", "local");
        let mut collect = Collect::default();

        discovery.discover_all_resources(&driver, &mut collect);

        let value: Value =
            serde_json::from_str(collect.resources[0].config()[0].value.as_deref().unwrap())
                .unwrap();
        assert_eq!(value["ExampleDS"], "java:jboss/datasources/ExampleDS");
        assert_eq!(value["OtherDS"], "java:jboss/datasources/OtherDS");
    }

    struct FailingDriver;

    impl Driver<PathLocation> for FailingDriver {
        fn fetch_nodes(
            &self,
            query: &PathLocation,
        ) -> Result<std::collections::BTreeMap<PathLocation, Value>> {
            if query.is_empty() {
                let mut nodes = std::collections::BTreeMap::new();
                nodes.insert(PathLocation::empty(), Value::Null);
                Ok(nodes)
            } else {
                Err(Error::driver("connection reset"))
            }
        }

        fn fetch_attribute(&self, _: &AttributeLocation<PathLocation>) -> Result<Value> {
            Err(Error::driver("connection reset"))
        }

        fn fetch_attribute_as_map(
            &self,
            _: &AttributeLocation<PathLocation>,
        ) -> Result<std::collections::BTreeMap<PathLocation, Value>> {
            Err(Error::driver("connection reset"))
        }

        fn attribute_exists(&self, _: &AttributeLocation<PathLocation>) -> Result<bool> {
            Err(Error::driver("connection reset"))
        }
    }

    #[test]
    fn test_failures_skip_only_the_failed_part() {
        let types = types();
        let resolver = PathLocationResolver::new();
        let discovery = Discovery::new(&resolver, &types, "feed", "local");
        let mut collect = Collect::default();

        discovery.discover_all_resources(&FailingDriver, &mut collect);

        // The server is still built, without config or measurements.
        assert_eq!(collect.resources.len(), 1);
        assert!(collect.resources[0].config().is_empty());
        assert!(collect.resources[0].measurements().is_empty());
        assert_eq!(collect.errors.len(), 1);
    }
}
