// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::ids::{ID, Name};
use crate::location::{AttributeLocation, Location};
use crate::measurement::MeasurementType;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ConfigPropertyType<L> {
    pub name: Name,
    pub attribute_location: AttributeLocation<L>,
}

/// Declared operation on a resource type. Only carried in inventory, never invoked.
#[derive(Debug, Clone)]
pub struct Operation<L> {
    pub name: Name,
    pub internal_name: String,
    pub location: L,
}

/// A class of resources: the node type of the type graph.
#[derive(Debug, Clone)]
pub struct ResourceType<L> {
    id: ID,
    name: Name,
    location: L,
    parents: Vec<Name>,
    resource_name_template: String,
    measurement_types: Vec<Arc<MeasurementType<L>>>,
    config_property_types: Vec<ConfigPropertyType<L>>,
    operations: Vec<Operation<L>>,
    metric_labels: BTreeMap<String, String>,
    properties: BTreeMap<String, String>,
}

impl<L: Location> ResourceType<L> {
    pub fn new(name: impl Into<Name>, location: L) -> Self {
        let name = name.into();
        Self {
            id: ID::new(name.as_str()),
            resource_name_template: name.to_string(),
            name,
            location,
            parents: Vec::new(),
            measurement_types: Vec::new(),
            config_property_types: Vec::new(),
            operations: Vec::new(),
            metric_labels: BTreeMap::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_parents<I, N>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Name>,
    {
        self.parents = parents.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_resource_name_template(mut self, template: impl Into<String>) -> Self {
        self.resource_name_template = template.into();
        self
    }

    pub fn with_measurement(mut self, measurement_type: MeasurementType<L>) -> Self {
        self.measurement_types.push(Arc::new(measurement_type));
        self
    }

    pub fn with_config_property(mut self, property: ConfigPropertyType<L>) -> Self {
        self.config_property_types.push(property);
        self
    }

    pub fn with_operation(mut self, operation: Operation<L>) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn with_metric_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.metric_labels = labels;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> &ID {
        &self.id
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Location template, relative to the parent resource's location.
    pub fn location(&self) -> &L {
        &self.location
    }

    pub fn parents(&self) -> &[Name] {
        &self.parents
    }

    pub fn resource_name_template(&self) -> &str {
        &self.resource_name_template
    }

    pub fn measurement_types(&self) -> &[Arc<MeasurementType<L>>] {
        &self.measurement_types
    }

    pub fn metric_types(&self) -> impl Iterator<Item = &Arc<MeasurementType<L>>> {
        self.measurement_types.iter().filter(|t| !t.is_availability())
    }

    pub fn avail_types(&self) -> impl Iterator<Item = &Arc<MeasurementType<L>>> {
        self.measurement_types.iter().filter(|t| t.is_availability())
    }

    pub fn config_property_types(&self) -> &[ConfigPropertyType<L>] {
        &self.config_property_types
    }

    pub fn operations(&self) -> &[Operation<L>] {
        &self.operations
    }

    pub fn metric_labels(&self) -> &BTreeMap<String, String> {
        &self.metric_labels
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

impl<L: Location> fmt::Display for ResourceType<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A named group of resource types that is enabled or disabled as a whole.
#[derive(Debug, Clone)]
pub struct TypeSet<L> {
    pub name: Name,
    pub enabled: bool,
    pub types: Vec<ResourceType<L>>,
}

impl<L: Location> TypeSet<L> {
    pub fn new(name: impl Into<Name>, enabled: bool, types: Vec<ResourceType<L>>) -> Self {
        Self {
            name: name.into(),
            enabled,
            types,
        }
    }
}
