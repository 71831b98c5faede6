// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::errors::{Error, Result};
use crate::ids::{ID, Name};
use crate::location::{AttributeLocation, Location};
use crate::measurement::MeasurementInstance;
use crate::resource_type::ResourceType;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A config property value read from the endpoint during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPropertyInstance<L> {
    pub name: Name,
    pub attribute_location: AttributeLocation<L>,
    pub value: Option<String>,
}

/// One discovered resource. Identity, equality and hashing use the ID only.
#[derive(Debug)]
pub struct Resource<L> {
    id: ID,
    name: Name,
    resource_type: Arc<ResourceType<L>>,
    location: L,
    parent: Option<Arc<Resource<L>>>,
    measurements: Vec<Arc<MeasurementInstance<L>>>,
    config: Vec<ConfigPropertyInstance<L>>,
    properties: BTreeMap<String, String>,
}

impl<L: Location> Resource<L> {
    pub fn builder(
        id: ID,
        name: Name,
        resource_type: Arc<ResourceType<L>>,
        location: L,
    ) -> ResourceBuilder<L> {
        ResourceBuilder {
            id,
            name,
            resource_type,
            location,
            parent: None,
            measurements: Vec::new(),
            config: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &ID {
        &self.id
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn resource_type(&self) -> &Arc<ResourceType<L>> {
        &self.resource_type
    }

    pub fn location(&self) -> &L {
        &self.location
    }

    /// The parent this resource was built against. The resource graph is the
    /// authority on the current parent instance.
    pub fn parent(&self) -> Option<&Arc<Resource<L>>> {
        self.parent.as_ref()
    }

    pub fn measurements(&self) -> &[Arc<MeasurementInstance<L>>] {
        &self.measurements
    }

    pub fn metrics(&self) -> impl Iterator<Item = &Arc<MeasurementInstance<L>>> {
        self.measurements.iter().filter(|m| !m.is_availability())
    }

    pub fn avails(&self) -> impl Iterator<Item = &Arc<MeasurementInstance<L>>> {
        self.measurements.iter().filter(|m| m.is_availability())
    }

    pub fn config(&self) -> &[ConfigPropertyInstance<L>] {
        &self.config
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Same ID, name, config property values and properties.
    ///
    /// Measurement instances are not compared.
    pub fn is_equivalent(&self, other: &Resource<L>) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.properties == other.properties
            && self.config.len() == other.config.len()
            && self
                .config
                .iter()
                .zip(&other.config)
                .all(|(a, b)| a.name == b.name && a.value == b.value)
    }
}

impl<L> PartialEq for Resource<L> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<L> Eq for Resource<L> {}

impl<L> Hash for Resource<L> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<L: Location> fmt::Display for Resource<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Resource[id={}, name={}, type={}, location={}]",
            self.id, self.name, self.resource_type, self.location
        )
    }
}

#[derive(Debug)]
pub struct ResourceBuilder<L> {
    id: ID,
    name: Name,
    resource_type: Arc<ResourceType<L>>,
    location: L,
    parent: Option<Arc<Resource<L>>>,
    measurements: Vec<Arc<MeasurementInstance<L>>>,
    config: Vec<ConfigPropertyInstance<L>>,
    properties: BTreeMap<String, String>,
}

impl<L: Location> ResourceBuilder<L> {
    /// Starts from a copy of `template`; its measurement instances are disowned
    /// so the new resource can claim them.
    pub fn from_template(template: &Resource<L>) -> Self {
        Self {
            id: template.id.clone(),
            name: template.name.clone(),
            resource_type: Arc::clone(&template.resource_type),
            location: template.location.clone(),
            parent: template.parent.clone(),
            measurements: template
                .measurements
                .iter()
                .map(|m| Arc::new(m.disowned()))
                .collect(),
            config: template.config.clone(),
            properties: template.properties.clone(),
        }
    }

    pub fn id(&self) -> &ID {
        &self.id
    }

    pub fn name(mut self, name: Name) -> Self {
        self.name = name;
        self
    }

    pub fn parent(mut self, parent: Arc<Resource<L>>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn measurement(mut self, instance: MeasurementInstance<L>) -> Self {
        self.measurements.push(Arc::new(instance));
        self
    }

    pub fn config_property(mut self, property: ConfigPropertyInstance<L>) -> Self {
        self.config.push(property);
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Fails without claiming anything if any instance already has an owner.
    pub fn build(self) -> Result<Arc<Resource<L>>> {
        if let Some(parent) = &self.parent
            && parent.id == self.id
        {
            return Err(Error::invalid_argument(format!(
                "resource [{}] cannot be its own parent",
                self.id
            )));
        }
        for instance in &self.measurements {
            instance.check_unowned(&self.id)?;
        }
        for instance in &self.measurements {
            instance.claim(&self.id)?;
        }
        Ok(Arc::new(Resource {
            id: self.id,
            name: self.name,
            resource_type: self.resource_type,
            location: self.location,
            parent: self.parent,
            measurements: self.measurements,
            config: self.config,
            properties: self.properties,
        }))
    }
}
