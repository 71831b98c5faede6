// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::errors::{Error, Result};
use crate::ids::{ID, Name};
use crate::interval::Interval;
use crate::location::{AttributeLocation, Location};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    #[default]
    Gauge,
    Counter,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Gauge => write!(f, "gauge"),
            MetricKind::Counter => write!(f, "counter"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum MeasurementKind {
    Metric(MetricKind),
    /// `up_pattern` must match the whole sampled value for the resource to be UP.
    Availability { up_pattern: Option<Regex> },
}

impl MeasurementKind {
    pub fn availability(up_regex: Option<&str>) -> Result<Self> {
        let up_pattern = up_regex
            .map(|re| {
                Regex::new(&format!("^(?:{re})$")).map_err(|e| {
                    Error::invalid_argument(format!("invalid up regex [{re}]: {e}"))
                })
            })
            .transpose()?;
        Ok(MeasurementKind::Availability { up_pattern })
    }

    pub fn is_availability(&self) -> bool {
        matches!(self, MeasurementKind::Availability { .. })
    }
}

/// Declares one samplable attribute of a resource type.
#[derive(Debug, Clone)]
pub struct MeasurementType<L> {
    id: ID,
    name: Name,
    attribute_location: AttributeLocation<L>,
    interval: Interval,
    kind: MeasurementKind,
    units: String,
    metric_family: Option<String>,
    metric_labels: BTreeMap<String, String>,
    metric_id_template: Option<String>,
    metric_expression: Option<String>,
}

impl<L: Location> MeasurementType<L> {
    pub fn new(
        name: impl Into<Name>,
        attribute_location: AttributeLocation<L>,
        interval: Interval,
        kind: MeasurementKind,
    ) -> Self {
        let name = name.into();
        Self {
            id: ID::new(name.as_str()),
            name,
            attribute_location,
            interval,
            kind,
            units: "none".to_string(),
            metric_family: None,
            metric_labels: BTreeMap::new(),
            metric_id_template: None,
            metric_expression: None,
        }
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    pub fn with_metric_family(mut self, family: impl Into<String>) -> Self {
        self.metric_family = Some(family.into());
        self
    }

    pub fn with_metric_labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.metric_labels = labels;
        self
    }

    pub fn with_metric_id_template(mut self, template: impl Into<String>) -> Self {
        self.metric_id_template = Some(template.into());
        self
    }

    pub fn with_metric_expression(mut self, expression: impl Into<String>) -> Self {
        self.metric_expression = Some(expression.into());
        self
    }

    pub fn id(&self) -> &ID {
        &self.id
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Relative to the owning resource type's location.
    pub fn attribute_location(&self) -> &AttributeLocation<L> {
        &self.attribute_location
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn kind(&self) -> &MeasurementKind {
        &self.kind
    }

    pub fn is_availability(&self) -> bool {
        self.kind.is_availability()
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    /// Falls back to the type name when no family is configured.
    pub fn metric_family(&self) -> &str {
        self.metric_family.as_deref().unwrap_or(self.name.as_str())
    }

    pub fn metric_labels(&self) -> &BTreeMap<String, String> {
        &self.metric_labels
    }

    pub fn metric_id_template(&self) -> Option<&str> {
        self.metric_id_template.as_deref()
    }

    pub fn metric_expression(&self) -> Option<&str> {
        self.metric_expression.as_deref()
    }
}

/// One resolved occurrence of a [`MeasurementType`] on a resource.
///
/// The owning resource is recorded exactly once, when the resource is built.
#[derive(Debug)]
pub struct MeasurementInstance<L> {
    id: ID,
    name: Name,
    attribute_location: AttributeLocation<L>,
    measurement_type: Arc<MeasurementType<L>>,
    owner: OnceLock<ID>,
}

impl<L: Location> MeasurementInstance<L> {
    pub fn new(
        id: ID,
        name: Name,
        attribute_location: AttributeLocation<L>,
        measurement_type: Arc<MeasurementType<L>>,
    ) -> Self {
        Self {
            id,
            name,
            attribute_location,
            measurement_type,
            owner: OnceLock::new(),
        }
    }

    pub fn id(&self) -> &ID {
        &self.id
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Absolute location of the sampled attribute.
    pub fn attribute_location(&self) -> &AttributeLocation<L> {
        &self.attribute_location
    }

    pub fn measurement_type(&self) -> &Arc<MeasurementType<L>> {
        &self.measurement_type
    }

    pub fn is_availability(&self) -> bool {
        self.measurement_type.is_availability()
    }

    pub fn owner(&self) -> Option<&ID> {
        self.owner.get()
    }

    /// A copy with no owner, to be claimed by a new resource.
    pub fn disowned(&self) -> Self {
        Self::new(
            self.id.clone(),
            self.name.clone(),
            self.attribute_location.clone(),
            Arc::clone(&self.measurement_type),
        )
    }

    pub(crate) fn check_unowned(&self, resource: &ID) -> Result<()> {
        match self.owner.get() {
            Some(owner) => Err(Error::AlreadyOwned {
                instance: self.id.to_string(),
                owner: owner.to_string(),
                requested: resource.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub(crate) fn claim(&self, resource: &ID) -> Result<()> {
        self.check_unowned(resource)?;
        self.owner.set(resource.clone()).map_err(|_| Error::AlreadyOwned {
            instance: self.id.to_string(),
            owner: self.owner.get().map(ID::to_string).unwrap_or_default(),
            requested: resource.to_string(),
        })
    }
}

impl<L> PartialEq for MeasurementInstance<L> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<L> Eq for MeasurementInstance<L> {}

impl<L> std::hash::Hash for MeasurementInstance<L> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
