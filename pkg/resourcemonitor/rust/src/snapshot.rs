// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! In-memory driver over a YAML snapshot of a management tree
//!
//! ```yaml
//! nodes:
//!   "/":
//!     server-state: running
//!   "/subsystem=datasources/data-source=ExampleDS":
//!     active-count: 3
//! ```

use crate::driver::{Connector, Driver};
use crate::errors::{Error, Result};
use crate::location::{AttributeLocation, LocationResolver};
use crate::path::{PathLocation, PathLocationResolver};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    nodes: BTreeMap<String, Map<String, Value>>,
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotDriver {
    nodes: Arc<BTreeMap<PathLocation, Map<String, Value>>>,
}

impl SnapshotDriver {
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let file: SnapshotFile = serde_yaml::from_str(contents)
            .map_err(|e| Error::invalid_argument(format!("invalid snapshot: {e}")))?;
        let mut nodes = BTreeMap::new();
        for (location, attributes) in file.nodes {
            nodes.insert(PathLocation::parse(&location)?, attributes);
        }
        Ok(Self {
            nodes: Arc::new(nodes),
        })
    }

    fn matching<'a>(
        &'a self,
        query: &'a PathLocation,
    ) -> impl Iterator<Item = (&'a PathLocation, &'a Map<String, Value>)> + 'a {
        let resolver = PathLocationResolver::new();
        self.nodes
            .iter()
            .filter(move |(location, _)| resolver.matches(query, location))
    }

    fn node<'a>(&'a self, location: &'a PathLocation) -> Result<&'a Map<String, Value>> {
        self.matching(location)
            .next()
            .map(|(_, attributes)| attributes)
            .ok_or_else(|| Error::driver(format!("no node at [{location}]")))
    }
}

impl Driver<PathLocation> for SnapshotDriver {
    fn fetch_nodes(&self, query: &PathLocation) -> Result<BTreeMap<PathLocation, Value>> {
        Ok(self
            .matching(query)
            .map(|(location, attributes)| (location.clone(), Value::Object(attributes.clone())))
            .collect())
    }

    fn fetch_attribute(&self, location: &AttributeLocation<PathLocation>) -> Result<Value> {
        if PathLocationResolver::new().is_multi_target(location.location()) {
            return Ok(Value::Array(
                self.fetch_attribute_as_map(location)?.into_values().collect(),
            ));
        }
        self.node(location.location())?
            .get(location.attribute())
            .cloned()
            .ok_or_else(|| Error::Attribute {
                attribute: location.to_string(),
                reason: "no such attribute".to_string(),
            })
    }

    fn fetch_attribute_as_map(
        &self,
        location: &AttributeLocation<PathLocation>,
    ) -> Result<BTreeMap<PathLocation, Value>> {
        Ok(self
            .matching(location.location())
            .filter_map(|(node, attributes)| {
                attributes
                    .get(location.attribute())
                    .map(|value| (node.clone(), value.clone()))
            })
            .collect())
    }

    fn attribute_exists(&self, location: &AttributeLocation<PathLocation>) -> Result<bool> {
        Ok(self
            .matching(location.location())
            .any(|(_, attributes)| attributes.contains_key(location.attribute())))
    }
}

/// Hands out the current snapshot. An endpoint without a snapshot is not ready.
#[derive(Debug, Default)]
pub struct SnapshotConnector {
    endpoint_name: String,
    current: RwLock<Option<SnapshotDriver>>,
}

impl SnapshotConnector {
    pub fn new(endpoint_name: impl Into<String>, snapshot: Option<SnapshotDriver>) -> Self {
        Self {
            endpoint_name: endpoint_name.into(),
            current: RwLock::new(snapshot),
        }
    }

    /// Swap in a new snapshot, or take the endpoint offline with `None`.
    pub fn replace(&self, snapshot: Option<SnapshotDriver>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }
}

impl Connector<PathLocation> for SnapshotConnector {
    fn open(&self) -> Result<Box<dyn Driver<PathLocation>>> {
        match &*self.current.read().unwrap_or_else(PoisonError::into_inner) {
            Some(snapshot) => Ok(Box::new(snapshot.clone())),
            None => Err(Error::NotReady {
                endpoint: self.endpoint_name.clone(),
                reason: "no snapshot loaded".to_string(),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::loc;

    const SNAPSHOT: &str = r#"
nodes:
  "/":
    server-state: running
  "/deployment=a.war":
    enabled: true
  "/deployment=b.war":
    enabled: false
"#;

    #[test]
    fn test_fetch_nodes_with_wildcard() {
        let driver = SnapshotDriver::from_yaml(SNAPSHOT).unwrap();
        let nodes = driver.fetch_nodes(&loc("/deployment=*")).unwrap();
        let keys: Vec<String> = nodes.keys().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["/deployment=a.war", "/deployment=b.war"]);

        assert_eq!(driver.fetch_nodes(&loc("/")).unwrap().len(), 1);
        assert!(driver.fetch_nodes(&loc("/subsystem=*")).unwrap().is_empty());
    }

    #[test]
    fn test_fetch_attribute() {
        let driver = SnapshotDriver::from_yaml(SNAPSHOT).unwrap();
        let state = AttributeLocation::new(loc("/"), "server-state");
        assert_eq!(driver.fetch_attribute(&state).unwrap(), "running");
        assert!(driver.attribute_exists(&state).unwrap());

        let missing = AttributeLocation::new(loc("/"), "nope");
        assert!(!driver.attribute_exists(&missing).unwrap());
        assert!(matches!(
            driver.fetch_attribute(&missing),
            Err(Error::Attribute { .. })
        ));
        assert!(
            driver
                .fetch_attribute(&AttributeLocation::new(loc("/deployment=c.war"), "enabled"))
                .is_err()
        );
    }

    #[test]
    fn test_wildcard_attribute_reads() {
        let driver = SnapshotDriver::from_yaml(SNAPSHOT).unwrap();
        let enabled = AttributeLocation::new(loc("/deployment=*"), "enabled");
        assert_eq!(
            driver.fetch_attribute(&enabled).unwrap(),
            serde_json::json!([true, false])
        );
        let map = driver.fetch_attribute_as_map(&enabled).unwrap();
        assert_eq!(map.get(&loc("/deployment=b.war")), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_connector_not_ready_without_snapshot() {
        let connector = SnapshotConnector::new("local", None);
        assert!(connector.open().err().unwrap().is_not_ready());

        connector.replace(Some(SnapshotDriver::from_yaml(SNAPSHOT).unwrap()));
        assert!(connector.open().is_ok());
    }

    #[test]
    fn test_invalid_snapshot() {
        assert!(SnapshotDriver::from_yaml("nodes: [").is_err());
        assert!(SnapshotDriver::from_yaml("nodes:\n  \"/bad\": {}\n").is_err());
    }
}
