// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::endpoint::EndpointConfig;
use crate::ids::Name;
use crate::interval::{Interval, TimeUnit};
use crate::location::AttributeLocation;
use crate::measurement::{MeasurementKind, MeasurementType, MetricKind};
use crate::path::PathLocation;
use crate::resource_type::{ConfigPropertyType, Operation, ResourceType, TypeSet};
use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_DIR: &str = "/etc/resource-monitor/conf.d";

fn default_true() -> bool {
    true
}

fn default_interval() -> u64 {
    60
}

/// One configuration file: type sets plus an optional endpoint to monitor.
#[derive(Debug, Default, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub type_sets: Vec<TypeSetConfig>,
    #[serde(default)]
    pub endpoint: Option<EndpointConfig>,
}

#[derive(Debug, Deserialize)]
pub struct TypeSetConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub resource_types: Vec<ResourceTypeConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ResourceTypeConfig {
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub parents: Vec<String>,
    pub resource_name_template: Option<String>,
    #[serde(default)]
    pub metric_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub metrics: Vec<MeasurementConfig>,
    #[serde(default)]
    pub avails: Vec<MeasurementConfig>,
    #[serde(default)]
    pub config_properties: Vec<ConfigPropertyConfig>,
    #[serde(default)]
    pub operations: Vec<OperationConfig>,
}

#[derive(Debug, Deserialize)]
pub struct MeasurementConfig {
    pub name: String,
    pub attribute: String,
    /// Relative to the owning resource's location.
    #[serde(default)]
    pub location: String,
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default)]
    pub time_units: TimeUnit,
    #[serde(default)]
    pub kind: MetricKind,
    pub units: Option<String>,
    pub metric_family: Option<String>,
    #[serde(default)]
    pub metric_labels: BTreeMap<String, String>,
    pub metric_id_template: Option<String>,
    pub metric_expression: Option<String>,
    /// Avails only.
    pub up_regex: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfigPropertyConfig {
    pub name: String,
    pub attribute: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Deserialize)]
pub struct OperationConfig {
    pub name: String,
    pub internal_name: String,
    #[serde(default)]
    pub location: String,
}

pub fn config_dir() -> PathBuf {
    std::env::var("RESOURCE_MONITOR_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_DIR))
}

/// Everything the monitor runs from, merged across a config directory.
#[derive(Debug, Default)]
pub struct MonitorSettings {
    pub type_sets: Vec<TypeSet<PathLocation>>,
    /// The first endpoint declared; later declarations are ignored.
    pub endpoint: Option<EndpointConfig>,
    /// File stems that contributed, in load order.
    pub sources: Vec<String>,
}

/// Merge every `*.yaml`/`*.yml` file of `dir`, in file name order. A file
/// whose type sets fail to convert contributes nothing.
pub fn load_settings(dir: &Path) -> Result<MonitorSettings> {
    let mut settings = MonitorSettings::default();
    for path in config_files(dir)? {
        let source = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (type_sets, endpoint) = match read_config(&path) {
            Ok(parts) => parts,
            Err(e) => {
                warn!("ignoring config [{source}]: {e:#}");
                continue;
            }
        };
        debug!("[{source}] declares [{}] type sets", type_sets.len());
        settings.type_sets.extend(type_sets);
        match (endpoint, settings.endpoint.is_some()) {
            (Some(endpoint), false) => settings.endpoint = Some(endpoint),
            (Some(_), true) => warn!("ignoring second endpoint declared in [{source}]"),
            (None, _) => {}
        }
        settings.sources.push(source);
    }
    Ok(settings)
}

fn config_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("cannot list config directory {}", dir.display()))?
    {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                warn!("unreadable entry in {}: {e}", dir.display());
                continue;
            }
        };
        match path.extension().and_then(OsStr::to_str) {
            Some("yaml" | "yml") => files.push(path),
            _ => debug!("not a config file: {}", path.display()),
        }
    }
    files.sort();
    Ok(files)
}

fn read_config(path: &Path) -> Result<(Vec<TypeSet<PathLocation>>, Option<EndpointConfig>)> {
    let text = std::fs::read_to_string(path)?;
    let config: MonitorConfig = serde_yaml::from_str(&text)?;
    Ok((config.type_sets()?, config.endpoint))
}

fn parse_location(text: &str) -> Result<PathLocation> {
    PathLocation::parse(text).with_context(|| format!("invalid location [{text}]"))
}

impl MonitorConfig {
    pub fn type_sets(&self) -> Result<Vec<TypeSet<PathLocation>>> {
        self.type_sets.iter().map(TypeSetConfig::to_type_set).collect()
    }
}

impl TypeSetConfig {
    fn to_type_set(&self) -> Result<TypeSet<PathLocation>> {
        let types = self
            .resource_types
            .iter()
            .map(|t| {
                t.to_resource_type()
                    .with_context(|| format!("resource type [{}] in [{}]", t.name, self.name))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(TypeSet::new(self.name.as_str(), self.enabled, types))
    }
}

impl ResourceTypeConfig {
    fn to_resource_type(&self) -> Result<ResourceType<PathLocation>> {
        let mut resource_type = ResourceType::new(self.name.as_str(), parse_location(&self.location)?)
            .with_parents(self.parents.iter().map(String::as_str))
            .with_metric_labels(self.metric_labels.clone());
        if let Some(template) = &self.resource_name_template {
            resource_type = resource_type.with_resource_name_template(template.as_str());
        }
        for (key, value) in &self.properties {
            resource_type = resource_type.with_property(key.as_str(), value.as_str());
        }

        let measurements = self
            .metrics
            .iter()
            .map(|m| (m, false))
            .chain(self.avails.iter().map(|a| (a, true)));
        for (measurement, is_avail) in measurements {
            if measurement.interval == 0 {
                debug!(
                    "measurement [{}] of [{}] is disabled",
                    measurement.name, self.name
                );
                continue;
            }
            let measurement_type = measurement
                .to_measurement_type(is_avail)
                .with_context(|| format!("measurement [{}]", measurement.name))?;
            resource_type = resource_type.with_measurement(measurement_type);
        }

        for property in &self.config_properties {
            resource_type = resource_type.with_config_property(ConfigPropertyType {
                name: Name::new(property.name.as_str()),
                attribute_location: AttributeLocation::new(
                    parse_location(&property.location)?,
                    property.attribute.as_str(),
                ),
            });
        }

        for operation in &self.operations {
            resource_type = resource_type.with_operation(Operation {
                name: Name::new(operation.name.as_str()),
                internal_name: operation.internal_name.clone(),
                location: parse_location(&operation.location)?,
            });
        }

        Ok(resource_type)
    }
}

impl MeasurementConfig {
    fn to_measurement_type(&self, is_avail: bool) -> Result<MeasurementType<PathLocation>> {
        let kind = if is_avail {
            MeasurementKind::availability(self.up_regex.as_deref())?
        } else {
            MeasurementKind::Metric(self.kind)
        };
        let mut measurement_type = MeasurementType::new(
            self.name.as_str(),
            AttributeLocation::new(parse_location(&self.location)?, self.attribute.as_str()),
            Interval::new(self.interval, self.time_units)?,
            kind,
        )
        .with_metric_labels(self.metric_labels.clone());
        if let Some(units) = &self.units {
            measurement_type = measurement_type.with_units(units.as_str());
        }
        if let Some(family) = &self.metric_family {
            measurement_type = measurement_type.with_metric_family(family.as_str());
        }
        if let Some(template) = &self.metric_id_template {
            measurement_type = measurement_type.with_metric_id_template(template.as_str());
        }
        if let Some(expression) = &self.metric_expression {
            measurement_type = measurement_type.with_metric_expression(expression.as_str());
        }
        Ok(measurement_type)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::fs;

    const FULL: &str = r#"
type_sets:
  - name: datasources
    resource_types:
      - name: Server
        location: /
        metric_labels:
          server: "%ManagedServerName"
        avails:
          - name: Server Availability
            attribute: server-state
            interval: 30
            up_regex: "run.*"
        operations:
          - name: Reload
            internal_name: reload
      - name: Datasource
        location: /subsystem=datasources/data-source=*
        parents: [Server]
        resource_name_template: "%-"
        metrics:
          - name: Active Count
            attribute: active-count
            interval: 1
            time_units: minutes
            kind: counter
            units: connections
            metric_family: ds_active
            metric_id_template: "%FeedId/%ResourceName"
          - name: Disabled
            attribute: idle-count
            interval: 0
        config_properties:
          - name: JNDI Name
            attribute: jndi-name
  - name: extras
    enabled: false
endpoint:
  name: local
  feed_id: feed
  metric_labels:
    feed: "%FeedId"
"#;

    #[test]
    fn test_parse_full_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("wildfly.yaml"), FULL).unwrap();

        let settings = load_settings(dir.path()).unwrap();
        assert_eq!(settings.sources, vec!["wildfly"]);

        let endpoint = settings.endpoint.as_ref().unwrap();
        assert_eq!(endpoint.name, "local");
        assert_eq!(endpoint.feed_id, "feed");
        assert_eq!(endpoint.wait_for_ready_secs, 5);
        assert_eq!(endpoint.metric_labels.get("feed").unwrap(), "%FeedId");

        let sets = &settings.type_sets;
        assert_eq!(sets.len(), 2);
        assert!(!sets[1].enabled);

        let server = &sets[0].types[0];
        assert!(server.location().is_empty());
        assert_eq!(server.avail_types().count(), 1);
        assert_eq!(server.operations()[0].internal_name, "reload");

        let datasource = &sets[0].types[1];
        assert_eq!(datasource.parents(), &[Name::new("Server")]);
        assert_eq!(datasource.resource_name_template(), "%-");
        assert_eq!(datasource.config_property_types().len(), 1);

        let metrics: Vec<_> = datasource.metric_types().collect();
        assert_eq!(metrics.len(), 1);
        let active = &metrics[0];
        assert_eq!(active.interval().as_duration().as_secs(), 60);
        assert!(matches!(
            active.kind(),
            MeasurementKind::Metric(MetricKind::Counter)
        ));
        assert_eq!(active.units(), "connections");
        assert_eq!(active.metric_family(), "ds_active");
        assert_eq!(active.metric_id_template(), Some("%FeedId/%ResourceName"));
    }

    #[test]
    fn test_measurement_defaults() {
        let yaml = r#"
type_sets:
  - name: s
    resource_types:
      - name: T
        metrics:
          - name: M
            attribute: m
"#;
        let cfg: MonitorConfig = serde_yaml::from_str(yaml).unwrap();
        let sets = cfg.type_sets().unwrap();
        assert!(sets[0].enabled);
        let t = &sets[0].types[0];
        assert_eq!(t.resource_name_template(), "T");
        let m = t.metric_types().next().unwrap();
        assert_eq!(m.interval().as_duration().as_secs(), 60);
        assert_eq!(m.units(), "none");
        assert!(matches!(m.kind(), MeasurementKind::Metric(MetricKind::Gauge)));
        assert!(cfg.endpoint.is_none());
    }

    #[test]
    fn test_skips_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good.yaml"), "type_sets: []\n").unwrap();
        fs::write(dir.path().join("bad.yaml"), "not: valid: yaml: [").unwrap();
        let short_interval = r#"
type_sets:
  - name: s
    resource_types:
      - name: T
        metrics:
          - name: M
            attribute: m
            interval: 10
            time_units: milliseconds
"#;
        fs::write(dir.path().join("short.yaml"), short_interval).unwrap();
        let huge_interval = short_interval
            .replace("interval: 10", "interval: 18446744073709551615")
            .replace("milliseconds", "hours");
        fs::write(dir.path().join("huge.yaml"), huge_interval).unwrap();
        let bad_location = r#"
type_sets:
  - name: s
    resource_types:
      - name: T
        location: /no-equals-sign
"#;
        fs::write(dir.path().join("location.yml"), bad_location).unwrap();

        let settings = load_settings(dir.path()).unwrap();
        assert_eq!(settings.sources, vec!["good"]);
        assert!(settings.type_sets.is_empty());
    }

    #[test]
    fn test_sorted_and_ignores_non_yaml() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("charlie.yaml"), "type_sets: []\n").unwrap();
        fs::write(dir.path().join("alpha.yml"), "type_sets: []\n").unwrap();
        fs::write(dir.path().join("bravo.yaml"), "{}\n").unwrap();
        fs::write(dir.path().join("readme.txt"), "not a config").unwrap();

        let settings = load_settings(dir.path()).unwrap();
        assert_eq!(settings.sources, vec!["alpha", "bravo", "charlie"]);
    }

    #[test]
    fn test_merges_type_sets_and_keeps_first_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let file = |set: &str, endpoint: &str| {
            format!(
                "type_sets:\n  - name: {set}\n    resource_types:\n      - name: {set}Type\n\
                 endpoint:\n  name: {endpoint}\n  feed_id: feed\n"
            )
        };
        fs::write(dir.path().join("b.yaml"), file("second", "late")).unwrap();
        fs::write(dir.path().join("a.yaml"), file("first", "early")).unwrap();

        let settings = load_settings(dir.path()).unwrap();
        let names: Vec<&str> = settings.type_sets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(settings.endpoint.unwrap().name, "early");
    }

    #[test]
    fn test_load_settings_nonexistent_directory() {
        let result = load_settings(Path::new("/nonexistent/conf.d"));
        assert!(result.is_err());
    }
}
