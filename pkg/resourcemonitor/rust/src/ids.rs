// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Identifier and name value objects

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, immutable key for resources, types and measurement instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ID(String);

impl ID {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `{feed}~{endpoint}~{location}`
    pub fn resource(feed_id: &str, endpoint_name: &str, location: &str) -> Self {
        Self(format!("{feed_id}~{endpoint_name}~{location}"))
    }

    pub fn metric_instance(feed_id: &str, resource_id: &ID, metric_type_id: &ID) -> Self {
        Self(format!("MI~R~[{feed_id}/{resource_id}]~MT~{metric_type_id}"))
    }

    pub fn avail_instance(feed_id: &str, resource_id: &ID, avail_type_id: &ID) -> Self {
        Self(format!("AI~R~[{feed_id}/{resource_id}]~AT~{avail_type_id}"))
    }
}

impl fmt::Display for ID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ID {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ID {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Human-readable label, distinct from [`ID`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Name(String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Name {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Name {
    fn from(name: String) -> Self {
        Self(name)
    }
}
