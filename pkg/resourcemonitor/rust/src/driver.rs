// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::errors::Result;
use crate::location::{AttributeLocation, Location};
use serde_json::Value;
use std::collections::BTreeMap;

/// Reads from one live session with one managed endpoint. Calls block on I/O.
///
/// A driver reading a wildcarded attribute location with [`Driver::fetch_attribute`]
/// returns an array with one element per matched node.
pub trait Driver<L: Location>: Send {
    /// Concrete nodes matching `query`, keyed by their resolved location.
    fn fetch_nodes(&self, query: &L) -> Result<BTreeMap<L, Value>>;

    fn fetch_attribute(&self, location: &AttributeLocation<L>) -> Result<Value>;

    /// Reads a wildcarded attribute location, keyed by each matched location.
    fn fetch_attribute_as_map(&self, location: &AttributeLocation<L>) -> Result<BTreeMap<L, Value>>;

    fn attribute_exists(&self, location: &AttributeLocation<L>) -> Result<bool>;
}

/// Opens driver sessions to one endpoint. The session closes when the driver is dropped.
pub trait Connector<L: Location>: Send + Sync {
    fn open(&self) -> Result<Box<dyn Driver<L>>>;
}
