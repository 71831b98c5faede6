// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::errors::Result;
use std::fmt;
use std::hash::Hash;

/// A protocol-specific address. The core treats it as opaque; only the matching
/// [`LocationResolver`] understands its segments and wildcards.
pub trait Location:
    Clone + Eq + Ord + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
}

impl<T> Location for T where
    T: Clone + Eq + Ord + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
}

/// A location plus the name of one attribute readable at that location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeLocation<L> {
    location: L,
    attribute: String,
}

impl<L: Location> AttributeLocation<L> {
    pub fn new(location: L, attribute: impl Into<String>) -> Self {
        Self {
            location,
            attribute: attribute.into(),
        }
    }

    pub fn location(&self) -> &L {
        &self.location
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }
}

impl<L: Location> fmt::Display for AttributeLocation<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.location, self.attribute)
    }
}

/// Wildcard algebra over one protocol's locations.
pub trait LocationResolver<L: Location>: Send + Sync {
    /// Resolve `location` against `base`.
    fn absolutize(&self, base: Option<&L>, location: &L) -> L;

    /// True iff any segment of `location` is a wildcard.
    fn is_multi_target(&self, location: &L) -> bool;

    /// True iff `location` has as many segments as `query` and each segment
    /// agrees by key, and by value unless the query segment is a wildcard.
    fn matches(&self, query: &L, location: &L) -> bool;

    /// True iff `parent` is strictly shorter than `child` and matches its prefix.
    fn is_parent(&self, parent: &L, child: &L) -> bool;

    /// The value in `single_location` that filled the first wildcard of
    /// `multi_target_location`.
    fn find_wildcard_match(&self, multi_target_location: &L, single_location: &L)
    -> Result<String>;

    /// Render a resource display name.
    fn apply_template(&self, name_template: &str, location: &L, endpoint_name: &str) -> String;

    fn absolutize_attribute(
        &self,
        base: Option<&L>,
        location: &AttributeLocation<L>,
    ) -> AttributeLocation<L> {
        AttributeLocation::new(
            self.absolutize(base, location.location()),
            location.attribute(),
        )
    }
}
