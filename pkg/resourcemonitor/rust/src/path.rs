// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Management-path locations of the form `/key=value/key2=value2`.

use crate::errors::{Error, Result};
use crate::location::LocationResolver;
use std::fmt;
use std::str::FromStr;

pub const ANY_VALUE: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathSegment {
    key: String,
    value: String,
}

impl PathSegment {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_wildcard(&self) -> bool {
        self.value == ANY_VALUE
    }

    /// Same key, and same value unless `self` is a wildcard.
    fn matches(&self, other: &PathSegment) -> bool {
        self.key == other.key && (self.is_wildcard() || self.value == other.value)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// A sequence of `key=value` segments plus the read flags a management
/// request carries along with the address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathLocation {
    segments: Vec<PathSegment>,
    resolve_expressions: bool,
    include_defaults: bool,
}

impl PathLocation {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self {
            segments,
            ..Self::default()
        }
    }

    pub fn with_flags(mut self, resolve_expressions: bool, include_defaults: bool) -> Self {
        self.resolve_expressions = resolve_expressions;
        self.include_defaults = include_defaults;
        self
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn resolve_expressions(&self) -> bool {
        self.resolve_expressions
    }

    pub fn include_defaults(&self) -> bool {
        self.include_defaults
    }

    /// Parse `/a=b/c=d`. Both `""` and `"/"` denote the empty location.
    pub fn parse(text: &str) -> Result<Self> {
        let mut segments = Vec::new();
        for part in text.split('/').filter(|p| !p.is_empty()) {
            let Some((key, value)) = part.split_once('=') else {
                return Err(Error::InvalidLocation {
                    location: text.to_string(),
                    reason: format!("segment [{part}] is not of the form key=value"),
                });
            };
            if key.is_empty() || value.is_empty() {
                return Err(Error::InvalidLocation {
                    location: text.to_string(),
                    reason: format!("segment [{part}] has an empty key or value"),
                });
            }
            segments.push(PathSegment::new(key, value));
        }
        Ok(Self::new(segments))
    }
}

impl FromStr for PathLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PathLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PathLocationResolver;

impl PathLocationResolver {
    pub fn new() -> Self {
        Self
    }

    fn prefix_matches(query: &[PathSegment], location: &[PathSegment]) -> bool {
        query.iter().zip(location).all(|(q, l)| q.matches(l))
    }

    /// Consume one token following a `%` and return the remaining template.
    fn substitute<'a>(
        tail: &'a str,
        location: &PathLocation,
        args: &[&str],
        endpoint_name: &str,
        out: &mut String,
    ) -> &'a str {
        for segment in location.segments() {
            if let Some(rest) = tail
                .strip_prefix(segment.key())
                .and_then(|r| r.strip_prefix('%'))
            {
                out.push_str(segment.value());
                return rest;
            }
        }

        let digits = tail.bytes().take_while(u8::is_ascii_digit).count();
        if digits > 0 {
            let (number, rest) = tail.split_at(digits);
            let arg = number
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| args.get(i));
            match arg {
                Some(arg) => out.push_str(arg),
                None => {
                    out.push('%');
                    out.push_str(number);
                }
            }
            return rest;
        }

        if let Some(rest) = tail.strip_prefix('-') {
            match args.last() {
                Some(last) => out.push_str(last),
                None => out.push_str("%-"),
            }
            return rest;
        }

        if let Some(rest) = tail.strip_prefix("ManagedServerName") {
            out.push_str(endpoint_name);
            return rest;
        }

        out.push('%');
        tail
    }
}

impl LocationResolver<PathLocation> for PathLocationResolver {
    fn absolutize(&self, base: Option<&PathLocation>, location: &PathLocation) -> PathLocation {
        let Some(base) = base.filter(|b| !b.is_empty()) else {
            return location.clone();
        };
        let segments = base
            .segments
            .iter()
            .chain(location.segments.iter())
            .cloned()
            .collect();
        PathLocation {
            segments,
            resolve_expressions: location.resolve_expressions,
            include_defaults: location.include_defaults,
        }
    }

    fn is_multi_target(&self, location: &PathLocation) -> bool {
        location.segments.iter().any(PathSegment::is_wildcard)
    }

    fn matches(&self, query: &PathLocation, location: &PathLocation) -> bool {
        query.len() == location.len() && Self::prefix_matches(&query.segments, &location.segments)
    }

    fn is_parent(&self, parent: &PathLocation, child: &PathLocation) -> bool {
        parent.len() < child.len() && Self::prefix_matches(&parent.segments, &child.segments)
    }

    fn find_wildcard_match(
        &self,
        multi_target_location: &PathLocation,
        single_location: &PathLocation,
    ) -> Result<String> {
        if multi_target_location.len() != single_location.len() {
            return Err(Error::protocol(format!(
                "[{single_location}] doesn't have the same path size as [{multi_target_location}]"
            )));
        }

        for (multi, single) in multi_target_location
            .segments
            .iter()
            .zip(&single_location.segments)
        {
            if multi.is_wildcard() {
                if multi.key == single.key {
                    return Ok(single.value.clone());
                }
                return Err(Error::protocol(format!(
                    "[{single_location}] doesn't match the multi-target key in [{multi_target_location}]"
                )));
            }
        }

        Err(Error::protocol(format!(
            "[{single_location}] doesn't match the wildcard from [{multi_target_location}]"
        )))
    }

    fn apply_template(
        &self,
        name_template: &str,
        location: &PathLocation,
        endpoint_name: &str,
    ) -> String {
        let args: Vec<&str> = location
            .segments()
            .iter()
            .flat_map(|s| [s.key(), s.value()])
            .collect();

        let mut out = String::with_capacity(name_template.len());
        let mut rest = name_template;
        while let Some((head, tail)) = rest.split_once('%') {
            out.push_str(head);
            rest = Self::substitute(tail, location, &args, endpoint_name, &mut out);
        }
        out.push_str(rest);
        out
    }
}
