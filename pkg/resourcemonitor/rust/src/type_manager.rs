// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Resource type graph
//! Built once from the configured type sets and read-only afterwards

use crate::errors::{Error, Result};
use crate::ids::Name;
use crate::location::Location;
use crate::resource_type::{ResourceType, TypeSet};
use log::{debug, warn};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

#[derive(Debug)]
pub struct ResourceTypeManager<L> {
    /// Declaration order, used for stable root and breadth-first listings.
    types: Vec<Arc<ResourceType<L>>>,
    by_name: HashMap<Name, Arc<ResourceType<L>>>,
    children: HashMap<Name, Vec<Name>>,
    parents: HashMap<Name, Vec<Name>>,
    roots: Vec<Name>,
}

impl<L: Location> ResourceTypeManager<L> {
    /// Every type of a disabled set is removed together with all of its
    /// descendants, even descendants declared in enabled sets.
    pub fn new<I>(type_sets: I) -> Result<Self>
    where
        I: IntoIterator<Item = TypeSet<L>>,
    {
        let mut types = Vec::new();
        let mut by_name: HashMap<Name, Arc<ResourceType<L>>> = HashMap::new();
        let mut disabled = Vec::new();

        for set in type_sets {
            if !set.enabled {
                debug!("type set [{}] is disabled", set.name);
            }
            for resource_type in set.types {
                let name = resource_type.name().clone();
                if by_name.contains_key(&name) {
                    return Err(Error::DuplicateResourceType {
                        name: name.to_string(),
                    });
                }
                if !set.enabled {
                    disabled.push(name.clone());
                }
                let resource_type = Arc::new(resource_type);
                by_name.insert(name, Arc::clone(&resource_type));
                types.push(resource_type);
            }
        }

        let mut children: HashMap<Name, Vec<Name>> = HashMap::new();
        let mut parents: HashMap<Name, Vec<Name>> = HashMap::new();
        for resource_type in &types {
            for parent in resource_type.parents() {
                if by_name.contains_key(parent) {
                    children
                        .entry(parent.clone())
                        .or_default()
                        .push(resource_type.name().clone());
                    parents
                        .entry(resource_type.name().clone())
                        .or_default()
                        .push(parent.clone());
                } else {
                    warn!(
                        "resource type [{}] declares unknown parent type [{}]",
                        resource_type.name(),
                        parent
                    );
                }
            }
        }

        let mut manager = Self {
            types,
            by_name,
            children,
            parents,
            roots: Vec::new(),
        };
        manager.prune(&disabled);
        manager.roots = manager.compute_roots();
        Ok(manager)
    }

    fn prune(&mut self, disabled: &[Name]) {
        let mut doomed: HashSet<Name> = HashSet::new();
        let mut queue: VecDeque<Name> = disabled.iter().cloned().collect();
        while let Some(name) = queue.pop_front() {
            if !doomed.insert(name.clone()) {
                continue;
            }
            if let Some(kids) = self.children.get(&name) {
                queue.extend(kids.iter().cloned());
            }
        }
        if doomed.is_empty() {
            return;
        }

        debug!("removing [{}] disabled resource types", doomed.len());
        self.types.retain(|t| !doomed.contains(t.name()));
        self.by_name.retain(|name, _| !doomed.contains(name));
        self.children.retain(|name, _| !doomed.contains(name));
        self.parents.retain(|name, _| !doomed.contains(name));
        for kids in self.children.values_mut() {
            kids.retain(|k| !doomed.contains(k));
        }
        for ps in self.parents.values_mut() {
            ps.retain(|p| !doomed.contains(p));
        }
    }

    fn compute_roots(&self) -> Vec<Name> {
        let mut roots = Vec::new();
        for resource_type in &self.types {
            let has_parent = self
                .parents
                .get(resource_type.name())
                .is_some_and(|p| !p.is_empty());
            if has_parent {
                continue;
            }
            if !resource_type.parents().is_empty() {
                warn!(
                    "resource type [{}] has none of its declared parents {:?}, treating it as a root",
                    resource_type.name(),
                    resource_type
                        .parents()
                        .iter()
                        .map(Name::as_str)
                        .collect::<Vec<_>>()
                );
            }
            roots.push(resource_type.name().clone());
        }
        roots
    }

    fn resolve(&self, names: Option<&Vec<Name>>) -> Vec<Arc<ResourceType<L>>> {
        names
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| self.by_name.get(n).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get(&self, name: &Name) -> Option<Arc<ResourceType<L>>> {
        self.by_name.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn root_resource_types(&self) -> Vec<Arc<ResourceType<L>>> {
        self.roots
            .iter()
            .filter_map(|n| self.by_name.get(n).cloned())
            .collect()
    }

    pub fn children(&self, resource_type: &ResourceType<L>) -> Vec<Arc<ResourceType<L>>> {
        self.resolve(self.children.get(resource_type.name()))
    }

    pub fn parents(&self, resource_type: &ResourceType<L>) -> Vec<Arc<ResourceType<L>>> {
        self.resolve(self.parents.get(resource_type.name()))
    }

    /// Roots first, then each level in declaration order. A type with several
    /// parents is listed once.
    pub fn resource_types_breadth_first(&self) -> Vec<Arc<ResourceType<L>>> {
        let mut seen: HashSet<&Name> = HashSet::new();
        let mut queue: VecDeque<&Name> = self.roots.iter().collect();
        let mut result = Vec::with_capacity(self.types.len());
        while let Some(name) = queue.pop_front() {
            if !seen.insert(name) {
                continue;
            }
            if let Some(resource_type) = self.by_name.get(name) {
                result.push(Arc::clone(resource_type));
            }
            if let Some(kids) = self.children.get(name) {
                queue.extend(kids.iter());
            }
        }
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::path::PathLocation;

    fn rt(name: &str, parents: &[&str]) -> ResourceType<PathLocation> {
        ResourceType::new(name, PathLocation::empty()).with_parents(parents.iter().copied())
    }

    fn names(types: &[Arc<ResourceType<PathLocation>>]) -> Vec<&str> {
        types.iter().map(|t| t.name().as_str()).collect()
    }

    #[test]
    fn test_disabled_subtree_is_pruned() {
        let sets = vec![
            TypeSet::new("enabled", true, vec![rt("A", &[]), rt("B", &["A"])]),
            TypeSet::new("disabled", false, vec![rt("C", &["A"])]),
            TypeSet::new("enabled2", true, vec![rt("D", &["C"])]),
        ];
        let manager = ResourceTypeManager::new(sets).unwrap();

        assert_eq!(manager.len(), 2);
        assert_eq!(names(&manager.resource_types_breadth_first()), vec!["A", "B"]);
        let a = manager.get(&Name::from("A")).unwrap();
        assert_eq!(names(&manager.children(&a)), vec!["B"]);
        assert!(manager.get(&Name::from("D")).is_none());
    }

    #[test]
    fn test_duplicate_type_names_fail() {
        let sets = vec![
            TypeSet::new("one", true, vec![rt("A", &[])]),
            TypeSet::new("two", false, vec![rt("A", &[])]),
        ];
        let err = ResourceTypeManager::new(sets).unwrap_err();
        assert!(matches!(err, Error::DuplicateResourceType { name } if name == "A"));
    }

    #[test]
    fn test_missing_parent_becomes_root() {
        let sets = vec![TypeSet::new(
            "set",
            true,
            vec![rt("A", &[]), rt("Orphan", &["Nope"])],
        )];
        let manager = ResourceTypeManager::new(sets).unwrap();
        assert_eq!(names(&manager.root_resource_types()), vec!["A", "Orphan"]);
        let orphan = manager.get(&Name::from("Orphan")).unwrap();
        assert!(manager.parents(&orphan).is_empty());
    }

    #[test]
    fn test_breadth_first_and_parents() {
        let sets = vec![TypeSet::new(
            "set",
            true,
            vec![
                rt("Server", &[]),
                rt("Datasource", &["Server"]),
                rt("Deployment", &["Server"]),
                rt("Servlet", &["Deployment", "Subdeployment"]),
                rt("Subdeployment", &["Deployment"]),
                rt("Host", &[]),
            ],
        )];
        let manager = ResourceTypeManager::new(sets).unwrap();

        assert_eq!(
            names(&manager.resource_types_breadth_first()),
            vec![
                "Server",
                "Host",
                "Datasource",
                "Deployment",
                "Servlet",
                "Subdeployment"
            ]
        );
        let servlet = manager.get(&Name::from("Servlet")).unwrap();
        assert_eq!(
            names(&manager.parents(&servlet)),
            vec!["Deployment", "Subdeployment"]
        );
        assert_eq!(names(&manager.root_resource_types()), vec!["Server", "Host"]);
    }

    #[test]
    fn test_empty() {
        let manager = ResourceTypeManager::<PathLocation>::new(Vec::new()).unwrap();
        assert!(manager.is_empty());
        assert!(manager.root_resource_types().is_empty());
    }
}
