// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Resource graph of one endpoint
//!
//! Readers and the discovery writer share one reader/writer lock, taken per
//! mutation. Every accessor returns a snapshot that does not follow later
//! mutations.

use crate::errors::{Error, Result};
use crate::ids::ID;
use crate::location::{Location, LocationResolver};
use crate::resource::{Resource, ResourceBuilder};
use indexmap::IndexSet;
use log::{debug, log_enabled};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Write;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Added,
    Modified,
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct AddResult<L> {
    pub effect: Effect,
    /// The instance held by the graph after the call.
    pub resource: Arc<Resource<L>>,
}

/// Parent/child adjacency kept in step with every vertex and edge mutation.
///
/// Roots and siblings keep insertion order until one of them is removed;
/// removal swaps the last entry into the freed slot.
#[derive(Debug, Default)]
struct NeighborIndex {
    roots: IndexSet<ID>,
    children: HashMap<ID, IndexSet<ID>>,
    parent: HashMap<ID, ID>,
}

impl NeighborIndex {
    fn vertex_added(&mut self, id: &ID) {
        self.roots.insert(id.clone());
    }

    fn edge_added(&mut self, parent: &ID, child: &ID) {
        self.detach(child);
        self.roots.swap_remove(child);
        self.parent.insert(child.clone(), parent.clone());
        self.children
            .entry(parent.clone())
            .or_default()
            .insert(child.clone());
    }

    /// Drops the parent edge of `child`, leaving it a root.
    fn detach(&mut self, child: &ID) {
        if let Some(parent) = self.parent.remove(child) {
            if let Some(siblings) = self.children.get_mut(&parent) {
                siblings.swap_remove(child);
            }
            self.roots.insert(child.clone());
        }
    }

    fn vertex_removed(&mut self, id: &ID) {
        self.detach(id);
        self.roots.swap_remove(id);
        for orphan in self.children.remove(id).unwrap_or_default() {
            self.parent.remove(&orphan);
            self.roots.insert(orphan);
        }
    }

    fn children_of(&self, id: &ID) -> impl DoubleEndedIterator<Item = &ID> {
        self.children.get(id).into_iter().flatten()
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    fn is_ancestor_or_self(&self, ancestor: &ID, id: &ID) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.parent.get(c);
        }
        false
    }
}

#[derive(Debug)]
struct Graph<L> {
    resources: HashMap<ID, Arc<Resource<L>>>,
    index: NeighborIndex,
}

impl<L: Location> Graph<L> {
    fn breadth_first_from<'a>(
        &'a self,
        start: impl IntoIterator<Item = &'a ID>,
    ) -> Vec<Arc<Resource<L>>> {
        let mut queue: VecDeque<&ID> = start.into_iter().collect();
        let mut result = Vec::new();
        while let Some(id) = queue.pop_front() {
            if let Some(resource) = self.resources.get(id) {
                result.push(Arc::clone(resource));
            }
            queue.extend(self.index.children_of(id));
        }
        result
    }

    /// `id` and all of its descendants, every resource listed after its
    /// descendants.
    fn collect_subtree(&self, id: &ID, seen: &mut HashSet<ID>, out: &mut Vec<ID>) {
        let mut stack = vec![id.clone()];
        let mut preorder = Vec::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            stack.extend(self.index.children_of(&current).rev().cloned());
            preorder.push(current);
        }
        out.extend(preorder.into_iter().rev());
    }

    fn remove_all(&mut self, ids: &[ID]) -> Vec<Arc<Resource<L>>> {
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(resource) = self.resources.remove(id) {
                self.index.vertex_removed(id);
                removed.push(resource);
            }
        }
        removed
    }
}

#[derive(Debug)]
pub struct ResourceManager<L> {
    graph: RwLock<Graph<L>>,
}

impl<L: Location> Default for ResourceManager<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Location> ResourceManager<L> {
    pub fn new() -> Self {
        Self {
            graph: RwLock::new(Graph {
                resources: HashMap::new(),
                index: NeighborIndex::default(),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Graph<L>> {
        self.graph.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Graph<L>> {
        self.graph.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or update `resource`.
    ///
    /// A declared parent must already be in the graph. If `resource` was built
    /// against a different parent instance than the one in the graph it is
    /// rebuilt against the graph's instance first. An update keeps the child
    /// edges of the replaced resource.
    pub fn add_resource(&self, resource: Arc<Resource<L>>) -> Result<AddResult<L>> {
        let mut graph = self.write();

        let mut resource = resource;
        if let Some(parent) = resource.parent() {
            let Some(graph_parent) = graph.resources.get(parent.id()) else {
                return Err(Error::invalid_argument(format!(
                    "parent [{}] of resource [{}] is not in the resource graph",
                    parent.id(),
                    resource.id()
                )));
            };
            if !Arc::ptr_eq(graph_parent, parent) {
                let graph_parent = Arc::clone(graph_parent);
                resource = ResourceBuilder::from_template(&resource)
                    .parent(graph_parent)
                    .build()?;
            }
        }

        let id = resource.id().clone();
        let parent_id = resource.parent().map(|p| p.id().clone());
        let existing = graph.resources.get(&id).cloned();

        let effect = match existing {
            None => {
                graph.resources.insert(id.clone(), Arc::clone(&resource));
                graph.index.vertex_added(&id);
                if let Some(parent_id) = &parent_id {
                    graph.index.edge_added(parent_id, &id);
                }
                Effect::Added
            }
            Some(old) if old.is_equivalent(&resource) => {
                return Ok(AddResult {
                    effect: Effect::Unchanged,
                    resource: old,
                });
            }
            Some(_) => {
                let reparented = graph.index.parent.get(&id) != parent_id.as_ref();
                if let Some(parent_id) = parent_id.as_ref().filter(|_| reparented) {
                    if graph.index.is_ancestor_or_self(&id, parent_id) {
                        return Err(Error::invalid_argument(format!(
                            "resource [{id}] cannot become a child of its own descendant [{parent_id}]"
                        )));
                    }
                }
                graph.resources.insert(id.clone(), Arc::clone(&resource));
                if reparented {
                    graph.index.detach(&id);
                    if let Some(parent_id) = &parent_id {
                        graph.index.edge_added(parent_id, &id);
                    }
                }
                Effect::Modified
            }
        };

        debug!("{effect:?} resource [{id}]");
        Ok(AddResult { effect, resource })
    }

    /// Remove `resource` and all of its descendants. Descendants come first in
    /// the returned list.
    pub fn remove_resource(&self, resource: &Resource<L>) -> Vec<Arc<Resource<L>>> {
        let mut graph = self.write();
        if !graph.resources.contains_key(resource.id()) {
            return Vec::new();
        }
        let mut doomed = Vec::new();
        graph.collect_subtree(resource.id(), &mut HashSet::new(), &mut doomed);
        graph.remove_all(&doomed)
    }

    /// Remove every resource matching `query`, together with its descendants.
    pub fn remove_resources(
        &self,
        query: &L,
        resolver: &dyn LocationResolver<L>,
    ) -> Vec<Arc<Resource<L>>> {
        let mut graph = self.write();
        let matching: Vec<ID> = graph
            .breadth_first_from(&graph.index.roots)
            .into_iter()
            .filter(|r| resolver.matches(query, r.location()))
            .map(|r| r.id().clone())
            .collect();

        let mut seen = HashSet::new();
        let mut doomed = Vec::new();
        for id in &matching {
            graph.collect_subtree(id, &mut seen, &mut doomed);
        }
        graph.remove_all(&doomed)
    }

    /// Breadth-first list of resources whose location matches `query`.
    pub fn find_resources(
        &self,
        query: &L,
        resolver: &dyn LocationResolver<L>,
    ) -> Vec<Arc<Resource<L>>> {
        let graph = self.read();
        graph
            .breadth_first_from(&graph.index.roots)
            .into_iter()
            .filter(|r| resolver.matches(query, r.location()))
            .collect()
    }

    pub fn get_resource(&self, id: &ID) -> Option<Arc<Resource<L>>> {
        self.read().resources.get(id).cloned()
    }

    pub fn get_children(&self, resource: &Resource<L>) -> Vec<Arc<Resource<L>>> {
        let graph = self.read();
        graph
            .index
            .children_of(resource.id())
            .filter_map(|id| graph.resources.get(id).cloned())
            .collect()
    }

    pub fn get_parent(&self, resource: &Resource<L>) -> Option<Arc<Resource<L>>> {
        let graph = self.read();
        graph
            .index
            .parent
            .get(resource.id())
            .and_then(|id| graph.resources.get(id).cloned())
    }

    pub fn get_root_resources(&self) -> Vec<Arc<Resource<L>>> {
        let graph = self.read();
        graph
            .index
            .roots
            .iter()
            .filter_map(|id| graph.resources.get(id).cloned())
            .collect()
    }

    /// Roots in insertion order, then each level below them.
    pub fn get_resources_breadth_first(&self) -> Vec<Arc<Resource<L>>> {
        let graph = self.read();
        graph.breadth_first_from(&graph.index.roots)
    }

    /// `root` and its descendants, breadth first.
    pub fn get_subtree_breadth_first(&self, root: &Resource<L>) -> Vec<Arc<Resource<L>>> {
        let graph = self.read();
        graph.breadth_first_from(std::slice::from_ref(root.id()))
    }

    pub fn len(&self) -> usize {
        self.read().resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().resources.is_empty()
    }

    /// Logs the whole graph as an indented tree at debug level.
    pub fn log_tree_graph(&self, title: &str, duration: Duration) {
        if !log_enabled!(log::Level::Debug) {
            return;
        }
        let graph = self.read();
        let mut out = String::new();
        let mut stack: Vec<(&ID, usize)> = graph.index.roots.iter().rev().map(|r| (r, 0)).collect();
        while let Some((id, depth)) = stack.pop() {
            if let Some(resource) = graph.resources.get(id) {
                let _ = writeln!(out, "{:indent$}{}", "", resource, indent = depth * 2);
            }
            stack.extend(graph.index.children_of(id).rev().map(|c| (c, depth + 1)));
        }
        debug!(
            "{title}: [{}] resources in {}ms\n{out}",
            graph.resources.len(),
            duration.as_millis()
        );
    }
}
