//! Dependency graph engine: validated edge mutation, completion checks, and
//! tree materialization.
//!
//! Cycles are rejected at insertion time, so [`can_complete`] never needs
//! cycle awareness and stays a one-hop scan over direct dependencies.

use crate::error::TaskError;
use crate::store::Store;
use crate::types::{DependencyEdge, DependencyTree, Status};
use eyre::Result;
use std::collections::HashSet;

/// Default recursion guard for tree materialization. The acyclic invariant
/// should make this unreachable; the visited set and the cap are safety nets.
pub const DEFAULT_MAX_TREE_DEPTH: usize = 64;

/// Insert a validated dependency edge: `task_id` depends on `depends_on_id`.
///
/// Idempotent: if the identical edge already exists, it is returned as-is.
pub fn add_edge(store: &mut Store, task_id: i64, depends_on_id: i64) -> Result<DependencyEdge> {
    if task_id == depends_on_id {
        return Err(eyre::eyre!(TaskError::SelfDependency));
    }

    if store.find_task(task_id)?.is_none() {
        return Err(eyre::eyre!(TaskError::TaskNotFound(task_id)));
    }
    if store.find_task(depends_on_id)?.is_none() {
        return Err(eyre::eyre!(TaskError::TaskNotFound(depends_on_id)));
    }

    if let Some(existing) = store.find_edge(task_id, depends_on_id)? {
        return Ok(existing);
    }

    if would_create_cycle(store, task_id, depends_on_id)? {
        return Err(eyre::eyre!(TaskError::CircularDependency {
            task_id,
            depends_on_id,
        }));
    }

    store.insert_edge(task_id, depends_on_id)
}

/// Remove a dependency edge.
pub fn remove_edge(store: &mut Store, task_id: i64, depends_on_id: i64) -> Result<()> {
    if !store.delete_edge(task_id, depends_on_id)? {
        return Err(eyre::eyre!(TaskError::EdgeNotFound {
            task_id,
            depends_on_id,
        }));
    }
    Ok(())
}

/// True iff every direct dependency of the task is Completed. A task with no
/// dependencies is trivially completable.
pub fn can_complete(store: &Store, task_id: i64) -> Result<bool> {
    Ok(first_unmet_dependency(store, task_id)?.is_none())
}

/// The first direct dependency blocking completion, if any.
pub fn first_unmet_dependency(store: &Store, task_id: i64) -> Result<Option<i64>> {
    for edge in store.list_outgoing_edges(task_id)? {
        match store.find_task(edge.depends_on_id)? {
            Some(dep) if dep.status == Status::Completed => {}
            _ => return Ok(Some(edge.depends_on_id)),
        }
    }
    Ok(None)
}

/// Materialize the task plus the recursively nested trees of its direct
/// dependencies, cutting off expansion below `max_depth`.
pub fn dependency_tree(store: &Store, task_id: i64, max_depth: usize) -> Result<DependencyTree> {
    let mut visited = HashSet::new();
    build_tree(store, task_id, &mut visited, 0, max_depth)
}

fn build_tree(
    store: &Store,
    task_id: i64,
    visited: &mut HashSet<i64>,
    depth: usize,
    max_depth: usize,
) -> Result<DependencyTree> {
    let task = store
        .find_task(task_id)?
        .ok_or_else(|| eyre::eyre!(TaskError::TaskNotFound(task_id)))?;

    let mut dependencies = Vec::new();
    if depth < max_depth && visited.insert(task_id) {
        for edge in store.list_outgoing_edges(task_id)? {
            // An edge to a task already on the path means the acyclic
            // invariant was violated upstream; skip instead of recursing.
            if visited.contains(&edge.depends_on_id) {
                log::warn!(
                    "dependency cycle encountered while building tree: {} -> {}",
                    task_id,
                    edge.depends_on_id
                );
                continue;
            }
            dependencies.push(build_tree(
                store,
                edge.depends_on_id,
                visited,
                depth + 1,
                max_depth,
            )?);
        }
        visited.remove(&task_id);
    }

    Ok(DependencyTree { task, dependencies })
}

/// Check whether adding `task_id -> depends_on_id` would create a cycle:
/// DFS forward from `depends_on_id`; reaching `task_id` means a cycle.
fn would_create_cycle(store: &Store, task_id: i64, depends_on_id: i64) -> Result<bool> {
    let mut visited = HashSet::new();
    let mut stack = vec![depends_on_id];

    while let Some(node) = stack.pop() {
        if node == task_id {
            return Ok(true);
        }
        if visited.insert(node) {
            for edge in store.list_outgoing_edges(node)? {
                stack.push(edge.depends_on_id);
            }
        }
    }

    Ok(false)
}
