//! Task lifecycle controller.
//!
//! Orchestrates the store, the graph engine, and the cache coordinator so
//! every mutation leaves the cache precisely invalidated. Reads go through
//! the cache first and repopulate it on a miss.

use crate::cache::{self, CacheCoordinator};
use crate::error::TaskError;
use crate::graph;
use crate::store::Store;
use crate::types::{
    DependencyEdge, DependencyTree, Filter, NewTask, SortKey, SortOrder, Status, Task, TaskPage,
    TaskPatch,
};
use chrono::Utc;
use eyre::{Context, Result};
use std::time::Duration;

/// Tunables for the service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// TTL applied to every cached entry. Acts as the staleness backstop
    /// for the window between a store commit and its invalidation.
    pub cache_ttl: Duration,
    /// Depth cap for dependency tree materialization.
    pub max_tree_depth: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            max_tree_depth: graph::DEFAULT_MAX_TREE_DEPTH,
        }
    }
}

/// The task service: create/update/delete tasks, manage dependencies, and
/// serve cached reads.
///
/// Holds the single store handle; all edge mutations pass through `&mut
/// self`, which serializes the graph engine's check-then-insert sequence.
pub struct TaskService {
    store: Store,
    cache: CacheCoordinator,
    config: ServiceConfig,
}

impl TaskService {
    pub fn new(store: Store, cache: CacheCoordinator, config: ServiceConfig) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    /// Create a task and its initial dependency edges, all-or-nothing.
    pub fn create_task(&mut self, new: &NewTask) -> Result<Task> {
        new.validate()
            .map_err(|e| eyre::eyre!(TaskError::Validation(e)))?;

        // Pre-flight the dependency ids so the common failure mode never
        // needs a rollback.
        for &dep_id in &new.depends_on {
            if self.store.find_task(dep_id)?.is_none() {
                return Err(eyre::eyre!(TaskError::TaskNotFound(dep_id)));
            }
        }

        let task = self.store.insert_task(new).context("Failed to persist task")?;

        let mut added: Vec<i64> = Vec::new();
        for &dep_id in &new.depends_on {
            match graph::add_edge(&mut self.store, task.id, dep_id) {
                Ok(_) => added.push(dep_id),
                Err(e) => {
                    self.rollback_create(task.id, &added);
                    return Err(e);
                }
            }
        }

        self.cache.invalidate_by_prefix(cache::LIST_PREFIX);
        log::debug!("created task {} with {} dependencies", task.id, added.len());
        Ok(task)
    }

    /// Undo a partially applied create: drop the edges added so far, then
    /// the task row.
    fn rollback_create(&mut self, task_id: i64, added: &[i64]) {
        for &dep_id in added {
            if let Err(e) = self.store.delete_edge(task_id, dep_id) {
                log::warn!("rollback failed deleting edge {} -> {}: {}", task_id, dep_id, e);
            }
        }
        if let Err(e) = self.store.delete_task(task_id) {
            log::warn!("rollback failed deleting task {}: {}", task_id, e);
        }
    }

    /// Get a task, read-through cached.
    pub fn get_task(&self, id: i64) -> Result<Task> {
        self.cache
            .read_through(&cache::task_key(id), self.config.cache_ttl, || {
                self.store
                    .find_task(id)?
                    .ok_or_else(|| eyre::eyre!(TaskError::TaskNotFound(id)))
            })
    }

    /// List tasks with filtering, sorting, and pagination, read-through
    /// cached under a key derived from the normalized parameters.
    pub fn list_tasks(
        &self,
        filter: &Filter,
        sort: SortKey,
        order: SortOrder,
        offset: u64,
        limit: u64,
    ) -> Result<TaskPage> {
        let key = cache::list_key(filter, sort, order, offset, limit);
        self.cache.read_through(&key, self.config.cache_ttl, || {
            let (tasks, total) = self.store.list_tasks(filter, sort, order, offset, limit)?;
            Ok(TaskPage::assemble(tasks, total, offset, limit))
        })
    }

    /// Get a task's dependency tree, read-through cached.
    pub fn dependency_tree(&self, id: i64) -> Result<DependencyTree> {
        self.cache
            .read_through(&cache::tree_key(id), self.config.cache_ttl, || {
                graph::dependency_tree(&self.store, id, self.config.max_tree_depth)
            })
    }

    /// Apply a partial update. Setting status to Completed is rejected while
    /// any direct dependency is incomplete, even if the task is already
    /// Completed. Transitions out of Completed are unrestricted.
    pub fn update_task(&mut self, id: i64, patch: &TaskPatch) -> Result<Task> {
        let mut task = self
            .store
            .find_task(id)?
            .ok_or_else(|| eyre::eyre!(TaskError::TaskNotFound(id)))?;

        if patch.status == Some(Status::Completed)
            && let Some(dep_id) = graph::first_unmet_dependency(&self.store, id)?
        {
            return Err(eyre::eyre!(TaskError::DependencyNotSatisfied {
                task_id: id,
                depends_on_id: dep_id,
            }));
        }

        if let Some(title) = &patch.title {
            task.title = title.clone();
        }
        if let Some(description) = &patch.description {
            task.description = description.clone();
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(tags) = &patch.tags {
            task.tags = tags.clone();
        }
        task.updated_at = Utc::now();

        task.validate()
            .map_err(|e| eyre::eyre!(TaskError::Validation(e)))?;

        self.store
            .update_task(&task)
            .context("Failed to persist task update")?;

        self.cache.invalidate_task(id);
        // Direct dependents embed this task in their cached trees.
        for edge in self.store.list_incoming_edges(id)? {
            self.cache.invalidate(&cache::tree_key(edge.task_id));
        }
        Ok(task)
    }

    /// Delete a task, cascading edge cleanup. Invalidates the task itself
    /// and every direct dependent, whose completability may have changed.
    pub fn delete_task(&mut self, id: i64) -> Result<()> {
        if self.store.find_task(id)?.is_none() {
            return Err(eyre::eyre!(TaskError::TaskNotFound(id)));
        }

        let dependents = self.store.list_incoming_edges(id)?;
        self.store.delete_task(id).context("Failed to delete task")?;

        self.cache.invalidate_task(id);
        for edge in &dependents {
            self.cache.invalidate_task(edge.task_id);
        }
        log::debug!("deleted task {} ({} dependents invalidated)", id, dependents.len());
        Ok(())
    }

    /// Add a dependency edge through the graph engine, invalidating both
    /// endpoints.
    pub fn add_dependency(&mut self, task_id: i64, depends_on_id: i64) -> Result<DependencyEdge> {
        let edge = graph::add_edge(&mut self.store, task_id, depends_on_id)?;
        self.cache.invalidate_task(task_id);
        self.cache.invalidate_task(depends_on_id);
        Ok(edge)
    }

    /// Remove a dependency edge, invalidating both endpoints.
    pub fn remove_dependency(&mut self, task_id: i64, depends_on_id: i64) -> Result<()> {
        graph::remove_edge(&mut self.store, task_id, depends_on_id)?;
        self.cache.invalidate_task(task_id);
        self.cache.invalidate_task(depends_on_id);
        Ok(())
    }
}
