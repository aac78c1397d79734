//! Shared test infrastructure for taskgraph integration tests.
//!
//! Provides a TestEnv helper for consistent setup/teardown.

#![allow(dead_code)]

use taskgraph::{
    CacheCoordinator, Filter, MemoryCache, NewTask, ServiceConfig, SortKey, SortOrder, Status,
    Store, Task, TaskPage, TaskPatch, TaskService,
};
use tempfile::TempDir;

/// Test environment with automatic cleanup.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub svc: TaskService,
}

impl TestEnv {
    /// Create a new test environment with an on-disk store and an in-process
    /// cache.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = Store::open(&temp_dir.path().join("tasks.db")).expect("Failed to open store");
        let cache = CacheCoordinator::new(Box::new(MemoryCache::new()));
        let svc = TaskService::new(store, cache, ServiceConfig::default());
        Self { temp_dir, svc }
    }

    /// Create a task with default fields.
    pub fn create_task(&mut self, title: &str) -> Task {
        self.svc
            .create_task(&NewTask::new(title))
            .expect("Failed to create task")
    }

    /// Create a task depending on the given tasks.
    pub fn create_task_with_deps(&mut self, title: &str, deps: &[&Task]) -> Task {
        let mut new = NewTask::new(title);
        new.depends_on = deps.iter().map(|t| t.id).collect();
        self.svc.create_task(&new).expect("Failed to create task")
    }

    /// Set a task's status through the lifecycle controller.
    pub fn set_status(&mut self, task: &Task, status: Status) -> Task {
        self.svc
            .update_task(task.id, &status_patch(status))
            .expect("Failed to update status")
    }

    /// Mark a task completed.
    pub fn complete(&mut self, task: &Task) -> Task {
        self.set_status(task, Status::Completed)
    }

    /// List everything, unfiltered, in creation order.
    pub fn list_all(&self) -> TaskPage {
        self.svc
            .list_tasks(&Filter::new(), SortKey::CreatedAt, SortOrder::Asc, 0, 0)
            .expect("Failed to list tasks")
    }

    /// Total match count for the unfiltered list.
    pub fn total_count(&self) -> u64 {
        self.list_all().total
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Patch setting only the status field.
pub fn status_patch(status: Status) -> TaskPatch {
    TaskPatch {
        status: Some(status),
        ..Default::default()
    }
}
