//! taskgraph: task tracking with a dependency graph engine and a
//! read-through cache in front of SQLite persistence.
//!
//! Tasks carry status, priority, and tags, and can be linked by directed
//! dependency edges. The graph stays acyclic: every edge insertion runs a
//! reachability check, and a task cannot be completed while any of its
//! direct dependencies is incomplete. Reads (single task, dependency tree,
//! filtered lists) are served through a cache that mutations invalidate
//! precisely.
//!
//! # Example
//!
//! ```no_run
//! use taskgraph::{
//!     CacheCoordinator, MemoryCache, NewTask, ServiceConfig, Status, Store, TaskPatch,
//!     TaskService,
//! };
//!
//! let store = Store::open_in_memory().unwrap();
//! let cache = CacheCoordinator::new(Box::new(MemoryCache::new()));
//! let mut svc = TaskService::new(store, cache, ServiceConfig::default());
//!
//! // Create two tasks, the second depending on the first
//! let base = svc.create_task(&NewTask::new("Set up schema")).unwrap();
//! let mut new = NewTask::new("Write queries");
//! new.depends_on = vec![base.id];
//! let dependent = svc.create_task(&new).unwrap();
//!
//! // Completing the dependent first is rejected
//! let done = TaskPatch { status: Some(Status::Completed), ..Default::default() };
//! assert!(svc.update_task(dependent.id, &done).is_err());
//!
//! // Complete them in dependency order
//! svc.update_task(base.id, &done).unwrap();
//! svc.update_task(dependent.id, &done).unwrap();
//! ```

mod error;
mod types;

pub mod cache;
pub mod graph;
pub mod service;
pub mod store;

// Re-export public API
pub use cache::{CacheBackend, CacheCoordinator, MemoryCache};
pub use error::TaskError;
pub use service::{ServiceConfig, TaskService};
pub use store::Store;
pub use types::{
    DependencyEdge, DependencyTree, Filter, NewTask, Priority, SortKey, SortOrder, Status, Task,
    TaskPage, TaskPatch, ValidationError,
};
