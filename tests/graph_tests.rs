//! Integration tests for dependency graph behavior.
//!
//! Covers cycle rejection, edge idempotency, the completion gate, cascade
//! delete, and dependency tree materialization.

mod common;

use common::{TestEnv, status_patch};
use taskgraph::{Status, TaskError};

// =============================================================================
// Cycle Detection
// =============================================================================

#[test]
fn test_reverse_of_existing_dependency_is_circular() {
    let mut env = TestEnv::new();

    let a = env.create_task("A");
    let b = env.create_task("B");

    env.svc.add_dependency(a.id, b.id).unwrap();

    let err = env.svc.add_dependency(b.id, a.id).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TaskError>(),
        Some(TaskError::CircularDependency { .. })
    ));
}

#[test]
fn test_transitive_cycle_rejected() {
    let mut env = TestEnv::new();

    let a = env.create_task("A");
    let b = env.create_task_with_deps("B", &[&a]);
    let c = env.create_task_with_deps("C", &[&b]);

    // A depending on C would close the chain into a loop
    let err = env.svc.add_dependency(a.id, c.id).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TaskError>(),
        Some(TaskError::CircularDependency { .. })
    ));
}

#[test]
fn test_diamond_is_not_a_cycle() {
    let mut env = TestEnv::new();

    let d = env.create_task("D");
    let b = env.create_task_with_deps("B", &[&d]);
    let c = env.create_task_with_deps("C", &[&d]);
    let a = env.create_task_with_deps("A", &[&b, &c]);

    let tree = env.svc.dependency_tree(a.id).unwrap();
    assert_eq!(tree.dependencies.len(), 2);
}

#[test]
fn test_self_dependency_rejected() {
    let mut env = TestEnv::new();

    let a = env.create_task("A");
    let err = env.svc.add_dependency(a.id, a.id).unwrap_err();
    assert_eq!(err.downcast_ref::<TaskError>(), Some(&TaskError::SelfDependency));
}

// =============================================================================
// Edge Idempotency
// =============================================================================

#[test]
fn test_add_dependency_idempotent() {
    let mut env = TestEnv::new();

    let a = env.create_task("A");
    let b = env.create_task("B");

    let first = env.svc.add_dependency(a.id, b.id).unwrap();
    let second = env.svc.add_dependency(a.id, b.id).unwrap();
    assert_eq!(first, second);

    // Exactly one edge: removing once succeeds, removing again is NotFound
    env.svc.remove_dependency(a.id, b.id).unwrap();
    let err = env.svc.remove_dependency(a.id, b.id).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TaskError>(),
        Some(TaskError::EdgeNotFound { .. })
    ));
}

// =============================================================================
// Completion Gate
// =============================================================================

#[test]
fn test_complete_blocked_then_unblocked() {
    let mut env = TestEnv::new();

    let a = env.create_task("A");
    let b = env.create_task_with_deps("B", &[&a]);

    // B cannot complete while A is pending
    let err = env.svc.update_task(b.id, &status_patch(Status::Completed)).unwrap_err();
    assert_eq!(
        err.downcast_ref::<TaskError>(),
        Some(&TaskError::DependencyNotSatisfied {
            task_id: b.id,
            depends_on_id: a.id
        })
    );

    env.complete(&a);
    let b = env.complete(&b);
    assert_eq!(b.status, Status::Completed);
}

#[test]
fn test_complete_requires_every_dependency() {
    let mut env = TestEnv::new();

    let a = env.create_task("A");
    let b = env.create_task("B");
    let c = env.create_task_with_deps("C", &[&a, &b]);

    env.complete(&a);
    let err = env.svc.update_task(c.id, &status_patch(Status::Completed)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TaskError>(),
        Some(TaskError::DependencyNotSatisfied { .. })
    ));

    env.complete(&b);
    env.complete(&c);
}

#[test]
fn test_other_transitions_unrestricted() {
    let mut env = TestEnv::new();

    let a = env.create_task("A");
    let b = env.create_task_with_deps("B", &[&a]);

    // Starting a blocked task is fine; only completion is gated
    let b = env.set_status(&b, Status::InProgress);
    assert_eq!(b.status, Status::InProgress);

    // And a completed task may regress without re-validation
    let a = env.complete(&a);
    let a = env.set_status(&a, Status::Pending);
    assert_eq!(a.status, Status::Pending);
}

#[test]
fn test_regressed_dependency_blocks_completion_again() {
    let mut env = TestEnv::new();

    let a = env.create_task("A");
    let b = env.create_task_with_deps("B", &[&a]);

    let a = env.complete(&a);
    env.set_status(&a, Status::InProgress);

    // A is no longer completed, so B is gated again
    let err = env.svc.update_task(b.id, &status_patch(Status::Completed)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TaskError>(),
        Some(TaskError::DependencyNotSatisfied { .. })
    ));
}

#[test]
fn test_gate_applies_to_already_completed_task() {
    let mut env = TestEnv::new();

    let a = env.create_task("A");
    let b = env.create_task_with_deps("B", &[&a]);

    let a = env.complete(&a);
    env.complete(&b);

    // With A regressed, even re-asserting Completed on B must fail: the
    // gate fires whenever the update sets Completed, regardless of B's
    // current status.
    env.set_status(&a, Status::Pending);
    let err = env.svc.update_task(b.id, &status_patch(Status::Completed)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TaskError>(),
        Some(TaskError::DependencyNotSatisfied { .. })
    ));
}

// =============================================================================
// Cascade Delete
// =============================================================================

#[test]
fn test_delete_removes_edges_on_both_sides() {
    let mut env = TestEnv::new();

    let a = env.create_task("A");
    let b = env.create_task_with_deps("B", &[&a]);
    let c = env.create_task_with_deps("C", &[&b]);

    // B sits in the middle of A <- B <- C
    env.svc.delete_task(b.id).unwrap();

    // Tree lookups for B now fail
    let err = env.svc.dependency_tree(b.id).unwrap_err();
    assert_eq!(err.downcast_ref::<TaskError>(), Some(&TaskError::TaskNotFound(b.id)));

    // C lost its only dependency and can complete immediately
    let tree = env.svc.dependency_tree(c.id).unwrap();
    assert!(tree.dependencies.is_empty());
    env.complete(&c);

    // No dangling edge resurrects the pair
    let err = env.svc.remove_dependency(c.id, b.id).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TaskError>(),
        Some(TaskError::EdgeNotFound { .. })
    ));
}

#[test]
fn test_create_with_missing_dependency_is_all_or_nothing() {
    let mut env = TestEnv::new();

    let a = env.create_task("A");
    let before = env.total_count();

    let mut new = taskgraph::NewTask::new("Broken");
    new.depends_on = vec![a.id, 9999];
    let err = env.svc.create_task(&new).unwrap_err();
    assert_eq!(err.downcast_ref::<TaskError>(), Some(&TaskError::TaskNotFound(9999)));

    // Neither the task nor any partial edge survived
    assert_eq!(env.total_count(), before);
}

// =============================================================================
// Dependency Tree
// =============================================================================

#[test]
fn test_tree_of_chain_is_fully_nested() {
    let mut env = TestEnv::new();

    // C depends on B depends on A
    let a = env.create_task("A");
    let b = env.create_task_with_deps("B", &[&a]);
    let c = env.create_task_with_deps("C", &[&b]);

    let tree = env.svc.dependency_tree(c.id).unwrap();
    assert_eq!(tree.task.id, c.id);
    assert_eq!(tree.dependencies.len(), 1);

    let b_node = &tree.dependencies[0];
    assert_eq!(b_node.task.id, b.id);
    assert_eq!(b_node.dependencies.len(), 1);

    let a_node = &b_node.dependencies[0];
    assert_eq!(a_node.task.id, a.id);
    assert!(a_node.dependencies.is_empty());
}

#[test]
fn test_tree_of_leaf_is_empty() {
    let mut env = TestEnv::new();

    let a = env.create_task("A");
    let tree = env.svc.dependency_tree(a.id).unwrap();
    assert_eq!(tree.task.id, a.id);
    assert!(tree.dependencies.is_empty());
}

#[test]
fn test_tree_reflects_removed_dependency() {
    let mut env = TestEnv::new();

    let a = env.create_task("A");
    let b = env.create_task_with_deps("B", &[&a]);

    env.svc.remove_dependency(b.id, a.id).unwrap();

    let tree = env.svc.dependency_tree(b.id).unwrap();
    assert!(tree.dependencies.is_empty());
}
