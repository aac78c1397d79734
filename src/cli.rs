//! CLI argument parsing for taskgraph.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tg",
    about = "Task tracking with dependency graph and cached queries",
    version
)]
pub struct Cli {
    /// Path to the task database (default: platform data dir)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a new task
    Create {
        /// Task title
        title: String,

        /// Description
        #[arg(short = 'D', long)]
        description: Option<String>,

        /// Priority (low, medium, high)
        #[arg(short, long)]
        priority: Option<String>,

        /// Tags (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        tags: Option<Vec<String>>,

        /// Owning user id
        #[arg(short, long)]
        user: Option<i64>,

        /// Ids of tasks this task depends on (comma-separated)
        #[arg(long, value_delimiter = ',')]
        depends_on: Option<Vec<i64>>,
    },

    /// Get a task by id
    Get {
        /// Task id
        id: i64,
    },

    /// List tasks
    List {
        /// Filter by status (pending, in_progress, completed)
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by priority (low, medium, high)
        #[arg(short, long)]
        priority: Option<String>,

        /// Filter by tags, matching any (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        tags: Option<Vec<String>>,

        /// Substring search over title and description
        #[arg(long)]
        search: Option<String>,

        /// Filter by owning user id
        #[arg(short, long)]
        user: Option<i64>,

        /// Sort key (created_at, updated_at, title, priority, status)
        #[arg(long, default_value = "created_at")]
        sort: String,

        /// Sort ascending instead of descending
        #[arg(long)]
        asc: bool,

        /// Skip the first N matches
        #[arg(long, default_value = "0")]
        offset: u64,

        /// Page size (0 = everything)
        #[arg(long, default_value = "100")]
        limit: u64,
    },

    /// Update fields of a task
    Update {
        /// Task id
        id: i64,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New description
        #[arg(short = 'D', long)]
        description: Option<String>,

        /// Clear the description
        #[arg(long, conflicts_with = "description")]
        clear_description: bool,

        /// New status (pending, in_progress, completed)
        #[arg(short, long)]
        status: Option<String>,

        /// New priority (low, medium, high)
        #[arg(short, long)]
        priority: Option<String>,

        /// Replace tags (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        tags: Option<Vec<String>>,
    },

    /// Start working on a task (set status to in_progress)
    Start {
        /// Task id
        id: i64,
    },

    /// Mark a task completed (fails while dependencies are incomplete)
    Done {
        /// Task id
        id: i64,
    },

    /// Delete a task, removing all edges that reference it
    Delete {
        /// Task id
        id: i64,
    },

    /// Manage dependencies
    Dep {
        #[command(subcommand)]
        action: DepCommand,
    },

    /// Show a task's dependency tree
    Tree {
        /// Task id
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum DepCommand {
    /// Make a task depend on another
    Add {
        /// Dependent task id
        task_id: i64,

        /// Prerequisite task id (must complete first)
        depends_on_id: i64,
    },

    /// Remove a dependency
    Rm {
        /// Dependent task id
        task_id: i64,

        /// Prerequisite task id
        depends_on_id: i64,
    },
}
