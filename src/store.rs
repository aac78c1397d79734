//! Durable store for tasks and dependency edges, backed by SQLite.
//!
//! The store exposes CRUD and graph traversal primitives only; graph
//! validation lives in [`crate::graph`] and edges must be inserted through
//! its validated path. The `CHECK` constraints below are a schema backstop,
//! not the enforcement point.

use crate::types::{DependencyEdge, Filter, NewTask, Priority, SortKey, SortOrder, Status, Task};
use chrono::{DateTime, Utc};
use eyre::{Context, Result};
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::path::Path;

/// Store handle wrapping a single SQLite connection.
pub struct Store {
    db: Connection,
}

impl Store {
    /// Open (or create) a store at the given database path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
        let db = Connection::open(path).context("Failed to open SQLite database")?;
        let store = Self { db };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an in-memory store. Used by tests and throwaway sessions.
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let store = Self { db };
        store.init_schema()?;
        Ok(store)
    }

    /// Initialize SQLite schema.
    fn init_schema(&self) -> Result<()> {
        self.db
            .pragma_update(None, "foreign_keys", true)
            .context("Failed to enable foreign keys")?;

        self.db
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS tasks (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    description TEXT,
                    status TEXT NOT NULL CHECK (status IN ('pending', 'in_progress', 'completed')),
                    priority TEXT NOT NULL CHECK (priority IN ('low', 'medium', 'high')),
                    user_id INTEGER,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
                CREATE INDEX IF NOT EXISTS idx_tasks_priority ON tasks(priority);

                CREATE TABLE IF NOT EXISTS task_tags (
                    task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                    tag TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_task_tags_task ON task_tags(task_id);
                CREATE INDEX IF NOT EXISTS idx_task_tags_tag ON task_tags(tag);

                CREATE TABLE IF NOT EXISTS task_dependencies (
                    task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                    depends_on_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL,
                    PRIMARY KEY (task_id, depends_on_id),
                    CHECK (task_id != depends_on_id)
                );
                CREATE INDEX IF NOT EXISTS idx_deps_depends_on ON task_dependencies(depends_on_id);
            "#,
            )
            .context("Failed to initialize schema")?;

        Ok(())
    }

    /// Insert a new task, assigning its id and timestamps.
    pub fn insert_task(&mut self, new: &NewTask) -> Result<Task> {
        let now = Utc::now();
        let status = new.status.unwrap_or(Status::Pending);
        let priority = new.priority.unwrap_or(Priority::Medium);

        self.db
            .execute(
                r#"
                INSERT INTO tasks (title, description, status, priority, user_id, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    new.title,
                    new.description,
                    status_to_str(status),
                    priority_to_str(priority),
                    new.user_id,
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ],
            )
            .context("Failed to insert task")?;

        let id = self.db.last_insert_rowid();
        self.replace_tags(id, &new.tags)?;

        Ok(Task {
            id,
            title: new.title.clone(),
            description: new.description.clone(),
            status,
            priority,
            tags: new.tags.clone(),
            user_id: new.user_id,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a task by id.
    pub fn find_task(&self, id: i64) -> Result<Option<Task>> {
        let mut stmt = self.db.prepare(
            r#"
            SELECT id, title, description, status, priority, user_id, created_at, updated_at
            FROM tasks WHERE id = ?
            "#,
        )?;

        let task = stmt.query_row(params![id], row_to_task).optional()?;

        match task {
            Some(mut task) => {
                task.tags = self.load_tags(id)?;
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    /// Persist every mutable field of an existing task, tags included.
    pub fn update_task(&mut self, task: &Task) -> Result<()> {
        self.db
            .execute(
                r#"
                UPDATE tasks
                SET title = ?, description = ?, status = ?, priority = ?, user_id = ?, updated_at = ?
                WHERE id = ?
                "#,
                params![
                    task.title,
                    task.description,
                    status_to_str(task.status),
                    priority_to_str(task.priority),
                    task.user_id,
                    task.updated_at.to_rfc3339(),
                    task.id,
                ],
            )
            .context("Failed to update task")?;

        self.replace_tags(task.id, &task.tags)?;
        Ok(())
    }

    /// Delete a task, cascading its tags and every edge referencing it on
    /// either side. Returns false if the task did not exist.
    pub fn delete_task(&mut self, id: i64) -> Result<bool> {
        // Foreign keys would cascade these anyway; explicit deletes keep the
        // invariant visible and independent of the pragma.
        self.db
            .execute(
                "DELETE FROM task_dependencies WHERE task_id = ? OR depends_on_id = ?",
                params![id, id],
            )
            .context("Failed to delete edges for task")?;
        self.db
            .execute("DELETE FROM task_tags WHERE task_id = ?", params![id])
            .context("Failed to delete tags for task")?;

        let deleted = self
            .db
            .execute("DELETE FROM tasks WHERE id = ?", params![id])
            .context("Failed to delete task")?;

        Ok(deleted > 0)
    }

    /// Look up an edge by its ordered pair.
    pub fn find_edge(&self, task_id: i64, depends_on_id: i64) -> Result<Option<DependencyEdge>> {
        let mut stmt = self.db.prepare(
            r#"
            SELECT task_id, depends_on_id, created_at
            FROM task_dependencies WHERE task_id = ? AND depends_on_id = ?
            "#,
        )?;

        let edge = stmt
            .query_row(params![task_id, depends_on_id], row_to_edge)
            .optional()?;

        Ok(edge)
    }

    /// Insert an edge. Callers must have validated it via [`crate::graph`].
    pub fn insert_edge(&mut self, task_id: i64, depends_on_id: i64) -> Result<DependencyEdge> {
        let now = Utc::now();
        self.db
            .execute(
                "INSERT INTO task_dependencies (task_id, depends_on_id, created_at) VALUES (?, ?, ?)",
                params![task_id, depends_on_id, now.to_rfc3339()],
            )
            .context("Failed to insert edge")?;

        Ok(DependencyEdge {
            task_id,
            depends_on_id,
            created_at: now,
        })
    }

    /// Delete an edge. Returns false if no such edge existed.
    pub fn delete_edge(&mut self, task_id: i64, depends_on_id: i64) -> Result<bool> {
        let deleted = self
            .db
            .execute(
                "DELETE FROM task_dependencies WHERE task_id = ? AND depends_on_id = ?",
                params![task_id, depends_on_id],
            )
            .context("Failed to delete edge")?;

        Ok(deleted > 0)
    }

    /// Edges where the given task is the dependent side.
    pub fn list_outgoing_edges(&self, task_id: i64) -> Result<Vec<DependencyEdge>> {
        let mut stmt = self.db.prepare(
            r#"
            SELECT task_id, depends_on_id, created_at
            FROM task_dependencies WHERE task_id = ?
            ORDER BY created_at ASC
            "#,
        )?;

        let edges = stmt
            .query_map(params![task_id], row_to_edge)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(edges)
    }

    /// Edges where the given task is the prerequisite side (its direct
    /// dependents).
    pub fn list_incoming_edges(&self, task_id: i64) -> Result<Vec<DependencyEdge>> {
        let mut stmt = self.db.prepare(
            r#"
            SELECT task_id, depends_on_id, created_at
            FROM task_dependencies WHERE depends_on_id = ?
            ORDER BY created_at ASC
            "#,
        )?;

        let edges = stmt
            .query_map(params![task_id], row_to_edge)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(edges)
    }

    /// List tasks matching a filter, sorted and paginated, together with the
    /// total match count across all pages. A limit of 0 means no limit.
    pub fn list_tasks(
        &self,
        filter: &Filter,
        sort: SortKey,
        order: SortOrder,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Task>, u64)> {
        let (where_clause, args) = build_where(filter);

        let count_sql = format!("SELECT COUNT(*) FROM tasks{}", where_clause);
        let total: i64 = self
            .db
            .query_row(&count_sql, params_from_iter(args.iter()), |row| row.get(0))
            .context("Failed to count tasks")?;

        let sql = format!(
            r#"
            SELECT id, title, description, status, priority, user_id, created_at, updated_at
            FROM tasks{}
            ORDER BY {}
            LIMIT {} OFFSET {}
            "#,
            where_clause,
            order_clause(sort, order),
            if limit == 0 { -1 } else { limit as i64 },
            offset,
        );

        let mut stmt = self.db.prepare(&sql)?;
        let mut tasks = stmt
            .query_map(params_from_iter(args.iter()), row_to_task)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for task in &mut tasks {
            task.tags = self.load_tags(task.id)?;
        }

        Ok((tasks, total as u64))
    }

    /// Load a task's tags in insertion order. Duplicates are preserved.
    fn load_tags(&self, task_id: i64) -> Result<Vec<String>> {
        let mut stmt = self
            .db
            .prepare("SELECT tag FROM task_tags WHERE task_id = ? ORDER BY rowid")?;
        let tags = stmt
            .query_map(params![task_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(tags)
    }

    fn replace_tags(&mut self, task_id: i64, tags: &[String]) -> Result<()> {
        self.db
            .execute("DELETE FROM task_tags WHERE task_id = ?", params![task_id])?;
        for tag in tags {
            self.db.execute(
                "INSERT INTO task_tags (task_id, tag) VALUES (?, ?)",
                params![task_id, tag],
            )?;
        }
        Ok(())
    }
}

/// Build a WHERE clause and its positional arguments for a filter.
fn build_where(filter: &Filter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(status) = filter.status {
        clauses.push("status = ?".to_string());
        args.push(Box::new(status_to_str(status)));
    }
    if let Some(priority) = filter.priority {
        clauses.push("priority = ?".to_string());
        args.push(Box::new(priority_to_str(priority)));
    }
    if !filter.tags.is_empty() {
        // Match any of the requested tags.
        let subqueries: Vec<&str> = filter
            .tags
            .iter()
            .map(|_| "EXISTS (SELECT 1 FROM task_tags WHERE task_id = tasks.id AND tag = ?)")
            .collect();
        clauses.push(format!("({})", subqueries.join(" OR ")));
        for tag in &filter.tags {
            args.push(Box::new(tag.clone()));
        }
    }
    if let Some(search) = &filter.search {
        clauses.push(
            "(LOWER(title) LIKE ? OR LOWER(COALESCE(description, '')) LIKE ?)".to_string(),
        );
        let term = format!("%{}%", search.to_lowercase());
        args.push(Box::new(term.clone()));
        args.push(Box::new(term));
    }
    if let Some(user_id) = filter.user_id {
        clauses.push("user_id = ?".to_string());
        args.push(Box::new(user_id));
    }

    if clauses.is_empty() {
        (String::new(), args)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), args)
    }
}

/// ORDER BY expression for a sort key. Priority and status sort by domain
/// rank rather than lexically.
fn order_clause(sort: SortKey, order: SortOrder) -> String {
    let column = match sort {
        SortKey::CreatedAt => "created_at".to_string(),
        SortKey::UpdatedAt => "updated_at".to_string(),
        SortKey::Title => "title".to_string(),
        SortKey::Priority => {
            "CASE priority WHEN 'low' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END".to_string()
        }
        SortKey::Status => {
            "CASE status WHEN 'pending' THEN 0 WHEN 'in_progress' THEN 1 ELSE 2 END".to_string()
        }
    };
    let direction = match order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };
    // Secondary key keeps paging deterministic when the primary key ties.
    format!("{} {}, id {}", column, direction, direction)
}

fn status_to_str(status: Status) -> &'static str {
    match status {
        Status::Pending => "pending",
        Status::InProgress => "in_progress",
        Status::Completed => "completed",
    }
}

fn status_from_str(s: &str) -> Status {
    match s {
        "in_progress" => Status::InProgress,
        "completed" => Status::Completed,
        _ => Status::Pending,
    }
}

fn priority_to_str(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "low",
        Priority::Medium => "medium",
        Priority::High => "high",
    }
}

fn priority_from_str(s: &str) -> Priority {
    match s {
        "low" => Priority::Low,
        "high" => Priority::High,
        _ => Priority::Medium,
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Convert a database row to a Task. Tags are loaded separately.
fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    let status_str: String = row.get(3)?;
    let priority_str: String = row.get(4)?;
    let created_at_str: String = row.get(6)?;
    let updated_at_str: String = row.get(7)?;

    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: status_from_str(&status_str),
        priority: priority_from_str(&priority_str),
        tags: vec![],
        user_id: row.get(5)?,
        created_at: parse_timestamp(&created_at_str),
        updated_at: parse_timestamp(&updated_at_str),
    })
}

fn row_to_edge(row: &rusqlite::Row) -> rusqlite::Result<DependencyEdge> {
    let created_at_str: String = row.get(2)?;
    Ok(DependencyEdge {
        task_id: row.get(0)?,
        depends_on_id: row.get(1)?,
        created_at: parse_timestamp(&created_at_str),
    })
}
