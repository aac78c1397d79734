//! taskgraph CLI - task tracking with dependency graph and cached queries.

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::path::PathBuf;
use taskgraph::{
    CacheCoordinator, DependencyTree, Filter, MemoryCache, NewTask, Priority, ServiceConfig,
    SortKey, SortOrder, Status, Store, Task, TaskPatch, TaskService,
};

mod cli;

use cli::{Cli, Command, DepCommand};

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskgraph")
        .join("tasks.db")
}

fn parse_status(s: &str) -> Result<Status> {
    match s {
        "pending" => Ok(Status::Pending),
        "in_progress" => Ok(Status::InProgress),
        "completed" => Ok(Status::Completed),
        _ => eyre::bail!("unknown status '{}' (expected pending, in_progress, completed)", s),
    }
}

fn parse_priority(s: &str) -> Result<Priority> {
    match s {
        "low" => Ok(Priority::Low),
        "medium" => Ok(Priority::Medium),
        "high" => Ok(Priority::High),
        _ => eyre::bail!("unknown priority '{}' (expected low, medium, high)", s),
    }
}

fn parse_sort(s: &str) -> Result<SortKey> {
    match s {
        "created_at" => Ok(SortKey::CreatedAt),
        "updated_at" => Ok(SortKey::UpdatedAt),
        "title" => Ok(SortKey::Title),
        "priority" => Ok(SortKey::Priority),
        "status" => Ok(SortKey::Status),
        _ => eyre::bail!("unknown sort key '{}'", s),
    }
}

fn format_status(status: Status) -> ColoredString {
    match status {
        Status::Pending => "pending".yellow(),
        Status::InProgress => "in_progress".blue(),
        Status::Completed => "completed".green(),
    }
}

fn format_priority(priority: Priority) -> ColoredString {
    match priority {
        Priority::Low => "low".dimmed(),
        Priority::Medium => "medium".normal(),
        Priority::High => "high".red(),
    }
}

fn print_task_line(task: &Task) {
    let tags = if task.tags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", task.tags.join(", "))
    };
    println!(
        "#{} {} {} {}{}",
        task.id.to_string().cyan(),
        format_status(task.status),
        format_priority(task.priority),
        task.title,
        tags.dimmed()
    );
}

fn print_tree(tree: &DependencyTree, indent: usize) {
    println!(
        "{}#{} {} {}",
        "  ".repeat(indent),
        tree.task.id.to_string().cyan(),
        format_status(tree.task.status),
        tree.task.title
    );
    for dep in &tree.dependencies {
        print_tree(dep, indent + 1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let db_path = cli.db.clone().unwrap_or_else(default_db_path);
    let store = Store::open(&db_path).context("Failed to open task database")?;
    let cache = CacheCoordinator::new(Box::new(MemoryCache::new()));
    let mut svc = TaskService::new(store, cache, ServiceConfig::default());

    match cli.command {
        Command::Create {
            title,
            description,
            priority,
            tags,
            user,
            depends_on,
        } => {
            let new = NewTask {
                title,
                description,
                status: None,
                priority: priority.as_deref().map(parse_priority).transpose()?,
                tags: tags.unwrap_or_default(),
                user_id: user,
                depends_on: depends_on.unwrap_or_default(),
            };
            let task = svc.create_task(&new).context("Failed to create task")?;
            println!("{} Created: #{} {}", "✓".green(), task.id.to_string().cyan(), task.title);
        }

        Command::Get { id } => {
            let task = svc.get_task(id).context("Failed to get task")?;
            println!("{}: #{}", "Id".bold(), task.id.to_string().cyan());
            println!("{}: {}", "Title".bold(), task.title);
            println!("{}: {}", "Status".bold(), format_status(task.status));
            println!("{}: {}", "Priority".bold(), format_priority(task.priority));
            if !task.tags.is_empty() {
                println!("{}: {}", "Tags".bold(), task.tags.join(", "));
            }
            if let Some(desc) = &task.description {
                println!("{}: {}", "Description".bold(), desc);
            }
            if let Some(user_id) = task.user_id {
                println!("{}: {}", "User".bold(), user_id);
            }
            println!("{}: {}", "Created".bold(), task.created_at);
            println!("{}: {}", "Updated".bold(), task.updated_at);
        }

        Command::List {
            status,
            priority,
            tags,
            search,
            user,
            sort,
            asc,
            offset,
            limit,
        } => {
            let mut filter = Filter::new();
            filter.status = status.as_deref().map(parse_status).transpose()?;
            filter.priority = priority.as_deref().map(parse_priority).transpose()?;
            filter.tags = tags.unwrap_or_default();
            filter.search = search;
            filter.user_id = user;

            let order = if asc { SortOrder::Asc } else { SortOrder::Desc };
            let page = svc
                .list_tasks(&filter, parse_sort(&sort)?, order, offset, limit)
                .context("Failed to list tasks")?;

            if page.tasks.is_empty() {
                println!("{}", "No tasks found".dimmed());
            } else {
                for task in &page.tasks {
                    print_task_line(task);
                }
                println!(
                    "{}",
                    format!("page {}/{} ({} total)", page.page, page.total_pages, page.total).dimmed()
                );
            }
        }

        Command::Update {
            id,
            title,
            description,
            clear_description,
            status,
            priority,
            tags,
        } => {
            let patch = TaskPatch {
                title,
                description: if clear_description {
                    Some(None)
                } else {
                    description.map(Some)
                },
                status: status.as_deref().map(parse_status).transpose()?,
                priority: priority.as_deref().map(parse_priority).transpose()?,
                tags,
            };
            if patch.is_empty() {
                eyre::bail!("nothing to update");
            }
            let task = svc.update_task(id, &patch).context("Failed to update task")?;
            println!("{} Updated: #{} {}", "✓".green(), task.id.to_string().cyan(), task.title);
        }

        Command::Start { id } => {
            let patch = TaskPatch {
                status: Some(Status::InProgress),
                ..Default::default()
            };
            let task = svc.update_task(id, &patch).context("Failed to start task")?;
            println!("{} Started: #{} {}", "→".blue(), task.id.to_string().cyan(), task.title);
        }

        Command::Done { id } => {
            let patch = TaskPatch {
                status: Some(Status::Completed),
                ..Default::default()
            };
            let task = svc.update_task(id, &patch).context("Failed to complete task")?;
            println!("{} Completed: #{} {}", "✓".green(), task.id.to_string().cyan(), task.title);
        }

        Command::Delete { id } => {
            svc.delete_task(id).context("Failed to delete task")?;
            println!("{} Deleted: #{}", "✓".green(), id.to_string().cyan());
        }

        Command::Dep { action } => match action {
            DepCommand::Add {
                task_id,
                depends_on_id,
            } => {
                svc.add_dependency(task_id, depends_on_id)
                    .context("Failed to add dependency")?;
                println!(
                    "{} #{} now depends on #{}",
                    "✓".green(),
                    task_id.to_string().cyan(),
                    depends_on_id.to_string().cyan()
                );
            }
            DepCommand::Rm {
                task_id,
                depends_on_id,
            } => {
                svc.remove_dependency(task_id, depends_on_id)
                    .context("Failed to remove dependency")?;
                println!(
                    "{} #{} no longer depends on #{}",
                    "✓".green(),
                    task_id.to_string().cyan(),
                    depends_on_id.to_string().cyan()
                );
            }
        },

        Command::Tree { id } => {
            let tree = svc.dependency_tree(id).context("Failed to build dependency tree")?;
            print_tree(&tree, 0);
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    info!("Command: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
