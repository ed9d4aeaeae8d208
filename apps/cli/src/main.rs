use std::{num::NonZeroU32, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use client_core::{
    HttpClientOptions, HttpTaskClient, ListSnapshot, LoadStatus, MemoryLocation, Notifier,
    ProfileApi, QueryStore, TaskApi, TaskListController,
};
use shared::{
    domain::{Category, Priority, SortColumn, SortDirection, TaskId, TaskStatus, UserId},
    protocol::{NewTask, ProfileUpdate, TaskUpdate},
};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, ClientSettings};

#[derive(Parser, Debug)]
#[command(name = "tasks", about = "Command-line client for the task manager API")]
struct Args {
    /// Overrides the configured API base url.
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    user_id: Option<String>,
    /// Raw cookie header of an authenticated session.
    #[arg(long)]
    session_cookie: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Shows the task list for a query, after applying filter/sort/page changes in order.
    List {
        /// Starting query string, e.g. "status=open&orderBy=due&sortDirection=desc&page=2".
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long, conflicts_with = "all")]
        status: Option<TaskStatus>,
        /// Clears the status filter.
        #[arg(long)]
        all: bool,
        /// Column header to click; repeat to toggle the direction.
        #[arg(long = "sort")]
        sort: Vec<SortColumn>,
        #[arg(long)]
        page: Option<NonZeroU32>,
    },
    Show {
        id: String,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        priority: Priority,
        #[arg(long, default_value = "open")]
        status: TaskStatus,
        #[arg(long)]
        category: Category,
        /// RFC 3339 timestamp.
        #[arg(long)]
        due: Option<DateTime<Utc>>,
    },
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        category: Option<Category>,
        #[arg(long)]
        due: Option<DateTime<Utc>>,
    },
    Profile {
        #[command(subcommand)]
        action: ProfileCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    Update {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        avatar: Option<String>,
    },
    Delete,
}

struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn success(&self, message: &str) {
        println!("{message}");
    }

    fn error(&self, message: &str) {
        eprintln!("error: {message}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(v) = args.base_url {
        settings.api_base_url = v;
    }
    if let Some(v) = args.user_id {
        settings.user_id = Some(v);
    }
    if let Some(v) = args.session_cookie {
        settings.session_cookie = Some(v);
    }

    let client = Arc::new(
        HttpTaskClient::new(
            &settings.api_base_url,
            HttpClientOptions {
                session_cookie: settings.session_cookie.clone(),
                timeout: Some(settings.request_timeout()),
            },
        )
        .context("failed to build API client")?,
    );
    let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier);

    match args.command {
        Command::List {
            query,
            status,
            all,
            sort,
            page,
        } => {
            let user_id = require_user(&settings)?;
            let location = Arc::new(MemoryLocation::with_query(&query));
            let controller = TaskListController::new_with_notifier(
                user_id,
                client,
                location.clone(),
                notifier,
            );

            controller.start().await;
            if all {
                controller.set_status_filter(None).await;
            } else if let Some(status) = status {
                controller.set_status_filter(Some(status)).await;
            }
            for column in sort {
                controller.set_sort_column(column).await;
            }
            if let Some(page) = page {
                controller.set_page(page).await;
            }

            let snapshot = controller.settled().await;
            render_list(&snapshot, &settings, &location.read());
            if snapshot.status == LoadStatus::Failed {
                bail!("task list could not be loaded");
            }
        }
        Command::Show { id } => {
            let task = client
                .get_task(&TaskId::new(id))
                .await
                .map_err(|err| anyhow!(err.user_message()))?;
            let summary = &task.summary;
            println!("{} [{}]", summary.name, summary.id);
            println!("  {}", task.description);
            println!(
                "  priority={} status={} category={}",
                summary.priority,
                summary.status,
                summary.category.map_or("N/A", Category::as_str)
            );
            println!(
                "  due={} created={}",
                format_date(summary.due),
                format_date(Some(summary.created_at))
            );
        }
        Command::Create {
            name,
            description,
            priority,
            status,
            category,
            due,
        } => {
            let new_task = NewTask {
                name,
                description,
                priority,
                status,
                category,
                due,
            };
            let id = client
                .create_task(&new_task)
                .await
                .map_err(|err| anyhow!(err.user_message()))?;
            notifier.success(&format!("New Task Created: {}", new_task.name));
            println!("{id}");
        }
        Command::Update {
            id,
            name,
            description,
            priority,
            status,
            category,
            due,
        } => {
            let update = TaskUpdate {
                name,
                description,
                priority,
                status,
                category,
                due,
            };
            if update.is_empty() {
                bail!("nothing to update; pass at least one field");
            }
            let task_id = TaskId::new(id);
            client
                .update_task(&task_id, &update)
                .await
                .map_err(|err| anyhow!(err.user_message()))?;
            notifier.success(&format!("Task Updated: {task_id}"));
        }
        Command::Profile { action } => {
            let user_id = require_user(&settings)?;
            match action {
                ProfileCommand::Update {
                    username,
                    email,
                    password,
                    avatar,
                } => {
                    let profile = client
                        .update_profile(
                            &user_id,
                            &ProfileUpdate {
                                username,
                                email,
                                password,
                                avatar,
                            },
                        )
                        .await
                        .map_err(|err| anyhow!(err.user_message()))?;
                    notifier.success("Profile Updated");
                    println!("{} <{}>", profile.username, profile.email);
                }
                ProfileCommand::Delete => {
                    let message = client
                        .delete_user(&user_id)
                        .await
                        .map_err(|err| anyhow!(err.user_message()))?;
                    notifier.success(&message);
                }
            }
        }
    }

    Ok(())
}

fn require_user(settings: &ClientSettings) -> Result<UserId> {
    settings
        .user_id
        .clone()
        .map(UserId::new)
        .ok_or_else(|| anyhow!("no user id configured; pass --user-id or set TASKS_USER_ID"))
}

fn render_list(snapshot: &ListSnapshot, settings: &ClientSettings, query: &str) {
    let sort_marker = |column: SortColumn| match (
        snapshot.query.order_by(),
        snapshot.query.effective_sort_direction(),
    ) {
        (Some(current), Some(direction)) if current == column => match direction {
            SortDirection::Asc => " ^",
            SortDirection::Desc => " v",
        },
        _ => "",
    };

    println!(
        "{:<28} {:<12} {:<11} {:<8} {:<16} {:<16}",
        format!("Task{}", sort_marker(SortColumn::Name)),
        format!("Priority{}", sort_marker(SortColumn::Priority)),
        format!("Category{}", sort_marker(SortColumn::Category)),
        format!("Status{}", sort_marker(SortColumn::Status)),
        format!("Due Date{}", sort_marker(SortColumn::Due)),
        format!("Created{}", sort_marker(SortColumn::CreatedAt)),
    );
    for task in snapshot.rows() {
        println!(
            "{:<28} {:<12} {:<11} {:<8} {:<16} {:<16}",
            task.name,
            task.priority,
            task.category.map_or("N/A", Category::as_str),
            task.status,
            format_date(task.due),
            format_date(Some(task.created_at)),
        );
    }

    let pager = snapshot.pagination(settings.page_size);
    println!(
        "page {} of {} ({} tasks)",
        pager.current_page,
        pager.page_count(),
        pager.item_count
    );
    println!("?{query}");
}

fn format_date(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|ts| ts.format("%a %b %d %Y").to_string())
        .unwrap_or_default()
}
