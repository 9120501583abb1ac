use std::sync::Arc;

use crate::activity::ActivityLog;
use crate::models::{ActivityEntry, AppSettings};
use crate::settings::SettingsStore;
use crate::state::TaskStore;
use crate::storage::{Storage, StorageError};

#[cfg(feature = "cli")]
use std::future::Future;
#[cfg(feature = "cli")]
use std::io::Write;
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use std::time::Duration;

#[cfg(feature = "cli")]
use anyhow::{anyhow, bail};
#[cfg(feature = "cli")]
use chrono::Local;

#[cfg(feature = "cli")]
use crate::filter::{SortKey, StatusFilter};
#[cfg(feature = "cli")]
use crate::models::{Priority, Task, TaskId};
#[cfg(feature = "cli")]
use crate::transfer::{ImportFile, ImportFormat, ImportMode};

/// Outcome of one store operation. `error` may be set alongside `ok == true` to carry a
/// partial-success warning.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CommandResult<T> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

pub(crate) fn ok<T>(data: T) -> CommandResult<T> {
    CommandResult {
        ok: true,
        data: Some(data),
        error: None,
    }
}

pub(crate) fn ok_with_warning<T>(data: T, warning: String) -> CommandResult<T> {
    CommandResult {
        ok: true,
        data: Some(data),
        error: Some(warning),
    }
}

pub(crate) fn err<T>(message: &str) -> CommandResult<T> {
    CommandResult {
        ok: false,
        data: None,
        error: Some(message.to_string()),
    }
}

fn storage_result<T>(result: Result<T, StorageError>) -> CommandResult<T> {
    match result {
        Ok(data) => ok(data),
        Err(error) => err(&format!("storage error: {error}")),
    }
}

/// Everything a front end needs, opened over one data directory.
pub struct AppContext {
    pub store: TaskStore,
    pub activity: Arc<ActivityLog>,
    pub settings: SettingsStore,
}

impl AppContext {
    pub fn open(storage: Storage) -> Self {
        if let Err(error) = storage.ensure_dirs() {
            log::warn!(
                "data dir unavailable path={} error={error}",
                storage.root().display()
            );
        }
        let activity = Arc::new(ActivityLog::open(storage.clone()));
        let store = TaskStore::open(storage.clone(), activity.clone());
        let settings = SettingsStore::load(storage);
        Self {
            store,
            activity,
            settings,
        }
    }

    pub fn activity_entries(&self) -> Vec<ActivityEntry> {
        self.activity.entries()
    }

    pub fn clear_activity(&self) -> CommandResult<()> {
        storage_result(self.activity.clear())
    }

    pub fn toggle_dark_mode(&self) -> CommandResult<AppSettings> {
        storage_result(self.settings.toggle_dark_mode())
    }

    pub fn set_dark_mode(&self, value: bool) -> CommandResult<AppSettings> {
        storage_result(self.settings.set_dark_mode(value))
    }
}

#[cfg(feature = "cli")]
const DELETION_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FileFormat {
    Json,
    Csv,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DarkMode {
    On,
    Off,
    Toggle,
}

#[cfg(feature = "cli")]
#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Show tasks, optionally searched, filtered and sorted.
    List {
        #[arg(long, default_value = "all")]
        filter: StatusFilter,
        #[arg(long, default_value = "date")]
        sort: SortKey,
        #[arg(long)]
        search: Option<String>,
    },
    /// Create a task.
    Add {
        title: String,
        #[arg(long, default_value = "medium")]
        priority: Priority,
    },
    /// Change a task's title and/or priority.
    Edit {
        id: TaskId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
    },
    /// Flip a task between active and completed.
    Toggle { id: TaskId },
    /// Delete a task after a short countdown (Ctrl-C undoes it), or at once with --now.
    Delete {
        id: TaskId,
        #[arg(long)]
        now: bool,
    },
    Stats,
    /// Show recent activity.
    Activity {
        #[arg(long)]
        clear: bool,
    },
    /// Write all tasks to a file in DIR (default: current directory).
    Export {
        #[arg(value_enum)]
        format: FileFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Load tasks from a .json or .csv file.
    Import {
        file: PathBuf,
        /// Discard the current list instead of merging.
        #[arg(long)]
        replace: bool,
    },
    Settings {
        #[arg(long, value_enum)]
        dark_mode: Option<DarkMode>,
    },
}

/// Runs one CLI command against `ctx`, writing human-readable output to `out`.
#[cfg(feature = "cli")]
pub async fn execute(ctx: &AppContext, command: Command, out: &mut dyn Write) -> anyhow::Result<()> {
    log::debug!("command {command:?}");
    match command {
        Command::List {
            filter,
            sort,
            search,
        } => {
            ctx.store.set_filter(filter);
            ctx.store.set_sort(sort);
            ctx.store.set_search_query(search.as_deref().unwrap_or(""));
            let tasks = ctx.store.filtered_tasks();
            if tasks.is_empty() {
                writeln!(out, "no tasks")?;
            }
            for task in &tasks {
                writeln!(out, "{}", format_task(task))?;
            }
        }
        Command::Add { title, priority } => {
            let task = expect_ok(ctx.store.add_task(&title, priority), out)?;
            writeln!(out, "added {}", format_task(&task))?;
        }
        Command::Edit {
            id,
            title,
            priority,
        } => {
            let task = expect_ok(ctx.store.edit_task(id, title.as_deref(), priority), out)?;
            writeln!(out, "updated {}", format_task(&task))?;
        }
        Command::Toggle { id } => {
            let task = expect_ok(ctx.store.toggle_task(id), out)?;
            writeln!(out, "{}", format_task(&task))?;
        }
        Command::Delete { id, now: true } => {
            let task = expect_ok(ctx.store.delete_task(id), out)?;
            writeln!(out, "deleted \"{}\"", task.title)?;
        }
        Command::Delete { id, now: false } => {
            let interrupt = async {
                if let Err(error) = tokio::signal::ctrl_c().await {
                    log::warn!("ctrl-c handler unavailable error={error}");
                    std::future::pending::<()>().await;
                }
            };
            wait_for_deletion(&ctx.store, id, out, interrupt).await?;
        }
        Command::Stats => {
            let stats = ctx.store.stats();
            writeln!(
                out,
                "total: {}  active: {}  completed: {}  done: {}%",
                stats.total, stats.active, stats.completed, stats.percentage
            )?;
        }
        Command::Activity { clear: true } => {
            expect_ok(ctx.clear_activity(), out)?;
            writeln!(out, "activity cleared")?;
        }
        Command::Activity { clear: false } => {
            let entries = ctx.activity_entries();
            if entries.is_empty() {
                writeln!(out, "no activity")?;
            }
            for entry in entries {
                writeln!(
                    out,
                    "{}  {:<11} {}",
                    entry.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
                    entry.action.as_str(),
                    entry.task_title
                )?;
            }
        }
        Command::Export { format, out: dir } => {
            let result = match format {
                FileFormat::Json => ctx.store.export_json(),
                FileFormat::Csv => ctx.store.export_csv(),
            };
            let artifact = expect_ok(result, out)?;
            let path = artifact.write_to(&dir.unwrap_or_else(|| PathBuf::from(".")))?;
            writeln!(out, "exported to {}", path.display())?;
        }
        Command::Import { file, replace } => {
            let format = ImportFormat::from_file_name(&file.to_string_lossy())
                .ok_or_else(|| anyhow!("unsupported file type; expected a .json or .csv file"))?;
            let import = ImportFile::from_path(&file).await?;
            let mode = if replace {
                ImportMode::Replace
            } else {
                ImportMode::Merge
            };
            let count = expect_ok(ctx.store.import_tasks(&import, format, mode).await, out)?;
            writeln!(out, "imported {count} tasks")?;
        }
        Command::Settings { dark_mode } => {
            let settings = match dark_mode {
                None => ctx.settings.settings(),
                Some(DarkMode::On) => expect_ok(ctx.set_dark_mode(true), out)?,
                Some(DarkMode::Off) => expect_ok(ctx.set_dark_mode(false), out)?,
                Some(DarkMode::Toggle) => expect_ok(ctx.toggle_dark_mode(), out)?,
            };
            let mode = if settings.dark_mode { "on" } else { "off" };
            writeln!(out, "dark mode: {mode}")?;
        }
    }
    Ok(())
}

/// Starts the grace-period delete and waits it out, printing the seconds left.
/// Resolving `interrupt` first cancels the delete. Returns whether the task was removed.
#[cfg(feature = "cli")]
pub async fn wait_for_deletion(
    store: &TaskStore,
    id: TaskId,
    out: &mut dyn Write,
    interrupt: impl Future<Output = ()>,
) -> anyhow::Result<bool> {
    expect_ok(store.start_deletion(id), out)?;
    tokio::pin!(interrupt);

    let mut shown = None;
    while store.is_deletion_pending(id) {
        let left = store.deletion_time_left(id);
        if shown != Some(left) {
            writeln!(out, "deleting in {left}s (Ctrl-C to undo)")?;
            out.flush()?;
            shown = Some(left);
        }
        tokio::select! {
            _ = &mut interrupt => {
                store.cancel_deletion(id);
                writeln!(out, "deletion cancelled")?;
                return Ok(false);
            }
            _ = tokio::time::sleep(DELETION_POLL_INTERVAL) => {}
        }
    }

    if store.task(id).is_some() {
        bail!("task {id} could not be deleted");
    }
    writeln!(out, "deleted {id}")?;
    Ok(true)
}

#[cfg(feature = "cli")]
fn expect_ok<T>(result: CommandResult<T>, out: &mut dyn Write) -> anyhow::Result<T> {
    if !result.ok {
        bail!(result.error.unwrap_or_else(|| "command failed".to_string()));
    }
    if let Some(warning) = result.error {
        writeln!(out, "warning: {warning}")?;
    }
    result.data.ok_or_else(|| anyhow!("command returned no data"))
}

#[cfg(feature = "cli")]
fn format_task(task: &Task) -> String {
    format!(
        "{} [{}] {:<6} {}",
        task.id,
        if task.completed { "x" } else { " " },
        task.priority.as_str(),
        task.title
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TASKS_KEY;
    use std::fs;

    struct TestCtx {
        root: tempfile::TempDir,
        app: AppContext,
    }

    impl TestCtx {
        /// Opens over an empty saved list so no samples are seeded.
        fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            let storage = Storage::new(root.path().to_path_buf());
            storage.set_item(TASKS_KEY, &Vec::<crate::models::Task>::new()).unwrap();
            let app = AppContext::open(storage);
            Self { root, app }
        }

        fn root_path(&self) -> &std::path::Path {
            self.root.path()
        }
    }

    #[test]
    fn result_helpers_set_flags() {
        let done = ok(3);
        assert!(done.ok);
        assert_eq!(done.data, Some(3));
        assert_eq!(done.error, None);

        let partial = ok_with_warning(2, "skipped one".to_string());
        assert!(partial.ok);
        assert_eq!(partial.error.as_deref(), Some("skipped one"));

        let failed: CommandResult<i32> = err("task not found");
        assert!(!failed.ok);
        assert_eq!(failed.data, None);
    }

    #[test]
    fn command_result_serializes_with_plain_field_names() {
        let value = serde_json::to_value(ok(1)).unwrap();
        assert_eq!(value, serde_json::json!({ "ok": true, "data": 1, "error": null }));
    }

    #[test]
    fn open_seeds_samples_in_a_fresh_directory() {
        let root = tempfile::tempdir().unwrap();
        let app = AppContext::open(Storage::new(root.path().join("nested")));
        assert!(!app.store.tasks().is_empty());
        assert!(root.path().join("nested").join("tasks-app-tasks.json").exists());
    }

    #[test]
    fn activity_and_settings_go_through_storage() {
        let ctx = TestCtx::new();
        ctx.app.store.add_task("Logged", crate::models::Priority::Medium);
        assert_eq!(ctx.app.activity_entries().len(), 1);
        assert!(ctx.app.clear_activity().ok);
        assert!(ctx.app.activity_entries().is_empty());

        assert!(ctx.app.toggle_dark_mode().data.unwrap().dark_mode);
        assert!(!ctx.app.set_dark_mode(false).data.unwrap().dark_mode);

        let settings_path = ctx.root_path().join("tasks-app-settings.json");
        fs::remove_file(&settings_path).unwrap();
        fs::create_dir_all(&settings_path).unwrap();
        let failed = ctx.app.set_dark_mode(true);
        assert!(!failed.ok);
        assert!(!ctx.app.settings.settings().dark_mode);
    }

    #[cfg(feature = "cli")]
    mod cli {
        use super::*;

        async fn run(ctx: &TestCtx, command: Command) -> anyhow::Result<String> {
            let mut out = Vec::new();
            execute(&ctx.app, command, &mut out).await?;
            Ok(String::from_utf8(out).unwrap())
        }

        #[tokio::test]
        async fn add_list_toggle_and_stats() {
            let ctx = TestCtx::new();
            let added = run(
                &ctx,
                Command::Add {
                    title: "Write report".to_string(),
                    priority: Priority::High,
                },
            )
            .await
            .unwrap();
            assert!(added.starts_with("added "));
            assert!(added.contains("high   Write report"));
            let id = ctx.app.store.tasks()[0].id;

            run(&ctx, Command::Toggle { id }).await.unwrap();
            let listed = run(
                &ctx,
                Command::List {
                    filter: StatusFilter::Completed,
                    sort: SortKey::Name,
                    search: Some("report".to_string()),
                },
            )
            .await
            .unwrap();
            assert_eq!(listed, format!("{id} [x] high   Write report\n"));

            let stats = run(&ctx, Command::Stats).await.unwrap();
            assert_eq!(stats, "total: 1  active: 0  completed: 1  done: 100.0%\n");
        }

        #[tokio::test]
        async fn failures_become_errors() {
            let ctx = TestCtx::new();
            let blank = run(
                &ctx,
                Command::Add {
                    title: "  ".to_string(),
                    priority: Priority::Medium,
                },
            )
            .await;
            assert_eq!(blank.unwrap_err().to_string(), "task title cannot be empty");

            let missing = run(&ctx, Command::Toggle { id: 42 }).await;
            assert_eq!(missing.unwrap_err().to_string(), "task not found");

            let empty_export = run(
                &ctx,
                Command::Export {
                    format: FileFormat::Json,
                    out: None,
                },
            )
            .await;
            assert_eq!(empty_export.unwrap_err().to_string(), "no tasks to export");
        }

        #[tokio::test]
        async fn export_then_import_replace() {
            let ctx = TestCtx::new();
            ctx.app.store.add_task("Carry over", Priority::Low);
            let out_dir = ctx.root_path().join("exports");

            let exported = run(
                &ctx,
                Command::Export {
                    format: FileFormat::Json,
                    out: Some(out_dir.clone()),
                },
            )
            .await
            .unwrap();
            assert!(exported.starts_with("exported to "));
            let file = fs::read_dir(&out_dir).unwrap().next().unwrap().unwrap().path();

            ctx.app.store.add_task("Dropped", Priority::Medium);
            let imported = run(&ctx, Command::Import { file, replace: true }).await.unwrap();
            assert_eq!(imported, "imported 1 tasks\n");
            let tasks = ctx.app.store.tasks();
            assert_eq!(tasks.len(), 1);
            assert_eq!(tasks[0].title, "Carry over");
            assert_eq!(tasks[0].priority, Priority::Low);
        }

        #[tokio::test]
        async fn import_rejects_unknown_extension() {
            let ctx = TestCtx::new();
            let path = ctx.root_path().join("tasks.txt");
            fs::write(&path, "x").unwrap();
            let result = run(
                &ctx,
                Command::Import {
                    file: path,
                    replace: false,
                },
            )
            .await;
            assert!(result.unwrap_err().to_string().contains("unsupported file type"));
        }

        #[tokio::test]
        async fn delete_now_and_settings() {
            let ctx = TestCtx::new();
            let task = ctx.app.store.add_task("Bin", Priority::Medium).data.unwrap();
            let deleted = run(&ctx, Command::Delete { id: task.id, now: true }).await.unwrap();
            assert_eq!(deleted, "deleted \"Bin\"\n");
            assert!(ctx.app.store.tasks().is_empty());

            let shown = run(&ctx, Command::Settings { dark_mode: None }).await.unwrap();
            assert_eq!(shown, "dark mode: off\n");
            let toggled = run(
                &ctx,
                Command::Settings {
                    dark_mode: Some(DarkMode::Toggle),
                },
            )
            .await
            .unwrap();
            assert_eq!(toggled, "dark mode: on\n");
        }

        #[tokio::test(start_paused = true)]
        async fn wait_for_deletion_counts_down_to_removal() {
            let ctx = TestCtx::new();
            let task = ctx.app.store.add_task("Later", Priority::Medium).data.unwrap();
            let mut out = Vec::new();

            let removed = wait_for_deletion(&ctx.app.store, task.id, &mut out, std::future::pending())
                .await
                .unwrap();
            assert!(removed);
            assert!(ctx.app.store.task(task.id).is_none());

            let text = String::from_utf8(out).unwrap();
            let lines: Vec<&str> = text.lines().collect();
            assert_eq!(lines.first(), Some(&"deleting in 5s (Ctrl-C to undo)"));
            assert!(lines.contains(&"deleting in 1s (Ctrl-C to undo)"));
            assert_eq!(lines.last(), Some(&format!("deleted {}", task.id).as_str()));
        }

        #[tokio::test(start_paused = true)]
        async fn wait_for_deletion_interrupt_cancels() {
            let ctx = TestCtx::new();
            let task = ctx.app.store.add_task("Keep", Priority::Medium).data.unwrap();
            let mut out = Vec::new();

            let interrupt = tokio::time::sleep(Duration::from_millis(2500));
            let removed = wait_for_deletion(&ctx.app.store, task.id, &mut out, interrupt)
                .await
                .unwrap();
            assert!(!removed);
            assert!(!ctx.app.store.is_deletion_pending(task.id));

            tokio::time::sleep(Duration::from_secs(10)).await;
            assert!(ctx.app.store.task(task.id).is_some());
            assert!(String::from_utf8(out).unwrap().ends_with("deletion cancelled\n"));
        }

        #[tokio::test]
        async fn activity_lists_newest_first_and_clears() {
            let ctx = TestCtx::new();
            ctx.app.store.add_task("First", Priority::Medium);
            ctx.app.store.add_task("Second", Priority::Medium);

            let listed = run(&ctx, Command::Activity { clear: false }).await.unwrap();
            let lines: Vec<&str> = listed.lines().collect();
            assert_eq!(lines.len(), 2);
            assert!(lines[0].ends_with("created     Second"));

            assert_eq!(
                run(&ctx, Command::Activity { clear: true }).await.unwrap(),
                "activity cleared\n"
            );
            assert_eq!(
                run(&ctx, Command::Activity { clear: false }).await.unwrap(),
                "no activity\n"
            );
        }
    }
}
