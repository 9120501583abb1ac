use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::Local;

use crate::activity::ActivitySink;
use crate::commands::{err, ok, ok_with_warning, CommandResult};
use crate::filter::{apply_filters, calculate_stats, SortKey, StatusFilter, TaskStats};
use crate::models::{now, sample_tasks, ActivityAction, Priority, Task, TaskId};
use crate::scheduler::{DeletionScheduler, ExpireCallback};
use crate::storage::{Storage, StorageError, TASKS_KEY};
use crate::task;
use crate::transfer::{
    export_csv, export_json, import_file, ExportArtifact, ImportFile, ImportFormat, ImportMode,
};

/// How the list is currently being looked at. Not persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub filter: StatusFilter,
    pub sort: SortKey,
    pub search_query: String,
}

/// Owner of the task list. Cloning hands out another handle to the same store.
#[derive(Clone)]
pub struct TaskStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    storage: Storage,
    activity: Arc<dyn ActivitySink>,
    scheduler: DeletionScheduler,
    data: Mutex<TaskData>,
}

#[derive(Debug, Default)]
struct TaskData {
    tasks: Vec<Task>,
    view: ViewState,
}

impl TaskStore {
    /// Loads the stored list. The first launch (no tasks saved yet) seeds a few samples.
    pub fn open(storage: Storage, activity: Arc<dyn ActivitySink>) -> Self {
        let tasks = if storage.has_item(TASKS_KEY) {
            storage.get_item(TASKS_KEY, Vec::new())
        } else {
            let seeded = sample_tasks();
            match storage.set_item(TASKS_KEY, &seeded) {
                Ok(()) => log::info!("seeded sample tasks count={}", seeded.len()),
                Err(error) => log::warn!("sample tasks not saved error={error}"),
            }
            seeded
        };
        log::debug!("task store opened tasks={}", tasks.len());
        Self {
            inner: Arc::new(StoreInner {
                storage,
                activity,
                scheduler: DeletionScheduler::new(),
                data: Mutex::new(TaskData {
                    tasks,
                    view: ViewState::default(),
                }),
            }),
        }
    }

    fn data(&self) -> MutexGuard<'_, TaskData> {
        self.inner.data.lock().expect("state poisoned")
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.data().tasks.clone()
    }

    pub fn task(&self, id: TaskId) -> Option<Task> {
        task::find_task_by_id(&self.data().tasks, id).cloned()
    }

    pub fn add_task(&self, title: &str, priority: Priority) -> CommandResult<Task> {
        let Some(mut created) = task::create_task(title, priority) else {
            return err("task title cannot be empty");
        };
        {
            let mut guard = self.data();
            created.id = task::unique_id(&guard.tasks, created.id);
            let next = task::add_task_to_list(&guard.tasks, created.clone());
            if let Err(error) = self.commit(&mut guard, next) {
                return storage_err(error);
            }
        }
        log::info!("task created id={} priority={}", created.id, created.priority.as_str());
        self.inner.activity.record(ActivityAction::Created, &created.title);
        ok(created)
    }

    pub fn edit_task(&self, id: TaskId, title: Option<&str>, priority: Option<Priority>) -> CommandResult<Task> {
        let updated = {
            let mut guard = self.data();
            let Some(current) = task::find_task_by_id(&guard.tasks, id) else {
                return err("task not found");
            };
            let Some(updated) = task::update_task(current, title, priority) else {
                return err("task title cannot be empty");
            };
            let next = task::update_task_in_list(&guard.tasks, &updated);
            if let Err(error) = self.commit(&mut guard, next) {
                return storage_err(error);
            }
            updated
        };
        log::info!("task edited id={id}");
        self.inner.activity.record(ActivityAction::Edited, &updated.title);
        ok(updated)
    }

    pub fn toggle_task(&self, id: TaskId) -> CommandResult<Task> {
        let toggled = {
            let mut guard = self.data();
            let Some(current) = task::find_task_by_id(&guard.tasks, id) else {
                return err("task not found");
            };
            let toggled = task::toggle_task(current);
            let next = task::update_task_in_list(&guard.tasks, &toggled);
            if let Err(error) = self.commit(&mut guard, next) {
                return storage_err(error);
            }
            toggled
        };
        log::info!("task toggled id={id} completed={}", toggled.completed);
        let action = if toggled.completed {
            ActivityAction::Completed
        } else {
            ActivityAction::Uncompleted
        };
        self.inner.activity.record(action, &toggled.title);
        ok(toggled)
    }

    /// Removes the task right away, dropping any countdown it had.
    pub fn delete_task(&self, id: TaskId) -> CommandResult<Task> {
        self.inner.scheduler.cancel(id);
        match remove_now(&self.inner, id) {
            Ok(Some(removed)) => ok(removed),
            Ok(None) => err("task not found"),
            Err(error) => storage_err(error),
        }
    }

    /// Marks the task for removal after the grace period; returns the seconds left.
    pub fn start_deletion(&self, id: TaskId) -> CommandResult<u32> {
        if self.task(id).is_none() {
            return err("task not found");
        }
        let weak: Weak<StoreInner> = Arc::downgrade(&self.inner);
        let on_expire: ExpireCallback = Arc::new(move |task_id| {
            // The store may have been dropped while the countdown ran.
            let Some(inner) = weak.upgrade() else {
                return;
            };
            match remove_now(&inner, task_id) {
                Ok(Some(_)) => {}
                Ok(None) => log::debug!("expired task already gone id={task_id}"),
                Err(error) => log::error!("deferred delete failed id={task_id} error={error}"),
            }
        });
        if let Err(error) = self.inner.scheduler.start(id, on_expire) {
            return err(&error.to_string());
        }
        log::info!("deletion pending id={id}");
        ok(self.inner.scheduler.time_left(id))
    }

    pub fn cancel_deletion(&self, id: TaskId) -> bool {
        let cancelled = self.inner.scheduler.cancel(id);
        if cancelled {
            log::info!("deletion cancelled id={id}");
        }
        cancelled
    }

    pub fn is_deletion_pending(&self, id: TaskId) -> bool {
        self.inner.scheduler.is_pending(id)
    }

    pub fn deletion_time_left(&self, id: TaskId) -> u32 {
        self.inner.scheduler.time_left(id)
    }

    pub fn set_filter(&self, filter: StatusFilter) {
        self.data().view.filter = filter;
    }

    pub fn set_sort(&self, sort: SortKey) {
        self.data().view.sort = sort;
    }

    pub fn set_search_query(&self, query: &str) {
        self.data().view.search_query = query.to_string();
    }

    pub fn view(&self) -> ViewState {
        self.data().view.clone()
    }

    /// The list as the current view shows it.
    pub fn filtered_tasks(&self) -> Vec<Task> {
        let guard = self.data();
        let view = &guard.view;
        apply_filters(&guard.tasks, view.filter, view.sort, &view.search_query)
    }

    pub fn stats(&self) -> TaskStats {
        calculate_stats(&self.data().tasks)
    }

    pub fn export_json(&self) -> CommandResult<ExportArtifact> {
        match export_json(&self.tasks(), now()) {
            Ok(artifact) => ok(artifact),
            Err(error) => err(&error.to_string()),
        }
    }

    pub fn export_csv(&self) -> CommandResult<ExportArtifact> {
        match export_csv(&self.tasks(), now(), &Local) {
            Ok(artifact) => ok(artifact),
            Err(error) => err(&error.to_string()),
        }
    }

    /// Reads `file` and merges its tasks into the list or replaces the list with them.
    /// Returns how many tasks were imported; skipped records come back as a warning.
    pub async fn import_tasks(&self, file: &ImportFile, format: ImportFormat, mode: ImportMode) -> CommandResult<usize> {
        let parsed = match import_file(file, format).await {
            Ok(parsed) => parsed,
            Err(error) => return err(&error.to_string()),
        };
        let count = parsed.tasks.len();

        let dropped = {
            let mut guard = self.data();
            let (next, dropped) = match mode {
                ImportMode::Merge => {
                    let mut next = guard.tasks.clone();
                    next.extend(restamp_ids(&guard.tasks, parsed.tasks));
                    (next, Vec::new())
                }
                ImportMode::Replace => {
                    let dropped: Vec<TaskId> = guard.tasks.iter().map(|task| task.id).collect();
                    (parsed.tasks, dropped)
                }
            };
            if let Err(error) = self.commit(&mut guard, next) {
                return storage_err(error);
            }
            dropped
        };
        for id in dropped {
            self.inner.scheduler.cancel(id);
        }

        let verb = match mode {
            ImportMode::Merge => "Imported",
            ImportMode::Replace => "Replaced with",
        };
        let source = match format {
            ImportFormat::Json => "",
            ImportFormat::Csv => " from CSV",
        };
        log::info!("import applied mode={mode:?} format={format:?} count={count}");
        self.inner
            .activity
            .record(ActivityAction::Created, &format!("{verb} {count} tasks{source}"));

        match parsed.warning {
            Some(warning) => ok_with_warning(count, warning),
            None => ok(count),
        }
    }

    /// Stops every pending countdown; the tasks they covered stay in the list.
    pub fn dispose(&self) {
        self.inner.scheduler.dispose();
    }

    fn commit(&self, guard: &mut MutexGuard<'_, TaskData>, next: Vec<Task>) -> Result<(), StorageError> {
        commit_tasks(&self.inner.storage, guard, next)
    }
}

/// Saves `next` and only then swaps it in, so a failed write leaves memory as it was.
fn commit_tasks(storage: &Storage, guard: &mut MutexGuard<'_, TaskData>, next: Vec<Task>) -> Result<(), StorageError> {
    storage.set_item(TASKS_KEY, &next)?;
    guard.tasks = next;
    Ok(())
}

fn remove_now(inner: &StoreInner, id: TaskId) -> Result<Option<Task>, StorageError> {
    let removed = {
        let mut guard = inner.data.lock().expect("state poisoned");
        let Some(removed) = task::find_task_by_id(&guard.tasks, id).cloned() else {
            return Ok(None);
        };
        let next = task::remove_task(&guard.tasks, id);
        commit_tasks(&inner.storage, &mut guard, next)?;
        removed
    };
    log::info!("task deleted id={id}");
    inner.activity.record(ActivityAction::Deleted, &removed.title);
    Ok(Some(removed))
}

/// Keeps imported ids clear of the ids already in the list and of each other.
fn restamp_ids(existing: &[Task], incoming: Vec<Task>) -> Vec<Task> {
    let mut taken: HashSet<TaskId> = existing.iter().map(|task| task.id).collect();
    let mut max = taken.iter().copied().max().unwrap_or(0);
    incoming
        .into_iter()
        .map(|mut task| {
            if taken.contains(&task.id) {
                task.id = max + 1;
            }
            taken.insert(task.id);
            max = max.max(task.id);
            task
        })
        .collect()
}

fn storage_err<T>(error: StorageError) -> CommandResult<T> {
    log::error!("task save failed error={error}");
    err(&format!("storage error: {error}"))
}
