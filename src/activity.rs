use std::sync::Mutex;

use crate::models::{now, ActivityAction, ActivityEntry};
use crate::storage::{Storage, StorageError, ACTIVITY_KEY};

pub const MAX_ENTRIES: usize = 50;

/// Where the task store reports what happened to a task.
pub trait ActivitySink: Send + Sync {
    fn record(&self, action: ActivityAction, task_title: &str);
}

pub fn create_entry(action: ActivityAction, task_title: &str) -> ActivityEntry {
    ActivityEntry {
        action,
        task_title: task_title.to_string(),
        timestamp: now(),
    }
}

/// Prepends a new entry and keeps only the newest `MAX_ENTRIES`.
pub fn add_entry(entries: &[ActivityEntry], action: ActivityAction, task_title: &str) -> Vec<ActivityEntry> {
    let mut next = Vec::with_capacity(entries.len().min(MAX_ENTRIES) + 1);
    next.push(create_entry(action, task_title));
    next.extend(entries.iter().take(MAX_ENTRIES - 1).cloned());
    next
}

/// Persisted, newest-first history of task actions.
pub struct ActivityLog {
    storage: Storage,
    entries: Mutex<Vec<ActivityEntry>>,
}

impl ActivityLog {
    pub fn open(storage: Storage) -> Self {
        let mut entries: Vec<ActivityEntry> = storage.get_item(ACTIVITY_KEY, Vec::new());
        entries.truncate(MAX_ENTRIES);
        Self {
            storage,
            entries: Mutex::new(entries),
        }
    }

    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.lock().expect("activity poisoned").clone()
    }

    pub fn add_entry(&self, action: ActivityAction, task_title: &str) -> Result<(), StorageError> {
        let mut guard = self.entries.lock().expect("activity poisoned");
        *guard = add_entry(&guard, action, task_title);
        self.storage.set_item(ACTIVITY_KEY, &*guard)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        let mut guard = self.entries.lock().expect("activity poisoned");
        guard.clear();
        self.storage.set_item(ACTIVITY_KEY, &*guard)
    }
}

impl ActivitySink for ActivityLog {
    fn record(&self, action: ActivityAction, task_title: &str) {
        // History is secondary: a failed save must not fail the task operation.
        if let Err(error) = self.add_entry(action, task_title) {
            log::warn!("activity save failed action={action:?} error={error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_entry_prepends_newest() {
        let entries = add_entry(&[], ActivityAction::Created, "a");
        let entries = add_entry(&entries, ActivityAction::Completed, "a");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, ActivityAction::Completed);
        assert_eq!(entries[1].action, ActivityAction::Created);
    }

    #[test]
    fn add_entry_caps_history_and_evicts_oldest() {
        let mut entries = Vec::new();
        for i in 0..MAX_ENTRIES {
            entries = add_entry(&entries, ActivityAction::Created, &format!("task-{i}"));
        }
        assert_eq!(entries.len(), MAX_ENTRIES);
        assert_eq!(entries[MAX_ENTRIES - 1].task_title, "task-0");

        let next = add_entry(&entries, ActivityAction::Deleted, "newest");
        assert_eq!(next.len(), MAX_ENTRIES);
        assert_eq!(next[0].task_title, "newest");
        assert_eq!(next[MAX_ENTRIES - 1].task_title, "task-1");
        assert!(next.iter().all(|e| e.task_title != "task-0"));
    }

    #[test]
    fn activity_log_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf());

        let log = ActivityLog::open(storage.clone());
        log.add_entry(ActivityAction::Created, "first").unwrap();
        log.record(ActivityAction::Edited, "second");
        assert_eq!(log.entries().len(), 2);

        let reopened = ActivityLog::open(storage.clone());
        let entries = reopened.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].task_title, "second");

        reopened.clear().unwrap();
        assert!(reopened.entries().is_empty());
        assert!(ActivityLog::open(storage).entries().is_empty());
    }

    #[test]
    fn record_keeps_in_memory_entry_when_save_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("tasks-app-activity.json")).unwrap();
        let log = ActivityLog::open(Storage::new(dir.path().to_path_buf()));

        assert!(log.add_entry(ActivityAction::Created, "a").is_err());
        log.record(ActivityAction::Deleted, "b");
        assert_eq!(log.entries().len(), 2);
    }
}
