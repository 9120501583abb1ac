//! Pure functions over single task records and task lists.
//!
//! Nothing here mutates its input: list helpers return a new vector and record helpers
//! return a new `Task`, so the owning store can decide when a change becomes visible.

use crate::models::{now, Priority, Task, TaskId};

pub fn validate_title(title: &str) -> bool {
    !title.trim().is_empty()
}

/// Builds a new active task, or `None` when the title is blank.
pub fn create_task(title: &str, priority: Priority) -> Option<Task> {
    if !validate_title(title) {
        return None;
    }
    let now = now();
    Some(Task {
        id: now.timestamp_millis(),
        title: title.trim().to_string(),
        completed: false,
        priority,
        created_at: now,
        updated_at: now,
        completed_at: None,
    })
}

/// Applies the supplied fields. A blank replacement title rejects the whole update.
pub fn update_task(task: &Task, title: Option<&str>, priority: Option<Priority>) -> Option<Task> {
    let mut next = task.clone();
    if let Some(title) = title {
        if !validate_title(title) {
            return None;
        }
        next.title = title.trim().to_string();
    }
    if let Some(priority) = priority {
        next.priority = priority;
    }
    next.updated_at = now();
    Some(next)
}

pub fn toggle_task(task: &Task) -> Task {
    let now = now();
    let mut next = task.clone();
    next.completed = !task.completed;
    next.updated_at = now;
    next.completed_at = next.completed.then_some(now);
    next
}

pub fn find_task_by_id(tasks: &[Task], id: TaskId) -> Option<&Task> {
    tasks.iter().find(|task| task.id == id)
}

pub fn remove_task(tasks: &[Task], id: TaskId) -> Vec<Task> {
    tasks.iter().filter(|task| task.id != id).cloned().collect()
}

pub fn add_task_to_list(tasks: &[Task], task: Task) -> Vec<Task> {
    let mut next = Vec::with_capacity(tasks.len() + 1);
    next.extend_from_slice(tasks);
    next.push(task);
    next
}

pub fn update_task_in_list(tasks: &[Task], updated: &Task) -> Vec<Task> {
    tasks
        .iter()
        .map(|task| {
            if task.id == updated.id {
                updated.clone()
            } else {
                task.clone()
            }
        })
        .collect()
}

/// Returns `candidate` if no task uses it yet, otherwise the next id above every existing one.
pub fn unique_id(tasks: &[Task], candidate: TaskId) -> TaskId {
    if find_task_by_id(tasks, candidate).is_none() {
        return candidate;
    }
    let max = tasks.iter().map(|task| task.id).max().unwrap_or(candidate);
    max.max(candidate) + 1
}
