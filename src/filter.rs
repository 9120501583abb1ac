use std::cmp::Ordering;
use std::sync::OnceLock;

use icu_collator::options::CollatorOptions;
use icu_collator::{Collator, CollatorBorrowed};
use icu_locale_core::locale;
use serde::{Deserialize, Serialize};

use crate::models::Task;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Date,
    Priority,
    Name,
}

impl std::str::FromStr for StatusFilter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "all" => Ok(StatusFilter::All),
            "active" => Ok(StatusFilter::Active),
            "completed" => Ok(StatusFilter::Completed),
            other => Err(format!("unknown filter: {other}")),
        }
    }
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "date" => Ok(SortKey::Date),
            "priority" => Ok(SortKey::Priority),
            "name" => Ok(SortKey::Name),
            other => Err(format!("unknown sort key: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub percentage: String,
}

pub fn search_tasks(tasks: &[Task], query: &str) -> Vec<Task> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return tasks.to_vec();
    }
    tasks
        .iter()
        .filter(|task| task.title.to_lowercase().contains(&query))
        .cloned()
        .collect()
}

pub fn filter_by_status(tasks: &[Task], filter: StatusFilter) -> Vec<Task> {
    match filter {
        StatusFilter::All => tasks.to_vec(),
        StatusFilter::Active => tasks.iter().filter(|t| !t.completed).cloned().collect(),
        StatusFilter::Completed => tasks.iter().filter(|t| t.completed).cloned().collect(),
    }
}

/// Stable sort into a new vector.
pub fn sort_tasks(tasks: &[Task], sort: SortKey) -> Vec<Task> {
    let mut sorted = tasks.to_vec();
    match sort {
        SortKey::Priority => sorted.sort_by_key(|task| task.priority.rank()),
        SortKey::Name => sorted.sort_by(|a, b| compare_titles(&a.title, &b.title)),
        SortKey::Date => sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    }
    sorted
}

fn title_collator() -> Option<&'static CollatorBorrowed<'static>> {
    static COLLATOR: OnceLock<Option<CollatorBorrowed<'static>>> = OnceLock::new();
    COLLATOR
        .get_or_init(|| {
            Collator::try_new(locale!("ru").into(), CollatorOptions::default())
                .inspect_err(|error| log::warn!("title collator unavailable error={error}"))
                .ok()
        })
        .as_ref()
}

/// Russian dictionary order (Cyrillic before Latin, `ё` beside `е`); exact text breaks ties.
fn compare_titles(a: &str, b: &str) -> Ordering {
    let collated = match title_collator() {
        Some(collator) => collator.compare(a, b),
        None => a.to_lowercase().cmp(&b.to_lowercase()),
    };
    collated.then_with(|| a.cmp(b))
}

/// Search, then status filter, then sort.
pub fn apply_filters(tasks: &[Task], filter: StatusFilter, sort: SortKey, query: &str) -> Vec<Task> {
    let searched = search_tasks(tasks, query);
    let filtered = filter_by_status(&searched, filter);
    sort_tasks(&filtered, sort)
}

pub fn calculate_stats(tasks: &[Task]) -> TaskStats {
    let total = tasks.len();
    let completed = tasks.iter().filter(|t| t.completed).count();
    let percentage = if total > 0 {
        // Tenths of a percent, halves rounded up.
        let tenths = (completed * 2000 + total) / (2 * total);
        format!("{}.{}", tenths / 10, tenths % 10)
    } else {
        "0.0".to_string()
    };
    TaskStats {
        total,
        active: total - completed,
        completed,
        percentage,
    }
}
