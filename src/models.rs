use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub type TaskId = i64;
pub type Timestamp = DateTime<Utc>;

/// Current time at the millisecond precision used for ids and persisted timestamps.
pub fn now() -> Timestamp {
    Utc::now().trunc_subsecs(3)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Sort rank: high first.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub completed_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Created,
    Completed,
    Uncompleted,
    Deleted,
    Edited,
}

impl ActivityAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityAction::Created => "created",
            ActivityAction::Completed => "completed",
            ActivityAction::Uncompleted => "uncompleted",
            ActivityAction::Deleted => "deleted",
            ActivityAction::Edited => "edited",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub action: ActivityAction,
    pub task_title: String,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub dark_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportFile {
    pub version: u32,
    pub exported_at: Timestamp,
    pub tasks: Vec<Task>,
}

/// Tasks written on the very first launch, before any list has been persisted.
pub fn sample_tasks() -> Vec<Task> {
    let at = |y: i32, m: u32, d: u32, h: u32, min: u32| {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0)
            .single()
            .unwrap_or_else(now)
    };
    vec![
        Task {
            id: 1,
            title: "Learn the task list basics".to_string(),
            completed: true,
            priority: Priority::High,
            created_at: at(2024, 1, 15, 10, 0),
            updated_at: at(2024, 1, 20, 15, 30),
            completed_at: Some(at(2024, 1, 20, 15, 30)),
        },
        Task {
            id: 2,
            title: "Write the test assignment".to_string(),
            completed: false,
            priority: Priority::High,
            created_at: at(2024, 2, 1, 9, 0),
            updated_at: at(2024, 2, 1, 9, 0),
            completed_at: None,
        },
        Task {
            id: 3,
            title: "Refactor legacy code".to_string(),
            completed: false,
            priority: Priority::Medium,
            created_at: at(2024, 2, 10, 14, 0),
            updated_at: at(2024, 2, 10, 14, 0),
            completed_at: None,
        },
        Task {
            id: 4,
            title: "Read up on state management".to_string(),
            completed: true,
            priority: Priority::Low,
            created_at: at(2024, 1, 25, 11, 0),
            updated_at: at(2024, 1, 30, 16, 0),
            completed_at: Some(at(2024, 1, 30, 16, 0)),
        },
    ]
}
