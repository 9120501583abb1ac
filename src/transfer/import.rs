use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::models::{now, Priority, Task, Timestamp};
use crate::transfer::csv::csv_to_tasks;
use crate::transfer::{
    validate_file_size, validate_file_type, ImportFile, ImportFormat, TransferError, MAX_TASKS_COUNT,
    MAX_TITLE_CHARS, PROCESSING_TIMEOUT, UNTITLED,
};

const FAILURE_ERROR_LIMIT: usize = 5;
const WARNING_ERROR_LIMIT: usize = 3;

/// Tasks accepted from a file, plus a summary of the records that were skipped.
#[derive(Debug, Clone)]
pub struct ParsedImport {
    pub tasks: Vec<Task>,
    pub warning: Option<String>,
}

/// Runs the whole import pipeline for `file`: size and type checks up front, then reading
/// and parsing under the processing deadline.
pub async fn import_file(file: &ImportFile, format: ImportFormat) -> Result<ParsedImport, TransferError> {
    validate_file_size(file)?;
    validate_file_type(file, format)?;
    log::info!(
        "import started name={} size={} format={format:?}",
        file.name,
        file.size
    );

    let result = with_deadline(PROCESSING_TIMEOUT, read_and_parse(file, format)).await;
    match &result {
        Ok(parsed) => log::info!(
            "import parsed name={} tasks={} partial={}",
            file.name,
            parsed.tasks.len(),
            parsed.warning.is_some()
        ),
        Err(error) => log::warn!("import rejected name={} error={error}", file.name),
    }
    result
}

/// Resolves with whichever finishes first: `work` or the deadline.
pub(crate) async fn with_deadline<T>(
    limit: Duration,
    work: impl Future<Output = Result<T, TransferError>>,
) -> Result<T, TransferError> {
    tokio::time::timeout(limit, work)
        .await
        .unwrap_or(Err(TransferError::Timeout(limit)))
}

async fn read_and_parse(file: &ImportFile, format: ImportFormat) -> Result<ParsedImport, TransferError> {
    let content = file.read_text().await?;
    if content.trim().is_empty() {
        return Err(TransferError::BlankContent);
    }
    let now = now();
    // Parsing a large file is CPU-bound; keep it off the timer's thread.
    tokio::task::spawn_blocking(move || match format {
        ImportFormat::Json => parse_json(&content, now),
        ImportFormat::Csv => parse_csv(&content, now),
    })
    .await
    .map_err(|err| TransferError::Internal(err.to_string()))?
}

pub fn parse_json(content: &str, now: Timestamp) -> Result<ParsedImport, TransferError> {
    let data: Value = serde_json::from_str(content)?;
    let object = data.as_object().ok_or_else(|| {
        TransferError::Structure(
            "invalid file structure; expected an object with a \"tasks\" field".to_string(),
        )
    })?;
    let tasks = match object.get("tasks") {
        None | Some(Value::Null) => {
            return Err(TransferError::Structure(
                "file has no \"tasks\" field".to_string(),
            ))
        }
        Some(tasks) => tasks,
    };
    validate_tasks_array(tasks, now)
}

fn parse_csv(content: &str, now: Timestamp) -> Result<ParsedImport, TransferError> {
    let tasks = csv_to_tasks(content, &Local, now)?;
    if tasks.is_empty() {
        return Err(TransferError::Csv("file has no valid tasks".to_string()));
    }
    if tasks.len() > MAX_TASKS_COUNT {
        return Err(TransferError::TooManyTasks(tasks.len()));
    }
    Ok(ParsedImport {
        tasks,
        warning: None,
    })
}

fn validate_tasks_array(value: &Value, now: Timestamp) -> Result<ParsedImport, TransferError> {
    let records = value
        .as_array()
        .ok_or_else(|| TransferError::Structure("\"tasks\" must be an array".to_string()))?;
    if records.is_empty() {
        return Err(TransferError::Structure("file contains no tasks".to_string()));
    }
    if records.len() > MAX_TASKS_COUNT {
        return Err(TransferError::TooManyTasks(records.len()));
    }

    let mut tasks = Vec::with_capacity(records.len());
    let mut errors = Vec::new();
    for (index, record) in records.iter().enumerate() {
        match validate_task(record, index, now) {
            Ok(task) => tasks.push(task),
            Err(message) => errors.push(message),
        }
    }

    if tasks.is_empty() {
        return Err(TransferError::NoValidTasks(summarize(&errors, FAILURE_ERROR_LIMIT)));
    }
    let warning = (!errors.is_empty()).then(|| {
        format!(
            "Imported {} of {} tasks. Errors in {} tasks:\n{}",
            tasks.len(),
            records.len(),
            errors.len(),
            summarize(&errors, WARNING_ERROR_LIMIT)
        )
    });
    Ok(ParsedImport { tasks, warning })
}

fn summarize(errors: &[String], limit: usize) -> String {
    let mut out = errors
        .iter()
        .take(limit)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");
    if errors.len() > limit {
        out.push_str(&format!("\n... and {} more errors", errors.len() - limit));
    }
    out
}

/// Checks one record and fills in defaults. Errors are prefixed with the 1-based position.
fn validate_task(value: &Value, index: usize, now: Timestamp) -> Result<Task, String> {
    let position = index + 1;
    let record = value
        .as_object()
        .ok_or_else(|| format!("Task #{position}: not an object"))?;

    let title = match record.get("title") {
        None => None,
        Some(Value::String(title)) if title.trim().is_empty() => {
            return Err(format!("Task #{position}: field \"title\" must not be empty"))
        }
        Some(Value::String(title)) if title.chars().count() > MAX_TITLE_CHARS => {
            return Err(format!(
                "Task #{position}: field \"title\" is too long (maximum {MAX_TITLE_CHARS} characters)"
            ))
        }
        Some(Value::String(title)) => Some(title.trim()),
        Some(_) => return Err(format!("Task #{position}: field \"title\" must be a string")),
    };

    let priority = match record.get("priority") {
        None => Priority::default(),
        Some(value) => value
            .as_str()
            .and_then(|raw| raw.parse::<Priority>().ok())
            .ok_or_else(|| {
                format!("Task #{position}: invalid priority; allowed values: low, medium, high")
            })?,
    };

    let completed = match record.get("completed") {
        None => false,
        Some(Value::Bool(completed)) => *completed,
        Some(_) => return Err(format!("Task #{position}: field \"completed\" must be a boolean")),
    };

    let created_at = date_field(record, "createdAt", position)?;
    let updated_at = date_field(record, "updatedAt", position)?;
    let completed_at = date_field(record, "completedAt", position)?;

    let created_at = created_at.unwrap_or(now);
    let updated_at = updated_at.unwrap_or(now);
    Ok(Task {
        id: now.timestamp_millis() + index as i64,
        title: title.unwrap_or(UNTITLED).to_string(),
        completed,
        priority,
        created_at,
        updated_at,
        completed_at: if completed {
            Some(completed_at.unwrap_or(updated_at))
        } else {
            None
        },
    })
}

fn date_field(record: &Map<String, Value>, field: &str, position: usize) -> Result<Option<Timestamp>, String> {
    match record.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) => parse_date(raw)
            .map(Some)
            .ok_or_else(|| format!("Task #{position}: invalid date format in field \"{field}\"")),
        Some(_) => Err(format!("Task #{position}: field \"{field}\" must be a string")),
    }
}

/// Accepts RFC 3339 plus the offset-less forms other tools commonly write (read as UTC).
pub fn parse_date(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
