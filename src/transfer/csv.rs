use chrono::{NaiveDateTime, TimeZone, Utc};

use crate::models::{Priority, Task, Timestamp};
use crate::transfer::{clamp_title, TransferError, UNTITLED};

pub const DELIMITER: &str = ";";
pub const BOM: char = '\u{feff}';
pub const HEADERS: [&str; 6] = [
    "Название",
    "Статус",
    "Приоритет",
    "Создано",
    "Обновлено",
    "Завершено",
];

const STATUS_COMPLETED: &str = "Завершено";
const STATUS_ACTIVE: &str = "Активно";
const DATE_FORMAT: &str = "%d.%m.%Y %H:%M";

fn priority_label(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "Низкий",
        Priority::Medium => "Средний",
        Priority::High => "Высокий",
    }
}

/// Splits one line on `;` or `,` outside of quotes; `""` inside quotes is a literal quote.
pub fn parse_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ';' | ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

pub fn parse_priority(text: &str) -> Priority {
    let text = text.trim().to_lowercase();
    if text.contains("высок") || text == "high" {
        Priority::High
    } else if text.contains("низк") || text == "low" {
        Priority::Low
    } else {
        Priority::Medium
    }
}

pub fn parse_status(text: &str) -> bool {
    let text = text.trim().to_lowercase();
    text.contains("заверш") || text == "completed" || text == "done"
}

pub fn format_date<Tz: TimeZone>(at: &Timestamp, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.with_timezone(tz).format(DATE_FORMAT).to_string()
}

/// Reads a `DD.MM.YYYY HH:MM` cell written by `format_date` in the same zone.
pub fn parse_date<Tz: TimeZone>(text: &str, tz: &Tz) -> Option<Timestamp> {
    let naive = NaiveDateTime::parse_from_str(text.trim(), DATE_FORMAT).ok()?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Renders tasks as a `;`-separated sheet with a BOM so spreadsheet apps pick UTF-8.
pub fn tasks_to_csv<Tz: TimeZone>(tasks: &[Task], tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let mut lines = Vec::with_capacity(tasks.len() + 1);
    lines.push(HEADERS.join(DELIMITER));
    for task in tasks {
        let row = [
            quote(&task.title),
            if task.completed { STATUS_COMPLETED } else { STATUS_ACTIVE }.to_string(),
            priority_label(task.priority).to_string(),
            format_date(&task.created_at, tz),
            format_date(&task.updated_at, tz),
            task.completed_at
                .as_ref()
                .map(|at| format_date(at, tz))
                .unwrap_or_default(),
        ];
        lines.push(row.join(DELIMITER));
    }
    format!("{BOM}{}", lines.join("\n"))
}

/// Parses data rows (the first non-blank line is a header) into new tasks.
pub fn csv_to_tasks<Tz: TimeZone>(content: &str, tz: &Tz, now: Timestamp) -> Result<Vec<Task>, TransferError> {
    let lines: Vec<&str> = content
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .collect();
    if lines.len() < 2 {
        return Err(TransferError::Csv(
            "file is empty or contains only the header".to_string(),
        ));
    }

    let base_id = now.timestamp_millis();
    let tasks = lines[1..]
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let cols = parse_line(line);
            let col = |i: usize| cols.get(i).map(|value| value.trim()).unwrap_or("");

            let title = match col(0) {
                "" => UNTITLED.to_string(),
                title => clamp_title(title),
            };
            let completed = parse_status(col(1));
            let created_at = parse_date(col(3), tz).unwrap_or(now);
            let updated_at = parse_date(col(4), tz).unwrap_or(now);
            let completed_at = completed.then(|| parse_date(col(5), tz).unwrap_or(now));

            Task {
                id: base_id + index as i64,
                title,
                completed,
                priority: parse_priority(col(2)),
                created_at,
                updated_at,
                completed_at,
            }
        })
        .collect();
    Ok(tasks)
}
