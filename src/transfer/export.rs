use std::path::{Path, PathBuf};

use chrono::TimeZone;

use crate::models::{ExportFile, Task, Timestamp};
use crate::storage::{write_atomic_bytes, StorageError};
use crate::transfer::csv::tasks_to_csv;
use crate::transfer::TransferError;

pub const EXPORT_VERSION: u32 = 1;

/// A ready-to-save export: file name, content type and bytes.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub file_name: String,
    pub mime_type: &'static str,
    pub contents: Vec<u8>,
}

impl ExportArtifact {
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, StorageError> {
        let path = dir.join(&self.file_name);
        write_atomic_bytes(&path, &self.contents)?;
        log::info!(
            "export written path={} bytes={}",
            path.display(),
            self.contents.len()
        );
        Ok(path)
    }
}

fn export_file_name(now: &Timestamp, extension: &str) -> String {
    format!("tasks-export-{}.{extension}", now.format("%Y-%m-%d"))
}

pub fn export_json(tasks: &[Task], now: Timestamp) -> Result<ExportArtifact, TransferError> {
    if tasks.is_empty() {
        return Err(TransferError::NothingToExport);
    }
    let data = ExportFile {
        version: EXPORT_VERSION,
        exported_at: now,
        tasks: tasks.to_vec(),
    };
    Ok(ExportArtifact {
        file_name: export_file_name(&now, "json"),
        mime_type: "application/json",
        contents: serde_json::to_vec_pretty(&data)?,
    })
}

pub fn export_csv<Tz: TimeZone>(tasks: &[Task], now: Timestamp, tz: &Tz) -> Result<ExportArtifact, TransferError>
where
    Tz::Offset: std::fmt::Display,
{
    if tasks.is_empty() {
        return Err(TransferError::NothingToExport);
    }
    Ok(ExportArtifact {
        file_name: export_file_name(&now, "csv"),
        mime_type: "text/csv;charset=utf-8",
        contents: tasks_to_csv(tasks, tz).into_bytes(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use chrono::Utc;

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 5, 23, 30, 0).unwrap()
    }

    fn make_task(id: i64) -> Task {
        Task {
            id,
            title: format!("task-{id}"),
            completed: false,
            priority: Priority::Medium,
            created_at: now(),
            updated_at: now(),
            completed_at: None,
        }
    }

    #[test]
    fn exports_refuse_empty_lists() {
        assert!(matches!(export_json(&[], now()), Err(TransferError::NothingToExport)));
        assert!(matches!(
            export_csv(&[], now(), &Utc),
            Err(TransferError::NothingToExport)
        ));
    }

    #[test]
    fn export_json_wraps_tasks_with_version() {
        let artifact = export_json(&[make_task(1), make_task(2)], now()).unwrap();
        assert_eq!(artifact.file_name, "tasks-export-2024-03-05.json");
        assert_eq!(artifact.mime_type, "application/json");

        let value: serde_json::Value = serde_json::from_slice(&artifact.contents).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["exportedAt"], "2024-03-05T23:30:00Z");
        assert_eq!(value["tasks"].as_array().unwrap().len(), 2);
        assert_eq!(value["tasks"][0]["title"], "task-1");
    }

    #[test]
    fn export_csv_names_file_and_keeps_bom() {
        let artifact = export_csv(&[make_task(1)], now(), &Utc).unwrap();
        assert_eq!(artifact.file_name, "tasks-export-2024-03-05.csv");
        assert!(artifact.contents.starts_with("\u{feff}".as_bytes()));
        let text = String::from_utf8(artifact.contents).unwrap();
        assert!(text.contains("\"task-1\";Активно;Средний;05.03.2024 23:30;05.03.2024 23:30;"));
    }

    #[test]
    fn write_to_places_artifact_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = export_json(&[make_task(1)], now()).unwrap();
        let path = artifact.write_to(&dir.path().join("exports")).unwrap();
        assert_eq!(path, dir.path().join("exports").join("tasks-export-2024-03-05.json"));
        assert_eq!(std::fs::read(path).unwrap(), artifact.contents);
    }
}
