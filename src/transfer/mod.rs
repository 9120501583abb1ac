//! Moving task lists in and out of files: JSON and CSV export artifacts, and the
//! validating import pipeline that turns a user-supplied file into fresh task records.

pub mod csv;
pub mod export;
pub mod import;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use export::{export_csv, export_json, ExportArtifact};
pub use import::{import_file, ParsedImport};

pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;
pub const MAX_TASKS_COUNT: usize = 10_000;
pub const MAX_TITLE_CHARS: usize = 500;
pub const PROCESSING_TIMEOUT: Duration = Duration::from_secs(30);
pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Json,
    Csv,
}

impl ImportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImportFormat::Json => "json",
            ImportFormat::Csv => "csv",
        }
    }

    fn accepts_mime(self, mime_type: &str) -> bool {
        match self {
            ImportFormat::Json => matches!(mime_type, "application/json" | "text/json"),
            ImportFormat::Csv => matches!(mime_type, "text/csv" | "application/vnd.ms-excel"),
        }
    }

    /// Guesses the format from a file name's extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let extension = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "json" => Some(ImportFormat::Json),
            "csv" => Some(ImportFormat::Csv),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    Merge,
    Replace,
}

#[derive(Debug)]
pub enum TransferError {
    FileTooLarge(u64),
    EmptyFile,
    WrongType(ImportFormat),
    BlankContent,
    Read(std::io::Error),
    Encoding,
    Json(serde_json::Error),
    Structure(String),
    TooManyTasks(usize),
    NoValidTasks(String),
    Csv(String),
    Timeout(Duration),
    NothingToExport,
    Internal(String),
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferError::FileTooLarge(size) => write!(
                f,
                "file is too large ({size} bytes); maximum size is {}MB",
                MAX_FILE_SIZE / 1024 / 1024
            ),
            TransferError::EmptyFile => write!(f, "file is empty"),
            TransferError::WrongType(format) => write!(
                f,
                "wrong file type; expected a {} file (.{})",
                format.extension().to_uppercase(),
                format.extension()
            ),
            TransferError::BlankContent => write!(f, "file is empty or contains only whitespace"),
            TransferError::Read(err) => write!(f, "failed to read file: {err}"),
            TransferError::Encoding => write!(f, "file is not valid UTF-8 text"),
            TransferError::Json(err) => write!(f, "JSON parse error: {err}"),
            TransferError::Structure(message) => write!(f, "{message}"),
            TransferError::TooManyTasks(count) => write!(
                f,
                "too many tasks ({count}); maximum is {MAX_TASKS_COUNT}"
            ),
            TransferError::NoValidTasks(summary) => {
                write!(f, "no task could be imported. Errors:\n{summary}")
            }
            TransferError::Csv(message) => write!(f, "CSV parse error: {message}"),
            TransferError::Timeout(limit) => write!(
                f,
                "file processing timed out ({} seconds)",
                limit.as_secs()
            ),
            TransferError::NothingToExport => write!(f, "no tasks to export"),
            TransferError::Internal(message) => {
                write!(f, "unexpected error while processing file: {message}")
            }
        }
    }
}

impl std::error::Error for TransferError {}

impl From<std::io::Error> for TransferError {
    fn from(value: std::io::Error) -> Self {
        TransferError::Read(value)
    }
}

impl From<serde_json::Error> for TransferError {
    fn from(value: serde_json::Error) -> Self {
        TransferError::Json(value)
    }
}

#[derive(Debug, Clone)]
enum FileSource {
    Path(PathBuf),
    Memory(Vec<u8>),
}

/// A file offered for import, described the way a file picker reports it.
#[derive(Debug, Clone)]
pub struct ImportFile {
    pub name: String,
    /// May be empty when the origin does not report one.
    pub mime_type: String,
    pub size: u64,
    source: FileSource,
}

impl ImportFile {
    pub async fn from_path(path: impl Into<PathBuf>) -> Result<Self, TransferError> {
        let path = path.into();
        let metadata = tokio::fs::metadata(&path).await?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(Self {
            name,
            mime_type: String::new(),
            size: metadata.len(),
            source: FileSource::Path(path),
        })
    }

    pub fn from_bytes(name: &str, mime_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            size: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }

    async fn read_text(&self) -> Result<String, TransferError> {
        let bytes = match &self.source {
            FileSource::Path(path) => tokio::fs::read(path).await?,
            FileSource::Memory(bytes) => bytes.clone(),
        };
        let text = String::from_utf8(bytes).map_err(|_| TransferError::Encoding)?;
        if text.starts_with('\u{feff}') {
            return Ok(text['\u{feff}'.len_utf8()..].to_string());
        }
        Ok(text)
    }
}

pub(crate) fn validate_file_size(file: &ImportFile) -> Result<(), TransferError> {
    if file.size > MAX_FILE_SIZE {
        return Err(TransferError::FileTooLarge(file.size));
    }
    if file.size == 0 {
        return Err(TransferError::EmptyFile);
    }
    Ok(())
}

/// Either the extension or the MIME type has to match; an empty MIME type is not held against the file.
pub(crate) fn validate_file_type(file: &ImportFile, format: ImportFormat) -> Result<(), TransferError> {
    let extension_ok = ImportFormat::from_file_name(&file.name) == Some(format);
    let mime = file.mime_type.trim().to_ascii_lowercase();
    let mime_ok = mime.is_empty() || format.accepts_mime(&mime);
    if extension_ok || mime_ok {
        Ok(())
    } else {
        Err(TransferError::WrongType(format))
    }
}

/// Cuts a title to the import limit without splitting a character.
pub(crate) fn clamp_title(title: &str) -> String {
    title.chars().take(MAX_TITLE_CHARS).collect()
}
