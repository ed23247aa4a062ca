use std::io;
use std::path::{Path, PathBuf};

use crate::ingest_spec::InputLocation;
use crate::ingestion::{read_table_from_path, FileFormat, ReadOptions};

/// A file placed where the ingestion engine can read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub dir: PathBuf,
    pub filename: String,
    /// Format of the staged copy, which is what the engine parses.
    pub format: FileFormat,
}

impl StagedFile {
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.filename)
    }

    pub fn location(&self) -> InputLocation {
        InputLocation::Staged {
            base_dir: self.dir.clone(),
            filename: self.filename.clone(),
        }
    }
}

/// Copies validated uploads into the directory shared with the ingestion engine.
///
/// Staged names are prefixed with the task id so concurrent uploads of the same file never
/// touch each other's input. Workbooks are rewritten as CSV since the engine cannot parse them.
#[derive(Debug, Clone)]
pub struct FileStager {
    shared_dir: PathBuf,
}

impl FileStager {
    pub fn new(shared_dir: impl Into<PathBuf>) -> Self {
        Self {
            shared_dir: shared_dir.into(),
        }
    }

    /// Blocking: copies (or converts) `source` into the shared directory.
    pub fn stage(
        &self,
        task_id: &str,
        source: &Path,
        original_filename: &str,
        format: FileFormat,
    ) -> io::Result<StagedFile> {
        std::fs::create_dir_all(&self.shared_dir)?;

        let staged = match format {
            FileFormat::Excel => {
                let stem = Path::new(original_filename)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("upload");
                let staged = StagedFile {
                    dir: self.shared_dir.clone(),
                    filename: staged_name(task_id, &format!("{stem}.csv")),
                    format: FileFormat::Csv,
                };
                write_workbook_as_csv(source, &staged.path())?;
                staged
            }
            FileFormat::Csv | FileFormat::Parquet => {
                let staged = StagedFile {
                    dir: self.shared_dir.clone(),
                    filename: staged_name(task_id, original_filename),
                    format,
                };
                std::fs::copy(source, staged.path())?;
                staged
            }
        };

        tracing::debug!(task_id, staged = %staged.path().display(), "file staged");
        Ok(staged)
    }
}

/// `{task_id}_{filename}`, keeping only the final path component and a safe character set.
pub fn staged_name(task_id: &str, original_filename: &str) -> String {
    let base = Path::new(original_filename)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("upload");
    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{task_id}_{sanitized}")
}

fn write_workbook_as_csv(source: &Path, dest: &Path) -> io::Result<()> {
    let options = ReadOptions {
        format: Some(FileFormat::Excel),
        limit: None,
    };
    let table = read_table_from_path(source, &options).map_err(io::Error::other)?;

    let mut writer = csv::Writer::from_path(dest)?;
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
    }
    writer.flush()?;
    Ok(())
}

/// Remove a temporary file, logging instead of failing.
pub(crate) async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "removed temporary file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove temporary file"),
    }
}
