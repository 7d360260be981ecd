use crate::extractor::{extract_text, FileKind};
use crate::models::{Document, IngestionReport, SkippedFile, UploadedFile};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

pub fn discover_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let supported = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(FileKind::from_extension)
            .is_some();

        if supported {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub async fn read_files(paths: &[PathBuf]) -> (Vec<UploadedFile>, Vec<SkippedFile>) {
    let mut files = Vec::with_capacity(paths.len());
    let mut skipped = Vec::new();

    for path in paths {
        match UploadedFile::from_path(path).await {
            Ok(file) => files.push(file),
            Err(error) => {
                warn!(path = %path.display(), %error, "could not read file");
                skipped.push(SkippedFile {
                    name: path.display().to_string(),
                    reason: error.to_string(),
                });
            }
        }
    }

    (files, skipped)
}

pub fn load_documents(files: &[UploadedFile]) -> IngestionReport {
    let mut report = IngestionReport::default();

    for file in files {
        match extract_text(file) {
            Ok(content) if content.is_empty() => {
                warn!(file = %file.name, "no text extracted");
                report.skipped_files.push(SkippedFile {
                    name: file.name.clone(),
                    reason: "no text could be extracted".to_string(),
                });
            }
            Ok(content) => {
                debug!(file = %file.name, chars = content.chars().count(), "extracted text");
                report.documents.push(Document::new(content, file.name.clone()));
            }
            Err(error) => {
                warn!(file = %file.name, %error, "skipping file");
                report.skipped_files.push(SkippedFile {
                    name: file.name.clone(),
                    reason: error.to_string(),
                });
            }
        }
    }

    report
}
