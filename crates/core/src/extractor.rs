use crate::error::IngestError;
use crate::models::UploadedFile;
use lopdf::Document;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Text,
}

impl FileKind {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn of(file: &UploadedFile) -> Option<Self> {
        file.extension()
            .as_deref()
            .and_then(Self::from_extension)
    }
}

/// Turns the raw bytes of one file into its uncleaned text.
pub trait TextExtractor {
    fn extract_raw(&self, file: &UploadedFile) -> Result<String, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl TextExtractor for LopdfExtractor {
    fn extract_raw(&self, file: &UploadedFile) -> Result<String, IngestError> {
        let document = Document::load_mem(&file.bytes)
            .map_err(|error| IngestError::PdfParse(format!("{}: {error}", file.name)))?;

        let mut text = String::new();
        for page_no in document.get_pages().into_keys() {
            match document.extract_text(&[page_no]) {
                Ok(page_text) if !page_text.trim().is_empty() => {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(&page_text);
                }
                Ok(_) => debug!(file = %file.name, page = page_no, "page has no text"),
                Err(error) => {
                    debug!(file = %file.name, page = page_no, %error, "page extraction failed")
                }
            }
        }

        Ok(text)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract_raw(&self, file: &UploadedFile) -> Result<String, IngestError> {
        String::from_utf8(file.bytes.clone()).map_err(|source| IngestError::Utf8 {
            name: file.name.clone(),
            source,
        })
    }
}

pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn extract_text(file: &UploadedFile) -> Result<String, IngestError> {
    let raw = match FileKind::of(file) {
        Some(FileKind::Pdf) => LopdfExtractor.extract_raw(file)?,
        Some(FileKind::Text) => PlainTextExtractor.extract_raw(file)?,
        None => return Err(IngestError::UnsupportedFileType(file.name.clone())),
    };

    Ok(clean_text(&raw))
}
