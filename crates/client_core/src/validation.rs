use std::path::Path;

use crate::error::ValidationError;

/// Hard ceiling for uploaded source documents and knowledge base attachments.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

pub const ACCEPTED_MIME_TYPES: [&str; 6] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/markdown",
];

/// A source document picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DocumentUpload {
    /// Builds an upload, guessing the MIME type from the file name.
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        let filename = filename.into();
        let mime_type = guess_mime_type(&filename);
        Self {
            filename,
            mime_type,
            bytes,
        }
    }

    /// Stored trimmed and lowercased.
    pub fn with_mime_type(mut self, mime_type: impl AsRef<str>) -> Self {
        self.mime_type = normalize_mime_type(mime_type.as_ref());
        self
    }

    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        Ok(Self::new(filename, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Short extension-style tag sent alongside the file.
    pub fn file_type(&self) -> String {
        extension_for_mime(&self.mime_type)
            .map(str::to_string)
            .or_else(|| {
                Path::new(&self.filename)
                    .extension()
                    .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            })
            .unwrap_or_default()
    }

    /// Type is checked before size.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_mime_type(&self.mime_type)?;
        validate_size(self.size())
    }
}

pub fn normalize_mime_type(mime_type: &str) -> String {
    mime_type.trim().to_ascii_lowercase()
}

pub fn validate_mime_type(mime_type: &str) -> Result<(), ValidationError> {
    let normalized = normalize_mime_type(mime_type);
    if ACCEPTED_MIME_TYPES.contains(&normalized.as_str()) {
        Ok(())
    } else {
        Err(ValidationError::UnsupportedFileType {
            mime_type: mime_type.to_string(),
        })
    }
}

pub fn validate_size(size_bytes: u64) -> Result<(), ValidationError> {
    if size_bytes > MAX_UPLOAD_BYTES {
        Err(ValidationError::FileTooLarge { size_bytes })
    } else {
        Ok(())
    }
}

pub fn guess_mime_type(filename: &str) -> String {
    let extension = Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
    match extension.as_deref() {
        Some("md" | "markdown") => "text/markdown".to_string(),
        _ => mime_guess::from_path(filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

fn extension_for_mime(mime_type: &str) -> Option<&'static str> {
    match mime_type.trim().to_ascii_lowercase().as_str() {
        "application/pdf" => Some("pdf"),
        "application/msword" => Some("doc"),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Some("docx"),
        "application/vnd.ms-excel" => Some("xls"),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => Some("xlsx"),
        "text/markdown" => Some("md"),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
