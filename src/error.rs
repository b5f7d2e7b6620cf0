use std::path::PathBuf;
use thiserror::Error;

/// Failures that end a conversion run.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Unsupported file type: '{}'. Supported extensions: .epub, .pdf", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read EPUB: {message}")]
    Epub { message: String },

    #[error("Failed to read PDF")]
    Pdf(#[from] lopdf::Error),

    #[error("EPUB container is not a valid zip archive")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize book")]
    Serialize(#[from] serde_json::Error),
}

impl ConvertError {
    pub fn epub(message: impl Into<String>) -> Self {
        Self::Epub {
            message: message.into(),
        }
    }
}

pub type ConvertResult<T> = Result<T, ConvertError>;
