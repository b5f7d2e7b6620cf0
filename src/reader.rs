use crate::error::{ConvertError, ConvertResult};
use crate::model::{BookMetadata, ChapterContent, ImageMap, TocEntry};
use std::path::Path;

/// Embedded image as stored in the source container.
pub struct ImageResource {
    /// Path of the resource inside the container.
    pub original_href: String,
    pub data: Vec<u8>,
}

/// Input formats the converter dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookFormat {
    Epub,
    Pdf,
}

impl BookFormat {
    /// Detects the format from the file extension, case-insensitively.
    pub fn from_path(path: &Path) -> ConvertResult<Self> {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase());

        match extension.as_deref() {
            Some("epub") => Ok(Self::Epub),
            Some("pdf") => Ok(Self::Pdf),
            _ => Err(ConvertError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Trait for reading source documents (EPUB, PDF).
///
/// Per-item problems are absorbed by the implementations: unreadable
/// resources and malformed spine or outline entries are skipped.
pub trait BookSource {
    fn metadata(&self) -> BookMetadata;

    /// Embedded images; empty for formats without an asset container.
    fn images(&self) -> Vec<ImageResource>;

    /// Reading order, with image references rewritten through `images`.
    fn chapters(&self, images: &ImageMap) -> Vec<ChapterContent>;

    /// Navigation tree for the already segmented `spine`.
    fn toc(&self, spine: &[ChapterContent]) -> Vec<TocEntry>;
}
