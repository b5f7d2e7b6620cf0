use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tag written into every artifact so consumers can detect layout changes.
pub const FORMAT_VERSION: &str = "3.0";

/// Maps original image references to their output-relative paths.
///
/// Both the full internal path and the bare filename of each image are
/// registered, so several keys may point at the same value.
pub type ImageMap = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub title: String,
    pub language: String,
    pub authors: Vec<String>,
    pub description: Option<String>,
    pub publisher: Option<String>,
    pub date: Option<String>,
    pub identifiers: Vec<String>,
    pub subjects: Vec<String>,
}

impl Default for BookMetadata {
    fn default() -> Self {
        Self {
            title: "Untitled".to_string(),
            language: "en".to_string(),
            authors: Vec::new(),
            description: None,
            publisher: None,
            date: None,
            identifiers: Vec::new(),
            subjects: Vec::new(),
        }
    }
}

/// One physical unit of reading order: an EPUB content document or a PDF
/// page range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterContent {
    pub id: String,
    /// Join key for [`TocEntry::file_href`].
    pub href: String,
    pub title: String,
    /// Sanitized body-only markup.
    pub content: String,
    /// Whitespace-collapsed plain text.
    pub text: String,
    /// Zero-based position in the spine.
    pub order: usize,
}

/// A node of the navigation tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub title: String,
    /// Raw reference, possibly with a `#fragment` suffix.
    pub href: String,
    /// `href` without the fragment.
    pub file_href: String,
    /// The fragment, or empty.
    pub anchor: String,
    #[serde(default)]
    pub children: Vec<TocEntry>,
}

impl TocEntry {
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        let href = href.into();
        let (file_href, anchor) = match href.split_once('#') {
            Some((file, anchor)) => (file.to_string(), anchor.to_string()),
            None => (href.clone(), String::new()),
        };
        Self {
            title: title.into(),
            href,
            file_href,
            anchor,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<TocEntry>) -> Self {
        self.children = children;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub metadata: BookMetadata,
    pub spine: Vec<ChapterContent>,
    pub toc: Vec<TocEntry>,
    pub images: ImageMap,
    pub source_file: String,
    pub processed_at: String,
    pub version: String,
}

impl Book {
    /// Counts TOC entries (at any depth) whose `file_href` names no spine
    /// chapter. Such entries are kept but cannot be navigated.
    pub fn dangling_toc_entries(&self) -> usize {
        fn count(entries: &[TocEntry], spine: &[ChapterContent]) -> usize {
            entries
                .iter()
                .map(|entry| {
                    let missing = !spine.iter().any(|c| c.href == entry.file_href);
                    usize::from(missing) + count(&entry.children, spine)
                })
                .sum()
        }
        count(&self.toc, &self.spine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(href: &str, order: usize) -> ChapterContent {
        ChapterContent {
            id: href.to_string(),
            href: href.to_string(),
            title: href.to_string(),
            content: "<p>x</p>".to_string(),
            text: "x".to_string(),
            order,
        }
    }

    #[test]
    fn toc_entry_splits_anchor() {
        let entry = TocEntry::new("One", "part01.html#chapter1");
        assert_eq!(entry.file_href, "part01.html");
        assert_eq!(entry.anchor, "chapter1");

        let plain = TocEntry::new("Two", "part02.html");
        assert_eq!(plain.file_href, "part02.html");
        assert_eq!(plain.anchor, "");
    }

    #[test]
    fn serialization_keeps_empty_and_absent_apart() {
        let book = Book {
            metadata: BookMetadata {
                description: Some(String::new()),
                ..BookMetadata::default()
            },
            spine: vec![chapter("a.html", 0)],
            toc: vec![TocEntry::new("A", "a.html#top")
                .with_children(vec![TocEntry::new("B", "b.html")])],
            images: ImageMap::from([("pic.png".to_string(), "images/pic.png".to_string())]),
            source_file: "a.epub".to_string(),
            processed_at: "2024-01-01T00:00:00+00:00".to_string(),
            version: FORMAT_VERSION.to_string(),
        };

        let json = serde_json::to_string(&book).unwrap();
        let back: Book = serde_json::from_str(&json).unwrap();

        assert_eq!(back, book);
        assert_eq!(back.metadata.description, Some(String::new()));
        assert_eq!(back.metadata.publisher, None);
    }

    #[test]
    fn counts_dangling_entries_at_every_depth() {
        let book = Book {
            metadata: BookMetadata::default(),
            spine: vec![chapter("a.html", 0)],
            toc: vec![TocEntry::new("A", "a.html#x").with_children(vec![
                TocEntry::new("Missing", "nowhere.html"),
                TocEntry::new("A again", "a.html"),
            ])],
            images: ImageMap::new(),
            source_file: "a.epub".to_string(),
            processed_at: String::new(),
            version: FORMAT_VERSION.to_string(),
        };

        assert_eq!(book.dangling_toc_entries(), 1);
    }
}
