use crate::model::BookMetadata;
use std::collections::HashMap;

/// Dublin Core elements of an EPUB package, keyed by local name
/// (`title`, `creator`, ...), values in document order.
pub type DublinCore = HashMap<String, Vec<String>>;

/// Entries of a PDF document information dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PdfInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
}

pub fn from_dublin_core(dc: &DublinCore) -> BookMetadata {
    let defaults = BookMetadata::default();
    let first = |key: &str| dc.get(key).and_then(|values| values.first()).cloned();
    let all = |key: &str| dc.get(key).cloned().unwrap_or_default();

    BookMetadata {
        title: first("title")
            .filter(|title| !title.is_empty())
            .unwrap_or(defaults.title),
        language: first("language")
            .filter(|lang| !lang.is_empty())
            .unwrap_or(defaults.language),
        authors: all("creator"),
        description: first("description"),
        publisher: first("publisher"),
        date: first("date"),
        identifiers: all("identifier"),
        subjects: all("subject"),
    }
}

/// PDF documents carry no language, so it is always the default. A missing
/// title falls back to `fallback_title`, usually the file stem.
pub fn from_pdf_info(info: &PdfInfo, fallback_title: &str) -> BookMetadata {
    let present = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());

    BookMetadata {
        title: present(&info.title).unwrap_or_else(|| fallback_title.to_string()),
        authors: present(&info.author).into_iter().collect(),
        description: present(&info.subject),
        publisher: present(&info.producer),
        date: present(&info.creation_date),
        ..BookMetadata::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dc(entries: &[(&str, Vec<&str>)]) -> DublinCore {
        entries
            .iter()
            .map(|(key, values)| {
                (
                    key.to_string(),
                    values.iter().map(|v| v.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn reads_single_and_multi_valued_fields() {
        let fields = dc(&[
            ("title", vec!["Dune", "Dune: Deluxe Edition"]),
            ("language", vec!["en-GB"]),
            ("creator", vec!["Frank Herbert", "Someone Else"]),
            ("identifier", vec!["urn:isbn:123", "uuid:abc"]),
            ("subject", vec!["Fiction"]),
            ("publisher", vec!["Chilton"]),
        ]);

        let meta = from_dublin_core(&fields);

        assert_eq!(meta.title, "Dune");
        assert_eq!(meta.language, "en-GB");
        assert_eq!(meta.authors, ["Frank Herbert", "Someone Else"]);
        assert_eq!(meta.identifiers, ["urn:isbn:123", "uuid:abc"]);
        assert_eq!(meta.subjects, ["Fiction"]);
        assert_eq!(meta.publisher.as_deref(), Some("Chilton"));
        assert_eq!(meta.description, None);
        assert_eq!(meta.date, None);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let meta = from_dublin_core(&DublinCore::new());
        assert_eq!(meta, BookMetadata::default());
        assert_eq!(meta.title, "Untitled");
        assert_eq!(meta.language, "en");
    }

    #[test]
    fn pdf_info_maps_conventional_fields() {
        let info = PdfInfo {
            title: Some("Manual".to_string()),
            author: Some("ACME".to_string()),
            subject: Some("Widgets".to_string()),
            producer: Some("Writer".to_string()),
            creation_date: Some("D:20240101120000Z".to_string()),
        };

        let meta = from_pdf_info(&info, "manual_v2");

        assert_eq!(meta.title, "Manual");
        assert_eq!(meta.authors, ["ACME"]);
        assert_eq!(meta.description.as_deref(), Some("Widgets"));
        assert_eq!(meta.publisher.as_deref(), Some("Writer"));
        assert_eq!(meta.date.as_deref(), Some("D:20240101120000Z"));
        assert_eq!(meta.language, "en");
    }

    #[test]
    fn pdf_without_info_uses_file_stem() {
        let info = PdfInfo {
            title: Some(String::new()),
            ..PdfInfo::default()
        };

        let meta = from_pdf_info(&info, "scan_0001");

        assert_eq!(meta.title, "scan_0001");
        assert!(meta.authors.is_empty());
        assert_eq!(meta.description, None);
    }
}
