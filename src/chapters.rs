//! Segments a source document into its ordered spine.

use crate::html::sanitize_fragment;
use crate::model::{ChapterContent, ImageMap, TocEntry};
use crate::outline::OutlineItem;
use crate::text::{collapse_whitespace, text_to_html};

/// A content document referenced by an EPUB spine.
pub struct SpineDocument<'a> {
    /// Manifest id of the item.
    pub id: &'a str,
    /// Name of the document inside the container.
    pub href: &'a str,
    pub markup: &'a str,
}

/// Maps spine documents 1:1 onto chapters in reading order.
pub fn epub_chapters<'a>(
    documents: impl IntoIterator<Item = SpineDocument<'a>>,
    images: &ImageMap,
) -> Vec<ChapterContent> {
    documents
        .into_iter()
        .enumerate()
        .map(|(order, doc)| {
            let clean = sanitize_fragment(doc.markup, images);
            tracing::debug!(href = doc.href, order, "processed spine document");
            ChapterContent {
                id: doc.id.to_string(),
                href: doc.href.to_string(),
                title: format!("Section {}", order + 1),
                content: clean.html,
                text: clean.text,
                order,
            }
        })
        .collect()
}

/// Slices normalized page texts into chapters starting at each outline
/// entry. A chapter runs until the next entry's page and always covers at
/// least one page; entries starting past the last page are dropped.
pub fn pdf_chapters(pages: &[String], outline: &[OutlineItem]) -> Vec<ChapterContent> {
    let mut spine = Vec::with_capacity(outline.len());

    for (i, entry) in outline.iter().enumerate() {
        let start = entry.page;
        if start >= pages.len() {
            tracing::debug!(title = %entry.title, page = start, "outline entry starts past the last page");
            continue;
        }
        let next = outline.get(i + 1).map_or(pages.len(), |next| next.page);
        let end = next.min(pages.len()).max(start + 1);

        let segment = pages[start..end].join("\n\n");
        let title = if entry.title.trim().is_empty() {
            format!("Chapter {}", i + 1)
        } else {
            entry.title.clone()
        };

        spine.push(text_chapter(format!("chapter-{}", i + 1), title, segment.trim(), spine.len()));
    }

    spine
}

/// One chapter per page, for documents without a usable outline.
pub fn page_chapters(pages: &[String]) -> Vec<ChapterContent> {
    pages
        .iter()
        .enumerate()
        .map(|(i, page)| text_chapter(format!("page-{}", i + 1), format!("Page {}", i + 1), page, i))
        .collect()
}

/// One top-level entry per chapter, pointing at the chapter itself.
pub fn flat_toc(spine: &[ChapterContent]) -> Vec<TocEntry> {
    spine
        .iter()
        .map(|chapter| TocEntry::new(&chapter.title, &chapter.href))
        .collect()
}

fn text_chapter(href: String, title: String, text: &str, order: usize) -> ChapterContent {
    ChapterContent {
        id: href.clone(),
        href,
        title,
        content: text_to_html(text),
        text: collapse_whitespace(text),
        order,
    }
}
