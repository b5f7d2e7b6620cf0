//! Navigation tree normalization.

use crate::model::TocEntry;

/// Bounds recursion into malformed, deeply nested navigation documents.
const MAX_DEPTH: usize = 32;

/// Title and target of one navigation point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavLabel {
    pub title: String,
    pub href: String,
}

impl NavLabel {
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            href: href.into(),
        }
    }
}

/// A navigation point as read from the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavNode {
    /// A plain navigable link.
    Link(NavLabel),
    /// A heading with no children.
    Section(NavLabel),
    /// A heading that groups further points.
    Group(NavLabel, Vec<NavNode>),
}

/// Maps source navigation points onto [`TocEntry`] trees, preserving order.
pub fn normalize_toc(nodes: &[NavNode]) -> Vec<TocEntry> {
    normalize_at(nodes, 0)
}

fn normalize_at(nodes: &[NavNode], depth: usize) -> Vec<TocEntry> {
    nodes
        .iter()
        .map(|node| match node {
            NavNode::Link(label) | NavNode::Section(label) => {
                TocEntry::new(&label.title, &label.href)
            }
            NavNode::Group(label, children) => {
                let children = if depth + 1 < MAX_DEPTH {
                    normalize_at(children, depth + 1)
                } else {
                    tracing::warn!(title = %label.title, "navigation nested too deeply, truncating");
                    Vec::new()
                };
                TocEntry::new(&label.title, &label.href).with_children(children)
            }
        })
        .collect()
}

/// Builds a flat table of contents with one entry per content document,
/// titled from its file name.
pub fn fallback_toc<'a>(documents: impl IntoIterator<Item = &'a str>) -> Vec<TocEntry> {
    documents
        .into_iter()
        .map(|name| TocEntry::new(title_from_filename(name), name))
        .collect()
}

/// `chapter_01.xhtml` becomes `Chapter 01`.
pub fn title_from_filename(name: &str) -> String {
    let bare = name.replace(".xhtml", "").replace(".html", "");
    let spaced = bare.replace(['_', '-'], " ");

    let mut title = String::with_capacity(spaced.len());
    let mut word_start = true;
    for c in spaced.chars() {
        if c.is_alphabetic() {
            if word_start {
                title.extend(c.to_uppercase());
            } else {
                title.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            title.push(c);
            word_start = true;
        }
    }
    title
}
