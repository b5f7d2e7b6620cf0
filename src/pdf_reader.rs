use crate::chapters;
use crate::error::ConvertResult;
use crate::metadata::{self, PdfInfo};
use crate::model::{BookMetadata, ChapterContent, ImageMap, TocEntry};
use crate::outline::{self, OutlineNode};
use crate::reader::{BookSource, ImageResource};
use crate::text::normalize_pdf_text;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Bounds outline nesting and name-tree descent in malformed files.
const MAX_TREE_DEPTH: usize = 64;

pub struct PdfData {
    document: Document,
    fallback_title: String,
}

impl PdfData {
    pub fn open(path: &Path) -> ConvertResult<Self> {
        let document = Document::load(path)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::from_document(document, stem))
    }

    /// `fallback_title` is used when the info dictionary has no title.
    pub fn from_document(document: Document, fallback_title: impl Into<String>) -> Self {
        Self {
            document,
            fallback_title: fallback_title.into(),
        }
    }

    fn info(&self) -> PdfInfo {
        let Some(info) = self
            .document
            .trailer
            .get(b"Info")
            .ok()
            .and_then(|obj| self.dictionary(obj))
        else {
            return PdfInfo::default();
        };

        PdfInfo {
            title: self.info_field(info, b"Title"),
            author: self.info_field(info, b"Author"),
            subject: self.info_field(info, b"Subject"),
            producer: self.info_field(info, b"Producer"),
            creation_date: self.info_field(info, b"CreationDate"),
        }
    }

    fn info_field(&self, info: &Dictionary, key: &[u8]) -> Option<String> {
        info.get(key).ok().and_then(|obj| self.text(obj))
    }

    /// Normalized text of every page, in page order. A page whose text
    /// cannot be extracted is empty.
    fn page_texts(&self) -> Vec<String> {
        self.document
            .get_pages()
            .into_keys()
            .map(|number| match self.document.extract_text(&[number]) {
                Ok(text) => normalize_pdf_text(&text),
                Err(e) => {
                    tracing::warn!(page = number, error = %e, "could not extract page text");
                    String::new()
                }
            })
            .collect()
    }

    /// The bookmark tree, with destinations resolved to zero-based pages.
    pub fn outline(&self) -> Vec<OutlineNode> {
        let Some(first) = self
            .document
            .catalog()
            .ok()
            .and_then(|catalog| catalog.get(b"Outlines").ok())
            .and_then(|obj| self.dictionary(obj))
            .and_then(|outlines| outlines.get(b"First").ok())
        else {
            return Vec::new();
        };

        let walker = OutlineWalker {
            pdf: self,
            page_index: self
                .document
                .get_pages()
                .into_values()
                .enumerate()
                .map(|(index, id)| (id, index))
                .collect(),
        };
        let mut visited = HashSet::new();
        walker.siblings(first, 0, &mut visited)
    }

    fn dictionary<'a>(&'a self, obj: &'a Object) -> Option<&'a Dictionary> {
        self.document
            .dereference(obj)
            .ok()
            .and_then(|(_, obj)| obj.as_dict().ok())
    }

    fn text(&self, obj: &Object) -> Option<String> {
        let (_, obj) = self.document.dereference(obj).ok()?;
        let text = match lopdf::decode_text_string(obj) {
            Ok(text) => text,
            Err(_) => String::from_utf8_lossy(obj.as_str().ok()?).into_owned(),
        };
        Some(text.trim_start_matches('\u{FEFF}').trim().to_string())
    }
}

struct OutlineWalker<'a> {
    pdf: &'a PdfData,
    page_index: HashMap<ObjectId, usize>,
}

impl<'a> OutlineWalker<'a> {
    /// Follows a `First`/`Next` sibling chain.
    fn siblings(&self, first: &Object, depth: usize, visited: &mut HashSet<ObjectId>) -> Vec<OutlineNode> {
        let mut nodes = Vec::new();
        if depth >= MAX_TREE_DEPTH {
            tracing::warn!(depth, "outline nested too deeply, truncating");
            return nodes;
        }

        let mut current = Some(first);
        while let Some(obj) = current.take() {
            let Ok((id, item)) = self.pdf.document.dereference(obj) else {
                break;
            };
            if let Some(id) = id {
                if !visited.insert(id) {
                    tracing::warn!(?id, "outline item visited twice, stopping");
                    break;
                }
            }
            let Ok(item) = item.as_dict() else {
                break;
            };

            let children = item
                .get(b"First")
                .map(|child| self.siblings(child, depth + 1, visited))
                .unwrap_or_default();
            nodes.push(OutlineNode {
                title: item
                    .get(b"Title")
                    .ok()
                    .and_then(|title| self.pdf.text(title))
                    .unwrap_or_default(),
                page: self.item_page(item),
                children,
            });

            current = item.get(b"Next").ok();
        }
        nodes
    }

    fn item_page(&self, item: &Dictionary) -> Option<usize> {
        if let Ok(dest) = item.get(b"Dest") {
            return self.destination_page(dest, 0);
        }

        let action = item.get(b"A").ok().and_then(|a| self.pdf.dictionary(a))?;
        let kind = action.get(b"S").and_then(Object::as_name).ok()?;
        if kind != b"GoTo" {
            return None;
        }
        self.destination_page(action.get(b"D").ok()?, 0)
    }

    /// Resolves an explicit (`[page /Fit ...]`) or named destination.
    fn destination_page(&self, dest: &Object, depth: usize) -> Option<usize> {
        if depth > 2 {
            return None;
        }
        let (_, dest) = self.pdf.document.dereference(dest).ok()?;

        match dest {
            Object::Array(parts) => {
                let target = parts.first()?;
                match target {
                    Object::Reference(id) => self.page_index.get(id).copied(),
                    Object::Integer(page) => usize::try_from(*page).ok(),
                    _ => None,
                }
            }
            Object::Dictionary(dict) => self.destination_page(dict.get(b"D").ok()?, depth + 1),
            Object::Name(name) => {
                let named = self.named_destination(name)?;
                self.destination_page(named, depth + 1)
            }
            Object::String(name, _) => {
                let named = self.named_destination(name)?;
                self.destination_page(named, depth + 1)
            }
            _ => None,
        }
    }

    /// Looks a destination name up in the catalog `Dests` dictionary and
    /// then in the `Names` tree.
    fn named_destination(&self, name: &[u8]) -> Option<&'a Object> {
        let pdf: &'a PdfData = self.pdf;
        let catalog = pdf.document.catalog().ok()?;

        let from_dests = catalog
            .get(b"Dests")
            .ok()
            .and_then(|dests| pdf.dictionary(dests))
            .and_then(|dests| dests.get(name).ok());
        if from_dests.is_some() {
            return from_dests;
        }

        let root = catalog
            .get(b"Names")
            .ok()
            .and_then(|names| pdf.dictionary(names))
            .and_then(|names| names.get(b"Dests").ok())
            .and_then(|tree| pdf.dictionary(tree))?;
        self.name_tree_lookup(root, name, 0)
    }

    fn name_tree_lookup(&self, node: &'a Dictionary, name: &[u8], depth: usize) -> Option<&'a Object> {
        if depth >= MAX_TREE_DEPTH {
            return None;
        }

        if let Ok(pairs) = node.get(b"Names").and_then(Object::as_array) {
            for pair in pairs.chunks(2) {
                if let [key, value] = pair {
                    let matches = self
                        .pdf
                        .document
                        .dereference(key)
                        .ok()
                        .and_then(|(_, key)| key.as_str().ok())
                        .is_some_and(|key| key == name);
                    if matches {
                        return Some(value);
                    }
                }
            }
        }

        let kids = node.get(b"Kids").and_then(Object::as_array).ok()?;
        kids.iter()
            .filter_map(|kid| self.pdf.dictionary(kid))
            .find_map(|kid| self.name_tree_lookup(kid, name, depth + 1))
    }
}

impl BookSource for PdfData {
    fn metadata(&self) -> BookMetadata {
        metadata::from_pdf_info(&self.info(), &self.fallback_title)
    }

    fn images(&self) -> Vec<ImageResource> {
        Vec::new()
    }

    fn chapters(&self, _images: &ImageMap) -> Vec<ChapterContent> {
        tracing::info!("extracting PDF text");
        let pages = self.page_texts();

        let selected = outline::select_chapter_level(&self.outline());
        if selected.is_empty() {
            tracing::warn!(pages = pages.len(), "no PDF outline found, one chapter per page");
            return chapters::page_chapters(&pages);
        }

        tracing::info!(entries = selected.len(), "building chapter ranges from the outline");
        chapters::pdf_chapters(&pages, &selected)
    }

    fn toc(&self, spine: &[ChapterContent]) -> Vec<TocEntry> {
        chapters::flat_toc(spine)
    }
}
