use crate::chapters::{self, SpineDocument};
use crate::error::{ConvertError, ConvertResult};
use crate::metadata;
use crate::model::{BookMetadata, ChapterContent, ImageMap, TocEntry};
use crate::navigation;
use crate::package::{self, Package, CONTAINER_PATH};
use crate::reader::{BookSource, ImageResource};
use crate::toc;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

/// An EPUB container loaded into memory.
pub struct EpubData {
    entries: HashMap<String, Vec<u8>>,
    package: Package,
}

impl EpubData {
    pub fn open(path: &Path) -> ConvertResult<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> ConvertResult<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut entries = HashMap::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = match archive.by_index(i) {
                Ok(file) => file,
                Err(e) => {
                    tracing::warn!(index = i, error = %e, "skipping unreadable container entry");
                    continue;
                }
            };
            if file.is_dir() {
                continue;
            }

            let name = file.name().to_string();
            let mut data = Vec::new();
            match file.read_to_end(&mut data) {
                Ok(_) => {
                    entries.insert(name, data);
                }
                Err(e) => tracing::warn!(entry = %name, error = %e, "skipping unreadable container entry"),
            }
        }

        let container = text_entry(&entries, CONTAINER_PATH)
            .ok_or_else(|| ConvertError::epub(format!("missing {CONTAINER_PATH}")))?;
        let opf_path = package::parse_container(&container)?;
        let opf = text_entry(&entries, &opf_path)
            .ok_or_else(|| ConvertError::epub(format!("missing package document {opf_path}")))?;
        let package = package::parse_package(&opf, &opf_path)?;

        Ok(Self { entries, package })
    }

    fn item_text(&self, item: &package::ManifestItem) -> Option<String> {
        text_entry(&self.entries, &self.package.container_path(item))
    }

    fn navigation(&self) -> Vec<toc::NavNode> {
        let base_dir = &self.package.base_dir;

        let from_nav = self.package.nav_item().and_then(|item| {
            let path = self.package.container_path(item);
            let xhtml = self.item_text(item)?;
            Some(navigation::parse_nav_document(&xhtml, &path, base_dir))
        });
        if let Some(nodes) = from_nav.filter(|nodes| !nodes.is_empty()) {
            return nodes;
        }

        self.package
            .ncx_item()
            .and_then(|item| {
                let path = self.package.container_path(item);
                let xml = self.item_text(item)?;
                Some(navigation::parse_ncx(&xml, &path, base_dir))
            })
            .unwrap_or_default()
    }
}

/// Container entry decoded as UTF-8, dropping invalid sequences.
fn text_entry(entries: &HashMap<String, Vec<u8>>, name: &str) -> Option<String> {
    entries
        .get(name)
        .map(|data| String::from_utf8_lossy(data).replace('\u{FFFD}', ""))
}

impl BookSource for EpubData {
    fn metadata(&self) -> BookMetadata {
        metadata::from_dublin_core(&self.package.dublin_core)
    }

    fn images(&self) -> Vec<ImageResource> {
        self.package
            .manifest
            .iter()
            .filter(|item| item.is_image())
            .filter_map(|item| {
                let path = self.package.container_path(item);
                match self.entries.get(&path) {
                    Some(data) => Some(ImageResource {
                        original_href: item.href.clone(),
                        data: data.clone(),
                    }),
                    None => {
                        tracing::warn!(href = %item.href, "image listed in manifest is missing, skipping");
                        None
                    }
                }
            })
            .collect()
    }

    fn chapters(&self, images: &ImageMap) -> Vec<ChapterContent> {
        let mut documents = Vec::with_capacity(self.package.spine.len());

        for idref in &self.package.spine {
            let Some(item) = self.package.item(idref) else {
                tracing::warn!(idref = %idref, "spine references an unknown item, skipping");
                continue;
            };
            if !item.is_document() {
                tracing::debug!(href = %item.href, media_type = %item.media_type, "spine item is not a content document");
                continue;
            }
            let Some(markup) = self.item_text(item) else {
                tracing::warn!(href = %item.href, "spine document is missing from the container, skipping");
                continue;
            };
            documents.push((item, markup));
        }

        chapters::epub_chapters(
            documents.iter().map(|(item, markup)| SpineDocument {
                id: &item.id,
                href: &item.href,
                markup,
            }),
            images,
        )
    }

    fn toc(&self, _spine: &[ChapterContent]) -> Vec<TocEntry> {
        let entries = toc::normalize_toc(&self.navigation());
        if !entries.is_empty() {
            return entries;
        }

        tracing::warn!("empty table of contents, building fallback from the manifest");
        let nav_id = self.package.nav_item().map(|item| item.id.as_str());
        toc::fallback_toc(
            self.package
                .manifest
                .iter()
                .filter(|item| item.is_document() && Some(item.id.as_str()) != nav_id)
                .map(|item| item.href.as_str()),
        )
    }
}
