//! EPUB container and package document (OPF) parsing.

use crate::error::{ConvertError, ConvertResult};
use crate::metadata::DublinCore;
use percent_encoding::percent_decode_str;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::borrow::Cow;

pub const CONTAINER_PATH: &str = "META-INF/container.xml";

const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

/// One resource declared in the package manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    /// Decoded path relative to the package document's directory.
    pub href: String,
    pub media_type: String,
    pub properties: Vec<String>,
}

impl ManifestItem {
    pub fn is_document(&self) -> bool {
        matches!(
            self.media_type.as_str(),
            "application/xhtml+xml" | "text/html" | "application/x-dtbook+xml"
        )
    }

    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }

    fn is_nav(&self) -> bool {
        self.properties.iter().any(|p| p == "nav")
    }
}

/// The parsed package document.
#[derive(Debug, Clone, Default)]
pub struct Package {
    /// Directory of the package document inside the container, `""` at root.
    pub base_dir: String,
    pub dublin_core: DublinCore,
    pub manifest: Vec<ManifestItem>,
    /// Manifest ids in reading order.
    pub spine: Vec<String>,
    ncx_id: Option<String>,
}

impl Package {
    pub fn item(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.id == id)
    }

    /// Path of a manifest item inside the container.
    pub fn container_path(&self, item: &ManifestItem) -> String {
        join_path(&self.base_dir, &item.href)
    }

    /// The EPUB 3 navigation document, if declared.
    pub fn nav_item(&self) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.is_nav())
    }

    /// The EPUB 2 NCX, named by the spine or found by media type.
    pub fn ncx_item(&self) -> Option<&ManifestItem> {
        self.ncx_id
            .as_deref()
            .and_then(|id| self.item(id))
            .or_else(|| self.manifest.iter().find(|item| item.media_type == NCX_MEDIA_TYPE))
    }
}

/// Returns the container path of the package document named by
/// `META-INF/container.xml`.
pub fn parse_container(xml: &str) -> ConvertResult<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"rootfile" => {
                if let Some(path) = attribute(&e, b"full-path") {
                    return Ok(path);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ConvertError::epub(format!("container.xml: {e}"))),
            _ => {}
        }
    }

    Err(ConvertError::epub("container.xml names no package document"))
}

pub fn parse_package(xml: &str, opf_path: &str) -> ConvertResult<Package> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut package = Package {
        base_dir: parent_dir(opf_path).to_string(),
        ..Package::default()
    };

    let mut in_metadata = false;
    let mut field: Option<(String, String)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"metadata" => in_metadata = true,
                b"meta" | b"link" => {}
                b"spine" => package.ncx_id = attribute(&e, b"toc"),
                b"item" => package.manifest.extend(manifest_item(&e)),
                b"itemref" => package.spine.extend(attribute(&e, b"idref")),
                name if in_metadata => {
                    field = Some((String::from_utf8_lossy(name).into_owned(), String::new()));
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"item" => package.manifest.extend(manifest_item(&e)),
                b"itemref" => package.spine.extend(attribute(&e, b"idref")),
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if let Some((_, value)) = field.as_mut() {
                    value.push_str(&e.unescape().unwrap_or_else(|_| String::from_utf8_lossy(&e)));
                }
            }
            Ok(Event::CData(e)) => {
                if let Some((_, value)) = field.as_mut() {
                    value.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"metadata" => in_metadata = false,
                _ => {
                    if let Some((name, value)) = field.take() {
                        package
                            .dublin_core
                            .entry(name)
                            .or_default()
                            .push(value.trim().to_string());
                    }
                }
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ConvertError::epub(format!("{opf_path}: {e}"))),
            _ => {}
        }
    }

    tracing::debug!(
        manifest = package.manifest.len(),
        spine = package.spine.len(),
        "parsed package document"
    );
    Ok(package)
}

fn manifest_item(e: &BytesStart<'_>) -> Option<ManifestItem> {
    let id = attribute(e, b"id")?;
    let href = attribute(e, b"href")?;
    Some(ManifestItem {
        id,
        href: decode_href(&href),
        media_type: attribute(e, b"media-type").unwrap_or_default(),
        properties: attribute(e, b"properties")
            .map(|p| p.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default(),
    })
}

/// Value of the attribute with local name `name`, entity-decoded when
/// possible.
pub(crate) fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == name)
        .map(|attr| match attr.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        })
}

pub(crate) fn decode_href(href: &str) -> String {
    match percent_decode_str(href).decode_utf8_lossy() {
        Cow::Borrowed(same) => same.to_string(),
        Cow::Owned(decoded) => decoded,
    }
}

/// Directory part of a container path, `""` for top-level entries.
pub(crate) fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Resolves `relative` against `base_dir`, folding `.` and `..` segments.
pub(crate) fn join_path(base_dir: &str, relative: &str) -> String {
    let mut segments: Vec<&str> = if relative.starts_with('/') {
        Vec::new()
    } else {
        base_dir.split('/').filter(|s| !s.is_empty()).collect()
    };

    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>A Tale &amp; More</dc:title>
    <dc:creator>First Author</dc:creator>
    <dc:creator>Second Author</dc:creator>
    <dc:language>fr</dc:language>
    <dc:identifier id="uid">urn:uuid:1234</dc:identifier>
    <meta property="dcterms:modified">2024-01-01T00:00:00Z</meta>
    <meta name="cover" content="cover-img"/>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="c1" href="Text/chapter%201.xhtml" media-type="application/xhtml+xml"/>
    <item id="cover-img" href="Images/cover.jpg" media-type="image/jpeg" properties="cover-image"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="c1"/>
    <itemref idref="missing"/>
  </spine>
</package>"#;

    #[test]
    fn finds_package_document() {
        let xml = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;
        assert_eq!(parse_container(xml).unwrap(), "OEBPS/content.opf");
        assert!(parse_container("<container/>").is_err());
    }

    #[test]
    fn parses_metadata_manifest_and_spine() {
        let package = parse_package(OPF, "OEBPS/content.opf").unwrap();

        assert_eq!(package.base_dir, "OEBPS");
        assert_eq!(package.dublin_core["title"], ["A Tale & More"]);
        assert_eq!(package.dublin_core["creator"], ["First Author", "Second Author"]);
        assert_eq!(package.dublin_core["identifier"], ["urn:uuid:1234"]);
        assert!(!package.dublin_core.contains_key("meta"));

        assert_eq!(package.spine, ["c1", "missing"]);
        let chapter = package.item("c1").unwrap();
        assert_eq!(chapter.href, "Text/chapter 1.xhtml");
        assert!(chapter.is_document());
        assert_eq!(package.container_path(chapter), "OEBPS/Text/chapter 1.xhtml");
        assert!(package.item("cover-img").unwrap().is_image());

        assert_eq!(package.nav_item().unwrap().id, "nav");
        assert_eq!(package.ncx_item().unwrap().href, "toc.ncx");
    }

    #[test]
    fn spine_accepts_explicitly_closed_itemrefs() {
        let opf = r#"<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>T</dc:title></metadata>
  <manifest>
    <item id="c1" href="c1.xhtml" media-type="application/xhtml+xml"></item>
    <item id="c2" href="c2.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine><itemref idref="c1"></itemref><itemref idref="c2"/></spine>
</package>"#;

        let package = parse_package(opf, "content.opf").unwrap();

        assert_eq!(package.manifest.len(), 2);
        assert_eq!(package.spine, ["c1", "c2"]);
        assert_eq!(package.dublin_core["title"], ["T"]);
    }

    #[test]
    fn resolves_relative_paths() {
        assert_eq!(join_path("OEBPS/Text", "../Images/a.png"), "OEBPS/Images/a.png");
        assert_eq!(join_path("", "./chapter.xhtml"), "chapter.xhtml");
        assert_eq!(join_path("OEBPS", "/root.xhtml"), "root.xhtml");
        assert_eq!(parent_dir("content.opf"), "");
        assert_eq!(parent_dir("a/b/c.opf"), "a/b");
    }
}
