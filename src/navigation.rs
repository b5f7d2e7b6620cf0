//! Reads EPUB navigation documents into [`NavNode`] trees.
//!
//! Supports the EPUB 3 XHTML navigation document (`<nav epub:type="toc">`)
//! and the EPUB 2 NCX (`<navMap>`). Hrefs are re-expressed relative to the
//! package directory so they line up with manifest hrefs.

use crate::package::{attribute, decode_href, join_path, parent_dir};
use crate::toc::{NavLabel, NavNode};
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;

/// Resolves hrefs found in a navigation document located at `doc_path`
/// (a container path) to package-relative paths, keeping any fragment.
struct HrefResolver<'a> {
    doc_dir: &'a str,
    base_dir: &'a str,
}

impl<'a> HrefResolver<'a> {
    fn new(doc_path: &'a str, base_dir: &'a str) -> Self {
        Self {
            doc_dir: parent_dir(doc_path),
            base_dir,
        }
    }

    fn resolve(&self, raw: &str) -> String {
        let (path, fragment) = match raw.split_once('#') {
            Some((path, fragment)) => (path, Some(fragment)),
            None => (raw, None),
        };

        let mut resolved = if path.is_empty() {
            String::new()
        } else {
            let absolute = join_path(self.doc_dir, &decode_href(path));
            match self.base_dir {
                "" => absolute,
                base => absolute
                    .strip_prefix(base)
                    .and_then(|rest| rest.strip_prefix('/'))
                    .map(str::to_string)
                    .unwrap_or(absolute),
            }
        };

        if let Some(fragment) = fragment {
            resolved.push('#');
            resolved.push_str(fragment);
        }
        resolved
    }
}

/// A navigation point under construction.
#[derive(Default)]
struct PendingPoint {
    title: String,
    href: Option<String>,
    children: Vec<NavNode>,
}

impl PendingPoint {
    fn finish(self) -> Option<NavNode> {
        let title = self.title.split_whitespace().collect::<Vec<_>>().join(" ");
        if title.is_empty() && self.href.is_none() && self.children.is_empty() {
            return None;
        }

        let label = NavLabel::new(title, self.href.clone().unwrap_or_default());
        Some(match (self.href, self.children.is_empty()) {
            (_, false) => NavNode::Group(label, self.children),
            (Some(_), true) => NavNode::Link(label),
            (None, true) => NavNode::Section(label),
        })
    }
}

fn text_of(e: &BytesText<'_>) -> String {
    match e.unescape() {
        Ok(text) => text.into_owned(),
        Err(_) => String::from_utf8_lossy(e).into_owned(),
    }
}

fn push_point(stack: &mut [PendingPoint], roots: &mut Vec<NavNode>, point: PendingPoint) {
    if let Some(node) = point.finish() {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => roots.push(node),
        }
    }
}

/// Parses the `toc` navigation of an EPUB 3 navigation document. Malformed
/// markup ends parsing early and keeps what was read so far.
pub fn parse_nav_document(xhtml: &str, doc_path: &str, base_dir: &str) -> Vec<NavNode> {
    let resolver = HrefResolver::new(doc_path, base_dir);
    let mut reader = Reader::from_str(xhtml);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut roots = Vec::new();
    let mut stack: Vec<PendingPoint> = Vec::new();
    // Depth of nested <nav> elements inside the toc nav, 0 when outside.
    let mut nav_depth = 0usize;
    let mut in_label = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"nav" if nav_depth > 0 => nav_depth += 1,
                b"nav" => {
                    let is_toc = attribute(&e, b"type")
                        .is_some_and(|t| t.split_whitespace().any(|t| t == "toc"));
                    if is_toc && roots.is_empty() {
                        nav_depth = 1;
                    }
                }
                b"li" if nav_depth > 0 => stack.push(PendingPoint::default()),
                b"a" | b"span" if nav_depth > 0 => {
                    in_label = true;
                    if let Some(point) = stack.last_mut() {
                        if point.href.is_none() {
                            point.href = attribute(&e, b"href").map(|href| resolver.resolve(&href));
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Text(e)) if in_label => {
                if let Some(point) = stack.last_mut() {
                    point.title.push_str(&text_of(&e));
                    point.title.push(' ');
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"a" | b"span" => in_label = false,
                b"li" if nav_depth > 0 => {
                    if let Some(point) = stack.pop() {
                        push_point(&mut stack, &mut roots, point);
                    }
                }
                b"nav" if nav_depth > 0 => {
                    nav_depth -= 1;
                    if nav_depth == 0 {
                        stack.clear();
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::warn!(error = %e, "navigation document is malformed, keeping partial toc");
                break;
            }
            _ => {}
        }
    }

    roots
}

fn set_content_src(stack: &mut [PendingPoint], e: &BytesStart<'_>, resolver: &HrefResolver<'_>) {
    if let Some(point) = stack.last_mut() {
        point.href = attribute(e, b"src").map(|src| resolver.resolve(&src));
    }
}

/// Parses the `navMap` of an EPUB 2 NCX document.
pub fn parse_ncx(xml: &str, doc_path: &str, base_dir: &str) -> Vec<NavNode> {
    let resolver = HrefResolver::new(doc_path, base_dir);
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut roots = Vec::new();
    let mut stack: Vec<PendingPoint> = Vec::new();
    let mut in_nav_map = false;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"navMap" => in_nav_map = true,
                b"navPoint" if in_nav_map => stack.push(PendingPoint::default()),
                b"text" => in_text = true,
                b"content" => set_content_src(&mut stack, &e, &resolver),
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"content" => {
                set_content_src(&mut stack, &e, &resolver);
            }
            Ok(Event::Text(e)) if in_text => {
                if let Some(point) = stack.last_mut() {
                    point.title.push_str(&text_of(&e));
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"navMap" => in_nav_map = false,
                b"text" => in_text = false,
                b"navPoint" => {
                    if let Some(point) = stack.pop() {
                        push_point(&mut stack, &mut roots, point);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::warn!(error = %e, "NCX is malformed, keeping partial toc");
                break;
            }
            _ => {}
        }
    }

    roots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_nav_document() {
        let xhtml = r##"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<body>
  <nav epub:type="landmarks"><ol><li><a href="Text/cover.xhtml">Cover</a></li></ol></nav>
  <nav epub:type="toc" id="toc">
    <h1>Contents</h1>
    <ol>
      <li><a href="Text/cover.xhtml">Cover</a></li>
      <li><span>Part <em>One</em></span>
        <ol>
          <li><a href="Text/ch%201.xhtml#start">Chapter 1</a></li>
          <li><a href="../OEBPS/Text/ch2.xhtml">Chapter 2</a></li>
        </ol>
      </li>
      <li><span>Appendix</span></li>
    </ol>
  </nav>
</body>
</html>"##;

        let toc = parse_nav_document(xhtml, "OEBPS/nav.xhtml", "OEBPS");

        assert_eq!(toc.len(), 3);
        assert_eq!(toc[0], NavNode::Link(NavLabel::new("Cover", "Text/cover.xhtml")));
        match &toc[1] {
            NavNode::Group(label, children) => {
                assert_eq!(label.title, "Part One");
                assert_eq!(label.href, "");
                assert_eq!(
                    children,
                    &vec![
                        NavNode::Link(NavLabel::new("Chapter 1", "Text/ch 1.xhtml#start")),
                        NavNode::Link(NavLabel::new("Chapter 2", "Text/ch2.xhtml")),
                    ]
                );
            }
            other => panic!("expected a group, got {other:?}"),
        }
        assert_eq!(toc[2], NavNode::Section(NavLabel::new("Appendix", "")));
    }

    #[test]
    fn nav_hrefs_resolve_relative_to_the_nav_document() {
        let xhtml = r##"<html><body><nav epub:type="toc"><ol>
            <li><a href="../Text/ch1.xhtml">One</a></li>
            <li><a href="#local">Here</a></li>
        </ol></nav></body></html>"##;

        let toc = parse_nav_document(xhtml, "OEBPS/Nav/nav.xhtml", "OEBPS");

        assert_eq!(toc[0], NavNode::Link(NavLabel::new("One", "Text/ch1.xhtml")));
        assert_eq!(toc[1], NavNode::Link(NavLabel::new("Here", "#local")));
    }

    #[test]
    fn parses_ncx_nav_map() {
        let ncx = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head><meta name="dtb:uid" content="id"/></head>
  <docTitle><text>Book</text></docTitle>
  <navMap>
    <navPoint id="p1" playOrder="1">
      <navLabel><text>Part I</text></navLabel>
      <content src="part1.html"/>
      <navPoint id="p2" playOrder="2">
        <navLabel><text>Chapter 1 &amp; More</text></navLabel>
        <content src="part1.html#chapter1"/>
      </navPoint>
    </navPoint>
    <navPoint id="p3" playOrder="3">
      <navLabel><text>Epilogue</text></navLabel>
      <content src="epilogue.html"/>
    </navPoint>
  </navMap>
</ncx>"#;

        let toc = parse_ncx(ncx, "toc.ncx", "");

        assert_eq!(
            toc,
            vec![
                NavNode::Group(
                    NavLabel::new("Part I", "part1.html"),
                    vec![NavNode::Link(NavLabel::new("Chapter 1 & More", "part1.html#chapter1"))],
                ),
                NavNode::Link(NavLabel::new("Epilogue", "epilogue.html")),
            ]
        );
    }

    #[test]
    fn missing_toc_yields_nothing() {
        assert!(parse_nav_document("<html><body><p>No nav</p></body></html>", "nav.xhtml", "").is_empty());
        assert!(parse_ncx("<ncx><navMap/></ncx>", "toc.ncx", "").is_empty());
    }
}
