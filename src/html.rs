use crate::model::ImageMap;
use crate::text::{collapse_whitespace, escape_html};
use ego_tree::NodeRef;
use percent_encoding::percent_decode_str;
use regex::{Captures, Regex};
use scraper::{Html, Node, Selector};
use std::borrow::Cow;
use std::sync::LazyLock;

static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());

static BODY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<body[\s>/]").unwrap());

/// An XML empty-element tag such as `<a id="x"/>`.
static SELF_CLOSING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r##"<([A-Za-z][\w:.-]*)((?:\s+[^\s"'=/<>]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+))?)*)\s*/>"##,
    )
    .unwrap()
});

/// Elements dropped together with their whole subtree.
const STRIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "iframe", "video", "nav", "form", "button", "input",
];

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// A content document reduced to embeddable markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanFragment {
    /// Inner markup of `<body>`, or the whole fragment when there is none.
    pub html: String,
    pub text: String,
}

/// Rewrites image references against `images`, strips unsafe and noise
/// elements and comments, and keeps only the body's inner markup.
///
/// Content documents are usually XHTML, so empty-element tags are opened and
/// closed explicitly before the HTML parser sees them.
pub fn sanitize_fragment(source: &str, images: &ImageMap) -> CleanFragment {
    let source = expand_empty_elements(source);

    let mut html = String::with_capacity(source.len());
    let mut text = String::new();

    if BODY_TAG.is_match(&source) {
        let document = Html::parse_document(&source);
        if let Some(body) = document.select(&BODY).next() {
            for child in body.children() {
                write_node(child, images, &mut html);
                collect_text(child, &mut text);
            }
        }
    } else {
        let fragment = Html::parse_fragment(&source);
        for child in fragment.root_element().children() {
            write_node(child, images, &mut html);
            collect_text(child, &mut text);
        }
    }

    CleanFragment {
        html,
        text: collapse_whitespace(&text),
    }
}

/// Turns `<tag .../>` into `<tag ...></tag>` for every non-void element.
fn expand_empty_elements(source: &str) -> Cow<'_, str> {
    SELF_CLOSING.replace_all(source, |caps: &Captures<'_>| {
        let name = &caps[1];
        if VOID_ELEMENTS.contains(&name.to_ascii_lowercase().as_str()) {
            caps[0].to_string()
        } else {
            format!("<{name}{}></{name}>", &caps[2])
        }
    })
}

/// Looks up a markup image reference, first by its decoded full form and then
/// by its bare filename. `None` leaves the reference dangling.
pub fn resolve_image<'a>(reference: &str, images: &'a ImageMap) -> Option<&'a str> {
    let decoded = percent_decode_str(reference).decode_utf8_lossy();
    if let Some(path) = images.get(decoded.as_ref()) {
        return Some(path);
    }

    let filename = decoded.rsplit('/').next().unwrap_or_default();
    images.get(filename).map(String::as_str)
}

fn is_stripped(name: &str) -> bool {
    STRIPPED_ELEMENTS.contains(&name)
}

fn is_image_reference(element: &str, attribute: &str) -> bool {
    matches!((element, attribute), ("img", "src") | ("image", "href"))
}

fn write_node(node: NodeRef<'_, Node>, images: &ImageMap, out: &mut String) {
    match node.value() {
        Node::Text(text) => out.push_str(&escape_html(text)),
        Node::Element(element) => {
            let name = element.name();
            if is_stripped(name) {
                return;
            }

            out.push('<');
            out.push_str(name);
            for (attribute, value) in element.attrs.iter() {
                let value: &str = value;
                let value = if is_image_reference(name, &attribute.local) {
                    resolve_image(value, images).unwrap_or(value)
                } else {
                    value
                };
                out.push(' ');
                if let Some(prefix) = &attribute.prefix {
                    out.push_str(prefix);
                    out.push(':');
                }
                out.push_str(&attribute.local);
                out.push_str("=\"");
                out.push_str(&escape_html(value));
                out.push('"');
            }
            out.push('>');

            if VOID_ELEMENTS.contains(&name) {
                return;
            }
            for child in node.children() {
                write_node(child, images, out);
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        Node::Document | Node::Fragment => {
            for child in node.children() {
                write_node(child, images, out);
            }
        }
        Node::Comment(_) | Node::Doctype(_) | Node::ProcessingInstruction(_) => {}
    }
}

fn collect_text(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => {
            out.push_str(text);
            out.push(' ');
        }
        Node::Element(element) if is_stripped(element.name()) => {}
        Node::Element(_) | Node::Document | Node::Fragment => {
            for child in node.children() {
                collect_text(child, out);
            }
        }
        _ => {}
    }
}
