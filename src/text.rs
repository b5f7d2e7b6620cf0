//! Repairs flattened PDF text into one paragraph per line and renders it as
//! simple paragraph markup.

use regex::Regex;
use std::sync::LazyLock;

static HYPHEN_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<head>[A-Za-z])[-\u{2010}\u{2011}\u{00AD}]\s*\n\s*(?P<tail>[A-Za-z])").unwrap()
});

static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([-*]|\d+[.)])\s").unwrap());

static TERMINAL_PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?:;)]$").unwrap());

/// Normalizes text extracted from a PDF page.
///
/// Unifies line endings, re-joins words hyphenated across a line break,
/// merges wrapped lines back into their paragraph and collapses runs of
/// blank lines into a single paragraph break.
pub fn normalize_pdf_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let joined = HYPHEN_BREAK.replace_all(&unified, "$head$tail");

    let mut rebuilt: Vec<String> = Vec::new();
    for line in joined.split('\n') {
        let stripped = line.trim();
        if stripped.is_empty() {
            rebuilt.push(String::new());
            continue;
        }

        // A blank predecessor means this line opens a paragraph.
        let continues_paragraph = match rebuilt.last() {
            Some(prev) if !prev.is_empty() => {
                !LIST_ITEM.is_match(stripped) && !TERMINAL_PUNCTUATION.is_match(prev)
            }
            _ => false,
        };

        if continues_paragraph {
            if let Some(prev) = rebuilt.last_mut() {
                prev.push(' ');
                prev.push_str(stripped);
            }
        } else {
            rebuilt.push(stripped.to_string());
        }
    }

    let mut compact: Vec<String> = Vec::with_capacity(rebuilt.len());
    for line in rebuilt {
        if line.is_empty() && compact.last().is_some_and(|l: &String| l.is_empty()) {
            continue;
        }
        compact.push(line);
    }

    compact.join("\n").trim().to_string()
}

/// Renders each non-empty line as an escaped `<p>` element.
pub fn text_to_html(text: &str) -> String {
    let paragraphs: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| format!("<p>{}</p>", escape_html(line)))
        .collect();

    if paragraphs.is_empty() {
        "<p></p>".to_string()
    } else {
        paragraphs.concat()
    }
}

/// Collapses every whitespace run to a single space.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_hyphenated_words() {
        assert_eq!(
            normalize_pdf_text("The cold cli-\nmate was harsh."),
            "The cold climate was harsh."
        );
    }

    #[test]
    fn merges_soft_hyphen_and_unicode_hyphen() {
        assert_eq!(normalize_pdf_text("serv\u{00AD}\n ices"), "services");
        assert_eq!(normalize_pdf_text("co\u{2010}  \n  operate"), "cooperate");
    }

    #[test]
    fn joins_wrapped_lines_until_terminal_punctuation() {
        let input = "This sentence wraps\nacross two lines.\nNext sentence.";
        assert_eq!(
            normalize_pdf_text(input),
            "This sentence wraps across two lines.\nNext sentence."
        );
    }

    #[test]
    fn keeps_single_paragraph_break() {
        assert_eq!(
            normalize_pdf_text("First paragraph.\n\nSecond paragraph."),
            "First paragraph.\n\nSecond paragraph."
        );
    }

    #[test]
    fn collapses_repeated_blank_lines() {
        assert_eq!(
            normalize_pdf_text("First paragraph.\n\n\n\nSecond paragraph."),
            "First paragraph.\n\nSecond paragraph."
        );
    }

    #[test]
    fn paragraph_start_is_never_merged() {
        assert_eq!(
            normalize_pdf_text("no terminal punctuation\n\nnew paragraph"),
            "no terminal punctuation\n\nnew paragraph"
        );
    }

    #[test]
    fn list_items_start_new_lines() {
        let input = "Ingredients\n- flour\n- water\n1. mix\n2) bake";
        assert_eq!(
            normalize_pdf_text(input),
            "Ingredients\n- flour\n- water\n1. mix\n2) bake"
        );
    }

    #[test]
    fn unifies_line_endings() {
        assert_eq!(normalize_pdf_text("one\r\ntwo\rthree."), "one two three.");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(normalize_pdf_text(""), "");
        assert_eq!(normalize_pdf_text("\n\n  \n"), "");
    }

    #[test]
    fn renders_paragraph_per_line() {
        assert_eq!(
            text_to_html("Fish & chips\n\n<b>bold</b>"),
            "<p>Fish &amp; chips</p><p>&lt;b&gt;bold&lt;/b&gt;</p>"
        );
        assert_eq!(text_to_html("   \n"), "<p></p>");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(collapse_whitespace("  a\n\tb   c "), "a b c");
    }
}
