//! Picks the bookmark depth of a PDF outline that most likely holds the
//! chapter divisions.

use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

static CHAPTER_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:chapter\b|chap\.|prologue\b|epilogue\b|appendix\b)").unwrap()
});

static PART_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(part|book|section)\b").unwrap());

/// Minimum level size, and minimum chapter-keyword hits, for a level to win
/// on score.
const MIN_CHAPTER_SIGNAL: usize = 3;

/// A bookmark as read from the document, before any selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutlineNode {
    pub title: String,
    /// Zero-based page the bookmark points at, if its destination resolves.
    pub page: Option<usize>,
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    pub fn new(title: impl Into<String>, page: usize) -> Self {
        Self {
            title: title.into(),
            page: Some(page),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<OutlineNode>) -> Self {
        self.children = children;
        self
    }
}

/// A selected chapter start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineItem {
    pub title: String,
    pub page: usize,
}

/// Returns the entries of the chosen outline level, ascending by page with
/// no page repeated. An empty result means the document has no usable
/// outline and should be split per page.
pub fn select_chapter_level(outline: &[OutlineNode]) -> Vec<OutlineItem> {
    let mut levels: BTreeMap<usize, Vec<OutlineItem>> = BTreeMap::new();
    collect_levels(outline, 0, &mut levels);

    let levels: BTreeMap<usize, Vec<OutlineItem>> = levels
        .into_iter()
        .map(|(depth, entries)| (depth, dedupe_by_page(entries)))
        .collect();

    let Some((&shallowest, _)) = levels.first_key_value() else {
        return Vec::new();
    };

    if let Some(top) = levels.get(&0).filter(|top| !top.is_empty()) {
        let part_like = count_matching(top, &PART_LIKE);
        if part_like >= (top.len() / 2).max(2) {
            if let Some(next) = levels.get(&1).filter(|next| !next.is_empty()) {
                tracing::debug!(part_like, "outline top level groups parts, using level 1");
                return next.clone();
            }
        }
    }

    let mut best: Option<(usize, LevelScore)> = None;
    for (&depth, entries) in &levels {
        if entries.len() < MIN_CHAPTER_SIGNAL {
            continue;
        }
        let score = LevelScore::of(entries);
        let better = match &best {
            Some((_, current)) => score.beats(current),
            None => true,
        };
        if better {
            best = Some((depth, score));
        }
    }

    if let Some((depth, score)) = best {
        if score.chapter_like >= MIN_CHAPTER_SIGNAL {
            tracing::debug!(depth, chapter_like = score.chapter_like, "selected outline level");
            return levels[&depth].clone();
        }
    }

    let fallback = if levels.contains_key(&0) { 0 } else { shallowest };
    tracing::debug!(depth = fallback, "no chapter-like outline level, falling back");
    levels[&fallback].clone()
}

fn collect_levels(nodes: &[OutlineNode], depth: usize, levels: &mut BTreeMap<usize, Vec<OutlineItem>>) {
    for node in nodes {
        let title = node.title.trim();
        if let Some(page) = node.page.filter(|_| !title.is_empty()) {
            levels.entry(depth).or_default().push(OutlineItem {
                title: title.to_string(),
                page,
            });
        }
        collect_levels(&node.children, depth + 1, levels);
    }
}

/// Drops exact (title, page) repeats, then keeps the first entry for each
/// page in page order.
fn dedupe_by_page(entries: Vec<OutlineItem>) -> Vec<OutlineItem> {
    let mut seen = HashSet::new();
    let mut unique: Vec<OutlineItem> = entries
        .into_iter()
        .filter(|entry| seen.insert((entry.title.clone(), entry.page)))
        .collect();

    // Stable, so the first entry among equal pages wins.
    unique.sort_by_key(|entry| entry.page);
    unique.dedup_by_key(|entry| entry.page);
    unique
}

fn count_matching(entries: &[OutlineItem], pattern: &Regex) -> usize {
    entries.iter().filter(|entry| pattern.is_match(&entry.title)).count()
}

/// Lexicographic (keyword hits, hit ratio, size) ordering of a level.
#[derive(Debug, Clone, Copy)]
struct LevelScore {
    chapter_like: usize,
    size: usize,
}

impl LevelScore {
    fn of(entries: &[OutlineItem]) -> Self {
        Self {
            chapter_like: count_matching(entries, &CHAPTER_LIKE),
            size: entries.len(),
        }
    }

    /// Strictly greater, so the shallower level keeps a tie.
    fn beats(&self, other: &LevelScore) -> bool {
        if self.chapter_like != other.chapter_like {
            return self.chapter_like > other.chapter_like;
        }
        // Compare hit ratios exactly: a/b against c/d as a*d against c*b.
        let ours = self.chapter_like * other.size;
        let theirs = other.chapter_like * self.size;
        if ours != theirs {
            return ours > theirs;
        }
        self.size > other.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles(items: &[OutlineItem]) -> Vec<&str> {
        items.iter().map(|item| item.title.as_str()).collect()
    }

    #[test]
    fn empty_outline_selects_nothing() {
        assert!(select_chapter_level(&[]).is_empty());

        let unresolved = OutlineNode {
            title: "Lost".to_string(),
            page: None,
            children: Vec::new(),
        };
        assert!(select_chapter_level(&[unresolved]).is_empty());
    }

    #[test]
    fn part_grouping_prefers_level_one() {
        let outline: Vec<OutlineNode> = (0..5)
            .map(|part| {
                let chapters = (0..12)
                    .filter(|c| c % 5 == part)
                    .map(|c| OutlineNode::new(format!("Chapter {}", c + 1), 10 + c * 10))
                    .collect();
                OutlineNode::new(format!("Part {}", part + 1), 10 + part * 10).with_children(chapters)
            })
            .collect();

        let selected = select_chapter_level(&outline);

        assert_eq!(selected.len(), 12);
        assert!(selected.iter().all(|item| item.title.starts_with("Chapter")));
        assert!(selected.windows(2).all(|pair| pair[0].page < pair[1].page));
    }

    #[test]
    fn weak_chapter_signal_falls_back_to_top_level() {
        let outline = vec![
            OutlineNode::new("Chapter 1", 0),
            OutlineNode::new("Interlude", 5),
            OutlineNode::new("Chapter 2", 9),
            OutlineNode::new("Afterword", 14),
        ];

        let selected = select_chapter_level(&outline);

        assert_eq!(titles(&selected), ["Chapter 1", "Interlude", "Chapter 2", "Afterword"]);
    }

    #[test]
    fn deeper_level_with_chapter_titles_wins() {
        let outline = vec![
            OutlineNode::new("Front Matter", 0),
            OutlineNode::new("The Story", 2).with_children(vec![
                OutlineNode::new("Prologue", 2),
                OutlineNode::new("Chapter One", 4),
                OutlineNode::new("Chapter Two", 8),
                OutlineNode::new("Epilogue", 12),
            ]),
            OutlineNode::new("Back Matter", 15),
        ];

        let selected = select_chapter_level(&outline);

        assert_eq!(titles(&selected), ["Prologue", "Chapter One", "Chapter Two", "Epilogue"]);
    }

    #[test]
    fn duplicate_pages_keep_first_entry() {
        let outline = vec![
            OutlineNode::new("Intro", 3),
            OutlineNode::new("Cover", 0),
            OutlineNode::new("Intro", 3),
            OutlineNode::new("Also page three", 3),
            OutlineNode::new("End", 9),
        ];

        let selected = select_chapter_level(&outline);

        assert_eq!(
            selected,
            vec![
                OutlineItem { title: "Cover".to_string(), page: 0 },
                OutlineItem { title: "Intro".to_string(), page: 3 },
                OutlineItem { title: "End".to_string(), page: 9 },
            ]
        );
    }

    #[test]
    fn score_tie_keeps_shallower_level() {
        let chapters = |offset: usize| -> Vec<OutlineNode> {
            (0..3)
                .map(|i| OutlineNode::new(format!("Chapter {}", i + 1), offset + i))
                .collect()
        };
        let mut outline = chapters(0);
        outline[0].children = chapters(20);

        let selected = select_chapter_level(&outline);

        assert_eq!(selected[0].page, 0);
    }

    #[test]
    fn falls_back_to_shallowest_when_top_level_unresolved() {
        let outline = vec![OutlineNode {
            title: "Unlinked".to_string(),
            page: None,
            children: vec![OutlineNode::new("Only", 4)],
        }];

        let selected = select_chapter_level(&outline);

        assert_eq!(titles(&selected), ["Only"]);
    }

    #[test]
    fn chapter_keywords_are_word_bounded() {
        for title in ["Chapter 1", "CHAP. 4", "Prologue", "Appendix B: Tables"] {
            assert!(CHAPTER_LIKE.is_match(title), "{title}");
        }
        for title in ["Chapterhouse", "Cheap.", "Unprologued"] {
            assert!(!CHAPTER_LIKE.is_match(title), "{title}");
        }
        assert!(PART_LIKE.is_match("Book Two"));
        assert!(!PART_LIKE.is_match("Partition"));
    }
}
