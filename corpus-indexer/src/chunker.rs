//! Section-aligned prose chunking with greedy packing.
//!
//! The packing policy determines chunk boundaries that retrieval quality
//! depends on, so it is reproduced exactly:
//! - paragraphs under [`MIN_LENGTH`] or starting with a list marker are
//!   dropped;
//! - a paragraph over [`MAX_CHUNK`] chars is split at the last space
//!   before the limit, repeatedly, until the remainder is short;
//! - a short paragraph joins the section's last open chunk when that chunk
//!   is under [`MERGE_SOFT_CAP`] chars and the merge stays within
//!   [`MAX_CHUNK`], otherwise it opens a new chunk.

use std::collections::HashSet;
use std::sync::OnceLock;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use regex::Regex;
use tracing::{debug, warn};

/// Minimum chunk (and paragraph) length in characters.
pub const MIN_LENGTH: usize = 100;
/// Hard upper bound for a packed chunk.
pub const MAX_CHUNK: usize = 1000;
/// A chunk under this size may still absorb a following short paragraph.
pub const MERGE_SOFT_CAP: usize = 600;

/// Section titles skipped wholesale (front/back matter).
pub const SKIP_TITLES: &[&str] = &[
    "contents",
    "preface",
    "index",
    "appendix",
    "acknowledgments",
    "bibliography",
    "about the authors",
    "chapter notes",
];

/// A bounded prose fragment, the unit of retrieval.
#[derive(Clone, Debug)]
pub struct Chunk {
    /// The chunk text.
    pub text: String,
    /// Section heading, formatted as `"# Title"`.
    pub section: String,
    /// Source file path.
    pub source: String,
}

fn section_split_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n#{1,2} ?").unwrap())
}

/// Splits markup into sections at top- and second-level heading
/// boundaries. The text before the first heading is discarded as front
/// matter.
pub fn split_sections(markup: &str) -> Vec<String> {
    section_split_re()
        .split(markup)
        .skip(1)
        .map(|s| s.to_string())
        .collect()
}

/// Chunks one section: denylist check, prose rendering, paragraph filter,
/// greedy packing. Packing state is local to the call, so sections can be
/// processed in parallel and concatenated.
pub fn chunk_section(section: &str, source: &str, skip_titles: &HashSet<String>) -> Vec<Chunk> {
    let section_title = section.lines().next().unwrap_or("").trim().to_string();
    if skip_titles.contains(&section_title.to_lowercase()) {
        return Vec::new();
    }

    let prose = render_prose(section);
    if prose.trim().is_empty() {
        return Vec::new();
    }

    let section_label = format!("# {section_title}");
    let mut chunks: Vec<Chunk> = Vec::new();

    for para in prose.split("\n\n") {
        let para = para.trim();
        if para.len() < MIN_LENGTH || para.starts_with("- ") {
            continue;
        }

        let mut rest = para.to_string();
        while rest.len() >= MIN_LENGTH {
            if rest.len() > MAX_CHUNK {
                let mid = split_point(&rest);
                chunks.push(Chunk {
                    text: rest[..mid].to_string(),
                    section: section_label.clone(),
                    source: source.to_string(),
                });
                rest = rest[mid..].trim_start().to_string();
            } else {
                match chunks.last_mut() {
                    Some(last) if last.text.len() < MERGE_SOFT_CAP => {
                        if last.text.len() + 1 + rest.len() > MAX_CHUNK {
                            chunks.push(Chunk {
                                text: rest.clone(),
                                section: section_label.clone(),
                                source: source.to_string(),
                            });
                        } else {
                            last.text.push(' ');
                            last.text.push_str(&rest);
                        }
                    }
                    _ => {
                        chunks.push(Chunk {
                            text: rest.clone(),
                            section: section_label.clone(),
                            source: source.to_string(),
                        });
                    }
                }
                break;
            }
        }
    }

    chunks
}

/// Chunks a whole document, fanning sections out to blocking workers.
///
/// Each worker owns its packing state and returns a self-contained chunk
/// list; results are concatenated in section order.
pub async fn chunk_document(markup: &str, source: &str) -> Vec<Chunk> {
    let skip: HashSet<String> = SKIP_TITLES.iter().map(|s| s.to_string()).collect();
    let sections = split_sections(markup);
    debug!(sections = sections.len(), %source, "chunking document");

    let mut handles = Vec::with_capacity(sections.len());
    for section in sections {
        let source = source.to_string();
        let skip = skip.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            chunk_section(&section, &source, &skip)
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        match handle.await {
            Ok(chunks) => all.extend(chunks),
            Err(e) => warn!(error = %e, "section chunking task failed"),
        }
    }
    all
}

/// Last space before the [`MAX_CHUNK`] mark, falling back to a hard split
/// at the nearest char boundary.
fn split_point(text: &str) -> usize {
    let mut limit = MAX_CHUNK.min(text.len());
    while limit > 0 && !text.is_char_boundary(limit) {
        limit -= 1;
    }
    match text[..limit].rfind(' ') {
        Some(pos) if pos > 0 => pos,
        _ => limit,
    }
}

/// Renders a markdown section to plain prose paragraphs.
///
/// Code blocks, tables, and list contents contribute nothing; heading text
/// is dropped (the section title is tracked separately).
fn render_prose(section: &str) -> String {
    let parser = Parser::new_ext(section, Options::ENABLE_TABLES);

    let mut out = String::new();
    let mut para = String::new();
    let mut skip_depth = 0usize;
    let mut in_paragraph = false;

    for event in parser {
        match event {
            Event::Start(Tag::CodeBlock(_) | Tag::Table(_) | Tag::List(_) | Tag::Heading { .. }) => {
                skip_depth += 1;
            }
            Event::End(
                TagEnd::CodeBlock | TagEnd::Table | TagEnd::List(_) | TagEnd::Heading(_),
            ) => {
                skip_depth = skip_depth.saturating_sub(1);
            }
            Event::Start(Tag::Paragraph) if skip_depth == 0 => {
                in_paragraph = true;
                para.clear();
            }
            Event::End(TagEnd::Paragraph) if skip_depth == 0 => {
                in_paragraph = false;
                if !para.trim().is_empty() {
                    out.push_str(para.trim());
                    out.push_str("\n\n");
                }
            }
            Event::Text(t) | Event::Code(t) if skip_depth == 0 && in_paragraph => {
                para.push_str(&t);
            }
            Event::SoftBreak | Event::HardBreak if skip_depth == 0 && in_paragraph => {
                para.push(' ');
            }
            _ => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skip_set() -> HashSet<String> {
        SKIP_TITLES.iter().map(|s| s.to_string()).collect()
    }

    fn sentence(n: usize) -> String {
        // ~56 chars per repetition; deterministic filler prose.
        "The quick brown fox jumps over the lazy dog near the bank. "
            .repeat(n)
            .trim_end()
            .to_string()
    }

    #[test]
    fn preamble_before_first_heading_is_discarded() {
        let markup = format!("front matter\n# Intro\n\n{}", sentence(3));
        let sections = split_sections(&markup);
        assert_eq!(sections.len(), 1);
        assert!(sections[0].starts_with("Intro"));
    }

    #[test]
    fn denylisted_section_is_skipped() {
        let section = format!("Preface\n\n{}", sentence(4));
        assert!(chunk_section(&section, "book.pdf", &skip_set()).is_empty());
    }

    #[test]
    fn short_and_list_paragraphs_are_dropped() {
        let section = format!(
            "Intro\n\ntoo short\n\n- a list item that is long enough to pass the length gate but still a list\n\n{}",
            sentence(3)
        );
        let chunks = chunk_section(&section, "book.pdf", &skip_set());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.starts_with("The quick brown fox"));
    }

    #[test]
    fn long_paragraph_splits_at_whitespace() {
        let section = format!("Intro\n\n{}", sentence(40)); // ~2240 chars
        let chunks = chunk_section(&section, "book.pdf", &skip_set());
        assert!(chunks.len() >= 2);
        for c in &chunks {
            assert!(c.text.len() <= MAX_CHUNK, "chunk too long: {}", c.text.len());
            // Splits land on spaces, so no chunk starts or ends mid-word.
            assert!(!c.text.starts_with(' '));
        }
    }

    #[test]
    fn short_paragraph_merges_into_open_chunk() {
        // First paragraph ~112 chars (open chunk, under the soft cap),
        // second ~112: they must merge into one chunk.
        let section = format!("Intro\n\n{}\n\n{}", sentence(2), sentence(2));
        let chunks = chunk_section(&section, "book.pdf", &skip_set());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.len() > 200);
    }

    #[test]
    fn merge_never_exceeds_max_chunk() {
        // Open chunk just under the soft cap plus a paragraph big enough to
        // overflow: the paragraph must start a new chunk instead.
        let first = sentence(10); // ~590 chars
        let second = sentence(9); // ~530 chars
        let section = format!("Intro\n\n{first}\n\n{second}");
        let chunks = chunk_section(&section, "book.pdf", &skip_set());
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.text.len() <= MAX_CHUNK));
    }

    #[test]
    fn chunk_size_invariant_holds() {
        let body = (1..=6).map(|n| sentence(n * 4)).collect::<Vec<_>>().join("\n\n");
        let section = format!("Long Section\n\n{body}");
        let chunks = chunk_section(&section, "book.pdf", &skip_set());
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.text.len() <= MAX_CHUNK);
            assert!(c.text.len() >= MIN_LENGTH);
            assert_eq!(c.section, "# Long Section");
        }
    }

    #[test]
    fn code_blocks_and_tables_are_excluded() {
        let section = format!(
            "Intro\n\n```\nlet x = 1;\n```\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n{}",
            sentence(3)
        );
        let chunks = chunk_section(&section, "book.pdf", &skip_set());
        assert_eq!(chunks.len(), 1);
        assert!(!chunks[0].text.contains("let x"));
        assert!(!chunks[0].text.contains('|'));
    }

    #[tokio::test]
    async fn parallel_document_chunking_preserves_section_order() {
        let markup = format!(
            "preamble\n# One\n\n{}\n## Two\n\n{}",
            sentence(3),
            sentence(3)
        );
        let chunks = chunk_document(&markup, "book.pdf").await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].section, "# One");
        assert_eq!(chunks[1].section, "# Two");
    }
}
