//! Document conversion: source files into a prose-oriented markup form.
//!
//! Markdown and plain-text files are their own markup. PDFs go through
//! text extraction plus a heading-reconstruction pass, and the result is
//! cached on disk keyed by document name so repeated indexing runs skip
//! re-conversion. Page-break markers (`\n-----\n`) are stripped on every
//! load, cache hit or not.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::errors::IndexError;

/// Marker separating pages in converted PDF markup.
const PAGE_BREAK: &str = "\n-----\n";

/// Maximum line length still considered a heading candidate.
const HEADING_MAX_LEN: usize = 60;

/// Extensions the indexer picks up from the corpus directory.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "md", "txt"];

/// Whether `path` has a supported extension (case-insensitive).
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Loads the markup form of a document, converting and caching as needed.
///
/// # Errors
/// Returns [`IndexError::Conversion`] when extraction fails and
/// [`IndexError::UnsupportedType`] for unknown extensions. Callers treat
/// both as "this document yields zero chunks" and continue the run.
pub fn load_markup(path: &Path, cache_dir: &Path) -> Result<String, IndexError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let markup = match ext.as_str() {
        "md" | "txt" => fs::read_to_string(path)?,
        "pdf" => load_pdf_markup(path, cache_dir)?,
        other => return Err(IndexError::UnsupportedType(other.to_string())),
    };

    Ok(markup.replace(PAGE_BREAK, " "))
}

fn load_pdf_markup(path: &Path, cache_dir: &Path) -> Result<String, IndexError> {
    fs::create_dir_all(cache_dir)?;

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");
    let cached = cache_dir.join(format!("{stem}.md"));

    if cached.exists() {
        debug!("Loading cached markup from {:?}", cached);
        return Ok(fs::read_to_string(&cached)?);
    }

    info!("Converting {:?} to markup", path);
    let text = pdf_extract::extract_text(path).map_err(|e| IndexError::Conversion {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let markup = reconstruct_markup(&text);
    fs::write(&cached, &markup)?;
    Ok(markup)
}

/// Rebuilds a heading structure from extracted PDF text.
///
/// Heuristic: a short standalone line (blank line before and after, no
/// terminal sentence punctuation) in Title Case or ALL CAPS becomes a
/// heading, `#` for the first one found and `##` for the rest. Form feeds
/// become page-break markers.
fn reconstruct_markup(text: &str) -> String {
    let normalized = text.replace('\u{c}', PAGE_BREAK);
    let lines: Vec<&str> = normalized.lines().collect();

    let mut out = String::with_capacity(normalized.len());
    let mut seen_heading = false;

    for (i, line) in lines.iter().enumerate() {
        let prev_blank = i == 0 || lines[i - 1].trim().is_empty();
        let next_blank = i + 1 >= lines.len() || lines[i + 1].trim().is_empty();

        if prev_blank && next_blank && is_heading_candidate(line.trim()) {
            let marker = if seen_heading { "##" } else { "#" };
            seen_heading = true;
            out.push_str(marker);
            out.push(' ');
            out.push_str(line.trim());
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

fn is_heading_candidate(line: &str) -> bool {
    if line.is_empty() || line.len() > HEADING_MAX_LEN {
        return false;
    }
    if line
        .chars()
        .last()
        .is_some_and(|c| matches!(c, '.' | '!' | '?' | ':' | ';' | ','))
    {
        return false;
    }

    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() {
        return false;
    }

    let all_caps = line
        .chars()
        .filter(|c| c.is_alphabetic())
        .all(|c| c.is_uppercase());
    let title_case = words.iter().all(|w| {
        w.chars()
            .next()
            .is_some_and(|c| c.is_uppercase() || !c.is_alphabetic())
    });

    all_caps || title_case
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_breaks_are_stripped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("notes.md");
        std::fs::write(&doc, "alpha\n-----\nbeta").unwrap();
        let markup = load_markup(&doc, dir.path()).unwrap();
        assert_eq!(markup, "alpha beta");
    }

    #[test]
    fn heading_candidates() {
        assert!(is_heading_candidate("Distributed Systems"));
        assert!(is_heading_candidate("CHAPTER SEVEN"));
        assert!(!is_heading_candidate("This sentence ends here."));
        assert!(!is_heading_candidate(
            "a very long lowercase line that keeps going and going far past sixty"
        ));
    }

    #[test]
    fn markup_reconstruction_marks_headings() {
        let text = "Intro Title\n\nSome body text that just flows on.\n\nNext Section\n\nMore body.";
        let markup = reconstruct_markup(text);
        assert!(markup.contains("# Intro Title"));
        assert!(markup.contains("## Next Section"));
        assert!(markup.contains("Some body text"));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("table.xlsx");
        std::fs::write(&doc, b"bytes").unwrap();
        assert!(matches!(
            load_markup(&doc, dir.path()),
            Err(IndexError::UnsupportedType(_))
        ));
    }
}
