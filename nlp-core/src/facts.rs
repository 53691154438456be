//! User-fact extraction from parsed utterances.
//!
//! A sentence produces facts only when it references the user in a subject,
//! object, or possessive position. The rule set is an ordered list of
//! pattern matchers over the sentence's dependency tree:
//! 1. copular rule — "to be" roots emit `User is/likes <value>` facts;
//! 2. action-verb rule — other roots emit `User <verb-3sg> <objects>`;
//! 3. call-me rule — "call me X" shapes emit `User is X`.
//!
//! The sentinel `["none"]` marks "no facts"; callers must not store it.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::doc::{ParsedDoc, SentenceView, Token};
use crate::engine::ParseProvider;
use crate::errors::NlpError;

// Order matters: specific forms before the generic "'s" fallback.
const CONTRACTIONS: &[(&str, &str)] = &[
    (r"I'm", "I am"),
    (r"it's", "it is"),
    (r"let's", "let us"),
    (r"we're", "we are"),
    (r"can't", "cannot"),
    (r"won't", "will not"),
    (r"aren't", "are not"),
    (r"didn't", "did not"),
    (r"you're", "you are"),
    (r"they're", "they are"),
    (r"'s", " is"),
];

fn contraction_rules() -> &'static Vec<(Regex, &'static str)> {
    static RULES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    RULES.get_or_init(|| {
        CONTRACTIONS
            .iter()
            .map(|(pattern, replacement)| (Regex::new(pattern).unwrap(), *replacement))
            .collect()
    })
}

/// Expands common English contractions so the parser sees full forms.
pub fn preprocess_text(text: &str) -> String {
    let mut out = text.to_string();
    for (re, replacement) in contraction_rules() {
        out = re.replace_all(&out, *replacement).into_owned();
    }
    out
}

/// A fact candidate with enough metadata for the dedup pass.
struct Candidate {
    text: String,
    has_propn: bool,
}

/// Extracts user facts from an already parsed utterance.
///
/// Returns the facts in first-seen order, or the singleton `["none"]` when
/// the rule set produced nothing.
pub fn extract_user_facts(doc: &ParsedDoc) -> Vec<String> {
    let mut candidates: Vec<Candidate> = Vec::new();

    for sent in doc.sentences() {
        let Some((root_idx, root)) = sent.root() else {
            continue;
        };

        if !references_user(&sent) {
            continue;
        }

        if root.lemma == "be" || root.text == "am" {
            copular_rule(&sent, root_idx, &mut candidates);
        } else {
            action_verb_rule(&sent, root_idx, root, &mut candidates);
        }
        call_me_rule(&sent, &mut candidates);
    }

    let facts = dedup(candidates);
    debug!(count = facts.len(), "fact extraction complete");
    if facts.is_empty() {
        vec!["none".to_string()]
    } else {
        facts
    }
}

/// Convenience wrapper: preprocess, parse via `provider`, extract.
pub async fn extract_facts(
    provider: &dyn ParseProvider,
    text: &str,
) -> Result<Vec<String>, NlpError> {
    let expanded = preprocess_text(text);
    let doc = provider.parse(&expanded).await?;
    Ok(extract_user_facts(&doc))
}

/// First-person reference in subject/object/possessive position.
fn references_user(sent: &SentenceView<'_>) -> bool {
    sent.tokens().any(|(_, t)| {
        matches!(t.text.to_lowercase().as_str(), "i" | "me" | "my")
            && matches!(t.dep.as_str(), "nsubj" | "dobj" | "pobj" | "poss")
    })
}

/// Copular roots: predicate nominals, adjectives, open clausal complements,
/// and locative/directional prepositions each yield one fact.
fn copular_rule(sent: &SentenceView<'_>, root_idx: usize, out: &mut Vec<Candidate>) {
    let has_favorite = sent.contains_word("favorite");

    for (child_idx, child) in sent.children(root_idx) {
        match child.dep.as_str() {
            "attr" if child.pos != "PRON" => {
                let prefix = if has_favorite { "likes" } else { "is" };
                out.push(Candidate {
                    text: format!("User {} {}", prefix, child.text),
                    has_propn: child.pos == "PROPN",
                });
            }
            "acomp" if child.pos == "ADJ" => {
                out.push(Candidate {
                    text: format!("User is {}", child.text),
                    has_propn: false,
                });
            }
            "xcomp" if child.pos == "VERB" => {
                let mut parts = vec!["is".to_string(), child.text.clone()];
                let mut has_propn = false;
                for (_, grandkid) in sent.children(child_idx) {
                    if matches!(grandkid.dep.as_str(), "dobj" | "pobj") {
                        has_propn |= grandkid.pos == "PROPN";
                        parts.push(grandkid.text.clone());
                    }
                }
                out.push(Candidate {
                    text: format!("User {}", parts.join(" ")),
                    has_propn,
                });
            }
            "prep" if matches!(child.text.as_str(), "from" | "into" | "in") => {
                let mut parts = vec!["is".to_string(), child.text.clone()];
                let mut has_propn = false;
                for (_, grandkid) in sent.children(child_idx) {
                    if grandkid.dep == "pobj" {
                        has_propn |= grandkid.pos == "PROPN";
                        parts.push(grandkid.text.clone());
                    }
                }
                out.push(Candidate {
                    text: format!("User {}", parts.join(" ")),
                    has_propn,
                });
            }
            _ => {}
        }
    }
}

/// Non-copular roots: conjugate to third person singular and collect
/// objects and selected prepositional complements.
fn action_verb_rule(
    sent: &SentenceView<'_>,
    root_idx: usize,
    root: &Token,
    out: &mut Vec<Candidate>,
) {
    let has_aux_be = root.tag == "VBG" && sent.tokens().any(|(_, t)| t.pos == "AUX");

    let mut parts: Vec<String> = Vec::new();
    if has_aux_be {
        parts.push("is".to_string());
    }
    parts.push(conjugate_third_singular(root));
    let base_len = parts.len();

    let mut has_propn = false;
    for (child_idx, child) in sent.children(root_idx) {
        if matches!(child.dep.as_str(), "dobj" | "pobj") && child.pos != "PRON" {
            has_propn |= child.pos == "PROPN";
            parts.push(child.text.clone());
        } else if child.dep == "prep" && matches!(child.text.as_str(), "on" | "as") {
            for (_, grandkid) in sent.children(child_idx) {
                if grandkid.dep == "pobj" {
                    has_propn |= grandkid.pos == "PROPN";
                    parts.push(format!("{} {}", child.text, grandkid.text));
                }
            }
        }
    }

    // Emit only when an object was found, or the verb carries a
    // progressive auxiliary ("I am studying").
    if parts.len() > base_len || has_aux_be {
        out.push(Candidate {
            text: format!("User {}", parts.join(" ")),
            has_propn,
        });
    }
}

/// "call me X": `me` in object position plus a nearby proper noun in
/// object/object-predicate position asserts an identity.
fn call_me_rule(sent: &SentenceView<'_>, out: &mut Vec<Candidate>) {
    let me_as_object = sent.tokens().any(|(_, t)| {
        t.text.eq_ignore_ascii_case("me") && matches!(t.dep.as_str(), "dobj" | "pobj")
    });
    if !me_as_object {
        return;
    }

    if let Some((_, name)) = sent
        .tokens()
        .find(|(_, t)| matches!(t.dep.as_str(), "pobj" | "oprd") && t.pos == "PROPN")
    {
        out.push(Candidate {
            text: format!("User is {}", name.text),
            has_propn: true,
        });
    }
}

fn conjugate_third_singular(root: &Token) -> String {
    if root.pos == "VERB" && matches!(root.tag.as_str(), "VB" | "VBP") {
        let lemma = root.lemma.as_str();
        if lemma.ends_with('x')
            || lemma.ends_with("ch")
            || lemma.ends_with("sh")
            || lemma.ends_with('s')
            || lemma.ends_with('z')
        {
            format!("{}es", lemma)
        } else {
            format!("{}s", lemma)
        }
    } else {
        root.text.clone()
    }
}

/// First-seen-order dedup. When some fact asserts a proper-noun identity,
/// later "refers as" near-duplicates carrying a proper noun are dropped.
fn dedup(candidates: Vec<Candidate>) -> Vec<String> {
    let has_is_name = candidates
        .iter()
        .any(|c| c.has_propn && c.text.split_whitespace().any(|w| w == "is"));

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for c in candidates {
        if has_is_name && c.has_propn && c.text.contains("refers as") {
            continue;
        }
        if seen.insert(c.text.clone()) {
            out.push(c.text);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::{SentSpan, Token};

    fn tok(
        text: &str,
        lemma: &str,
        pos: &str,
        tag: &str,
        dep: &str,
        head: usize,
    ) -> Token {
        Token {
            text: text.into(),
            lemma: lemma.into(),
            pos: pos.into(),
            tag: tag.into(),
            dep: dep.into(),
            head,
            is_alpha: text.chars().all(|c| c.is_alphabetic()),
            is_punct: text.chars().all(|c| c.is_ascii_punctuation()),
        }
    }

    fn doc(tokens: Vec<Token>) -> ParsedDoc {
        let end = tokens.len();
        ParsedDoc {
            tokens,
            sentences: vec![SentSpan { start: 0, end }],
        }
    }

    #[test]
    fn no_user_reference_yields_sentinel() {
        // "It is raining outside."
        let d = doc(vec![
            tok("It", "it", "PRON", "PRP", "nsubj", 2),
            tok("is", "be", "AUX", "VBZ", "aux", 2),
            tok("raining", "rain", "VERB", "VBG", "ROOT", 2),
            tok("outside", "outside", "ADV", "RB", "advmod", 2),
            tok(".", ".", "PUNCT", ".", "punct", 2),
        ]);
        assert_eq!(extract_user_facts(&d), vec!["none".to_string()]);
    }

    #[test]
    fn name_identity_fact() {
        // "My name is Jarrod"
        let d = doc(vec![
            tok("My", "my", "PRON", "PRP$", "poss", 1),
            tok("name", "name", "NOUN", "NN", "nsubj", 2),
            tok("is", "be", "AUX", "VBZ", "ROOT", 2),
            tok("Jarrod", "Jarrod", "PROPN", "NNP", "attr", 2),
        ]);
        let facts = extract_user_facts(&d);
        assert!(facts.contains(&"User is Jarrod".to_string()), "{facts:?}");
    }

    #[test]
    fn favorite_switches_relation_to_likes() {
        // "My favorite language is Rust"
        let d = doc(vec![
            tok("My", "my", "PRON", "PRP$", "poss", 2),
            tok("favorite", "favorite", "ADJ", "JJ", "amod", 2),
            tok("language", "language", "NOUN", "NN", "nsubj", 3),
            tok("is", "be", "AUX", "VBZ", "ROOT", 3),
            tok("Rust", "Rust", "PROPN", "NNP", "attr", 3),
        ]);
        assert_eq!(extract_user_facts(&d), vec!["User likes Rust".to_string()]);
    }

    #[test]
    fn action_verb_conjugates_and_collects_objects() {
        // "I play chess"
        let d = doc(vec![
            tok("I", "I", "PRON", "PRP", "nsubj", 1),
            tok("play", "play", "VERB", "VBP", "ROOT", 1),
            tok("chess", "chess", "NOUN", "NN", "dobj", 1),
        ]);
        assert_eq!(extract_user_facts(&d), vec!["User plays chess".to_string()]);
    }

    #[test]
    fn sibilant_lemma_takes_es() {
        // "I teach math"
        let d = doc(vec![
            tok("I", "I", "PRON", "PRP", "nsubj", 1),
            tok("teach", "teach", "VERB", "VBP", "ROOT", 1),
            tok("math", "math", "NOUN", "NN", "dobj", 1),
        ]);
        assert_eq!(
            extract_user_facts(&d),
            vec!["User teaches math".to_string()]
        );
    }

    #[test]
    fn progressive_aux_emits_without_object() {
        // "I am studying"
        let d = doc(vec![
            tok("I", "I", "PRON", "PRP", "nsubj", 2),
            tok("am", "be", "AUX", "VBP", "aux", 2),
            tok("studying", "study", "VERB", "VBG", "ROOT", 2),
        ]);
        assert_eq!(
            extract_user_facts(&d),
            vec!["User is studying".to_string()]
        );
    }

    #[test]
    fn verb_without_object_yields_sentinel() {
        // Bare VB/VBP root, no object, no aux.
        let d = doc(vec![
            tok("I", "I", "PRON", "PRP", "nsubj", 1),
            tok("run", "run", "VERB", "VBP", "ROOT", 1),
        ]);
        assert_eq!(extract_user_facts(&d), vec!["none".to_string()]);
    }

    #[test]
    fn call_me_asserts_identity() {
        // "Call me Ishmael"
        let d = doc(vec![
            tok("Call", "call", "VERB", "VB", "ROOT", 0),
            tok("me", "I", "PRON", "PRP", "dobj", 0),
            tok("Ishmael", "Ishmael", "PROPN", "NNP", "oprd", 0),
        ]);
        let facts = extract_user_facts(&d);
        assert!(facts.contains(&"User is Ishmael".to_string()), "{facts:?}");
    }

    #[test]
    fn locative_preposition_fact() {
        // "I am from Canada"
        let d = doc(vec![
            tok("I", "I", "PRON", "PRP", "nsubj", 1),
            tok("am", "be", "AUX", "VBP", "ROOT", 1),
            tok("from", "from", "ADP", "IN", "prep", 1),
            tok("Canada", "Canada", "PROPN", "NNP", "pobj", 2),
        ]);
        assert_eq!(
            extract_user_facts(&d),
            vec!["User is from Canada".to_string()]
        );
    }

    #[test]
    fn duplicate_facts_collapse() {
        let d = ParsedDoc {
            tokens: vec![
                tok("I", "I", "PRON", "PRP", "nsubj", 1),
                tok("play", "play", "VERB", "VBP", "ROOT", 1),
                tok("chess", "chess", "NOUN", "NN", "dobj", 1),
                tok("I", "I", "PRON", "PRP", "nsubj", 4),
                tok("play", "play", "VERB", "VBP", "ROOT", 4),
                tok("chess", "chess", "NOUN", "NN", "dobj", 4),
            ],
            sentences: vec![SentSpan { start: 0, end: 3 }, SentSpan { start: 3, end: 6 }],
        };
        assert_eq!(extract_user_facts(&d), vec!["User plays chess".to_string()]);
    }

    #[test]
    fn contractions_expand() {
        assert_eq!(preprocess_text("I'm happy"), "I am happy");
        assert_eq!(preprocess_text("it's fine"), "it is fine");
        assert_eq!(preprocess_text("Sam's here"), "Sam is here");
    }
}
