//! Prompt assembly: system instructions plus a bounded user message.

/// Maximum characters of fused context forwarded to the model.
pub const MAX_CONTEXT_CHARS: usize = 4096;

/// Builds the system message, embedding the stored user facts.
pub fn build_system_prompt(facts: &[String]) -> String {
    let facts_str = if facts.is_empty() {
        "No known user facts.".to_string()
    } else {
        facts.join("\n")
    };
    format!(
        "You are Aide, a sharp AI assistant for tech queries. Answer the query below in concise, plain English. \
         Use these user facts if relevant: {facts_str}—mention them explicitly if applicable. \
         Focus solely on the query—use context only if it directly applies, otherwise ignore it. \
         Do not repeat phrases or ramble—provide one clear answer."
    )
}

/// Builds the user message: optional context (capped at
/// [`MAX_CONTEXT_CHARS`]) followed by the raw query.
pub fn build_user_prompt(context: &str, query: &str) -> String {
    format!(
        "Context (optional, use only if directly relevant): {}\n\nQuery: {query}",
        safe_truncate(context, MAX_CONTEXT_CHARS)
    )
}

fn safe_truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        s
    } else {
        let mut end = max;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_names_facts() {
        let prompt = build_system_prompt(&["User likes Rust".to_string()]);
        assert!(prompt.contains("User likes Rust"));

        let empty = build_system_prompt(&[]);
        assert!(empty.contains("No known user facts."));
    }

    #[test]
    fn user_prompt_caps_context() {
        let context = "x".repeat(MAX_CONTEXT_CHARS + 500);
        let prompt = build_user_prompt(&context, "what is rust?");
        assert!(prompt.len() < context.len());
        assert!(prompt.ends_with("Query: what is rust?"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let context = "é".repeat(MAX_CONTEXT_CHARS); // 2 bytes each
        let prompt = build_user_prompt(&context, "q");
        assert!(prompt.contains("Query: q"));
    }
}
