//! Environment-driven profile construction.
//!
//! The binaries call these once at startup; everything downstream receives
//! the resulting [`LlmModelConfig`]s through [`crate::LlmServiceProfiles`].

use crate::config::llm_model_config::LlmModelConfig;
use crate::config::llm_provider::LlmProvider;
use crate::error_handler::{LlmError, env_opt_u32, env_opt_u64, must_env};

/// Builds the chat profile from `LLM_*` environment variables.
///
/// Required: `LLM_ENDPOINT`, `LLM_MODEL`. Optional: `LLM_API_KEY`,
/// `LLM_MAX_TOKENS` (default 1024), `LLM_TIMEOUT_SECS` (default 30).
/// Temperature is pinned at 0.5.
///
/// # Errors
/// Returns [`LlmError::Config`] when a required variable is missing or a
/// numeric variable fails to parse.
pub fn chat_from_env() -> Result<LlmModelConfig, LlmError> {
    Ok(LlmModelConfig {
        provider: LlmProvider::OpenAiCompat,
        model: must_env("LLM_MODEL")?,
        endpoint: must_env("LLM_ENDPOINT")?,
        api_key: std::env::var("LLM_API_KEY").ok().filter(|v| !v.is_empty()),
        max_tokens: Some(env_opt_u32("LLM_MAX_TOKENS")?.unwrap_or(1024)),
        temperature: Some(0.5),
        top_p: None,
        timeout_secs: Some(env_opt_u64("LLM_TIMEOUT_SECS")?.unwrap_or(30)),
    })
}

/// Builds the embedding profile from `EMBEDDING_*` environment variables.
///
/// Required: `EMBEDDING_ENDPOINT`, `EMBEDDING_MODEL`. Optional:
/// `EMBEDDING_PROVIDER` (`openai` default, or `ollama`),
/// `EMBEDDING_TIMEOUT_SECS` (default 60).
///
/// # Errors
/// Returns [`LlmError::Config`] when a required variable is missing or the
/// provider name is unsupported.
pub fn embedding_from_env() -> Result<LlmModelConfig, LlmError> {
    let provider = match std::env::var("EMBEDDING_PROVIDER") {
        Ok(name) if !name.trim().is_empty() => LlmProvider::parse(&name)
            .ok_or_else(|| LlmError::Config(format!("unsupported embedding provider: {name}")))?,
        _ => LlmProvider::OpenAiCompat,
    };

    Ok(LlmModelConfig {
        provider,
        model: must_env("EMBEDDING_MODEL")?,
        endpoint: must_env("EMBEDDING_ENDPOINT")?,
        api_key: std::env::var("EMBEDDING_API_KEY")
            .ok()
            .filter(|v| !v.is_empty()),
        max_tokens: None,
        temperature: None,
        top_p: None,
        timeout_secs: Some(env_opt_u64("EMBEDDING_TIMEOUT_SECS")?.unwrap_or(60)),
    })
}
