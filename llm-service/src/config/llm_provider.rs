use serde::{Deserialize, Serialize};

/// Supported LLM backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmProvider {
    /// OpenAI-compatible REST API (vLLM, OpenAI, compatible proxies).
    OpenAiCompat,
    /// Local Ollama server.
    Ollama,
}

impl LlmProvider {
    /// Parses a provider name as used in `EMBEDDING_PROVIDER`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "openai" | "openai-compat" | "vllm" => Some(Self::OpenAiCompat),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }
}
