//! AI trait for LLM completions.

use async_trait::async_trait;

use crate::error::Result;

/// A chat-completion capable LLM.
///
/// Implementations wrap a specific provider and handle transport
/// specifics; prompting and response parsing live in the extractor.
#[async_trait]
pub trait AI: Send + Sync {
    /// Complete a prompt and return the raw text response.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}
