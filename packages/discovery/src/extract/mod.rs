//! Structured extraction from scraped markdown via an LLM.
//!
//! The extractor is stateless and safe under concurrent invocation: it
//! holds only the AI handle, builds a fresh prompt per call, and parses
//! the response defensively.

pub mod prompts;

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{DiscoveryError, ExtractFailure};
use crate::traits::AI;
use crate::types::RawExtraction;

/// Converts scraped markdown into a raw pantry extraction.
#[derive(Clone)]
pub struct Extractor {
    ai: Arc<dyn AI>,
}

impl Extractor {
    pub fn new(ai: Arc<dyn AI>) -> Self {
        Self { ai }
    }

    /// Extract structured pantry data from markdown.
    ///
    /// Empty source content short-circuits to the low-confidence default
    /// without an LLM call; there is nothing to extract.
    pub async fn extract(&self, markdown: &str) -> Result<RawExtraction, ExtractFailure> {
        if markdown.trim().is_empty() {
            return Ok(empty_content_extraction());
        }

        let system = prompts::extraction_system_prompt(chrono::Utc::now());
        let user = prompts::extraction_user_prompt(markdown);

        let response = self.ai.complete(&system, &user).await.map_err(|e| match e {
            DiscoveryError::Timeout => ExtractFailure::LlmError("timed out".to_string()),
            other => ExtractFailure::LlmError(other.to_string()),
        })?;

        if response.trim().is_empty() {
            return Err(ExtractFailure::EmptyResponse);
        }

        // The prompt demands bare JSON but real responses sometimes carry
        // leading or trailing prose; take the first balanced object.
        let json = first_json_object(&response).ok_or_else(|| {
            warn!(
                preview = %response.chars().take(120).collect::<String>(),
                "no JSON object in LLM response"
            );
            ExtractFailure::InvalidJson("no JSON object found in response".to_string())
        })?;

        let raw: RawExtraction = serde_json::from_str(json).map_err(|e| {
            warn!(error = %e, "LLM response failed schema parse");
            ExtractFailure::InvalidJson(e.to_string())
        })?;

        debug!(
            confidence = ?raw.confidence,
            status = ?raw.status,
            "extraction complete"
        );
        Ok(raw)
    }
}

/// What extraction of empty content must yield.
fn empty_content_extraction() -> RawExtraction {
    RawExtraction {
        status: Some("UNKNOWN".to_string()),
        eligibility_rules: Some(vec![crate::validate::DEFAULT_ELIGIBILITY.to_string()]),
        is_id_required: Some(false),
        confidence: Some(1),
        ..Default::default()
    }
}

/// Find the first balanced `{...}` block in a string, respecting string
/// literals and escapes so braces inside values don't confuse the scan.
pub fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
