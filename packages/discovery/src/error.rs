//! Typed errors for the discovery core.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. Per-candidate failures
//! (`ScrapeFailure`, `ExtractFailure`) are recoverable and never fatal
//! to a job; `DiscoveryError` covers everything else.

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during discovery operations.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Every places query variant failed; nothing to work with.
    #[error("all places search variants failed")]
    UpstreamUnavailable,

    /// A single places provider request failed.
    #[error("places provider error: {0}")]
    Provider(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// AI service unavailable or failed.
    #[error("AI service error: {0}")]
    Ai(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Scrape stage failed.
    #[error("scrape failed: {0}")]
    Scrape(#[from] ScrapeFailure),

    /// Extraction stage failed.
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractFailure),

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// No job with this id (never existed, or already garbage-collected).
    #[error("job not found: {0}")]
    JobNotFound(Uuid),

    /// No pantry with this id.
    #[error("pantry not found: {0}")]
    PantryNotFound(Uuid),

    /// Caller exceeded its token bucket for an operation.
    #[error("rate limit exceeded for {operation}")]
    RateLimited { operation: &'static str },

    /// Request failed input validation before any work started.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Operation exceeded its time budget.
    #[error("operation timed out")]
    Timeout,
}

impl DiscoveryError {
    /// Wrap an arbitrary storage-layer error.
    pub fn store<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Self::Store(Box::new(err))
    }

    /// Wrap an arbitrary places-provider error.
    pub fn provider<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Self::Provider(Box::new(err))
    }

    /// Wrap an arbitrary AI-transport error.
    pub fn ai<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Self::Ai(Box::new(err))
    }
}

/// Why a scrape produced no usable content.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScrapeFailure {
    /// The time budget for the URL elapsed.
    #[error("timed out")]
    Timeout,

    /// Transport or non-2xx response.
    #[error("http error: {0}")]
    HttpError(String),

    /// The site refused us (403/429).
    #[error("blocked by site")]
    Blocked,

    /// Reachable page with no meaningful content.
    #[error("empty content")]
    Empty,
}

impl ScrapeFailure {
    /// Short machine-readable tag used in `pantry_failed` events and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::HttpError(_) => "http_error",
            Self::Blocked => "blocked",
            Self::Empty => "empty",
        }
    }
}

/// Why extraction produced no structured record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractFailure {
    /// The LLM call itself failed.
    #[error("llm error: {0}")]
    LlmError(String),

    /// The model responded but the payload did not parse as the schema.
    #[error("invalid json: {0}")]
    InvalidJson(String),

    /// The model returned nothing.
    #[error("empty response")]
    EmptyResponse,
}

impl ExtractFailure {
    /// Short machine-readable tag used in events and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::LlmError(_) => "llm_error",
            Self::InvalidJson(_) => "invalid_json",
            Self::EmptyResponse => "empty_response",
        }
    }
}

/// Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;
