/// Errors raised while running an [`crate::ExtractionStrategy`].
///
/// Per the core error taxonomy, extraction failures never propagate across
/// the `arun` boundary — the pipeline catches this and stores
/// `extracted_content = null`.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The schema's `baseSelector` failed to compile.
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector {
        /// The offending selector string.
        selector: String,
        /// Why the selector engine rejected it.
        reason: String,
    },
    /// A regex pattern (built-in or custom) failed to compile.
    #[error("invalid regex pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// The offending pattern source.
        pattern: String,
        /// The underlying compile error.
        #[source]
        source: regex::Error,
    },
    /// The LLM caller returned output that didn't parse as JSON, or didn't
    /// match the requested schema.
    #[error("LLM extraction produced invalid output: {0}")]
    InvalidLlmOutput(String),
    /// The configured `LlmCaller` failed.
    #[error("LLM call failed: {0}")]
    LlmCallFailed(String),
    /// Serialization of the extracted rows failed.
    #[error("failed to serialize extracted content: {0}")]
    Serialize(#[from] serde_json::Error),
}
