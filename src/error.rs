//! Failure taxonomy shared by the extraction pipeline and the scheduler.
//!
//! Components never let these escape to their callers. Each stage converts a
//! [`PipelineError`] into a sentinel value ([`QuoteValue::Unavailable`],
//! [`Summary::Unavailable`], a diagnostic [`Headline`], ...) so that the
//! recipient always receives a renderable message. The one exception is
//! [`PipelineError::InvalidInput`] at the scheduling boundary, which is
//! surfaced as a rejected request.
//!
//! [`QuoteValue::Unavailable`]: crate::models::QuoteValue::Unavailable
//! [`Summary::Unavailable`]: crate::models::Summary::Unavailable
//! [`Headline`]: crate::models::Headline

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Host unreachable, connection reset, timeout, or body read failure.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// The server answered, but not with a 2xx status.
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    /// The page was fetched but the expected structure is absent.
    #[error("parse failure: {0}")]
    ParseFailure(String),

    /// Too little text to be worth summarizing.
    #[error("content insufficient: {0} chars")]
    ContentInsufficient(usize),

    /// The summarization service failed or returned unusable output.
    #[error("capability failure: {0}")]
    CapabilityFailure(String),

    /// Unsupported interval, malformed URL, unknown source key.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<reqwest::Error> for PipelineError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            PipelineError::HttpStatus(status.as_u16())
        } else {
            PipelineError::NetworkFailure(e.to_string())
        }
    }
}

impl From<tokio::time::error::Elapsed> for PipelineError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        PipelineError::NetworkFailure("timed out".to_string())
    }
}
