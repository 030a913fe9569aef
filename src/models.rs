//! Data models for quotes, headlines, enriched articles and outgoing messages.
//!
//! - [`PriceQuote`]: one observation from a price source, or a sentinel
//! - [`Headline`]: a candidate article discovered on a listing page
//! - [`EnrichedArticle`]: a headline with its image and summary resolved
//! - [`OutgoingMessage`]: the payload handed to the delivery boundary
//!
//! Sentinel variants render as short Persian phrases so they can be embedded
//! directly in the message flow.

use crate::error::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Addressable target of delivered messages (a chat id).
pub type RecipientId = i64;

/// The value part of a [`PriceQuote`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum QuoteValue {
    /// Normalized Latin digit string without grouping separators.
    Price(String),
    /// The source answered but no usable price was found.
    Unavailable(Option<String>),
    /// The fetch or the parse blew up.
    Error(String),
}

impl fmt::Display for QuoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteValue::Price(digits) => write!(f, "{digits}"),
            QuoteValue::Unavailable(None) => write!(f, "ناموجود"),
            QuoteValue::Unavailable(Some(reason)) => write!(f, "ناموجود ({reason})"),
            QuoteValue::Error(_) => write!(f, "خطا"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub source_name: String,
    pub value: QuoteValue,
    pub observed_at: DateTime<Utc>,
}

impl PriceQuote {
    pub fn new(source_name: impl Into<String>, value: QuoteValue) -> Self {
        Self {
            source_name: source_name.into(),
            value,
            observed_at: Utc::now(),
        }
    }

    pub fn is_price(&self) -> bool {
        matches!(self.value, QuoteValue::Price(_))
    }
}

/// A headline/link pair discovered on a source page.
///
/// A headline without a URL is a diagnostic sentinel: its title explains why
/// nothing real was collected, and it must never be enriched. Diagnostics
/// raised because the listing page itself could not be loaded are flagged
/// with `fetch_failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fetch_failed: bool,
}

impl Headline {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: Some(url.into()),
            fetch_failed: false,
        }
    }

    /// The page loaded but nothing on it qualified.
    pub fn diagnostic(message: impl Into<String>) -> Self {
        Self {
            title: message.into(),
            url: None,
            fetch_failed: false,
        }
    }

    /// The listing page could not be loaded or read.
    pub fn fetch_failure(message: impl Into<String>) -> Self {
        Self {
            title: message.into(),
            url: None,
            fetch_failed: true,
        }
    }

    pub fn is_diagnostic(&self) -> bool {
        self.url.is_none()
    }

    pub fn is_fetch_failure(&self) -> bool {
        self.is_diagnostic() && self.fetch_failed
    }
}

/// Outcome of summarizing one article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Summary {
    /// Genuine model output, at least ten characters.
    Text(String),
    /// Missing URL or not http(s).
    InvalidLink,
    /// The article page answered with a non-2xx status.
    HttpStatus(u16),
    /// Too little body text to send to the model.
    InsufficientContent,
    /// The model answered with something too short to use.
    NotProduced,
    /// Anything else went wrong along the way.
    Unavailable,
}

impl Summary {
    pub fn is_genuine(&self) -> bool {
        matches!(self, Summary::Text(_))
    }

    /// Sentinel for a summarization attempt that failed with `error`.
    pub fn from_failure(error: &PipelineError) -> Self {
        match error {
            PipelineError::HttpStatus(code) => Summary::HttpStatus(*code),
            PipelineError::ContentInsufficient(_) => Summary::InsufficientContent,
            PipelineError::InvalidInput(_) => Summary::InvalidLink,
            _ => Summary::Unavailable,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Summary::Text(text) => write!(f, "{text}"),
            Summary::InvalidLink => write!(f, "لینک نامعتبر"),
            Summary::HttpStatus(code) => write!(f, "خطا {code}"),
            Summary::InsufficientContent => write!(f, "محتوای کافی نبود"),
            Summary::NotProduced => write!(f, "خلاصه تولید نشد"),
            Summary::Unavailable => write!(f, "خلاصه در دسترس نیست"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedArticle {
    pub headline: Headline,
    pub image_url: Option<String>,
    pub summary: Summary,
}

/// Payload handed to the delivery boundary.
///
/// When `image_url` is set the transport should send a photo with `text` as
/// its caption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_url: None,
        }
    }

    pub fn photo(image_url: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            text: caption.into(),
            image_url: Some(image_url.into()),
        }
    }
}
