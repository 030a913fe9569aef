//! Scrapers for the price pages, headline listings and article pages.
//!
//! | Module | Input | Output |
//! |--------|-------|--------|
//! | [`prices`] | fiat table page, stablecoin page | two [`PriceQuote`](crate::models::PriceQuote)s |
//! | [`headlines`] | a listing page described by a [`SourceConfig`](crate::config::SourceConfig) | [`Headline`](crate::models::Headline)s |
//! | [`article`] | an article page | image URL + [`Summary`](crate::models::Summary) |
//!
//! Each module splits into an async wrapper that fetches through a
//! [`PageFetcher`](crate::fetch::PageFetcher) and a pure parsing function
//! over the HTML string. The async wrappers never return errors: every
//! failure is logged and folded into a sentinel value.

pub mod article;
pub mod headlines;
pub mod prices;

use crate::error::PipelineError;
use scraper::Selector;

/// Parse a CSS selector, reporting a bad one as a parse failure.
pub(crate) fn selector(css: &str) -> Result<Selector, PipelineError> {
    Selector::parse(css).map_err(|e| PipelineError::ParseFailure(format!("selector {css:?}: {e}")))
}
