//! Article enrichment: a representative image and a one-to-two sentence summary.
//!
//! Both halves fetch the article independently and run concurrently, so a
//! failure in one never blocks the other.
//!
//! # Image resolution
//!
//! Strategies are tried in order and the first hit wins:
//!
//! 1. `og:image` meta tag
//! 2. `twitter:image` meta tag
//! 3. common featured-image / content regions, checking `src` and lazy-load
//!    attributes, skipping logos and avatars
//!
//! # Summaries
//!
//! Body text comes from the first known content container, falling back to
//! the page's longer paragraphs. Pages with too little text are reported as
//! such without calling the model.

use super::selector;
use crate::api::{AskAsync, CompletionRequest};
use crate::config::SummarizerSettings;
use crate::error::PipelineError;
use crate::fetch::PageFetcher;
use crate::models::{EnrichedArticle, Headline, Summary};
use crate::utils::{char_len, element_text, truncate_chars, truncate_for_log};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};
use url::Url;

const META_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp", ".gif"];
const CONTENT_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp"];

const CONTENT_IMAGE_SELECTORS: &[&str] = &[
    "img.size-full",
    "img.aligncenter",
    ".featured-image",
    ".post-thumbnail",
    ".entry-content img",
    ".content img",
    "figure img",
    "article img",
];
const IMAGE_ATTRIBUTES: &[&str] = &["src", "data-src", "data-lazy-src", "data-original"];

const CONTENT_CLASSES: &[&str] = &[
    "content",
    "post-content",
    "entry-content",
    "article-body",
    "news-content",
    "body",
];

/// Container text shorter than this triggers the paragraph fallback.
const MIN_CONTAINER_CHARS: usize = 200;
/// Paragraphs must be longer than this to count in the fallback.
const MIN_PARAGRAPH_CHARS: usize = 30;
/// Below this the model is not called at all.
const MIN_SUMMARIZABLE_CHARS: usize = 100;
/// Model output shorter than this is discarded.
const MIN_SUMMARY_CHARS: usize = 10;

static OG_IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:image"]"#).unwrap());
static TWITTER_IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="twitter:image"]"#).unwrap());
static CONTENT_CONTAINERS: Lazy<Vec<Selector>> = Lazy::new(|| {
    CONTENT_CLASSES
        .iter()
        .map(|class| Selector::parse(&format!("div.{class}, article.{class}")).unwrap())
        .collect()
});
static PARAGRAPHS: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

/// An image URL together with the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub url: String,
    pub strategy: &'static str,
}

type ImageStrategy = fn(&Html, Option<&Url>) -> Option<String>;

const IMAGE_STRATEGIES: &[(&str, ImageStrategy)] = &[
    ("og:image", og_image),
    ("twitter:image", twitter_image),
    ("content", content_image),
];

pub struct ArticleEnricher<F, S> {
    fetcher: Arc<F>,
    summarizer: Arc<S>,
    settings: SummarizerSettings,
}

impl<F, S> ArticleEnricher<F, S>
where
    F: PageFetcher,
    S: AskAsync,
{
    pub fn new(fetcher: Arc<F>, summarizer: Arc<S>, settings: SummarizerSettings) -> Self {
        Self {
            fetcher,
            summarizer,
            settings,
        }
    }

    /// Resolve image and summary for one headline.
    #[instrument(level = "info", skip_all, fields(url = ?headline.url))]
    pub async fn enrich(&self, headline: Headline) -> EnrichedArticle {
        let url = headline.url.as_deref();
        let (image_url, summary) = tokio::join!(
            async {
                match url {
                    Some(u) => self.resolve_image(u).await,
                    None => None,
                }
            },
            self.summarize(url)
        );
        EnrichedArticle {
            headline,
            image_url,
            summary,
        }
    }

    /// Enrich several headlines, at most `parallelism` at a time, keeping
    /// their order. Diagnostic headlines are dropped.
    #[instrument(level = "info", skip_all, fields(count = headlines.len()))]
    pub async fn enrich_all(&self, headlines: Vec<Headline>, parallelism: usize) -> Vec<EnrichedArticle> {
        stream::iter(headlines.into_iter().filter(|h| !h.is_diagnostic()))
            .map(|h| self.enrich(h))
            .buffered(parallelism.max(1))
            .collect()
            .await
    }

    /// Find a representative image for the article at `url`.
    ///
    /// Absence of an image is not an error; fetch failures resolve to `None`.
    #[instrument(level = "debug", skip(self))]
    pub async fn resolve_image(&self, url: &str) -> Option<String> {
        let page = match self.fetcher.fetch(url).await {
            Ok(page) if page.is_success() => page,
            Ok(page) => {
                debug!(status = page.status, "Article page answered with an error status");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Article image fetch failed");
                return None;
            }
        };
        let resolved = resolve_image_in(&page.body, url)?;
        debug!(image = %resolved.url, strategy = resolved.strategy, "Resolved article image");
        Some(resolved.url)
    }

    /// Summarize the article at `url`. Always returns a renderable [`Summary`].
    ///
    /// Every failure, including running past the configured budget, is
    /// folded into a sentinel by [`Summary::from_failure`].
    #[instrument(level = "info", skip(self))]
    pub async fn summarize(&self, url: Option<&str>) -> Summary {
        let Some(url) = url.filter(|u| u.starts_with("http://") || u.starts_with("https://"))
        else {
            return Summary::InvalidLink;
        };

        let outcome = match timeout(self.settings.budget(), self.summarize_page(url)).await {
            Ok(outcome) => outcome,
            Err(elapsed) => {
                warn!(budget_secs = self.settings.budget_secs, "Summarization budget exhausted");
                Err(elapsed.into())
            }
        };
        outcome.unwrap_or_else(|e| {
            debug!(error = %e, "No summary");
            Summary::from_failure(&e)
        })
    }

    async fn summarize_page(&self, url: &str) -> Result<Summary, PipelineError> {
        let page = self
            .fetcher
            .fetch(url)
            .await
            .inspect_err(|e| warn!(error = %e, "Article fetch failed"))?;
        if !page.is_success() {
            return Err(PipelineError::HttpStatus(page.status));
        }

        let content = extract_body_text(&page.body);
        let chars = char_len(&content);
        if chars < MIN_SUMMARIZABLE_CHARS {
            info!(chars, "Not enough article text to summarize");
            return Err(PipelineError::ContentInsufficient(chars));
        }

        let request = CompletionRequest {
            system: self.settings.system_prompt.clone(),
            user: truncate_chars(&content, self.settings.max_input_chars),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        let reply = self
            .summarizer
            .ask(&request)
            .await
            .inspect_err(|e| warn!(error = %e, "Summarizer call failed"))?;
        let text = reply.trim();
        if char_len(text) >= MIN_SUMMARY_CHARS {
            Ok(Summary::Text(text.to_string()))
        } else {
            warn!(reply = %truncate_for_log(text, 50), "Summary too short; discarding");
            Ok(Summary::NotProduced)
        }
    }
}

/// Run the image strategies over an already fetched page.
pub fn resolve_image_in(html: &str, page_url: &str) -> Option<ResolvedImage> {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();
    IMAGE_STRATEGIES.iter().find_map(|&(name, strategy)| {
        strategy(&document, base.as_ref()).map(|url| ResolvedImage {
            url,
            strategy: name,
        })
    })
}

fn og_image(document: &Html, base: Option<&Url>) -> Option<String> {
    meta_image(document, &OG_IMAGE, base, META_EXTENSIONS)
}

fn twitter_image(document: &Html, base: Option<&Url>) -> Option<String> {
    meta_image(document, &TWITTER_IMAGE, base, CONTENT_EXTENSIONS)
}

fn meta_image(
    document: &Html,
    meta: &Selector,
    base: Option<&Url>,
    extensions: &[&str],
) -> Option<String> {
    let content = document.select(meta).next()?.value().attr("content")?;
    normalize_image_url(content, base).filter(|src| has_extension(src, extensions))
}

fn content_image(document: &Html, base: Option<&Url>) -> Option<String> {
    CONTENT_IMAGE_SELECTORS.iter().find_map(|css| {
        let sel = selector(css).ok()?;
        let element = document.select(&sel).next()?;
        first_usable_attribute(element, base)
    })
}

fn first_usable_attribute(element: ElementRef<'_>, base: Option<&Url>) -> Option<String> {
    IMAGE_ATTRIBUTES.iter().find_map(|attr| {
        let src = normalize_image_url(element.value().attr(attr)?, base)?;
        let lowered = src.to_lowercase();
        let decorative = lowered.contains("logo") || lowered.contains("avatar");
        (has_extension(&src, CONTENT_EXTENSIONS) && !decorative).then_some(src)
    })
}

/// `//host/x` becomes `https://host/x`; `/x` is joined onto the page URL.
fn normalize_image_url(raw: &str, base: Option<&Url>) -> Option<String> {
    let src = raw.trim();
    if src.is_empty() {
        return None;
    }
    if let Some(rest) = src.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    if src.starts_with('/') {
        return base?.join(src).ok().map(|u| u.to_string());
    }
    Some(src.to_string())
}

fn has_extension(src: &str, extensions: &[&str]) -> bool {
    let lowered = src.to_lowercase();
    extensions.iter().any(|ext| lowered.contains(ext))
}

/// Body text of an article page.
///
/// The first known content container wins; if its text is short the longer
/// paragraphs of the whole page are used instead.
pub fn extract_body_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let container_text = CONTENT_CONTAINERS
        .iter()
        .find_map(|sel| document.select(sel).next())
        .map(|el| element_text(el, "\n"))
        .unwrap_or_default();

    if char_len(&container_text) >= MIN_CONTAINER_CHARS {
        return container_text;
    }

    document
        .select(&PARAGRAPHS)
        .map(|p| element_text(p, ""))
        .filter(|t| char_len(t) > MIN_PARAGRAPH_CHARS)
        .join("\n")
}
