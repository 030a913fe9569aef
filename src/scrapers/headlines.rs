//! Headline discovery on listing pages.
//!
//! Listing pages mix navigation chrome with editorial links, so each source
//! carries its own filters (see [`SourceConfig`]): a minimum anchor-text
//! length, an optional topical keyword set and a list of "read more" style
//! markers to skip. Links are resolved against the listing page and must stay
//! on the source's own host.

use super::selector;
use crate::config::SourceConfig;
use crate::error::PipelineError;
use crate::fetch::PageFetcher;
use crate::models::Headline;
use crate::utils::{char_len, element_text};
use scraper::Html;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const NO_HEADLINES: &str = "تیتر جدیدی پیدا نشد.";

#[derive(Debug)]
pub struct HeadlineCollector<F> {
    fetcher: Arc<F>,
}

impl<F: PageFetcher> HeadlineCollector<F> {
    pub fn new(fetcher: Arc<F>) -> Self {
        Self { fetcher }
    }

    /// Collect up to `limit` headlines from `source`.
    ///
    /// Never empty: when nothing qualifies a single [`NO_HEADLINES`]
    /// diagnostic is returned; when the page cannot be fetched or read, a
    /// single fetch-failure diagnostic carrying the source's message.
    #[instrument(level = "info", skip(self, source), fields(source = %source.key))]
    pub async fn collect(&self, source: &SourceConfig, limit: usize) -> Vec<Headline> {
        let html = match self.fetcher.fetch(&source.url).await {
            Ok(page) => match page.into_success() {
                Ok(body) => body,
                Err(e) => {
                    warn!(error = %e, "Listing page answered with an error status");
                    return vec![Headline::fetch_failure(&source.failure_message)];
                }
            },
            Err(e) => {
                warn!(error = %e, "Listing page unreachable");
                return vec![Headline::fetch_failure(&source.failure_message)];
            }
        };

        match extract_headlines(&html, source, limit) {
            Ok(headlines) if headlines.is_empty() => {
                warn!("No qualifying anchors on listing page");
                vec![Headline::diagnostic(NO_HEADLINES)]
            }
            Ok(headlines) => {
                info!(count = headlines.len(), "Collected headlines");
                headlines
            }
            Err(e) => {
                warn!(error = %e, "Could not extract headlines");
                vec![Headline::fetch_failure(&source.failure_message)]
            }
        }
    }
}

/// Walk the page's anchors in document order and keep the ones that look
/// like editorial headlines for `source`.
pub fn extract_headlines(
    html: &str,
    source: &SourceConfig,
    limit: usize,
) -> Result<Vec<Headline>, PipelineError> {
    let base = Url::parse(&source.url)
        .map_err(|e| PipelineError::InvalidInput(format!("source url {:?}: {e}", source.url)))?;
    let keywords: Vec<String> = source.keywords.iter().map(|k| k.to_lowercase()).collect();

    let document = Html::parse_document(html);
    let anchors = selector("a[href]")?;

    let mut headlines = Vec::new();
    for anchor in document.select(&anchors) {
        if headlines.len() >= limit {
            break;
        }

        let text = element_text(anchor, "");
        if char_len(&text) <= source.min_title_chars {
            continue;
        }
        if !keywords.is_empty() {
            let lowered = text.to_lowercase();
            if !keywords.iter().any(|k| lowered.contains(k.as_str())) {
                continue;
            }
        }
        if source.excluded.iter().any(|x| text.contains(x.as_str())) {
            continue;
        }

        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        let Some(url) = resolve_on_host(&base, href) else {
            debug!(%href, "Skipping off-site or unresolvable link");
            continue;
        };
        headlines.push(Headline::new(text, url));
    }
    Ok(headlines)
}

/// Resolve `href` against `base`, keeping it only when it is an http(s) URL
/// on the same host.
fn resolve_on_host(base: &Url, href: &str) -> Option<String> {
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let resolved = base.join(href).ok()?;
    let same_host = resolved.host_str().is_some() && resolved.host_str() == base.host_str();
    let web = matches!(resolved.scheme(), "http" | "https");
    (same_host && web).then(|| resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticFetcher;

    const TECH_PAGE: &str = r#"
        <html><body>
          <nav><a href="/">زومیت</a><a href="/category/mobile/">موبایل</a></nav>
          <a href="/mobile-review/12345-galaxy/">معرفی گوشی گلکسی جدید سامسونگ با باتری بزرگ</a>
          <a href="https://www.zoomit.ir/tech/777-ai/">پیشرفت تازه در هوش مصنوعی مولد و کاربردهای آن</a>
          <a href="https://twitter.com/zoomit/status/1">معرفی گوشی جدید در توییتر زومیت منتشر شد</a>
          <a href="/cars/88-ev/">بررسی خودروی برقی جدید در بازار ایران و جهان</a>
          <a href="//www.zoomit.ir/laptop/99/">بهترین لپ تاپ های بازار برای دانشجویان امسال</a>
        </body></html>"#;

    #[test]
    fn test_tech_filters_by_keyword_and_host() {
        let headlines = extract_headlines(TECH_PAGE, &SourceConfig::tech(), 5).unwrap();
        let urls: Vec<_> = headlines.iter().filter_map(|h| h.url.as_deref()).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.zoomit.ir/mobile-review/12345-galaxy/",
                "https://www.zoomit.ir/tech/777-ai/",
                "https://www.zoomit.ir/laptop/99/",
            ]
        );
        assert_eq!(headlines[0].title, "معرفی گوشی گلکسی جدید سامسونگ با باتری بزرگ");
    }

    #[test]
    fn test_limit_is_respected() {
        let headlines = extract_headlines(TECH_PAGE, &SourceConfig::tech(), 2).unwrap();
        assert_eq!(headlines.len(), 2);
    }

    #[test]
    fn test_economy_excludes_read_more_and_short_links() {
        let page = r##"
            <a href="/news/1">رشد نقدینگی در سه ماهه نخست سال جاری</a>
            <a href="/news/1#comments">کامنت‌ها برای رشد نقدینگی در سه ماهه نخست</a>
            <a href="/news/1">ادامه مطالعه درباره رشد نقدینگی در سه ماهه</a>
            <a href="/news/2">کوتاه</a>
            <a href="#top">بازگشت به بالای صفحه و فهرست اصلی سایت</a>
            <a href="mailto:info@zoomon.ir">ارتباط با تحریریه از طریق ایمیل رسمی</a>"##;
        let headlines = extract_headlines(page, &SourceConfig::economy(), 5).unwrap();
        assert_eq!(headlines.len(), 1);
        assert_eq!(headlines[0].url.as_deref(), Some("https://zoomon.ir/news/1"));
    }

    #[test]
    fn test_title_length_must_exceed_minimum() {
        let mut source = SourceConfig::economy();
        source.min_title_chars = 5;
        let page = r#"<a href="/a">12345</a><a href="/b">123456</a>"#;
        let headlines = extract_headlines(page, &source, 5).unwrap();
        assert_eq!(headlines.len(), 1);
        assert_eq!(headlines[0].title, "123456");
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let mut source = SourceConfig::tech();
        source.keywords = vec!["Apple".into()];
        source.min_title_chars = 3;
        let page = r#"<a href="/x">NEW APPLE WATCH</a>"#;
        assert_eq!(extract_headlines(page, &source, 5).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_qualifying_anchors_yields_diagnostic() {
        let fetcher = StaticFetcher::new().page(
            "https://www.zoomg.ir/",
            200,
            r#"<a href="/">خانه</a><a href="https://example.com/">سایت دیگری با متن طولانی برای بازی و فیلم</a>"#,
        );
        let collector = HeadlineCollector::new(Arc::new(fetcher));
        let headlines = collector.collect(&SourceConfig::entertainment(), 5).await;
        assert_eq!(headlines, vec![Headline::diagnostic(NO_HEADLINES)]);
    }

    #[tokio::test]
    async fn test_fetch_failure_yields_source_diagnostic() {
        let collector = HeadlineCollector::new(Arc::new(StaticFetcher::new()));
        let headlines = collector.collect(&SourceConfig::tech(), 5).await;
        assert_eq!(headlines.len(), 1);
        assert!(headlines[0].is_fetch_failure());
        assert_eq!(headlines[0].title, "خطا در بارگیری اخبار زومیت");
    }

    #[tokio::test]
    async fn test_error_status_yields_source_diagnostic() {
        let fetcher = StaticFetcher::new().page("https://zoomon.ir/", 502, "");
        let collector = HeadlineCollector::new(Arc::new(fetcher));
        let headlines = collector.collect(&SourceConfig::economy(), 5).await;
        assert_eq!(headlines, vec![Headline::fetch_failure("خطا در بارگیری تیترها")]);
    }
}
