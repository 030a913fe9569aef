//! Fiat and stablecoin price scraping.
//!
//! The fiat page is a plain table: the sell price sits in a fixed column of
//! the row labelled with the currency name. The stablecoin page has no stable
//! structure, so it is searched in two tiers:
//!
//! 1. elements whose text mentions a price keyword are matched against a
//!    grouped number optionally followed by a currency unit, and accepted
//!    when the digit count is plausible;
//! 2. failing that, the first bare 6–7 digit token in the page text whose
//!    value lies in the plausible range wins.

use super::selector;
use crate::config::{FiatSource, StablecoinBounds, StablecoinSource};
use crate::error::PipelineError;
use crate::fetch::PageFetcher;
use crate::models::{PriceQuote, QuoteValue};
use crate::utils::{char_len, element_text, strip_grouping, to_latin_digits};
use regex::Regex;
use scraper::Html;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

const PRICE_TOKEN: &str = r"(\d{1,3}(?:[,\s٬]\d{3})*)\s*(?:IRT|تومان| تومان|$)";
const TEXT_BEARING: &str = "span, div, p, strong, h2, td";

pub struct PriceQuoteFetcher<F> {
    fetcher: Arc<F>,
    fiat: FiatSource,
    stablecoin: StablecoinSource,
    matcher: StablecoinMatcher,
}

impl<F: PageFetcher> PriceQuoteFetcher<F> {
    pub fn new(
        fetcher: Arc<F>,
        fiat: FiatSource,
        stablecoin: StablecoinSource,
    ) -> Result<Self, PipelineError> {
        let matcher = StablecoinMatcher::new(stablecoin.keywords.clone(), stablecoin.bounds)?;
        Ok(Self {
            fetcher,
            fiat,
            stablecoin,
            matcher,
        })
    }

    /// Fetch both quotes concurrently: `(fiat, stablecoin)`.
    #[instrument(level = "info", skip_all)]
    pub async fn fetch_quotes(&self) -> (PriceQuote, PriceQuote) {
        let (fiat, stablecoin) = tokio::join!(self.fiat_quote(), self.stablecoin_quote());
        info!(fiat = %fiat.value, stablecoin = %stablecoin.value, "Fetched quotes");
        (fiat, stablecoin)
    }

    #[instrument(level = "info", skip_all, fields(source = %self.fiat.name))]
    pub async fn fiat_quote(&self) -> PriceQuote {
        let page = match self.fetcher.fetch(&self.fiat.url).await {
            Ok(page) if page.is_success() => page,
            Ok(page) => {
                warn!(status = page.status, "Fiat page answered with an error status");
                return PriceQuote::new(&self.fiat.name, QuoteValue::Unavailable(None));
            }
            Err(e) => {
                warn!(error = %e, "Fiat page unreachable");
                return PriceQuote::new(&self.fiat.name, QuoteValue::Unavailable(None));
            }
        };

        let value = match parse_fiat_price(&page.body, &self.fiat) {
            Ok(Some(digits)) => QuoteValue::Price(digits),
            Ok(None) => {
                warn!(label = %self.fiat.row_label, "No table row matched the fiat label");
                QuoteValue::Unavailable(None)
            }
            Err(e) => {
                error!(error = %e, "Fiat parse failed");
                QuoteValue::Error(e.to_string())
            }
        };
        PriceQuote::new(&self.fiat.name, value)
    }

    #[instrument(level = "info", skip_all, fields(source = %self.stablecoin.name))]
    pub async fn stablecoin_quote(&self) -> PriceQuote {
        let value = match self.fetcher.fetch(&self.stablecoin.url).await {
            Ok(page) if page.is_success() => match self.matcher.find_price(&page.body) {
                Some(digits) => QuoteValue::Price(digits),
                None => {
                    warn!("No plausible stablecoin price on page");
                    QuoteValue::Unavailable(Some("قیمت مناسب پیدا نشد".to_string()))
                }
            },
            Ok(page) => {
                warn!(status = page.status, "Stablecoin page answered with an error status");
                QuoteValue::Unavailable(Some(format!("کد: {}", page.status)))
            }
            Err(e) => {
                error!(error = %e, "Stablecoin fetch failed");
                QuoteValue::Error(e.to_string())
            }
        };
        PriceQuote::new(&self.stablecoin.name, value)
    }
}

/// Find the configured row in any table of the page and return its
/// normalized value cell.
///
/// `Ok(None)` means the page has no matching row (or no table at all).
pub fn parse_fiat_price(html: &str, source: &FiatSource) -> Result<Option<String>, PipelineError> {
    let document = Html::parse_document(html);
    let tables = selector("table")?;
    let rows = selector("tr")?;
    let cells = selector("td")?;

    for table in document.select(&tables) {
        for row in table.select(&rows) {
            let row_cells: Vec<_> = row.select(&cells).collect();
            if row_cells.len() <= source.value_column {
                continue;
            }
            let label = row_cells[0].text().collect::<String>();
            if !label.contains(&source.row_label) {
                continue;
            }

            let raw = row_cells[source.value_column].text().collect::<String>();
            let digits = to_latin_digits(&strip_grouping(raw.trim()));
            if digits.is_empty() {
                return Ok(None);
            }
            if !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(PipelineError::ParseFailure(format!(
                    "fiat value cell is not numeric: {raw:?}"
                )));
            }
            debug!(%digits, "Matched fiat row");
            return Ok(Some(digits));
        }
    }
    Ok(None)
}

/// Two-tier stablecoin price search with configurable plausibility bounds.
#[derive(Debug, Clone)]
pub struct StablecoinMatcher {
    keywords: Vec<String>,
    bounds: StablecoinBounds,
    price_token: Regex,
    bare_token: Regex,
}

impl StablecoinMatcher {
    pub fn new(keywords: Vec<String>, bounds: StablecoinBounds) -> Result<Self, PipelineError> {
        if bounds.min_digits == 0 || bounds.min_digits > bounds.max_digits {
            return Err(PipelineError::InvalidInput(format!(
                "digit bounds {}..={} are empty",
                bounds.min_digits, bounds.max_digits
            )));
        }
        let price_token =
            Regex::new(PRICE_TOKEN).map_err(|e| PipelineError::ParseFailure(e.to_string()))?;
        let bare_token = Regex::new(&format!(
            r"\b(\d{{{},{}}})\b",
            bounds.min_digits, bounds.max_digits
        ))
        .map_err(|e| PipelineError::ParseFailure(e.to_string()))?;
        Ok(Self {
            keywords,
            bounds,
            price_token,
            bare_token,
        })
    }

    /// Latin digit string of the first plausible price, tier 1 before tier 2.
    pub fn find_price(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        self.keyword_tier(&document)
            .inspect(|p| debug!(price = %p, "Stablecoin price from keyword tier"))
            .or_else(|| {
                self.range_tier(&document)
                    .inspect(|p| debug!(price = %p, "Stablecoin price from range tier"))
            })
    }

    fn keyword_tier(&self, document: &Html) -> Option<String> {
        let text_bearing = selector(TEXT_BEARING).ok()?;
        document.select(&text_bearing).find_map(|element| {
            let text = element_text(element, "");
            if !self.keywords.iter().any(|kw| text.contains(kw.as_str())) {
                return None;
            }
            let captured = self.price_token.captures(&text)?.get(1)?.as_str();
            let digits = strip_grouping(captured);
            self.bounds
                .digits_plausible(char_len(&digits))
                .then(|| to_latin_digits(&digits))
        })
    }

    fn range_tier(&self, document: &Html) -> Option<String> {
        let text = element_text(document.root_element(), " ");
        self.bare_token.captures_iter(&text).find_map(|caps| {
            let digits = to_latin_digits(caps.get(1)?.as_str());
            let value: u64 = digits.parse().ok()?;
            self.bounds.value_plausible(value).then_some(digits)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::testing::StaticFetcher;

    const FIAT_PAGE: &str = r#"
        <html><body>
          <table>
            <tr><th>ارز</th><th>خرید</th><th>فروش</th></tr>
            <tr><td>یورو</td><td>۱۰۲,۰۰۰</td><td>۱۰۳,۵۰۰</td></tr>
            <tr><td> دلار آمریکا </td><td>۹۸,۱۰۰</td><td> ۹۸,۵۰۰ </td></tr>
          </table>
        </body></html>"#;

    fn fiat() -> FiatSource {
        FiatSource::default()
    }

    fn matcher() -> StablecoinMatcher {
        let s = StablecoinSource::default();
        StablecoinMatcher::new(s.keywords, s.bounds).unwrap()
    }

    #[test]
    fn test_fiat_row_by_label() {
        assert_eq!(
            parse_fiat_price(FIAT_PAGE, &fiat()).unwrap(),
            Some("98500".to_string())
        );
    }

    #[test]
    fn test_fiat_missing_label() {
        let page = "<table><tr><td>یورو</td><td>1</td><td>2</td></tr></table>";
        assert_eq!(parse_fiat_price(page, &fiat()).unwrap(), None);
    }

    #[test]
    fn test_fiat_no_table() {
        assert_eq!(parse_fiat_price("<p>دلار آمریکا</p>", &fiat()).unwrap(), None);
    }

    #[test]
    fn test_fiat_short_row_is_skipped() {
        let page = r#"<table>
            <tr><td>دلار آمریکا</td><td>1</td></tr>
            <tr><td>دلار آمریکا</td><td>1</td><td>97,000</td></tr>
        </table>"#;
        assert_eq!(parse_fiat_price(page, &fiat()).unwrap(), Some("97000".into()));
    }

    #[test]
    fn test_fiat_non_numeric_cell_is_parse_failure() {
        let page = "<table><tr><td>دلار آمریکا</td><td>1</td><td>تماس بگیرید</td></tr></table>";
        assert!(matches!(
            parse_fiat_price(page, &fiat()),
            Err(PipelineError::ParseFailure(_))
        ));
    }

    #[test]
    fn test_stablecoin_keyword_tier() {
        let page = r#"<div><span>حجم</span><span>۲۵۰,۰۰۰,۰۰۰</span>
            <p>آخرین قیمت تتر: ۱۶۵,۴۰۰ تومان</p></div>"#;
        assert_eq!(matcher().find_price(page), Some("165400".into()));
    }

    #[test]
    fn test_stablecoin_keyword_tier_rejects_implausible_digit_count() {
        // 12,500 has five digits; tier 2 then finds nothing in range either.
        let page = "<p>قیمت فعلی USDT 12,500 تومان</p>";
        assert_eq!(matcher().find_price(page), None);
    }

    #[test]
    fn test_stablecoin_range_tier() {
        let page = "<div><span>volume 9999999</span><span>price 171250 now</span></div>";
        assert_eq!(matcher().find_price(page), Some("171250".into()));
    }

    #[test]
    fn test_keyword_tier_beats_range_tier() {
        let page = r#"<section><b>150000</b></section><p>USDT 1,600,000 IRT</p>"#;
        assert_eq!(matcher().find_price(page), Some("1600000".into()));
    }

    #[test]
    fn test_configurable_range() {
        let bounds = StablecoinBounds {
            min_value: 300_000,
            max_value: 400_000,
            ..StablecoinBounds::default()
        };
        let m = StablecoinMatcher::new(vec![], bounds).unwrap();
        assert_eq!(m.find_price("<p>171250 then 350000</p>"), Some("350000".into()));
    }

    #[test]
    fn test_empty_digit_bounds_rejected() {
        let bounds = StablecoinBounds {
            min_digits: 8,
            max_digits: 7,
            ..StablecoinBounds::default()
        };
        assert!(StablecoinMatcher::new(vec![], bounds).is_err());
    }

    fn quotes(fetcher: StaticFetcher) -> PriceQuoteFetcher<StaticFetcher> {
        let settings = Settings::default();
        PriceQuoteFetcher::new(Arc::new(fetcher), settings.fiat, settings.stablecoin).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_quotes_happy_path() {
        let fetcher = StaticFetcher::new()
            .page("https://alanchand.com/", 200, FIAT_PAGE)
            .page(
                "https://nobitex.ir/price/usdt",
                200,
                "<div><h2>قیمت تتر</h2><strong>USDT ۱۶۸٬۲۰۰ تومان</strong></div>",
            );
        let (fiat, usdt) = quotes(fetcher).fetch_quotes().await;
        assert_eq!(fiat.value, QuoteValue::Price("98500".into()));
        assert_eq!(fiat.source_name, "alanchand");
        assert_eq!(usdt.value, QuoteValue::Price("168200".into()));
    }

    #[tokio::test]
    async fn test_missing_label_is_unavailable_not_error() {
        let fetcher = StaticFetcher::new().page(
            "https://alanchand.com/",
            200,
            "<table><tr><td>یورو</td><td>1</td><td>2</td></tr></table>",
        );
        let (fiat, _) = quotes(fetcher).fetch_quotes().await;
        assert_eq!(fiat.value, QuoteValue::Unavailable(None));
    }

    #[tokio::test]
    async fn test_unreachable_pages_degrade() {
        let (fiat, usdt) = quotes(StaticFetcher::new()).fetch_quotes().await;
        assert_eq!(fiat.value, QuoteValue::Unavailable(None));
        assert!(matches!(usdt.value, QuoteValue::Error(_)));
    }

    #[tokio::test]
    async fn test_error_status_degrades() {
        let fetcher = StaticFetcher::new()
            .page("https://alanchand.com/", 500, "")
            .page("https://nobitex.ir/price/usdt", 403, "");
        let (fiat, usdt) = quotes(fetcher).fetch_quotes().await;
        assert_eq!(fiat.value, QuoteValue::Unavailable(None));
        assert_eq!(usdt.value, QuoteValue::Unavailable(Some("کد: 403".into())));
    }

    #[tokio::test]
    async fn test_no_plausible_stablecoin_price() {
        let fetcher = StaticFetcher::new().page(
            "https://nobitex.ir/price/usdt",
            200,
            "<p>nothing to see</p>",
        );
        let usdt = quotes(fetcher).stablecoin_quote().await;
        assert_eq!(
            usdt.value,
            QuoteValue::Unavailable(Some("قیمت مناسب پیدا نشد".into()))
        );
    }
}
