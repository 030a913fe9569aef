//! Runtime settings.
//!
//! Every knob has a built-in default matching the sources the bot was written
//! for, so the YAML file is optional and may override any subset of fields:
//!
//! ```yaml
//! stablecoin:
//!   bounds:
//!     min_value: 150000
//!     max_value: 250000
//! summarizer:
//!   model: llama-3.1-8b-instant
//! scheduler:
//!   initial_delay_secs: 5
//! ```

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub http: HttpSettings,
    pub fiat: FiatSource,
    pub stablecoin: StablecoinSource,
    pub headlines: HeadlineSettings,
    pub summarizer: SummarizerSettings,
    pub scheduler: SchedulerSettings,
}

impl Settings {
    /// Load settings from a YAML file, falling back to defaults for every
    /// field the file leaves out.
    #[instrument(level = "info")]
    pub async fn load(path: &str) -> Result<Self, Box<dyn Error>> {
        let raw = tokio::fs::read_to_string(Path::new(path)).await?;
        let settings: Settings = serde_yaml::from_str(&raw)?;
        info!(
            sources = settings.headlines.sources.len(),
            model = %settings.summarizer.model,
            "Loaded settings"
        );
        Ok(settings)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Per-request timeout for every page fetch.
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout_secs: 12 }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FiatSource {
    pub name: String,
    pub url: String,
    /// Text the first cell of the wanted table row must contain.
    pub row_label: String,
    /// Zero-based index of the cell carrying the sell price.
    pub value_column: usize,
}

impl Default for FiatSource {
    fn default() -> Self {
        Self {
            name: "alanchand".to_string(),
            url: "https://alanchand.com/".to_string(),
            row_label: "دلار آمریکا".to_string(),
            value_column: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StablecoinSource {
    pub name: String,
    pub url: String,
    pub keywords: Vec<String>,
    pub bounds: StablecoinBounds,
}

impl Default for StablecoinSource {
    fn default() -> Self {
        Self {
            name: "nobitex".to_string(),
            url: "https://nobitex.ir/price/usdt".to_string(),
            keywords: [
                "قیمت لحظه‌ای",
                "قیمت فعلی",
                "آخرین قیمت",
                "قیمت تومانی",
                "تتر",
                "USDT",
            ]
            .map(String::from)
            .to_vec(),
            bounds: StablecoinBounds::default(),
        }
    }
}

/// Plausibility window for a stablecoin price in toman.
///
/// These encode an assumption about the current price magnitude, so they are
/// configuration rather than constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StablecoinBounds {
    pub min_digits: usize,
    pub max_digits: usize,
    pub min_value: u64,
    pub max_value: u64,
}

impl Default for StablecoinBounds {
    fn default() -> Self {
        Self {
            min_digits: 6,
            max_digits: 7,
            min_value: 140_000,
            max_value: 200_000,
        }
    }
}

impl StablecoinBounds {
    pub fn digits_plausible(&self, digits: usize) -> bool {
        (self.min_digits..=self.max_digits).contains(&digits)
    }

    pub fn value_plausible(&self, value: u64) -> bool {
        (self.min_value..=self.max_value).contains(&value)
    }
}

/// Declarative description of one headline listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Short key recipients use to ask for this source.
    pub key: String,
    pub title: String,
    pub emoji: String,
    /// Listing page; also the base for resolving relative links and the
    /// host that accepted links must live on.
    pub url: String,
    /// Anchor text must be strictly longer than this many characters.
    pub min_title_chars: usize,
    /// At least one must appear in the lowercased anchor text. Empty means
    /// no topical filter.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// "Read more" / "comments" style link markers.
    #[serde(default)]
    pub excluded: Vec<String>,
    /// Diagnostic title used when the page cannot be fetched.
    pub failure_message: String,
}

impl SourceConfig {
    pub fn economy() -> Self {
        Self {
            key: "economy".to_string(),
            title: "تیترهای اقتصادی امروز".to_string(),
            emoji: "📰".to_string(),
            url: "https://zoomon.ir/".to_string(),
            min_title_chars: 20,
            keywords: Vec::new(),
            excluded: vec!["مطالعه".to_string(), "کامنت".to_string()],
            failure_message: "خطا در بارگیری تیترها".to_string(),
        }
    }

    pub fn tech() -> Self {
        Self {
            key: "tech".to_string(),
            title: "اخبار تکنولوژی".to_string(),
            emoji: "🖥️".to_string(),
            url: "https://www.zoomit.ir/".to_string(),
            min_title_chars: 25,
            keywords: ["لو رفت", "معرفی", "هوش", "سامسونگ", "اپل", "گوشی", "لپ", "تکنولوژی"]
                .map(String::from)
                .to_vec(),
            excluded: Vec::new(),
            failure_message: "خطا در بارگیری اخبار زومیت".to_string(),
        }
    }

    pub fn entertainment() -> Self {
        Self {
            key: "entertainment".to_string(),
            title: "اخبار سینما و گیم".to_string(),
            emoji: "🎮🎬".to_string(),
            url: "https://www.zoomg.ir/".to_string(),
            min_title_chars: 25,
            keywords: ["فیلم", "بازی", "سینما", "گیم", "سریال", "مایکروسافت", "نقد", "تریلر"]
                .map(String::from)
                .to_vec(),
            excluded: Vec::new(),
            failure_message: "خطا در بارگیری اخبار زومجی".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadlineSettings {
    /// Items collected per request.
    pub limit: usize,
    /// Articles enriched concurrently.
    pub parallelism: usize,
    pub sources: Vec<SourceConfig>,
}

impl Default for HeadlineSettings {
    fn default() -> Self {
        Self {
            limit: 5,
            parallelism: 5,
            sources: vec![
                SourceConfig::economy(),
                SourceConfig::tech(),
                SourceConfig::entertainment(),
            ],
        }
    }
}

impl HeadlineSettings {
    pub fn source(&self, key: &str) -> Result<&SourceConfig, PipelineError> {
        self.sources
            .iter()
            .find(|s| s.key.eq_ignore_ascii_case(key))
            .ok_or_else(|| PipelineError::InvalidInput(format!("unknown headline source {key:?}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerSettings {
    /// OpenAI-compatible chat completions endpoint.
    pub endpoint: String,
    pub model: String,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Article text is cut to this many characters before being sent.
    pub max_input_chars: usize,
    pub max_retries: usize,
    /// Upper bound on one whole summarize call, retries included.
    pub budget_secs: u64,
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            system_prompt: "فقط یک خلاصه کوتاه و دقیق (۱ تا ۲ جمله) به فارسی بنویس. رسمی و روان. اگر متن کافی نبود بنویس: محتوای کافی نبود.".to_string(),
            max_tokens: 120,
            temperature: 0.35,
            max_input_chars: 7000,
            max_retries: 2,
            budget_secs: 30,
        }
    }
}

impl SummarizerSettings {
    pub fn budget(&self) -> Duration {
        Duration::from_secs(self.budget_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Delay before the first firing of a freshly scheduled job.
    pub initial_delay_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            initial_delay_secs: 15,
        }
    }
}

impl SchedulerSettings {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }
}
