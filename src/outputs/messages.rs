//! Message text for recipients.
//!
//! All user-facing copy lives here so the pipeline itself stays free of
//! presentation concerns.

use crate::config::SourceConfig;
use crate::models::{EnrichedArticle, Headline, OutgoingMessage, PriceQuote, Summary};
use crate::scheduler::{DeliveryInterval, ScheduledJob};
use crate::utils::{tehran_clock, truncate_chars};
use chrono::{DateTime, Utc};
use std::fmt::Write;

/// Photo captions are cut to this many characters.
pub const MAX_CAPTION_CHARS: usize = 900;

pub const NO_NEWS: &str = "هیچ خبری یافت نشد.";
pub const CANCELLED: &str = "✓ همه اعلان‌ها لغو شد";
pub const RESET: &str = "بات دوباره راه‌اندازی شد! 🌱\nاز دکمه‌های پایین انتخاب کن:";
pub const WELCOME: &str = "سلام! به ربات خوش آمدی 🌟\nاز دکمه‌های پایین انتخاب کن:";
pub const CHOOSE_INTERVAL: &str = "بازه زمانی رو انتخاب کن:";
pub const INVALID_INTERVAL: &str = "بازه زمانی نامعتبر است.";
pub const NOT_SCHEDULED: &str = "⏰ ارسال خودکار فعال نیست.";
pub const HELP: &str = "راهنما:\n\
💰 قیمت فعلی → قیمت لحظه‌ای\n\
⏰ تنظیم ارسال → قیمت دوره‌ای\n\
📰 اقتصادی → اخبار اقتصادی (با عکس خبر اول)\n\
🖥️ تکنولوژی → اخبار زومیت (با عکس خبر اول)\n\
🎮🎬 سینما و گیم → اخبار زومجی (با عکس خبر اول)\n\
📋 وضعیت → بازه ارسال فعلی\n\
🛑 لغو → قطع اعلان‌ها\n\
🔄 شروع دوباره → ریست بات";

/// Current dollar and tether prices, stamped with Tehran time.
pub fn price_message(fiat: &PriceQuote, stablecoin: &PriceQuote, at: DateTime<Utc>) -> OutgoingMessage {
    OutgoingMessage::text(format!(
        "🪙 قیمت لحظه‌ای ({})\n\n💰 دلار: {} تومان\n🔗 تتر: {} تومان",
        tehran_clock(at),
        fiat.value,
        stablecoin.value
    ))
}

pub fn interval_confirmation(interval: DeliveryInterval) -> OutgoingMessage {
    OutgoingMessage::text(format!("✓ تنظیم شد: هر {}", interval.label()))
}

/// Current recurring delivery for a recipient, if any.
pub fn schedule_status(job: Option<&ScheduledJob>) -> OutgoingMessage {
    let Some(job) = job else {
        return OutgoingMessage::text(NOT_SCHEDULED);
    };
    let every = DeliveryInterval::from_seconds(job.interval_seconds)
        .map(|i| i.label().to_string())
        .unwrap_or_else(|_| format!("{} ثانیه", job.interval_seconds));
    OutgoingMessage::text(format!(
        "⏰ ارسال خودکار: هر {every}\nارسال بعدی: {}",
        tehran_clock(job.next_fire_at)
    ))
}

/// The interval menu, one `code → label` line per choice.
pub fn interval_menu() -> OutgoingMessage {
    let mut text = String::from(CHOOSE_INTERVAL);
    for interval in DeliveryInterval::ALL {
        let _ = write!(text, "\n{} → هر {}", interval.code(), interval.label());
    }
    OutgoingMessage::text(text)
}

/// Summary line shown under a headline. Sentinels other than the two that
/// say something useful collapse into a single "not available" phrase.
pub fn summary_line(summary: &Summary) -> String {
    match summary {
        Summary::Text(_) | Summary::InsufficientContent | Summary::InvalidLink => {
            format!("خلاصه: {summary}")
        }
        _ => "خلاصه: در دسترس نبود".to_string(),
    }
}

/// Messages for a news section.
///
/// The first article with an image goes out as a photo message; every other
/// article is listed in one text message. When collection produced only
/// "nothing qualified" diagnostics, their text is delivered under the header;
/// when the listing page could not be loaded at all, just [`NO_NEWS`].
pub fn news_messages(
    source: &SourceConfig,
    headlines: &[Headline],
    articles: &[EnrichedArticle],
) -> Vec<OutgoingMessage> {
    let header = format!("{} {}:\n\n", source.emoji, source.title);

    if articles.is_empty() {
        let diagnostics: Vec<&str> = headlines
            .iter()
            .filter(|h| h.is_diagnostic() && !h.is_fetch_failure())
            .map(|h| h.title.as_str())
            .collect();
        if diagnostics.is_empty() {
            return vec![OutgoingMessage::text(NO_NEWS)];
        }
        return vec![OutgoingMessage::text(format!(
            "{header}{}",
            diagnostics.join("\n")
        ))];
    }

    let mut messages = Vec::new();
    let mut listing = header.clone();
    let mut listed = 0usize;
    let mut photo_sent = false;

    for (i, article) in articles.iter().enumerate() {
        let n = i + 1;
        let title = &article.headline.title;
        let summary = summary_line(&article.summary);
        let link = article.headline.url.as_deref().unwrap_or_default();

        if !photo_sent {
            if let Some(image) = &article.image_url {
                let caption = format!("{n}. {title}\n{summary}\nلینک: {link}");
                messages.push(OutgoingMessage::photo(
                    image,
                    truncate_chars(&caption, MAX_CAPTION_CHARS),
                ));
                photo_sent = true;
                continue;
            }
        }

        let _ = writeln!(listing, "{n}. {title}");
        let _ = writeln!(listing, "   {summary}");
        if !link.is_empty() {
            let _ = writeln!(listing, "   لینک: {link}");
        }
        listing.push('\n');
        listed += 1;
    }

    if listed > 0 {
        messages.push(OutgoingMessage::text(listing.trim_end().to_string()));
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuoteValue;
    use chrono::TimeZone;

    fn article(title: &str, url: &str, image: Option<&str>, summary: Summary) -> EnrichedArticle {
        EnrichedArticle {
            headline: Headline::new(title, url),
            image_url: image.map(String::from),
            summary,
        }
    }

    #[test]
    fn test_price_message() {
        let at = Utc.with_ymd_and_hms(2025, 5, 6, 5, 0, 0).unwrap();
        let fiat = PriceQuote::new("alanchand", QuoteValue::Price("98500".into()));
        let usdt = PriceQuote::new("nobitex", QuoteValue::Unavailable(None));
        let msg = price_message(&fiat, &usdt, at);
        assert_eq!(
            msg.text,
            "🪙 قیمت لحظه‌ای (08:30)\n\n💰 دلار: 98500 تومان\n🔗 تتر: ناموجود تومان"
        );
        assert!(msg.image_url.is_none());
    }

    #[test]
    fn test_summary_line() {
        assert_eq!(summary_line(&Summary::Text("متن".into())), "خلاصه: متن");
        assert_eq!(
            summary_line(&Summary::InsufficientContent),
            "خلاصه: محتوای کافی نبود"
        );
        assert_eq!(summary_line(&Summary::HttpStatus(500)), "خلاصه: در دسترس نبود");
        assert_eq!(summary_line(&Summary::Unavailable), "خلاصه: در دسترس نبود");
        assert_eq!(summary_line(&Summary::NotProduced), "خلاصه: در دسترس نبود");
    }

    #[test]
    fn test_first_image_becomes_photo_message() {
        let articles = vec![
            article("اول", "https://x.ir/1", None, Summary::Unavailable),
            article("دوم", "https://x.ir/2", Some("https://x.ir/2.jpg"), Summary::Text("خلاصه دوم".into())),
            article("سوم", "https://x.ir/3", Some("https://x.ir/3.jpg"), Summary::NotProduced),
        ];
        let source = SourceConfig::tech();
        let messages = news_messages(&source, &[], &articles);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].image_url.as_deref(), Some("https://x.ir/2.jpg"));
        assert_eq!(
            messages[0].text,
            "2. دوم\nخلاصه: خلاصه دوم\nلینک: https://x.ir/2"
        );

        let listing = &messages[1].text;
        assert!(listing.starts_with("🖥️ اخبار تکنولوژی:\n\n1. اول\n"));
        assert!(listing.contains("3. سوم\n   خلاصه: در دسترس نبود\n   لینک: https://x.ir/3"));
        assert!(!listing.contains("2. دوم"));
    }

    #[test]
    fn test_caption_is_capped() {
        let long_title = "ت".repeat(2000);
        let articles = vec![article(&long_title, "https://x.ir/1", Some("https://x.ir/1.png"), Summary::Unavailable)];
        let messages = news_messages(&SourceConfig::tech(), &[], &articles);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text.chars().count(), MAX_CAPTION_CHARS);
    }

    #[test]
    fn test_diagnostic_only_section() {
        let headlines = vec![Headline::diagnostic("تیتر جدیدی پیدا نشد.")];
        let messages = news_messages(&SourceConfig::entertainment(), &headlines, &[]);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "🎮🎬 اخبار سینما و گیم:\n\nتیتر جدیدی پیدا نشد.");
    }

    #[test]
    fn test_empty_section() {
        let messages = news_messages(&SourceConfig::economy(), &[], &[]);
        assert_eq!(messages, vec![OutgoingMessage::text(NO_NEWS)]);
    }

    #[test]
    fn test_unreachable_listing_is_no_news() {
        let source = SourceConfig::tech();
        let headlines = vec![Headline::fetch_failure(&source.failure_message)];
        let messages = news_messages(&source, &headlines, &[]);
        assert_eq!(messages, vec![OutgoingMessage::text(NO_NEWS)]);
    }

    #[test]
    fn test_schedule_status() {
        assert_eq!(schedule_status(None).text, NOT_SCHEDULED);

        let job = ScheduledJob {
            recipient_id: 3,
            interval_seconds: 3_600,
            name: "price_3".into(),
            next_fire_at: Utc.with_ymd_and_hms(2025, 5, 6, 6, 15, 0).unwrap(),
        };
        assert_eq!(
            schedule_status(Some(&job)).text,
            "⏰ ارسال خودکار: هر ۱ ساعت\nارسال بعدی: 09:45"
        );
    }

    #[test]
    fn test_interval_menu_lists_all_choices() {
        let menu = interval_menu().text;
        for code in ["5m", "1h", "3h", "6h"] {
            assert!(menu.contains(code));
        }
    }
}
