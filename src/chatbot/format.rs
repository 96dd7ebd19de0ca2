//! User-facing text for capability results.

use crate::chatbot::capabilities::{MemeReport, PlacesReport, WeatherReport};
use crate::chatbot::registry::CapabilitySpec;

pub const PLACES_PAGE_SIZE: usize = 5;

/// Telegram caps photo captions at 1024 chars.
const MAX_CAPTION_CHARS: usize = 1000;

/// Tip sentences keyed by words in the condition description. Checked in order.
const WEATHER_TIPS: &[(&[&str], &str)] = &[
    (&["thunder", "storm"], "⛈️ Stormy out there. Best to stay indoors if you can!"),
    (&["rain", "drizzle", "shower"], "☔ Don't forget your umbrella!"),
    (&["snow", "sleet"], "❄️ Bundle up, it's snowy outside!"),
    (&["clear", "sun"], "😎 Great day to be outside. Sunscreen helps!"),
    (&["cloud", "overcast"], "☁️ A bit grey today, but still a good day for a walk."),
    (&["mist", "fog", "haze", "smoke", "dust"], "🌫️ Visibility is low, take care on the roads."),
];
const DEFAULT_WEATHER_TIP: &str = "🌈 Have a great day!";

/// Cut to `max_chars` characters, marking the cut with `...`.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn weather_tip(description: &str) -> &'static str {
    let lowered = description.to_lowercase();
    WEATHER_TIPS
        .iter()
        .find(|(words, _)| words.iter().any(|w| lowered.contains(w)))
        .map(|(_, tip)| *tip)
        .unwrap_or(DEFAULT_WEATHER_TIP)
}

pub fn weather_summary(report: &WeatherReport) -> String {
    let place = if report.country.is_empty() {
        report.city.clone()
    } else {
        format!("{}, {}", report.city, report.country)
    };

    format!(
        "🌤️ Weather in {place}:\n🌡️ Temperature: {:.1}°C (feels like {:.1}°C)\n💧 Humidity: {:.0}%\n☁️ Condition: {}\n\n{}",
        report.temperature,
        report.feels_like,
        report.humidity,
        title_case(&report.description),
        weather_tip(&report.description),
    )
}

fn format_distance(metres: f64) -> String {
    if metres < 1000.0 {
        format!("{metres:.0}m")
    } else {
        format!("{:.1}km", metres / 1000.0)
    }
}

/// One page of a places listing. `page` is zero-based and clamped to the last page.
pub fn format_places_response(report: &PlacesReport, page: usize) -> String {
    let total = report.places.len();
    if total == 0 {
        return format!(
            "😕 No {} found within {} km of your location. You might be in a remote area.",
            report.query,
            report.radius_m / 1000
        );
    }

    let pages = total.div_ceil(PLACES_PAGE_SIZE);
    let page = page.min(pages - 1);
    let start = page * PLACES_PAGE_SIZE;
    let end = (start + PLACES_PAGE_SIZE).min(total);

    let mut text = format!("🍽️ Found {total} {} near you:\n\n", report.query);

    for (i, place) in report.places[start..end].iter().enumerate() {
        text.push_str(&format!("{}. {}\n", start + i + 1, place.name));
        text.push_str(&format!("   📍 {}\n", place.address));
        text.push_str(&format!("   📏 {} away\n", format_distance(place.distance_m)));
        if let Some(rating) = place.rating {
            match place.user_ratings_total {
                Some(count) => text.push_str(&format!("   ⭐ {rating}/5 ({count} reviews)\n")),
                None => text.push_str(&format!("   ⭐ {rating}/5\n")),
            }
        }
        if let Some(level) = place.price_level.filter(|l| *l > 0) {
            text.push_str(&format!("   {}\n", "💰".repeat(level as usize)));
        }
        match place.open_now {
            Some(true) => text.push_str("   🟢 Open now\n"),
            Some(false) => text.push_str("   🔴 Closed\n"),
            None => {}
        }
        text.push('\n');
    }

    text.push_str(&format!("📄 Page {} of {}", page + 1, pages));
    if end < total {
        text.push_str(&format!(
            "\n➡️ More available. Ask for \"{} page {}\" to see them.",
            report.query,
            page + 2
        ));
    }
    text
}

pub fn format_meme_response(meme: &MemeReport) -> String {
    let mut text = String::from("🎭 Your Meme is Ready!\n\n");
    text.push_str(&format!("🖼️ Template: {}\n", meme.template_name));
    if !meme.top_text.is_empty() {
        text.push_str(&format!("📝 Top: {}\n", meme.top_text));
    }
    if !meme.bottom_text.is_empty() {
        text.push_str(&format!("📝 Bottom: {}\n", meme.bottom_text));
    }
    text.push_str(&format!("\n🔗 View Meme: {}\n🌐 View on Imgflip: {}", meme.url, meme.page_url));
    text
}

pub fn image_reply_text(prompt: &str) -> String {
    format!("🎨 Here's your generated image based on: '{prompt}'")
}

pub fn image_caption(prompt: &str) -> String {
    truncate_chars(&format!("🎨 Generated by Ballu: {prompt}"), MAX_CAPTION_CHARS)
}

/// Apology for a failed capability. Never includes the raw error.
pub fn failure_message(spec: &CapabilitySpec) -> String {
    format!(
        "😕 Sorry, I couldn't reach the {} right now. Please try again in a bit, or ask me something else!",
        spec.noun
    )
}
