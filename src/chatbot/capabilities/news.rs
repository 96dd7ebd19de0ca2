//! Headlines and topic search via NewsAPI.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::http_client;
use crate::chatbot::format::truncate_chars;
use crate::chatbot::registry::{arg, Arguments, Capability, Payload};

const TOP_HEADLINES_URL: &str = "https://newsapi.org/v2/top-headlines";
const EVERYTHING_URL: &str = "https://newsapi.org/v2/everything";
const MAX_ARTICLES: usize = 5;
const DESCRIPTION_CHARS: usize = 100;

#[derive(Deserialize)]
struct NewsResponse {
    status: String,
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Deserialize)]
struct Article {
    title: Option<String>,
    source: Option<Source>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct Source {
    name: Option<String>,
}

pub struct NewsClient {
    api_key: String,
    country: String,
    http: reqwest::Client,
}

impl NewsClient {
    pub fn new(api_key: String, country: String) -> Self {
        Self { api_key, country, http: http_client(15) }
    }
}

fn is_headlines_query(query: &str) -> bool {
    matches!(query.trim().to_lowercase().as_str(), "latest" | "general" | "top" | "headlines" | "today")
}

#[async_trait]
impl Capability for NewsClient {
    async fn call(&self, args: &Arguments) -> Result<Payload, String> {
        if self.api_key.is_empty() {
            return Err("news API key not configured".to_string());
        }
        let query = arg(args, "query")?;
        let headlines = is_headlines_query(query);
        info!("📰 Getting news for: {query}");

        let request = if headlines {
            self.http
                .get(TOP_HEADLINES_URL)
                .query(&[("country", self.country.as_str())])
        } else {
            self.http
                .get(EVERYTHING_URL)
                .query(&[("q", query), ("sortBy", "publishedAt"), ("language", "en")])
        };

        let response = request
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| format!("HTTP error: {e}"))?;

        let body = response
            .text()
            .await
            .map_err(|e| format!("Failed to read response: {e}"))?;

        let text = format_news(&body, if headlines { None } else { Some(query) })?;
        Ok(Payload::Text(text))
    }
}

/// `topic` is `None` for top headlines.
fn format_news(body: &str, topic: Option<&str>) -> Result<String, String> {
    let parsed: NewsResponse =
        serde_json::from_str(body).map_err(|e| format!("Failed to parse response: {e}"))?;

    if parsed.status != "ok" {
        return Err(format!(
            "News API error: {}",
            parsed.message.unwrap_or_else(|| parsed.status.clone())
        ));
    }

    if parsed.articles.is_empty() {
        return Ok(match topic {
            Some(t) => format!("Sorry, I couldn't find news about '{t}'. Please try a different topic."),
            None => "Sorry, there are no headlines right now. Please try again later.".to_string(),
        });
    }

    let mut text = match topic {
        Some(t) => format!("📰 News about '{t}':\n\n"),
        None => "📰 Latest Headlines:\n\n".to_string(),
    };

    for (i, article) in parsed.articles.iter().take(MAX_ARTICLES).enumerate() {
        let title = article.title.as_deref().unwrap_or("No title");
        let source = article
            .source
            .as_ref()
            .and_then(|s| s.name.as_deref())
            .unwrap_or("Unknown source");

        text.push_str(&format!("{}. {}\n   📰 Source: {}\n", i + 1, title, source));
        if let Some(desc) = article.description.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            text.push_str(&format!("   📝 {}\n", truncate_chars(desc, DESCRIPTION_CHARS)));
        }
        text.push('\n');
    }

    Ok(text)
}
