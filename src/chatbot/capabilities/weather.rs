//! Current weather from OpenWeatherMap.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::info;

use super::http_client;
use crate::chatbot::format::weather_summary;
use crate::chatbot::registry::{arg, Arguments, Capability, Payload};

const WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub city: String,
    pub country: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: f64,
    pub description: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    name: String,
    sys: Option<Sys>,
    main: Main,
    #[serde(default)]
    weather: Vec<Condition>,
}

#[derive(Deserialize)]
struct Sys {
    country: Option<String>,
}

#[derive(Deserialize)]
struct Main {
    temp: f64,
    feels_like: f64,
    humidity: f64,
}

#[derive(Deserialize)]
struct Condition {
    description: String,
}

pub struct WeatherClient {
    api_key: String,
    http: reqwest::Client,
}

impl WeatherClient {
    pub fn new(api_key: String) -> Self {
        Self { api_key, http: http_client(15) }
    }
}

#[async_trait]
impl Capability for WeatherClient {
    async fn call(&self, args: &Arguments) -> Result<Payload, String> {
        if self.api_key.is_empty() {
            return Err("weather API key not configured".to_string());
        }
        let city = arg(args, "city_name")?;
        info!("🌤️ Getting weather for: {city}");

        let response = self
            .http
            .get(WEATHER_URL)
            .query(&[("q", city), ("appid", self.api_key.as_str()), ("units", "metric")])
            .send()
            .await
            .map_err(|e| format!("HTTP error: {e}"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| format!("Failed to read response: {e}"))?;

        match status {
            StatusCode::OK => parse_weather(&body).map(|report| Payload::Text(weather_summary(&report))),
            StatusCode::NOT_FOUND => Ok(Payload::Text(format!(
                "Sorry, I couldn't find weather data for '{city}'. Please check the city name and try again."
            ))),
            StatusCode::UNAUTHORIZED => Err("weather service rejected the API key".to_string()),
            other => Err(format!("API error {other}: {body}")),
        }
    }
}

fn parse_weather(body: &str) -> Result<WeatherReport, String> {
    let parsed: ApiResponse =
        serde_json::from_str(body).map_err(|e| format!("Failed to parse response: {e}"))?;

    Ok(WeatherReport {
        city: parsed.name,
        country: parsed.sys.and_then(|s| s.country).unwrap_or_default(),
        temperature: parsed.main.temp,
        feels_like: parsed.main.feels_like,
        humidity: parsed.main.humidity,
        description: parsed
            .weather
            .into_iter()
            .next()
            .map(|c| c.description)
            .unwrap_or_else(|| "unknown".to_string()),
    })
}
