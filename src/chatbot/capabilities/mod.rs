//! Capability handlers backed by external HTTP APIs.

pub mod image;
pub mod meme;
pub mod news;
pub mod places;
pub mod stock;
pub mod weather;

use std::sync::Arc;
use std::time::Duration;

pub use meme::MemeReport;
pub use places::{Place, PlacesReport};
pub use weather::WeatherReport;

use crate::chatbot::registry::Registry;
use crate::config::Config;
use crate::intent::Intent;

/// Credentials and knobs the handlers need.
#[derive(Debug, Clone, Default)]
pub struct CapabilitySettings {
    pub weather_api_key: String,
    pub news_api_key: String,
    pub news_country: String,
    pub stability_api_key: String,
    pub google_places_api_key: String,
    pub imgflip_username: Option<String>,
    pub imgflip_password: Option<String>,
}

impl CapabilitySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            weather_api_key: config.weather_api_key.clone(),
            news_api_key: config.news_api_key.clone(),
            news_country: config.news_country.clone(),
            stability_api_key: config.stability_api_key.clone(),
            google_places_api_key: config.google_places_api_key.clone(),
            imgflip_username: config.imgflip_username.clone(),
            imgflip_password: config.imgflip_password.clone(),
        }
    }
}

/// Registry with every built-in handler bound to its intent.
pub fn default_registry(settings: &CapabilitySettings) -> Registry {
    let mut registry = Registry::new();
    registry.register(Intent::Weather, Arc::new(weather::WeatherClient::new(settings.weather_api_key.clone())));
    registry.register(Intent::Stock, Arc::new(stock::StockClient::new()));
    registry.register(
        Intent::News,
        Arc::new(news::NewsClient::new(settings.news_api_key.clone(), settings.news_country.clone())),
    );
    registry.register(Intent::Image, Arc::new(image::ImageClient::new(settings.stability_api_key.clone())));
    registry.register(
        Intent::Places,
        Arc::new(places::PlacesClient::new(settings.google_places_api_key.clone())),
    );
    registry.register(
        Intent::Meme,
        Arc::new(meme::MemeClient::new(
            settings.imgflip_username.clone(),
            settings.imgflip_password.clone(),
        )),
    );
    registry
}

fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("ballu/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}
