//! Text-to-image via Stability AI.

use async_trait::async_trait;
use reqwest::multipart::Form;
use serde::Deserialize;
use tracing::{debug, info};

use super::http_client;
use crate::chatbot::registry::{arg, Arguments, Capability, Payload};

const STABILITY_URL: &str = "https://api.stability.ai/v2beta/stable-image/generate/core";

pub struct ImageClient {
    api_key: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
    name: Option<String>,
    message: Option<String>,
}

impl ImageClient {
    pub fn new(api_key: String) -> Self {
        Self { api_key, http: http_client(60) }
    }
}

#[async_trait]
impl Capability for ImageClient {
    async fn call(&self, args: &Arguments) -> Result<Payload, String> {
        if self.api_key.is_empty() {
            return Err("image API key not configured".to_string());
        }
        let prompt = arg(args, "prompt")?;
        info!("🎨 Generating image: {}", prompt);

        let form = Form::new()
            .text("prompt", prompt.to_string())
            .text("output_format", "png")
            .text("aspect_ratio", "1:1")
            .text("style_preset", "photographic");

        let response = self
            .http
            .post(STABILITY_URL)
            .bearer_auth(&self.api_key)
            .header("accept", "image/*")
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    "Request timed out. Please try again.".to_string()
                } else {
                    format!("Network error: {e}")
                }
            })?;

        let status = response.status();
        debug!("Stability response status: {status}");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(describe_error(status.as_u16(), &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| format!("Failed to read image: {e}"))?;
        if bytes.is_empty() {
            return Err("Empty image in response".to_string());
        }

        info!("🎨 Image generated: {} bytes", bytes.len());
        Ok(Payload::Image { bytes: bytes.to_vec(), prompt: prompt.to_string() })
    }
}

fn describe_error(status: u16, body: &str) -> String {
    let detail = match serde_json::from_str::<ErrorBody>(body) {
        Ok(err) if !err.errors.is_empty() => err.errors.join(", "),
        Ok(ErrorBody { name: Some(name), .. }) => name,
        Ok(ErrorBody { message: Some(message), .. }) => message,
        _ => body.trim().to_string(),
    };
    if detail.is_empty() {
        format!("API request failed with status {status}")
    } else {
        format!("API request failed with status {status}: {detail}")
    }
}
