//! Memes captioned through Imgflip.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::info;

use super::http_client;
use crate::chatbot::registry::{Arguments, Capability, Payload};

const GET_MEMES_URL: &str = "https://api.imgflip.com/get_memes";
const CAPTION_URL: &str = "https://api.imgflip.com/caption_image";

#[derive(Debug, Clone, PartialEq)]
pub struct MemeReport {
    pub url: String,
    pub page_url: String,
    pub template_name: String,
    pub top_text: String,
    pub bottom_text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub box_count: u32,
}

#[derive(Deserialize)]
struct MemesResponse {
    success: bool,
    data: Option<MemesData>,
}

#[derive(Deserialize)]
struct MemesData {
    memes: Vec<Template>,
}

#[derive(Deserialize)]
struct CaptionResponse {
    success: bool,
    data: Option<CaptionData>,
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct CaptionData {
    url: String,
    page_url: String,
}

pub struct MemeClient {
    username: Option<String>,
    password: Option<String>,
    http: reqwest::Client,
}

impl MemeClient {
    pub fn new(username: Option<String>, password: Option<String>) -> Self {
        Self { username, password, http: http_client(30) }
    }

    async fn templates(&self) -> Result<Vec<Template>, String> {
        let response = self
            .http
            .get(GET_MEMES_URL)
            .send()
            .await
            .map_err(|e| format!("Error fetching memes: {e}"))?;
        let parsed: MemesResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse meme templates: {e}"))?;

        match parsed.data {
            Some(data) if parsed.success && !data.memes.is_empty() => Ok(data.memes),
            _ => Err("No meme templates available".to_string()),
        }
    }
}

#[async_trait]
impl Capability for MemeClient {
    async fn call(&self, args: &Arguments) -> Result<Payload, String> {
        let (Some(username), Some(password)) = (self.username.as_deref(), self.password.as_deref()) else {
            return Err("Imgflip credentials not configured".to_string());
        };

        let top_text = args.get("top_text").cloned().unwrap_or_default();
        let bottom_text = args.get("bottom_text").cloned().unwrap_or_default();
        let wanted = args.get("template").map(String::as_str);

        let templates = self.templates().await?;
        let template = pick_template(&templates, wanted, &mut rand::thread_rng())
            .cloned()
            .ok_or("No meme templates available")?;
        info!("🎭 Selected meme template: {} (ID: {})", template.name, template.id);

        let mut form = vec![
            ("template_id", template.id.as_str()),
            ("username", username),
            ("password", password),
            ("font", "impact"),
            ("max_font_size", "50"),
        ];
        if !top_text.is_empty() {
            form.push(("text0", top_text.as_str()));
        }
        if !bottom_text.is_empty() {
            form.push(("text1", bottom_text.as_str()));
        }

        let response = self
            .http
            .post(CAPTION_URL)
            .form(&form)
            .send()
            .await
            .map_err(|e| format!("Error generating meme: {e}"))?;
        let parsed: CaptionResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse meme response: {e}"))?;

        match parsed.data {
            Some(data) if parsed.success => Ok(Payload::Meme(MemeReport {
                url: data.url,
                page_url: data.page_url,
                template_name: template.name,
                top_text,
                bottom_text,
            })),
            _ => Err(format!(
                "Imgflip API error: {}",
                parsed.error_message.unwrap_or_else(|| "Unknown error".to_string())
            )),
        }
    }
}

/// Name match when a template is asked for, otherwise a random two-box template.
pub fn pick_template<'a, R: rand::Rng + ?Sized>(
    templates: &'a [Template],
    wanted: Option<&str>,
    rng: &mut R,
) -> Option<&'a Template> {
    if let Some(wanted) = wanted.map(str::trim).filter(|w| !w.is_empty()) {
        let wanted = wanted.to_lowercase();
        if let Some(found) = templates.iter().find(|t| t.name.to_lowercase().contains(&wanted)) {
            return Some(found);
        }
    }

    let two_box: Vec<&Template> = templates.iter().filter(|t| t.box_count >= 2).collect();
    if two_box.is_empty() {
        templates.choose(rng)
    } else {
        two_box.choose(rng).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    fn templates() -> Vec<Template> {
        vec![
            Template { id: "1".into(), name: "Drake Hotline Bling".into(), box_count: 2 },
            Template { id: "2".into(), name: "Lonely Caption".into(), box_count: 1 },
            Template { id: "3".into(), name: "Two Buttons".into(), box_count: 3 },
        ]
    }

    #[test]
    fn test_pick_by_name() {
        let all = templates();
        let mut rng = StepRng::new(0, 1);
        assert_eq!(pick_template(&all, Some("drake"), &mut rng).unwrap().id, "1");
        assert_eq!(pick_template(&all, Some(" BUTTONS "), &mut rng).unwrap().id, "3");
    }

    #[test]
    fn test_random_prefers_two_box() {
        let all = templates();
        let mut rng = StepRng::new(0, 0x9E37_79B9_7F4A_7C15);
        for _ in 0..20 {
            let picked = pick_template(&all, Some("programming"), &mut rng).unwrap();
            assert!(picked.box_count >= 2);
        }
    }

    #[test]
    fn test_empty_templates() {
        let mut rng = StepRng::new(0, 1);
        assert!(pick_template(&[], None, &mut rng).is_none());
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let client = MemeClient::new(None, None);
        assert!(client.call(&Arguments::new()).await.is_err());
    }
}
