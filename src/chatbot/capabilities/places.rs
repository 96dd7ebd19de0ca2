//! Nearby places via the Google Places web service.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::http_client;
use crate::chatbot::registry::{arg, Arguments, Capability, Payload};

const NEARBY_URL: &str = "https://maps.googleapis.com/maps/api/place/nearbysearch/json";
const TEXT_SEARCH_URL: &str = "https://maps.googleapis.com/maps/api/place/textsearch/json";
const START_RADIUS_M: u32 = 5_000;
const MAX_RADIUS_M: u32 = 20_000;
const MAX_RESULTS: usize = 20;
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Query words that map onto a Places type. First match wins.
const TYPE_MAPPING: &[(&str, &str)] = &[
    ("restaurant", "restaurant"),
    ("pub", "bar"),
    ("bar", "bar"),
    ("cafe", "cafe"),
    ("coffee", "cafe"),
    ("food", "restaurant"),
    ("dining", "restaurant"),
    ("nightlife", "bar"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub name: String,
    pub address: String,
    pub rating: Option<f64>,
    pub user_ratings_total: Option<u64>,
    pub price_level: Option<u8>,
    pub open_now: Option<bool>,
    pub distance_m: f64,
}

/// Search results plus the page the user asked for (zero-based).
#[derive(Debug, Clone, PartialEq)]
pub struct PlacesReport {
    pub query: String,
    pub places: Vec<Place>,
    pub page: usize,
    pub radius_m: u32,
}

#[derive(Deserialize)]
struct SearchResponse {
    status: String,
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<ApiPlace>,
}

#[derive(Deserialize)]
struct ApiPlace {
    name: Option<String>,
    vicinity: Option<String>,
    formatted_address: Option<String>,
    rating: Option<f64>,
    user_ratings_total: Option<u64>,
    price_level: Option<u8>,
    opening_hours: Option<OpeningHours>,
    geometry: Option<Geometry>,
}

#[derive(Deserialize)]
struct OpeningHours {
    open_now: Option<bool>,
}

#[derive(Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

pub struct PlacesClient {
    api_key: String,
    http: reqwest::Client,
}

enum SearchOutcome {
    Found(Vec<Place>),
    Empty,
}

impl PlacesClient {
    pub fn new(api_key: String) -> Self {
        Self { api_key, http: http_client(30) }
    }

    async fn search(&self, lat: f64, lon: f64, query: &str, radius_m: u32) -> Result<SearchOutcome, String> {
        let location = format!("{lat},{lon}");
        let radius = radius_m.to_string();

        let request = match place_type(query) {
            Some(kind) => self.http.get(NEARBY_URL).query(&[
                ("location", location.as_str()),
                ("radius", radius.as_str()),
                ("type", kind),
                ("key", self.api_key.as_str()),
            ]),
            None => self.http.get(TEXT_SEARCH_URL).query(&[
                ("query", query),
                ("location", location.as_str()),
                ("radius", radius.as_str()),
                ("key", self.api_key.as_str()),
            ]),
        };

        let response = request.send().await.map_err(|e| format!("HTTP error: {e}"))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| format!("Failed to read response: {e}"))?;
        if !status.is_success() {
            return Err(format!("API request failed with status {status}"));
        }

        parse_search(&body, lat, lon)
    }
}

#[async_trait]
impl Capability for PlacesClient {
    async fn call(&self, args: &Arguments) -> Result<Payload, String> {
        if self.api_key.is_empty() {
            return Err("places API key not configured".to_string());
        }
        let (lat, lon) = parse_coordinates(arg(args, "lat")?, arg(args, "lon")?)?;
        let query = args.get("query").map(String::as_str).unwrap_or("restaurants");
        let page = parse_page(args.get("page").map(String::as_str));

        let mut radius_m = START_RADIUS_M;
        loop {
            info!("🔍 Searching for {query} near {lat}, {lon} within {radius_m}m");
            match self.search(lat, lon, query, radius_m).await? {
                SearchOutcome::Found(places) => {
                    info!("🔍 Found {} places", places.len());
                    return Ok(Payload::Places(PlacesReport { query: query.to_string(), places, page, radius_m }));
                }
                SearchOutcome::Empty if radius_m < MAX_RADIUS_M => radius_m *= 2,
                SearchOutcome::Empty => {
                    return Ok(Payload::Places(PlacesReport {
                        query: query.to_string(),
                        places: Vec::new(),
                        page: 0,
                        radius_m,
                    }));
                }
            }
        }
    }
}

pub fn place_type(query: &str) -> Option<&'static str> {
    let lowered = query.to_lowercase();
    TYPE_MAPPING
        .iter()
        .find(|(word, _)| lowered.contains(word))
        .map(|(_, kind)| *kind)
}

fn parse_coordinates(lat: &str, lon: &str) -> Result<(f64, f64), String> {
    let lat: f64 = lat.trim().parse().map_err(|_| format!("invalid latitude '{lat}'"))?;
    let lon: f64 = lon.trim().parse().map_err(|_| format!("invalid longitude '{lon}'"))?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(format!("coordinates out of range: {lat}, {lon}"));
    }
    Ok((lat, lon))
}

/// Users count pages from 1.
fn parse_page(raw: Option<&str>) -> usize {
    raw.and_then(|p| p.trim().parse::<usize>().ok())
        .map(|p| p.saturating_sub(1))
        .unwrap_or(0)
}

/// Great-circle distance in metres.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

fn parse_search(body: &str, lat: f64, lon: f64) -> Result<SearchOutcome, String> {
    let parsed: SearchResponse =
        serde_json::from_str(body).map_err(|e| format!("Failed to parse response: {e}"))?;

    match parsed.status.as_str() {
        "OK" => {}
        "ZERO_RESULTS" => return Ok(SearchOutcome::Empty),
        other => {
            return Err(match parsed.error_message {
                Some(msg) => format!("Google Places API error: {other} - {msg}"),
                None => format!("Google Places API error: {other}"),
            });
        }
    }

    let places: Vec<Place> = parsed
        .results
        .into_iter()
        .take(MAX_RESULTS)
        .map(|p| Place {
            name: p.name.unwrap_or_else(|| "Unknown".to_string()),
            address: p
                .vicinity
                .or(p.formatted_address)
                .unwrap_or_else(|| "Address not available".to_string()),
            rating: p.rating,
            user_ratings_total: p.user_ratings_total,
            price_level: p.price_level,
            open_now: p.opening_hours.and_then(|h| h.open_now),
            distance_m: p
                .geometry
                .map(|g| haversine_m(lat, lon, g.location.lat, g.location.lng))
                .unwrap_or(0.0),
        })
        .collect();

    if places.is_empty() {
        return Ok(SearchOutcome::Empty);
    }
    Ok(SearchOutcome::Found(places))
}
