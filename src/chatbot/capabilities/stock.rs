//! Stock quotes from the Yahoo Finance chart endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use super::http_client;
use crate::chatbot::registry::{arg, Arguments, Capability, Payload};

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub name: String,
    pub currency: String,
    pub price: f64,
    pub previous_close: f64,
}

#[derive(Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Deserialize)]
struct ChartError {
    description: String,
}

#[derive(Deserialize)]
struct ChartResult {
    meta: Meta,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Meta {
    symbol: String,
    currency: Option<String>,
    long_name: Option<String>,
    short_name: Option<String>,
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
    previous_close: Option<f64>,
}

pub struct StockClient {
    http: reqwest::Client,
}

impl StockClient {
    pub fn new() -> Self {
        Self { http: http_client(15) }
    }
}

impl Default for StockClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for StockClient {
    async fn call(&self, args: &Arguments) -> Result<Payload, String> {
        let symbol = normalize_symbol(arg(args, "symbol")?)?;
        info!("📊 Getting quote for: {symbol}");

        let url = format!("{}/{}", CHART_URL, urlencoding::encode(&symbol));
        let response = self
            .http
            .get(&url)
            .query(&[("range", "1d"), ("interval", "1d")])
            .send()
            .await
            .map_err(|e| format!("HTTP error: {e}"))?;

        let body = response
            .text()
            .await
            .map_err(|e| format!("Failed to read response: {e}"))?;

        let quote = parse_quote(&body, &symbol)?;
        Ok(Payload::Text(format_quote(&quote)))
    }
}

/// Tickers are short and limited to letters, digits and a few separators (`RELIANCE.NS`, `^GSPC`).
fn normalize_symbol(raw: &str) -> Result<String, String> {
    let symbol = raw.trim().trim_start_matches('$').to_uppercase();
    let valid = !symbol.is_empty()
        && symbol.len() <= 15
        && symbol.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));
    if valid {
        Ok(symbol)
    } else {
        Err(format!("'{}' doesn't look like a stock symbol", raw.trim()))
    }
}

fn parse_quote(body: &str, symbol: &str) -> Result<Quote, String> {
    let parsed: ChartResponse =
        serde_json::from_str(body).map_err(|e| format!("Failed to parse response: {e}"))?;

    if let Some(error) = parsed.chart.error {
        return Err(format!("Stock service error: {}", error.description));
    }

    let meta = parsed
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .map(|r| r.meta)
        .ok_or_else(|| format!("No stock data for {symbol}"))?;

    let price = meta
        .regular_market_price
        .ok_or_else(|| format!("No current price for {symbol}"))?;
    let previous_close = meta
        .chart_previous_close
        .or(meta.previous_close)
        .ok_or_else(|| format!("No previous close for {symbol}"))?;

    Ok(Quote {
        name: meta.long_name.or(meta.short_name).unwrap_or_else(|| meta.symbol.clone()),
        symbol: meta.symbol,
        currency: meta.currency.unwrap_or_else(|| "USD".to_string()),
        price,
        previous_close,
    })
}

fn currency_prefix(code: &str) -> String {
    match code {
        "USD" => "$".to_string(),
        "INR" => "₹".to_string(),
        "EUR" => "€".to_string(),
        "GBP" => "£".to_string(),
        other => format!("{other} "),
    }
}

fn format_quote(quote: &Quote) -> String {
    let change = quote.price - quote.previous_close;
    let percent = if quote.previous_close != 0.0 {
        change / quote.previous_close * 100.0
    } else {
        0.0
    };
    let (emoji, sign) = if change >= 0.0 { ("📈", "+") } else { ("📉", "") };
    let cur = currency_prefix(&quote.currency);

    format!(
        "📊 {} ({})\n💰 Current: {cur}{:.2}\n{emoji} Change: {sign}{:.2} ({sign}{:.2}%)\n📅 Previous Close: {cur}{:.2}",
        quote.name, quote.symbol, quote.price, change, percent, quote.previous_close
    )
}
