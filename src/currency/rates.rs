//! Exchange-rate fetch from the public currency API, with fallback mirrors.
//!
//! ERROR HANDLING
//! ==============
//! Each source failure is logged and the next URL is tried. Only when every
//! source fails does the caller see [`RatesError::AllSourcesFailed`], which
//! the localizer turns into base-currency display.

use serde::Deserialize;
use tracing::{debug, warn};

use super::ExchangeRates;
use crate::config::HttpTimeouts;

#[cfg(test)]
#[path = "rates_test.rs"]
mod tests;

#[derive(Debug, thiserror::Error)]
pub enum RatesError {
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
    #[error("all {attempts} currency rate sources failed")]
    AllSourcesFailed { attempts: usize },
}

/// `{ "date": "...", "pln": { "usd": 0.25, "uah": 10.4, ... } }`
#[derive(Debug, Deserialize)]
struct RatesPayload {
    pln: PlnRates,
}

#[derive(Debug, Deserialize)]
struct PlnRates {
    #[serde(default)]
    usd: Option<f64>,
    #[serde(default)]
    uah: Option<f64>,
}

/// Parse a rates payload; bodies without a `pln` table are rejected.
pub(crate) fn parse_rates(body: &str) -> Result<ExchangeRates, serde_json::Error> {
    let payload: RatesPayload = serde_json::from_str(body)?;
    Ok(ExchangeRates { usd: payload.pln.usd, uah: payload.pln.uah })
}

/// Fetches rates relative to PLN, trying each configured URL in order.
///
/// Implemented by [`RatesClient`]; tests and embedders can supply fixed tables.
#[async_trait::async_trait]
pub trait RatesSource: Send + Sync {
    /// # Errors
    ///
    /// Returns [`RatesError::AllSourcesFailed`] when no source answers usably.
    async fn fetch_rates(&self) -> Result<ExchangeRates, RatesError>;
}

pub struct RatesClient {
    http: reqwest::Client,
    urls: Vec<String>,
}

impl RatesClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(urls: Vec<String>, timeouts: HttpTimeouts) -> Result<Self, RatesError> {
        let http = reqwest::Client::builder()
            .timeout(timeouts.request())
            .connect_timeout(timeouts.connect())
            .build()
            .map_err(|e| RatesError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, urls })
    }

    async fn fetch_one(&self, url: &str) -> Result<ExchangeRates, String> {
        let response = self.http.get(url).send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("status {status}"));
        }
        let body = response.text().await.map_err(|e| e.to_string())?;
        parse_rates(&body).map_err(|e| e.to_string())
    }
}

#[async_trait::async_trait]
impl RatesSource for RatesClient {
    async fn fetch_rates(&self) -> Result<ExchangeRates, RatesError> {
        for url in &self.urls {
            match self.fetch_one(url).await {
                Ok(rates) => {
                    debug!(%url, usd = ?rates.usd, uah = ?rates.uah, "exchange rates loaded");
                    return Ok(rates);
                }
                Err(error) => warn!(%url, %error, "exchange rate source failed"),
            }
        }
        Err(RatesError::AllSourcesFailed { attempts: self.urls.len() })
    }
}
