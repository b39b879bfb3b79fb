//! Localized price display over a single base currency (PLN).
//!
//! DESIGN
//! ======
//! Prices are stored and charged in PLN only. Other currencies are display
//! conversions using a rate table fetched once per application load
//! ([`rates`]). Formatting is pure and never fails: when a rate is missing
//! the base amount is shown with its ISO code.

pub mod localizer;
pub mod rates;

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

pub const BASE_CURRENCY: CurrencyCode = CurrencyCode::Pln;
pub const DEFAULT_LOCALE: &str = "pl";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrencyCode {
    Usd,
    Uah,
    Pln,
}

impl CurrencyCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Uah => "UAH",
            Self::Pln => "PLN",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolPosition {
    Before,
    After,
}

/// How one locale displays money.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrencyConfig {
    pub code: CurrencyCode,
    pub symbol: &'static str,
    pub position: SymbolPosition,
}

impl CurrencyConfig {
    #[must_use]
    pub fn format(&self, amount: f64) -> String {
        match self.position {
            SymbolPosition::Before => format!("{}{amount:.2}", self.symbol),
            SymbolPosition::After => format!("{amount:.2} {}", self.symbol),
        }
    }
}

const USD_CONFIG: CurrencyConfig = CurrencyConfig { code: CurrencyCode::Usd, symbol: "$", position: SymbolPosition::Before };
const UAH_CONFIG: CurrencyConfig = CurrencyConfig { code: CurrencyCode::Uah, symbol: "₴", position: SymbolPosition::After };
const PLN_CONFIG: CurrencyConfig = CurrencyConfig { code: CurrencyCode::Pln, symbol: "zł", position: SymbolPosition::After };

/// Exact-match currency config for a supported language code.
#[must_use]
pub fn config_for_language(language: &str) -> Option<CurrencyConfig> {
    match language {
        "en" => Some(USD_CONFIG),
        "uk" => Some(UAH_CONFIG),
        "pl" => Some(PLN_CONFIG),
        _ => None,
    }
}

/// Currency config for a locale tag (`en`, `en-US`, `uk_UA`), falling back to PLN.
#[must_use]
pub fn resolve_config(locale: &str) -> CurrencyConfig {
    lookup_config(locale).unwrap_or(PLN_CONFIG)
}

fn lookup_config(locale: &str) -> Option<CurrencyConfig> {
    let normalized = locale.trim().to_ascii_lowercase();
    config_for_language(&normalized).or_else(|| {
        let primary = normalized.split(['-', '_']).next().unwrap_or_default();
        config_for_language(primary)
    })
}

/// Rates relative to 1 PLN. PLN itself is implicitly 1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRates {
    #[serde(default)]
    pub usd: Option<f64>,
    #[serde(default)]
    pub uah: Option<f64>,
}

impl ExchangeRates {
    /// Rate for `code`; unusable values (absent, zero, negative, NaN) read as missing.
    #[must_use]
    pub fn rate(&self, code: CurrencyCode) -> Option<f64> {
        let rate = match code {
            CurrencyCode::Pln => Some(1.0),
            CurrencyCode::Usd => self.usd,
            CurrencyCode::Uah => self.uah,
        };
        rate.filter(|r| r.is_finite() && *r > 0.0)
    }
}

/// Convert a PLN amount into `target`, or `None` when no usable rate exists.
#[must_use]
pub fn convert_price(price_pln: f64, target: CurrencyCode, rates: Option<&ExchangeRates>) -> Option<f64> {
    rates.and_then(|r| r.rate(target)).map(|rate| price_pln * rate)
}

/// Display string for a PLN price in `locale`.
///
/// PLN locales show the base value; without a usable rate the base value is
/// shown as `"{amount} PLN"`; otherwise the converted value uses the locale's
/// symbol placement.
#[must_use]
pub fn format_localized_price(price_pln: f64, locale: &str, rates: Option<&ExchangeRates>) -> String {
    let config = resolve_config(locale);
    if config.code == BASE_CURRENCY {
        return config.format(price_pln);
    }
    match convert_price(price_pln, config.code, rates) {
        Some(converted) => config.format(converted),
        None => format_base_code(price_pln),
    }
}

/// Base amount with the ISO code, e.g. `"100.00 PLN"`.
#[must_use]
pub fn format_base_code(price_pln: f64) -> String {
    format!("{price_pln:.2} {}", BASE_CURRENCY.as_str())
}

/// Transparency note shown next to converted prices; empty for PLN or unknown locales.
#[must_use]
pub fn currency_disclaimer(locale: &str) -> String {
    match lookup_config(locale) {
        Some(config) if config.code != BASE_CURRENCY => format!(
            "Prices shown in {} are estimates. Final payment processed in {}.",
            config.code.as_str(),
            BASE_CURRENCY.as_str()
        ),
        _ => String::new(),
    }
}
