//! Per-application currency display state: active locale, the rate table
//! loaded once per app start, and the "show original price" toggle.

use tracing::{info, warn};

use super::rates::RatesSource;
use super::{BASE_CURRENCY, ExchangeRates, currency_disclaimer, format_base_code, format_localized_price, resolve_config};

#[cfg(test)]
#[path = "localizer_test.rs"]
mod tests;

#[derive(Clone, Debug)]
pub struct CurrencyLocalizer {
    locale: String,
    rates: Option<ExchangeRates>,
    rates_loaded: bool,
    show_original_price: bool,
}

impl CurrencyLocalizer {
    #[must_use]
    pub fn new(locale: impl Into<String>) -> Self {
        Self { locale: locale.into(), rates: None, rates_loaded: false, show_original_price: false }
    }

    #[must_use]
    pub fn with_rates(locale: impl Into<String>, rates: ExchangeRates) -> Self {
        Self { rates: Some(rates), rates_loaded: true, ..Self::new(locale) }
    }

    /// Load the rate table once. Failures are logged and leave prices in PLN.
    pub async fn load_rates(&mut self, source: &dyn RatesSource) {
        if self.rates_loaded {
            return;
        }
        self.rates = match source.fetch_rates().await {
            Ok(rates) => {
                info!(usd = ?rates.usd, uah = ?rates.uah, "currency rates ready");
                Some(rates)
            }
            Err(error) => {
                warn!(%error, "exchange rates unavailable, showing base currency");
                None
            }
        };
        self.rates_loaded = true;
    }

    #[must_use]
    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn set_locale(&mut self, locale: impl Into<String>) {
        self.locale = locale.into();
    }

    #[must_use]
    pub fn rates(&self) -> Option<&ExchangeRates> {
        self.rates.as_ref()
    }

    #[must_use]
    pub fn show_original_price(&self) -> bool {
        self.show_original_price
    }

    pub fn toggle_price_view(&mut self) {
        self.show_original_price = !self.show_original_price;
    }

    /// Display string for a PLN price under the current settings.
    #[must_use]
    pub fn format_price(&self, price_pln: f64) -> String {
        let config = resolve_config(&self.locale);
        if config.code == BASE_CURRENCY {
            return config.format(price_pln);
        }
        if self.show_original_price {
            return format_base_code(price_pln);
        }
        format_localized_price(price_pln, &self.locale, self.rates.as_ref())
    }

    #[must_use]
    pub fn disclaimer(&self) -> String {
        if self.show_original_price {
            return String::new();
        }
        currency_disclaimer(&self.locale)
    }
}
