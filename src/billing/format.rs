//! Invoice display helpers.

use time::{Month, OffsetDateTime, UtcOffset};

use crate::api::billing::InvoiceStatus;
use crate::currency::{ExchangeRates, format_localized_price};

#[cfg(test)]
#[path = "format_test.rs"]
mod tests;

/// Invoice amount (minor units of PLN) as a localized price.
#[must_use]
pub fn format_amount(locale: &str, amount_minor: i64, rates: Option<&ExchangeRates>) -> String {
    #[allow(clippy::cast_precision_loss)]
    let amount = amount_minor as f64 / 100.0;
    format_localized_price(amount, locale, rates)
}

/// Long-form date for a Unix timestamp, in UTC.
///
/// `en` → "January 5, 2026", `pl` → "5 stycznia 2026", `uk` → "5 січня 2026 р.".
/// Other locales use the English form. Out-of-range timestamps yield an empty string.
#[must_use]
pub fn format_invoice_date(locale: &str, unix_secs: i64) -> String {
    let Ok(datetime) = OffsetDateTime::from_unix_timestamp(unix_secs) else {
        return String::new();
    };
    let date = datetime.to_offset(UtcOffset::UTC).date();
    let (day, month, year) = (date.day(), date.month(), date.year());

    match primary_language(locale).as_str() {
        "pl" => format!("{day} {} {year}", polish_month(month)),
        "uk" => format!("{day} {} {year} р.", ukrainian_month(month)),
        _ => format!("{month} {day}, {year}"),
    }
}

/// Translation key for an invoice status badge.
#[must_use]
pub fn status_label_key(status: InvoiceStatus) -> Option<&'static str> {
    match status {
        InvoiceStatus::Paid => Some("billing.invoices.statuses.paid"),
        InvoiceStatus::Pending => Some("billing.invoices.statuses.pending"),
        InvoiceStatus::Failed => Some("billing.invoices.statuses.failed"),
        InvoiceStatus::Draft => Some("billing.invoices.statuses.draft"),
        InvoiceStatus::Other => None,
    }
}

fn primary_language(locale: &str) -> String {
    locale.split(['-', '_']).next().unwrap_or_default().to_ascii_lowercase()
}

// Genitive forms, as used after a day number.
fn polish_month(month: Month) -> &'static str {
    match month {
        Month::January => "stycznia",
        Month::February => "lutego",
        Month::March => "marca",
        Month::April => "kwietnia",
        Month::May => "maja",
        Month::June => "czerwca",
        Month::July => "lipca",
        Month::August => "sierpnia",
        Month::September => "września",
        Month::October => "października",
        Month::November => "listopada",
        Month::December => "grudnia",
    }
}

fn ukrainian_month(month: Month) -> &'static str {
    match month {
        Month::January => "січня",
        Month::February => "лютого",
        Month::March => "березня",
        Month::April => "квітня",
        Month::May => "травня",
        Month::June => "червня",
        Month::July => "липня",
        Month::August => "серпня",
        Month::September => "вересня",
        Month::October => "жовтня",
        Month::November => "листопада",
        Month::December => "грудня",
    }
}
