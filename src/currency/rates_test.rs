use super::*;

#[test]
fn parse_rates_reads_pln_table() {
    let body = r#"{"date":"2026-10-18","pln":{"usd":0.2741,"uah":11.32,"eur":0.2345}}"#;
    let rates = parse_rates(body).unwrap();
    assert_eq!(rates.usd, Some(0.2741));
    assert_eq!(rates.uah, Some(11.32));
}

#[test]
fn parse_rates_tolerates_missing_currencies() {
    let rates = parse_rates(r#"{"pln":{"eur":0.23}}"#).unwrap();
    assert_eq!(rates, ExchangeRates::default());
}

#[test]
fn parse_rates_rejects_payload_without_pln() {
    assert!(parse_rates(r#"{"usd":{"pln":3.6}}"#).is_err());
    assert!(parse_rates("<html>").is_err());
}

#[tokio::test]
async fn fetch_rates_with_no_sources_fails() {
    let client = RatesClient::new(Vec::new(), HttpTimeouts::default()).unwrap();
    let err = client.fetch_rates().await.unwrap_err();
    assert!(matches!(err, RatesError::AllSourcesFailed { attempts: 0 }));
}
