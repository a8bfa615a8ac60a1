//! Yahoo Finance source.
//!
//! # Endpoints
//! - Daily prices: `<base>/v8/finance/chart/<SYMBOL>?range=<range>&interval=1d`
//! - Quote fields: `<base>/v7/finance/quote?symbols=<SYMBOL>`
//!
//! Scalar metric ids take the form `SYMBOL:field`, e.g. `NVDA:epsForward`.
//!
//! # Quote Authentication
//!
//! Since 2023 the public quote endpoint wants a session cookie plus a matching
//! `crumb` query parameter. This source sends neither, so against the real
//! host the quote lookup normally answers `401 Unauthorized` and surfaces as
//! [`FetchError::Status`]. Valuation is an optional input: the collector marks
//! it unavailable and `valuation_inversion` shows up under the skipped rules
//! of the report. The chart endpoint needs no crumb and is unaffected.
//! Point `sources.yahoo_base_url` at a proxy that handles the cookie/crumb
//! exchange to get the valuation rule back, or set
//! `watchlist.valuation_symbol` to `null` to stop the lookup.

use async_trait::async_trait;
use chrono::{DateTime, Duration};
use serde::Deserialize;

use super::provider::{get_text, http_client, DataSource};
use super::{IndicatorSeries, Observation};
use crate::error::FetchError;
use season_common::config::SourcesConfig;

const SOURCE_NAME: &str = "yahoo";

/// Chart ranges Yahoo accepts, with their length in days.
const CHART_RANGES: &[(&str, i64)] = &[
    ("5d", 5),
    ("1mo", 31),
    ("3mo", 92),
    ("6mo", 183),
    ("1y", 366),
    ("2y", 731),
    ("5y", 1827),
    ("10y", 3653),
];

/// Smallest chart range that covers the lookback.
fn chart_range(lookback: Duration) -> &'static str {
    let days = lookback.num_days().max(1);
    CHART_RANGES
        .iter()
        .find(|(_, len)| *len >= days)
        .map(|(name, _)| *name)
        .unwrap_or("max")
}

/// Percent-encode the characters index symbols use (`^VIX`, `BRK-B` is fine).
fn encode_symbol(symbol: &str) -> String {
    symbol.replace('^', "%5E").replace('=', "%3D")
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
    #[serde(default)]
    adjclose: Vec<AdjCloseBlock>,
}

#[derive(Debug, Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseBlock {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    quote_response: QuoteEnvelope,
}

#[derive(Debug, Deserialize)]
struct QuoteEnvelope {
    #[serde(default)]
    result: Vec<serde_json::Map<String, serde_json::Value>>,
    error: Option<YahooError>,
}

// ============================================================================
// Source
// ============================================================================

pub struct YahooSource {
    client: reqwest::Client,
    base_url: String,
}

impl YahooSource {
    pub fn new(config: &SourcesConfig) -> Self {
        Self::with_base_url(
            config.yahoo_base_url.clone(),
            http_client(config.timeout_secs, &config.user_agent),
        )
    }

    pub fn with_base_url(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn parse_err(series: &str, message: impl Into<String>) -> FetchError {
        FetchError::Parse {
            source_name: SOURCE_NAME,
            series: series.to_string(),
            message: message.into(),
        }
    }

    fn missing(series: &str) -> FetchError {
        FetchError::MissingData {
            source_name: SOURCE_NAME,
            series: series.to_string(),
        }
    }
}

#[async_trait]
impl DataSource for YahooSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn fetch(
        &self,
        series_id: &str,
        lookback: Duration,
    ) -> Result<IndicatorSeries, FetchError> {
        let url = format!(
            "{}/v8/finance/chart/{}?range={}&interval=1d",
            self.base_url,
            encode_symbol(series_id),
            chart_range(lookback)
        );
        let body = get_text(&self.client, SOURCE_NAME, series_id, &url).await?;

        let parsed: ChartResponse =
            serde_json::from_str(&body).map_err(|e| Self::parse_err(series_id, e.to_string()))?;

        if let Some(err) = parsed.chart.error {
            tracing::warn!(
                series = series_id,
                code = %err.code,
                description = ?err.description,
                "Yahoo chart error"
            );
            return Err(Self::missing(series_id));
        }

        let result = parsed
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| Self::missing(series_id))?;

        let closes: Vec<Option<f64>> = match result.indicators.adjclose.into_iter().next() {
            Some(block) if !block.adjclose.is_empty() => block.adjclose,
            _ => result
                .indicators
                .quote
                .into_iter()
                .next()
                .map(|q| q.close)
                .unwrap_or_default(),
        };

        if closes.len() != result.timestamp.len() {
            return Err(Self::parse_err(
                series_id,
                format!(
                    "{} timestamps but {} closes",
                    result.timestamp.len(),
                    closes.len()
                ),
            ));
        }

        let observations = result
            .timestamp
            .iter()
            .zip(closes)
            .filter_map(|(ts, close)| {
                Some(Observation {
                    timestamp: DateTime::from_timestamp(*ts, 0)?,
                    value: close?,
                })
            })
            .collect();

        let series = IndicatorSeries::new(series_id, observations);
        if series.is_empty() {
            return Err(Self::missing(series_id));
        }

        tracing::debug!(
            series = series_id,
            observations = series.len(),
            latest = ?series.latest(),
            "Yahoo series loaded"
        );
        Ok(series)
    }

    async fn fetch_latest_scalar(&self, metric_id: &str) -> Result<f64, FetchError> {
        let (symbol, field) = metric_id
            .split_once(':')
            .ok_or_else(|| Self::parse_err(metric_id, "metric id must be SYMBOL:field"))?;

        let url = format!(
            "{}/v7/finance/quote?symbols={}",
            self.base_url,
            encode_symbol(symbol)
        );
        let body = get_text(&self.client, SOURCE_NAME, metric_id, &url).await?;

        let parsed: QuoteResponse =
            serde_json::from_str(&body).map_err(|e| Self::parse_err(metric_id, e.to_string()))?;

        if let Some(err) = parsed.quote_response.error {
            tracing::warn!(metric = metric_id, code = %err.code, "Yahoo quote error");
            return Err(Self::missing(metric_id));
        }

        parsed
            .quote_response
            .result
            .first()
            .and_then(|quote| quote.get(field))
            .and_then(serde_json::Value::as_f64)
            .filter(|v| v.is_finite())
            .ok_or_else(|| Self::missing(metric_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_range_mapping() {
        assert_eq!(chart_range(Duration::days(5)), "5d");
        assert_eq!(chart_range(Duration::days(20)), "1mo");
        assert_eq!(chart_range(Duration::days(90)), "3mo");
        assert_eq!(chart_range(Duration::days(365)), "1y");
        assert_eq!(chart_range(Duration::days(20_000)), "max");
        assert_eq!(chart_range(Duration::hours(3)), "5d");
    }

    #[test]
    fn test_encode_symbol() {
        assert_eq!(encode_symbol("^VIX"), "%5EVIX");
        assert_eq!(encode_symbol("SPY"), "SPY");
    }

    #[test]
    fn test_chart_response_with_nulls() {
        let body = r#"{"chart":{"result":[{"timestamp":[1,2,3],
            "indicators":{"quote":[{"close":[10.0,null,12.5]}]}}],"error":null}}"#;
        let parsed: ChartResponse = serde_json::from_str(body).unwrap();
        let result = parsed.chart.result.unwrap().remove(0);
        assert_eq!(result.indicators.quote[0].close, vec![Some(10.0), None, Some(12.5)]);
        assert!(result.indicators.adjclose.is_empty());
    }

    #[test]
    fn test_chart_error_envelope() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#;
        let parsed: ChartResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.chart.result.is_none());
        assert_eq!(parsed.chart.error.unwrap().code, "Not Found");
    }
}
