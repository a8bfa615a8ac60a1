//! FRED (Federal Reserve Economic Data) source.
//!
//! Uses the public graph CSV export, which needs no API key:
//! `<base>/graph/fredgraph.csv?id=<SERIES>&cosd=<YYYY-MM-DD>`
//!
//! The body is `DATE,<SERIES>` followed by one row per observation. FRED
//! writes `.` for days without a value (holidays for daily series).
//!
//! Key series: BAMLH0A0HYM2 (high-yield OAS), UNRATE (unemployment),
//! CP (corporate profits after tax).

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};

use super::provider::{get_text, http_client, DataSource};
use super::{IndicatorSeries, Observation};
use crate::error::FetchError;
use season_common::config::SourcesConfig;

const SOURCE_NAME: &str = "fred";

/// Lookback used when only the latest value is wanted.
const LATEST_LOOKBACK_DAYS: i64 = 30;

/// Placeholder FRED writes for a missing observation.
const MISSING_VALUE: &str = ".";

pub struct FredSource {
    client: reqwest::Client,
    base_url: String,
}

impl FredSource {
    pub fn new(config: &SourcesConfig) -> Self {
        Self::with_base_url(
            config.fred_base_url.clone(),
            http_client(config.timeout_secs, &config.user_agent),
        )
    }

    pub fn with_base_url(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn csv_url(&self, series_id: &str, start: NaiveDate) -> String {
        format!(
            "{}/graph/fredgraph.csv?id={}&cosd={}",
            self.base_url,
            series_id,
            start.format("%Y-%m-%d")
        )
    }
}

#[async_trait]
impl DataSource for FredSource {
    fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn fetch(
        &self,
        series_id: &str,
        lookback: Duration,
    ) -> Result<IndicatorSeries, FetchError> {
        let start = (Utc::now() - lookback).date_naive();
        let body = get_text(&self.client, SOURCE_NAME, series_id, &self.csv_url(series_id, start))
            .await?;

        let series = parse_csv(series_id, &body)?;
        if series.is_empty() {
            return Err(FetchError::MissingData {
                source_name: SOURCE_NAME,
                series: series_id.to_string(),
            });
        }

        tracing::debug!(
            series = series_id,
            observations = series.len(),
            latest = ?series.latest(),
            "FRED series loaded"
        );
        Ok(series)
    }

    async fn fetch_latest_scalar(&self, metric_id: &str) -> Result<f64, FetchError> {
        let series = self
            .fetch(metric_id, Duration::days(LATEST_LOOKBACK_DAYS))
            .await?;
        series.latest().ok_or_else(|| FetchError::MissingData {
            source_name: SOURCE_NAME,
            series: metric_id.to_string(),
        })
    }
}

/// Parse a fredgraph CSV body. The first line is the header.
fn parse_csv(series_id: &str, body: &str) -> Result<IndicatorSeries, FetchError> {
    let parse_err = |message: String| FetchError::Parse {
        source_name: SOURCE_NAME,
        series: series_id.to_string(),
        message,
    };

    let mut lines = body.lines().map(str::trim).filter(|l| !l.is_empty());

    let header = lines.next().ok_or_else(|| parse_err("empty body".into()))?;
    if !header.contains(',') {
        return Err(parse_err(format!("unexpected header: {header}")));
    }

    let mut observations = Vec::new();
    for line in lines {
        let (date, value) = line
            .split_once(',')
            .ok_or_else(|| parse_err(format!("malformed row: {line}")))?;

        let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .map_err(|e| parse_err(format!("bad date {date:?}: {e}")))?;

        let value = value.trim();
        if value == MISSING_VALUE || value.is_empty() {
            continue;
        }
        let value: f64 = value
            .parse()
            .map_err(|_| parse_err(format!("bad value {value:?} on {date}")))?;

        let timestamp = match date.and_hms_opt(0, 0, 0) {
            Some(dt) => dt.and_utc(),
            None => continue,
        };
        observations.push(Observation { timestamp, value });
    }

    Ok(IndicatorSeries::new(series_id, observations))
}
