//! Data source abstraction.
//!
//! Each upstream (FRED, Yahoo) implements `DataSource`. The collector only
//! talks to the trait, so tests can substitute canned series.

use async_trait::async_trait;
use chrono::Duration;

use super::IndicatorSeries;
use crate::error::FetchError;

/// A provider of timestamped scalar series.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Provider name used in logs and errors (e.g., "fred", "yahoo")
    fn name(&self) -> &'static str;

    /// Fetch a series covering roughly `lookback` up to now.
    ///
    /// # Arguments
    /// * `series_id` - Provider-specific id (e.g., "UNRATE", "^VIX")
    /// * `lookback` - How far back the window should reach
    async fn fetch(&self, series_id: &str, lookback: Duration)
        -> Result<IndicatorSeries, FetchError>;

    /// Fetch a single current value.
    ///
    /// The metric id format is provider-specific.
    async fn fetch_latest_scalar(&self, metric_id: &str) -> Result<f64, FetchError>;
}

/// Build a reqwest client the way every source does.
pub(crate) fn http_client(timeout_secs: u64, user_agent: &str) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .user_agent(user_agent)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Send a GET and return the body text, mapping failures to `FetchError`.
pub(crate) async fn get_text(
    client: &reqwest::Client,
    source_name: &'static str,
    series: &str,
    url: &str,
) -> Result<String, FetchError> {
    tracing::debug!(source = source_name, series, url, "Fetching series");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::Network {
            source_name,
            series: series.to_string(),
            message: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            source_name,
            series: series.to_string(),
            status: status.as_u16(),
        });
    }

    response.text().await.map_err(|e| FetchError::Network {
        source_name,
        series: series.to_string(),
        message: e.to_string(),
    })
}
