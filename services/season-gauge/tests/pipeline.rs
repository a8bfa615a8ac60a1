//! Integration tests for the full run pipeline with canned sources and a
//! recording notifier.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate};

use season_gauge::data::{
    Auxiliary, DataSource, IndicatorPlan, IndicatorSeries, Observation, SnapshotCollector,
};
use season_gauge::error::{DeliveryError, FetchError, RunError};
use season_gauge::notification::Notifier;
use season_gauge::rules::TREND_READINGS;
use season_gauge::{notify_config_failure, RunOutcome, Season, SeasonReporter};

// ============================================================================
// Mocks
// ============================================================================

/// Source serving fixed series and scalars; anything unknown is missing.
struct CannedSource {
    name: &'static str,
    series: HashMap<String, Vec<f64>>,
    scalars: HashMap<String, f64>,
    failing: Vec<String>,
    calls: AtomicU32,
}

impl CannedSource {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            series: HashMap::new(),
            scalars: HashMap::new(),
            failing: Vec::new(),
            calls: AtomicU32::new(0),
        }
    }

    fn with_series(mut self, id: &str, values: &[f64]) -> Self {
        self.series.insert(id.to_string(), values.to_vec());
        self
    }

    fn with_scalar(mut self, id: &str, value: f64) -> Self {
        self.scalars.insert(id.to_string(), value);
        self
    }

    fn failing(mut self, id: &str) -> Self {
        self.failing.push(id.to_string());
        self
    }

    fn missing(&self, id: &str) -> FetchError {
        FetchError::MissingData {
            source_name: self.name,
            series: id.to_string(),
        }
    }
}

#[async_trait]
impl DataSource for CannedSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self, series_id: &str, _lookback: Duration) -> Result<IndicatorSeries, FetchError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.failing.iter().any(|f| f == series_id) {
            return Err(FetchError::Status {
                source_name: self.name,
                series: series_id.to_string(),
                status: 503,
            });
        }
        let values = self
            .series
            .get(series_id)
            .ok_or_else(|| self.missing(series_id))?;
        let observations = values
            .iter()
            .enumerate()
            .map(|(i, value)| Observation {
                timestamp: DateTime::from_timestamp(1_700_000_000 + i as i64 * 86_400, 0).unwrap(),
                value: *value,
            })
            .collect();
        Ok(IndicatorSeries::new(series_id, observations))
    }

    async fn fetch_latest_scalar(&self, metric_id: &str) -> Result<f64, FetchError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.scalars
            .get(metric_id)
            .copied()
            .ok_or_else(|| self.missing(metric_id))
    }
}

/// Notifier that records every message and can be told to fail.
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
    fail_with: Option<DeliveryError>,
}

impl RecordingNotifier {
    fn failing(error: DeliveryError) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_with: Some(error),
        }
    }

    fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push(text.to_string());
        match &self.fail_with {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn macro_source() -> CannedSource {
    CannedSource::new("fred")
        .with_series("BAMLH0A0HYM2", &[3.3, 3.2, 3.1])
        .with_series("UNRATE", &[3.9, 3.8, 3.8, 3.7])
        .with_series("CP", &[2.9, 3.0, 3.1])
}

fn market_source() -> CannedSource {
    CannedSource::new("yahoo")
        .with_series("^VIX", &[13.5, 12.8])
        .with_series("SPY", &[500.0, 520.0, 515.0])
        .with_series("VRT", &[90.0, 100.0, 98.0])
        .with_scalar("NVDA:epsTrailingTwelveMonths", 2.5)
        .with_scalar("NVDA:epsForward", 3.2)
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 8, 5).unwrap()
}

fn reporter(
    macro_source: CannedSource,
    market_source: CannedSource,
    notifier: Arc<RecordingNotifier>,
) -> SeasonReporter {
    let collector = SnapshotCollector::new(
        Arc::new(macro_source),
        Arc::new(market_source),
        IndicatorPlan::default(),
    );
    SeasonReporter::new(collector, notifier)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_calm_run_reports_benign() {
    let notifier = Arc::new(RecordingNotifier::default());
    let outcome = reporter(macro_source(), market_source(), notifier.clone())
        .run(today())
        .await;

    let verdict = match &outcome {
        RunOutcome::Reported(v) => v,
        other => panic!("unexpected outcome: {other:?}"),
    };
    assert_eq!(verdict.season, Season::Benign);
    assert!(verdict.skipped.is_empty());

    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("(2024-08-05)"));
    assert!(messages[0].contains("3.10% (Summer)"));
}

#[tokio::test]
async fn test_stressed_run_reports_critical() {
    let macro_source = CannedSource::new("fred")
        .with_series("BAMLH0A0HYM2", &[5.2, 5.9, 6.0])
        .with_series("UNRATE", &[4.0, 3.9, 3.8])
        .with_series("CP", &[2.9, 3.0, 3.1]);
    let market_source = market_source()
        .with_series("^VIX", &[28.0, 32.0])
        .with_series("SPY", &[100.0, 85.0, 70.0]);

    let notifier = Arc::new(RecordingNotifier::default());
    let outcome = reporter(macro_source, market_source, notifier.clone())
        .run(today())
        .await;

    let verdict = outcome.verdict().unwrap();
    assert_eq!(verdict.season, Season::Critical);
    let criticals: Vec<_> = verdict.criticals.iter().map(|t| t.rule_id).collect();
    assert_eq!(criticals, vec!["credit_spread_critical"]);

    let message = &notifier.messages()[0];
    assert!(message.contains("SPY entered the -20% zone from its peak"));
    assert!(message.contains("Snowstorm triggers"));
}

#[tokio::test]
async fn test_required_fetch_failure_sends_data_notice() {
    let notifier = Arc::new(RecordingNotifier::default());
    let outcome = reporter(
        macro_source().failing("UNRATE"),
        market_source(),
        notifier.clone(),
    )
    .run(today())
    .await;

    match outcome {
        RunOutcome::Failed {
            error: RunError::Fetch(err),
            notice_delivered,
        } => {
            assert_eq!(err.series(), "UNRATE");
            assert!(notice_delivered);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("Data collection failed"));
    assert!(messages[0].contains("HTTP 503"));
}

#[tokio::test]
async fn test_short_unemployment_history_sends_analysis_notice() {
    let macro_source = CannedSource::new("fred")
        .with_series("BAMLH0A0HYM2", &[3.1])
        .with_series("UNRATE", &[3.8, 3.9])
        .with_series("CP", &[2.9, 3.0, 3.1]);
    let notifier = Arc::new(RecordingNotifier::default());
    let outcome = reporter(macro_source, market_source(), notifier.clone())
        .run(today())
        .await;

    assert!(matches!(outcome, RunOutcome::Failed { .. }));
    assert!(notifier.messages()[0].starts_with("❌ *Analysis failed*"));
}

#[tokio::test]
async fn test_auxiliary_failures_skip_rules_but_report() {
    let macro_source = macro_source().failing("CP");
    let market_source = CannedSource::new("yahoo")
        .with_series("^VIX", &[13.5])
        .with_series("SPY", &[500.0])
        .with_series("VRT", &[100.0]);

    let notifier = Arc::new(RecordingNotifier::default());
    let outcome = reporter(macro_source, market_source, notifier.clone())
        .run(today())
        .await;

    let verdict = outcome.verdict().unwrap();
    assert_eq!(verdict.skipped, vec!["profits_falling", "valuation_inversion"]);
    assert!(notifier.messages()[0].contains("Skipped, data unavailable"));
}

#[tokio::test]
async fn test_delivery_failure_is_undelivered_not_failed() {
    let notifier = Arc::new(RecordingNotifier::failing(DeliveryError::NotConfigured));
    let outcome = reporter(macro_source(), market_source(), notifier.clone())
        .run(today())
        .await;

    assert!(matches!(outcome, RunOutcome::Undelivered(_)));
    assert_eq!(notifier.messages().len(), 1);
}

#[tokio::test]
async fn test_failure_notice_delivery_error_is_swallowed() {
    let notifier = Arc::new(RecordingNotifier::failing(DeliveryError::Transport(
        "connection reset".into(),
    )));
    let outcome = reporter(
        macro_source().failing("BAMLH0A0HYM2"),
        market_source(),
        notifier.clone(),
    )
    .run(today())
    .await;

    assert!(matches!(
        outcome,
        RunOutcome::Failed {
            notice_delivered: false,
            ..
        }
    ));
}

#[tokio::test]
async fn test_config_failure_notice_reaches_chat() {
    let notifier = RecordingNotifier::default();
    let error = season_common::Error::Config("Failed to parse config from config.json".into());

    assert!(notify_config_failure(&notifier, &error, today()).await);

    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("⚠️ *Configuration error* (2024-08-05)"));
    assert!(messages[0].contains("Failed to parse config"));

    let unreachable = RecordingNotifier::failing(DeliveryError::NotConfigured);
    assert!(!notify_config_failure(&unreachable, &error, today()).await);
}

#[tokio::test]
async fn test_collector_without_valuation_symbol() {
    let plan = IndicatorPlan {
        valuation_symbol: None,
        ..IndicatorPlan::default()
    };
    let market = Arc::new(market_source());
    let collector = SnapshotCollector::new(Arc::new(macro_source()), market.clone(), plan);

    let snapshot = collector.collect().await.unwrap();

    assert!(matches!(snapshot.valuation, Auxiliary::Unavailable(_)));
    assert_eq!(snapshot.credit_spread, Some(3.1));
    assert_eq!(snapshot.unemployment, vec![3.8, 3.8, 3.7]);
    assert_eq!(snapshot.unemployment.len(), TREND_READINGS);
    assert_eq!(
        snapshot.corporate_profits.as_available().map(Vec::len),
        Some(TREND_READINGS)
    );
    assert_eq!(snapshot.market_index.as_ref().unwrap().peak, 520.0);
    // VIX, SPY, VRT and no quote lookups.
    assert_eq!(market.calls.load(Ordering::Relaxed), 3);
}
