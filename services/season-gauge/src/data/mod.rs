//! Indicator data: series types, the evaluation snapshot, and the sources
//! that fill them.

pub mod collector;
pub mod fred;
pub mod provider;
pub mod yahoo;

pub use collector::{IndicatorPlan, SnapshotCollector};
pub use fred::FredSource;
pub use provider::DataSource;
pub use yahoo::YahooSource;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Series
// ============================================================================

/// One timestamped reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Ordered readings for one metric, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSeries {
    pub id: String,
    pub observations: Vec<Observation>,
}

impl IndicatorSeries {
    /// Build a series, sorting by timestamp and dropping non-finite values.
    pub fn new(id: impl Into<String>, mut observations: Vec<Observation>) -> Self {
        observations.retain(|o| o.value.is_finite());
        observations.sort_by_key(|o| o.timestamp);
        Self {
            id: id.into(),
            observations,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Most recent value.
    pub fn latest(&self) -> Option<f64> {
        self.observations.last().map(|o| o.value)
    }

    /// Highest value in the window.
    pub fn max(&self) -> Option<f64> {
        self.observations
            .iter()
            .map(|o| o.value)
            .fold(None, |acc, v| Some(acc.map_or(v, |m: f64| m.max(v))))
    }

    /// The last `n` values, oldest first. Shorter if the series is shorter.
    pub fn last_n(&self, n: usize) -> Vec<f64> {
        let start = self.observations.len().saturating_sub(n);
        self.observations[start..].iter().map(|o| o.value).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.value).collect()
    }
}

// ============================================================================
// Snapshot inputs
// ============================================================================

/// Current price against its rolling maximum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceWindow {
    pub symbol: String,
    pub current: f64,
    pub peak: f64,
}

impl PriceWindow {
    pub fn new(symbol: impl Into<String>, current: f64, peak: f64) -> Self {
        Self {
            symbol: symbol.into(),
            current,
            peak,
        }
    }

    /// Window from a price series. `None` when the series is empty.
    pub fn from_series(series: &IndicatorSeries) -> Option<Self> {
        Some(Self::new(series.id.clone(), series.latest()?, series.max()?))
    }
}

/// Trailing and forward earnings estimates for one company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    pub symbol: String,
    pub trailing_eps: f64,
    pub forward_eps: f64,
}

/// An optional metric that may legitimately fail to load.
///
/// Rules depending on an `Unavailable` metric are skipped instead of reading
/// a placeholder value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Auxiliary<T> {
    Available(T),
    Unavailable(String),
}

impl<T> Auxiliary<T> {
    pub fn as_available(&self) -> Option<&T> {
        match self {
            Self::Available(v) => Some(v),
            Self::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

impl<T> Default for Auxiliary<T> {
    fn default() -> Self {
        Self::Unavailable("not requested".to_string())
    }
}

/// Everything one evaluation pass needs.
///
/// Required inputs are `Option`/`Vec` so an incomplete snapshot can be
/// represented and rejected by the evaluator rather than defaulted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// High-yield option-adjusted spread, percent
    pub credit_spread: Option<f64>,
    /// CBOE volatility index
    pub vix: Option<f64>,
    /// Recent unemployment readings, oldest first
    pub unemployment: Vec<f64>,
    /// Broad market index price window
    pub market_index: Option<PriceWindow>,
    /// AI periphery stock price window
    pub ai_periphery: Option<PriceWindow>,
    /// Recent corporate profit readings, oldest first
    pub corporate_profits: Auxiliary<Vec<f64>>,
    pub valuation: Auxiliary<Valuation>,
}

impl Snapshot {
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }
}

/// Fluent construction for snapshots.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    inner: Snapshot,
}

impl SnapshotBuilder {
    pub fn credit_spread(mut self, value: f64) -> Self {
        self.inner.credit_spread = Some(value);
        self
    }

    pub fn vix(mut self, value: f64) -> Self {
        self.inner.vix = Some(value);
        self
    }

    pub fn unemployment(mut self, readings: impl Into<Vec<f64>>) -> Self {
        self.inner.unemployment = readings.into();
        self
    }

    pub fn market_index(mut self, symbol: &str, current: f64, peak: f64) -> Self {
        self.inner.market_index = Some(PriceWindow::new(symbol, current, peak));
        self
    }

    pub fn ai_periphery(mut self, symbol: &str, current: f64, peak: f64) -> Self {
        self.inner.ai_periphery = Some(PriceWindow::new(symbol, current, peak));
        self
    }

    pub fn corporate_profits(mut self, readings: impl Into<Vec<f64>>) -> Self {
        self.inner.corporate_profits = Auxiliary::Available(readings.into());
        self
    }

    pub fn valuation(mut self, symbol: &str, trailing_eps: f64, forward_eps: f64) -> Self {
        self.inner.valuation = Auxiliary::Available(Valuation {
            symbol: symbol.to_string(),
            trailing_eps,
            forward_eps,
        });
        self
    }

    pub fn build(self) -> Snapshot {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn obs(day: u32, value: f64) -> Observation {
        Observation {
            timestamp: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            value,
        }
    }

    #[test]
    fn test_series_sorts_and_drops_non_finite() {
        let series = IndicatorSeries::new(
            "UNRATE",
            vec![obs(3, 3.9), obs(1, 3.7), obs(2, f64::NAN), obs(4, 4.0)],
        );
        assert_eq!(series.values(), vec![3.7, 3.9, 4.0]);
        assert_eq!(series.latest(), Some(4.0));
    }

    #[test]
    fn test_series_max_and_last_n() {
        let series = IndicatorSeries::new("SPY", vec![obs(1, 90.0), obs(2, 100.0), obs(3, 95.0)]);
        assert_eq!(series.max(), Some(100.0));
        assert_eq!(series.last_n(2), vec![100.0, 95.0]);
        assert_eq!(series.last_n(10).len(), 3);
    }

    #[test]
    fn test_empty_series() {
        let series = IndicatorSeries::new("VIX", vec![]);
        assert!(series.is_empty());
        assert_eq!(series.latest(), None);
        assert_eq!(series.max(), None);
        assert!(PriceWindow::from_series(&series).is_none());
    }

    #[test]
    fn test_price_window_from_series() {
        let series = IndicatorSeries::new("VRT", vec![obs(1, 120.0), obs(2, 100.0)]);
        let window = PriceWindow::from_series(&series).unwrap();
        assert_eq!(window.symbol, "VRT");
        assert_eq!(window.current, 100.0);
        assert_eq!(window.peak, 120.0);
    }

    #[test]
    fn test_builder_defaults_auxiliaries_to_unavailable() {
        let snapshot = Snapshot::builder().credit_spread(3.2).build();
        assert_eq!(snapshot.credit_spread, Some(3.2));
        assert!(!snapshot.valuation.is_available());
        assert!(snapshot.corporate_profits.as_available().is_none());
    }
}
