//! Snapshot assembly.
//!
//! Fetches every indicator the rule table needs, in a fixed order. A failure
//! on a required series aborts the run; a failure on an auxiliary metric is
//! recorded as [`Auxiliary::Unavailable`].

use std::sync::Arc;

use chrono::Duration;

use super::provider::DataSource;
use super::{Auxiliary, IndicatorSeries, PriceWindow, Snapshot, Valuation};
use crate::error::FetchError;
use crate::rules::TREND_READINGS;
use season_common::config::WatchlistConfig;

/// FRED id for the ICE BofA US High Yield option-adjusted spread.
pub const CREDIT_SPREAD_SERIES: &str = "BAMLH0A0HYM2";
/// FRED id for the civilian unemployment rate.
pub const UNEMPLOYMENT_SERIES: &str = "UNRATE";
/// FRED id for corporate profits after tax.
pub const CORPORATE_PROFITS_SERIES: &str = "CP";
/// Yahoo id for the CBOE volatility index.
pub const VIX_SERIES: &str = "^VIX";

/// Which ids to fetch and how far back.
#[derive(Debug, Clone)]
pub struct IndicatorPlan {
    pub credit_spread: String,
    pub credit_spread_lookback: Duration,
    pub vix: String,
    pub vix_lookback: Duration,
    pub unemployment: String,
    pub unemployment_lookback: Duration,
    pub corporate_profits: String,
    pub corporate_profits_lookback: Duration,
    pub market_index: String,
    pub ai_periphery: String,
    pub price_lookback: Duration,
    pub valuation_symbol: Option<String>,
}

impl IndicatorPlan {
    pub fn from_watchlist(watchlist: &WatchlistConfig) -> Self {
        Self {
            market_index: watchlist.market_index.clone(),
            ai_periphery: watchlist.ai_periphery.clone(),
            valuation_symbol: watchlist.valuation_symbol.clone(),
            ..Self::default()
        }
    }
}

impl Default for IndicatorPlan {
    fn default() -> Self {
        Self {
            credit_spread: CREDIT_SPREAD_SERIES.to_string(),
            // FRED publishes the spread with a lag; 20 days leaves room.
            credit_spread_lookback: Duration::days(20),
            vix: VIX_SERIES.to_string(),
            vix_lookback: Duration::days(5),
            unemployment: UNEMPLOYMENT_SERIES.to_string(),
            unemployment_lookback: Duration::days(365),
            corporate_profits: CORPORATE_PROFITS_SERIES.to_string(),
            // Quarterly series: three readings need at least nine months.
            corporate_profits_lookback: Duration::days(3 * 365),
            market_index: "SPY".to_string(),
            ai_periphery: "VRT".to_string(),
            price_lookback: Duration::days(90),
            valuation_symbol: Some("NVDA".to_string()),
        }
    }
}

/// Builds a [`Snapshot`] from the macro and market sources.
pub struct SnapshotCollector {
    /// Macro series (spread, unemployment, profits)
    macro_source: Arc<dyn DataSource>,
    /// Market series (VIX, prices, valuation)
    market_source: Arc<dyn DataSource>,
    plan: IndicatorPlan,
}

impl SnapshotCollector {
    pub fn new(
        macro_source: Arc<dyn DataSource>,
        market_source: Arc<dyn DataSource>,
        plan: IndicatorPlan,
    ) -> Self {
        Self {
            macro_source,
            market_source,
            plan,
        }
    }

    /// Fetch everything and assemble the snapshot.
    pub async fn collect(&self) -> Result<Snapshot, FetchError> {
        let plan = &self.plan;

        let vix = self
            .market_source
            .fetch(&plan.vix, plan.vix_lookback)
            .await?;
        let spread = self
            .macro_source
            .fetch(&plan.credit_spread, plan.credit_spread_lookback)
            .await?;
        let unemployment = self
            .macro_source
            .fetch(&plan.unemployment, plan.unemployment_lookback)
            .await?;
        let market_index = self.price_window(&plan.market_index).await?;
        let ai_periphery = self.price_window(&plan.ai_periphery).await?;

        let corporate_profits = self.corporate_profits().await;
        let valuation = self.valuation().await;

        let snapshot = Snapshot {
            credit_spread: spread.latest(),
            vix: vix.latest(),
            unemployment: unemployment.last_n(TREND_READINGS),
            market_index: Some(market_index),
            ai_periphery: Some(ai_periphery),
            corporate_profits,
            valuation,
        };

        tracing::info!(
            credit_spread = ?snapshot.credit_spread,
            vix = ?snapshot.vix,
            unemployment = ?snapshot.unemployment,
            profits_available = snapshot.corporate_profits.is_available(),
            valuation_available = snapshot.valuation.is_available(),
            "Snapshot collected"
        );
        Ok(snapshot)
    }

    async fn price_window(&self, symbol: &str) -> Result<PriceWindow, FetchError> {
        let series: IndicatorSeries = self
            .market_source
            .fetch(symbol, self.plan.price_lookback)
            .await?;
        PriceWindow::from_series(&series).ok_or_else(|| FetchError::MissingData {
            source_name: self.market_source.name(),
            series: symbol.to_string(),
        })
    }

    async fn corporate_profits(&self) -> Auxiliary<Vec<f64>> {
        match self
            .macro_source
            .fetch(
                &self.plan.corporate_profits,
                self.plan.corporate_profits_lookback,
            )
            .await
        {
            Ok(series) => Auxiliary::Available(series.last_n(TREND_READINGS)),
            Err(e) => {
                tracing::warn!(error = %e, "Corporate profits unavailable, skipping dependent rules");
                Auxiliary::Unavailable(e.to_string())
            }
        }
    }

    async fn valuation(&self) -> Auxiliary<Valuation> {
        let Some(symbol) = self.plan.valuation_symbol.as_deref() else {
            return Auxiliary::Unavailable("no valuation symbol configured".to_string());
        };

        let trailing = self
            .market_source
            .fetch_latest_scalar(&format!("{symbol}:epsTrailingTwelveMonths"))
            .await;
        let forward = self
            .market_source
            .fetch_latest_scalar(&format!("{symbol}:epsForward"))
            .await;

        match (trailing, forward) {
            (Ok(trailing_eps), Ok(forward_eps)) => Auxiliary::Available(Valuation {
                symbol: symbol.to_string(),
                trailing_eps,
                forward_eps,
            }),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(symbol, error = %e, "Valuation unavailable, skipping dependent rules");
                Auxiliary::Unavailable(e.to_string())
            }
        }
    }
}
