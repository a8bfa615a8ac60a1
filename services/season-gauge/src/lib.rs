//! Season Gauge Library
//!
//! Reads a handful of public market indicators, runs them through an ordered
//! threshold rule table and pushes a one-page "season" report to Telegram.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌────────────┐   ┌────────────┐
//! │  Snapshot  │──▶│   Rule     │──▶│   Report   │──▶│  Notifier  │
//! │  Collector │   │  Evaluator │   │  Formatter │   │ (Telegram) │
//! └────────────┘   └────────────┘   └────────────┘   └────────────┘
//!   FRED, Yahoo       pure            pure             Bot API
//! ```
//!
//! # Key Concepts
//!
//! ## Gauges
//! - **Credit pressure**: high-yield option-adjusted spread
//! - **Fear pressure**: VIX
//!
//! ## Triggers
//! - **First snow** (warning): drawdowns, elevated spread, panic VIX, falling
//!   profits, valuation inversion
//! - **Snowstorm** (critical): rising unemployment, spread above 5.5%
//!
//! ## Seasons
//! Benign → Caution → Critical → Systemic, decided by trigger counts.
//!
//! One invocation is one run. Nothing persists between runs.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod data;
pub mod error;
pub mod notification;
pub mod report;
pub mod rules;

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::Instrument;

use season_common::config::Config;
use season_common::logging::generate_run_id;

use crate::data::{FredSource, IndicatorPlan, SnapshotCollector, YahooSource};
use crate::error::RunError;
use crate::notification::{Notifier, TelegramNotifier};
use crate::rules::Verdict;

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Report rendered and delivered
    Reported(Verdict),
    /// Report rendered but delivery failed
    Undelivered(Verdict),
    /// Fetch or evaluation failed; a failure notice was attempted
    Failed {
        error: RunError,
        notice_delivered: bool,
    },
}

impl RunOutcome {
    pub fn verdict(&self) -> Option<&Verdict> {
        match self {
            Self::Reported(v) | Self::Undelivered(v) => Some(v),
            Self::Failed { .. } => None,
        }
    }
}

/// Collect → evaluate → render → send.
pub struct SeasonReporter {
    collector: SnapshotCollector,
    notifier: Arc<dyn Notifier>,
}

impl SeasonReporter {
    pub fn new(collector: SnapshotCollector, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            collector,
            notifier,
        }
    }

    /// Wire the production sources and Telegram sink from configuration.
    pub fn from_config(config: &Config) -> Self {
        let collector = SnapshotCollector::new(
            Arc::new(FredSource::new(&config.sources)),
            Arc::new(YahooSource::new(&config.sources)),
            IndicatorPlan::from_watchlist(&config.watchlist),
        );
        let notifier = Arc::new(TelegramNotifier::new(&config.notification));
        Self::new(collector, notifier)
    }

    /// Execute one run for `today`.
    ///
    /// Never returns an error: every failure is folded into the outcome and
    /// logged. A delivery error while sending the failure notice is swallowed.
    pub async fn run(&self, today: NaiveDate) -> RunOutcome {
        let run_id = generate_run_id();
        let span = tracing::info_span!("season_run", %run_id, date = %today);
        self.run_inner(today).instrument(span).await
    }

    async fn run_inner(&self, today: NaiveDate) -> RunOutcome {
        tracing::info!("Season run started");

        let verdict = match self.analyze().await {
            Ok(verdict) => verdict,
            Err(error) => {
                tracing::error!(error = %error, "Season run failed");
                let notice = report::render_failure(&error, today);
                let notice_delivered = match self.notifier.send(&notice).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failure notice not delivered");
                        false
                    }
                };
                return RunOutcome::Failed {
                    error,
                    notice_delivered,
                };
            }
        };

        tracing::info!(
            season = %verdict.season,
            warnings = verdict.warnings.len(),
            criticals = verdict.criticals.len(),
            skipped = verdict.skipped.len(),
            "Season evaluated"
        );

        let text = report::render(&verdict, today);
        match self.notifier.send(&text).await {
            Ok(()) => {
                tracing::info!("Report sent");
                RunOutcome::Reported(verdict)
            }
            Err(e) => {
                tracing::warn!(error = %e, report = %text, "Report not delivered");
                RunOutcome::Undelivered(verdict)
            }
        }
    }

    async fn analyze(&self) -> Result<Verdict, RunError> {
        let snapshot = self.collector.collect().await?;
        Ok(rules::evaluate(&snapshot)?)
    }
}

/// Tell the chat that no run happened because the config file is unusable.
///
/// Returns whether the notice was delivered.
pub async fn notify_config_failure(
    notifier: &dyn Notifier,
    error: &season_common::Error,
    today: NaiveDate,
) -> bool {
    let notice = report::render_config_failure(&error.to_string(), today);
    match notifier.send(&notice).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Config failure notice not delivered");
            false
        }
    }
}

pub use data::Snapshot;
pub use rules::{evaluate, Season};
