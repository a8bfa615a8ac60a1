//! Season Gauge - scheduled market-season report.
//!
//! Run once per schedule tick (cron, CI). Takes no arguments; everything comes
//! from the config file and environment.

use anyhow::Result;
use chrono::Local;
use season_common::prelude::*;
use season_gauge::notification::TelegramNotifier;
use season_gauge::{notify_config_failure, RunOutcome, SeasonReporter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let started = std::time::Instant::now();
    let today = Local::now().date_naive();

    // Only an unreadable or malformed file is fatal; bad values fall back
    let (config, adjustments) = match Config::load_with_env() {
        Ok(loaded) => loaded,
        Err(error) => {
            let fallback = Config::from_env();
            init_logging(
                &fallback.observability.log_level,
                &fallback.observability.log_format,
            );
            tracing::error!(%error, "Config could not be loaded");
            let notifier = TelegramNotifier::new(&fallback.notification);
            notify_config_failure(&notifier, &error, today).await;
            return Err(error.into());
        }
    };

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("Season Gauge v{}", env!("CARGO_PKG_VERSION"));
    for adjustment in &adjustments {
        tracing::warn!(
            field = adjustment.field,
            rejected = %adjustment.rejected,
            fallback = %adjustment.fallback,
            "Invalid config value replaced with default"
        );
    }
    if !config.notification.is_configured() {
        tracing::warn!("Telegram credentials missing, the report will only be logged");
    }

    let reporter = SeasonReporter::from_config(&config);
    let outcome = reporter.run(today).await;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &outcome {
        RunOutcome::Reported(verdict) => {
            tracing::info!(season = %verdict.season, elapsed_ms, "Run complete");
        }
        RunOutcome::Undelivered(verdict) => {
            tracing::warn!(season = %verdict.season, elapsed_ms, "Run complete, report undelivered");
        }
        RunOutcome::Failed {
            error,
            notice_delivered,
        } => {
            tracing::error!(%error, notice_delivered, elapsed_ms, "Run aborted");
        }
    }

    Ok(())
}
