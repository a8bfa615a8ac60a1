//! Report formatting.
//!
//! Turns a [`Verdict`] (or a run failure) into Telegram Markdown text. Pure
//! functions; the verdict is rendered as is, never re-derived.

use std::fmt::Write as _;

use chrono::NaiveDate;

use crate::error::RunError;
use crate::rules::{GaugeLevel, Season, Trigger, Verdict};

const DIVIDER: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Escape characters legacy Telegram Markdown treats as entity markers.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn credit_label(level: GaugeLevel) -> &'static str {
    match level {
        GaugeLevel::Summer => "Summer",
        GaugeLevel::Autumn => "Autumn",
        GaugeLevel::Winter | GaugeLevel::DeepWinter => "Winter (crash)",
    }
}

fn fear_label(level: GaugeLevel) -> &'static str {
    match level {
        GaugeLevel::Summer => "Summer",
        GaugeLevel::Autumn => "Autumn",
        GaugeLevel::Winter => "Winter (threshold)",
        GaugeLevel::DeepWinter => "Deep winter (panic)",
    }
}

/// Closing line for a season.
pub fn verdict_line(season: Season) -> &'static str {
    match season {
        Season::Systemic => "🚨 *Verdict: snowstorm has begun. Systemic risk is materialising*",
        Season::Critical => {
            "🚨 *Verdict: snowstorm signs detected. Ready the reserves and go defensive*"
        }
        Season::Caution => "🍂 *Verdict: late autumn to early winter. Raise the cash allocation*",
        Season::Benign => "☀️ *Verdict: autumn phase. The party goes on, plan the exit*",
    }
}

fn push_triggers(out: &mut String, heading: &str, triggers: &[Trigger]) {
    if triggers.is_empty() {
        return;
    }
    let _ = writeln!(out, "{heading}");
    for trigger in triggers {
        let _ = writeln!(out, "- {}", escape_markdown(&trigger.message));
    }
    out.push('\n');
}

/// Render the daily report.
pub fn render(verdict: &Verdict, date: NaiveDate) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "👑 *Season Gauge Report* ({})\n", date.format("%Y-%m-%d"));

    let credit = verdict.gauges.credit;
    let fear = verdict.gauges.fear;
    let _ = writeln!(
        out,
        "1. 🟥 *Credit pressure*: {:.2}% ({})",
        credit.value,
        credit_label(credit.level)
    );
    let _ = writeln!(
        out,
        "2. 🟥 *Fear pressure*: {:.2} ({})\n",
        fear.value,
        fear_label(fear.level)
    );

    push_triggers(&mut out, "❄️ *First snow observed*", &verdict.warnings);
    push_triggers(&mut out, "🌨️ *Snowstorm triggers*", &verdict.criticals);

    if !verdict.skipped.is_empty() {
        let ids: Vec<String> = verdict.skipped.iter().map(|id| format!("`{id}`")).collect();
        let _ = writeln!(out, "ℹ️ Skipped, data unavailable: {}\n", ids.join(", "));
    }

    let _ = writeln!(out, "{DIVIDER}");
    out.push_str(verdict_line(verdict.season));
    out
}

/// Render the notice sent when a run aborts.
pub fn render_failure(error: &RunError, date: NaiveDate) -> String {
    let date = date.format("%Y-%m-%d");
    let detail = escape_markdown(&error.to_string());
    match error {
        RunError::Fetch(_) => format!(
            "⚠️ *Data collection failed* ({date})\n\
            Please check the system.\n\
            Error: {detail}"
        ),
        RunError::Evaluation(_) => format!("❌ *Analysis failed* ({date}): {detail}"),
    }
}

/// Render the notice sent when the config file cannot be used at all.
pub fn render_config_failure(detail: &str, date: NaiveDate) -> String {
    format!(
        "⚠️ *Configuration error* ({})\n\
        No report was produced.\n\
        Error: {}",
        date.format("%Y-%m-%d"),
        escape_markdown(detail)
    )
}
