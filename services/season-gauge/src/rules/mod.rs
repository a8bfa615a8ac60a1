//! Rule evaluation.
//!
//! `evaluate` turns a [`Snapshot`] into a [`Verdict`]:
//!
//! 1. Validate required inputs. Any gap aborts with [`EvaluationError`].
//! 2. Read both gauges.
//! 3. Walk [`table::RULES`] in order. Rules whose auxiliary input is
//!    unavailable are recorded as skipped.
//! 4. Aggregate trigger counts into a [`Season`].
//!
//! No I/O and no clock. The same snapshot always yields the same verdict.

pub mod table;

use std::fmt;

use serde::Serialize;

use crate::data::{PriceWindow, Snapshot, Valuation};
use crate::error::EvaluationError;
use table::{Condition, Direction, Metric, Rule, TrackedPrice, TrendSeries};

/// Readings a trend rule compares.
pub const TREND_READINGS: usize = 3;

// ============================================================================
// Verdict types
// ============================================================================

/// Severity of a single trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// First-snow signal
    Warning,
    /// Snowstorm signal
    Critical,
}

/// A rule that fired.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trigger {
    pub rule_id: &'static str,
    pub tier: Tier,
    pub message: String,
}

/// Qualitative market regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    /// Nothing fired
    Benign,
    /// Warnings only
    Caution,
    /// One critical trigger
    Critical,
    /// Two or more critical triggers
    Systemic,
}

impl Season {
    /// Aggregate trigger counts into a season.
    pub fn from_counts(warnings: usize, criticals: usize) -> Self {
        if criticals >= table::SYSTEMIC_MIN_CRITICALS {
            Self::Systemic
        } else if criticals >= table::CRITICAL_MIN_CRITICALS {
            Self::Critical
        } else if warnings >= table::CAUTION_MIN_WARNINGS {
            Self::Caution
        } else {
            Self::Benign
        }
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Critical | Self::Systemic)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Benign => "benign",
            Self::Caution => "caution",
            Self::Critical => "critical",
            Self::Systemic => "systemic",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Band a gauge reading falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GaugeLevel {
    Summer,
    Autumn,
    Winter,
    DeepWinter,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GaugeReading {
    pub value: f64,
    pub level: GaugeLevel,
}

/// Headline pressure meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Gauges {
    /// High-yield spread
    pub credit: GaugeReading,
    /// VIX
    pub fear: GaugeReading,
}

/// Outcome of one evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub season: Season,
    pub gauges: Gauges,
    /// Warning triggers in rule-table order
    pub warnings: Vec<Trigger>,
    /// Critical triggers in rule-table order
    pub criticals: Vec<Trigger>,
    /// Rules not evaluated because an auxiliary input was unavailable
    pub skipped: Vec<&'static str>,
}

// ============================================================================
// Evaluation
// ============================================================================

/// Validated view of a snapshot. Every required input is present and finite.
struct Inputs<'a> {
    credit_spread: f64,
    vix: f64,
    unemployment: &'a [f64],
    market_index: &'a PriceWindow,
    ai_periphery: &'a PriceWindow,
    corporate_profits: Option<&'a [f64]>,
    valuation: Option<&'a Valuation>,
}

fn required_scalar(value: Option<f64>, field: &'static str) -> Result<f64, EvaluationError> {
    let value = value.ok_or(EvaluationError::MissingField(field))?;
    if !value.is_finite() {
        return Err(EvaluationError::NonFinite(field));
    }
    Ok(value)
}

fn required_window<'a>(
    window: Option<&'a PriceWindow>,
    field: &'static str,
) -> Result<&'a PriceWindow, EvaluationError> {
    let window = window.ok_or(EvaluationError::MissingField(field))?;
    if !window.current.is_finite() || !window.peak.is_finite() {
        return Err(EvaluationError::NonFinite(field));
    }
    Ok(window)
}

/// Last `TREND_READINGS` values, or `None` if there are too few or any is non-finite.
fn trend_window(readings: &[f64]) -> Option<&[f64]> {
    let start = readings.len().checked_sub(TREND_READINGS)?;
    let window = &readings[start..];
    window.iter().all(|v| v.is_finite()).then_some(window)
}

impl<'a> Inputs<'a> {
    fn validate(snapshot: &'a Snapshot) -> Result<Self, EvaluationError> {
        let credit_spread = required_scalar(snapshot.credit_spread, "credit_spread")?;
        let vix = required_scalar(snapshot.vix, "vix")?;

        let unemployment = match snapshot.unemployment.len() {
            0 => return Err(EvaluationError::MissingField("unemployment")),
            n if n < TREND_READINGS => {
                return Err(EvaluationError::InsufficientHistory {
                    field: "unemployment",
                    required: TREND_READINGS,
                    found: n,
                })
            }
            _ => trend_window(&snapshot.unemployment)
                .ok_or(EvaluationError::NonFinite("unemployment"))?,
        };

        let market_index = required_window(snapshot.market_index.as_ref(), "market_index")?;
        let ai_periphery = required_window(snapshot.ai_periphery.as_ref(), "ai_periphery")?;

        // Auxiliary inputs never fail the evaluation. An unusable value is
        // treated the same as an unavailable one.
        let corporate_profits = snapshot
            .corporate_profits
            .as_available()
            .and_then(|readings| trend_window(readings));
        let valuation = snapshot
            .valuation
            .as_available()
            .filter(|v| v.trailing_eps.is_finite() && v.forward_eps.is_finite());

        Ok(Self {
            credit_spread,
            vix,
            unemployment,
            market_index,
            ai_periphery,
            corporate_profits,
            valuation,
        })
    }

    fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::CreditSpread => self.credit_spread,
            Metric::Vix => self.vix,
        }
    }

    fn price(&self, price: TrackedPrice) -> &'a PriceWindow {
        match price {
            TrackedPrice::MarketIndex => self.market_index,
            TrackedPrice::AiPeriphery => self.ai_periphery,
        }
    }

    fn trend(&self, series: TrendSeries) -> Option<&'a [f64]> {
        match series {
            TrendSeries::Unemployment => Some(self.unemployment),
            TrendSeries::CorporateProfits => self.corporate_profits,
        }
    }
}

/// Result of checking one rule.
enum Check {
    Fired { symbol: Option<String> },
    Quiet,
    Skipped,
}

fn is_strict(window: &[f64], direction: Direction) -> bool {
    window.windows(2).all(|pair| match direction {
        Direction::Rising => pair[0] < pair[1],
        Direction::Falling => pair[0] > pair[1],
    })
}

fn outcome(hit: bool, symbol: Option<&str>) -> Check {
    if hit {
        Check::Fired {
            symbol: symbol.map(str::to_string),
        }
    } else {
        Check::Quiet
    }
}

fn check(rule: &Rule, inputs: &Inputs<'_>) -> Check {
    match rule.condition {
        Condition::AtLeast { metric, threshold } => {
            outcome(inputs.metric(metric) >= threshold, None)
        }
        Condition::BelowPeak { price, ratio } => {
            let window = inputs.price(price);
            outcome(
                window.current < window.peak * ratio,
                Some(window.symbol.as_str()),
            )
        }
        Condition::Trend { series, direction } => match inputs.trend(series) {
            Some(window) => outcome(is_strict(window, direction), None),
            None => Check::Skipped,
        },
        Condition::ForwardBelowTrailing => match inputs.valuation {
            Some(v) => outcome(v.forward_eps < v.trailing_eps, Some(v.symbol.as_str())),
            None => Check::Skipped,
        },
    }
}

fn render_message(template: &str, symbol: Option<&str>) -> String {
    match symbol {
        Some(symbol) => template.replace("{symbol}", symbol),
        None => template.to_string(),
    }
}

/// Evaluate the rule table against a snapshot.
pub fn evaluate(snapshot: &Snapshot) -> Result<Verdict, EvaluationError> {
    evaluate_with(table::RULES, snapshot)
}

/// Evaluate an arbitrary rule table. Exposed for table-level tests.
pub fn evaluate_with(rules: &[Rule], snapshot: &Snapshot) -> Result<Verdict, EvaluationError> {
    let inputs = Inputs::validate(snapshot)?;

    let gauges = Gauges {
        credit: GaugeReading {
            value: inputs.credit_spread,
            level: table::CREDIT_GAUGE.level(inputs.credit_spread),
        },
        fear: GaugeReading {
            value: inputs.vix,
            level: table::FEAR_GAUGE.level(inputs.vix),
        },
    };

    let mut warnings = Vec::new();
    let mut criticals = Vec::new();
    let mut skipped = Vec::new();

    for rule in rules {
        match check(rule, &inputs) {
            Check::Fired { symbol } => {
                let trigger = Trigger {
                    rule_id: rule.id,
                    tier: rule.tier,
                    message: render_message(rule.message, symbol.as_deref()),
                };
                match rule.tier {
                    Tier::Warning => warnings.push(trigger),
                    Tier::Critical => criticals.push(trigger),
                }
            }
            Check::Quiet => {}
            Check::Skipped => skipped.push(rule.id),
        }
    }

    let season = Season::from_counts(warnings.len(), criticals.len());

    tracing::debug!(
        season = %season,
        warnings = warnings.len(),
        criticals = criticals.len(),
        skipped = ?skipped,
        "Rules evaluated"
    );

    Ok(Verdict {
        season,
        gauges,
        warnings,
        criticals,
        skipped,
    })
}
