//! The rule table and gauge bands.
//!
//! Rows are evaluated top to bottom and triggered messages keep this order.
//! A new indicator is a new row plus, if needed, a new [`Condition`] variant.

use serde::Serialize;

use super::{GaugeLevel, Tier};

/// Scalar inputs a threshold rule can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Metric {
    CreditSpread,
    Vix,
}

/// Price windows a drawdown rule can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackedPrice {
    MarketIndex,
    AiPeriphery,
}

/// Slow-moving series a trend rule can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendSeries {
    Unemployment,
    CorporateProfits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    /// a < b < c
    Rising,
    /// a > b > c
    Falling,
}

/// What a rule checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Condition {
    /// `value >= threshold`
    AtLeast { metric: Metric, threshold: f64 },
    /// `current < peak * ratio`
    BelowPeak { price: TrackedPrice, ratio: f64 },
    /// Strict monotonic move over the last three readings
    Trend {
        series: TrendSeries,
        direction: Direction,
    },
    /// Forward EPS strictly below trailing EPS
    ForwardBelowTrailing,
}

/// One row: condition → tier → message.
///
/// `{symbol}` in the message is replaced with the tracked symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rule {
    pub id: &'static str,
    pub tier: Tier,
    pub condition: Condition,
    pub message: &'static str,
}

/// Spread level at which the late-autumn warning fires.
pub const SPREAD_ELEVATED: f64 = 4.5;
/// Spread level at which the snowstorm trigger fires.
pub const SPREAD_CRITICAL: f64 = 5.5;
/// VIX level treated as panic.
pub const VIX_PANIC: f64 = 30.0;
/// Market index must stay at or above this fraction of its peak.
pub const MARKET_DRAWDOWN_RATIO: f64 = 0.8;
/// AI periphery must stay at or above this fraction of its peak.
pub const AI_PERIPHERY_DRAWDOWN_RATIO: f64 = 0.9;

pub const RULES: &[Rule] = &[
    Rule {
        id: "market_drawdown",
        tier: Tier::Warning,
        condition: Condition::BelowPeak {
            price: TrackedPrice::MarketIndex,
            ratio: MARKET_DRAWDOWN_RATIO,
        },
        message: "{symbol} entered the -20% zone from its peak",
    },
    Rule {
        id: "ai_periphery_drawdown",
        tier: Tier::Warning,
        condition: Condition::BelowPeak {
            price: TrackedPrice::AiPeriphery,
            ratio: AI_PERIPHERY_DRAWDOWN_RATIO,
        },
        message: "AI periphery ({symbol}) is down more than 10% from its peak",
    },
    Rule {
        id: "credit_spread_elevated",
        tier: Tier::Warning,
        condition: Condition::AtLeast {
            metric: Metric::CreditSpread,
            threshold: SPREAD_ELEVATED,
        },
        message: "Credit spread above 4.5% (late-autumn pressure)",
    },
    Rule {
        id: "volatility_panic",
        tier: Tier::Warning,
        condition: Condition::AtLeast {
            metric: Metric::Vix,
            threshold: VIX_PANIC,
        },
        message: "VIX in panic territory (30+)",
    },
    Rule {
        id: "profits_falling",
        tier: Tier::Warning,
        condition: Condition::Trend {
            series: TrendSeries::CorporateProfits,
            direction: Direction::Falling,
        },
        message: "Corporate profits fell two readings in a row",
    },
    Rule {
        id: "valuation_inversion",
        tier: Tier::Warning,
        condition: Condition::ForwardBelowTrailing,
        message: "{symbol} forward EPS below trailing EPS (earnings expected to shrink)",
    },
    Rule {
        id: "unemployment_rising",
        tier: Tier::Critical,
        condition: Condition::Trend {
            series: TrendSeries::Unemployment,
            direction: Direction::Rising,
        },
        message: "Unemployment rose two readings in a row",
    },
    Rule {
        id: "credit_spread_critical",
        tier: Tier::Critical,
        condition: Condition::AtLeast {
            metric: Metric::CreditSpread,
            threshold: SPREAD_CRITICAL,
        },
        message: "Credit spread broke 5.5% (survival mode)",
    },
];

// ============================================================================
// Gauges
// ============================================================================

/// Ordered bands: a value below `bands[i].0` gets `bands[i].1`; anything at
/// or above the last bound gets `ceiling`.
#[derive(Debug, Clone, Copy)]
pub struct GaugeScale {
    pub bands: &'static [(f64, GaugeLevel)],
    pub ceiling: GaugeLevel,
}

impl GaugeScale {
    pub fn level(&self, value: f64) -> GaugeLevel {
        self.bands
            .iter()
            .find(|(bound, _)| value < *bound)
            .map(|(_, level)| *level)
            .unwrap_or(self.ceiling)
    }
}

pub const CREDIT_GAUGE: GaugeScale = GaugeScale {
    bands: &[(4.0, GaugeLevel::Summer), (SPREAD_CRITICAL, GaugeLevel::Autumn)],
    ceiling: GaugeLevel::Winter,
};

pub const FEAR_GAUGE: GaugeScale = GaugeScale {
    bands: &[
        (15.0, GaugeLevel::Summer),
        (25.0, GaugeLevel::Autumn),
        (VIX_PANIC, GaugeLevel::Winter),
    ],
    ceiling: GaugeLevel::DeepWinter,
};

// ============================================================================
// Aggregation
// ============================================================================

/// Critical triggers needed for a systemic season.
pub const SYSTEMIC_MIN_CRITICALS: usize = 2;
/// Critical triggers needed for a critical season.
pub const CRITICAL_MIN_CRITICALS: usize = 1;
/// Warning triggers needed for a caution season.
pub const CAUTION_MIN_WARNINGS: usize = 1;
