//! Error taxonomy for one gauge run.
//!
//! - [`FetchError`]: an indicator could not be retrieved.
//! - [`EvaluationError`]: the snapshot is structurally incomplete.
//! - [`DeliveryError`]: the Telegram sink is unconfigured, unreachable or refused the message.
//!
//! Fetch and evaluation errors abort a run ([`RunError`]). Delivery errors are
//! only ever logged.

use thiserror::Error;

/// Failure retrieving an indicator from a data provider.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    /// Connection failed, timed out, or the body could not be read
    #[error("{source_name} request for {series} failed: {message}")]
    Network {
        source_name: &'static str,
        series: String,
        message: String,
    },

    /// Provider answered with a non-success HTTP status
    #[error("{source_name} returned HTTP {status} for {series}")]
    Status {
        source_name: &'static str,
        series: String,
        status: u16,
    },

    /// Provider answered but the payload was not understood
    #[error("{source_name} payload for {series} could not be parsed: {message}")]
    Parse {
        source_name: &'static str,
        series: String,
        message: String,
    },

    /// Provider answered with no usable observations
    #[error("{source_name} has no data for {series}")]
    MissingData {
        source_name: &'static str,
        series: String,
    },
}

impl FetchError {
    /// Series or metric id the failure relates to.
    pub fn series(&self) -> &str {
        match self {
            Self::Network { series, .. }
            | Self::Status { series, .. }
            | Self::Parse { series, .. }
            | Self::MissingData { series, .. } => series,
        }
    }
}

/// The snapshot handed to the evaluator is missing required input.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvaluationError {
    #[error("required field `{0}` is missing from the snapshot")]
    MissingField(&'static str),

    #[error("`{field}` needs at least {required} readings, got {found}")]
    InsufficientHistory {
        field: &'static str,
        required: usize,
        found: usize,
    },

    #[error("`{0}` holds a non-finite value")]
    NonFinite(&'static str),
}

/// Failure handing a message to the Telegram sink.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DeliveryError {
    #[error("delivery disabled: bot token or chat id not configured")]
    NotConfigured,

    #[error("delivery transport failed: {0}")]
    Transport(String),

    #[error("delivery rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Anything that aborts a run before a report exists.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RunError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}
