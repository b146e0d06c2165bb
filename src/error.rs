//! Error types shared across the simulator.

use std::io;

use thiserror::Error;

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"simulation.sub_interval_minutes"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Failure raised by the market-clearing collaborator.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("clearing failed on day {day} interval {interval}: {reason}")]
    Clearing {
        day: u32,
        interval: u32,
        reason: String,
    },
    #[error("no day-ahead solution available for day {0}")]
    NoSolution(u32),
    #[error("last-day settlement failed: {0}")]
    Settlement(String),
}

/// Failure raised by an event-bus transport.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus transport closed")]
    Closed,
    #[error("topic \"{0}\" rejected by bus")]
    Rejected(String),
}

/// A single forecast value that could not be ingested.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("forecast event \"{topic}\" carries no value")]
    Empty { topic: String },
    #[error("forecast event \"{topic}\" value \"{raw}\" is not numeric")]
    NotNumeric { topic: String, raw: String },
}

/// Top-level simulator error.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration ({} problem(s)): {}", .0.len(), join_config_errors(.0))]
    Config(Vec<ConfigError>),
    #[error("run already terminated on day {day}")]
    Terminated { day: u32 },
    #[error("initial equilibrium failed: {0}")]
    Bootstrap(#[source] MarketError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<ConfigError> for SimError {
    fn from(err: ConfigError) -> Self {
        SimError::Config(vec![err])
    }
}

fn join_config_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
