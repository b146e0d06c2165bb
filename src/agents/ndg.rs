use log::{debug, warn};

use crate::bus::BusEvent;
use crate::config::NdgConfig;
use crate::error::{ConfigError, ForecastError};

/// Hours in one day-ahead forecast.
pub const FORECAST_HOURS: usize = 24;

/// Default topic prefix of per-hour day-ahead forecast events.
pub const DEFAULT_TOPIC_PREFIX: &str = "ndgenforecastDAM_h";

/// Non-dispatchable generator (wind, solar) with an intrinsic daily profile.
///
/// Each day the agent refreshes a 24-slot forecast buffer, either from its
/// intrinsic profile or from day-ahead forecast events received over the
/// event bus (topic `<prefix><hour>`, first value is the MW forecast).
///
/// # Examples
///
/// ```
/// use wpm_cosim::agents::NdgAgent;
///
/// let mut wind = NdgAgent::new("Wind1", 5, [12.0; 24]);
/// // Bus disabled: the intrinsic profile is submitted.
/// assert_eq!(wind.submit_forecast(5, None), &[12.0; 24]);
/// ```
#[derive(Debug, Clone)]
pub struct NdgAgent {
    name: String,
    node: usize,
    profile: [f64; FORECAST_HOURS],
    forecast: [f64; FORECAST_HOURS],
    received: [f64; FORECAST_HOURS],
    topic_prefix: String,
    adopt_bus_values: bool,
}

impl NdgAgent {
    pub fn new(name: impl Into<String>, node: usize, profile: [f64; FORECAST_HOURS]) -> Self {
        Self {
            name: name.into(),
            node,
            profile,
            forecast: profile,
            received: profile,
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
            adopt_bus_values: false,
        }
    }

    /// Builds an agent from its configuration entry.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the profile does not hold 24 values.
    pub fn from_config(cfg: &NdgConfig) -> Result<Self, ConfigError> {
        let profile: [f64; FORECAST_HOURS] =
            cfg.profile_mw.as_slice().try_into().map_err(|_| {
                ConfigError::new(
                    format!("agents.ndg.{}.profile_mw", cfg.name),
                    format!(
                        "must have {FORECAST_HOURS} hourly values, got {}",
                        cfg.profile_mw.len()
                    ),
                )
            })?;
        Ok(Self::new(cfg.name.clone(), cfg.node, profile))
    }

    pub fn with_topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.topic_prefix = prefix.into();
        self
    }

    /// Keep bus-supplied forecasts instead of reverting to the intrinsic
    /// profile after ingestion.
    pub fn adopting_bus_values(mut self, adopt: bool) -> Self {
        self.adopt_bus_values = adopt;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> usize {
        self.node
    }

    pub fn profile(&self) -> &[f64; FORECAST_HOURS] {
        &self.profile
    }

    /// Forecast buffer as of the last submission.
    pub fn forecast(&self) -> &[f64; FORECAST_HOURS] {
        &self.forecast
    }

    /// Values most recently received over the bus; hours never received
    /// hold the intrinsic profile.
    pub fn ingested(&self) -> &[f64; FORECAST_HOURS] {
        &self.received
    }

    /// Refreshes and returns the day-ahead forecast for `day`.
    ///
    /// `batch` is the day's polled bus events, or `None` when the bus is
    /// disabled. Day 1 and a disabled bus always use the intrinsic profile.
    /// Otherwise matching events are ingested first; unless the agent adopts
    /// bus values, the buffer then reverts to the intrinsic profile.
    pub fn submit_forecast(&mut self, day: u32, batch: Option<&[BusEvent]>) -> &[f64; FORECAST_HOURS] {
        match batch {
            Some(events) if day > 1 => {
                self.ingest(events);
                self.forecast = if self.adopt_bus_values {
                    self.received
                } else {
                    self.profile
                };
            }
            _ => self.forecast = self.profile,
        }
        &self.forecast
    }

    /// Dispatch committed for the day: the intrinsic profile.
    pub fn submit_committed_dispatch(&self) -> [f64; FORECAST_HOURS] {
        self.profile
    }

    /// Copies matching forecast events into the receive buffer.
    ///
    /// Returns the values that could not be used; their hours keep the
    /// previous value.
    pub fn ingest(&mut self, events: &[BusEvent]) -> Vec<ForecastError> {
        let mut errors = Vec::new();
        let mut updated = 0_usize;
        for event in events {
            let Some(hour) = self.hour_for_topic(&event.topic) else {
                continue;
            };
            match parse_value(event) {
                Ok(v) => {
                    self.received[hour] = v;
                    updated += 1;
                }
                Err(e) => {
                    warn!("{}: keeping hour {hour} forecast: {e}", self.name);
                    errors.push(e);
                }
            }
        }
        if updated < FORECAST_HOURS {
            debug!(
                "{}: forecast batch covered {updated} of {FORECAST_HOURS} hours",
                self.name
            );
        }
        errors
    }

    fn hour_for_topic(&self, topic: &str) -> Option<usize> {
        let rest = topic.strip_prefix(self.topic_prefix.as_str())?;
        let hour: usize = rest.parse().ok()?;
        (hour < FORECAST_HOURS && hour.to_string() == rest).then_some(hour)
    }
}

fn parse_value(event: &BusEvent) -> Result<f64, ForecastError> {
    let raw = event.values.first().ok_or_else(|| ForecastError::Empty {
        topic: event.topic.clone(),
    })?;
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ForecastError::NotNumeric {
            topic: event.topic.clone(),
            raw: raw.clone(),
        })
}
