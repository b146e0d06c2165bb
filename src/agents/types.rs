use crate::config::{GenCoConfig, LseConfig, StorageConfig};
use crate::error::ConfigError;
use crate::learning::ActionDomainShape;

use super::ndg::FORECAST_HOURS;

/// Generation company.
#[derive(Debug, Clone, PartialEq)]
pub struct GenCo {
    pub name: String,
    /// 1-based bus.
    pub node: usize,
    pub capacity_mw: f64,
    /// Marginal cost ($/MWh).
    pub marginal_cost: f64,
    pub action_domain: ActionDomainShape,
}

impl From<&GenCoConfig> for GenCo {
    fn from(cfg: &GenCoConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            node: cfg.node,
            capacity_mw: cfg.capacity_mw,
            marginal_cost: cfg.marginal_cost,
            action_domain: ActionDomainShape::new(
                cfg.lower_ri_count,
                cfg.upper_ri_count,
                cfg.upper_cap_count,
            ),
        }
    }
}

/// Load-serving entity with a fixed hourly demand.
#[derive(Debug, Clone, PartialEq)]
pub struct Lse {
    pub name: String,
    pub node: usize,
    pub demand_mw: [f64; FORECAST_HOURS],
}

impl TryFrom<&LseConfig> for Lse {
    type Error = ConfigError;

    fn try_from(cfg: &LseConfig) -> Result<Self, Self::Error> {
        let demand_mw = cfg.demand_mw.as_slice().try_into().map_err(|_| {
            ConfigError::new(
                format!("agents.lse.{}.demand_mw", cfg.name),
                format!(
                    "must have {FORECAST_HOURS} hourly values, got {}",
                    cfg.demand_mw.len()
                ),
            )
        })?;
        Ok(Self {
            name: cfg.name.clone(),
            node: cfg.node,
            demand_mw,
        })
    }
}

/// Storage unit.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageUnit {
    pub name: String,
    pub node: usize,
    pub capacity_mwh: f64,
    pub max_power_mw: f64,
}

impl From<&StorageConfig> for StorageUnit {
    fn from(cfg: &StorageConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            node: cfg.node,
            capacity_mwh: cfg.capacity_mwh,
            max_power_mw: cfg.max_power_mw,
        }
    }
}
