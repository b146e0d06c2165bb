use std::collections::HashMap;

use log::info;

use crate::bus::BusEvent;
use crate::config::ScenarioConfig;
use crate::error::ConfigError;
use crate::learning::ActionDomainShape;

use super::ndg::NdgAgent;
use super::types::{GenCo, Lse, StorageUnit};

/// Owner of every market participant.
///
/// Agents are addressed by their stable insertion index; GenCos can also
/// be looked up by name. The name index is rebuilt from scratch whenever
/// the GenCo list is replaced.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    gencos: Vec<GenCo>,
    genco_by_name: HashMap<String, usize>,
    lses: Vec<Lse>,
    ndgs: Vec<NdgAgent>,
    storage: Vec<StorageUnit>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the population described by `config.agents`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if an hourly profile has the wrong length.
    pub fn from_config(config: &ScenarioConfig) -> Result<Self, ConfigError> {
        let agents = &config.agents;
        let mut registry = Self::new();
        registry.repopulate_gencos(agents.genco.iter().map(GenCo::from).collect());
        for lse in &agents.lse {
            registry.add_lse(Lse::try_from(lse)?);
        }
        for ndg in &agents.ndg {
            registry.add_ndg(
                NdgAgent::from_config(ndg)?
                    .with_topic_prefix(config.bus.forecast_topic_prefix.clone())
                    .adopting_bus_values(config.forecast.adopt_bus_values),
            );
        }
        for unit in &agents.storage {
            registry.add_storage(StorageUnit::from(unit));
        }
        info!(
            "registry: {} GenCo(s), {} LSE(s), {} NDG(s), {} storage unit(s)",
            registry.gencos.len(),
            registry.lses.len(),
            registry.ndgs.len(),
            registry.storage.len()
        );
        Ok(registry)
    }

    /// Replaces the GenCo list and rebuilds the name index.
    pub fn repopulate_gencos(&mut self, gencos: Vec<GenCo>) {
        self.gencos = gencos;
        self.genco_by_name = self
            .gencos
            .iter()
            .enumerate()
            .map(|(i, g)| (g.name.clone(), i))
            .collect();
    }

    pub fn add_lse(&mut self, lse: Lse) -> usize {
        self.lses.push(lse);
        self.lses.len() - 1
    }

    pub fn add_ndg(&mut self, ndg: NdgAgent) -> usize {
        self.ndgs.push(ndg);
        self.ndgs.len() - 1
    }

    pub fn add_storage(&mut self, unit: StorageUnit) -> usize {
        self.storage.push(unit);
        self.storage.len() - 1
    }

    pub fn gencos(&self) -> &[GenCo] {
        &self.gencos
    }

    pub fn genco(&self, index: usize) -> Option<&GenCo> {
        self.gencos.get(index)
    }

    pub fn genco_by_name(&self, name: &str) -> Option<&GenCo> {
        self.genco_index(name).and_then(|i| self.gencos.get(i))
    }

    pub fn genco_index(&self, name: &str) -> Option<usize> {
        self.genco_by_name.get(name).copied()
    }

    pub fn lses(&self) -> &[Lse] {
        &self.lses
    }

    pub fn ndgs(&self) -> &[NdgAgent] {
        &self.ndgs
    }

    pub fn ndg(&self, index: usize) -> Option<&NdgAgent> {
        self.ndgs.get(index)
    }

    pub fn storage(&self) -> &[StorageUnit] {
        &self.storage
    }

    /// Action-domain shapes of all GenCos, in index order.
    pub fn action_domain_shapes(&self) -> Vec<ActionDomainShape> {
        self.gencos.iter().map(|g| g.action_domain).collect()
    }

    /// Refreshes every NDG forecast for `day` from the same polled batch.
    pub fn refresh_forecasts(&mut self, day: u32, batch: Option<&[BusEvent]>) {
        for ndg in &mut self.ndgs {
            ndg.submit_forecast(day, batch);
        }
    }

    /// Net load per bus at `hour`: LSE demand minus NDG forecast.
    ///
    /// Agents on buses outside `1..=nodes` are ignored.
    pub fn net_load_by_node(&self, hour: usize, nodes: usize) -> Vec<f64> {
        let mut load = vec![0.0; nodes];
        for lse in &self.lses {
            if let Some(slot) = lse.node.checked_sub(1).and_then(|i| load.get_mut(i)) {
                *slot += lse.demand_mw[hour];
            }
        }
        for ndg in &self.ndgs {
            if let Some(slot) = ndg.node().checked_sub(1).and_then(|i| load.get_mut(i)) {
                *slot -= ndg.forecast()[hour];
            }
        }
        load
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genco(name: &str) -> GenCo {
        GenCo {
            name: name.to_string(),
            node: 1,
            capacity_mw: 100.0,
            marginal_cost: 20.0,
            action_domain: ActionDomainShape::new(10, 10, 1),
        }
    }

    #[test]
    fn baseline_population_loads() {
        let registry =
            AgentRegistry::from_config(&ScenarioConfig::baseline()).expect("baseline should build");
        assert_eq!(registry.gencos().len(), 5);
        assert_eq!(registry.lses().len(), 3);
        assert_eq!(registry.ndgs().len(), 1);
        assert_eq!(registry.storage().len(), 1);
        assert_eq!(registry.genco_index("GenCo3"), Some(2));
    }

    #[test]
    fn repopulate_rebuilds_name_index() {
        let mut registry = AgentRegistry::new();
        registry.repopulate_gencos(vec![genco("A"), genco("B")]);
        assert_eq!(registry.genco_index("B"), Some(1));

        registry.repopulate_gencos(vec![genco("C")]);
        assert_eq!(registry.genco_index("A"), None);
        assert_eq!(registry.genco_index("B"), None);
        assert_eq!(registry.genco_by_name("C").map(|g| g.name.as_str()), Some("C"));
    }

    #[test]
    fn net_load_subtracts_ndg_forecast() {
        let mut registry = AgentRegistry::new();
        registry.add_lse(Lse {
            name: "L".to_string(),
            node: 2,
            demand_mw: [100.0; 24],
        });
        registry.add_ndg(NdgAgent::new("W", 2, [30.0; 24]));
        registry.add_ndg(NdgAgent::new("Far", 9, [30.0; 24]));
        assert_eq!(registry.net_load_by_node(4, 3), vec![0.0, 70.0, 0.0]);
    }

    #[test]
    fn refresh_forecasts_reaches_every_ndg() {
        let mut registry = AgentRegistry::new();
        registry.add_ndg(NdgAgent::new("A", 1, [1.0; 24]).adopting_bus_values(true));
        registry.add_ndg(NdgAgent::new("B", 1, [2.0; 24]).adopting_bus_values(true));
        let batch = vec![BusEvent::single("ndgenforecastDAM_h0", "9")];
        registry.refresh_forecasts(2, Some(&batch));
        assert_eq!(registry.ndg(0).map(|n| n.forecast()[0]), Some(9.0));
        assert_eq!(registry.ndg(1).map(|n| n.forecast()[0]), Some(9.0));
    }
}
