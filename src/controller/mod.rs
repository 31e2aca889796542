pub mod dispatch;
pub mod orchestrator;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::domain::DeviceRegistry;
use crate::repo;
use crate::utils::SystemClock;

pub use dispatch::{DispatchReport, DispatchStatus};
pub use orchestrator::{PlanRequest, PlanningError, PlanningOrchestrator};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub registry: DeviceRegistry,
    pub orchestrator: Arc<PlanningOrchestrator>,
}

impl AppState {
    /// Opens the schedule store, registers devices and starts the orchestrator
    /// together with its dispatch loop.
    pub async fn new(cfg: Config) -> Result<Self> {
        let store = repo::connect(&cfg).await?;
        let registry = DeviceRegistry::new();

        #[cfg(feature = "sim")]
        register_simulated_devices(&cfg, &registry);

        let orchestrator =
            PlanningOrchestrator::new(&cfg, registry.clone(), store, Arc::new(SystemClock))
                .start()
                .await?;

        info!(
            appliances = registry.appliances().len(),
            energy_sources = registry.energy_sources().len(),
            "planning orchestrator running"
        );

        Ok(Self {
            cfg,
            registry,
            orchestrator,
        })
    }
}

#[cfg(feature = "sim")]
fn register_simulated_devices(cfg: &Config, registry: &DeviceRegistry) {
    use crate::simulation::{SimulatedAppliance, SimulatedSolarPanel};

    let clock: Arc<dyn crate::utils::Clock> = Arc::new(SystemClock);
    let mut next_id = 1;
    for _ in 0..cfg.simulation.appliances {
        registry.add_appliance(Arc::new(SimulatedAppliance::random(next_id, clock.clone())));
        next_id += 1;
    }
    for _ in 0..cfg.simulation.solar_panels {
        registry.add_energy_source(Arc::new(SimulatedSolarPanel::random(next_id)));
        next_id += 1;
    }
}
