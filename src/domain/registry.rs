use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

use super::{Appliance, DeviceId, EnergySource, Program};

/// Devices currently known to the hub.
///
/// Cheap to clone; clones share the same device lists.
#[derive(Clone, Default)]
pub struct DeviceRegistry {
    appliances: Arc<RwLock<Vec<Arc<dyn Appliance>>>>,
    sources: Arc<RwLock<Vec<Arc<dyn EnergySource>>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an appliance, replacing any appliance with the same id.
    pub fn add_appliance(&self, appliance: Arc<dyn Appliance>) {
        let mut appliances = self.appliances.write();
        appliances.retain(|a| a.id() != appliance.id());
        info!(device_id = appliance.id(), name = appliance.name(), "appliance registered");
        appliances.push(appliance);
    }

    /// Registers an energy source, replacing any source with the same id.
    pub fn add_energy_source(&self, source: Arc<dyn EnergySource>) {
        let mut sources = self.sources.write();
        sources.retain(|s| s.id() != source.id());
        info!(device_id = source.id(), name = source.name(), "energy source registered");
        sources.push(source);
    }

    pub fn remove_appliance(&self, id: DeviceId) -> bool {
        let mut appliances = self.appliances.write();
        let before = appliances.len();
        appliances.retain(|a| a.id() != id);
        before != appliances.len()
    }

    pub fn remove_energy_source(&self, id: DeviceId) -> bool {
        let mut sources = self.sources.write();
        let before = sources.len();
        sources.retain(|s| s.id() != id);
        before != sources.len()
    }

    pub fn appliances(&self) -> Vec<Arc<dyn Appliance>> {
        self.appliances.read().clone()
    }

    pub fn energy_sources(&self) -> Vec<Arc<dyn EnergySource>> {
        self.sources.read().clone()
    }

    pub fn appliance(&self, id: DeviceId) -> Option<Arc<dyn Appliance>> {
        self.appliances.read().iter().find(|a| a.id() == id).cloned()
    }

    /// Looks up a program by owning device and program name.
    ///
    /// `None` when the appliance is gone, no longer offers the program, or
    /// cannot be queried.
    pub async fn resolve_program(
        &self,
        device_id: DeviceId,
        program_name: &str,
    ) -> Option<Arc<dyn Program>> {
        let appliance = self.appliance(device_id)?;
        match appliance.programs().await {
            Ok(programs) => programs.into_iter().find(|p| p.name() == program_name),
            Err(e) => {
                warn!(device_id, error = %e, "failed to list appliance programs");
                None
            }
        }
    }
}
