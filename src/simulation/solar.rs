//! # Solar Panel Simulation

use async_trait::async_trait;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::{DeviceError, DeviceId, EnergySource};

/// Panel with a fixed peak output.
#[derive(Debug)]
pub struct SimulatedSolarPanel {
    id: DeviceId,
    name: String,
    max_output_w: f64,
    /// When set, every query fails as if the device dropped off the network.
    offline: AtomicBool,
}

impl SimulatedSolarPanel {
    pub fn new(id: DeviceId, name: impl Into<String>, max_output_w: f64) -> Self {
        Self {
            id,
            name: name.into(),
            max_output_w,
            offline: AtomicBool::new(false),
        }
    }

    /// Panel with a peak output drawn from 500..2000 W.
    pub fn random(id: DeviceId) -> Self {
        let max_output_w = rand::thread_rng().gen_range(500..2000) as f64;
        Self::new(id, format!("Simulated Solar Panel {id}"), max_output_w)
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), DeviceError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(DeviceError::Offline(self.id))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl EnergySource for SimulatedSolarPanel {
    fn id(&self) -> DeviceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn max_power_output(&self) -> Result<f64, DeviceError> {
        self.check_online()?;
        Ok(self.max_output_w)
    }

    async fn current_power_output(&self) -> Result<f64, DeviceError> {
        self.check_online()?;
        if self.max_output_w <= 0.0 {
            return Ok(0.0);
        }
        Ok(rand::thread_rng().gen_range(0.0..self.max_output_w))
    }
}
