use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::{Display, EnumString};
use thiserror::Error;

/// Identifier assigned to a device when it is registered.
pub type DeviceId = i64;

/// Device-specific errors
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Communication error: {0}")]
    Communication(String),
    #[error("Device {0} offline or unavailable")]
    Offline(DeviceId),
    #[error("Command rejected by device: {0}")]
    Rejected(String),
}

/// Program operational status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ProgramStatus {
    /// Ready to be started
    Available,
    /// Cannot be started right now (appliance busy, door open, ...)
    Unavailable,
    Running,
}

/// A device producing energy, e.g. a PV string behind an inverter.
#[async_trait]
pub trait EnergySource: Send + Sync {
    fn id(&self) -> DeviceId;
    fn name(&self) -> &str;
    /// Peak output in watts the source can deliver.
    async fn max_power_output(&self) -> Result<f64, DeviceError>;
    async fn current_power_output(&self) -> Result<f64, DeviceError>;
}

/// A runnable program of an appliance (a washing cycle, a dishwasher eco run, ...).
///
/// Identity fields are fixed for the lifetime of the value; `status` and `start`
/// talk to the device.
#[async_trait]
pub trait Program: Send + Sync {
    fn name(&self) -> &str;
    /// Energy the whole run consumes, in watt-hours.
    fn power_consumption_wh(&self) -> f64;
    fn run_time_minutes(&self) -> u32;
    /// Id of the appliance owning this program.
    fn device_id(&self) -> DeviceId;

    async fn status(&self) -> Result<ProgramStatus, DeviceError>;
    async fn remaining_minutes(&self) -> Result<u32, DeviceError>;
    /// Returns `Ok(false)` when the device refused to start.
    async fn start(&self) -> Result<bool, DeviceError>;
    async fn try_stop(&self) -> Result<bool, DeviceError>;
}

/// An appliance exposing schedulable programs.
#[async_trait]
pub trait Appliance: Send + Sync {
    fn id(&self) -> DeviceId;
    fn name(&self) -> &str;
    async fn programs(&self) -> Result<Vec<Arc<dyn Program>>, DeviceError>;
}

impl std::fmt::Debug for dyn Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("device_id", &self.device_id())
            .field("name", &self.name())
            .field("power_consumption_wh", &self.power_consumption_wh())
            .field("run_time_minutes", &self.run_time_minutes())
            .finish()
    }
}
