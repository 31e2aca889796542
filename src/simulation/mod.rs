//! # Device Simulation Module
//!
//! Stand-ins for real device drivers, used by the binary when no hardware
//! integration is configured and by the integration tests.
//!
//! - **Solar**: panels reporting a fixed (or randomly drawn) peak output
//! - **Appliance**: appliances with programs that run for their run time,
//!   measured on an injectable [`Clock`](crate::utils::Clock)

pub mod appliance;
pub mod solar;

pub use appliance::{SimulatedAppliance, SimulatedProgram};
pub use solar::SimulatedSolarPanel;
