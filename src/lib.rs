pub mod config;
pub mod controller;
pub mod domain;
pub mod forecast;
pub mod optimizer;
pub mod repo;
#[cfg(feature = "sim")]
pub mod simulation;
pub mod telemetry;
pub mod utils;
