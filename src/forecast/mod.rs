//! Solar production forecasting.

pub mod curve;
pub mod production;

pub use curve::*;
pub use production::*;
