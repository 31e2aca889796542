pub mod device;
pub mod plan;
pub mod registry;
pub mod schedule;

pub use device::*;
pub use plan::*;
pub use registry::*;
pub use schedule::*;
