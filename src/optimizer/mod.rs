pub mod greedy;
pub mod scheduler;
pub mod strategies;
pub mod types;

pub use greedy::*;
pub use scheduler::*;
pub use strategies::*;
pub use types::*;
