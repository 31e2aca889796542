//! Exact assignment strategies
//!
//! - MILP: mixed-integer linear programming via `good_lp` (feature `optimization`)

pub mod milp;

pub use milp::*;
