use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::domain::{DeviceId, Program, TimeSlot};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    #[error("no optimization backend available")]
    Unavailable,
    #[error("model is infeasible")]
    Infeasible,
    #[error("solver did not finish within {0:?}")]
    TimedOut(Duration),
    #[error("solver failed: {0}")]
    Failed(String),
}

/// Start slot of a block while it is being placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SlotAssignment {
    #[default]
    Unassigned,
    Assigned(usize),
}

impl SlotAssignment {
    pub fn start(self) -> Option<usize> {
        match self {
            SlotAssignment::Unassigned => None,
            SlotAssignment::Assigned(slot) => Some(slot),
        }
    }
}

/// Resource demand of one program, expressed in slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: DeviceId,
    /// Wh drawn in each occupied slot.
    pub power_per_slot: f64,
    pub slots_needed: usize,
    pub start: SlotAssignment,
}

impl Block {
    /// Number of slots a run of `run_time_minutes` occupies.
    ///
    /// Partial slots round up and every program occupies at least one slot.
    pub fn slots_needed_for(run_time_minutes: u32, slot_length_minutes: u32) -> usize {
        let slot_length = slot_length_minutes.max(1);
        (run_time_minutes.div_ceil(slot_length)).max(1) as usize
    }

    pub fn new(id: DeviceId, total_wh: f64, run_time_minutes: u32, slot_length_minutes: u32) -> Self {
        let slots_needed = Self::slots_needed_for(run_time_minutes, slot_length_minutes);
        Self {
            id,
            power_per_slot: total_wh / slots_needed as f64,
            slots_needed,
            start: SlotAssignment::Unassigned,
        }
    }

    pub fn from_program(program: &dyn Program, slot_length_minutes: u32) -> Self {
        Self::new(
            program.device_id(),
            program.power_consumption_wh(),
            program.run_time_minutes(),
            slot_length_minutes,
        )
    }

    pub fn total_wh(&self) -> f64 {
        self.power_per_slot * self.slots_needed as f64
    }

    /// Latest slot this block may start in without running past a horizon of
    /// `slot_count` slots. Blocks longer than the horizon are clamped to 0.
    pub fn last_start(&self, slot_count: usize) -> usize {
        slot_count.saturating_sub(self.slots_needed)
    }

    pub fn place(&self, start_slot: usize) -> PlannedBlock {
        PlannedBlock {
            id: self.id,
            power_per_slot: self.power_per_slot,
            slots_needed: self.slots_needed,
            start_slot,
        }
    }
}

/// A block with a start slot, the only shape the scheduler hands out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedBlock {
    pub id: DeviceId,
    pub power_per_slot: f64,
    pub slots_needed: usize,
    pub start_slot: usize,
}

impl PlannedBlock {
    /// One past the last occupied slot.
    pub fn end_slot(&self) -> usize {
        self.start_slot + self.slots_needed
    }

    pub fn occupies(&self, slot: usize) -> bool {
        slot >= self.start_slot && slot < self.end_slot()
    }
}

/// Scheduled consumption in each of `slot_count` slots.
pub fn slot_loads(planned: &[PlannedBlock], slot_count: usize) -> Vec<f64> {
    let mut loads = vec![0.0; slot_count];
    for block in planned {
        for load in loads.iter_mut().take(block.end_slot()).skip(block.start_slot) {
            *load += block.power_per_slot;
        }
    }
    loads
}

/// Sum over all slots of the consumption exceeding the slot's capacity.
pub fn total_overflow(planned: &[PlannedBlock], slots: &[TimeSlot]) -> f64 {
    slot_loads(planned, slots.len())
        .iter()
        .zip(slots)
        .map(|(load, slot)| (load - slot.capacity_wh).max(0.0))
        .sum()
}
