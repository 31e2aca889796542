use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("production plan needs at least one time slot")]
    NoSlots,
    #[error("slot length must be positive, got {0} minutes")]
    InvalidSlotLength(u32),
    #[error("horizon of {slot_count} x {slot_length_minutes} min slots is out of the supported time range")]
    HorizonOutOfRange {
        slot_count: usize,
        slot_length_minutes: u32,
    },
}

/// Start of slot `index` of a horizon, or `None` when it is not representable.
pub fn checked_slot_start(
    start_time: DateTime<Utc>,
    slot_length_minutes: u32,
    index: usize,
) -> Option<DateTime<Utc>> {
    let index = i32::try_from(index).ok()?;
    let offset = Duration::minutes(i64::from(slot_length_minutes)).checked_mul(index)?;
    start_time.checked_add_signed(offset)
}

/// Forecast production of one slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Energy available during the slot, in Wh.
    pub capacity_wh: f64,
}

impl TimeSlot {
    pub fn new(capacity_wh: f64) -> Self {
        Self { capacity_wh }
    }
}

/// Forecast capacity curve over a planning horizon.
///
/// Fields are private so the invariants checked in [`ProductionPlan::new`]
/// hold for the whole lifetime of the plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductionPlan {
    name: String,
    slots: Vec<TimeSlot>,
    slot_length_minutes: u32,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

impl ProductionPlan {
    pub fn new(
        name: impl Into<String>,
        slots: Vec<TimeSlot>,
        slot_length_minutes: u32,
        start_time: DateTime<Utc>,
    ) -> Result<Self, PlanError> {
        if slots.is_empty() {
            return Err(PlanError::NoSlots);
        }
        if slot_length_minutes == 0 {
            return Err(PlanError::InvalidSlotLength(slot_length_minutes));
        }
        let end_time = checked_slot_start(start_time, slot_length_minutes, slots.len()).ok_or(
            PlanError::HorizonOutOfRange {
                slot_count: slots.len(),
                slot_length_minutes,
            },
        )?;
        Ok(Self {
            name: name.into(),
            slots,
            slot_length_minutes,
            start_time,
            end_time,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    pub fn slot_length_minutes(&self) -> u32 {
        self.slot_length_minutes
    }

    pub fn slot_length(&self) -> Duration {
        Duration::minutes(i64::from(self.slot_length_minutes))
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Start of slot `index`. Indices past the horizon clamp to [`end_time`](Self::end_time).
    pub fn slot_start(&self, index: usize) -> DateTime<Utc> {
        if index >= self.slots.len() {
            return self.end_time;
        }
        checked_slot_start(self.start_time, self.slot_length_minutes, index).unwrap_or(self.end_time)
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn total_capacity(&self) -> f64 {
        self.slots.iter().map(|s| s.capacity_wh).sum()
    }
}
