use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::{DeviceId, Program};

/// Persisted (device, program, start time) triple awaiting dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledProgram {
    pub id: Uuid,
    pub device_id: DeviceId,
    pub program_name: String,
    pub start_time: DateTime<Utc>,
}

impl ScheduledProgram {
    pub fn new(device_id: DeviceId, program_name: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id,
            program_name: program_name.into(),
            start_time,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now
    }
}

/// A scheduled record joined with the live program it refers to.
#[derive(Debug, Clone)]
pub struct ResolvedSchedule {
    pub record: ScheduledProgram,
    pub program: Arc<dyn Program>,
}

impl ResolvedSchedule {
    pub fn id(&self) -> Uuid {
        self.record.id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.record.start_time
    }
}
