use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ScheduleStore, StoreError};
use crate::domain::ScheduledProgram;

/// Process-local store. Records do not survive a restart.
#[derive(Debug, Default)]
pub struct InMemoryScheduleStore {
    records: Mutex<Vec<ScheduledProgram>>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn add(&self, record: &ScheduledProgram) -> Result<(), StoreError> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() != before)
    }

    async fn list(&self) -> Result<Vec<ScheduledProgram>, StoreError> {
        let mut records = self.records.lock().await.clone();
        records.sort_by_key(|r| r.start_time);
        Ok(records)
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        let mut records = self.records.lock().await;
        let removed = records.len() as u64;
        records.clear();
        Ok(removed)
    }
}
