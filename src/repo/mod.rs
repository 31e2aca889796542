//! Persistence of scheduled-program records.
//!
//! Every [`ScheduleStore`] method is one transaction: a single statement
//! against PostgreSQL, or one critical section in memory.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::domain::ScheduledProgram;

pub mod memory;
#[cfg(feature = "db")]
pub mod pg;
#[cfg(feature = "db")]
pub mod schedules;

pub use memory::InMemoryScheduleStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Storage backend unavailable: {0}")]
    Backend(String),
}

#[cfg(feature = "db")]
impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn add(&self, record: &ScheduledProgram) -> Result<(), StoreError>;
    /// Returns whether a record with `id` existed.
    async fn remove(&self, id: Uuid) -> Result<bool, StoreError>;
    /// All records ordered by start time.
    async fn list(&self) -> Result<Vec<ScheduledProgram>, StoreError>;
    /// Deletes every record, returning how many were removed.
    async fn clear(&self) -> Result<u64, StoreError>;
}

/// Opens the configured store: PostgreSQL with feature `db`, memory otherwise.
pub async fn connect(cfg: &Config) -> anyhow::Result<Arc<dyn ScheduleStore>> {
    #[cfg(feature = "db")]
    {
        let repo = pg::PgRepo::connect(&cfg.db.url).await?;
        repo.ensure_schema().await?;
        return Ok(Arc::new(repo.schedules()));
    }

    #[cfg(not(feature = "db"))]
    {
        let _ = cfg;
        return Ok(Arc::new(InMemoryScheduleStore::new()));
    }
}
