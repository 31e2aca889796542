use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{ScheduleStore, StoreError};
use crate::domain::ScheduledProgram;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScheduledProgramRow {
    pub id: Uuid,
    pub device_id: i64,
    pub program_name: String,
    pub start_time: DateTime<Utc>,
}

impl From<ScheduledProgramRow> for ScheduledProgram {
    fn from(row: ScheduledProgramRow) -> Self {
        Self {
            id: row.id,
            device_id: row.device_id,
            program_name: row.program_name,
            start_time: row.start_time,
        }
    }
}

pub struct PgScheduleStore {
    pool: PgPool,
}

impl PgScheduleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScheduleStore for PgScheduleStore {
    async fn add(&self, record: &ScheduledProgram) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO scheduled_programs (id, device_id, program_name, start_time)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(record.id)
        .bind(record.device_id)
        .bind(&record.program_name)
        .bind(record.start_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM scheduled_programs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<ScheduledProgram>, StoreError> {
        let rows = sqlx::query_as::<_, ScheduledProgramRow>(
            r#"
            SELECT id, device_id, program_name, start_time
            FROM scheduled_programs
            ORDER BY start_time ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM scheduled_programs")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
