use anyhow::Result;
use sqlx::{postgres::PgPoolOptions, PgPool};

use super::schedules::PgScheduleStore;

pub struct PgRepo {
    pub pool: PgPool,
}

impl PgRepo {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Creates the scheduled_programs table when missing.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scheduled_programs (
                id UUID PRIMARY KEY,
                device_id BIGINT NOT NULL,
                program_name TEXT NOT NULL,
                start_time TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub fn schedules(&self) -> PgScheduleStore {
        PgScheduleStore::new(self.pool.clone())
    }
}
