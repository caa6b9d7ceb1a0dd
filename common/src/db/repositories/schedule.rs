// Schedule record repository: PostgreSQL-backed ScheduleStore

use super::ScheduleStore;
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{OfferId, ScheduleAction, ScheduledJobRecord};
use async_trait::async_trait;
use sqlx::{PgExecutor, Row};
use tracing::instrument;

/// Repository for the offer_schedule table
pub struct ScheduleRepository {
    pool: DbPool,
}

impl ScheduleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Insert or replace the record for its (offer, action), on a pool or inside
/// an open transaction
pub(super) async fn upsert_record<'e, E>(
    executor: E,
    record: &ScheduledJobRecord,
) -> Result<(), DatabaseError>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO offer_schedule (offer_id, action, timestamp)
        VALUES ($1, $2, $3)
        ON CONFLICT (offer_id, action) DO UPDATE SET timestamp = EXCLUDED.timestamp
        "#,
    )
    .bind(record.offer_id)
    .bind(record.action.to_string())
    .bind(record.timestamp)
    .execute(executor)
    .await?;

    Ok(())
}

#[async_trait]
impl ScheduleStore for ScheduleRepository {
    #[instrument(skip(self, record), fields(offer_id = record.offer_id, action = %record.action))]
    async fn insert_record(&self, record: &ScheduledJobRecord) -> Result<(), DatabaseError> {
        upsert_record(self.pool.pool(), record).await
    }

    #[instrument(skip(self))]
    async fn load_all(&self) -> Result<Vec<ScheduledJobRecord>, DatabaseError> {
        let rows = sqlx::query(
            "SELECT offer_id, action, timestamp FROM offer_schedule ORDER BY offer_id, timestamp",
        )
        .fetch_all(self.pool.pool())
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let action: String = row.try_get("action")?;
            records.push(ScheduledJobRecord {
                offer_id: row.try_get("offer_id")?,
                timestamp: row.try_get("timestamp")?,
                action: action
                    .parse::<ScheduleAction>()
                    .map_err(DatabaseError::QueryFailed)?,
            });
        }

        tracing::debug!(count = records.len(), "Loaded offer schedule records");
        Ok(records)
    }

    #[instrument(skip(self))]
    async fn delete_for_offer(
        &self,
        offer_id: OfferId,
        action: Option<ScheduleAction>,
    ) -> Result<u64, DatabaseError> {
        let result = match action {
            Some(action) => {
                sqlx::query("DELETE FROM offer_schedule WHERE offer_id = $1 AND action = $2")
                    .bind(offer_id)
                    .bind(action.to_string())
                    .execute(self.pool.pool())
                    .await?
            }
            None => {
                sqlx::query("DELETE FROM offer_schedule WHERE offer_id = $1")
                    .bind(offer_id)
                    .execute(self.pool.pool())
                    .await?
            }
        };

        Ok(result.rows_affected())
    }
}
