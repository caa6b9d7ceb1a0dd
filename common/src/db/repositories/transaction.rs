// Transaction repository: PostgreSQL-backed TransactionStore

use super::TransactionStore;
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{Transaction, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::instrument;

/// Read access to recorded transactions
pub struct TransactionRepository {
    pool: DbPool,
}

impl TransactionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for TransactionRepository {
    #[instrument(skip(self))]
    async fn find_involving_user_between(
        &self,
        user_id: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, DatabaseError> {
        let rows = sqlx::query(
            r#"
            SELECT
                transaction_id, seller_id, customer_id, offer_id,
                transaction_value, points_awarded, timestamp
            FROM transactions
            WHERE (seller_id = $1 OR customer_id = $1)
              AND timestamp >= $2
              AND timestamp < $3
            ORDER BY timestamp
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(self.pool.pool())
        .await?;

        let mut transactions = Vec::with_capacity(rows.len());
        for row in rows {
            transactions.push(Transaction {
                transaction_id: row.try_get("transaction_id")?,
                seller_id: row.try_get("seller_id")?,
                customer_id: row.try_get("customer_id")?,
                offer_id: row.try_get("offer_id")?,
                transaction_value: row.try_get("transaction_value")?,
                points_awarded: row.try_get("points_awarded")?,
                timestamp: row.try_get("timestamp")?,
            });
        }

        tracing::debug!(user_id, count = transactions.len(), "Fetched transactions");
        Ok(transactions)
    }
}
