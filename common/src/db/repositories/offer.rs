// Offer repository: PostgreSQL-backed OfferStore

use super::schedule::upsert_record;
use super::OfferStore;
use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{DealValue, NewOffer, Offer, OfferId, OfferStatus, UserId};
use crate::schedule::OfferSchedule;
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, Row};
use tracing::instrument;

const OFFER_COLUMNS: &str =
    "offer_id, seller_id, description, deal_value, starts, expires, uses_per_customer, status";

/// Repository for offer rows
pub struct OfferRepository {
    pool: DbPool,
}

impl OfferRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn offer_from_row(row: &PgRow) -> Result<Offer, DatabaseError> {
        let deal_value: String = row.try_get("deal_value")?;
        let status: String = row.try_get("status")?;
        let uses_per_customer: i32 = row.try_get("uses_per_customer")?;

        Ok(Offer {
            offer_id: row.try_get("offer_id")?,
            seller_id: row.try_get("seller_id")?,
            description: row.try_get("description")?,
            deal_value: deal_value
                .parse::<DealValue>()
                .map_err(DatabaseError::QueryFailed)?,
            starts: row.try_get("starts")?,
            expires: row.try_get("expires")?,
            uses_per_customer: u32::try_from(uses_per_customer).map_err(|e| {
                DatabaseError::QueryFailed(format!("Invalid uses_per_customer: {}", e))
            })?,
            status: status
                .parse::<OfferStatus>()
                .map_err(DatabaseError::QueryFailed)?,
        })
    }
}

async fn insert_offer_row<'e, E>(executor: E, offer: &NewOffer) -> Result<OfferId, DatabaseError>
where
    E: PgExecutor<'e>,
{
    let uses_per_customer = i32::try_from(offer.uses_per_customer)
        .map_err(|e| DatabaseError::QueryFailed(format!("Invalid uses_per_customer: {}", e)))?;

    let offer_id = sqlx::query_scalar(
        r#"
        INSERT INTO offers (
            seller_id, description, deal_value, starts, expires,
            uses_per_customer, status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING offer_id
        "#,
    )
    .bind(offer.seller_id)
    .bind(&offer.description)
    .bind(offer.deal_value.to_string())
    .bind(offer.starts)
    .bind(offer.expires)
    .bind(uses_per_customer)
    .bind(offer.status.to_string())
    .fetch_one(executor)
    .await?;

    Ok(offer_id)
}

#[async_trait]
impl OfferStore for OfferRepository {
    #[instrument(skip(self, offer), fields(seller_id = offer.seller_id))]
    async fn insert_offer(&self, offer: &NewOffer) -> Result<Offer, DatabaseError> {
        let offer_id = insert_offer_row(self.pool.pool(), offer).await?;
        tracing::info!(offer_id, status = %offer.status, "Offer created");
        Ok(offer.clone().into_offer(offer_id))
    }

    #[instrument(skip(self, offer), fields(seller_id = offer.seller_id))]
    async fn insert_offer_with_schedule(&self, offer: &NewOffer) -> Result<Offer, DatabaseError> {
        let mut tx = self.pool.pool().begin().await?;

        let offer_id = insert_offer_row(&mut *tx, offer).await?;
        let offer = offer.clone().into_offer(offer_id);
        let records = OfferSchedule::for_offer(&offer).records();
        for record in &records {
            upsert_record(&mut *tx, record).await?;
        }

        // Dropping an uncommitted transaction rolls it back
        tx.commit().await?;

        tracing::info!(
            offer_id,
            status = %offer.status,
            records = records.len(),
            "Offer created with schedule"
        );
        Ok(offer)
    }

    #[instrument(skip(self))]
    async fn find_offer(&self, offer_id: OfferId) -> Result<Option<Offer>, DatabaseError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM offers WHERE offer_id = $1",
            OFFER_COLUMNS
        ))
        .bind(offer_id)
        .fetch_optional(self.pool.pool())
        .await?;

        row.as_ref().map(Self::offer_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn set_status(
        &self,
        offer_id: OfferId,
        status: OfferStatus,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE offers
            SET status = CASE WHEN status = 'deactivated' THEN status ELSE $2 END
            WHERE offer_id = $1
            "#,
        )
        .bind(offer_id)
        .bind(status.to_string())
        .execute(self.pool.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn find_active_offers_for_seller(
        &self,
        seller_id: UserId,
    ) -> Result<Vec<Offer>, DatabaseError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM offers WHERE seller_id = $1 AND status IN ('pending', 'active') \
             ORDER BY offer_id",
            OFFER_COLUMNS
        ))
        .bind(seller_id)
        .fetch_all(self.pool.pool())
        .await?;

        let offers = rows
            .iter()
            .map(Self::offer_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(seller_id, count = offers.len(), "Found active offers");
        Ok(offers)
    }
}
