use crate::domain::{DispatchSink, DomainError, DomainResult, ScaledAmount};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

/// PostgreSQL implementation of DispatchSink
///
/// Writes into the existing registry tables:
/// - status updates land on `embeddeds` (by `subdomain`)
/// - sales are appended to `sales`
/// - passenger counts are appended to `paxcounter`
#[derive(Clone)]
pub struct PostgresDispatchSink {
    client: PostgresClient,
}

impl PostgresDispatchSink {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }

    async fn connection(&self) -> DomainResult<deadpool_postgres::Client> {
        self.client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)
    }
}

#[async_trait]
impl DispatchSink for PostgresDispatchSink {
    #[instrument(skip(self, status))]
    async fn record_status(
        &self,
        domain_id: i64,
        status: &str,
        observed_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let conn = self.connection().await?;

        let updated = conn
            .execute(
                "UPDATE embeddeds SET status = $1, status_at = $2 WHERE subdomain = $3::bigint",
                &[&status, &observed_at, &domain_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        if updated == 0 {
            return Err(DomainError::DeviceNotFound(domain_id));
        }

        debug!(status = %status, "recorded device status");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn record_sale(
        &self,
        owner_id: &str,
        device_internal_id: &str,
        item_number: u16,
        item_price: ScaledAmount,
        channel: &str,
    ) -> DomainResult<()> {
        let conn = self.connection().await?;

        // NUMERIC is bound as text so the amount stays exact
        conn.execute(
            "INSERT INTO sales (owner_id, embedded_id, item_number, item_price, channel)
             VALUES ($1::text::uuid, $2::text::uuid, $3, $4::text::numeric, $5)",
            &[
                &owner_id,
                &device_internal_id,
                &i32::from(item_number),
                &item_price.to_string(),
                &channel,
            ],
        )
        .await
        .map_err(|e| {
            warn!(error = %e, "sale insert rejected");
            DomainError::RepositoryError(e.into())
        })?;

        debug!(item_number, item_price = %item_price, "recorded sale");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn record_pax_count(
        &self,
        owner_id: &str,
        device_internal_id: &str,
        count: u16,
    ) -> DomainResult<()> {
        let conn = self.connection().await?;

        conn.execute(
            "INSERT INTO paxcounter (owner_id, embedded_id, count)
             VALUES ($1::text::uuid, $2::text::uuid, $3)",
            &[&owner_id, &device_internal_id, &i32::from(count)],
        )
        .await
        .map_err(|e| DomainError::RepositoryError(e.into()))?;

        debug!(count, "recorded passenger count");
        Ok(())
    }
}
