use crate::domain::{DeviceKeyResolver, DeviceRecord, DomainError, DomainResult};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

/// Row shape of the `embeddeds` registry table
#[derive(Debug, Clone)]
pub struct EmbeddedRow {
    pub subdomain: i64,
    pub id: String,
    pub owner_id: String,
    pub passkey: String,
    pub status: Option<String>,
    pub status_at: Option<DateTime<Utc>>,
}

/// Convert database EmbeddedRow to domain DeviceRecord
impl From<EmbeddedRow> for DeviceRecord {
    fn from(row: EmbeddedRow) -> Self {
        DeviceRecord {
            domain_id: row.subdomain,
            internal_id: row.id,
            owner_id: row.owner_id,
            passkey: row.passkey.into_bytes(),
            status: row.status,
            status_at: row.status_at,
        }
    }
}

/// PostgreSQL implementation of DeviceKeyResolver backed by the `embeddeds` table
#[derive(Clone)]
pub struct PostgresDeviceKeyResolver {
    client: PostgresClient,
}

impl PostgresDeviceKeyResolver {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeviceKeyResolver for PostgresDeviceKeyResolver {
    #[instrument(skip(self))]
    async fn resolve(&self, domain_id: i64) -> DomainResult<Option<DeviceRecord>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                "SELECT subdomain::bigint, id::text, owner_id::text, passkey, status, status_at
                 FROM embeddeds
                 WHERE subdomain = $1::bigint",
                &[&domain_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        match row {
            Some(row) => {
                let embedded = EmbeddedRow {
                    subdomain: row.get(0),
                    id: row.get(1),
                    owner_id: row.get(2),
                    passkey: row.get(3),
                    status: row.get(4),
                    status_at: row.get(5),
                };
                debug!(internal_id = %embedded.id, "resolved device record");
                Ok(Some(embedded.into()))
            }
            None => Ok(None),
        }
    }
}
