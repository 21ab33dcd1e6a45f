use crate::domain::result::DomainResult;
use crate::domain::ScaledAmount;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Sales channel recorded for sales reported by the device itself
pub const CASH_CHANNEL: &str = "cash";

/// Device reported a status change (e.g. "online")
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEvent {
    pub domain_id: i64,
    pub status: String,
    pub observed_at: DateTime<Utc>,
}

/// Point-of-sale transaction reported by the device
#[derive(Debug, Clone, PartialEq)]
pub struct SaleEvent {
    pub domain_id: i64,
    pub owner_id: String,
    pub device_internal_id: String,
    pub item_number: u16,
    pub item_price: ScaledAmount,
    pub channel: &'static str,
}

/// Passenger counter reading
#[derive(Debug, Clone, PartialEq)]
pub struct PaxCountEvent {
    pub domain_id: i64,
    pub owner_id: String,
    pub device_internal_id: String,
    pub count: u16,
}

/// Structured event produced from a validated frame
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedEvent {
    Status(StatusEvent),
    Sale(SaleEvent),
    PaxCount(PaxCountEvent),
}

impl DecodedEvent {
    pub fn domain_id(&self) -> i64 {
        match self {
            DecodedEvent::Status(event) => event.domain_id,
            DecodedEvent::Sale(event) => event.domain_id,
            DecodedEvent::PaxCount(event) => event.domain_id,
        }
    }

    /// Label used for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            DecodedEvent::Status(_) => "status",
            DecodedEvent::Sale(_) => "sale",
            DecodedEvent::PaxCount(_) => "paxcounter",
        }
    }
}

/// Persists decoded events
///
/// Implementations should:
/// - Write the event to the backing store
/// - Return error if the write fails, the caller reports it as lost data
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DispatchSink: Send + Sync {
    /// Record the latest status of a device
    async fn record_status(
        &self,
        domain_id: i64,
        status: &str,
        observed_at: DateTime<Utc>,
    ) -> DomainResult<()>;

    /// Record a sale
    async fn record_sale(
        &self,
        owner_id: &str,
        device_internal_id: &str,
        item_number: u16,
        item_price: ScaledAmount,
        channel: &str,
    ) -> DomainResult<()>;

    /// Record a passenger count reading
    async fn record_pax_count(
        &self,
        owner_id: &str,
        device_internal_id: &str,
        count: u16,
    ) -> DomainResult<()>;
}
