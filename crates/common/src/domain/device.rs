use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use garde::Validate;
use std::fmt;

/// Registry entry for a field device ("embedded").
///
/// Owned by the external registry and read-only from the pipeline's point of
/// view. `domain_id` is the numeric id devices publish under
/// (`/domain/<domain_id>/<kind>`).
#[derive(Clone, PartialEq, Eq, Validate)]
pub struct DeviceRecord {
    #[garde(skip)]
    pub domain_id: i64,
    #[garde(length(min = 1))]
    pub internal_id: String,
    #[garde(length(min = 1))]
    pub owner_id: String,
    /// Shared secret used to obfuscate the head of every frame, one byte per ASCII character
    #[garde(length(min = 1), custom(ascii_passkey))]
    pub passkey: Vec<u8>,
    #[garde(skip)]
    pub status: Option<String>,
    #[garde(skip)]
    pub status_at: Option<DateTime<Utc>>,
}

// Devices key the XOR with one byte per character; only ASCII maps 1:1 onto UTF-8
fn ascii_passkey(value: &[u8], _ctx: &()) -> garde::Result {
    if value.is_ascii() {
        Ok(())
    } else {
        Err(garde::Error::new("passkey must be ASCII"))
    }
}

// Passkeys never reach the logs
impl fmt::Debug for DeviceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRecord")
            .field("domain_id", &self.domain_id)
            .field("internal_id", &self.internal_id)
            .field("owner_id", &self.owner_id)
            .field("passkey_len", &self.passkey.len())
            .field("status", &self.status)
            .field("status_at", &self.status_at)
            .finish()
    }
}

/// Point lookup of device records keyed by domain id
///
/// Implementations must guarantee at most one live record per domain id.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceKeyResolver: Send + Sync {
    /// Resolve a device record
    ///
    /// # Returns
    /// `Ok(None)` when no device is registered under `domain_id`
    async fn resolve(&self, domain_id: i64) -> DomainResult<Option<DeviceRecord>>;
}
