use common::domain::DomainError;
use thiserror::Error;

/// Protocol noise: the frame is dropped without an event and without an error log
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameRejection {
    #[error("frame too short: need at least {expected} bytes, got {actual}")]
    FrameTooShort { expected: usize, actual: usize },

    #[error("checksum mismatch: computed {computed:#04x}, trailer {trailer:#04x}")]
    ChecksumMismatch { computed: u8, trailer: u8 },

    #[error("stale timestamp: frame {timestamp}, now {now}")]
    StaleTimestamp { timestamp: i64, now: i64 },
}

impl FrameRejection {
    /// Label used for the dropped frames counter
    pub fn reason(&self) -> &'static str {
        match self {
            FrameRejection::FrameTooShort { .. } => "frame_too_short",
            FrameRejection::ChecksumMismatch { .. } => "checksum_mismatch",
            FrameRejection::StaleTimestamp { .. } => "stale_timestamp",
        }
    }
}

/// Recoverable per-message failures, reported at the message boundary
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("malformed topic: {0}")]
    MalformedTopic(String),

    #[error("no device registered for domain {0}")]
    DeviceNotFound(i64),

    #[error("invalid device record for domain {domain_id}: {reason}")]
    InvalidDevice { domain_id: i64, reason: String },

    #[error("device lookup failed: {0}")]
    Resolver(#[source] DomainError),

    #[error("dispatch of {kind} event failed: {source}")]
    Dispatch {
        kind: &'static str,
        #[source]
        source: DomainError,
    },

    #[error("{operation} timed out after {timeout_ms}ms")]
    BoundaryTimeout {
        operation: &'static str,
        timeout_ms: u64,
    },
}
