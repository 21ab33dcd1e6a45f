use crate::domain::FrameRejection;

/// Maximum distance in seconds between a frame timestamp and receipt time
pub const FRESHNESS_WINDOW_SECS: u64 = 8;

/// True when `timestamp` lies within the freshness window around `now`, in either direction
pub fn is_fresh(timestamp: i64, now: i64) -> bool {
    now.abs_diff(timestamp) <= FRESHNESS_WINDOW_SECS
}

pub fn check_freshness(timestamp: i64, now: i64) -> Result<(), FrameRejection> {
    if is_fresh(timestamp, now) {
        Ok(())
    } else {
        Err(FrameRejection::StaleTimestamp { timestamp, now })
    }
}
