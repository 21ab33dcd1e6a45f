//! Pipeline counters.
//!
//! Names and helpers wrapping the [`metrics`](https://docs.rs/metrics) crate.
//! Without an installed recorder every call is a no-op.

use metrics::counter;

/// Frames accepted off the transport, labelled by `kind`
pub const FRAMES_RECEIVED: &str = "vmflow_frames_received_total";
/// Frames dropped as protocol noise or backpressure, labelled by `reason`
pub const FRAMES_DROPPED: &str = "vmflow_frames_dropped_total";
/// Frames whose domain id has no registry entry
pub const LOOKUP_MISSES: &str = "vmflow_lookup_misses_total";
/// Events handed to the sink successfully, labelled by `kind`
pub const EVENTS_DISPATCHED: &str = "vmflow_events_dispatched_total";
/// Sink writes that failed, labelled by `kind`
pub const DISPATCH_FAILURES: &str = "vmflow_dispatch_failures_total";
/// Internal failures other than dispatch, labelled by `cause`
pub const PIPELINE_ERRORS: &str = "vmflow_pipeline_errors_total";

pub const REASON_MALFORMED_TOPIC: &str = "malformed_topic";
pub const REASON_QUEUE_FULL: &str = "queue_full";

/// Cause of an internal pipeline failure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCause {
    Timeout,
    Resolver,
    InvalidDevice,
    Panic,
}

impl ErrorCause {
    fn as_str(self) -> &'static str {
        match self {
            ErrorCause::Timeout => "timeout",
            ErrorCause::Resolver => "resolver",
            ErrorCause::InvalidDevice => "invalid_device",
            ErrorCause::Panic => "panic",
        }
    }
}

pub fn inc_frames_received(kind: &'static str) {
    counter!(FRAMES_RECEIVED, "kind" => kind).increment(1);
}

pub fn inc_frames_dropped(reason: &'static str) {
    counter!(FRAMES_DROPPED, "reason" => reason).increment(1);
}

pub fn inc_lookup_misses() {
    counter!(LOOKUP_MISSES).increment(1);
}

pub fn inc_events_dispatched(kind: &'static str) {
    counter!(EVENTS_DISPATCHED, "kind" => kind).increment(1);
}

pub fn inc_dispatch_failures(kind: &'static str) {
    counter!(DISPATCH_FAILURES, "kind" => kind).increment(1);
}

pub fn inc_pipeline_errors(cause: ErrorCause) {
    counter!(PIPELINE_ERRORS, "cause" => cause.as_str()).increment(1);
}
