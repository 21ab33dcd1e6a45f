use crate::domain::{
    decode_frame, parse_topic, DecodedFrame, EventKind, FrameRejection, PaxCountFrame,
    PipelineError, SaleFrame, PRICE_DECIMAL_PLACES, PRICE_UNIT_SCALE,
};
use crate::metrics::{self, ErrorCause};
use chrono::{DateTime, Utc};
use common::domain::{
    DecodedEvent, DeviceKeyResolver, DeviceRecord, DispatchSink, DomainError, PaxCountEvent,
    SaleEvent, ScaledAmount, StatusEvent, CASH_CHANNEL,
};
use common::garde::validate_struct;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

pub const DEFAULT_BOUNDARY_TIMEOUT: Duration = Duration::from_secs(3);

/// Domain service that turns one `(topic, payload)` pair into at most one dispatched event
///
/// Flow:
/// 1. Parse topic into domain id and event kind
/// 2. Resolve the device record (sale and paxcounter only)
/// 3. Validate the record using garde
/// 4. Decode the frame: descramble, checksum, freshness, extract
/// 5. Build the domain event and hand it to the sink
///
/// Both boundary calls run under `boundary_timeout`. Nothing is retried.
pub struct TelemetryPipeline {
    resolver: Arc<dyn DeviceKeyResolver>,
    sink: Arc<dyn DispatchSink>,
    boundary_timeout: Duration,
}

impl TelemetryPipeline {
    pub fn new(
        resolver: Arc<dyn DeviceKeyResolver>,
        sink: Arc<dyn DispatchSink>,
        boundary_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            sink,
            boundary_timeout,
        }
    }

    /// Process a message and report the outcome to logs and metrics
    ///
    /// Never fails; this is the per-message boundary.
    pub async fn handle_message(&self, topic: &str, payload: &[u8], now: DateTime<Utc>) {
        match self.process_message(topic, payload, now).await {
            Ok(Some(event)) => {
                debug!(
                    domain_id = event.domain_id(),
                    kind = event.kind(),
                    "event dispatched"
                );
            }
            Ok(None) => {}
            Err(e) => report_error(&e),
        }
    }

    /// Process a message, returning the dispatched event
    ///
    /// `Ok(None)` means the frame was dropped as protocol noise.
    #[instrument(skip(self, payload), fields(payload_size = payload.len()))]
    pub async fn process_message(
        &self,
        topic: &str,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> Result<Option<DecodedEvent>, PipelineError> {
        let parsed = parse_topic(topic)?;
        metrics::inc_frames_received(parsed.kind.as_str());

        let device = match parsed.kind {
            EventKind::Status => None,
            _ => Some(self.resolve_device(parsed.domain_id).await?),
        };
        let passkey = device
            .as_ref()
            .map(|d| d.passkey.as_slice())
            .unwrap_or_default();

        let frame = match decode_frame(parsed.kind, payload, passkey, now.timestamp()) {
            Ok(frame) => frame,
            Err(rejection) => {
                drop_frame(parsed.domain_id, parsed.kind, &rejection);
                return Ok(None);
            }
        };

        let event = match (frame, device) {
            (DecodedFrame::Status(status), _) => DecodedEvent::Status(StatusEvent {
                domain_id: parsed.domain_id,
                status,
                observed_at: now,
            }),
            (DecodedFrame::Sale(sale), Some(device)) => sale_event(device, sale),
            (DecodedFrame::PaxCount(pax), Some(device)) => pax_event(device, pax),
            // Sealed frames are only decoded after a successful lookup
            (_, None) => return Ok(None),
        };

        self.dispatch(&event).await?;
        metrics::inc_events_dispatched(event.kind());

        Ok(Some(event))
    }

    async fn resolve_device(&self, domain_id: i64) -> Result<DeviceRecord, PipelineError> {
        let device = self
            .with_timeout("resolve", self.resolver.resolve(domain_id))
            .await?
            .map_err(PipelineError::Resolver)?
            .ok_or(PipelineError::DeviceNotFound(domain_id))?;

        validate_struct(&device).map_err(|e| PipelineError::InvalidDevice {
            domain_id,
            reason: match e {
                DomainError::ValidationError(reason) => reason,
                other => other.to_string(),
            },
        })?;

        Ok(device)
    }

    async fn dispatch(&self, event: &DecodedEvent) -> Result<(), PipelineError> {
        let result = match event {
            DecodedEvent::Status(status) => {
                self.with_timeout(
                    "record_status",
                    self.sink
                        .record_status(status.domain_id, &status.status, status.observed_at),
                )
                .await?
            }
            DecodedEvent::Sale(sale) => {
                self.with_timeout(
                    "record_sale",
                    self.sink.record_sale(
                        &sale.owner_id,
                        &sale.device_internal_id,
                        sale.item_number,
                        sale.item_price,
                        sale.channel,
                    ),
                )
                .await?
            }
            DecodedEvent::PaxCount(pax) => {
                self.with_timeout(
                    "record_pax_count",
                    self.sink
                        .record_pax_count(&pax.owner_id, &pax.device_internal_id, pax.count),
                )
                .await?
            }
        };

        result.map_err(|source| match source {
            // Status rows are keyed by domain id; no row means no registered device
            DomainError::DeviceNotFound(domain_id) => PipelineError::DeviceNotFound(domain_id),
            source => PipelineError::Dispatch {
                kind: event.kind(),
                source,
            },
        })
    }

    async fn with_timeout<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = T>,
    ) -> Result<T, PipelineError> {
        tokio::time::timeout(self.boundary_timeout, fut)
            .await
            .map_err(|_| PipelineError::BoundaryTimeout {
                operation,
                timeout_ms: u64::try_from(self.boundary_timeout.as_millis()).unwrap_or(u64::MAX),
            })
    }
}

fn sale_event(device: DeviceRecord, sale: SaleFrame) -> DecodedEvent {
    debug!(
        domain_id = device.domain_id,
        version = sale.version,
        item_number = sale.item_number,
        "decoded sale frame"
    );
    DecodedEvent::Sale(SaleEvent {
        domain_id: device.domain_id,
        owner_id: device.owner_id,
        device_internal_id: device.internal_id,
        item_number: sale.item_number,
        item_price: ScaledAmount::from_scale_factor(
            sale.item_price_units,
            PRICE_UNIT_SCALE,
            PRICE_DECIMAL_PLACES,
        ),
        channel: CASH_CHANNEL,
    })
}

fn pax_event(device: DeviceRecord, pax: PaxCountFrame) -> DecodedEvent {
    DecodedEvent::PaxCount(PaxCountEvent {
        domain_id: device.domain_id,
        owner_id: device.owner_id,
        device_internal_id: device.internal_id,
        count: pax.count,
    })
}

fn drop_frame(domain_id: i64, kind: EventKind, rejection: &FrameRejection) {
    debug!(
        domain_id,
        kind = kind.as_str(),
        reason = rejection.reason(),
        detail = %rejection,
        "dropping frame"
    );
    metrics::inc_frames_dropped(rejection.reason());
}

fn report_error(err: &PipelineError) {
    match err {
        PipelineError::MalformedTopic(_) => {
            warn!(error = %err, "failed to parse MQTT topic, skipping message");
            metrics::inc_frames_dropped(metrics::REASON_MALFORMED_TOPIC);
        }
        PipelineError::DeviceNotFound(domain_id) => {
            warn!(domain_id, "no device registered for domain, dropping frame");
            metrics::inc_lookup_misses();
        }
        PipelineError::InvalidDevice { domain_id, reason } => {
            error!(domain_id, reason = %reason, "device record failed validation");
            metrics::inc_pipeline_errors(ErrorCause::InvalidDevice);
        }
        PipelineError::Resolver(source) => {
            error!(error = %source, "device lookup failed");
            metrics::inc_pipeline_errors(ErrorCause::Resolver);
        }
        PipelineError::Dispatch { kind, source } => {
            error!(kind = *kind, error = %source, "failed to dispatch event");
            metrics::inc_dispatch_failures(*kind);
        }
        PipelineError::BoundaryTimeout { .. } => {
            error!(error = %err, "boundary call timed out, dropping frame");
            metrics::inc_pipeline_errors(ErrorCause::Timeout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{sale_plaintext, seal_frame};
    use chrono::TimeZone;
    use crate::metrics::testing::CounterSnapshot;
    use common::domain::{MockDeviceKeyResolver, MockDispatchSink};
    use metrics_util::debugging::DebuggingRecorder;

    const PASSKEY: &[u8] = &[1, 2, 3];

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn test_device(domain_id: i64) -> DeviceRecord {
        DeviceRecord {
            domain_id,
            internal_id: "embedded-1".to_string(),
            owner_id: "owner-1".to_string(),
            passkey: PASSKEY.to_vec(),
            status: None,
            status_at: None,
        }
    }

    fn sale_frame(timestamp: i64) -> Vec<u8> {
        seal_frame(&sale_plaintext(0xA0, 200, 5, timestamp as u32), PASSKEY).unwrap()
    }

    fn pax_frame(timestamp: i64, count: u16) -> Vec<u8> {
        let mut body = vec![0xB0; 8];
        body.extend_from_slice(&(timestamp as u32).to_be_bytes());
        body.extend_from_slice(&count.to_be_bytes());
        seal_frame(&body, PASSKEY).unwrap()
    }

    fn resolver_returning(device: Option<DeviceRecord>) -> MockDeviceKeyResolver {
        let mut resolver = MockDeviceKeyResolver::new();
        resolver
            .expect_resolve()
            .times(1)
            .returning(move |_| Ok(device.clone()));
        resolver
    }

    fn pipeline(resolver: MockDeviceKeyResolver, sink: MockDispatchSink) -> TelemetryPipeline {
        TelemetryPipeline::new(Arc::new(resolver), Arc::new(sink), DEFAULT_BOUNDARY_TIMEOUT)
    }

    #[tokio::test]
    async fn test_sale_frame_dispatched() {
        // Arrange
        let resolver = resolver_returning(Some(test_device(42)));
        let mut sink = MockDispatchSink::new();
        sink.expect_record_sale()
            .withf(
                |owner_id: &str,
                 device_internal_id: &str,
                 item_number: &u16,
                 item_price: &ScaledAmount,
                 channel: &str| {
                    owner_id == "owner-1"
                        && device_internal_id == "embedded-1"
                        && *item_number == 5
                        && item_price.to_string() == "2.00"
                        && channel == "cash"
                },
            )
            .times(1)
            .returning(|_, _, _, _, _| Ok(()));
        let pipeline = pipeline(resolver, sink);

        // Act
        let result = pipeline
            .process_message("/domain/42/sale", &sale_frame(now().timestamp()), now())
            .await;

        // Assert
        let event = result.unwrap().unwrap();
        assert_eq!(event.kind(), "sale");
        assert_eq!(event.domain_id(), 42);
    }

    #[tokio::test]
    async fn test_pax_count_dispatched() {
        // Arrange
        let resolver = resolver_returning(Some(test_device(7)));
        let mut sink = MockDispatchSink::new();
        sink.expect_record_pax_count()
            .withf(|owner_id: &str, device_internal_id: &str, count: &u16| {
                owner_id == "owner-1" && device_internal_id == "embedded-1" && *count == 12
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        let pipeline = pipeline(resolver, sink);

        // Act
        let result = pipeline
            .process_message(
                "/domain/7/paxcounter",
                &pax_frame(now().timestamp() - 5, 12),
                now(),
            )
            .await;

        // Assert
        assert!(matches!(
            result,
            Ok(Some(DecodedEvent::PaxCount(PaxCountEvent { count: 12, .. })))
        ));
    }

    #[tokio::test]
    async fn test_status_skips_resolver() {
        // Arrange
        let mut resolver = MockDeviceKeyResolver::new();
        resolver.expect_resolve().times(0);
        let mut sink = MockDispatchSink::new();
        sink.expect_record_status()
            .withf(|domain_id: &i64, status: &str, observed_at: &DateTime<Utc>| {
                *domain_id == 9 && status == "online" && *observed_at == now()
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        let pipeline = pipeline(resolver, sink);

        // Act
        let result = pipeline
            .process_message("/domain/9/status", b"online", now())
            .await;

        // Assert
        assert!(matches!(result, Ok(Some(DecodedEvent::Status(_)))));
    }

    #[tokio::test]
    async fn test_stale_frame_dropped_without_dispatch() {
        // Arrange
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let _guard = ::metrics::set_default_local_recorder(&recorder);

        let resolver = resolver_returning(Some(test_device(42)));
        let mut sink = MockDispatchSink::new();
        sink.expect_record_sale().times(0);
        let pipeline = pipeline(resolver, sink);

        // Act
        let result = pipeline
            .process_message(
                "/domain/42/sale",
                &sale_frame(now().timestamp() - 100),
                now(),
            )
            .await;

        // Assert
        assert!(matches!(result, Ok(None)));
        let counters = CounterSnapshot::take(&snapshotter);
        assert_eq!(
            counters.get(metrics::FRAMES_DROPPED, Some(("reason", "stale_timestamp"))),
            1
        );
        assert_eq!(counters.get(metrics::EVENTS_DISPATCHED, None), 0);
    }

    #[tokio::test]
    async fn test_corrupted_frame_dropped() {
        // Arrange
        let resolver = resolver_returning(Some(test_device(42)));
        let mut sink = MockDispatchSink::new();
        sink.expect_record_sale().times(0);
        let pipeline = pipeline(resolver, sink);
        let mut frame = sale_frame(now().timestamp());
        frame[4] ^= 0x01;

        // Act
        let result = pipeline
            .process_message("/domain/42/sale", &frame, now())
            .await;

        // Assert
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn test_lookup_miss_reported() {
        // Arrange
        let resolver = resolver_returning(None);
        let mut sink = MockDispatchSink::new();
        sink.expect_record_sale().times(0);
        let pipeline = pipeline(resolver, sink);

        // Act
        let result = pipeline
            .process_message("/domain/42/sale", &sale_frame(now().timestamp()), now())
            .await;

        // Assert
        assert!(matches!(result, Err(PipelineError::DeviceNotFound(42))));
    }

    #[tokio::test]
    async fn test_malformed_topic_never_touches_boundaries() {
        // Arrange
        let mut resolver = MockDeviceKeyResolver::new();
        resolver.expect_resolve().times(0);
        let sink = MockDispatchSink::new();
        let pipeline = pipeline(resolver, sink);

        // Act
        let result = pipeline
            .process_message("/domain/42/status/extra", b"online", now())
            .await;

        // Assert
        assert!(matches!(result, Err(PipelineError::MalformedTopic(_))));
    }

    #[tokio::test]
    async fn test_invalid_device_record_rejected() {
        // Arrange
        let mut device = test_device(42);
        device.passkey.clear();
        let resolver = resolver_returning(Some(device));
        let mut sink = MockDispatchSink::new();
        sink.expect_record_sale().times(0);
        let pipeline = pipeline(resolver, sink);

        // Act
        let result = pipeline
            .process_message("/domain/42/sale", &sale_frame(now().timestamp()), now())
            .await;

        // Assert
        assert!(matches!(
            result,
            Err(PipelineError::InvalidDevice { domain_id: 42, .. })
        ));
    }

    #[tokio::test]
    async fn test_resolver_failure_reported() {
        // Arrange
        let mut resolver = MockDeviceKeyResolver::new();
        resolver
            .expect_resolve()
            .times(1)
            .returning(|_| Err(DomainError::RepositoryError(anyhow::anyhow!("pool exhausted"))));
        let pipeline = pipeline(resolver, MockDispatchSink::new());

        // Act
        let result = pipeline
            .process_message("/domain/42/sale", &sale_frame(now().timestamp()), now())
            .await;

        // Assert
        assert!(matches!(result, Err(PipelineError::Resolver(_))));
    }

    #[tokio::test]
    async fn test_sink_failure_counted() {
        // Arrange
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let _guard = ::metrics::set_default_local_recorder(&recorder);

        let resolver = resolver_returning(Some(test_device(42)));
        let mut sink = MockDispatchSink::new();
        sink.expect_record_sale()
            .times(1)
            .returning(|_, _, _, _, _| {
                Err(DomainError::RepositoryError(anyhow::anyhow!("insert failed")))
            });
        let pipeline = pipeline(resolver, sink);

        // Act
        pipeline
            .handle_message("/domain/42/sale", &sale_frame(now().timestamp()), now())
            .await;

        // Assert
        let counters = CounterSnapshot::take(&snapshotter);
        assert_eq!(
            counters.get(metrics::DISPATCH_FAILURES, Some(("kind", "sale"))),
            1
        );
        assert_eq!(counters.get(metrics::FRAMES_RECEIVED, Some(("kind", "sale"))), 1);
        assert_eq!(counters.get(metrics::EVENTS_DISPATCHED, None), 0);
    }

    #[tokio::test]
    async fn test_status_for_unregistered_domain_is_lookup_miss() {
        // Arrange
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        let _guard = ::metrics::set_default_local_recorder(&recorder);

        let mut resolver = MockDeviceKeyResolver::new();
        resolver.expect_resolve().times(0);
        let mut sink = MockDispatchSink::new();
        sink.expect_record_status()
            .times(2)
            .returning(|domain_id, _, _| Err(DomainError::DeviceNotFound(domain_id)));
        let pipeline = pipeline(resolver, sink);

        // Act
        let result = pipeline
            .process_message("/domain/77/status", b"online", now())
            .await;
        pipeline
            .handle_message("/domain/77/status", b"online", now())
            .await;

        // Assert
        assert!(matches!(result, Err(PipelineError::DeviceNotFound(77))));
        let counters = CounterSnapshot::take(&snapshotter);
        assert_eq!(counters.get(metrics::LOOKUP_MISSES, None), 1);
        assert_eq!(counters.get(metrics::DISPATCH_FAILURES, None), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_sink_times_out() {
        // Arrange
        struct SlowSink;

        #[async_trait::async_trait]
        impl DispatchSink for SlowSink {
            async fn record_status(
                &self,
                _domain_id: i64,
                _status: &str,
                _observed_at: DateTime<Utc>,
            ) -> common::domain::DomainResult<()> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }

            async fn record_sale(
                &self,
                _owner_id: &str,
                _device_internal_id: &str,
                _item_number: u16,
                _item_price: ScaledAmount,
                _channel: &str,
            ) -> common::domain::DomainResult<()> {
                Ok(())
            }

            async fn record_pax_count(
                &self,
                _owner_id: &str,
                _device_internal_id: &str,
                _count: u16,
            ) -> common::domain::DomainResult<()> {
                Ok(())
            }
        }

        let pipeline = TelemetryPipeline::new(
            Arc::new(MockDeviceKeyResolver::new()),
            Arc::new(SlowSink),
            Duration::from_millis(50),
        );

        // Act
        let result = pipeline
            .process_message("/domain/3/status", b"offline", now())
            .await;

        // Assert
        assert!(matches!(
            result,
            Err(PipelineError::BoundaryTimeout {
                operation: "record_status",
                timeout_ms: 50
            })
        ));
    }
}
