use crate::domain::{sale_plaintext, seal_frame};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rumqttc::{AsyncClient, QoS};
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const DEMO_MARKER: u8 = 0xA0;

/// Publishes raw frames to the broker
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FramePublisher: Send + Sync {
    async fn publish(&self, topic: String, payload: Vec<u8>) -> Result<()>;
}

/// FramePublisher backed by a client whose event loop is driven elsewhere
pub struct MqttFramePublisher {
    client: AsyncClient,
}

impl MqttFramePublisher {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FramePublisher for MqttFramePublisher {
    async fn publish(&self, topic: String, payload: Vec<u8>) -> Result<()> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .context("failed to queue MQTT publish")
    }
}

/// Configuration for the demo sale publisher
#[derive(Clone)]
pub struct DemoPublisherConfig {
    pub domain_id: i64,
    pub passkey: Vec<u8>,
    pub interval_ms: u64,
}

impl std::fmt::Debug for DemoPublisherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DemoPublisherConfig")
            .field("domain_id", &self.domain_id)
            .field("passkey_len", &self.passkey.len())
            .field("interval_ms", &self.interval_ms)
            .finish()
    }
}

/// Sale values for the `counter`-th demo frame
fn demo_sale(counter: u32) -> (u32, u16) {
    let item_price_units = 100 + (counter % 20) * 25;
    let item_number = (counter % 9) as u16 + 1;
    (item_price_units, item_number)
}

/// Publish a sealed sale frame for the demo device at regular intervals until cancelled
pub async fn run_demo_publisher(
    publisher: Arc<dyn FramePublisher>,
    config: DemoPublisherConfig,
    ctx: CancellationToken,
) -> Result<()> {
    info!(
        domain_id = config.domain_id,
        interval_ms = config.interval_ms,
        "starting demo sale publisher"
    );

    let topic = format!("/domain/{}/sale", config.domain_id);
    let mut ticker = interval(Duration::from_millis(config.interval_ms.max(1)));
    let mut counter: u32 = 0;

    loop {
        tokio::select! {
            _ = ctx.cancelled() => {
                debug!("demo publisher stopped");
                return Ok(());
            }
            _ = ticker.tick() => {}
        }

        let (item_price_units, item_number) = demo_sale(counter);
        let timestamp = u32::try_from(Utc::now().timestamp()).context("clock out of range")?;
        let frame = seal_frame(
            &sale_plaintext(DEMO_MARKER, item_price_units, item_number, timestamp),
            &config.passkey,
        )
        .context("demo passkey does not fit a sale frame")?;

        publisher.publish(topic.clone(), frame).await?;

        debug!(
            topic = %topic,
            item_number,
            item_price_units,
            counter,
            "published demo sale frame"
        );

        counter = counter.wrapping_add(1);
    }
}
