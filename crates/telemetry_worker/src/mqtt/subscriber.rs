use crate::mqtt::parse_broker_url;
use crate::worker_pool::{FrameQueue, InboundFrame};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, Publish, QoS};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Connection settings for the device-facing MQTT broker
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_url: String,
    pub client_id: String,
    pub keep_alive_secs: u64,
    pub event_capacity: usize,
    pub subscribe_topics: Vec<String>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_url: "mqtt://localhost:1883".to_string(),
            client_id: "vmflow-telemetry".to_string(),
            keep_alive_secs: 60,
            event_capacity: 100,
            subscribe_topics: vec!["/domain/+/#".to_string()],
        }
    }
}

/// Create the MQTT client and its event loop; nothing is sent until the loop is polled
pub fn connect_mqtt(config: &MqttConfig) -> Result<(AsyncClient, EventLoop)> {
    let (host, port) = parse_broker_url(&config.broker_url)?;

    let mut mqtt_options = MqttOptions::new(&config.client_id, host, port);
    mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    mqtt_options.set_clean_session(true);

    Ok(AsyncClient::new(mqtt_options, config.event_capacity))
}

/// Run the MQTT subscriber process
///
/// Subscribes to the configured topic filters and hands every publish to the
/// frame queue. Returns an error when the broker connection fails; there is
/// no reconnect.
#[instrument(
    name = "mqtt_subscriber",
    skip_all,
    fields(broker_url = %config.broker_url, client_id = %config.client_id)
)]
pub async fn run_mqtt_subscriber(
    config: MqttConfig,
    client: AsyncClient,
    mut eventloop: EventLoop,
    queue: FrameQueue,
    ctx: CancellationToken,
) -> Result<()> {
    for topic in &config.subscribe_topics {
        client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .with_context(|| format!("failed to subscribe to {}", topic))?;
        info!(topic = %topic, "subscribed to MQTT topic");
    }

    loop {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                debug!("shutdown signal received");
                let _ = client.disconnect().await;
                return Ok(());
            }
            event = eventloop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        enqueue_publish(&queue, publish);
                    }
                    Ok(Event::Incoming(Packet::SubAck(_))) => {
                        debug!("subscription acknowledged");
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("connected to MQTT broker");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        return Err(anyhow!("MQTT event loop error: {}", e));
                    }
                }
            }
        }
    }
}

fn enqueue_publish(queue: &FrameQueue, publish: Publish) {
    let frame = InboundFrame::new(publish.topic, publish.payload, Utc::now());
    frame.span.in_scope(|| debug!("frame received"));
    queue.offer(frame);
}
