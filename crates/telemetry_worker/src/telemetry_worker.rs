use crate::domain::TelemetryPipeline;
use crate::mqtt::{
    connect_mqtt, run_demo_publisher, run_mqtt_subscriber, DemoPublisherConfig, FramePublisher,
    MqttConfig, MqttFramePublisher,
};
use crate::worker_pool::{FrameQueue, WorkerPool};
use common::domain::{DeviceKeyResolver, DispatchSink};
use rumqttc::{AsyncClient, EventLoop};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Process handed to the application runner
pub type RunnerProcess = Box<
    dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send,
>;

#[derive(Debug, Clone)]
pub struct TelemetryWorkerConfig {
    pub mqtt: MqttConfig,
    pub frame_queue_capacity: usize,
    pub worker_count: usize,
    pub boundary_timeout: Duration,
    /// Publishes demo sale frames over the same connection when set
    pub demo: Option<DemoPublisherConfig>,
}

/// MQTT ingestion wired to the frame pipeline
pub struct TelemetryWorker {
    mqtt_config: MqttConfig,
    client: AsyncClient,
    eventloop: EventLoop,
    queue: FrameQueue,
    pool: WorkerPool,
    demo: Option<DemoPublisherConfig>,
}

impl TelemetryWorker {
    pub fn new(
        resolver: Arc<dyn DeviceKeyResolver>,
        sink: Arc<dyn DispatchSink>,
        config: TelemetryWorkerConfig,
    ) -> anyhow::Result<Self> {
        info!(
            broker_url = %config.mqtt.broker_url,
            worker_count = config.worker_count,
            frame_queue_capacity = config.frame_queue_capacity,
            "initializing telemetry worker"
        );

        let pipeline = Arc::new(TelemetryPipeline::new(
            resolver,
            sink,
            config.boundary_timeout,
        ));
        let (queue, receiver) = FrameQueue::bounded(config.frame_queue_capacity);
        let pool = WorkerPool::new(receiver, pipeline, config.worker_count);
        let (client, eventloop) = connect_mqtt(&config.mqtt)?;

        Ok(Self {
            mqtt_config: config.mqtt,
            client,
            eventloop,
            queue,
            pool,
            demo: config.demo,
        })
    }

    pub fn into_runner_processes(self) -> Vec<(&'static str, RunnerProcess)> {
        let mut processes: Vec<(&'static str, RunnerProcess)> = Vec::new();

        if let Some(demo_config) = self.demo {
            let publisher: Arc<dyn FramePublisher> =
                Arc::new(MqttFramePublisher::new(self.client.clone()));
            processes.push((
                "demo_publisher",
                Box::new(move |ctx| {
                    Box::pin(async move { run_demo_publisher(publisher, demo_config, ctx).await })
                }),
            ));
        }

        processes.push((
            "frame_workers",
            Box::new({
                let pool = self.pool;
                move |ctx| Box::pin(async move { pool.run(ctx).await })
            }),
        ));

        processes.push((
            "mqtt_subscriber",
            Box::new({
                let config = self.mqtt_config;
                let client = self.client;
                let eventloop = self.eventloop;
                let queue = self.queue;
                move |ctx| {
                    Box::pin(async move {
                        run_mqtt_subscriber(config, client, eventloop, queue, ctx).await
                    })
                }
            }),
        ));

        processes
    }
}
