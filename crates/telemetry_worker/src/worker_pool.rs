use crate::domain::TelemetryPipeline;
use crate::metrics::{self, ErrorCause};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

/// A frame as delivered by the transport, waiting for a worker
#[derive(Debug)]
pub struct InboundFrame {
    pub topic: String,
    pub payload: Bytes,
    pub received_at: DateTime<Utc>,
    /// Root span of this message's trace
    pub span: Span,
}

impl InboundFrame {
    /// Creates a new independent trace for the message
    pub fn new(topic: impl Into<String>, payload: Bytes, received_at: DateTime<Utc>) -> Self {
        let topic = topic.into();
        let span = info_span!(
            parent: Span::none(),
            "mqtt_message",
            topic = %topic,
            payload_size = payload.len(),
        );

        Self {
            topic,
            payload,
            received_at,
            span,
        }
    }
}

/// Producer side of the bounded frame queue; never blocks the caller
#[derive(Clone)]
pub struct FrameQueue {
    sender: mpsc::Sender<InboundFrame>,
}

impl FrameQueue {
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<InboundFrame>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Enqueue a frame; returns false when it was dropped
    pub fn offer(&self, frame: InboundFrame) -> bool {
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(frame)) => {
                debug!(topic = %frame.topic, "frame queue full, dropping frame");
                metrics::inc_frames_dropped(metrics::REASON_QUEUE_FULL);
                false
            }
            Err(mpsc::error::TrySendError::Closed(frame)) => {
                warn!(topic = %frame.topic, "frame queue closed, dropping frame");
                false
            }
        }
    }
}

/// Fixed-size pool of workers draining the frame queue through the pipeline
pub struct WorkerPool {
    receiver: Arc<Mutex<mpsc::Receiver<InboundFrame>>>,
    pipeline: Arc<TelemetryPipeline>,
    worker_count: usize,
}

impl WorkerPool {
    pub fn new(
        receiver: mpsc::Receiver<InboundFrame>,
        pipeline: Arc<TelemetryPipeline>,
        worker_count: usize,
    ) -> Self {
        Self {
            receiver: Arc::new(Mutex::new(receiver)),
            pipeline,
            worker_count: worker_count.max(1),
        }
    }

    /// Run until cancelled or until every queue producer is dropped
    pub async fn run(self, ctx: CancellationToken) -> anyhow::Result<()> {
        info!(worker_count = self.worker_count, "starting frame workers");

        let mut workers = JoinSet::new();
        for worker_id in 0..self.worker_count {
            workers.spawn(run_worker(
                worker_id,
                Arc::clone(&self.receiver),
                Arc::clone(&self.pipeline),
                ctx.clone(),
            ));
        }

        while let Some(result) = workers.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "frame worker task failed");
            }
        }

        info!("frame workers stopped");
        Ok(())
    }
}

async fn run_worker(
    worker_id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<InboundFrame>>>,
    pipeline: Arc<TelemetryPipeline>,
    ctx: CancellationToken,
) {
    loop {
        let next = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                _ = ctx.cancelled() => None,
                frame = receiver.recv() => frame,
            }
        };

        let Some(frame) = next else {
            debug!(worker_id, "frame worker exiting");
            return;
        };

        process_frame(&pipeline, frame).await;
    }
}

/// Run one frame through the pipeline; a panic is logged and counted, never propagated
async fn process_frame(pipeline: &TelemetryPipeline, frame: InboundFrame) {
    let span = frame.span.clone();
    let outcome = AssertUnwindSafe(
        pipeline
            .handle_message(&frame.topic, &frame.payload, frame.received_at)
            .instrument(span.clone()),
    )
    .catch_unwind()
    .await;

    if let Err(panic) = outcome {
        metrics::inc_pipeline_errors(ErrorCause::Panic);
        let _entered = span.enter();
        error!(panic = %panic_message(&*panic), "frame processing panicked, dropping frame");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else {
        "non-string panic payload".to_string()
    }
}
