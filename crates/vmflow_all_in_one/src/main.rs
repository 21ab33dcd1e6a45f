mod config;

use common::postgres::{
    PostgresClient, PostgresConfig, PostgresDeviceKeyResolver, PostgresDispatchSink,
};
use common::telemetry::{
    init_telemetry, install_prometheus_exporter, parse_metrics_listen_addr, shutdown_telemetry,
    TelemetryConfig, TelemetryProviders,
};
use config::ServiceConfig;
use std::sync::Arc;
use std::time::Duration;
use telemetry_worker::mqtt::{DemoPublisherConfig, MqttConfig};
use telemetry_worker::telemetry_worker::{TelemetryWorker, TelemetryWorkerConfig};
use tracing::{debug, error, info};
use vmflow_runner::Runner;

#[tokio::main]
async fn main() {
    // Initialize configuration and tracing
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize telemetry (tracing + OpenTelemetry for traces and logs)
    let telemetry_providers: Option<TelemetryProviders> = match init_telemetry(&TelemetryConfig {
        service_name: config.otel_service_name.clone(),
        otel_endpoint: config.otel_endpoint.clone(),
        otel_enabled: config.otel_enabled,
        log_level: config.log_level.clone(),
    }) {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        otel_enabled = config.otel_enabled,
        otel_endpoint = %config.otel_endpoint,
        "Starting vmflow-all-in-one service"
    );
    debug!("Configuration: {:?}", config);

    if let Err(e) = start_metrics_exporter(&config) {
        error!("Failed to start metrics exporter: {:#}", e);
        std::process::exit(1);
    }

    let postgres_client = match initialize_postgres(&config).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to initialize PostgreSQL: {:#}", e);
            std::process::exit(1);
        }
    };

    let telemetry_worker = match TelemetryWorker::new(
        Arc::new(PostgresDeviceKeyResolver::new(postgres_client.clone())),
        Arc::new(PostgresDispatchSink::new(postgres_client)),
        build_worker_config(&config),
    ) {
        Ok(worker) => worker,
        Err(e) => {
            error!("Failed to initialize telemetry worker: {:#}", e);
            std::process::exit(1);
        }
    };

    // Build runner with all processes
    let mut runner = Runner::new();

    for (name, process) in telemetry_worker.into_runner_processes() {
        runner = runner.with_named_process(name, process);
    }

    // Add cleanup handlers
    runner = runner
        .with_closer(move || {
            Box::pin(async move {
                info!("Running cleanup tasks...");

                // Shutdown telemetry and flush pending traces and logs
                shutdown_telemetry(telemetry_providers);

                info!("Cleanup complete");
                Ok(())
            })
        })
        .with_closer_timeout(Duration::from_secs(10));

    // Run the service
    runner.run().await;
}

fn start_metrics_exporter(config: &ServiceConfig) -> anyhow::Result<()> {
    match parse_metrics_listen_addr(&config.metrics_listen_addr)? {
        Some(addr) => install_prometheus_exporter(addr)?,
        None => debug!("metrics exporter disabled"),
    }
    Ok(())
}

async fn initialize_postgres(config: &ServiceConfig) -> anyhow::Result<PostgresClient> {
    info!("Initializing PostgreSQL...");
    let client = PostgresClient::new(&PostgresConfig {
        host: config.postgres_host.clone(),
        port: config.postgres_port,
        database: config.postgres_database.clone(),
        username: config.postgres_username.clone(),
        password: config.postgres_password.clone(),
        max_pool_size: config.postgres_max_pool_size,
    })?;

    tokio::time::timeout(
        Duration::from_secs(config.startup_timeout_secs),
        client.ping(),
    )
    .await
    .map_err(|_| {
        anyhow::anyhow!(
            "PostgreSQL not reachable within {}s",
            config.startup_timeout_secs
        )
    })??;

    Ok(client)
}

fn build_worker_config(config: &ServiceConfig) -> TelemetryWorkerConfig {
    let demo = config.demo_enabled.then(|| DemoPublisherConfig {
        domain_id: config.demo_domain_id,
        passkey: config.demo_passkey.as_bytes().to_vec(),
        interval_ms: config.demo_interval_ms,
    });

    TelemetryWorkerConfig {
        mqtt: MqttConfig {
            broker_url: config.mqtt_broker_url.clone(),
            client_id: config.mqtt_client_id.clone(),
            keep_alive_secs: config.mqtt_keep_alive_secs,
            event_capacity: config.mqtt_event_capacity,
            subscribe_topics: config.subscribe_topics(),
        },
        frame_queue_capacity: config.frame_queue_capacity,
        worker_count: config.worker_count,
        boundary_timeout: Duration::from_millis(config.boundary_timeout_ms),
        demo,
    }
}
