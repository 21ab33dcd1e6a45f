use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // MQTT configuration
    /// Broker URL: mqtt://host:port, tcp://host:port or host[:port]
    #[serde(default = "default_mqtt_broker_url")]
    pub mqtt_broker_url: String,

    #[serde(default = "default_mqtt_client_id")]
    pub mqtt_client_id: String,

    #[serde(default = "default_mqtt_keep_alive_secs")]
    pub mqtt_keep_alive_secs: u64,

    /// Capacity of the MQTT client request channel
    #[serde(default = "default_mqtt_event_capacity")]
    pub mqtt_event_capacity: usize,

    /// Topic filters to subscribe to (comma-separated)
    #[serde(default = "default_mqtt_subscribe_topics")]
    pub mqtt_subscribe_topics: String,

    // Pipeline configuration
    /// Frames buffered between the subscriber and the workers; overflow is dropped
    #[serde(default = "default_frame_queue_capacity")]
    pub frame_queue_capacity: usize,

    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Timeout applied to every resolver and sink call
    #[serde(default = "default_boundary_timeout_ms")]
    pub boundary_timeout_ms: u64,

    // PostgreSQL configuration
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    // Metrics configuration
    /// Prometheus listen address, e.g. 0.0.0.0:9000; empty disables the exporter
    #[serde(default)]
    pub metrics_listen_addr: String,

    // OpenTelemetry configuration
    #[serde(default = "default_otel_enabled")]
    pub otel_enabled: bool,

    /// OTLP gRPC endpoint
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,

    // Demo publisher configuration
    /// Publish sealed demo sale frames for `demo_domain_id`
    #[serde(default)]
    pub demo_enabled: bool,

    #[serde(default = "default_demo_domain_id")]
    pub demo_domain_id: i64,

    /// Must match the passkey registered for the demo device
    #[serde(default)]
    pub demo_passkey: String,

    #[serde(default = "default_demo_interval_ms")]
    pub demo_interval_ms: u64,

    /// Startup timeout for initialization operations in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_mqtt_broker_url() -> String {
    "mqtt://localhost:1883".to_string()
}

fn default_mqtt_client_id() -> String {
    "vmflow-telemetry".to_string()
}

fn default_mqtt_keep_alive_secs() -> u64 {
    60
}

fn default_mqtt_event_capacity() -> usize {
    100
}

fn default_mqtt_subscribe_topics() -> String {
    "/domain/+/#".to_string()
}

fn default_frame_queue_capacity() -> usize {
    1024
}

fn default_worker_count() -> usize {
    4
}

fn default_boundary_timeout_ms() -> u64 {
    3000
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "vmflow".to_string()
}

fn default_postgres_username() -> String {
    "vmflow".to_string()
}

fn default_postgres_password() -> String {
    "vmflow".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    10
}

fn default_otel_enabled() -> bool {
    false
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "vmflow-telemetry".to_string()
}

fn default_demo_domain_id() -> i64 {
    1
}

fn default_demo_interval_ms() -> u64 {
    5000
}

fn default_startup_timeout_secs() -> u64 {
    30
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("VMFLOW"))
            .build()?
            .try_deserialize()
    }

    /// Subscribe filters with blanks removed
    pub fn subscribe_topics(&self) -> Vec<String> {
        self.mqtt_subscribe_topics
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

// Secrets stay out of the startup debug log
impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("log_level", &self.log_level)
            .field("mqtt_broker_url", &self.mqtt_broker_url)
            .field("mqtt_client_id", &self.mqtt_client_id)
            .field("mqtt_keep_alive_secs", &self.mqtt_keep_alive_secs)
            .field("mqtt_event_capacity", &self.mqtt_event_capacity)
            .field("mqtt_subscribe_topics", &self.mqtt_subscribe_topics)
            .field("frame_queue_capacity", &self.frame_queue_capacity)
            .field("worker_count", &self.worker_count)
            .field("boundary_timeout_ms", &self.boundary_timeout_ms)
            .field("postgres_host", &self.postgres_host)
            .field("postgres_port", &self.postgres_port)
            .field("postgres_database", &self.postgres_database)
            .field("postgres_username", &self.postgres_username)
            .field("postgres_max_pool_size", &self.postgres_max_pool_size)
            .field("metrics_listen_addr", &self.metrics_listen_addr)
            .field("otel_enabled", &self.otel_enabled)
            .field("otel_endpoint", &self.otel_endpoint)
            .field("otel_service_name", &self.otel_service_name)
            .field("demo_enabled", &self.demo_enabled)
            .field("demo_domain_id", &self.demo_domain_id)
            .field("demo_interval_ms", &self.demo_interval_ms)
            .field("startup_timeout_secs", &self.startup_timeout_secs)
            .finish_non_exhaustive()
    }
}
