pub mod domain;
pub mod metrics;
pub mod mqtt;
pub mod telemetry_worker;
pub mod worker_pool;

pub use domain::*;
pub use telemetry_worker::*;
pub use worker_pool::*;
