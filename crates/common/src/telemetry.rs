mod config;
mod init;
mod metrics_exporter;

pub use config::*;
pub use init::*;
pub use metrics_exporter::*;
