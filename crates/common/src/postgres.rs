mod client;
mod config;
mod device_key_resolver;
mod dispatch_sink;

pub use client::*;
pub use config::*;
pub use device_key_resolver::*;
pub use dispatch_sink::*;
