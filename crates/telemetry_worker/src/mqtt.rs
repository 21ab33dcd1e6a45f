mod broker_url;
mod demo_publisher;
mod subscriber;

pub use broker_url::parse_broker_url;
pub use demo_publisher::*;
pub use subscriber::*;
