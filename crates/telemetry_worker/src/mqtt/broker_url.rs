use common::domain::{DomainError, DomainResult};

const DEFAULT_MQTT_PORT: u16 = 1883;

/// Parse broker URL in format mqtt://host:port, tcp://host:port or host[:port]
pub fn parse_broker_url(url: &str) -> DomainResult<(&str, u16)> {
    let address = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let (host, port) = match address.split_once(':') {
        None => (address, DEFAULT_MQTT_PORT),
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| {
                DomainError::ValidationError(format!("Invalid port in broker URL: {}", port))
            })?;
            (host, port)
        }
    };

    if host.is_empty() {
        return Err(DomainError::ValidationError(format!(
            "Missing host in broker URL: {}",
            url
        )));
    }

    Ok((host, port))
}
