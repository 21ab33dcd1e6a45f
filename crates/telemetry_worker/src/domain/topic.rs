use crate::domain::PipelineError;
use std::fmt;
use std::str::FromStr;

/// Kind of event a device publishes, taken from the last topic segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Status,
    Sale,
    PaxCounter,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Status => "status",
            EventKind::Sale => "sale",
            EventKind::PaxCounter => "paxcounter",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "status" => Ok(EventKind::Status),
            "sale" => Ok(EventKind::Sale),
            "paxcounter" => Ok(EventKind::PaxCounter),
            other => Err(PipelineError::MalformedTopic(format!(
                "unknown event kind '{}'",
                other
            ))),
        }
    }
}

/// Parsed MQTT topic containing the device domain id and event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedTopic {
    pub domain_id: i64,
    pub kind: EventKind,
}

/// Parse an MQTT topic in the format `/domain/{domain_id}/{kind}`
///
/// The whole topic must match; suffix segments are rejected.
///
/// # Examples
/// ```
/// use telemetry_worker::domain::{parse_topic, EventKind};
///
/// let parsed = parse_topic("/domain/42/sale").unwrap();
/// assert_eq!(parsed.domain_id, 42);
/// assert_eq!(parsed.kind, EventKind::Sale);
/// assert!(parse_topic("/domain/42/sale/extra").is_err());
/// ```
pub fn parse_topic(topic: &str) -> Result<ParsedTopic, PipelineError> {
    let parts: Vec<&str> = topic.split('/').collect();

    // Leading '/' yields an empty first segment
    let ["", "domain", domain_id, kind] = parts.as_slice() else {
        return Err(PipelineError::MalformedTopic(format!(
            "invalid topic format '{}': expected '/domain/{{domain_id}}/{{kind}}'",
            topic
        )));
    };

    if domain_id.is_empty() || !domain_id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PipelineError::MalformedTopic(format!(
            "domain id '{}' is not numeric",
            domain_id
        )));
    }

    let domain_id = domain_id.parse::<i64>().map_err(|_| {
        PipelineError::MalformedTopic(format!("domain id '{}' is out of range", domain_id))
    })?;
    let kind = kind.parse::<EventKind>()?;

    Ok(ParsedTopic { domain_id, kind })
}
