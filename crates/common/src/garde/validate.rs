//! Garde validation of records handed over by external collaborators.

use crate::domain::DomainError;
use garde::{Report, Validate};

/// Validate a value, mapping the garde report onto `DomainError::ValidationError`
pub fn validate_struct<T>(value: &T) -> Result<(), DomainError>
where
    T: Validate,
    T::Context: Default,
{
    value
        .validate()
        .map_err(|report| DomainError::ValidationError(describe_report(&report)))
}

/// One `path: message` entry per violation, comma separated
fn describe_report(report: &Report) -> String {
    report
        .iter()
        .map(|(path, error)| {
            let path = path.to_string();
            if path.is_empty() {
                error.message().to_string()
            } else {
                format!("{}: {}", path, error.message())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct Credentials {
        #[garde(length(min = 1))]
        passkey: Vec<u8>,
        #[garde(length(min = 1))]
        owner_id: String,
    }

    #[test]
    fn test_valid_value_passes() {
        let value = Credentials {
            passkey: vec![1, 2, 3],
            owner_id: "owner".to_string(),
        };
        assert!(validate_struct(&value).is_ok());
    }

    #[test]
    fn test_every_violation_is_reported() {
        let value = Credentials {
            passkey: Vec::new(),
            owner_id: String::new(),
        };

        match validate_struct(&value) {
            Err(DomainError::ValidationError(msg)) => {
                assert!(msg.contains("passkey"));
                assert!(msg.contains("owner_id"));
            }
            other => panic!("expected ValidationError, got {:?}", other),
        }
    }
}
