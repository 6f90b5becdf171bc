use super::models::Config;
use thiserror::Error;

/// Upper bound on fetch attempts per file
pub const MAX_FETCH_ATTEMPTS: u32 = 3;

/// Upper bound on any hour-based window (ten years)
pub const MAX_WINDOW_HOURS: u64 = 24 * 365 * 10;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("archive_prefix must be a non-empty alphanumeric string, got '{0}'")]
    InvalidArchivePrefix(String),

    #[error("{field} must be positive")]
    NotPositive { field: &'static str },

    #[error("max_payload_bytes must be positive")]
    InvalidPayloadLimit,

    #[error("{field} must be at most {max}, got {value}")]
    TooLarge {
        field: &'static str,
        value: u64,
        max: u64,
    },

    #[error("record_retention_hours ({retention}) must not be shorter than ttl_hours ({ttl})")]
    RetentionShorterThanTtl { retention: u64, ttl: u64 },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_storage(config)?;
    validate_fetch(config)?;
    validate_cleanup(config)?;
    validate_dispatch(config)?;

    if config.server.max_payload_bytes.as_u64() == 0 {
        return Err(ValidationError::InvalidPayloadLimit);
    }

    Ok(())
}

/// The prefix is matched against file names during sweeps, so keep it to a plain token
fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    let prefix = &config.storage.archive_prefix;
    if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidArchivePrefix(prefix.clone()));
    }
    Ok(())
}

fn validate_fetch(config: &Config) -> Result<(), ValidationError> {
    if config.fetch.max_attempts == 0 {
        return Err(ValidationError::NotPositive {
            field: "fetch.max_attempts",
        });
    }
    if config.fetch.max_attempts > MAX_FETCH_ATTEMPTS {
        return Err(ValidationError::TooLarge {
            field: "fetch.max_attempts",
            value: config.fetch.max_attempts.into(),
            max: MAX_FETCH_ATTEMPTS.into(),
        });
    }
    if config.fetch.attempt_timeout_step_secs == 0 {
        return Err(ValidationError::NotPositive {
            field: "fetch.attempt_timeout_step_secs",
        });
    }
    if config.report.timeout_secs == 0 {
        return Err(ValidationError::NotPositive {
            field: "report.timeout_secs",
        });
    }
    Ok(())
}

fn validate_cleanup(config: &Config) -> Result<(), ValidationError> {
    if config.cleanup.ttl_hours == 0 {
        return Err(ValidationError::NotPositive {
            field: "cleanup.ttl_hours",
        });
    }
    if config.cleanup.record_retention_hours > MAX_WINDOW_HOURS {
        return Err(ValidationError::TooLarge {
            field: "cleanup.record_retention_hours",
            value: config.cleanup.record_retention_hours,
            max: MAX_WINDOW_HOURS,
        });
    }
    if config.cleanup.interval_secs == 0 {
        return Err(ValidationError::NotPositive {
            field: "cleanup.interval_secs",
        });
    }
    // a record pruned before its archive expires can never be reported
    if config.cleanup.record_retention_hours < config.cleanup.ttl_hours {
        return Err(ValidationError::RetentionShorterThanTtl {
            retention: config.cleanup.record_retention_hours,
            ttl: config.cleanup.ttl_hours,
        });
    }
    Ok(())
}

fn validate_dispatch(config: &Config) -> Result<(), ValidationError> {
    if config.dispatch.max_concurrent_jobs == 0 {
        return Err(ValidationError::NotPositive {
            field: "dispatch.max_concurrent_jobs",
        });
    }
    if config.dispatch.queue_capacity == 0 {
        return Err(ValidationError::NotPositive {
            field: "dispatch.queue_capacity",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::ByteSize;

    #[test]
    fn test_valid_config() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_ttl() {
        let mut config = Config::default();
        config.cleanup.ttl_hours = 0;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::NotPositive {
                field: "cleanup.ttl_hours"
            })
        ));
    }

    #[test]
    fn test_retention_shorter_than_ttl() {
        let mut config = Config::default();
        config.cleanup.ttl_hours = 48;
        config.cleanup.record_retention_hours = 24;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::RetentionShorterThanTtl {
                retention: 24,
                ttl: 48
            })
        ));
    }

    #[test]
    fn test_zero_attempts() {
        let mut config = Config::default();
        config.fetch.max_attempts = 0;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::NotPositive { .. })
        ));
    }

    #[test]
    fn test_attempts_capped() {
        let mut config = Config::default();
        config.fetch.max_attempts = 4;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::TooLarge {
                field: "fetch.max_attempts",
                value: 4,
                max: 3
            })
        ));
    }

    #[test]
    fn test_window_hours_bounded() {
        let mut config = Config::default();
        config.cleanup.ttl_hours = u64::MAX / 2;
        config.cleanup.record_retention_hours = u64::MAX;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::TooLarge {
                field: "cleanup.record_retention_hours",
                ..
            })
        ));
    }

    #[test]
    fn test_zero_concurrency() {
        let mut config = Config::default();
        config.dispatch.max_concurrent_jobs = 0;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::NotPositive {
                field: "dispatch.max_concurrent_jobs"
            })
        ));
    }

    #[test]
    fn test_bad_prefix() {
        let mut config = Config::default();
        config.storage.archive_prefix = "../hb".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidArchivePrefix(_))
        ));

        config.storage.archive_prefix = String::new();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidArchivePrefix(_))
        ));
    }

    #[test]
    fn test_zero_payload_limit() {
        let mut config = Config::default();
        config.server.max_payload_bytes = ByteSize(0);
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidPayloadLimit)
        ));
    }
}
