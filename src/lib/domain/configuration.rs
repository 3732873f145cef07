//! Stored application settings

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

#[cfg(test)]
use mockall::mock;

/// Sender address and login name
pub const SMTP_EMAIL_KEY: &str = "smtp_email";

/// Login secret
pub const SMTP_PASSWORD_KEY: &str = "smtp_password";

/// SMTP host
pub const SMTP_SERVER_KEY: &str = "smtp_server";

/// SMTP port
pub const SMTP_PORT_KEY: &str = "smtp_port";

/// Pacing delay between messages, in seconds
pub const DEFAULT_DELAY_KEY: &str = "default_delay";

/// Pacing delay used when none is stored
pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);

/// Errors reading or writing a stored setting
#[derive(Debug, Error)]
pub enum ConfigValueError {
    /// Unknown error
    #[error(transparent)]
    UnknownError(#[from] anyhow::Error),
}

/// Key/value settings store
#[async_trait]
pub trait ConfigRepository: Clone + Send + Sync + 'static {
    /// The stored value for `key`, if any
    async fn get_config_value(&self, key: &str) -> Result<Option<String>, ConfigValueError>;

    /// Stores `value` under `key`, replacing any previous value
    async fn set_config_value(&self, key: &str, value: &str) -> Result<(), ConfigValueError>;
}

#[cfg(test)]
mock! {
    pub ConfigRepository {}

    impl Clone for ConfigRepository {
        fn clone(&self) -> Self;
    }

    #[async_trait]
    impl ConfigRepository for ConfigRepository {
        async fn get_config_value(&self, key: &str) -> Result<Option<String>, ConfigValueError>;
        async fn set_config_value(&self, key: &str, value: &str) -> Result<(), ConfigValueError>;
    }
}

/// The stored value for `key`, or `default` when it is absent or unreadable
pub async fn config_value_or<R: ConfigRepository>(repo: &R, key: &str, default: &str) -> String {
    match repo.get_config_value(key).await {
        Ok(Some(value)) => value,
        Ok(None) => default.to_string(),
        Err(err) => {
            warn!(key, %err, "could not read stored setting, using default");

            default.to_string()
        }
    }
}

/// A pacing delay from seconds; `None` when negative, not a number or out of range
pub fn delay_from_secs(seconds: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(seconds).ok()
}

/// The stored pacing delay. Unparseable, negative or out-of-range values fall back to [`DEFAULT_DELAY`].
pub async fn default_delay<R: ConfigRepository>(repo: &R) -> Duration {
    let raw = config_value_or(repo, DEFAULT_DELAY_KEY, "2").await;

    match raw.trim().parse::<f64>().ok().and_then(delay_from_secs) {
        Some(delay) => delay,
        None => {
            warn!(value = %raw, "ignoring invalid stored delay");

            DEFAULT_DELAY
        }
    }
}
