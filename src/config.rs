//! Feed configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::retry::RetryPolicy;
use crate::{Result, StreamError};

/// Prefix of the environment variables read by [`StreamConfig::from_env`]
pub const ENV_PREFIX: &str = "FACILITY_STREAM_";

/// Settings shared by every feed of a [`crate::FacilityStream`]
///
/// Every field has a default, so partial YAML documents are accepted:
///
/// ```rust
/// use facility_stream::StreamConfig;
///
/// let config = StreamConfig::from_yaml_str("base_url: http://gateway:8080\nbuffer_size: 50\n")?;
/// assert_eq!(config.buffer_size, 50);
/// assert_eq!(config.throttle_ms, 100);
/// # Ok::<(), facility_stream::StreamError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Gateway address the feed paths are appended to
    pub base_url: String,
    /// Most recent payloads kept per feed
    pub buffer_size: usize,
    /// Flush cadence in milliseconds
    pub throttle_ms: u64,
    /// Consecutive failures tolerated before a session closes
    pub max_retries: u32,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    /// Upper bound of the random delay added to each backoff
    pub jitter_max_ms: u64,
    /// Schedule reconnects after a failure
    pub auto_reconnect: bool,
    /// Timeout for establishing the HTTP connection
    pub connect_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            buffer_size: 100,
            throttle_ms: 100,
            max_retries: 10,
            initial_retry_delay_ms: 1000,
            max_retry_delay_ms: 30_000,
            jitter_max_ms: 1000,
            auto_reconnect: true,
            connect_timeout_ms: 10_000,
        }
    }
}

impl StreamConfig {
    /// Parse a YAML document. The result is validated.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)
            .map_err(|e| StreamError::config(format!("invalid YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| StreamError::config(format!("cannot read {}: {e}", path.display())))?;
        debug!(path = %path.display(), "Loaded stream configuration");
        Self::from_yaml_str(&yaml)
    }

    /// Defaults overlaid with `FACILITY_STREAM_*` environment variables
    ///
    /// Recognized: `BASE_URL`, `BUFFER_SIZE`, `THROTTLE_MS`, `MAX_RETRIES`,
    /// `INITIAL_RETRY_DELAY_MS`, `MAX_RETRY_DELAY_MS`, `JITTER_MAX_MS`,
    /// `AUTO_RECONNECT`, `CONNECT_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same as [`StreamConfig::from_env`] with an explicit variable lookup
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut config = Self::default();

        if let Some(base_url) = var("BASE_URL") {
            config.base_url = base_url;
        }
        overlay(&var, "BUFFER_SIZE", &mut config.buffer_size)?;
        overlay(&var, "THROTTLE_MS", &mut config.throttle_ms)?;
        overlay(&var, "MAX_RETRIES", &mut config.max_retries)?;
        overlay(&var, "INITIAL_RETRY_DELAY_MS", &mut config.initial_retry_delay_ms)?;
        overlay(&var, "MAX_RETRY_DELAY_MS", &mut config.max_retry_delay_ms)?;
        overlay(&var, "JITTER_MAX_MS", &mut config.jitter_max_ms)?;
        overlay(&var, "AUTO_RECONNECT", &mut config.auto_reconnect)?;
        overlay(&var, "CONNECT_TIMEOUT_MS", &mut config.connect_timeout_ms)?;

        config.validate()?;
        Ok(config)
    }

    /// Check the settings are usable
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(StreamError::config("base_url must not be empty"));
        }
        Url::parse(&self.base_url)
            .map_err(|e| StreamError::endpoint(self.base_url.clone(), e.to_string()))?;
        if self.throttle_ms == 0 {
            return Err(StreamError::config("throttle_ms must be greater than zero"));
        }
        if self.max_retry_delay_ms < self.initial_retry_delay_ms {
            return Err(StreamError::config(format!(
                "max_retry_delay_ms ({}) is below initial_retry_delay_ms ({})",
                self.max_retry_delay_ms, self.initial_retry_delay_ms
            )));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.initial_retry_delay_ms),
            Duration::from_millis(self.max_retry_delay_ms),
            self.max_retries,
        )
        .with_jitter(Duration::from_millis(self.jitter_max_ms))
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn overlay<V: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    target: &mut V,
) -> Result<()>
where
    V::Err: std::fmt::Display,
{
    if let Some(raw) = var(name) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| StreamError::config(format!("{ENV_PREFIX}{name}={raw:?}: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = StreamConfig::default();
        config.validate().unwrap();
        let policy = config.retry_policy();
        assert_eq!(policy.initial_delay, Duration::from_millis(1000));
        assert_eq!(policy.max_delay, Duration::from_millis(30_000));
        assert_eq!(policy.jitter_max, Duration::from_millis(1000));
        assert_eq!(policy.max_retries, 10);
        assert_eq!(config.throttle(), Duration::from_millis(100));
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = StreamConfig::from_yaml_str(
            "base_url: https://gateway.example\nmax_retries: 3\nauto_reconnect: false\n",
        )
        .unwrap();
        assert_eq!(config.base_url, "https://gateway.example");
        assert_eq!(config.max_retries, 3);
        assert!(!config.auto_reconnect);
        assert_eq!(config.buffer_size, 100);
    }

    #[test]
    fn yaml_errors_are_config_errors() {
        let err = StreamConfig::from_yaml_str("buffer_size: [1, 2]").unwrap_err();
        assert!(matches!(err, StreamError::Config { .. }));

        let err = StreamConfig::from_yaml_str("throttle_ms: 0").unwrap_err();
        assert!(matches!(err, StreamError::Config { .. }));
    }

    #[test]
    fn env_overlays_defaults() {
        let config = StreamConfig::from_vars(vars(&[
            ("FACILITY_STREAM_BASE_URL", "http://10.0.0.5:9000"),
            ("FACILITY_STREAM_BUFFER_SIZE", "20"),
            ("FACILITY_STREAM_AUTO_RECONNECT", "false"),
            ("OTHER_THROTTLE_MS", "1"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://10.0.0.5:9000");
        assert_eq!(config.buffer_size, 20);
        assert!(!config.auto_reconnect);
        assert_eq!(config.throttle_ms, 100);
    }

    #[test]
    fn unparseable_env_value_names_the_variable() {
        let err = StreamConfig::from_vars(vars(&[("FACILITY_STREAM_MAX_RETRIES", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("FACILITY_STREAM_MAX_RETRIES"));
    }

    #[test]
    fn validation_rejects_bad_settings() {
        let bad_url = StreamConfig { base_url: "not a url".into(), ..Default::default() };
        assert!(matches!(bad_url.validate(), Err(StreamError::Endpoint { .. })));

        let inverted = StreamConfig {
            initial_retry_delay_ms: 5000,
            max_retry_delay_ms: 1000,
            ..Default::default()
        };
        assert!(matches!(inverted.validate(), Err(StreamError::Config { .. })));
    }
}
