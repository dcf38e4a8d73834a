use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use waypoint_core::{Gazetteer, RetryPolicy, StaticGazetteer, MAX_KNOWN_LOCATIONS};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
pub const DEFAULT_DEADLINE_MS: u64 = 15_000;
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/responses";

#[derive(Debug, Clone)]
pub struct PlannerSettings {
    pub retry: RetryPolicy,
    /// Applied to every attempt separately.
    pub deadline: Duration,
    pub max_known_locations: usize,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::new(
                DEFAULT_MAX_ATTEMPTS,
                Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            ),
            deadline: Duration::from_millis(DEFAULT_DEADLINE_MS),
            max_known_locations: MAX_KNOWN_LOCATIONS,
        }
    }
}

impl PlannerSettings {
    pub fn from_env() -> Self {
        let max_attempts =
            env_parse::<u32>("WAYPOINT_RETRY_MAX_ATTEMPTS").unwrap_or(DEFAULT_MAX_ATTEMPTS);
        let delay_ms = env_parse::<u64>("WAYPOINT_RETRY_DELAY_MS").unwrap_or(DEFAULT_RETRY_DELAY_MS);
        let deadline_ms = env_parse::<u64>("WAYPOINT_INFERENCE_DEADLINE_MS")
            .map(|value| value.max(1))
            .unwrap_or(DEFAULT_DEADLINE_MS);

        Self {
            retry: RetryPolicy::new(max_attempts, Duration::from_millis(delay_ms)),
            deadline: Duration::from_millis(deadline_ms),
            max_known_locations: MAX_KNOWN_LOCATIONS,
        }
    }
}

#[derive(Clone)]
pub struct InferenceConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("connect_timeout", &self.connect_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_OPENAI_MODEL.to_string(),
            endpoint: DEFAULT_OPENAI_ENDPOINT.to_string(),
            connect_timeout: Duration::from_secs(6),
            request_timeout: Duration::from_secs(20),
        }
    }
}

impl InferenceConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: env::var("WAYPOINT_OPENAI_API_KEY").ok(),
            model: env::var("WAYPOINT_OPENAI_MODEL").unwrap_or(defaults.model),
            endpoint: env::var("WAYPOINT_OPENAI_ENDPOINT").unwrap_or(defaults.endpoint),
            ..defaults
        }
    }
}

/// `WAYPOINT_GAZETTEER_PATH` if set, otherwise the built-in Georgian list.
pub fn gazetteer_from_env() -> Result<Arc<dyn Gazetteer>> {
    match env::var("WAYPOINT_GAZETTEER_PATH") {
        Ok(path) if !path.trim().is_empty() => {
            Ok(Arc::new(StaticGazetteer::from_json_path(path.trim())?))
        }
        _ => Ok(Arc::new(StaticGazetteer::georgia())),
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = PlannerSettings::default();
        assert_eq!(settings.retry.max_attempts(), 3);
        assert_eq!(settings.retry.fixed_delay(), Duration::from_secs(1));
        assert_eq!(settings.deadline, Duration::from_secs(15));
        assert_eq!(settings.max_known_locations, 30);
    }

    #[test]
    fn debug_output_redacts_the_key() {
        let config = InferenceConfig {
            api_key: Some("sk-very-secret-value".to_string()),
            ..InferenceConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("very-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
