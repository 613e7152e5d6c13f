//! Configuration management for crpt-submit.

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CrptError, Result};
use crate::ratelimit::{TimeUnit, Window};

/// Default registration endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://ismp.crpt.ru/api/v3/lk/documents/create";

/// Prefix for environment variable overrides, e.g. `CRPT_RATE_LIMITING__MAX_CALLS`.
const ENV_PREFIX: &str = "CRPT";

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrptConfig {
    /// Remote API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

/// Remote API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Document creation endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Whole-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// User-Agent header value
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("crpt-submit/{}", env!("CARGO_PKG_VERSION"))
}

/// Rate limiting configuration: `max_calls` calls per one `unit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Window length
    #[serde(default = "default_unit")]
    pub unit: TimeUnit,

    /// Calls admitted per window
    #[serde(default = "default_max_calls")]
    pub max_calls: i64,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            unit: default_unit(),
            max_calls: default_max_calls(),
        }
    }
}

fn default_unit() -> TimeUnit {
    TimeUnit::Second
}

fn default_max_calls() -> i64 {
    1
}

impl RateLimitingConfig {
    /// Validate and build the limiter window.
    pub fn window(&self) -> Result<Window> {
        Window::per(self.unit, self.max_calls)
    }
}

impl CrptConfig {
    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| CrptError::Config(format!("Failed to parse configuration: {}", e)))
    }

    /// Load defaults, then the optional YAML file, then `CRPT_*` environment
    /// variables, each layer overriding the previous one.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration");
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
        }

        let config = builder
            .add_source(
                env.prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = CrptConfig::default();

        assert_eq!(config.api.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.api.request_timeout_secs, 30);
        assert_eq!(config.rate_limiting.unit, TimeUnit::Second);
        assert_eq!(config.rate_limiting.max_calls, 1);
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
api:
  endpoint: https://sandbox.example/api/v3/lk/documents/create
  request_timeout_secs: 5
rate_limiting:
  unit: minute
  max_calls: 20
"#;
        let config = CrptConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.api.endpoint, "https://sandbox.example/api/v3/lk/documents/create");
        assert_eq!(config.api.request_timeout_secs, 5);
        assert_eq!(config.api.connect_timeout_secs, 10);

        let window = config.rate_limiting.window().unwrap();
        assert_eq!(window.duration(), Duration::from_secs(60));
        assert_eq!(window.max_calls(), 20);
    }

    #[test]
    fn test_invalid_window_is_rejected() {
        let yaml = r#"
rate_limiting:
  max_calls: -1
"#;
        let config = CrptConfig::from_yaml(yaml).unwrap();
        assert!(matches!(
            config.rate_limiting.window(),
            Err(CrptError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_unknown_unit_fails_to_parse() {
        let result = CrptConfig::from_yaml("rate_limiting:\n  unit: fortnight\n");
        assert!(matches!(result, Err(CrptError::Config(_))));
    }

    #[test]
    fn test_environment_overrides() {
        let vars = HashMap::from([
            ("CRPT_RATE_LIMITING__MAX_CALLS".to_string(), "7".to_string()),
            ("CRPT_API__ENDPOINT".to_string(), "http://localhost:9000/create".to_string()),
        ]);
        let env = Environment::with_prefix(ENV_PREFIX).source(Some(vars));

        let config = CrptConfig::load_with_env(None, env).unwrap();

        assert_eq!(config.rate_limiting.max_calls, 7);
        assert_eq!(config.rate_limiting.unit, TimeUnit::Second);
        assert_eq!(config.api.endpoint, "http://localhost:9000/create");
    }

    fn no_env() -> Environment {
        Environment::with_prefix(ENV_PREFIX).source(Some(HashMap::new()))
    }

    #[test]
    fn test_file_layer_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crpt.yaml");
        std::fs::write(
            &path,
            r#"
api:
  endpoint: https://file.example/create
  request_timeout_secs: 5
rate_limiting:
  unit: minute
  max_calls: 3
"#,
        )
        .unwrap();

        let vars = HashMap::from([("CRPT_RATE_LIMITING__MAX_CALLS".to_string(), "9".to_string())]);
        let env = Environment::with_prefix(ENV_PREFIX).source(Some(vars));

        let config = CrptConfig::load_with_env(Some(&path), env).unwrap();

        // environment beats file
        assert_eq!(config.rate_limiting.max_calls, 9);
        // file beats defaults
        assert_eq!(config.rate_limiting.unit, TimeUnit::Minute);
        assert_eq!(config.api.endpoint, "https://file.example/create");
        assert_eq!(config.api.request_timeout_secs, 5);
        // defaults fill the rest
        assert_eq!(config.api.connect_timeout_secs, 10);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");

        let result = CrptConfig::load_with_env(Some(&path), no_env());
        assert!(matches!(result, Err(CrptError::Config(_))));
    }

    #[test]
    fn test_demo_config_loads() {
        let path = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/config.yaml"));

        let config = CrptConfig::load_with_env(Some(path), no_env()).unwrap();

        let window = config.rate_limiting.window().unwrap();
        assert_eq!(window.duration(), Duration::from_secs(1));
        assert_eq!(window.max_calls(), 5);
    }
}
