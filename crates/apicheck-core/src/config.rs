//! Service registry and per-environment configuration resolution

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment used when neither the caller nor `APICHECK_ENV` names one.
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Environment variable that selects the active environment.
pub const ENVIRONMENT_VAR: &str = "APICHECK_ENV";

/// Overall deadline applied when a service does not set `connection_timeout`.
pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 3000;

/// Headers-received deadline applied when a service does not set `response_timeout`.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 5000;

/// Connection parameters for one named backend in one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfiguration {
    /// Name used to look the service up, e.g. "wizardWorld"
    pub service_name: String,

    /// Base URL every endpoint is joined onto
    pub base_url: String,

    /// API version label (informational, not part of the URL)
    #[serde(default)]
    pub api_version: String,

    /// Overall request deadline in milliseconds (0 or unset = default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_timeout: Option<u64>,

    /// Response-headers deadline in milliseconds (0 or unset = default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_timeout: Option<u64>,
}

impl ServiceConfiguration {
    pub fn new(service_name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            base_url: base_url.into(),
            api_version: String::new(),
            connection_timeout: None,
            response_timeout: None,
        }
    }

    #[must_use]
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    #[must_use]
    pub fn with_connection_timeout(mut self, ms: u64) -> Self {
        self.connection_timeout = Some(ms);
        self
    }

    #[must_use]
    pub fn with_response_timeout(mut self, ms: u64) -> Self {
        self.response_timeout = Some(ms);
        self
    }

    /// Overall deadline with the default applied.
    #[must_use]
    pub fn effective_connection_timeout(&self) -> Duration {
        effective_ms(self.connection_timeout, DEFAULT_CONNECTION_TIMEOUT_MS)
    }

    /// Headers-received deadline with the default applied.
    #[must_use]
    pub fn effective_response_timeout(&self) -> Duration {
        effective_ms(self.response_timeout, DEFAULT_RESPONSE_TIMEOUT_MS)
    }
}

fn effective_ms(configured: Option<u64>, default_ms: u64) -> Duration {
    Duration::from_millis(configured.filter(|&ms| ms > 0).unwrap_or(default_ms))
}

/// All known services, grouped by environment.
///
/// ```toml
/// default_environment = "development"
///
/// [[environments.development]]
/// service_name = "wizardWorld"
/// base_url = "https://wizard-world-api.herokuapp.com"
/// api_version = "v1"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRegistry {
    /// Environment used when none is requested
    #[serde(default = "default_environment")]
    pub default_environment: String,

    /// Environment name → services registered there
    #[serde(default)]
    pub environments: BTreeMap<String, Vec<ServiceConfiguration>>,
}

fn default_environment() -> String {
    DEFAULT_ENVIRONMENT.to_string()
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self {
            default_environment: default_environment(),
            environments: BTreeMap::new(),
        }
    }
}

impl ServiceRegistry {
    /// Register a service under `environment`.
    #[must_use]
    pub fn with_service(mut self, environment: &str, service: ServiceConfiguration) -> Self {
        self.environments
            .entry(environment.to_string())
            .or_default()
            .push(service);
        self
    }

    /// Resolve one service. `None` selects `default_environment`.
    ///
    /// # Errors
    ///
    /// Returns error if the environment or the service is not registered.
    pub fn resolve(
        &self,
        environment: Option<&str>,
        service_name: &str,
    ) -> Result<ServiceConfiguration, ConfigError> {
        let environment = environment.unwrap_or(&self.default_environment);
        self.services(environment)?
            .iter()
            .find(|s| s.service_name == service_name)
            .cloned()
            .ok_or_else(|| ConfigError::ServiceNotFound {
                environment: environment.to_string(),
                service: service_name.to_string(),
            })
    }

    /// Resolve against [`Self::active_environment`].
    pub fn resolve_active(&self, service_name: &str) -> Result<ServiceConfiguration, ConfigError> {
        let environment = self.active_environment();
        self.resolve(Some(&environment), service_name)
    }

    /// `APICHECK_ENV` when set and non-empty, else `default_environment`.
    #[must_use]
    pub fn active_environment(&self) -> String {
        self.environment_or_default(std::env::var(ENVIRONMENT_VAR).ok())
    }

    /// `requested` when given and non-empty, else [`Self::active_environment`].
    #[must_use]
    pub fn select_environment(&self, requested: Option<&str>) -> String {
        match requested.filter(|env| !env.trim().is_empty()) {
            Some(env) => env.to_string(),
            None => self.active_environment(),
        }
    }

    fn environment_or_default(&self, requested: Option<String>) -> String {
        requested
            .filter(|env| !env.trim().is_empty())
            .unwrap_or_else(|| self.default_environment.clone())
    }

    /// Services registered for one environment.
    pub fn services(&self, environment: &str) -> Result<&[ServiceConfiguration], ConfigError> {
        self.environments
            .get(environment)
            .map(Vec::as_slice)
            .ok_or_else(|| ConfigError::UnknownEnvironment {
                environment: environment.to_string(),
            })
    }

    /// Check that every service name is unique within its environment
    /// and has a base URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (environment, services) in &self.environments {
            let mut seen = HashSet::new();
            for service in services {
                if !seen.insert(service.service_name.as_str()) {
                    return Err(ConfigError::DuplicateService {
                        environment: environment.clone(),
                        service: service.service_name.clone(),
                    });
                }
                if service.base_url.trim().is_empty() {
                    return Err(ConfigError::EmptyBaseUrl {
                        environment: environment.clone(),
                        service: service.service_name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Load a registry from file
    ///
    /// Format follows the extension: `.json`, `.yaml`/`.yml`, otherwise TOML.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, parsed or fails [`Self::validate`]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        let registry: Self = match ext.as_str() {
            "json" => serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?,
            "yaml" | "yml" => {
                serde_yml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?
            }
            _ => toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?,
        };

        registry.validate()?;
        log::debug!(
            "Loaded {} environment(s) from {}",
            registry.environments.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Load from default location (.apicheck.toml)
    pub fn load_default() -> Result<Self, ConfigError> {
        let candidates = [".apicheck.toml", "apicheck.toml", ".apicheck.json"];

        for name in candidates {
            let path = Path::new(name);
            if path.exists() {
                return Self::load(path);
            }
            log::debug!("No registry at {name}");
        }

        // No config file: an empty registry, every resolve fails
        Ok(Self::default())
    }

    /// Create example config file
    pub fn example() -> &'static str {
        r#"# apicheck service registry

# Environment used when APICHECK_ENV is not set
default_environment = "development"

# One [[environments.<name>]] table per service
[[environments.development]]
service_name = "wizardWorld"
base_url = "https://wizard-world-api.herokuapp.com"
api_version = "v1"
# Overall deadline in ms (default 3000)
connection_timeout = 3000
# Wait for response headers in ms (default 5000)
response_timeout = 5000

# [[environments.staging]]
# service_name = "wizardWorld"
# base_url = "https://wizard-world-api.staging.example.com"
# api_version = "v1"
"#
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("environment '{environment}' is not configured")]
    UnknownEnvironment { environment: String },
    #[error("service '{service}' is not registered in environment '{environment}'")]
    ServiceNotFound { environment: String, service: String },
    #[error("service '{service}' is registered more than once in environment '{environment}'")]
    DuplicateService { environment: String, service: String },
    #[error("service '{service}' in environment '{environment}' has an empty base_url")]
    EmptyBaseUrl { environment: String, service: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn wizard_world() -> ServiceConfiguration {
        ServiceConfiguration::new("wizardWorld", "https://wizard-world-api.herokuapp.com")
            .with_api_version("v1")
    }

    fn registry() -> ServiceRegistry {
        ServiceRegistry::default()
            .with_service("development", wizard_world())
            .with_service(
                "staging",
                ServiceConfiguration::new("wizardWorld", "https://staging.example.com")
                    .with_connection_timeout(1000)
                    .with_response_timeout(2000),
            )
    }

    // ── resolve ──

    #[test]
    fn resolve_uses_default_environment() {
        let config = registry().resolve(None, "wizardWorld").unwrap();
        assert_eq!(config.base_url, "https://wizard-world-api.herokuapp.com");
        assert_eq!(config.api_version, "v1");
    }

    #[test]
    fn resolve_named_environment() {
        let config = registry().resolve(Some("staging"), "wizardWorld").unwrap();
        assert_eq!(config.base_url, "https://staging.example.com");
        assert_eq!(config.connection_timeout, Some(1000));
    }

    #[test]
    fn resolve_unknown_service_fails() {
        let err = registry().resolve(Some("development"), "users").unwrap_err();
        assert!(matches!(err, ConfigError::ServiceNotFound { .. }));
        insta::assert_snapshot!(
            err.to_string(),
            @"service 'users' is not registered in environment 'development'"
        );
    }

    #[test]
    fn resolve_unknown_environment_fails() {
        let err = registry().resolve(Some("production"), "wizardWorld").unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"environment 'production' is not configured");
    }

    #[test]
    fn resolve_does_not_fall_back_across_environments() {
        let registry = ServiceRegistry::default()
            .with_service("development", wizard_world())
            .with_service("staging", ServiceConfiguration::new("users", "http://users"));
        assert!(registry.resolve(Some("staging"), "wizardWorld").is_err());
    }

    #[test]
    fn active_environment_prefers_requested_value() {
        let registry = registry();
        assert_eq!(
            registry.environment_or_default(Some("staging".into())),
            "staging"
        );
        assert_eq!(registry.environment_or_default(None), "development");
        assert_eq!(
            registry.environment_or_default(Some("  ".into())),
            "development"
        );
    }

    #[test]
    fn environment_variable_selects_active_environment() {
        let registry = registry();

        // SAFETY: the only test in this crate that touches APICHECK_ENV
        unsafe { std::env::set_var(ENVIRONMENT_VAR, "staging") };
        let active = registry.active_environment();
        let resolved = registry.resolve_active("wizardWorld");
        let selected = registry.select_environment(None);
        let explicit = registry.select_environment(Some("development"));
        let blank = registry.select_environment(Some(" "));
        unsafe { std::env::remove_var(ENVIRONMENT_VAR) };

        assert_eq!(active, "staging");
        assert_eq!(resolved.unwrap().base_url, "https://staging.example.com");
        assert_eq!(selected, "staging");
        assert_eq!(explicit, "development");
        assert_eq!(blank, "staging");
        assert_eq!(registry.active_environment(), "development");
    }

    // ── timeouts ──

    #[test]
    fn default_timeouts_when_unset() {
        let config = wizard_world();
        assert_eq!(config.effective_connection_timeout(), Duration::from_millis(3000));
        assert_eq!(config.effective_response_timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn zero_timeouts_use_defaults() {
        let config = wizard_world()
            .with_connection_timeout(0)
            .with_response_timeout(0);
        assert_eq!(config.effective_connection_timeout(), Duration::from_millis(3000));
        assert_eq!(config.effective_response_timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn explicit_timeouts_win() {
        let config = wizard_world()
            .with_connection_timeout(250)
            .with_response_timeout(100);
        assert_eq!(config.effective_connection_timeout(), Duration::from_millis(250));
        assert_eq!(config.effective_response_timeout(), Duration::from_millis(100));
    }

    // ── validate ──

    #[test]
    fn validate_rejects_duplicate_service() {
        let registry = ServiceRegistry::default()
            .with_service("development", wizard_world())
            .with_service("development", wizard_world());
        let err = registry.validate().unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateService { .. }));
    }

    #[test]
    fn validate_allows_same_service_in_other_environments() {
        assert!(registry().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_base_url() {
        let registry = ServiceRegistry::default()
            .with_service("development", ServiceConfiguration::new("wizardWorld", " "));
        assert!(matches!(
            registry.validate().unwrap_err(),
            ConfigError::EmptyBaseUrl { .. }
        ));
    }

    // ── parsing ──

    #[test]
    fn parse_toml() {
        let toml = r#"
default_environment = "staging"

[[environments.staging]]
service_name = "wizardWorld"
base_url = "http://localhost:3000"
api_version = "v2"
response_timeout = 750

[[environments.staging]]
service_name = "users"
base_url = "http://localhost:3001"
"#;
        let registry: ServiceRegistry = toml::from_str(toml).unwrap();

        assert_eq!(registry.default_environment, "staging");
        let services = registry.services("staging").unwrap();
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].api_version, "v2");
        assert_eq!(services[0].connection_timeout, None);
        assert_eq!(services[0].response_timeout, Some(750));
        assert_eq!(services[1].api_version, "");
    }

    #[test]
    fn parse_toml_without_default_environment() {
        let toml = r#"
[[environments.development]]
service_name = "wizardWorld"
base_url = "http://localhost:3000"
"#;
        let registry: ServiceRegistry = toml::from_str(toml).unwrap();
        assert_eq!(registry.default_environment, DEFAULT_ENVIRONMENT);
        assert!(registry.resolve(None, "wizardWorld").is_ok());
    }

    #[test]
    fn example_parses_and_validates() {
        let registry: ServiceRegistry = toml::from_str(ServiceRegistry::example()).unwrap();
        registry.validate().unwrap();
        let config = registry.resolve(None, "wizardWorld").unwrap();
        assert_eq!(config.connection_timeout, Some(3000));
    }

    #[test]
    fn load_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        std::fs::write(
            &path,
            r#"{"environments": {"development": [
                {"service_name": "wizardWorld", "base_url": "http://localhost:8080"}
            ]}}"#,
        )
        .unwrap();

        let registry = ServiceRegistry::load(&path).unwrap();
        assert_eq!(
            registry.resolve(None, "wizardWorld").unwrap().base_url,
            "http://localhost:8080"
        );
    }

    #[test]
    fn load_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.yaml");
        std::fs::write(
            &path,
            "default_environment: qa\nenvironments:\n  qa:\n    - service_name: wizardWorld\n      base_url: http://qa.local\n      connection_timeout: 1200\n",
        )
        .unwrap();

        let registry = ServiceRegistry::load(&path).unwrap();
        let config = registry.resolve(None, "wizardWorld").unwrap();
        assert_eq!(config.base_url, "http://qa.local");
        assert_eq!(config.effective_connection_timeout(), Duration::from_millis(1200));
    }

    #[test]
    fn load_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apicheck.toml");
        std::fs::write(
            &path,
            r#"
[[environments.development]]
service_name = "wizardWorld"
base_url = "http://a"

[[environments.development]]
service_name = "wizardWorld"
base_url = "http://b"
"#,
        )
        .unwrap();

        assert!(matches!(
            ServiceRegistry::load(&path).unwrap_err(),
            ConfigError::DuplicateService { .. }
        ));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = ServiceRegistry::load(Path::new("/nonexistent/apicheck.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(..)));
    }

    #[test]
    fn load_invalid_toml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("apicheck.toml");
        std::fs::write(&path, "environments = [").unwrap();
        assert!(matches!(
            ServiceRegistry::load(&path).unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    // ── properties ──

    proptest! {
        #[test]
        fn resolve_is_deterministic(
            name in "[a-zA-Z][a-zA-Z0-9_-]{0,15}",
            port in 1024u16..u16::MAX,
            timeout in proptest::option::of(0u64..10_000),
        ) {
            let mut service = ServiceConfiguration::new(name.clone(), format!("http://localhost:{port}"));
            service.connection_timeout = timeout;
            let registry = ServiceRegistry::default().with_service(DEFAULT_ENVIRONMENT, service);

            let first = registry.resolve(None, &name).unwrap();
            let second = registry.resolve(Some(DEFAULT_ENVIRONMENT), &name).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn unknown_service_never_defaults(name in "[a-z]{1,12}") {
            let unknown = format!("{name}-unknown");
            let err = registry().resolve(None, &unknown).unwrap_err();
            let is_not_found = matches!(err, ConfigError::ServiceNotFound { .. });
            prop_assert!(is_not_found);
        }
    }
}
