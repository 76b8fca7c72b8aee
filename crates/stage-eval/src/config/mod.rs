use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::workflows::internship::{
    CatalogError, EvaluationCatalog, ResolverSettings, RetryPolicy, RubricTable,
};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub backend: BackendConfig,
    pub workflow: WorkflowConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let base_url = env::var("BACKEND_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8080/api".to_string());
        Url::parse(&base_url).map_err(|source| ConfigError::InvalidBackendUrl {
            value: base_url.clone(),
            source,
        })?;
        let timeout_secs = numeric_var("BACKEND_TIMEOUT_SECS", 10)?;
        let retry_delay_ms = numeric_var("BACKEND_RETRY_DELAY_MS", 500)?;

        let defaults = ResolverSettings::default();
        let resolver = ResolverSettings {
            intern_email_domain: env::var("INTERN_EMAIL_DOMAIN")
                .unwrap_or(defaults.intern_email_domain),
            tutor_email_domain: env::var("TUTOR_EMAIL_DOMAIN")
                .unwrap_or(defaults.tutor_email_domain),
            default_institution: env::var("INTERN_INSTITUTION")
                .unwrap_or(defaults.default_institution),
        };
        let catalog_path = env::var("EVALUATION_CATALOG_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        let rubric = match env::var("RUBRIC_TABLE") {
            Ok(value) => value.parse().map_err(ConfigError::InvalidRubric)?,
            Err(_) => RubricTable::default(),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            backend: BackendConfig {
                base_url,
                timeout: Duration::from_secs(timeout_secs),
                retry_delay: Duration::from_millis(retry_delay_ms),
            },
            workflow: WorkflowConfig {
                resolver,
                catalog_path,
                rubric,
            },
        })
    }
}

fn numeric_var(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where the stage management REST service lives and how hard to retry it.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub retry_delay: Duration,
}

impl BackendConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_delay(self.retry_delay)
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub resolver: ResolverSettings,
    /// JSON catalog replacing the standard categories and competencies.
    pub catalog_path: Option<PathBuf>,
    pub rubric: RubricTable,
}

impl WorkflowConfig {
    pub fn catalog(&self) -> Result<EvaluationCatalog, CatalogError> {
        match &self.catalog_path {
            Some(path) => EvaluationCatalog::from_path(path),
            None => Ok(EvaluationCatalog::standard()),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    InvalidBackendUrl {
        value: String,
        source: url::ParseError,
    },
    InvalidNumber {
        key: &'static str,
        value: String,
    },
    InvalidRubric(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidBackendUrl { value, .. } => {
                write!(f, "BACKEND_BASE_URL '{value}' is not a valid URL")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a non-negative integer, got '{value}'")
            }
            ConfigError::InvalidRubric(reason) => write!(f, "RUBRIC_TABLE: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidBackendUrl { source, .. } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidRubric(_) => None,
        }
    }
}
