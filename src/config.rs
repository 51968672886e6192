use crate::domain::{BaseUrl, EventCount, MaxAttempts, SessionCount};
use crate::engine::{PollerConfig, SessionConfig};
use crate::report::ReportFormat;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `INGEST_HARNESS__SERVICE__BASE_URL`
pub const ENV_PREFIX: &str = "INGEST_HARNESS";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub service: ServiceSettings,
    pub harness: HarnessSettings,
    pub report: ReportSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceSettings {
    pub base_url: BaseUrl,
    pub request_timeout_ms: u64,
    /// Run against the in-process simulated service instead of HTTP
    pub dry_run: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HarnessSettings {
    pub session_count: SessionCount,
    pub events_per_session: EventCount,
    pub max_attempts: MaxAttempts,
    pub retry_interval_ms: u64,
    pub confirmation_deadline_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportSettings {
    pub format: ReportFormat,
    pub color: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load settings, layering an explicit file over the conventional ones
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let mut builder = Config::builder()
            .set_default("service.base_url", "http://127.0.0.1:8080")?
            .set_default("service.request_timeout_ms", 30_000)?
            .set_default("service.dry_run", false)?
            .set_default("harness.session_count", 50)?
            .set_default("harness.events_per_session", 157)?
            .set_default("harness.max_attempts", 10)?
            .set_default("harness.retry_interval_ms", 0)?
            .set_default("harness.confirmation_deadline_ms", 120_000)?
            .set_default("report.format", "markers")?
            .set_default("report.color", true)?
            .set_default("logging.level", "info")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{environment}")).required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.service.request_timeout_ms)
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            max_attempts: self.harness.max_attempts,
            retry_interval: Duration::from_millis(self.harness.retry_interval_ms),
            deadline: Duration::from_millis(self.harness.confirmation_deadline_ms),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            event_count: self.harness.events_per_session,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_run() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.harness.max_attempts.into_inner(), 10);
        assert_eq!(settings.poller_config().retry_interval, Duration::ZERO);
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));
        assert!(!settings.service.dry_run);
    }

    #[test]
    fn test_explicit_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[service]
base_url = "http://ingest.test:9000/"

[harness]
session_count = 3
events_per_session = 7
max_attempts = 4

[report]
format = "json"
color = false
"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.service.base_url.as_ref(), "http://ingest.test:9000");
        assert_eq!(settings.harness.session_count.into_inner(), 3);
        assert_eq!(settings.session_config().event_count.into_inner(), 7);
        assert_eq!(settings.poller_config().max_attempts.into_inner(), 4);
        assert_eq!(settings.report.format, ReportFormat::Json);
        assert!(!settings.report.color);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[service]
base_url = "not-a-url"
"#
        )
        .unwrap();
        assert!(Settings::load(Some(file.path())).is_err());

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[harness]\nmax_attempts = 0").unwrap();
        assert!(Settings::load(Some(file.path())).is_err());

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[harness]\nmax_attempts = 50").unwrap();
        assert!(Settings::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        assert!(Settings::load(Some(Path::new("/nonexistent/harness.toml"))).is_err());
    }
}
