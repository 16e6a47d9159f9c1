use chrono::Duration;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

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
    pub registration: RegistrationSettings,
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
        let log_format = LogFormat::from_str(
            &env::var("APP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
        );

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            registration: RegistrationSettings::from_env()?,
        })
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Output shape for log lines; JSON is meant for log shipping in production.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Knobs for the registrant lifecycle: barcode framing, reminder cadence, sweep cadence, and
/// where generated PDFs land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationSettings {
    pub barcode_prefix: String,
    pub from_address: String,
    pub hours_before_first_reminder: u32,
    pub hours_between_reminders: u32,
    pub stale_timeout_minutes: u32,
    pub sweep_batch_size: usize,
    pub sweep_interval_seconds: u64,
    pub pdf_root: PathBuf,
    pub enabled_locales: Vec<String>,
}

impl Default for RegistrationSettings {
    fn default() -> Self {
        Self {
            barcode_prefix: "RTV".to_string(),
            from_address: "register@example.org".to_string(),
            hours_before_first_reminder: 24,
            hours_between_reminders: 72,
            stale_timeout_minutes: 30,
            sweep_batch_size: 500,
            sweep_interval_seconds: 300,
            pdf_root: PathBuf::from("public/pdfs"),
            enabled_locales: vec!["en".to_string(), "es".to_string()],
        }
    }
}

impl RegistrationSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let enabled_locales = match env::var("APP_ENABLED_LOCALES") {
            Ok(raw) => {
                let locales: Vec<String> = raw
                    .split(',')
                    .map(|locale| locale.trim().to_ascii_lowercase())
                    .filter(|locale| !locale.is_empty())
                    .collect();
                if locales.is_empty() {
                    defaults.enabled_locales.clone()
                } else {
                    locales
                }
            }
            Err(_) => defaults.enabled_locales.clone(),
        };

        Ok(Self {
            barcode_prefix: env::var("APP_BARCODE_PREFIX").unwrap_or(defaults.barcode_prefix),
            from_address: env::var("APP_FROM_ADDRESS").unwrap_or(defaults.from_address),
            hours_before_first_reminder: numeric_var(
                "APP_HOURS_BEFORE_FIRST_REMINDER",
                defaults.hours_before_first_reminder,
            )?,
            hours_between_reminders: numeric_var(
                "APP_HOURS_BETWEEN_REMINDERS",
                defaults.hours_between_reminders,
            )?,
            stale_timeout_minutes: numeric_var(
                "APP_STALE_TIMEOUT_MINUTES",
                defaults.stale_timeout_minutes,
            )?,
            sweep_batch_size: numeric_var("APP_SWEEP_BATCH_SIZE", defaults.sweep_batch_size)?,
            sweep_interval_seconds: numeric_var(
                "APP_SWEEP_INTERVAL_SECONDS",
                defaults.sweep_interval_seconds,
            )?,
            pdf_root: env::var("APP_PDF_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.pdf_root),
            enabled_locales,
        })
    }

    pub fn stale_timeout(&self) -> Duration {
        Duration::minutes(i64::from(self.stale_timeout_minutes))
    }

    /// Delay before the next reminder given how many are still owed.
    pub fn reminder_delay(&self, reminders_left: u8) -> Duration {
        let hours = if reminders_left >= 2 {
            self.hours_before_first_reminder
        } else {
            self.hours_between_reminders
        };
        Duration::hours(i64::from(hours))
    }

    pub fn locale_enabled(&self, locale: &str) -> bool {
        self.enabled_locales.iter().any(|enabled| enabled == locale)
    }
}

fn numeric_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { var }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { var: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { var } => {
                write!(f, "{var} must be a non-negative integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
