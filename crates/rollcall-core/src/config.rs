//! Application configuration management.
//!
//! Configuration is layered with the `config` crate:
//!
//! 1. serde defaults on every section
//! 2. an optional TOML file (`ROLLCALL_CONFIG`, else the platform config dir)
//! 3. environment overrides of the form `ROLLCALL__SECTION__KEY`
//!
//! The resulting [`Config`] is validated once and then handed to each
//! component at construction; nothing reads configuration ambiently.

use std::path::{Path, PathBuf};

use chrono::Duration;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "ROLLCALL_CONFIG";

/// Prefix for environment overrides.
const ENV_PREFIX: &str = "ROLLCALL";

/// Largest accepted coordinate rounding precision (decimal places).
pub const MAX_COORDINATE_PRECISION: u32 = 8;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A single field holds an invalid value.
    #[error("Invalid value for '{field}': {message}")]
    ValidationError {
        /// Dotted field path.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields are invalid.
    #[error("{} configuration errors", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Data store settings.
    pub database: DatabaseConfig,
    /// Bearer token verification.
    pub auth: AuthConfig,
    /// Attendance rules.
    pub attendance: AttendanceConfig,
    /// QR code rendering.
    pub qr: QrConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind.
    pub bind_address: String,
    /// Production logging (JSON files) instead of pretty stdout.
    pub production: bool,
    /// Origin allowed by CORS, if any.
    pub cors_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            production: false,
            cors_origin: Some("http://localhost:5173".to_string()),
        }
    }
}

/// Data store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL, or `"memory"` for the in-process store.
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

/// Bearer token verification settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 secret shared with the credential service.
    #[serde(skip_serializing)]
    pub jwt_secret: String,
}

/// How often a lecturer may generate a new code for the same course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RateLimitPolicy {
    /// One code per (course, lecturer) per clock hour in the configured timezone.
    ClockHour,
    /// One code per (course, lecturer) per rolling interval.
    Rolling {
        /// Interval length in minutes.
        minutes: u32,
    },
}

/// Attendance rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttendanceConfig {
    /// How long a code stays live after generation.
    pub validity_minutes: u32,
    /// Maximum distance between student and code location.
    pub geofence_meters: f64,
    /// Round coordinates before measuring distance.
    pub round_coordinates: bool,
    /// Decimal places kept when rounding.
    pub coordinate_precision: u32,
    /// Regeneration policy.
    pub rate_limit: RateLimitPolicy,
    /// IANA timezone for clock-hour windows and attendance dates.
    pub timezone: String,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            validity_minutes: 60,
            geofence_meters: 50.0,
            round_coordinates: true,
            coordinate_precision: 2,
            rate_limit: RateLimitPolicy::ClockHour,
            timezone: "UTC".to_string(),
        }
    }
}

impl AttendanceConfig {
    /// The validity duration as a [`Duration`].
    #[must_use]
    pub fn validity(&self) -> Duration {
        Duration::minutes(i64::from(self.validity_minutes))
    }

    /// Rounding precision, or `None` when rounding is disabled.
    #[must_use]
    pub const fn precision(&self) -> Option<u32> {
        if self.round_coordinates {
            Some(self.coordinate_precision)
        } else {
            None
        }
    }

    /// Parsed timezone, falling back to UTC for unvalidated input.
    #[must_use]
    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or(chrono_tz::UTC)
    }
}

/// QR code settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrConfig {
    /// Public frontend URL that scans resolve to.
    pub base_url: String,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5173".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or validation fails.
    pub fn load() -> ConfigResult<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .ok()
            .map(PathBuf::from)
            .or_else(default_config_path);
        Self::load_from(path.as_deref())
    }

    /// Load configuration from an explicit file (if it exists) plus the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or validation fails.
    pub fn load_from(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all sections, collecting every problem.
    ///
    /// # Errors
    ///
    /// Returns the single error, or [`ConfigError::MultipleValidationErrors`].
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();
        let mut invalid = |field: &str, message: &str| {
            errors.push(ConfigError::ValidationError {
                field: field.to_string(),
                message: message.to_string(),
            });
        };

        let attendance = &self.attendance;
        if attendance.validity_minutes == 0 {
            invalid("attendance.validity_minutes", "must be greater than zero");
        }
        if !attendance.geofence_meters.is_finite() || attendance.geofence_meters <= 0.0 {
            invalid("attendance.geofence_meters", "must be a positive number");
        }
        if attendance.coordinate_precision > MAX_COORDINATE_PRECISION {
            invalid("attendance.coordinate_precision", "must be at most 8");
        }
        if let RateLimitPolicy::Rolling { minutes: 0 } = attendance.rate_limit {
            invalid("attendance.rate_limit.minutes", "must be greater than zero");
        }
        if !is_valid_timezone(&attendance.timezone) {
            invalid("attendance.timezone", "unknown IANA timezone");
        }
        if self.auth.jwt_secret.trim().is_empty() {
            invalid("auth.jwt_secret", "must not be empty");
        }
        if !(self.qr.base_url.starts_with("http://") || self.qr.base_url.starts_with("https://"))
        {
            invalid("qr.base_url", "must be an http(s) URL");
        }
        if self.database.url.trim().is_empty() {
            invalid("database.url", "must not be empty");
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }
}

/// Returns `true` if `name` is a known IANA timezone.
#[must_use]
pub fn is_valid_timezone(name: &str) -> bool {
    name.parse::<Tz>().is_ok()
}

/// Platform config file location (`~/.config/rollcall/config.toml` on Linux).
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "rollcall")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// SQLite database inside the platform data dir.
fn default_database_url() -> String {
    directories::ProjectDirs::from("", "", "rollcall").map_or_else(
        || "sqlite://rollcall.db?mode=rwc".to_string(),
        |dirs| {
            format!(
                "sqlite://{}?mode=rwc",
                dirs.data_dir().join("rollcall.db").display()
            )
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid() -> Config {
        Config {
            auth: AuthConfig {
                jwt_secret: "secret".to_string(),
            },
            ..Config::default()
        }
    }

    #[test]
    fn test_defaults_are_authoritative_constants() {
        let config = Config::default();
        assert_eq!(config.attendance.validity_minutes, 60);
        assert_eq!(config.attendance.validity(), Duration::minutes(60));
        assert!((config.attendance.geofence_meters - 50.0).abs() < f64::EPSILON);
        assert_eq!(config.attendance.precision(), Some(2));
        assert_eq!(config.attendance.rate_limit, RateLimitPolicy::ClockHour);
        assert_eq!(config.attendance.tz(), chrono_tz::UTC);
    }

    #[test]
    fn test_validate_accepts_defaults_with_secret() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_secret() {
        let err = Config::default().validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ValidationError { ref field, .. } if field == "auth.jwt_secret"
        ));
    }

    #[test]
    fn test_validate_collects_multiple_errors() {
        let mut config = valid();
        config.attendance.validity_minutes = 0;
        config.attendance.timezone = "Mars/Olympus".to_string();
        config.attendance.rate_limit = RateLimitPolicy::Rolling { minutes: 0 };

        match config.validate() {
            Err(ConfigError::MultipleValidationErrors(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected multiple errors, got {other:?}"),
        }
    }

    #[test]
    fn test_precision_disabled() {
        let mut config = valid();
        config.attendance.round_coordinates = false;
        assert_eq!(config.attendance.precision(), None);
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[auth]
jwt_secret = "from-file"

[attendance]
validity_minutes = 10
geofence_meters = 15.0
timezone = "Africa/Lagos"

[attendance.rate_limit]
policy = "rolling"
minutes = 30
"#
        )
        .unwrap();

        let config = Config::load_from(Some(file.path())).unwrap();
        assert_eq!(config.auth.jwt_secret, "from-file");
        assert_eq!(config.attendance.validity_minutes, 10);
        assert_eq!(
            config.attendance.rate_limit,
            RateLimitPolicy::Rolling { minutes: 30 }
        );
        assert_eq!(config.attendance.tz(), chrono_tz::Africa::Lagos);
        // untouched sections keep their defaults
        assert_eq!(config.server.bind_address, "0.0.0.0:8000");
    }

    #[test]
    fn test_is_valid_timezone() {
        assert!(is_valid_timezone("UTC"));
        assert!(is_valid_timezone("Africa/Lagos"));
        assert!(!is_valid_timezone("Not/AZone"));
    }
}
