//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub lifecycle: LifecycleConfig,
    pub scheduler: SchedulerConfig,
    pub permissions: PermissionsConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
}

/// Database configuration (SQLite only)
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    pub path: PathBuf,
    /// Maximum pooled connections
    pub max_connections: u32,
    /// How long a request waits for a pooled connection before failing
    pub acquire_timeout_seconds: u64,
    /// How long SQLite waits on a locked database before returning busy
    pub busy_timeout_seconds: u64,
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_seconds)
    }
}

/// Quest lifecycle policy
#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    /// Wait after a rejection before the same user may re-accept (default: 24)
    pub cooldown_hours: i64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self { cooldown_hours: 24 }
    }
}

/// Deadline monitor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Run the background deadline/recurrence loop
    pub enabled: bool,
    /// Poll interval in seconds (default: 300)
    pub interval_seconds: u64,
    /// Warn this many minutes before a deadline (default: 60)
    pub warning_lead_minutes: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 300,
            warning_lead_minutes: 60,
        }
    }
}

/// Permission policy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PermissionsConfig {
    /// Role names (case-insensitive) that may create and manage quests
    #[serde(default = "default_creator_role_names")]
    pub creator_role_names: Vec<String>,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            creator_role_names: default_creator_role_names(),
        }
    }
}

fn default_creator_role_names() -> Vec<String> {
    [
        "Quest Creator",
        "Quest Master",
        "QuestMaster",
        "Quest Admin",
        "Quest Manager",
        "Moderator",
        "Admin",
        "Staff",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// Filter directives used when `RUST_LOG` is unset
    pub fn default_filter(&self) -> String {
        format!("questboard={},tower_http=debug", self.level)
    }
}

/// Upper bound for `lifecycle.cooldown_hours` (one year)
pub const MAX_COOLDOWN_HOURS: i64 = 24 * 365;

/// Upper bound for `scheduler.warning_lead_minutes` (thirty days)
pub const MAX_WARNING_LEAD_MINUTES: i64 = 60 * 24 * 30;

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (QUESTBOARD__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("database.path", "data/questboard.db")?
            .set_default("database.max_connections", 8)?
            .set_default("database.acquire_timeout_seconds", 5)?
            .set_default("database.busy_timeout_seconds", 5)?
            .set_default("lifecycle.cooldown_hours", 24)?
            .set_default("scheduler.enabled", true)?
            .set_default("scheduler.interval_seconds", 300)?
            .set_default("scheduler.warning_lead_minutes", 60)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("QUESTBOARD")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("permissions.creator_role_names")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        if self.database.max_connections == 0 {
            return Err(AppError::Config(
                "database.max_connections must be greater than 0".to_string(),
            ));
        }

        if self.database.acquire_timeout_seconds == 0 || self.database.busy_timeout_seconds == 0 {
            return Err(AppError::Config(
                "database timeouts must be greater than 0 seconds".to_string(),
            ));
        }

        if self.lifecycle.cooldown_hours <= 0 {
            return Err(AppError::Config(
                "lifecycle.cooldown_hours must be greater than 0".to_string(),
            ));
        }

        if self.lifecycle.cooldown_hours > MAX_COOLDOWN_HOURS {
            return Err(AppError::Config(format!(
                "lifecycle.cooldown_hours must be at most {MAX_COOLDOWN_HOURS}"
            )));
        }

        if self.scheduler.interval_seconds == 0 {
            return Err(AppError::Config(
                "scheduler.interval_seconds must be greater than 0".to_string(),
            ));
        }

        if self.scheduler.warning_lead_minutes < 0 {
            return Err(AppError::Config(
                "scheduler.warning_lead_minutes must not be negative".to_string(),
            ));
        }

        if self.scheduler.warning_lead_minutes > MAX_WARNING_LEAD_MINUTES {
            return Err(AppError::Config(format!(
                "scheduler.warning_lead_minutes must be at most {MAX_WARNING_LEAD_MINUTES}"
            )));
        }

        if !matches!(
            self.logging.level.as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(AppError::Config(format!(
                "logging.level must be one of trace, debug, info, warn, error, got {}",
                self.logging.level
            )));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(AppError::Config(format!(
                "logging.format must be pretty or json, got {}",
                self.logging.format
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                path: PathBuf::from("/tmp/questboard-test.db"),
                max_connections: 4,
                acquire_timeout_seconds: 5,
                busy_timeout_seconds: 5,
            },
            lifecycle: LifecycleConfig::default(),
            scheduler: SchedulerConfig::default(),
            permissions: PermissionsConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_defaults() {
        let config = valid_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.lifecycle.cooldown_hours, 24);
        assert_eq!(config.scheduler.interval_seconds, 300);
        assert!(
            config
                .permissions
                .creator_role_names
                .iter()
                .any(|name| name == "Quest Master")
        );
    }

    #[test]
    fn validate_rejects_zero_cooldown() {
        let mut config = valid_config();
        config.lifecycle.cooldown_hours = 0;

        let error = config
            .validate()
            .expect_err("a zero cooldown must fail validation");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message)
                if message.contains("lifecycle.cooldown_hours")
        ));
    }

    #[test]
    fn validate_rejects_zero_timeouts() {
        let mut config = valid_config();
        config.database.acquire_timeout_seconds = 0;

        let error = config
            .validate()
            .expect_err("store calls must carry a bounded, non-zero timeout");
        assert!(matches!(
            error,
            crate::error::AppError::Config(message) if message.contains("timeouts")
        ));
    }

    #[test]
    fn validate_rejects_cooldown_beyond_a_year() {
        let mut config = valid_config();
        config.lifecycle.cooldown_hours = i64::MAX;
        assert!(matches!(
            config.validate(),
            Err(crate::error::AppError::Config(message))
                if message.contains("lifecycle.cooldown_hours")
        ));

        config.lifecycle.cooldown_hours = MAX_COOLDOWN_HOURS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_oversized_warning_lead() {
        let mut config = valid_config();
        config.scheduler.warning_lead_minutes = MAX_WARNING_LEAD_MINUTES + 1;
        assert!(matches!(
            config.validate(),
            Err(crate::error::AppError::Config(message))
                if message.contains("scheduler.warning_lead_minutes")
        ));
    }

    #[test]
    fn log_level_feeds_default_filter() {
        let mut config = valid_config();
        config.logging.level = "debug".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.logging.default_filter(),
            "questboard=debug,tower_http=debug"
        );

        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_log_format() {
        let mut config = valid_config();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }
}
