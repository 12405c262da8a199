//! Configuration management
//!
//! This module handles loading and parsing configuration for the blog.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Hosted backend configuration
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Site and table configuration
    #[serde(default)]
    pub site: SiteConfig,
    /// Client session configuration
    #[serde(default)]
    pub session: SessionConfig,
    /// Template override configuration
    #[serde(default)]
    pub theme: ThemeConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Hosted backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Backend driver (memory or rest)
    #[serde(default)]
    pub driver: RemoteDriver,
    /// Project API URL, e.g. `https://xyz.supabase.co`
    #[serde(default)]
    pub url: String,
    /// Anonymous (publishable) API key
    #[serde(default)]
    pub anon_key: String,
}

/// Backend driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RemoteDriver {
    /// In-process tables seeded with demo data (default)
    #[default]
    Memory,
    /// PostgREST + GoTrue over HTTP
    Rest,
}

/// Site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Blog title shown in the header
    #[serde(default = "default_title")]
    pub title: String,
    /// Canonical posts table used by every page
    #[serde(default = "default_posts_table")]
    pub posts_table: String,
    /// Profiles table joined into post listings
    #[serde(default = "default_profiles_table")]
    pub profiles_table: String,
    /// Number of recent posts shown on the home page
    #[serde(default = "default_home_limit")]
    pub home_limit: usize,
    /// Offset applied when displaying dates
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            posts_table: default_posts_table(),
            profiles_table: default_profiles_table(),
            home_limit: default_home_limit(),
            utc_offset_hours: default_utc_offset_hours(),
        }
    }
}

fn default_title() -> String {
    "My Blog".to_string()
}

fn default_posts_table() -> String {
    "posts".to_string()
}

fn default_profiles_table() -> String {
    "profiles".to_string()
}

fn default_home_limit() -> usize {
    5
}

fn default_utc_offset_hours() -> i32 {
    9 // KST
}

/// Client session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name of the cookie identifying a browser client
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Idle lifetime of a client session in days
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            max_age_days: default_max_age_days(),
        }
    }
}

impl SessionConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_days * 24 * 60 * 60)
    }
}

fn default_cookie_name() -> String {
    "myblog_client".to_string()
}

fn default_max_age_days() -> u64 {
    7
}

/// Theme configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeConfig {
    /// Directory whose `.html` files override the built-in templates
    #[serde(default = "default_theme_path")]
    pub path: PathBuf,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            path: default_theme_path(),
        }
    }
}

fn default_theme_path() -> PathBuf {
    PathBuf::from("themes")
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - MYBLOG_SERVER_HOST
    /// - MYBLOG_SERVER_PORT
    /// - MYBLOG_REMOTE_DRIVER
    /// - MYBLOG_REMOTE_URL
    /// - MYBLOG_REMOTE_ANON_KEY
    /// - MYBLOG_SITE_TITLE
    /// - MYBLOG_SITE_POSTS_TABLE
    /// - MYBLOG_SITE_PROFILES_TABLE
    /// - MYBLOG_SITE_HOME_LIMIT
    /// - MYBLOG_SITE_UTC_OFFSET_HOURS
    /// - MYBLOG_SESSION_COOKIE_NAME
    /// - MYBLOG_SESSION_MAX_AGE_DAYS
    /// - MYBLOG_THEME_PATH
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("MYBLOG_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("MYBLOG_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }

        if let Ok(driver) = std::env::var("MYBLOG_REMOTE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "memory" => self.remote.driver = RemoteDriver::Memory,
                "rest" => self.remote.driver = RemoteDriver::Rest,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("MYBLOG_REMOTE_URL") {
            self.remote.url = url;
        }
        if let Ok(key) = std::env::var("MYBLOG_REMOTE_ANON_KEY") {
            self.remote.anon_key = key;
        }

        if let Ok(title) = std::env::var("MYBLOG_SITE_TITLE") {
            self.site.title = title;
        }
        if let Ok(table) = std::env::var("MYBLOG_SITE_POSTS_TABLE") {
            self.site.posts_table = table;
        }
        if let Ok(table) = std::env::var("MYBLOG_SITE_PROFILES_TABLE") {
            self.site.profiles_table = table;
        }
        if let Ok(limit) = std::env::var("MYBLOG_SITE_HOME_LIMIT") {
            if let Ok(limit) = limit.parse::<usize>() {
                self.site.home_limit = limit;
            }
        }
        if let Ok(offset) = std::env::var("MYBLOG_SITE_UTC_OFFSET_HOURS") {
            if let Ok(offset) = offset.parse::<i32>() {
                self.site.utc_offset_hours = offset;
            }
        }

        if let Ok(name) = std::env::var("MYBLOG_SESSION_COOKIE_NAME") {
            self.session.cookie_name = name;
        }

        if let Ok(days) = std::env::var("MYBLOG_SESSION_MAX_AGE_DAYS") {
            if let Ok(days) = days.parse::<u64>() {
                self.session.max_age_days = days;
            }
        }

        if let Ok(path) = std::env::var("MYBLOG_THEME_PATH") {
            self.theme.path = PathBuf::from(path);
        }
    }

    /// Check cross-field requirements that serde defaults cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.driver == RemoteDriver::Rest {
            if self.remote.url.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "remote.url is required for the rest driver".to_string(),
                ));
            }
            if self.remote.anon_key.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "remote.anon_key is required for the rest driver".to_string(),
                ));
            }
        }
        if self.site.posts_table.trim().is_empty() || self.site.profiles_table.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "table names must not be empty".to_string(),
            ));
        }
        if self.session.cookie_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "session.cookie_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_VARS: &[&str] = &[
    "MYBLOG_SERVER_HOST",
    "MYBLOG_SERVER_PORT",
    "MYBLOG_REMOTE_DRIVER",
    "MYBLOG_REMOTE_URL",
    "MYBLOG_REMOTE_ANON_KEY",
    "MYBLOG_SITE_TITLE",
    "MYBLOG_SITE_POSTS_TABLE",
    "MYBLOG_SITE_PROFILES_TABLE",
    "MYBLOG_SITE_HOME_LIMIT",
    "MYBLOG_SITE_UTC_OFFSET_HOURS",
    "MYBLOG_SESSION_COOKIE_NAME",
    "MYBLOG_SESSION_MAX_AGE_DAYS",
    "MYBLOG_THEME_PATH",
];


/// Property-based tests for configuration parsing
#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn table_name_strategy() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_-]{0,20}"
    }

    fn valid_config_strategy() -> impl Strategy<Value = Config> {
        (
            1024u16..65535,
            prop_oneof![Just(RemoteDriver::Memory), Just(RemoteDriver::Rest)],
            table_name_strategy(),
            1usize..50,
            -12i32..14,
        )
            .prop_map(|(port, driver, posts_table, home_limit, offset)| {
                let mut config = Config::default();
                config.server.port = port;
                config.remote.driver = driver;
                config.remote.url = "https://example.supabase.co".to_string();
                config.remote.anon_key = "anon".to_string();
                config.site.posts_table = posts_table;
                config.site.home_limit = home_limit;
                config.site.utc_offset_hours = offset;
                config
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        /// Serializing a config to YAML and loading it back yields the same values.
        #[test]
        fn config_yaml_roundtrip(config in valid_config_strategy()) {
            let yaml = serde_yaml::to_string(&config).expect("Failed to serialize config");

            let mut file = NamedTempFile::new().expect("Failed to create temp file");
            write!(file, "{}", yaml).expect("Failed to write config");

            let parsed = Config::load(file.path()).expect("Failed to parse config");

            prop_assert_eq!(config.server.port, parsed.server.port);
            prop_assert_eq!(config.remote.driver, parsed.remote.driver);
            prop_assert_eq!(&config.site.posts_table, &parsed.site.posts_table);
            prop_assert_eq!(config.site.home_limit, parsed.site.home_limit);
            prop_assert_eq!(config.site.utc_offset_hours, parsed.site.utc_offset_hours);
            prop_assert!(parsed.validate().is_ok());
        }
    }
}
