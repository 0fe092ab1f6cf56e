//! Configuration file parser for `websub-bridge.toml`.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
//! A few settings can be overridden from the environment, see
//! [`Config::apply_overrides`].
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::Path;
use thiserror::Error;

use crate::dedup::DEFAULT_CAPACITY;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// Values parse but cannot be used together.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
///
/// SEC-015: Custom Debug impl masks every secret (hub secrets, MQTT
/// password) to prevent leakage in logs, error messages, and debug output.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP callback server binds to.
    pub listen_addr: String,

    /// Path of the WebSub callback endpoint.
    pub callback_path: String,

    /// Largest accepted notification body in bytes.
    pub max_body_bytes: usize,

    /// First segment of every published topic.
    pub organization: String,

    /// Second segment of every published topic.
    pub project: String,

    /// HMAC secret used for feeds that do not set their own.
    pub hub_secret: Option<String>,

    /// SQLite file for the post journal and subscription leases.
    /// `None` keeps everything in memory.
    pub database_path: Option<String>,

    pub dedup: DedupConfig,

    pub mqtt: MqttConfig,

    /// Feed topics we expect hubs to verify and deliver for.
    pub feeds: Vec<FeedConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            callback_path: "/websub/webhook".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
            organization: "websub".to_string(),
            project: "firehose".to_string(),
            hub_secret: None,
            database_path: None,
            dedup: DedupConfig::default(),
            mqtt: MqttConfig::default(),
            feeds: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Maximum number of entry ids remembered.
    pub capacity: usize,
    /// Forget ids older than this many hours. 0 = keep until evicted by capacity.
    pub retention_hours: u64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            retention_hours: 0,
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    /// Overridden by `MQTT_PASSWORD`.
    pub password: Option<String>,
    /// Connect over TLS using the platform's default roots.
    pub tls: bool,
    pub keep_alive_secs: u64,
    /// Upper bound on a single publish before it counts as failed.
    pub publish_timeout_ms: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "websub-bridge".to_string(),
            username: None,
            password: None,
            tls: false,
            keep_alive_secs: 30,
            publish_timeout_ms: 5_000,
        }
    }
}

/// One monitored feed.
#[derive(Clone, Deserialize)]
pub struct FeedConfig {
    /// Topic URL the hub uses for this feed (`hub.topic`, `Link rel="self"`).
    pub topic: String,
    /// Suffix for the bus topic. `None` publishes to `{organization}/{project}`.
    #[serde(default)]
    pub tag: Option<String>,
    /// HMAC secret for this feed, overriding `hub_secret`.
    #[serde(default)]
    pub secret: Option<String>,
}

/// SEC-015: Mask secrets in Debug output to prevent secret leakage.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("listen_addr", &self.listen_addr)
            .field("callback_path", &self.callback_path)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("organization", &self.organization)
            .field("project", &self.project)
            .field("hub_secret", &self.hub_secret.as_ref().map(|_| "[REDACTED]"))
            .field("database_path", &self.database_path)
            .field("dedup", &self.dedup)
            .field("mqtt", &self.mqtt)
            .field("feeds", &self.feeds)
            .finish()
    }
}

impl std::fmt::Debug for MqttConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("tls", &self.tls)
            .field("keep_alive_secs", &self.keep_alive_secs)
            .field("publish_timeout_ms", &self.publish_timeout_ms)
            .finish()
    }
}

impl std::fmt::Debug for FeedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedConfig")
            .field("topic", &self.topic)
            .field("tag", &self.tag)
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    /// - Inconsistent values → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading to prevent memory exhaustion
        // from a maliciously large or corrupted config file.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {} // Size is within limits, proceed
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        // Parse the TOML content first as a raw table to detect unknown keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "listen_addr",
                "callback_path",
                "max_body_bytes",
                "organization",
                "project",
                "hub_secret",
                "database_path",
                "dedup",
                "mqtt",
                "feeds",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            feeds = config.feeds.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Applies overrides from a key lookup (the process environment in
    /// production):
    ///
    /// - `MQTT_USERNAME`, `MQTT_PASSWORD`, `MQTT_CLIENT_ID`
    /// - `WEBSUB_LISTEN_ADDR`
    ///
    /// Environment values take precedence over the file.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(username) = present("MQTT_USERNAME") {
            self.mqtt.username = Some(username);
        }
        if let Some(password) = present("MQTT_PASSWORD") {
            self.mqtt.password = Some(password);
        }
        if let Some(client_id) = present("MQTT_CLIENT_ID") {
            self.mqtt.client_id = client_id;
        }
        if let Some(addr) = present("WEBSUB_LISTEN_ADDR") {
            self.listen_addr = addr;
        }
    }

    /// Checks values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.organization.trim().is_empty() || self.project.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "organization and project must not be empty".to_string(),
            ));
        }
        if !self.callback_path.starts_with('/') || self.callback_path == "/" {
            return Err(ConfigError::Invalid(format!(
                "callback_path must be a path below '/': {}",
                self.callback_path
            )));
        }
        if self.dedup.capacity == 0 {
            return Err(ConfigError::Invalid(
                "dedup.capacity must be at least 1".to_string(),
            ));
        }
        for feed in &self.feeds {
            let url = url::Url::parse(&feed.topic).map_err(|e| {
                ConfigError::Invalid(format!("feed topic '{}' is not a URL: {}", feed.topic, e))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::Invalid(format!(
                    "feed topic '{}' must be http or https",
                    feed.topic
                )));
            }
            if let Some(tag) = &feed.tag {
                if tag.is_empty() || tag.contains(['/', '+', '#']) {
                    return Err(ConfigError::Invalid(format!(
                        "feed tag '{}' is not a valid topic segment",
                        tag
                    )));
                }
            }
        }
        Ok(())
    }

    /// Looks up the configured feed for a hub topic URL.
    pub fn feed_for_topic(&self, topic: &str) -> Option<&FeedConfig> {
        let topic = topic.trim();
        self.feeds.iter().find(|f| f.topic == topic)
    }

    /// Secret that signs deliveries for `feed`, if any.
    pub fn secret_for<'a>(&'a self, feed: Option<&'a FeedConfig>) -> Option<&'a str> {
        feed.and_then(|f| f.secret.as_deref())
            .or(self.hub_secret.as_deref())
            .filter(|s| !s.is_empty())
    }

    pub fn dedup_capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.dedup.capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Retention window for the dedup tracker, `None` when disabled.
    pub fn dedup_retention(&self) -> Option<chrono::Duration> {
        match self.dedup.retention_hours {
            0 => None,
            hours => Some(chrono::Duration::hours(hours.min(i64::MAX as u64) as i64)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
