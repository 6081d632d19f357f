//! Server configuration.
//!
//! Configuration comes from a YAML file (`config.yaml` in the working
//! directory) overridden by `MOONRES_*` environment variables. Every
//! option has a default, so the server runs with no file at all.
//! Invalid values are fatal at startup.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use moonres_persistence::FsyncPolicy;

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        message: message.into(),
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub gc: GcConfig,
    pub log: LogConfig,
    pub persistence: PersistenceConfig,
}

/// Network settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 6380,
        }
    }
}

/// Storage engine shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Shard count; must be a power of two no greater than 64.
    pub shards: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { shards: 32 }
    }
}

/// Background active-expiration settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GcConfig {
    pub enabled: bool,
    /// How often to run the background check.
    #[serde(deserialize_with = "de_duration")]
    pub interval: Duration,
    /// How many keys to inspect per shard per loop.
    pub samples_per_check: usize,
    /// In [0, 1]: if expired/scanned reaches this, repeat immediately.
    pub match_threshold: f64,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_millis(100),
            samples_per_check: 20,
            match_threshold: 0.25,
        }
    }
}

/// Logging verbosity and output encoding.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// debug, info, warn, error
    pub level: String,
    /// json or console
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "debug".into(),
            format: "json".into(),
        }
    }
}

/// Durability settings for both sinks.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub aof: AofConfig,
    pub rdb: RdbConfig,
}

/// Append-only log settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AofConfig {
    pub enabled: bool,
    pub filename: String,
    /// always, everysec, no
    pub fsync: String,
}

impl Default for AofConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            filename: "appendonly.aof".into(),
            fsync: "everysec".into(),
        }
    }
}

/// Point-in-time snapshot settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RdbConfig {
    pub enabled: bool,
    pub filename: String,
    /// Auto-save period; zero disables the ticker.
    #[serde(deserialize_with = "de_duration")]
    pub interval: Duration,
}

impl Default for RdbConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            filename: "dump.rdb".into(),
            interval: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Loads configuration: file (if present), then environment
    /// overrides, then validation.
    pub fn load(dir: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let mut config = Self::from_dir(dir.as_ref())?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_dir(dir: &Path) -> Result<Config, ConfigError> {
        for name in ["config.yaml", "config.yml"] {
            let path = dir.join(name);
            if path.exists() {
                let contents = std::fs::read_to_string(&path)?;
                return Ok(serde_yaml::from_str(&contents)?);
            }
        }
        Ok(Config::default())
    }

    /// Applies `MOONRES_*` overrides from `lookup` (the environment in
    /// production; injectable for tests).
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup("MOONRES_SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("MOONRES_SERVER_PORT") {
            self.server.port = v
                .parse()
                .map_err(|_| invalid("server.port", format!("not a port number: {v}")))?;
        }
        if let Some(v) = lookup("MOONRES_STORAGE_SHARDS") {
            self.storage.shards = v
                .parse()
                .map_err(|_| invalid("storage.shards", format!("not a number: {v}")))?;
        }
        if let Some(v) = lookup("MOONRES_GC_ENABLED") {
            self.gc.enabled = parse_bool("gc.enabled", &v)?;
        }
        if let Some(v) = lookup("MOONRES_GC_INTERVAL") {
            self.gc.interval = parse_duration(&v)
                .ok_or_else(|| invalid("gc.interval", format!("not a duration: {v}")))?;
        }
        if let Some(v) = lookup("MOONRES_GC_SAMPLES_PER_CHECK") {
            self.gc.samples_per_check = v
                .parse()
                .map_err(|_| invalid("gc.samples_per_check", format!("not a number: {v}")))?;
        }
        if let Some(v) = lookup("MOONRES_GC_MATCH_THRESHOLD") {
            self.gc.match_threshold = v
                .parse()
                .map_err(|_| invalid("gc.match_threshold", format!("not a number: {v}")))?;
        }
        if let Some(v) = lookup("MOONRES_LOG_LEVEL") {
            self.log.level = v;
        }
        if let Some(v) = lookup("MOONRES_LOG_FORMAT") {
            self.log.format = v;
        }
        if let Some(v) = lookup("MOONRES_PERSISTENCE_AOF_ENABLED") {
            self.persistence.aof.enabled = parse_bool("persistence.aof.enabled", &v)?;
        }
        if let Some(v) = lookup("MOONRES_PERSISTENCE_AOF_FILENAME") {
            self.persistence.aof.filename = v;
        }
        if let Some(v) = lookup("MOONRES_PERSISTENCE_AOF_FSYNC") {
            self.persistence.aof.fsync = v;
        }
        if let Some(v) = lookup("MOONRES_PERSISTENCE_RDB_ENABLED") {
            self.persistence.rdb.enabled = parse_bool("persistence.rdb.enabled", &v)?;
        }
        if let Some(v) = lookup("MOONRES_PERSISTENCE_RDB_FILENAME") {
            self.persistence.rdb.filename = v;
        }
        if let Some(v) = lookup("MOONRES_PERSISTENCE_RDB_INTERVAL") {
            self.persistence.rdb.interval = parse_duration(&v)
                .ok_or_else(|| invalid("persistence.rdb.interval", format!("not a duration: {v}")))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        parse_fsync_policy(&self.persistence.aof.fsync)?;
        if !(0.0..=1.0).contains(&self.gc.match_threshold) {
            return Err(invalid(
                "gc.match_threshold",
                format!("{} is outside [0, 1]", self.gc.match_threshold),
            ));
        }
        Ok(())
    }

    /// The listen endpoint as `host:port`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Parses an fsync policy name.
pub fn parse_fsync_policy(input: &str) -> Result<FsyncPolicy, ConfigError> {
    match input.to_ascii_lowercase().as_str() {
        "always" => Ok(FsyncPolicy::Always),
        "everysec" => Ok(FsyncPolicy::EverySec),
        "no" => Ok(FsyncPolicy::No),
        _ => Err(invalid(
            "persistence.aof.fsync",
            format!("unknown policy '{input}'. valid options: always, everysec, no"),
        )),
    }
}

fn parse_bool(key: &str, input: &str) -> Result<bool, ConfigError> {
    match input.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(invalid(key, format!("not a boolean: {input}"))),
    }
}

/// Parses duration strings of the form `100ms`, `60s`, `5m`, `1h`.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim();
    let split = input.find(|c: char| !c.is_ascii_digit())?;
    let (digits, unit) = input.split_at(split);
    let n: u64 = digits.parse().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(n)),
        "s" => Some(Duration::from_secs(n)),
        "m" => Some(Duration::from_secs(n.checked_mul(60)?)),
        "h" => Some(Duration::from_secs(n.checked_mul(3600)?)),
        _ => None,
    }
}

fn de_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid duration: '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 6380);
        assert_eq!(cfg.storage.shards, 32);
        assert!(cfg.gc.enabled);
        assert_eq!(cfg.gc.interval, Duration::from_millis(100));
        assert_eq!(cfg.gc.samples_per_check, 20);
        assert_eq!(cfg.gc.match_threshold, 0.25);
        assert_eq!(cfg.log.level, "debug");
        assert_eq!(cfg.log.format, "json");
        assert!(!cfg.persistence.aof.enabled);
        assert_eq!(cfg.persistence.aof.filename, "appendonly.aof");
        assert_eq!(cfg.persistence.aof.fsync, "everysec");
        assert!(!cfg.persistence.rdb.enabled);
        assert_eq!(cfg.persistence.rdb.filename, "dump.rdb");
        assert_eq!(cfg.persistence.rdb.interval, Duration::from_secs(60));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.server.port, 6380);
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.yaml"),
            r#"
server:
  port: 7000
storage:
  shards: 8
gc:
  interval: 250ms
persistence:
  aof:
    enabled: true
    fsync: always
"#,
        )
        .unwrap();

        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.server.port, 7000);
        assert_eq!(cfg.storage.shards, 8);
        assert_eq!(cfg.gc.interval, Duration::from_millis(250));
        assert!(cfg.persistence.aof.enabled);
        assert_eq!(cfg.persistence.aof.fsync, "always");
        // untouched sections keep their defaults
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert!(!cfg.persistence.rdb.enabled);
    }

    #[test]
    fn environment_overrides_file() {
        let mut cfg = Config::default();
        cfg.apply_overrides(|name| match name {
            "MOONRES_SERVER_PORT" => Some("6999".into()),
            "MOONRES_STORAGE_SHARDS" => Some("4".into()),
            "MOONRES_GC_ENABLED" => Some("false".into()),
            "MOONRES_PERSISTENCE_RDB_INTERVAL" => Some("5s".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(cfg.server.port, 6999);
        assert_eq!(cfg.storage.shards, 4);
        assert!(!cfg.gc.enabled);
        assert_eq!(cfg.persistence.rdb.interval, Duration::from_secs(5));
    }

    #[test]
    fn bad_override_is_an_error() {
        let mut cfg = Config::default();
        let err = cfg
            .apply_overrides(|name| {
                (name == "MOONRES_SERVER_PORT").then(|| "not-a-port".into())
            })
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn parse_duration_forms() {
        assert_eq!(parse_duration("100ms"), Some(Duration::from_millis(100)));
        assert_eq!(parse_duration("60s"), Some(Duration::from_secs(60)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("10"), None);
        assert_eq!(parse_duration("ms"), None);
        assert_eq!(parse_duration("ten seconds"), None);
    }

    #[test]
    fn parse_fsync_policies() {
        assert_eq!(parse_fsync_policy("always").unwrap(), FsyncPolicy::Always);
        assert_eq!(parse_fsync_policy("everysec").unwrap(), FsyncPolicy::EverySec);
        assert_eq!(parse_fsync_policy("no").unwrap(), FsyncPolicy::No);
        assert_eq!(parse_fsync_policy("ALWAYS").unwrap(), FsyncPolicy::Always);
        assert!(parse_fsync_policy("sometimes").is_err());
    }

    #[test]
    fn validate_rejects_bad_threshold() {
        let mut cfg = Config::default();
        cfg.gc.match_threshold = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn bind_address_joins_host_and_port() {
        let cfg = Config::default();
        assert_eq!(cfg.bind_address(), "0.0.0.0:6380");
    }
}
