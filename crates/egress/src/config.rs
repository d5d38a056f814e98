use std::time::Duration;
use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable holding the egress gateway secret
pub const AUTH_SECRET_ENV: &str = "EGRESS_AUTH_SECRET";
/// Environment variable holding the db-ip API key
pub const DBIP_API_KEY_ENV: &str = "DBIP_API_KEY";
/// Environment variable overriding the endpoint directory URL
pub const DIRECTORY_URL_ENV: &str = "EGRESS_DIRECTORY_URL";

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config file: {0}")]
    ReadFailed(#[source] std::io::Error),
    #[error("failed to write config file: {0}")]
    WriteFailed(#[source] std::io::Error),
    #[error("failed to parse config file: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("no config directory available (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub probe: ProbeConfig,
    pub scheduler: SchedulerConfig,
    pub egress: EgressConfig,
    pub directory: DirectoryConfig,
    pub geolocation: GeolocationConfig,
    pub server: ServerConfig,
    pub retention: RetentionConfig,
}

/// What each probe measures and how long it may take
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub target_url: String,
    pub ping_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    /// Echo service answering with the caller's public IP as plain text
    pub ip_echo_url: String,
    pub address_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub default_concurrency: usize,
    pub max_concurrency: usize,
}

/// Gateway the egress points are reached through. The secret is never
/// stored in the file; it comes from `EGRESS_AUTH_SECRET`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EgressConfig {
    pub gateway_host: String,
    pub gateway_port: u16,
    pub username: Option<String>,
    #[serde(skip)]
    pub auth_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeolocationConfig {
    pub enabled: bool,
    pub base_url: String,
    pub timeout_secs: u64,
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            target_url: "https://www.google.com".into(),
            ping_timeout_secs: 10,
            fetch_timeout_secs: 15,
            ip_echo_url: "https://api.ipify.org".into(),
            address_timeout_secs: 5,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { default_concurrency: 10, max_concurrency: 50 }
    }
}

impl Default for EgressConfig {
    fn default() -> Self {
        Self {
            gateway_host: "rp.evomi.com".into(),
            gateway_port: 1000,
            username: None,
            auth_secret: None,
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self { url: None, timeout_secs: 10 }
    }
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.db-ip.com/v2".into(),
            timeout_secs: 5,
            api_key: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "0.0.0.0".into(), port: 8080 }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { ttl_secs: 3600, sweep_interval_secs: 60 }
    }
}

impl ProbeConfig {
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn address_timeout(&self) -> Duration {
        Duration::from_secs(self.address_timeout_secs)
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/egress-rank/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("egress-rank/config.toml"))
}

fn mask(secret: &Option<String>) -> &'static str {
    if secret.as_deref().is_some_and(|s| !s.is_empty()) { "<set>" } else { "<unset>" }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Configuration State:")?;
        write_title_1(f, "Probe")?;
        write_1(f, "Target URL", &self.probe.target_url)?;
        write_1(f, "Ping Timeout (s)", &self.probe.ping_timeout_secs)?;
        write_1(f, "Fetch Timeout (s)", &self.probe.fetch_timeout_secs)?;
        write_1(f, "IP Echo URL", &self.probe.ip_echo_url)?;
        write_title_1(f, "Scheduler")?;
        write_1(f, "Default Concurrency", &self.scheduler.default_concurrency)?;
        write_1(f, "Max Concurrency", &self.scheduler.max_concurrency)?;
        write_title_1(f, "Egress")?;
        write_1(f, "Gateway", &format!("{}:{}", self.egress.gateway_host, self.egress.gateway_port))?;
        write_1(f, "Username", &self.egress.username.as_deref().unwrap_or("<none>"))?;
        write_1(f, "Auth Secret", &mask(&self.egress.auth_secret))?;
        write_title_1(f, "Directory")?;
        write_1(f, "URL", &self.directory.url.as_deref().unwrap_or("<static list>"))?;
        write_title_1(f, "Geolocation")?;
        write_1(f, "Enabled", &self.geolocation.enabled)?;
        write_1(f, "Base URL", &self.geolocation.base_url)?;
        write_1(f, "API Key", &mask(&self.geolocation.api_key))?;
        write_title_1(f, "Server")?;
        write_1(f, "Bind Address", &self.server.bind)?;
        write_1(f, "Port", &self.server.port)?;
        write_title_1(f, "Retention")?;
        write_1(f, "TTL (s)", &self.retention.ttl_secs)?;
        write_1(f, "Sweep Interval (s)", &self.retention.sweep_interval_secs)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/egress-rank/config.toml
    ///  or the specified path, with the name config.toml if one does not exist.
    /// Secrets are then filled in from the process environment.
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let mut config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path).map_err(Error::ReadFailed)?;
            toml::from_str(raw_string.as_str())?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        config.apply_env(|name| env::var(name).ok());
        Ok(config)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &std::path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(Error::WriteFailed)?;
        }

        fs::write(path, config_str).map_err(Error::WriteFailed)
    }

    /// Fill secrets and overrides from an environment lookup
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(secret) = non_empty(AUTH_SECRET_ENV) {
            self.egress.auth_secret = Some(secret);
        }
        if let Some(key) = non_empty(DBIP_API_KEY_ENV) {
            self.geolocation.api_key = Some(key);
        }
        if let Some(url) = non_empty(DIRECTORY_URL_ENV) {
            self.directory.url = Some(url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_creates_default_config_when_missing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config");

        let config = Config::from_config(Some(&path)).unwrap();
        assert_eq!(config.scheduler.default_concurrency, 10);
        assert_eq!(config.probe.ping_timeout_secs, 10);
        assert_eq!(config.probe.fetch_timeout_secs, 15);
        assert!(dir.path().join("config.toml").exists());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[scheduler]\ndefault_concurrency = 4\n\n[server]\nport = 9000\n").unwrap();

        let config = Config::from_config(Some(&path)).unwrap();
        assert_eq!(config.scheduler.default_concurrency, 4);
        assert_eq!(config.scheduler.max_concurrency, 50);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind, "0.0.0.0");
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[scheduler\n").unwrap();

        assert!(matches!(Config::from_config(Some(&path)), Err(Error::ParseFailed(_))));
    }

    #[test]
    fn test_apply_env_reads_secrets() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (AUTH_SECRET_ENV, "s3cret"),
            (DBIP_API_KEY_ENV, ""),
            (DIRECTORY_URL_ENV, "http://directory.test/isps"),
        ]);
        let mut config = Config::default();
        config.apply_env(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.egress.auth_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.geolocation.api_key, None);
        assert_eq!(config.directory.url.as_deref(), Some("http://directory.test/isps"));
    }

    #[test]
    fn test_display_masks_secrets() {
        let mut config = Config::default();
        config.egress.auth_secret = Some("s3cret".into());
        let shown = config.to_string();
        assert!(shown.contains("Auth Secret: <set>"));
        assert!(!shown.contains("s3cret"));
    }
}
