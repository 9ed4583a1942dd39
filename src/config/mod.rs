//! Configuration for reaching a Flex device.
//!
//! A [`DeviceConfig`] describes one device: where its HTTP control API and
//! SSH endpoint live, which key to authenticate with, and how its host key
//! is verified. Several devices can be kept by name in a [`Config`] file.
//!
//! # Configuration File Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/flexlink/config.yml`
//! - macOS: `~/Library/Application Support/flexlink/config.yml`
//! - Windows: `C:\Users\<User>\AppData\Roaming\flexlink\config.yml`
//!
//! # Example Configuration
//!
//! ```yaml
//! devices:
//!   bench-flex:
//!     host: "10.154.3.53"
//!     ssh_key: "~/.ssh/flex_key"
//!     host_key:
//!       kind: known_hosts
//!       value: "~/.ssh/known_hosts"
//!   spare-flex:
//!     host: "169.254.12.7"
//!     ssh_key: "~/.ssh/flex_key"
//!     host_key:
//!       kind: fingerprint
//!       value: "SHA256:nThbg6kXUpJWGl7E1IGOCspRomTxdCARLviKw6E5SY8"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Port of the device's HTTP control API.
pub const DEFAULT_HTTP_PORT: u16 = 31950;

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// The device only accepts SSH logins as root.
pub const DEFAULT_USER: &str = "root";

/// Value sent in the `Opentrons-Version` header.
pub const DEFAULT_API_VERSION: &str = "3";

/// Default request and socket timeout in seconds
pub const DEFAULT_TIMEOUT: u64 = 60;

/// Named device configurations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub devices: HashMap<String, DeviceConfig>,
}

/// How the SSH server's host key is checked before authenticating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum HostKeyPolicy {
    /// The key must match an entry for the host in an OpenSSH known_hosts file.
    KnownHosts(String),
    /// The SHA-256 fingerprint of the key must equal this value, given as hex
    /// or in the OpenSSH `SHA256:<base64>` form.
    Fingerprint(String),
}

impl Default for HostKeyPolicy {
    fn default() -> Self {
        HostKeyPolicy::KnownHosts("~/.ssh/known_hosts".to_string())
    }
}

/// Configuration for a single device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Wired or wireless IP address (or hostname) of the device
    pub host: String,

    /// HTTP control API port (default: 31950)
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// SSH port (default: 22)
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,

    /// SSH username (default: root)
    #[serde(default = "default_user")]
    pub user: String,

    /// Path to the SSH private key file, required for file retrieval
    pub ssh_key: Option<String>,

    #[serde(default)]
    pub host_key: HostKeyPolicy,

    /// Value of the `Opentrons-Version` request header
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Timeout in seconds for HTTP requests and SSH socket I/O, 0 disables it
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_http_port() -> u16 {
    DEFAULT_HTTP_PORT
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

fn default_user() -> String {
    DEFAULT_USER.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT
}

impl Config {
    /// Returns the default configuration file path for the current platform.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("flexlink").join("config.yml"))
    }

    /// Loads configuration from the default location.
    ///
    /// Returns `Ok(Config::default())` if no config file exists.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Config::default()),
        }
    }

    /// Loads configuration from a specific file path.
    ///
    /// Returns `Ok(Config::default())` if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to read config file: {}\n\n\
                     File path: {}\n\n\
                     Suggestions:\n\
                     • Check file permissions: ls -la {}\n\
                     • Verify the file is readable",
                    e,
                    path.display(),
                    path.display()
                ),
            ))
        })?;

        serde_yaml::from_str(&contents).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file: {}\n\n\
                 File path: {}\n\n\
                 Suggestions:\n\
                 • Check YAML syntax in the config file\n\
                 • Verify indentation uses spaces, not tabs\n\n\
                 Example valid config:\n\
                 devices:\n\
                   my-flex:\n\
                     host: \"10.0.0.12\"\n\
                     ssh_key: \"~/.ssh/flex_key\"",
                e,
                path.display()
            ))
        })
    }

    /// Saves configuration to the default location.
    pub fn save(&self) -> Result<()> {
        match Self::default_path() {
            Some(path) => self.save_to(&path),
            None => Err(Error::Config(
                "Could not determine config directory\n\n\
                 Suggestions:\n\
                 • Check HOME environment variable is set\n\
                 • Verify XDG_CONFIG_HOME is accessible"
                    .to_string(),
            )),
        }
    }

    /// Saves configuration to a specific file path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create config directory {}: {}",
                        parent.display(),
                        e
                    ),
                ))
            })?;
        }

        let contents = serde_yaml::to_string(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, contents).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write config file {}: {}", path.display(), e),
            ))
        })
    }

    /// Gets a device configuration by name.
    pub fn get_device(&self, name: &str) -> Option<&DeviceConfig> {
        self.devices.get(name)
    }

    /// Adds or updates a device configuration.
    pub fn set_device(&mut self, name: String, config: DeviceConfig) {
        self.devices.insert(name, config);
    }

    /// Removes a device configuration.
    pub fn remove_device(&mut self, name: &str) -> Option<DeviceConfig> {
        self.devices.remove(name)
    }
}

impl DeviceConfig {
    /// Creates a device configuration with defaults for everything but the host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            http_port: DEFAULT_HTTP_PORT,
            ssh_port: DEFAULT_SSH_PORT,
            user: DEFAULT_USER.to_string(),
            ssh_key: None,
            host_key: HostKeyPolicy::default(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_http_port(mut self, port: u16) -> Self {
        self.http_port = port;
        self
    }

    pub fn with_ssh_port(mut self, port: u16) -> Self {
        self.ssh_port = port;
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_ssh_key(mut self, key_path: impl Into<String>) -> Self {
        self.ssh_key = Some(key_path.into());
        self
    }

    pub fn with_host_key(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key = policy;
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base URL of the HTTP control API, e.g. `http://10.0.0.12:31950`.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.http_port)
    }

    /// Returns the SSH connection string (user@host:port).
    pub fn connection_string(&self) -> String {
        if self.ssh_port == DEFAULT_SSH_PORT {
            format!("{}@{}", self.user, self.host)
        } else {
            format!("{}@{}:{}", self.user, self.host, self.ssh_port)
        }
    }

    /// Expands the SSH key path, replacing ~ with the home directory.
    pub fn expanded_ssh_key(&self) -> Option<PathBuf> {
        self.ssh_key.as_deref().map(expand_path)
    }
}

/// Expands ~ in paths to the home directory.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_device_config_new() {
        let device = DeviceConfig::new("10.154.3.53");
        assert_eq!(device.host, "10.154.3.53");
        assert_eq!(device.http_port, 31950);
        assert_eq!(device.ssh_port, 22);
        assert_eq!(device.user, "root");
        assert_eq!(device.api_version, "3");
        assert!(device.ssh_key.is_none());
        assert_eq!(
            device.host_key,
            HostKeyPolicy::KnownHosts("~/.ssh/known_hosts".to_string())
        );
    }

    #[test]
    fn test_device_config_builder() {
        let device = DeviceConfig::new("flex.local")
            .with_http_port(8080)
            .with_ssh_port(2222)
            .with_user("operator")
            .with_ssh_key("~/.ssh/flex_key")
            .with_host_key(HostKeyPolicy::Fingerprint("ab:cd".to_string()))
            .with_api_version("4")
            .with_timeout(0);

        assert_eq!(device.http_port, 8080);
        assert_eq!(device.ssh_port, 2222);
        assert_eq!(device.user, "operator");
        assert_eq!(device.ssh_key.as_deref(), Some("~/.ssh/flex_key"));
        assert_eq!(device.host_key, HostKeyPolicy::Fingerprint("ab:cd".to_string()));
        assert_eq!(device.api_version, "4");
        assert_eq!(device.timeout, 0);
    }

    #[test]
    fn test_base_url_and_connection_string() {
        let device = DeviceConfig::new("10.0.0.12");
        assert_eq!(device.base_url(), "http://10.0.0.12:31950");
        assert_eq!(device.connection_string(), "root@10.0.0.12");

        let device = device.with_ssh_port(2222);
        assert_eq!(device.connection_string(), "root@10.0.0.12:2222");
    }

    #[test]
    fn test_expand_path() {
        assert_eq!(expand_path("/absolute/path"), PathBuf::from("/absolute/path"));
        assert_eq!(expand_path("relative/key"), PathBuf::from("relative/key"));

        let expanded = expand_path("~/.ssh/flex_key");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join(".ssh/flex_key"));
        }
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let yaml = "devices:\n  bench:\n    host: \"10.0.0.5\"\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let device = config.get_device("bench").unwrap();
        assert_eq!(device, &DeviceConfig::new("10.0.0.5"));
    }

    #[test]
    fn test_host_key_policy_yaml() {
        let yaml = "host: flex\nhost_key:\n  kind: fingerprint\n  value: \"00:11\"\n";
        let device: DeviceConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(device.host_key, HostKeyPolicy::Fingerprint("00:11".to_string()));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yml");

        let mut config = Config::default();
        config.set_device(
            "bench".to_string(),
            DeviceConfig::new("10.0.0.5").with_ssh_key("/keys/flex_key"),
        );
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.get_device("bench"), config.get_device("bench"));
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("absent.yml")).unwrap();
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "devices: [not, a, map").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_remove_device() {
        let mut config = Config::default();
        config.set_device("a".to_string(), DeviceConfig::new("a.local"));
        assert!(config.remove_device("a").is_some());
        assert!(config.get_device("a").is_none());
    }
}
