use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::DeviceConfig;
use crate::error::{Error, Result};

/// A private key read into memory ahead of connecting.
pub struct PrivateKey {
    path: PathBuf,
    pem: String,
}

impl PrivateKey {
    /// Reads a PEM or OpenSSH private key file.
    pub fn load(path: &Path) -> Result<Self> {
        let pem = fs::read_to_string(path).map_err(|e| Error::KeyLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if !pem.contains("PRIVATE KEY-----") {
            return Err(Error::KeyLoad {
                path: path.to_path_buf(),
                reason: "file does not contain a PEM or OpenSSH private key".to_string(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            pem,
        })
    }

    /// Loads the key named by the device configuration.
    pub fn from_config(config: &DeviceConfig) -> Result<Self> {
        match config.expanded_ssh_key() {
            Some(path) => Self::load(&path),
            None => Err(Error::KeyLoad {
                path: PathBuf::new(),
                reason: format!("no ssh_key configured for {}", config.host),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("path", &self.path)
            .field("pem", &"<redacted>")
            .finish()
    }
}
