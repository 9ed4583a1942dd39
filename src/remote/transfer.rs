//! SCP retrieval of result files from the device.

use log::{debug, info, warn};
use std::path::{Path, PathBuf};

use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::remote::diagnostics::diagnose_retrieval_error;
use crate::remote::key::PrivateKey;
use crate::remote::session::{Connector, RemoteSession, SshConnector};

/// Copies files off a device over SCP, one session per download.
pub struct FileRetriever<C: Connector = SshConnector> {
    config: DeviceConfig,
    connector: C,
}

impl FileRetriever<SshConnector> {
    pub fn new(config: DeviceConfig) -> Self {
        Self::with_connector(config, SshConnector)
    }
}

impl<C: Connector> FileRetriever<C> {
    pub fn with_connector(config: DeviceConfig, connector: C) -> Self {
        Self { config, connector }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Downloads `remote_path` to `local_path` and returns the bytes written.
    ///
    /// If `local_path` is an existing directory the file keeps its remote
    /// name inside it. The private key is read before any connection is
    /// attempted. Once connected, the session is closed exactly once after
    /// the copy, whether or not the copy succeeded.
    pub fn download_file(&self, remote_path: &Path, local_path: &Path) -> Result<u64> {
        let result = self.download_inner(remote_path, local_path);

        if let Err(ref e) = result {
            if let Some(hint) = diagnose_retrieval_error(e, &self.config) {
                warn!("{}", hint);
            }
        }

        result
    }

    fn download_inner(&self, remote_path: &Path, local_path: &Path) -> Result<u64> {
        let key = PrivateKey::from_config(&self.config)?;
        let destination = resolve_destination(remote_path, local_path)?;

        let mut session = self.connector.connect(&self.config, &key)?;
        let copied = session.recv_file(remote_path, &destination);
        let closed = session.close();

        let bytes = copied?;
        if let Err(e) = closed {
            // The file is already complete on disk.
            warn!("{}", e);
        }

        info!(
            "Downloaded {} ({} bytes) to {}",
            remote_path.display(),
            bytes,
            destination.display()
        );
        Ok(bytes)
    }
}

/// Places the download inside `local_path` when it names a directory.
fn resolve_destination(remote_path: &Path, local_path: &Path) -> Result<PathBuf> {
    if !local_path.is_dir() {
        return Ok(local_path.to_path_buf());
    }

    let name = remote_path.file_name().ok_or_else(|| {
        Error::Transfer(format!(
            "Remote path {} does not name a file",
            remote_path.display()
        ))
    })?;
    let destination = local_path.join(name);
    debug!(
        "{} is a directory, writing to {}",
        local_path.display(),
        destination.display()
    );
    Ok(destination)
}
