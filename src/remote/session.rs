//! SSH sessions to the device.
//!
//! [`Connector`] and [`RemoteSession`] separate establishing a session from
//! using it, so the copy/close sequence in
//! [`FileRetriever`](crate::remote::FileRetriever) runs the same way over
//! `ssh2` or a test double.

use log::{debug, info, warn};
use ssh2::{Channel, Session};
use std::io::{self, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;

use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::remote::host_key::verify_host_key;
use crate::remote::key::PrivateKey;

/// Opens authenticated sessions to a device.
pub trait Connector {
    type Session: RemoteSession;

    fn connect(&self, config: &DeviceConfig, key: &PrivateKey) -> Result<Self::Session>;
}

/// An established session able to copy files off the device.
pub trait RemoteSession {
    /// Copies one remote file to `local_path` and returns the bytes written.
    ///
    /// The copy channel is released before this returns, on success or error.
    fn recv_file(&mut self, remote_path: &Path, local_path: &Path) -> Result<u64>;

    /// Ends the session.
    fn close(self) -> Result<()>;
}

/// Connects with `ssh2` over a blocking TCP socket.
#[derive(Debug, Default, Clone, Copy)]
pub struct SshConnector;

impl Connector for SshConnector {
    type Session = SshSession;

    fn connect(&self, config: &DeviceConfig, key: &PrivateKey) -> Result<SshSession> {
        info!("Connecting to {}:{}", config.host, config.ssh_port);

        let addr_str = format!("{}:{}", config.host, config.ssh_port);
        let addr = addr_str
            .to_socket_addrs()
            .map_err(|e| {
                Error::Connection(format!("Failed to resolve host '{}': {}", config.host, e))
            })?
            .next()
            .ok_or_else(|| {
                Error::Connection(format!("No addresses found for host '{}'", config.host))
            })?;

        let timeout = (config.timeout > 0).then(|| Duration::from_secs(config.timeout));
        let tcp = match timeout {
            Some(t) => TcpStream::connect_timeout(&addr, t),
            None => TcpStream::connect(addr),
        }
        .map_err(|e| Error::Connection(format!("Failed to connect to {}: {}", addr, e)))?;

        tcp.set_read_timeout(timeout).map_err(Error::Io)?;
        tcp.set_write_timeout(timeout).map_err(Error::Io)?;

        let mut session = Session::new()
            .map_err(|e| Error::Connection(format!("Failed to create SSH session: {}", e)))?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| Error::Connection(format!("SSH handshake failed: {}", e)))?;

        verify_host_key(&session, config)?;
        debug!("Host key verified for {}", config.host);

        debug!(
            "Authenticating as {} with {}",
            config.user,
            key.path().display()
        );
        session
            .userauth_pubkey_memory(&config.user, None, key.pem(), None)
            .map_err(|e| Error::Authentication {
                user: config.user.clone(),
                reason: e.to_string(),
            })?;

        if !session.authenticated() {
            return Err(Error::Authentication {
                user: config.user.clone(),
                reason: "server did not accept the key".to_string(),
            });
        }

        debug!("SSH session established to {}", config.connection_string());
        Ok(SshSession {
            session,
            host: config.host.clone(),
        })
    }
}

pub struct SshSession {
    session: Session,
    host: String,
}

impl RemoteSession for SshSession {
    fn recv_file(&mut self, remote_path: &Path, local_path: &Path) -> Result<u64> {
        info!(
            "Copying {}:{} to {}",
            self.host,
            remote_path.display(),
            local_path.display()
        );

        let (mut channel, stat) = self.session.scp_recv(remote_path).map_err(|e| {
            Error::Transfer(format!(
                "Failed to open SCP channel for {}: {}",
                remote_path.display(),
                e
            ))
        })?;

        let outcome = receive_into(&mut channel, stat.size(), local_path);

        // Dropping the channel releases it regardless.
        if let Err(e) = shutdown_channel(&mut channel) {
            warn!("SCP channel did not shut down cleanly: {}", e);
        }

        let received = outcome?;
        debug!("Received {} bytes", received);
        Ok(received)
    }

    fn close(self) -> Result<()> {
        debug!("Closing SSH session to {}", self.host);
        self.session
            .disconnect(None, "transfer finished", None)
            .map_err(|e| Error::Connection(format!("Failed to close SSH session: {}", e)))
    }
}

/// Streams `reader` into `destination`, replacing it only once exactly
/// `expected` bytes have arrived.
///
/// Bytes are staged in a temporary file beside the destination. On failure
/// the staged file is removed and an existing destination is left untouched.
pub(crate) fn receive_into<R: Read>(
    reader: &mut R,
    expected: u64,
    destination: &Path,
) -> Result<u64> {
    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir).map_err(|e| {
        Error::Io(io::Error::new(
            e.kind(),
            format!("Failed to create a file in {}: {}", dir.display(), e),
        ))
    })?;

    let received = io::copy(reader, staged.as_file_mut()).map_err(|e| {
        Error::Transfer(format!(
            "Failed to copy into {}: {}",
            destination.display(),
            e
        ))
    })?;
    if received != expected {
        return Err(Error::IncompleteTransfer { expected, received });
    }

    staged.persist(destination).map_err(|e| {
        Error::Io(io::Error::new(
            e.error.kind(),
            format!("Failed to write {}: {}", destination.display(), e.error),
        ))
    })?;
    Ok(received)
}

fn shutdown_channel(channel: &mut Channel) -> std::result::Result<(), ssh2::Error> {
    channel.send_eof()?;
    channel.wait_eof()?;
    channel.close()?;
    channel.wait_close()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CONTENTS: &[u8] = b"well,volume\nA1,50\nA2,48.5\n";
    const PREVIOUS: &[u8] = b"well,volume\nA1,50\n";

    /// Yields its bytes, then fails instead of reaching EOF.
    struct BrokenReader(io::Cursor<Vec<u8>>);

    impl Read for BrokenReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.read(buf)? {
                0 => Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "channel reset",
                )),
                n => Ok(n),
            }
        }
    }

    fn entries(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_receive_into_writes_complete_file() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("results.csv");
        let mut reader = io::Cursor::new(CONTENTS.to_vec());

        let received = receive_into(&mut reader, CONTENTS.len() as u64, &destination).unwrap();

        assert_eq!(received, CONTENTS.len() as u64);
        assert_eq!(fs::read(&destination).unwrap(), CONTENTS);
        assert_eq!(entries(&dir), vec!["results.csv".to_string()]);
    }

    #[test]
    fn test_receive_into_replaces_previous_file() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("results.csv");
        fs::write(&destination, PREVIOUS).unwrap();
        let mut reader = io::Cursor::new(CONTENTS.to_vec());

        receive_into(&mut reader, CONTENTS.len() as u64, &destination).unwrap();

        assert_eq!(fs::read(&destination).unwrap(), CONTENTS);
    }

    #[test]
    fn test_short_read_keeps_previous_file() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("results.csv");
        fs::write(&destination, PREVIOUS).unwrap();
        let mut reader = io::Cursor::new(CONTENTS[..8].to_vec());

        let err = receive_into(&mut reader, CONTENTS.len() as u64, &destination).unwrap_err();

        match err {
            Error::IncompleteTransfer { expected, received } => {
                assert_eq!(expected, CONTENTS.len() as u64);
                assert_eq!(received, 8);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fs::read(&destination).unwrap(), PREVIOUS);
        assert_eq!(entries(&dir), vec!["results.csv".to_string()]);
    }

    #[test]
    fn test_short_read_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("results.csv");
        let mut reader = io::Cursor::new(Vec::new());

        let err = receive_into(&mut reader, 4, &destination).unwrap_err();

        assert!(matches!(err, Error::IncompleteTransfer { received: 0, .. }));
        assert!(entries(&dir).is_empty());
    }

    #[test]
    fn test_read_error_keeps_previous_file() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("results.csv");
        fs::write(&destination, PREVIOUS).unwrap();
        let mut reader = BrokenReader(io::Cursor::new(b"well,vol".to_vec()));

        let err = receive_into(&mut reader, CONTENTS.len() as u64, &destination).unwrap_err();

        assert!(matches!(err, Error::Transfer(_)));
        assert_eq!(fs::read(&destination).unwrap(), PREVIOUS);
        assert_eq!(entries(&dir), vec!["results.csv".to_string()]);
    }

    #[test]
    fn test_missing_destination_directory_is_io_error() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("absent").join("results.csv");
        let mut reader = io::Cursor::new(CONTENTS.to_vec());

        let err = receive_into(&mut reader, CONTENTS.len() as u64, &destination).unwrap_err();

        assert!(matches!(err, Error::Io(_)));
    }
}
