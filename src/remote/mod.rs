//! File retrieval from the device over SSH.
//!
//! The device exposes an SSH endpoint for the `root` user. Result files are
//! copied off it with SCP after the server's host key has been verified and
//! the session authenticated with a private key.

pub mod diagnostics;
pub mod host_key;
pub mod key;
pub mod session;
pub mod transfer;

pub use key::PrivateKey;
pub use session::{Connector, RemoteSession, SshConnector, SshSession};
pub use transfer::FileRetriever;
