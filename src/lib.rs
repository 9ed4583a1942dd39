//! Client library for an Opentrons Flex liquid-handling robot.
//!
//! Two independent operations are provided:
//!
//! - [`ProtocolClient`] uploads a protocol (and any labware files it needs)
//!   to the device's HTTP control API, creates a run for it and starts it.
//! - [`FileRetriever`] copies a result file off the device over SCP.
//!
//! Both take a [`DeviceConfig`], built in code or loaded from a YAML
//! [`Config`] file. Nothing touches the network until an operation is called.
//!
//! ```no_run
//! use flexlink::{DeviceConfig, FileRetriever, ProtocolClient};
//! use std::path::Path;
//!
//! # fn main() -> flexlink::Result<()> {
//! let device = DeviceConfig::new("10.154.3.53").with_ssh_key("~/.ssh/flex_key");
//!
//! let run = ProtocolClient::new(device.clone())?
//!     .run_protocol(&["protocol.py", "custom_plate.json"])?;
//! println!("run {} started ({})", run.run_id, run.status);
//!
//! FileRetriever::new(device).download_file(
//!     Path::new("/data/user_storage/results.csv"),
//!     Path::new("."),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod remote;

pub use config::{Config, DeviceConfig, HostKeyPolicy};
pub use error::{ApiStep, Error, FlexError, Result};
pub use http::{ProtocolClient, ProtocolId, RunAction, RunId, StartedRun};
pub use remote::{Connector, FileRetriever, PrivateKey, RemoteSession};
