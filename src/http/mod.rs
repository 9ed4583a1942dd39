//! Client for the device's HTTP control API.
//!
//! Protocols are uploaded as multipart forms, runs are created against
//! them, and actions such as `play` are issued on runs. Responses are
//! parsed into typed records rather than sliced by position.

pub mod api;
pub mod client;

pub use api::{ProtocolId, RunAction, RunId};
pub use client::{ProtocolClient, StartedRun};
