//! Wire types for the device's HTTP control API.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ApiStep, Error, Result};

/// Header carrying the API version every request must declare.
pub const VERSION_HEADER: &str = "Opentrons-Version";

/// Multipart field name for uploaded protocol and labware files.
pub const FILES_FIELD: &str = "files";

/// Identifier of a protocol stored on the device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProtocolId(String);

/// Identifier of a run created on the device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

macro_rules! impl_id {
    ($name:ident) => {
        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

impl_id!(ProtocolId);
impl_id!(RunId);

/// Commands accepted on `/runs/{run_id}/actions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunAction {
    Play,
    Pause,
    Stop,
    ResumeFromRecovery,
}

impl fmt::Display for RunAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunAction::Play => "play",
            RunAction::Pause => "pause",
            RunAction::Stop => "stop",
            RunAction::ResumeFromRecovery => "resume-from-recovery",
        };
        f.write_str(name)
    }
}

/// Every request and response body is wrapped in a `data` member.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateRunData<'a> {
    pub protocol_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ActionData {
    pub action_type: RunAction,
}

#[derive(Debug, Deserialize)]
struct Resource {
    id: String,
}

/// Extracts `data.id` from a response body.
pub(crate) fn parse_resource_id(step: ApiStep, body: &str) -> Result<String> {
    let envelope: Envelope<Resource> =
        serde_json::from_str(body).map_err(|e| Error::MalformedResponse {
            step,
            reason: format!("expected {{\"data\": {{\"id\": ...}}}}: {}", e),
        })?;

    if envelope.data.id.is_empty() {
        return Err(Error::MalformedResponse {
            step,
            reason: "data.id is empty".to_string(),
        });
    }

    Ok(envelope.data.id)
}
