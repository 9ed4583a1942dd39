//! Protocol upload and run control over the device's HTTP API.

use log::{debug, info};
use reqwest::blocking::multipart::Form;
use reqwest::blocking::{Client, Response};
use std::path::Path;
use std::time::Duration;

use crate::config::DeviceConfig;
use crate::error::{ApiStep, Error, Result};
use crate::http::api::{
    parse_resource_id, ActionData, CreateRunData, Envelope, ProtocolId, RunAction, RunId,
    FILES_FIELD, VERSION_HEADER,
};

/// Outcome of uploading a protocol and starting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedRun {
    pub protocol_id: ProtocolId,
    pub run_id: RunId,
    /// HTTP status of the play request
    pub status: u16,
}

/// Blocking client for the device's protocol and run endpoints.
///
/// Every step checks the response status before its output is used, so a
/// failed upload never leaks a bogus identifier into run creation.
pub struct ProtocolClient {
    config: DeviceConfig,
    client: Client,
}

impl ProtocolClient {
    pub fn new(config: DeviceConfig) -> Result<Self> {
        let timeout = (config.timeout > 0).then(|| Duration::from_secs(config.timeout));
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url(), path)
    }

    /// Uploads a protocol file plus any labware or data files it needs.
    ///
    /// Each path becomes one `files` part, streamed from disk. The open
    /// handles belong to the request and are closed when it finishes,
    /// whatever the outcome. An empty list still sends the request.
    pub fn upload_protocol<P: AsRef<Path>>(&self, files: &[P]) -> Result<ProtocolId> {
        let mut form = Form::new();
        for path in files {
            let path = path.as_ref();
            debug!("Adding {} to protocol upload", path.display());
            form = form.file(FILES_FIELD, path).map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to open {}: {}", path.display(), e),
                ))
            })?;
        }

        info!(
            "Uploading {} file(s) to {}",
            files.len(),
            self.config.base_url()
        );
        let response = self
            .client
            .post(self.url("/protocols"))
            .header(VERSION_HEADER, &self.config.api_version)
            .multipart(form)
            .send()?;

        let (_, body) = read_success(ApiStep::UploadProtocol, response)?;
        let id = ProtocolId::new(parse_resource_id(ApiStep::UploadProtocol, &body)?);
        info!("Uploaded protocol {}", id);
        Ok(id)
    }

    /// Creates a run bound to an uploaded protocol.
    pub fn create_run(&self, protocol_id: &ProtocolId) -> Result<RunId> {
        debug!("Creating run for protocol {}", protocol_id);
        let body = Envelope {
            data: CreateRunData {
                protocol_id: protocol_id.as_str(),
            },
        };

        let response = self
            .client
            .post(self.url("/runs"))
            .header(VERSION_HEADER, &self.config.api_version)
            .json(&body)
            .send()?;

        let (_, body) = read_success(ApiStep::CreateRun, response)?;
        let id = RunId::new(parse_resource_id(ApiStep::CreateRun, &body)?);
        info!("Created run {}", id);
        Ok(id)
    }

    /// Issues an action against an existing run and returns the response status.
    pub fn issue_action(&self, run_id: &RunId, action: RunAction) -> Result<u16> {
        info!("Issuing {} on run {}", action, run_id);
        let body = Envelope {
            data: ActionData {
                action_type: action,
            },
        };

        let response = self
            .client
            .post(self.url(&format!("/runs/{}/actions", run_id)))
            .header(VERSION_HEADER, &self.config.api_version)
            .json(&body)
            .send()?;

        let (status, _) = read_success(ApiStep::RunAction, response)?;
        Ok(status)
    }

    pub fn play(&self, run_id: &RunId) -> Result<u16> {
        self.issue_action(run_id, RunAction::Play)
    }

    /// Uploads the files, creates a run for the new protocol and starts it.
    ///
    /// Repeating the call creates a new protocol and run on the device.
    pub fn run_protocol<P: AsRef<Path>>(&self, files: &[P]) -> Result<StartedRun> {
        let protocol_id = self.upload_protocol(files)?;
        let run_id = self.create_run(&protocol_id)?;
        let status = self.play(&run_id)?;

        Ok(StartedRun {
            protocol_id,
            run_id,
            status,
        })
    }
}

/// Reads the body and fails unless the status is 2xx.
fn read_success(step: ApiStep, response: Response) -> Result<(u16, String)> {
    let status = response.status();
    let body = response.text()?;
    debug!("{} responded {}", step, status);

    if !status.is_success() {
        return Err(Error::Status {
            step,
            status: status.as_u16(),
            body,
        });
    }

    Ok((status.as_u16(), body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_uses_configured_port() {
        let client = ProtocolClient::new(DeviceConfig::new("10.0.0.12")).unwrap();
        assert_eq!(client.url("/runs"), "http://10.0.0.12:31950/runs");

        let client =
            ProtocolClient::new(DeviceConfig::new("127.0.0.1").with_http_port(8000)).unwrap();
        assert_eq!(client.url("/protocols"), "http://127.0.0.1:8000/protocols");
    }

    #[test]
    fn test_missing_file_fails_before_request() {
        // Port 9 (discard) is never contacted because opening the file fails first.
        let client =
            ProtocolClient::new(DeviceConfig::new("127.0.0.1").with_http_port(9)).unwrap();
        let err = client
            .upload_protocol(&["/nonexistent/protocol.py"])
            .unwrap_err();
        match err {
            Error::Io(e) => assert!(e.to_string().contains("/nonexistent/protocol.py")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
