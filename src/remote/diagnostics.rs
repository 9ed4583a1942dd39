//! Troubleshooting hints for failed retrievals.

use crate::config::DeviceConfig;
use crate::error::Error;

/// Suggests next steps for an SSH or SCP failure, or `None` when the
/// error is not one the operator can act on from here.
pub fn diagnose_retrieval_error(error: &Error, config: &DeviceConfig) -> Option<String> {
    let mut suggestions = Vec::new();

    match error {
        Error::KeyLoad { path, .. } => {
            if path.as_os_str().is_empty() {
                suggestions.push("• Set ssh_key in the device configuration".to_string());
            } else {
                suggestions.push(format!("• Check that the key exists: {}", path.display()));
                suggestions.push("• Verify it is readable (chmod 600)".to_string());
            }
        }
        Error::Connection(_) => {
            suggestions.push(format!("• Verify the device '{}' is reachable", config.host));
            suggestions.push(format!(
                "• Check that SSH is running on port {} (try: ssh -p {} {}@{})",
                config.ssh_port, config.ssh_port, config.user, config.host
            ));
        }
        Error::Authentication { .. } => {
            suggestions.push(
                "• Verify the public key was installed on the device (Settings > Advanced)"
                    .to_string(),
            );
            if let Some(key) = &config.ssh_key {
                suggestions.push(format!("• Check that {} is the matching private key", key));
            }
        }
        Error::HostKeyVerification { .. } => {
            suggestions.push(format!(
                "• Add the device to known_hosts: ssh-keyscan -p {} {} >> ~/.ssh/known_hosts",
                config.ssh_port, config.host
            ));
            suggestions.push(
                "• Or pin its fingerprint with host_key: {kind: fingerprint, value: ...}".to_string(),
            );
        }
        Error::Transfer(_) | Error::IncompleteTransfer { .. } => {
            suggestions.push("• Check that the remote path names an existing file".to_string());
            suggestions.push("• Retry once the device has finished writing it".to_string());
        }
        _ => return None,
    }

    Some(format!(
        "{}\n\nTroubleshooting suggestions:\n{}",
        error,
        suggestions.join("\n")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_connection_hint_names_host_and_port() {
        let config = DeviceConfig::new("10.0.0.12").with_ssh_port(2222);
        let hint = diagnose_retrieval_error(&Error::Connection("refused".into()), &config).unwrap();
        assert!(hint.contains("10.0.0.12"));
        assert!(hint.contains("ssh -p 2222 root@10.0.0.12"));
    }

    #[test]
    fn test_missing_key_hint() {
        let config = DeviceConfig::new("flex");
        let err = Error::KeyLoad {
            path: PathBuf::new(),
            reason: "no ssh_key configured for flex".into(),
        };
        let hint = diagnose_retrieval_error(&err, &config).unwrap();
        assert!(hint.contains("Set ssh_key"));
    }

    #[test]
    fn test_host_key_hint() {
        let config = DeviceConfig::new("flex");
        let err = Error::HostKeyVerification {
            host: "flex".into(),
            reason: "not listed".into(),
        };
        let hint = diagnose_retrieval_error(&err, &config).unwrap();
        assert!(hint.contains("ssh-keyscan -p 22 flex"));
    }

    #[test]
    fn test_no_hint_for_unrelated_errors() {
        let config = DeviceConfig::new("flex");
        assert!(diagnose_retrieval_error(&Error::Config("bad".into()), &config).is_none());
    }
}
