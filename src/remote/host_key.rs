//! Server host key verification.
//!
//! Unknown host keys are never accepted. The key must either appear in a
//! known_hosts file or match a pinned SHA-256 fingerprint.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use log::debug;
use ssh2::{CheckResult, HashType, KnownHostFileKind, Session};
use std::path::Path;

use crate::config::{expand_path, DeviceConfig, HostKeyPolicy};
use crate::error::{Error, Result};

const SHA256_PREFIX: &str = "sha256:";

/// Verifies the host key of a session that has completed its handshake.
pub fn verify_host_key(session: &Session, config: &DeviceConfig) -> Result<()> {
    match &config.host_key {
        HostKeyPolicy::KnownHosts(path) => {
            let path = expand_path(path);
            let (key, _) = session
                .host_key()
                .ok_or_else(|| failure(config, "server did not present a host key"))?;
            check_known_hosts(session, config, &path, key)
        }
        HostKeyPolicy::Fingerprint(pinned) => {
            let actual = session
                .host_key_hash(HashType::Sha256)
                .ok_or_else(|| failure(config, "server did not present a host key"))?;
            debug!(
                "Host key fingerprint for {}: {}",
                config.host,
                format_fingerprint(actual)
            );

            match parse_fingerprint(pinned) {
                Some(expected) if expected == actual => Ok(()),
                Some(_) => Err(failure(
                    config,
                    &format!(
                        "fingerprint {} does not match pinned {}",
                        format_fingerprint(actual),
                        pinned
                    ),
                )),
                None => Err(failure(
                    config,
                    &format!(
                        "pinned fingerprint {} is neither hex nor SHA256:<base64>",
                        pinned
                    ),
                )),
            }
        }
    }
}

/// Looks `key` up for the configured host and port in the known_hosts file
/// at `path`.
pub(crate) fn check_known_hosts(
    session: &Session,
    config: &DeviceConfig,
    path: &Path,
    key: &[u8],
) -> Result<()> {
    debug!("Checking host key against {}", path.display());

    let mut known_hosts = session
        .known_hosts()
        .map_err(|e| failure(config, &format!("cannot initialize known hosts: {}", e)))?;
    known_hosts
        .read_file(path, KnownHostFileKind::OpenSSH)
        .map_err(|e| failure(config, &format!("cannot read {}: {}", path.display(), e)))?;

    known_hosts_outcome(
        known_hosts.check_port(&config.host, config.ssh_port, key),
        config,
        path,
    )
}

fn known_hosts_outcome(result: CheckResult, config: &DeviceConfig, path: &Path) -> Result<()> {
    match result {
        CheckResult::Match => Ok(()),
        CheckResult::NotFound => Err(failure(
            config,
            &format!("host is not listed in {}", path.display()),
        )),
        CheckResult::Mismatch => Err(failure(
            config,
            &format!("host key differs from the entry in {}", path.display()),
        )),
        CheckResult::Failure => Err(failure(config, "known hosts check failed")),
    }
}

fn failure(config: &DeviceConfig, reason: &str) -> Error {
    Error::HostKeyVerification {
        host: config.host.clone(),
        reason: reason.to_string(),
    }
}

/// Formats a digest as colon separated lowercase hex.
pub fn format_fingerprint(digest: &[u8]) -> String {
    digest
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Decodes a pinned SHA-256 fingerprint into digest bytes.
///
/// Accepts hex in any case with optional colons, and the OpenSSH form
/// `SHA256:<base64>` as printed by `ssh-keygen -l`. The `SHA256:` prefix is
/// matched without regard to case and may also precede hex.
pub fn parse_fingerprint(pinned: &str) -> Option<Vec<u8>> {
    let pinned = pinned.trim();
    let (prefixed, body) = match pinned.get(..SHA256_PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(SHA256_PREFIX) => {
            (true, &pinned[SHA256_PREFIX.len()..])
        }
        _ => (false, pinned),
    };

    let hex: String = body.chars().filter(|c| *c != ':').collect();
    let full_hex = hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit());
    if prefixed && !full_hex {
        return STANDARD_NO_PAD
            .decode(body.trim_end_matches('='))
            .ok()
            .filter(|digest| !digest.is_empty());
    }
    decode_hex(&hex)
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.is_empty() || hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

/// Compares a digest with a pinned fingerprint in any form accepted by
/// [`parse_fingerprint`].
pub fn fingerprint_matches(digest: &[u8], pinned: &str) -> bool {
    parse_fingerprint(pinned).is_some_and(|pinned| pinned == digest)
}
