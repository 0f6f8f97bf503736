// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential probing for git authentication.
//!
//! The worker never parses key material; probing is limited to file-name
//! heuristics plus a PEM-marker sniff of the first 4 KiB, and only
//! presence booleans and file names are ever logged.
//!
//! SSH resolution order (any match means available, unless
//! `WORKER_SSH_AVAILABLE=false` forces it off):
//!
//! ```text
//! 1. SSH_AUTH_SOCK points to an existing path
//! 2. $HOME/.ssh holds a key candidate: name matches id_*, extension is
//!    .pem/.key/.ppk, or the first 4 KiB carries a PEM private-key marker
//! ```

use std::path::{Path, PathBuf};

/// How many bytes of a candidate file the PEM sniff reads.
const PEM_SNIFF_BYTES: usize = 4096;

/// Result of probing the host for SSH credentials.
#[derive(Debug, Clone, Default)]
pub struct SshProbe {
    pub available: bool,
    /// Available via a live `SSH_AUTH_SOCK`.
    pub via_agent: bool,
    /// File name (not contents) of the first key candidate found.
    pub key_candidate: Option<String>,
}

/// Probe the environment for usable SSH credentials.
pub fn probe_ssh() -> SshProbe {
    let override_flag = std::env::var("WORKER_SSH_AVAILABLE")
        .ok()
        .and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        });
    let auth_sock = std::env::var("SSH_AUTH_SOCK").ok();
    let home = std::env::var("HOME").ok().map(PathBuf::from).or_else(dirs::home_dir);
    probe_ssh_in(override_flag, auth_sock.as_deref(), home.as_deref())
}

/// Probe with explicit inputs (separated out for tests).
pub(crate) fn probe_ssh_in(
    override_flag: Option<bool>,
    auth_sock: Option<&str>,
    home: Option<&Path>,
) -> SshProbe {
    match override_flag {
        Some(false) => return SshProbe::default(),
        Some(true) => return SshProbe { available: true, via_agent: false, key_candidate: None },
        None => {}
    }

    if let Some(sock) = auth_sock {
        if !sock.is_empty() && Path::new(sock).exists() {
            return SshProbe { available: true, via_agent: true, key_candidate: None };
        }
    }

    if let Some(home) = home {
        if let Some(name) = find_key_candidate(&home.join(".ssh")) {
            return SshProbe { available: true, via_agent: false, key_candidate: Some(name) };
        }
    }

    SshProbe::default()
}

/// Scan a `.ssh` directory for the first private-key candidate.
fn find_key_candidate(ssh_dir: &Path) -> Option<String> {
    let entries = std::fs::read_dir(ssh_dir).ok()?;
    let mut names: Vec<(String, PathBuf)> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| (e.file_name().to_string_lossy().to_string(), e.path()))
        .collect();
    names.sort();

    for (name, path) in names {
        if is_excluded(&name) {
            continue;
        }
        if name.starts_with("id_") || has_key_extension(&name) || has_pem_marker(&path) {
            return Some(name);
        }
    }
    None
}

fn is_excluded(name: &str) -> bool {
    name.ends_with(".pub")
        || name.starts_with("known_hosts")
        || name.starts_with("authorized_keys")
        || name == "config"
        || name == "ssh_config"
}

fn has_key_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e, "pem" | "key" | "ppk"))
        .unwrap_or(false)
}

/// Sniff the first 4 KiB for a PEM "BEGIN ... PRIVATE KEY" marker.
fn has_pem_marker(path: &Path) -> bool {
    use std::io::Read;
    let Ok(mut file) = std::fs::File::open(path) else {
        return false;
    };
    let mut buf = vec![0u8; PEM_SNIFF_BYTES];
    let Ok(n) = file.read(&mut buf) else {
        return false;
    };
    let head = String::from_utf8_lossy(&buf[..n]);
    head.contains("BEGIN") && head.contains("PRIVATE KEY")
}

/// Resolve a GitHub token from the environment (`GITHUB_TOKEN`, then
/// `GH_TOKEN`).
pub fn github_token() -> Option<String> {
    for key in ["GITHUB_TOKEN", "GH_TOKEN"] {
        if let Ok(token) = std::env::var(key) {
            if !token.is_empty() {
                return Some(token);
            }
        }
    }
    None
}

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
