// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clone URL normalisation and GitHub slug parsing.
//!
//! Accepted forms: `https://`, `http://`, `ssh://`, `git://`,
//! `git+ssh://`, and scp-style `user@host:path`. Anything else is
//! rejected with a specific error. GitHub URLs canonicalise to the
//! `https://github.com/<owner>/<repo>.git` form, which makes
//! normalisation a fixed point on its own output.

use super::GitError;

/// `<owner>/<repo>` under github.com.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubSlug {
    pub owner: String,
    pub repo: String,
}

impl GithubSlug {
    pub fn ssh_url(&self) -> String {
        format!("git@github.com:{}/{}.git", self.owner, self.repo)
    }

    pub fn https_url(&self) -> String {
        format!("https://github.com/{}/{}.git", self.owner, self.repo)
    }

    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl std::fmt::Display for GithubSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// A clone URL in canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedUrl {
    /// Canonical URL string; github slugs canonicalise to HTTPS form.
    pub url: String,
    pub github: Option<GithubSlug>,
}

const ACCEPTED_SCHEMES: &[&str] = &["https://", "http://", "ssh://", "git://", "git+ssh://"];

/// Normalise a clone URL, rejecting unsupported forms.
pub fn normalize(raw: &str) -> Result<NormalizedUrl, GitError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(GitError::UnsupportedUrl(raw.to_string()));
    }

    if let Some(scheme) = ACCEPTED_SCHEMES.iter().find(|s| trimmed.starts_with(**s)) {
        let rest = &trimmed[scheme.len()..];
        let github = parse_slug_from_host_path(rest);
        return Ok(canonicalize(trimmed, github));
    }

    // scp-style: user@host:path, no scheme. Whitespace anywhere makes it
    // something else entirely.
    if !trimmed.contains("://") && trimmed.contains('@') && trimmed.contains(':') {
        if trimmed.chars().any(char::is_whitespace) {
            return Err(GitError::UnsupportedUrl(raw.to_string()));
        }
        let (_, host_path) = trimmed
            .split_once('@')
            .ok_or_else(|| GitError::UnsupportedUrl(raw.to_string()))?;
        let (host, path) = host_path
            .split_once(':')
            .ok_or_else(|| GitError::UnsupportedUrl(raw.to_string()))?;
        if host.is_empty() || path.is_empty() {
            return Err(GitError::UnsupportedUrl(raw.to_string()));
        }
        let github = if host == "github.com" { parse_slug_from_path(path) } else { None };
        return Ok(canonicalize(trimmed, github));
    }

    Err(GitError::UnsupportedUrl(raw.to_string()))
}

fn canonicalize(original: &str, github: Option<GithubSlug>) -> NormalizedUrl {
    match github {
        Some(slug) => NormalizedUrl { url: slug.https_url(), github: Some(slug) },
        None => NormalizedUrl { url: original.to_string(), github: None },
    }
}

/// Parse `host/owner/repo[...]` after a scheme.
fn parse_slug_from_host_path(rest: &str) -> Option<GithubSlug> {
    // Strip optional userinfo.
    let rest = rest.rsplit_once('@').map(|(_, r)| r).unwrap_or(rest);
    let (host, path) = rest.split_once('/')?;
    let host = host.split(':').next().unwrap_or(host);
    if host != "github.com" {
        return None;
    }
    parse_slug_from_path(path)
}

/// Parse `owner/repo[.git][/...]`.
fn parse_slug_from_path(path: &str) -> Option<GithubSlug> {
    let mut parts = path.trim_matches('/').splitn(3, '/');
    let owner = parts.next()?.trim();
    let repo = parts.next()?.trim();
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    if owner.is_empty()
        || repo.is_empty()
        || owner.chars().any(char::is_whitespace)
        || repo.chars().any(char::is_whitespace)
    {
        return None;
    }
    Some(GithubSlug { owner: owner.to_string(), repo: repo.to_string() })
}

#[cfg(test)]
#[path = "url_tests.rs"]
mod tests;
