// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task serialized git workspace lifecycle.
//!
//! Before a run: a clean checkout of `origin/<main>` at a stable
//! per-task path, cloned if needed through the SSH → gh → HTTPS
//! fallback chain. After a successful run: stage, commit, and push any
//! produced diff to the main branch; a diff-less run is marked obsolete.
//! All of it under a per-`(repo, task)` mutex so at most one run touches
//! a task's workspace at a time.

pub mod url;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

use crate::keyed_mutex::KeyedMutex;
use ad_adapters::credential::{self, SshProbe};
use ad_adapters::subprocess::{self, GIT_COMMAND_TIMEOUT, GIT_REMOTE_TIMEOUT};
use ad_core::{envelope::meta, RunEnvelope, RunRequest};
use async_trait::async_trait;
use base64::Engine as _;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use self::url::NormalizedUrl;
use tracing::{info, warn};

/// `gitWorkflow` metadata value for a successful push.
pub const GIT_WORKFLOW_PUSHED: &str = "main-pushed";

/// Default committer when no identity is configured.
const DEFAULT_COMMITTER_NAME: &str = "AgentsDashboard Bot";
const DEFAULT_COMMITTER_EMAIL: &str = "agentsdashboard-bot@local";

/// Errors from workspace operations.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("unsupported clone url: {0}")]
    UnsupportedUrl(String),
    #[error("{0}")]
    CommandFailed(String),
    #[error("clone failed: {0}")]
    CloneFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The authentication strategy that won the clone fallback chain; reused
/// for every subsequent remote command in the run.
#[derive(Clone, PartialEq, Eq)]
pub enum GitAuth {
    Ssh,
    GhCli,
    /// HTTPS, optionally with a token passed per invocation as an
    /// `extraheader` config (never written to the repo config).
    Https { token: Option<String> },
    Direct,
}

impl GitAuth {
    pub fn scheme(&self) -> &'static str {
        match self {
            GitAuth::Ssh => "ssh",
            GitAuth::GhCli => "gh",
            GitAuth::Https { .. } => "https",
            GitAuth::Direct => "direct",
        }
    }

    /// Per-invocation `-c` arguments carrying the token, if any.
    fn config_args(&self) -> Vec<String> {
        match self {
            GitAuth::Https { token: Some(token) } => https_token_args(token),
            GitAuth::GhCli => match credential::github_token() {
                Some(token) => https_token_args(&token),
                None => Vec::new(),
            },
            _ => Vec::new(),
        }
    }
}

fn https_token_args(token: &str) -> Vec<String> {
    let basic = base64::engine::general_purpose::STANDARD
        .encode(format!("x-access-token:{token}"));
    vec![
        "-c".to_string(),
        format!("http.https://github.com/.extraheader=AUTHORIZATION: basic {basic}"),
    ]
}

// Token values must never reach logs.
impl std::fmt::Debug for GitAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.scheme())
    }
}

/// Workspace state for the duration of one run.
#[derive(Debug, Clone)]
pub struct WorkspaceContext {
    pub workspace_path: PathBuf,
    pub main_branch: String,
    pub head_before: String,
    pub auth: GitAuth,
}

/// The pipeline's workspace seam.
#[async_trait]
pub trait Workspaces: Send + Sync {
    /// Produce a clean, reset-to-remote-main workspace for the run.
    async fn prepare(&self, request: &RunRequest) -> Result<WorkspaceContext, GitError>;

    /// Commit and push the run's diff (or mark the envelope obsolete).
    ///
    /// Failures are folded into the envelope; this never aborts the
    /// pipeline.
    async fn finalize(
        &self,
        request: &RunRequest,
        workspace: &WorkspaceContext,
        envelope: &mut RunEnvelope,
    );
}

/// Git-backed workspace manager pinned to `{root}/{repo}/tasks/{task}`.
pub struct GitWorkspaceManager {
    workspaces_root: PathBuf,
    locks: KeyedMutex,
}

impl GitWorkspaceManager {
    pub fn new(workspaces_root: impl Into<PathBuf>) -> Self {
        Self { workspaces_root: workspaces_root.into(), locks: KeyedMutex::new() }
    }

    /// Stable on-disk path for a task's workspace.
    pub fn task_workspace_path(&self, repo_id: &str, task_id: &str) -> PathBuf {
        self.workspaces_root
            .join(safe_component(repo_id))
            .join("tasks")
            .join(safe_component(task_id))
    }

    fn lock_key(request: &RunRequest) -> String {
        format!("{}:{}", request.repository_id, request.task_id)
    }

    /// Main branch resolution: `DEFAULT_BRANCH`, then the request, then
    /// `"main"`.
    fn main_branch(request: &RunRequest) -> String {
        if let Ok(branch) = std::env::var("DEFAULT_BRANCH") {
            if !branch.trim().is_empty() {
                return branch.trim().to_string();
            }
        }
        match &request.branch {
            Some(branch) if !branch.trim().is_empty() => branch.trim().to_string(),
            _ => "main".to_string(),
        }
    }

    async fn prepare_inner(&self, request: &RunRequest) -> Result<WorkspaceContext, GitError> {
        let main_branch = Self::main_branch(request);
        let normalized = url::normalize(&request.clone_url)?;
        let path = self
            .task_workspace_path(request.repository_id.as_str(), request.task_id.as_str());

        let mut auth = if path.join(".git").is_dir() {
            preferred_auth(&normalized)
        } else {
            wipe_dir(&path).await?;
            clone_with_fallback(&normalized, &path, &main_branch).await?
        };

        if let Err(fetch_err) = self.setup_checkout(&path, &normalized, &auth).await {
            if normalized.github.is_none() {
                return Err(fetch_err);
            }
            // A stale GitHub checkout (rotated credentials, force-pushed
            // history) gets one wipe-and-reclone retry.
            warn!(
                path = %path.display(),
                error = %fetch_err,
                "fetch failed for GitHub workspace, recloning"
            );
            wipe_dir(&path).await?;
            auth = clone_with_fallback(&normalized, &path, &main_branch).await?;
            self.setup_checkout(&path, &normalized, &auth).await?;
        }

        let head_before = self.sync_workspace(&path, &main_branch).await?;
        info!(
            run_id = %request.run_id,
            path = %path.display(),
            branch = %main_branch,
            auth = ?auth,
            head = %ad_core::short(&head_before, 12),
            "workspace prepared"
        );

        Ok(WorkspaceContext { workspace_path: path, main_branch, head_before, auth })
    }

    /// Point origin at the effective URL and fetch.
    async fn setup_checkout(
        &self,
        path: &Path,
        normalized: &NormalizedUrl,
        auth: &GitAuth,
    ) -> Result<(), GitError> {
        let remote_url = remote_url_for(normalized, auth);
        if run_git(path, &["remote", "set-url", "origin", &remote_url], "git remote set-url")
            .await
            .is_err()
        {
            run_git(path, &["remote", "add", "origin", &remote_url], "git remote add").await?;
        }

        let mut args: Vec<String> = auth.config_args();
        args.extend(["fetch", "--prune", "origin"].map(String::from));
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        run_git_with_timeout(path, &arg_refs, "git fetch", GIT_REMOTE_TIMEOUT)
            .await
            .map_err(|e| attach_auth_context(e, auth))?;
        Ok(())
    }

    /// Checkout main, hard-reset to the remote, and clean. Returns the
    /// pre-run head commit.
    async fn sync_workspace(&self, path: &Path, main_branch: &str) -> Result<String, GitError> {
        let remote_ref = format!("origin/{main_branch}");
        if run_git(path, &["checkout", main_branch], "git checkout").await.is_err() {
            run_git(
                path,
                &["checkout", "-B", main_branch, &remote_ref],
                "git checkout -B",
            )
            .await?;
        }
        run_git(path, &["reset", "--hard", &remote_ref], "git reset").await?;
        run_git(path, &["clean", "-fd"], "git clean").await?;
        run_git(path, &["rev-parse", "HEAD"], "git rev-parse").await
    }

    /// The post-run commit/push flow; any error is returned for folding
    /// into the envelope.
    async fn commit_and_push(
        &self,
        request: &RunRequest,
        workspace: &WorkspaceContext,
        envelope: &mut RunEnvelope,
    ) -> Result<(), GitError> {
        let path = &workspace.workspace_path;
        let main = &workspace.main_branch;

        run_git(path, &["checkout", main], "git checkout").await?;

        let status = run_git(path, &["status", "--porcelain"], "git status").await?;
        if status.trim().is_empty() {
            envelope.mark_obsolete("no-diff");
            return Ok(());
        }

        run_git(path, &["add", "-A"], "git add").await?;

        let (name, email) = committer_identity();
        let message = format!("agent task {}: run {}", request.task_id, request.run_id);
        let commit = run_git(
            path,
            &[
                "-c",
                &format!("user.name={name}"),
                "-c",
                &format!("user.email={email}"),
                "commit",
                "-m",
                &message,
            ],
            "git commit",
        )
        .await;
        if let Err(e) = commit {
            // An empty index after add (e.g. only ignored files changed)
            // is not a failure.
            if !e.to_string().contains("nothing to commit") {
                return Err(e);
            }
        }

        let head_after = run_git(path, &["rev-parse", "HEAD"], "git rev-parse").await?;
        if head_after.trim() == workspace.head_before.trim() {
            envelope.mark_obsolete("no-diff");
            return Ok(());
        }

        let mut args: Vec<String> = workspace.auth.config_args();
        args.extend(["push", "origin", main.as_str()].map(String::from));
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        run_git_with_timeout(path, &arg_refs, "git push", GIT_REMOTE_TIMEOUT).await?;

        envelope.stamp(meta::GIT_WORKFLOW, GIT_WORKFLOW_PUSHED);
        info!(
            run_id = %request.run_id,
            head_before = %ad_core::short(&workspace.head_before, 12),
            head_after = %ad_core::short(head_after.trim(), 12),
            "workspace committed and pushed"
        );
        Ok(())
    }
}

#[async_trait]
impl Workspaces for GitWorkspaceManager {
    async fn prepare(&self, request: &RunRequest) -> Result<WorkspaceContext, GitError> {
        let _guard = self.locks.acquire(&Self::lock_key(request)).await;
        self.prepare_inner(request).await
    }

    async fn finalize(
        &self,
        request: &RunRequest,
        workspace: &WorkspaceContext,
        envelope: &mut RunEnvelope,
    ) {
        if !envelope.is_succeeded() {
            envelope.stamp(meta::GIT_WORKFLOW, "skipped");
            envelope.stamp(meta::GIT_WORKFLOW_REASON, "non-success-run");
            return;
        }

        let _guard = self.locks.acquire(&Self::lock_key(request)).await;
        if let Err(e) = self.commit_and_push(request, workspace, envelope).await {
            warn!(run_id = %request.run_id, error = %e, "git finalize failed");
            envelope.status = Some(ad_core::EnvelopeStatus::Failed);
            envelope.summary = "Git commit/push failed".to_string();
            envelope.stamp(meta::GIT_WORKFLOW, "failed");
            envelope.stamp(meta::GIT_FAILURE, e.to_string());
        }
    }
}

/// Map an id to a filesystem-safe path component.
fn safe_component(id: &str) -> String {
    if id.is_empty() {
        return "unknown".to_string();
    }
    id.chars().map(|c| if c == '/' || c == '\\' { '-' } else { c }).collect()
}

/// Effective origin URL for the chosen auth strategy.
fn remote_url_for(normalized: &NormalizedUrl, auth: &GitAuth) -> String {
    match (&normalized.github, auth) {
        (Some(slug), GitAuth::Ssh) => slug.ssh_url(),
        (Some(slug), _) => slug.https_url(),
        (None, _) => normalized.url.clone(),
    }
}

/// Auth strategy for a workspace that already exists on disk, mirroring
/// the clone chain's preference order without cloning.
fn preferred_auth(normalized: &NormalizedUrl) -> GitAuth {
    let Some(_slug) = &normalized.github else {
        return GitAuth::Direct;
    };
    if credential::probe_ssh().available {
        GitAuth::Ssh
    } else {
        GitAuth::Https { token: credential::github_token() }
    }
}

/// Committer identity: `GIT_COMMITTER_*`, then `GIT_AUTHOR_*`, then the
/// bot defaults.
fn committer_identity() -> (String, String) {
    let name = ["GIT_COMMITTER_NAME", "GIT_AUTHOR_NAME"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_COMMITTER_NAME.to_string());
    let email = ["GIT_COMMITTER_EMAIL", "GIT_AUTHOR_EMAIL"]
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_COMMITTER_EMAIL.to_string());
    (name, email)
}

/// Try the GitHub-aware clone chain, returning the auth that succeeded.
async fn clone_with_fallback(
    normalized: &NormalizedUrl,
    dest: &Path,
    main_branch: &str,
) -> Result<GitAuth, GitError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let Some(slug) = &normalized.github else {
        return match clone_url(&normalized.url, dest, &[]).await {
            Ok(()) => Ok(GitAuth::Direct),
            Err(e) => Err(GitError::CloneFailed(format!("direct: {e}"))),
        };
    };

    let probe = credential::probe_ssh();
    let token = credential::github_token();
    let mut attempts: Vec<String> = Vec::new();

    if probe.available {
        match clone_url(&slug.ssh_url(), dest, &[]).await {
            Ok(()) => return Ok(GitAuth::Ssh),
            Err(e) => {
                attempts.push(format!("ssh: {e} {}", auth_context("ssh", &probe)));
                wipe_dir(dest).await?;
            }
        }
    } else {
        attempts.push("ssh: skipped (no credentials detected)".to_string());
    }

    match clone_with_gh(slug, dest, main_branch, token.as_deref()).await {
        Ok(()) => return Ok(GitAuth::GhCli),
        Err(e) => {
            attempts.push(format!("gh: {e}"));
            wipe_dir(dest).await?;
        }
    }

    let https_args = match token.as_deref() {
        Some(token) => https_token_args(token),
        None => Vec::new(),
    };
    match clone_url(&slug.https_url(), dest, &https_args).await {
        Ok(()) => return Ok(GitAuth::Https { token }),
        Err(e) => {
            attempts.push(format!("https: {e} {}", auth_context("https", &probe)));
        }
    }

    Err(GitError::CloneFailed(attempts.join("; ")))
}

/// One `git clone` attempt.
async fn clone_url(clone: &str, dest: &Path, config_args: &[String]) -> Result<(), GitError> {
    let mut args: Vec<String> = config_args.to_vec();
    args.push("clone".to_string());
    args.push(clone.to_string());
    args.push(dest.display().to_string());
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    run_git_with_timeout(Path::new("."), &arg_refs, "git clone", GIT_REMOTE_TIMEOUT)
        .await
        .map(|_| ())
}

/// One `gh repo clone` attempt.
async fn clone_with_gh(
    slug: &url::GithubSlug,
    dest: &Path,
    main_branch: &str,
    token: Option<&str>,
) -> Result<(), GitError> {
    let mut cmd = tokio::process::Command::new("gh");
    cmd.args([
        "repo",
        "clone",
        &slug.slug(),
        &dest.display().to_string(),
        "--",
        "--branch",
        main_branch,
    ]);
    cmd.env("GIT_TERMINAL_PROMPT", "0");
    if let Some(token) = token {
        cmd.env("GH_TOKEN", token);
        cmd.env("GITHUB_TOKEN", token);
    }
    let output = subprocess::run_with_timeout(cmd, GIT_REMOTE_TIMEOUT, "gh repo clone")
        .await
        .map_err(GitError::CommandFailed)?;
    if output.status.success() {
        Ok(())
    } else {
        Err(GitError::CommandFailed(failure_message("gh repo clone", &output)))
    }
}

/// Run a git command in `cwd` with the standard environment contract.
async fn run_git(cwd: &Path, args: &[&str], operation: &str) -> Result<String, GitError> {
    run_git_with_timeout(cwd, args, operation, GIT_COMMAND_TIMEOUT).await
}

async fn run_git_with_timeout(
    cwd: &Path,
    args: &[&str],
    operation: &str,
    timeout: Duration,
) -> Result<String, GitError> {
    let mut cmd = tokio::process::Command::new("git");
    cmd.args(args)
        .current_dir(cwd)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE");

    let output = subprocess::run_with_timeout(cmd, timeout, operation)
        .await
        .map_err(GitError::CommandFailed)?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        Err(GitError::CommandFailed(failure_message(operation, &output)))
    }
}

/// `"{operation} failed (exit {code}): {first fatal line | joined}"`.
fn failure_message(operation: &str, output: &Output) -> String {
    let code = output.status.code().unwrap_or(-1);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stderr
        .lines()
        .chain(stdout.lines())
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let detail = lines
        .iter()
        .find(|l| l.starts_with("fatal:"))
        .map(|l| l.to_string())
        .unwrap_or_else(|| lines.join("; "));
    format!("{operation} failed (exit {code}): {}", ad_core::short(&detail, 500))
}

/// One-line auth context appended to clone/fetch failures. Presence
/// booleans and file names only.
fn auth_context(scheme: &str, probe: &SshProbe) -> String {
    format!(
        "(scheme={scheme}, ssh_available={}, key_candidate={}, home={})",
        probe.available,
        probe.key_candidate.as_deref().unwrap_or("none"),
        std::env::var("HOME").unwrap_or_default(),
    )
}

fn attach_auth_context(error: GitError, auth: &GitAuth) -> GitError {
    let probe = credential::probe_ssh();
    GitError::CommandFailed(format!("{error} {}", auth_context(auth.scheme(), &probe)))
}

/// Remove a directory tree if it exists.
async fn wipe_dir(path: &Path) -> Result<(), GitError> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
