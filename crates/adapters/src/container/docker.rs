// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Docker CLI container executor.
//!
//! The docker CLI is used for the whole container lifecycle (create,
//! start, logs, wait, rm); no daemon API client is linked in. All
//! invocations go through [`crate::subprocess::run_with_timeout`].

use super::{
    ContainerError, ContainerRuntime, ContainerSpec, OrchestratorContainer, LABEL_REPO_ID,
    LABEL_RUN_ID, LABEL_TASK_ID, LOG_FLUSH_BYTES,
};
use crate::subprocess::{self, DOCKER_COMMAND_TIMEOUT};
use ad_core::{ContainerId, RunId};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Container executor backed by the `docker` CLI.
#[derive(Clone, Default)]
pub struct DockerCli;

impl DockerCli {
    pub fn new() -> Self {
        Self
    }

    /// Build the `docker create` argument list for a spec.
    fn create_args(spec: &ContainerSpec) -> Vec<String> {
        let mut args: Vec<String> = vec!["create".into(), "--rm".into()];

        args.push("--name".into());
        args.push(container_name(&spec.run_id));

        for (key, value) in [
            (LABEL_RUN_ID, spec.run_id.as_str()),
            (LABEL_TASK_ID, spec.task_id.as_str()),
            (LABEL_REPO_ID, spec.repo_id.as_str()),
        ] {
            args.push("--label".into());
            args.push(format!("{}={}", key, value));
        }
        for (key, value) in &spec.labels {
            args.push("--label".into());
            args.push(format!("{}={}", key, value));
        }

        args.push("--cpus".into());
        args.push(format!("{}", spec.sandbox.cpu_limit));
        args.push("--memory".into());
        args.push(format!("{}", spec.sandbox.memory_bytes()));

        if spec.sandbox.network_disabled {
            args.push("--network".into());
            args.push("none".into());
        }

        args.push("--cap-drop".into());
        args.push("ALL".into());
        args.push("--security-opt".into());
        args.push("no-new-privileges".into());

        if spec.sandbox.read_only_root_fs {
            args.push("--read-only".into());
            args.push("--tmpfs".into());
            args.push("/tmp:rw,size=100m".into());
            args.push("--tmpfs".into());
            args.push("/var/tmp:rw,size=50m".into());
        }

        if let Some(ref workspace) = spec.workspace_host_path {
            args.push("-v".into());
            args.push(format!("{}:/workspace:rw", workspace.display()));
            args.push("-w".into());
            args.push("/workspace".into());
        }
        if let Some(ref artifacts) = spec.artifacts_host_path {
            args.push("-v".into());
            args.push(format!("{}:/artifacts:rw", artifacts.display()));
        }

        args.push("--user".into());
        args.push("1000:1000".into());

        for (key, value) in &spec.env {
            args.push("-e".into());
            args.push(format!("{}={}", key, value));
        }

        args.push(spec.image.clone());
        args.extend(spec.cmd.iter().cloned());
        args
    }

    /// Verify a container's run-id label before attaching to it.
    async fn verify_run_label(
        &self,
        id: &ContainerId,
        expected: &RunId,
    ) -> Result<(), ContainerError> {
        let format = format!("{{{{ index .Config.Labels \"{}\" }}}}", LABEL_RUN_ID);
        let actual = run_docker(&["inspect", "-f", &format, id.as_str()])
            .await
            .map_err(ContainerError::Runtime)?;
        if actual.trim() != expected.as_str() {
            return Err(ContainerError::LabelMismatch {
                container: id.to_string(),
                expected: expected.to_string(),
                actual: actual.trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerId, ContainerError> {
        if let Some(ref artifacts) = spec.artifacts_host_path {
            if let Err(e) = tokio::fs::create_dir_all(artifacts).await {
                return Err(ContainerError::CreateFailed(format!(
                    "artifacts dir {}: {}",
                    artifacts.display(),
                    e
                )));
            }
        }

        let args = Self::create_args(spec);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let stdout = run_docker(&arg_refs).await.map_err(ContainerError::CreateFailed)?;
        let id = ContainerId::new(stdout.trim());
        info!(run_id = %spec.run_id, container = %id, image = %spec.image, "container created");
        Ok(id)
    }

    async fn start(&self, id: &ContainerId) -> Result<(), ContainerError> {
        run_docker(&["start", id.as_str()])
            .await
            .map(|_| ())
            .map_err(ContainerError::StartFailed)
    }

    async fn stream_logs(
        &self,
        id: &ContainerId,
        expected_run_id: &RunId,
        tx: mpsc::Sender<String>,
        cancel: CancellationToken,
    ) -> Result<(), ContainerError> {
        self.verify_run_label(id, expected_run_id).await?;

        let mut child = tokio::process::Command::new("docker")
            .args(["logs", "--follow", id.as_str()])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| ContainerError::LogsFailed(format!("spawn docker logs: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ContainerError::LogsFailed("no stdout pipe".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ContainerError::LogsFailed("no stderr pipe".into()))?;

        let out_task = tokio::spawn(pump(stdout, tx.clone(), cancel.clone()));
        let err_task = tokio::spawn(pump(stderr, tx, cancel.clone()));

        tokio::select! {
            _ = cancel.cancelled() => {
                // Stop reading; do not await further chunks.
                let _ = child.kill().await;
            }
            _ = child.wait() => {}
        }
        let _ = out_task.await;
        let _ = err_task.await;
        Ok(())
    }

    async fn wait(&self, id: &ContainerId) -> Result<i64, ContainerError> {
        let output = tokio::process::Command::new("docker")
            .args(["wait", id.as_str()])
            .output()
            .await
            .map_err(|e| ContainerError::WaitFailed(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ContainerError::WaitFailed(stderr.trim().to_string()));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .trim()
            .parse::<i64>()
            .map_err(|_| ContainerError::WaitFailed(format!("unparseable exit status: {stdout}")))
    }

    async fn remove(&self, id: &ContainerId) -> Result<(), ContainerError> {
        match run_docker(&["rm", "-f", id.as_str()]).await {
            Ok(_) => Ok(()),
            // Absence is not an error: the container may have auto-removed.
            Err(e) if e.contains("No such container") => Ok(()),
            Err(e) => Err(ContainerError::Runtime(e)),
        }
    }

    async fn kill_by_run_id(
        &self,
        run_id: &RunId,
        force: bool,
    ) -> Result<Vec<ContainerId>, ContainerError> {
        let filter = format!("label={}={}", LABEL_RUN_ID, run_id.as_str());
        let stdout = run_docker(&["ps", "-aq", "--filter", &filter])
            .await
            .map_err(ContainerError::Runtime)?;

        let mut killed = Vec::new();
        for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let result = if force {
                run_docker(&["rm", "-f", line]).await
            } else {
                run_docker(&["stop", "-t", "5", line]).await
            };
            match result {
                Ok(_) => killed.push(ContainerId::new(line)),
                Err(e) if e.contains("No such container") => {}
                Err(e) => warn!(container = line, error = %e, "kill failed"),
            }
        }
        Ok(killed)
    }

    async fn list_labeled(&self) -> Result<Vec<OrchestratorContainer>, ContainerError> {
        let filter = format!("label={}", LABEL_RUN_ID);
        let stdout = run_docker(&["ps", "-a", "--filter", &filter, "--format", "{{json .}}"])
            .await
            .map_err(ContainerError::Runtime)?;

        let mut containers = Vec::new();
        for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let ps: PsLine = match serde_json::from_str(line) {
                Ok(ps) => ps,
                Err(e) => {
                    warn!(error = %e, "skipping unparseable docker ps line");
                    continue;
                }
            };
            let labels = parse_labels(&ps.labels);
            containers.push(OrchestratorContainer {
                container_id: ContainerId::new(&ps.id),
                run_id: RunId::new(labels.get(LABEL_RUN_ID).cloned().unwrap_or_default()),
                task_id: labels.get(LABEL_TASK_ID).cloned().unwrap_or_default(),
                repo_id: labels.get(LABEL_REPO_ID).cloned().unwrap_or_default(),
                state: ps.state,
                image: ps.image,
                created_at: ps.created_at,
            });
        }
        Ok(containers)
    }
}

/// One line of `docker ps --format '{{json .}}'` output.
#[derive(Debug, Deserialize)]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Image", default)]
    image: String,
    #[serde(rename = "State", default)]
    state: String,
    #[serde(rename = "Labels", default)]
    labels: String,
    #[serde(rename = "CreatedAt", default)]
    created_at: String,
}

/// Parse docker's `k=v,k=v` label string.
fn parse_labels(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Deterministic-but-unique container name for a run.
fn container_name(run_id: &RunId) -> String {
    let safe: String = run_id
        .normalized()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!("ad-{}-{}", safe, &nonce[..8])
}

/// Read from one log pipe, flushing accumulated chunks downstream.
async fn pump(
    mut reader: impl tokio::io::AsyncRead + Unpin + Send,
    tx: mpsc::Sender<String>,
    cancel: CancellationToken,
) {
    let mut buf = vec![0u8; LOG_FLUSH_BYTES];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = reader.read(&mut buf) => read,
        };
        match read {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                if pending.len() >= LOG_FLUSH_BYTES {
                    let chunk = String::from_utf8_lossy(&pending).to_string();
                    pending.clear();
                    if tx.send(chunk).await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    if !pending.is_empty() && !cancel.is_cancelled() {
        let chunk = String::from_utf8_lossy(&pending).to_string();
        let _ = tx.send(chunk).await;
    }
}

/// Run a docker CLI command and return stdout on success.
async fn run_docker(args: &[&str]) -> Result<String, String> {
    let mut cmd = tokio::process::Command::new("docker");
    cmd.args(args);
    let description = format!("docker {}", args.first().unwrap_or(&""));
    let output = subprocess::run_with_timeout(cmd, DOCKER_COMMAND_TIMEOUT, &description).await?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!("{} failed: {}", description, stderr.trim()))
    }
}

#[cfg(test)]
#[path = "docker_tests.rs"]
mod tests;
