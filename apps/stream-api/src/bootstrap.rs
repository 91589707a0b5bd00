//! Idempotent preparation of the RTMP ingest container.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;

/// Observed state of a named container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Missing,
    Stopped,
    Running,
}

/// What the bootstrap had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Created,
    Started,
    AlreadyRunning,
}

/// How the ingest container is created when absent.
#[derive(Debug, Clone)]
pub struct IngestContainerSpec {
    pub name: String,
    pub image: String,
    pub rtmp_port: u16,
    pub http_port: u16,
    /// Host directory the encoder writes HLS into.
    pub host_output_dir: PathBuf,
    /// Where that directory is mounted inside the container.
    pub mount_path: String,
}

#[derive(Debug, thiserror::Error)]
#[error("container bootstrap failed during {step}: {reason}")]
pub struct ContainerBootstrapFailed {
    pub step: &'static str,
    pub reason: String,
}

impl ContainerBootstrapFailed {
    fn new(step: &'static str, reason: impl Into<String>) -> Self {
        Self {
            step,
            reason: reason.into(),
        }
    }
}

/// Container runtime operations used by the bootstrap.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn inspect(&self, name: &str) -> Result<ContainerState, ContainerBootstrapFailed>;
    async fn create(&self, spec: &IngestContainerSpec) -> Result<(), ContainerBootstrapFailed>;
    async fn start(&self, name: &str) -> Result<(), ContainerBootstrapFailed>;
}

/// Make sure the ingest container exists and is running.
pub async fn ensure_ingest_container(
    runtime: &dyn ContainerRuntime,
    spec: &IngestContainerSpec,
) -> Result<BootstrapOutcome, ContainerBootstrapFailed> {
    match runtime.inspect(&spec.name).await? {
        ContainerState::Missing => {
            runtime.create(spec).await?;
            tracing::info!(
                container = %spec.name,
                image = %spec.image,
                rtmp_port = spec.rtmp_port,
                http_port = spec.http_port,
                "ingest container created"
            );
            Ok(BootstrapOutcome::Created)
        }
        ContainerState::Stopped => {
            runtime.start(&spec.name).await?;
            tracing::info!(container = %spec.name, "ingest container started");
            Ok(BootstrapOutcome::Started)
        }
        ContainerState::Running => {
            tracing::info!(container = %spec.name, "ingest container already running");
            Ok(BootstrapOutcome::AlreadyRunning)
        }
    }
}

// ---------------------------------------------------------------------------
// Docker CLI implementation
// ---------------------------------------------------------------------------

pub struct DockerCli {
    bin: String,
}

impl DockerCli {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    async fn run(
        &self,
        step: &'static str,
        args: &[String],
    ) -> Result<std::process::Output, ContainerBootstrapFailed> {
        tracing::debug!(bin = %self.bin, ?args, "invoking container runtime");
        Command::new(&self.bin)
            .args(args)
            .output()
            .await
            .map_err(|e| ContainerBootstrapFailed::new(step, format!("{} not runnable: {e}", self.bin)))
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn inspect(&self, name: &str) -> Result<ContainerState, ContainerBootstrapFailed> {
        let args = vec![
            "inspect".to_string(),
            "--format".to_string(),
            "{{.State.Running}}".to_string(),
            name.to_string(),
        ];
        let output = self.run("inspect", &args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        parse_inspect(output.status.success(), &stdout, &stderr)
    }

    async fn create(&self, spec: &IngestContainerSpec) -> Result<(), ContainerBootstrapFailed> {
        tokio::fs::create_dir_all(&spec.host_output_dir)
            .await
            .map_err(|e| ContainerBootstrapFailed::new("create", e.to_string()))?;
        // Bind mounts need an absolute host path.
        let host_dir = tokio::fs::canonicalize(&spec.host_output_dir)
            .await
            .map_err(|e| ContainerBootstrapFailed::new("create", e.to_string()))?;

        let output = self.run("create", &run_args(spec, &host_dir)).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(ContainerBootstrapFailed::new(
                "create",
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }

    async fn start(&self, name: &str) -> Result<(), ContainerBootstrapFailed> {
        let output = self
            .run("start", &["start".to_string(), name.to_string()])
            .await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(ContainerBootstrapFailed::new(
                "start",
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }
}

fn parse_inspect(
    success: bool,
    stdout: &str,
    stderr: &str,
) -> Result<ContainerState, ContainerBootstrapFailed> {
    if success {
        return Ok(match stdout.trim() {
            "true" => ContainerState::Running,
            _ => ContainerState::Stopped,
        });
    }
    if stderr.contains("No such object") || stderr.contains("No such container") {
        return Ok(ContainerState::Missing);
    }
    Err(ContainerBootstrapFailed::new("inspect", stderr.trim()))
}

fn run_args(spec: &IngestContainerSpec, host_dir: &std::path::Path) -> Vec<String> {
    vec![
        "run".to_string(),
        "-d".to_string(),
        "--name".to_string(),
        spec.name.clone(),
        "-p".to_string(),
        format!("{}:1935", spec.rtmp_port),
        "-p".to_string(),
        format!("{}:80", spec.http_port),
        "-v".to_string(),
        format!("{}:{}", host_dir.display(), spec.mount_path),
        spec.image.clone(),
    ]
}
