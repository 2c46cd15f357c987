use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub mod docker;
pub mod helpers;

pub type DynContainerRuntime = Arc<dyn ContainerRuntime>;

/// Static view of one container, assembled from list + inspect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerOverview {
    /// Full container id.
    pub id: String,
    /// Creation time as a unix timestamp.
    pub created_unix: i64,
    /// Raw status string, e.g. `Up 2 hours`.
    pub status: String,
    /// Image id with the `sha256:` prefix already stripped.
    pub image_id: String,
    /// Name with the leading `/` already stripped.
    pub name: String,
    pub restart_count: i64,
    /// First non-empty IP across attached networks.
    pub ip: Option<String>,
    /// First non-empty MAC across attached networks.
    pub mac: Option<String>,
    /// Attached network names.
    pub networks: Vec<String>,
}

/// One-shot resource usage of a container. All fields are `None` when the
/// runtime could not produce a sample.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ContainerUsage {
    pub cpu_percent: Option<f64>,
    pub memory_mb: Option<u64>,
    pub rx_bytes: Option<u64>,
    pub tx_bytes: Option<u64>,
}

/// Static view of one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageOverview {
    /// Image id with the `sha256:` prefix already stripped.
    pub id: String,
    /// Creation time as a unix timestamp.
    pub created_unix: i64,
    pub size: i64,
    /// Repo tags, `<none>:<none>` filtered out.
    pub tags: Vec<String>,
}

/// Creation spec for `start_container`.
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    pub image: String,
    pub name: String,
    pub env: Vec<(String, String)>,
    pub ports: Vec<PortBindingSpec>,
    /// Host path -> container path binds.
    pub binds: Vec<(String, String)>,
}

/// One port publication, already normalized from the payload's map forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBindingSpec {
    /// `"80/tcp"` style key the runtime expects.
    pub container_port: String,
    pub host_port: String,
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn list_container_overviews(&self)
        -> Result<Vec<ContainerOverview>, ContainerRuntimeError>;

    /// One-shot stats sample; missing metrics come back as `None`, never zero.
    async fn container_usage(&self, id: &str) -> ContainerUsage;

    /// Log lines emitted in the last `since_secs` seconds, timestamps
    /// preserved, multiplex framing already removed.
    async fn container_logs_since(
        &self,
        id: &str,
        since_secs: i64,
    ) -> Result<Vec<String>, ContainerRuntimeError>;

    async fn list_image_overviews(&self) -> Result<Vec<ImageOverview>, ContainerRuntimeError>;

    async fn pull_image(&self, reference: &str) -> Result<(), ContainerRuntimeError>;

    /// Creates and starts a fresh container, returning its id.
    async fn create_and_start(&self, spec: ContainerSpec) -> Result<String, ContainerRuntimeError>;

    /// Starts an already-created container.
    async fn start_existing(&self, id: &str) -> Result<(), ContainerRuntimeError>;

    async fn stop_container(&self, id: &str, timeout_secs: i64)
        -> Result<(), ContainerRuntimeError>;

    async fn restart_container(
        &self,
        id: &str,
        timeout_secs: Option<i64>,
    ) -> Result<(), ContainerRuntimeError>;

    async fn remove_container(&self, id: &str, force: bool) -> Result<(), ContainerRuntimeError>;

    async fn remove_image(&self, id: &str, force: bool) -> Result<(), ContainerRuntimeError>;
}

#[derive(Debug, Error)]
pub enum ContainerRuntimeError {
    #[error("failed to connect to runtime ({context}): {source}")]
    Connection {
        context: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to pull image {image}: {source}")]
    PullImage {
        image: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to create container {name}: {source}")]
    CreateContainer {
        name: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to start container {id}: {source}")]
    StartContainer {
        id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to stop container {id}: {source}")]
    StopContainer {
        id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to restart container {id}: {source}")]
    RestartContainer {
        id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to remove container {id}: {source}")]
    RemoveContainer {
        id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to remove image {id}: {source}")]
    RemoveImage {
        id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to read logs for container {id}: {source}")]
    Logs {
        id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to list containers: {0}")]
    ListContainers(#[source] anyhow::Error),
    #[error("failed to list images: {0}")]
    ListImages(#[source] anyhow::Error),
    #[error("container {id} not found")]
    NotFound { id: String },
}

pub use docker::DockerRuntime;
