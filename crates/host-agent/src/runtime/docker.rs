use bollard::{
    errors::Error as DockerError,
    models::{ContainerCreateBody, HostConfig},
    query_parameters::{
        CreateContainerOptions, CreateImageOptions, InspectContainerOptions, ListContainersOptions,
        ListImagesOptions, LogsOptionsBuilder, RemoveContainerOptions, RemoveImageOptions,
        RestartContainerOptions, StartContainerOptions, StatsOptionsBuilder, StopContainerOptions,
    },
    Docker,
};
use futures_util::{StreamExt, TryStreamExt};

use crate::runtime::{
    helpers::{
        build_ports, format_binds, format_env, interface_total, memory_usage_mb,
        one_shot_cpu_percent, strip_name_slash, strip_sha256,
    },
    ContainerOverview, ContainerRuntime, ContainerRuntimeError, ContainerSpec, ContainerUsage,
    ImageOverview,
};
use async_trait::async_trait;

#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn connect() -> Result<Self, ContainerRuntimeError> {
        let docker =
            Docker::connect_with_defaults().map_err(|err| ContainerRuntimeError::Connection {
                context: "connect",
                source: err.into(),
            })?;
        Ok(Self { docker })
    }

    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_container_overviews(
        &self,
    ) -> Result<Vec<ContainerOverview>, ContainerRuntimeError> {
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions {
                all: true,
                ..Default::default()
            }))
            .await
            .map_err(|err| ContainerRuntimeError::ListContainers(err.into()))?;

        let mut overviews = Vec::with_capacity(containers.len());
        for summary in containers {
            let Some(id) = summary.id else { continue };

            // Containers can disappear between list and inspect; skip those.
            let inspect = match self
                .docker
                .inspect_container(&id, None::<InspectContainerOptions>)
                .await
            {
                Ok(inspect) => inspect,
                Err(err) if is_not_found(&err) => continue,
                Err(err) => {
                    return Err(ContainerRuntimeError::ListContainers(err.into()));
                }
            };

            let mut ip = None;
            let mut mac = None;
            let mut networks = Vec::new();
            if let Some(settings) = inspect.network_settings {
                if let Some(endpoint_map) = settings.networks {
                    for (name, endpoint) in endpoint_map {
                        networks.push(name);
                        if ip.is_none() {
                            ip = endpoint.ip_address.filter(|s| !s.is_empty());
                            mac = endpoint.mac_address.filter(|s| !s.is_empty());
                        }
                    }
                }
            }
            networks.sort();

            overviews.push(ContainerOverview {
                id,
                created_unix: summary.created.unwrap_or_default(),
                status: summary.status.unwrap_or_default(),
                image_id: strip_sha256(&summary.image_id.unwrap_or_default()),
                name: summary
                    .names
                    .as_ref()
                    .and_then(|names| names.first())
                    .map(|name| strip_name_slash(name))
                    .unwrap_or_default(),
                restart_count: inspect.restart_count.unwrap_or_default(),
                ip,
                mac,
                networks,
            });
        }

        Ok(overviews)
    }

    async fn container_usage(&self, id: &str) -> ContainerUsage {
        let mut stream = self
            .docker
            .stats(
                id,
                Some(
                    StatsOptionsBuilder::default()
                        .stream(false)
                        .one_shot(true)
                        .build(),
                ),
            )
            .take(1);

        let stats = match stream.try_next().await {
            Ok(Some(stats)) => stats,
            _ => return ContainerUsage::default(),
        };

        ContainerUsage {
            cpu_percent: one_shot_cpu_percent(&stats),
            memory_mb: memory_usage_mb(&stats),
            rx_bytes: interface_total(&stats, |net| net.rx_bytes),
            tx_bytes: interface_total(&stats, |net| net.tx_bytes),
        }
    }

    async fn container_logs_since(
        &self,
        id: &str,
        since_secs: i64,
    ) -> Result<Vec<String>, ContainerRuntimeError> {
        let since = (chrono::Utc::now().timestamp() - since_secs).max(0) as i32;
        let options = LogsOptionsBuilder::default()
            .stdout(true)
            .stderr(true)
            .timestamps(true)
            .since(since)
            .build();

        // bollard already strips docker's 8-byte stream framing from each
        // chunk, so only line splitting remains.
        let mut lines = Vec::new();
        let mut stream = self.docker.logs(id, Some(options));
        while let Some(chunk) = stream.next().await {
            let output = chunk.map_err(|err| ContainerRuntimeError::Logs {
                id: id.to_string(),
                source: err.into(),
            })?;
            let text = output.to_string();
            for line in text.split('\n') {
                let line = line.trim_end_matches('\r');
                if !line.is_empty() {
                    lines.push(line.to_string());
                }
            }
        }

        Ok(lines)
    }

    async fn list_image_overviews(&self) -> Result<Vec<ImageOverview>, ContainerRuntimeError> {
        let images = self
            .docker
            .list_images(Some(ListImagesOptions {
                all: false,
                ..Default::default()
            }))
            .await
            .map_err(|err| ContainerRuntimeError::ListImages(err.into()))?;

        Ok(images
            .into_iter()
            .map(|image| ImageOverview {
                id: strip_sha256(&image.id),
                created_unix: image.created,
                size: image.size,
                tags: image
                    .repo_tags
                    .into_iter()
                    .filter(|tag| tag != "<none>:<none>")
                    .collect(),
            })
            .collect())
    }

    async fn pull_image(&self, reference: &str) -> Result<(), ContainerRuntimeError> {
        let mut stream = self.docker.create_image(
            Some(CreateImageOptions {
                from_image: Some(reference.to_string()),
                ..Default::default()
            }),
            None,
            None,
        );

        while let Some(progress) = stream.next().await {
            progress.map_err(|err| ContainerRuntimeError::PullImage {
                image: reference.to_string(),
                source: err.into(),
            })?;
        }

        Ok(())
    }

    async fn create_and_start(&self, spec: ContainerSpec) -> Result<String, ContainerRuntimeError> {
        self.pull_image(&spec.image).await?;

        let env = format_env(&spec.env);
        let binds = format_binds(&spec.binds);
        let (port_bindings, exposed_ports) = build_ports(&spec.ports);

        let host_config = HostConfig {
            port_bindings,
            binds,
            ..Default::default()
        };

        let body = ContainerCreateBody {
            image: Some(spec.image.clone()),
            env,
            exposed_ports,
            host_config: Some(host_config),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: Some(spec.name.clone()),
                    platform: String::new(),
                }),
                body,
            )
            .await
            .map_err(|err| ContainerRuntimeError::CreateContainer {
                name: spec.name.clone(),
                source: err.into(),
            })?;

        self.start_existing(&created.id).await?;

        Ok(created.id)
    }

    async fn start_existing(&self, id: &str) -> Result<(), ContainerRuntimeError> {
        self.docker
            .start_container(id, None::<StartContainerOptions>)
            .await
            .map_err(|err| map_not_found(err, id, |id, source| ContainerRuntimeError::StartContainer { id, source }))
    }

    async fn stop_container(
        &self,
        id: &str,
        timeout_secs: i64,
    ) -> Result<(), ContainerRuntimeError> {
        match self
            .docker
            .stop_container(
                id,
                Some(StopContainerOptions {
                    signal: None,
                    t: Some(timeout_secs as i32),
                }),
            )
            .await
        {
            Ok(_) => Ok(()),
            // 304: already stopped.
            Err(err) if is_not_modified(&err) => Ok(()),
            Err(err) => Err(map_not_found(err, id, |id, source| {
                ContainerRuntimeError::StopContainer { id, source }
            })),
        }
    }

    async fn restart_container(
        &self,
        id: &str,
        timeout_secs: Option<i64>,
    ) -> Result<(), ContainerRuntimeError> {
        self.docker
            .restart_container(
                id,
                Some(RestartContainerOptions {
                    signal: None,
                    t: timeout_secs.map(|t| t as i32),
                }),
            )
            .await
            .map_err(|err| map_not_found(err, id, |id, source| ContainerRuntimeError::RestartContainer { id, source }))
    }

    async fn remove_container(&self, id: &str, force: bool) -> Result<(), ContainerRuntimeError> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    v: false,
                    force,
                    link: false,
                }),
            )
            .await
            .map_err(|err| map_not_found(err, id, |id, source| ContainerRuntimeError::RemoveContainer { id, source }))
    }

    async fn remove_image(&self, id: &str, force: bool) -> Result<(), ContainerRuntimeError> {
        self.docker
            .remove_image(
                id,
                Some(RemoveImageOptions {
                    force,
                    noprune: false,
                }),
                None,
            )
            .await
            .map(|_| ())
            .map_err(|err| map_not_found(err, id, |id, source| ContainerRuntimeError::RemoveImage { id, source }))
    }
}

fn map_not_found<F>(err: DockerError, id: &str, wrap: F) -> ContainerRuntimeError
where
    F: FnOnce(String, anyhow::Error) -> ContainerRuntimeError,
{
    if is_not_found(&err) {
        ContainerRuntimeError::NotFound { id: id.to_string() }
    } else {
        wrap(id.to_string(), err.into())
    }
}

fn is_not_found(err: &DockerError) -> bool {
    matches!(
        err,
        DockerError::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

fn is_not_modified(err: &DockerError) -> bool {
    matches!(
        err,
        DockerError::DockerResponseServerError {
            status_code: 304,
            ..
        }
    )
}
