use std::sync::Mutex;

use async_trait::async_trait;

use crate::runtime::{
    ContainerOverview, ContainerRuntime, ContainerRuntimeError, ContainerSpec, ContainerUsage,
    ImageOverview,
};

/// In-memory runtime double recording every call for assertions.
#[derive(Default)]
pub struct MockRuntime {
    containers: Mutex<Vec<(ContainerOverview, ContainerUsage, Vec<String>)>>,
    images: Mutex<Vec<ImageOverview>>,
    created: Mutex<Vec<ContainerSpec>>,
    started: Mutex<Vec<String>>,
    stopped: Mutex<Vec<(String, i64)>>,
    restarted: Mutex<Vec<(String, Option<i64>)>>,
    removed_containers: Mutex<Vec<(String, bool)>>,
    removed_images: Mutex<Vec<(String, bool)>>,
    pulled: Mutex<Vec<String>>,
    fail_listing: Mutex<bool>,
    fail_next_message: Mutex<Option<String>>,
}

impl MockRuntime {
    pub fn push_container(
        &self,
        overview: ContainerOverview,
        usage: ContainerUsage,
        logs: Vec<String>,
    ) {
        self.containers.lock().unwrap().push((overview, usage, logs));
    }

    pub fn push_image(&self, image: ImageOverview) {
        self.images.lock().unwrap().push(image);
    }

    pub fn fail_listing(&self) {
        *self.fail_listing.lock().unwrap() = true;
    }

    /// Makes the next mutating call fail with the given message.
    pub fn fail_next(&self, message: &str) {
        *self.fail_next_message.lock().unwrap() = Some(message.to_string());
    }

    fn take_failure(&self) -> Option<String> {
        self.fail_next_message.lock().unwrap().take()
    }

    pub fn created_specs(&self) -> Vec<ContainerSpec> {
        self.created.lock().unwrap().clone()
    }

    pub fn started_existing(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn stopped(&self) -> Vec<(String, i64)> {
        self.stopped.lock().unwrap().clone()
    }

    pub fn restarted(&self) -> Vec<String> {
        self.restarted
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn restarted_with_timeouts(&self) -> Vec<(String, Option<i64>)> {
        self.restarted.lock().unwrap().clone()
    }

    pub fn removed_containers(&self) -> Vec<(String, bool)> {
        self.removed_containers.lock().unwrap().clone()
    }

    pub fn removed_images(&self) -> Vec<(String, bool)> {
        self.removed_images.lock().unwrap().clone()
    }

    pub fn pulled(&self) -> Vec<String> {
        self.pulled.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn list_container_overviews(
        &self,
    ) -> Result<Vec<ContainerOverview>, ContainerRuntimeError> {
        if *self.fail_listing.lock().unwrap() {
            return Err(ContainerRuntimeError::ListContainers(anyhow::anyhow!(
                "listing disabled"
            )));
        }
        Ok(self
            .containers
            .lock()
            .unwrap()
            .iter()
            .map(|(overview, _, _)| overview.clone())
            .collect())
    }

    async fn container_usage(&self, id: &str) -> ContainerUsage {
        self.containers
            .lock()
            .unwrap()
            .iter()
            .find(|(overview, _, _)| overview.id == id)
            .map(|(_, usage, _)| *usage)
            .unwrap_or_default()
    }

    async fn container_logs_since(
        &self,
        id: &str,
        _since_secs: i64,
    ) -> Result<Vec<String>, ContainerRuntimeError> {
        Ok(self
            .containers
            .lock()
            .unwrap()
            .iter()
            .find(|(overview, _, _)| overview.id == id)
            .map(|(_, _, logs)| logs.clone())
            .unwrap_or_default())
    }

    async fn list_image_overviews(&self) -> Result<Vec<ImageOverview>, ContainerRuntimeError> {
        Ok(self.images.lock().unwrap().clone())
    }

    async fn pull_image(&self, reference: &str) -> Result<(), ContainerRuntimeError> {
        if let Some(message) = self.take_failure() {
            return Err(ContainerRuntimeError::PullImage {
                image: reference.to_string(),
                source: anyhow::anyhow!(message),
            });
        }
        self.pulled.lock().unwrap().push(reference.to_string());
        Ok(())
    }

    async fn create_and_start(&self, spec: ContainerSpec) -> Result<String, ContainerRuntimeError> {
        if let Some(message) = self.take_failure() {
            return Err(ContainerRuntimeError::CreateContainer {
                name: spec.name.clone(),
                source: anyhow::anyhow!(message),
            });
        }
        let id = format!("mock-{}", spec.name);
        self.created.lock().unwrap().push(spec);
        Ok(id)
    }

    async fn start_existing(&self, id: &str) -> Result<(), ContainerRuntimeError> {
        if let Some(message) = self.take_failure() {
            return Err(ContainerRuntimeError::StartContainer {
                id: id.to_string(),
                source: anyhow::anyhow!(message),
            });
        }
        self.started.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn stop_container(
        &self,
        id: &str,
        timeout_secs: i64,
    ) -> Result<(), ContainerRuntimeError> {
        if let Some(message) = self.take_failure() {
            return Err(ContainerRuntimeError::StopContainer {
                id: id.to_string(),
                source: anyhow::anyhow!(message),
            });
        }
        self.stopped.lock().unwrap().push((id.to_string(), timeout_secs));
        Ok(())
    }

    async fn restart_container(
        &self,
        id: &str,
        timeout_secs: Option<i64>,
    ) -> Result<(), ContainerRuntimeError> {
        if let Some(message) = self.take_failure() {
            return Err(ContainerRuntimeError::RestartContainer {
                id: id.to_string(),
                source: anyhow::anyhow!(message),
            });
        }
        self.restarted
            .lock()
            .unwrap()
            .push((id.to_string(), timeout_secs));
        Ok(())
    }

    async fn remove_container(&self, id: &str, force: bool) -> Result<(), ContainerRuntimeError> {
        if let Some(message) = self.take_failure() {
            return Err(ContainerRuntimeError::RemoveContainer {
                id: id.to_string(),
                source: anyhow::anyhow!(message),
            });
        }
        self.removed_containers
            .lock()
            .unwrap()
            .push((id.to_string(), force));
        Ok(())
    }

    async fn remove_image(&self, id: &str, force: bool) -> Result<(), ContainerRuntimeError> {
        if let Some(message) = self.take_failure() {
            return Err(ContainerRuntimeError::RemoveImage {
                id: id.to_string(),
                source: anyhow::anyhow!(message),
            });
        }
        self.removed_images
            .lock()
            .unwrap()
            .push((id.to_string(), force));
        Ok(())
    }
}
