//! Container and image action handlers. Every handler maps its result onto
//! the response/error contract with the core's stable message strings.

use common::api::{
    PullImagePayload, RemoveContainerPayload, RemoveImagePayload, RestartContainerPayload,
    StartContainerPayload, StopContainerPayload,
};
use serde_json::Value;
use tracing::warn;

use crate::{
    actions::{nginx::NginxManager, ActionOutcome},
    runtime::{helpers::normalize_port_map, ContainerSpec, DynContainerRuntime},
};

const DEFAULT_STOP_TIMEOUT_SECS: i64 = 10;

fn missing_string(payload: &Value, key: &str) -> bool {
    !payload
        .get(key)
        .and_then(Value::as_str)
        .map(|s| !s.is_empty())
        .unwrap_or(false)
}

pub(crate) async fn start_container(
    runtime: &DynContainerRuntime,
    nginx: &NginxManager,
    payload: &Value,
) -> ActionOutcome {
    // Required fields get their own messages before the full parse.
    if missing_string(payload, "image") {
        return ActionOutcome::failed("Image is required");
    }
    if missing_string(payload, "name") {
        return ActionOutcome::failed("Name is required");
    }

    let parsed: StartContainerPayload = match serde_json::from_value(payload.clone()) {
        Ok(parsed) => parsed,
        Err(err) => return ActionOutcome::failed(format!("Invalid payload: {err}")),
    };

    let container_id = if let Some(existing_id) = &parsed.container_id {
        // Re-delivery or operator intent: start an already-created container.
        if let Err(err) = runtime.start_existing(existing_id).await {
            return ActionOutcome::failed(format!("Failed to start container: {err}"));
        }
        existing_id.clone()
    } else {
        let spec = ContainerSpec {
            image: parsed.image.clone(),
            name: parsed.name.clone(),
            env: parsed
                .environment
                .as_ref()
                .map(|env| env.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default(),
            ports: parsed
                .ports
                .as_ref()
                .map(normalize_port_map)
                .unwrap_or_default(),
            binds: parsed
                .volumes
                .as_ref()
                .map(|vols| vols.iter().map(|(h, c)| (h.clone(), c.clone())).collect())
                .unwrap_or_default(),
        };

        match runtime.create_and_start(spec).await {
            Ok(id) => id,
            Err(err) => {
                return ActionOutcome::failed(format!("Failed to create container: {err}"))
            }
        }
    };

    if let Some(domain) = parsed.domain.as_deref().filter(|d| !d.is_empty()) {
        if let Err(err) = nginx.point_domain_at_container(domain, &parsed.name).await {
            warn!(?err, domain, "best-effort nginx rewrite failed");
        }
    }

    ActionOutcome::completed(format!(
        "Container {} started successfully with ID: {}",
        parsed.name, container_id
    ))
}

pub(crate) async fn stop_container(runtime: &DynContainerRuntime, payload: &Value) -> ActionOutcome {
    if missing_string(payload, "container_id") {
        return ActionOutcome::failed("Container ID is required");
    }
    let parsed: StopContainerPayload = match serde_json::from_value(payload.clone()) {
        Ok(parsed) => parsed,
        Err(err) => return ActionOutcome::failed(format!("Invalid payload: {err}")),
    };

    let timeout = parsed.timeout.unwrap_or(DEFAULT_STOP_TIMEOUT_SECS);
    match runtime.stop_container(&parsed.container_id, timeout).await {
        Ok(()) => ActionOutcome::completed(format!(
            "Container {} stopped successfully",
            parsed.container_id
        )),
        Err(err) => ActionOutcome::failed(format!("Failed to stop container: {err}")),
    }
}

pub(crate) async fn restart_container(
    runtime: &DynContainerRuntime,
    payload: &Value,
) -> ActionOutcome {
    if missing_string(payload, "container_id") {
        return ActionOutcome::failed("Container ID is required");
    }
    let parsed: RestartContainerPayload = match serde_json::from_value(payload.clone()) {
        Ok(parsed) => parsed,
        Err(err) => return ActionOutcome::failed(format!("Invalid payload: {err}")),
    };

    match runtime
        .restart_container(&parsed.container_id, parsed.timeout)
        .await
    {
        Ok(()) => ActionOutcome::completed(format!(
            "Container {} restarted successfully",
            parsed.container_id
        )),
        Err(err) => ActionOutcome::failed(format!("Failed to restart container: {err}")),
    }
}

pub(crate) async fn remove_container(
    runtime: &DynContainerRuntime,
    payload: &Value,
) -> ActionOutcome {
    if missing_string(payload, "container_id") {
        return ActionOutcome::failed("Container ID is required");
    }
    let parsed: RemoveContainerPayload = match serde_json::from_value(payload.clone()) {
        Ok(parsed) => parsed,
        Err(err) => return ActionOutcome::failed(format!("Invalid payload: {err}")),
    };

    match runtime
        .remove_container(&parsed.container_id, parsed.force)
        .await
    {
        Ok(()) => ActionOutcome::completed(format!(
            "Container {} removed successfully",
            parsed.container_id
        )),
        Err(err) => ActionOutcome::failed(format!("Failed to remove container: {err}")),
    }
}

pub(crate) async fn remove_image(runtime: &DynContainerRuntime, payload: &Value) -> ActionOutcome {
    if missing_string(payload, "image_id") {
        return ActionOutcome::failed("Image ID is required");
    }
    let parsed: RemoveImagePayload = match serde_json::from_value(payload.clone()) {
        Ok(parsed) => parsed,
        Err(err) => return ActionOutcome::failed(format!("Invalid payload: {err}")),
    };

    match runtime.remove_image(&parsed.image_id, parsed.force).await {
        Ok(()) => {
            ActionOutcome::completed(format!("Image {} removed successfully", parsed.image_id))
        }
        Err(err) => ActionOutcome::failed(format!("Failed to remove image: {err}")),
    }
}

pub(crate) async fn pull_image(runtime: &DynContainerRuntime, payload: &Value) -> ActionOutcome {
    if missing_string(payload, "image") {
        return ActionOutcome::failed("Image is required");
    }
    let parsed: PullImagePayload = match serde_json::from_value(payload.clone()) {
        Ok(parsed) => parsed,
        Err(err) => return ActionOutcome::failed(format!("Invalid payload: {err}")),
    };

    let tag = parsed.tag.as_deref().unwrap_or("latest");
    let reference = format!("{}:{}", parsed.image, tag);

    match runtime.pull_image(&reference).await {
        Ok(()) => ActionOutcome::completed(format!("Image {reference} pulled successfully")),
        Err(err) => ActionOutcome::failed(format!("Failed to pull image: {err}")),
    }
}
