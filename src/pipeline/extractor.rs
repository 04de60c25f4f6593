//! Context extraction
//!
//! Turns a resource event into a [`DiagnosticContext`]. Collection never
//! fails: logs or events that cannot be fetched degrade to placeholders and
//! the pipeline carries on.

use k8s_openapi::api::core::v1::{
    ContainerState as K8sContainerState, ContainerStatus, Node, Pod,
};

use crate::domain::{
    ConditionSnapshot, ContainerState, ContainerStatusSnapshot, DiagnosticContext, EventSummary,
    ResourceEvent, ResourceIdentity, ResourceObject,
};
use crate::integrations::{ClusterSource, KubeEvent};

use super::profile::{MissingLogs, PlaybookProfile, ProfileFocus};

/// Events forwarded to the AI service
pub const MAX_EVENTS: usize = 5;

/// Log text used when pod logs cannot be fetched
pub const LOGS_UNAVAILABLE: &str = "No logs available";

pub const LABEL_IMAGE_PULL: &str = "ImagePullBackOff";
pub const LABEL_CRASH_LOOP: &str = "CrashLoopBackOff";
pub const LABEL_OOM_KILLED: &str = "OOMKilled";
pub const LABEL_UNKNOWN: &str = "Unknown";
pub const LABEL_NODE_NOT_READY: &str = "NotReady";
pub const LABEL_NODE_ISSUE: &str = "NodeIssue";
pub const LABEL_RESOURCE_ISSUE: &str = "ResourceIssue";

const NODE_PRESSURE_CONDITIONS: [&str; 4] = [
    "MemoryPressure",
    "DiskPressure",
    "PIDPressure",
    "NetworkUnavailable",
];

/// Context plus the bits the emitter needs that are not sent to the service
#[derive(Debug, Clone)]
pub struct CollectedContext {
    pub context: DiagnosticContext,
    /// Detected problem label, e.g. `CrashLoopBackOff`
    pub problem: String,
    /// Logs as fetched, before tailing
    pub raw_logs: Option<String>,
}

/// Last `max` characters of `text`
pub fn tail_chars(text: &str, max: usize) -> &str {
    let count = text.chars().count();
    if count <= max {
        return text;
    }

    text.char_indices()
        .nth(count - max)
        .map(|(idx, _)| &text[idx..])
        .unwrap_or(text)
}

/// First [`MAX_EVENTS`] events reduced to type, reason and message
pub fn summarize_events(events: &[KubeEvent]) -> Vec<EventSummary> {
    events
        .iter()
        .take(MAX_EVENTS)
        .map(|e| EventSummary {
            event_type: e.event_type.clone(),
            reason: e.reason.clone(),
            message: e.message.clone(),
        })
        .collect()
}

fn snapshot_state(state: Option<&K8sContainerState>) -> ContainerState {
    if let Some(waiting) = state.and_then(|s| s.waiting.as_ref()) {
        ContainerState::Waiting {
            reason: waiting.reason.clone().unwrap_or_default(),
            message: waiting.message.clone().unwrap_or_default(),
        }
    } else if let Some(terminated) = state.and_then(|s| s.terminated.as_ref()) {
        ContainerState::Terminated {
            reason: terminated.reason.clone().unwrap_or_default(),
            exit_code: terminated.exit_code,
            message: terminated.message.clone().unwrap_or_default(),
        }
    } else if let Some(running) = state.and_then(|s| s.running.as_ref()) {
        ContainerState::Running {
            started_at: running.started_at.as_ref().map(|t| t.0.to_rfc3339()),
        }
    } else {
        // The API server reports containers without a state as pending
        ContainerState::Waiting {
            reason: String::new(),
            message: String::new(),
        }
    }
}

fn snapshot_container(cs: &ContainerStatus) -> ContainerStatusSnapshot {
    ContainerStatusSnapshot {
        name: cs.name.clone(),
        image: cs.image.clone(),
        ready: cs.ready,
        restart_count: cs.restart_count,
        state: snapshot_state(cs.state.as_ref()),
    }
}

/// One snapshot per container status, in the order the API reports them
pub fn container_snapshots(pod: &Pod) -> Vec<ContainerStatusSnapshot> {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .map(|statuses| statuses.iter().map(snapshot_container).collect())
        .unwrap_or_default()
}

pub fn is_image_pull_failure(container: &ContainerStatusSnapshot) -> bool {
    container
        .waiting_reason()
        .is_some_and(|r| r.contains("ImagePullBackOff") || r.contains("ErrImagePull"))
}

fn container_label(container: &ContainerStatusSnapshot) -> Option<&'static str> {
    if is_image_pull_failure(container) {
        return Some(LABEL_IMAGE_PULL);
    }
    if container
        .waiting_reason()
        .is_some_and(|r| r.contains("CrashLoopBackOff"))
    {
        return Some(LABEL_CRASH_LOOP);
    }
    if container.terminated_reason() == Some("OOMKilled") {
        return Some(LABEL_OOM_KILLED);
    }
    None
}

/// Problem label for a pod: the first container with a recognised reason
/// wins; otherwise the phase, or `Unknown` without container statuses.
pub fn classify_containers(containers: &[ContainerStatusSnapshot], phase: Option<&str>) -> String {
    if let Some(label) = containers.iter().find_map(container_label) {
        return label.to_string();
    }

    if containers.is_empty() {
        return LABEL_UNKNOWN.to_string();
    }

    phase
        .filter(|p| !p.is_empty())
        .unwrap_or(LABEL_UNKNOWN)
        .to_string()
}

/// Problem label for a node based on its conditions
pub fn classify_node(conditions: &[ConditionSnapshot]) -> String {
    let ready = conditions.iter().find(|c| c.condition_type == "Ready");
    if ready.map_or(true, |c| c.status != "True") {
        return LABEL_NODE_NOT_READY.to_string();
    }

    conditions
        .iter()
        .find(|c| {
            c.status == "True" && NODE_PRESSURE_CONDITIONS.contains(&c.condition_type.as_str())
        })
        .map(|c| c.condition_type.clone())
        .unwrap_or_else(|| LABEL_NODE_ISSUE.to_string())
}

fn condition(
    condition_type: &str,
    status: &str,
    reason: Option<&String>,
    message: Option<&String>,
) -> ConditionSnapshot {
    ConditionSnapshot {
        condition_type: condition_type.to_string(),
        status: status.to_string(),
        reason: reason.cloned().unwrap_or_default(),
        message: message.cloned().unwrap_or_default(),
    }
}

pub fn pod_conditions(pod: &Pod) -> Vec<ConditionSnapshot> {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .map(|c| condition(&c.type_, &c.status, c.reason.as_ref(), c.message.as_ref()))
                .collect()
        })
        .unwrap_or_default()
}

pub fn node_conditions(node: &Node) -> Vec<ConditionSnapshot> {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .map(|c| condition(&c.type_, &c.status, c.reason.as_ref(), c.message.as_ref()))
                .collect()
        })
        .unwrap_or_default()
}

/// Conditions from a generic object's `status.conditions`, if it has any
pub fn resource_conditions(object: &ResourceObject) -> Vec<ConditionSnapshot> {
    let Some(conditions) = object
        .status
        .as_ref()
        .and_then(|s| s.get("conditions"))
        .and_then(|c| c.as_array())
    else {
        return Vec::new();
    };

    let field = |c: &serde_json::Value, key: &str| {
        c.get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };

    conditions
        .iter()
        .map(|c| ConditionSnapshot {
            condition_type: field(c, "type"),
            status: field(c, "status"),
            reason: field(c, "reason"),
            message: field(c, "message"),
        })
        .collect()
}

async fn collect_events(
    source: &dyn ClusterSource,
    identity: &ResourceIdentity,
) -> Vec<EventSummary> {
    match source.list_events(identity).await {
        Ok(events) => summarize_events(&events),
        Err(e) => {
            tracing::warn!("Could not list events for {}: {}", identity.display_name(), e);
            Vec::new()
        }
    }
}

/// Fetch logs of the container most likely to explain the problem.
/// Crash-looping containers are read from their previous instance first.
async fn collect_pod_logs(
    source: &dyn ClusterSource,
    identity: &ResourceIdentity,
    containers: &[ContainerStatusSnapshot],
) -> Option<String> {
    let namespace = identity.namespace_or_sentinel();
    let culprit = containers
        .iter()
        .find(|c| container_label(c).is_some())
        .or_else(|| containers.first());
    let container = culprit.map(|c| c.name.as_str());

    if culprit.and_then(container_label) == Some(LABEL_CRASH_LOOP) {
        match source.pod_logs(namespace, &identity.name, container, true).await {
            Ok(logs) => return Some(logs),
            Err(e) => tracing::debug!("No previous logs for {}: {}", identity.display_name(), e),
        }
    }

    match source.pod_logs(namespace, &identity.name, container, false).await {
        Ok(logs) => Some(logs),
        Err(e) => {
            tracing::warn!("Could not fetch logs for {}: {}", identity.display_name(), e);
            None
        }
    }
}

/// Collect everything the AI service gets to see about `event`
pub async fn collect(
    event: &ResourceEvent,
    source: &dyn ClusterSource,
    profile: &PlaybookProfile,
    cluster_name: &str,
) -> CollectedContext {
    let identity = event.identity();
    let events = collect_events(source, &identity).await;

    let mut phase = None;
    let mut raw_logs = None;
    let mut logs = String::new();
    let mut container_statuses = Vec::new();

    let (problem, conditions) = match event {
        ResourceEvent::Pod(pod) => {
            container_statuses = container_snapshots(pod);
            phase = pod.status.as_ref().and_then(|s| s.phase.clone());

            raw_logs = collect_pod_logs(source, &identity, &container_statuses).await;
            logs = match (&raw_logs, profile.missing_logs) {
                (Some(text), _) => tail_chars(text, profile.log_tail_chars).to_string(),
                (None, MissingLogs::Placeholder) => LOGS_UNAVAILABLE.to_string(),
                (None, MissingLogs::Empty) => String::new(),
            };

            let problem = classify_containers(&container_statuses, phase.as_deref());
            if profile.focus == ProfileFocus::ImagePull {
                container_statuses.retain(is_image_pull_failure);
            }
            (problem, pod_conditions(pod))
        }
        ResourceEvent::Node(node) => {
            let conditions = node_conditions(node);
            (classify_node(&conditions), conditions)
        }
        ResourceEvent::Resource(object) => {
            (LABEL_RESOURCE_ISSUE.to_string(), resource_conditions(object))
        }
    };

    CollectedContext {
        context: DiagnosticContext {
            event_kind: event.kind(),
            cluster_name: cluster_name.to_string(),
            resource: identity,
            phase,
            conditions,
            events,
            logs,
            container_statuses,
        },
        problem,
        raw_logs,
    }
}
