//! Diagnostic context sent to the AI service

use serde::{Deserialize, Serialize};

use super::event::{EventKind, ResourceIdentity};

/// State of a single container, exactly one variant per snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContainerState {
    Running {
        #[serde(rename = "startedAt", skip_serializing_if = "Option::is_none")]
        started_at: Option<String>,
    },
    Waiting {
        reason: String,
        message: String,
    },
    Terminated {
        reason: String,
        #[serde(rename = "exitCode")]
        exit_code: i32,
        message: String,
    },
}

/// Point-in-time view of a container status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatusSnapshot {
    pub name: String,
    pub image: String,
    pub ready: bool,
    pub restart_count: i32,
    pub state: ContainerState,
}

impl ContainerStatusSnapshot {
    pub fn waiting_reason(&self) -> Option<&str> {
        match &self.state {
            ContainerState::Waiting { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub fn terminated_reason(&self) -> Option<&str> {
        match &self.state {
            ContainerState::Terminated { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Reason and message of a waiting or terminated state
    pub fn reason_and_message(&self) -> Option<(&str, &str)> {
        match &self.state {
            ContainerState::Waiting { reason, message } => Some((reason, message)),
            ContainerState::Terminated { reason, message, .. } => Some((reason, message)),
            ContainerState::Running { .. } => None,
        }
    }
}

/// A status condition (pod, node or generic object)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSnapshot {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: String,
    pub reason: String,
    pub message: String,
}

/// A Kubernetes event reduced to what the AI service needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    #[serde(rename = "type")]
    pub event_type: String,
    pub reason: String,
    pub message: String,
}

/// Everything collected about the resource for one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticContext {
    pub event_kind: EventKind,
    pub cluster_name: String,
    pub resource: ResourceIdentity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    pub conditions: Vec<ConditionSnapshot>,
    pub events: Vec<EventSummary>,
    pub logs: String,
    #[serde(rename = "containerStatuses")]
    pub container_statuses: Vec<ContainerStatusSnapshot>,
}
