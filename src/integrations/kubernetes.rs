//! Kubernetes integration for resource lookup and context collection
//!
//! This module provides functionality to:
//! - Resolve a trigger (kind/name/namespace) into a resource event
//! - Collect pod logs for error diagnosis
//! - List events recorded against a resource

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Event, Node, Pod};
use kube::{
    api::{Api, ListParams, LogParams},
    core::{ApiResource, DynamicObject, GroupVersionKind},
    Client,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{EventKind, ResourceEvent, ResourceIdentity, ResourceObject, ResourceTarget};

/// Lines requested from the API server; the pipeline tails by characters
const LOG_TAIL_LINES: i64 = 200;

#[derive(Error, Debug)]
pub enum KubeError {
    #[error("Kubernetes client error: {0}")]
    ClientError(#[from] kube::Error),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),
}

/// Kubernetes event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeEvent {
    pub reason: String,
    pub message: String,
    pub event_type: String,
    pub count: i32,
    pub first_timestamp: Option<String>,
    pub last_timestamp: Option<String>,
}

impl KubeEvent {
    pub fn new(event_type: &str, reason: &str, message: &str) -> Self {
        Self {
            reason: reason.to_string(),
            message: message.to_string(),
            event_type: event_type.to_string(),
            count: 1,
            first_timestamp: None,
            last_timestamp: None,
        }
    }
}

impl From<Event> for KubeEvent {
    fn from(e: Event) -> Self {
        Self {
            reason: e.reason.unwrap_or_default(),
            message: e.message.unwrap_or_default(),
            event_type: e.type_.unwrap_or_default(),
            count: e.count.unwrap_or(1),
            first_timestamp: e.first_timestamp.map(|t| t.0.to_rfc3339()),
            last_timestamp: e.last_timestamp.map(|t| t.0.to_rfc3339()),
        }
    }
}

/// Read access to the cluster, as needed by playbooks
#[async_trait]
pub trait ClusterSource: Send + Sync {
    /// Look up the resource a trigger points at; `None` when it does not exist
    async fn resolve(&self, target: &ResourceTarget) -> Result<Option<ResourceEvent>, KubeError>;

    /// Logs of one container; `previous` selects the last terminated instance
    async fn pod_logs(
        &self,
        namespace: &str,
        pod_name: &str,
        container: Option<&str>,
        previous: bool,
    ) -> Result<String, KubeError>;

    /// Events recorded against a resource
    async fn list_events(&self, resource: &ResourceIdentity) -> Result<Vec<KubeEvent>, KubeError>;
}

/// Kubernetes service backed by a live API server
pub struct KubernetesService {
    client: Client,
}

impl KubernetesService {
    /// Create a new Kubernetes service using default config
    pub async fn new() -> Result<Self, KubeError> {
        let client = Client::try_default().await?;
        Ok(Self { client })
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, KubeError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(pods.get_opt(name).await?)
    }

    async fn get_node(&self, name: &str) -> Result<Option<Node>, KubeError> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        Ok(nodes.get_opt(name).await?)
    }

    async fn get_dynamic(
        &self,
        target: &ResourceTarget,
    ) -> Result<Option<ResourceObject>, KubeError> {
        let gvk = parse_gvk(target)?;
        let resource = ApiResource::from_gvk(&gvk);

        let api: Api<DynamicObject> = match &target.namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        };

        let object = api.get_opt(&target.name).await?;

        Ok(object.map(|obj| ResourceObject {
            kind: target.kind.clone(),
            name: obj.metadata.name.clone().unwrap_or_else(|| target.name.clone()),
            namespace: obj.metadata.namespace.clone(),
            status: obj.data.get("status").cloned(),
        }))
    }
}

/// Split `group/version` (or a bare core `version`) into a GVK
fn parse_gvk(target: &ResourceTarget) -> Result<GroupVersionKind, KubeError> {
    let api_version = target.api_version.as_deref().ok_or_else(|| {
        KubeError::InvalidTarget(format!("apiVersion is required for kind {}", target.kind))
    })?;

    let (group, version) = match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    };

    if version.is_empty() {
        return Err(KubeError::InvalidTarget(format!("bad apiVersion: {}", api_version)));
    }

    Ok(GroupVersionKind::gvk(group, version, &target.kind))
}

#[async_trait]
impl ClusterSource for KubernetesService {
    async fn resolve(&self, target: &ResourceTarget) -> Result<Option<ResourceEvent>, KubeError> {
        match target.event_kind() {
            EventKind::Pod => {
                let namespace = target.namespace.as_deref().unwrap_or("default");
                let pod = self.get_pod(namespace, &target.name).await?;
                Ok(pod.map(|p| ResourceEvent::Pod(Box::new(p))))
            }
            EventKind::Node => {
                let node = self.get_node(&target.name).await?;
                Ok(node.map(|n| ResourceEvent::Node(Box::new(n))))
            }
            EventKind::Resource => {
                let object = self.get_dynamic(target).await?;
                Ok(object.map(ResourceEvent::Resource))
            }
        }
    }

    async fn pod_logs(
        &self,
        namespace: &str,
        pod_name: &str,
        container: Option<&str>,
        previous: bool,
    ) -> Result<String, KubeError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);

        let params = LogParams {
            tail_lines: Some(LOG_TAIL_LINES),
            container: container.map(String::from),
            previous,
            ..Default::default()
        };

        let logs = pods.logs(pod_name, &params).await?;
        Ok(logs)
    }

    async fn list_events(&self, resource: &ResourceIdentity) -> Result<Vec<KubeEvent>, KubeError> {
        let events: Api<Event> = match &resource.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };

        let field_selector = format!(
            "involvedObject.name={},involvedObject.kind={}",
            resource.name, resource.kind
        );
        let list = events
            .list(&ListParams::default().fields(&field_selector))
            .await?;

        Ok(list.items.into_iter().map(KubeEvent::from).collect())
    }
}
