//! Resource events handed to playbooks
//!
//! A triggering event is resolved once at the boundary into one of three
//! shapes: a pod, a node, or a generic Kubernetes object. Playbooks never
//! probe for accessors; they match on the variant.

use k8s_openapi::api::core::v1::{Node, Pod};
use serde::{Deserialize, Serialize};

/// Namespace reported for resources that do not live in a namespace
pub const CLUSTER_SCOPED: &str = "cluster-scoped";

/// Name used when the event carries no usable identity
pub const UNKNOWN: &str = "unknown";

/// Trigger tag a playbook is registered under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Pod,
    Node,
    Resource,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Pod => write!(f, "pod"),
            EventKind::Node => write!(f, "node"),
            EventKind::Resource => write!(f, "resource"),
        }
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pod" | "pods" => Ok(EventKind::Pod),
            "node" | "nodes" => Ok(EventKind::Node),
            "resource" => Ok(EventKind::Resource),
            _ => Err(format!("Unknown event kind: {}", s)),
        }
    }
}

/// Generic Kubernetes object (deployments, jobs, custom resources, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceObject {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub status: Option<serde_json::Value>,
}

/// Identity of the resource a finding is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIdentity {
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
}

impl ResourceIdentity {
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: Option<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.filter(|ns| !ns.is_empty()),
        }
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN, UNKNOWN, None)
    }

    pub fn is_unknown(&self) -> bool {
        self.name == UNKNOWN
    }

    /// Namespace, or the cluster-scoped sentinel
    pub fn namespace_or_sentinel(&self) -> &str {
        self.namespace.as_deref().unwrap_or(CLUSTER_SCOPED)
    }

    /// `namespace/name`, or just `name` for cluster-scoped resources
    pub fn display_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}", ns, self.name),
            None => self.name.clone(),
        }
    }
}

/// A triggering event, resolved to the resource it concerns
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceEvent {
    Pod(Box<Pod>),
    Node(Box<Node>),
    Resource(ResourceObject),
}

impl ResourceEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ResourceEvent::Pod(_) => EventKind::Pod,
            ResourceEvent::Node(_) => EventKind::Node,
            ResourceEvent::Resource(_) => EventKind::Resource,
        }
    }

    /// Resource identity: generic object first, then pod, then node.
    /// Objects without a name resolve to the unknown identity.
    pub fn identity(&self) -> ResourceIdentity {
        match self {
            ResourceEvent::Resource(obj) if !obj.name.is_empty() => {
                ResourceIdentity::new(obj.kind.clone(), obj.name.clone(), obj.namespace.clone())
            }
            ResourceEvent::Pod(pod) => match &pod.metadata.name {
                Some(name) => {
                    ResourceIdentity::new("Pod", name.clone(), pod.metadata.namespace.clone())
                }
                None => ResourceIdentity::unknown(),
            },
            ResourceEvent::Node(node) => match &node.metadata.name {
                Some(name) => ResourceIdentity::new("Node", name.clone(), None),
                None => ResourceIdentity::unknown(),
            },
            ResourceEvent::Resource(_) => ResourceIdentity::unknown(),
        }
    }
}

/// Reference to a resource that still has to be looked up in the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTarget {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    /// `group/version` for non-core kinds, e.g. `apps/v1`
    #[serde(default)]
    pub api_version: Option<String>,
}

impl ResourceTarget {
    /// Trigger kind this target resolves to
    pub fn event_kind(&self) -> EventKind {
        self.kind.parse().unwrap_or(EventKind::Resource)
    }
}
