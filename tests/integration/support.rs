//! Shared test doubles

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use k8s_openapi::api::core::v1::{Node, Pod};
use serde_json::{json, Value};

use holmes_playbooks::domain::{EventKind, ResourceEvent, ResourceIdentity, ResourceTarget};
use holmes_playbooks::integrations::{
    ClusterSource, CollectingSink, HolmesClient, KubeError, KubeEvent,
};
use holmes_playbooks::playbooks::PlaybookContext;

/// What the mock diagnostic service answers
#[derive(Clone)]
pub enum Reply {
    Json(Value),
    Status(u16, String),
    Slow(Duration),
}

#[derive(Clone)]
struct MockState {
    reply: Reply,
    requests: Arc<Mutex<Vec<(String, Value)>>>,
}

/// Mock HolmesGPT serving `/api/investigate` and `/api/ask`
pub struct MockHolmes {
    pub base_url: String,
    requests: Arc<Mutex<Vec<(String, Value)>>>,
}

impl MockHolmes {
    pub async fn start(reply: Reply) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            reply,
            requests: requests.clone(),
        };

        let app = Router::new()
            .route("/api/investigate", post(handle))
            .route("/api/ask", post(handle))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
        }
    }

    /// Analysis reply with token usage
    pub fn analysis(text: &str) -> Reply {
        Reply::Json(json!({
            "analysis": text,
            "metadata": {
                "usage": {"prompt_tokens": 1000, "completion_tokens": 500, "total_tokens": 1500}
            }
        }))
    }

    pub fn client(&self) -> HolmesClient {
        self.client_with_timeout(Duration::from_secs(5))
    }

    pub fn client_with_timeout(&self, timeout: Duration) -> HolmesClient {
        HolmesClient::with_base_url(&self.base_url, timeout).unwrap()
    }

    /// Requests received so far as (path, body)
    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().unwrap().clone()
    }
}

async fn handle(State(state): State<MockState>, uri: Uri, Json(body): Json<Value>) -> Response {
    state
        .requests
        .lock()
        .unwrap()
        .push((uri.path().to_string(), body));

    match state.reply {
        Reply::Json(value) => Json(value).into_response(),
        Reply::Status(code, message) => {
            (StatusCode::from_u16(code).unwrap(), message).into_response()
        }
        Reply::Slow(delay) => {
            tokio::time::sleep(delay).await;
            Json(json!({"analysis": "too late"})).into_response()
        }
    }
}

/// In-memory cluster
#[derive(Default)]
pub struct FakeCluster {
    pub pods: Vec<Pod>,
    pub nodes: Vec<Node>,
    /// Current logs by container name
    pub logs: HashMap<String, String>,
    /// Logs of the previous container instance by container name
    pub previous_logs: HashMap<String, String>,
    pub events: Vec<KubeEvent>,
    /// Make event listing fail
    pub fail_events: bool,
    pub(crate) log_requests: Mutex<Vec<(Option<String>, bool)>>,
}

impl FakeCluster {
    pub fn log_requests(&self) -> Vec<(Option<String>, bool)> {
        self.log_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterSource for FakeCluster {
    async fn resolve(&self, target: &ResourceTarget) -> Result<Option<ResourceEvent>, KubeError> {
        let found = match target.event_kind() {
            EventKind::Pod => self
                .pods
                .iter()
                .find(|p| {
                    p.metadata.name.as_deref() == Some(target.name.as_str())
                        && p.metadata.namespace == target.namespace
                })
                .map(|p| ResourceEvent::Pod(Box::new(p.clone()))),
            EventKind::Node => self
                .nodes
                .iter()
                .find(|n| n.metadata.name.as_deref() == Some(target.name.as_str()))
                .map(|n| ResourceEvent::Node(Box::new(n.clone()))),
            EventKind::Resource => None,
        };
        Ok(found)
    }

    async fn pod_logs(
        &self,
        _namespace: &str,
        _pod_name: &str,
        container: Option<&str>,
        previous: bool,
    ) -> Result<String, KubeError> {
        self.log_requests
            .lock()
            .unwrap()
            .push((container.map(str::to_string), previous));

        let logs = if previous { &self.previous_logs } else { &self.logs };
        container
            .and_then(|c| logs.get(c))
            .cloned()
            .ok_or_else(|| KubeError::NotFound("logs".to_string()))
    }

    async fn list_events(
        &self,
        _resource: &ResourceIdentity,
    ) -> Result<Vec<KubeEvent>, KubeError> {
        if self.fail_events {
            return Err(KubeError::InvalidTarget("events are forbidden".to_string()));
        }
        Ok(self.events.clone())
    }
}

/// Address of a listener that accepts connections and never answers
pub async fn silent_listener() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

pub fn context(
    holmes: HolmesClient,
    cluster: Arc<FakeCluster>,
    sink: &CollectingSink,
) -> PlaybookContext {
    PlaybookContext {
        client: Arc::new(holmes),
        source: cluster,
        sink: Arc::new(sink.clone()),
        cluster_name: "prod-eu".to_string(),
        language: "Spanish".to_string(),
    }
}

/// Pod with one container `app` in the given waiting state
pub fn waiting_pod(name: &str, namespace: &str, reason: &str, restarts: i32) -> Pod {
    let phase = if reason.contains("Image") { "Pending" } else { "Running" };
    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {"name": name, "namespace": namespace},
        "spec": {"containers": [{"name": "app", "image": "registry.local/app:1.0"}]},
        "status": {
            "phase": phase,
            "conditions": [{"type": "Ready", "status": "False", "reason": "ContainersNotReady"}],
            "containerStatuses": [{
                "name": "app",
                "image": "registry.local/app:1.0",
                "imageID": "",
                "ready": false,
                "restartCount": restarts,
                "state": {"waiting": {"reason": reason, "message": format!("{} for app", reason)}}
            }]
        }
    }))
    .unwrap()
}

pub fn not_ready_node(name: &str) -> Node {
    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Node",
        "metadata": {"name": name},
        "status": {
            "conditions": [
                {"type": "MemoryPressure", "status": "False"},
                {
                    "type": "Ready",
                    "status": "Unknown",
                    "reason": "NodeStatusUnknown",
                    "message": "Kubelet stopped posting node status."
                }
            ]
        }
    }))
    .unwrap()
}

pub fn pod_target(name: &str, namespace: &str) -> ResourceTarget {
    ResourceTarget {
        kind: "Pod".to_string(),
        name: name.to_string(),
        namespace: Some(namespace.to_string()),
        api_version: None,
    }
}
