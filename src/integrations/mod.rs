//! Integration services for external systems

// HolmesGPT diagnostic service
pub mod holmes;
pub use holmes::{
    ApiFlavor, AskRequest, DiagnosticResult, HolmesClient, HolmesError, HolmesResponse,
    InvestigateRequest, Subject, Usage,
};

// Kubernetes integration
pub mod kubernetes;
pub use kubernetes::{ClusterSource, KubeError, KubeEvent, KubernetesService};

// Finding sinks
pub mod notify;
pub use notify::{CollectingSink, FanoutSink, FindingSink, LogSink, SinkError, WebhookSink};
