//! Playbooks: named handlers bound to a trigger kind
//!
//! Every built-in playbook is a [`HolmesPlaybook`] running the diagnostic
//! pipeline with its own profile. Other handlers can be registered through
//! the [`Playbook`] trait.

pub mod registry;

pub use registry::PlaybookRegistry;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{EventKind, Finding, FindingSource, ResourceEvent};
use crate::integrations::{ClusterSource, FindingSink, HolmesClient, KubeError};
use crate::pipeline::{Pipeline, PlaybookProfile};

/// Errors that can occur while dispatching a playbook
#[derive(Error, Debug)]
pub enum PlaybookError {
    #[error("Playbook not found: {0}")]
    NotFound(String),

    #[error("Playbook {playbook} handles {expected} events, got {actual}")]
    TriggerMismatch {
        playbook: String,
        expected: EventKind,
        actual: EventKind,
    },

    #[error("No resource to analyze: {0}")]
    MissingResource(String),

    #[error("Cluster lookup failed: {0}")]
    Cluster(#[from] KubeError),
}

/// Collaborators shared by all playbook invocations
#[derive(Clone)]
pub struct PlaybookContext {
    pub client: Arc<HolmesClient>,
    pub source: Arc<dyn ClusterSource>,
    pub sink: Arc<dyn FindingSink>,
    pub cluster_name: String,
    pub language: String,
}

/// A handler invoked with one resource event
#[async_trait]
pub trait Playbook: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Event kind this playbook is registered for
    fn trigger(&self) -> EventKind;

    /// Produce the finding for `event`
    async fn run(
        &self,
        event: &ResourceEvent,
        ctx: &PlaybookContext,
        source: FindingSource,
    ) -> Result<Finding, PlaybookError>;
}

/// Playbook that forwards the resource context to HolmesGPT
pub struct HolmesPlaybook {
    profile: PlaybookProfile,
}

impl HolmesPlaybook {
    pub fn new(profile: PlaybookProfile) -> Self {
        Self { profile }
    }
}

#[async_trait]
impl Playbook for HolmesPlaybook {
    fn name(&self) -> &str {
        &self.profile.name
    }

    fn description(&self) -> &str {
        &self.profile.description
    }

    fn trigger(&self) -> EventKind {
        self.profile.trigger
    }

    async fn run(
        &self,
        event: &ResourceEvent,
        ctx: &PlaybookContext,
        source: FindingSource,
    ) -> Result<Finding, PlaybookError> {
        let identity = event.identity();
        if identity.is_unknown() {
            return Err(PlaybookError::MissingResource(format!(
                "{} event without a name",
                event.kind()
            )));
        }

        let pipeline = Pipeline {
            profile: &self.profile,
            client: &ctx.client,
            source: ctx.source.as_ref(),
            cluster_name: &ctx.cluster_name,
            language: &ctx.language,
        };

        Ok(pipeline.run(event, source).await)
    }
}
