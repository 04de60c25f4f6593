//! Playbook registry and dispatch

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;

use crate::domain::{EventKind, Finding, FindingSource, ResourceEvent, ResourceTarget};
use crate::pipeline::{PlaybookProfile, ProfileOverrides};

use super::{HolmesPlaybook, Playbook, PlaybookContext, PlaybookError};

/// Public description of a registered playbook
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybookInfo {
    pub name: String,
    pub trigger: EventKind,
    pub description: String,
}

/// Table of playbooks keyed by name
#[derive(Default, Clone)]
pub struct PlaybookRegistry {
    playbooks: BTreeMap<String, Arc<dyn Playbook>>,
}

impl PlaybookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in playbooks, minus the disabled ones
    pub fn with_builtins(overrides: &HashMap<String, ProfileOverrides>) -> Self {
        let mut registry = Self::new();

        for mut profile in PlaybookProfile::builtin() {
            let enabled = match overrides.get(&profile.name) {
                Some(o) => profile.apply(o),
                None => true,
            };

            if enabled {
                registry.register(Arc::new(HolmesPlaybook::new(profile)));
            } else {
                tracing::info!("Playbook {} disabled by configuration", profile.name);
            }
        }

        registry
    }

    /// Register a playbook, replacing any playbook with the same name
    pub fn register(&mut self, playbook: Arc<dyn Playbook>) {
        let name = playbook.name().to_string();
        if self.playbooks.insert(name.clone(), playbook).is_some() {
            tracing::debug!("Replaced playbook {}", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Playbook>> {
        self.playbooks.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.playbooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playbooks.is_empty()
    }

    pub fn list(&self) -> Vec<PlaybookInfo> {
        self.playbooks
            .values()
            .map(|p| PlaybookInfo {
                name: p.name().to_string(),
                trigger: p.trigger(),
                description: p.description().to_string(),
            })
            .collect()
    }

    /// Names of the playbooks registered for a trigger kind
    pub fn for_kind(&self, kind: EventKind) -> Vec<String> {
        self.playbooks
            .values()
            .filter(|p| p.trigger() == kind)
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Playbook to run when none is named: the built-in default for the
    /// kind, else the first one registered for it
    pub fn default_for(&self, kind: EventKind) -> Option<String> {
        let preferred = PlaybookProfile::default_for(kind);
        match self.playbooks.get(preferred) {
            Some(p) if p.trigger() == kind => Some(preferred.to_string()),
            _ => self.for_kind(kind).into_iter().next(),
        }
    }

    fn lookup(&self, name: &str, kind: EventKind) -> Result<Arc<dyn Playbook>, PlaybookError> {
        let playbook = self
            .get(name)
            .ok_or_else(|| PlaybookError::NotFound(name.to_string()))?;

        if playbook.trigger() != kind {
            return Err(PlaybookError::TriggerMismatch {
                playbook: name.to_string(),
                expected: playbook.trigger(),
                actual: kind,
            });
        }

        Ok(playbook)
    }

    /// Run a playbook on an event and hand the finding to the sink.
    ///
    /// Returns `Ok(None)` when the event has nothing to diagnose.
    pub async fn dispatch(
        &self,
        name: &str,
        event: &ResourceEvent,
        ctx: &PlaybookContext,
        source: FindingSource,
    ) -> Result<Option<Finding>, PlaybookError> {
        let playbook = self.lookup(name, event.kind())?;

        match playbook.run(event, ctx, source).await {
            Ok(finding) => {
                if let Err(e) = ctx.sink.add_finding(&finding).await {
                    tracing::warn!("Finding sink {} failed: {}", ctx.sink.name(), e);
                }
                tracing::info!("Playbook {} produced finding {}", name, finding.aggregation_key);
                Ok(Some(finding))
            }
            Err(PlaybookError::MissingResource(reason)) => {
                tracing::error!("Playbook {} skipped: {}", name, reason);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve a target through the cluster source, then dispatch
    pub async fn trigger(
        &self,
        name: &str,
        target: &ResourceTarget,
        ctx: &PlaybookContext,
        source: FindingSource,
    ) -> Result<Option<Finding>, PlaybookError> {
        self.lookup(name, target.event_kind())?;

        match ctx.source.resolve(target).await? {
            Some(event) => self.dispatch(name, &event, ctx, source).await,
            None => {
                tracing::error!(
                    "Could not find {} {} for playbook {}",
                    target.kind,
                    target.name,
                    name
                );
                Ok(None)
            }
        }
    }
}
