//! Diagnostic pipeline
//!
//! One straight-line pass per triggering event:
//! - `extractor`: resource event -> diagnostic context
//! - `request`: context + instruction -> request body
//! - `HolmesClient`: one POST to the diagnostic service
//! - `formatter`: markdown cleanup of the returned analysis
//! - `emitter`: finding with title, aggregation key and blocks

pub mod emitter;
pub mod extractor;
pub mod formatter;
pub mod profile;
pub mod request;

pub use extractor::CollectedContext;
pub use profile::{MissingLogs, PlaybookProfile, ProfileFocus, ProfileOverrides};

use crate::domain::{Finding, FindingSource, ResourceEvent};
use crate::integrations::{ApiFlavor, ClusterSource, DiagnosticResult, HolmesClient, HolmesError};

/// Characters of rendered context appended to failure messages
const ERROR_CONTEXT_CHARS: usize = 1000;

/// A pipeline bound to one profile and its collaborators
pub struct Pipeline<'a> {
    pub profile: &'a PlaybookProfile,
    pub client: &'a HolmesClient,
    pub source: &'a dyn ClusterSource,
    pub cluster_name: &'a str,
    pub language: &'a str,
}

impl Pipeline<'_> {
    /// Run the whole pipeline; always yields a finding
    pub async fn run(&self, event: &ResourceEvent, origin: FindingSource) -> Finding {
        let collected =
            extractor::collect(event, self.source, self.profile, self.cluster_name).await;
        let identity = &collected.context.resource;

        tracing::info!(
            "Analyzing {} {} ({}) with HolmesGPT via {}",
            identity.kind,
            identity.display_name(),
            collected.problem,
            self.profile.name
        );

        let instruction =
            request::instruction(self.profile, self.language, &collected.problem, identity);
        let title = emitter::finding_title(&collected.problem, identity);

        let result = self.diagnose(&collected, &instruction, &title).await;
        if result.is_failure() {
            tracing::warn!(
                "Emitting failure finding for {} via {}",
                identity.display_name(),
                self.profile.name
            );
        } else {
            tracing::info!("Analysis received from HolmesGPT for {}", identity.display_name());
        }
        let analysis = formatter::render(&result);

        emitter::build_finding(self.profile, &collected, &analysis, origin)
    }

    async fn diagnose(
        &self,
        collected: &CollectedContext,
        instruction: &str,
        title: &str,
    ) -> DiagnosticResult {
        let outcome = match self.profile.api {
            ApiFlavor::Investigate => {
                let body = request::build_investigate(&collected.context, instruction, title);
                self.client.investigate(&body).await
            }
            ApiFlavor::Ask => {
                let body = request::build_ask(&collected.context, instruction, &collected.problem);
                self.client.ask(&body).await
            }
        };

        match outcome {
            Ok(response) => response.into(),
            Err(e) => {
                tracing::error!("Error communicating with HolmesGPT: {}", e);
                let context_text = self
                    .profile
                    .include_context_on_error
                    .then(|| request::render_context(&collected.context, &collected.problem));
                DiagnosticResult::Failure {
                    message: failure_message(&e, context_text.as_deref()),
                }
            }
        }
    }
}

/// User-visible text for a failed diagnostic request
pub fn failure_message(error: &HolmesError, context: Option<&str>) -> String {
    if error.is_unexpected() {
        return format!("❌ Unexpected error: {}", error);
    }

    let mut message = format!("❌ Error communicating with HolmesGPT: {}", error);
    if let Some(context) = context {
        let prefix: String = context.chars().take(ERROR_CONTEXT_CHARS).collect();
        message.push_str(&format!("\n\nCollected context:\n{}...", prefix));
    }
    message
}
