//! Request building for the diagnostic service

use crate::domain::{DiagnosticContext, ResourceIdentity};
use crate::integrations::{AskRequest, InvestigateRequest, Subject};

use super::profile::{PlaybookProfile, ProfileFocus};

/// Source tag sent with every investigation
pub const REQUEST_SOURCE: &str = "holmes-playbooks";

/// Natural-language instruction for the AI service
pub fn instruction(
    profile: &PlaybookProfile,
    language: &str,
    problem: &str,
    identity: &ResourceIdentity,
) -> String {
    let task = match profile.focus {
        ProfileFocus::General => format!(
            "Analyze the {} problem of Kubernetes {} {} and provide the root cause and the \
             recommended solution.",
            problem,
            identity.kind,
            identity.display_name()
        ),
        ProfileFocus::ImagePull => format!(
            "Analyze why the image of pod {} cannot be pulled and provide the root cause and \
             the solution. Consider:\n\
             1. Whether the image exists in the registry\n\
             2. Whether the registry credentials are correct\n\
             3. Whether the image name and tag are spelled correctly\n\
             4. Whether there are network or permission problems",
            identity.display_name()
        ),
    };

    format!(
        "{}\nRespond in {}, concisely, in at most {} words, covering only the root cause \
         and the solution.",
        task, language, profile.word_cap
    )
}

/// Body for `/api/investigate`
pub fn build_investigate(
    context: &DiagnosticContext,
    instruction: &str,
    title: &str,
) -> InvestigateRequest {
    let resource = &context.resource;

    InvestigateRequest {
        source: REQUEST_SOURCE.to_string(),
        title: title.to_string(),
        description: instruction.to_string(),
        subject: Subject {
            name: resource.name.clone(),
            namespace: resource.namespace_or_sentinel().to_string(),
            kind: resource.kind.clone(),
        },
        context: context.clone(),
    }
}

/// Body for the legacy `/api/ask`
pub fn build_ask(context: &DiagnosticContext, instruction: &str, problem: &str) -> AskRequest {
    let resource = &context.resource;

    AskRequest {
        context: render_context(context, problem),
        resource_type: resource.kind.to_lowercase(),
        resource_name: resource.name.clone(),
        namespace: resource.namespace_or_sentinel().to_string(),
        ask: instruction.to_string(),
    }
}

/// Plain-text rendering of the context, as the legacy endpoint expects
pub fn render_context(context: &DiagnosticContext, problem: &str) -> String {
    let resource = &context.resource;

    let mut out = format!(
        "Problem detected in cluster {}:\n- Kind: {}\n- Namespace: {}\n- Name: {}\n- Problem: {}\n",
        context.cluster_name,
        resource.kind,
        resource.namespace_or_sentinel(),
        resource.name,
        problem
    );

    if let Some(phase) = &context.phase {
        out.push_str(&format!("- Phase: {}\n", phase));
    }

    let status = serde_json::json!({
        "phase": context.phase,
        "conditions": context.conditions,
        "containerStatuses": context.container_statuses,
    });
    out.push_str("\nStatus:\n");
    out.push_str(&serde_json::to_string_pretty(&status).unwrap_or_default());
    out.push('\n');

    out.push_str("\nEvents:\n");
    if context.events.is_empty() {
        out.push_str("No events available\n");
    } else {
        for e in &context.events {
            out.push_str(&format!("[{}] {}: {}\n", e.event_type, e.reason, e.message));
        }
    }

    if !context.logs.is_empty() {
        out.push_str("\nLogs (last lines):\n");
        out.push_str(&context.logs);
        out.push('\n');
    }

    out
}
