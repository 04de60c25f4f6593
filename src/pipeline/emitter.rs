//! Finding construction

use crate::domain::{Block, Finding, FindingSource, ResourceIdentity};

use super::extractor::CollectedContext;
use super::profile::{PlaybookProfile, ProfileFocus};

/// Logs shorter than this are not attached as a file
const MIN_ATTACHED_LOG_CHARS: usize = 100;
const EVENT_MESSAGE_CHARS: usize = 100;
const CONTAINER_MESSAGE_CHARS: usize = 50;

pub const ANALYSIS_HEADING: &str = "## 🤖 HolmesGPT analysis";

pub fn finding_title(problem: &str, identity: &ResourceIdentity) -> String {
    format!("🔍 {} - HolmesGPT: {}", problem, identity.display_name())
}

fn cut(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn summary_block(profile: &PlaybookProfile, collected: &CollectedContext) -> Block {
    let context = &collected.context;
    let resource = &context.resource;

    match profile.focus {
        ProfileFocus::General => {
            let cluster = if context.cluster_name.is_empty() {
                "N/A"
            } else {
                context.cluster_name.as_str()
            };
            Block::markdown(format!(
                "**Resource:** `{}` ({})\n**Problem:** {}\n**Phase:** {}\n**Cluster:** {}",
                resource.display_name(),
                resource.kind,
                collected.problem,
                context.phase.as_deref().unwrap_or("N/A"),
                cluster
            ))
        }
        ProfileFocus::ImagePull => {
            let images: Vec<String> = context
                .container_statuses
                .iter()
                .map(|c| format!("- `{}` (container: {})", c.image, c.name))
                .collect();
            Block::markdown(format!(
                "**🚨 Problem:** {}\n**📦 Pod:** `{}`\n**🖼️ Affected images:**\n{}",
                collected.problem,
                resource.display_name(),
                images.join("\n")
            ))
        }
    }
}

fn attachment_blocks(profile: &PlaybookProfile, collected: &CollectedContext) -> Vec<Block> {
    let context = &collected.context;
    let mut blocks = Vec::new();

    match profile.focus {
        ProfileFocus::General => {
            if !context.events.is_empty() {
                blocks.push(Block::Table {
                    name: "Recent events".to_string(),
                    headers: vec!["Type".to_string(), "Reason".to_string(), "Message".to_string()],
                    rows: context
                        .events
                        .iter()
                        .map(|e| {
                            vec![
                                e.event_type.clone(),
                                e.reason.clone(),
                                cut(&e.message, EVENT_MESSAGE_CHARS),
                            ]
                        })
                        .collect(),
                });
            }

            if let Some(logs) = &collected.raw_logs {
                if logs.chars().count() > MIN_ATTACHED_LOG_CHARS {
                    blocks.push(Block::File {
                        filename: format!("{}_logs.txt", context.resource.name),
                        contents: logs.clone(),
                    });
                }
            }
        }
        ProfileFocus::ImagePull => {
            if !context.container_statuses.is_empty() {
                blocks.push(Block::Table {
                    name: "Affected containers".to_string(),
                    headers: vec![
                        "Container".to_string(),
                        "Image".to_string(),
                        "Reason".to_string(),
                        "Message".to_string(),
                    ],
                    rows: context
                        .container_statuses
                        .iter()
                        .map(|c| {
                            let (reason, message) = c.reason_and_message().unwrap_or_default();
                            vec![
                                c.name.clone(),
                                c.image.clone(),
                                reason.to_string(),
                                cut(message, CONTAINER_MESSAGE_CHARS),
                            ]
                        })
                        .collect(),
                });
            }
        }
    }

    blocks
}

/// Build the finding for one invocation. `analysis` is the text already
/// rendered by the formatter (or the failure message).
pub fn build_finding(
    profile: &PlaybookProfile,
    collected: &CollectedContext,
    analysis: &str,
    source: FindingSource,
) -> Finding {
    let identity = collected.context.resource.clone();
    let mut finding = Finding::new(finding_title(&collected.problem, &identity), identity, source);

    if profile.include_attachments {
        finding.add_block(summary_block(profile, collected));
    }

    finding.add_markdown(format!("{}\n\n{}", ANALYSIS_HEADING, analysis));

    if profile.include_attachments {
        for block in attachment_blocks(profile, collected) {
            finding.add_block(block);
        }
    }

    finding
}
