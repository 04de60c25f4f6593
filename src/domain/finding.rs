//! Findings: the notification objects produced by playbooks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::ResourceIdentity;

/// Prefix shared by all aggregation keys
pub const AGGREGATION_PREFIX: &str = "HolmesGPT";

/// Finding severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingType {
    Issue,
    Report,
}

/// Where the triggering event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingSource {
    /// Resource looked up through the Kubernetes API server
    KubernetesApiServer,
    /// Resource object pushed by an external watcher
    Webhook,
    /// Run by hand from the command line
    Manual,
}

impl std::fmt::Display for FindingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FindingSource::KubernetesApiServer => write!(f, "kubernetes_api_server"),
            FindingSource::Webhook => write!(f, "webhook"),
            FindingSource::Manual => write!(f, "manual"),
        }
    }
}

/// Content block of a finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Markdown {
        text: String,
    },
    Table {
        name: String,
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    File {
        filename: String,
        contents: String,
    },
}

impl Block {
    pub fn markdown(text: impl Into<String>) -> Self {
        Block::Markdown { text: text.into() }
    }
}

/// Stable deduplication key for findings about one resource
pub fn aggregation_key(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{}_{}_{}", AGGREGATION_PREFIX, ns, name),
        _ => format!("{}_{}", AGGREGATION_PREFIX, name),
    }
}

/// A structured alert handed to the finding sinks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub id: Uuid,
    pub title: String,
    pub aggregation_key: String,
    pub severity: Severity,
    pub source: FindingSource,
    pub finding_type: FindingType,
    pub subject: ResourceIdentity,
    pub blocks: Vec<Block>,
    pub created_at: DateTime<Utc>,
}

impl Finding {
    pub fn new(title: impl Into<String>, subject: ResourceIdentity, source: FindingSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            aggregation_key: aggregation_key(subject.namespace.as_deref(), &subject.name),
            severity: Severity::High,
            source,
            finding_type: FindingType::Issue,
            subject,
            blocks: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn add_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn add_markdown(&mut self, text: impl Into<String>) {
        self.blocks.push(Block::markdown(text));
    }

    /// All markdown text blocks joined, in order
    pub fn markdown_text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                Block::Markdown { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Render the whole finding as a markdown document
    pub fn to_markdown(&self) -> String {
        let mut out = format!(
            "# {}\n\n_severity: {} | source: {} | key: {}_\n",
            self.title, self.severity, self.source, self.aggregation_key
        );

        for block in &self.blocks {
            out.push('\n');
            match block {
                Block::Markdown { text } => {
                    out.push_str(text);
                    out.push('\n');
                }
                Block::Table { name, headers, rows } => {
                    out.push_str(&format!("**{}**\n\n", name));
                    out.push_str(&format!("| {} |\n", headers.join(" | ")));
                    out.push_str(&format!("|{}\n", "---|".repeat(headers.len())));
                    for row in rows {
                        let cells: Vec<String> =
                            row.iter().map(|c| c.replace('|', "\\|")).collect();
                        out.push_str(&format!("| {} |\n", cells.join(" | ")));
                    }
                }
                Block::File { filename, contents } => {
                    out.push_str(&format!("📎 {} ({} bytes)\n", filename, contents.len()));
                }
            }
        }

        out
    }
}
