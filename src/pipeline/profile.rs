//! Playbook profiles
//!
//! Every built-in playbook runs the same pipeline; a profile holds the few
//! knobs that differ between them.

use serde::{Deserialize, Serialize};

use crate::domain::EventKind;
use crate::integrations::ApiFlavor;

/// What the instruction and attachments concentrate on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileFocus {
    /// Any problem with the resource
    General,
    /// Containers that cannot pull their image
    ImagePull,
}

/// What to put in the context when logs cannot be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingLogs {
    Placeholder,
    Empty,
}

/// Configuration of one playbook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybookProfile {
    pub name: String,
    pub description: String,
    pub trigger: EventKind,
    pub focus: ProfileFocus,
    pub api: ApiFlavor,
    pub word_cap: u32,
    pub log_tail_chars: usize,
    pub missing_logs: MissingLogs,
    /// Summary, events table and log file blocks
    pub include_attachments: bool,
    /// Append the rendered context to failure messages
    pub include_context_on_error: bool,
}

/// Optional per-playbook settings from the config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub api: Option<ApiFlavor>,
    #[serde(default)]
    pub word_cap: Option<u32>,
    #[serde(default)]
    pub include_attachments: Option<bool>,
    #[serde(default)]
    pub log_tail_chars: Option<usize>,
}

impl PlaybookProfile {
    /// Full pod analysis with summary, events table and log attachment
    pub fn analyze_with_holmesgpt() -> Self {
        Self {
            name: "analyze_with_holmesgpt".to_string(),
            description: "Root cause analysis of a problematic pod with events and logs attached"
                .to_string(),
            trigger: EventKind::Pod,
            focus: ProfileFocus::General,
            api: ApiFlavor::Ask,
            word_cap: 300,
            log_tail_chars: 2000,
            missing_logs: MissingLogs::Placeholder,
            include_attachments: true,
            include_context_on_error: true,
        }
    }

    /// Image pull failures
    pub fn image_pull_backoff() -> Self {
        Self {
            name: "analyze_image_pull_backoff_with_holmes".to_string(),
            description: "Diagnosis of containers stuck pulling their image".to_string(),
            trigger: EventKind::Pod,
            focus: ProfileFocus::ImagePull,
            api: ApiFlavor::Ask,
            word_cap: 300,
            log_tail_chars: 1000,
            missing_logs: MissingLogs::Placeholder,
            include_attachments: true,
            include_context_on_error: true,
        }
    }

    /// Concise pod issue analysis
    pub fn pod_issue() -> Self {
        Self {
            name: "holmes_pod_issue".to_string(),
            description: "Concise root cause and fix for a failing pod".to_string(),
            trigger: EventKind::Pod,
            focus: ProfileFocus::General,
            api: ApiFlavor::Investigate,
            word_cap: 150,
            log_tail_chars: 1000,
            missing_logs: MissingLogs::Placeholder,
            include_attachments: false,
            include_context_on_error: false,
        }
    }

    pub fn node_issue() -> Self {
        Self {
            name: "holmes_node_issue".to_string(),
            description: "Concise root cause and fix for an unhealthy node".to_string(),
            trigger: EventKind::Node,
            focus: ProfileFocus::General,
            api: ApiFlavor::Investigate,
            word_cap: 150,
            log_tail_chars: 1000,
            missing_logs: MissingLogs::Empty,
            include_attachments: false,
            include_context_on_error: false,
        }
    }

    pub fn resource_issue() -> Self {
        Self {
            name: "holmes_resource_issue".to_string(),
            description: "Concise root cause and fix for any other Kubernetes resource".to_string(),
            trigger: EventKind::Resource,
            focus: ProfileFocus::General,
            api: ApiFlavor::Investigate,
            word_cap: 150,
            log_tail_chars: 1000,
            missing_logs: MissingLogs::Empty,
            include_attachments: false,
            include_context_on_error: false,
        }
    }

    /// All built-in profiles
    pub fn builtin() -> Vec<Self> {
        vec![
            Self::analyze_with_holmesgpt(),
            Self::image_pull_backoff(),
            Self::pod_issue(),
            Self::node_issue(),
            Self::resource_issue(),
        ]
    }

    /// Name of the playbook run by default for a trigger kind
    pub fn default_for(kind: EventKind) -> &'static str {
        match kind {
            EventKind::Pod => "holmes_pod_issue",
            EventKind::Node => "holmes_node_issue",
            EventKind::Resource => "holmes_resource_issue",
        }
    }

    /// Apply config overrides; returns false when the playbook is disabled
    pub fn apply(&mut self, overrides: &ProfileOverrides) -> bool {
        if let Some(api) = overrides.api {
            self.api = api;
        }
        if let Some(word_cap) = overrides.word_cap {
            self.word_cap = word_cap;
        }
        if let Some(include) = overrides.include_attachments {
            self.include_attachments = include;
        }
        if let Some(chars) = overrides.log_tail_chars {
            self.log_tail_chars = chars;
        }
        overrides.enabled.unwrap_or(true)
    }
}
