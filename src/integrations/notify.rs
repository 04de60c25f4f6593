//! Finding sinks
//!
//! Playbooks hand every finding to a [`FindingSink`]. Sinks are
//! fire-and-forget from the playbook's point of view: a failing sink is
//! logged and never aborts an invocation.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

use crate::domain::Finding;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Webhook returned {status}: {message}")]
    WebhookError { status: u16, message: String },
}

/// Destination for findings produced by playbooks
#[async_trait]
pub trait FindingSink: Send + Sync {
    /// Sink name used in logs
    fn name(&self) -> &str;

    async fn add_finding(&self, finding: &Finding) -> Result<(), SinkError>;
}

/// Writes findings to the log
pub struct LogSink;

#[async_trait]
impl FindingSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn add_finding(&self, finding: &Finding) -> Result<(), SinkError> {
        tracing::info!(
            aggregation_key = %finding.aggregation_key,
            severity = %finding.severity,
            source = %finding.source,
            "{}\n{}",
            finding.title,
            finding.markdown_text()
        );
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    text: String,
    finding: &'a Finding,
}

/// Posts findings as JSON to a webhook (Slack-compatible `text` field)
pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    /// Sink posting to `url`; each delivery is bounded by `timeout`
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SinkError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl FindingSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn add_finding(&self, finding: &Finding) -> Result<(), SinkError> {
        let payload = WebhookPayload {
            text: finding.to_markdown(),
            finding,
        };

        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SinkError::WebhookError {
                status: status.as_u16(),
                message,
            });
        }

        tracing::debug!("Delivered finding {} to webhook", finding.aggregation_key);
        Ok(())
    }
}

/// Keeps findings in memory
#[derive(Default, Clone)]
pub struct CollectingSink {
    findings: Arc<Mutex<Vec<Finding>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Findings collected so far, oldest first
    pub fn findings(&self) -> Vec<Finding> {
        self.findings
            .lock()
            .map(|f| f.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.findings.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl FindingSink for CollectingSink {
    fn name(&self) -> &str {
        "collect"
    }

    async fn add_finding(&self, finding: &Finding) -> Result<(), SinkError> {
        if let Ok(mut findings) = self.findings.lock() {
            findings.push(finding.clone());
        }
        Ok(())
    }
}

/// Forwards each finding to every inner sink
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn FindingSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn FindingSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl FindingSink for FanoutSink {
    fn name(&self) -> &str {
        "fanout"
    }

    async fn add_finding(&self, finding: &Finding) -> Result<(), SinkError> {
        for sink in &self.sinks {
            if let Err(e) = sink.add_finding(finding).await {
                tracing::warn!("Finding sink {} failed: {}", sink.name(), e);
            }
        }
        Ok(())
    }
}
