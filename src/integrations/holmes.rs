//! HolmesGPT client
//!
//! This module provides a client for the HolmesGPT diagnostic service.
//! Two API shapes are in use across deployments: the current
//! `/api/investigate` endpoint and the older `/api/ask` endpoint. Both are
//! supported and the flavour is chosen per playbook.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::DiagnosticContext;

pub const DEFAULT_BASE_URL: &str = "http://holmesgpt-holmes.holmesgpt.svc.cluster.local:80";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Per-1K-token rates used for the cost estimate
const PROMPT_COST_PER_1K: f64 = 0.03;
const COMPLETION_COST_PER_1K: f64 = 0.06;

#[derive(Error, Debug)]
pub enum HolmesError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Failed to serialize request: {0}")]
    SerializeError(#[from] serde_json::Error),
}

impl HolmesError {
    /// Errors raised before anything was sent to the service
    pub fn is_unexpected(&self) -> bool {
        matches!(self, HolmesError::SerializeError(_))
    }
}

/// API flavour of the diagnostic service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiFlavor {
    #[default]
    Investigate,
    Ask,
}

impl ApiFlavor {
    pub fn path(&self) -> &'static str {
        match self {
            ApiFlavor::Investigate => "/api/investigate",
            ApiFlavor::Ask => "/api/ask",
        }
    }
}

impl std::fmt::Display for ApiFlavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiFlavor::Investigate => write!(f, "investigate"),
            ApiFlavor::Ask => write!(f, "ask"),
        }
    }
}

impl std::str::FromStr for ApiFlavor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "investigate" => Ok(ApiFlavor::Investigate),
            "ask" => Ok(ApiFlavor::Ask),
            _ => Err(format!("Unknown API flavour: {}", s)),
        }
    }
}

/// Subject of an investigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    pub namespace: String,
    pub kind: String,
}

/// Request body for `/api/investigate`
#[derive(Debug, Clone, Serialize)]
pub struct InvestigateRequest {
    pub source: String,
    pub title: String,
    pub description: String,
    pub subject: Subject,
    pub context: DiagnosticContext,
}

/// Request body for the legacy `/api/ask`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AskRequest {
    pub context: String,
    pub resource_type: String,
    pub resource_name: String,
    pub namespace: String,
    pub ask: String,
}

/// Token usage reported in `metadata.usage`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: Option<u64>,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.total_tokens
            .unwrap_or(self.prompt_tokens.saturating_add(self.completion_tokens))
    }

    /// Estimated cost in USD at fixed per-1K-token rates
    pub fn estimated_cost_usd(&self) -> f64 {
        let prompt_cost = (self.prompt_tokens as f64 / 1000.0) * PROMPT_COST_PER_1K;
        let completion_cost = (self.completion_tokens as f64 / 1000.0) * COMPLETION_COST_PER_1K;
        prompt_cost + completion_cost
    }
}

/// Parsed response of the diagnostic service
#[derive(Debug, Clone, PartialEq)]
pub struct HolmesResponse {
    pub analysis: String,
    pub usage: Option<Usage>,
}

/// Outcome of one diagnostic request
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticResult {
    Analysis { text: String, usage: Option<Usage> },
    Failure { message: String },
}

impl DiagnosticResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, DiagnosticResult::Failure { .. })
    }
}

impl From<HolmesResponse> for DiagnosticResult {
    fn from(response: HolmesResponse) -> Self {
        DiagnosticResult::Analysis {
            text: response.analysis,
            usage: response.usage,
        }
    }
}

/// Extract the analysis text from either response shape.
///
/// `analysis` wins over `answer`; when neither holds text the whole body is
/// stringified.
pub fn parse_response(body: serde_json::Value) -> HolmesResponse {
    fn text_field(body: &serde_json::Value, key: &str) -> Option<String> {
        match body.get(key)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    let usage = body
        .pointer("/metadata/usage")
        .and_then(|u| serde_json::from_value::<Usage>(u.clone()).ok());

    let analysis = match &body {
        serde_json::Value::String(s) => s.clone(),
        _ => text_field(&body, "analysis")
            .or_else(|| text_field(&body, "answer"))
            .unwrap_or_else(|| body.to_string()),
    };

    HolmesResponse { analysis, usage }
}

/// HolmesGPT API client
pub struct HolmesClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HolmesClient {
    /// Create a client with the default base URL and timeout
    pub fn new() -> Result<Self, HolmesError> {
        Self::with_base_url(DEFAULT_BASE_URL, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a client for a specific service URL
    pub fn with_base_url(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, HolmesError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a request to `/api/investigate`
    pub async fn investigate(
        &self,
        request: &InvestigateRequest,
    ) -> Result<HolmesResponse, HolmesError> {
        let body = serde_json::to_value(request)?;
        self.post(ApiFlavor::Investigate, &body).await
    }

    /// Send a request to the legacy `/api/ask`
    pub async fn ask(&self, request: &AskRequest) -> Result<HolmesResponse, HolmesError> {
        let body = serde_json::to_value(request)?;
        self.post(ApiFlavor::Ask, &body).await
    }

    async fn post(
        &self,
        flavor: ApiFlavor,
        body: &serde_json::Value,
    ) -> Result<HolmesResponse, HolmesError> {
        let url = format!("{}{}", self.base_url, flavor.path());
        tracing::info!("Sending request to HolmesGPT: {}", url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(HolmesError::ApiError {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| HolmesError::ParseError(e.to_string()))?;

        Ok(parse_response(body))
    }
}
