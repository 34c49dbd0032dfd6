//! Vision-language risk API client
//!
//! Sends the claim document image with a risk-assessment prompt to a
//! `generateContent`-style endpoint and extracts `risk_level` from the answer.

use async_trait::async_trait;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::{Duration, Instant};

use super::json_extract::{extract_risk_level, string_field};
use super::{ensure_success, map_reqwest_error, ImageAnalyzer, ImageAssessment};
use crate::types::CollaboratorError;

const USER_AGENT: &str = concat!("InsureGuard/", env!("CARGO_PKG_VERSION"));

/// Prompt sent alongside the image
pub const RISK_PROMPT: &str = "You are an AI risk assessment assistant for insurance claim documents. \
You will receive an image of a claim document. Read it and determine the potential fraud risk \
as a number between 0 and 1: 0 means no risk, 1 means high risk. \
Base this on red flags like altered signatures, mismatched amounts, fake logos or missing authorization. \
Provide the output strictly in JSON format with keys 'summary' (one sentence), \
'risk_level' (a number between 0 and 1) and 'explanation' (2-3 sentences).";

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }
}

/// Remote document risk assessor
pub struct VisionRiskClient {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    timeout: Duration,
}

impl VisionRiskClient {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| CollaboratorError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
            timeout,
        })
    }

    fn url(&self) -> String {
        format!("{}/{}:generateContent", self.endpoint, self.model)
    }

    /// Request body with the prompt and inline image
    pub fn build_request(mime_type: &str, image_base64: &str) -> serde_json::Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": RISK_PROMPT },
                    { "inline_data": { "mime_type": mime_type, "data": image_base64 } }
                ]
            }]
        })
    }

    /// Interpret the model's text answer
    pub fn assessment_from_text(raw_output: &str) -> ImageAssessment {
        let extraction = extract_risk_level(raw_output);
        ImageAssessment {
            risk_level: extraction.risk_level,
            degraded: extraction.degraded,
            summary: string_field(extraction.object.as_ref(), "summary"),
            explanation: string_field(extraction.object.as_ref(), "explanation"),
        }
    }
}

#[async_trait]
impl ImageAnalyzer for VisionRiskClient {
    fn name(&self) -> &'static str {
        "vision"
    }

    async fn analyze_image(&self, path: &Path) -> Result<ImageAssessment, CollaboratorError> {
        let bytes = tokio::fs::read(path).await?;
        let mime_type = infer::get(&bytes)
            .map(|kind| kind.mime_type())
            .unwrap_or("image/png");
        let image_base64 = base64::engine::general_purpose::STANDARD.encode(&bytes);

        let started = Instant::now();
        tracing::debug!(model = %self.model, mime_type, bytes = bytes.len(), "Querying vision risk API");

        let response = self
            .http_client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::build_request(mime_type, &image_base64))
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, self.timeout))?;

        let response = ensure_success(response).await?;
        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Parse(e.to_string()))?;

        let raw_output = body.first_text().unwrap_or_default();
        let assessment = Self::assessment_from_text(raw_output);

        if assessment.degraded {
            tracing::warn!(
                raw_output = %raw_output,
                "Vision answer had no usable risk_level, defaulting to 0.0"
            );
        } else {
            tracing::info!(
                risk_level = assessment.risk_level,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Vision risk assessment received"
            );
        }

        Ok(assessment)
    }
}
