//! Speaker embedding encoder client
//!
//! The encoder service turns one recording into a fixed-length speaker
//! embedding. Verification compares the sample and reference embeddings.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::{ensure_success, map_reqwest_error, VoiceMatch, VoiceMatcher};
use crate::types::CollaboratorError;

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f64>,
}

/// Voice matcher backed by a speaker embedding service
pub struct SpeakerEmbeddingClient {
    http_client: reqwest::Client,
    encoder_url: String,
    timeout: Duration,
}

impl SpeakerEmbeddingClient {
    pub fn new(encoder_url: &str, timeout: Duration) -> Result<Self, CollaboratorError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollaboratorError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            encoder_url: encoder_url.to_string(),
            timeout,
        })
    }

    async fn embed(&self, path: &Path) -> Result<Vec<f64>, CollaboratorError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        let form = Form::new().part("audio", Part::bytes(bytes).file_name(file_name));

        let response = self
            .http_client
            .post(&self.encoder_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, self.timeout))?;
        let response = ensure_success(response).await?;
        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Parse(e.to_string()))?;

        if body.embedding.is_empty() {
            return Err(CollaboratorError::Parse("empty speaker embedding".to_string()));
        }
        Ok(body.embedding)
    }
}

/// Cosine similarity of two embeddings, clamped into [0,1]
///
/// Mismatched lengths and zero vectors are parse errors.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64, CollaboratorError> {
    if a.len() != b.len() {
        return Err(CollaboratorError::Parse(format!(
            "embedding length mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 || !norm_a.is_finite() || !norm_b.is_finite() {
        return Err(CollaboratorError::Parse("degenerate speaker embedding".to_string()));
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| (x / norm_a) * (y / norm_b)).sum();
    Ok(dot.clamp(0.0, 1.0))
}

#[async_trait]
impl VoiceMatcher for SpeakerEmbeddingClient {
    async fn compare(&self, sample: &Path, reference: &Path) -> Result<VoiceMatch, CollaboratorError> {
        let (sample_embedding, reference_embedding) =
            tokio::try_join!(self.embed(sample), self.embed(reference))?;
        let similarity = cosine_similarity(&sample_embedding, &reference_embedding)?;
        tracing::debug!(similarity, dims = sample_embedding.len(), "Speaker similarity computed");
        Ok(VoiceMatch::Similarity(similarity))
    }
}
