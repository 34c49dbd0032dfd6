//! Hosted inference client for the four text signals
//!
//! Every signal is one `POST {base_url}/models/{model}` call:
//! - sentiment: text-classification
//! - entities: token-classification with simple aggregation
//! - semantic: sentence-similarity (source sentence vs the remaining segments)
//! - fraud/legal: zero-shot classification against a contextual prompt

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use super::{ensure_success, map_reqwest_error, EntitySpan, LabelDistribution, TextSignalAnalyzer};
use crate::config::TextModelsConfig;
use crate::scoring::ensemble::{FRAUDULENT_KEY, LEGITIMATE_KEY};
use crate::types::CollaboratorError;

/// Zero-shot candidate label mapped to the "fraudulent" key
pub const FRAUDULENT_CANDIDATE: &str = "fraudulent insurance claim";

/// Zero-shot candidate label mapped to the "legitimate" key
pub const LEGITIMATE_CANDIDATE: &str = "legitimate insurance claim";

/// Prefix giving the zero-shot model its context
pub const CONTEXT_PREFIX: &str =
    "This text is an insurance claim description. Determine if it is fraudulent or legitimate:\n";

/// Upper bound on segments compared pairwise (one call per segment)
pub const MAX_SEMANTIC_SEGMENTS: usize = 16;

#[derive(Debug, Clone, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

/// text-classification answers come either flat or nested one level
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassificationResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

impl ClassificationResponse {
    fn into_distribution(self) -> LabelDistribution {
        let scores = match self {
            ClassificationResponse::Nested(outer) => outer.into_iter().next().unwrap_or_default(),
            ClassificationResponse::Flat(scores) => scores,
        };
        scores
            .into_iter()
            .map(|s| (s.label.to_ascii_lowercase(), s.score))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct EntityGroup {
    entity_group: String,
    word: String,
    score: f64,
}

#[derive(Debug, Deserialize)]
struct ZeroShotResponse {
    labels: Vec<String>,
    scores: Vec<f64>,
}

impl ZeroShotResponse {
    fn into_distribution(self) -> Result<LabelDistribution, CollaboratorError> {
        if self.labels.len() != self.scores.len() {
            return Err(CollaboratorError::Parse(format!(
                "zero-shot answer has {} labels but {} scores",
                self.labels.len(),
                self.scores.len()
            )));
        }
        let mut distribution = LabelDistribution::new();
        for (label, score) in self.labels.into_iter().zip(self.scores) {
            let key = match label.as_str() {
                FRAUDULENT_CANDIDATE => FRAUDULENT_KEY,
                LEGITIMATE_CANDIDATE => LEGITIMATE_KEY,
                _ => continue,
            };
            distribution.insert(key.to_string(), score);
        }
        for key in [FRAUDULENT_KEY, LEGITIMATE_KEY] {
            if !distribution.contains_key(key) {
                return Err(CollaboratorError::Parse(format!(
                    "zero-shot answer is missing the '{}' candidate",
                    key
                )));
            }
        }
        Ok(distribution)
    }
}

/// Text signal analyzer backed by a hosted inference API
pub struct InferenceTextClient {
    http_client: reqwest::Client,
    config: TextModelsConfig,
}

impl InferenceTextClient {
    pub fn new(config: TextModelsConfig) -> Result<Self, CollaboratorError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CollaboratorError::Network(e.to_string()))?;
        Ok(Self {
            http_client,
            config,
        })
    }

    fn model_url(&self, model: &str) -> String {
        format!("{}/models/{}", self.config.base_url.trim_end_matches('/'), model)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        model: &str,
        body: serde_json::Value,
    ) -> Result<T, CollaboratorError> {
        let mut request = self.http_client.post(self.model_url(model)).json(&body);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, self.config.timeout))?;
        let response = ensure_success(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| CollaboratorError::Parse(format!("{}: {}", model, e)))
    }
}

#[async_trait]
impl TextSignalAnalyzer for InferenceTextClient {
    async fn sentiment(&self, text: &str) -> Result<LabelDistribution, CollaboratorError> {
        let response: ClassificationResponse = self
            .post(&self.config.sentiment_model, json!({ "inputs": text }))
            .await?;
        Ok(response.into_distribution())
    }

    async fn entities(&self, text: &str) -> Result<Vec<EntitySpan>, CollaboratorError> {
        let groups: Vec<EntityGroup> = self
            .post(
                &self.config.ner_model,
                json!({ "inputs": text, "parameters": { "aggregation_strategy": "simple" } }),
            )
            .await?;
        Ok(groups
            .into_iter()
            .map(|g| EntitySpan {
                group: g.entity_group,
                span: g.word,
                confidence: g.score,
            })
            .collect())
    }

    async fn semantic_similarity(&self, segments: &[String]) -> Result<f64, CollaboratorError> {
        let segments = &segments[..segments.len().min(MAX_SEMANTIC_SEGMENTS)];
        if segments.len() < 2 {
            return Ok(1.0);
        }

        // Cosine similarity is symmetric: comparing each segment with the ones
        // after it covers every unordered pair exactly once.
        let mut total = 0.0;
        let mut pairs = 0usize;
        for (i, source) in segments.iter().enumerate().take(segments.len() - 1) {
            let rest = &segments[i + 1..];
            let similarities: Vec<f64> = self
                .post(
                    &self.config.semantic_model,
                    json!({
                        "inputs": {
                            "source_sentence": source,
                            "sentences": rest,
                        }
                    }),
                )
                .await?;
            if similarities.len() != rest.len() {
                return Err(CollaboratorError::Parse(format!(
                    "expected {} similarities, got {}",
                    rest.len(),
                    similarities.len()
                )));
            }
            total += similarities.iter().sum::<f64>();
            pairs += similarities.len();
        }
        Ok(total / pairs as f64)
    }

    async fn fraud_classification(&self, text: &str) -> Result<LabelDistribution, CollaboratorError> {
        let response: ZeroShotResponse = self
            .post(
                &self.config.zero_shot_model,
                json!({
                    "inputs": format!("{}{}", CONTEXT_PREFIX, text),
                    "parameters": {
                        "candidate_labels": [FRAUDULENT_CANDIDATE, LEGITIMATE_CANDIDATE]
                    }
                }),
            )
            .await?;
        response.into_distribution()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_nested_and_flat() {
        let nested: ClassificationResponse = serde_json::from_str(
            r#"[[{"label":"Neutral","score":0.7},{"label":"Positive","score":0.1},{"label":"Negative","score":0.2}]]"#,
        )
        .unwrap();
        let distribution = nested.into_distribution();
        assert_eq!(distribution.get("neutral"), Some(&0.7));
        assert_eq!(distribution.get("negative"), Some(&0.2));

        let flat: ClassificationResponse =
            serde_json::from_str(r#"[{"label":"positive","score":0.9}]"#).unwrap();
        assert_eq!(flat.into_distribution().get("positive"), Some(&0.9));
    }

    #[test]
    fn test_zero_shot_maps_candidates() {
        let response = ZeroShotResponse {
            labels: vec![LEGITIMATE_CANDIDATE.to_string(), FRAUDULENT_CANDIDATE.to_string()],
            scores: vec![0.8, 0.2],
        };
        let distribution = response.into_distribution().unwrap();
        assert_eq!(distribution.get(LEGITIMATE_KEY), Some(&0.8));
        assert_eq!(distribution.get(FRAUDULENT_KEY), Some(&0.2));
    }

    #[test]
    fn test_zero_shot_length_mismatch() {
        let response = ZeroShotResponse {
            labels: vec![FRAUDULENT_CANDIDATE.to_string()],
            scores: vec![],
        };
        assert!(matches!(response.into_distribution(), Err(CollaboratorError::Parse(_))));
    }

    #[test]
    fn test_zero_shot_unknown_candidates_rejected() {
        let renamed = ZeroShotResponse {
            labels: vec!["fraud".to_string(), "not fraud".to_string()],
            scores: vec![0.6, 0.4],
        };
        assert!(matches!(renamed.into_distribution(), Err(CollaboratorError::Parse(_))));

        let one_sided = ZeroShotResponse {
            labels: vec![FRAUDULENT_CANDIDATE.to_string(), "other".to_string()],
            scores: vec![0.6, 0.4],
        };
        assert!(matches!(one_sided.into_distribution(), Err(CollaboratorError::Parse(_))));
    }

    #[test]
    fn test_model_url() {
        let mut config = TextModelsConfig::default();
        config.base_url = "http://models.local/".to_string();
        let client = InferenceTextClient::new(config).unwrap();
        assert_eq!(
            client.model_url("dslim/bert-base-NER"),
            "http://models.local/models/dslim/bert-base-NER"
        );
    }
}
