//! In-process collaborators with scripted answers and call counters

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use insureguard_ai::collaborators::{
    Collaborators, EntitySpan, ImageAnalyzer, ImageAssessment, LabelDistribution,
    TextSignalAnalyzer, VoiceMatch, VoiceMatcher,
};
use insureguard_ai::config::EngineSettings;
use insureguard_ai::engine::FraudDecisionEngine;
use insureguard_ai::types::CollaboratorError;

/// What the image analyzer does when called
#[derive(Debug, Clone)]
pub enum ImageBehavior {
    Risk(f64),
    /// Answer without a usable risk_level
    Degraded,
    Timeout,
    /// Never answers
    Hang,
}

pub struct MockImage {
    behavior: ImageBehavior,
    pub calls: AtomicUsize,
    /// Whether the evidence file existed when the analyzer ran
    pub saw_file: AtomicBool,
    pub last_path: Mutex<Option<PathBuf>>,
}

impl MockImage {
    pub fn new(behavior: ImageBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            saw_file: AtomicBool::new(false),
            last_path: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageAnalyzer for MockImage {
    fn name(&self) -> &'static str {
        "mock-vision"
    }

    async fn analyze_image(&self, path: &Path) -> Result<ImageAssessment, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.saw_file.store(path.exists(), Ordering::SeqCst);
        *self.last_path.lock().unwrap() = Some(path.to_path_buf());

        match self.behavior {
            ImageBehavior::Risk(risk) => Ok(ImageAssessment::scored(risk)),
            ImageBehavior::Degraded => Ok(ImageAssessment {
                risk_level: 0.0,
                degraded: true,
                summary: None,
                explanation: None,
            }),
            ImageBehavior::Timeout => Err(CollaboratorError::Timeout(Duration::from_secs(30))),
            ImageBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(ImageAssessment::scored(0.0))
            }
        }
    }
}

/// Text signals answering from a fixed fraud probability
pub struct MockText {
    /// P(fraudulent); P(legitimate) = 1 - this
    pub fraudulent: f64,
    /// Entity extraction answers with an error
    pub fail_entities: bool,
    pub calls: AtomicUsize,
}

impl MockText {
    pub fn new(fraudulent: f64) -> Self {
        Self {
            fraudulent,
            fail_entities: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_failed_entities(mut self) -> Self {
        self.fail_entities = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextSignalAnalyzer for MockText {
    async fn sentiment(&self, _text: &str) -> Result<LabelDistribution, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok([
            ("neutral".to_string(), 0.8),
            ("positive".to_string(), 0.1),
            ("negative".to_string(), 0.1),
        ]
        .into())
    }

    async fn entities(&self, _text: &str) -> Result<Vec<EntitySpan>, CollaboratorError> {
        if self.fail_entities {
            return Err(CollaboratorError::Api {
                status: 503,
                body: "model loading".to_string(),
            });
        }
        Ok(Vec::new())
    }

    async fn semantic_similarity(&self, _segments: &[String]) -> Result<f64, CollaboratorError> {
        Ok(1.0)
    }

    async fn fraud_classification(&self, _text: &str) -> Result<LabelDistribution, CollaboratorError> {
        Ok([
            ("fraudulent".to_string(), self.fraudulent),
            ("legitimate".to_string(), 1.0 - self.fraudulent),
        ]
        .into())
    }
}

pub struct MockVoice {
    answer: VoiceMatch,
    pub calls: AtomicUsize,
}

impl MockVoice {
    pub fn similarity(similarity: f64) -> Self {
        Self {
            answer: VoiceMatch::Similarity(similarity),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceMatcher for MockVoice {
    async fn compare(&self, _sample: &Path, _reference: &Path) -> Result<VoiceMatch, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer)
    }
}

/// One set of mocks, kept for call-count assertions
pub struct Mocks {
    pub image: Arc<MockImage>,
    pub text: Arc<MockText>,
    pub voice: Arc<MockVoice>,
}

impl Mocks {
    pub fn new(image: ImageBehavior, fraudulent: f64, similarity: f64) -> Self {
        Self {
            image: Arc::new(MockImage::new(image)),
            text: Arc::new(MockText::new(fraudulent)),
            voice: Arc::new(MockVoice::similarity(similarity)),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            image: self.image.clone(),
            text: self.text.clone(),
            voice: self.voice.clone(),
        }
    }

    pub fn engine(&self, settings: &EngineSettings) -> FraudDecisionEngine {
        FraudDecisionEngine::new(&self.collaborators(), settings).expect("valid engine settings")
    }
}
