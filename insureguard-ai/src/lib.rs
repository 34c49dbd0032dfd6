//! insureguard-ai library interface
//!
//! Multimodal claim fraud scoring: per-modality evaluators over external
//! analyzers, the weighted text ensemble, and the decision engine that fuses
//! them. The HTTP surface and the command-line pipeline are thin shells over
//! [`engine::FraudDecisionEngine`].

pub mod api;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluators;
pub mod scoring;
pub mod types;
pub mod uploads;

pub use crate::error::{ApiError, ApiResult};

use axum::{extract::DefaultBodyLimit, Router};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::engine::FraudDecisionEngine;
use crate::scoring::ThresholdConfig;
use crate::types::EvaluationMode;
use crate::uploads::UploadLimits;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Decision engine over the process-wide collaborator handles
    pub engine: Arc<FraudDecisionEngine>,
    /// Evaluation mode applied to every request
    pub mode: EvaluationMode,
    pub thresholds: ThresholdConfig,
    /// Parent of the request-scoped upload directories
    pub storage_root: PathBuf,
    pub upload_limits: UploadLimits,
    /// Front-end assets served at `/`, if configured
    pub static_dir: Option<PathBuf>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        engine: Arc<FraudDecisionEngine>,
        mode: EvaluationMode,
        thresholds: ThresholdConfig,
        storage_root: PathBuf,
        upload_limits: UploadLimits,
    ) -> Self {
        Self {
            engine,
            mode,
            thresholds,
            storage_root,
            upload_limits,
            static_dir: None,
            startup_time: Utc::now(),
        }
    }

    pub fn from_config(engine: Arc<FraudDecisionEngine>, config: &ServiceConfig) -> Self {
        let mut state = Self::new(
            engine,
            config.mode,
            config.thresholds,
            config.storage_root.clone(),
            config.upload_limits,
        );
        state.static_dir = config.static_dir.clone();
        state
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.upload_limits.request_body_limit();
    let static_dir = state.static_dir.clone();

    let router = Router::new()
        .merge(api::analyze_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    }
}
