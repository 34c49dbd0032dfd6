//! Scoring policy: threshold mapping and the text signal ensemble

pub mod ensemble;
pub mod threshold;

pub use ensemble::{
    CombinedTextScore, SemanticMode, SignalName, SignalResult, SignalValue, TextEnsembleScorer,
    WeightConfig,
};
pub use threshold::{classify, ThresholdConfig, ThresholdPreset};
