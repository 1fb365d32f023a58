//! Error types for the pipeline controller

use crate::ModelSelector;
use fluxgate_filter::FilterError;
use thiserror::Error;

/// Result type for controller operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Result type for engine collaborator calls
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Failures reported by the generation engine.
///
/// The controller propagates these unchanged and never retries them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// Engine could not be built for a configuration
    #[error("Engine initialization failed for {model}: {reason}")]
    Init { model: ModelSelector, reason: String },

    /// Conditioning commit rejected
    #[error("Conditioning failed: {0}")]
    Conditioning(String),

    /// Raw frame could not be converted
    #[error("Malformed frame: {0}")]
    FrameFormat(String),

    /// Generation call failed
    #[error("Generation failed: {0}")]
    Generation(String),
}

/// Errors surfaced by the controller
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Requested model is not in the configuration table
    #[error("Unknown model selector '{requested}' (available: {})", .available.join(", "))]
    InvalidSelector {
        requested: ModelSelector,
        available: Vec<String>,
    },

    /// Engine collaborator failure
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Filter configuration rejected
    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    /// Controller configuration rejected
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialized configuration could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Blocking prediction task did not complete
    #[error("Prediction task failed: {0}")]
    TaskFailed(String),
}

impl PipelineError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Stable machine-readable code for each variant
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidSelector { .. } => "FG-INVALID-SELECTOR",
            Self::Engine(EngineError::Init { .. }) => "FG-ENGINE-INIT",
            Self::Engine(EngineError::Conditioning(_)) => "FG-CONDITIONING",
            Self::Engine(EngineError::FrameFormat(_)) => "FG-FRAME-FORMAT",
            Self::Engine(EngineError::Generation(_)) => "FG-GENERATION",
            Self::Filter(_) => "FG-FILTER",
            Self::Config(_) => "FG-CONFIG",
            Self::Json(_) => "FG-JSON",
            Self::Io(_) => "FG-IO",
            Self::TaskFailed(_) => "FG-TASK",
        }
    }

    /// Whether the error came from the engine collaborator
    pub fn is_engine_error(&self) -> bool {
        matches!(self, Self::Engine(_))
    }
}
