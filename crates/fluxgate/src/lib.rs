//! # Fluxgate
//!
//! Frame admission and reconfiguration control for real-time img2img
//! generation.
//!
//! Fluxgate keeps a diffusion engine busy only when it has to be:
//! - [`pipeline`]: rebuilds the engine on model switches, re-commits
//!   conditioning on prompt changes, and reuses the last output for dropped
//!   frames
//! - [`filter`]: stochastic similarity filter deciding which frames are worth
//!   generating
//!
//! ## Quick Start
//!
//! ```ignore
//! use fluxgate::{ControllerConfig, PipelineController, RequestParams, SharedPipeline};
//!
//! let controller = PipelineController::new(ControllerConfig::default(), my_factory)?;
//! let pipeline = SharedPipeline::new(controller);
//!
//! let output = pipeline
//!     .predict(RequestParams::new("sdxl-turbo", "a lighthouse at dusk", frame))
//!     .await?;
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `testing` | Synthetic engine and stream simulation |
//! | `sim` | `fluxgate-sim` command-line simulator (default) |

/// Similarity admission filter
pub mod filter {
    pub use fluxgate_filter::*;
}

/// Pipeline controller
pub mod pipeline {
    pub use fluxgate_pipeline::*;
}

#[cfg(feature = "testing")]
pub mod simulation;

pub use fluxgate_filter::{Admission, FilterConfig, FilterStats, PassReason, SimilarityFilter};
pub use fluxgate_pipeline::{
    ConfigTable, ControllerConfig, ControllerStats, DropPolicy, EngineFactory, GenerationEngine,
    ModelConfig, ModelSelector, PipelineController, PipelineError, Prediction, RequestParams,
    Result, SharedPipeline,
};

/// Prelude for common imports
pub mod prelude {
    pub use fluxgate_filter::{Admission, FilterConfig, PassReason, SimilarityFilter};
    pub use fluxgate_pipeline::prelude::*;
}
