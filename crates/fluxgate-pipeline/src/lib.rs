//! Pipeline Controller for real-time img2img generation
//!
//! Sits between a frame source and a diffusion engine and decides, per frame,
//! how much work the engine has to do:
//! - Switching to another configuration table entry rebuilds the engine
//! - Changing only the prompt re-commits conditioning
//! - Near-duplicate frames can be answered with the previous output
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      PipelineController                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  RequestParams { model, prompt, frame }                          │
//! │        │                                                         │
//! │        ▼                                                         │
//! │  ConfigTable::resolve ──(unknown)──> InvalidSelector             │
//! │        │                                                         │
//! │        ├─ model changed  ──> EngineFactory::construct            │
//! │        │                     + commit_conditioning ──> swap      │
//! │        ├─ prompt changed ──> commit_conditioning                 │
//! │        ▼                                                         │
//! │  preprocess ──> SimilarityFilter::admit                          │
//! │                    │                                             │
//! │                    ├─ Pass ──> generate ──> Generated(output)    │
//! │                    └─ Drop ──> DropPolicy                        │
//! │                                 ├─ ReuseLast ──> Reused(last)    │
//! │                                 └─ Advisory  ──> generate        │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use fluxgate_pipeline::testing::{SyntheticFactory, SyntheticFrame};
//! use fluxgate_pipeline::{ControllerConfig, PipelineController, RequestParams};
//!
//! let factory = SyntheticFactory::new();
//! let mut controller = PipelineController::new(ControllerConfig::default(), factory)?;
//!
//! let frame = SyntheticFrame::uniform(64, 64, 128);
//! let output = controller.predict(RequestParams::new("sd-turbo", "a red fox", frame))?;
//! assert_eq!(output.output().prompt, "a red fox");
//! ```

mod config;
mod controller;
pub mod engine;
mod error;
mod metadata;
mod model;
mod shared;
mod table;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{ControllerConfig, DropPolicy};
pub use controller::{
    ControllerStats, PipelineController, PipelineState, Prediction, Reconfiguration,
    RequestParams,
};
pub use engine::{
    Acceleration, Conditioning, EngineFactory, EngineOptions, FrameRepresentation,
    GenerationEngine, GenerationMode,
};
pub use error::{EngineError, EngineResult, PipelineError, Result};
pub use metadata::{InputMode, InputSchema, ModelOption, ModelParam, PipelineInfo, TextParam};
pub use model::{CfgType, ModelConfig, ModelSelector, OutputType, SDXL_TURBO, SD_TURBO};
pub use shared::SharedPipeline;
pub use table::ConfigTable;

pub use fluxgate_filter::{Admission, FilterConfig, FilterStats, PassReason};

/// Prompt committed when a controller is created
pub const DEFAULT_PROMPT: &str =
    "Octopus in the style of Paul Klee painting, abstract geometric forms, vibrant colors, cubist influence, modernist art, detailed brushwork, artistic masterpiece";

/// Negative prompt of the preset table entries
pub const DEFAULT_NEGATIVE_PROMPT: &str =
    "black and white, blurry, low resolution, pixelated,  pixel art, low quality, low fidelity";

/// Prelude for common imports
pub mod prelude {
    pub use super::{
        ConfigTable, ControllerConfig, DropPolicy, EngineFactory, GenerationEngine,
        ModelConfig, ModelSelector, PipelineController, PipelineError, Prediction,
        RequestParams, Result, SharedPipeline,
    };
}
