//! Generation engine collaborator interface
//!
//! The diffusion engine itself lives outside this crate. The controller only
//! needs four operations from it: construct, commit conditioning, preprocess
//! a raw frame, and generate.

use crate::{EngineResult, ModelConfig, ModelSelector, PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Conditioning inputs committed to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conditioning {
    /// Positive prompt
    pub prompt: String,
    /// Negative prompt
    pub negative_prompt: String,
    /// Inference steps of the active configuration
    pub num_inference_steps: u32,
    /// Guidance scale of the active configuration
    pub guidance_scale: f32,
}

impl Conditioning {
    /// Conditioning for `prompt` under a table entry's settings
    pub fn for_model(prompt: impl Into<String>, config: &ModelConfig) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: config.negative_prompt.clone(),
            num_inference_steps: config.num_inference_steps,
            guidance_scale: config.guidance_scale,
        }
    }
}

/// Attention/compilation backend requested from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Acceleration {
    /// Plain eager execution
    None,
    /// Memory-efficient attention kernels
    #[default]
    Xformers,
    /// Prebuilt TensorRT engines
    TensorRt,
}

/// Generation mode of the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// Frame-conditioned generation
    #[default]
    Img2Img,
    /// Prompt-only generation
    Txt2Img,
}

/// Deployment-wide options handed to every engine construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Use the tiny autoencoder for decode
    pub use_tiny_vae: bool,
    /// Tiny autoencoder weights
    pub tiny_vae_id: String,
    /// Full autoencoder override
    pub vae_id: Option<String>,
    /// Acceleration backend
    pub acceleration: Acceleration,
    /// Run the safety checker on outputs
    pub use_safety_checker: bool,
    /// Directory for compiled engines
    pub engine_dir: PathBuf,
    /// Warmup iterations after construction
    pub warmup: u32,
    /// Frames in flight per call; latest-frame-wins requires 1
    pub frame_buffer_size: u32,
    /// Fuse the LCM LoRA into the base model
    pub use_lcm_lora: bool,
    /// Batch denoising steps
    pub use_denoising_batch: bool,
    /// Generation mode
    pub mode: GenerationMode,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            use_tiny_vae: true,
            tiny_vae_id: "madebyollin/taesd".into(),
            vae_id: None,
            acceleration: Acceleration::default(),
            use_safety_checker: false,
            engine_dir: PathBuf::from("engines"),
            warmup: 10,
            frame_buffer_size: 1,
            use_lcm_lora: false,
            use_denoising_batch: true,
            mode: GenerationMode::default(),
        }
    }
}

impl EngineOptions {
    /// Validate the options
    pub fn validate(&self) -> Result<()> {
        if self.frame_buffer_size != 1 {
            return Err(PipelineError::config(format!(
                "frame_buffer_size must be 1, got {}",
                self.frame_buffer_size
            )));
        }
        if self.use_tiny_vae && self.tiny_vae_id.trim().is_empty() {
            return Err(PipelineError::config(
                "tiny_vae_id must be set when use_tiny_vae is enabled",
            ));
        }
        Ok(())
    }
}

/// Engine-internal frame representation that exposes flattened features
/// for similarity comparison
pub trait FrameRepresentation {
    /// Flattened numeric view of the representation
    fn features(&self) -> &[f32];
}

impl FrameRepresentation for Vec<f32> {
    fn features(&self) -> &[f32] {
        self
    }
}

impl FrameRepresentation for Box<[f32]> {
    fn features(&self) -> &[f32] {
        self
    }
}

/// A loaded generation engine bound to one configuration.
///
/// Calls are blocking and may take milliseconds to seconds. The controller
/// imposes no timeout.
pub trait GenerationEngine {
    /// Raw input frame
    type Frame;
    /// Preprocessed frame
    type Repr: FrameRepresentation;
    /// Generated output
    type Output: Clone;

    /// Re-prepare conditioning for a new prompt
    fn commit_conditioning(&mut self, conditioning: &Conditioning) -> EngineResult<()>;

    /// Convert a raw frame to the engine's representation
    fn preprocess(&mut self, frame: &Self::Frame) -> EngineResult<Self::Repr>;

    /// Generate an output frame
    fn generate(&mut self, repr: &Self::Repr, prompt: &str) -> EngineResult<Self::Output>;
}

/// Builds engine instances from configuration table entries
pub trait EngineFactory {
    /// Engine type produced
    type Engine: GenerationEngine;

    /// Construct a fresh engine; the previous instance is discarded by the caller
    fn construct(
        &self,
        model: &ModelSelector,
        config: &ModelConfig,
        options: &EngineOptions,
    ) -> EngineResult<Self::Engine>;
}

/// Raw frame type of a factory's engine
pub type FrameOf<F> = <<F as EngineFactory>::Engine as GenerationEngine>::Frame;

/// Output type of a factory's engine
pub type OutputOf<F> = <<F as EngineFactory>::Engine as GenerationEngine>::Output;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conditioning_for_model() {
        let config = ModelConfig::sd_turbo();
        let conditioning = Conditioning::for_model("a red fox", &config);

        assert_eq!(conditioning.prompt, "a red fox");
        assert_eq!(conditioning.negative_prompt, config.negative_prompt);
        assert_eq!(conditioning.num_inference_steps, 50);
        assert!((conditioning.guidance_scale - 1.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_engine_options_default() {
        let options = EngineOptions::default();
        options.validate().unwrap();
        assert_eq!(options.frame_buffer_size, 1);
        assert_eq!(options.warmup, 10);
        assert!(options.use_denoising_batch);
    }

    #[test]
    fn test_engine_options_reject_buffering() {
        let options = EngineOptions {
            frame_buffer_size: 4,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_acceleration_names() {
        let parsed: Acceleration = serde_json::from_str("\"tensorrt\"").unwrap();
        assert_eq!(parsed, Acceleration::TensorRt);
    }
}
