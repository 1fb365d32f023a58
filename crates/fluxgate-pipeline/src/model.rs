//! Model selectors and per-model generation configurations

use crate::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Selector for the SD-Turbo preset
pub const SD_TURBO: &str = "sd-turbo";

/// Selector for the SDXL-Turbo preset
pub const SDXL_TURBO: &str = "sdxl-turbo";

/// Name of a configuration table entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelSelector(String);

impl ModelSelector {
    /// Create a selector
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// SD-Turbo preset selector
    pub fn sd_turbo() -> Self {
        Self::new(SD_TURBO)
    }

    /// SDXL-Turbo preset selector
    pub fn sdxl_turbo() -> Self {
        Self::new(SDXL_TURBO)
    }

    /// Selector name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelSelector {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ModelSelector {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Classifier-free guidance mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CfgType {
    /// No guidance
    None,
    /// Full guidance with a separate unconditional pass
    Full,
    /// Self-negative guidance reusing the conditional pass
    #[default]
    #[serde(rename = "self")]
    SelfNegative,
    /// Guidance from the initial noise only
    Initialize,
}

/// Representation returned by the engine's generation call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    /// Decoded image
    #[default]
    Pil,
    /// Tensor
    Pt,
    /// Array
    Np,
    /// Undecoded latent
    Latent,
}

/// One configuration table entry.
///
/// Everything here is part of the configuration's identity: switching to a
/// different entry rebuilds the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base model weights (path or hub id)
    pub base_model_id: String,
    /// Sampling indices used by the stream (`t_index_list`)
    pub t_index_list: Vec<u32>,
    /// Inference steps the schedule is drawn from
    pub num_inference_steps: u32,
    /// Guidance scale
    pub guidance_scale: f32,
    /// Guidance mode
    pub cfg_type: CfgType,
    /// Output representation
    pub output_type: OutputType,
    /// Fixed output width in pixels
    pub width: u32,
    /// Fixed output height in pixels
    pub height: u32,
    /// Negative prompt committed alongside every prompt
    pub negative_prompt: String,
}

impl ModelConfig {
    /// SD-Turbo: longer schedule, light guidance
    pub fn sd_turbo() -> Self {
        Self {
            base_model_id: "stabilityai/sd-turbo".into(),
            t_index_list: vec![35, 45],
            num_inference_steps: 50,
            guidance_scale: 1.2,
            cfg_type: CfgType::SelfNegative,
            output_type: OutputType::Pil,
            width: 512,
            height: 512,
            negative_prompt: crate::DEFAULT_NEGATIVE_PROMPT.into(),
        }
    }

    /// SDXL-Turbo: single step, no guidance
    pub fn sdxl_turbo() -> Self {
        Self {
            base_model_id: "stabilityai/sdxl-turbo".into(),
            t_index_list: vec![1],
            num_inference_steps: 4,
            guidance_scale: 0.0,
            cfg_type: CfgType::SelfNegative,
            output_type: OutputType::Pil,
            width: 512,
            height: 768,
            negative_prompt: crate::DEFAULT_NEGATIVE_PROMPT.into(),
        }
    }

    /// Number of denoising passes per frame
    pub fn denoising_steps(&self) -> usize {
        self.t_index_list.len()
    }

    /// Validate the entry
    pub fn validate(&self) -> Result<()> {
        if self.base_model_id.trim().is_empty() {
            return Err(PipelineError::config("base_model_id must not be empty"));
        }

        if self.num_inference_steps == 0 {
            return Err(PipelineError::config("num_inference_steps must be > 0"));
        }

        if self.t_index_list.is_empty() {
            return Err(PipelineError::config("t_index_list must not be empty"));
        }

        if let Some(&index) = self
            .t_index_list
            .iter()
            .find(|&&i| i >= self.num_inference_steps)
        {
            return Err(PipelineError::config(format!(
                "t_index {} out of range for {} inference steps",
                index, self.num_inference_steps
            )));
        }

        if !self.guidance_scale.is_finite() || self.guidance_scale < 0.0 {
            return Err(PipelineError::config(format!(
                "guidance_scale must be finite and >= 0, got {}",
                self.guidance_scale
            )));
        }

        if self.width == 0 || self.height == 0 || self.width % 8 != 0 || self.height % 8 != 0 {
            return Err(PipelineError::config(format!(
                "resolution {}x{} must be non-zero multiples of 8",
                self.width, self.height
            )));
        }

        Ok(())
    }
}
