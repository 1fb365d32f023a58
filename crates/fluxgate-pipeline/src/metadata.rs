//! Static metadata describing the accepted parameters
//!
//! Informational only: the controller enforces nothing here beyond selector
//! membership.

use crate::{ControllerConfig, ModelSelector};
use serde::{Deserialize, Serialize};

/// Kind of input the pipeline consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Camera or video frames
    #[default]
    Image,
    /// Text only
    Text,
}

/// Descriptive pipeline information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineInfo {
    /// Display name
    pub name: String,
    /// Input kind
    pub input_mode: InputMode,
    /// Free-form page content shown by a UI
    pub page_content: String,
}

impl Default for PipelineInfo {
    fn default() -> Self {
        Self {
            name: "fluxgate img2img".into(),
            input_mode: InputMode::Image,
            page_content: String::new(),
        }
    }
}

/// Free-text parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextParam {
    /// Parameter id
    pub id: String,
    /// Display title
    pub title: String,
    /// Default value
    pub default: String,
}

/// One selectable model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOption {
    /// Selector value
    pub id: ModelSelector,
    /// Base model weights
    pub base_model_id: String,
    /// Fixed output width
    pub width: u32,
    /// Fixed output height
    pub height: u32,
}

/// Enumerated model parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParam {
    /// Parameter id
    pub id: String,
    /// Display title
    pub title: String,
    /// Options in table order
    pub options: Vec<ModelOption>,
    /// Default selection
    pub default: ModelSelector,
}

/// Schema of the per-call parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    /// Positive prompt
    pub prompt: TextParam,
    /// Negative prompt of the default model (fixed per configuration)
    pub negative_prompt: TextParam,
    /// Model selector
    pub model: ModelParam,
}

impl InputSchema {
    /// Build the schema for a controller configuration
    pub fn from_config(config: &ControllerConfig) -> Self {
        let options = config
            .models
            .iter()
            .map(|(selector, model)| ModelOption {
                id: selector.clone(),
                base_model_id: model.base_model_id.clone(),
                width: model.width,
                height: model.height,
            })
            .collect();

        let default_negative = config
            .models
            .get(&config.default_model)
            .map(|m| m.negative_prompt.clone())
            .unwrap_or_default();

        Self {
            prompt: TextParam {
                id: "prompt".into(),
                title: "Prompt".into(),
                default: config.default_prompt.clone(),
            },
            negative_prompt: TextParam {
                id: "negative_prompt".into(),
                title: "Negative Prompt".into(),
                default: default_negative,
            },
            model: ModelParam {
                id: "model".into(),
                title: "Model".into(),
                options,
                default: config.default_model.clone(),
            },
        }
    }

    /// Output dimensions for a selector
    pub fn dimensions(&self, selector: &ModelSelector) -> Option<(u32, u32)> {
        self.model
            .options
            .iter()
            .find(|o| &o.id == selector)
            .map(|o| (o.width, o.height))
    }
}
