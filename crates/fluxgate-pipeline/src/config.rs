//! Controller configuration

use crate::{ConfigTable, EngineOptions, ModelSelector, PipelineError, Result};
use fluxgate_filter::FilterConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What the controller does with a frame the filter dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// Skip the engine and return the previous output
    #[default]
    ReuseLast,
    /// Count the decision but always generate
    Advisory,
}

/// Configuration for a pipeline controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Model configurations keyed by selector
    pub models: ConfigTable,
    /// Model loaded at construction
    pub default_model: ModelSelector,
    /// Prompt committed at construction
    pub default_prompt: String,
    /// Options passed to every engine construction
    pub engine: EngineOptions,
    /// Similarity filter settings
    pub filter: FilterConfig,
    /// Consult the similarity filter for each frame
    pub filter_enabled: bool,
    /// Handling of dropped frames
    pub drop_policy: DropPolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            models: ConfigTable::presets(),
            default_model: ModelSelector::sdxl_turbo(),
            default_prompt: crate::DEFAULT_PROMPT.into(),
            engine: EngineOptions::default(),
            filter: FilterConfig::default().with_threshold(0.98),
            filter_enabled: true,
            drop_policy: DropPolicy::default(),
        }
    }
}

impl ControllerConfig {
    /// Single-model configuration
    pub fn single(selector: impl Into<ModelSelector>, model: crate::ModelConfig) -> Self {
        let selector = selector.into();
        Self {
            models: ConfigTable::single(selector.clone(), model),
            default_model: selector,
            ..Default::default()
        }
    }

    /// Parse from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.models.validate()?;

        if !self.models.contains(&self.default_model) {
            return Err(PipelineError::config(format!(
                "default_model '{}' is not in the configuration table",
                self.default_model
            )));
        }

        self.engine.validate()?;
        self.filter.validate()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModelConfig;

    #[test]
    fn test_default_config_is_valid() {
        let config = ControllerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.default_model, ModelSelector::sdxl_turbo());
        assert_eq!(config.drop_policy, DropPolicy::ReuseLast);
        assert!(config.filter_enabled);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = ControllerConfig::default();
        let json = config.to_json().unwrap();
        let parsed = ControllerConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "default_model": "sd-turbo",
            "drop_policy": "advisory",
            "filter": { "threshold": 0.9, "seed": 7 }
        }"#;
        let config = ControllerConfig::from_json_str(json).unwrap();

        assert_eq!(config.default_model, ModelSelector::sd_turbo());
        assert_eq!(config.drop_policy, DropPolicy::Advisory);
        assert_eq!(config.filter.threshold, 0.9);
        assert_eq!(config.filter.seed, Some(7));
        assert_eq!(config.models.len(), 2);
    }

    #[test]
    fn test_custom_table_from_json() {
        let json = r#"{
            "default_model": "lcm",
            "models": {
                "lcm": {
                    "base_model_id": "SimianLuo/LCM_Dreamshaper_v7",
                    "t_index_list": [0, 16, 32, 45],
                    "num_inference_steps": 50,
                    "guidance_scale": 1.0,
                    "cfg_type": "none",
                    "output_type": "pil",
                    "width": 512,
                    "height": 512,
                    "negative_prompt": ""
                }
            }
        }"#;
        let config = ControllerConfig::from_json_str(json).unwrap();
        assert_eq!(config.models.len(), 1);
        assert_eq!(
            config
                .models
                .get(&ModelSelector::from("lcm"))
                .unwrap()
                .t_index_list,
            vec![0, 16, 32, 45]
        );
    }

    #[test]
    fn test_unknown_default_model_rejected() {
        let json = r#"{ "default_model": "sd-1.5" }"#;
        let err = ControllerConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let config = ControllerConfig {
            filter: FilterConfig::default().with_threshold(1.2),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PipelineError::Filter(_))));
    }

    #[test]
    fn test_single_model_config() {
        let config = ControllerConfig::single("turbo", ModelConfig::sdxl_turbo());
        config.validate().unwrap();
        assert_eq!(config.models.len(), 1);
        assert_eq!(config.default_model.as_str(), "turbo");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fluxgate.json");
        std::fs::write(&path, ControllerConfig::default().to_json().unwrap()).unwrap();

        let config = ControllerConfig::from_json_file(&path).unwrap();
        assert_eq!(config, ControllerConfig::default());

        let missing = ControllerConfig::from_json_file(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(PipelineError::Io(_))));
    }
}
