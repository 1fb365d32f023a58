//! Finite configuration table keyed by model selector

use crate::{ModelConfig, ModelSelector, PipelineError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Static mapping from selector to configuration.
///
/// Insertion order is preserved so the selector list presented to callers is
/// stable. A single-model deployment is a table with one entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigTable {
    entries: IndexMap<ModelSelector, ModelConfig>,
}

impl ConfigTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Table with the SD-Turbo and SDXL-Turbo presets
    pub fn presets() -> Self {
        Self::new()
            .with(ModelSelector::sd_turbo(), ModelConfig::sd_turbo())
            .with(ModelSelector::sdxl_turbo(), ModelConfig::sdxl_turbo())
    }

    /// Table with a single entry
    pub fn single(selector: impl Into<ModelSelector>, config: ModelConfig) -> Self {
        Self::new().with(selector, config)
    }

    /// Builder-style insert
    pub fn with(mut self, selector: impl Into<ModelSelector>, config: ModelConfig) -> Self {
        self.insert(selector, config);
        self
    }

    /// Insert or replace an entry, returning the previous one
    pub fn insert(
        &mut self,
        selector: impl Into<ModelSelector>,
        config: ModelConfig,
    ) -> Option<ModelConfig> {
        self.entries.insert(selector.into(), config)
    }

    /// Look up an entry
    pub fn get(&self, selector: &ModelSelector) -> Option<&ModelConfig> {
        self.entries.get(selector)
    }

    /// Look up an entry, failing with `InvalidSelector`
    pub fn resolve(&self, selector: &ModelSelector) -> Result<&ModelConfig> {
        self.entries
            .get(selector)
            .ok_or_else(|| PipelineError::InvalidSelector {
                requested: selector.clone(),
                available: self.selectors().map(|s| s.to_string()).collect(),
            })
    }

    /// Whether the selector is known
    pub fn contains(&self, selector: &ModelSelector) -> bool {
        self.entries.contains_key(selector)
    }

    /// Selectors in insertion order
    pub fn selectors(&self) -> impl Iterator<Item = &ModelSelector> {
        self.entries.keys()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&ModelSelector, &ModelConfig)> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate every entry
    pub fn validate(&self) -> Result<()> {
        if self.entries.is_empty() {
            return Err(PipelineError::config(
                "configuration table must have at least one entry",
            ));
        }

        for (selector, config) in &self.entries {
            if selector.as_str().trim().is_empty() {
                return Err(PipelineError::config("model selector must not be empty"));
            }
            config.validate().map_err(|e| match e {
                PipelineError::Config(msg) => {
                    PipelineError::Config(format!("model '{}': {}", selector, msg))
                }
                other => other,
            })?;
        }

        Ok(())
    }
}

impl Default for ConfigTable {
    fn default() -> Self {
        Self::presets()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let table = ConfigTable::presets();
        assert_eq!(table.len(), 2);
        assert!(table.contains(&ModelSelector::sd_turbo()));
        assert!(table.contains(&ModelSelector::sdxl_turbo()));
        table.validate().unwrap();

        let order: Vec<_> = table.selectors().map(|s| s.as_str()).collect();
        assert_eq!(order, vec!["sd-turbo", "sdxl-turbo"]);
    }

    #[test]
    fn test_resolve_unknown() {
        let table = ConfigTable::presets();
        let err = table.resolve(&ModelSelector::from("sd-1.5")).unwrap_err();

        match err {
            PipelineError::InvalidSelector {
                requested,
                available,
            } => {
                assert_eq!(requested.as_str(), "sd-1.5");
                assert_eq!(available, vec!["sd-turbo", "sdxl-turbo"]);
            }
            other => panic!("Expected InvalidSelector, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(ConfigTable::new().validate().is_err());
    }

    #[test]
    fn test_invalid_entry_names_model() {
        let table = ConfigTable::single(
            "broken",
            ModelConfig {
                num_inference_steps: 0,
                ..ModelConfig::sd_turbo()
            },
        );
        let err = table.validate().unwrap_err();
        assert!(err.to_string().contains("model 'broken'"));
    }

    #[test]
    fn test_insert_replaces() {
        let mut table = ConfigTable::presets();
        let custom = ModelConfig {
            guidance_scale: 2.0,
            ..ModelConfig::sd_turbo()
        };

        let previous = table.insert(ModelSelector::sd_turbo(), custom.clone());
        assert_eq!(previous, Some(ModelConfig::sd_turbo()));
        assert_eq!(table.get(&ModelSelector::sd_turbo()), Some(&custom));
        assert_eq!(table.len(), 2);
    }
}
