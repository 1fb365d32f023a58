//! Synthetic engine for tests and simulations.
//!
//! The engine records every collaborator call in a shared [`CallLog`] and
//! fails on demand through [`Faults`], so reconfiguration counts and failure
//! atomicity can be asserted without a GPU.
//!
//! # Feature Gate
//!
//! Available when the `testing` feature is enabled, or when running tests.
//!
//! ```toml
//! [dev-dependencies]
//! fluxgate-pipeline = { version = "...", features = ["testing"] }
//! ```

use crate::{
    Conditioning, EngineError, EngineFactory, EngineOptions, EngineResult, GenerationEngine,
    ModelConfig, ModelSelector,
};
use std::collections::HashSet;
use std::f32::consts::PI;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A recorded collaborator call
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    /// Engine constructed
    Construct {
        model: ModelSelector,
        base_model_id: String,
    },
    /// Conditioning committed
    Commit {
        model: ModelSelector,
        conditioning: Conditioning,
    },
    /// Frame preprocessed
    Preprocess { model: ModelSelector },
    /// Output generated
    Generate {
        model: ModelSelector,
        prompt: String,
    },
}

/// Shared, cloneable log of engine calls
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<EngineCall>>>,
}

impl CallLog {
    fn push(&self, call: EngineCall) {
        lock(&self.calls).push(call);
    }

    /// All calls in order
    pub fn calls(&self) -> Vec<EngineCall> {
        lock(&self.calls).clone()
    }

    /// Forget recorded calls
    pub fn clear(&self) {
        lock(&self.calls).clear();
    }

    fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        lock(&self.calls).iter().filter(|c| pred(c)).count()
    }

    /// Number of engine constructions
    pub fn constructions(&self) -> usize {
        self.count(|c| matches!(c, EngineCall::Construct { .. }))
    }

    /// Number of conditioning commits
    pub fn commits(&self) -> usize {
        self.count(|c| matches!(c, EngineCall::Commit { .. }))
    }

    /// Number of preprocess calls
    pub fn preprocesses(&self) -> usize {
        self.count(|c| matches!(c, EngineCall::Preprocess { .. }))
    }

    /// Number of generation calls
    pub fn generations(&self) -> usize {
        self.count(|c| matches!(c, EngineCall::Generate { .. }))
    }

    /// Most recently committed conditioning
    pub fn last_conditioning(&self) -> Option<Conditioning> {
        lock(&self.calls).iter().rev().find_map(|c| match c {
            EngineCall::Commit { conditioning, .. } => Some(conditioning.clone()),
            _ => None,
        })
    }
}

#[derive(Debug, Default)]
struct FaultPlan {
    construct: HashSet<ModelSelector>,
    prompts: HashSet<String>,
    generation: bool,
}

/// Shared switchboard of injected failures
#[derive(Debug, Clone, Default)]
pub struct Faults {
    plan: Arc<Mutex<FaultPlan>>,
}

impl Faults {
    /// Fail every construction of `model`
    pub fn fail_construct(&self, model: ModelSelector) {
        lock(&self.plan).construct.insert(model);
    }

    /// Fail every conditioning commit of `prompt`
    pub fn fail_prompt(&self, prompt: impl Into<String>) {
        lock(&self.plan).prompts.insert(prompt.into());
    }

    /// Fail generation calls while set
    pub fn fail_generation(&self, fail: bool) {
        lock(&self.plan).generation = fail;
    }

    /// Remove all injected failures
    pub fn clear(&self) {
        *lock(&self.plan) = FaultPlan::default();
    }
}

/// Raw RGB frame
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticFrame {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Interleaved RGB bytes
    pub pixels: Vec<u8>,
}

impl SyntheticFrame {
    /// Frame with every channel set to `level`
    pub fn uniform(width: u32, height: u32, level: u8) -> Self {
        Self {
            width,
            height,
            pixels: vec![level; (width * height * 3) as usize],
        }
    }

    /// Diagonal gradient shifted by `phase`; nearby phases give similar frames
    pub fn gradient(width: u32, height: u32, phase: f32) -> Self {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                let t = (x as f32 / width as f32 + y as f32 / height as f32) * PI;
                for channel in 0..3 {
                    let v = (t + phase + channel as f32).sin() * 0.5 + 0.5;
                    pixels.push((v * 255.0) as u8);
                }
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }
}

/// Output of the synthetic engine
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticImage {
    /// Model that produced the image
    pub model: ModelSelector,
    /// Prompt used
    pub prompt: String,
    /// Per-engine generation counter
    pub sequence: u64,
    /// Output width
    pub width: u32,
    /// Output height
    pub height: u32,
}

/// Engine instance bound to one configuration
#[derive(Debug)]
pub struct SyntheticEngine {
    model: ModelSelector,
    config: ModelConfig,
    conditioning: Option<Conditioning>,
    sequence: u64,
    log: CallLog,
    faults: Faults,
}

impl SyntheticEngine {
    /// Model this engine was built for
    pub fn model(&self) -> &ModelSelector {
        &self.model
    }

    /// Configuration this engine was built from
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Currently committed conditioning
    pub fn conditioning(&self) -> Option<&Conditioning> {
        self.conditioning.as_ref()
    }
}

impl GenerationEngine for SyntheticEngine {
    type Frame = SyntheticFrame;
    type Repr = Vec<f32>;
    type Output = SyntheticImage;

    fn commit_conditioning(&mut self, conditioning: &Conditioning) -> EngineResult<()> {
        self.log.push(EngineCall::Commit {
            model: self.model.clone(),
            conditioning: conditioning.clone(),
        });

        if lock(&self.faults.plan).prompts.contains(&conditioning.prompt) {
            return Err(EngineError::Conditioning(format!(
                "prompt rejected: {}",
                conditioning.prompt
            )));
        }

        self.conditioning = Some(conditioning.clone());
        Ok(())
    }

    fn preprocess(&mut self, frame: &SyntheticFrame) -> EngineResult<Vec<f32>> {
        self.log.push(EngineCall::Preprocess {
            model: self.model.clone(),
        });

        let expected = frame.width as usize * frame.height as usize * 3;
        if expected == 0 || frame.pixels.len() != expected {
            return Err(EngineError::FrameFormat(format!(
                "{}x{} RGB frame needs {} bytes, got {}",
                frame.width,
                frame.height,
                expected,
                frame.pixels.len()
            )));
        }

        Ok(frame
            .pixels
            .iter()
            .map(|&p| p as f32 / 127.5 - 1.0)
            .collect())
    }

    fn generate(&mut self, _repr: &Vec<f32>, prompt: &str) -> EngineResult<SyntheticImage> {
        self.log.push(EngineCall::Generate {
            model: self.model.clone(),
            prompt: prompt.to_string(),
        });

        if lock(&self.faults.plan).generation {
            return Err(EngineError::Generation("injected backend fault".into()));
        }

        match &self.conditioning {
            Some(c) if c.prompt == prompt => {}
            _ => {
                return Err(EngineError::Generation(format!(
                    "conditioning not prepared for prompt: {}",
                    prompt
                )))
            }
        }

        self.sequence += 1;
        Ok(SyntheticImage {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            sequence: self.sequence,
            width: self.config.width,
            height: self.config.height,
        })
    }
}

/// Factory producing [`SyntheticEngine`]s that share one log and fault plan
#[derive(Debug, Clone, Default)]
pub struct SyntheticFactory {
    log: CallLog,
    faults: Faults,
}

impl SyntheticFactory {
    /// Create a factory with an empty log and no faults
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared call log
    pub fn log(&self) -> &CallLog {
        &self.log
    }

    /// Shared fault switchboard
    pub fn faults(&self) -> &Faults {
        &self.faults
    }
}

impl EngineFactory for SyntheticFactory {
    type Engine = SyntheticEngine;

    fn construct(
        &self,
        model: &ModelSelector,
        config: &ModelConfig,
        _options: &EngineOptions,
    ) -> EngineResult<SyntheticEngine> {
        self.log.push(EngineCall::Construct {
            model: model.clone(),
            base_model_id: config.base_model_id.clone(),
        });

        if lock(&self.faults.plan).construct.contains(model) {
            return Err(EngineError::Init {
                model: model.clone(),
                reason: format!("weights unavailable: {}", config.base_model_id),
            });
        }

        Ok(SyntheticEngine {
            model: model.clone(),
            config: config.clone(),
            conditioning: None,
            sequence: 0,
            log: self.log.clone(),
            faults: self.faults.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_requires_conditioning() {
        let factory = SyntheticFactory::new();
        let mut engine = factory
            .construct(
                &ModelSelector::sd_turbo(),
                &ModelConfig::sd_turbo(),
                &EngineOptions::default(),
            )
            .unwrap();

        let repr = engine.preprocess(&SyntheticFrame::uniform(4, 4, 0)).unwrap();
        assert!(engine.generate(&repr, "a cat").is_err());

        engine
            .commit_conditioning(&Conditioning::for_model("a cat", &ModelConfig::sd_turbo()))
            .unwrap();
        assert_eq!(engine.conditioning().unwrap().prompt, "a cat");
        let image = engine.generate(&repr, "a cat").unwrap();
        assert_eq!(image.sequence, 1);
        assert_eq!(engine.config().base_model_id, "stabilityai/sd-turbo");
        assert_eq!((image.width, image.height), (512, 512));
    }

    #[test]
    fn test_preprocess_range() {
        let factory = SyntheticFactory::new();
        let mut engine = factory
            .construct(
                &ModelSelector::sd_turbo(),
                &ModelConfig::sd_turbo(),
                &EngineOptions::default(),
            )
            .unwrap();

        let black = engine.preprocess(&SyntheticFrame::uniform(2, 2, 0)).unwrap();
        let white = engine.preprocess(&SyntheticFrame::uniform(2, 2, 255)).unwrap();
        assert_eq!(black.len(), 12);
        assert!(black.iter().all(|&v| (v + 1.0).abs() < 1e-6));
        assert!(white.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_gradient_phases() {
        let a = SyntheticFrame::gradient(16, 16, 0.0);
        let b = SyntheticFrame::gradient(16, 16, 0.01);
        let c = SyntheticFrame::gradient(16, 16, 2.0);

        assert_eq!(a.pixels.len(), 16 * 16 * 3);
        let diff = |x: &SyntheticFrame, y: &SyntheticFrame| {
            x.pixels
                .iter()
                .zip(&y.pixels)
                .map(|(&p, &q)| (p as i32 - q as i32).abs())
                .sum::<i32>()
        };
        assert!(diff(&a, &b) < diff(&a, &c));
    }

    #[test]
    fn test_faults_and_log() {
        let factory = SyntheticFactory::new();
        factory.faults().fail_construct(ModelSelector::sdxl_turbo());

        let result = factory.construct(
            &ModelSelector::sdxl_turbo(),
            &ModelConfig::sdxl_turbo(),
            &EngineOptions::default(),
        );
        assert!(matches!(result, Err(EngineError::Init { .. })));
        assert_eq!(factory.log().constructions(), 1);

        factory.faults().clear();
        factory.log().clear();
        assert!(factory
            .construct(
                &ModelSelector::sdxl_turbo(),
                &ModelConfig::sdxl_turbo(),
                &EngineOptions::default(),
            )
            .is_ok());
        assert_eq!(factory.log().calls().len(), 1);
    }
}
