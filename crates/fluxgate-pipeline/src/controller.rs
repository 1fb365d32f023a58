//! Pipeline controller: reconfiguration, admission and generation per frame

use crate::engine::{FrameOf, OutputOf};
use crate::{
    Conditioning, ControllerConfig, DropPolicy, EngineFactory, FrameRepresentation,
    GenerationEngine, InputSchema, ModelConfig, ModelSelector, PipelineInfo, Result,
};
use fluxgate_filter::{Admission, FilterStats, SimilarityFilter};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Parameters for a single `predict` call
#[derive(Debug, Clone)]
pub struct RequestParams<F> {
    /// Prompt to generate with
    pub prompt: String,
    /// Configuration table entry to use
    pub model: ModelSelector,
    /// Raw input frame
    pub frame: F,
}

impl<F> RequestParams<F> {
    /// Create request parameters
    pub fn new(model: impl Into<ModelSelector>, prompt: impl Into<String>, frame: F) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            frame,
        }
    }
}

/// Output of a `predict` call
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction<O> {
    /// The engine generated a new output
    Generated(O),
    /// The frame was dropped and the previous output returned
    Reused(O),
}

impl<O> Prediction<O> {
    /// Borrow the output
    pub fn output(&self) -> &O {
        match self {
            Prediction::Generated(o) | Prediction::Reused(o) => o,
        }
    }

    /// Take the output
    pub fn into_output(self) -> O {
        match self {
            Prediction::Generated(o) | Prediction::Reused(o) => o,
        }
    }

    /// Whether the engine ran for this frame
    pub fn was_generated(&self) -> bool {
        matches!(self, Prediction::Generated(_))
    }
}

/// Reconfiguration performed before a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reconfiguration {
    /// Configuration and conditioning unchanged
    Unchanged,
    /// Conditioning re-committed for a new prompt
    Reconditioned,
    /// Engine rebuilt for a different model
    Reinitialized,
}

/// Controller statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerStats {
    /// `predict` calls
    pub frames: u64,
    /// Frames the engine generated
    pub generated: u64,
    /// Frames answered with the previous output
    pub reused: u64,
    /// Engine constructions after the initial one
    pub reinitializations: u64,
    /// Conditioning commits after the initial one
    pub conditioning_commits: u64,
    /// Calls that returned an error
    pub failures: u64,
}

impl ControllerStats {
    /// Fraction of successful frames answered without the engine
    pub fn reuse_rate(&self) -> f32 {
        let answered = self.generated + self.reused;
        if answered == 0 {
            0.0
        } else {
            self.reused as f32 / answered as f32
        }
    }
}

/// Session state owned by the controller.
///
/// `engine` always belongs to `active_model`, and `last_committed_prompt` is
/// the prompt of the most recent successful commit. All fields are
/// replaced together on a model switch.
#[derive(Debug)]
pub struct PipelineState<E> {
    active_model: ModelSelector,
    model_config: ModelConfig,
    last_committed_prompt: String,
    engine: E,
}

impl<E> PipelineState<E> {
    /// Active model
    pub fn active_model(&self) -> &ModelSelector {
        &self.active_model
    }

    /// Configuration the engine was built from
    pub fn model_config(&self) -> &ModelConfig {
        &self.model_config
    }

    /// Last committed prompt
    pub fn last_committed_prompt(&self) -> &str {
        &self.last_committed_prompt
    }

    /// Loaded engine
    pub fn engine(&self) -> &E {
        &self.engine
    }
}

/// Stateful controller wrapped around a generation engine.
///
/// Per frame it rebuilds the engine when the model changes, re-commits
/// conditioning when only the prompt changes, and consults the similarity
/// filter before paying for a generation call. Reconfiguration is atomic:
/// a failed construction or commit leaves the previous state serving frames.
///
/// `predict` takes `&mut self`; wrap the controller in
/// [`SharedPipeline`](crate::SharedPipeline) when several producers feed one
/// session.
pub struct PipelineController<F: EngineFactory, R = StdRng> {
    config: ControllerConfig,
    factory: F,
    state: PipelineState<F::Engine>,
    filter: SimilarityFilter<R>,
    filter_enabled: bool,
    last_output: Option<OutputOf<F>>,
    stats: ControllerStats,
}

impl<F: EngineFactory> PipelineController<F, StdRng> {
    /// Create a controller, loading the default model and committing the
    /// default prompt
    pub fn new(config: ControllerConfig, factory: F) -> Result<Self> {
        config.validate()?;
        let filter = SimilarityFilter::new(config.filter.clone())?;
        Self::build(config, factory, filter)
    }
}

impl<F: EngineFactory, R: Rng> PipelineController<F, R> {
    /// Create a controller whose filter draws from `rng`
    pub fn with_rng(config: ControllerConfig, factory: F, rng: R) -> Result<Self> {
        config.validate()?;
        let filter = SimilarityFilter::with_rng(config.filter.clone(), rng)?;
        Self::build(config, factory, filter)
    }

    fn build(config: ControllerConfig, factory: F, filter: SimilarityFilter<R>) -> Result<Self> {
        let model = config.default_model.clone();
        let prompt = config.default_prompt.clone();
        let model_config = config.models.resolve(&model)?.clone();

        let engine = load_engine(&factory, &config, &model, &model_config, &prompt)?;
        info!(
            model = %model,
            base_model = %model_config.base_model_id,
            "pipeline initialized"
        );

        Ok(Self {
            filter_enabled: config.filter_enabled,
            state: PipelineState {
                active_model: model,
                model_config,
                last_committed_prompt: prompt,
                engine,
            },
            config,
            factory,
            filter,
            last_output: None,
            stats: ControllerStats::default(),
        })
    }

    /// Process one frame.
    ///
    /// 1. Unknown selector: `InvalidSelector`, nothing changes.
    /// 2. Different model: build and condition a new engine, then swap it in.
    /// 3. Same model, different prompt: re-commit conditioning.
    /// 4. Preprocess, consult the filter, generate or reuse.
    pub fn predict(
        &mut self,
        params: RequestParams<FrameOf<F>>,
    ) -> Result<Prediction<OutputOf<F>>> {
        self.stats.frames += 1;

        let result = self.predict_frame(params);
        if let Err(e) = &result {
            self.stats.failures += 1;
            warn!(code = e.error_code(), error = %e, "predict failed");
        }
        result
    }

    fn predict_frame(
        &mut self,
        params: RequestParams<FrameOf<F>>,
    ) -> Result<Prediction<OutputOf<F>>> {
        let reconfiguration = self.reconfigure(&params.model, &params.prompt)?;

        let repr = self.state.engine.preprocess(&params.frame)?;

        let admission = if self.filter_enabled {
            Some(self.filter.admit(repr.features()))
        } else {
            None
        };

        if let Some(Admission::Drop { score }) = admission {
            // A reconfigured engine must produce at least one fresh frame
            if self.config.drop_policy == DropPolicy::ReuseLast
                && reconfiguration == Reconfiguration::Unchanged
            {
                if let Some(previous) = &self.last_output {
                    debug!(score, "frame dropped, reusing previous output");
                    self.stats.reused += 1;
                    return Ok(Prediction::Reused(previous.clone()));
                }
            }
            debug!(score, policy = ?self.config.drop_policy, "frame dropped, generating anyway");
        }

        let output = self.state.engine.generate(&repr, &params.prompt)?;
        self.last_output = Some(output.clone());
        self.stats.generated += 1;

        Ok(Prediction::Generated(output))
    }

    /// Bring the engine in line with the requested model and prompt
    fn reconfigure(&mut self, model: &ModelSelector, prompt: &str) -> Result<Reconfiguration> {
        let model_config = self.config.models.resolve(model)?;

        if *model != self.state.active_model {
            info!(
                from = %self.state.active_model,
                to = %model,
                base_model = %model_config.base_model_id,
                steps = model_config.num_inference_steps,
                "switching model"
            );

            let engine = load_engine(&self.factory, &self.config, model, model_config, prompt)?;

            // Old engine is dropped here, after the replacement is ready
            self.state = PipelineState {
                active_model: model.clone(),
                model_config: model_config.clone(),
                last_committed_prompt: prompt.to_string(),
                engine,
            };
            self.last_output = None;
            self.stats.reinitializations += 1;
            self.stats.conditioning_commits += 1;
            return Ok(Reconfiguration::Reinitialized);
        }

        if prompt != self.state.last_committed_prompt {
            debug!(model = %model, "prompt changed, re-committing conditioning");

            self.state
                .engine
                .commit_conditioning(&Conditioning::for_model(prompt, model_config))?;

            self.state.last_committed_prompt = prompt.to_string();
            self.last_output = None;
            self.stats.conditioning_commits += 1;
            return Ok(Reconfiguration::Reconditioned);
        }

        Ok(Reconfiguration::Unchanged)
    }

    /// Change the filter threshold without resetting its history
    pub fn set_filter_threshold(&mut self, threshold: f32) -> Result<()> {
        self.filter.set_threshold(threshold)?;
        self.config.filter.threshold = threshold;
        info!(threshold, "filter threshold updated");
        Ok(())
    }

    /// Enable or disable the similarity filter
    pub fn set_filter_enabled(&mut self, enabled: bool) {
        if self.filter_enabled != enabled {
            // Stale history would compare against a frame from before the gap
            self.filter.reset();
        }
        self.filter_enabled = enabled;
    }

    /// Whether the similarity filter is consulted
    pub fn filter_enabled(&self) -> bool {
        self.filter_enabled
    }

    /// Active model
    pub fn active_model(&self) -> &ModelSelector {
        &self.state.active_model
    }

    /// Last committed prompt
    pub fn last_committed_prompt(&self) -> &str {
        &self.state.last_committed_prompt
    }

    /// Configuration of the active model
    pub fn active_config(&self) -> &ModelConfig {
        &self.state.model_config
    }

    /// Session state
    pub fn state(&self) -> &PipelineState<F::Engine> {
        &self.state
    }

    /// Controller configuration
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Controller statistics
    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    /// Similarity filter statistics
    pub fn filter_stats(&self) -> FilterStats {
        self.filter.stats()
    }

    /// Descriptive information
    pub fn info(&self) -> PipelineInfo {
        PipelineInfo::default()
    }

    /// Accepted parameter schema
    pub fn input_schema(&self) -> InputSchema {
        InputSchema::from_config(&self.config)
    }
}

/// Construct an engine and commit its first conditioning.
///
/// Nothing is returned unless both steps succeed.
fn load_engine<F: EngineFactory>(
    factory: &F,
    config: &ControllerConfig,
    model: &ModelSelector,
    model_config: &ModelConfig,
    prompt: &str,
) -> Result<F::Engine> {
    let mut engine = factory.construct(model, model_config, &config.engine)?;
    engine.commit_conditioning(&Conditioning::for_model(prompt, model_config))?;
    Ok(engine)
}
