//! Scripted frame streams over the synthetic engine
//!
//! Drives a [`SharedPipeline`] with a camera-like sequence of gradient frames
//! (slow drift, optional hard cuts, an optional model switch and prompt
//! change) and reports what the controller and filter did.

use fluxgate_filter::FilterStats;
use fluxgate_pipeline::testing::{SyntheticFactory, SyntheticFrame};
use fluxgate_pipeline::{ControllerStats, ModelSelector, RequestParams, Result, SharedPipeline};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

/// Script for a simulated stream
#[derive(Debug, Clone)]
pub struct StreamScript {
    /// Frames to send
    pub frames: u64,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Phase drift per frame; 0 gives a perfectly static scene
    pub motion: f32,
    /// Insert a hard scene cut every N frames
    pub cut_every: Option<u64>,
    /// Model requested at the start
    pub model: ModelSelector,
    /// Prompt requested at the start
    pub prompt: String,
    /// Switch to another model at this frame index
    pub switch: Option<(u64, ModelSelector)>,
    /// Change the prompt at this frame index
    pub reprompt: Option<(u64, String)>,
}

impl Default for StreamScript {
    fn default() -> Self {
        Self {
            frames: 300,
            width: 64,
            height: 64,
            motion: 0.001,
            cut_every: None,
            model: ModelSelector::sdxl_turbo(),
            prompt: fluxgate_pipeline::DEFAULT_PROMPT.into(),
            switch: None,
            reprompt: None,
        }
    }
}

impl StreamScript {
    /// Request for frame `index`
    pub fn request(&self, index: u64) -> RequestParams<SyntheticFrame> {
        let model = match &self.switch {
            Some((at, model)) if index >= *at => model.clone(),
            _ => self.model.clone(),
        };
        let prompt = match &self.reprompt {
            Some((at, prompt)) if index >= *at => prompt.clone(),
            _ => self.prompt.clone(),
        };

        let cuts = self.cut_every.filter(|&n| n > 0).map_or(0, |n| index / n);
        let phase = index as f32 * self.motion + cuts as f32 * 2.0;

        RequestParams::new(
            model,
            prompt,
            SyntheticFrame::gradient(self.width, self.height, phase),
        )
    }

    /// Requests for the whole stream
    pub fn requests(&self) -> impl Iterator<Item = RequestParams<SyntheticFrame>> + '_ {
        (0..self.frames).map(move |i| self.request(i))
    }
}

/// Outcome of a simulated stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationReport {
    /// Controller counters
    pub controller: ControllerStats,
    /// Filter counters
    pub filter: FilterStats,
    /// Model active at the end
    pub active_model: ModelSelector,
    /// Engine constructions, including the initial one
    pub engine_constructions: usize,
    /// Conditioning commits issued, including the initial one
    pub engine_commits: usize,
    /// Generation calls issued
    pub engine_generations: usize,
    /// Wall-clock duration
    pub elapsed_ms: u64,
}

/// Play `script` through `pipeline`, stopping at the first error
pub async fn run(
    pipeline: &SharedPipeline<SyntheticFactory>,
    factory: &SyntheticFactory,
    script: &StreamScript,
) -> Result<SimulationReport> {
    info!(
        frames = script.frames,
        model = %script.model,
        motion = script.motion,
        "starting simulated stream"
    );
    let start = Instant::now();

    for (index, params) in script.requests().enumerate() {
        let prediction = pipeline.predict(params).await?;
        debug!(
            index,
            generated = prediction.was_generated(),
            sequence = prediction.output().sequence,
            "frame"
        );
    }

    let log = factory.log();
    let report = SimulationReport {
        controller: pipeline.stats().await,
        filter: pipeline.filter_stats().await,
        active_model: pipeline.active_model().await,
        engine_constructions: log.constructions(),
        engine_commits: log.commits(),
        engine_generations: log.generations(),
        elapsed_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        generated = report.controller.generated,
        reused = report.controller.reused,
        reuse_rate = report.controller.reuse_rate(),
        "simulated stream finished"
    );
    Ok(report)
}
