//! Async handle that serializes access to one controller

use crate::engine::{FrameOf, OutputOf};
use crate::{
    ControllerStats, EngineFactory, ModelSelector, PipelineController, PipelineError, Prediction,
    RequestParams, Result,
};
use fluxgate_filter::FilterStats;
use rand::rngs::StdRng;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::error;

/// Cloneable handle to a [`PipelineController`] shared by several producers.
///
/// Calls are serialized: one `predict` runs to completion, reconfiguration
/// included, before the next starts. Engine calls block, so they run on the
/// blocking thread pool while the lock is held.
pub struct SharedPipeline<F: EngineFactory, R = StdRng> {
    inner: Arc<Mutex<PipelineController<F, R>>>,
}

impl<F: EngineFactory, R> Clone for SharedPipeline<F, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F, R> SharedPipeline<F, R>
where
    F: EngineFactory + Send + 'static,
    F::Engine: Send + 'static,
    FrameOf<F>: Send + 'static,
    OutputOf<F>: Send + 'static,
    R: Rng + Send + 'static,
{
    /// Wrap a controller
    pub fn new(controller: PipelineController<F, R>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    /// Process one frame once every earlier call has finished
    pub async fn predict(
        &self,
        params: RequestParams<FrameOf<F>>,
    ) -> Result<Prediction<OutputOf<F>>> {
        let mut guard = Arc::clone(&self.inner).lock_owned().await;

        tokio::task::spawn_blocking(move || guard.predict(params))
            .await
            .map_err(|e| {
                error!(error = %e, "predict task failed");
                PipelineError::TaskFailed(e.to_string())
            })?
    }

    /// Change the filter threshold
    pub async fn set_filter_threshold(&self, threshold: f32) -> Result<()> {
        self.inner.lock().await.set_filter_threshold(threshold)
    }

    /// Enable or disable the similarity filter
    pub async fn set_filter_enabled(&self, enabled: bool) {
        self.inner.lock().await.set_filter_enabled(enabled);
    }

    /// Active model
    pub async fn active_model(&self) -> ModelSelector {
        self.inner.lock().await.active_model().clone()
    }

    /// Controller statistics
    pub async fn stats(&self) -> ControllerStats {
        self.inner.lock().await.stats()
    }

    /// Similarity filter statistics
    pub async fn filter_stats(&self) -> FilterStats {
        self.inner.lock().await.filter_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{EngineCall, SyntheticFactory, SyntheticFrame};
    use crate::ControllerConfig;

    fn shared() -> (SharedPipeline<SyntheticFactory>, SyntheticFactory) {
        let factory = SyntheticFactory::new();
        let config = ControllerConfig {
            filter_enabled: false,
            ..Default::default()
        };
        let controller = PipelineController::new(config, factory.clone()).unwrap();
        (SharedPipeline::new(controller), factory)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_are_serialized() {
        let (pipeline, factory) = shared();
        factory.log().clear();

        let mut handles = Vec::new();
        for i in 0..16 {
            let pipeline = pipeline.clone();
            handles.push(tokio::spawn(async move {
                let model = if i % 2 == 0 { "sd-turbo" } else { "sdxl-turbo" };
                let prompt = format!("prompt {}", i);
                let out = pipeline
                    .predict(RequestParams::new(
                        model,
                        prompt.clone(),
                        SyntheticFrame::uniform(8, 8, i as u8),
                    ))
                    .await
                    .unwrap();
                assert_eq!(out.output().prompt, prompt);
                assert_eq!(out.output().model.as_str(), model);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stats = pipeline.stats().await;
        assert_eq!(stats.frames, 16);
        assert_eq!(stats.generated, 16);
        assert_eq!(stats.failures, 0);

        // Every generation runs on the engine that last committed its prompt
        let calls = factory.log().calls();
        let mut committed: Option<String> = None;
        for call in &calls {
            match call {
                EngineCall::Commit { conditioning, .. } => {
                    committed = Some(conditioning.prompt.clone())
                }
                EngineCall::Generate { prompt, .. } => {
                    assert_eq!(committed.as_deref(), Some(prompt.as_str()))
                }
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn test_errors_pass_through() {
        let (pipeline, _factory) = shared();

        let err = pipeline
            .predict(RequestParams::new(
                "unknown",
                "x",
                SyntheticFrame::uniform(8, 8, 0),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidSelector { .. }));
        assert_eq!(pipeline.active_model().await, ModelSelector::sdxl_turbo());
        assert_eq!(pipeline.stats().await.failures, 1);
    }

    #[tokio::test]
    async fn test_live_controls() {
        let (pipeline, _factory) = shared();

        pipeline.set_filter_enabled(true).await;
        pipeline.set_filter_threshold(0.5).await.unwrap();
        assert!(pipeline.set_filter_threshold(2.0).await.is_err());

        pipeline
            .predict(RequestParams::new(
                "sdxl-turbo",
                crate::DEFAULT_PROMPT,
                SyntheticFrame::uniform(8, 8, 0),
            ))
            .await
            .unwrap();
        assert_eq!(pipeline.filter_stats().await.evaluated, 1);
    }
}
