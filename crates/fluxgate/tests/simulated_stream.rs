//! Simulated streams through the shared pipeline

#![cfg(feature = "testing")]

use fluxgate::pipeline::testing::SyntheticFactory;
use fluxgate::simulation::{self, StreamScript};
use fluxgate::{
    ControllerConfig, DropPolicy, FilterConfig, ModelSelector, PipelineController, SharedPipeline,
};

fn pipeline(config: ControllerConfig) -> (SharedPipeline<SyntheticFactory>, SyntheticFactory) {
    let factory = SyntheticFactory::new();
    let controller = PipelineController::new(config, factory.clone()).unwrap();
    (SharedPipeline::new(controller), factory)
}

fn filtered(threshold: f32, policy: DropPolicy) -> ControllerConfig {
    ControllerConfig {
        filter: FilterConfig::default().with_threshold(threshold).with_seed(11),
        drop_policy: policy,
        ..Default::default()
    }
}

#[tokio::test]
async fn static_scene_saves_generations() {
    let (pipeline, factory) = pipeline(filtered(0.98, DropPolicy::ReuseLast));
    let script = StreamScript {
        frames: 400,
        motion: 0.0,
        ..Default::default()
    };

    let report = simulation::run(&pipeline, &factory, &script).await.unwrap();

    assert_eq!(report.controller.frames, 400);
    assert_eq!(
        report.controller.generated + report.controller.reused,
        400
    );
    assert!(report.controller.reused > 150, "{:?}", report.controller);
    assert_eq!(report.engine_generations as u64, report.controller.generated);
    assert_eq!(report.engine_constructions, 1);
}

#[tokio::test]
async fn advisory_policy_generates_every_frame() {
    let (pipeline, factory) = pipeline(filtered(0.98, DropPolicy::Advisory));
    let script = StreamScript {
        frames: 200,
        motion: 0.0,
        ..Default::default()
    };

    let report = simulation::run(&pipeline, &factory, &script).await.unwrap();

    assert_eq!(report.controller.generated, 200);
    assert_eq!(report.controller.reused, 0);
    assert!(report.filter.dropped > 0);
}

#[tokio::test]
async fn switch_and_reprompt_mid_stream() {
    let (pipeline, factory) = pipeline(filtered(0.98, DropPolicy::ReuseLast));
    let script = StreamScript {
        frames: 100,
        switch: Some((40, ModelSelector::sd_turbo())),
        reprompt: Some((70, "a harbour at night".into())),
        ..Default::default()
    };

    let report = simulation::run(&pipeline, &factory, &script).await.unwrap();

    assert_eq!(report.active_model, ModelSelector::sd_turbo());
    assert_eq!(report.controller.reinitializations, 1);
    assert_eq!(report.controller.conditioning_commits, 2);
    assert_eq!(report.engine_constructions, 2);
    assert_eq!(report.engine_commits, 3);
}

#[tokio::test]
async fn unknown_model_stops_the_stream() {
    let (pipeline, factory) = pipeline(ControllerConfig::default());
    let script = StreamScript {
        frames: 10,
        switch: Some((5, ModelSelector::from("sd-1.5"))),
        ..Default::default()
    };

    let err = simulation::run(&pipeline, &factory, &script)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "FG-INVALID-SELECTOR");
    assert_eq!(pipeline.stats().await.frames, 6);
    assert_eq!(pipeline.active_model().await, ModelSelector::sdxl_turbo());
}

#[test]
fn report_serializes() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let (pipeline, factory) = pipeline(ControllerConfig::default());
    let script = StreamScript {
        frames: 5,
        ..Default::default()
    };

    let report = runtime
        .block_on(simulation::run(&pipeline, &factory, &script))
        .unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["controller"]["frames"], 5);
    assert_eq!(json["active_model"], "sdxl-turbo");
}
