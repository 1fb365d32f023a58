//! Fluxgate stream simulator
//!
//! Plays a synthetic camera stream through the pipeline controller and prints
//! the resulting statistics as JSON.
//!
//! ## Usage
//!
//! ```bash
//! # Slowly drifting scene on the default model
//! fluxgate-sim --frames 600
//!
//! # Static scene, switch to sd-turbo halfway
//! fluxgate-sim --motion 0 --switch-model sd-turbo --switch-at 300
//!
//! # Custom configuration table, advisory drops, fixed seed
//! fluxgate-sim --config fluxgate.json --advisory --seed 7
//! ```

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use fluxgate::pipeline::testing::SyntheticFactory;
use fluxgate::simulation::{self, StreamScript};
use fluxgate::{ControllerConfig, DropPolicy, ModelSelector, PipelineController, SharedPipeline};

#[derive(Parser, Debug)]
#[command(name = "fluxgate-sim")]
#[command(author = "Daemoniorum LLC")]
#[command(version)]
#[command(about = "Simulate a real-time img2img stream through Fluxgate", long_about = None)]
struct Args {
    /// Controller configuration file (JSON)
    #[arg(short, long)]
    config: Option<String>,

    /// Frames to send
    #[arg(short, long, default_value = "300")]
    frames: u64,

    /// Synthetic frame width
    #[arg(long, default_value = "64")]
    width: u32,

    /// Synthetic frame height
    #[arg(long, default_value = "64")]
    height: u32,

    /// Scene drift per frame (0 = static scene)
    #[arg(long, default_value = "0.001")]
    motion: f32,

    /// Hard scene cut every N frames
    #[arg(long)]
    cut_every: Option<u64>,

    /// Model to start with (defaults to the configuration's default model)
    #[arg(short, long)]
    model: Option<String>,

    /// Prompt to start with (defaults to the configuration's default prompt)
    #[arg(short, long)]
    prompt: Option<String>,

    /// Model to switch to
    #[arg(long)]
    switch_model: Option<String>,

    /// Frame index of the model switch
    #[arg(long, default_value = "0")]
    switch_at: u64,

    /// Prompt to change to
    #[arg(long)]
    reprompt: Option<String>,

    /// Frame index of the prompt change
    #[arg(long, default_value = "0")]
    reprompt_at: u64,

    /// Filter threshold override
    #[arg(long)]
    threshold: Option<f32>,

    /// Disable the similarity filter
    #[arg(long)]
    no_filter: bool,

    /// Count drops but always generate
    #[arg(long)]
    advisory: bool,

    /// Filter RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path);
            ControllerConfig::from_json_file(path)?
        }
        None => ControllerConfig::default(),
    };

    if let Some(threshold) = args.threshold {
        config.filter.threshold = threshold;
    }
    if let Some(seed) = args.seed {
        config.filter.seed = Some(seed);
    }
    if args.no_filter {
        config.filter_enabled = false;
    }
    if args.advisory {
        config.drop_policy = DropPolicy::Advisory;
    }

    let script = StreamScript {
        frames: args.frames,
        width: args.width,
        height: args.height,
        motion: args.motion,
        cut_every: args.cut_every,
        model: args
            .model
            .map(ModelSelector::from)
            .unwrap_or_else(|| config.default_model.clone()),
        prompt: args.prompt.unwrap_or_else(|| config.default_prompt.clone()),
        switch: args
            .switch_model
            .map(|m| (args.switch_at, ModelSelector::from(m))),
        reprompt: args.reprompt.map(|p| (args.reprompt_at, p)),
    };

    info!("Fluxgate simulator");
    info!(
        "  Models:    {:?}",
        config.models.selectors().map(|s| s.as_str()).collect::<Vec<_>>()
    );
    info!(
        "  Filter:    {}",
        if config.filter_enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    info!("  Threshold: {}", config.filter.threshold);
    info!("  Drops:     {:?}", config.drop_policy);

    let factory = SyntheticFactory::new();
    let controller = PipelineController::new(config, factory.clone())?;
    let pipeline = SharedPipeline::new(controller);

    let report = simulation::run(&pipeline, &factory, &script).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
