use anyhow::{Context, Result};
use iris_dnn::config::{load_config, PipelineConfig};
use iris_dnn::pipeline::{self, format_accuracy};

// Picked up from the working directory when no path is given.
const DEFAULT_CONFIG: &str = "iris_dnn.json";

// Optional first argument: path to a JSON pipeline configuration.
fn config_from_args(args: &[String]) -> Result<PipelineConfig> {
    match args.get(1) {
        Some(path) => load_config(path).with_context(|| format!("failed to load config {}", path)),
        None => PipelineConfig::load_or_default(DEFAULT_CONFIG)
            .with_context(|| format!("failed to load config {}", DEFAULT_CONFIG)),
    }
}

fn init_logging() {
    // RUST_LOG overrides the default filter; a second init (tests) is ignored.
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

// Load, train, evaluate; returns the line to print.
fn run(args: &[String]) -> Result<String> {
    let config = config_from_args(args)?;
    let report = pipeline::run(&config).context("iris pipeline failed")?;
    Ok(format_accuracy(report.accuracy()))
}

fn main() -> Result<()> {
    init_logging();
    let args: Vec<String> = std::env::args().collect();
    println!("{}", run(&args)?);
    Ok(())
}
