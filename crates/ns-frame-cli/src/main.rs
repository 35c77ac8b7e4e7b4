//! ns-frame CLI

mod report;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use ns_frame::{
    AnalysisConfig, EventStore, HistogramWriter, JsonContainer, SeededDeviates, event_count,
    run_analysis,
};

#[derive(Parser)]
#[command(name = "ns-frame")]
#[command(about = "ns-frame - generate events, derive kinematics, fill histograms in one pass")]
#[command(version)]
struct Cli {
    /// Number of events to generate
    #[arg(default_value = "10000", allow_negative_numbers = true)]
    events: i64,

    /// RNG seed. Overrides the seed from `--config`.
    #[arg(long)]
    seed: Option<u64>,

    /// Output histogram container (JSON). Overwritten if it exists.
    #[arg(short, long, default_value = "analysis.json")]
    output: PathBuf,

    /// Analysis config (JSON): seed, recoil vector, histogram binning.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: tracing::Level,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let n_events = event_count(cli.events)?;

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    tracing::info!(events = n_events, seed = config.seed, "generating events");
    let events = EventStore::generate(n_events, &mut SeededDeviates::new(config.seed))?;

    let result = run_analysis(&events, &config)?;
    tracing::info!(rows = result.summary.rows, "analysis complete");

    write_container(&cli.output, &result)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;

    print!("{}", report::render(&cli.output, n_events, &result));
    Ok(())
}

fn load_config(path: &Path) -> Result<AnalysisConfig> {
    tracing::info!(path = %path.display(), "loading analysis config");
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: AnalysisConfig = serde_json::from_str(&json)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    Ok(config)
}

fn write_container(path: &Path, result: &ns_frame::AnalysisResult) -> Result<()> {
    let mut container = JsonContainer::create(path)?;
    for h in result.histograms() {
        container.write(h.name(), h)?;
    }
    container.close()?;
    Ok(())
}
