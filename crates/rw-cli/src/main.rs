//! mcreweight CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use rw_inference::weights::WeightCalculator;
use serde::Deserialize;
use std::path::{Path, PathBuf};

mod run;

#[derive(Parser)]
#[command(name = "mcreweight")]
#[command(about = "mcreweight - classifier-based multivariate MC reweighting")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate, train, reweight, and write weights plus diagnostics artifacts
    Run {
        /// Run config (YAML, or JSON by extension)
        #[arg(short, long)]
        config: PathBuf,

        /// Output directory (`weights.json`, `artifacts/reweight.json`)
        #[arg(long)]
        out_dir: PathBuf,

        /// Zero timestamps so repeated runs produce identical files.
        #[arg(long)]
        deterministic: bool,

        /// Threads (0 = auto). Overrides the config value.
        #[arg(long)]
        threads: Option<usize>,
    },

    /// Write the configured toy data/MC samples as JSON
    Generate {
        /// Run config (YAML, or JSON by extension); only `toy` is used
        #[arg(short, long)]
        config: PathBuf,

        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert classifier probabilities `P(MC | x)` into odds weights
    Weights {
        /// JSON array of probabilities, or `{"probabilities": [...]}`
        #[arg(short, long)]
        input: PathBuf,

        /// Clamp probabilities to `[eps, 1 - eps]` first
        #[arg(long)]
        clip_epsilon: Option<f64>,

        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Run { config, out_dir, deterministic, threads } => {
            cmd_run(&config, &out_dir, deterministic, threads)
        }
        Commands::Generate { config, output } => cmd_generate(&config, output.as_ref()),
        Commands::Weights { input, clip_epsilon, output } => {
            cmd_weights(&input, clip_epsilon, output.as_ref())
        }
        Commands::Version => {
            println!("mcreweight {}", rw_core::VERSION);
            Ok(())
        }
    }
}

fn setup_threads(threads: usize) {
    if threads > 0 {
        // Best-effort; if a global pool already exists, keep going.
        let _ = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global();
    }
}

fn cmd_run(config: &Path, out_dir: &Path, deterministic: bool, threads: Option<usize>) -> Result<()> {
    tracing::info!(path = %config.display(), "loading run config");
    let mut cfg = run::read_run_config(config)?;
    if let Some(t) = threads {
        cfg.threads = t;
    }
    cfg.deterministic |= deterministic;
    setup_threads(cfg.threads);

    let config_dir = config.parent().unwrap_or_else(|| Path::new("."));
    let summary = run::run(&cfg, config_dir, out_dir)?;
    write_json(None, summary)
}

fn cmd_generate(config: &Path, output: Option<&PathBuf>) -> Result<()> {
    let cfg = run::read_run_config(config)?;
    let samples = rw_inference::toys::generate(&cfg.pipeline.toy)?;
    tracing::info!(n_data = samples.data.len(), n_mc = samples.mc.len(), "toy samples generated");
    write_json(output, serde_json::to_value(&samples)?)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProbabilitiesInput {
    Bare(Vec<f64>),
    Wrapped { probabilities: Vec<f64> },
}

fn cmd_weights(input: &Path, clip_epsilon: Option<f64>, output: Option<&PathBuf>) -> Result<()> {
    let json = std::fs::read_to_string(input)?;
    let probabilities = match serde_json::from_str::<ProbabilitiesInput>(&json)? {
        ProbabilitiesInput::Bare(p) => p,
        ProbabilitiesInput::Wrapped { probabilities } => probabilities,
    };

    let calc = match clip_epsilon {
        Some(eps) => WeightCalculator::new().with_clip(eps)?,
        None => WeightCalculator::new(),
    };
    let odds: Vec<f64> = probabilities.iter().map(|&y| calc.weight(y)).collect::<rw_core::Result<_>>()?;
    let mc_weights = calc.mc_weights(&probabilities)?;
    let n_non_finite = odds.iter().chain(&mc_weights).filter(|w| !w.is_finite()).count();
    if n_non_finite > 0 {
        tracing::warn!(n_non_finite, "infinite weights are written as null");
    }

    write_json(
        output,
        serde_json::json!({
            "clip_epsilon": clip_epsilon,
            "weights": odds,
            "mc_weights": mc_weights,
        }),
    )
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
