//! `mcreweight run` orchestration: config, output layout, artifact writing.

use anyhow::Result;
use rw_core::Label;
use rw_inference::pipeline::{PipelineConfig, ReweightOutcome, reweight, run_toy};
use rw_viz::{ArtifactOptions, BinningConfig, reweight_artifact};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Toys, split, classifier and weight options.
    #[serde(flatten)]
    pub pipeline: PipelineConfig,

    /// Marginal/score histogram binning.
    #[serde(default)]
    pub histograms: BinningConfig,

    /// External samples (`{"data": [[..]], "mc": [[..]]}`) used instead of toys.
    /// Relative paths resolve against the config file's directory.
    #[serde(default)]
    pub samples: Option<PathBuf>,

    /// Threads (0 = auto). Use 1 for deterministic parity.
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Make JSON output deterministic (zeroed timestamps).
    #[serde(default)]
    pub deterministic: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            histograms: BinningConfig::default(),
            samples: None,
            threads: default_threads(),
            deterministic: false,
        }
    }
}

fn default_threads() -> usize {
    1
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        self.histograms.validate()?;
        if self.samples.is_none() {
            self.pipeline.toy.validate()?;
        }
        Ok(())
    }
}

pub fn read_run_config(path: &Path) -> Result<RunConfig> {
    let bytes = std::fs::read(path)?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
    let cfg: RunConfig = if ext == "json" {
        serde_json::from_slice(&bytes)?
    } else {
        // Default: YAML (serde_yaml_ng).
        serde_yaml_ng::from_slice(&bytes)?
    };
    cfg.validate()?;
    Ok(cfg)
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplesFile {
    pub data: Vec<Vec<f64>>,
    pub mc: Vec<Vec<f64>>,
}

fn read_samples(path: &Path) -> Result<SamplesFile> {
    tracing::info!(path = %path.display(), "loading samples");
    let json = std::fs::read_to_string(path)?;
    let samples: SamplesFile = serde_json::from_str(&json)?;
    tracing::info!(n_data = samples.data.len(), n_mc = samples.mc.len(), "samples loaded");
    Ok(samples)
}

#[derive(Debug, Clone, Serialize)]
pub struct RunPaths {
    pub out_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    pub weights_json: PathBuf,
    pub reweight_json: PathBuf,
}

pub fn derive_paths(out_dir: &Path) -> RunPaths {
    let artifacts_dir = out_dir.join("artifacts");
    RunPaths {
        out_dir: out_dir.to_path_buf(),
        weights_json: out_dir.join("weights.json"),
        reweight_json: artifacts_dir.join("reweight.json"),
        artifacts_dir,
    }
}

/// Per-event test-set MC weights, arrays aligned by index.
#[derive(Debug, Clone, Serialize)]
struct WeightsFile<'a> {
    schema_version: &'static str,
    n_events: usize,
    prior_ratio: f64,
    mc_scale: f64,
    features: Vec<&'a [f64]>,
    probabilities: Vec<f64>,
    weights: &'a [f64],
}

fn weights_file(outcome: &ReweightOutcome) -> WeightsFile<'_> {
    WeightsFile {
        schema_version: "mcreweight_weights_v0",
        n_events: outcome.mc_weights.len(),
        prior_ratio: outcome.prior_ratio,
        mc_scale: outcome.closure.mc_scale,
        features: outcome.split.test.rows_with_label(Label::Mc),
        probabilities: outcome.mc_probabilities(),
        weights: &outcome.mc_weights,
    }
}

fn write_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Run the pipeline and write `weights.json` plus `artifacts/reweight.json`.
///
/// Returns a short summary for stdout.
pub fn run(cfg: &RunConfig, config_dir: &Path, out_dir: &Path) -> Result<serde_json::Value> {
    let paths = derive_paths(out_dir);
    std::fs::create_dir_all(&paths.artifacts_dir)?;

    let outcome = match &cfg.samples {
        Some(p) => {
            let path = if p.is_absolute() { p.clone() } else { config_dir.join(p) };
            let samples = read_samples(&path)?;
            reweight(samples.data, samples.mc, &cfg.pipeline, None)?
        }
        None => run_toy(&cfg.pipeline)?.1,
    };

    write_pretty(&paths.weights_json, &weights_file(&outcome))?;
    let artifact = reweight_artifact(
        &outcome,
        &cfg.histograms,
        ArtifactOptions { threads: cfg.threads, deterministic: cfg.deterministic },
    )?;
    write_pretty(&paths.reweight_json, &artifact)?;
    tracing::info!(out_dir = %out_dir.display(), status = %outcome.quality.status, "run finished");

    Ok(serde_json::json!({
        "paths": paths,
        "quality": outcome.quality,
        "closure_ratio": outcome.closure.ratio,
        "ess_fraction": outcome.weight_summary.ess_fraction,
        "test_auc": outcome.test_auc,
        "test_auc_reweighted": outcome.test_auc_reweighted,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_defaults_fill_missing_fields() {
        let cfg: RunConfig = serde_yaml_ng::from_str("train_fraction: 0.3\nthreads: 2\n").unwrap();
        assert_eq!(cfg.pipeline.train_fraction, 0.3);
        assert_eq!(cfg.threads, 2);
        assert_eq!(cfg.histograms, BinningConfig::default());
        assert_eq!(cfg.pipeline.classifier.hidden, vec![16, 16]);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_json_nested_sections() {
        let cfg: RunConfig = serde_json::from_str(
            r#"{"toy": {"n_data": 50, "n_mc": 60}, "weights": {"clip_epsilon": 1e-6}, "histograms": {"n_bins": 12}}"#,
        )
        .unwrap();
        assert_eq!(cfg.pipeline.toy.n_data, 50);
        assert_eq!(cfg.pipeline.toy.n_mc, 60);
        assert_eq!(cfg.pipeline.weights.clip_epsilon, Some(1e-6));
        assert_eq!(cfg.histograms.n_bins, 12);
        assert!(!cfg.deterministic);
    }

    #[test]
    fn test_validate_rejects_bad_sections() {
        let mut cfg = RunConfig::default();
        cfg.histograms.n_bins = 0;
        assert!(cfg.validate().is_err());
        let mut cfg = RunConfig::default();
        cfg.pipeline.train_fraction = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_paths_layout() {
        let p = derive_paths(Path::new("/tmp/out"));
        assert_eq!(p.weights_json, Path::new("/tmp/out/weights.json"));
        assert_eq!(p.reweight_json, Path::new("/tmp/out/artifacts/reweight.json"));
    }
}
