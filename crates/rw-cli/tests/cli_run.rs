use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_mcreweight"))
}

fn repo_root() -> PathBuf {
    // crates/rw-cli -> repo root
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..").canonicalize().unwrap()
}

fn fixture_path(name: &str) -> PathBuf {
    repo_root().join("tests/fixtures").join(name)
}

fn tmp_path(filename: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("mcreweight_cli_{}_{}_{}", std::process::id(), nanos, filename));
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn read_json(path: &PathBuf) -> serde_json::Value {
    let s = std::fs::read_to_string(path).unwrap_or_else(|e| panic!("read {}: {}", path.display(), e));
    serde_json::from_str(&s).unwrap()
}

#[test]
fn run_writes_weights_and_artifact() {
    let cfg = fixture_path("small_run.yaml");
    assert!(cfg.exists(), "missing fixture: {}", cfg.display());
    let out_dir = tmp_path("run");

    let out = run(&[
        "run",
        "--config",
        cfg.to_string_lossy().as_ref(),
        "--out-dir",
        out_dir.to_string_lossy().as_ref(),
        "--deterministic",
    ]);
    assert!(out.status.success(), "run should succeed, stderr={}", String::from_utf8_lossy(&out.stderr));

    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert!(summary["closure_ratio"].is_number());
    assert!(summary["quality"]["status"].is_string());

    let weights = read_json(&out_dir.join("weights.json"));
    assert_eq!(weights["schema_version"], "mcreweight_weights_v0");
    let n = weights["n_events"].as_u64().unwrap() as usize;
    assert!(n > 0);
    assert_eq!(weights["weights"].as_array().unwrap().len(), n);
    assert_eq!(weights["probabilities"].as_array().unwrap().len(), n);
    assert_eq!(weights["features"].as_array().unwrap().len(), n);
    assert_eq!(weights["features"][0].as_array().unwrap().len(), 3);

    let art = read_json(&out_dir.join("artifacts/reweight.json"));
    assert_eq!(art["schema_version"], "mcreweight_reweight_v0");
    assert_eq!(art["meta"]["created_unix_ms"], 0);
    assert_eq!(art["meta"]["parity_mode"]["threads"], 1);
    assert_eq!(art["marginals"].as_array().unwrap().len(), 3);
    assert_eq!(art["marginals"][0]["bin_edges"].as_array().unwrap().len(), 21);
    assert!(art["truth"]["log_weight_correlation"].is_number());

    let _ = std::fs::remove_dir_all(&out_dir);
}

#[test]
fn deterministic_runs_are_identical() {
    let cfg = fixture_path("small_run.yaml");
    let mut files = Vec::new();
    for tag in ["a", "b"] {
        let out_dir = tmp_path(&format!("det_{}", tag));
        let out = run(&[
            "run",
            "--config",
            cfg.to_string_lossy().as_ref(),
            "--out-dir",
            out_dir.to_string_lossy().as_ref(),
            "--deterministic",
            "--threads",
            "1",
        ]);
        assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
        files.push(std::fs::read(out_dir.join("artifacts/reweight.json")).unwrap());
        let _ = std::fs::remove_dir_all(&out_dir);
    }
    assert_eq!(files[0], files[1]);
}

#[test]
fn generate_then_run_on_external_samples() {
    let cfg = fixture_path("identical_populations.json");
    let samples = tmp_path("samples.json");
    let out = run(&[
        "generate",
        "--config",
        cfg.to_string_lossy().as_ref(),
        "--output",
        samples.to_string_lossy().as_ref(),
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let v = read_json(&samples);
    assert_eq!(v["data"].as_array().unwrap().len(), 300);
    assert_eq!(v["mc"].as_array().unwrap().len(), 300);
    assert_eq!(v["mc"][0].as_array().unwrap().len(), 2);

    let run_cfg = tmp_path("external.json");
    let body = serde_json::json!({
        "samples": samples,
        "classifier": { "hidden": [3], "optimizer": { "max_iter": 60 } },
    });
    std::fs::write(&run_cfg, serde_json::to_string(&body).unwrap()).unwrap();
    let out_dir = tmp_path("external_run");
    let out = run(&[
        "run",
        "--config",
        run_cfg.to_string_lossy().as_ref(),
        "--out-dir",
        out_dir.to_string_lossy().as_ref(),
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let art = read_json(&out_dir.join("artifacts/reweight.json"));
    assert_eq!(art["n_features"], 2);
    assert!(art.get("truth").is_none());

    let _ = std::fs::remove_file(&samples);
    let _ = std::fs::remove_file(&run_cfg);
    let _ = std::fs::remove_dir_all(&out_dir);
}

#[test]
fn weights_command_converts_probabilities() {
    let input = tmp_path("probs.json");
    std::fs::write(&input, "[0.5, 0.75, 0.2, 1.0]").unwrap();
    let out = run(&["weights", "--input", input.to_string_lossy().as_ref()]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let w: Vec<Option<f64>> = serde_json::from_value(v["weights"].clone()).unwrap();
    assert_eq!(w[0], Some(1.0));
    assert!((w[1].unwrap() - 3.0).abs() < 1e-12);
    assert!((w[2].unwrap() - 0.25).abs() < 1e-12);
    // +inf is not representable in JSON.
    assert_eq!(w[3], None);
    assert_eq!(v["mc_weights"][3], 0.0);

    std::fs::write(&input, r#"{"probabilities": [1.0]}"#).unwrap();
    let out = run(&["weights", "--input", input.to_string_lossy().as_ref(), "--clip-epsilon", "0.01"]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert!((v["weights"][0].as_f64().unwrap() - 99.0).abs() < 1e-9);

    std::fs::write(&input, "[1.5]").unwrap();
    let out = run(&["weights", "--input", input.to_string_lossy().as_ref()]);
    assert!(!out.status.success());

    let _ = std::fs::remove_file(&input);
}

#[test]
fn invalid_config_is_rejected() {
    let cfg = tmp_path("bad.yaml");
    std::fs::write(&cfg, "train_fraction: 1.5\n").unwrap();
    let out_dir = tmp_path("bad_run");
    let out = run(&[
        "run",
        "--config",
        cfg.to_string_lossy().as_ref(),
        "--out-dir",
        out_dir.to_string_lossy().as_ref(),
    ]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("train_fraction"));
    let _ = std::fs::remove_file(&cfg);
}

#[test]
fn version_prints_crate_version() {
    let out = run(&["version"]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).starts_with("mcreweight "));
}
