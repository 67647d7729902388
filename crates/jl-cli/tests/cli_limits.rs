//! End-to-end tests of the `jetlimits` binary against the fixture workspace.

use std::path::PathBuf;
use std::process::{Command, Output};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_jetlimits"))
}

fn repo_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..").canonicalize().unwrap()
}

fn fixture_path(name: &str) -> PathBuf {
    repo_root().join("tests/fixtures").join(name)
}

fn workspace() -> String {
    fixture_path("jet_workspace.json").to_string_lossy().into_owned()
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

fn run_json(args: &[&str]) -> serde_json::Value {
    let out = run(args);
    assert!(
        out.status.success(),
        "command failed: {:?}\nstderr:\n{}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).expect("stdout should be valid JSON")
}

fn tmp_path(filename: &str) -> PathBuf {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("jetlimits_cli_{}_{}_{}", std::process::id(), nanos, filename));
    p
}

#[test]
fn version_prints_crate_version() {
    let out = run(&["version"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert_eq!(stdout.trim(), format!("jetlimits {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn observed_limits_json_contract() {
    let ws = workspace();
    let v = run_json(&["limits", "--workspace", &ws, "LL", "--sign", "constructive", "--observed"]);

    assert_eq!(v["tool"], "jetlimits");
    assert_eq!(v["workspace"], "CT14_JESJERPDF");
    assert_eq!(v["mode"], "observed");
    assert_eq!(v["n_replicas"], 21);

    let combos = v["combinations"].as_array().expect("combinations must be an array");
    assert_eq!(combos.len(), 1);
    let c = &combos[0];
    assert_eq!(c["status"], "done", "combination failed: {c}");
    assert_eq!(c["model"], "LL");
    assert_eq!(c["sign"], "constructive");

    let with = c["with_systematics"].as_array().unwrap();
    let nominal = c["nominal"].as_array().unwrap();
    assert_eq!(with.len(), 4);
    assert_eq!(nominal.len(), 4);
    let lambdas: Vec<f64> = with.iter().map(|l| l["lambda"].as_f64().unwrap()).collect();
    assert!(lambdas.windows(2).all(|w| w[0] <= w[1]), "percentiles not ordered: {lambdas:?}");
    assert!(with.iter().all(|l| l["mass_scale"].as_f64().unwrap() > 0.0));

    let upper = c["range"]["upper"].as_f64().unwrap();
    assert!(upper > 0.0 && upper <= 0.02);
    assert!(c["coverage"].is_null());
}

#[test]
fn expected_limits_write_logs() {
    let ws = workspace();
    let log_dir = tmp_path("logs");
    let out_path = tmp_path("limits.json");
    let out = run(&[
        "limits",
        "--workspace",
        &ws,
        "LL",
        "--sign",
        "destructive",
        "--ntrials",
        "20",
        "--threads",
        "2",
        "--log-dir",
        log_dir.to_string_lossy().as_ref(),
        "--output",
        out_path.to_string_lossy().as_ref(),
    ]);
    assert!(out.status.success(), "stderr:\n{}", String::from_utf8_lossy(&out.stderr));

    let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
    assert_eq!(v["mode"], "expected");
    let cov = &v["combinations"][0]["coverage"];
    assert_eq!(cov["n_trials"], 20);
    assert_eq!(cov["percentiles"].as_array().unwrap().len(), 4);

    let log = log_dir.join("CT14_JESJERPDF_limit_LL_destructive_l000_expected.log");
    let text = std::fs::read_to_string(&log).unwrap_or_else(|e| panic!("missing {}: {e}", log.display()));
    assert!(text.contains("model: LL destructive"));
    assert!(text.contains("WITH systematic uncertainties"));
    assert!(text.contains("NO systematic uncertainties"));
    assert!(text.contains("coverage at lambda = 0.000000: 20 trials"));

    std::fs::remove_dir_all(&log_dir).ok();
    std::fs::remove_file(&out_path).ok();
}

#[test]
fn injected_signal_names_log_after_mass_scale() {
    let ws = workspace();
    let log_dir = tmp_path("signal_logs");
    let v = run_json(&[
        "limits",
        "--workspace",
        &ws,
        "VV",
        "--sign",
        "constructive",
        "--mass-scale",
        "12",
        "--log-dir",
        log_dir.to_string_lossy().as_ref(),
    ]);
    assert_eq!(v["mass_scale"], 12.0);
    assert!(log_dir.join("CT14_JESJERPDF_limit_VV_constructive_l000_L012_expected.log").exists());
    std::fs::remove_dir_all(&log_dir).ok();
}

#[test]
fn run_config_sets_percentiles() {
    let ws = workspace();
    let cfg = tmp_path("run.yaml");
    std::fs::write(&cfg, "percentiles: [0.95]\nsystematic_mode: marginalize\n").unwrap();
    let v = run_json(&[
        "limits",
        "--workspace",
        &ws,
        "RR",
        "--sign",
        "constructive",
        "--observed",
        "--config",
        cfg.to_string_lossy().as_ref(),
    ]);
    std::fs::remove_file(&cfg).ok();

    let c = &v["combinations"][0];
    assert_eq!(c["status"], "done", "combination failed: {c}");
    let with = c["with_systematics"].as_array().unwrap();
    assert_eq!(with.len(), 1);
    assert_eq!(with[0]["percentile"], 0.95);
}

#[test]
fn unknown_model_is_rejected() {
    let ws = workspace();
    let out = run(&["limits", "--workspace", &ws, "XY"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("XY"));
}

#[test]
fn mass_scale_conflicts_with_observed() {
    let ws = workspace();
    let out = run(&["limits", "--workspace", &ws, "--observed", "--mass-scale", "10"]);
    assert!(!out.status.success());
}

#[test]
fn ensemble_lists_exhaustive_replicas() {
    let ws = workspace();
    let v = run_json(&["ensemble", "--workspace", &ws, "--policy", "exhaustive"]);

    // CT14 members 1..3 and MMHT members 1..2, three scale choices each
    assert_eq!(v["n_replicas"], 15);
    let replicas = v["replicas"].as_array().unwrap();
    assert_eq!(replicas.len(), 16);
    assert_eq!(replicas[0]["directory"], "CT14/000/000");
    assert_eq!(replicas[0]["histogram"], "nlo_1.000_1.000");
    assert!(replicas[1..].iter().all(|r| r["directory"] != "CT14/000/000"));
}

#[test]
fn ensemble_bootstrap_is_reproducible() {
    let ws = workspace();
    let a = run_json(&["ensemble", "--workspace", &ws, "--ensemble-seed", "11"]);
    let b = run_json(&["ensemble", "--workspace", &ws, "--ensemble-seed", "11"]);
    assert_eq!(a["replicas"], b["replicas"]);
    assert_eq!(a["n_replicas"], 20);
}

#[test]
fn bands_are_ordered_per_bin() {
    let ws = workspace();
    let v = run_json(&["bands", "--workspace", &ws, "--mass-scale", "10", "--model", "LL"]);

    assert_eq!(v["percentiles"].as_array().unwrap().len(), 5);
    assert_eq!(v["n_replicas"], 20);
    for key in ["qcd", "qcd_ci"] {
        let curves = v[key]["curves"].as_array().unwrap();
        assert_eq!(curves.len(), 5);
        for bin in 0..3 {
            let column: Vec<f64> = curves.iter().map(|c| c[bin].as_f64().unwrap()).collect();
            assert!(column.windows(2).all(|w| w[0] <= w[1]), "{key} bin {bin}: {column:?}");
        }
    }
    // Constructive LL raises every bin
    let qcd_nominal = v["qcd"]["nominal"].as_array().unwrap();
    let ci_nominal = v["qcd_ci"]["nominal"].as_array().unwrap();
    for (q, c) in qcd_nominal.iter().zip(ci_nominal) {
        assert!(c.as_f64().unwrap() > q.as_f64().unwrap());
    }
}

#[test]
fn bands_without_mass_scale_have_no_ci() {
    let ws = workspace();
    let v = run_json(&["bands", "--workspace", &ws]);
    assert!(v["qcd_ci"].is_null());
    assert_eq!(v["qcd"]["curves"].as_array().unwrap().len(), 5);
}
