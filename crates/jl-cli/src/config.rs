//! Optional run-config file for `jetlimits limits`.
//!
//! Every field has a default; command-line flags override what the file sets.

use anyhow::Result;
use jl_core::EnsembleConfig;
use jl_inference::{CoverageConfig, NuisanceMode, PosteriorConfig, RangeConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSettings {
    /// Posterior percentiles to quote.
    pub percentiles: Vec<f64>,
    /// Replica treatment of the main result.
    pub systematic_mode: NuisanceMode,
    /// Start the range scan at the model's λ cap.
    pub use_model_cap: bool,
    pub range: RangeConfig,
    pub posterior: PosteriorConfig,
    /// Coverage settings; trials run when `n_trials > 0`.
    pub coverage: CoverageConfig,
    /// Replaces the workspace's ensemble settings.
    pub ensemble: Option<EnsembleConfig>,
    /// Bins of the posterior histogram in the JSON output.
    pub histogram_bins: usize,
    /// Threads (0 = auto).
    pub threads: usize,
    /// Directory for per-combination text logs.
    pub log_dir: Option<PathBuf>,
}

impl Default for RunSettings {
    fn default() -> Self {
        let limits = jl_inference::LimitConfig::default();
        Self {
            percentiles: limits.percentiles,
            systematic_mode: limits.systematic_mode,
            use_model_cap: limits.use_model_cap,
            range: limits.range,
            posterior: limits.posterior,
            coverage: CoverageConfig { n_trials: 0, ..Default::default() },
            ensemble: None,
            histogram_bins: limits.histogram_bins,
            threads: 0,
            log_dir: None,
        }
    }
}

pub fn read_run_settings(path: &Path) -> Result<RunSettings> {
    let bytes = std::fs::read(path)?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
    let cfg: RunSettings = if ext == "json" {
        serde_json::from_slice(&bytes)?
    } else {
        // Default: YAML (serde_yaml_ng).
        serde_yaml_ng::from_slice(&bytes)?
    };
    Ok(cfg)
}
