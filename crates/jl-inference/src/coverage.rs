//! Expected limits and coverage from repeated pseudo-experiments.
//!
//! Each trial fluctuates the Asimov dataset at the true λ, recomputes the
//! posterior percentiles and checks whether the true value is excluded.
//! Trials run in parallel; their outcomes are collected in trial order and
//! reduced sequentially, so the summary does not depend on the thread count.

use jl_core::{BinRange, DataSet, Error, Kappa, ModelParams, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::bayes::{BayesPosterior, PosteriorConfig, mass_scale_limit};
use crate::model::{NuisanceMode, ProbabilityModel};
use crate::percentile::PercentileCurve;
use crate::range::{RangeConfig, RangeOptimizer};
use crate::toys;

/// Posterior percentiles quoted as limits: the 68% central interval, median and 95%.
pub const DEFAULT_PERCENTILES: [f64; 4] = [0.1585, 0.5, 0.8415, 0.95];

/// Percentiles of the expected-limit band across trials.
pub const LIMIT_BAND: [f64; 3] = [0.16, 0.5, 0.84];

/// Coverage-trial settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Number of pseudo-experiments.
    pub n_trials: usize,
    /// Trial `t` uses seed `seed + t`.
    pub seed: u64,
    /// Posterior percentiles to evaluate.
    pub percentiles: Vec<f64>,
    /// Replica treatment for the Asimov means.
    pub asimov_mode: NuisanceMode,
    /// Replica treatment when evaluating each trial.
    pub eval_mode: NuisanceMode,
    /// Means above this are fluctuated with a Gaussian.
    pub gaussian_threshold: f64,
    /// Warn when more than this fraction of trials is rejected.
    pub max_rejection_fraction: f64,
    /// Re-run the range scan on every trial.
    pub reoptimize_range: bool,
    /// Range scan settings (used with `reoptimize_range`).
    pub range: RangeConfig,
    /// Posterior grid.
    pub posterior: PosteriorConfig,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            n_trials: 200,
            seed: 42,
            percentiles: DEFAULT_PERCENTILES.to_vec(),
            asimov_mode: NuisanceMode::Nominal,
            eval_mode: NuisanceMode::Integrate,
            gaussian_threshold: toys::DEFAULT_GAUSSIAN_THRESHOLD,
            max_rejection_fraction: 0.1,
            reoptimize_range: false,
            range: RangeConfig::default(),
            posterior: PosteriorConfig::default(),
        }
    }
}

/// Truth and evaluation range of one coverage study.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageTarget {
    /// True λ (0 for background only).
    pub true_lambda: f64,
    /// Interference pattern.
    pub kappa: Kappa,
    /// Bins entering the likelihood.
    pub bin_range: BinRange,
    /// λ range of each trial posterior.
    pub lambda_range: (f64, f64),
}

/// Statistics of one percentile across accepted trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileCoverage {
    /// Posterior percentile.
    pub percentile: f64,
    /// Mean mass-scale limit (TeV).
    pub mean_limit: f64,
    /// Standard deviation of the limit.
    pub std_limit: f64,
    /// Fraction of trials whose limit lies below the true mass scale.
    pub coverage: f64,
    /// Binomial error of `coverage`.
    pub coverage_error: f64,
    /// 16/50/84% points of the limit distribution.
    pub band: [f64; 3],
}

/// Result of a coverage study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    /// True λ.
    pub true_lambda: f64,
    /// Trials requested.
    pub n_trials: usize,
    /// Trials entering the statistics.
    pub n_accepted: usize,
    /// Trials that failed or gave a degenerate posterior or a non-positive percentile.
    pub n_rejected: usize,
    /// Rejections exceeded `max_rejection_fraction`.
    pub insufficient_resolution: bool,
    /// Per-percentile statistics, in configuration order.
    pub percentiles: Vec<PercentileCoverage>,
}

enum TrialOutcome {
    Accepted(Vec<f64>),
    Rejected,
}

/// Runs coverage trials against a fixed model.
pub struct CoverageTrialRunner<'a> {
    model: &'a ProbabilityModel,
    config: CoverageConfig,
}

impl<'a> CoverageTrialRunner<'a> {
    /// Create a runner.
    pub fn new(model: &'a ProbabilityModel, config: CoverageConfig) -> Self {
        Self { model, config }
    }

    /// Settings in use.
    pub fn config(&self) -> &CoverageConfig {
        &self.config
    }

    fn validate(&self, target: &CoverageTarget) -> Result<()> {
        let cfg = &self.config;
        if cfg.n_trials == 0 {
            return Err(Error::Validation("coverage needs at least one trial".to_string()));
        }
        if cfg.percentiles.is_empty() || cfg.percentiles.iter().any(|p| !(*p > 0.0 && *p <= 1.0)) {
            return Err(Error::Validation(format!(
                "coverage percentiles must be in (0, 1], got {:?}",
                cfg.percentiles
            )));
        }
        if !(target.true_lambda.is_finite() && target.true_lambda >= 0.0) {
            return Err(Error::Validation(format!(
                "true lambda must be finite and >= 0, got {}",
                target.true_lambda
            )));
        }
        let (lo, hi) = target.lambda_range;
        if !(lo.is_finite() && hi.is_finite() && hi > lo) {
            return Err(Error::Validation(format!("invalid lambda range [{lo}, {hi}]")));
        }
        Ok(())
    }

    /// Run all trials and summarize.
    pub fn run(&self, target: &CoverageTarget) -> Result<CoverageSummary> {
        self.validate(target)?;
        let cfg = &self.config;
        let truth = ModelParams::new(target.true_lambda, target.kappa, target.bin_range);
        let expected = toys::asimov_counts(self.model, &truth, cfg.asimov_mode)?;
        let template = DataSet::new(self.model.edges().to_vec(), vec![0.0; self.model.n_bins()])?;

        log::info!(
            "coverage: {} trials at lambda = {:.6} on [{:.4}, {:.4}]",
            cfg.n_trials,
            target.true_lambda,
            target.lambda_range.0,
            target.lambda_range.1
        );

        let outcomes: Vec<Result<TrialOutcome>> = (0..cfg.n_trials)
            .into_par_iter()
            .with_min_len(16)
            .map(|t| self.trial(t, &expected, &template, target))
            .collect();
        self.summarize(target, outcomes)
    }

    /// Reduce trial outcomes in trial order. A failed trial counts as rejected.
    fn summarize(&self, target: &CoverageTarget, outcomes: Vec<Result<TrialOutcome>>) -> Result<CoverageSummary> {
        let cfg = &self.config;
        let np = cfg.percentiles.len();
        let mut covered = vec![0usize; np];
        let mut x1 = vec![0.0; np];
        let mut x2 = vec![0.0; np];
        let mut spread = PercentileCurve::new(np);
        let mut n_rejected = 0usize;
        for (t, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Err(e) => {
                    log::warn!("coverage trial {t} failed: {e}");
                    n_rejected += 1;
                }
                Ok(TrialOutcome::Rejected) => n_rejected += 1,
                Ok(TrialOutcome::Accepted(lambdas)) => {
                    let limits: Vec<f64> = lambdas.iter().map(|&l| mass_scale_limit(l)).collect();
                    for i in 0..np {
                        if target.true_lambda < lambdas[i] {
                            covered[i] += 1;
                        }
                        x1[i] += limits[i];
                        x2[i] += limits[i] * limits[i];
                    }
                    spread.add(&limits)?;
                }
            }
        }

        let n = spread.len();
        if n == 0 {
            return Err(Error::NumericalDegeneracy(format!(
                "all {} coverage trials were rejected",
                cfg.n_trials
            )));
        }
        let bands = spread.curves(&LIMIT_BAND)?;
        let nf = n as f64;
        let percentiles = (0..np)
            .map(|i| {
                let mean = x1[i] / nf;
                let var = (x2[i] / nf - mean * mean).max(0.0);
                let c = covered[i] as f64 / nf;
                PercentileCoverage {
                    percentile: cfg.percentiles[i],
                    mean_limit: mean,
                    std_limit: var.sqrt(),
                    coverage: c,
                    coverage_error: (c * (1.0 - c) / nf).sqrt(),
                    band: [bands[0][i], bands[1][i], bands[2][i]],
                }
            })
            .collect();

        let insufficient_resolution = n_rejected as f64 > cfg.max_rejection_fraction * cfg.n_trials as f64;
        if insufficient_resolution {
            log::warn!(
                "{n_rejected} of {} coverage trials rejected (limit {:.0}%); the lambda grid is too coarse",
                cfg.n_trials,
                100.0 * cfg.max_rejection_fraction
            );
        } else {
            log::info!("coverage: {n} trials accepted, {n_rejected} rejected");
        }

        Ok(CoverageSummary {
            true_lambda: target.true_lambda,
            n_trials: cfg.n_trials,
            n_accepted: n,
            n_rejected,
            insufficient_resolution,
            percentiles,
        })
    }

    fn trial(&self, t: usize, expected: &[f64], template: &DataSet, target: &CoverageTarget) -> Result<TrialOutcome> {
        let cfg = &self.config;
        let seed = cfg.seed.wrapping_add(t as u64);
        let counts = toys::fluctuate_seeded(expected, cfg.gaussian_threshold, seed)?;
        let data = template.with_counts(counts)?;
        let params = ModelParams::new(target.lambda_range.0, target.kappa, target.bin_range);
        let slice = self.model.lambda_slice(&data, params, cfg.eval_mode);

        let (mut lo, mut hi) = target.lambda_range;
        if cfg.reoptimize_range {
            match RangeOptimizer::new(cfg.range).optimize(&slice, lo, hi) {
                Ok(scan) => {
                    lo = scan.lower;
                    hi = scan.upper;
                }
                Err(Error::NumericalDegeneracy(_)) => return Ok(TrialOutcome::Rejected),
                Err(e) => return Err(e),
            }
            if hi <= lo {
                return Ok(TrialOutcome::Rejected);
            }
        }

        let posterior = match BayesPosterior::compute(&slice, lo, hi, &cfg.posterior) {
            Ok(p) => p,
            Err(Error::NumericalDegeneracy(msg)) => {
                log::debug!("trial {t}: {msg}");
                return Ok(TrialOutcome::Rejected);
            }
            Err(e) => return Err(e),
        };
        let lambdas = cfg.percentiles.iter().map(|&p| posterior.percentile(p)).collect::<Result<Vec<f64>>>()?;
        if lambdas.iter().any(|&l| l <= 0.0) {
            return Ok(TrialOutcome::Rejected);
        }
        Ok(TrialOutcome::Accepted(lambdas))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::{Ensemble, Replica};
    use approx::assert_relative_eq;
    use jl_core::{CiCoefficients, PdfSet, ReplicaId};
    use jl_translate::{TabulatedCiSpectrum, TabulatedSpectrum};
    use std::sync::Arc;

    fn model() -> ProbabilityModel {
        let edges = vec![0.0, 1.0, 2.0];
        let ci: Vec<CiCoefficients> = [-2.0e4, -1.0e4]
            .iter()
            .map(|&a| {
                let mut c = CiCoefficients::default();
                c.linear[0] = a;
                c
            })
            .collect();
        let replica = Replica {
            id: ReplicaId::nominal(PdfSet::Ct14),
            qcd: Arc::new(TabulatedSpectrum::new(edges.clone(), vec![400.0, 100.0]).unwrap()),
            ci: Arc::new(TabulatedCiSpectrum::new(edges.clone(), ci).unwrap()),
        };
        let ens = Ensemble::from_replicas(vec![replica]).unwrap();
        ProbabilityModel::new(&ens, &edges, 1.0).unwrap()
    }

    fn target(true_lambda: f64) -> CoverageTarget {
        CoverageTarget {
            true_lambda,
            kappa: Kappa([-1.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            bin_range: BinRange::full(2),
            lambda_range: (0.0, 0.01),
        }
    }

    #[test]
    fn test_summary_shape_and_reproducibility() {
        let m = model();
        let cfg = CoverageConfig { n_trials: 64, seed: 5, ..Default::default() };
        let a = CoverageTrialRunner::new(&m, cfg.clone()).run(&target(0.002)).unwrap();
        let b = CoverageTrialRunner::new(&m, cfg).run(&target(0.002)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.n_accepted + a.n_rejected, 64);
        assert_eq!(a.percentiles.len(), 4);
        for pc in &a.percentiles {
            assert!(pc.mean_limit > 0.0);
            assert!(pc.std_limit >= 0.0);
            assert!((0.0..=1.0).contains(&pc.coverage));
            assert!(pc.band[0] <= pc.band[1] && pc.band[1] <= pc.band[2]);
        }
        // higher posterior percentiles give weaker mass-scale limits
        assert!(a.percentiles[0].mean_limit > a.percentiles[3].mean_limit);
    }

    #[test]
    fn test_background_only_is_always_covered() {
        let m = model();
        let cfg = CoverageConfig { n_trials: 32, ..Default::default() };
        let s = CoverageTrialRunner::new(&m, cfg).run(&target(0.0)).unwrap();
        for pc in &s.percentiles {
            assert_eq!(pc.coverage, 1.0);
            assert_eq!(pc.coverage_error, 0.0);
        }
    }

    #[test]
    fn test_reoptimized_range_runs() {
        let m = model();
        let cfg = CoverageConfig { n_trials: 16, reoptimize_range: true, ..Default::default() };
        let s = CoverageTrialRunner::new(&m, cfg).run(&target(0.001)).unwrap();
        assert_eq!(s.n_trials, 16);
    }

    #[test]
    fn test_failed_trial_is_rejected_not_fatal() {
        let m = model();
        let cfg = CoverageConfig { n_trials: 3, percentiles: vec![0.5, 0.95], ..Default::default() };
        let runner = CoverageTrialRunner::new(&m, cfg);
        let outcomes = vec![
            Ok(TrialOutcome::Accepted(vec![0.0025, 0.01])),
            Err(Error::Computation("likelihood is NaN".to_string())),
            Ok(TrialOutcome::Rejected),
        ];
        let s = runner.summarize(&target(0.001), outcomes).unwrap();
        assert_eq!(s.n_accepted, 1);
        assert_eq!(s.n_rejected, 2);
        assert!(s.insufficient_resolution);
        assert_relative_eq!(s.percentiles[0].mean_limit, 20.0, epsilon = 1e-9);
        assert_relative_eq!(s.percentiles[1].mean_limit, 10.0, epsilon = 1e-9);
        assert_eq!(s.percentiles[1].coverage, 1.0);

        let all_failed = vec![Err(Error::Computation("likelihood is NaN".to_string()))];
        assert!(matches!(
            runner.summarize(&target(0.001), all_failed),
            Err(Error::NumericalDegeneracy(_))
        ));
    }

    #[test]
    fn test_invalid_configuration() {
        let m = model();
        let none = CoverageConfig { n_trials: 0, ..Default::default() };
        assert!(CoverageTrialRunner::new(&m, none).run(&target(0.001)).is_err());
        let bad_p = CoverageConfig { percentiles: vec![0.0], ..Default::default() };
        assert!(CoverageTrialRunner::new(&m, bad_p).run(&target(0.001)).is_err());
        let mut t = target(0.001);
        t.lambda_range = (0.01, 0.0);
        assert!(CoverageTrialRunner::new(&m, CoverageConfig::default()).run(&t).is_err());
    }
}
