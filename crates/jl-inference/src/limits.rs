//! Limits per (contact model, interference sign).
//!
//! For each combination: set κ, shrink the λ range, quote posterior percentiles
//! with replica averaging, optionally run coverage trials, then repeat the
//! percentiles with the nominal replica only.

use jl_core::{BinRange, ContactModel, DataSet, Error, Interference, Kappa, ModelParams, Result};
use serde::{Deserialize, Serialize};

use crate::bayes::{BayesPosterior, PosteriorConfig, mass_scale_limit};
use crate::coverage::{CoverageConfig, CoverageSummary, CoverageTarget, CoverageTrialRunner, DEFAULT_PERCENTILES};
use crate::model::{NuisanceMode, ProbabilityModel};
use crate::range::{RangeConfig, RangeOptimizer, RangeScan};

/// Limit settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    /// Initial λ range of the scan (TeV⁻²).
    pub scan_range: (f64, f64),
    /// Start the scan at the model's λ cap instead of `scan_range.1`.
    pub use_model_cap: bool,
    /// Posterior percentiles to quote.
    pub percentiles: Vec<f64>,
    /// Replica treatment of the main result.
    pub systematic_mode: NuisanceMode,
    /// Bins entering the likelihood; all bins if absent.
    pub bin_range: Option<BinRange>,
    /// Range scan.
    pub range: RangeConfig,
    /// Posterior grid.
    pub posterior: PosteriorConfig,
    /// Coverage trials; skipped if absent.
    pub coverage: Option<CoverageConfig>,
    /// True λ of the coverage trials.
    pub true_lambda: f64,
    /// Replica treatment of Asimov datasets.
    pub asimov_mode: NuisanceMode,
    /// Bins of the plotted posterior.
    pub histogram_bins: usize,
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            scan_range: (0.0, 0.02),
            use_model_cap: false,
            percentiles: DEFAULT_PERCENTILES.to_vec(),
            systematic_mode: NuisanceMode::Integrate,
            bin_range: None,
            range: RangeConfig::default(),
            posterior: PosteriorConfig::default(),
            coverage: None,
            true_lambda: 0.0,
            asimov_mode: NuisanceMode::Nominal,
            histogram_bins: 100,
        }
    }
}

/// One quoted percentile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileLimit {
    /// Posterior percentile.
    pub percentile: f64,
    /// λ at that percentile (TeV⁻²).
    pub lambda: f64,
    /// `1/√λ` (TeV), or −1 when λ ≤ 0.
    pub mass_scale: f64,
}

/// Largest fraction of replicas whose likelihood underflows, over the plotted λ bins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnderflowPeak {
    /// Underflow fraction.
    pub fraction: f64,
    /// λ where it occurs.
    pub lambda: f64,
}

/// Limits of one (model, sign) combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinationResult {
    /// Contact model.
    pub model: ContactModel,
    /// Interference sign.
    pub sign: Interference,
    /// κ used.
    pub kappa: Kappa,
    /// Optimized λ range.
    pub range: RangeScan,
    /// Percentiles with replica averaging.
    pub with_systematics: Vec<PercentileLimit>,
    /// Percentiles with the nominal replica.
    pub nominal: Vec<PercentileLimit>,
    /// Coverage study, if requested.
    pub coverage: Option<CoverageSummary>,
    /// Posterior mass per λ bin: `(low, high, mass)`.
    pub posterior_histogram: Vec<(f64, f64, f64)>,
    /// Worst likelihood underflow across replicas.
    pub max_underflow: UnderflowPeak,
}

/// Result or failure of one combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CombinationOutcome {
    /// Limits computed.
    Done(Box<CombinationResult>),
    /// The combination failed; others are unaffected.
    Failed {
        /// Contact model.
        model: ContactModel,
        /// Interference sign.
        sign: Interference,
        /// Error message.
        error: String,
    },
}

/// Asimov dataset used for expected limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExpectedData {
    /// QCD only (λ = 0).
    BackgroundOnly,
    /// QCD plus a contact interaction at `mass_scale` (TeV).
    Signal {
        /// Λ (TeV).
        mass_scale: f64,
        /// Contact model of the signal.
        model: ContactModel,
        /// Interference sign of the signal.
        sign: Interference,
    },
}

impl ExpectedData {
    /// True λ of the dataset.
    pub fn lambda(&self) -> Result<f64> {
        match *self {
            ExpectedData::BackgroundOnly => Ok(0.0),
            ExpectedData::Signal { mass_scale, .. } => jl_core::lambda_from_mass_scale(mass_scale),
        }
    }
}

/// Computes limits for (model, sign) combinations.
pub struct LimitCalculator<'a> {
    model: &'a ProbabilityModel,
    config: LimitConfig,
}

impl<'a> LimitCalculator<'a> {
    /// Create a calculator.
    pub fn new(model: &'a ProbabilityModel, config: LimitConfig) -> Self {
        Self { model, config }
    }

    /// Settings in use.
    pub fn config(&self) -> &LimitConfig {
        &self.config
    }

    fn bin_range(&self) -> BinRange {
        self.config.bin_range.unwrap_or_else(|| BinRange::full(self.model.n_bins()))
    }

    /// Asimov dataset (unfluctuated expected counts, all bins).
    pub fn expected_dataset(&self, expected: ExpectedData) -> Result<DataSet> {
        let lambda = expected.lambda()?;
        let kappa = match expected {
            ExpectedData::BackgroundOnly => Kappa::ZERO,
            ExpectedData::Signal { model, sign, .. } => model.kappa(sign),
        };
        let params = ModelParams::new(lambda, kappa, BinRange::full(self.model.n_bins()));
        let counts = self.model.expected_counts(&params, self.config.asimov_mode)?;
        DataSet::new(self.model.edges().to_vec(), counts)
    }

    fn percentile_limits(&self, posterior: &BayesPosterior) -> Result<Vec<PercentileLimit>> {
        self.config
            .percentiles
            .iter()
            .map(|&p| {
                let lambda = posterior.percentile(p)?;
                Ok(PercentileLimit { percentile: p, lambda, mass_scale: mass_scale_limit(lambda) })
            })
            .collect()
    }

    /// Limits for one combination.
    pub fn compute(&self, data: &DataSet, model: ContactModel, sign: Interference) -> Result<CombinationResult> {
        let cfg = &self.config;
        let kappa = model.kappa(sign);
        let params = ModelParams::new(cfg.scan_range.0, kappa, self.bin_range());
        let (lo, mut hi) = cfg.scan_range;
        if cfg.use_model_cap {
            hi = model.lambda_cap(sign);
        }
        if hi <= lo {
            return Err(Error::Configuration(format!("empty lambda scan range [{lo}, {hi}]")));
        }
        log::info!("model({model}, {sign}): kappa = {:?}", kappa.0);

        let syst = self.model.lambda_slice(data, params, cfg.systematic_mode);
        let range = RangeOptimizer::new(cfg.range).optimize(&syst, lo, hi)?;
        log::info!("optimized range: {:.4} ... {:.4} 1/TeV^2", range.lower, range.upper);
        if range.upper <= range.lower {
            return Err(Error::NumericalDegeneracy(format!(
                "lambda range collapsed to {}",
                range.lower
            )));
        }

        let posterior = BayesPosterior::compute(&syst, range.lower, range.upper, &cfg.posterior)?;
        let with_systematics = self.percentile_limits(&posterior)?;
        let posterior_histogram = posterior.histogram(cfg.histogram_bins);
        let max_underflow = self.max_underflow(data, &params, &posterior_histogram)?;

        let coverage = match &cfg.coverage {
            Some(cov) => {
                let target = CoverageTarget {
                    true_lambda: cfg.true_lambda,
                    kappa,
                    bin_range: params.bin_range,
                    lambda_range: (range.lower, range.upper),
                };
                Some(CoverageTrialRunner::new(self.model, cov.clone()).run(&target)?)
            }
            None => None,
        };

        let nominal_slice = self.model.lambda_slice(data, params, NuisanceMode::Nominal);
        let nominal_posterior = BayesPosterior::compute(&nominal_slice, range.lower, range.upper, &cfg.posterior)?;
        let nominal = self.percentile_limits(&nominal_posterior)?;

        Ok(CombinationResult {
            model,
            sign,
            kappa,
            range,
            with_systematics,
            nominal,
            coverage,
            posterior_histogram,
            max_underflow,
        })
    }

    fn max_underflow(
        &self,
        data: &DataSet,
        params: &ModelParams,
        histogram: &[(f64, f64, f64)],
    ) -> Result<UnderflowPeak> {
        let mut peak = UnderflowPeak { fraction: -1.0, lambda: 0.0 };
        for &(a, b, _) in histogram {
            let x = 0.5 * (a + b);
            let prof = self.model.log_profile_likelihood(data, &params.with_lambda(x))?;
            if prof.underflow_fraction > peak.fraction {
                peak = UnderflowPeak { fraction: prof.underflow_fraction, lambda: x };
            }
        }
        peak.fraction = peak.fraction.max(0.0);
        Ok(peak)
    }

    /// Every (model, sign) combination; failures are reported, not propagated.
    pub fn compute_all(
        &self,
        data: &DataSet,
        models: &[ContactModel],
        signs: &[Interference],
    ) -> Vec<CombinationOutcome> {
        let mut out = Vec::with_capacity(models.len() * signs.len());
        for &model in models {
            for &sign in signs {
                match self.compute(data, model, sign) {
                    Ok(r) => out.push(CombinationOutcome::Done(Box::new(r))),
                    Err(e) => {
                        log::warn!("model({model}, {sign}) failed: {e}");
                        out.push(CombinationOutcome::Failed { model, sign, error: e.to_string() });
                    }
                }
            }
        }
        out
    }
}
