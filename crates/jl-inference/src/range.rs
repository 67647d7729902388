//! Adaptive upper bound for the λ scan.
//!
//! Walks a coarse grid from the lower bound and stops at the first point where
//! the likelihood has dropped below a fixed fraction of its running maximum.

use jl_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::model::PoiLikelihood;

/// Scan settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeConfig {
    /// Grid intervals between the initial bounds.
    pub n_steps: usize,
    /// Stop once `L / L_max` falls below this.
    pub decay_fraction: f64,
}

impl Default for RangeConfig {
    fn default() -> Self {
        Self { n_steps: 20, decay_fraction: 1e-3 }
    }
}

/// Outcome of a range scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeScan {
    /// Lower bound (unchanged).
    pub lower: f64,
    /// Optimized upper bound.
    pub upper: f64,
    /// `true` if the likelihood never decayed below the threshold.
    pub exhausted: bool,
    /// Scanned `(λ, ln L)` pairs.
    pub points: Vec<(f64, f64)>,
}

/// Shrinks the λ range to where the likelihood is non-negligible.
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeOptimizer {
    config: RangeConfig,
}

impl RangeOptimizer {
    /// Create an optimizer.
    pub fn new(config: RangeConfig) -> Self {
        Self { config }
    }

    /// Scan `[lower, upper]`.
    pub fn optimize<L: PoiLikelihood + ?Sized>(&self, f: &L, lower: f64, upper: f64) -> Result<RangeScan> {
        if !(lower.is_finite() && upper.is_finite()) || upper < lower {
            return Err(Error::Validation(format!("invalid scan range [{lower}, {upper}]")));
        }
        if self.config.n_steps == 0 {
            return Err(Error::Validation("range scan needs n_steps >= 1".to_string()));
        }
        if !(self.config.decay_fraction > 0.0 && self.config.decay_fraction < 1.0) {
            return Err(Error::Validation(format!(
                "decay fraction must be in (0, 1), got {}",
                self.config.decay_fraction
            )));
        }

        let threshold = self.config.decay_fraction.ln();
        let step = (upper - lower) / self.config.n_steps as f64;
        let mut big = f64::NEG_INFINITY;
        let mut small = f64::INFINITY;
        let mut points = Vec::with_capacity(self.config.n_steps + 1);
        let mut new_upper = None;

        for i in 0..=self.config.n_steps {
            let x = if i == self.config.n_steps { upper } else { lower + i as f64 * step };
            let ll = f.log_likelihood(x)?;
            if ll.is_nan() {
                return Err(Error::Computation(format!("log-likelihood is NaN at lambda = {x}")));
            }
            points.push((x, ll));
            if ll > big {
                big = ll;
            }
            if big > ll && ll < small {
                small = ll;
            }
            if big > f64::NEG_INFINITY && small - big < threshold {
                new_upper = Some(x);
                break;
            }
        }

        if big == f64::NEG_INFINITY {
            return Err(Error::NumericalDegeneracy(format!(
                "likelihood is zero everywhere on [{lower}, {upper}]"
            )));
        }

        let scan = match new_upper {
            Some(x) => RangeScan { lower, upper: x.max(lower), exhausted: false, points },
            None => {
                log::warn!(
                    "likelihood never fell below {:.1e} of its maximum on [{lower}, {upper}]; keeping the upper bound",
                    self.config.decay_fraction
                );
                RangeScan { lower, upper, exhausted: true, points }
            }
        };
        log::debug!("optimized lambda range: {:.4} ... {:.4}", scan.lower, scan.upper);
        Ok(scan)
    }
}
