//! Bayesian posterior for λ on a fixed grid.
//!
//! `p(λ | D) ∝ L(D | λ) π(λ)` is tabulated on `n_steps + 1` equally spaced points,
//! normalized with the trapezoid rule, and inverted by linear interpolation of
//! the cumulative distribution.

use jl_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::model::PoiLikelihood;

/// Returned by [`mass_scale_limit`] when no limit can be quoted.
pub const NO_LIMIT: f64 = -1.0;

/// Prior density on λ.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum Prior {
    /// Flat prior: contributes 0 to the log-posterior.
    #[default]
    Flat,
    /// Normal prior: `log π(λ) = -0.5 * ((λ - center) / width)^2 + const`.
    Normal {
        /// Center of the Gaussian prior.
        center: f64,
        /// Width (standard deviation) of the Gaussian prior.
        width: f64,
    },
}

impl Prior {
    fn log_density(&self, lambda: f64) -> f64 {
        match *self {
            Prior::Flat => 0.0,
            Prior::Normal { center, width } => {
                let pull = (lambda - center) / width;
                -0.5 * pull * pull
            }
        }
    }
}

/// Posterior grid settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PosteriorConfig {
    /// Grid intervals.
    pub n_steps: usize,
    /// Prior on λ.
    pub prior: Prior,
}

impl Default for PosteriorConfig {
    fn default() -> Self {
        Self { n_steps: 400, prior: Prior::Flat }
    }
}

/// Tabulated, normalized posterior density and CDF.
#[derive(Debug, Clone)]
pub struct BayesPosterior {
    grid: Vec<f64>,
    density: Vec<f64>,
    cdf: Vec<f64>,
    log_max: f64,
}

impl BayesPosterior {
    /// Tabulate the posterior of `f` on `[lower, upper]`.
    pub fn compute<L: PoiLikelihood + ?Sized>(
        f: &L,
        lower: f64,
        upper: f64,
        config: &PosteriorConfig,
    ) -> Result<Self> {
        if !(lower.is_finite() && upper.is_finite() && upper > lower) {
            return Err(Error::Validation(format!("invalid posterior range [{lower}, {upper}]")));
        }
        if config.n_steps < 2 {
            return Err(Error::Validation("posterior grid needs n_steps >= 2".to_string()));
        }
        if let Prior::Normal { width, .. } = config.prior {
            if !(width.is_finite() && width > 0.0) {
                return Err(Error::Validation(format!("prior width must be > 0, got {width}")));
            }
        }

        let n = config.n_steps;
        let step = (upper - lower) / n as f64;
        let mut grid = Vec::with_capacity(n + 1);
        let mut log_post = Vec::with_capacity(n + 1);
        for i in 0..=n {
            let x = if i == n { upper } else { lower + i as f64 * step };
            let ll = f.log_likelihood(x)?;
            if ll.is_nan() {
                return Err(Error::Computation(format!("log-likelihood is NaN at lambda = {x}")));
            }
            grid.push(x);
            log_post.push(ll + config.prior.log_density(x));
        }

        let log_max = log_post.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !log_max.is_finite() {
            return Err(Error::NumericalDegeneracy(format!(
                "posterior is zero everywhere on [{lower}, {upper}]"
            )));
        }
        let weights: Vec<f64> = log_post.iter().map(|lp| (lp - log_max).exp()).collect();

        let mut cdf = Vec::with_capacity(n + 1);
        cdf.push(0.0);
        for i in 1..=n {
            let area = 0.5 * (weights[i - 1] + weights[i]) * (grid[i] - grid[i - 1]);
            cdf.push(cdf[i - 1] + area);
        }
        let total = cdf[n];
        if !(total.is_finite() && total > 0.0) {
            return Err(Error::NumericalDegeneracy(format!(
                "posterior integral is {total} on [{lower}, {upper}]"
            )));
        }
        let density = weights.iter().map(|w| w / total).collect();
        for c in cdf.iter_mut() {
            *c /= total;
        }
        cdf[n] = 1.0;

        Ok(Self { grid, density, cdf, log_max })
    }

    /// Lower end of the grid.
    pub fn lower(&self) -> f64 {
        self.grid[0]
    }

    /// Upper end of the grid.
    pub fn upper(&self) -> f64 {
        self.grid[self.grid.len() - 1]
    }

    /// Grid points.
    pub fn grid(&self) -> &[f64] {
        &self.grid
    }

    /// Largest log-likelihood + log-prior seen on the grid.
    pub fn log_max(&self) -> f64 {
        self.log_max
    }

    /// λ at cumulative probability `p`.
    pub fn percentile(&self, p: f64) -> Result<f64> {
        if !(0.0..=1.0).contains(&p) {
            return Err(Error::Validation(format!("percentile must be in [0, 1], got {p}")));
        }
        if p <= 0.0 {
            return Ok(self.lower());
        }
        let i = self.cdf.partition_point(|&c| c < p).min(self.cdf.len() - 1);
        let (c0, c1) = (self.cdf[i - 1], self.cdf[i]);
        let (x0, x1) = (self.grid[i - 1], self.grid[i]);
        Ok(x0 + (p - c0) / (c1 - c0) * (x1 - x0))
    }

    /// Cumulative probability at `x` (clamped to the grid).
    pub fn cdf(&self, x: f64) -> f64 {
        interpolate(&self.grid, &self.cdf, x)
    }

    /// Normalized density at `x` (0 outside the grid).
    pub fn density(&self, x: f64) -> f64 {
        if x < self.lower() || x > self.upper() {
            return 0.0;
        }
        interpolate(&self.grid, &self.density, x)
    }

    /// Grid point with the highest posterior density.
    pub fn mode(&self) -> f64 {
        let mut best = 0;
        for (i, &d) in self.density.iter().enumerate() {
            if d > self.density[best] {
                best = i;
            }
        }
        self.grid[best]
    }

    /// Posterior mass in `n_bins` equal-width bins: `(low edge, high edge, mass)`.
    pub fn histogram(&self, n_bins: usize) -> Vec<(f64, f64, f64)> {
        let width = (self.upper() - self.lower()) / n_bins.max(1) as f64;
        (0..n_bins)
            .map(|i| {
                let a = self.lower() + i as f64 * width;
                let b = if i + 1 == n_bins { self.upper() } else { a + width };
                (a, b, self.cdf(b) - self.cdf(a))
            })
            .collect()
    }
}

/// Linear interpolation of `ys(xs)` at `x`, clamped to the end points.
fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let n = xs.len();
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[n - 1] {
        return ys[n - 1];
    }
    let i = xs.partition_point(|&v| v <= x);
    let (x0, x1) = (xs[i - 1], xs[i]);
    let t = (x - x0) / (x1 - x0);
    ys[i - 1] + t * (ys[i] - ys[i - 1])
}

/// Mass-scale limit `Λ = 1/√λ` (TeV), or [`NO_LIMIT`] for `λ ≤ 0`.
pub fn mass_scale_limit(lambda: f64) -> f64 {
    if lambda > 0.0 { 1.0 / lambda.sqrt() } else { NO_LIMIT }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn flat(_x: f64) -> Result<f64> {
        Ok(0.0)
    }

    #[test]
    fn test_flat_posterior_is_uniform() {
        let post = BayesPosterior::compute(&flat, 0.0, 2.0, &PosteriorConfig::default()).unwrap();
        assert_relative_eq!(post.percentile(0.5).unwrap(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(post.percentile(0.95).unwrap(), 1.9, epsilon = 1e-12);
        assert_relative_eq!(post.cdf(0.5), 0.25, epsilon = 1e-12);
        assert_relative_eq!(post.density(1.3), 0.5, epsilon = 1e-12);
        assert_eq!(post.density(3.0), 0.0);
        assert_eq!(post.percentile(0.0).unwrap(), 0.0);
        assert_eq!(post.percentile(1.0).unwrap(), 2.0);
    }

    #[test]
    fn test_exponential_posterior_quantiles() {
        // L ∝ exp(-λ/τ): CDF = 1 - exp(-λ/τ) on a wide range
        let tau = 0.001;
        let f = move |x: f64| -> Result<f64> { Ok(-x / tau) };
        let cfg = PosteriorConfig { n_steps: 4000, ..Default::default() };
        let post = BayesPosterior::compute(&f, 0.0, 0.02, &cfg).unwrap();
        for p in [0.1585, 0.5, 0.8415, 0.95] {
            let expected = -tau * (1.0f64 - p).ln();
            assert_relative_eq!(post.percentile(p).unwrap(), expected, max_relative = 1e-3);
        }
        assert_eq!(post.mode(), 0.0);
    }

    #[test]
    fn test_percentile_is_monotone() {
        let f = |x: f64| -> Result<f64> { Ok(-0.5 * ((x - 0.004) / 0.002).powi(2)) };
        let post = BayesPosterior::compute(&f, 0.0, 0.02, &PosteriorConfig::default()).unwrap();
        let mut prev = post.percentile(0.0).unwrap();
        for k in 1..=100 {
            let cur = post.percentile(k as f64 / 100.0).unwrap();
            assert!(cur >= prev, "percentile decreased at p = {}", k as f64 / 100.0);
            prev = cur;
        }
    }

    #[test]
    fn test_histogram_mass_sums_to_one() {
        let f = |x: f64| -> Result<f64> { Ok(-x * 300.0) };
        let post = BayesPosterior::compute(&f, 0.0, 0.02, &PosteriorConfig::default()).unwrap();
        let h = post.histogram(100);
        assert_eq!(h.len(), 100);
        let total: f64 = h.iter().map(|b| b.2).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
        assert!(h[0].2 > h[99].2);
    }

    #[test]
    fn test_normal_prior_shifts_median() {
        let flat_post = BayesPosterior::compute(&flat, 0.0, 1.0, &PosteriorConfig::default()).unwrap();
        let cfg = PosteriorConfig { prior: Prior::Normal { center: 0.2, width: 0.1 }, ..Default::default() };
        let post = BayesPosterior::compute(&flat, 0.0, 1.0, &cfg).unwrap();
        assert!(post.percentile(0.5).unwrap() < flat_post.percentile(0.5).unwrap());
        assert_relative_eq!(post.mode(), 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_degenerate_posterior() {
        let zero = |_x: f64| -> Result<f64> { Ok(f64::NEG_INFINITY) };
        assert!(matches!(
            BayesPosterior::compute(&zero, 0.0, 1.0, &PosteriorConfig::default()),
            Err(Error::NumericalDegeneracy(_))
        ));
        assert!(BayesPosterior::compute(&flat, 1.0, 1.0, &PosteriorConfig::default()).is_err());
        let post = BayesPosterior::compute(&flat, 0.0, 1.0, &PosteriorConfig::default()).unwrap();
        assert!(post.percentile(1.1).is_err());
    }

    #[test]
    fn test_mass_scale_limit() {
        assert_relative_eq!(mass_scale_limit(0.0025), 20.0, epsilon = 1e-12);
        assert_eq!(mass_scale_limit(0.0), NO_LIMIT);
        assert_eq!(mass_scale_limit(-1e-3), NO_LIMIT);
    }
}
