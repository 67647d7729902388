//! Per-bin percentile curves over an ensemble of spectra.
//!
//! Used for display bands of the QCD and QCD+CI spectra and for the spread of
//! expected limits across coverage trials.

use jl_core::{Error, Result};

/// Percentiles of the 68% / 95% display bands, median included.
pub const BAND_PERCENTILES: [f64; 5] = [0.025, 0.16, 0.5, 0.84, 0.975];

/// Nearest-rank index `⌈p·(count−1)⌉` into a sorted list of `count` values.
pub fn nearest_rank(p: f64, count: usize) -> usize {
    if count == 0 {
        return 0;
    }
    let x = p * (count - 1) as f64;
    // p·(n−1) that is integral in exact arithmetic must not round up
    let rank = (x - x.abs() * 1e-12).ceil().max(0.0) as usize;
    rank.min(count - 1)
}

/// Accumulates one value per bin per member; any percentile can then be read off.
#[derive(Debug, Clone, Default)]
pub struct PercentileCurve {
    columns: Vec<Vec<f64>>,
    count: usize,
}

impl PercentileCurve {
    /// Empty curve over `n_bins` bins.
    pub fn new(n_bins: usize) -> Self {
        Self { columns: vec![Vec::new(); n_bins], count: 0 }
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.columns.len()
    }

    /// Number of members added so far.
    pub fn len(&self) -> usize {
        self.count
    }

    /// `true` before the first `add`.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Add one member (one value per bin).
    pub fn add(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(Error::Validation(format!(
                "percentile curve has {} bins, got {} values",
                self.columns.len(),
                values.len()
            )));
        }
        if values.iter().any(|v| v.is_nan()) {
            return Err(Error::Validation("NaN added to percentile curve".to_string()));
        }
        for (col, &v) in self.columns.iter_mut().zip(values) {
            col.push(v);
        }
        self.count += 1;
        Ok(())
    }

    /// Per-bin value at percentile `p` (`0 ≤ p ≤ 1`).
    pub fn curve(&self, p: f64) -> Result<Vec<f64>> {
        if !(0.0..=1.0).contains(&p) {
            return Err(Error::Validation(format!("percentile must be in [0, 1], got {p}")));
        }
        if self.count == 0 {
            return Err(Error::Validation("percentile curve has no members".to_string()));
        }
        let rank = nearest_rank(p, self.count);
        Ok(self
            .columns
            .iter()
            .map(|col| {
                let mut sorted = col.clone();
                sorted.sort_by(f64::total_cmp);
                sorted[rank]
            })
            .collect())
    }

    /// Curves for several percentiles, in the given order.
    pub fn curves(&self, percentiles: &[f64]) -> Result<Vec<Vec<f64>>> {
        percentiles.iter().map(|&p| self.curve(p)).collect()
    }
}
