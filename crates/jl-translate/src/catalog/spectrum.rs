//! Tabulated spectra.
//!
//! Catalog tables hold per-bin densities (rate per GeV) on a fixed binning.
//! Rates over an arbitrary interval integrate the piecewise-constant density,
//! so querying the table on its own binning returns `density × width`.

use jl_core::traits::{CiSpectrum, Spectrum};
use jl_core::{CiCoefficients, Result};

/// Piecewise-constant QCD spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct TabulatedSpectrum {
    edges: Vec<f64>,
    density: Vec<f64>,
}

impl TabulatedSpectrum {
    /// Build from bin edges and one density per bin.
    pub fn new(edges: Vec<f64>, density: Vec<f64>) -> Result<Self> {
        check_table(&edges, density.len())?;
        if let Some(bad) = density.iter().find(|v| !v.is_finite()) {
            return Err(jl_core::Error::Validation(format!("non-finite spectrum density {bad}")));
        }
        Ok(Self { edges, density })
    }

    /// Bin edges of the table.
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Density per bin.
    pub fn density(&self) -> &[f64] {
        &self.density
    }
}

impl Spectrum for TabulatedSpectrum {
    fn rate(&self, lower: f64, upper: f64) -> f64 {
        let mut total = 0.0;
        for (j, d) in self.density.iter().enumerate() {
            let w = overlap(lower, upper, self.edges[j], self.edges[j + 1]);
            if w > 0.0 {
                total += d * w;
            }
        }
        total
    }
}

/// Piecewise-constant CI expansion coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct TabulatedCiSpectrum {
    edges: Vec<f64>,
    coefficients: Vec<CiCoefficients>,
}

impl TabulatedCiSpectrum {
    /// Build from bin edges and one coefficient set per bin.
    pub fn new(edges: Vec<f64>, coefficients: Vec<CiCoefficients>) -> Result<Self> {
        check_table(&edges, coefficients.len())?;
        let finite = coefficients
            .iter()
            .all(|c| c.linear.iter().chain(c.quadratic.iter()).all(|v| v.is_finite()));
        if !finite {
            return Err(jl_core::Error::Validation("non-finite CI coefficient".to_string()));
        }
        Ok(Self { edges, coefficients })
    }
}

impl CiSpectrum for TabulatedCiSpectrum {
    fn coefficients(&self, lower: f64, upper: f64) -> CiCoefficients {
        let mut out = CiCoefficients::default();
        for (j, c) in self.coefficients.iter().enumerate() {
            let w = overlap(lower, upper, self.edges[j], self.edges[j + 1]);
            if w > 0.0 {
                out.accumulate(c, w);
            }
        }
        out
    }
}

fn check_table(edges: &[f64], n_values: usize) -> Result<()> {
    jl_core::types::validate_edges(edges)?;
    if edges.len() != n_values + 1 {
        return Err(jl_core::Error::Validation(format!(
            "table has {} edges but {} values",
            edges.len(),
            n_values
        )));
    }
    Ok(())
}

fn overlap(a_lo: f64, a_hi: f64, b_lo: f64, b_hi: f64) -> f64 {
    (a_hi.min(b_hi) - a_lo.max(b_lo)).max(0.0)
}
