//! Limit workspace: the observed spectrum plus everything needed to rebuild the model.
//!
//! The spectrum catalog is referenced by path (relative to the workspace file),
//! never copied into the workspace.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use jl_core::{BinRange, DataSet, EnsembleConfig, Error, Kappa, Result};

use crate::catalog::SpectrumCatalog;

/// Name of the parameter of interest.
pub const LAMBDA: &str = "lambda";

/// Named model parameter with its allowed range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Parameter name (`lambda`, `kappa0` .. `kappa5`).
    pub name: String,
    /// Initial / fixed value.
    pub value: f64,
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

fn default_energy() -> f64 {
    13.0
}

/// Persisted limit workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitWorkspace {
    /// Workspace name, used as report prefix.
    pub name: String,
    /// Centre-of-mass energy (TeV).
    #[serde(default = "default_energy")]
    pub energy_tev: f64,
    /// Integrated luminosity (pb⁻¹) of the observed data.
    pub luminosity: f64,
    /// Momentum bin edges (GeV).
    pub bin_edges: Vec<f64>,
    /// Observed counts per bin.
    pub observed: Vec<f64>,
    /// Parameter definitions.
    pub parameters: Vec<ParameterDef>,
    /// One-based inclusive bin range; all bins if absent.
    #[serde(default)]
    pub bin_range: Option<(i64, i64)>,
    /// Spectrum catalog path.
    pub catalog: PathBuf,
    /// Ensemble construction settings.
    #[serde(default)]
    pub ensemble: EnsembleConfig,
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl LimitWorkspace {
    /// Parse and validate workspace JSON. Relative catalog paths resolve
    /// against the current directory.
    pub fn from_json(json: &str) -> Result<Self> {
        let ws: LimitWorkspace = serde_json::from_str(json)?;
        ws.validate()?;
        Ok(ws)
    }

    /// Read a workspace file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut ws = Self::from_json(&text).map_err(|e| match e {
            Error::Json(e) => {
                Error::Configuration(format!("invalid workspace {}: {e}", path.display()))
            }
            other => other,
        })?;
        ws.base_dir = path.parent().map(Path::to_path_buf);
        Ok(ws)
    }

    /// Check data shape, parameter bounds and the bin range.
    pub fn validate(&self) -> Result<()> {
        if !(self.luminosity.is_finite() && self.luminosity > 0.0) {
            return Err(Error::Configuration(format!(
                "luminosity must be > 0, got {}",
                self.luminosity
            )));
        }
        self.get_data()?;
        for p in &self.parameters {
            if !(p.min <= p.value && p.value <= p.max) {
                return Err(Error::Configuration(format!(
                    "parameter '{}' value {} outside [{}, {}]",
                    p.name, p.value, p.min, p.max
                )));
            }
        }
        let lambda = self.get_parameter(LAMBDA)?;
        if lambda.min < 0.0 {
            return Err(Error::Configuration(format!(
                "lambda lower bound must be >= 0, got {}",
                lambda.min
            )));
        }
        self.get_bin_range()?;
        Ok(())
    }

    /// Observed dataset.
    pub fn get_data(&self) -> Result<DataSet> {
        DataSet::new(self.bin_edges.clone(), self.observed.clone())
    }

    /// Parameter definition by name.
    pub fn get_parameter(&self, name: &str) -> Result<&ParameterDef> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::Configuration(format!("workspace has no parameter '{name}'")))
    }

    /// Zero-based bin range.
    pub fn get_bin_range(&self) -> Result<BinRange> {
        let n = self.observed.len();
        match self.bin_range {
            Some((first, last)) => BinRange::from_one_based(first, last, n),
            None => BinRange::new(0, n.saturating_sub(1), n),
        }
    }

    /// κ from `kappa0` .. `kappa5`; missing components are 0.
    pub fn kappa(&self) -> Kappa {
        let mut k = [0.0; jl_core::types::N_KAPPA];
        for (i, slot) in k.iter_mut().enumerate() {
            if let Ok(p) = self.get_parameter(&format!("kappa{i}")) {
                *slot = p.value;
            }
        }
        Kappa(k)
    }

    /// `[min, max]` of λ.
    pub fn lambda_bounds(&self) -> Result<(f64, f64)> {
        let p = self.get_parameter(LAMBDA)?;
        Ok((p.min, p.max))
    }

    /// Catalog path, resolved against the workspace directory.
    pub fn catalog_path(&self) -> PathBuf {
        match &self.base_dir {
            Some(dir) if self.catalog.is_relative() => dir.join(&self.catalog),
            _ => self.catalog.clone(),
        }
    }

    /// Load the referenced spectrum catalog and check its binning.
    pub fn load_catalog(&self) -> Result<SpectrumCatalog> {
        let catalog = SpectrumCatalog::from_path(self.catalog_path())?;
        let same = catalog.bin_edges.len() == self.bin_edges.len()
            && catalog.bin_edges.iter().zip(&self.bin_edges).all(|(a, b)| (a - b).abs() <= 1e-9 * b.abs().max(1.0));
        if !same {
            log::warn!(
                "catalog binning ({} bins) differs from workspace binning ({} bins); spectra are re-integrated",
                catalog.n_bins(),
                self.observed.len()
            );
        }
        Ok(catalog)
    }
}
