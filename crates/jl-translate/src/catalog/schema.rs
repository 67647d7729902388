//! Spectrum catalog: tabulated replica spectra keyed by PDF set, member and scale.
//!
//! ```json
//! {
//!   "bin_edges": [1000.0, 1100.0, 1200.0],
//!   "nominal_set": "CT14",
//!   "sets": {
//!     "CT14": [
//!       {
//!         "member": 0,
//!         "smearing": 0,
//!         "qcd": { "nlo_1.000_1.000": [0.9, 0.55] },
//!         "ci":  { "nlo_1.000_1.000": [{ "linear": [-40, 0, 0, 0, 0, 0] }, { "linear": [-60, 0, 0, 0, 0, 0] }] }
//!       }
//!     ]
//!   }
//! }
//! ```
//!
//! Values are densities per GeV on `bin_edges`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use jl_core::traits::{CiSpectrum, Spectrum, SpectrumSource};
use jl_core::{CiCoefficients, Error, MemberId, PdfSet, ReplicaId, Result, ScalePair};

use super::spectrum::{TabulatedCiSpectrum, TabulatedSpectrum};

/// Tables of one replica directory (member + smearing draw).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberSpectra {
    /// PDF member index.
    pub member: u32,
    /// Smearing draw.
    #[serde(default)]
    pub smearing: u32,
    /// QCD density per scale choice.
    pub qcd: BTreeMap<ScalePair, Vec<f64>>,
    /// CI coefficient densities per scale choice.
    #[serde(default)]
    pub ci: BTreeMap<ScalePair, Vec<CiCoefficients>>,
}

impl MemberSpectra {
    /// Identifier of this directory.
    pub fn id(&self) -> MemberId {
        MemberId { member: self.member, smearing: self.smearing }
    }
}

/// In-memory spectrum catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumCatalog {
    /// Common binning of every table.
    pub bin_edges: Vec<f64>,
    /// PDF set providing the nominal replica (first set if absent).
    #[serde(default)]
    pub nominal_set: Option<PdfSet>,
    /// Replica directories per PDF set.
    #[serde(default)]
    pub sets: BTreeMap<PdfSet, Vec<MemberSpectra>>,
}

impl SpectrumCatalog {
    /// Empty catalog on `bin_edges`.
    pub fn new(bin_edges: Vec<f64>) -> Result<Self> {
        jl_core::types::validate_edges(&bin_edges)?;
        Ok(Self { bin_edges, nominal_set: None, sets: BTreeMap::new() })
    }

    /// Parse and validate catalog JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let catalog: SpectrumCatalog = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Read a catalog file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&bytes).map_err(|e| match e {
            Error::Json(e) => {
                Error::Configuration(format!("invalid catalog {}: {e}", path.display()))
            }
            other => other,
        })?;
        log::debug!(
            "loaded spectrum catalog {} ({} bins, {} directories)",
            path.display(),
            catalog.n_bins(),
            catalog.sets.values().map(Vec::len).sum::<usize>()
        );
        Ok(catalog)
    }

    /// Number of bins of the common binning.
    pub fn n_bins(&self) -> usize {
        self.bin_edges.len().saturating_sub(1)
    }

    /// Check table shapes, directory uniqueness and that every directory
    /// carries the scale choices of the nominal one.
    pub fn validate(&self) -> Result<()> {
        jl_core::types::validate_edges(&self.bin_edges)?;
        let n = self.n_bins();
        for (set, members) in &self.sets {
            let mut seen = std::collections::BTreeSet::new();
            for m in members {
                if !seen.insert(m.id()) {
                    return Err(Error::Validation(format!(
                        "duplicate directory {set}/{:03}/{:03}",
                        m.member, m.smearing
                    )));
                }
                for (scale, values) in &m.qcd {
                    if values.len() != n {
                        return Err(Error::Validation(format!(
                            "{set}/{:03}/{:03} {scale}: {} QCD values for {n} bins",
                            m.member,
                            m.smearing,
                            values.len()
                        )));
                    }
                }
                for (scale, values) in &m.ci {
                    if values.len() != n {
                        return Err(Error::Validation(format!(
                            "{set}/{:03}/{:03} {scale}: {} CI values for {n} bins",
                            m.member,
                            m.smearing,
                            values.len()
                        )));
                    }
                }
            }
        }
        if let Some(set) = self.nominal_set {
            if !self.sets.contains_key(&set) {
                return Err(Error::Configuration(format!("nominal set {set} is not in the catalog")));
            }
        }
        self.validate_scales()
    }

    fn validate_scales(&self) -> Result<()> {
        let Ok(set) = self.nominal_set() else {
            return Ok(());
        };
        let Ok(nominal) = self.directory(set, ReplicaId::nominal(set).member_id()) else {
            return Ok(());
        };
        for (set, members) in &self.sets {
            for m in members {
                for scale in nominal.qcd.keys() {
                    if !m.qcd.contains_key(scale) || !m.ci.contains_key(scale) {
                        return Err(Error::Configuration(format!(
                            "{set}/{:03}/{:03} has no {scale} spectrum",
                            m.member, m.smearing
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Add (or replace) the tables of one replica.
    pub fn insert(
        &mut self,
        pdf_set: PdfSet,
        member: MemberId,
        scale: ScalePair,
        qcd: Vec<f64>,
        ci: Vec<CiCoefficients>,
    ) -> Result<()> {
        let n = self.n_bins();
        if qcd.len() != n || ci.len() != n {
            return Err(Error::Validation(format!(
                "replica tables must have {n} bins (got {} QCD, {} CI)",
                qcd.len(),
                ci.len()
            )));
        }
        let members = self.sets.entry(pdf_set).or_default();
        let idx = match members.iter().position(|m| m.id() == member) {
            Some(i) => i,
            None => {
                members.push(MemberSpectra {
                    member: member.member,
                    smearing: member.smearing,
                    qcd: BTreeMap::new(),
                    ci: BTreeMap::new(),
                });
                members.len() - 1
            }
        };
        members[idx].qcd.insert(scale, qcd);
        members[idx].ci.insert(scale, ci);
        Ok(())
    }

    /// PDF set of the nominal replica.
    pub fn nominal_set(&self) -> Result<PdfSet> {
        self.nominal_set
            .or_else(|| self.sets.keys().next().copied())
            .ok_or_else(|| Error::Configuration("spectrum catalog has no PDF sets".to_string()))
    }

    fn directory(&self, pdf_set: PdfSet, member: MemberId) -> Result<&MemberSpectra> {
        self.sets
            .get(&pdf_set)
            .and_then(|ms| ms.iter().find(|m| m.id() == member))
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "no replica directory {pdf_set}/{:03}/{:03}",
                    member.member, member.smearing
                ))
            })
    }
}

impl SpectrumSource for SpectrumCatalog {
    fn members(&self, pdf_set: PdfSet) -> Result<Vec<MemberId>> {
        let mut ids: Vec<MemberId> =
            self.sets.get(&pdf_set).map(|ms| ms.iter().map(MemberSpectra::id).collect()).unwrap_or_default();
        ids.sort();
        Ok(ids)
    }

    fn scale_pairs(&self) -> Result<Vec<ScalePair>> {
        let nominal = self.nominal()?;
        let dir = self.directory(nominal.pdf_set, nominal.member_id())?;
        Ok(dir.qcd.keys().copied().collect())
    }

    fn nominal(&self) -> Result<ReplicaId> {
        let id = ReplicaId::nominal(self.nominal_set()?);
        let dir = self.directory(id.pdf_set, id.member_id())?;
        if !dir.qcd.contains_key(&id.scale) {
            return Err(Error::Configuration(format!(
                "nominal replica {} has no {} spectrum",
                id.record().directory,
                id.scale
            )));
        }
        Ok(id)
    }

    fn qcd(&self, id: &ReplicaId) -> Result<Arc<dyn Spectrum>> {
        let dir = self.directory(id.pdf_set, id.member_id())?;
        let values = dir.qcd.get(&id.scale).ok_or_else(|| {
            Error::Configuration(format!("missing QCD spectrum {}", id))
        })?;
        Ok(Arc::new(TabulatedSpectrum::new(self.bin_edges.clone(), values.clone())?))
    }

    fn ci(&self, id: &ReplicaId) -> Result<Arc<dyn CiSpectrum>> {
        let dir = self.directory(id.pdf_set, id.member_id())?;
        let values = dir.ci.get(&id.scale).ok_or_else(|| {
            Error::Configuration(format!("missing CI spectrum {}", id))
        })?;
        Ok(Arc::new(TabulatedCiSpectrum::new(self.bin_edges.clone(), values.clone())?))
    }
}
