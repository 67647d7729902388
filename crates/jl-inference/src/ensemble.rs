//! Replica ensembles.
//!
//! An ensemble is the nominal replica followed by N systematically varied
//! replicas, each pairing a QCD spectrum with the CI correction computed for
//! the same (PDF member, scale choice, smearing draw).

use std::fmt;
use std::sync::Arc;

use jl_core::traits::{CiSpectrum, Spectrum, SpectrumSource};
use jl_core::{Error, MemberId, PdfSet, ReplicaId, Result};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

pub use jl_core::{EnsembleConfig, SamplingPolicy};

/// Position of a replica inside an [`Ensemble`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplicaHandle(pub usize);

impl ReplicaHandle {
    /// The nominal replica.
    pub const NOMINAL: ReplicaHandle = ReplicaHandle(0);

    /// Index into the ensemble.
    pub fn index(self) -> usize {
        self.0
    }
}

/// QCD and CI spectra of one replica.
#[derive(Clone)]
pub struct Replica {
    /// Identifier.
    pub id: ReplicaId,
    /// QCD spectrum.
    pub qcd: Arc<dyn Spectrum>,
    /// CI correction for the same replica.
    pub ci: Arc<dyn CiSpectrum>,
}

impl fmt::Debug for Replica {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replica").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Ordered replicas; index 0 is the nominal one.
#[derive(Debug, Clone)]
pub struct Ensemble {
    replicas: Vec<Replica>,
}

impl Ensemble {
    /// Sample replica ids and load their spectra from `source`.
    pub fn build<S: SpectrumSource + ?Sized>(source: &S, config: &EnsembleConfig) -> Result<Self> {
        let ids = Self::sample_ids(source, config)?;
        let mut replicas = Vec::with_capacity(ids.len());
        for id in ids {
            let qcd = source.qcd(&id)?;
            let ci = source.ci(&id)?;
            replicas.push(Replica { id, qcd, ci });
        }
        log::info!(
            "ensemble: {} replicas ({:?}, sets {:?}, seed {})",
            replicas.len() - 1,
            config.policy,
            config.pdf_sets,
            config.seed
        );
        Ok(Self { replicas })
    }

    /// Replica ids the ensemble would contain, nominal first.
    ///
    /// Bootstrap draws are deterministic for a given seed.
    pub fn sample_ids<S: SpectrumSource + ?Sized>(
        source: &S,
        config: &EnsembleConfig,
    ) -> Result<Vec<ReplicaId>> {
        if config.pdf_sets.is_empty() {
            return Err(Error::Configuration("no PDF sets requested".to_string()));
        }
        let mut members: Vec<(PdfSet, MemberId)> = Vec::new();
        for &set in &config.pdf_sets {
            for m in source.members(set)? {
                if m.member == 0 && !config.include_central_member {
                    continue;
                }
                members.push((set, m));
            }
        }
        if members.is_empty() {
            return Err(Error::Configuration(format!(
                "no replica members found for PDF sets {:?}",
                config.pdf_sets
            )));
        }
        let scales = source.scale_pairs()?;
        if scales.is_empty() {
            return Err(Error::Configuration("spectrum source offers no scale choices".to_string()));
        }

        let mut ids = vec![source.nominal()?];
        match config.policy {
            SamplingPolicy::Exhaustive => {
                for &(set, m) in &members {
                    for &scale in &scales {
                        ids.push(ReplicaId::new(set, m, scale));
                    }
                }
            }
            SamplingPolicy::Bootstrap => {
                let n = config.n_replicas.unwrap_or(members.len() * scales.len());
                if n == 0 {
                    return Err(Error::Configuration("bootstrap needs n_replicas > 0".to_string()));
                }
                let mut rng = rand::rngs::StdRng::seed_from_u64(config.seed);
                for _ in 0..n {
                    let (set, m) = members[rng.random_range(0..members.len())];
                    let scale = scales[rng.random_range(0..scales.len())];
                    ids.push(ReplicaId::new(set, m, scale));
                }
            }
        }
        log::debug!(
            "{} candidate members x {} scale choices -> {} replicas",
            members.len(),
            scales.len(),
            ids.len() - 1
        );
        Ok(ids)
    }

    /// Ensemble from already loaded replicas; the first one is treated as nominal.
    pub fn from_replicas(replicas: Vec<Replica>) -> Result<Self> {
        if replicas.is_empty() {
            return Err(Error::Configuration("an ensemble needs at least one replica".to_string()));
        }
        Ok(Self { replicas })
    }

    /// Total number of replicas, nominal included.
    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    /// Always `false`.
    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    /// The nominal replica.
    pub fn nominal(&self) -> &Replica {
        &self.replicas[0]
    }

    /// Replica by handle.
    pub fn get(&self, handle: ReplicaHandle) -> Option<&Replica> {
        self.replicas.get(handle.index())
    }

    /// All replicas, nominal first.
    pub fn replicas(&self) -> &[Replica] {
        &self.replicas
    }

    /// Replicas entering averages: everything but the nominal one, or the
    /// nominal one alone when there is nothing else.
    pub fn varied(&self) -> &[Replica] {
        if self.replicas.len() > 1 { &self.replicas[1..] } else { &self.replicas[..] }
    }

    /// Replica ids in order.
    pub fn ids(&self) -> Vec<ReplicaId> {
        self.replicas.iter().map(|r| r.id).collect()
    }
}
