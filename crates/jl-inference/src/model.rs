//! Binned Poisson probability model over a replica ensemble.
//!
//! Construction evaluates every replica's QCD rate and CI coefficients per bin
//! once. Afterwards the model is immutable; clones share the tables.

use std::sync::Arc;

use jl_core::{CiCoefficients, DataSet, Error, ModelParams, ReplicaId, Result};
use jl_prob::{math, poisson};
use serde::{Deserialize, Serialize};

use crate::ensemble::{Ensemble, ReplicaHandle};

/// How systematic replicas enter the likelihood.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NuisanceMode {
    /// Nominal replica only.
    Nominal,
    /// Per-bin rates averaged over the varied replicas.
    #[default]
    Integrate,
    /// Likelihoods averaged over the varied replicas.
    Marginalize,
    /// One chosen replica.
    Replica(ReplicaHandle),
}

/// Log-likelihood as a function of λ alone.
pub trait PoiLikelihood {
    /// `ln L(λ)`.
    fn log_likelihood(&self, lambda: f64) -> Result<f64>;
}

impl<F> PoiLikelihood for F
where
    F: Fn(f64) -> Result<f64>,
{
    fn log_likelihood(&self, lambda: f64) -> Result<f64> {
        self(lambda)
    }
}

/// Best single-replica likelihood at one λ.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileLikelihood {
    /// Maximum per-replica log-likelihood.
    pub log_likelihood: f64,
    /// Replica attaining it.
    pub best: ReplicaHandle,
    /// Fraction of replicas whose likelihood underflows `f64`.
    pub underflow_fraction: f64,
}

#[derive(Debug)]
struct Tables {
    ids: Vec<ReplicaId>,
    /// `[replica][bin]` QCD rates.
    qcd: Vec<Vec<f64>>,
    /// `[replica][bin]` CI coefficients.
    ci: Vec<Vec<CiCoefficients>>,
    /// Averages over the varied replicas.
    mean_qcd: Vec<f64>,
    mean_ci: Vec<CiCoefficients>,
}

/// Poisson likelihood of binned counts given an ensemble of predictions.
#[derive(Debug, Clone)]
pub struct ProbabilityModel {
    edges: Arc<[f64]>,
    luminosity: f64,
    tables: Arc<Tables>,
}

impl ProbabilityModel {
    /// Evaluate every replica on `edges`. Rates are multiplied by `luminosity`
    /// to give expected counts.
    pub fn new(ensemble: &Ensemble, edges: &[f64], luminosity: f64) -> Result<Self> {
        jl_core::types::validate_edges(edges)?;
        check_luminosity(luminosity)?;
        let n_bins = edges.len() - 1;

        let mut qcd = Vec::with_capacity(ensemble.len());
        let mut ci = Vec::with_capacity(ensemble.len());
        for r in ensemble.replicas() {
            let mut q = Vec::with_capacity(n_bins);
            let mut c = Vec::with_capacity(n_bins);
            for b in 0..n_bins {
                let rate = r.qcd.rate(edges[b], edges[b + 1]);
                if !rate.is_finite() {
                    return Err(Error::Computation(format!(
                        "non-finite QCD rate in bin {} of replica {}",
                        b + 1,
                        r.id
                    )));
                }
                q.push(rate);
                c.push(r.ci.coefficients(edges[b], edges[b + 1]));
            }
            qcd.push(q);
            ci.push(c);
        }

        let first = if ensemble.len() > 1 { 1 } else { 0 };
        let weight = 1.0 / (ensemble.len() - first) as f64;
        let mut mean_qcd = vec![0.0; n_bins];
        let mut mean_ci = vec![CiCoefficients::default(); n_bins];
        for r in first..ensemble.len() {
            for b in 0..n_bins {
                mean_qcd[b] += weight * qcd[r][b];
                mean_ci[b].accumulate(&ci[r][b], weight);
            }
        }

        log::debug!("probability model: {} replicas x {} bins", ensemble.len(), n_bins);
        Ok(Self {
            edges: edges.into(),
            luminosity,
            tables: Arc::new(Tables { ids: ensemble.ids(), qcd, ci, mean_qcd, mean_ci }),
        })
    }

    /// Same tables, different luminosity.
    pub fn with_luminosity(&self, luminosity: f64) -> Result<Self> {
        check_luminosity(luminosity)?;
        Ok(Self { luminosity, ..self.clone() })
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// Bin edges.
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Integrated luminosity.
    pub fn luminosity(&self) -> f64 {
        self.luminosity
    }

    /// Number of replicas, nominal included.
    pub fn n_replicas(&self) -> usize {
        self.tables.ids.len()
    }

    /// Replica ids, nominal first.
    pub fn replica_ids(&self) -> &[ReplicaId] {
        &self.tables.ids
    }

    fn varied(&self) -> std::ops::Range<usize> {
        if self.n_replicas() > 1 { 1..self.n_replicas() } else { 0..1 }
    }

    fn check_handle(&self, handle: ReplicaHandle) -> Result<usize> {
        if handle.index() < self.n_replicas() {
            Ok(handle.index())
        } else {
            Err(Error::Validation(format!(
                "replica {} out of range ({} replicas)",
                handle.index(),
                self.n_replicas()
            )))
        }
    }

    fn check_params(&self, params: &ModelParams) -> Result<()> {
        if !params.lambda.is_finite() {
            return Err(Error::Validation(format!("lambda must be finite, got {}", params.lambda)));
        }
        if params.bin_range.first > params.bin_range.last || params.bin_range.last >= self.n_bins() {
            return Err(Error::Validation(format!(
                "bin range {} outside {} bins",
                params.bin_range,
                self.n_bins()
            )));
        }
        Ok(())
    }

    fn check_data(&self, data: &DataSet) -> Result<()> {
        if data.n_bins() != self.n_bins() {
            return Err(Error::Validation(format!(
                "dataset has {} bins, model has {}",
                data.n_bins(),
                self.n_bins()
            )));
        }
        let mismatch = data
            .edges()
            .iter()
            .zip(self.edges.iter())
            .position(|(a, b)| (a - b).abs() > 1e-9 * a.abs().max(b.abs()).max(1.0));
        if let Some(i) = mismatch {
            return Err(Error::Validation(format!(
                "dataset edge {i} is {}, model edge is {}",
                data.edges()[i],
                self.edges[i]
            )));
        }
        Ok(())
    }

    /// Per-bin rates (no luminosity) of one replica, all bins.
    pub fn predicted_rates(&self, params: &ModelParams, handle: ReplicaHandle) -> Result<Vec<f64>> {
        self.check_params(params)?;
        let r = self.check_handle(handle)?;
        let t = &self.tables;
        Ok((0..self.n_bins())
            .map(|b| t.qcd[r][b] + t.ci[r][b].contribution(params.lambda, &params.kappa))
            .collect())
    }

    /// Expected counts in every bin (the Asimov means).
    ///
    /// `Integrate` and `Marginalize` both use the replica-averaged rates.
    pub fn expected_counts(&self, params: &ModelParams, mode: NuisanceMode) -> Result<Vec<f64>> {
        self.check_params(params)?;
        let t = &self.tables;
        let rates: Vec<f64> = match mode {
            NuisanceMode::Nominal => self.predicted_rates(params, ReplicaHandle::NOMINAL)?,
            NuisanceMode::Replica(h) => self.predicted_rates(params, h)?,
            NuisanceMode::Integrate | NuisanceMode::Marginalize => (0..self.n_bins())
                .map(|b| t.mean_qcd[b] + t.mean_ci[b].contribution(params.lambda, &params.kappa))
                .collect(),
        };
        Ok(rates.into_iter().map(|r| r * self.luminosity).collect())
    }

    /// `ln L(data | params)` under `mode`.
    pub fn log_likelihood(&self, data: &DataSet, params: &ModelParams, mode: NuisanceMode) -> Result<f64> {
        self.check_data(data)?;
        self.check_params(params)?;
        match mode {
            NuisanceMode::Nominal => self.replica_log_likelihood(data, params, 0),
            NuisanceMode::Replica(h) => {
                let r = self.check_handle(h)?;
                self.replica_log_likelihood(data, params, r)
            }
            NuisanceMode::Integrate => {
                let t = &self.tables;
                let counts = data.counts();
                let mut ll = 0.0;
                for b in params.bin_range.indices() {
                    let rate = t.mean_qcd[b] + t.mean_ci[b].contribution(params.lambda, &params.kappa);
                    ll += poisson::logpmf(counts[b], self.luminosity * rate)?;
                }
                Ok(ll)
            }
            NuisanceMode::Marginalize => {
                let lls = self.replica_log_likelihoods(data, params)?;
                Ok(math::log_mean_exp(&lls))
            }
        }
    }

    /// Log-likelihood of every varied replica.
    pub fn replica_log_likelihoods(&self, data: &DataSet, params: &ModelParams) -> Result<Vec<f64>> {
        self.check_data(data)?;
        self.check_params(params)?;
        self.varied().map(|r| self.replica_log_likelihood(data, params, r)).collect()
    }

    /// Maximum over varied replicas, plus the fraction that underflows.
    pub fn log_profile_likelihood(&self, data: &DataSet, params: &ModelParams) -> Result<ProfileLikelihood> {
        let lls = self.replica_log_likelihoods(data, params)?;
        let floor = math::ln_denorm_min();
        let offset = self.varied().start;
        let mut best = 0usize;
        let mut n_under = 0usize;
        for (i, &ll) in lls.iter().enumerate() {
            if ll > lls[best] {
                best = i;
            }
            if ll < floor {
                n_under += 1;
            }
        }
        Ok(ProfileLikelihood {
            log_likelihood: lls[best],
            best: ReplicaHandle(best + offset),
            underflow_fraction: n_under as f64 / lls.len() as f64,
        })
    }

    fn replica_log_likelihood(&self, data: &DataSet, params: &ModelParams, r: usize) -> Result<f64> {
        let t = &self.tables;
        let counts = data.counts();
        let mut ll = 0.0;
        for b in params.bin_range.indices() {
            let rate = t.qcd[r][b] + t.ci[r][b].contribution(params.lambda, &params.kappa);
            ll += poisson::logpmf(counts[b], self.luminosity * rate)?;
        }
        Ok(ll)
    }

    /// Likelihood of `data` as a function of λ, other parameters fixed.
    pub fn lambda_slice<'a>(
        &'a self,
        data: &'a DataSet,
        params: ModelParams,
        mode: NuisanceMode,
    ) -> LambdaSlice<'a> {
        LambdaSlice { model: self, data, params, mode }
    }
}

fn check_luminosity(luminosity: f64) -> Result<()> {
    if luminosity.is_finite() && luminosity > 0.0 {
        Ok(())
    } else {
        Err(Error::Validation(format!("luminosity must be finite and > 0, got {luminosity}")))
    }
}

/// [`ProbabilityModel`] restricted to λ.
#[derive(Debug, Clone)]
pub struct LambdaSlice<'a> {
    model: &'a ProbabilityModel,
    data: &'a DataSet,
    params: ModelParams,
    mode: NuisanceMode,
}

impl PoiLikelihood for LambdaSlice<'_> {
    fn log_likelihood(&self, lambda: f64) -> Result<f64> {
        self.model.log_likelihood(self.data, &self.params.with_lambda(lambda), self.mode)
    }
}
