//! Frequentist coverage of the Bayesian limits on a simple counting model.
//!
//! Three bins with large QCD yields and a purely linear CI term: the posterior
//! is close to Gaussian, so the median should exclude the true λ in about half
//! of the trials and the 95% point in about 95% of them.

use std::sync::Arc;

use jl_core::{BinRange, CiCoefficients, ContactModel, Interference, PdfSet, ReplicaId};
use jl_inference::{
    CoverageConfig, CoverageTarget, CoverageTrialRunner, Ensemble, NuisanceMode, ProbabilityModel, Replica,
};
use jl_translate::{TabulatedCiSpectrum, TabulatedSpectrum};

const EDGES: [f64; 4] = [0.0, 1.0, 2.0, 3.0];

fn counting_model() -> ProbabilityModel {
    let ci: Vec<CiCoefficients> = [-1.0e5, -5.0e4, -2.0e4]
        .iter()
        .map(|&a| {
            let mut c = CiCoefficients::default();
            c.linear[0] = a;
            c
        })
        .collect();
    let replica = Replica {
        id: ReplicaId::nominal(PdfSet::Ct14),
        qcd: Arc::new(TabulatedSpectrum::new(EDGES.to_vec(), vec![1000.0, 500.0, 200.0]).unwrap()),
        ci: Arc::new(TabulatedCiSpectrum::new(EDGES.to_vec(), ci).unwrap()),
    };
    let ens = Ensemble::from_replicas(vec![replica]).unwrap();
    ProbabilityModel::new(&ens, &EDGES, 1.0).unwrap()
}

fn target() -> CoverageTarget {
    CoverageTarget {
        true_lambda: 0.001,
        kappa: ContactModel::LL.kappa(Interference::Constructive),
        bin_range: BinRange::full(3),
        lambda_range: (0.0, 0.003),
    }
}

#[test]
fn test_median_coverage_is_calibrated() {
    let model = counting_model();
    let cfg = CoverageConfig {
        n_trials: 1000,
        seed: 2024,
        percentiles: vec![0.5, 0.95],
        eval_mode: NuisanceMode::Integrate,
        ..Default::default()
    };
    let summary = CoverageTrialRunner::new(&model, cfg).run(&target()).unwrap();

    assert_eq!(summary.n_trials, 1000);
    assert_eq!(summary.n_accepted + summary.n_rejected, 1000);
    assert!(!summary.insufficient_resolution);

    let median = &summary.percentiles[0];
    assert!((median.coverage - 0.5).abs() < 0.06, "median coverage {}", median.coverage);
    // Λ_true = 1/√0.001 ≈ 31.6 TeV; the median limit scatters around it
    assert!((median.mean_limit - 31.62).abs() < 2.5, "mean limit {}", median.mean_limit);

    let p95 = &summary.percentiles[1];
    assert!((p95.coverage - 0.95).abs() < 0.03, "95% coverage {}", p95.coverage);
    assert!(p95.mean_limit < median.mean_limit);
    assert!(p95.band[0] <= p95.band[1] && p95.band[1] <= p95.band[2]);
}

#[test]
fn test_coverage_is_independent_of_thread_count() {
    let model = counting_model();
    let cfg = CoverageConfig { n_trials: 64, percentiles: vec![0.5], ..Default::default() };
    let runner = CoverageTrialRunner::new(&model, cfg);

    let single = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
    let a = single.install(|| runner.run(&target()).unwrap());
    let b = runner.run(&target()).unwrap();
    assert_eq!(a, b);
}
