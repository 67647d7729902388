use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use jl_core::{ContactModel, Interference, ModelParams};
use jl_inference::{
    BayesPosterior, Ensemble, EnsembleConfig, NuisanceMode, PosteriorConfig, ProbabilityModel,
};
use jl_translate::{LimitWorkspace, SpectrumCatalog};
use std::hint::black_box;

fn load() -> (LimitWorkspace, ProbabilityModel) {
    let ws = LimitWorkspace::from_json(include_str!("../../../tests/fixtures/jet_workspace.json")).unwrap();
    let catalog = SpectrumCatalog::from_json(include_str!("../../../tests/fixtures/jet_catalog.json")).unwrap();
    let cfg = EnsembleConfig { n_replicas: Some(500), ..ws.ensemble.clone() };
    let ens = Ensemble::build(&catalog, &cfg).unwrap();
    let model = ProbabilityModel::new(&ens, &ws.bin_edges, ws.luminosity).unwrap();
    (ws, model)
}

fn bench_log_likelihood(c: &mut Criterion) {
    let (ws, model) = load();
    let data = ws.get_data().unwrap();
    let params = ModelParams::new(
        0.001,
        ContactModel::VV.kappa(Interference::Constructive),
        ws.get_bin_range().unwrap(),
    );

    let mut group = c.benchmark_group("log_likelihood_500_replicas");
    for (name, mode) in [
        ("nominal", NuisanceMode::Nominal),
        ("integrate", NuisanceMode::Integrate),
        ("marginalize", NuisanceMode::Marginalize),
    ] {
        group.bench_with_input(BenchmarkId::new("mode", name), &mode, |b, &m| {
            b.iter(|| black_box(model.log_likelihood(black_box(&data), &params, m)).unwrap())
        });
    }
    group.finish();
}

fn bench_posterior(c: &mut Criterion) {
    let (ws, model) = load();
    let data = ws.get_data().unwrap();
    let params =
        ModelParams::new(0.0, ContactModel::LL.kappa(Interference::Constructive), ws.get_bin_range().unwrap());
    let slice = model.lambda_slice(&data, params, NuisanceMode::Integrate);

    c.bench_function("posterior_400_steps", |b| {
        b.iter(|| {
            let post = BayesPosterior::compute(&slice, 0.0, 0.01, &PosteriorConfig::default()).unwrap();
            black_box(post.percentile(0.95).unwrap())
        })
    });
}

criterion_group!(benches, bench_log_likelihood, bench_posterior);
criterion_main!(benches);
