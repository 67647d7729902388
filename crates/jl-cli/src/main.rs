//! JetLimits CLI

mod config;
mod report;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use jl_core::{BinRange, ContactModel, Interference, Kappa, ModelParams, SamplingPolicy};
use jl_inference::percentile::BAND_PERCENTILES;
use jl_inference::{
    CombinationOutcome, Ensemble, EnsembleConfig, ExpectedData, LimitCalculator, LimitConfig, NuisanceMode,
    PercentileCurve, ProbabilityModel, ReplicaHandle,
};
use jl_translate::LimitWorkspace;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Parser)]
#[command(name = "jetlimits")]
#[command(about = "JetLimits - Bayesian limits on contact interactions from jet spectra")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Limits on Λ per contact model and interference sign
    Limits(LimitsArgs),

    /// Percentile bands of the QCD and QCD+CI spectra across the ensemble
    Bands {
        /// Limit workspace (JSON)
        #[arg(short, long)]
        workspace: PathBuf,

        /// Mass scale Λ (TeV) of the CI spectrum. Without it only QCD bands are produced.
        #[arg(long)]
        mass_scale: Option<f64>,

        /// Contact model of the CI spectrum
        #[arg(long, default_value = "LL")]
        model: ContactModel,

        /// Interference sign of the CI spectrum
        #[arg(long, default_value = "constructive")]
        sign: Interference,

        /// Integrated luminosity (fb⁻¹). Defaults to the workspace value.
        #[arg(long)]
        lumi: Option<f64>,

        /// Bootstrap seed of the ensemble
        #[arg(long)]
        ensemble_seed: Option<u64>,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the replicas an ensemble would contain
    Ensemble {
        /// Limit workspace (JSON)
        #[arg(short, long)]
        workspace: PathBuf,

        /// Sampling policy (bootstrap, exhaustive)
        #[arg(long)]
        policy: Option<SamplingPolicy>,

        /// Number of bootstrap replicas
        #[arg(long)]
        n_replicas: Option<usize>,

        /// Bootstrap seed
        #[arg(long)]
        ensemble_seed: Option<u64>,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print version information
    Version,
}

#[derive(Args)]
struct LimitsArgs {
    /// Limit workspace (JSON)
    #[arg(short, long)]
    workspace: PathBuf,

    /// Contact models (LL, RR, VV, AA, V-A). Defaults to all.
    models: Vec<ContactModel>,

    /// Interference sign. Defaults to both.
    #[arg(long)]
    sign: Option<Interference>,

    /// Use the observed counts instead of an Asimov dataset
    #[arg(long)]
    observed: bool,

    /// Inject a signal at this mass scale Λ (TeV) into the Asimov dataset
    #[arg(long, conflicts_with = "observed")]
    mass_scale: Option<f64>,

    /// Integrated luminosity (fb⁻¹). Defaults to the workspace value.
    #[arg(long)]
    lumi: Option<f64>,

    /// Coverage trials per combination (0 = none)
    #[arg(long)]
    ntrials: Option<usize>,

    /// Seed of the coverage trials
    #[arg(long)]
    seed: Option<u64>,

    /// Bootstrap seed of the ensemble
    #[arg(long)]
    ensemble_seed: Option<u64>,

    /// Threads (0 = auto).
    #[arg(long)]
    threads: Option<usize>,

    /// Run-config file (YAML, or JSON by extension)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for per-combination text logs
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Output file for results (pretty JSON). Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Limits(args) => cmd_limits(&args),
        Commands::Bands { workspace, mass_scale, model, sign, lumi, ensemble_seed, output } => {
            cmd_bands(&workspace, mass_scale, model, sign, lumi, ensemble_seed, output.as_ref())
        }
        Commands::Ensemble { workspace, policy, n_replicas, ensemble_seed, output } => {
            cmd_ensemble(&workspace, policy, n_replicas, ensemble_seed, output.as_ref())
        }
        Commands::Version => {
            println!("jetlimits {}", jl_core::VERSION);
            Ok(())
        }
    }
}

fn init_threads(threads: usize) {
    if threads > 0 {
        // Best-effort; if a global pool already exists, keep going.
        let _ = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global();
    }
}

fn load_workspace(path: &PathBuf) -> Result<LimitWorkspace> {
    tracing::info!(path = %path.display(), "loading workspace");
    let ws = LimitWorkspace::from_path(path)?;
    tracing::info!(name = %ws.name, bins = ws.observed.len(), "workspace loaded");
    Ok(ws)
}

/// Ensemble and model of `ws`; `lumi_fb` overrides the workspace luminosity.
fn build_model(ws: &LimitWorkspace, ensemble: &EnsembleConfig, lumi_fb: Option<f64>) -> Result<ProbabilityModel> {
    let catalog = ws.load_catalog()?;
    let ens = Ensemble::build(&catalog, ensemble)?;
    let mut model = ProbabilityModel::new(&ens, &ws.bin_edges, ws.luminosity)?;
    if let Some(l) = lumi_fb {
        model = model.with_luminosity(l * 1000.0)?;
    }
    tracing::info!(replicas = model.n_replicas(), luminosity_pb = model.luminosity(), "model built");
    Ok(model)
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}

fn cmd_limits(args: &LimitsArgs) -> Result<()> {
    let mut settings = match &args.config {
        Some(path) => config::read_run_settings(path)?,
        None => config::RunSettings::default(),
    };
    if let Some(n) = args.ntrials {
        settings.coverage.n_trials = n;
    }
    if let Some(seed) = args.seed {
        settings.coverage.seed = seed;
    }
    if let Some(t) = args.threads {
        settings.threads = t;
    }
    if args.log_dir.is_some() {
        settings.log_dir = args.log_dir.clone();
    }
    init_threads(settings.threads);

    let ws = load_workspace(&args.workspace)?;
    let mut ensemble = settings.ensemble.clone().unwrap_or_else(|| ws.ensemble.clone());
    if let Some(seed) = args.ensemble_seed {
        ensemble.seed = seed;
    }
    let model = build_model(&ws, &ensemble, args.lumi)?;
    let lumi_fb = model.luminosity() / 1000.0;

    let models = if args.models.is_empty() { ContactModel::ALL.to_vec() } else { args.models.clone() };
    let signs = match args.sign {
        Some(s) => vec![s],
        None => Interference::ALL.to_vec(),
    };
    let true_lambda = match args.mass_scale {
        Some(l) => jl_core::lambda_from_mass_scale(l)?,
        None => 0.0,
    };

    let cfg = LimitConfig {
        scan_range: ws.lambda_bounds()?,
        use_model_cap: settings.use_model_cap,
        percentiles: settings.percentiles.clone(),
        systematic_mode: settings.systematic_mode,
        bin_range: Some(ws.get_bin_range()?),
        range: settings.range,
        posterior: settings.posterior,
        coverage: (settings.coverage.n_trials > 0).then(|| settings.coverage.clone()),
        true_lambda,
        asimov_mode: settings.coverage.asimov_mode,
        histogram_bins: settings.histogram_bins,
    };
    let calc = LimitCalculator::new(&model, cfg);

    let outcomes = if args.observed {
        calc.compute_all(&ws.get_data()?, &models, &signs)
    } else if let Some(mass_scale) = args.mass_scale {
        let mut out = Vec::with_capacity(models.len() * signs.len());
        for &m in &models {
            for &s in &signs {
                let data = calc.expected_dataset(ExpectedData::Signal { mass_scale, model: m, sign: s })?;
                out.extend(calc.compute_all(&data, &[m], &[s]));
            }
        }
        out
    } else {
        calc.compute_all(&calc.expected_dataset(ExpectedData::BackgroundOnly)?, &models, &signs)
    };

    for outcome in &outcomes {
        match outcome {
            CombinationOutcome::Done(r) => {
                let last = r.with_systematics.last().map(|l| l.mass_scale).unwrap_or(jl_inference::NO_LIMIT);
                tracing::info!(model = %r.model, sign = %r.sign, upper = r.range.upper, limit = last, "combination done");
            }
            CombinationOutcome::Failed { model, sign, error } => {
                tracing::warn!(model = %model, sign = %sign, error = %error, "combination failed");
            }
        }
    }

    let created_unix_ms = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis();
    if let Some(dir) = &settings.log_dir {
        let header = report::ReportHeader {
            created_unix_ms,
            energy_tev: ws.energy_tev,
            lumi_fb,
            mass_scale: args.mass_scale,
            observed: args.observed,
        };
        report::write_logs(dir, &ws.name, &header, &outcomes)?;
    }

    let n_failed = outcomes.iter().filter(|o| matches!(o, CombinationOutcome::Failed { .. })).count();
    let output_json = serde_json::json!({
        "tool": "jetlimits",
        "tool_version": jl_core::VERSION,
        "created_unix_ms": created_unix_ms,
        "workspace": ws.name,
        "mode": if args.observed { "observed" } else { "expected" },
        "energy_tev": ws.energy_tev,
        "luminosity_fb": lumi_fb,
        "mass_scale": args.mass_scale,
        "n_replicas": model.n_replicas(),
        "combinations": outcomes,
    });
    write_json(args.output.as_ref(), output_json)?;

    if n_failed == outcomes.len() {
        anyhow::bail!("all {n_failed} combinations failed");
    }
    Ok(())
}

fn cmd_bands(
    workspace: &PathBuf,
    mass_scale: Option<f64>,
    contact: ContactModel,
    sign: Interference,
    lumi: Option<f64>,
    ensemble_seed: Option<u64>,
    output: Option<&PathBuf>,
) -> Result<()> {
    let ws = load_workspace(workspace)?;
    let mut ensemble = ws.ensemble.clone();
    if let Some(seed) = ensemble_seed {
        ensemble.seed = seed;
    }
    let model = build_model(&ws, &ensemble, lumi)?;
    let n = model.n_bins();

    let qcd_params = ModelParams::new(0.0, Kappa::ZERO, BinRange::full(n));
    let ci_params = match mass_scale {
        Some(l) => Some(ModelParams::new(jl_core::lambda_from_mass_scale(l)?, contact.kappa(sign), BinRange::full(n))),
        None => None,
    };

    let mut qcd = PercentileCurve::new(n);
    let mut ci = PercentileCurve::new(n);
    let first = if model.n_replicas() > 1 { 1 } else { 0 };
    for h in first..model.n_replicas() {
        let mode = NuisanceMode::Replica(ReplicaHandle(h));
        qcd.add(&model.expected_counts(&qcd_params, mode)?)?;
        if let Some(p) = &ci_params {
            ci.add(&model.expected_counts(p, mode)?)?;
        }
    }

    let ci_json = match &ci_params {
        Some(p) => serde_json::json!({
            "model": contact,
            "sign": sign,
            "mass_scale": mass_scale,
            "nominal": model.expected_counts(p, NuisanceMode::Nominal)?,
            "curves": ci.curves(&BAND_PERCENTILES)?,
        }),
        None => serde_json::Value::Null,
    };
    let output_json = serde_json::json!({
        "workspace": ws.name,
        "bin_edges": model.edges(),
        "observed": ws.observed,
        "luminosity_fb": model.luminosity() / 1000.0,
        "n_replicas": qcd.len(),
        "percentiles": BAND_PERCENTILES,
        "qcd": {
            "nominal": model.expected_counts(&qcd_params, NuisanceMode::Nominal)?,
            "curves": qcd.curves(&BAND_PERCENTILES)?,
        },
        "qcd_ci": ci_json,
    });
    write_json(output, output_json)
}

fn cmd_ensemble(
    workspace: &PathBuf,
    policy: Option<SamplingPolicy>,
    n_replicas: Option<usize>,
    ensemble_seed: Option<u64>,
    output: Option<&PathBuf>,
) -> Result<()> {
    let ws = load_workspace(workspace)?;
    let mut cfg = ws.ensemble.clone();
    if let Some(p) = policy {
        cfg.policy = p;
    }
    if n_replicas.is_some() {
        cfg.n_replicas = n_replicas;
    }
    if let Some(seed) = ensemble_seed {
        cfg.seed = seed;
    }
    let catalog = ws.load_catalog()?;
    let ids = Ensemble::sample_ids(&catalog, &cfg)?;

    let replicas: Vec<serde_json::Value> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let record = id.record();
            serde_json::json!({
                "handle": i,
                "id": id,
                "directory": record.directory,
                "histogram": record.histogram,
            })
        })
        .collect();
    let output_json = serde_json::json!({
        "workspace": ws.name,
        "ensemble": cfg,
        "n_replicas": ids.len() - 1,
        "replicas": replicas,
    });
    write_json(output, output_json)
}
