//! Plain-text limit logs, one file per (model, sign).

use anyhow::Result;
use jl_core::{ContactModel, Interference};
use jl_inference::{CombinationOutcome, CombinationResult, CoverageSummary, PercentileLimit};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Run-level facts printed at the top of every log.
#[derive(Debug, Clone)]
pub struct ReportHeader {
    pub created_unix_ms: u128,
    pub energy_tev: f64,
    pub lumi_fb: f64,
    /// Injected signal Λ (TeV) of an expected run.
    pub mass_scale: Option<f64>,
    pub observed: bool,
}

/// `_l<lumi>[_L<Λ>]_<expected|observed>`
pub fn postfix(header: &ReportHeader) -> String {
    let mut s = format!("_l{:03}", header.lumi_fb.round() as i64);
    if let Some(l) = header.mass_scale {
        s.push_str(&format!("_L{:03}", l.round() as i64));
    }
    s.push_str(if header.observed { "_observed" } else { "_expected" });
    s
}

pub fn log_file_name(prefix: &str, model: ContactModel, sign: Interference, header: &ReportHeader) -> String {
    format!("{prefix}_limit_{}_{}{}.log", model.name(), sign.name(), postfix(header))
}

fn write_limits(out: &mut String, limits: &[PercentileLimit]) {
    for l in limits {
        let _ = writeln!(out, "{:10.3} {:10.1}", l.percentile, l.mass_scale);
    }
}

fn write_coverage(out: &mut String, cov: &CoverageSummary) {
    let _ = writeln!(
        out,
        "coverage at lambda = {:.6}: {} trials, {} accepted, {} rejected",
        cov.true_lambda, cov.n_trials, cov.n_accepted, cov.n_rejected
    );
    if cov.insufficient_resolution {
        let _ = writeln!(out, "WARNING: too many rejected trials, lambda grid too coarse");
    }
    let _ = writeln!(out, "%-tile  expected limit (std)\tcoverage (err)");
    for p in &cov.percentiles {
        let _ = writeln!(
            out,
            "{:10.3} {:8.1} ({:5.1})\t{:8.3} ({:5.3})",
            p.percentile, p.mean_limit, p.std_limit, p.coverage, p.coverage_error
        );
    }
}

/// Log text of one finished combination.
pub fn render_result(header: &ReportHeader, r: &CombinationResult) -> String {
    let mut out = render_header(header, r.model, r.sign);
    let _ = writeln!(out, "kappa: {:?}", r.kappa.0);
    let _ = writeln!(
        out,
        "lambda range: {:.4} ... {:.4} 1/TeV^2{}",
        r.range.lower,
        r.range.upper,
        if r.range.exhausted { " (not converged)" } else { "" }
    );
    let _ = writeln!(out, "WITH systematic uncertainties");
    write_limits(&mut out, &r.with_systematics);
    if let Some(cov) = &r.coverage {
        write_coverage(&mut out, cov);
    }
    let _ = writeln!(out, "NO systematic uncertainties");
    write_limits(&mut out, &r.nominal);
    out
}

fn render_header(header: &ReportHeader, model: ContactModel, sign: Interference) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "created: {} (unix ms)", header.created_unix_ms);
    let _ = writeln!(out, "sqrt(s): {}TeV l: {:.1}/fb", header.energy_tev, header.lumi_fb);
    if let Some(l) = header.mass_scale {
        let _ = writeln!(out, "expected with Lambda = {l:.1} TeV");
    }
    let _ = writeln!(out, "model: {model} {sign}");
    out
}

/// Log text of any outcome, failures included.
pub fn render(header: &ReportHeader, outcome: &CombinationOutcome) -> String {
    match outcome {
        CombinationOutcome::Done(r) => render_result(header, r),
        CombinationOutcome::Failed { model, sign, error } => {
            let mut out = render_header(header, *model, *sign);
            let _ = writeln!(out, "FAILED: {error}");
            out
        }
    }
}

/// Write one log per outcome into `dir`; returns the paths written.
pub fn write_logs(
    dir: &Path,
    prefix: &str,
    header: &ReportHeader,
    outcomes: &[CombinationOutcome],
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        let (model, sign) = match outcome {
            CombinationOutcome::Done(r) => (r.model, r.sign),
            CombinationOutcome::Failed { model, sign, .. } => (*model, *sign),
        };
        let path = dir.join(log_file_name(prefix, model, sign, header));
        std::fs::write(&path, render(header, outcome))?;
        tracing::info!(path = %path.display(), "wrote limit log");
        written.push(path);
    }
    Ok(written)
}
