//! Common data types for JetLimits

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Number of contact-interaction couplings (κ components).
pub const N_KAPPA: usize = 6;

/// Number of packed upper-triangular quadratic CI coefficients.
pub const N_QUADRATIC: usize = N_KAPPA * (N_KAPPA + 1) / 2;

/// Named contact-interaction model.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContactModel {
    /// Left-left isoscalar
    LL,
    /// Right-right isoscalar
    RR,
    /// Vector-vector
    VV,
    /// Axial-axial
    AA,
    /// Vector minus axial
    #[serde(rename = "V-A")]
    VMinusA,
}

impl ContactModel {
    /// All models, in reporting order.
    pub const ALL: [ContactModel; 5] =
        [ContactModel::LL, ContactModel::RR, ContactModel::VV, ContactModel::AA, ContactModel::VMinusA];

    /// Conventional model name.
    pub fn name(self) -> &'static str {
        match self {
            ContactModel::LL => "LL",
            ContactModel::RR => "RR",
            ContactModel::VV => "VV",
            ContactModel::AA => "AA",
            ContactModel::VMinusA => "V-A",
        }
    }

    /// κ pattern for constructive interference.
    pub fn kappa_pattern(self) -> [f64; N_KAPPA] {
        match self {
            ContactModel::LL => [-1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            ContactModel::RR => [0.0, 0.0, 0.0, 0.0, -1.0, 0.0],
            ContactModel::VV => [-1.0, 0.0, -2.0, 0.0, -1.0, 0.0],
            ContactModel::AA => [-1.0, 0.0, 2.0, 0.0, -1.0, 0.0],
            ContactModel::VMinusA => [0.0, 0.0, -2.0, 0.0, 0.0, 0.0],
        }
    }

    /// κ vector for the given interference sign.
    pub fn kappa(self, sign: Interference) -> Kappa {
        Kappa(self.kappa_pattern()).scaled(sign.factor())
    }

    /// Upper bound on λ (TeV⁻²) beyond which the expansion is not trusted.
    pub fn lambda_cap(self, sign: Interference) -> f64 {
        match (self, sign) {
            (ContactModel::VMinusA, _) => 0.0060,
            (_, Interference::Constructive) => 0.0015,
            (_, Interference::Destructive) => 0.0040,
        }
    }
}

impl fmt::Display for ContactModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ContactModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LL" => Ok(ContactModel::LL),
            "RR" => Ok(ContactModel::RR),
            "VV" => Ok(ContactModel::VV),
            "AA" => Ok(ContactModel::AA),
            "V-A" => Ok(ContactModel::VMinusA),
            other => Err(Error::Configuration(format!(
                "unknown contact-interaction model '{other}' (expected LL, RR, VV, AA or V-A)"
            ))),
        }
    }
}

/// Sign of the interference between the contact interaction and QCD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interference {
    /// κ pattern used as is.
    Constructive,
    /// κ pattern with flipped sign.
    Destructive,
}

impl Interference {
    /// Both signs, constructive first.
    pub const ALL: [Interference; 2] = [Interference::Constructive, Interference::Destructive];

    /// `+1` or `-1`.
    pub fn factor(self) -> f64 {
        match self {
            Interference::Constructive => 1.0,
            Interference::Destructive => -1.0,
        }
    }

    /// Lowercase name used in reports and file names.
    pub fn name(self) -> &'static str {
        match self {
            Interference::Constructive => "constructive",
            Interference::Destructive => "destructive",
        }
    }
}

impl fmt::Display for Interference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Interference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "constructive" | "c" | "+" | "+1" | "1" => Ok(Interference::Constructive),
            "destructive" | "d" | "-" | "-1" => Ok(Interference::Destructive),
            other => Err(Error::Configuration(format!("unknown interference sign '{other}'"))),
        }
    }
}

/// Six-component interference-sign vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kappa(pub [f64; N_KAPPA]);

impl Kappa {
    /// All-zero κ: no contact-interaction contribution at any λ.
    pub const ZERO: Kappa = Kappa([0.0; N_KAPPA]);

    /// `true` if every component is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&k| k == 0.0)
    }

    /// Component-wise multiplication by `factor`.
    pub fn scaled(self, factor: f64) -> Self {
        Kappa(self.0.map(|k| k * factor))
    }

    /// Components as an array.
    pub fn as_array(&self) -> &[f64; N_KAPPA] {
        &self.0
    }
}

/// Contact-interaction expansion coefficients of one bin.
///
/// The CI contribution is `λ Σ κᵢ aᵢ + λ² Σ_{i≤j} κᵢ κⱼ bᵢⱼ`, with the `bᵢⱼ`
/// stored packed row-major over the upper triangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CiCoefficients {
    /// Interference terms `aᵢ`.
    #[serde(default)]
    pub linear: [f64; N_KAPPA],
    /// Pure contact terms `bᵢⱼ` (`i ≤ j`).
    #[serde(default)]
    pub quadratic: [f64; N_QUADRATIC],
}

impl Default for CiCoefficients {
    fn default() -> Self {
        Self { linear: [0.0; N_KAPPA], quadratic: [0.0; N_QUADRATIC] }
    }
}

impl CiCoefficients {
    /// Position of `bᵢⱼ` in the packed quadratic array (`i ≤ j < 6`).
    pub fn quadratic_index(i: usize, j: usize) -> usize {
        debug_assert!(i <= j && j < N_KAPPA);
        i * (2 * N_KAPPA - i + 1) / 2 + (j - i)
    }

    /// CI rate at `(lambda, kappa)`. Exactly zero when `kappa` is zero.
    pub fn contribution(&self, lambda: f64, kappa: &Kappa) -> f64 {
        if kappa.is_zero() {
            return 0.0;
        }
        let k = kappa.as_array();
        let linear: f64 = k.iter().zip(self.linear.iter()).map(|(ki, ai)| ki * ai).sum();
        let mut quadratic = 0.0;
        for i in 0..N_KAPPA {
            if k[i] == 0.0 {
                continue;
            }
            for j in i..N_KAPPA {
                quadratic += k[i] * k[j] * self.quadratic[Self::quadratic_index(i, j)];
            }
        }
        lambda * linear + lambda * lambda * quadratic
    }

    /// `self += weight * other`.
    pub fn accumulate(&mut self, other: &CiCoefficients, weight: f64) {
        for (a, b) in self.linear.iter_mut().zip(other.linear.iter()) {
            *a += weight * b;
        }
        for (a, b) in self.quadratic.iter_mut().zip(other.quadratic.iter()) {
            *a += weight * b;
        }
    }
}

/// Inclusive range of bins entering the likelihood (zero-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBinRange")]
pub struct BinRange {
    /// First bin used.
    pub first: usize,
    /// Last bin used (inclusive).
    pub last: usize,
}

impl BinRange {
    /// Checked zero-based range.
    pub fn new(first: usize, last: usize, n_bins: usize) -> Result<Self> {
        if first > last || last >= n_bins {
            return Err(Error::Validation(format!(
                "bin range [{first}, {last}] invalid for {n_bins} bins"
            )));
        }
        Ok(Self { first, last })
    }

    /// All bins.
    pub fn full(n_bins: usize) -> Self {
        Self { first: 0, last: n_bins.saturating_sub(1) }
    }

    /// Range from one-based bin numbers, clamped into `1..=n_bins`.
    ///
    /// A non-positive or oversized `last` selects the last bin; `first > last`
    /// collapses onto `last`.
    pub fn from_one_based(first: i64, last: i64, n_bins: usize) -> Result<Self> {
        if n_bins == 0 {
            return Err(Error::Validation("bin range requires at least one bin".to_string()));
        }
        let top = n_bins as i64 - 1;
        let mut first = (first - 1).clamp(0, top);
        let last = if last < 1 || last - 1 > top { top } else { last - 1 };
        if first > last {
            first = last;
        }
        Ok(Self { first: first as usize, last: last as usize })
    }

    /// Number of bins in the range.
    pub fn len(&self) -> usize {
        self.last - self.first + 1
    }

    /// Always `false`: a range holds at least one bin.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Zero-based bin indices.
    pub fn indices(&self) -> RangeInclusive<usize> {
        self.first..=self.last
    }

    /// `(first, last)` in one-based numbering.
    pub fn one_based(&self) -> (usize, usize) {
        (self.first + 1, self.last + 1)
    }
}

#[derive(Deserialize)]
struct RawBinRange {
    first: usize,
    last: usize,
}

impl TryFrom<RawBinRange> for BinRange {
    type Error = Error;

    fn try_from(raw: RawBinRange) -> Result<Self> {
        if raw.first > raw.last {
            return Err(Error::Validation(format!(
                "bin range [{}, {}] is inverted",
                raw.first, raw.last
            )));
        }
        Ok(Self { first: raw.first, last: raw.last })
    }
}

impl fmt::Display for BinRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (a, b) = self.one_based();
        write!(f, "[{a} ... {b}]")
    }
}

/// Observed (or pseudo-) counts per momentum bin.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    edges: Vec<f64>,
    counts: Vec<f64>,
}

impl DataSet {
    /// Build a dataset; edges must be strictly increasing with `counts.len() + 1` entries.
    pub fn new(edges: Vec<f64>, counts: Vec<f64>) -> Result<Self> {
        validate_edges(&edges)?;
        if edges.len() != counts.len() + 1 {
            return Err(Error::Validation(format!(
                "{} bin edges do not match {} counts",
                edges.len(),
                counts.len()
            )));
        }
        validate_counts(&counts)?;
        Ok(Self { edges, counts })
    }

    /// Same binning, different counts.
    pub fn with_counts(&self, counts: Vec<f64>) -> Result<Self> {
        if counts.len() != self.counts.len() {
            return Err(Error::Validation(format!(
                "expected {} counts, got {}",
                self.counts.len(),
                counts.len()
            )));
        }
        validate_counts(&counts)?;
        Ok(Self { edges: self.edges.clone(), counts })
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.counts.len()
    }

    /// Bin edges.
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Counts per bin.
    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    /// `(lower, upper)` edges of bin `i`.
    pub fn bin(&self, i: usize) -> (f64, f64) {
        (self.edges[i], self.edges[i + 1])
    }
}

/// Check that bin edges are finite and strictly increasing.
pub fn validate_edges(edges: &[f64]) -> Result<()> {
    if edges.len() < 2 {
        return Err(Error::Validation("need at least two bin edges".to_string()));
    }
    if edges.iter().any(|e| !e.is_finite()) {
        return Err(Error::Validation("bin edges must be finite".to_string()));
    }
    if let Some(w) = edges.windows(2).find(|w| w[1] <= w[0]) {
        return Err(Error::Validation(format!(
            "bin edges must be strictly increasing ({} then {})",
            w[0], w[1]
        )));
    }
    Ok(())
}

fn validate_counts(counts: &[f64]) -> Result<()> {
    if counts.is_empty() {
        return Err(Error::Validation("dataset has no bins".to_string()));
    }
    if let Some((i, c)) = counts.iter().enumerate().find(|(_, c)| !(c.is_finite() && **c >= 0.0)) {
        return Err(Error::Validation(format!("count in bin {i} is invalid: {c}")));
    }
    Ok(())
}

/// Parameters of one likelihood evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelParams {
    /// Signal strength `λ = 1/Λ²` (TeV⁻²).
    pub lambda: f64,
    /// Interference pattern.
    pub kappa: Kappa,
    /// Bins entering the likelihood.
    pub bin_range: BinRange,
}

impl ModelParams {
    /// Create a parameter set.
    pub fn new(lambda: f64, kappa: Kappa, bin_range: BinRange) -> Self {
        Self { lambda, kappa, bin_range }
    }

    /// Copy with a different λ.
    pub fn with_lambda(self, lambda: f64) -> Self {
        Self { lambda, ..self }
    }
}

/// `λ = 1/Λ²` for a mass scale `Λ` in TeV.
pub fn lambda_from_mass_scale(mass_scale: f64) -> Result<f64> {
    if !(mass_scale.is_finite() && mass_scale > 0.0) {
        return Err(Error::Validation(format!("mass scale must be positive, got {mass_scale}")));
    }
    Ok(1.0 / (mass_scale * mass_scale))
}

/// Parton-distribution set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PdfSet {
    /// CT14 NLO
    #[serde(rename = "CT14")]
    Ct14,
    /// MMHT2014 NLO
    #[serde(rename = "MMHT")]
    Mmht,
    /// NNPDF 3.0 NLO
    #[serde(rename = "NNPDF")]
    Nnpdf,
}

impl PdfSet {
    /// All sets.
    pub const ALL: [PdfSet; 3] = [PdfSet::Ct14, PdfSet::Mmht, PdfSet::Nnpdf];

    /// Directory name of the set.
    pub fn dir_name(self) -> &'static str {
        match self {
            PdfSet::Ct14 => "CT14",
            PdfSet::Mmht => "MMHT",
            PdfSet::Nnpdf => "NNPDF",
        }
    }
}

impl fmt::Display for PdfSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for PdfSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        if upper.starts_with("CT") {
            Ok(PdfSet::Ct14)
        } else if upper.starts_with("MM") {
            Ok(PdfSet::Mmht)
        } else if upper.starts_with("NN") {
            Ok(PdfSet::Nnpdf)
        } else {
            Err(Error::Configuration(format!("unknown PDF set '{s}'")))
        }
    }
}

/// Renormalization / factorization scale choice `(μR, μF)` in units of the jet pT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScalePair {
    /// (1/2, 1/2)
    HalfHalf,
    /// (1/2, 1)
    HalfOne,
    /// (1, 1/2)
    OneHalf,
    /// (1, 1)
    OneOne,
    /// (1, 2)
    OneTwo,
    /// (2, 1)
    TwoOne,
    /// (2, 2)
    TwoTwo,
}

impl ScalePair {
    /// The seven standard scale choices.
    pub const ALL: [ScalePair; 7] = [
        ScalePair::HalfHalf,
        ScalePair::HalfOne,
        ScalePair::OneHalf,
        ScalePair::OneOne,
        ScalePair::OneTwo,
        ScalePair::TwoOne,
        ScalePair::TwoTwo,
    ];

    /// Central choice.
    pub const NOMINAL: ScalePair = ScalePair::OneOne;

    /// `(μR, μF)` factors.
    pub fn factors(self) -> (f64, f64) {
        match self {
            ScalePair::HalfHalf => (0.5, 0.5),
            ScalePair::HalfOne => (0.5, 1.0),
            ScalePair::OneHalf => (1.0, 0.5),
            ScalePair::OneOne => (1.0, 1.0),
            ScalePair::OneTwo => (1.0, 2.0),
            ScalePair::TwoOne => (2.0, 1.0),
            ScalePair::TwoTwo => (2.0, 2.0),
        }
    }

    /// Histogram name, e.g. `nlo_1.000_0.500`.
    pub fn histogram_name(self) -> String {
        let (r, f) = self.factors();
        format!("nlo_{r:.3}_{f:.3}")
    }
}

impl fmt::Display for ScalePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.histogram_name())
    }
}

impl FromStr for ScalePair {
    type Err = Error;

    /// Accepts `nlo_1.000_0.500`, `_1.000_0.500` and `1,0.5`.
    fn from_str(s: &str) -> Result<Self> {
        let body = s.trim().trim_start_matches("nlo");
        let factors: Vec<f64> = body
            .split(|c| c == '_' || c == ',')
            .filter(|t| !t.trim().is_empty())
            .map(|t| t.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| Error::Configuration(format!("malformed scale pair '{s}'")))?;
        if factors.len() == 2 {
            for pair in ScalePair::ALL {
                let (r, f) = pair.factors();
                if (r - factors[0]).abs() < 1e-9 && (f - factors[1]).abs() < 1e-9 {
                    return Ok(pair);
                }
            }
        }
        Err(Error::Configuration(format!("unsupported scale pair '{s}'")))
    }
}

impl TryFrom<String> for ScalePair {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ScalePair> for String {
    fn from(p: ScalePair) -> String {
        p.histogram_name()
    }
}

/// One replica directory under a PDF set: PDF member plus smearing draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberId {
    /// PDF member index (0 = central member).
    pub member: u32,
    /// Detector-smearing draw (0 = unsmeared).
    #[serde(default)]
    pub smearing: u32,
}

/// Typed identifier of one sampled replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReplicaId {
    /// PDF set.
    pub pdf_set: PdfSet,
    /// PDF member index.
    pub member: u32,
    /// Smearing draw.
    pub smearing: u32,
    /// Scale choice.
    pub scale: ScalePair,
}

impl ReplicaId {
    /// Replica built from a listed member and a scale choice.
    pub fn new(pdf_set: PdfSet, member: MemberId, scale: ScalePair) -> Self {
        Self { pdf_set, member: member.member, smearing: member.smearing, scale }
    }

    /// Central member, unit scales, no smearing.
    pub fn nominal(pdf_set: PdfSet) -> Self {
        Self { pdf_set, member: 0, smearing: 0, scale: ScalePair::NOMINAL }
    }

    /// `true` for the central member with unit scales and no smearing.
    pub fn is_nominal(&self) -> bool {
        self.member == 0 && self.smearing == 0 && self.scale == ScalePair::NOMINAL
    }

    /// Member part of the identifier.
    pub fn member_id(&self) -> MemberId {
        MemberId { member: self.member, smearing: self.smearing }
    }

    /// `(directory, histogram)` record of the replica.
    pub fn record(&self) -> ReplicaRecord {
        ReplicaRecord {
            directory: format!("{}/{:03}/{:03}", self.pdf_set, self.member, self.smearing),
            histogram: self.scale.histogram_name(),
        }
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = self.record();
        write!(f, "{}:{}", r.directory, r.histogram)
    }
}

/// `(directory, histogram)` pair naming the files behind one replica.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicaRecord {
    /// Replica directory, e.g. `CT14/007/000`.
    pub directory: String,
    /// Histogram name, e.g. `nlo_1.000_2.000`.
    pub histogram: String,
}

/// How replica slots are filled from the candidate (member, scale) pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingPolicy {
    /// Independent uniform draws with replacement.
    #[default]
    Bootstrap,
    /// Full Cartesian product, no randomness.
    Exhaustive,
}

impl FromStr for SamplingPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bootstrap" => Ok(SamplingPolicy::Bootstrap),
            "exhaustive" => Ok(SamplingPolicy::Exhaustive),
            other => Err(Error::Configuration(format!("unknown sampling policy '{other}'"))),
        }
    }
}

/// Ensemble construction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Sampling policy.
    pub policy: SamplingPolicy,
    /// Number of non-nominal replicas (bootstrap only). `None` means
    /// `|members| × |scale pairs|`.
    pub n_replicas: Option<usize>,
    /// PDF sets contributing members.
    pub pdf_sets: Vec<PdfSet>,
    /// Bootstrap seed.
    pub seed: u64,
    /// Allow member 0 of each set among the candidates.
    pub include_central_member: bool,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            policy: SamplingPolicy::Bootstrap,
            n_replicas: None,
            pdf_sets: PdfSet::ALL.to_vec(),
            seed: 42,
            include_central_member: false,
        }
    }
}
