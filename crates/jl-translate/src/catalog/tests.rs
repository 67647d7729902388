//! Tests for the spectrum catalog

use approx::assert_relative_eq;

use super::schema::*;
use jl_core::traits::SpectrumSource;
use jl_core::{CiCoefficients, ContactModel, Interference, MemberId, PdfSet, ReplicaId, ScalePair};

fn fixture() -> SpectrumCatalog {
    let json = include_str!("../../../../tests/fixtures/jet_catalog.json");
    SpectrumCatalog::from_json(json).expect("Failed to parse jet_catalog.json")
}

#[test]
fn test_parse_catalog_fixture() {
    let cat = fixture();
    assert_eq!(cat.n_bins(), 3);
    assert_eq!(cat.nominal_set().unwrap(), PdfSet::Ct14);

    let ct14 = cat.members(PdfSet::Ct14).unwrap();
    assert_eq!(ct14.len(), 4);
    assert_eq!(ct14[0], MemberId { member: 0, smearing: 0 });
    assert_eq!(ct14[2], MemberId { member: 2, smearing: 2 });
    assert!(cat.members(PdfSet::Nnpdf).unwrap().is_empty());

    let scales = cat.scale_pairs().unwrap();
    assert_eq!(scales, vec![ScalePair::HalfHalf, ScalePair::OneOne, ScalePair::TwoTwo]);
}

#[test]
fn test_nominal_spectra_rates() {
    let cat = fixture();
    let nominal = cat.nominal().unwrap();
    assert!(nominal.is_nominal());

    let qcd = cat.qcd(&nominal).unwrap();
    assert_relative_eq!(qcd.rate(1000.0, 1100.0), 90.0, epsilon = 1e-9);
    assert_relative_eq!(qcd.rate(1100.0, 1200.0), 55.0, epsilon = 1e-9);
    assert_relative_eq!(qcd.rate(1200.0, 1300.0), 22.0, epsilon = 1e-9);

    let ci = cat.ci(&nominal).unwrap();
    let kappa = ContactModel::LL.kappa(Interference::Constructive);
    // λ·(−1)(−4000) + λ²·200000
    let lambda = 0.0025;
    assert_relative_eq!(
        ci.rate(1000.0, 1100.0, lambda, &kappa),
        lambda * 4000.0 + lambda * lambda * 200_000.0,
        epsilon = 1e-9
    );
}

#[test]
fn test_missing_replica_is_configuration_error() {
    let cat = fixture();
    let id = ReplicaId::new(PdfSet::Ct14, MemberId { member: 9, smearing: 9 }, ScalePair::OneOne);
    assert!(matches!(cat.qcd(&id), Err(jl_core::Error::Configuration(_))));
    let id = ReplicaId::new(PdfSet::Ct14, MemberId { member: 1, smearing: 1 }, ScalePair::OneTwo);
    assert!(matches!(cat.ci(&id), Err(jl_core::Error::Configuration(_))));
}

#[test]
fn test_shape_mismatch_rejected() {
    let json = include_str!("../../../../tests/fixtures/jet_catalog.json");
    let mut v: serde_json::Value = serde_json::from_str(json).unwrap();
    v["sets"]["CT14"][1]["qcd"]["nlo_1.000_1.000"] = serde_json::json!([1.0, 2.0]);
    assert!(matches!(SpectrumCatalog::from_json(&v.to_string()), Err(jl_core::Error::Validation(_))));
}

#[test]
fn test_member_missing_scale_rejected() {
    let json = include_str!("../../../../tests/fixtures/jet_catalog.json");
    let mut v: serde_json::Value = serde_json::from_str(json).unwrap();
    v["sets"]["MMHT"][1]["qcd"].as_object_mut().unwrap().remove("nlo_2.000_2.000");
    let err = SpectrumCatalog::from_json(&v.to_string()).unwrap_err();
    assert!(matches!(&err, jl_core::Error::Configuration(msg) if msg.contains("MMHT/001/001")), "{err}");

    let mut v: serde_json::Value = serde_json::from_str(json).unwrap();
    v["sets"]["CT14"][2]["ci"].as_object_mut().unwrap().remove("nlo_0.500_0.500");
    assert!(matches!(SpectrumCatalog::from_json(&v.to_string()), Err(jl_core::Error::Configuration(_))));
}

#[test]
fn test_programmatic_catalog() {
    let mut cat = SpectrumCatalog::new(vec![0.0, 1.0, 2.0]).unwrap();
    assert!(cat.nominal().is_err());

    let ci = vec![CiCoefficients::default(); 2];
    cat.insert(PdfSet::Mmht, MemberId { member: 0, smearing: 0 }, ScalePair::OneOne, vec![5.0, 3.0], ci.clone())
        .unwrap();
    cat.insert(PdfSet::Mmht, MemberId { member: 1, smearing: 0 }, ScalePair::OneOne, vec![6.0, 2.0], ci.clone())
        .unwrap();
    assert!(cat.insert(PdfSet::Mmht, MemberId { member: 2, smearing: 0 }, ScalePair::OneOne, vec![1.0], ci).is_err());

    assert_eq!(cat.nominal().unwrap(), ReplicaId::nominal(PdfSet::Mmht));
    assert_eq!(cat.members(PdfSet::Mmht).unwrap().len(), 2);
    cat.validate().unwrap();

    let roundtrip = SpectrumCatalog::from_json(&serde_json::to_string(&cat).unwrap()).unwrap();
    assert_eq!(roundtrip, cat);
    assert_eq!(roundtrip.sets[&PdfSet::Mmht][1].qcd[&ScalePair::OneOne], vec![6.0, 2.0]);
}
