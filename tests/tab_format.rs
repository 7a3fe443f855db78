//! Tests for the tab-separated value format.

use std::fmt::Write as _;

use proptest::prelude::*;
use tempfile::TempDir;

use afmcurve::curve::{ColumnMap, ColumnSource, Curve, ExportFormat};
use afmcurve::errors::FormatError;
use afmcurve::formats::{FormatRegistry, LoadOptions};
use afmcurve::metadata::MetaData;

/// Build the tab file of spec scenario 3: 100 rows, `force[i] = i * 1e-9`,
/// segment `True` for rows 51..=99.
fn synthetic_tab_text() -> String {
    let mut text = String::new();
    text.push_str("# BEGIN METADATA\r\n");
    text.push_str("# {\r\n");
    text.push_str("#   \"imaging mode\": \"force-distance\"\r\n");
    text.push_str("# }\r\n");
    text.push_str("# END METADATA\r\n");
    text.push_str("#\r\n");
    text.push_str("# force\ttip position\tsegment\r\n");
    for i in 0..100 {
        let value = i as f64 * 1e-9;
        let segment = if i >= 51 { "True" } else { "False" };
        let _ = write!(text, "{value:e}\t{value:e}\t{segment}\r\n");
    }
    text
}

#[test]
fn test_synthetic_tab_loads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("synthetic.tab");
    std::fs::write(&path, synthetic_tab_text()).unwrap();

    let registry = FormatRegistry::with_defaults();
    let curves = registry.load_data(&path, &LoadOptions::default()).unwrap();
    assert_eq!(curves.len(), 1);
    let curve = &curves[0];

    let segment = curve.column("segment").unwrap();
    let retract_rows = segment.iter().filter(|v| **v == 1.0).count();
    assert_eq!(retract_rows, 49);

    let force = curve.column("force").unwrap();
    assert_eq!(force.len(), 100);
    assert_eq!(force[1], 1e-9);

    assert_eq!(curve.enumeration().unwrap(), 0);
    assert_eq!(curve.modality(), "force-distance");
}

#[test]
fn test_tab_detect_requires_sentinels() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bare.tab");
    std::fs::write(&path, "# force\tsegment\r\n1.0\t0\r\n").unwrap();

    let registry = FormatRegistry::with_defaults();
    assert!(matches!(
        registry.load_data(&path, &LoadOptions::default()),
        Err(FormatError::NotSupported(_))
    ));
}

#[test]
fn test_tab_unknown_columns_ignored() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("extra.tab");
    let mut text = String::new();
    text.push_str("# BEGIN METADATA\r\n# {}\r\n# END METADATA\r\n");
    text.push_str("# force\tmystery\tsegment\r\n");
    text.push_str("1e-9\t7\t0\r\n");
    text.push_str("2e-9\t7\t1\r\n");
    std::fs::write(&path, text).unwrap();

    let registry = FormatRegistry::with_defaults();
    let curves = registry.load_data(&path, &LoadOptions::default()).unwrap();
    let curve = &curves[0];
    assert!(curve.contains("force"));
    assert!(curve.contains("segment"));
    assert!(!curve.contains("mystery"));
}

#[test]
fn test_meta_override_wins_on_tab_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("synthetic.tab");
    std::fs::write(&path, synthetic_tab_text()).unwrap();

    let mut options = LoadOptions::default();
    options
        .meta_override
        .insert("spring constant".to_string(), 0.1.into());
    let registry = FormatRegistry::with_defaults();
    let curves = registry.load_data(&path, &options).unwrap();
    assert_eq!(
        curves[0]
            .metadata()
            .get("spring constant")
            .unwrap()
            .as_f64()
            .unwrap(),
        0.1
    );
}

fn curve_from_force(values: &[f64]) -> Curve {
    let mut metadata = MetaData::new();
    metadata.set("imaging mode", "force-distance").unwrap();
    metadata.set("point count", values.len()).unwrap();
    metadata.set("enum", 0).unwrap();

    let mut data = ColumnMap::new();
    data.insert("force".to_string(), ColumnSource::eager(values.to_vec()));
    let half = values.len() / 2;
    let segment: Vec<f64> = (0..values.len())
        .map(|i| if i < half { 0.0 } else { 1.0 })
        .collect();
    data.insert("segment".to_string(), ColumnSource::eager(segment));
    Curve::new(data, metadata, "force-distance").unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Round-trip property: exporting and re-loading reproduces every
    /// numeric column within floating-point tolerance.
    #[test]
    fn test_roundtrip_reproduces_force(values in prop::collection::vec(-1e-6f64..1e-6, 2..64)) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("roundtrip.tab");
        let curve = curve_from_force(&values);
        curve.export_data(&path, true, ExportFormat::Tab).unwrap();

        let registry = FormatRegistry::with_defaults();
        let curves = registry.load_data(&path, &LoadOptions::default()).unwrap();
        let force = curves[0].column("force").unwrap();
        prop_assert_eq!(force.len(), values.len());
        for (reloaded, original) in force.iter().zip(values.iter()) {
            prop_assert!((reloaded - original).abs() <= original.abs() * 1e-6 + 1e-30);
        }
        let segment_a = curves[0].column("segment").unwrap();
        let segment_b = curve.column("segment").unwrap();
        prop_assert_eq!(segment_a, segment_b);
    }
}
