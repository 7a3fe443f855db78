//! Tests for the AFM-workshop CSV format.

use std::fmt::Write as _;
use std::io::Write as _;

use tempfile::TempDir;

use afmcurve::errors::FormatError;
use afmcurve::formats::{FormatRegistry, LoadOptions};
use afmcurve::metadata::MetaValue;

fn workshop_csv(point: usize, x_um: f64, y_um: f64, calibrated: bool, mode: &str) -> String {
    let mut text = String::new();
    text.push_str("Force-Distance Curve\n");
    text.push_str("File Format:    3\n\n");
    text.push_str("Date:    Wednesday, August 1, 2018\n");
    text.push_str("Time:    1:07:47 PM\n");
    let _ = write!(text, "Mode:    {mode}\n");
    let _ = write!(text, "Point:    {point}\n");
    let _ = write!(text, "X, um:    {x_um:.6}\n");
    let _ = write!(text, "Y, um:    {y_um:.6}\n");
    if calibrated {
        text.push_str("Light Lever Gain, mV/nm:    2.000000\n");
        text.push_str("Force Constant, nN/nm:    0.050000\n");
    }
    text.push('\n');
    text.push_str("Extend Z-Sense(nm),Extend T-B(V),Retract Z-Sense(nm),Retract T-B(V)\n");
    for i in 0..50 {
        let _ = write!(
            text,
            "{:.4},{:.4},{:.4},{:.4}\n",
            13777.9 + i as f64,
            0.68 + i as f64 * 1e-4,
            14167.9 - i as f64,
            1.09 - i as f64 * 1e-4,
        );
    }
    text
}

#[test]
fn test_workshop_single_loads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("curve.csv");
    std::fs::write(&path, workshop_csv(1, 27.25, 27.25, true, "Single")).unwrap();

    let registry = FormatRegistry::with_defaults();
    let curves = registry.load_data(&path, &LoadOptions::default()).unwrap();
    assert_eq!(curves.len(), 1);
    let curve = &curves[0];
    assert_eq!(curve.len().unwrap(), 100);

    let metadata = curve.metadata();
    assert_eq!(metadata.get("date").unwrap().to_string(), "2018-08-01");
    assert_eq!(metadata.get("time").unwrap().to_string(), "13:07:47");
    assert_eq!(metadata.get("enum").unwrap(), MetaValue::Int(1));
    // mV/nm gain inverted into m/V
    let sensitivity = metadata.get("sensitivity").unwrap().as_f64().unwrap();
    assert!((sensitivity - 1.0 / 2e6).abs() < 1e-18);
    assert_eq!(
        metadata.get("spring constant").unwrap(),
        MetaValue::Float(0.05)
    );
    let position = metadata.get("position x").unwrap().as_f64().unwrap();
    assert!((position - 27.25e-6).abs() < 1e-15);

    // nm columns negated and converted to meters
    let height = curve.column("height (measured)").unwrap();
    assert!((height[0] - (-13777.9e-9)).abs() < 1e-12);

    // volts columns scaled by sensitivity * spring constant
    let force = curve.column("force").unwrap();
    assert!((force[0] - 0.68 * (1.0 / 2e6) * 0.05).abs() < 1e-15);

    // extend rows first, retract rows second
    let segment = curve.column("segment").unwrap();
    assert_eq!(segment.iter().filter(|v| **v == 0.0).count(), 50);
    assert_eq!(segment.iter().filter(|v| **v == 1.0).count(), 50);
}

#[test]
fn test_workshop_missing_calibration_recoverable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("uncalibrated.csv");
    std::fs::write(&path, workshop_csv(1, 27.25, 27.25, false, "Single")).unwrap();

    let registry = FormatRegistry::with_defaults();
    match registry.load_data(&path, &LoadOptions::default()) {
        Err(FormatError::MissingMetadata { keys }) => {
            assert_eq!(
                keys,
                vec!["sensitivity".to_string(), "spring constant".to_string()]
            );
        }
        other => panic!("expected MissingMetadata, got {other:?}"),
    }

    let mut options = LoadOptions::default();
    options.meta_override.insert("sensitivity".to_string(), 5e-7.into());
    options
        .meta_override
        .insert("spring constant".to_string(), 0.05.into());
    let curves = registry.load_data(&path, &options).unwrap();
    assert_eq!(curves.len(), 1);
    assert!(curves[0].contains("force"));
}

#[test]
fn test_workshop_map_reconstructs_grid() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("map.zip");
    let file = std::fs::File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (point, x) in [(1usize, 27.25), (2, 28.25)] {
        zip.start_file(
            format!("grid_{point:03}.csv"),
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        zip.write_all(workshop_csv(point, x, 27.25, true, "Mapping").as_bytes())
            .unwrap();
    }
    zip.finish().unwrap();

    let registry = FormatRegistry::with_defaults();
    let curves = registry.load_data(&path, &LoadOptions::default()).unwrap();
    assert_eq!(curves.len(), 2);

    for (i, curve) in curves.iter().enumerate() {
        let metadata = curve.metadata();
        assert_eq!(metadata.get("grid shape x").unwrap(), MetaValue::Int(2));
        // one unique y position: no grid size on that axis
        assert!(metadata.get("grid size y").is_err());
        assert_eq!(
            metadata.get("grid index x").unwrap(),
            MetaValue::Int(i as i64)
        );
        let center = metadata.get("grid center x").unwrap().as_f64().unwrap();
        assert!((center - 27.75e-6).abs() < 1e-12);
    }
}
