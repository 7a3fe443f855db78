use std::cell::Cell;
use std::rc::Rc;

use super::*;
use crate::metadata::MetaData;

fn fd_metadata(points: usize) -> MetaData {
    let mut md = MetaData::new();
    md.set("imaging mode", "force-distance").unwrap();
    md.set("point count", points).unwrap();
    md.set("enum", 0).unwrap();
    md
}

fn two_segment_curve() -> Curve {
    let mut data = ColumnMap::new();
    data.insert(
        "force".to_string(),
        ColumnSource::eager((0..6).map(|i| i as f64 * 1e-9).collect()),
    );
    data.insert(
        "segment".to_string(),
        ColumnSource::eager(vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]),
    );
    Curve::new(data, fd_metadata(6), "force-distance").unwrap()
}

#[test]
fn test_unrecognized_column_rejected() {
    let mut data = ColumnMap::new();
    data.insert("sideways force".to_string(), ColumnSource::eager(vec![]));
    assert!(Curve::new(data, fd_metadata(0), "force-distance").is_err());
}

#[test]
fn test_len_prefers_point_count() {
    let mut data = ColumnMap::new();
    data.insert(
        "force".to_string(),
        ColumnSource::lazy(|| panic!("len must not load the column")),
    );
    let curve = Curve::new(data, fd_metadata(42), "force-distance").unwrap();
    assert_eq!(curve.len().unwrap(), 42);
}

#[test]
fn test_len_falls_back_to_first_column() {
    let mut data = ColumnMap::new();
    data.insert(
        "force".to_string(),
        ColumnSource::eager(vec![1.0, 2.0, 3.0]),
    );
    let curve = Curve::new(data, MetaData::new(), "force-distance").unwrap();
    assert_eq!(curve.len().unwrap(), 3);
}

#[test]
fn test_lazy_column_loaded_once() {
    let counter = Rc::new(Cell::new(0usize));
    let c = counter.clone();
    let mut data = ColumnMap::new();
    data.insert(
        "force".to_string(),
        ColumnSource::lazy(move || {
            c.set(c.get() + 1);
            Ok(vec![1.0, 2.0])
        }),
    );
    let curve = Curve::new(data, fd_metadata(2), "force-distance").unwrap();
    assert_eq!(curve.column("force").unwrap(), &[1.0, 2.0]);
    assert_eq!(curve.column("force").unwrap(), &[1.0, 2.0]);
    assert_eq!(counter.get(), 1);
}

#[test]
fn test_overlay_precedence_and_reset() {
    let mut curve = two_segment_curve();
    assert_eq!(curve.column("force").unwrap()[1], 1e-9);

    curve
        .set_column("force", vec![9.0, 9.0, 9.0, 9.0, 9.0, 9.0])
        .unwrap();
    assert_eq!(curve.column("force").unwrap()[1], 9.0);

    // raw store untouched; reset reverts
    curve.reset();
    assert_eq!(curve.column("force").unwrap()[1], 1e-9);
}

#[test]
fn test_set_column_length_checked() {
    let mut curve = two_segment_curve();
    assert!(matches!(
        curve.set_column("force", vec![1.0]),
        Err(crate::errors::FormatError::LengthMismatch { expected: 6, actual: 1 })
    ));
}

#[test]
fn test_segment_views_partition_rows() {
    let curve = two_segment_curve();
    let approach = curve.approach().column("force").unwrap();
    let retract = curve.retract().column("force").unwrap();
    assert_eq!(approach.len() + retract.len(), curve.len().unwrap());
    assert_eq!(approach, vec![0.0, 1e-9, 2e-9]);
    assert_eq!(retract, vec![3e-9, 4e-9, 5e-9]);
}

#[test]
fn test_segment_mask_invalidated_on_overwrite() {
    let mut curve = two_segment_curve();
    assert_eq!(curve.approach().len().unwrap(), 3);

    // move one more row into the approach segment
    curve
        .set_column("segment", vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0])
        .unwrap();
    assert_eq!(curve.approach().len().unwrap(), 4);
    assert_eq!(curve.retract().len().unwrap(), 2);

    curve.reset();
    assert_eq!(curve.approach().len().unwrap(), 3);
}

#[test]
fn test_intermediate_only_for_three_segment_layouts() {
    let curve = two_segment_curve();
    assert!(curve.intermediate().is_err());

    let mut data = ColumnMap::new();
    data.insert(
        "segment".to_string(),
        ColumnSource::eager(vec![0.0, 1.0, 1.0, 2.0]),
    );
    let mut md = MetaData::new();
    md.set("imaging mode", "creep-compliance").unwrap();
    md.set("point count", 4).unwrap();
    let curve3 = Curve::new(data, md, "creep-compliance").unwrap();
    assert_eq!(curve3.intermediate().unwrap().len().unwrap(), 2);
    assert_eq!(curve3.retract().ordinal(), 2);
}

#[test]
fn test_three_segment_partition() {
    let labels = vec![0.0, 0.0, 1.0, 1.0, 1.0, 2.0];
    let mut data = ColumnMap::new();
    data.insert("segment".to_string(), ColumnSource::eager(labels.clone()));
    let mut md = MetaData::new();
    md.set("imaging mode", "stress-relaxation").unwrap();
    md.set("point count", labels.len()).unwrap();
    let curve = Curve::new(data, md, "stress-relaxation").unwrap();

    let mut covered = 0;
    for ordinal in 0..3u8 {
        covered += curve.segment_view(ordinal).unwrap().len().unwrap();
    }
    assert_eq!(covered, labels.len());
    assert!(curve.segment_view(3).is_err());
}
