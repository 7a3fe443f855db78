use std::cell::Cell;
use std::rc::Rc;

use super::*;

#[test]
fn test_parse_time() {
    assert_eq!(parse_time("16:10:20").unwrap(), "16:10:20");
    assert_eq!(parse_time("6:1:2").unwrap(), "06:01:02");
    assert_eq!(parse_time("6:1:2 PM").unwrap(), "18:01:02");
    assert_eq!(parse_time("6:1:2.0 PM").unwrap(), "18:01:02");
    assert_eq!(parse_time("6:1:2.001 PM").unwrap(), "18:01:02.001");
    assert_eq!(parse_time("6:1:2.0010 PM").unwrap(), "18:01:02.001");
    assert_eq!(parse_time("12:00:01 AM").unwrap(), "00:00:01");
    assert_eq!(parse_time("17\\:02\\:33").unwrap(), "17:02:33");
}

#[test]
fn test_derived_ids() {
    let mut md = MetaData::new();
    md.set("date", "2020-04-01").unwrap();
    md.set("time", "21:56:30").unwrap();
    md.set("enum", "2").unwrap();
    assert_eq!(
        md.get("session id").unwrap(),
        MetaValue::Str("2020-04-01_21:56:30".to_string())
    );
    assert_eq!(
        md.get("curve id").unwrap(),
        MetaValue::Str("2020-04-01_21:56:30_2".to_string())
    );

    // override session
    md.set("session id", "peter").unwrap();
    assert_eq!(md.get("session id").unwrap().to_string(), "peter");
    assert_eq!(md.get("curve id").unwrap().to_string(), "peter_2");

    // override curve
    md.set("curve id", "hans").unwrap();
    assert_eq!(md.get("curve id").unwrap().to_string(), "hans");
}

#[test]
fn test_derived_ids_missing_inputs() {
    let md = MetaData::new();
    match md.get("session id") {
        Err(crate::errors::MetaDataError::NotProvided { key }) => assert_eq!(key, "date"),
        other => panic!("expected NotProvided, got {other:?}"),
    }
}

#[test]
fn test_unknown_key_rejected() {
    let mut md = MetaData::new();
    assert!(matches!(
        md.set("flux capacitance", 1.21),
        Err(crate::errors::MetaDataError::UnknownKey(_))
    ));
    assert!(matches!(
        md.get("flux capacitance"),
        Err(crate::errors::MetaDataError::UnknownKey(_))
    ));
}

#[test]
fn test_nan_assignment_dropped() {
    let mut md = MetaData::new();
    md.set("spring constant", f64::NAN).unwrap();
    assert!(!md.contains("spring constant"));
    md.set("spring constant", "nan").unwrap();
    assert!(!md.contains("spring constant"));
    md.set("spring constant", 0.05).unwrap();
    assert!(md.contains("spring constant"));
}

#[test]
fn test_segment_count_autopopulated() {
    let mut md = MetaData::new();
    md.set("imaging mode", "force-distance").unwrap();
    assert_eq!(md.get("segment count").unwrap(), MetaValue::Int(2));

    let mut md3 = MetaData::new();
    md3.set("imaging mode", "creep-compliance").unwrap();
    assert_eq!(md3.get("segment count").unwrap(), MetaValue::Int(3));

    // explicit segment count wins
    let mut mde = MetaData::new();
    mde.set("segment count", 5).unwrap();
    mde.set("imaging mode", "force-distance").unwrap();
    assert_eq!(mde.get("segment count").unwrap(), MetaValue::Int(5));
}

#[test]
fn test_unlisted_modality_rejected() {
    let mut md = MetaData::new();
    assert!(md.set("imaging mode", "tapping").is_err());
}

#[test]
fn test_grid_index_autocompletion() {
    let mut md = MetaData::new();
    md.set("position x", 2.6e-6).unwrap();
    md.set("grid size x", 10e-6).unwrap();
    md.set("grid center x", 5e-6).unwrap();
    assert!(!md.contains("grid index x"));
    md.set("grid shape x", 10).unwrap();
    // cell centers at 0.5um, 1.5um, ... -> 2.6um is nearest to index 2
    assert_eq!(md.get("grid index x").unwrap(), MetaValue::Int(2));
}

#[test]
fn test_grid_index_explicit_never_overwritten() {
    let mut md = MetaData::new();
    md.set("grid index x", 7).unwrap();
    md.set("position x", 2.6e-6).unwrap();
    md.set("grid size x", 10e-6).unwrap();
    md.set("grid center x", 5e-6).unwrap();
    md.set("grid shape x", 10).unwrap();
    // unrelated assignments re-run the auto-completion; the explicit value
    // must survive
    md.set("duration", 1.5).unwrap();
    assert_eq!(md.get("grid index x").unwrap(), MetaValue::Int(7));
}

#[test]
fn test_lazy_memoized_once_per_instance() {
    let counter = Rc::new(Cell::new(0usize));
    let c = counter.clone();
    let mut md = MetaData::new();
    md.set_lazy(
        "z range",
        LazyMetaValue::new(move || {
            c.set(c.get() + 1);
            Ok(MetaValue::Float(5e-6))
        }),
    )
    .unwrap();

    // a copy made before evaluation shares the unevaluated wrapper
    let copy = md.clone();

    assert_eq!(md.get("z range").unwrap(), MetaValue::Float(5e-6));
    assert_eq!(md.get("z range").unwrap(), MetaValue::Float(5e-6));
    assert_eq!(counter.get(), 1, "evaluated once per instance");

    // the copy evaluates independently, exactly once
    assert_eq!(copy.get("z range").unwrap(), MetaValue::Float(5e-6));
    assert_eq!(copy.get("z range").unwrap(), MetaValue::Float(5e-6));
    assert_eq!(counter.get(), 2);

    // a copy made after evaluation carries the concrete value
    let late_copy = md.clone();
    assert_eq!(late_copy.get("z range").unwrap(), MetaValue::Float(5e-6));
    assert_eq!(counter.get(), 2);
}

#[test]
fn test_time_normalized_on_set() {
    let mut md = MetaData::new();
    md.set("time", "1:07:47 PM").unwrap();
    assert_eq!(md.get("time").unwrap().to_string(), "13:07:47");
}

#[test]
fn test_integer_coercion() {
    let mut md = MetaData::new();
    md.set("point count", 199.6).unwrap();
    assert_eq!(md.get("point count").unwrap(), MetaValue::Int(200));
    md.set("grid shape x", "10").unwrap();
    assert_eq!(md.get("grid shape x").unwrap(), MetaValue::Int(10));
}

#[test]
fn test_summary_sections() {
    let mut md = MetaData::new();
    md.set("imaging mode", "force-distance").unwrap();
    md.set("spring constant", 0.05).unwrap();
    let summary = md.get_summary();
    assert!(summary.contains_key("acquisition"));
    assert!(summary.contains_key("dataset"));
    assert!(summary.contains_key("qmap"));
    assert!(summary.contains_key("setup"));
    assert!(summary.contains_key("storage"));
    // force-distance has no intermediate segment
    assert!(!summary.keys().any(|k| k.starts_with("dataset-mod")));
    let acq = &summary["acquisition"];
    assert_eq!(acq["spring constant"], MetaValue::Float(0.05));
    // unset keys default to NaN
    match acq["sensitivity"] {
        MetaValue::Float(v) => assert!(v.is_nan()),
        ref other => panic!("expected NaN, got {other:?}"),
    }

    let mut md3 = MetaData::new();
    md3.set("imaging mode", "stress-relaxation").unwrap();
    let summary3 = md3.get_summary();
    assert!(summary3.contains_key("dataset-mod stress-relaxation"));
}

#[test]
fn test_update_goes_through_validation() {
    let mut a = MetaData::new();
    a.set("duration", 2.0).unwrap();
    a.set("time", "6:1:2 PM").unwrap();
    let mut b = MetaData::new();
    b.update(&a).unwrap();
    assert_eq!(b.get("duration").unwrap(), MetaValue::Float(2.0));
    assert_eq!(b.get("time").unwrap().to_string(), "18:01:02");
}
