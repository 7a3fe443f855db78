use std::collections::BTreeMap;
use std::io::Write;

use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::archive::ArchiveCache;
use super::conversion;
use super::data;
use super::properties::{self, PropertyStore, PropValue};
use crate::errors::FormatError;

fn raw(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_parse_properties_separators() {
    let text = b"a.b=1\nc.d: two\nkey value\n# comment\n! also comment\n\n";
    let props = properties::parse_properties(text).unwrap();
    assert_eq!(props["a.b"], "1");
    assert_eq!(props["c.d"], "two");
    assert_eq!(props["key"], "value");
    assert_eq!(props.len(), 3);
}

#[test]
fn test_parse_properties_escapes_and_continuation() {
    let text = b"start-time=2020-04-01 21\\:56\\:30\npath=C\\:\\\\data\nlong=one \\\n    two\n";
    let props = properties::parse_properties(text).unwrap();
    assert_eq!(props["start-time"], "2020-04-01 21:56:30");
    assert_eq!(props["path"], "C:\\data");
    assert_eq!(props["long"], "one two");
}

#[test]
fn test_parse_properties_unicode_escape() {
    let props = properties::parse_properties(b"name=\\u00b5m\n").unwrap();
    assert_eq!(props["name"], "\u{b5}m");
    assert!(properties::parse_properties(b"name=\\u00g5\n").is_err());
}

#[test]
fn test_float_coercion() {
    let store = PropertyStore::from_raw(raw(&[
        ("numeric", "3.5e-2"),
        ("textual", "offsetmultiplier"),
    ]));
    assert_eq!(store.get("numeric"), Some(&PropValue::Float(3.5e-2)));
    assert_eq!(store.get_f64("numeric").unwrap(), 3.5e-2);
    assert!(store.get_f64("textual").is_err());
    assert_eq!(store.get_text("textual").unwrap(), "offsetmultiplier");
}

#[test]
fn test_indirection_substitution() {
    let mut props = raw(&[("channel.vDeflection.lcd-info.*", "3")]);
    let shared = raw(&[
        ("lcd-info.3.conversion-set.conversions.base", "volts"),
        ("lcd-info.3.encoder.type", "signedshort"),
        // index 30 must not leak into index 3
        ("lcd-info.30.encoder.type", "signedlong"),
    ]);
    properties::substitute_indirection(&mut props, &shared);
    assert_eq!(
        props["channel.vDeflection.conversion-set.conversions.base"],
        "volts"
    );
    assert_eq!(props["channel.vDeflection.encoder.type"], "signedshort");
    // the tag plus exactly the two index-3 suffixes
    assert_eq!(props.len(), 3);
}

#[test]
fn test_indirection_missing_match_is_silent() {
    let mut props = raw(&[("channel.vDeflection.lcd-info.*", "7")]);
    let shared = raw(&[("lcd-info.3.encoder.type", "signedshort")]);
    properties::substitute_indirection(&mut props, &shared);
    // nothing substituted, nothing raised; the gap surfaces later as a
    // missing-metadata error
    assert_eq!(props.len(), 1);
}

#[test]
fn test_general_header_fills_gaps_only() {
    let mut props = raw(&[("a", "segment")]);
    let general = raw(&[("a", "general"), ("b", "general")]);
    properties::merge_general(&mut props, &general);
    assert_eq!(props["a"], "segment");
    assert_eq!(props["b"], "general");
}

fn deflection_store() -> PropertyStore {
    PropertyStore::from_raw(raw(&[
        ("channel.vDeflection.data.encoder.type", "signedshort"),
        ("channel.vDeflection.data.encoder.scaling.offset", "-0.00728873489143207"),
        (
            "channel.vDeflection.data.encoder.scaling.multiplier",
            "3.0921021713588157E-4",
        ),
        ("channel.vDeflection.data.encoder.scaling.unit.unit", "V"),
        ("channel.vDeflection.conversion-set.conversions.list", "distance force"),
        ("channel.vDeflection.conversion-set.conversions.default", "force"),
        ("channel.vDeflection.conversion-set.conversions.base", "volts"),
        ("channel.vDeflection.conversion-set.conversion.volts.name", "Volts"),
        ("channel.vDeflection.conversion-set.conversion.distance.name", "Distance"),
        (
            "channel.vDeflection.conversion-set.conversion.distance.base-calibration-slot",
            "volts",
        ),
        (
            "channel.vDeflection.conversion-set.conversion.distance.scaling.offset",
            "0.0",
        ),
        (
            "channel.vDeflection.conversion-set.conversion.distance.scaling.multiplier",
            "7.000143623002982E-8",
        ),
        (
            "channel.vDeflection.conversion-set.conversion.distance.scaling.unit.unit",
            "m",
        ),
        ("channel.vDeflection.conversion-set.conversion.force.name", "Force"),
        (
            "channel.vDeflection.conversion-set.conversion.force.base-calibration-slot",
            "distance",
        ),
        ("channel.vDeflection.conversion-set.conversion.force.scaling.offset", "0.0"),
        (
            "channel.vDeflection.conversion-set.conversion.force.scaling.multiplier",
            "0.043493666407368466",
        ),
        (
            "channel.vDeflection.conversion-set.conversion.force.scaling.unit.unit",
            "N",
        ),
    ]))
}

#[test]
fn test_conversion_chain_matches_manual_composition() {
    let store = deflection_store();
    let transform = conversion::resolve(&store, "vDeflection", "force").unwrap();
    assert_eq!(transform.unit, "N");
    assert_eq!(transform.label, "vDeflection (Force)");
    assert_eq!(transform.steps.len(), 2);

    let sensitivity = 7.000143623002982e-8;
    let spring_constant = 0.043493666407368466;
    let mut values = vec![0.25, -1.5];
    transform.apply(&mut values);
    for (applied, raw) in values.iter().zip([0.25f64, -1.5]) {
        let manual = (raw * sensitivity) * spring_constant;
        assert!((applied - manual).abs() < 1e-30);
    }
}

#[test]
fn test_conversion_chain_default_slot_and_determinism() {
    let store = deflection_store();
    let a = conversion::resolve(&store, "vDeflection", "default").unwrap();
    let b = conversion::resolve(&store, "vDeflection", "force").unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_conversion_chain_cycle_detected() {
    let store = PropertyStore::from_raw(raw(&[
        ("channel.broken.conversion-set.conversions.base", "volts"),
        ("channel.broken.conversion-set.conversions.default", "force"),
        ("channel.broken.conversion-set.conversion.force.scaling.offset", "0"),
        ("channel.broken.conversion-set.conversion.force.scaling.multiplier", "1"),
        (
            "channel.broken.conversion-set.conversion.force.base-calibration-slot",
            "distance",
        ),
        ("channel.broken.conversion-set.conversion.distance.scaling.offset", "0"),
        ("channel.broken.conversion-set.conversion.distance.scaling.multiplier", "1"),
        (
            "channel.broken.conversion-set.conversion.distance.base-calibration-slot",
            "force",
        ),
    ]));
    assert!(matches!(
        conversion::resolve(&store, "broken", "default"),
        Err(FormatError::FormatMetadata(_))
    ));
}

#[test]
fn test_decode_raw_big_endian() {
    let bytes = [0x00, 0x01, 0xff, 0xff, 0x7f, 0xff];
    assert_eq!(
        data::decode_raw(&bytes, "signedshort").unwrap(),
        vec![1.0, -1.0, 32767.0]
    );
    assert_eq!(
        data::decode_raw(&bytes, "unsignedshort").unwrap(),
        vec![1.0, 65535.0, 32767.0]
    );
    assert_eq!(
        data::decode_raw(&[0x00, 0x00, 0x00, 0x2a], "signedinteger").unwrap(),
        vec![42.0]
    );
}

#[test]
fn test_decode_raw_rejects_unknown_encoder() {
    assert!(matches!(
        data::decode_raw(&[0, 0], "float32"),
        Err(FormatError::NotImplemented(_))
    ));
    assert!(matches!(
        data::decode_raw(&[0, 0, 0], "signedshort"),
        Err(FormatError::DataFileBroken(_))
    ));
}

#[test]
fn test_find_column_dat() {
    let members = vec![
        "segments/0/channels/height.dat".to_string(),
        "segments/0/channels/vDeflection.dat".to_string(),
        "segments/0/channels/strainGaugeHeight.dat".to_string(),
    ];
    let (channel, slot, member) = data::find_column_dat(&members, "height (measured)").unwrap();
    assert_eq!(channel, "strainGaugeHeight");
    assert_eq!(slot, "nominal");
    assert_eq!(member, "segments/0/channels/strainGaugeHeight.dat");

    let err = data::find_column_dat(&members[..1].to_vec(), "force").unwrap_err();
    assert!(err.to_string().contains("vDeflection"));
}

fn write_minimal_zip(dir: &TempDir, name: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut zip = ZipWriter::new(file);
    zip.start_file("header.properties", SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"file-format-version=2.0\n").unwrap();
    zip.finish().unwrap();
    path
}

#[test]
fn test_archive_cache_bounded() {
    let dir = TempDir::new().unwrap();
    let cache = ArchiveCache::with_capacity(2);

    let first = write_minimal_zip(&dir, "a.jpk-force");
    let handle = cache.open(&first).unwrap();
    for name in ["b.jpk-force", "c.jpk-force", "d.jpk-force"] {
        let path = write_minimal_zip(&dir, name);
        cache.open(&path).unwrap();
    }
    assert!(cache.open_handles() <= 2);

    // the evicted handle stays valid for in-flight readers
    assert!(handle.read_member("header.properties").is_ok());

    // re-opening the evicted archive yields a fresh working handle
    let reopened = cache.open(&first).unwrap();
    assert!(reopened.read_member("header.properties").is_ok());
}

#[test]
fn test_archive_cache_shares_handles() {
    let dir = TempDir::new().unwrap();
    let cache = ArchiveCache::with_capacity(4);
    let path = write_minimal_zip(&dir, "shared.jpk-force");
    let a = cache.open(&path).unwrap();
    let b = cache.open(&path).unwrap();
    assert!(std::sync::Arc::ptr_eq(&a, &b));
    assert_eq!(cache.open_handles(), 1);
}
