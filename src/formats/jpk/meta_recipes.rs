//! Declarative metadata recipes and the per-segment/per-curve assembler.
//!
//! Recipes map metadata keys to ordered candidate property names; the first
//! candidate present in the resolved property store wins. The candidate
//! lists cover the property spellings of the known firmware generations.

use crate::errors::FormatError;
use crate::metadata::{MetaData, MetaValue};

use super::properties::PropValue;
use super::reader::JpkReader;

/// Primary recipe: keys assigned directly into the public metadata.
const PRIMARY_RECIPE: &[(&str, &[&str])] = &[
    ("duration", &["force-segment-header.duration"]),
    ("grid center x", &["force-scan-map.position-pattern.grid.xcenter"]),
    ("grid center y", &["force-scan-map.position-pattern.grid.ycenter"]),
    ("grid shape x", &["force-scan-map.position-pattern.grid.ilength"]),
    ("grid shape y", &["force-scan-map.position-pattern.grid.jlength"]),
    ("grid size x", &["force-scan-map.position-pattern.grid.ulength"]),
    ("grid size y", &["force-scan-map.position-pattern.grid.vlength"]),
    (
        "instrument",
        &[
            "general.instrument-type",
            "force-segment-header.environment.instrument-type",
        ],
    ),
    ("point count", &["force-segment-header.num-points"]),
    (
        "position x",
        &[
            "force-segment-header.environment.xy-scanner-position-map.xy-scanner.motorstage.position.x",
            "force-segment-header.environment.xy-scanner-position-map.xy-scanner.position.x",
        ],
    ),
    (
        "position y",
        &[
            "force-segment-header.environment.xy-scanner-position-map.xy-scanner.motorstage.position.y",
            "force-segment-header.environment.xy-scanner-position-map.xy-scanner.position.y",
        ],
    ),
    (
        "sensitivity",
        &["channel.vDeflection.conversion-set.conversion.distance.scaling.multiplier"],
    ),
    ("session id", &["force-segment-header.environment.session-id"]),
    ("software version", &["file-format-version"]),
    (
        "spring constant",
        &["channel.vDeflection.conversion-set.conversion.force.scaling.multiplier"],
    ),
];

/// Secondary recipe: auxiliary values used only to compute derived keys.
const SECONDARY_RECIPE: &[(&str, &[&str])] = &[
    ("position index", &["force-segment-header.position-index"]),
    (
        "setpoint [V]",
        &["force-segment-header.settings.segment-settings.setpoint"],
    ),
    (
        "time stamp",
        &[
            "force-segment-header.time-stamp",
            "force-segment-header.environment.start-time",
        ],
    ),
    (
        "z end",
        &["force-segment-header.settings.segment-settings.z-end"],
    ),
    (
        "z start",
        &["force-segment-header.settings.segment-settings.z-start"],
    ),
];

/// Property spellings describing the style of a pause segment.
const SEGMENT_STYLE_KEYS: &[&str] = &[
    "force-segment-header.settings.segment-settings.style",
    "force-segment-header.settings.segment-settings.type",
];

/// Keys the caller must supply when the file does not carry them.
const REQUIRED_KEYS: &[&str] = &["spring constant", "sensitivity"];

fn prop_to_meta(value: &PropValue) -> MetaValue {
    match value {
        PropValue::Float(v) => MetaValue::Float(*v),
        PropValue::Str(s) => MetaValue::Str(s.clone()),
    }
}

/// Phase name of a segment ordinal within a curve of `total` segments.
fn phase_name(segment: usize, total: usize) -> &'static str {
    if segment == 0 {
        "approach"
    } else if segment + 1 == total {
        "retract"
    } else {
        "intermediate"
    }
}

/// Render a numeric position index the way instrument software prints it.
fn format_position_index(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Imaging modality of a curve, decided from its segment count.
///
/// Three-segment curves carry an intermediate pause; a constant-height
/// pause style marks stress-relaxation, anything else creep-compliance.
fn detect_modality(
    reader: &JpkReader,
    index: usize,
    segments: &[usize],
) -> Result<&'static str, FormatError> {
    match segments.len() {
        1 | 2 => Ok("force-distance"),
        3 => {
            let store = reader.properties(index, Some(segments[1]))?;
            let style = store
                .get_first(SEGMENT_STYLE_KEYS)
                .map(PropValue::as_text)
                .unwrap_or_default();
            if style.contains("height") {
                Ok("stress-relaxation")
            } else {
                Ok("creep-compliance")
            }
        }
        n => Err(FormatError::FormatMetadata(format!(
            "cannot map {n} segments to an imaging modality"
        ))),
    }
}

/// Assemble validated metadata for one segment.
pub fn assemble_segment(
    reader: &JpkReader,
    index: usize,
    segment: usize,
) -> Result<MetaData, FormatError> {
    let store = reader.properties(index, Some(segment))?;
    let segments = reader.segment_numbers(index)?;
    let mut md = MetaData::new();

    // 1. primary recipe: first present candidate wins
    for (key, candidates) in PRIMARY_RECIPE {
        if let Some(value) = store.get_first(candidates) {
            md.set(key, prop_to_meta(value))?;
        }
    }

    // overrides win over parsed values; duration and point count stay
    // per-segment and are only overridden at the curve level
    for (key, value) in reader.overrides() {
        if matches!(key.as_str(), "duration" | "point count") {
            continue;
        }
        md.set(key, value.clone())?;
    }

    let missing: Vec<String> = REQUIRED_KEYS
        .iter()
        .filter(|key| !md.contains(key))
        .map(|key| key.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(FormatError::MissingMetadata { keys: missing });
    }

    // 2. fixed fields
    md.set("imaging mode", detect_modality(reader, index, &segments)?)?;
    md.set("software", "JPK")?;
    md.set("enum", reader.enumeration(index)?)?;
    md.set("path", reader.path())?;

    // 3. secondary recipe into an auxiliary store
    let mut aux: Vec<(&str, &PropValue)> = Vec::new();
    for (key, candidates) in SECONDARY_RECIPE {
        if let Some(value) = store.get_first(candidates) {
            aux.push((key, value));
        }
    }
    let aux_get = |key: &str| aux.iter().find(|(k, _)| *k == key).map(|(_, v)| *v);

    // date and time first, so session-less archives can still derive ids
    if let Some(stamp) = aux_get("time stamp") {
        let stamp = stamp.as_text();
        let mut parts = stamp.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some(date), Some(time)) => {
                md.set("date", date)?;
                md.set("time", time)?;
            }
            _ => {
                return Err(FormatError::FormatMetadata(format!(
                    "cannot split time stamp '{stamp}'"
                )))
            }
        }
    }

    if let Some(position_index) = aux_get("position index").and_then(PropValue::as_f64) {
        let session = md.get("session id").map_err(FormatError::from)?;
        md.set(
            "curve id",
            format!("{session}:{}", format_position_index(position_index)),
        )?;
    }

    if let Some(setpoint_volts) = aux_get("setpoint [V]").and_then(PropValue::as_f64) {
        let spring_constant = md.get_f64("spring constant").map_err(FormatError::from)?;
        let sensitivity = md.get_f64("sensitivity").map_err(FormatError::from)?;
        md.set("setpoint", setpoint_volts * spring_constant * sensitivity)?;
    }

    // 4. per-segment rate and speed
    let phase = phase_name(segment, segments.len());
    let duration = md.get_f64("duration").map_err(FormatError::from)?;
    let points = md.get_f64("point count").map_err(FormatError::from)?;
    if phase != "intermediate" && duration > 0.0 {
        md.set(format!("rate {phase}").as_str(), points / duration)?;
        if let (Some(z_start), Some(z_end)) = (
            aux_get("z start").and_then(PropValue::as_f64),
            aux_get("z end").and_then(PropValue::as_f64),
        ) {
            md.set(
                format!("speed {phase}").as_str(),
                (z_end - z_start).abs() / duration,
            )?;
        }
    }
    if segments.len() == 3 {
        md.set(format!("duration {phase}").as_str(), duration)?;
        md.set(format!("point count {phase}").as_str(), points)?;
    }

    Ok(md)
}

/// Reduce all segments of a curve into per-curve metadata.
///
/// Segments are merged in reverse order so the first segment's values win
/// for every non-accumulating key (notably `time`, the curve's nominal
/// start). Durations and point counts accumulate by addition.
pub fn assemble_curve(reader: &JpkReader, index: usize) -> Result<MetaData, FormatError> {
    let segments = reader.segment_numbers(index)?;
    let mut md = MetaData::new();
    let mut duration = 0.0;
    let mut points: i64 = 0;
    let mut have_duration = false;
    let mut have_points = false;

    for segment in segments.iter().rev() {
        let segment_md = reader.get_metadata(index, Some(*segment))?;
        if let Ok(value) = segment_md.get_f64("duration") {
            duration += value;
            have_duration = true;
        }
        if let Some(value) = segment_md.get("point count").ok().and_then(|v| v.as_int()) {
            points += value;
            have_points = true;
        }
        md.update(&segment_md)?;
    }

    if have_duration {
        md.set("duration", duration)?;
    }
    if have_points {
        md.set("point count", points)?;
    }
    Ok(md)
}
