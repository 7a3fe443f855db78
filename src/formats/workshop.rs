//! AFM-workshop CSV format.
//!
//! Single curves are plain CSV files with a key/value prelude:
//!
//! ```text
//! Force-Distance Curve
//! File Format:    3
//!
//! Date:    Wednesday, August 1, 2018
//! Time:    1:07:47 PM
//! Mode:    Single
//! Point:    1
//! X, um:    27.250000
//! Y, um:    27.250000
//!
//! Extend Z-Sense(nm),Extend T-B(V),Retract Z-Sense(nm),Retract T-B(V)
//! 13777.9288,0.6875,14167.9288,1.0917
//! ...
//! ```
//!
//! Quantitative maps come as a ZIP archive of such files, one per grid
//! point; the grid metadata is reconstructed from the recorded positions.

use std::io::Read;
use std::path::Path;

use crate::curve::{ColumnMap, ColumnSource};
use crate::errors::FormatError;
use crate::metadata::MetaData;

use super::{FormatRecipe, LoadContext, RawDataset};

const MONTHS: &[(&str, u32)] = &[
    ("January", 1),
    ("February", 2),
    ("March", 3),
    ("April", 4),
    ("May", 5),
    ("June", 6),
    ("July", 7),
    ("August", 8),
    ("September", 9),
    ("October", 10),
    ("November", 11),
    ("December", 12),
];

/// Parse the date spellings used by AFM-workshop software.
fn parse_ws_date(text: &str) -> Result<String, FormatError> {
    let text = text.trim();
    let tokens: Vec<&str> = text
        .split_whitespace()
        .map(|t| t.trim_matches(|c| c == ',' || c == ' '))
        .collect();
    let (day, month, year) = match text.matches(',').count() {
        // Friday, February 14, 2020
        2 if tokens.len() == 4 => (tokens[2], tokens[1], tokens[3]),
        // 15 January 2021
        0 if tokens.len() == 3 => (tokens[0], tokens[1], tokens[2]),
        _ => {
            return Err(FormatError::FormatMetadata(format!(
                "cannot parse date '{text}'"
            )))
        }
    };
    let month_number = MONTHS
        .iter()
        .find(|(name, _)| *name == month)
        .map(|(_, n)| *n)
        .ok_or_else(|| FormatError::FormatMetadata(format!("unknown month '{month}'")))?;
    let day: u32 = day
        .parse()
        .map_err(|_| FormatError::FormatMetadata(format!("bad day in '{text}'")))?;
    let year: u32 = year
        .parse()
        .map_err(|_| FormatError::FormatMetadata(format!("bad year in '{text}'")))?;
    Ok(format!("{year:04}-{month_number:02}-{day:02}"))
}

/// Load one AFM-workshop CSV body.
///
/// `expected_mode` is "single" or "mapping"; a mismatch is only logged,
/// since the files are otherwise identical.
fn load_csv_text(
    text: &str,
    source: Option<&Path>,
    ctx: &LoadContext<'_>,
    expected_mode: &str,
) -> Result<RawDataset, FormatError> {
    let lines: Vec<&str> = text.lines().collect();
    let mut metadata = MetaData::new();
    if let Some(path) = source {
        metadata.set("path", path)?;
    }

    let mut header_line = None;
    let mut header_index = 0;
    for (i, line) in lines.iter().enumerate() {
        if line.contains("Force-Distance Curve") {
            metadata.set("imaging mode", "force-distance")?;
        } else if let Some(rest) = line.strip_prefix("Software Version:") {
            metadata.set("software version", rest.trim())?;
        } else if let Some(rest) = line.strip_prefix("Date:") {
            metadata.set("date", parse_ws_date(rest)?)?;
        } else if let Some(rest) = line.strip_prefix("Time:") {
            metadata.set("time", rest.trim())?;
        } else if let Some(rest) = line.strip_prefix("Mode:") {
            let mode = rest.trim().to_ascii_lowercase();
            if mode != expected_mode {
                log::warn!("expected '{expected_mode}' curve; got '{mode}'");
            }
        } else if let Some(rest) = line.strip_prefix("Point:") {
            metadata.set("enum", rest.trim())?;
        } else if let Some(rest) = line.strip_prefix("X, um:") {
            metadata.set("position x", parse_prelude_number(rest)? * 1e-6)?;
        } else if let Some(rest) = line.strip_prefix("Y, um:") {
            metadata.set("position y", parse_prelude_number(rest)? * 1e-6)?;
        } else if let Some(rest) = line.strip_prefix("Light Lever Gain, mV/nm:") {
            let value = parse_prelude_number(rest)?;
            // the software writes 1 for uncalibrated setups
            if value != 1.0 {
                metadata.set("sensitivity", 1.0 / (value * 1e-3 / 1e-9))?;
            }
        } else if let Some(rest) = line.strip_prefix("Force Constant, nN/nm:") {
            let value = parse_prelude_number(rest)?;
            if value != 1.0 {
                metadata.set("spring constant", value)?;
            }
        } else if line.matches(',').count() >= 3 {
            header_line = Some(*line);
            header_index = i;
            break;
        }
    }
    let header_line = header_line.ok_or_else(|| {
        FormatError::NotSupported("could not parse AFM-workshop metadata".to_string())
    })?;
    if !metadata.contains("imaging mode") {
        return Err(FormatError::NotSupported(
            "unknown AFM-workshop file flavor".to_string(),
        ));
    }

    for (key, value) in ctx.meta_override {
        metadata.set(key, value.clone())?;
    }
    let missing: Vec<String> = ["sensitivity", "spring constant"]
        .iter()
        .filter(|key| !metadata.contains(key))
        .map(|key| key.to_string())
        .collect();
    let force_multiplier = if missing.is_empty() {
        Some(
            metadata.get_f64("sensitivity").map_err(FormatError::from)?
                * metadata
                    .get_f64("spring constant")
                    .map_err(FormatError::from)?,
        )
    } else {
        None
    };

    // data table
    let body = lines[header_index + 1..].join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(false)
        .from_reader(body.as_bytes());
    let column_count = header_line.trim().matches(',').count() + 1;
    let mut table: Vec<Vec<f64>> = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| FormatError::DataFileBroken(format!("bad CSV row: {e}")))?;
        if record.len() != column_count {
            return Err(FormatError::DataFileBroken(format!(
                "CSV row with {} cells, expected {column_count}",
                record.len()
            )));
        }
        let row: Result<Vec<f64>, FormatError> = record
            .iter()
            .map(|cell| {
                cell.trim().parse::<f64>().map_err(|_| {
                    FormatError::DataFileBroken(format!("bad CSV cell '{cell}'"))
                })
            })
            .collect();
        table.push(row?);
    }
    let segment_size = table.len();
    let columns: Vec<&str> = header_line.trim().split(',').collect();

    let mut height = vec![f64::NAN; 2 * segment_size];
    let mut force = vec![f64::NAN; 2 * segment_size];
    for (column_index, column) in columns.iter().enumerate() {
        let cells = || table.iter().map(move |row| row[column_index]);
        match column.trim() {
            "Extend Z-Sense(nm)" => {
                for (i, v) in cells().enumerate() {
                    height[i] = -v * 1e-9;
                }
            }
            "Retract Z-Sense(nm)" => {
                for (i, v) in cells().enumerate() {
                    height[segment_size + i] = -v * 1e-9;
                }
            }
            "Extend T-B(V)" | "Retract T-B(V)" => {
                let Some(multiplier) = force_multiplier else {
                    return Err(FormatError::MissingMetadata {
                        keys: missing.clone(),
                    });
                };
                let offset = if column.trim().starts_with("Extend") {
                    0
                } else {
                    segment_size
                };
                for (i, v) in cells().enumerate() {
                    force[offset + i] = v * multiplier;
                }
            }
            "Extend Force(nN)" => {
                for (i, v) in cells().enumerate() {
                    force[i] = v * 1e-9;
                }
            }
            "Retract Force(nN)" => {
                for (i, v) in cells().enumerate() {
                    force[segment_size + i] = v * 1e-9;
                }
            }
            other => log::warn!("unknown AFM-workshop column: {other}"),
        }
    }

    let mut data = ColumnMap::new();
    let mut segment = vec![0.0; 2 * segment_size];
    for label in segment.iter_mut().skip(segment_size) {
        *label = 1.0;
    }
    data.insert("segment".to_string(), ColumnSource::eager(segment));
    // drop incomplete columns instead of shipping NaN padding
    for (name, values) in [("height (measured)", height), ("force", force)] {
        if values.iter().any(|v| v.is_nan()) {
            log::warn!("removed incomplete column '{name}'");
        } else {
            data.insert(name.to_string(), ColumnSource::eager(values));
        }
    }

    Ok(RawDataset { data, metadata })
}

fn parse_prelude_number(text: &str) -> Result<f64, FormatError> {
    text.trim().parse::<f64>().map_err(|_| {
        FormatError::FormatMetadata(format!("bad numeric header value '{text}'"))
    })
}

/// Load a single AFM-workshop CSV file.
pub fn load_workshop_single(
    path: &Path,
    ctx: &LoadContext<'_>,
) -> Result<Vec<RawDataset>, FormatError> {
    let text = std::fs::read_to_string(path)?;
    let dataset = load_csv_text(&text, Some(path), ctx, "single")?;
    if let Some(callback) = ctx.callback {
        callback(1.0);
    }
    Ok(vec![dataset])
}

/// Load a ZIP archive of AFM-workshop CSV files recorded on a grid.
///
/// The grid metadata (center, shape, size) is reconstructed from the set of
/// recorded positions; grid indices then auto-complete per curve.
pub fn load_workshop_map(
    path: &Path,
    ctx: &LoadContext<'_>,
) -> Result<Vec<RawDataset>, FormatError> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(std::io::BufReader::new(file))?;
    let mut names: Vec<String> = archive.file_names().map(String::from).collect();
    names.sort();

    let mut datasets = Vec::new();
    for (position, name) in names.iter().enumerate() {
        let mut text = String::new();
        archive.by_name(name)?.read_to_string(&mut text)?;

        let scaled;
        let inner_ctx = LoadContext {
            callback: match ctx.callback {
                Some(callback) => {
                    let total = names.len() as f64;
                    scaled = move |x: f64| callback((position as f64 + x) / total);
                    Some(&scaled)
                }
                None => None,
            },
            meta_override: ctx.meta_override,
        };
        let mut dataset = load_csv_text(&text, None, &inner_ctx, "mapping")?;
        dataset.metadata.set("path", path)?;
        if let Ok(enumeration) = dataset.metadata.get("enum") {
            if enumeration.as_int() != Some(position as i64 + 1) {
                log::warn!(
                    "dataset 'Point' enumeration mismatch for '{name}': expected {}, got {enumeration}",
                    position + 1
                );
            }
        }
        if let Some(callback) = inner_ctx.callback {
            callback(1.0);
        }
        datasets.push(dataset);
    }

    // reconstruct grid metadata from the recorded positions
    for axis in ["x", "y"] {
        let key = format!("position {axis}");
        let mut values: Vec<f64> = datasets
            .iter()
            .filter_map(|d| d.metadata.get(&key).ok().and_then(|v| v.as_f64()))
            .collect();
        values.sort_by(f64::total_cmp);
        values.dedup();
        if values.is_empty() {
            continue;
        }
        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let span = values[count - 1] - values[0];
        // grid size includes the pixel boundaries
        let size = span * (1.0 + 1.0 / (count as f64 - 1.0));
        for dataset in &mut datasets {
            dataset.metadata.set(format!("grid center {axis}").as_str(), mean)?;
            dataset
                .metadata
                .set(format!("grid shape {axis}").as_str(), count)?;
            dataset.metadata.set(format!("grid size {axis}").as_str(), size)?;
        }
    }
    Ok(datasets)
}

/// Recipe for single AFM-workshop curves.
pub const RECIPE_WORKSHOP_SINGLE: FormatRecipe = FormatRecipe {
    descr: "AFM-workshop CSV data",
    maker: "AFM workshop",
    suffix: ".csv",
    modalities: &["force-distance"],
    loader: load_workshop_single,
    detect: None,
};

/// Recipe for zipped AFM-workshop force maps.
pub const RECIPE_WORKSHOP_MAP: FormatRecipe = FormatRecipe {
    descr: "zipped AFM-workshop map data",
    maker: "AFM workshop",
    suffix: ".zip",
    modalities: &["force-distance"],
    loader: load_workshop_map,
    detect: None,
};
