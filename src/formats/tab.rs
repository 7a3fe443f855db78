//! Tab-separated value format, as written by [`Curve::export_data`].
//!
//! The text format carries an optional commented JSON metadata block
//! between `# BEGIN METADATA` and `# END METADATA` sentinels, a final
//! `#`-prefixed header line naming the columns, and one tab-separated row
//! per sample.
//!
//! [`Curve::export_data`]: crate::curve::Curve::export_data

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::curve::{is_known_column, ColumnMap, ColumnSource};
use crate::errors::FormatError;
use crate::metadata::{MetaData, MetaValue};

use super::{FormatRecipe, LoadContext, RawDataset};

/// Check whether `path` is in the tab format.
///
/// Requires both metadata sentinels and at least one tab-separated data
/// line within the first thousand lines.
pub fn detect(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    let mut has_begin = false;
    let mut has_end = false;
    let mut has_data = false;
    for line in BufReader::new(file).lines().take(1000) {
        let Ok(line) = line else {
            return false;
        };
        let line = line.trim();
        if line.starts_with("# BEGIN METADATA") {
            has_begin = true;
        } else if line.starts_with("# END METADATA") && has_begin {
            has_end = true;
        } else if line.is_empty() || line.starts_with('#') {
            continue;
        } else {
            has_data = line.contains('\t');
            break;
        }
    }
    has_begin && has_end && has_data
}

/// Load a tab-separated values file.
///
/// Column names come from the last `#` header line before the data; only
/// recognized columns are read, others are ignored. `True`/`False` cells
/// are accepted for the segment column. The file's own `path`/`enum`
/// metadata is replaced, and `meta_override` entries win last.
pub fn load_tab(path: &Path, ctx: &LoadContext<'_>) -> Result<Vec<RawDataset>, FormatError> {
    let text = std::fs::read_to_string(path)?;
    let lines: Vec<&str> = text.lines().collect();

    // commented JSON metadata block
    let mut json_lines = Vec::new();
    let mut in_json = false;
    for line in &lines {
        if line.starts_with("# BEGIN METADATA") {
            in_json = true;
        } else if line.starts_with("# END METADATA") {
            break;
        } else if in_json {
            json_lines.push(line.trim_start_matches('#').trim());
        }
    }

    let mut metadata = MetaData::new();
    if !json_lines.is_empty() {
        let parsed: serde_json::Value = serde_json::from_str(&json_lines.join("\n"))?;
        let object = parsed.as_object().ok_or_else(|| {
            FormatError::DataFileBroken(format!(
                "metadata block of '{}' is not a JSON object",
                path.display()
            ))
        })?;
        for (key, value) in object {
            if let Some(value) = MetaValue::from_json(value) {
                metadata.set(key, value)?;
            }
        }
    }
    metadata.set("path", path)?;
    metadata.set("enum", 0)?;

    // the last commented line before the data is the column header
    let mut header_line: Option<&str> = None;
    let mut data_start = None;
    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with('#') {
            header_line = Some(line);
        } else {
            data_start = Some(i);
            break;
        }
    }
    let header_line = header_line.ok_or_else(|| {
        FormatError::DataFileBroken(format!("no header found in '{}'", path.display()))
    })?;
    let data_start = data_start.ok_or_else(|| {
        FormatError::DataFileBroken(format!("no data found in '{}'", path.display()))
    })?;
    let columns: Vec<&str> = header_line
        .trim_start_matches('#')
        .trim()
        .split('\t')
        .collect();

    let rows: Vec<&str> = lines[data_start..]
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();

    let mut arrays: Vec<Option<Vec<f64>>> = columns
        .iter()
        .map(|c| is_known_column(c).then(|| vec![0.0; rows.len()]))
        .collect();
    for (row_index, row) in rows.iter().enumerate() {
        for (cell_index, cell) in row.split('\t').enumerate() {
            if cell_index >= columns.len() {
                return Err(FormatError::DataFileBroken(format!(
                    "row {row_index} of '{}' has more cells than columns",
                    path.display()
                )));
            }
            if let Some(values) = arrays.get_mut(cell_index).and_then(Option::as_mut) {
                values[row_index] = parse_cell(cell)?;
            }
        }
    }

    let mut data = ColumnMap::new();
    for (column, values) in columns.iter().zip(arrays) {
        if let Some(values) = values {
            data.insert(column.to_string(), ColumnSource::eager(values));
        }
    }

    for (key, value) in ctx.meta_override {
        metadata.set(key, value.clone())?;
    }

    if let Some(callback) = ctx.callback {
        callback(1.0);
    }
    Ok(vec![RawDataset { data, metadata }])
}

fn parse_cell(cell: &str) -> Result<f64, FormatError> {
    let cell = cell.trim();
    match cell {
        "True" => Ok(1.0),
        "False" => Ok(0.0),
        other => other.parse::<f64>().map_err(|_| {
            FormatError::DataFileBroken(format!("cannot parse table cell '{other}'"))
        }),
    }
}

/// Recipe for tab-separated value files.
pub const RECIPE_TAB: FormatRecipe = FormatRecipe {
    descr: "tab-separated values",
    maker: "afmcurve",
    suffix: ".tab",
    modalities: &["force-distance", "creep-compliance", "stress-relaxation"],
    loader: load_tab,
    detect: Some(detect),
};
