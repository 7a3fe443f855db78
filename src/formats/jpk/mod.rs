//! # JPK Archive Format
//!
//! Reader for JPK Instruments measurement archives (`.jpk-force`,
//! `.jpk-force-map`, `.jpk-qi-data`).
//!
//! These files are ZIP containers holding Java property files and
//! big-endian integer-encoded channel data. The property files carry the
//! recipes for converting the raw integers to SI units (see [`conversion`])
//! and a two-level key/value system where per-curve headers reference
//! de-duplicated shared blocks via indirection tags (see [`properties`]).
//!
//! Channel data and metadata are loaded lazily: a map archive with
//! thousands of curves only touches the members a consumer actually reads.

pub mod archive;
pub mod conversion;
pub mod data;
mod meta_recipes;
pub mod properties;
pub mod reader;

#[cfg(test)]
mod tests;

use std::path::Path;
use std::rc::Rc;

use crate::curve::{ColumnMap, ColumnSource};
use crate::errors::FormatError;
use crate::metadata::{LazyMetaValue, MetaValue};

use super::{FormatRecipe, LoadContext, RawDataset};

pub use reader::JpkReader;

/// Columns every JPK curve exposes.
const JPK_LOAD_COLUMNS: &[&str] = &[
    "force",
    "height (measured)",
    "height (piezo)",
    "segment",
    "time",
];

/// Load a JPK archive.
///
/// Returns one dataset per curve with lazily loaded columns, per-curve
/// metadata (including a lazy `z range`), and `meta_override` entries
/// merged last. The progress callback fires once per curve and ends at
/// exactly 1.0.
pub fn load_jpk(path: &Path, ctx: &LoadContext<'_>) -> Result<Vec<RawDataset>, FormatError> {
    let reader = Rc::new(JpkReader::open(path, ctx.meta_override.clone())?);
    let count = reader.index_count();
    let mut datasets = Vec::with_capacity(count);

    for index in 0..count {
        let mut data = ColumnMap::new();
        for column in JPK_LOAD_COLUMNS {
            let loader = reader.clone();
            data.insert(
                column.to_string(),
                ColumnSource::lazy(move || loader.get_data(column, index, None)),
            );
        }

        let mut metadata = reader.get_metadata(index, None)?;
        let piezo = reader.clone();
        metadata.set_lazy(
            "z range",
            LazyMetaValue::new(move || {
                let heights = piezo.get_data("height (piezo)", index, None)?;
                let mut min = f64::INFINITY;
                let mut max = f64::NEG_INFINITY;
                for v in heights {
                    min = min.min(v);
                    max = max.max(v);
                }
                Ok(MetaValue::Float(max - min))
            }),
        )?;

        for (key, value) in ctx.meta_override {
            metadata.set(key, value.clone())?;
        }

        datasets.push(RawDataset { data, metadata });
        if let Some(callback) = ctx.callback {
            callback((index + 1) as f64 / count as f64);
        }
    }
    if count == 0 {
        if let Some(callback) = ctx.callback {
            callback(1.0);
        }
    }
    Ok(datasets)
}

/// Check whether `path` is a structurally valid JPK archive.
///
/// Only the container structure is probed; missing calibration metadata is
/// deliberately not a detection failure, so such files still reach the
/// loader and report a recoverable missing-metadata error there.
pub fn detect(path: &Path) -> bool {
    match JpkReader::open(path, Default::default()) {
        Ok(reader) => reader.index_count() > 0 && reader.index_path(0).is_ok(),
        Err(_) => false,
    }
}

/// Recipe for single-curve force archives.
pub const RECIPE_JPK_FORCE: FormatRecipe = FormatRecipe {
    descr: "binary FD data",
    maker: "JPK Instruments",
    suffix: ".jpk-force",
    modalities: &["force-distance", "creep-compliance", "stress-relaxation"],
    loader: load_jpk,
    detect: Some(detect),
};

/// Recipe for quantitative force-map archives.
pub const RECIPE_JPK_FORCE_MAP: FormatRecipe = FormatRecipe {
    descr: "binary QMap data",
    maker: "JPK Instruments",
    suffix: ".jpk-force-map",
    modalities: &["force-distance", "creep-compliance", "stress-relaxation"],
    loader: load_jpk,
    detect: Some(detect),
};

/// Recipe for quantitative imaging archives.
pub const RECIPE_JPK_QI_DATA: FormatRecipe = FormatRecipe {
    descr: "binary QMap data",
    maker: "JPK Instruments",
    suffix: ".jpk-qi-data",
    modalities: &["force-distance", "creep-compliance", "stress-relaxation"],
    loader: load_jpk,
    detect: Some(detect),
};
