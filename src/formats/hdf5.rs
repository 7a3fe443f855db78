//! HDF5 archival format (requires the `hdf5` cargo feature and libhdf5).
//!
//! The layout matches [`Curve::export_data`]: one group per curve keyed by
//! the string-encoded enumeration index, group attributes holding the
//! metadata, one dataset per column with a `unit` attribute.
//!
//! [`Curve::export_data`]: crate::curve::Curve::export_data

use std::path::Path;

use hdf5::types::VarLenUnicode;

use crate::curve::{is_known_column, ColumnMap, ColumnSource};
use crate::errors::FormatError;
use crate::metadata::{MetaData, MetaValue};

use super::{FormatRecipe, LoadContext, RawDataset};

fn h5err(e: hdf5::Error) -> FormatError {
    FormatError::FormatMetadata(format!("HDF5 error: {e}"))
}

/// Check whether `path` is an afmcurve/afmformats-style HDF5 file.
pub fn detect(path: &Path) -> bool {
    let Ok(file) = hdf5::File::open(path) else {
        return false;
    };
    file.attr("software").is_ok()
        && file.attr("software version").is_ok()
        && file.link_exists("0")
}

fn read_attr(attr: &hdf5::Attribute) -> Option<MetaValue> {
    if let Ok(text) = attr.read_scalar::<VarLenUnicode>() {
        return Some(MetaValue::Str(text.as_str().to_string()));
    }
    if let Ok(value) = attr.read_scalar::<i64>() {
        return Some(MetaValue::Int(value));
    }
    if let Ok(value) = attr.read_scalar::<f64>() {
        return Some(MetaValue::Float(value));
    }
    None
}

/// Load curves from an HDF5 file.
pub fn load_hdf5(path: &Path, ctx: &LoadContext<'_>) -> Result<Vec<RawDataset>, FormatError> {
    let file = hdf5::File::open(path).map_err(h5err)?;
    let mut names = file.member_names().map_err(h5err)?;
    names.sort_by_key(|n| n.parse::<u64>().unwrap_or(u64::MAX));

    let count = names.len();
    let mut datasets = Vec::with_capacity(count);
    for (position, name) in names.iter().enumerate() {
        let group = file.group(name).map_err(h5err)?;

        let mut metadata = MetaData::new();
        for attr_name in group.attr_names().map_err(h5err)? {
            let attr = group.attr(&attr_name).map_err(h5err)?;
            if let Some(value) = read_attr(&attr) {
                metadata.set(&attr_name, value)?;
            }
        }
        metadata.set("path", path)?;
        metadata.set(
            "enum",
            name.parse::<i64>().map_err(|_| {
                FormatError::FormatMetadata(format!("non-integer curve group '{name}'"))
            })?,
        )?;
        for (key, value) in ctx.meta_override {
            metadata.set(key, value.clone())?;
        }

        let mut data = ColumnMap::new();
        for column in group.member_names().map_err(h5err)? {
            if !is_known_column(&column) {
                log::warn!("skipping undocumented column '{column}' in '{name}'");
                continue;
            }
            let dataset = group.dataset(&column).map_err(h5err)?;
            let values = dataset.read_1d::<f64>().map_err(h5err)?.to_vec();
            data.insert(column, ColumnSource::eager(values));
        }
        datasets.push(RawDataset { data, metadata });
        if let Some(callback) = ctx.callback {
            callback((position + 1) as f64 / count as f64);
        }
    }
    if count == 0 {
        if let Some(callback) = ctx.callback {
            callback(1.0);
        }
    }
    Ok(datasets)
}

/// Recipe for the HDF5 archival format.
pub const RECIPE_HDF5: FormatRecipe = FormatRecipe {
    descr: "HDF5-based",
    maker: "afmcurve",
    suffix: ".h5",
    modalities: &["force-distance", "creep-compliance", "stress-relaxation"],
    loader: load_hdf5,
    detect: Some(detect),
};
