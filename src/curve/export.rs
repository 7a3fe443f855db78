//! Curve serialization.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::errors::FormatError;

use super::Curve;

/// Serialization formats supported by [`Curve::export_data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Tab-separated values with a commented JSON metadata block.
    Tab,
    /// One HDF5 group per curve, one dataset per column.
    #[cfg(feature = "hdf5")]
    Hdf5,
}

impl Curve {
    /// Write the curve to `dest`.
    ///
    /// The tab format is text: `\r\n`-terminated lines, a `#`-prefixed JSON
    /// metadata block bracketed by `# BEGIN METADATA` / `# END METADATA`
    /// (when `metadata` is true), a `#`-prefixed header naming the columns,
    /// then one tab-separated row per sample with floats formatted to 8
    /// significant digits.
    ///
    /// The HDF5 format appends to `dest`: one subgroup keyed by the curve's
    /// string-encoded enumeration index (probing the next free integer on
    /// collision), one dataset per column with a `unit` attribute, the
    /// `segment` column stored as unsigned bytes.
    pub fn export_data(
        &self,
        dest: &Path,
        metadata: bool,
        fmt: ExportFormat,
    ) -> Result<(), FormatError> {
        match fmt {
            ExportFormat::Tab => self.export_tab(dest, metadata),
            #[cfg(feature = "hdf5")]
            ExportFormat::Hdf5 => self.export_hdf5(dest, metadata),
        }
    }

    fn export_tab(&self, dest: &Path, metadata: bool) -> Result<(), FormatError> {
        let file = File::create(dest)?;
        let mut out = BufWriter::new(file);

        if metadata {
            let map = self.metadata.to_json_map()?;
            let dump = serde_json::to_string_pretty(&serde_json::Value::Object(map))?;
            out.write_all(b"# BEGIN METADATA\r\n")?;
            for line in dump.split('\n') {
                write!(out, "# {}\r\n", line.trim_end())?;
            }
            out.write_all(b"# END METADATA\r\n")?;
            out.write_all(b"#\r\n")?;
        }

        let columns = self.columns();
        let mut arrays = Vec::with_capacity(columns.len());
        for column in &columns {
            arrays.push(self.column(column)?);
        }
        write!(out, "# {}\r\n", columns.join("\t"))?;

        let rows = arrays.first().map(|a| a.len()).unwrap_or(0);
        for row in 0..rows {
            let mut cells = Vec::with_capacity(columns.len());
            for (column, values) in columns.iter().zip(&arrays) {
                let v = values.get(row).copied().unwrap_or(f64::NAN);
                if column == "segment" {
                    cells.push(format!("{}", v.round() as i64));
                } else {
                    cells.push(format_g8(v));
                }
            }
            write!(out, "{}\r\n", cells.join("\t"))?;
        }
        out.flush()?;
        Ok(())
    }

    #[cfg(feature = "hdf5")]
    fn export_hdf5(&self, dest: &Path, metadata: bool) -> Result<(), FormatError> {
        use hdf5::types::VarLenUnicode;

        fn h5err(e: hdf5::Error) -> FormatError {
            FormatError::FormatMetadata(format!("HDF5 error: {e}"))
        }
        fn unicode(s: &str) -> Result<VarLenUnicode, FormatError> {
            s.parse::<VarLenUnicode>().map_err(|e| {
                FormatError::FormatMetadata(format!("cannot encode '{s}' for HDF5: {e}"))
            })
        }

        let file = if dest.exists() {
            hdf5::File::open_rw(dest).map_err(h5err)?
        } else {
            hdf5::File::create(dest).map_err(h5err)?
        };
        file.new_attr::<VarLenUnicode>()
            .create("software")
            .map_err(h5err)?
            .write_scalar(&unicode("afmcurve")?)
            .map_err(h5err)?;
        file.new_attr::<VarLenUnicode>()
            .create("software version")
            .map_err(h5err)?
            .write_scalar(&unicode(env!("CARGO_PKG_VERSION"))?)
            .map_err(h5err)?;

        // String-encoded enumeration key with next-free-integer probing.
        let mut key = self.enumeration().unwrap_or(0).max(0);
        while file.link_exists(&key.to_string()) {
            key += 1;
        }
        let group = file.create_group(&key.to_string()).map_err(h5err)?;

        for column in self.columns() {
            let values = self.column(&column)?;
            let dataset = if column == "segment" {
                let bytes: Vec<u8> = values.iter().map(|v| v.round() as u8).collect();
                group
                    .new_dataset_builder()
                    .with_data(&bytes)
                    .create(column.as_str())
                    .map_err(h5err)?
            } else {
                group
                    .new_dataset_builder()
                    .with_data(values)
                    .create(column.as_str())
                    .map_err(h5err)?
            };
            dataset
                .new_attr::<VarLenUnicode>()
                .create("unit")
                .map_err(h5err)?
                .write_scalar(&unicode(super::column_unit(&column))?)
                .map_err(h5err)?;
        }

        if metadata {
            use crate::metadata::MetaValue;
            for meta_key in self.metadata.keys() {
                let value = self.metadata.get(&meta_key).map_err(FormatError::from)?;
                match value {
                    MetaValue::Str(s) => group
                        .new_attr::<VarLenUnicode>()
                        .create(meta_key.as_str())
                        .map_err(h5err)?
                        .write_scalar(&unicode(&s)?)
                        .map_err(h5err)?,
                    MetaValue::Float(v) => group
                        .new_attr::<f64>()
                        .create(meta_key.as_str())
                        .map_err(h5err)?
                        .write_scalar(&v)
                        .map_err(h5err)?,
                    MetaValue::Int(v) => group
                        .new_attr::<i64>()
                        .create(meta_key.as_str())
                        .map_err(h5err)?
                        .write_scalar(&v)
                        .map_err(h5err)?,
                }
            }
        }
        Ok(())
    }
}

/// Format a float with 8 significant digits, trimming trailing zeros.
pub(crate) fn format_g8(v: f64) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let exponent = v.abs().log10().floor() as i32;
    if !(-4..8).contains(&exponent) {
        let s = format!("{v:.7e}");
        match s.find('e') {
            Some(pos) => {
                let (mantissa, exp_part) = s.split_at(pos);
                let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.');
                format!("{mantissa}{exp_part}")
            }
            None => s,
        }
    } else {
        let decimals = (7 - exponent).max(0) as usize;
        let s = format!("{v:.decimals$}");
        if s.contains('.') {
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            s
        }
    }
}

#[cfg(test)]
mod tests {
    use super::format_g8;

    #[test]
    fn test_format_g8() {
        assert_eq!(format_g8(0.0), "0");
        assert_eq!(format_g8(1.0), "1");
        assert_eq!(format_g8(1e-9), "1e-9");
        assert_eq!(format_g8(1.5e-9), "1.5e-9");
        assert_eq!(format_g8(0.05), "0.05");
        assert_eq!(format_g8(123.456), "123.456");
        assert_eq!(format_g8(-2.5), "-2.5");
    }

    #[test]
    fn test_format_g8_roundtrip() {
        for v in [1.2345678e-7, 3.0921021713588157e-4, 42.0, -1e-12] {
            let parsed: f64 = format_g8(v).parse().unwrap();
            assert!(
                (parsed - v).abs() <= v.abs() * 1e-6,
                "{v} -> {} -> {parsed}",
                format_g8(v)
            );
        }
    }
}
