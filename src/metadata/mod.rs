//! # Metadata Model
//!
//! A schema-validated mapping for measurement metadata.
//!
//! Every write goes through the fixed schema declared in [`schema`]: unknown
//! keys are rejected, values are coerced to the key's declared kind, time
//! strings are normalized, and NaN assignments are silently dropped.
//! Values may also be deferred ([`LazyMetaValue`]) and are evaluated at most
//! once per [`MetaData`] instance, on first read.
//!
//! ## Derived keys
//!
//! `session id` and `curve id` are computed on read from `date`/`time` and
//! `enum` unless they were set explicitly:
//!
//! ```
//! use afmcurve::metadata::MetaData;
//!
//! let mut md = MetaData::new();
//! md.set("date", "2020-04-01").unwrap();
//! md.set("time", "21:56:30").unwrap();
//! md.set("enum", 2).unwrap();
//! assert_eq!(md.get("session id").unwrap().to_string(), "2020-04-01_21:56:30");
//! assert_eq!(md.get("curve id").unwrap().to_string(), "2020-04-01_21:56:30_2");
//! ```
//!
//! ## Grid auto-completion
//!
//! After every successful assignment the grid index keys are re-derived from
//! position/size/center/shape if all four are present for an axis and the
//! index itself has not been set explicitly.

mod lazy;
pub mod parse;
mod qmap;
pub mod schema;

#[cfg(test)]
mod tests;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde::Serialize;

use crate::errors::MetaDataError;

pub use lazy::LazyMetaValue;
pub use parse::parse_time;
pub use qmap::position_to_grid_index;
pub use schema::{
    segment_count_for_modality, MetaField, Section, ValueKind, IMAGING_MODALITIES, META_FIELDS,
};

/// A concrete metadata value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    /// Free-form string (also dates, times, paths, identifiers).
    Str(String),
    /// Floating point quantity.
    Float(f64),
    /// Integer quantity.
    Int(i64),
}

impl MetaValue {
    /// Numeric view of the value, if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetaValue::Float(v) => Some(*v),
            MetaValue::Int(v) => Some(*v as f64),
            MetaValue::Str(_) => None,
        }
    }

    /// Integer view of the value, if it is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            MetaValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// String view of the value, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to a JSON value; non-finite floats are rejected.
    pub fn to_json(&self) -> Result<serde_json::Value, MetaDataError> {
        match self {
            MetaValue::Str(s) => Ok(serde_json::Value::String(s.clone())),
            MetaValue::Int(i) => Ok(serde_json::Value::Number((*i).into())),
            MetaValue::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .ok_or_else(|| MetaDataError::InvalidValue {
                    key: String::new(),
                    reason: format!("{v} cannot be represented in JSON"),
                }),
        }
    }

    /// Convert from a JSON value, if representable.
    pub fn from_json(value: &serde_json::Value) -> Option<MetaValue> {
        match value {
            serde_json::Value::String(s) => Some(MetaValue::Str(s.clone())),
            serde_json::Value::Bool(b) => Some(MetaValue::Int(*b as i64)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(MetaValue::Int(i))
                } else {
                    n.as_f64().map(MetaValue::Float)
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaValue::Str(s) => f.write_str(s),
            MetaValue::Float(v) => write!(f, "{v}"),
            MetaValue::Int(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::Float(v)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        MetaValue::Int(v)
    }
}

impl From<i32> for MetaValue {
    fn from(v: i32) -> Self {
        MetaValue::Int(v as i64)
    }
}

impl From<usize> for MetaValue {
    fn from(v: usize) -> Self {
        MetaValue::Int(v as i64)
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::Str(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        MetaValue::Str(v)
    }
}

impl From<&Path> for MetaValue {
    fn from(v: &Path) -> Self {
        MetaValue::Str(v.display().to_string())
    }
}

impl From<PathBuf> for MetaValue {
    fn from(v: PathBuf) -> Self {
        MetaValue::Str(v.display().to_string())
    }
}

/// Stored state of one metadata key.
#[derive(Debug, Clone)]
enum MetaEntry {
    Concrete(MetaValue),
    Lazy(Rc<LazyMetaValue>),
}

/// Schema-validated measurement metadata.
///
/// Wraps an ordered map plus the schema table; every write path goes through
/// validation (there is no bulk-update backdoor). Cloning is cheap and
/// shares unevaluated lazy values by reference; see [`LazyMetaValue`] for
/// the memoization contract.
///
/// A `MetaData` instance is not thread-safe: lazy evaluation mutates the
/// instance on read. Use one instance per thread.
#[derive(Debug, Clone, Default)]
pub struct MetaData {
    entries: RefCell<BTreeMap<String, MetaEntry>>,
}

impl MetaData {
    /// Create an empty metadata mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a key has been assigned (concretely or lazily).
    ///
    /// Derived keys (`curve id`, `session id`) do not count as assigned
    /// unless set explicitly.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }

    /// All assigned keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    /// Assign a value to a key.
    ///
    /// The key must be part of the schema. The value is coerced to the
    /// key's declared kind; `"time"` is routed through [`parse_time`]. NaN
    /// values are silently dropped. Setting `"imaging mode"` auto-populates
    /// `"segment count"` if absent, and every successful assignment
    /// re-checks grid-index auto-completion.
    pub fn set(&mut self, key: &str, value: impl Into<MetaValue>) -> Result<(), MetaDataError> {
        let field = schema::lookup(key)
            .ok_or_else(|| MetaDataError::UnknownKey(key.to_string()))?;
        let value = value.into();

        if is_nan_value(field, &value) {
            return Ok(());
        }

        let coerced = coerce(field, value)?;
        self.entries
            .borrow_mut()
            .insert(key.to_string(), MetaEntry::Concrete(coerced));
        self.after_set(key)
    }

    /// Assign a deferred value to a key.
    ///
    /// The computation runs on first read through this instance and its
    /// result is coerced like a concrete assignment.
    pub fn set_lazy(&mut self, key: &str, value: LazyMetaValue) -> Result<(), MetaDataError> {
        schema::lookup(key).ok_or_else(|| MetaDataError::UnknownKey(key.to_string()))?;
        self.entries
            .borrow_mut()
            .insert(key.to_string(), MetaEntry::Lazy(Rc::new(value)));
        Ok(())
    }

    /// Read a key.
    ///
    /// Lazy values are evaluated and memoized in place. `curve id` and
    /// `session id` are computed from `date`/`time`/`enum` unless set
    /// explicitly. A recognized but unassigned key yields
    /// [`MetaDataError::NotProvided`]; an unrecognized key yields
    /// [`MetaDataError::UnknownKey`].
    pub fn get(&self, key: &str) -> Result<MetaValue, MetaDataError> {
        let field = schema::lookup(key)
            .ok_or_else(|| MetaDataError::UnknownKey(key.to_string()))?;
        let entry = self.entries.borrow().get(key).cloned();
        match entry {
            Some(MetaEntry::Concrete(v)) => Ok(v),
            Some(MetaEntry::Lazy(lazy)) => {
                let value = coerce(field, lazy.compute()?)?;
                self.entries
                    .borrow_mut()
                    .insert(key.to_string(), MetaEntry::Concrete(value.clone()));
                Ok(value)
            }
            None => match key {
                "session id" => {
                    let date = self.get("date")?;
                    let time = self.get("time")?;
                    Ok(MetaValue::Str(format!("{date}_{time}")))
                }
                "curve id" => {
                    let session = self.get("session id")?;
                    let enumeration = self.get("enum")?;
                    Ok(MetaValue::Str(format!("{session}_{enumeration}")))
                }
                _ => Err(MetaDataError::NotProvided {
                    key: key.to_string(),
                }),
            },
        }
    }

    /// Read a key as a float, failing on non-numeric values.
    pub fn get_f64(&self, key: &str) -> Result<f64, MetaDataError> {
        let value = self.get(key)?;
        value.as_f64().ok_or_else(|| MetaDataError::InvalidValue {
            key: key.to_string(),
            reason: format!("expected a number, got '{value}'"),
        })
    }

    /// Merge all entries of `other` into `self`, overwriting existing keys.
    ///
    /// Concrete values are re-validated on the way in; lazy values are
    /// shared by reference.
    pub fn update(&mut self, other: &MetaData) -> Result<(), MetaDataError> {
        let items: Vec<(String, MetaEntry)> = other
            .entries
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, entry) in items {
            match entry {
                MetaEntry::Concrete(v) => self.set(&key, v)?,
                MetaEntry::Lazy(rc) => {
                    schema::lookup(&key)
                        .ok_or_else(|| MetaDataError::UnknownKey(key.clone()))?;
                    self.entries.borrow_mut().insert(key, MetaEntry::Lazy(rc));
                }
            }
        }
        Ok(())
    }

    /// Convert all entries to a JSON map, evaluating lazy values.
    pub fn to_json_map(
        &self,
    ) -> Result<serde_json::Map<String, serde_json::Value>, MetaDataError> {
        let mut map = serde_json::Map::new();
        for key in self.keys() {
            let value = self.get(&key)?;
            map.insert(key, value.to_json()?);
        }
        Ok(map)
    }

    /// Metadata grouped into fixed topical sections for tabular display.
    ///
    /// Unset keys default to NaN. Modality-specific sections are included
    /// only when the current `imaging mode` has an intermediate segment.
    /// Not a correctness-critical path: failing lazy values also render as
    /// NaN here.
    pub fn get_summary(&self) -> BTreeMap<String, BTreeMap<String, MetaValue>> {
        let modality = self
            .get("imaging mode")
            .ok()
            .and_then(|v| v.as_str().map(String::from));
        let mut out: BTreeMap<String, BTreeMap<String, MetaValue>> = BTreeMap::new();
        for field in META_FIELDS {
            let section = match field.section {
                Section::DatasetMod => match &modality {
                    Some(m) if segment_count_for_modality(m) == Some(3) => {
                        format!("{} {}", field.section.title(), m)
                    }
                    _ => continue,
                },
                other => other.title().to_string(),
            };
            let value = if self.contains(field.key)
                || matches!(field.key, "curve id" | "session id")
            {
                self.get(field.key).unwrap_or(MetaValue::Float(f64::NAN))
            } else {
                MetaValue::Float(f64::NAN)
            };
            out.entry(section).or_default().insert(field.key.to_string(), value);
        }
        out
    }

    /// Side effects of a successful assignment.
    fn after_set(&mut self, key: &str) -> Result<(), MetaDataError> {
        if key == "imaging mode" && !self.contains("segment count") {
            let modality = self
                .get("imaging mode")?
                .as_str()
                .map(String::from)
                .unwrap_or_default();
            let count = schema::segment_count_for_modality(&modality)
                .ok_or(MetaDataError::UnsupportedModality(modality))?;
            self.set("segment count", count)?;
        }
        self.autocomplete_grid()
    }

    /// Derive grid index keys from position/size/center/shape.
    ///
    /// Idempotent; an explicitly set index is never overwritten, and lazy
    /// inputs are not forced.
    fn autocomplete_grid(&mut self) -> Result<(), MetaDataError> {
        for axis in ["x", "y"] {
            let index_key = format!("grid index {axis}");
            if self.contains(&index_key) {
                continue;
            }
            let pos = self.concrete_f64(&format!("position {axis}"));
            let size = self.concrete_f64(&format!("grid size {axis}"));
            let center = self.concrete_f64(&format!("grid center {axis}"));
            let shape = self.concrete_f64(&format!("grid shape {axis}"));
            if let (Some(pos), Some(size), Some(center), Some(shape)) =
                (pos, size, center, shape)
            {
                let index = qmap::position_to_grid_index(pos, size, center, shape)?;
                self.entries
                    .borrow_mut()
                    .insert(index_key, MetaEntry::Concrete(MetaValue::Int(index as i64)));
            }
        }
        Ok(())
    }

    /// Concrete numeric value of a key, without forcing lazy entries.
    fn concrete_f64(&self, key: &str) -> Option<f64> {
        match self.entries.borrow().get(key) {
            Some(MetaEntry::Concrete(v)) => v.as_f64(),
            _ => None,
        }
    }
}

/// Whether a value counts as "not set" for the given field.
fn is_nan_value(field: &MetaField, value: &MetaValue) -> bool {
    match value {
        MetaValue::Float(v) => v.is_nan(),
        MetaValue::Str(s) => {
            matches!(field.kind, ValueKind::Float | ValueKind::Int)
                && s.trim().eq_ignore_ascii_case("nan")
        }
        MetaValue::Int(_) => false,
    }
}

/// Coerce a value to a field's declared kind.
fn coerce(field: &MetaField, value: MetaValue) -> Result<MetaValue, MetaDataError> {
    let invalid = |reason: String| MetaDataError::InvalidValue {
        key: field.key.to_string(),
        reason,
    };
    match field.kind {
        ValueKind::Float => match value {
            MetaValue::Float(v) => Ok(MetaValue::Float(v)),
            MetaValue::Int(v) => Ok(MetaValue::Float(v as f64)),
            MetaValue::Str(s) => s
                .trim()
                .parse::<f64>()
                .map(MetaValue::Float)
                .map_err(|_| invalid(format!("'{s}' is not a number"))),
        },
        ValueKind::Int => match value {
            MetaValue::Int(v) => Ok(MetaValue::Int(v)),
            MetaValue::Float(v) => {
                if v.is_finite() {
                    Ok(MetaValue::Int(v.round() as i64))
                } else {
                    Err(invalid(format!("{v} is not an integer")))
                }
            }
            MetaValue::Str(s) => parse::fint(&s)
                .map(MetaValue::Int)
                .map_err(|_| invalid(format!("'{s}' is not an integer"))),
        },
        ValueKind::Str => match value {
            MetaValue::Str(s) => Ok(MetaValue::Str(s)),
            MetaValue::Float(v) => Ok(MetaValue::Str(format!("{v}"))),
            MetaValue::Int(v) => Ok(MetaValue::Str(format!("{v}"))),
        },
        ValueKind::Date => match value {
            MetaValue::Str(s) => Ok(MetaValue::Str(s.trim().to_string())),
            other => Err(invalid(format!("expected a date string, got '{other}'"))),
        },
        ValueKind::Time => match value {
            MetaValue::Str(s) => parse::parse_time(&s).map(MetaValue::Str),
            other => Err(invalid(format!("expected a time string, got '{other}'"))),
        },
        ValueKind::Modality => match value {
            MetaValue::Str(s) if IMAGING_MODALITIES.contains(&s.as_str()) => {
                Ok(MetaValue::Str(s))
            }
            other => Err(invalid(format!(
                "'{other}' is not one of {IMAGING_MODALITIES:?}"
            ))),
        },
        ValueKind::FeedbackMode => match value {
            MetaValue::Str(s) if schema::FEEDBACK_MODES.contains(&s.as_str()) => {
                Ok(MetaValue::Str(s))
            }
            other => Err(invalid(format!(
                "'{other}' is not one of {:?}",
                schema::FEEDBACK_MODES
            ))),
        },
    }
}
