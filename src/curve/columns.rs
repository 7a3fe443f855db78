//! Column vocabulary and the polymorphic column source.

use std::cell::OnceCell;
use std::fmt;

use crate::errors::FormatError;

/// Column names understood by this crate.
pub const KNOWN_COLUMNS: &[&str] = &[
    "force",
    "height (measured)",
    "height (piezo)",
    "segment",
    "time",
    "tip position",
];

/// Physical unit of a known column ("" for the segment labels).
pub fn column_unit(column: &str) -> &'static str {
    match column {
        "force" => "N",
        "height (measured)" | "height (piezo)" | "tip position" => "m",
        "time" => "s",
        _ => "",
    }
}

/// Whether a column name is part of [`KNOWN_COLUMNS`].
pub fn is_known_column(column: &str) -> bool {
    KNOWN_COLUMNS.contains(&column)
}

/// One column of curve data, either held in memory or loaded on first
/// access.
///
/// The two variants behave identically to consumers; the lazy variant
/// defers the load until [`values`](ColumnSource::values) is first called
/// and caches the result for the lifetime of the source. A failing load is
/// reported on every access and not cached.
pub struct ColumnSource {
    inner: Inner,
}

enum Inner {
    Eager(Vec<f64>),
    Lazy {
        thunk: Box<dyn Fn() -> Result<Vec<f64>, FormatError>>,
        cache: OnceCell<Vec<f64>>,
    },
}

impl ColumnSource {
    /// A column backed by an in-memory array.
    pub fn eager(values: Vec<f64>) -> Self {
        ColumnSource {
            inner: Inner::Eager(values),
        }
    }

    /// A column backed by a deferred loader.
    pub fn lazy<F>(thunk: F) -> Self
    where
        F: Fn() -> Result<Vec<f64>, FormatError> + 'static,
    {
        ColumnSource {
            inner: Inner::Lazy {
                thunk: Box::new(thunk),
                cache: OnceCell::new(),
            },
        }
    }

    /// The column values, loading and caching them on first access.
    pub fn values(&self) -> Result<&[f64], FormatError> {
        match &self.inner {
            Inner::Eager(values) => Ok(values),
            Inner::Lazy { thunk, cache } => {
                if let Some(values) = cache.get() {
                    return Ok(values);
                }
                let loaded = thunk()?;
                Ok(cache.get_or_init(|| loaded))
            }
        }
    }

    /// Whether the values are available without running a loader.
    pub fn is_loaded(&self) -> bool {
        match &self.inner {
            Inner::Eager(_) => true,
            Inner::Lazy { cache, .. } => cache.get().is_some(),
        }
    }
}

impl fmt::Debug for ColumnSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Inner::Eager(values) => f
                .debug_struct("ColumnSource")
                .field("eager", &values.len())
                .finish(),
            Inner::Lazy { cache, .. } => f
                .debug_struct("ColumnSource")
                .field("lazy", &cache.get().map(Vec::len))
                .finish(),
        }
    }
}

impl From<Vec<f64>> for ColumnSource {
    fn from(values: Vec<f64>) -> Self {
        ColumnSource::eager(values)
    }
}
