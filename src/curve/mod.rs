//! # Curve Container
//!
//! [`Curve`] owns the columnar data and metadata of one measurement record.
//!
//! Columns live in two stores: the immutable raw store filled by the format
//! loaders (possibly lazily), and a user-editable overlay that takes
//! precedence on read and can be dropped with [`Curve::reset`]. Segments are
//! exposed as zero-copy [`SegmentView`]s generated from the modality's
//! [`SegmentLayout`] descriptor.
//!
//! ```no_run
//! use afmcurve::formats::{FormatRegistry, LoadOptions};
//!
//! let registry = FormatRegistry::with_defaults();
//! let curves = registry.load_data("map.jpk-force-map".as_ref(), &LoadOptions::default())?;
//! for curve in &curves {
//!     let force = curve.approach().column("force")?;
//!     println!("curve {}: {} approach samples", curve.enumeration()?, force.len());
//! }
//! # Ok::<(), afmcurve::errors::FormatError>(())
//! ```

mod columns;
mod export;
mod segment;

#[cfg(test)]
mod tests;

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::rc::Rc;

use crate::errors::FormatError;
use crate::metadata::MetaData;

pub use columns::{column_unit, is_known_column, ColumnSource, KNOWN_COLUMNS};
pub use export::ExportFormat;
pub use segment::SegmentView;

/// Mapping from column names to their data sources.
pub type ColumnMap = BTreeMap<String, ColumnSource>;

/// Ordered list of named phases making up one modality's curves.
///
/// Segment-view accessors are generated from this descriptor; there is one
/// [`Curve`] type for all modalities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLayout {
    /// The imaging modality this layout belongs to.
    pub modality: &'static str,
    /// Phase names in segment order.
    pub phases: &'static [&'static str],
}

const LAYOUTS: &[SegmentLayout] = &[
    SegmentLayout {
        modality: "force-distance",
        phases: &["approach", "retract"],
    },
    SegmentLayout {
        modality: "creep-compliance",
        phases: &["approach", "intermediate", "retract"],
    },
    SegmentLayout {
        modality: "stress-relaxation",
        phases: &["approach", "intermediate", "retract"],
    },
];

/// Look up the segment layout of an imaging modality.
pub fn layout_for_modality(modality: &str) -> Option<&'static SegmentLayout> {
    LAYOUTS.iter().find(|l| l.modality == modality)
}

/// One measurement record: columnar data plus validated metadata.
///
/// Reading a lazily loaded column or evaluating lazy metadata mutates
/// internal caches; a `Curve` must therefore not be shared across threads.
#[derive(Debug)]
pub struct Curve {
    raw: ColumnMap,
    user: BTreeMap<String, Vec<f64>>,
    metadata: MetaData,
    layout: &'static SegmentLayout,
    len_cache: Cell<Option<usize>>,
    masks: RefCell<HashMap<u8, Rc<Vec<bool>>>>,
}

impl Curve {
    /// Build a curve from loader output.
    ///
    /// Every key of `data` must be a recognized column name; unrecognized
    /// names are a hard error. `modality` selects the segment layout.
    pub fn new(data: ColumnMap, metadata: MetaData, modality: &str) -> Result<Self, FormatError> {
        for key in data.keys() {
            if !is_known_column(key) {
                return Err(FormatError::FormatMetadata(format!(
                    "unrecognized data column '{key}'"
                )));
            }
        }
        let layout = layout_for_modality(modality).ok_or_else(|| {
            FormatError::FormatMetadata(format!("unknown imaging modality '{modality}'"))
        })?;
        Ok(Curve {
            raw: data,
            user: BTreeMap::new(),
            metadata,
            layout,
            len_cache: Cell::new(None),
            masks: RefCell::new(HashMap::new()),
        })
    }

    /// Number of samples in the curve.
    ///
    /// Prefers the `point count` metadata key (O(1)); otherwise measures the
    /// first available raw column, which may trigger a lazy load. The probe
    /// result is cached.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> Result<usize, FormatError> {
        if let Some(n) = self.len_cache.get() {
            return Ok(n);
        }
        let n = if self.metadata.contains("point count") {
            self.metadata
                .get("point count")?
                .as_int()
                .unwrap_or_default() as usize
        } else if let Some(source) = self.raw.values().next() {
            source.values()?.len()
        } else {
            0
        };
        self.len_cache.set(Some(n));
        Ok(n)
    }

    /// Sorted names of all available columns (raw and overlay).
    pub fn columns(&self) -> Vec<String> {
        let mut names: Vec<String> = self.raw.keys().cloned().collect();
        for key in self.user.keys() {
            if !self.raw.contains_key(key) {
                names.push(key.clone());
            }
        }
        names.sort();
        names
    }

    /// Whether a column is available.
    pub fn contains(&self, column: &str) -> bool {
        self.user.contains_key(column) || self.raw.contains_key(column)
    }

    /// Read a column, preferring the user overlay over the raw store.
    pub fn column(&self, column: &str) -> Result<&[f64], FormatError> {
        if let Some(values) = self.user.get(column) {
            return Ok(values);
        }
        match self.raw.get(column) {
            Some(source) => source.values(),
            None => Err(FormatError::ColumnNotFound(column.to_string())),
        }
    }

    /// Write a column to the user overlay.
    ///
    /// The raw store is never mutated. Overwriting the `segment` column
    /// invalidates all cached segment masks.
    pub fn set_column(&mut self, column: &str, values: Vec<f64>) -> Result<(), FormatError> {
        if !is_known_column(column) {
            return Err(FormatError::FormatMetadata(format!(
                "unrecognized data column '{column}'"
            )));
        }
        let expected = self.len()?;
        if values.len() != expected {
            return Err(FormatError::LengthMismatch {
                expected,
                actual: values.len(),
            });
        }
        if column == "segment" {
            self.masks.borrow_mut().clear();
        }
        self.user.insert(column.to_string(), values);
        Ok(())
    }

    /// Drop all user edits, reverting every accessor to the raw data.
    pub fn reset(&mut self) {
        self.user.clear();
        self.masks.borrow_mut().clear();
    }

    /// A defensive copy of the curve metadata.
    pub fn metadata(&self) -> MetaData {
        self.metadata.clone()
    }

    /// The curve's index within its source file.
    pub fn enumeration(&self) -> Result<i64, FormatError> {
        let value = self.metadata.get("enum")?;
        value
            .as_int()
            .ok_or_else(|| FormatError::FormatMetadata("non-integer 'enum'".to_string()))
    }

    /// The curve's imaging modality.
    pub fn modality(&self) -> &'static str {
        self.layout.modality
    }

    /// Path of the source file, if recorded.
    pub fn path(&self) -> Option<PathBuf> {
        self.metadata
            .get("path")
            .ok()
            .and_then(|v| v.as_str().map(PathBuf::from))
    }

    /// The segment layout of this curve's modality.
    pub fn layout(&self) -> &'static SegmentLayout {
        self.layout
    }

    /// View of the approach segment.
    pub fn approach(&self) -> SegmentView<'_> {
        SegmentView::new(self, 0, self.layout.phases[0])
    }

    /// View of the retract segment.
    pub fn retract(&self) -> SegmentView<'_> {
        let last = self.layout.phases.len() - 1;
        SegmentView::new(self, last as u8, self.layout.phases[last])
    }

    /// View of the intermediate segment, for modalities that have one.
    pub fn intermediate(&self) -> Result<SegmentView<'_>, FormatError> {
        match self.layout.phases.iter().position(|p| *p == "intermediate") {
            Some(pos) => Ok(SegmentView::new(self, pos as u8, self.layout.phases[pos])),
            None => Err(FormatError::Index(format!(
                "modality '{}' has no intermediate segment",
                self.layout.modality
            ))),
        }
    }

    /// View of an arbitrary segment by ordinal.
    pub fn segment_view(&self, ordinal: u8) -> Result<SegmentView<'_>, FormatError> {
        match self.layout.phases.get(ordinal as usize) {
            Some(phase) => Ok(SegmentView::new(self, ordinal, phase)),
            None => Err(FormatError::Index(format!(
                "segment {ordinal} does not exist for modality '{}'",
                self.layout.modality
            ))),
        }
    }

    /// Boolean row mask of a segment, cached until the `segment` column is
    /// overwritten.
    pub(crate) fn segment_mask(&self, ordinal: u8) -> Result<Rc<Vec<bool>>, FormatError> {
        if let Some(mask) = self.masks.borrow().get(&ordinal) {
            return Ok(mask.clone());
        }
        let labels = self.column("segment")?;
        let mask: Rc<Vec<bool>> = Rc::new(
            labels
                .iter()
                .map(|v| v.round() as i64 == i64::from(ordinal))
                .collect(),
        );
        self.masks.borrow_mut().insert(ordinal, mask.clone());
        Ok(mask)
    }
}
