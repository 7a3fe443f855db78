//! Archive navigation and column assembly for JPK files.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::FormatError;
use crate::formats::MetaOverride;
use crate::metadata::MetaData;

use super::archive::{ArchiveCache, JpkArchive};
use super::data;
use super::meta_recipes;
use super::properties::{self, PropertyStore};

/// Internal layout of a JPK archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hierarchy {
    /// One curve, segments at the archive root (`segments/`).
    Single,
    /// Many curves under `index/<enum>/`.
    Indexed,
}

/// Reader over one JPK archive.
///
/// Opening parses only the archive directory and the general/shared
/// headers; per-curve properties, metadata and channel data are resolved on
/// demand and cached. Archive contents are immutable once opened, so all
/// caches are keyed by (curve index, segment index).
pub struct JpkReader {
    path: PathBuf,
    archive: Arc<JpkArchive>,
    files: Vec<String>,
    file_set: HashSet<String>,
    hierarchy: Hierarchy,
    index_numbers: Vec<usize>,
    general: BTreeMap<String, String>,
    shared: BTreeMap<String, String>,
    overrides: MetaOverride,
    props_cache: RefCell<HashMap<(usize, Option<usize>), Arc<PropertyStore>>>,
    meta_cache: RefCell<HashMap<(usize, Option<usize>), MetaData>>,
}

impl JpkReader {
    /// Open a JPK archive through the shared handle cache.
    ///
    /// `overrides` participate in metadata assembly: they win over parsed
    /// values and satisfy the missing-metadata check, so files lacking e.g.
    /// a spring constant load once the caller supplies one.
    pub fn open(path: &Path, overrides: MetaOverride) -> Result<Self, FormatError> {
        let archive = ArchiveCache::shared().open(path)?;
        let mut files = archive.member_names();
        files.sort_by(|a, b| numeric_aware_cmp(a, b));
        let file_set: HashSet<String> = files.iter().cloned().collect();

        let hierarchy = if file_set.contains("segments/") {
            Hierarchy::Single
        } else if file_set.contains("index/") {
            Hierarchy::Indexed
        } else {
            return Err(FormatError::NotSupported(format!(
                "cannot determine archive hierarchy: {}",
                path.display()
            )));
        };

        let general = properties::parse_properties(&archive.read_member("header.properties")?)?;
        let shared = if file_set.contains("shared-data/header.properties") {
            properties::parse_properties(&archive.read_member("shared-data/header.properties")?)?
        } else {
            BTreeMap::new()
        };

        // Individual curves may be missing from indexed archives; the
        // enumeration keeps the on-disk numbering.
        let index_numbers = match hierarchy {
            Hierarchy::Single => vec![0],
            Hierarchy::Indexed => {
                let mut numbers: Vec<usize> = files
                    .iter()
                    .filter(|f| {
                        f.starts_with("index/")
                            && f.ends_with('/')
                            && f.matches('/').count() == 2
                    })
                    .filter_map(|f| f.split('/').nth(1)?.parse().ok())
                    .collect();
                numbers.sort_unstable();
                numbers.dedup();
                numbers
            }
        };

        log::debug!(
            "opened JPK archive {} ({hierarchy:?}, {} curves)",
            path.display(),
            index_numbers.len()
        );

        Ok(JpkReader {
            path: path.to_path_buf(),
            archive,
            files,
            file_set,
            hierarchy,
            index_numbers,
            general,
            shared,
            overrides,
            props_cache: RefCell::new(HashMap::new()),
            meta_cache: RefCell::new(HashMap::new()),
        })
    }

    /// Path of the archive.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The archive hierarchy mode.
    pub fn hierarchy(&self) -> Hierarchy {
        self.hierarchy
    }

    /// Metadata overrides this reader was opened with.
    pub(crate) fn overrides(&self) -> &MetaOverride {
        &self.overrides
    }

    /// Number of distinct curve indices in the archive.
    pub fn index_count(&self) -> usize {
        self.index_numbers.len()
    }

    /// On-disk enumeration number of a curve index.
    pub fn enumeration(&self, index: usize) -> Result<usize, FormatError> {
        self.index_numbers.get(index).copied().ok_or_else(|| {
            FormatError::Index(format!(
                "curve index {index} out of range ({} curves)",
                self.index_numbers.len()
            ))
        })
    }

    /// Archive path prefix of a curve index.
    pub fn index_path(&self, index: usize) -> Result<String, FormatError> {
        let enumeration = self.enumeration(index)?;
        let path = match self.hierarchy {
            Hierarchy::Single => String::new(),
            Hierarchy::Indexed => format!("index/{enumeration}/"),
        };
        if !path.is_empty() && !self.file_set.contains(&path) {
            return Err(FormatError::Index(format!(
                "no archive entry for curve index {index} (enum {enumeration})"
            )));
        }
        Ok(path)
    }

    /// Archive path prefix of a segment within a curve.
    pub fn segment_path(&self, index: usize, segment: usize) -> Result<String, FormatError> {
        let enumeration = self.enumeration(index)?;
        let path = match self.hierarchy {
            Hierarchy::Single => format!("segments/{segment}/"),
            Hierarchy::Indexed => format!("index/{enumeration}/segments/{segment}/"),
        };
        if self.file_set.contains(&path) {
            Ok(path)
        } else {
            Err(FormatError::Index(format!(
                "no segment {segment} for curve index {index} (enum {enumeration})"
            )))
        }
    }

    /// Available segment numbers of a curve, discovered by probing
    /// `segments/0/`, `segments/1/`, ... until a lookup fails.
    pub fn segment_numbers(&self, index: usize) -> Result<Vec<usize>, FormatError> {
        let mut segments = Vec::new();
        let mut segment = 0;
        while self.segment_path(index, segment).is_ok() {
            segments.push(segment);
            segment += 1;
        }
        if segments.is_empty() {
            // distinguish "no such curve" from "curve without segments"
            self.index_path(index)?;
        }
        Ok(segments)
    }

    /// Resolved properties of a curve (and optionally one segment).
    ///
    /// Merge order: curve header, segment header, indirection-substituted
    /// shared entries, then the general header filling gaps.
    pub fn properties(
        &self,
        index: usize,
        segment: Option<usize>,
    ) -> Result<Arc<PropertyStore>, FormatError> {
        if let Some(store) = self.props_cache.borrow().get(&(index, segment)) {
            return Ok(store.clone());
        }
        let header = format!("{}header.properties", self.index_path(index)?);
        let mut raw = properties::parse_properties(&self.archive.read_member(&header)?)?;
        if let Some(segment) = segment {
            let segment_header = format!(
                "{}segment-header.properties",
                self.segment_path(index, segment)?
            );
            raw.extend(properties::parse_properties(
                &self.archive.read_member(&segment_header)?,
            )?);
        }
        properties::substitute_indirection(&mut raw, &self.shared);
        properties::merge_general(&mut raw, &self.general);
        let store = Arc::new(PropertyStore::from_raw(raw));
        self.props_cache
            .borrow_mut()
            .insert((index, segment), store.clone());
        Ok(store)
    }

    /// Column data for a curve, in physical units.
    ///
    /// With `segment = None` the segments are concatenated in order. The
    /// `time` and `segment` columns are synthesized from metadata; all
    /// others are decoded from channel members and verified against the
    /// column's expected unit. Height columns are negated on read per
    /// instrument convention; force is not.
    pub fn get_data(
        &self,
        column: &str,
        index: usize,
        segment: Option<usize>,
    ) -> Result<Vec<f64>, FormatError> {
        let segments = self.segment_numbers(index)?;
        let Some(segment) = segment else {
            let mut all = Vec::new();
            for seg in &segments {
                all.extend(self.get_data(column, index, Some(*seg))?);
            }
            return Ok(all);
        };

        match column {
            "time" => {
                let md = self.get_metadata(index, Some(segment))?;
                // running offset: sum of prior segments' durations
                let mut start = 0.0;
                for seg in segments.iter().filter(|s| **s < segment) {
                    start += self.get_metadata(index, Some(*seg))?.get_f64("duration")?;
                }
                let duration = md.get_f64("duration")?;
                let count = md.get_f64("point count")? as usize;
                // end boundary exclusive
                Ok((0..count)
                    .map(|i| start + duration * i as f64 / count as f64)
                    .collect())
            }
            "segment" => {
                let md = self.get_metadata(index, Some(segment))?;
                let count = md.get_f64("point count")? as usize;
                Ok(vec![segment as f64; count])
            }
            _ => {
                let store = self.properties(index, Some(segment))?;
                let prefix = self.segment_path(index, segment)?;
                let members: Vec<String> = self
                    .files
                    .iter()
                    .filter(|f| f.starts_with(&prefix) && f.ends_with(".dat"))
                    .cloned()
                    .collect();
                let (channel, slot, member) = data::find_column_dat(&members, column)?;
                let bytes = self.archive.read_member(member)?;
                let (mut values, unit, _label) =
                    data::load_channel(&bytes, channel, &store, slot)?;
                let expected = data::expected_unit(column);
                if unit != expected {
                    return Err(FormatError::FormatMetadata(format!(
                        "unexpected unit for '{column}': got '{unit}', expected '{expected}'"
                    )));
                }
                if matches!(column, "height (measured)" | "height (piezo)") {
                    for v in &mut values {
                        *v = -*v;
                    }
                }
                Ok(values)
            }
        }
    }

    /// Metadata for a curve (and optionally one segment).
    ///
    /// With `segment = None` all segments are reduced into per-curve
    /// metadata: durations and point counts accumulate, every other key is
    /// taken from the earliest segment that defines it.
    pub fn get_metadata(
        &self,
        index: usize,
        segment: Option<usize>,
    ) -> Result<MetaData, FormatError> {
        if let Some(md) = self.meta_cache.borrow().get(&(index, segment)) {
            return Ok(md.clone());
        }
        let md = match segment {
            Some(segment) => meta_recipes::assemble_segment(self, index, segment)?,
            None => meta_recipes::assemble_curve(self, index)?,
        };
        self.meta_cache
            .borrow_mut()
            .insert((index, segment), md.clone());
        Ok(md)
    }
}

impl std::fmt::Debug for JpkReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JpkReader")
            .field("path", &self.path)
            .field("hierarchy", &self.hierarchy)
            .field("curves", &self.index_numbers.len())
            .finish()
    }
}

/// Compare archive member paths with numeric components ordered by value.
fn numeric_aware_cmp(a: &str, b: &str) -> Ordering {
    let left: Vec<&str> = a.split('/').collect();
    let right: Vec<&str> = b.split('/').collect();
    for (x, y) in left.iter().zip(right.iter()) {
        let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
            (Ok(m), Ok(n)) => m.cmp(&n),
            _ => x.cmp(y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    left.len().cmp(&right.len())
}
