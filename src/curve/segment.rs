//! Read-only views onto a single segment of a curve.

use crate::errors::FormatError;

use super::Curve;

/// A read-only projection of a [`Curve`] selecting the rows of one segment.
///
/// The boolean row mask is computed lazily from the current `segment`
/// column (user edits take precedence) and cached on the curve until the
/// segment column is overwritten.
#[derive(Debug, Clone, Copy)]
pub struct SegmentView<'a> {
    curve: &'a Curve,
    ordinal: u8,
    phase: &'static str,
}

impl<'a> SegmentView<'a> {
    pub(super) fn new(curve: &'a Curve, ordinal: u8, phase: &'static str) -> Self {
        SegmentView {
            curve,
            ordinal,
            phase,
        }
    }

    /// Ordinal of this segment within the curve (0 = approach).
    pub fn ordinal(&self) -> u8 {
        self.ordinal
    }

    /// Phase name of this segment (approach, intermediate, retract).
    pub fn phase(&self) -> &'static str {
        self.phase
    }

    /// The rows of `column` belonging to this segment.
    pub fn column(&self, column: &str) -> Result<Vec<f64>, FormatError> {
        let mask = self.curve.segment_mask(self.ordinal)?;
        let values = self.curve.column(column)?;
        Ok(values
            .iter()
            .zip(mask.iter())
            .filter(|(_, m)| **m)
            .map(|(v, _)| *v)
            .collect())
    }

    /// Number of rows in this segment.
    pub fn len(&self) -> Result<usize, FormatError> {
        let mask = self.curve.segment_mask(self.ordinal)?;
        Ok(mask.iter().filter(|m| **m).count())
    }

    /// Whether this segment has no rows.
    pub fn is_empty(&self) -> Result<bool, FormatError> {
        Ok(self.len()? == 0)
    }
}
