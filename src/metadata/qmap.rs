//! Grid placement helpers for quantitative maps.

use crate::errors::MetaDataError;

/// Convert a position on a regular 1-D grid to the index of the nearest
/// grid cell.
///
/// The grid spans `[center - size/2, center + size/2)` with `size_px` cells;
/// cell centers sit half a cell width into each cell. The returned index is
/// that of the cell whose center is nearest to `pos` (nearest neighbor); on
/// an exact tie the lower index wins. Cells whose center evaluates to NaN
/// are skipped.
///
/// `size_px` must be a positive integer; fractional or non-finite input is a
/// contract violation.
pub fn position_to_grid_index(
    pos: f64,
    size: f64,
    center: f64,
    size_px: f64,
) -> Result<usize, MetaDataError> {
    if !size_px.is_finite() || size_px.fract() != 0.0 || size_px < 1.0 {
        return Err(MetaDataError::InvalidValue {
            key: "grid shape".to_string(),
            reason: format!("grid shape must be a positive integer, got {size_px}"),
        });
    }
    let n = size_px as usize;
    let start = center - size / 2.0;
    let step = size / n as f64;

    let mut best: Option<(usize, f64)> = None;
    for i in 0..n {
        let cell_center = start + step * (i as f64 + 0.5);
        let dist = (cell_center - pos).abs();
        if dist.is_nan() {
            continue;
        }
        match best {
            Some((_, d)) if dist >= d => {}
            _ => best = Some((i, dist)),
        }
    }
    best.map(|(i, _)| i).ok_or_else(|| MetaDataError::InvalidValue {
        key: "position".to_string(),
        reason: "no grid cell center is comparable to the position".to_string(),
    })
}
