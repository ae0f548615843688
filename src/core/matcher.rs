//! Bounding-box (and optional quality) selection over geolocation arrays.
use ndarray::ArrayView3;

use crate::error::{Error, Result};
use crate::types::BoundingBox;

/// Position of a pixel in a `(time, row, col)` array. 2-D products use `time == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelIndex {
    pub time: usize,
    pub row: usize,
    pub col: usize,
}

impl PixelIndex {
    pub fn new(time: usize, row: usize, col: usize) -> Self {
        Self { time, row, col }
    }
}

/// Keep only pixels whose quality code is `>= min_quality`
#[derive(Debug, Clone, Copy)]
pub struct QualityFilter<'a> {
    pub values: ArrayView3<'a, f64>,
    pub min_quality: f64,
}

fn check_shape(expected: &[usize], found: &[usize]) -> Result<()> {
    if expected != found {
        return Err(Error::DimensionMismatch {
            expected: expected.to_vec(),
            found: found.to_vec(),
        });
    }
    Ok(())
}

/// Indices of pixels strictly inside `bbox`, in row-major order.
pub fn match_pixels(
    lat: ArrayView3<'_, f64>,
    lon: ArrayView3<'_, f64>,
    bbox: &BoundingBox,
    quality: Option<QualityFilter<'_>>,
) -> Result<Vec<PixelIndex>> {
    check_shape(lat.shape(), lon.shape())?;
    if let Some(q) = &quality {
        check_shape(lat.shape(), q.values.shape())?;
    }

    let matches = lat
        .indexed_iter()
        .zip(lon.iter())
        .filter(|&(((t, r, c), &la), &lo)| {
            bbox.contains(la, lo)
                && quality
                    .as_ref()
                    .map_or(true, |q| q.values[[t, r, c]] >= q.min_quality)
        })
        .map(|(((t, r, c), _), _)| PixelIndex::new(t, r, c))
        .collect();

    Ok(matches)
}
