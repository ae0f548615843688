//! Grid geolocation: derive per-pixel latitude/longitude for gridded products
//! from their HDF-EOS grid description or GDAL geotransform.
//!
//! Every projection returns `(lat, lon)` arrays shaped `(y_size, x_size)`.
use ndarray::{Array1, Array2};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

/// Sphere radius used by the MODIS land tile grid, in meters
pub const MODIS_SPHERE_RADIUS: f64 = 6_371_007.181;

static UPPER_LEFT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"UpperLeftPointMtrs=\(\s*([+-]?\d+(?:\.\d+)?)\s*,\s*([+-]?\d+(?:\.\d+)?)\s*\)")
        .expect("valid regex")
});
static LOWER_RIGHT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"LowerRightMtrs=\(\s*([+-]?\d+(?:\.\d+)?)\s*,\s*([+-]?\d+(?:\.\d+)?)\s*\)")
        .expect("valid regex")
});
static X_DIM: Lazy<Regex> = Lazy::new(|| Regex::new(r"XDim=(\d+)").expect("valid regex"));
static Y_DIM: Lazy<Regex> = Lazy::new(|| Regex::new(r"YDim=(\d+)").expect("valid regex"));

/// How corner coordinates are encoded in the grid description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CornerUnits {
    /// Projected meters, used as-is
    Meters,
    /// HDF-EOS packed degrees `DDDMMMSSS.SS`, decoded to decimal degrees
    PackedDms,
}

/// Corner coordinates and pixel counts of a regular grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    pub x_size: usize,
    pub y_size: usize,
}

/// Decode an HDF-EOS packed DMS angle into decimal degrees
pub fn packed_dms_to_degrees(value: f64) -> f64 {
    let sign = if value < 0.0 { -1.0 } else { 1.0 };
    let v = value.abs();
    let degrees = (v / 1_000_000.0).trunc();
    let minutes = ((v - degrees * 1_000_000.0) / 1_000.0).trunc();
    let seconds = v - degrees * 1_000_000.0 - minutes * 1_000.0;
    sign * (degrees + minutes / 60.0 + seconds / 3600.0)
}

fn capture_pair(re: &Regex, text: &str, what: &str) -> Result<(f64, f64)> {
    let caps = re
        .captures(text)
        .ok_or_else(|| Error::Parse(format!("grid description has no {what}")))?;
    let x = caps[1].parse::<f64>().map_err(Error::parse)?;
    let y = caps[2].parse::<f64>().map_err(Error::parse)?;
    Ok((x, y))
}

fn capture_size(re: &Regex, text: &str, what: &str) -> Result<usize> {
    let caps = re
        .captures(text)
        .ok_or_else(|| Error::Parse(format!("grid description has no {what}")))?;
    caps[1].parse::<usize>().map_err(Error::parse)
}

impl GridGeometry {
    /// Parse the first grid of an HDF-EOS `StructMetadata.0` block
    pub fn from_struct_metadata(text: &str, units: CornerUnits) -> Result<Self> {
        let (mut x0, mut y0) = capture_pair(&UPPER_LEFT, text, "UpperLeftPointMtrs")?;
        let (mut x1, mut y1) = capture_pair(&LOWER_RIGHT, text, "LowerRightMtrs")?;
        let x_size = capture_size(&X_DIM, text, "XDim")?;
        let y_size = capture_size(&Y_DIM, text, "YDim")?;

        if units == CornerUnits::PackedDms {
            x0 = packed_dms_to_degrees(x0);
            y0 = packed_dms_to_degrees(y0);
            x1 = packed_dms_to_degrees(x1);
            y1 = packed_dms_to_degrees(y1);
        }

        Self::new(x0, y0, x1, y1, x_size, y_size)
    }

    /// Build the geometry from a north-up GDAL geotransform
    pub fn from_geotransform(gt: [f64; 6], x_size: usize, y_size: usize) -> Result<Self> {
        if gt[2] != 0.0 || gt[4] != 0.0 {
            return Err(Error::Parse(format!(
                "rotated geotransforms are not supported: {gt:?}"
            )));
        }
        let x1 = gt[0] + gt[1] * x_size as f64;
        let y1 = gt[3] + gt[5] * y_size as f64;
        Self::new(gt[0], gt[3], x1, y1, x_size, y_size)
    }

    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64, x_size: usize, y_size: usize) -> Result<Self> {
        if x_size == 0 || y_size == 0 {
            return Err(Error::Parse(format!(
                "grid has zero size: {x_size}x{y_size}"
            )));
        }
        Ok(Self {
            x0,
            y0,
            x1,
            y1,
            x_size,
            y_size,
        })
    }

    /// Uniform mesh between the corners, both arrays shaped `(y_size, x_size)`.
    /// `x` varies along columns and `y` along rows.
    pub fn mesh(&self) -> (Array2<f64>, Array2<f64>) {
        let xs = Array1::linspace(self.x0, self.x1, self.x_size);
        let ys = Array1::linspace(self.y0, self.y1, self.y_size);
        let shape = (self.y_size, self.x_size);
        let xv = Array2::from_shape_fn(shape, |(_, c)| xs[c]);
        let yv = Array2::from_shape_fn(shape, |(r, _)| ys[r]);
        (xv, yv)
    }
}

/// Native projection of a grid product
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GridProjection {
    /// Spherical sinusoidal, central meridian 0
    Sinusoidal { radius: f64 },
    /// Plain longitude/latitude grid
    Geographic,
}

impl GridProjection {
    pub fn modis_sinusoidal() -> Self {
        GridProjection::Sinusoidal {
            radius: MODIS_SPHERE_RADIUS,
        }
    }

    /// Projected `(x, y)` to geographic `(lat, lon)` in degrees.
    /// Points off the sinusoidal envelope come back as NaN.
    #[inline]
    pub fn to_latlon(&self, x: f64, y: f64) -> (f64, f64) {
        match *self {
            GridProjection::Geographic => (y, x),
            GridProjection::Sinusoidal { radius } => {
                let phi = y / radius;
                if phi.abs() > std::f64::consts::FRAC_PI_2 {
                    return (f64::NAN, f64::NAN);
                }
                let cos_phi = phi.cos();
                let lambda = if cos_phi.abs() < 1e-12 {
                    0.0
                } else {
                    x / (radius * cos_phi)
                };
                if lambda.abs() > std::f64::consts::PI + 1e-9 {
                    return (f64::NAN, f64::NAN);
                }
                (phi.to_degrees(), lambda.to_degrees())
            }
        }
    }
}

/// Per-pixel `(lat, lon)` arrays for a grid
pub fn derive_latlon(
    geometry: &GridGeometry,
    projection: GridProjection,
) -> (Array2<f64>, Array2<f64>) {
    let (xv, yv) = geometry.mesh();
    let shape = xv.dim();
    let mut lat = Array2::<f64>::zeros(shape);
    let mut lon = Array2::<f64>::zeros(shape);
    for ((idx, &x), &y) in xv.indexed_iter().zip(yv.iter()) {
        let (la, lo) = projection.to_latlon(x, y);
        lat[idx] = la;
        lon[idx] = lo;
    }
    (lat, lon)
}
