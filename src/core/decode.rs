//! Declarative per-variable decoding: labels, units, scale/fill handling and
//! flag-code translation.
//!
//! Product tables are `&'static [VariableSpec]` slices interpreted by [`decode`].
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use tracing::debug;

use crate::core::matcher::PixelIndex;
use crate::error::{Error, Result};
use crate::io::science::{SampleType, ScienceFile, Variable};
use crate::types::{Column, Value};

/// MODIS aerosol quality confidence codes
pub const QUALITY_FLAGS: &[(i64, &str)] = &[(0, "Bad"), (1, "Marginal"), (2, "Good"), (3, "Very Good")];

/// MODIS land/sea mask codes
pub const LAND_SEA_FLAGS: &[(i64, &str)] = &[(0, "Ocean"), (1, "Land"), (2, "Coastal"), (-9999, "Unknown")];

/// Where the first part of a column label comes from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnName {
    /// The variable's `long_name` attribute, falling back to the variable name
    LongName,
    Fixed(&'static str),
}

/// Where the unit part of a column label comes from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnitSource {
    /// A named attribute, empty when absent
    Attribute(&'static str),
    Fixed(&'static str),
}

/// Calendar date of a fixed epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl Epoch {
    /// TAI93 epoch used by MODIS `Scan_Start_Time`
    pub const TAI93: Epoch = Epoch {
        year: 1993,
        month: 1,
        day: 1,
    };

    pub fn datetime(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)?.and_hms_opt(0, 0, 0)
    }
}

/// Raw value to output cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    Identity,
    /// Multiply by the `scale_factor` attribute unless the raw value is the fill sentinel
    ScaleAndMask { fill: f64 },
    /// Multiply by `scale_factor`; the fill sentinel becomes a missing cell
    ScaleOrMissing { fill: f64 },
    /// `"{code} ({label})"`
    FlagLabel(&'static [(i64, &'static str)]),
    /// Whole seconds since the epoch to a timestamp
    TimeOffset(Epoch),
}

/// Sub-dimension enumeration: `(layer index, label)` pairs
pub type SubDimension = &'static [(usize, &'static str)];

pub const THREE_ORBITS: SubDimension = &[(0, "Orbit 1"), (1, "Orbit 2"), (2, "Orbit 3")];

/// Extraction rule for one source variable
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableSpec {
    pub source: &'static str,
    pub name: ColumnName,
    pub unit: UnitSource,
    pub transform: Transform,
    pub sub_dimension: Option<SubDimension>,
}

impl VariableSpec {
    /// Labelled by `long_name` and `units`, values passed through
    pub const fn new(source: &'static str) -> Self {
        Self {
            source,
            name: ColumnName::LongName,
            unit: UnitSource::Attribute("units"),
            transform: Transform::Identity,
            sub_dimension: None,
        }
    }

    pub const fn unit(mut self, unit: UnitSource) -> Self {
        self.unit = unit;
        self
    }

    pub const fn transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub const fn scaled(self, fill: f64) -> Self {
        self.transform(Transform::ScaleAndMask { fill })
    }

    pub const fn masked(self, fill: f64) -> Self {
        self.transform(Transform::ScaleOrMissing { fill })
    }

    pub const fn sub_dimension(mut self, sub: SubDimension) -> Self {
        self.sub_dimension = Some(sub);
        self
    }
}

// Transform with its per-variable parameters resolved
enum Prepared {
    Identity { single: bool },
    Scale { factor: f64, fill: f64, keep_fill: bool },
    Flag(&'static [(i64, &'static str)]),
    Time(NaiveDateTime),
}

impl Prepared {
    fn new(transform: Transform, var: &Variable) -> Result<Self> {
        Ok(match transform {
            Transform::Identity => Prepared::Identity {
                single: var.sample_type == SampleType::Float32,
            },
            Transform::ScaleAndMask { fill } => Prepared::Scale {
                factor: var.require_f64("scale_factor")?,
                fill,
                keep_fill: true,
            },
            Transform::ScaleOrMissing { fill } => Prepared::Scale {
                factor: var.require_f64("scale_factor")?,
                fill,
                keep_fill: false,
            },
            Transform::FlagLabel(table) => Prepared::Flag(table),
            Transform::TimeOffset(epoch) => Prepared::Time(
                epoch
                    .datetime()
                    .ok_or_else(|| Error::Parse(format!("invalid epoch {epoch:?}")))?,
            ),
        })
    }

    fn apply(&self, raw: f64) -> Value {
        match *self {
            // widened from f32 without loss, so the cast back is exact
            Prepared::Identity { single: true } => Value::Float32(raw as f32),
            Prepared::Identity { single: false } => Value::Number(raw),
            Prepared::Scale { factor, fill, keep_fill } => {
                if raw != fill {
                    Value::Number(raw * factor)
                } else if keep_fill {
                    Value::Number(raw)
                } else {
                    Value::Missing
                }
            }
            Prepared::Flag(table) => {
                if raw.is_nan() {
                    return Value::Missing;
                }
                let code = raw as i64;
                match table.iter().find(|(c, _)| *c == code) {
                    Some((_, label)) => Value::Text(format!("{code} ({label})")),
                    None => Value::Text(code.to_string()),
                }
            }
            Prepared::Time(epoch) => {
                if !raw.is_finite() {
                    return Value::Missing;
                }
                TimeDelta::try_seconds(raw.trunc() as i64)
                    .and_then(|d| epoch.checked_add_signed(d))
                    .map_or(Value::Missing, Value::Time)
            }
        }
    }
}

/// Column label prefix and unit for a variable
pub fn label_parts(var: &Variable, spec: &VariableSpec) -> (String, String) {
    let name = match spec.name {
        ColumnName::LongName => var.attribute("long_name").unwrap_or(spec.source).to_string(),
        ColumnName::Fixed(s) => s.to_string(),
    };
    let unit = match spec.unit {
        UnitSource::Attribute(key) => var.attribute(key).unwrap_or_default().to_string(),
        UnitSource::Fixed(s) => s.to_string(),
    };
    (name, unit)
}

fn raw_at(var: &Variable, layer: usize, p: &PixelIndex) -> Result<f64> {
    var.get(layer, p.row, p.col).ok_or_else(|| Error::DimensionMismatch {
        expected: var.shape(),
        found: vec![layer, p.row, p.col],
    })
}

/// Decode one variable at the matched pixels into labelled columns.
///
/// Without a sub-dimension the column is `"{name} ({unit})"` and pixels are
/// looked up at `(time, row, col)`. With one, each `(layer, label)` becomes
/// `"{name} ({label}, {unit})"` looked up at `(layer, row, col)`; layers the
/// variable does not have produce missing values.
pub fn decode(var: &Variable, spec: &VariableSpec, pixels: &[PixelIndex]) -> Result<Vec<Column>> {
    let (name, unit) = label_parts(var, spec);
    let prepared = Prepared::new(spec.transform, var)?;

    let Some(sub) = spec.sub_dimension else {
        let values = pixels
            .iter()
            .map(|p| raw_at(var, p.time, p).map(|raw| prepared.apply(raw)))
            .collect::<Result<Vec<_>>>()?;
        return Ok(vec![Column {
            label: format!("{name} ({unit})"),
            values,
        }]);
    };

    let mut columns = Vec::with_capacity(sub.len());
    for &(layer, sub_label) in sub {
        let values = if layer < var.layers() {
            pixels
                .iter()
                .map(|p| raw_at(var, layer, p).map(|raw| prepared.apply(raw)))
                .collect::<Result<Vec<_>>>()?
        } else {
            vec![Value::Missing; pixels.len()]
        };
        columns.push(Column {
            label: format!("{name} ({sub_label}, {unit})"),
            values,
        });
    }
    Ok(columns)
}

/// Load and decode every variable of a product table, in table order
pub fn decode_table(
    file: &dyn ScienceFile,
    table: &[VariableSpec],
    pixels: &[PixelIndex],
) -> Result<Vec<Column>> {
    let mut columns = Vec::new();
    for spec in table {
        debug!("Start processing... {}", spec.source);
        let var = file.variable(spec.source)?;
        columns.extend(decode(&var, spec, pixels)?);
    }
    Ok(columns)
}
