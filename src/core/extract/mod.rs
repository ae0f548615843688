//! Per-product file extractors.
//!
//! Every product family implements [`Extractor`]: locate the pixels of a file
//! that fall inside the bounding box, then decode the product's variable table
//! at those pixels into an [`ExtractionResult`].
pub mod grid;
pub mod s5p;
pub mod swath;

pub use grid::GridExtractor;
pub use s5p::OzoneExtractor;
pub use swath::SwathExtractor;

use crate::error::Result;
use crate::io::science::ScienceFile;
use crate::types::{BoundingBox, Column, ExtractionResult, Product};

pub trait Extractor {
    fn product(&self) -> Product;

    /// Quality threshold applied while matching, if any
    fn min_quality(&self) -> Option<f64> {
        None
    }

    /// Rows of `file` inside `bbox`. No match is a valid, empty result.
    fn extract(&self, file: &dyn ScienceFile, bbox: &BoundingBox) -> Result<ExtractionResult>;
}

/// Extractor for `product`; `min_quality` overrides the product's default threshold
pub fn extractor_for(product: Product, min_quality: Option<f64>) -> Box<dyn Extractor> {
    match product {
        Product::Mod04L2 => Box::new(SwathExtractor::mod04_l2(min_quality)),
        Product::Mod04_3K => Box::new(SwathExtractor::mod04_3k(min_quality)),
        Product::Mcd19A2 => Box::new(GridExtractor::mcd19a2()),
        Product::Myd08M3 => Box::new(GridExtractor::myd08_m3()),
        Product::S5pO3 => Box::new(OzoneExtractor::new(min_quality)),
    }
}

impl Product {
    pub fn extractor(&self, min_quality: Option<f64>) -> Box<dyn Extractor> {
        extractor_for(*self, min_quality)
    }
}

pub(crate) fn assemble(row_count: usize, columns: Vec<Column>) -> Result<ExtractionResult> {
    let mut result = ExtractionResult::new(row_count);
    for column in columns {
        result.push_column(column.label, column.values)?;
    }
    Ok(result)
}
