use serde::{Deserialize, Serialize};

use crate::core::extract::{Extractor, extractor_for};
use crate::types::{BoundingBox, Product};

/// Batch parameters suitable for config files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionParams {
    pub bbox: BoundingBox,
    /// Field separator of the output table
    #[serde(default = "default_separator")]
    pub separator: String,
    /// Remove each input file once its rows are written
    #[serde(default)]
    pub delete_after: bool,
    /// Log and count per-file failures instead of aborting the batch
    #[serde(default)]
    pub continue_on_error: bool,
    /// Overrides the product's default quality threshold
    #[serde(default)]
    pub min_quality: Option<f64>,
}

fn default_separator() -> String {
    ";".to_string()
}

impl ExtractionParams {
    pub fn new(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            separator: default_separator(),
            delete_after: false,
            continue_on_error: false,
            min_quality: None,
        }
    }

    /// Extractor for `product` applying `min_quality`
    pub fn extractor(&self, product: Product) -> Box<dyn Extractor> {
        extractor_for(product, self.min_quality)
    }
}
