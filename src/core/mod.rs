//! Core extraction building blocks: pixel matching, grid reprojection, field
//! decoding, per-product extractors, batch parameters and date chunking.
//! These are consumed by the high-level `api` module.
pub mod dates;
pub mod decode;
pub mod extract;
pub mod matcher;
pub mod params;
pub mod reproject;
