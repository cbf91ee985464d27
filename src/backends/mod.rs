//! Segmenter implementations
//!
//! - Colour-key segmenter (pure Rust, no model files)

pub mod color_key;

// Test utilities for segmenter testing
#[cfg(test)]
pub mod test_utils;

pub use self::color_key::ColorKeySegmenter;
