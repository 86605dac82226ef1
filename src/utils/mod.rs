//! Shared utilities

pub mod preprocessing;

pub use preprocessing::{ImagePreprocessor, LetterboxTransform};
