//! Inference backends
//!
//! - ONNX Runtime backend (GPU acceleration, feature `onnx`)
//! - Tract backend (pure Rust, feature `tract`)

pub mod factory;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

#[cfg(test)]
pub mod test_utils;

pub use self::factory::NativeBackendFactory;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;
