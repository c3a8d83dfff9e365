//! Built-in variant handlers.

#[cfg(feature = "image-formats")]
pub mod image;
