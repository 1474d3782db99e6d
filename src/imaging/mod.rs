//! Image decoding, transformation and encoding
//!
//! The pipeline consumes an owning `ImageHandle` through a fixed sequence
//! of stages and encodes the result via the negotiated output format.

pub mod encoder;
pub mod error;
pub mod format;
pub mod handle;
pub mod params;
pub mod pipeline;

pub use encoder::{EncodedImage, EncoderFactory, EncoderQuality, ImageEncoder};
pub use error::ImageError;
pub use format::{negotiate_animated_format, negotiate_format};
pub use handle::{CropMode, ImageHandle, SizeMode, TrimBox};
pub use params::{
    AnimMode, FitMode, Flip, Gravity, MetadataPolicy, OutputFormat, TransformParams,
};
pub use pipeline::{transform, AnimConfig, TransformOutput};
