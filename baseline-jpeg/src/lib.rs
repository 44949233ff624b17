#![warn(missing_docs)]

//! Decoder for baseline sequential JPEG images.
//!
//! ```no_run
//! let bytes = std::fs::read("image.jpg").unwrap();
//! let image = baseline_jpeg::decode(&bytes).unwrap();
//! println!("{}x{}", image.width, image.height);
//! ```
mod bitstream;
mod cancel;
mod error;
/// Defines types for decoding images
pub mod image;
/// Decoder for JPEG images
#[allow(missing_docs)]
pub mod jpeg;
/// Encoder for PGM/PPM images
pub mod ppm;

pub use cancel::CancellationToken;
pub use error::{Error, Result, TableKind};
pub use image::{ColorType, Image, ImageDecoder, ImageEncoder};

/// Decodes one complete JPEG stream (SOI through EOI) into an image.
pub fn decode(data: &[u8]) -> Result<Image> {
    jpeg::JPEGDecoder::new(data).decode()
}

/// Like [`decode`], but gives up with [`Error::Cancelled`] once `token` is cancelled.
pub fn decode_with_cancellation(data: &[u8], token: &CancellationToken) -> Result<Image> {
    jpeg::JPEGDecoder::new(data)
        .with_cancellation(token.clone())
        .decode()
}
