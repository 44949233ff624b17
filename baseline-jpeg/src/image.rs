use std::io;

use crate::error::Result;

/// Layout of the samples in an [`Image`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ColorType {
    /// One 8 bit luminance sample per pixel
    #[default]
    L8,
    /// Interleaved 8 bit red, green and blue samples
    Rgb8,
}

impl ColorType {
    /// Samples per pixel
    pub fn channels(self) -> usize {
        match self {
            ColorType::L8 => 1,
            ColorType::Rgb8 => 3,
        }
    }
}

/// A decoded raster, exactly `width` x `height` pixels, rows top to bottom.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Image {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Layout of each pixel's samples
    pub color_type: ColorType,
    /// The raw pixel data, `color_type.channels()` bytes per pixel
    pub pixels: Vec<u8>,
}

/// Used to decode an image. This trait can be implemented for any image format I want to decode.
pub trait ImageDecoder<'data> {
    /// Supplies the decode with the image data
    fn new(image_data: &'data [u8]) -> Self;
    /// Decodes the image
    fn decode(&self) -> Result<Image>;
}

/// Used to encode an image. This trait can be implemented for any image format I want to encode.
pub trait ImageEncoder<'image> {
    /// Supplies the encoder with a decoded image.
    fn new(image: &'image Image) -> Self;
    /// Encodes the image into the writer.
    fn encode<W: io::Write>(&self, writer: W) -> io::Result<()>;
}
