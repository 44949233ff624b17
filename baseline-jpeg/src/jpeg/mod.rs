mod header;
mod huffman;
mod jpeg_core;
mod jpeg_reader;
mod reconstruct;

pub use header::{
    parse_dht, parse_dqt, Component, FrameComponent, FrameInfo, HeaderInfo, MCUInfo,
    QuantizationTable, ScanComponent, ScanInfo, TableStore,
};
pub use huffman::{build_canonical, CanonicalCodes, HuffmanClass, HuffmanTable};
pub use jpeg_core::{extend, Block};
pub use jpeg_reader::Marker;

use crate::{
    cancel::CancellationToken,
    error::Result,
    image::{Image, ImageDecoder},
};

/// Contains JPEG image data
pub struct JPEGDecoder<'data> {
    image_data: &'data [u8],
    cancellation: Option<CancellationToken>,
}

impl JPEGDecoder<'_> {
    /// Makes the decode observe `token` between MCUs.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Parses the header segments only, without decoding the scan
    pub fn read_header(&self) -> Result<HeaderInfo> {
        jpeg_core::JPEGDecoder::new(self.image_data).parse()
    }
}

impl<'data> ImageDecoder<'data> for JPEGDecoder<'data> {
    /// Initializes the JPEG decoder from a byte slice
    fn new(image_data: &'data [u8]) -> Self {
        Self {
            image_data,
            cancellation: None,
        }
    }

    fn decode(&self) -> Result<Image> {
        let mut decoder = jpeg_core::JPEGDecoder::new(self.image_data);
        if let Some(token) = &self.cancellation {
            decoder = decoder.with_cancellation(token.clone());
        }
        decoder.decode()
    }
}
