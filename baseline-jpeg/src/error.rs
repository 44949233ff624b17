use std::fmt;

use thiserror::Error;

use crate::jpeg::Marker;

/// Result type returned by every decoding operation
pub type Result<T> = core::result::Result<T, Error>;

/// The kind of table a frame or scan component refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// A DQT table
    Quantization,
    /// A DHT table of class 0
    DcHuffman,
    /// A DHT table of class 1
    AcHuffman,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKind::Quantization => f.write_str("quantization"),
            TableKind::DcHuffman => f.write_str("DC huffman"),
            TableKind::AcHuffman => f.write_str("AC huffman"),
        }
    }
}

/// Describes an error encountered while decoding an image. Every error is fatal to the decode.
#[derive(Error, Debug)]
pub enum Error {
    /// A required marker is absent from the stream
    #[error("No {0:?} marker found")]
    MissingMarker(Marker),
    /// A segment's length is inconsistent with the buffer, or its payload is internally broken
    #[error("Malformed segment: {0}")]
    MalformedSegment(&'static str),
    /// Sample precision other than 8, or a DQT precision flag outside {0, 1}
    #[error("Invalid precision value {0}")]
    InvalidPrecision(u8),
    /// A component references a table that was never defined
    #[error("Reference to undefined {kind} table {id}")]
    InvalidTableReference {
        /// Which table class was looked up
        kind: TableKind,
        /// The missing table id
        id: u8,
    },
    /// The entropy-coded data ran out before the scan was complete
    #[error("Entropy-coded data ended before the scan was complete")]
    TruncatedBitstream,
    /// No huffman code matched the bits at the cursor
    #[error("Invalid huffman code in entropy-coded data")]
    InvalidHuffmanCode,
    /// Decoded coefficients are inconsistent with the block structure
    #[error("Malformed scan data: {0}")]
    MalformedScan(&'static str),
    /// A feature is not supported by the decoder
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(&'static str),
    /// The caller cancelled the decode
    #[error("Decoding was cancelled")]
    Cancelled,
}
