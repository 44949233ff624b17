use byteorder::{BigEndian, ReadBytesExt};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::io::Cursor;

use crate::error::{Error, Result};

/// Marker codes, as the big-endian 16 bit word that appears in the stream.
#[allow(non_camel_case_types)]
#[derive(PartialEq, Eq, PartialOrd, FromPrimitive, Debug, Clone, Copy)]
pub enum Marker {
    TEM = 0xFF01,

    SOF0 = 0xFFC0, // Baseline DCT
    SOF1 = 0xFFC1, // Extended sequential DCT, decoded like baseline
    SOF2 = 0xFFC2,
    SOF3 = 0xFFC3,
    DHT = 0xFFC4,
    SOF5 = 0xFFC5,
    SOF6 = 0xFFC6,
    SOF7 = 0xFFC7,
    JPG = 0xFFC8,
    SOF9 = 0xFFC9,
    SOF10 = 0xFFCA,
    SOF11 = 0xFFCB,
    DAC = 0xFFCC,
    SOF13 = 0xFFCD,
    SOF14 = 0xFFCE,
    SOF15 = 0xFFCF,

    RST0 = 0xFFD0,
    RST1 = 0xFFD1,
    RST2 = 0xFFD2,
    RST3 = 0xFFD3,
    RST4 = 0xFFD4,
    RST5 = 0xFFD5,
    RST6 = 0xFFD6,
    RST7 = 0xFFD7,

    SOI = 0xFFD8,
    EOI = 0xFFD9,
    SOS = 0xFFDA,
    DQT = 0xFFDB,
    DNL = 0xFFDC,
    DRI = 0xFFDD,
    DHP = 0xFFDE,
    EXP = 0xFFDF,

    APP0 = 0xFFE0,
    APP1 = 0xFFE1,
    APP2 = 0xFFE2,
    APP3 = 0xFFE3,
    APP4 = 0xFFE4,
    APP5 = 0xFFE5,
    APP6 = 0xFFE6,
    APP7 = 0xFFE7,
    APP8 = 0xFFE8,
    APP9 = 0xFFE9,
    APP10 = 0xFFEA,
    APP11 = 0xFFEB,
    APP12 = 0xFFEC,
    APP13 = 0xFFED,
    APP14 = 0xFFEE,
    APP15 = 0xFFEF,

    COM = 0xFFFE,
}

impl Marker {
    /// Maps a marker word to a known marker. JPGn extensions and reserved codes yield `None`.
    pub fn from_word(word: u16) -> Option<Self> {
        FromPrimitive::from_u16(word)
    }

    /// Markers that stand alone, without a length field and payload
    pub fn is_standalone(self) -> bool {
        matches!(self, Marker::TEM | Marker::SOI | Marker::EOI)
            || (self >= Marker::RST0 && self <= Marker::RST7)
    }
}

/// A marker located in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerPosition {
    /// The marker word. Unknown markers are kept as raw words so they can be skipped.
    pub word: u16,
    /// Offset of the marker's first byte
    pub offset: usize,
}

impl MarkerPosition {
    pub fn marker(&self) -> Option<Marker> {
        Marker::from_word(self.word)
    }
}

/// Byte cursor over a JPEG stream. This is the single position shared by segment search, table
/// parsing and scan extraction.
pub struct JPEGParser<'data> {
    cursor: Cursor<&'data [u8]>,
}

impl<'data> JPEGParser<'data> {
    pub fn new(data: &'data [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    pub fn data(&self) -> &'data [u8] {
        self.cursor.get_ref()
    }

    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn seek(&mut self, position: usize) {
        self.cursor.set_position(position as u64);
    }

    pub fn remaining(&self) -> usize {
        self.data().len().saturating_sub(self.position())
    }

    pub fn read_next_word(&mut self) -> Result<u16> {
        self.cursor
            .read_u16::<BigEndian>()
            .map_err(|_| Error::MalformedSegment("Unexpected end of input"))
    }

    pub fn read_next_byte(&mut self) -> Result<u8> {
        self.cursor
            .read_u8()
            .map_err(|_| Error::MalformedSegment("Unexpected end of input"))
    }

    /// Reads `count` bytes as a slice borrowed from the underlying data.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'data [u8]> {
        if count > self.remaining() {
            return Err(Error::MalformedSegment("Unexpected end of input"));
        }
        let start = self.position();
        self.seek(start + count);
        Ok(&self.data()[start..start + count])
    }

    /// Finds the first occurrence of `marker` at or after `from`. Scans forward over every
    /// two byte window and never interprets byte stuffing.
    pub fn find_next(&self, marker: Marker, from: usize) -> Option<usize> {
        let word = (marker as u16).to_be_bytes();
        self.data()
            .get(from..)?
            .windows(2)
            .position(|window| window == word)
            .map(|index| from + index)
    }

    /// Finds the next marker of any kind at or after the cursor and moves the cursor past it.
    /// Fill bytes (runs of 0xFF) and stray non-marker bytes are stepped over.
    pub fn read_next_marker(&mut self) -> Option<MarkerPosition> {
        let data = self.data();
        let mut index = self.position();

        while index + 1 < data.len() {
            if data[index] == 0xFF && data[index + 1] != 0x00 && data[index + 1] != 0xFF {
                self.seek(index + 2);
                return Some(MarkerPosition {
                    word: u16::from_be_bytes([data[index], data[index + 1]]),
                    offset: index,
                });
            }
            index += 1;
        }

        self.seek(data.len());
        None
    }

    /// Reads a segment's length field and returns its payload, leaving the cursor after it.
    pub fn read_segment_payload(&mut self) -> Result<&'data [u8]> {
        let length = self.read_next_word()? as usize;
        if length < 2 {
            return Err(Error::MalformedSegment(
                "Segment length is smaller than its own length field",
            ));
        }
        if length - 2 > self.remaining() {
            return Err(Error::MalformedSegment(
                "Segment length runs past the end of the data",
            ));
        }
        self.read_bytes(length - 2)
    }
}
