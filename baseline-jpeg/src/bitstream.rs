use crate::error::{Error, Result};

/// A marker that ended a run of entropy-coded data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanMarker {
    /// Offset of the 0xFF byte directly before the marker code, relative to the stuffed input
    pub offset: usize,
    /// The second byte of the marker, e.g. 0xD9 for EOI
    pub code: u8,
}

impl ScanMarker {
    /// Offset of the first byte following the marker
    pub fn end(&self) -> usize {
        self.offset + 2
    }

    /// Returns the restart number if this is one of RST0..RST7
    pub fn restart_number(&self) -> Option<u8> {
        match self.code {
            0xD0..=0xD7 => Some(self.code - 0xD0),
            _ => None,
        }
    }
}

/// Entropy-coded data with the stuffing removed.
#[derive(Debug, Default)]
pub struct Destuffed {
    pub data: Vec<u8>,
    /// The marker that stopped destuffing. `None` if the input ran out first.
    pub marker: Option<ScanMarker>,
}

/// Removes byte stuffing from entropy-coded data.
///
/// `FF 00` becomes a literal `FF`. Any other byte after `FF` starts a marker: destuffing stops
/// there and the marker is handed back instead of being copied. Runs of `FF` fill bytes in front
/// of a marker are dropped.
pub fn destuff(raw: &[u8]) -> Destuffed {
    let mut data = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        let byte = raw[i];
        if byte != 0xFF {
            data.push(byte);
            i += 1;
            continue;
        }

        let mut next = i + 1;
        while next < raw.len() && raw[next] == 0xFF {
            next += 1;
        }

        match raw.get(next) {
            Some(0x00) => {
                data.push(0xFF);
                i = next + 1;
            }
            Some(&code) => {
                return Destuffed {
                    data,
                    marker: Some(ScanMarker {
                        offset: next - 1,
                        code,
                    }),
                };
            }
            // A dangling FF at the very end carries no data
            None => break,
        }
    }

    Destuffed { data, marker: None }
}

/// Bitstream reader over destuffed entropy-coded data. Bits are delivered MSB first.
#[derive(Debug, Default)]
pub struct Bitstream {
    data: Vec<u8>,
    byte_cursor: usize,
    bit_cursor: u8,
}

impl Bitstream {
    /// Creates a new bitstream.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            byte_cursor: 0,
            bit_cursor: 0,
        }
    }

    /// Number of bits left before the end of the data
    pub fn remaining_bits(&self) -> usize {
        (self.data.len() - self.byte_cursor) * 8 - self.bit_cursor as usize
    }

    /// Returns the next `bits` bits (at most 32) without advancing the cursor.
    pub fn peek(&self, bits: u8) -> Result<u32> {
        debug_assert!(bits <= 32);

        if bits == 0 {
            return Ok(0);
        }
        if self.remaining_bits() < bits as usize {
            return Err(Error::TruncatedBitstream);
        }

        let needed_bytes = (self.bit_cursor as usize + bits as usize + 7) / 8;
        let window = self.data[self.byte_cursor..self.byte_cursor + needed_bytes]
            .iter()
            .fold(0u64, |acc, byte| (acc << 8) | *byte as u64);

        let shift = needed_bytes * 8 - self.bit_cursor as usize - bits as usize;
        Ok(((window >> shift) & ((1u64 << bits) - 1)) as u32)
    }

    /// Advances the cursor by `bits` bits.
    pub fn consume(&mut self, bits: u8) -> Result<()> {
        if self.remaining_bits() < bits as usize {
            return Err(Error::TruncatedBitstream);
        }

        let position = self.bit_cursor as usize + bits as usize;
        self.byte_cursor += position / 8;
        self.bit_cursor = (position % 8) as u8;
        Ok(())
    }

    /// Reads up to 32 bits out of the bitstream.
    pub fn read_bits(&mut self, bits: u8) -> Result<u32> {
        let value = self.peek(bits)?;
        self.consume(bits)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn reads_msb_first() {
        let bitstream = Bitstream::new(vec![0b1011_0000]);
        assert_eq!(bitstream.peek(3).unwrap(), 0b101);
        assert_eq!(bitstream.peek(8).unwrap(), 176);
    }

    #[test]
    fn reads_across_byte_boundaries() {
        let mut bitstream = Bitstream::new(vec![0b1010_1010, 0b1100_1100, 0xFF]);
        assert_eq!(bitstream.read_bits(4).unwrap(), 0b1010);
        assert_eq!(bitstream.read_bits(8).unwrap(), 0b1010_1100);
        assert_eq!(bitstream.read_bits(1).unwrap(), 1);
        assert_eq!(bitstream.remaining_bits(), 11);
        assert_eq!(bitstream.read_bits(11).unwrap(), 0b100_1111_1111);
        assert_eq!(bitstream.remaining_bits(), 0);
    }

    #[test]
    fn reading_past_the_end_is_an_error() {
        let mut bitstream = Bitstream::new(vec![0xAB]);
        bitstream.consume(6).unwrap();
        assert!(matches!(bitstream.peek(3), Err(Error::TruncatedBitstream)));
        assert!(matches!(bitstream.consume(3), Err(Error::TruncatedBitstream)));
        assert_eq!(bitstream.read_bits(2).unwrap(), 0b11);
        assert!(matches!(bitstream.read_bits(1), Err(Error::TruncatedBitstream)));
    }

    #[test]
    fn destuffs_literal_ff() {
        let destuffed = destuff(&[0xFF, 0x00, 0xAB]);
        assert_eq!(destuffed.data, vec![0xFF, 0xAB]);
        assert_eq!(destuffed.marker, None);
    }

    #[test]
    fn stops_at_marker() {
        let destuffed = destuff(&[0x12, 0x34, 0xFF, 0xD9]);
        assert_eq!(destuffed.data, vec![0x12, 0x34]);
        assert_eq!(
            destuffed.marker,
            Some(ScanMarker {
                offset: 2,
                code: 0xD9
            })
        );

        let destuffed = destuff(&[0xFF, 0xD9]);
        assert!(destuffed.data.is_empty());
        assert_eq!(destuffed.marker.map(|m| m.offset), Some(0));
    }

    #[test]
    fn skips_fill_bytes_before_marker() {
        let destuffed = destuff(&[0x01, 0xFF, 0xFF, 0xFF, 0xD3, 0x02]);
        assert_eq!(destuffed.data, vec![0x01]);
        let marker = destuffed.marker.unwrap();
        assert_eq!(marker.offset, 3);
        assert_eq!(marker.end(), 5);
        assert_eq!(marker.restart_number(), Some(3));
    }
}
