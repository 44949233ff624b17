#![allow(dead_code)]

//! Assembles small JPEG streams for the decode tests.

/// DC category `s` is coded as the 4 bit value `s`.
pub const DC_COUNTS: [u8; 16] = [0, 0, 0, 12, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
pub const DC_SYMBOLS: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

/// Every AC symbol is 8 bits long, coded as its index in this list.
pub const AC_SYMBOLS: [u8; 24] = [
    0x00, 0xF0, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x11, 0x12, 0x21,
    0x22, 0x31, 0x32, 0x41, 0x42, 0x51, 0x52, 0xE1, 0xF1,
];

pub fn ac_counts() -> [u8; 16] {
    let mut counts = [0u8; 16];
    counts[7] = AC_SYMBOLS.len() as u8;
    counts
}

/// Bit writer for entropy-coded data. Inserts a 0x00 after every 0xFF byte and pads the final
/// byte with 1 bits.
#[derive(Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    accumulator: u32,
    bit_count: u8,
}

impl BitWriter {
    pub fn write(&mut self, value: u32, bits: u8) {
        for bit in (0..bits).rev() {
            self.accumulator = (self.accumulator << 1) | ((value >> bit) & 1);
            self.bit_count += 1;
            if self.bit_count == 8 {
                self.push_byte(self.accumulator as u8);
                self.accumulator = 0;
                self.bit_count = 0;
            }
        }
    }

    fn push_byte(&mut self, byte: u8) {
        self.bytes.push(byte);
        if byte == 0xFF {
            self.bytes.push(0x00);
        }
    }

    pub fn finish(mut self) -> Vec<u8> {
        if self.bit_count > 0 {
            let padding = 8 - self.bit_count;
            self.write((1 << padding) - 1, padding);
        }
        self.bytes
    }

    /// Encodes one block with the tables above. `ac` lists (zigzag index, value) pairs in
    /// increasing index order.
    pub fn write_block(&mut self, dc_diff: i16, ac: &[(usize, i16)]) {
        let (size, bits) = magnitude(dc_diff);
        self.write(size as u32, 4);
        self.write(bits as u32, size);

        let mut k = 1;
        for &(index, value) in ac {
            let mut run = index - k;
            while run > 15 {
                self.write_ac_symbol(0xF0);
                run -= 16;
            }
            let (size, bits) = magnitude(value);
            self.write_ac_symbol(((run as u8) << 4) | size);
            self.write(bits as u32, size);
            k = index + 1;
        }
        if k < 64 {
            self.write_ac_symbol(0x00);
        }
    }

    pub fn write_ac_symbol(&mut self, symbol: u8) {
        let index = AC_SYMBOLS
            .iter()
            .position(|&s| s == symbol)
            .unwrap_or_else(|| panic!("no test code for AC symbol {symbol:#04x}"));
        self.write(index as u32, 8);
    }
}

/// Magnitude category and raw bits of a coefficient, the inverse of EXTEND.
pub fn magnitude(value: i16) -> (u8, u16) {
    let size = (16 - value.unsigned_abs().leading_zeros()) as u8;
    let bits = if value >= 0 {
        value as u16
    } else {
        (value as i32 + (1 << size) - 1) as u16
    };
    (size, bits)
}

/// Segment-level JPEG writer.
#[derive(Default)]
pub struct JpegBuilder {
    bytes: Vec<u8>,
}

impl JpegBuilder {
    pub fn new() -> Self {
        Self::default().marker(0xD8)
    }

    pub fn marker(mut self, code: u8) -> Self {
        self.bytes.extend_from_slice(&[0xFF, code]);
        self
    }

    pub fn segment(self, code: u8, payload: &[u8]) -> Self {
        let mut builder = self.marker(code);
        let length = (payload.len() + 2) as u16;
        builder.bytes.extend_from_slice(&length.to_be_bytes());
        builder.bytes.extend_from_slice(payload);
        builder
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    /// An 8 bit quantization table filled with `value`
    pub fn dqt(self, id: u8, value: u8) -> Self {
        let mut payload = vec![id];
        payload.extend_from_slice(&[value; 64]);
        self.segment(0xDB, &payload)
    }

    pub fn dht(self, class: u8, id: u8, counts: &[u8; 16], symbols: &[u8]) -> Self {
        let mut payload = vec![(class << 4) | id];
        payload.extend_from_slice(counts);
        payload.extend_from_slice(symbols);
        self.segment(0xC4, &payload)
    }

    /// DC and AC tables 0 as described by the constants above
    pub fn default_tables(self) -> Self {
        self.dqt(0, 1)
            .dht(0, 0, &DC_COUNTS, &DC_SYMBOLS)
            .dht(1, 0, &ac_counts(), &AC_SYMBOLS)
    }

    /// `components` holds (identifier, sampling factors, quantization table)
    pub fn sof(self, code: u8, width: u16, height: u16, components: &[(u8, u8, u8)]) -> Self {
        let mut payload = vec![8];
        payload.extend_from_slice(&height.to_be_bytes());
        payload.extend_from_slice(&width.to_be_bytes());
        payload.push(components.len() as u8);
        for &(id, sampling, table) in components {
            payload.extend_from_slice(&[id, sampling, table]);
        }
        self.segment(code, &payload)
    }

    /// `components` holds (selector, DC table << 4 | AC table)
    pub fn sos(self, components: &[(u8, u8)]) -> Self {
        let mut payload = vec![components.len() as u8];
        for &(selector, tables) in components {
            payload.extend_from_slice(&[selector, tables]);
        }
        payload.extend_from_slice(&[0, 63, 0]);
        self.segment(0xDA, &payload)
    }

    pub fn dri(self, interval: u16) -> Self {
        self.segment(0xDD, &interval.to_be_bytes())
    }

    pub fn eoi(self) -> Vec<u8> {
        self.marker(0xD9).bytes
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

/// A grayscale image using the default tables, with the given entropy-coded data.
pub fn grayscale(width: u16, height: u16, scan: &[u8]) -> Vec<u8> {
    JpegBuilder::new()
        .default_tables()
        .sof(0xC0, width, height, &[(1, 0x11, 0)])
        .sos(&[(1, 0x00)])
        .raw(scan)
        .eoi()
}
