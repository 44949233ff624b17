use crate::{
    bitstream::Bitstream,
    error::{Error, Result},
};

/// Longest code length a JPEG huffman table can describe
pub const MAX_CODE_LENGTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HuffmanClass {
    Dc,
    Ac,
}

/// Canonical code assignment, aligned index for index with the symbol list.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CanonicalCodes {
    pub codes: Vec<u16>,
    pub lengths: Vec<u8>,
    /// Longest length with a non-zero count, 0 for an empty table
    pub max_bits: u8,
}

/// Assigns canonical codes from per-length counts (Annex C). Codes of one length are consecutive
/// in symbol order, and the running code is shifted left once per length.
pub fn build_canonical(counts: &[u8; MAX_CODE_LENGTH]) -> Result<CanonicalCodes> {
    let total: usize = counts.iter().map(|&count| count as usize).sum();
    let mut result = CanonicalCodes {
        codes: Vec::with_capacity(total),
        lengths: Vec::with_capacity(total),
        max_bits: 0,
    };

    let mut code: u32 = 0;
    for (index, &count) in counts.iter().enumerate() {
        let length = index as u8 + 1;
        if count > 0 {
            result.max_bits = length;
        }

        for _ in 0..count {
            if code >= 1 << length {
                return Err(Error::MalformedSegment(
                    "Huffman code counts overflow their code length",
                ));
            }
            result.codes.push(code as u16);
            result.lengths.push(length);
            code += 1;
        }
        code <<= 1;
    }

    Ok(result)
}

/// Defines a JPEG huffman table
#[derive(Debug, Clone)]
pub struct HuffmanTable {
    pub class: HuffmanClass,
    pub id: u8,
    pub counts: [u8; MAX_CODE_LENGTH],
    pub symbols: Vec<u8>,
    pub codes: CanonicalCodes,
    /// Indexed by a `max_bits` wide prefix: (symbol, code length). A length of 0 marks prefixes
    /// no code matches.
    lookup: Vec<(u8, u8)>,
}

impl HuffmanTable {
    pub fn new(
        class: HuffmanClass,
        id: u8,
        counts: [u8; MAX_CODE_LENGTH],
        symbols: Vec<u8>,
    ) -> Result<Self> {
        let codes = build_canonical(&counts)?;
        if codes.codes.len() != symbols.len() {
            return Err(Error::MalformedSegment(
                "Huffman symbol count does not match the code counts",
            ));
        }

        let max_bits = codes.max_bits;
        let mut lookup = vec![(0u8, 0u8); 1 << max_bits];
        for ((&code, &length), &symbol) in codes.codes.iter().zip(&codes.lengths).zip(&symbols) {
            let shift = max_bits - length;
            let first = (code as usize) << shift;
            let last = first + (1 << shift);
            lookup[first..last].fill((symbol, length));
        }

        Ok(Self {
            class,
            id,
            counts,
            symbols,
            codes,
            lookup,
        })
    }

    pub fn max_bits(&self) -> u8 {
        self.codes.max_bits
    }

    /// Decodes the next symbol. Peeks `max_bits` bits (fewer near the end of the data, padded
    /// with zeros), matches the shortest code and consumes exactly its length.
    pub fn decode(&self, bitstream: &mut Bitstream) -> Result<u8> {
        let max_bits = self.codes.max_bits;
        if max_bits == 0 {
            return Err(Error::InvalidHuffmanCode);
        }

        let available = bitstream.remaining_bits().min(max_bits as usize) as u8;
        if available == 0 {
            return Err(Error::TruncatedBitstream);
        }

        let prefix = bitstream.peek(available)? << (max_bits - available);
        let (symbol, length) = self.lookup[prefix as usize];

        if length == 0 {
            return Err(Error::InvalidHuffmanCode);
        }
        if length > available {
            return Err(Error::TruncatedBitstream);
        }

        bitstream.consume(length)?;
        Ok(symbol)
    }
}
