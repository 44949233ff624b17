use tracing::{debug, trace};

use crate::{
    bitstream::{destuff, Bitstream, ScanMarker},
    cancel::CancellationToken,
    error::{Error, Result},
    image::Image,
    jpeg::{
        header::HeaderInfo,
        huffman::{HuffmanClass, HuffmanTable},
        jpeg_reader::JPEGParser,
        reconstruct::Reconstructor,
    },
};

/// (row, column) of each zigzag position in the natural 8x8 order
#[rustfmt::skip]
pub const ZIGZAG_MAP: &[(u8, u8)] =
    &[(0, 0), (0, 1), (1, 0), (2, 0), (1, 1), (0, 2), (0, 3), (1, 2),
      (2, 1), (3, 0), (4, 0), (3, 1), (2, 2), (1, 3), (0, 4), (0, 5),
      (1, 4), (2, 3), (3, 2), (4, 1), (5, 0), (6, 0), (5, 1), (4, 2),
      (3, 3), (2, 4), (1, 5), (0, 6), (0, 7), (1, 6), (2, 5), (3, 4),
      (4, 3), (5, 2), (6, 1), (7, 0), (7, 1), (6, 2), (5, 3), (4, 4),
      (3, 5), (2, 6), (1, 7), (2, 7), (3, 6), (4, 5), (5, 4), (6, 3),
      (7, 2), (7, 3), (6, 4), (5, 5), (4, 6), (3, 7), (4, 7), (5, 6),
      (6, 5), (7, 4), (7, 5), (6, 6), (5, 7), (6, 7), (7, 6), (7, 7)];

/// 64 quantized coefficients of one 8x8 block, in zigzag order.
pub type Block = [i16; 64];

/// Turns `size` raw bits into a signed value (F.2.2.1, EXTEND). A leading 0 bit means negative.
pub fn extend(value: u16, size: u8) -> i16 {
    if size == 0 {
        return 0;
    }
    let value = value as i32;
    if value < 1 << (size - 1) {
        (value - ((1 << size) - 1)) as i16
    } else {
        value as i16
    }
}

pub struct JPEGDecoder<'data> {
    reader: JPEGParser<'data>,
    bitstream: Bitstream,
    dc_predictions: Vec<i16>,
    cancellation: Option<CancellationToken>,
}

impl<'data> JPEGDecoder<'data> {
    pub fn new(data: &'data [u8]) -> Self {
        Self {
            reader: JPEGParser::new(data),
            bitstream: Bitstream::default(),
            dc_predictions: vec![],
            cancellation: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn parse(&mut self) -> Result<HeaderInfo> {
        HeaderInfo::read_header_info(&mut self.reader)
    }

    pub fn decode(&mut self) -> Result<Image> {
        let header = self.parse()?;
        let blocks = self.read_scan(&header)?;
        Reconstructor::new(&header)?.reconstruct(&blocks, self.cancellation.as_ref())
    }

    /// Entropy decodes the whole scan. Blocks come out MCU by MCU; inside an MCU, component by
    /// component in scan order, and each component's blocks in raster order.
    pub fn read_scan(&mut self, header: &HeaderInfo) -> Result<Vec<Block>> {
        let raw = &self.reader.data()[header.scan_start..header.scan_end];
        self.reader.seek(header.scan_end);

        let tables = header
            .components
            .iter()
            .map(|component| -> Result<_> {
                Ok((
                    header
                        .tables
                        .huffman_table(HuffmanClass::Dc, component.scan.dc_table)?,
                    header
                        .tables
                        .huffman_table(HuffmanClass::Ac, component.scan.ac_table)?,
                    component.blocks_per_mcu(),
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let mcu_count = header.mcu_info.mcu_count();
        let expected_blocks = mcu_count * header.mcu_info.blocks_per_mcu;
        // Every block takes at least two bits, so the data bounds what is worth reserving.
        let mut blocks: Vec<Block> = Vec::with_capacity(expected_blocks.min(raw.len() * 4));

        let restart_interval = header.restart_interval as usize;
        self.dc_predictions = vec![0; header.components.len()];
        let mut position = 0;
        let mut marker = self.start_interval(raw, position);
        let mut expected_restart = 0u8;

        for mcu in 0..mcu_count {
            if self.is_cancelled() {
                return Err(Error::Cancelled);
            }

            if restart_interval > 0 && mcu > 0 && mcu % restart_interval == 0 {
                let restart = match marker {
                    Some(m) if m.restart_number() == Some(expected_restart) => m,
                    Some(_) => {
                        return Err(Error::MalformedScan(
                            "Unexpected marker in place of a restart marker",
                        ))
                    }
                    None => return Err(Error::MalformedScan("Missing restart marker")),
                };
                trace!(mcu, restart = expected_restart, "restart interval");

                expected_restart = (expected_restart + 1) % 8;
                position += restart.end();
                marker = self.start_interval(raw, position);
            }

            for (component_index, &(dc_table, ac_table, block_count)) in tables.iter().enumerate()
            {
                for _ in 0..block_count {
                    let block = self.decode_block(component_index, dc_table, ac_table)?;
                    blocks.push(block);
                }
            }
        }

        debug!(blocks = blocks.len(), "scan decoded");
        Ok(blocks)
    }

    /// Destuffs the entropy-coded run starting at `position`, points the bitstream at it and
    /// resets the DC predictors. Returns the marker that ended the run, offset relative to
    /// `position`.
    fn start_interval(&mut self, raw: &[u8], position: usize) -> Option<ScanMarker> {
        let destuffed = destuff(&raw[position.min(raw.len())..]);
        self.bitstream = Bitstream::new(destuffed.data);
        self.dc_predictions.fill(0);
        destuffed.marker
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    fn decode_block(
        &mut self,
        component_index: usize,
        dc_table: &HuffmanTable,
        ac_table: &HuffmanTable,
    ) -> Result<Block> {
        let mut dct_coefficients = [0i16; 64];

        // Calculate DC coefficient
        // https://www.w3.org/Graphics/JPEG/itu-t81.pdf
        // F.2.2.1 Page 104
        let size = dc_table.decode(&mut self.bitstream)?; // DECODE
        if size > 11 {
            return Err(Error::MalformedScan("DC magnitude category above 11"));
        }
        let diff = self.receive_extend(size)?; // RECEIVE, EXTEND

        let dc_coefficient = self.dc_predictions[component_index].wrapping_add(diff);
        self.dc_predictions[component_index] = dc_coefficient;
        dct_coefficients[0] = dc_coefficient;

        // Calculate AC coefficients
        // F.13 Page 106
        let mut k = 1;
        while k < 64 {
            let huffman_val = ac_table.decode(&mut self.bitstream)?;
            let run_length = (huffman_val >> 4) as usize;
            let size = huffman_val & 0x0F;

            match (run_length, size) {
                (0, 0) => break, // EOB
                (15, 0) => {
                    k += 16; // ZRL
                    continue;
                }
                _ => {}
            }

            k += run_length;
            if k > 63 {
                return Err(Error::MalformedScan("Run length exceeds max K of 63"));
            }

            // A zero size stores an explicit zero after the run
            dct_coefficients[k] = self.receive_extend(size)?;
            k += 1;
        }

        Ok(dct_coefficients)
    }

    fn receive_extend(&mut self, size: u8) -> Result<i16> {
        let bits = self.bitstream.read_bits(size)?;
        Ok(extend(bits as u16, size))
    }
}
