use tracing::{debug, warn};

use crate::{
    error::{Error, Result, TableKind},
    jpeg::{
        huffman::{HuffmanClass, HuffmanTable, MAX_CODE_LENGTH},
        jpeg_reader::*,
    },
};

use super::jpeg_core::ZIGZAG_MAP;

/// Number of table slots per table class
pub const TABLE_SLOTS: usize = 4;

/// Blocks a single MCU may hold in an interleaved scan
const MAX_BLOCKS_PER_MCU: usize = 10;

/// A quantization table, with its values in zigzag order as they appear in the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizationTable {
    /// 0 for 8 bit values, 1 for 16 bit values
    pub precision: u8,
    pub destination_id: u8,
    pub values: [u16; 64],
}

impl QuantizationTable {
    /// The table in natural row-major order
    pub fn unzigzag(&self) -> [u16; 64] {
        let mut table = [0u16; 64];
        for (value, &(row, col)) in self.values.iter().zip(ZIGZAG_MAP) {
            table[row as usize * 8 + col as usize] = *value;
        }
        table
    }
}

/// Every quantization and huffman table defined so far, keyed by destination id. A later
/// definition of an id replaces the earlier one.
#[derive(Debug, Default, Clone)]
pub struct TableStore {
    quant_tables: [Option<QuantizationTable>; TABLE_SLOTS],
    dc_tables: [Option<HuffmanTable>; TABLE_SLOTS],
    ac_tables: [Option<HuffmanTable>; TABLE_SLOTS],
}

impl TableStore {
    pub fn insert_quantization_table(&mut self, table: QuantizationTable) {
        let id = table.destination_id as usize;
        self.quant_tables[id] = Some(table);
    }

    pub fn insert_huffman_table(&mut self, table: HuffmanTable) {
        let id = table.id as usize;
        match table.class {
            HuffmanClass::Dc => self.dc_tables[id] = Some(table),
            HuffmanClass::Ac => self.ac_tables[id] = Some(table),
        }
    }

    pub fn quantization_table(&self, id: u8) -> Result<&QuantizationTable> {
        Self::lookup(&self.quant_tables, TableKind::Quantization, id)
    }

    pub fn huffman_table(&self, class: HuffmanClass, id: u8) -> Result<&HuffmanTable> {
        match class {
            HuffmanClass::Dc => Self::lookup(&self.dc_tables, TableKind::DcHuffman, id),
            HuffmanClass::Ac => Self::lookup(&self.ac_tables, TableKind::AcHuffman, id),
        }
    }

    fn lookup<T>(tables: &[Option<T>; TABLE_SLOTS], kind: TableKind, id: u8) -> Result<&T> {
        tables
            .get(id as usize)
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidTableReference { kind, id })
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrameComponent {
    pub identifier: u8,
    /// Horizontal and vertical sampling factors
    pub xy_sampling_factor: (u8, u8),
    pub qtable_id: u8,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanComponent {
    pub selector: u8,
    pub dc_table: u8,
    pub ac_table: u8,
}

/// A scan component joined with the frame component it selects.
#[derive(Debug, Default, Clone)]
pub struct Component {
    pub frame: FrameComponent,
    pub scan: ScanComponent,
    /// Position of the component in the frame header, which fixes its colour role
    pub frame_index: usize,
    /// Sampling factors used for block layout. A lone component is coded one block per MCU
    /// whatever its declared factors.
    pub xy_sampling_factor: (u8, u8),
}

impl Component {
    pub fn blocks_per_mcu(&self) -> usize {
        self.xy_sampling_factor.0 as usize * self.xy_sampling_factor.1 as usize
    }
}

#[derive(Debug, Default, Clone)]
pub struct ScanInfo {
    pub components: Vec<ScanComponent>,
    pub spectral_selection: (u8, u8),
    pub successive_approximation: u8,
}

#[derive(Debug, Default, Clone)]
pub struct FrameInfo {
    pub precision: u8,
    /// Width and height
    pub image_size: (u16, u16),
    pub components: Vec<FrameComponent>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MCUInfo {
    pub max_xy_sampling_factor: (u8, u8),
    /// Size of one MCU in pixels
    pub mcu_size: (u16, u16),
    /// Number of MCU columns and rows covering the image
    pub mcu_dimensions: (u16, u16),
    pub blocks_per_mcu: usize,
}

impl MCUInfo {
    fn new(
        image_size: (u16, u16),
        max_xy_sampling_factor: (u8, u8),
        blocks_per_mcu: usize,
    ) -> Self {
        let mcu_size = (
            8 * max_xy_sampling_factor.0 as u16,
            8 * max_xy_sampling_factor.1 as u16,
        );
        Self {
            max_xy_sampling_factor,
            mcu_size,
            mcu_dimensions: (
                image_size.0.div_ceil(mcu_size.0),
                image_size.1.div_ceil(mcu_size.1),
            ),
            blocks_per_mcu,
        }
    }

    pub fn mcu_count(&self) -> usize {
        self.mcu_dimensions.0 as usize * self.mcu_dimensions.1 as usize
    }
}

/// Everything the header segments define, read up to the start of the entropy-coded data.
#[derive(Debug, Default)]
pub struct HeaderInfo {
    pub frame_info: FrameInfo,
    pub scan_info: ScanInfo,
    /// Scan components in scan order
    pub components: Vec<Component>,
    pub tables: TableStore,
    /// MCUs per restart interval, 0 when restarts are disabled
    pub restart_interval: u16,
    pub mcu_info: MCUInfo,
    /// Offset of the first entropy-coded byte
    pub scan_start: usize,
    /// Offset of the EOI marker that bounds the entropy-coded data
    pub scan_end: usize,
}

/// Parses a DQT payload, which may pack several tables back to back.
pub fn parse_dqt(payload: &[u8]) -> Result<Vec<QuantizationTable>> {
    let mut reader = JPEGParser::new(payload);
    let mut tables = vec![];

    while reader.remaining() > 0 {
        let table_info = reader.read_next_byte()?;
        let precision = table_info >> 4;
        let destination_id = table_info & 0x0F;

        if precision > 1 {
            return Err(Error::InvalidPrecision(precision));
        }
        if destination_id as usize >= TABLE_SLOTS {
            return Err(Error::MalformedSegment(
                "Quantization table id out of range",
            ));
        }

        let mut values = [0u16; 64];
        for value in values.iter_mut() {
            *value = match precision {
                0 => reader.read_next_byte()? as u16,
                _ => reader.read_next_word()?,
            };
        }

        tables.push(QuantizationTable {
            precision,
            destination_id,
            values,
        });
    }

    Ok(tables)
}

/// Parses a DHT payload, which may pack several tables back to back.
pub fn parse_dht(payload: &[u8]) -> Result<Vec<HuffmanTable>> {
    let mut reader = JPEGParser::new(payload);
    let mut tables = vec![];

    while reader.remaining() > 0 {
        let table_info = reader.read_next_byte()?;
        let class = match table_info >> 4 {
            0 => HuffmanClass::Dc,
            1 => HuffmanClass::Ac,
            _ => return Err(Error::MalformedSegment("Invalid huffman table class")),
        };

        let destination_id = table_info & 0x0F;
        if destination_id as usize >= TABLE_SLOTS {
            return Err(Error::MalformedSegment("Huffman table id out of range"));
        }

        let mut bitcode_counts = [0u8; MAX_CODE_LENGTH];
        bitcode_counts.copy_from_slice(reader.read_bytes(MAX_CODE_LENGTH)?);

        let size: usize = bitcode_counts.iter().map(|&count| count as usize).sum();
        if size > 256 {
            return Err(Error::MalformedSegment("Huffman table has over 256 symbols"));
        }

        let symbols = reader.read_bytes(size)?.to_vec();
        tables.push(HuffmanTable::new(
            class,
            destination_id,
            bitcode_counts,
            symbols,
        )?);
    }

    Ok(tables)
}

pub fn parse_sof(payload: &[u8]) -> Result<FrameInfo> {
    let mut reader = JPEGParser::new(payload);

    let precision = reader.read_next_byte()?;
    if precision != 8 {
        return Err(Error::InvalidPrecision(precision));
    }

    let height = reader.read_next_word()?;
    let width = reader.read_next_word()?;
    if width == 0 {
        return Err(Error::MalformedSegment("Frame width is zero"));
    }
    if height == 0 {
        return Err(Error::UnsupportedFeature(
            "Frame height defined by a DNL segment",
        ));
    }

    let component_count = reader.read_next_byte()?;
    if reader.remaining() != component_count as usize * 3 {
        return Err(Error::MalformedSegment(
            "Frame header length does not match its component count",
        ));
    }
    if component_count != 1 && component_count != 3 {
        return Err(Error::UnsupportedFeature(
            "Only grayscale and three component images are supported",
        ));
    }

    let mut components: Vec<FrameComponent> = Vec::with_capacity(component_count as usize);
    for _ in 0..component_count {
        let identifier = reader.read_next_byte()?;
        if components.iter().any(|c| c.identifier == identifier) {
            return Err(Error::MalformedSegment("Duplicate component identifier"));
        }

        let sample_factors = reader.read_next_byte()?;
        let xy_sampling_factor = (sample_factors >> 4, sample_factors & 0x0F);
        if !(1..=4).contains(&xy_sampling_factor.0) || !(1..=4).contains(&xy_sampling_factor.1) {
            return Err(Error::MalformedSegment("Sampling factor outside 1..=4"));
        }

        let qtable_id = reader.read_next_byte()?;
        if qtable_id as usize >= TABLE_SLOTS {
            return Err(Error::InvalidTableReference {
                kind: TableKind::Quantization,
                id: qtable_id,
            });
        }

        components.push(FrameComponent {
            identifier,
            xy_sampling_factor,
            qtable_id,
        })
    }

    Ok(FrameInfo {
        precision,
        image_size: (width, height),
        components,
    })
}

pub fn parse_sos(payload: &[u8]) -> Result<ScanInfo> {
    let mut reader = JPEGParser::new(payload);

    let component_count = reader.read_next_byte()?;
    if component_count == 0 || component_count > 4 {
        return Err(Error::MalformedSegment("Invalid scan component count"));
    }
    if reader.remaining() != component_count as usize * 2 + 3 {
        return Err(Error::MalformedSegment(
            "Scan header length does not match its component count",
        ));
    }

    let mut components = Vec::with_capacity(component_count as usize);
    for _ in 0..component_count {
        let selector = reader.read_next_byte()?;

        let tables = reader.read_next_byte()?;
        components.push(ScanComponent {
            selector,
            dc_table: tables >> 4,
            ac_table: tables & 0x0F,
        });
    }

    let spectral_selection_start = reader.read_next_byte()?;
    let spectral_selection_end = reader.read_next_byte()?;
    let successive_approximation = reader.read_next_byte()?;

    Ok(ScanInfo {
        components,
        spectral_selection: (spectral_selection_start, spectral_selection_end),
        successive_approximation,
    })
}

pub fn parse_dri(payload: &[u8]) -> Result<u16> {
    if payload.len() != 2 {
        return Err(Error::MalformedSegment("DRI segment must hold exactly 2 bytes"));
    }
    JPEGParser::new(payload).read_next_word()
}

impl HeaderInfo {
    /// Walks the header segments from SOI through SOS and leaves the cursor on the first
    /// entropy-coded byte.
    pub fn read_header_info(reader: &mut JPEGParser) -> Result<Self> {
        let soi = reader
            .find_next(Marker::SOI, reader.position())
            .ok_or(Error::MissingMarker(Marker::SOI))?;
        if reader.find_next(Marker::EOI, soi + 2).is_none() {
            return Err(Error::MissingMarker(Marker::EOI));
        }
        reader.seek(soi + 2);

        let mut result: Self = Default::default();
        let mut frame_info = None;
        let mut scan_info = None;
        let mut seen_dqt = false;
        let mut seen_dht = false;

        while let Some(position) = reader.read_next_marker() {
            let Some(marker) = position.marker() else {
                warn!(
                    word = position.word,
                    offset = position.offset,
                    "skipping unknown marker"
                );
                reader.read_segment_payload()?;
                continue;
            };

            if marker == Marker::EOI {
                break;
            }
            if marker.is_standalone() {
                continue;
            }

            let payload = reader.read_segment_payload()?;
            debug!(?marker, offset = position.offset, length = payload.len() + 2, "segment");

            match marker {
                Marker::SOF0 | Marker::SOF1 => {
                    if frame_info.is_some() {
                        return Err(Error::MalformedSegment("More than one frame header"));
                    }
                    frame_info = Some(parse_sof(payload)?);
                }
                Marker::SOF2 | Marker::SOF6 | Marker::SOF10 | Marker::SOF14 => {
                    return Err(Error::UnsupportedFeature("Progressive JPEG"));
                }
                Marker::SOF3 | Marker::SOF7 | Marker::SOF11 | Marker::SOF15 => {
                    return Err(Error::UnsupportedFeature("Lossless JPEG"));
                }
                Marker::SOF5 | Marker::SOF13 => {
                    return Err(Error::UnsupportedFeature("Hierarchical JPEG"));
                }
                Marker::SOF9 | Marker::DAC => {
                    return Err(Error::UnsupportedFeature("Arithmetic coding"));
                }
                Marker::DQT => {
                    seen_dqt = true;
                    for table in parse_dqt(payload)? {
                        result.tables.insert_quantization_table(table);
                    }
                }
                Marker::DHT => {
                    seen_dht = true;
                    for table in parse_dht(payload)? {
                        result.tables.insert_huffman_table(table);
                    }
                }
                Marker::DRI => {
                    result.restart_interval = parse_dri(payload)?;
                }
                Marker::SOS => {
                    scan_info = Some(parse_sos(payload)?);
                    break;
                }
                _ => {} // APPn, COM and friends carry nothing the decoder needs
            }
        }

        if !seen_dqt {
            return Err(Error::MissingMarker(Marker::DQT));
        }
        if !seen_dht {
            return Err(Error::MissingMarker(Marker::DHT));
        }
        result.frame_info = frame_info.ok_or(Error::MissingMarker(Marker::SOF0))?;
        result.scan_info = scan_info.ok_or(Error::MissingMarker(Marker::SOS))?;

        result.scan_start = reader.position();
        result.scan_end = reader
            .find_next(Marker::EOI, result.scan_start)
            .ok_or(Error::MissingMarker(Marker::EOI))?;

        result.resolve_components()?;

        debug!(
            width = result.frame_info.image_size.0,
            height = result.frame_info.image_size.1,
            components = result.components.len(),
            mcus = ?result.mcu_info.mcu_dimensions,
            restart_interval = result.restart_interval,
            "frame"
        );

        Ok(result)
    }

    /// Joins the scan components with their frame components, checks every table reference
    /// and lays out the MCU grid.
    fn resolve_components(&mut self) -> Result<()> {
        let frame = &self.frame_info;
        let scan = &self.scan_info;

        if scan.spectral_selection != (0, 63) || scan.successive_approximation != 0 {
            return Err(Error::UnsupportedFeature(
                "Spectral selection or successive approximation in a sequential scan",
            ));
        }

        let mut components = Vec::with_capacity(scan.components.len());
        for scan_component in &scan.components {
            let frame_index = frame
                .components
                .iter()
                .position(|c| c.identifier == scan_component.selector)
                .ok_or(Error::MalformedSegment(
                    "Scan references a component missing from the frame",
                ))?;
            if components
                .iter()
                .any(|c: &Component| c.frame_index == frame_index)
            {
                return Err(Error::MalformedSegment("Duplicate scan component"));
            }

            let frame_component = &frame.components[frame_index];
            self.tables.quantization_table(frame_component.qtable_id)?;
            self.tables
                .huffman_table(HuffmanClass::Dc, scan_component.dc_table)?;
            self.tables
                .huffman_table(HuffmanClass::Ac, scan_component.ac_table)?;

            components.push(Component {
                frame: frame_component.clone(),
                scan: scan_component.clone(),
                frame_index,
                xy_sampling_factor: frame_component.xy_sampling_factor,
            });
        }

        if components.len() != frame.components.len() {
            return Err(Error::UnsupportedFeature(
                "Images split across multiple scans",
            ));
        }

        if let [component] = components.as_mut_slice() {
            component.xy_sampling_factor = (1, 1);
        }

        let max_xy_sampling_factor = components.iter().fold((1, 1), |max, component| {
            (
                max.0.max(component.xy_sampling_factor.0),
                max.1.max(component.xy_sampling_factor.1),
            )
        });

        let blocks_per_mcu = components.iter().map(Component::blocks_per_mcu).sum();
        if blocks_per_mcu > MAX_BLOCKS_PER_MCU {
            return Err(Error::MalformedSegment("Too many blocks per MCU"));
        }

        self.mcu_info = MCUInfo::new(frame.image_size, max_xy_sampling_factor, blocks_per_mcu);
        self.components = components;
        Ok(())
    }
}
