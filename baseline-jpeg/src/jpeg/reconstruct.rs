use std::f32::consts::PI;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    cancel::CancellationToken,
    error::{Error, Result},
    image::{ColorType, Image},
    jpeg::{
        header::{Component, HeaderInfo, MCUInfo},
        jpeg_core::{Block, ZIGZAG_MAP},
    },
};

/// `IDCT_TABLE[x][u] = C(u) / 2 * cos((2x + 1) * u * PI / 16)`, one 1-D pass of A.3.3
type IdctTable = [[f32; 8]; 8];

fn idct_table() -> IdctTable {
    let mut table = [[0f32; 8]; 8];
    for (x, row) in table.iter_mut().enumerate() {
        for (u, value) in row.iter_mut().enumerate() {
            let cu = if u == 0 { 1f32 / f32::sqrt(2.0) } else { 1f32 };
            *value = cu / 2.0 * f32::cos((2.0 * x as f32 + 1.0) * u as f32 * PI / 16.0);
        }
    }
    table
}

/// Separable 2-D inverse DCT over a block in natural order: rows first, then columns.
fn idct(table: &IdctTable, coefficients: &[f32; 64]) -> [f32; 64] {
    let mut rows = [0f32; 64];
    for y in 0..8 {
        for x in 0..8 {
            rows[y * 8 + x] = (0..8)
                .map(|u| table[x][u] * coefficients[y * 8 + u])
                .sum();
        }
    }

    let mut output = [0f32; 64];
    for y in 0..8 {
        for x in 0..8 {
            output[y * 8 + x] = (0..8).map(|v| table[y][v] * rows[v * 8 + x]).sum();
        }
    }
    output
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// JFIF YCbCr to RGB with ITU-R BT.601 coefficients. Rounds, then clamps.
pub fn ycbcr_to_rgb(y_cb_cr: (u8, u8, u8)) -> (u8, u8, u8) {
    let lum = y_cb_cr.0 as f32;
    let cb = y_cb_cr.1 as f32 - 128.0;
    let cr = y_cb_cr.2 as f32 - 128.0;

    (
        clamp_to_u8(lum + 1.402 * cr),
        clamp_to_u8(lum - 0.344136 * cb - 0.714136 * cr),
        clamp_to_u8(lum + 1.772 * cb),
    )
}

/// Where one component's blocks sit inside an MCU and how its samples map onto the image.
struct ComponentLayout {
    /// Index of the component's first block within the MCU
    first_block: usize,
    xy_sampling_factor: (u8, u8),
    frame_index: usize,
    quant_table: [u16; 64],
}

impl ComponentLayout {
    /// Width of the component's sample plane within one MCU
    fn plane_stride(&self) -> usize {
        8 * self.xy_sampling_factor.0 as usize
    }

    fn plane_size(&self) -> usize {
        self.plane_stride() * 8 * self.xy_sampling_factor.1 as usize
    }
}

/// Turns decoded coefficient blocks into pixels: dequantization, IDCT, level shift,
/// nearest-neighbour chroma upsampling and colour conversion. MCU rows are independent of each
/// other and write to disjoint rows of the raster.
pub struct Reconstructor {
    components: Vec<ComponentLayout>,
    mcu_info: MCUInfo,
    image_size: (u16, u16),
    color_type: ColorType,
    idct_table: IdctTable,
}

impl Reconstructor {
    pub fn new(header: &HeaderInfo) -> Result<Self> {
        let mut first_block = 0;
        let mut components = Vec::with_capacity(header.components.len());
        for component in &header.components {
            components.push(Self::layout(header, component, first_block)?);
            first_block += component.blocks_per_mcu();
        }

        let color_type = match header.frame_info.components.len() {
            1 => ColorType::L8,
            3 => ColorType::Rgb8,
            _ => {
                return Err(Error::UnsupportedFeature(
                    "Only grayscale and three component images are supported",
                ))
            }
        };

        Ok(Self {
            components,
            mcu_info: header.mcu_info.clone(),
            image_size: header.frame_info.image_size,
            color_type,
            idct_table: idct_table(),
        })
    }

    fn layout(
        header: &HeaderInfo,
        component: &Component,
        first_block: usize,
    ) -> Result<ComponentLayout> {
        Ok(ComponentLayout {
            first_block,
            xy_sampling_factor: component.xy_sampling_factor,
            frame_index: component.frame_index,
            quant_table: header
                .tables
                .quantization_table(component.frame.qtable_id)?
                .unzigzag(),
        })
    }

    /// Builds the output raster from blocks laid out as produced by the entropy decoder.
    pub fn reconstruct(
        &self,
        blocks: &[Block],
        cancellation: Option<&CancellationToken>,
    ) -> Result<Image> {
        let (width, height) = (self.image_size.0 as usize, self.image_size.1 as usize);
        let channels = self.color_type.channels();

        let blocks_per_row =
            self.mcu_info.mcu_dimensions.0 as usize * self.mcu_info.blocks_per_mcu;
        if blocks.len() != blocks_per_row * self.mcu_info.mcu_dimensions.1 as usize {
            return Err(Error::MalformedScan(
                "Block count does not match the MCU grid",
            ));
        }

        let mut pixels = vec![0u8; width * height * channels];
        let row_bytes = self.mcu_info.mcu_size.1 as usize * width * channels;

        let reconstruct_row = |(output, coefficients): (&mut [u8], &[Block])| -> Result<()> {
            if cancellation.is_some_and(CancellationToken::is_cancelled) {
                return Err(Error::Cancelled);
            }
            self.reconstruct_mcu_row(coefficients, output);
            Ok(())
        };

        #[cfg(feature = "parallel")]
        pixels
            .par_chunks_mut(row_bytes)
            .zip(blocks.par_chunks(blocks_per_row))
            .try_for_each(reconstruct_row)?;

        #[cfg(not(feature = "parallel"))]
        pixels
            .chunks_mut(row_bytes)
            .zip(blocks.chunks(blocks_per_row))
            .try_for_each(reconstruct_row)?;

        Ok(Image {
            width: width as u32,
            height: height as u32,
            color_type: self.color_type,
            pixels,
        })
    }

    /// Reconstructs one row of MCUs into `output`, which holds the raster rows the MCU row
    /// covers. The last MCU row may cover fewer rows than an MCU is tall.
    fn reconstruct_mcu_row(&self, coefficients: &[Block], output: &mut [u8]) {
        let width = self.image_size.0 as usize;
        let channels = self.color_type.channels();
        let rows = output.len() / (width * channels);
        let (mcu_width, _) = self.mcu_info.mcu_size;
        let (max_h, max_v) = self.mcu_info.max_xy_sampling_factor;

        // Sample planes, indexed by frame component position
        let mut planes = vec![vec![]; self.components.len()];
        for component in &self.components {
            planes[component.frame_index] = vec![0u8; component.plane_size()];
        }

        let mcus = coefficients.chunks(self.mcu_info.blocks_per_mcu);
        for (mcu_x, mcu_blocks) in mcus.enumerate() {
            for component in &self.components {
                let plane = &mut planes[component.frame_index];
                self.component_samples(component, mcu_blocks, plane);
            }

            let x_start = mcu_x * mcu_width as usize;
            let x_end = (x_start + mcu_width as usize).min(width);
            for y in 0..rows {
                for x in x_start..x_end {
                    let local_x = x - x_start;
                    let mut samples = [0u8; 3];
                    for component in &self.components {
                        let (h, v) = component.xy_sampling_factor;
                        // Nearest neighbour: each sample covers max/own pixels in each direction
                        let source_x = local_x * h as usize / max_h as usize;
                        let source_y = y * v as usize / max_v as usize;
                        samples[component.frame_index] = planes[component.frame_index]
                            [source_y * component.plane_stride() + source_x];
                    }

                    let data_index = (y * width + x) * channels;
                    match self.color_type {
                        ColorType::L8 => output[data_index] = samples[0],
                        ColorType::Rgb8 => {
                            let rgb = ycbcr_to_rgb((samples[0], samples[1], samples[2]));
                            output[data_index] = rgb.0;
                            output[data_index + 1] = rgb.1;
                            output[data_index + 2] = rgb.2;
                        }
                    }
                }
            }
        }
    }

    /// Dequantizes and inverse transforms a component's blocks within one MCU into its plane.
    fn component_samples(
        &self,
        component: &ComponentLayout,
        mcu_blocks: &[Block],
        plane: &mut [u8],
    ) {
        let (h, v) = component.xy_sampling_factor;
        let stride = component.plane_stride();
        let block_count = h as usize * v as usize;

        let component_blocks =
            &mcu_blocks[component.first_block..component.first_block + block_count];
        for (index, block) in component_blocks.iter().enumerate() {
            let base_x = (index % h as usize) * 8;
            let base_y = (index / h as usize) * 8;

            // Dequantize and unzigzag
            let mut dequantized = [0f32; 64];
            for (coefficient, &(row, col)) in block.iter().zip(ZIGZAG_MAP) {
                let natural = row as usize * 8 + col as usize;
                dequantized[natural] =
                    *coefficient as f32 * component.quant_table[natural] as f32;
            }

            let spatial = idct(&self.idct_table, &dequantized);
            for y in 0..8 {
                for x in 0..8 {
                    plane[(base_y + y) * stride + base_x + x] =
                        clamp_to_u8(spatial[y * 8 + x] + 128.0);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg::jpeg_reader::JPEGParser;
    use test_log::test;

    /// 8x8 grayscale stream with single-code huffman tables and a unit quantizer
    fn grayscale_header() -> HeaderInfo {
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&[0xFF, 0xDB, 0x00, 0x43, 0x00]);
        data.extend_from_slice(&[1; 64]);
        for class in [0x00, 0x10] {
            data.extend_from_slice(&[0xFF, 0xC4, 0x00, 0x14, class, 1]);
            data.extend_from_slice(&[0; 15]);
            data.push(0x00);
        }
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x0B, 8, 0, 8, 0, 8, 1, 1, 0x11, 0]);
        data.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 1, 1, 0x00, 0, 63, 0]);
        data.extend_from_slice(&[0x3F, 0xFF, 0xD9]);

        HeaderInfo::read_header_info(&mut JPEGParser::new(&data)).unwrap()
    }

    #[test]
    fn reconstruct_observes_cancellation() {
        let header = grayscale_header();
        let reconstructor = Reconstructor::new(&header).unwrap();
        let blocks = vec![[0i16; 64]];

        let token = CancellationToken::new();
        let image = reconstructor.reconstruct(&blocks, Some(&token)).unwrap();
        assert_eq!(image.pixels, vec![128; 64]);

        token.cancel();
        assert!(matches!(
            reconstructor.reconstruct(&blocks, Some(&token)),
            Err(Error::Cancelled)
        ));
    }

    #[test]
    fn block_count_must_match_the_grid() {
        let reconstructor = Reconstructor::new(&grayscale_header()).unwrap();
        assert!(matches!(
            reconstructor.reconstruct(&[[0i16; 64]; 2], None),
            Err(Error::MalformedScan(_))
        ));
    }

    #[test]
    fn idct_of_dc_only_block_is_flat() {
        let table = idct_table();
        let mut coefficients = [0f32; 64];
        coefficients[0] = 80.0;
        for value in idct(&table, &coefficients) {
            assert!((value - 10.0).abs() < 1e-4);
        }

        let zero = idct(&table, &[0f32; 64]);
        assert!(zero.iter().all(|value| *value == 0.0));
    }

    #[test]
    fn idct_of_first_horizontal_frequency() {
        let table = idct_table();
        let mut coefficients = [0f32; 64];
        coefficients[1] = 100.0;
        let output = idct(&table, &coefficients);
        for y in 0..8 {
            // Antisymmetric left to right, identical in every row
            for x in 0..4 {
                assert!((output[y * 8 + x] + output[y * 8 + 7 - x]).abs() < 1e-3);
                assert!((output[y * 8 + x] - output[x]).abs() < 1e-3);
            }
            assert!(output[y * 8] > output[y * 8 + 3]);
        }
    }

    #[test]
    fn color_conversion() {
        assert_eq!(ycbcr_to_rgb((128, 128, 128)), (128, 128, 128));
        assert_eq!(ycbcr_to_rgb((0, 128, 128)), (0, 0, 0));
        assert_eq!(ycbcr_to_rgb((255, 128, 128)), (255, 255, 255));
        assert_eq!(ycbcr_to_rgb((76, 85, 255)), (254, 0, 0));
        // Out of gamut values clamp
        assert_eq!(ycbcr_to_rgb((255, 255, 255)), (255, 121, 255));
    }

    #[test]
    fn clamping() {
        assert_eq!(clamp_to_u8(-3.2), 0);
        assert_eq!(clamp_to_u8(127.5), 128);
        assert_eq!(clamp_to_u8(300.0), 255);
    }
}
