use std::io::{self, Write};

use crate::image::{ColorType, Image, ImageEncoder};

/// Binary PGM (P5) / PPM (P6) encoder
pub struct PPMEncoder<'image> {
    image: &'image Image,
}

impl PPMEncoder<'_> {
    /// The conventional file extension for the image's colour type
    pub fn extension(&self) -> &'static str {
        match self.image.color_type {
            ColorType::L8 => "pgm",
            ColorType::Rgb8 => "ppm",
        }
    }
}

impl<'image> ImageEncoder<'image> for PPMEncoder<'image> {
    fn new(image: &'image Image) -> Self {
        Self { image }
    }

    fn encode<W: Write>(&self, mut writer: W) -> io::Result<()> {
        let magic = match self.image.color_type {
            ColorType::L8 => 5,
            ColorType::Rgb8 => 6,
        };
        write!(
            writer,
            "P{}\n{} {}\n255\n",
            magic, self.image.width, self.image.height
        )?;
        writer.write_all(&self.image.pixels)?;
        writer.flush()
    }
}
