use std::{
    fs::{self, File},
    io::BufWriter,
    path::PathBuf,
};

use baseline_jpeg::{jpeg::JPEGDecoder, ppm::PPMEncoder, ImageDecoder, ImageEncoder};
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};

#[derive(Parser)]
struct Opt {
    /// Input JPEG file
    input: PathBuf,

    /// Output image file, written as binary PGM for grayscale and PPM for colour images
    #[clap(long, short)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(EnvFilter::from_default_env())
            .init();
    }

    let opt = Opt::parse();
    let data = fs::read(&opt.input)
        .wrap_err_with(|| format!("Cannot read {}", opt.input.display()))?;

    let image = JPEGDecoder::new(&data)
        .decode()
        .wrap_err_with(|| format!("Cannot decode {}", opt.input.display()))?;
    println!(
        "Image size: {} x {}, {} channel(s)",
        image.width,
        image.height,
        image.color_type.channels()
    );

    if let Some(output) = opt.output {
        let file = File::create(&output)
            .wrap_err_with(|| format!("Cannot create {}", output.display()))?;
        PPMEncoder::new(&image)
            .encode(BufWriter::new(file))
            .wrap_err("Cannot write output image")?;
    }
    Ok(())
}
