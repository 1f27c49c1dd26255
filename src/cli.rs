use crate::config::{RunConfig, DEFAULT_OVERLAP_FRACTION};
use crate::error::{PatchMosaicError, Result};
use crate::geometry::DEFAULT_PATCH_SIZE;
use crate::output::{OutputOptions, DEFAULT_COMPRESSION};
use crate::stream::DEFAULT_NORMALIZATION;
use crate::transform::{TransformConfig, TransformSpec, DEFAULT_BATCH_SIZE};
use clap::{Parser, ValueEnum};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransformKind {
    /// One class per band, the brightest band wins
    BandArgmax,
    /// Two classes split on a normalized band difference
    NormalizedDifference,
}

#[derive(Parser, Debug)]
#[command(name = "patch-mosaic")]
#[command(about = "Classify a large GeoTIFF patch by patch and stitch a seamless label raster")]
#[command(version)]
pub struct Args {
    /// Input GeoTIFF path (multi-band imagery)
    #[arg(short, long, value_name = "FILE")]
    pub input: String,

    /// Output GeoTIFF path (single-band class labels)
    #[arg(short, long, value_name = "FILE")]
    pub output: String,

    /// Patch transform to apply
    #[arg(long, value_enum, default_value_t = TransformKind::BandArgmax)]
    pub transform: TransformKind,

    /// Bands A,B for the normalized difference (1-based)
    #[arg(long, value_delimiter = ',', default_value = "1,2", value_name = "A,B")]
    pub bands: Vec<usize>,

    /// Normalized difference above which a pixel is class 1
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub threshold: f32,

    /// Desired overlap area between neighbouring patches, in (0, 1]
    #[arg(long, default_value_t = DEFAULT_OVERLAP_FRACTION, value_name = "FRACTION")]
    pub overlap: f64,

    /// Patch edge length in pixels
    #[arg(long, default_value_t = DEFAULT_PATCH_SIZE, value_name = "PIXELS")]
    pub patch_size: usize,

    /// Patches per transform call
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, value_name = "N")]
    pub batch_size: usize,

    /// Divisor mapping raw pixel values into the transform's input range
    #[arg(long, default_value_t = DEFAULT_NORMALIZATION, value_name = "VALUE")]
    pub normalization: f32,

    /// Number of threads (default: all available)
    #[arg(short, long, value_name = "N")]
    pub threads: Option<usize>,

    /// Output compression (DEFLATE, LZW, ZSTD, NONE)
    #[arg(long, default_value = DEFAULT_COMPRESSION)]
    pub compress: String,

    /// Write tiled output with this block size (multiple of 16)
    #[arg(long, value_name = "PIXELS")]
    pub tile_size: Option<usize>,

    /// Build internal overviews on the output
    #[arg(long)]
    pub overviews: bool,

    /// Write per-stage elapsed times to this file
    #[arg(long, value_name = "FILE")]
    pub timing_log: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn into_config(self) -> Result<RunConfig> {
        let transform = match self.transform {
            TransformKind::BandArgmax => TransformSpec::BandArgmax,
            TransformKind::NormalizedDifference => {
                let (band_a, band_b) = match self.bands.as_slice() {
                    &[a, b] => (zero_based(a)?, zero_based(b)?),
                    other => {
                        return Err(PatchMosaicError::InvalidBandSelection(format!(
                            "expected two bands A,B, got {}",
                            other.len()
                        )))
                    }
                };
                TransformSpec::NormalizedDifference {
                    band_a,
                    band_b,
                    threshold: self.threshold,
                }
            }
        };

        let config = RunConfig {
            input: self.input,
            output: self.output,
            overlap_fraction: self.overlap,
            patch_size: self.patch_size,
            normalization: self.normalization,
            transform,
            transform_config: TransformConfig {
                batch_size: self.batch_size,
                threads: self.threads,
            },
            output_options: OutputOptions {
                compression: self.compress.to_uppercase(),
                tile_size: self.tile_size,
                overviews: self.overviews,
            },
            timing_log: self.timing_log,
        };
        config.validate()?;
        Ok(config)
    }
}

fn zero_based(band: usize) -> Result<usize> {
    band.checked_sub(1).ok_or_else(|| {
        PatchMosaicError::InvalidBandSelection(format!("band numbers start at 1, got {}", band))
    })
}
