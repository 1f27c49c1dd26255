use crate::error::{PatchMosaicError, Result};
use gdal::Dataset;
use log::{debug, info};

pub const DEFAULT_COMPRESSION: &str = "DEFLATE";

const COMPRESSIONS: [&str; 4] = ["DEFLATE", "LZW", "ZSTD", "NONE"];

const MIN_OVERVIEW_SIZE: usize = 256;

/// Pixel type of the label raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEncoding {
    Byte,
    UInt16,
    Float32,
}

impl OutputEncoding {
    /// Narrowest encoding that holds `max_label`.
    pub fn for_max_label(max_label: u32) -> Self {
        if max_label <= u32::from(u8::MAX) {
            OutputEncoding::Byte
        } else if max_label <= u32::from(u16::MAX) {
            OutputEncoding::UInt16
        } else {
            OutputEncoding::Float32
        }
    }

    pub fn gdal_name(&self) -> &'static str {
        match self {
            OutputEncoding::Byte => "Byte",
            OutputEncoding::UInt16 => "UInt16",
            OutputEncoding::Float32 => "Float32",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputOptions {
    pub compression: String,
    /// Tiled output with this block size; striped when `None`.
    pub tile_size: Option<usize>,
    pub overviews: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            compression: DEFAULT_COMPRESSION.to_string(),
            tile_size: None,
            overviews: false,
        }
    }
}

impl OutputOptions {
    /// Reject codecs the writer does not configure and block sizes GTiff
    /// cannot tile with.
    pub fn validate(&self) -> Result<()> {
        if !COMPRESSIONS.contains(&self.compression.as_str()) {
            return Err(PatchMosaicError::InvalidCompression(self.compression.clone()));
        }
        match self.tile_size {
            Some(size) if size == 0 || size % 16 != 0 => Err(PatchMosaicError::InvalidTileSize(size)),
            _ => Ok(()),
        }
    }

    /// GTiff creation options for the label raster.
    pub fn creation_options(&self) -> Vec<String> {
        let compress = (self.compression != "NONE").then(|| format!("COMPRESS={}", self.compression));
        let tiling = self.tile_size.into_iter().flat_map(|size| {
            [
                "TILED=YES".to_string(),
                format!("BLOCKXSIZE={}", size),
                format!("BLOCKYSIZE={}", size),
            ]
        });
        compress
            .into_iter()
            .chain(tiling)
            .chain(std::iter::once("BIGTIFF=IF_SAFER".to_string()))
            .collect()
    }
}

/// Power-of-two decimation factors whose coarsest level still spans
/// `MIN_OVERVIEW_SIZE` pixels on the short side.
pub fn overview_levels(width: usize, height: usize) -> Vec<i32> {
    let short_side = width.min(height);
    std::iter::successors(Some(2usize), |factor| factor.checked_mul(2))
        .take_while(|factor| short_side / factor >= MIN_OVERVIEW_SIZE)
        .filter_map(|factor| i32::try_from(factor).ok())
        .collect()
}

/// Build internal overviews. Labels are categorical, so levels are
/// resampled with NEAREST rather than averaged.
pub fn build_overviews(dataset: &mut Dataset) -> gdal::errors::Result<()> {
    let (width, height) = dataset.raster_size();
    let levels = overview_levels(width, height);
    if levels.is_empty() {
        debug!("Label raster {}x{} needs no overviews", width, height);
        return Ok(());
    }

    info!("Building NEAREST overviews at factors {:?}", levels);
    dataset.build_overviews("NEAREST", &levels, &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_by_value_range() {
        assert_eq!(OutputEncoding::for_max_label(0), OutputEncoding::Byte);
        assert_eq!(OutputEncoding::for_max_label(255), OutputEncoding::Byte);
        assert_eq!(OutputEncoding::for_max_label(256), OutputEncoding::UInt16);
        assert_eq!(OutputEncoding::for_max_label(65535), OutputEncoding::UInt16);
        assert_eq!(OutputEncoding::for_max_label(65536), OutputEncoding::Float32);
    }

    #[test]
    fn test_supported_compressions() {
        for compression in ["DEFLATE", "LZW", "ZSTD", "NONE"] {
            let options = OutputOptions {
                compression: compression.to_string(),
                ..OutputOptions::default()
            };
            assert!(options.validate().is_ok(), "{}", compression);
        }
    }

    #[test]
    fn test_unknown_compression_rejected() {
        let options = OutputOptions {
            compression: "jpeg".to_string(),
            ..OutputOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(PatchMosaicError::InvalidCompression(name)) if name == "jpeg"
        ));
    }

    #[test]
    fn test_tile_size_must_be_multiple_of_16() {
        let with_tiles = |tile_size| OutputOptions {
            tile_size: Some(tile_size),
            ..OutputOptions::default()
        };
        assert!(OutputOptions::default().validate().is_ok());
        assert!(with_tiles(256).validate().is_ok());
        assert!(with_tiles(512).validate().is_ok());
        assert!(matches!(
            with_tiles(0).validate(),
            Err(PatchMosaicError::InvalidTileSize(0))
        ));
        assert!(matches!(
            with_tiles(100).validate(),
            Err(PatchMosaicError::InvalidTileSize(100))
        ));
    }

    #[test]
    fn test_tiled_creation_options() {
        let options = OutputOptions {
            compression: "LZW".to_string(),
            tile_size: Some(512),
            overviews: false,
        };
        assert_eq!(
            options.creation_options(),
            vec![
                "COMPRESS=LZW",
                "TILED=YES",
                "BLOCKXSIZE=512",
                "BLOCKYSIZE=512",
                "BIGTIFF=IF_SAFER"
            ]
        );
    }

    #[test]
    fn test_uncompressed_striped_creation_options() {
        let options = OutputOptions {
            compression: "NONE".to_string(),
            ..OutputOptions::default()
        };
        assert_eq!(options.creation_options(), vec!["BIGTIFF=IF_SAFER"]);
    }

    #[test]
    fn test_overview_levels() {
        assert!(overview_levels(300, 511).is_empty());
        assert_eq!(overview_levels(512, 4000), vec![2]);
        assert_eq!(overview_levels(2048, 2100), vec![2, 4, 8]);
    }
}
