use crate::error::{PatchMosaicError, Result};
use crate::geometry::{halo_from_overlap_fraction, DEFAULT_PATCH_SIZE};
use crate::output::OutputOptions;
use crate::stream::DEFAULT_NORMALIZATION;
use crate::transform::{TransformConfig, TransformSpec};

/// Overlap-area fraction giving a 32 pixel halo on 128 pixel patches.
pub const DEFAULT_OVERLAP_FRACTION: f64 = 0.25;

/// Everything one prediction run needs.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub input: String,
    pub output: String,
    /// Desired fractional overlap area between neighbouring patches, in (0, 1].
    pub overlap_fraction: f64,
    pub patch_size: usize,
    pub normalization: f32,
    pub transform: TransformSpec,
    pub transform_config: TransformConfig,
    pub output_options: OutputOptions,
    pub timing_log: Option<String>,
}

impl RunConfig {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            overlap_fraction: DEFAULT_OVERLAP_FRACTION,
            patch_size: DEFAULT_PATCH_SIZE,
            normalization: DEFAULT_NORMALIZATION,
            transform: TransformSpec::BandArgmax,
            transform_config: TransformConfig::default(),
            output_options: OutputOptions::default(),
            timing_log: None,
        }
    }

    /// Halo length derived from the overlap fraction and patch size.
    pub fn halo(&self) -> Result<usize> {
        halo_from_overlap_fraction(self.overlap_fraction, self.patch_size)
    }

    pub fn validate(&self) -> Result<()> {
        if self.patch_size == 0 {
            return Err(PatchMosaicError::InvalidPatchSize(self.patch_size));
        }
        self.halo()?;
        if !(self.normalization.is_finite() && self.normalization > 0.0) {
            return Err(PatchMosaicError::InvalidNormalization(self.normalization));
        }
        self.transform_config.validate()?;
        self.output_options.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RunConfig::new("in.tif", "out.tif");
        assert!(config.validate().is_ok());
        assert_eq!(config.halo().unwrap(), 32);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = RunConfig::new("in.tif", "out.tif");
        config.overlap_fraction = 0.0;
        assert!(matches!(
            config.validate(),
            Err(PatchMosaicError::InvalidOverlapFraction(_))
        ));

        let mut config = RunConfig::new("in.tif", "out.tif");
        config.normalization = -1.0;
        assert!(config.validate().is_err());

        let mut config = RunConfig::new("in.tif", "out.tif");
        config.patch_size = 0;
        assert!(matches!(
            config.validate(),
            Err(PatchMosaicError::InvalidPatchSize(0))
        ));

        let mut config = RunConfig::new("in.tif", "out.tif");
        config.output_options.compression = "JPEG".to_string();
        assert!(config.validate().is_err());
    }
}
