use crate::config::RunConfig;
use crate::error::{PatchMosaicError, Result};
use crate::geometry::PatchGeometry;
use crate::grid::PatchGrid;
use crate::io;
use crate::mosaic::MosaicBuilder;
use crate::output::OutputEncoding;
use crate::timing::StageTimer;
use crate::transform::{build_transform, label_patches, PatchTransform};
use log::{debug, info};
use ndarray::{Array2, ArrayView3};

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub geometry: PatchGeometry,
    pub encoding: OutputEncoding,
    pub max_label: u32,
}

/// Tile `raster`, run every patch through `transform` and stitch the
/// per-patch label maps into one `(H, W)` canvas.
pub fn classify_raster<T>(
    raster: ArrayView3<'_, T>,
    patch_size: usize,
    halo: usize,
    normalization: f32,
    transform: &dyn PatchTransform,
    batch_size: usize,
) -> Result<Array2<u32>>
where
    T: Copy + Into<f32> + Send + Sync,
{
    let grid = PatchGrid::new(raster, patch_size, halo)?;
    let geometry = *grid.geometry();
    let total = geometry.patch_count();
    info!(
        "Tiled raster into {}x{} patches of {} px (halo {}, stride {})",
        geometry.grid_rows(),
        geometry.grid_cols(),
        patch_size,
        halo,
        geometry.stride
    );

    let mut mosaic = MosaicBuilder::<u32>::new(geometry);
    for batch in grid.batches(normalization, batch_size)? {
        let inputs: Vec<ArrayView3<'_, f32>> = batch.iter().map(|patch| patch.data.view()).collect();
        let outputs = transform.predict(&inputs)?;
        if outputs.len() != batch.len() {
            return Err(PatchMosaicError::PatchCountMismatch {
                expected: batch.len(),
                actual: outputs.len(),
            });
        }

        let label_maps = label_patches(&outputs);
        for (patch, labels) in batch.iter().zip(&label_maps) {
            mosaic.push(patch.index, labels.view())?;
        }
        debug!("Classified {}/{} patches", mosaic.consumed(), total);
    }

    mosaic.finish()
}

/// Read, classify, mosaic and write one raster.
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    config.validate()?;
    let mut timer = StageTimer::new();

    let halo = config.halo()?;
    info!(
        "Overlap fraction {} → halo of {} px on {} px patches",
        config.overlap_fraction, halo, config.patch_size
    );

    let raster = io::read_raster(&config.input)?;
    let metadata = &raster.metadata;
    info!(
        "Raster size: {}x{}, {} bands",
        metadata.width, metadata.height, metadata.band_count
    );
    // Fail on undersized rasters before any transform is built
    let geometry = PatchGeometry::new(metadata.height, metadata.width, config.patch_size, halo)?;
    timer.mark("Read raster");

    let transform = build_transform(&config.transform, metadata.band_count)?;
    let pool = config.transform_config.build_pool()?;
    let labels = pool.install(|| {
        classify_raster(
            raster.data.view(),
            config.patch_size,
            halo,
            config.normalization,
            transform.as_ref(),
            config.transform_config.batch_size,
        )
    })?;
    timer.mark("Classified and mosaicked patches");

    let max_label = labels.iter().copied().max().unwrap_or(0);
    info!("Writing output: {}", config.output);
    let encoding = io::write_label_raster(&config.output, &labels, metadata, &config.output_options)?;
    timer.mark("Wrote output");

    if let Some(path) = &config.timing_log {
        timer.write_log(path)?;
    }

    Ok(RunSummary {
        geometry,
        encoding,
        max_label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{BandArgmax, NormalizedDifference};
    use ndarray::{Array3, Axis};

    /// Claims one patch too few for every batch.
    struct DroppingTransform;

    impl PatchTransform for DroppingTransform {
        fn name(&self) -> &str {
            "dropping"
        }

        fn num_classes(&self) -> usize {
            1
        }

        fn predict(&self, batch: &[ArrayView3<'_, f32>]) -> Result<Vec<ndarray::Array3<f32>>> {
            Ok(batch
                .iter()
                .skip(1)
                .map(|patch| patch.to_owned())
                .collect())
        }
    }

    #[test]
    fn test_band_argmax_matches_per_pixel() {
        // Brightest band varies across the scene in diagonal stripes.
        let raster = Array3::from_shape_fn((45, 38, 3), |(y, x, c)| {
            if (y + x) / 5 % 3 == c {
                40000u16
            } else {
                1000 + (c as u16) * 10
            }
        });
        let transform = BandArgmax::new(3).unwrap();
        let labels = classify_raster(raster.view(), 16, 4, 65536.0, &transform, 5).unwrap();

        assert_eq!(labels.dim(), (45, 38));
        for ((y, x), &label) in labels.indexed_iter() {
            assert_eq!(label as usize, (y + x) / 5 % 3, "pixel ({}, {})", y, x);
        }
    }

    #[test]
    fn test_normalized_difference_mask() {
        let raster = Array3::from_shape_fn((33, 50, 2), |(y, _, c)| match (y < 20, c) {
            (true, 0) => 30000u16,
            (true, _) => 5000,
            (false, 0) => 5000,
            (false, _) => 30000,
        });
        let transform = NormalizedDifference::new(0, 1, 0.0, 2).unwrap();
        let labels = classify_raster(raster.view(), 16, 2, 65536.0, &transform, 7).unwrap();
        for (y, row) in labels.axis_iter(Axis(0)).enumerate() {
            let expected = if y < 20 { 1 } else { 0 };
            assert!(row.iter().all(|&v| v == expected), "row {}", y);
        }
    }

    #[test]
    fn test_transform_count_mismatch_aborts() {
        let raster = Array3::<u16>::zeros((32, 32, 1));
        let err = classify_raster(raster.view(), 16, 4, 65536.0, &DroppingTransform, 4).unwrap_err();
        assert!(matches!(
            err,
            PatchMosaicError::PatchCountMismatch {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_small_raster_aborts() {
        let raster = Array3::<u16>::zeros((100, 300, 3));
        let transform = BandArgmax::new(3).unwrap();
        assert!(matches!(
            classify_raster(raster.view(), 128, 32, 65536.0, &transform, 8),
            Err(PatchMosaicError::RasterTooSmall { .. })
        ));
    }
}
