use crate::error::{PatchMosaicError, Result};
use crate::geometry::GridIndex;
use crate::grid::PatchGrid;
use ndarray::{Array3, ArrayView3};
use rayon::prelude::*;

/// Maps 16-bit pixel values into `[0, 1)`.
pub const DEFAULT_NORMALIZATION: f32 = 65536.0;

/// A patch ready for the transform, tagged with where it came from.
#[derive(Debug, Clone)]
pub struct NormalizedPatch {
    pub index: GridIndex,
    pub data: Array3<f32>,
}

/// Divide every pixel by `normalization`.
pub fn normalize_patch<T>(patch: ArrayView3<'_, T>, normalization: f32) -> Array3<f32>
where
    T: Copy + Into<f32>,
{
    patch.mapv(|value| value.into() / normalization)
}

fn check_normalization(normalization: f32) -> Result<()> {
    if !(normalization.is_finite() && normalization > 0.0) {
        return Err(PatchMosaicError::InvalidNormalization(normalization));
    }
    Ok(())
}

impl<'a, T> PatchGrid<'a, T>
where
    T: Copy + Into<f32>,
{
    /// Lazy row-major sequence of normalized patches. Each call starts over
    /// from the first patch.
    pub fn stream(&self, normalization: f32) -> Result<PatchStream<'_, 'a, T>> {
        check_normalization(normalization)?;
        Ok(PatchStream {
            grid: self,
            normalization,
            position: 0,
        })
    }

    fn normalized(&self, position: usize, normalization: f32) -> NormalizedPatch {
        NormalizedPatch {
            index: self.geometry().index_of(position),
            data: normalize_patch(self.patch_at(position), normalization),
        }
    }
}

impl<'a, T> PatchGrid<'a, T>
where
    T: Copy + Into<f32> + Send + Sync,
{
    /// Row-major batches of at most `batch_size` normalized patches. Patches
    /// within a batch are normalized in parallel.
    pub fn batches(&self, normalization: f32, batch_size: usize) -> Result<PatchBatches<'_, 'a, T>> {
        check_normalization(normalization)?;
        if batch_size == 0 {
            return Err(PatchMosaicError::InvalidBatchSize(batch_size));
        }
        Ok(PatchBatches {
            grid: self,
            normalization,
            batch_size,
            position: 0,
        })
    }
}

pub struct PatchStream<'g, 'a, T> {
    grid: &'g PatchGrid<'a, T>,
    normalization: f32,
    position: usize,
}

impl<'g, 'a, T> Iterator for PatchStream<'g, 'a, T>
where
    T: Copy + Into<f32>,
{
    type Item = NormalizedPatch;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position < self.grid.len() {
            let patch = self.grid.normalized(self.position, self.normalization);
            self.position += 1;
            Some(patch)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.grid.len() - self.position;
        (remaining, Some(remaining))
    }
}

impl<'g, 'a, T> ExactSizeIterator for PatchStream<'g, 'a, T> where T: Copy + Into<f32> {}

pub struct PatchBatches<'g, 'a, T> {
    grid: &'g PatchGrid<'a, T>,
    normalization: f32,
    batch_size: usize,
    position: usize,
}

impl<'g, 'a, T> Iterator for PatchBatches<'g, 'a, T>
where
    T: Copy + Into<f32> + Send + Sync,
{
    type Item = Vec<NormalizedPatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let total = self.grid.len();
        if self.position >= total {
            return None;
        }

        let start = self.position;
        let end = (start + self.batch_size).min(total);
        self.position = end;

        let grid = self.grid;
        let normalization = self.normalization;
        let batch = (start..end)
            .into_par_iter()
            .map(|position| grid.normalized(position, normalization))
            .collect();
        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn raster() -> Array3<u16> {
        Array3::from_shape_fn((40, 30, 2), |(y, x, c)| (y * 1000 + x * 10 + c) as u16)
    }

    #[test]
    fn test_stream_length_and_order() {
        let raster = raster();
        let grid = PatchGrid::new(raster.view(), 16, 4).unwrap();
        let stream = grid.stream(DEFAULT_NORMALIZATION).unwrap();
        assert_eq!(stream.len(), 15);

        let patches: Vec<NormalizedPatch> = stream.collect();
        assert_eq!(patches.len(), 15);
        for (position, patch) in patches.iter().enumerate() {
            assert_eq!(patch.index, grid.geometry().index_of(position));
            assert_eq!(grid.geometry().position_of(patch.index), position);
            assert_eq!(patch.data.dim(), (16, 16, 2));
        }
    }

    #[test]
    fn test_stream_normalizes_values() {
        let raster = raster();
        let grid = PatchGrid::new(raster.view(), 16, 4).unwrap();
        let patch = grid.stream(1000.0).unwrap().nth(4).unwrap();
        // (1, 1) starts at (8, 8)
        assert_eq!(patch.index, GridIndex::new(1, 1));
        let expected = f32::from(raster[[9, 10, 1]]) / 1000.0;
        assert!((patch.data[[1, 2, 1]] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_stream_is_restartable() {
        let raster = raster();
        let grid = PatchGrid::new(raster.view(), 16, 4).unwrap();
        let first: Vec<_> = grid.stream(DEFAULT_NORMALIZATION).unwrap().collect();
        let second: Vec<_> = grid.stream(DEFAULT_NORMALIZATION).unwrap().collect();
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.index, b.index);
            assert_eq!(a.data, b.data);
        }
    }

    #[test]
    fn test_batches_match_stream() {
        let raster = raster();
        let grid = PatchGrid::new(raster.view(), 16, 4).unwrap();
        let batches: Vec<Vec<NormalizedPatch>> =
            grid.batches(DEFAULT_NORMALIZATION, 4).unwrap().collect();
        assert_eq!(
            batches.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![4, 4, 4, 3]
        );

        let flat: Vec<NormalizedPatch> = batches.into_iter().flatten().collect();
        let streamed: Vec<NormalizedPatch> = grid.stream(DEFAULT_NORMALIZATION).unwrap().collect();
        for (a, b) in flat.iter().zip(&streamed) {
            assert_eq!(a.index, b.index);
            assert_eq!(a.data, b.data);
        }
    }

    #[test]
    fn test_invalid_stream_parameters() {
        let raster = raster();
        let grid = PatchGrid::new(raster.view(), 16, 4).unwrap();
        assert!(matches!(
            grid.stream(0.0),
            Err(PatchMosaicError::InvalidNormalization(_))
        ));
        assert!(matches!(
            grid.batches(DEFAULT_NORMALIZATION, 0),
            Err(PatchMosaicError::InvalidBatchSize(0))
        ));
    }
}
