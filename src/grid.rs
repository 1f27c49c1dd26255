use crate::error::{PatchMosaicError, Result};
use crate::geometry::{GridIndex, PatchGeometry};
use log::debug;
use ndarray::{s, ArrayView3};

/// Overlapping `P x P x C` patches over an `(H, W, C)` raster.
///
/// Patches are views into the source array; no pixel data is copied until a
/// patch is normalized for the transform.
#[derive(Debug, Clone)]
pub struct PatchGrid<'a, T> {
    raster: ArrayView3<'a, T>,
    geometry: PatchGeometry,
}

impl<'a, T> PatchGrid<'a, T> {
    /// Build the grid. Fails with `RasterTooSmall` when either raster side is
    /// shorter than the patch.
    pub fn new(raster: ArrayView3<'a, T>, patch_size: usize, halo: usize) -> Result<Self> {
        let (height, width, bands) = raster.dim();
        if bands == 0 {
            return Err(PatchMosaicError::InvalidDimensions(height, width, bands));
        }

        let geometry = PatchGeometry::new(height, width, patch_size, halo)?;
        debug!(
            "PatchGrid: {} bands, {} patches ({}x{})",
            bands,
            geometry.patch_count(),
            geometry.grid_rows(),
            geometry.grid_cols()
        );

        Ok(Self { raster, geometry })
    }

    pub fn geometry(&self) -> &PatchGeometry {
        &self.geometry
    }

    pub fn band_count(&self) -> usize {
        self.raster.dim().2
    }

    pub fn len(&self) -> usize {
        self.geometry.patch_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Patch at a grid index, or `None` outside the grid.
    pub fn patch(&self, index: GridIndex) -> Option<ArrayView3<'a, T>> {
        if !self.geometry.contains(index) {
            return None;
        }
        Some(self.patch_unchecked(index))
    }

    /// All patches in row-major order.
    pub fn patches(&self) -> impl ExactSizeIterator<Item = (GridIndex, ArrayView3<'a, T>)> + '_ {
        (0..self.len()).map(move |position| {
            let index = self.geometry.index_of(position);
            (index, self.patch_unchecked(index))
        })
    }

    pub(crate) fn patch_at(&self, position: usize) -> ArrayView3<'a, T> {
        self.patch_unchecked(self.geometry.index_of(position))
    }

    fn patch_unchecked(&self, index: GridIndex) -> ArrayView3<'a, T> {
        let (y, x) = self.geometry.patch_origin(index);
        let p = self.geometry.patch_size;
        self.raster.slice_move(s![y..y + p, x..x + p, ..])
    }
}
