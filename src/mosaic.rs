use crate::error::{PatchMosaicError, Result};
use crate::geometry::{GridIndex, PatchGeometry};
use log::debug;
use ndarray::{s, Array2, ArrayView2};

/// Assembles per-patch result maps into one `(H, W)` canvas.
///
/// Results must arrive in row-major grid order and carry their grid index;
/// anything else is rejected before it touches the canvas. The canvas is only
/// handed out by [`MosaicBuilder::finish`] once every patch has been placed.
#[derive(Debug)]
pub struct MosaicBuilder<L> {
    geometry: PatchGeometry,
    canvas: Array2<L>,
    next_position: usize,
}

impl<L> MosaicBuilder<L>
where
    L: Copy + Default,
{
    pub fn new(geometry: PatchGeometry) -> Self {
        let canvas = Array2::from_elem((geometry.height, geometry.width), L::default());
        Self {
            geometry,
            canvas,
            next_position: 0,
        }
    }

    pub fn geometry(&self) -> &PatchGeometry {
        &self.geometry
    }

    /// Number of patches placed so far.
    pub fn consumed(&self) -> usize {
        self.next_position
    }

    /// Grid index the next result must carry, or `None` once complete.
    pub fn expected_index(&self) -> Option<GridIndex> {
        if self.next_position < self.geometry.patch_count() {
            Some(self.geometry.index_of(self.next_position))
        } else {
            None
        }
    }

    /// Place the result for the patch at `index`.
    pub fn push(&mut self, index: GridIndex, labels: ArrayView2<'_, L>) -> Result<()> {
        let total = self.geometry.patch_count();
        if self.next_position >= total {
            return Err(PatchMosaicError::PatchCountMismatch {
                expected: total,
                actual: self.next_position + 1,
            });
        }

        let actual = self.geometry.position_of(index);
        if !self.geometry.contains(index) || actual != self.next_position {
            return Err(PatchMosaicError::OrderingViolation {
                expected: self.next_position,
                actual,
            });
        }

        let p = self.geometry.patch_size;
        if labels.dim() != (p, p) {
            return Err(PatchMosaicError::PatchShapeMismatch {
                expected: (p, p),
                actual: labels.dim(),
            });
        }

        let placement = self.geometry.placement(index);
        self.canvas
            .slice_mut(s![placement.rows.target, placement.cols.target])
            .assign(&labels.slice(s![placement.rows.source, placement.cols.source]));

        self.next_position += 1;
        Ok(())
    }

    /// Place the next result by position alone.
    pub fn push_next(&mut self, labels: ArrayView2<'_, L>) -> Result<()> {
        let index = self.geometry.index_of(self.next_position);
        self.push(index, labels)
    }

    /// Return the canvas, or `PatchCountMismatch` if patches are missing.
    pub fn finish(self) -> Result<Array2<L>> {
        let expected = self.geometry.patch_count();
        if self.next_position != expected {
            return Err(PatchMosaicError::PatchCountMismatch {
                expected,
                actual: self.next_position,
            });
        }
        debug!(
            "Mosaic complete: {} patches into {}x{} canvas",
            expected, self.geometry.height, self.geometry.width
        );
        Ok(self.canvas)
    }
}

/// Reconstruct a canvas from untagged result maps in row-major order.
pub fn reconstruct<L, I>(geometry: PatchGeometry, results: I) -> Result<Array2<L>>
where
    L: Copy + Default,
    I: IntoIterator<Item = Array2<L>>,
{
    let total = geometry.patch_count();
    let mut builder = MosaicBuilder::new(geometry);
    let mut results = results.into_iter();

    while let Some(labels) = results.next() {
        if builder.consumed() == total {
            return Err(PatchMosaicError::PatchCountMismatch {
                expected: total,
                actual: total + 1 + results.count(),
            });
        }
        builder.push_next(labels.view())?;
    }

    builder.finish()
}
