use crate::error::{PatchMosaicError, Result};
use log::debug;
use std::ops::Range;

/// Patch edge length used by the reference classifier.
pub const DEFAULT_PATCH_SIZE: usize = 128;

/// Derive the halo length from the desired fractional overlap area `r`.
///
/// Adjacent patches share `1 - sqrt(r)` of their edge, split evenly between
/// the two sides: `R = round((1 - sqrt(r)) * P / 2)`.
pub fn halo_from_overlap_fraction(fraction: f64, patch_size: usize) -> Result<usize> {
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(PatchMosaicError::InvalidOverlapFraction(fraction));
    }
    if patch_size == 0 {
        return Err(PatchMosaicError::InvalidPatchSize(patch_size));
    }

    let halo = ((1.0 - fraction.sqrt()) * patch_size as f64 / 2.0).round() as usize;
    if 2 * halo >= patch_size {
        return Err(PatchMosaicError::InvalidHalo { halo, patch_size });
    }
    Ok(halo)
}

/// Position of a patch in the grid. The last row and column are the
/// boundary-anchored ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridIndex {
    pub row: usize,
    pub col: usize,
}

impl GridIndex {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Where a patch sits along one axis of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisClass {
    First,
    Middle,
    Last,
}

impl AxisClass {
    /// Exclusive classification: index 0 is always `First`, even on a
    /// single-patch axis.
    pub fn classify(index: usize, last: usize) -> Self {
        if index == 0 {
            AxisClass::First
        } else if index == last {
            AxisClass::Last
        } else {
            AxisClass::Middle
        }
    }
}

/// Source and destination ranges contributed by one patch along one axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisSpan {
    pub source: Range<usize>,
    pub target: Range<usize>,
}

impl AxisSpan {
    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }
}

/// Sub-rectangle of a patch result and the canvas rectangle it is copied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub rows: AxisSpan,
    pub cols: AxisSpan,
}

/// Tiling geometry of one raster.
///
/// `row_over` is the width of new content in the right-edge column and
/// `column_over` the height of new content in the bottom-edge row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchGeometry {
    pub height: usize,
    pub width: usize,
    pub patch_size: usize,
    pub halo: usize,
    pub stride: usize,
    pub num_rows: usize,
    pub num_cols: usize,
    pub row_over: usize,
    pub column_over: usize,
}

impl PatchGeometry {
    pub fn new(height: usize, width: usize, patch_size: usize, halo: usize) -> Result<Self> {
        if patch_size == 0 {
            return Err(PatchMosaicError::InvalidPatchSize(patch_size));
        }
        if 2 * halo >= patch_size {
            return Err(PatchMosaicError::InvalidHalo { halo, patch_size });
        }
        if height < patch_size || width < patch_size {
            return Err(PatchMosaicError::RasterTooSmall {
                height,
                width,
                patch_size,
            });
        }

        let stride = patch_size - 2 * halo;
        let num_rows = (height - 2 * halo) / stride;
        let num_cols = (width - 2 * halo) / stride;
        let row_over = (width - 2 * halo) % stride + halo;
        let column_over = (height - 2 * halo) % stride + halo;

        debug!(
            "PatchGeometry: {}x{} raster, patch={}, halo={}, stride={} → {}x{} patches, row_over={}, column_over={}",
            height,
            width,
            patch_size,
            halo,
            stride,
            num_rows + 1,
            num_cols + 1,
            row_over,
            column_over
        );

        Ok(Self {
            height,
            width,
            patch_size,
            halo,
            stride,
            num_rows,
            num_cols,
            row_over,
            column_over,
        })
    }

    /// Rows of the grid, including the bottom-anchored one.
    pub fn grid_rows(&self) -> usize {
        self.num_rows + 1
    }

    /// Columns of the grid, including the right-anchored one.
    pub fn grid_cols(&self) -> usize {
        self.num_cols + 1
    }

    pub fn patch_count(&self) -> usize {
        self.grid_rows() * self.grid_cols()
    }

    pub fn contains(&self, index: GridIndex) -> bool {
        index.row <= self.num_rows && index.col <= self.num_cols
    }

    /// Grid index of the patch at a row-major position.
    pub fn index_of(&self, position: usize) -> GridIndex {
        GridIndex {
            row: position / self.grid_cols(),
            col: position % self.grid_cols(),
        }
    }

    /// Row-major position of a grid index. Saturates for indices far
    /// outside the grid.
    pub fn position_of(&self, index: GridIndex) -> usize {
        index
            .row
            .saturating_mul(self.grid_cols())
            .saturating_add(index.col)
    }

    /// Pixel offset `(y, x)` of the patch's top-left corner in the raster.
    pub fn patch_origin(&self, index: GridIndex) -> (usize, usize) {
        let y = if index.row < self.num_rows {
            index.row * self.stride
        } else {
            self.height - self.patch_size
        };
        let x = if index.col < self.num_cols {
            index.col * self.stride
        } else {
            self.width - self.patch_size
        };
        (y, x)
    }

    /// `(row class, column class)` of a patch.
    pub fn axis_classes(&self, index: GridIndex) -> (AxisClass, AxisClass) {
        (
            AxisClass::classify(index.row, self.num_rows),
            AxisClass::classify(index.col, self.num_cols),
        )
    }

    /// Which part of a patch result lands where on the canvas.
    ///
    /// The two axes are independent: the row class picks the vertical
    /// extents and the column class the horizontal ones.
    pub fn placement(&self, index: GridIndex) -> Placement {
        let (row_class, col_class) = self.axis_classes(index);
        Placement {
            rows: self.axis_span(row_class, index.row, self.height, self.column_over),
            cols: self.axis_span(col_class, index.col, self.width, self.row_over),
        }
    }

    fn axis_span(&self, class: AxisClass, index: usize, extent: usize, over: usize) -> AxisSpan {
        let p = self.patch_size;
        let r = self.halo;
        let s = self.stride;

        match class {
            // Raster edge on the leading side: keep it, trim only the trailing halo.
            AxisClass::First => AxisSpan {
                source: 0..p - r,
                target: 0..p - r,
            },
            AxisClass::Middle => AxisSpan {
                source: r..p - r,
                target: index * s + r..(index + 1) * s + r,
            },
            // Edge-anchored patch: only its last `over` pixels are new.
            AxisClass::Last => AxisSpan {
                source: p - over..p,
                target: extent - over..extent,
            },
        }
    }
}
