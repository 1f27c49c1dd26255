// Library exports for testing and reuse

pub mod cli;
pub mod config;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod io;
pub mod mosaic;
pub mod output;
pub mod pipeline;
pub mod stream;
pub mod timing;
pub mod transform;

// Re-export commonly used types
pub use config::RunConfig;
pub use error::{PatchMosaicError, Result};
pub use geometry::{halo_from_overlap_fraction, AxisClass, GridIndex, PatchGeometry, Placement};
pub use grid::PatchGrid;
pub use io::{read_raster, write_label_raster, Raster, RasterMetadata};
pub use mosaic::{reconstruct, MosaicBuilder};
pub use stream::{NormalizedPatch, PatchBatches, PatchStream};
pub use transform::{argmax_labels, PatchTransform, TransformConfig, TransformSpec};
