use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatchMosaicError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Array shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Cannot open raster {path}: {source}")]
    RasterOpen {
        path: String,
        source: gdal::errors::GdalError,
    },

    #[error("Cannot write raster {path}: {source}")]
    RasterWrite {
        path: String,
        source: gdal::errors::GdalError,
    },

    #[error("Raster of {height}x{width} pixels is smaller than the {patch_size}x{patch_size} patch")]
    RasterTooSmall {
        height: usize,
        width: usize,
        patch_size: usize,
    },

    #[error("Band {band} has pixel type {pixel_type}; only unsigned 8/16-bit imagery is supported")]
    UnsupportedPixelType { band: usize, pixel_type: String },

    #[error("Invalid band selection: {0}")]
    InvalidBandSelection(String),

    #[error("Input raster has invalid dimensions: {0}x{1}x{2}")]
    InvalidDimensions(usize, usize, usize),

    #[error("Invalid patch size: {0} (must be positive)")]
    InvalidPatchSize(usize),

    #[error("Invalid halo length {halo} for patch size {patch_size} (must be below half the patch)")]
    InvalidHalo { halo: usize, patch_size: usize },

    #[error("Invalid overlap fraction: {0} (must be in (0, 1])")]
    InvalidOverlapFraction(f64),

    #[error("Invalid batch size: {0} (must be positive)")]
    InvalidBatchSize(usize),

    #[error("Invalid normalization constant: {0} (must be positive and finite)")]
    InvalidNormalization(f32),

    #[error("Expected {expected} patch results, got {actual}")]
    PatchCountMismatch { expected: usize, actual: usize },

    #[error("Patch results out of order: expected position {expected}, got {actual}")]
    OrderingViolation { expected: usize, actual: usize },

    #[error("Patch result has shape {actual:?}, expected {expected:?}")]
    PatchShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Band {band} does not exist (raster has {band_count} bands)")]
    InvalidBand { band: usize, band_count: usize },

    #[error("Invalid compression type: {0}")]
    InvalidCompression(String),

    #[error("Invalid tile size: {0} (must be multiple of 16)")]
    InvalidTileSize(usize),

    #[error("Patch transform failed: {0}")]
    Transform(String),
}

pub type Result<T> = std::result::Result<T, PatchMosaicError>;
