use crate::error::{PatchMosaicError, Result};
use log::info;
use ndarray::{s, Array2, Array3, ArrayView1, ArrayView3, Axis};
use rayon::prelude::*;

pub const DEFAULT_BATCH_SIZE: usize = 16;

/// Per-patch predictive transform.
///
/// Takes a batch of normalized `P x P x C` tensors and returns one
/// `P x P x num_classes` probability tensor per input, in input order.
pub trait PatchTransform: Send + Sync {
    fn name(&self) -> &str;

    fn num_classes(&self) -> usize;

    fn predict(&self, batch: &[ArrayView3<'_, f32>]) -> Result<Vec<Array3<f32>>>;
}

/// Resources handed to the transform for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformConfig {
    pub batch_size: usize,
    /// Worker threads; `None` uses every available core.
    pub threads: Option<usize>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            threads: None,
        }
    }
}

impl TransformConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(PatchMosaicError::InvalidBatchSize(self.batch_size));
        }
        Ok(())
    }

    /// Thread pool scoped to one run.
    pub fn build_pool(&self) -> Result<rayon::ThreadPool> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n_threads) = self.threads {
            builder = builder.num_threads(n_threads);
            info!("Using {} threads", n_threads);
        } else {
            info!("Using all available threads");
        }
        Ok(builder.build()?)
    }
}

/// Which built-in transform to run.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformSpec {
    BandArgmax,
    /// Zero-based band indices.
    NormalizedDifference {
        band_a: usize,
        band_b: usize,
        threshold: f32,
    },
}

pub fn build_transform(spec: &TransformSpec, band_count: usize) -> Result<Box<dyn PatchTransform>> {
    let transform: Box<dyn PatchTransform> = match *spec {
        TransformSpec::BandArgmax => Box::new(BandArgmax::new(band_count)?),
        TransformSpec::NormalizedDifference {
            band_a,
            band_b,
            threshold,
        } => Box::new(NormalizedDifference::new(band_a, band_b, threshold, band_count)?),
    };
    info!(
        "Patch transform: {} ({} classes)",
        transform.name(),
        transform.num_classes()
    );
    Ok(transform)
}

fn check_bands(patch: &ArrayView3<'_, f32>, band_count: usize) -> Result<()> {
    let bands = patch.dim().2;
    if bands != band_count {
        return Err(PatchMosaicError::Transform(format!(
            "expected {} bands per patch, got {}",
            band_count, bands
        )));
    }
    Ok(())
}

/// One class per band: each pixel's probabilities are its band values
/// scaled to sum to one.
#[derive(Debug, Clone)]
pub struct BandArgmax {
    band_count: usize,
}

impl BandArgmax {
    pub fn new(band_count: usize) -> Result<Self> {
        if band_count == 0 {
            return Err(PatchMosaicError::InvalidBand {
                band: 0,
                band_count,
            });
        }
        Ok(Self { band_count })
    }

    fn predict_one(&self, patch: &ArrayView3<'_, f32>) -> Result<Array3<f32>> {
        check_bands(patch, self.band_count)?;
        let uniform = 1.0 / self.band_count as f32;
        let mut probs = patch.to_owned();
        for mut pixel in probs.lanes_mut(Axis(2)) {
            let sum: f32 = pixel.sum();
            if sum > 0.0 {
                pixel /= sum;
            } else {
                pixel.fill(uniform);
            }
        }
        Ok(probs)
    }
}

impl PatchTransform for BandArgmax {
    fn name(&self) -> &str {
        "band-argmax"
    }

    fn num_classes(&self) -> usize {
        self.band_count
    }

    fn predict(&self, batch: &[ArrayView3<'_, f32>]) -> Result<Vec<Array3<f32>>> {
        batch.par_iter().map(|patch| self.predict_one(patch)).collect()
    }
}

/// Two-class split on the normalized difference `(a - b) / (a + b)` of two
/// bands: class 1 where it exceeds `threshold`.
#[derive(Debug, Clone)]
pub struct NormalizedDifference {
    band_a: usize,
    band_b: usize,
    threshold: f32,
    band_count: usize,
}

impl NormalizedDifference {
    pub fn new(band_a: usize, band_b: usize, threshold: f32, band_count: usize) -> Result<Self> {
        for band in [band_a, band_b] {
            if band >= band_count {
                return Err(PatchMosaicError::InvalidBand { band, band_count });
            }
        }
        Ok(Self {
            band_a,
            band_b,
            threshold,
            band_count,
        })
    }

    pub fn index(&self, a: f32, b: f32) -> f32 {
        let sum = a + b;
        if sum > 0.0 {
            (a - b) / sum
        } else {
            0.0
        }
    }

    fn predict_one(&self, patch: &ArrayView3<'_, f32>) -> Result<Array3<f32>> {
        check_bands(patch, self.band_count)?;
        let (rows, cols, _) = patch.dim();
        let mut probs = Array3::<f32>::zeros((rows, cols, 2));
        for y in 0..rows {
            for x in 0..cols {
                let ndi = self.index(patch[[y, x, self.band_a]], patch[[y, x, self.band_b]]);
                let positive = (0.5 + (ndi - self.threshold) / 2.0).clamp(0.0, 1.0);
                probs[[y, x, 0]] = 1.0 - positive;
                probs[[y, x, 1]] = positive;
            }
        }
        Ok(probs)
    }
}

impl PatchTransform for NormalizedDifference {
    fn name(&self) -> &str {
        "normalized-difference"
    }

    fn num_classes(&self) -> usize {
        2
    }

    fn predict(&self, batch: &[ArrayView3<'_, f32>]) -> Result<Vec<Array3<f32>>> {
        batch.par_iter().map(|patch| self.predict_one(patch)).collect()
    }
}

/// Index of the first maximum; NaN never wins.
fn argmax(values: ArrayView1<'_, f32>) -> u32 {
    let mut best = 0;
    let mut best_value = f32::NEG_INFINITY;
    for (class, &value) in values.iter().enumerate() {
        if value > best_value {
            best = class;
            best_value = value;
        }
    }
    best as u32
}

/// Per-pixel class index of a `P x P x num_classes` probability tensor.
pub fn argmax_labels(probs: ArrayView3<'_, f32>) -> Array2<u32> {
    let (rows, cols, _) = probs.dim();
    Array2::from_shape_fn((rows, cols), |(y, x)| argmax(probs.slice(s![y, x, ..])))
}

/// Label maps for a batch of transform outputs, in the same order.
pub fn label_patches(outputs: &[Array3<f32>]) -> Vec<Array2<u32>> {
    outputs
        .par_iter()
        .map(|probs| argmax_labels(probs.view()))
        .collect()
}
