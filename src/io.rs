use crate::error::{PatchMosaicError, Result};
use crate::output::{build_overviews, OutputEncoding, OutputOptions};
use gdal::cpl::CslStringList;
use gdal::errors::GdalError;
use gdal::raster::{Buffer, GdalDataType, GdalType};
use gdal::{Dataset, DriverManager, Metadata};
use log::{debug, info, warn};
use ndarray::{Array2, Array3, Axis};

/// Geotransform used when the source carries none.
const IDENTITY_GEOTRANSFORM: [f64; 6] = [0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

#[derive(Debug, Clone, PartialEq)]
pub struct RasterMetadata {
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub geotransform: [f64; 6],
    pub projection: String,
}

/// A multi-band raster with pixels laid out `(H, W, C)`.
#[derive(Debug, Clone)]
pub struct Raster {
    pub data: Array3<u16>,
    pub metadata: RasterMetadata,
}

fn open_error(path: &str) -> impl Fn(GdalError) -> PatchMosaicError + '_ {
    move |source| PatchMosaicError::RasterOpen {
        path: path.to_string(),
        source,
    }
}

fn write_error(path: &str) -> impl Fn(GdalError) -> PatchMosaicError + '_ {
    move |source| PatchMosaicError::RasterWrite {
        path: path.to_string(),
        source,
    }
}

/// Extract metadata from a dataset without reading pixels
pub fn extract_metadata_from_dataset(dataset: &Dataset) -> Result<RasterMetadata> {
    let (width, height) = dataset.raster_size();
    let band_count = dataset.raster_count();

    if width == 0 || height == 0 || band_count == 0 {
        return Err(PatchMosaicError::InvalidDimensions(height, width, band_count));
    }

    let geotransform = match dataset.geo_transform() {
        Ok(geotransform) => geotransform,
        Err(e) => {
            warn!("No geotransform on input ({}), using identity", e);
            IDENTITY_GEOTRANSFORM
        }
    };

    Ok(RasterMetadata {
        width,
        height,
        band_count,
        geotransform,
        projection: dataset.projection(),
    })
}

/// Read every band of a raster into an `(H, W, C)` array.
///
/// GDAL hands bands out one plane at a time, so each plane is copied into
/// its channel of the pixel-interleaved array. Only Byte and UInt16 bands
/// are accepted; anything else would be clamped on the way to `u16`.
pub fn read_raster(path: &str) -> Result<Raster> {
    info!("Opening input raster: {}", path);
    let dataset = Dataset::open(path).map_err(open_error(path))?;
    let metadata = extract_metadata_from_dataset(&dataset)?;
    let (width, height) = (metadata.width, metadata.height);

    debug!(
        "Raster dimensions: {}x{}, {} bands",
        width, height, metadata.band_count
    );

    let mut data = Array3::<u16>::zeros((height, width, metadata.band_count));
    for band_index in 1..=metadata.band_count {
        let rasterband = dataset.rasterband(band_index).map_err(open_error(path))?;
        let band_type = rasterband.band_type();
        if !matches!(band_type, GdalDataType::UInt8 | GdalDataType::UInt16) {
            return Err(PatchMosaicError::UnsupportedPixelType {
                band: band_index,
                pixel_type: format!("{:?}", band_type),
            });
        }
        let buffer = rasterband
            .read_as::<u16>((0, 0), (width, height), (width, height), None)
            .map_err(open_error(path))?;
        let data_vec: Vec<u16> = buffer.into_iter().collect();
        let plane = Array2::from_shape_vec((height, width), data_vec)?;
        data.index_axis_mut(Axis(2), band_index - 1).assign(&plane);
        debug!("Read band {}", band_index);
    }

    Ok(Raster { data, metadata })
}

/// Write a label canvas as a single-band GeoTIFF carrying the source
/// georeferencing. The pixel type is the narrowest that holds every label.
pub fn write_label_raster(
    path: &str,
    labels: &Array2<u32>,
    metadata: &RasterMetadata,
    options: &OutputOptions,
) -> Result<OutputEncoding> {
    let (height, width) = labels.dim();
    if (height, width) != (metadata.height, metadata.width) {
        return Err(PatchMosaicError::InvalidDimensions(height, width, 1));
    }

    let max_label = labels.iter().copied().max().unwrap_or(0);
    let encoding = OutputEncoding::for_max_label(max_label);
    info!(
        "Creating output raster: {} ({}, max label {})",
        path,
        encoding.gdal_name(),
        max_label
    );

    match encoding {
        OutputEncoding::Byte => {
            write_single_band(path, labels.mapv(|v| v as u8), metadata, options)?
        }
        OutputEncoding::UInt16 => {
            write_single_band(path, labels.mapv(|v| v as u16), metadata, options)?
        }
        OutputEncoding::Float32 => {
            write_single_band(path, labels.mapv(|v| v as f32), metadata, options)?
        }
    }

    info!("Successfully wrote {}x{} labels to output", width, height);
    Ok(encoding)
}

fn write_single_band<T: GdalType + Copy>(
    path: &str,
    data: Array2<T>,
    metadata: &RasterMetadata,
    options: &OutputOptions,
) -> Result<()> {
    let mut dataset = create_output_dataset::<T>(path, metadata, options)?;

    dataset
        .set_geo_transform(&metadata.geotransform)
        .map_err(write_error(path))?;
    if !metadata.projection.is_empty() {
        dataset
            .set_projection(&metadata.projection)
            .map_err(write_error(path))?;
    }

    {
        let mut raster_band = dataset.rasterband(1).map_err(write_error(path))?;
        // Row-major iteration matches GDAL's scanline order
        let data_vec: Vec<T> = data.iter().copied().collect();
        let mut buffer = Buffer::new((metadata.width, metadata.height), data_vec);
        raster_band
            .write((0, 0), (metadata.width, metadata.height), &mut buffer)
            .map_err(write_error(path))?;
        raster_band
            .set_description("class")
            .map_err(write_error(path))?;
    }

    if options.overviews {
        build_overviews(&mut dataset).map_err(write_error(path))?;
    }

    Ok(())
}

/// Create a single-band output dataset with the configured creation options
pub fn create_output_dataset<T: GdalType>(
    path: &str,
    metadata: &RasterMetadata,
    options: &OutputOptions,
) -> Result<Dataset> {
    let driver = DriverManager::get_driver_by_name("GTiff").map_err(write_error(path))?;
    let creation_options = options.creation_options();
    debug!("Creation options: {:?}", creation_options);

    let mut gdal_options = CslStringList::new();
    for opt in &creation_options {
        gdal_options.add_string(opt).map_err(write_error(path))?;
    }

    let dataset = driver
        .create_with_band_type_with_options::<T, _>(
            path,
            metadata.width,
            metadata.height,
            1,
            &gdal_options,
        )
        .map_err(write_error(path))?;

    Ok(dataset)
}
