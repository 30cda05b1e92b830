//! Implementations for gdal

use gdal::{
    raster::{Buffer, GdalType},
    spatial_ref::SpatialRef,
    Dataset as GdalDataset, DriverManager, Metadata as GdalMetadata,
};
use geo::Coord;
use ndarray::{Array2, ArrayView2};
use std::{
    fmt::Debug,
    path::{Path, PathBuf},
};

use crate::{
    components::{
        band::BandInfo,
        bounds::PixelWindow,
        source::{RasterLayout, RasterSink, RasterSource},
        transforms::GeoTransform,
        DataType,
    },
    errors::{Result, RusterError},
};

pub trait GdalDataType: DataType + GdalType {}
impl<T: DataType + GdalType> GdalDataType for T {}

fn gdal_offset(offset: Coord<usize>) -> (isize, isize) {
    (offset.x as isize, offset.y as isize)
}

/// Raster file (or in-memory GDAL dataset such as a VRT) read through GDAL.
pub struct GdalSource {
    path: Option<PathBuf>,
    dataset: GdalDataset,
}

impl Debug for GdalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GdalSource")
            .field("path", &self.path)
            .field("size", &self.dataset.raster_size())
            .field("bands", &self.dataset.raster_count())
            .finish()
    }
}

impl GdalSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let dataset = GdalDataset::open(&path)
            .map_err(|error| RusterError::unavailable(path.as_ref().display().to_string(), error))?;
        Ok(Self {
            path: Some(path.as_ref().to_path_buf()),
            dataset,
        })
    }

    pub fn from_dataset(dataset: GdalDataset) -> Self {
        Self {
            path: None,
            dataset,
        }
    }

    pub fn dataset(&self) -> &GdalDataset {
        &self.dataset
    }
}

impl<T: GdalDataType> RasterSource<T> for GdalSource {
    fn description(&self) -> String {
        GdalMetadata::description(&self.dataset)
            .ok()
            .filter(|description| !description.is_empty())
            .or_else(|| self.path.as_ref().map(|path| path.display().to_string()))
            .unwrap_or_default()
    }

    fn shape(&self) -> (usize, usize, usize) {
        let (cols, rows) = self.dataset.raster_size();
        (self.dataset.raster_count(), rows, cols)
    }

    fn transform(&self) -> Result<GeoTransform> {
        Ok(GeoTransform::new(self.dataset.geo_transform()?))
    }

    fn crs(&self) -> String {
        self.dataset.projection()
    }

    fn band_info(&self, band: usize) -> Result<BandInfo> {
        if band >= self.dataset.raster_count() {
            return Err(RusterError::UnknownBand(band.to_string()));
        }
        let rasterband = self.dataset.rasterband(band + 1)?;
        let description = GdalMetadata::description(&rasterband)?;
        let name = if description.is_empty() {
            format!("band_{}", band + 1)
        } else {
            description.clone()
        };
        Ok(BandInfo::new(name, rasterband.no_data_value()).with_description(description))
    }

    fn read_band(&self, band: usize, window: &PixelWindow) -> Result<Array2<T>> {
        let (cols, rows) = self.dataset.raster_size();
        if window.clip(Coord { x: cols, y: rows }) != Some(*window) {
            return Err(RusterError::OutOfBounds {
                window: window.to_string(),
                cols,
                rows,
            });
        }
        let rasterband = self.dataset.rasterband(band + 1)?;
        let size = window.shape().x_y();
        let buffer = rasterband.read_as::<T>(gdal_offset(window.offset()), size, size, None)?;
        Ok(Array2::from_shape_vec(
            (window.height(), window.width()),
            buffer.data().to_vec(),
        )?)
    }

    fn location(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn gdal_dataset(&self) -> Option<&GdalDataset> {
        Some(&self.dataset)
    }
}

/// Raster file created through a GDAL driver.
pub struct GdalSink {
    dataset: GdalDataset,
}

impl GdalSink {
    /// Creates `path` with `driver` (e.g. `GTiff`) shaped and
    /// georeferenced after `layout`.
    pub fn create<T: GdalDataType, P: AsRef<Path>>(
        path: P,
        driver: &str,
        layout: &RasterLayout,
    ) -> Result<Self> {
        let driver = DriverManager::get_driver_by_name(driver)?;
        let (bands, rows, cols) = layout.shape;
        let mut dataset = driver.create_with_band_type::<T, _>(path, cols, rows, bands)?;
        dataset.set_geo_transform(&layout.transform.coefficients())?;
        if !layout.crs.is_empty() {
            dataset.set_spatial_ref(&SpatialRef::from_definition(&layout.crs)?)?;
        }
        for (index, band) in layout.bands.iter().enumerate() {
            let mut rasterband = dataset.rasterband(index + 1)?;
            rasterband.set_no_data_value(band.nodata)?;
            if !band.name.is_empty() {
                rasterband.set_description(&band.name)?;
            }
        }
        Ok(Self { dataset })
    }

    pub fn into_dataset(self) -> GdalDataset {
        self.dataset
    }
}

impl<T: GdalDataType> RasterSink<T> for GdalSink {
    fn write_band(&mut self, band: usize, offset: Coord<usize>, data: ArrayView2<T>) -> Result<()> {
        let (rows, cols) = data.dim();
        let mut buffer = Buffer::new((cols, rows), data.iter().copied().collect());
        let mut rasterband = self.dataset.rasterband(band + 1)?;
        rasterband.write(gdal_offset(offset), (cols, rows), &mut buffer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{components::raster::RasterAccess, testutils};
    use ndarray::s;
    use rstest::{fixture, rstest};

    #[fixture]
    fn layout() -> RasterLayout {
        RasterLayout {
            shape: (2, 3, 4),
            transform: testutils::transform(),
            crs: testutils::CRS.to_string(),
            bands: vec![
                BandInfo::new("red", Some(-9999.)),
                BandInfo::new("nir", Some(-9999.)),
            ],
        }
    }

    fn written(layout: &RasterLayout) -> GdalSource {
        let data = testutils::gradient(2, 3, 4);
        let mut sink = GdalSink::create::<f32, _>("", "MEM", layout).unwrap();
        for (band, values) in data.outer_iter().enumerate() {
            sink.write_band(band, Coord { x: 0, y: 0 }, values).unwrap();
        }
        GdalSource::from_dataset(sink.into_dataset())
    }

    #[rstest]
    fn mem_round_trip(layout: RasterLayout) {
        let source = written(&layout);
        assert!(RasterSource::<f32>::location(&source).is_none());
        assert_eq!(RasterSource::<f32>::shape(&source), (2, 3, 4));
        assert_eq!(RasterSource::<f32>::transform(&source).unwrap(), testutils::transform());
        let bands = RasterSource::<f32>::bands_info(&source).unwrap();
        let names: Vec<&str> = bands.iter().map(|band| band.name.as_str()).collect();
        assert_eq!(names, vec!["red", "nir"]);
        assert!(bands.iter().all(|band| band.nodata == Some(-9999.)));

        let window = PixelWindow::new((1, 1), (3, 2));
        let read = RasterSource::<f32>::read_band(&source, 1, &window).unwrap();
        assert_eq!(read, testutils::gradient(2, 3, 4).slice(s![1, 1..3, 1..4]));
    }

    #[rstest]
    fn window_outside_dataset_fails(layout: RasterLayout) {
        let source = written(&layout);
        assert!(matches!(
            RasterSource::<f32>::read_band(&source, 0, &PixelWindow::new((2, 2), (4, 4))),
            Err(RusterError::OutOfBounds { .. })
        ));
        assert!(matches!(
            RasterSource::<f32>::band_info(&source, 2),
            Err(RusterError::UnknownBand(_))
        ));
    }

    #[rstest]
    fn raster_access_over_gdal(layout: RasterLayout) {
        let raster = RasterAccess::<f32>::open("mem", written(&layout)).unwrap();
        let pixels = raster
            .reader()
            .unwrap()
            .read_window(&[1, 0], &PixelWindow::new((3, 2), (1, 1)), &Default::default())
            .unwrap();
        assert_eq!(pixels.values_at(Coord { x: 3, y: 2 }), Some(vec![123., 23.]));
    }
}
