use geo::Coord;
use ndarray::{Array2, ArrayView2};
use std::{cell::RefCell, fmt::Debug, path::Path, rc::Rc};

use crate::{
    components::{band::BandInfo, bounds::PixelWindow, transforms::GeoTransform, DataType},
    errors::Result,
};

/// Readable raster collaborator, one per opened file or in-memory array.
pub trait RasterSource<T: DataType>: Debug {
    fn description(&self) -> String;

    /// (bands, rows, cols)
    fn shape(&self) -> (usize, usize, usize);

    fn transform(&self) -> Result<GeoTransform>;

    fn crs(&self) -> String;

    /// Zero based band index.
    fn band_info(&self, band: usize) -> Result<BandInfo>;

    /// Reads `window` of one band as a (rows, cols) array.
    fn read_band(&self, band: usize, window: &PixelWindow) -> Result<Array2<T>>;

    /// Backing file, `None` for in-memory sources.
    fn location(&self) -> Option<&Path> {
        None
    }

    /// Underlying GDAL dataset, for sources read through GDAL.
    #[cfg(feature = "gdal")]
    fn gdal_dataset(&self) -> Option<&gdal::Dataset> {
        None
    }

    fn bands_info(&self) -> Result<Vec<BandInfo>> {
        (0..self.shape().0).map(|band| self.band_info(band)).collect()
    }
}

/// Writable raster collaborator.
pub trait RasterSink<T: DataType> {
    /// Writes `data` into one band with its top left pixel at `offset`.
    fn write_band(&mut self, band: usize, offset: Coord<usize>, data: ArrayView2<T>) -> Result<()>;
}

impl<T: DataType, S: RasterSink<T>> RasterSink<T> for Rc<RefCell<S>> {
    fn write_band(&mut self, band: usize, offset: Coord<usize>, data: ArrayView2<T>) -> Result<()> {
        self.borrow_mut().write_band(band, offset, data)
    }
}

impl<T: DataType, S: RasterSink<T> + ?Sized> RasterSink<T> for Box<S> {
    fn write_band(&mut self, band: usize, offset: Coord<usize>, data: ArrayView2<T>) -> Result<()> {
        self.as_mut().write_band(band, offset, data)
    }
}

/// Everything a sink needs to be created with matching world-space metadata.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RasterLayout {
    /// (bands, rows, cols)
    pub shape: (usize, usize, usize),
    pub transform: GeoTransform,
    pub crs: String,
    pub bands: Vec<BandInfo>,
}
