use geo::Coord;
use ndarray::{s, Array2, Array3, ArrayView2};

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

/// Raster held entirely in memory as a (bands, rows, cols) array.
#[derive(Debug, Clone)]
pub struct MemorySource<T: DataType> {
    name: String,
    data: Array3<T>,
    transform: GeoTransform,
    crs: String,
    bands: Vec<BandInfo>,
}

impl<T: DataType> MemorySource<T> {
    pub fn new(
        name: impl Into<String>,
        data: Array3<T>,
        transform: GeoTransform,
        crs: impl Into<String>,
    ) -> Self {
        let bands = (0..data.dim().0)
            .map(|band| BandInfo::new(format!("band_{}", band + 1), None))
            .collect();
        Self {
            name: name.into(),
            data,
            transform,
            crs: crs.into(),
            bands,
        }
    }

    /// Zero filled raster shaped after `layout`.
    pub fn from_layout(name: impl Into<String>, layout: &RasterLayout) -> Self {
        let (bands, rows, cols) = layout.shape;
        let mut source = Self::new(
            name,
            Array3::zeros((bands, rows, cols)),
            layout.transform,
            layout.crs.clone(),
        );
        if layout.bands.len() == bands {
            source.bands = layout.bands.clone();
        }
        source
    }

    /// Same no-data value for every band.
    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.bands.iter_mut().for_each(|band| band.nodata = nodata);
        self
    }

    pub fn with_band_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.bands
            .iter_mut()
            .zip(names)
            .for_each(|(band, name)| band.name = name.into());
        self
    }

    pub fn data(&self) -> &Array3<T> {
        &self.data
    }

    pub fn into_data(self) -> Array3<T> {
        self.data
    }

    fn check_band(&self, band: usize) -> Result<()> {
        if band < self.bands.len() {
            Ok(())
        } else {
            Err(RusterError::UnknownBand(band.to_string()))
        }
    }

    fn extent(&self) -> Coord<usize> {
        let (_, rows, cols) = self.data.dim();
        Coord { x: cols, y: rows }
    }
}

impl<T: DataType> RasterSource<T> for MemorySource<T> {
    fn description(&self) -> String {
        self.name.clone()
    }

    fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    fn transform(&self) -> Result<GeoTransform> {
        Ok(self.transform)
    }

    fn crs(&self) -> String {
        self.crs.clone()
    }

    fn band_info(&self, band: usize) -> Result<BandInfo> {
        self.check_band(band)?;
        Ok(self.bands[band].clone())
    }

    fn read_band(&self, band: usize, window: &PixelWindow) -> Result<Array2<T>> {
        self.check_band(band)?;
        let extent = self.extent();
        if window.clip(extent) != Some(*window) {
            return Err(RusterError::OutOfBounds {
                window: window.to_string(),
                cols: extent.x,
                rows: extent.y,
            });
        }
        let (offset, end) = (window.offset(), window.end());
        Ok(self
            .data
            .slice(s![band, offset.y..end.y, offset.x..end.x])
            .to_owned())
    }
}

impl<T: DataType> RasterSink<T> for MemorySource<T> {
    fn write_band(&mut self, band: usize, offset: Coord<usize>, data: ArrayView2<T>) -> Result<()> {
        self.check_band(band)?;
        let (rows, cols) = data.dim();
        let window = PixelWindow::new(offset.x_y(), (cols, rows));
        let extent = self.extent();
        if window.clip(extent) != Some(window) {
            return Err(RusterError::OutOfBounds {
                window: window.to_string(),
                cols: extent.x,
                rows: extent.y,
            });
        }
        self.data
            .slice_mut(s![band, offset.y..offset.y + rows, offset.x..offset.x + cols])
            .assign(&data);
        Ok(())
    }
}
