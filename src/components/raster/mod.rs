mod export;
mod stats;

pub use stats::BandStatistics;

use geo::{BoundingRect, Coord, LineString, Polygon};
use log::info;
use ndarray::{Array3, Axis};
use std::{fmt::Debug, path::Path, rc::Rc};

use crate::{
    components::{
        band::BandInfo,
        bounds::{BoundingRegion, PixelWindow},
        grid::TileGrid,
        source::{RasterLayout, RasterSource},
        transforms::GeoTransform,
        view::{sanitize, TileIter, TileReader},
        DataType,
    },
    config::{GridOptions, InitOptions, TileIterOptions, TileSize},
    crs_geo::CrsGeometry,
    errors::{Result, RusterError},
    indexes::BandSelection,
};

/// Metadata read once from the source when a handle is initialized.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RasterMetadata {
    /// (bands, rows, cols)
    pub shape: (usize, usize, usize),
    pub transform: GeoTransform,
    pub crs: String,
    pub bands: Vec<BandInfo>,
}

impl RasterMetadata {
    /// (columns, rows)
    pub fn extent(&self) -> Coord<usize> {
        Coord {
            x: self.shape.2,
            y: self.shape.1,
        }
    }

    /// No-data value of the first band, shared by the raster.
    pub fn nodata(&self) -> Option<f64> {
        self.bands.first().and_then(|band| band.nodata)
    }

    pub fn layout(&self) -> RasterLayout {
        RasterLayout {
            shape: self.shape,
            transform: self.transform,
            crs: self.crs.clone(),
            bands: self.bands.clone(),
        }
    }
}

/// Pixels loaded into memory with the bands they come from.
#[derive(Clone, Debug)]
struct LoadedArray<T: DataType> {
    bands: Rc<[usize]>,
    data: Array3<T>,
}

/// Handle on one raster source.
///
/// Created empty, then initialized once from its source. Shape and
/// transform do not change until the handle is [reset](RasterAccess::reset).
pub struct RasterAccess<T: DataType> {
    name: String,
    source: Box<dyn RasterSource<T>>,
    metadata: Option<RasterMetadata>,
    array: Option<LoadedArray<T>>,
}

impl<T: DataType> Debug for RasterAccess<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let f = &mut f.debug_struct("RasterAccess");
        f.field("name", &self.name);
        if let Some(metadata) = &self.metadata {
            let bands: Vec<&str> = metadata.bands.iter().map(|band| band.name.as_str()).collect();
            f.field("shape", &metadata.shape)
                .field("transform", &metadata.transform)
                .field("bands", &bands);
        }
        f.field("array_loaded", &self.array.is_some()).finish()
    }
}

impl<T: DataType> RasterAccess<T> {
    pub fn new(name: impl Into<String>, source: impl RasterSource<T> + 'static) -> Self {
        Self {
            name: name.into(),
            source: Box::new(source),
            metadata: None,
            array: None,
        }
    }

    /// New handle initialized with metadata only.
    pub fn open(name: impl Into<String>, source: impl RasterSource<T> + 'static) -> Result<Self> {
        let mut raster = Self::new(name, source);
        raster.initialize(InitOptions::default())?;
        Ok(raster)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> Option<&Path> {
        self.source.location()
    }

    pub(crate) fn source(&self) -> &dyn RasterSource<T> {
        self.source.as_ref()
    }

    /// GDAL dataset behind the handle, `None` unless read through GDAL.
    #[cfg(feature = "gdal")]
    pub fn gdal_dataset(&self) -> Option<&gdal::Dataset> {
        self.source.gdal_dataset()
    }

    pub fn is_initialized(&self) -> bool {
        self.metadata.is_some()
    }

    /// Reads metadata and, if requested, pixels from the source.
    pub fn initialize(&mut self, options: InitOptions) -> Result<()> {
        if self.is_initialized() {
            return Err(RusterError::AlreadyInitialized(self.name.clone()));
        }
        let metadata = RasterMetadata {
            shape: self.source.shape(),
            transform: self.source.transform()?,
            crs: self.source.crs(),
            bands: self.source.bands_info()?,
        };

        let array = match &options.load_array {
            Some(selection) => Some(self.load_array(&metadata, selection, &options)?),
            None => None,
        };

        self.metadata = Some(metadata);
        self.array = array;
        info!("initialized {self:?}");
        Ok(())
    }

    fn load_array(
        &self,
        metadata: &RasterMetadata,
        selection: &BandSelection,
        options: &InitOptions,
    ) -> Result<LoadedArray<T>> {
        let bands = selection.resolve(&metadata.bands)?;
        let window = PixelWindow::full(metadata.extent());
        let (_, rows, cols) = metadata.shape;
        let mut data = Array3::zeros((bands.len(), rows, cols));
        for (mut layer, band) in data.axis_iter_mut(Axis(0)).zip(bands.iter()) {
            let mut read = self.source.read_band(*band, &window)?;
            if options.finite_only {
                let replacement = options.nan_replacement.or(metadata.bands[*band].nodata);
                sanitize(&mut read, replacement);
            }
            layer.assign(&read);
        }
        Ok(LoadedArray { bands, data })
    }

    /// Forgets metadata and pixels so the handle can be initialized again.
    pub fn reset(&mut self) {
        self.metadata = None;
        self.array = None;
    }

    pub fn metadata(&self) -> Result<&RasterMetadata> {
        self.metadata
            .as_ref()
            .ok_or_else(|| RusterError::NotInitialized(self.name.clone()))
    }

    /// (bands, rows, cols)
    pub fn shape(&self) -> Result<(usize, usize, usize)> {
        Ok(self.metadata()?.shape)
    }

    pub fn transform(&self) -> Result<GeoTransform> {
        Ok(self.metadata()?.transform)
    }

    pub fn crs(&self) -> Result<&str> {
        Ok(self.metadata()?.crs.as_str())
    }

    pub fn bands(&self) -> Result<&[BandInfo]> {
        Ok(self.metadata()?.bands.as_slice())
    }

    pub fn nodata(&self) -> Result<Option<f64>> {
        Ok(self.metadata()?.nodata())
    }

    /// Loaded pixels as (bands, rows, cols), `None` when only metadata was read.
    pub fn array(&self) -> Option<&Array3<T>> {
        self.array.as_ref().map(|array| &array.data)
    }

    /// Source band of every layer of [RasterAccess::array].
    pub fn array_bands(&self) -> Option<&[usize]> {
        self.array.as_ref().map(|array| array.bands.as_ref())
    }

    /// World polygon of the raster: tie point, then the other corners
    /// clockwise for north up rasters, closed.
    pub fn footprint(&self) -> Result<CrsGeometry<Polygon<f64>>> {
        let metadata = self.metadata()?;
        let polygon = window_footprint(&metadata.transform, &PixelWindow::full(metadata.extent()));
        Ok(CrsGeometry::new(Rc::from(metadata.crs.as_str()), polygon))
    }

    /// (xmin, xmax, ymin, ymax) in world units.
    pub fn extent(&self) -> Result<(f64, f64, f64, f64)> {
        let footprint = self.footprint()?;
        let rect = footprint
            .geometry()
            .bounding_rect()
            .ok_or_else(|| RusterError::InvalidRegion(self.name.clone()))?;
        Ok((rect.min().x, rect.max().x, rect.min().y, rect.max().y))
    }

    /// Pixel bounds of `region` clamped to the raster, the whole raster if `None`.
    pub fn pixel_region(&self, region: Option<&BoundingRegion>) -> Result<PixelWindow> {
        let metadata = self.metadata()?;
        match region {
            Some(region) => region.to_pixel_window(&metadata.transform, metadata.extent()),
            None => Ok(PixelWindow::full(metadata.extent())),
        }
    }

    /// Replaces `in_value` (the declared no-data value if `None`) in the
    /// loaded pixels with `out_value`, which becomes the new no-data value.
    pub fn replace_nodata(&mut self, in_value: Option<f64>, out_value: f64) -> Result<()> {
        let name = self.name.clone();
        let metadata = self
            .metadata
            .as_mut()
            .ok_or_else(|| RusterError::NotInitialized(name.clone()))?;
        let array = self
            .array
            .as_mut()
            .ok_or_else(|| RusterError::NotInitialized(format!("{name} pixel array")))?;
        let replacement: T = num::cast(out_value).unwrap_or_else(T::zero);

        if let Some(in_value) = in_value.or_else(|| metadata.nodata()) {
            array.data.mapv_inplace(|value| {
                let matches = value.to_f64().is_some_and(|value| {
                    value == in_value || (value.is_nan() && in_value.is_nan())
                });
                if matches {
                    replacement
                } else {
                    value
                }
            });
        }
        metadata
            .bands
            .iter_mut()
            .for_each(|band| band.nodata = Some(out_value));
        Ok(())
    }

    /// Tiles covering the raster or `options.region`.
    pub fn tile_grid(&self, tile_size: TileSize, options: &GridOptions) -> Result<TileGrid> {
        TileGrid::build(self.metadata()?, tile_size, options)
    }

    pub fn reader(&self) -> Result<TileReader<'_, T>> {
        TileReader::new(self)
    }

    /// Lazily reads the tiles of `grid` in grid order.
    pub fn tiles<'a>(
        &'a self,
        grid: &'a TileGrid,
        options: &TileIterOptions,
    ) -> Result<TileIter<'a, T>> {
        TileIter::new(self.reader()?, grid, options)
    }
}

/// World polygon of a pixel window: top left corner first, closed.
pub(crate) fn window_footprint(transform: &GeoTransform, window: &PixelWindow) -> Polygon<f64> {
    let coordinate_transform = transform.coordinate_transform();
    let (min, max) = (window.offset(), window.end());
    let corners = [
        (min.x, min.y),
        (max.x, min.y),
        (max.x, max.y),
        (min.x, max.y),
        (min.x, min.y),
    ];
    let ring: Vec<Coord<f64>> = corners
        .into_iter()
        .map(|corner| coordinate_transform.pixel_to_world(Coord::from(corner), false))
        .collect();
    Polygon::new(LineString::from(ring), vec![])
}
