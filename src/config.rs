//! Explicit options of every raster operation, with the defaults used
//! when nothing is requested.

use crate::{
    components::bounds::BoundingRegion,
    errors::{Result, RusterError},
    indexes::BandSelection,
    reducer::ReducerSelection,
};

/// Nominal tile size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TileSize {
    pub width: usize,
    pub height: usize,
}

impl TileSize {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn square(side: usize) -> Self {
        Self::new(side, side)
    }

    pub(crate) fn validated(self) -> Result<Self> {
        if self.width == 0 || self.height == 0 {
            Err(RusterError::InvalidTileSize(self.width, self.height))
        } else {
            Ok(self)
        }
    }
}

impl Default for TileSize {
    fn default() -> Self {
        Self::square(1024)
    }
}

impl From<(usize, usize)> for TileSize {
    fn from(value: (usize, usize)) -> Self {
        Self::new(value.0, value.1)
    }
}

/// How a pixel window is read.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Replace NaN and infinities with `nan_replacement`.
    pub finite_only: bool,
    /// Pixels added on every side of the window.
    pub edge_buffer: usize,
    /// Falls back to the band no-data value, then to 0.
    pub nan_replacement: Option<f64>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            finite_only: true,
            edge_buffer: 0,
            nan_replacement: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GridOptions {
    /// Part of the raster to tile, whole raster if `None`.
    pub region: Option<BoundingRegion>,
    /// World distance read around every tile, turned into an edge buffer
    /// of whole pixels.
    pub buffer_distance: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TileIterOptions {
    pub bands: BandSelection,
    /// When `false` only tie points are produced, nothing is read.
    pub return_arrays: bool,
    pub read: ReadOptions,
}

impl Default for TileIterOptions {
    fn default() -> Self {
        Self {
            bands: BandSelection::All,
            return_arrays: true,
            read: ReadOptions::default(),
        }
    }
}

/// Loading of a raster handle.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct InitOptions {
    /// Also read the pixels of these bands into memory.
    pub load_array: Option<BandSelection>,
    pub finite_only: bool,
    pub nan_replacement: Option<f64>,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            load_array: None,
            finite_only: true,
            nan_replacement: None,
        }
    }
}

impl InitOptions {
    pub fn with_array(bands: impl Into<BandSelection>) -> Self {
        Self {
            load_array: Some(bands.into()),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Whole raster as a single tile if `None`.
    pub tile_size: Option<TileSize>,
    /// Split multi part geometries into one record per part.
    pub separate_multi_parts: bool,
    /// Also collect the world coordinates of every sampled pixel.
    pub include_coordinates: bool,
    pub use_pixel_center: bool,
    pub reducer: Option<ReducerSelection>,
    pub read: ReadOptions,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            tile_size: None,
            separate_multi_parts: false,
            include_coordinates: false,
            use_pixel_center: true,
            reducer: None,
            read: ReadOptions::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompositeConfig {
    pub reducer: ReducerSelection,
    pub tile_size: TileSize,
    pub region: Option<BoundingRegion>,
    /// Reduce the pixels of a tile on the rayon pool.
    pub parallel: bool,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            reducer: ReducerSelection::default(),
            tile_size: TileSize::default(),
            region: None,
            parallel: false,
        }
    }
}

/// Resampling used when inputs are brought to a common grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resampling {
    Nearest,
    Bilinear,
    #[default]
    Cubic,
    CubicSpline,
    Lanczos,
    Average,
    Mode,
}

impl Resampling {
    /// Name understood by GDAL utilities.
    pub fn gdal_name(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Bilinear => "bilinear",
            Self::Cubic => "cubic",
            Self::CubicSpline => "cubicspline",
            Self::Lanczos => "lanczos",
            Self::Average => "average",
            Self::Mode => "mode",
        }
    }
}

/// Options of the layer stacking step.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StackOptions {
    /// Output pixel size, finest input resolution if `None`.
    pub resolution: Option<(f64, f64)>,
    /// Output (xmin, ymin, xmax, ymax), common intersection if `None`.
    pub bounds: Option<(f64, f64, f64, f64)>,
    pub resampling: Resampling,
    /// One value per input or a single value for all.
    pub src_nodata: Vec<f64>,
    pub out_nodata: Option<f64>,
}
