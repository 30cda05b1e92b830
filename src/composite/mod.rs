//! Per pixel reduction over a stack of co-registered rasters.

pub mod stack;

#[cfg(feature = "gdal")]
pub use stack::GdalLayerStacker;
pub use stack::{LayerStacker, MemoryLayerStacker, MultiRaster};

use geo::Coord;
use log::{debug, info};
use ndarray::{s, Array2, ArrayView3, ArrayViewMut2, Axis, Zip};

use crate::{
    components::{
        raster::RasterAccess,
        source::{RasterLayout, RasterSink},
        transforms::GeoTransform,
        BandInfo, DataType,
    },
    config::{CompositeConfig, GridOptions, ReadOptions, TileIterOptions},
    errors::Result,
    reducer::Reducer,
};

/// Single band result of a composite.
#[derive(Clone, Debug, PartialEq)]
pub struct CompositeRaster {
    data: Array2<f64>,
    transform: GeoTransform,
    crs: String,
    nodata: Option<f64>,
}

impl CompositeRaster {
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn into_data(self) -> Array2<f64> {
        self.data
    }

    pub fn transform(&self) -> GeoTransform {
        self.transform
    }

    pub fn crs(&self) -> &str {
        &self.crs
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    pub fn layout(&self) -> RasterLayout {
        let (rows, cols) = self.data.dim();
        RasterLayout {
            shape: (1, rows, cols),
            transform: self.transform,
            crs: self.crs.clone(),
            bands: vec![BandInfo::new("composite", self.nodata)],
        }
    }

    /// Writes the composite into the first band of `sink`.
    pub fn write_to<S: RasterSink<f64>>(&self, sink: &mut S) -> Result<()> {
        sink.write_band(0, Coord::zero(), self.data.view())
    }
}

/// Reduces every pixel of a layer stack across its bands.
pub struct CompositeReducer;

impl CompositeReducer {
    /// Composite of all bands of `stack`, one band per input raster.
    ///
    /// Values equal to the stack no-data value and non finite values are
    /// left out of the reduction. Pixels without any valid value get the
    /// no-data value, NaN if the stack declares none.
    pub fn reduce<T: DataType>(
        stack: &RasterAccess<T>,
        config: &CompositeConfig,
    ) -> Result<CompositeRaster> {
        let reducer = config.reducer.known()?;
        let metadata = stack.metadata()?;
        let nodata = metadata.nodata();
        let grid_options = GridOptions {
            region: config.region,
            ..Default::default()
        };
        let grid = stack.tile_grid(config.tile_size, &grid_options)?;
        let region = grid.region();
        let fill = nodata.unwrap_or(f64::NAN);
        let mut data = Array2::from_elem((region.height(), region.width()), fill);

        let options = TileIterOptions {
            read: ReadOptions {
                finite_only: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut tiles = stack.tiles(&grid, &options)?;
        while let Some(read) = tiles.next_tile() {
            let (tile, buffer) = read?;
            let Some(buffer) = buffer else {
                continue;
            };
            let start = tile.window.offset() - region.offset();
            let target = data.slice_mut(s![
                start.y..start.y + tile.window.height(),
                start.x..start.x + tile.window.width()
            ]);
            debug!("reducing {} layers over {}", buffer.bands().len(), tile.window);
            reduce_tile(buffer.unbuffered(), target, reducer, nodata, config.parallel);
        }

        let tie_point = metadata
            .transform
            .coordinate_transform()
            .pixel_to_world(region.offset(), false);
        info!(
            "{reducer} composite of {} layers over {region} of {}",
            metadata.shape.0,
            stack.name()
        );
        Ok(CompositeRaster {
            data,
            transform: metadata.transform.with_tie_point(tie_point),
            crs: metadata.crs.clone(),
            nodata,
        })
    }
}

fn reduce_tile<T: DataType>(
    pixels: ArrayView3<'_, T>,
    target: ArrayViewMut2<'_, f64>,
    reducer: Reducer,
    nodata: Option<f64>,
    parallel: bool,
) {
    let zip = Zip::from(target).and(pixels.lanes(Axis(0)));
    let reduce_stack = |out: &mut f64, stack: ndarray::ArrayView1<'_, T>| {
        let valid = stack
            .iter()
            .filter_map(|value| value.to_f64())
            .filter(|value| value.is_finite() && Some(*value) != nodata);
        if let Some(value) = reducer.reduce(valid) {
            *out = value;
        }
    };
    if parallel {
        zip.par_for_each(reduce_stack);
    } else {
        zip.for_each(reduce_stack);
    }
}
