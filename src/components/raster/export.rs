use geo::Coord;
use log::{info, warn};
use ndarray::Axis;

use crate::{
    components::{
        grid::{TileDescriptor, TileGrid},
        raster::RasterAccess,
        source::{RasterLayout, RasterSink},
        DataType,
    },
    config::ReadOptions,
    errors::Result,
};

impl<T: DataType> RasterAccess<T> {
    /// Writes every tile of `grid` to its own sink.
    ///
    /// `sink_factory` gets the tile and a layout carrying the tile
    /// geotransform and the raster crs. Tiles where some band has no
    /// finite pixel are skipped. Returns the number of tiles written.
    pub fn export_tiles<S, F>(&self, grid: &TileGrid, mut sink_factory: F) -> Result<usize>
    where
        S: RasterSink<T>,
        F: FnMut(&TileDescriptor, &RasterLayout) -> Result<S>,
    {
        let metadata = self.metadata()?;
        let reader = self.reader()?;
        let bands: Vec<usize> = (0..metadata.shape.0).collect();
        let options = ReadOptions {
            finite_only: false,
            ..Default::default()
        };

        let mut written = 0;
        for (index, tile) in grid.iter().enumerate() {
            let buffer = reader.read_window(&bands, &tile.window, &options)?;
            let empty_band = buffer
                .data()
                .axis_iter(Axis(0))
                .position(|band| !band.iter().any(|value| value.is_finite_value()));
            if let Some(band) = empty_band {
                warn!("skipping tile {index} at {}, band {band} has no finite pixel", tile.window);
                continue;
            }

            let (_, rows, cols) = buffer.data().dim();
            let layout = RasterLayout {
                shape: (bands.len(), rows, cols),
                transform: tile.transform,
                crs: metadata.crs.clone(),
                bands: metadata.bands.clone(),
            };
            let mut sink = sink_factory(tile, &layout)?;
            for (band, data) in buffer.data().axis_iter(Axis(0)).enumerate() {
                sink.write_band(band, Coord::zero(), data)?;
            }
            written += 1;
        }
        info!("exported {written} of {} tiles of {}", grid.len(), self.name());
        Ok(written)
    }
}
