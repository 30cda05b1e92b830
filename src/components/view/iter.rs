use geo::Coord;
use std::rc::Rc;

use crate::{
    components::{
        grid::{TileDescriptor, TileGrid},
        view::{PixelBuffer, TileReader},
        DataType,
    },
    config::{ReadOptions, TileIterOptions},
    errors::Result,
};

/// Pull based walk over the tiles of a grid.
///
/// Every call to `next` reads exactly one tile, nothing is read ahead.
/// Build a new iterator from the same grid to start over.
pub struct TileIter<'a, T: DataType> {
    reader: TileReader<'a, T>,
    tiles: std::slice::Iter<'a, TileDescriptor>,
    bands: Rc<[usize]>,
    buffer: Coord<usize>,
    read: ReadOptions,
    return_arrays: bool,
}

impl<'a, T: DataType> TileIter<'a, T> {
    /// Resolves the band selection up front, unknown bands fail here.
    pub fn new(
        reader: TileReader<'a, T>,
        grid: &'a TileGrid,
        options: &TileIterOptions,
    ) -> Result<Self> {
        let bands = options.bands.resolve(&reader.metadata().bands)?;
        let grid_buffer = grid.edge_buffer();
        let buffer = Coord {
            x: grid_buffer.x.max(options.read.edge_buffer),
            y: grid_buffer.y.max(options.read.edge_buffer),
        };
        Ok(Self {
            reader,
            tiles: grid.iter(),
            bands,
            buffer,
            read: options.read,
            return_arrays: options.return_arrays,
        })
    }

    pub fn bands(&self) -> &[usize] {
        &self.bands
    }

    pub fn has_next(&self) -> bool {
        self.tiles.len() > 0
    }

    /// Like `next`, also handing out the tile that was read.
    pub fn next_tile(&mut self) -> Option<Result<(&'a TileDescriptor, Option<PixelBuffer<T>>)>> {
        let tile = self.tiles.next()?;
        if !self.return_arrays {
            return Some(Ok((tile, None)));
        }
        let read = self
            .reader
            .read_buffered(&self.bands, &tile.window, self.buffer, &self.read);
        Some(read.map(|buffer| (tile, Some(buffer))))
    }
}

impl<T: DataType> Iterator for TileIter<'_, T> {
    /// Tie point of the tile and its pixels, `None` when arrays are not returned.
    type Item = Result<(Coord<f64>, Option<PixelBuffer<T>>)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_tile()
            .map(|read| read.map(|(tile, buffer)| (tile.tie_point, buffer)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.tiles.size_hint()
    }
}

impl<T: DataType> ExactSizeIterator for TileIter<'_, T> {}

#[cfg(test)]
mod tests {
    use crate::{
        components::{bounds::PixelWindow, raster::RasterAccess},
        config::{GridOptions, TileIterOptions, TileSize},
        errors::RusterError,
        indexes::BandSelection,
        testutils,
    };
    use geo::Coord;
    use ndarray::s;
    use rstest::rstest;

    #[rstest]
    fn yields_every_tile_in_order() {
        let raster = RasterAccess::open("gradient", testutils::gradient_source(3, 5, 7)).unwrap();
        let grid = raster.tile_grid(TileSize::square(4), &GridOptions::default()).unwrap();
        let options = TileIterOptions {
            bands: BandSelection::from(["band_3", "band_1"]),
            ..Default::default()
        };
        let tiles = raster.tiles(&grid, &options).unwrap();
        assert_eq!(tiles.len(), 4);

        let tiles: Vec<_> = tiles.map(|tile| tile.unwrap()).collect();
        let tie_points: Vec<Coord<f64>> = tiles.iter().map(|(tie_point, _)| *tie_point).collect();
        assert_eq!(
            tie_points,
            vec![
                Coord { x: 1000., y: 2000. },
                Coord { x: 1040., y: 2000. },
                Coord { x: 1000., y: 1960. },
                Coord { x: 1040., y: 1960. },
            ]
        );

        let (_, last) = &tiles[3];
        let last = last.as_ref().unwrap();
        assert_eq!(last.window(), PixelWindow::new((4, 4), (3, 1)));
        let expected = testutils::gradient(3, 5, 7);
        assert_eq!(last.data().slice(s![0, .., ..]), expected.slice(s![2, 4..5, 4..7]));
        assert_eq!(last.data().slice(s![1, .., ..]), expected.slice(s![0, 4..5, 4..7]));
    }

    #[rstest]
    fn tie_points_only() {
        let raster = RasterAccess::open("gradient", testutils::gradient_source(1, 5, 7)).unwrap();
        let grid = raster.tile_grid(TileSize::square(2), &GridOptions::default()).unwrap();
        let options = TileIterOptions {
            return_arrays: false,
            ..Default::default()
        };
        let mut tiles = raster.tiles(&grid, &options).unwrap();
        assert!(tiles.has_next());
        assert!(tiles.by_ref().all(|tile| tile.unwrap().1.is_none()));
        assert!(!tiles.has_next());
        assert_eq!(raster.tiles(&grid, &options).unwrap().count(), 12);
    }

    #[rstest]
    fn grid_buffer_distance_reaches_reads() {
        let raster = RasterAccess::open("gradient", testutils::gradient_source(1, 12, 12)).unwrap();
        let options = GridOptions {
            buffer_distance: Some(10.),
            ..Default::default()
        };
        let grid = raster.tile_grid(TileSize::square(4), &options).unwrap();
        let (_, center) = raster
            .tiles(&grid, &TileIterOptions::default())
            .unwrap()
            .nth(4)
            .unwrap()
            .unwrap();
        assert_eq!(center.unwrap().window(), PixelWindow::new((3, 3), (6, 6)));
    }

    #[rstest]
    fn unknown_band_fails_before_reading() {
        let raster = RasterAccess::open("gradient", testutils::gradient_source(1, 5, 7)).unwrap();
        let grid = raster.tile_grid(TileSize::square(2), &GridOptions::default()).unwrap();
        let options = TileIterOptions {
            bands: BandSelection::from(["swir"]),
            ..Default::default()
        };
        assert!(matches!(
            raster.tiles(&grid, &options),
            Err(RusterError::UnknownBand(_))
        ));
    }
}
