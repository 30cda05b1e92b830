use geo::{Coord, Polygon};
use log::info;
use std::rc::Rc;

use crate::{
    components::{
        bounds::PixelWindow,
        raster::{window_footprint, RasterMetadata},
        transforms::GeoTransform,
    },
    config::{GridOptions, TileSize},
    errors::Result,
};

/// One tile of a [TileGrid].
#[derive(Clone, Debug, PartialEq)]
pub struct TileDescriptor {
    /// Pixel window, clipped to the grid region.
    pub window: PixelWindow,
    /// World coordinate of the top left corner of the tile.
    pub tie_point: Coord<f64>,
    /// World polygon of the tile corners, closed.
    pub footprint: Polygon<f64>,
    /// Pixel origin of the first tile of the grid.
    pub first_pixel: Coord<usize>,
    /// Raster transform anchored at `tie_point`.
    pub transform: GeoTransform,
}

/// Row major partition of a raster region into tiles.
///
/// Tiles on the last row and column are cut at the region edge.
#[derive(Clone, Debug)]
pub struct TileGrid {
    tiles: Rc<[TileDescriptor]>,
    tile_size: TileSize,
    region: PixelWindow,
    edge_buffer: Coord<usize>,
    crs: Rc<str>,
}

impl TileGrid {
    pub fn build(
        metadata: &RasterMetadata,
        tile_size: TileSize,
        options: &GridOptions,
    ) -> Result<Self> {
        let tile_size = tile_size.validated()?;
        let transform = metadata.transform;
        let region = match &options.region {
            Some(region) => region.to_pixel_window(&transform, metadata.extent())?,
            None => PixelWindow::full(metadata.extent()),
        };
        let edge_buffer = options
            .buffer_distance
            .map_or(Coord::zero(), |distance| buffer_pixels(distance, &transform));

        let coordinate_transform = transform.coordinate_transform();
        let first_pixel = region.offset();
        let end = region.end();
        let tiles: Rc<[TileDescriptor]> = (first_pixel.y..end.y)
            .step_by(tile_size.height)
            .flat_map(|y| {
                (first_pixel.x..end.x)
                    .step_by(tile_size.width)
                    .map(move |x| (x, y))
            })
            .map(|(x, y)| {
                let width = tile_size.width.min(end.x - x);
                let height = tile_size.height.min(end.y - y);
                let window = PixelWindow::new((x, y), (width, height));
                let tie_point = coordinate_transform.pixel_to_world(window.offset(), false);
                TileDescriptor {
                    window,
                    tie_point,
                    footprint: window_footprint(&transform, &window),
                    first_pixel,
                    transform: transform.with_tie_point(tie_point),
                }
            })
            .collect();

        info!(
            "built grid of {} tiles of {}x{} over {region}",
            tiles.len(),
            tile_size.width,
            tile_size.height
        );
        Ok(Self {
            tiles,
            tile_size,
            region,
            edge_buffer,
            crs: Rc::from(metadata.crs.as_str()),
        })
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TileDescriptor> {
        self.tiles.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TileDescriptor> {
        self.tiles.iter()
    }

    pub fn tiles(&self) -> &[TileDescriptor] {
        &self.tiles
    }

    pub fn tile_size(&self) -> TileSize {
        self.tile_size
    }

    /// Pixel window the grid covers.
    pub fn region(&self) -> PixelWindow {
        self.region
    }

    /// Pixels read around every tile, from the buffer distance.
    pub fn edge_buffer(&self) -> Coord<usize> {
        self.edge_buffer
    }

    pub fn crs(&self) -> &str {
        self.crs.as_ref()
    }
}

impl<'a> IntoIterator for &'a TileGrid {
    type Item = &'a TileDescriptor;
    type IntoIter = std::slice::Iter<'a, TileDescriptor>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Whole pixels covering `distance` along each axis.
fn buffer_pixels(distance: f64, transform: &GeoTransform) -> Coord<usize> {
    let pixel_size = transform.pixel_size();
    let pixels = |size: f64| {
        if size == 0. || distance <= 0. {
            0
        } else {
            (distance / size.abs()).ceil() as usize
        }
    };
    Coord {
        x: pixels(pixel_size.x),
        y: pixels(pixel_size.y),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{components::bounds::BoundingRegion, errors::RusterError, testutils};
    use itertools::iproduct;
    use ndarray::Array2;
    use rstest::rstest;

    fn metadata(rows: usize, cols: usize) -> RasterMetadata {
        RasterMetadata {
            shape: (1, rows, cols),
            transform: testutils::transform(),
            crs: testutils::CRS.to_string(),
            bands: vec![],
        }
    }

    #[rstest]
    #[case(1, 1, 1, 1)]
    #[case(10, 7, 3, 2)]
    #[case(10, 7, 10, 7)]
    #[case(10, 7, 64, 64)]
    #[case(33, 17, 5, 4)]
    fn tiles_cover_raster_once(
        #[case] cols: usize,
        #[case] rows: usize,
        #[case] tile_width: usize,
        #[case] tile_height: usize,
    ) {
        let grid = TileGrid::build(
            &metadata(rows, cols),
            TileSize::new(tile_width, tile_height),
            &GridOptions::default(),
        )
        .unwrap();

        assert_eq!(
            grid.len(),
            cols.div_ceil(tile_width) * rows.div_ceil(tile_height)
        );
        let mut hits = Array2::<u8>::zeros((rows, cols));
        for tile in &grid {
            let (offset, end) = (tile.window.offset(), tile.window.end());
            for (y, x) in iproduct!(offset.y..end.y, offset.x..end.x) {
                hits[[y, x]] += 1;
            }
        }
        assert!(hits.iter().all(|hit| *hit == 1));
    }

    #[rstest]
    fn tiles_are_row_major_and_clipped() {
        let grid =
            TileGrid::build(&metadata(5, 7), TileSize::square(4), &GridOptions::default()).unwrap();
        let windows: Vec<PixelWindow> = grid.iter().map(|tile| tile.window).collect();
        assert_eq!(
            windows,
            vec![
                PixelWindow::new((0, 0), (4, 4)),
                PixelWindow::new((4, 0), (3, 4)),
                PixelWindow::new((0, 4), (4, 1)),
                PixelWindow::new((4, 4), (3, 1)),
            ]
        );
    }

    #[rstest]
    fn tile_geometry() {
        let grid =
            TileGrid::build(&metadata(5, 7), TileSize::square(4), &GridOptions::default()).unwrap();
        let tile = grid.get(3).unwrap();
        assert_eq!(tile.tie_point, Coord { x: 1040., y: 1960. });
        assert_eq!(tile.transform.tie_point(), tile.tie_point);
        assert_eq!(tile.first_pixel, Coord { x: 0, y: 0 });
        let corners: Vec<(f64, f64)> = tile
            .footprint
            .exterior()
            .points()
            .map(|p| p.x_y())
            .collect();
        assert_eq!(
            corners,
            vec![(1040., 1960.), (1070., 1960.), (1070., 1950.), (1040., 1950.), (1040., 1960.)]
        );
    }

    #[rstest]
    fn world_region_grid() {
        let options = GridOptions {
            region: Some(BoundingRegion::World {
                xmin: 1020.,
                xmax: 1060.,
                ymin: 1960.,
                ymax: 1990.,
            }),
            buffer_distance: Some(15.),
        };
        let grid = TileGrid::build(&metadata(5, 7), TileSize::square(3), &options).unwrap();
        assert_eq!(grid.region(), PixelWindow::new((2, 1), (4, 3)));
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.get(1).unwrap().window, PixelWindow::new((5, 1), (1, 3)));
        assert!(grid.iter().all(|tile| tile.first_pixel == Coord { x: 2, y: 1 }));
        assert_eq!(grid.edge_buffer(), Coord { x: 2, y: 2 });
    }

    #[rstest]
    fn invalid_inputs() {
        assert!(matches!(
            TileGrid::build(&metadata(5, 7), TileSize::new(0, 3), &GridOptions::default()),
            Err(RusterError::InvalidTileSize(0, 3))
        ));
        let options = GridOptions {
            region: Some(BoundingRegion::Pixel {
                xmin: 3,
                xmax: 3,
                ymin: 0,
                ymax: 5,
            }),
            buffer_distance: None,
        };
        assert!(matches!(
            TileGrid::build(&metadata(5, 7), TileSize::square(3), &options),
            Err(RusterError::InvalidRegion(_))
        ));
    }
}
