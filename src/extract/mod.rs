//! Pixel values under geometries.

pub mod geometry;
pub mod rasterize;

pub use geometry::{normalize, GeometryKind, GeometryRecord};
pub use rasterize::{AllTouchedRasterizer, Rasterizer};

use geo::{Coord, Geometry, Intersects};
use log::{debug, info, warn};
use ndarray::s;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};

use crate::{
    components::{raster::RasterAccess, DataType},
    config::{ExtractConfig, TileSize},
    errors::{Result, RusterError},
    indexes::BandSelection,
    reducer::{Reducer, ReducerSelection},
};

/// Samples collected for one geometry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeometryExtract {
    pub id: String,
    /// One value vector per sampled pixel, in band order. A single vector
    /// once reduced.
    pub values: Vec<Vec<f64>>,
    /// World coordinates of the sampled pixels, when requested.
    pub coordinates: Vec<Coord<f64>>,
    pub reduced: bool,
}

impl GeometryExtract {
    fn new(id: String) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    fn reduce(&mut self, reducer: Reducer) {
        if self.values.is_empty() {
            return;
        }
        self.values = vec![reducer.reduce_columns(&self.values)];
        if !self.coordinates.is_empty() {
            let (xs, ys): (Vec<f64>, Vec<f64>) =
                self.coordinates.iter().map(|coord| coord.x_y()).unzip();
            self.coordinates = vec![Coord {
                x: reducer.reduce(xs).unwrap_or(f64::NAN),
                y: reducer.reduce(ys).unwrap_or(f64::NAN),
            }];
        }
        self.reduced = true;
    }
}

/// Extracts keyed by geometry id, in input order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtractionResult {
    entries: Vec<GeometryExtract>,
    index: HashMap<String, usize>,
    warnings: Vec<String>,
}

impl ExtractionResult {
    fn new(records: &[GeometryRecord]) -> Self {
        let entries: Vec<GeometryExtract> = records
            .iter()
            .map(|record| GeometryExtract::new(record.id.clone()))
            .collect();
        let index = entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.id.clone(), position))
            .collect();
        Self {
            entries,
            index,
            warnings: vec![],
        }
    }

    pub fn get(&self, id: &str) -> Option<&GeometryExtract> {
        self.index.get(id).map(|position| &self.entries[*position])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GeometryExtract> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Problems that did not stop the extraction.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn into_entries(self) -> Vec<GeometryExtract> {
        self.entries
    }

    fn apply_reducer(&mut self, selection: &ReducerSelection) {
        match selection {
            ReducerSelection::Known(reducer) => self
                .entries
                .par_iter_mut()
                .for_each(|entry| entry.reduce(*reducer)),
            ReducerSelection::Unrecognized(keyword) => {
                let message =
                    format!("reducer {keyword} is not implemented, values are left unreduced");
                warn!("{message}");
                self.warnings.push(message);
            }
        }
    }
}

/// Samples a raster under geometries, tile by tile.
pub struct GeometryExtractor<'a, T: DataType, R: Rasterizer = AllTouchedRasterizer> {
    raster: &'a RasterAccess<T>,
    rasterizer: R,
}

impl<'a, T: DataType> GeometryExtractor<'a, T> {
    pub fn new(raster: &'a RasterAccess<T>) -> Self {
        Self {
            raster,
            rasterizer: AllTouchedRasterizer,
        }
    }
}

impl<'a, T: DataType, R: Rasterizer> GeometryExtractor<'a, T, R> {
    pub fn with_rasterizer(raster: &'a RasterAccess<T>, rasterizer: R) -> Self {
        Self { raster, rasterizer }
    }

    /// Normalizes `geometries` (see [normalize]) and extracts them.
    pub fn extract_geometries<G: Into<Geometry<f64>>>(
        &self,
        geometries: impl IntoIterator<Item = G>,
        ids: Option<&[String]>,
        band_order: &BandSelection,
        config: &ExtractConfig,
    ) -> Result<ExtractionResult> {
        let records = normalize(geometries, ids, config.separate_multi_parts)?;
        self.extract(&records, band_order, config)
    }

    /// Extracts geometries given as WKT.
    #[cfg(feature = "gdal")]
    pub fn extract_wkt<S: AsRef<str>>(
        &self,
        wkts: &[S],
        ids: Option<&[String]>,
        band_order: &BandSelection,
        config: &ExtractConfig,
    ) -> Result<ExtractionResult> {
        self.extract_geometries(geometry::parse_wkt(wkts)?, ids, band_order, config)
    }

    /// Collects the values of `band_order` at every pixel each record
    /// touches.
    ///
    /// Tiles are visited in grid order and only tiles whose footprint
    /// intersects some record are read. Records are burned one geometry
    /// kind at a time. Record ids must be unique.
    pub fn extract(
        &self,
        records: &[GeometryRecord],
        band_order: &BandSelection,
        config: &ExtractConfig,
    ) -> Result<ExtractionResult> {
        geometry::ensure_unique_ids(records)?;
        let metadata = self.raster.metadata()?;
        let bands = band_order.resolve(&metadata.bands)?;
        let tile_size = config.tile_size.unwrap_or_else(|| {
            let extent = metadata.extent();
            TileSize::new(extent.x, extent.y)
        });
        let grid = self.raster.tile_grid(tile_size, &Default::default())?;
        let reader = self.raster.reader()?;
        let mut result = ExtractionResult::new(records);

        for tile in &grid {
            let mut by_kind: BTreeMap<GeometryKind, Vec<usize>> = BTreeMap::new();
            records
                .iter()
                .enumerate()
                .filter(|(_, record)| tile.footprint.intersects(&record.geometry))
                .for_each(|(position, record)| {
                    by_kind.entry(record.kind()).or_default().push(position)
                });
            if by_kind.is_empty() {
                continue;
            }

            debug!("tile {} intersects {} geometry kinds", tile.window, by_kind.len());
            let buffer = reader.read_window(&bands, &tile.window, &config.read)?;
            let pixels = buffer.unbuffered();
            let coordinate_transform = tile.transform.coordinate_transform();
            let shape = (tile.window.height(), tile.window.width());

            for (kind, positions) in by_kind {
                let shapes = positions
                    .iter()
                    .enumerate()
                    .map(|(burn, position)| {
                        let burn = u32::try_from(burn + 1).map_err(|_| {
                            RusterError::InvalidGeometry(format!(
                                "too many {kind:?} geometries in one tile"
                            ))
                        })?;
                        Ok((&records[*position].geometry, burn))
                    })
                    .collect::<Result<Vec<_>>>()?;
                let mask = self.rasterizer.rasterize(&shapes, &tile.transform, shape)?;

                for ((row, col), burn) in mask.indexed_iter() {
                    if *burn == 0 {
                        continue;
                    }
                    let entry = &mut result.entries[positions[*burn as usize - 1]];
                    let values = pixels
                        .slice(s![.., row, col])
                        .iter()
                        .map(|value| value.to_f64().unwrap_or(f64::NAN))
                        .collect();
                    entry.values.push(values);
                    if config.include_coordinates {
                        entry.coordinates.push(coordinate_transform.pixel_to_world(
                            Coord { x: col, y: row },
                            config.use_pixel_center,
                        ));
                    }
                }
            }
        }

        if let Some(selection) = &config.reducer {
            result.apply_reducer(selection);
        }
        info!(
            "extracted {} geometries from {} over {} tiles",
            result.len(),
            self.raster.name(),
            grid.len()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{components::backends::memory::MemorySource, config::ReadOptions, testutils};
    use approx::assert_relative_eq;
    use geo::{point, polygon, Geometry, MultiPoint, Point};
    use itertools::iproduct;
    use rstest::{fixture, rstest};

    /// 3 band gradient of 12 rows by 15 columns.
    #[fixture]
    fn raster() -> RasterAccess<f32> {
        RasterAccess::open("gradient", testutils::gradient_source(3, 12, 15)).unwrap()
    }

    fn pixel_center(col: usize, row: usize) -> Point<f64> {
        let world = testutils::transform()
            .coordinate_transform()
            .pixel_to_world(Coord { x: col, y: row }, true);
        Point::from(world)
    }

    #[rstest]
    #[case(None)]
    #[case(Some(TileSize::square(1)))]
    #[case(Some(TileSize::square(4)))]
    #[case(Some(TileSize::new(7, 5)))]
    fn every_point_sampled_once(raster: RasterAccess<f32>, #[case] tile_size: Option<TileSize>) {
        let pixels: Vec<(usize, usize)> =
            iproduct!((0..12).step_by(3), (0..15).step_by(2)).collect();
        let points: Vec<Point<f64>> = pixels
            .iter()
            .map(|(row, col)| pixel_center(*col, *row))
            .collect();
        let config = ExtractConfig {
            tile_size,
            ..Default::default()
        };
        let result = GeometryExtractor::new(&raster)
            .extract_geometries(points, None, &BandSelection::All, &config)
            .unwrap();

        assert_eq!(result.len(), pixels.len());
        for (entry, (row, col)) in result.iter().zip(&pixels) {
            let expected: Vec<f64> = (0..3)
                .map(|band| (band * 100 + row * 10 + col) as f64)
                .collect();
            assert_eq!(entry.values, vec![expected]);
        }
    }

    #[rstest]
    fn points_on_tile_edges_counted_once(raster: RasterAccess<f32>) {
        let corners = vec![Point::new(1040., 1960.), Point::new(1080., 1920.)];
        let config = ExtractConfig {
            tile_size: Some(TileSize::square(4)),
            ..Default::default()
        };
        let result = GeometryExtractor::new(&raster)
            .extract_geometries(corners, None, &BandSelection::from([0usize]), &config)
            .unwrap();
        assert_eq!(result.get("0").unwrap().values, vec![vec![44.]]);
        assert_eq!(result.get("1").unwrap().values, vec![vec![88.]]);
    }

    #[rstest]
    fn band_order_and_coordinates(raster: RasterAccess<f32>) {
        let ids = vec!["site".to_string()];
        let config = ExtractConfig {
            include_coordinates: true,
            use_pixel_center: false,
            tile_size: Some(TileSize::square(5)),
            ..Default::default()
        };
        let result = GeometryExtractor::new(&raster)
            .extract_geometries(
                [pixel_center(6, 2)],
                Some(ids.as_slice()),
                &BandSelection::from([2usize, 0]),
                &config,
            )
            .unwrap();
        let site = result.get("site").unwrap();
        assert_eq!(site.values, vec![vec![226., 26.]]);
        assert_eq!(site.coordinates, vec![Coord { x: 1060., y: 1980. }]);
    }

    #[rstest]
    fn polygon_across_tiles(raster: RasterAccess<f32>) {
        let block = Geometry::Polygon(polygon![
            (x: 1025., y: 1985.),
            (x: 1055., y: 1985.),
            (x: 1055., y: 1965.),
            (x: 1025., y: 1965.),
        ]);
        let config = ExtractConfig {
            tile_size: Some(TileSize::square(4)),
            ..Default::default()
        };
        let result = GeometryExtractor::new(&raster)
            .extract_geometries([block], None, &BandSelection::from([0usize]), &config)
            .unwrap();
        let mut values: Vec<f64> = result.get("0").unwrap().values.iter().map(|v| v[0]).collect();
        values.sort_by(f64::total_cmp);
        let mut expected: Vec<f64> = iproduct!(1..4, 2..6)
            .map(|(row, col)| (row * 10 + col) as f64)
            .collect();
        expected.sort_by(f64::total_cmp);
        assert_eq!(values, expected);
    }

    #[rstest]
    fn separated_multi_points(raster: RasterAccess<f32>) {
        let multi = MultiPoint::from(vec![pixel_center(0, 0), pixel_center(14, 11)]);
        let ids = vec!["pair".to_string()];
        let config = ExtractConfig {
            separate_multi_parts: true,
            ..Default::default()
        };
        let result = GeometryExtractor::new(&raster)
            .extract_geometries(
                [multi.clone()],
                Some(ids.as_slice()),
                &BandSelection::from([0usize]),
                &config,
            )
            .unwrap();
        assert_eq!(result.get("pair_0").unwrap().values, vec![vec![0.]]);
        assert_eq!(result.get("pair_1").unwrap().values, vec![vec![124.]]);

        let joined = GeometryExtractor::new(&raster)
            .extract_geometries(
                [multi],
                Some(ids.as_slice()),
                &BandSelection::from([0usize]),
                &ExtractConfig::default(),
            )
            .unwrap();
        assert_eq!(joined.get("pair").unwrap().values.len(), 2);
    }

    #[rstest]
    fn reduces_samples(raster: RasterAccess<f32>) {
        let block = Geometry::Polygon(polygon![
            (x: 1000., y: 2000.),
            (x: 1020., y: 2000.),
            (x: 1020., y: 1980.),
            (x: 1000., y: 1980.),
        ]);
        let config = ExtractConfig {
            include_coordinates: true,
            reducer: Some(ReducerSelection::from("mean")),
            tile_size: Some(TileSize::square(3)),
            ..Default::default()
        };
        let result = GeometryExtractor::new(&raster)
            .extract_geometries(
                [block, Geometry::Point(point!(x: 0., y: 0.))],
                None,
                &BandSelection::All,
                &config,
            )
            .unwrap();
        let block = result.get("0").unwrap();
        assert!(block.reduced);
        assert_eq!(block.values.len(), 1);
        assert_relative_eq!(block.values[0][0], 5.5);
        assert_relative_eq!(block.values[0][2], 205.5);
        assert_eq!(block.coordinates, vec![Coord { x: 1010., y: 1990. }]);

        let outside = result.get("1").unwrap();
        assert!(outside.values.is_empty() && !outside.reduced);
        assert!(result.warnings().is_empty());
    }

    #[test_log::test(rstest)]
    fn unknown_reducer_keeps_raw_values(raster: RasterAccess<f32>) {
        let points: Vec<Point<f64>> = vec![pixel_center(3, 3), pixel_center(9, 10)];
        let raw_config = ExtractConfig {
            tile_size: Some(TileSize::square(4)),
            ..Default::default()
        };
        let bogus_config = ExtractConfig {
            reducer: Some(ReducerSelection::from("bogus")),
            ..raw_config.clone()
        };
        let extractor = GeometryExtractor::new(&raster);
        let raw = extractor
            .extract_geometries(points.clone(), None, &BandSelection::All, &raw_config)
            .unwrap();
        let bogus = extractor
            .extract_geometries(points, None, &BandSelection::All, &bogus_config)
            .unwrap();

        assert_eq!(raw.clone().into_entries(), bogus.clone().into_entries());
        assert!(raw.warnings().is_empty());
        assert_eq!(bogus.warnings().len(), 1);
    }

    #[rstest]
    fn sanitized_values_are_extracted() {
        let raster = RasterAccess::open(
            "poisoned",
            testutils::poisoned_source(&[(0, 1, 1, f32::NAN)]),
        )
        .unwrap();
        let config = ExtractConfig {
            read: ReadOptions {
                nan_replacement: Some(-1.),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = GeometryExtractor::new(&raster)
            .extract_geometries([pixel_center(1, 1)], None, &BandSelection::All, &config)
            .unwrap();
        assert_eq!(result.get("0").unwrap().values, vec![vec![-1., 111.]]);
    }

    #[rstest]
    fn unknown_band_fails(raster: RasterAccess<f32>) {
        assert!(matches!(
            GeometryExtractor::new(&raster).extract_geometries(
                [pixel_center(0, 0)],
                None,
                &BandSelection::from(["swir"]),
                &ExtractConfig::default()
            ),
            Err(RusterError::UnknownBand(_))
        ));
    }

    #[rstest]
    fn duplicate_record_ids_fail(raster: RasterAccess<f32>) {
        let records = [
            GeometryRecord::new("a", pixel_center(0, 0)),
            GeometryRecord::new("a", pixel_center(1, 1)),
        ];
        assert!(matches!(
            GeometryExtractor::new(&raster).extract(
                &records,
                &BandSelection::All,
                &ExtractConfig::default()
            ),
            Err(RusterError::InvalidGeometry(_))
        ));
    }

    #[rstest]
    fn integer_raster() {
        let source = MemorySource::new(
            "ints",
            ndarray::Array3::from_shape_fn((1, 2, 2), |(_, row, col)| (row * 2 + col) as u8),
            testutils::transform(),
            testutils::CRS,
        );
        let raster = RasterAccess::open("ints", source).unwrap();
        let result = GeometryExtractor::new(&raster)
            .extract_geometries(
                [pixel_center(1, 1)],
                None,
                &BandSelection::All,
                &ExtractConfig::default(),
            )
            .unwrap();
        assert_eq!(result.get("0").unwrap().values, vec![vec![3.]]);
    }
}
