pub mod components;
pub mod composite;
pub mod config;
pub mod crs_geo;
pub mod errors;
pub mod extract;
pub mod indexes;
pub mod intersection;
pub mod reducer;
pub mod terrain;

#[cfg(test)]
mod testutils;

pub use components::{
    backends::memory::MemorySource, BandInfo, BoundingRegion, DataType, PixelBuffer, PixelWindow,
    RasterAccess, RasterLayout, RasterMetadata, RasterSink, RasterSource, TileDescriptor, TileGrid,
    TileIter, TileReader,
};
pub use composite::{
    CompositeRaster, CompositeReducer, LayerStacker, MemoryLayerStacker, MultiRaster,
};
pub use config::{
    CompositeConfig, ExtractConfig, GridOptions, InitOptions, ReadOptions, Resampling,
    StackOptions, TileIterOptions, TileSize,
};
pub use errors::{Result, RusterError};
pub use extract::{ExtractionResult, GeometryExtract, GeometryExtractor, GeometryRecord};
pub use indexes::BandSelection;
pub use reducer::{Reducer, ReducerSelection};

#[cfg(feature = "gdal")]
pub use components::backends::gdal_backend::{GdalSink, GdalSource};
#[cfg(feature = "gdal")]
pub use composite::GdalLayerStacker;
#[cfg(feature = "gdal")]
pub use terrain::GdalDemProcessor;

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Coord, Point};
    use rstest::rstest;

    #[rstest]
    fn stream_then_extract() {
        let source = MemorySource::new(
            "scene",
            testutils::gradient(2, 6, 6),
            testutils::transform(),
            testutils::CRS,
        )
        .with_band_names(["red", "nir"]);
        let raster = RasterAccess::open("scene", source).unwrap();
        let grid = raster.tile_grid(TileSize::square(4), &GridOptions::default()).unwrap();
        let options = TileIterOptions {
            bands: BandSelection::from(["nir"]),
            ..Default::default()
        };
        let total: usize = raster
            .tiles(&grid, &options)
            .unwrap()
            .map(|tile| tile.unwrap().1.unwrap().data().len())
            .sum();
        assert_eq!(total, 36);

        let config = ExtractConfig {
            tile_size: Some(TileSize::square(4)),
            include_coordinates: true,
            ..Default::default()
        };
        let result = GeometryExtractor::new(&raster)
            .extract_geometries(
                [Point::new(1045., 1955.)],
                None,
                &BandSelection::from(["nir", "red"]),
                &config,
            )
            .unwrap();
        let entry = result.get("0").unwrap();
        assert_eq!(entry.values, vec![vec![144., 44.]]);
        assert_eq!(entry.coordinates, vec![Coord { x: 1045., y: 1955. }]);
    }
}
