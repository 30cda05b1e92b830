//! Synthetic rasters for tests.

use ndarray::Array3;

use crate::components::{backends::memory::MemorySource, transforms::GeoTransform};

pub const CRS: &str = "EPSG:32633";

/// 10 m pixels, top left corner at (1000, 2000).
pub fn transform() -> GeoTransform {
    GeoTransform::new([1000., 10., 0., 2000., 0., -10.])
}

/// `band * 100 + row * 10 + col` at every pixel.
pub fn gradient(bands: usize, rows: usize, cols: usize) -> Array3<f32> {
    Array3::from_shape_fn((bands, rows, cols), |(band, row, col)| {
        (band * 100 + row * 10 + col) as f32
    })
}

pub fn gradient_source(bands: usize, rows: usize, cols: usize) -> MemorySource<f32> {
    MemorySource::new("gradient", gradient(bands, rows, cols), transform(), CRS)
}

/// One band 4x5 gradient with `nodata` at the given (band, row, col).
pub fn source_with_holes(holes: &[(usize, usize, usize)], nodata: f64) -> MemorySource<f32> {
    let mut data = gradient(1, 4, 5);
    for hole in holes {
        data[*hole] = nodata as f32;
    }
    MemorySource::new("holes", data, transform(), CRS).with_nodata(Some(nodata))
}

/// Two band 4x4 gradient with values overridden at (band, row, col).
pub fn poisoned_source(values: &[(usize, usize, usize, f32)]) -> MemorySource<f32> {
    let mut data = gradient(2, 4, 4);
    for (band, row, col, value) in values {
        data[[*band, *row, *col]] = *value;
    }
    MemorySource::new("poisoned", data, transform(), CRS)
}

/// `count` single band rasters on the same grid, raster `i` is `i + 1`
/// everywhere except at its holes, which hold `nodata`.
pub fn constant_stack(
    count: usize,
    rows: usize,
    cols: usize,
    holes: &[(usize, usize, usize)],
    nodata: f64,
) -> Vec<MemorySource<f32>> {
    (0..count)
        .map(|index| {
            let mut data = Array3::from_elem((1, rows, cols), (index + 1) as f32);
            holes
                .iter()
                .filter(|(raster, _, _)| *raster == index)
                .for_each(|(_, row, col)| data[[0, *row, *col]] = nodata as f32);
            MemorySource::new(format!("layer_{index}"), data, transform(), CRS)
                .with_nodata(Some(nodata))
        })
        .collect()
}
