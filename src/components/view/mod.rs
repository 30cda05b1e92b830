mod iter;

pub use iter::TileIter;

use geo::Coord;
use log::{debug, warn};
use ndarray::{s, Array, Array3, ArrayView2, ArrayView3, Axis, Dimension};
use std::rc::Rc;

use crate::{
    components::{
        bounds::PixelWindow,
        raster::{RasterAccess, RasterMetadata},
        DataType,
    },
    config::ReadOptions,
    errors::{Result, RusterError},
};

/// Pixels of some bands over a window, as (bands, rows, cols).
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer<T: DataType> {
    data: Array3<T>,
    bands: Rc<[usize]>,
    /// Window actually read, including the edge buffer.
    window: PixelWindow,
    /// Window asked for, clipped to the raster.
    requested: PixelWindow,
}

impl<T: DataType> PixelBuffer<T> {
    pub fn data(&self) -> &Array3<T> {
        &self.data
    }

    pub fn into_data(self) -> Array3<T> {
        self.data
    }

    /// Source band of every layer.
    pub fn bands(&self) -> &[usize] {
        &self.bands
    }

    pub fn window(&self) -> PixelWindow {
        self.window
    }

    pub fn requested(&self) -> PixelWindow {
        self.requested
    }

    pub fn band(&self, layer: usize) -> ArrayView2<'_, T> {
        self.data.index_axis(Axis(0), layer)
    }

    /// 2-D view of a single band read, `None` for multi-band reads.
    pub fn single_band(&self) -> Option<ArrayView2<'_, T>> {
        (self.data.dim().0 == 1).then(|| self.band(0))
    }

    /// Pixels of the requested window only, without the edge buffer.
    pub fn unbuffered(&self) -> ArrayView3<'_, T> {
        let start = self.requested.offset() - self.window.offset();
        let shape = self.requested.shape();
        self.data.slice(s![
            ..,
            start.y..start.y + shape.y,
            start.x..start.x + shape.x
        ])
    }

    /// Value vector (one entry per layer) at `pixel`, in raster pixel coordinates.
    pub fn values_at(&self, pixel: Coord<usize>) -> Option<Vec<T>> {
        if !self.window.contains(pixel) {
            return None;
        }
        let local = pixel - self.window.offset();
        Some(self.data.slice(s![.., local.y, local.x]).to_vec())
    }
}

/// Replaces NaN and infinities with `replacement`, 0 if `None`.
///
/// Returns the number of replaced pixels.
pub(crate) fn sanitize<T: DataType, D: Dimension>(
    array: &mut Array<T, D>,
    replacement: Option<f64>,
) -> usize {
    let replacement = replacement
        .and_then(num::cast::<f64, T>)
        .unwrap_or_else(T::zero);
    let mut replaced = 0;
    array.map_inplace(|value| {
        if !value.is_finite_value() {
            *value = replacement;
            replaced += 1;
        }
    });
    replaced
}

/// Reads bounded windows of an initialized raster.
pub struct TileReader<'a, T: DataType> {
    raster: &'a RasterAccess<T>,
    metadata: &'a RasterMetadata,
}

impl<'a, T: DataType> TileReader<'a, T> {
    pub fn new(raster: &'a RasterAccess<T>) -> Result<Self> {
        let metadata = raster.metadata()?;
        Ok(Self { raster, metadata })
    }

    pub fn metadata(&self) -> &RasterMetadata {
        self.metadata
    }

    /// Reads `bands` over `window`, grown by `options.edge_buffer` pixels
    /// on every side.
    pub fn read_window(
        &self,
        bands: &[usize],
        window: &PixelWindow,
        options: &ReadOptions,
    ) -> Result<PixelBuffer<T>> {
        let buffer = Coord {
            x: options.edge_buffer,
            y: options.edge_buffer,
        };
        self.read_buffered(bands, window, buffer, options)
    }

    /// Like [TileReader::read_window] with a buffer per axis.
    ///
    /// Growth that does not fit on one side of the raster is added to the
    /// opposite side. Windows partly outside the raster are clipped,
    /// windows entirely outside fail with [RusterError::OutOfBounds].
    pub fn read_buffered(
        &self,
        bands: &[usize],
        window: &PixelWindow,
        buffer: Coord<usize>,
        options: &ReadOptions,
    ) -> Result<PixelBuffer<T>> {
        let extent = self.metadata.extent();
        let requested = window.clip(extent).ok_or_else(|| RusterError::OutOfBounds {
            window: window.to_string(),
            cols: extent.x,
            rows: extent.y,
        })?;
        if requested != *window {
            debug!("clipped {window} to {requested}");
        }
        let read_window = requested.buffered(buffer, extent);
        debug!("reading bands {bands:?} over {read_window}");

        let shape = read_window.shape();
        let mut data = Array3::zeros((bands.len(), shape.y, shape.x));
        let mut replaced = 0;
        for (mut layer, band) in data.axis_iter_mut(Axis(0)).zip(bands) {
            let info = self
                .metadata
                .bands
                .get(*band)
                .ok_or_else(|| RusterError::UnknownBand(band.to_string()))?;
            let mut read = self.raster.source().read_band(*band, &read_window)?;
            if options.finite_only {
                replaced += sanitize(&mut read, options.nan_replacement.or(info.nodata));
            }
            layer.assign(&read);
        }
        if replaced > 0 {
            warn!("replaced {replaced} non finite pixels in {read_window}");
        }

        Ok(PixelBuffer {
            data,
            bands: Rc::from(bands),
            window: read_window,
            requested,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{components::backends::memory::MemorySource, testutils};
    use rstest::{fixture, rstest};

    #[fixture]
    fn raster() -> RasterAccess<f32> {
        RasterAccess::open("gradient", testutils::gradient_source(2, 20, 30)).unwrap()
    }

    #[rstest]
    fn interior_buffer_grows_both_sides(raster: RasterAccess<f32>) {
        let reader = raster.reader().unwrap();
        let options = ReadOptions {
            edge_buffer: 3,
            ..Default::default()
        };
        let read = reader
            .read_window(&[0, 1], &PixelWindow::new((10, 8), (5, 4)), &options)
            .unwrap();
        assert_eq!(read.data().dim(), (2, 10, 11));
        assert_eq!(read.window(), PixelWindow::new((7, 5), (11, 10)));
        assert_eq!(read.unbuffered().dim(), (2, 4, 5));
        assert_eq!(read.unbuffered()[[1, 0, 0]], 100. + 80. + 10.);
    }

    #[rstest]
    #[case::top_left(PixelWindow::new((0, 0), (5, 4)), PixelWindow::new((0, 0), (11, 10)))]
    #[case::bottom_right(PixelWindow::new((25, 16), (5, 4)), PixelWindow::new((19, 10), (11, 10)))]
    #[case::near_left(PixelWindow::new((1, 8), (5, 4)), PixelWindow::new((0, 5), (11, 10)))]
    fn edge_buffer_stays_inside(
        raster: RasterAccess<f32>,
        #[case] window: PixelWindow,
        #[case] expected: PixelWindow,
    ) {
        let options = ReadOptions {
            edge_buffer: 3,
            ..Default::default()
        };
        let read = raster.reader().unwrap().read_window(&[0], &window, &options).unwrap();
        assert_eq!(read.window(), expected);
        assert_eq!(read.single_band().unwrap().dim(), (10, 11));
    }

    #[rstest]
    #[case(50, PixelWindow::new((10, 10), (2, 2)))]
    #[case(usize::MAX, PixelWindow::new((10, 8), (5, 4)))]
    fn buffer_larger_than_raster(
        raster: RasterAccess<f32>,
        #[case] edge_buffer: usize,
        #[case] window: PixelWindow,
    ) {
        let options = ReadOptions {
            edge_buffer,
            ..Default::default()
        };
        let read = raster
            .reader()
            .unwrap()
            .read_window(&[0], &window, &options)
            .unwrap();
        assert_eq!(read.window(), PixelWindow::new((0, 0), (30, 20)));
        assert_eq!(read.unbuffered().dim(), (1, window.height(), window.width()));
    }

    #[rstest]
    fn outside_window_fails(raster: RasterAccess<f32>) {
        let reader = raster.reader().unwrap();
        assert!(matches!(
            reader.read_window(&[0], &PixelWindow::new((30, 0), (4, 4)), &ReadOptions::default()),
            Err(RusterError::OutOfBounds { .. })
        ));
        let partial = reader
            .read_window(&[0], &PixelWindow::new((28, 18), (4, 4)), &ReadOptions::default())
            .unwrap();
        assert_eq!(partial.window(), PixelWindow::new((28, 18), (2, 2)));
    }

    #[rstest]
    #[case::multi_band(vec![0, 1])]
    #[case::single_band(vec![0])]
    fn non_finite_values_are_replaced(#[case] bands: Vec<usize>) {
        let poisoned = [
            (0, 1, 2, f32::NAN),
            (0, 3, 0, f32::INFINITY),
            (1, 0, 0, f32::NEG_INFINITY),
        ];
        let raster = RasterAccess::open("poisoned", testutils::poisoned_source(&poisoned)).unwrap();
        let reader = raster.reader().unwrap();
        let window = PixelWindow::new((0, 0), (4, 4));
        let options = ReadOptions {
            nan_replacement: Some(-1.),
            ..Default::default()
        };
        let clean = reader.read_window(&bands, &window, &options).unwrap();
        let raw = reader
            .read_window(&bands, &window, &ReadOptions { finite_only: false, ..options })
            .unwrap();

        for ((layer, row, col), value) in clean.data().indexed_iter() {
            let original = raw.data()[[layer, row, col]];
            if original.is_finite() {
                assert_eq!(*value, original);
            } else {
                assert_eq!(*value, -1.);
            }
        }
        assert!(raw.data().iter().any(|value| !value.is_finite()));
    }

    #[rstest]
    fn replacement_defaults_to_nodata_then_zero() {
        let poisoned = [(0, 1, 1, f32::NAN)];
        let source = testutils::poisoned_source(&poisoned).with_nodata(Some(-9999.));
        let raster = RasterAccess::open("poisoned", source).unwrap();
        let window = PixelWindow::new((0, 0), (3, 3));
        let read = raster
            .reader()
            .unwrap()
            .read_window(&[0], &window, &ReadOptions::default())
            .unwrap();
        assert_eq!(read.data()[[0, 1, 1]], -9999.);

        let raster = RasterAccess::open("poisoned", testutils::poisoned_source(&poisoned)).unwrap();
        let read = raster
            .reader()
            .unwrap()
            .read_window(&[0], &window, &ReadOptions::default())
            .unwrap();
        assert_eq!(read.data()[[0, 1, 1]], 0.);
    }

    #[rstest]
    fn integer_rasters_are_untouched() {
        let source = MemorySource::new(
            "ints",
            Array3::from_elem((1, 2, 2), 7u16),
            testutils::transform(),
            testutils::CRS,
        );
        let raster = RasterAccess::open("ints", source).unwrap();
        let read = raster
            .reader()
            .unwrap()
            .read_window(&[0], &PixelWindow::new((0, 0), (2, 2)), &ReadOptions::default())
            .unwrap();
        assert!(read.data().iter().all(|value| *value == 7));
        assert_eq!(read.values_at(Coord { x: 1, y: 1 }), Some(vec![7]));
        assert_eq!(read.values_at(Coord { x: 2, y: 1 }), None);
    }
}
