use log::debug;

use crate::{
    components::{bounds::PixelWindow, raster::RasterAccess, DataType},
    config::{GridOptions, TileSize},
    errors::{Result, RusterError},
};

/// Summary of the valid pixels of a band.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BandStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub count: usize,
}

/// Running moments (Welford).
#[derive(Default)]
struct Moments {
    count: usize,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl Moments {
    fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    fn finish(self) -> Option<BandStatistics> {
        (self.count > 0).then(|| BandStatistics {
            min: self.min,
            max: self.max,
            mean: self.mean,
            std_dev: (self.m2 / self.count as f64).sqrt(),
            count: self.count,
        })
    }
}

impl<T: DataType> RasterAccess<T> {
    /// Streams `band` tile by tile, skipping no-data and non finite pixels.
    ///
    /// `None` when the band has no valid pixel.
    pub fn band_statistics(
        &self,
        band: usize,
        tile_size: TileSize,
    ) -> Result<Option<BandStatistics>> {
        let metadata = self.metadata()?;
        let info = metadata
            .bands
            .get(band)
            .ok_or_else(|| RusterError::UnknownBand(band.to_string()))?;
        let grid = self.tile_grid(tile_size, &GridOptions::default())?;

        let mut moments = Moments::default();
        for tile in grid.iter() {
            let window: &PixelWindow = &tile.window;
            debug!("statistics of band {band} over {window}");
            self.source()
                .read_band(band, window)?
                .iter()
                .filter_map(|value| value.to_f64())
                .filter(|value| value.is_finite() && !info.is_nodata(*value))
                .for_each(|value| moments.push(value));
        }
        Ok(moments.finish())
    }
}
