use std::fmt::Display;

use geo::{Coord, Rect};
use shrinkwraprs::Shrinkwrap;

use crate::{
    components::transforms::GeoTransform,
    errors::{Result, RusterError},
    intersection::Intersection,
};

/// Pixel bounds of a reading window.
///
/// Defined by:
///     - `offset`: column/row of the top left pixel of the window,
///         with origin at the top left pixel of the raster.
///     - `shape`: (W, H) a.k.a. columns, rows.
///
/// In the underlying impl `offset` is given by `.min`,
/// and `shape` by `(.width, .height)`.
#[derive(Shrinkwrap, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelWindow(Rect<usize>);

impl PixelWindow {
    pub fn new(offset: (usize, usize), shape: (usize, usize)) -> Self {
        let offset = Coord::from(offset);
        let max = offset + Coord::from(shape);
        Self(Rect::new(offset, max))
    }

    /// Window covering a whole raster of `extent` (columns, rows).
    pub fn full(extent: Coord<usize>) -> Self {
        Self::new((0, 0), extent.x_y())
    }

    /// Coords of the top left pixel of the window.
    pub fn offset(&self) -> Coord<usize> {
        self.0.min()
    }

    /// Exclusive bottom right pixel.
    pub fn end(&self) -> Coord<usize> {
        self.0.max()
    }

    /// (columns, rows)
    pub fn shape(&self) -> Coord<usize> {
        Coord {
            x: self.0.width(),
            y: self.0.height(),
        }
    }

    pub fn width(&self) -> usize {
        self.0.width()
    }

    pub fn height(&self) -> usize {
        self.0.height()
    }

    /// Pixel count of the window.
    pub fn size(&self) -> usize {
        self.width() * self.height()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn contains(&self, pixel: Coord<usize>) -> bool {
        let (min, max) = (self.offset(), self.end());
        (min.x..max.x).contains(&pixel.x) && (min.y..max.y).contains(&pixel.y)
    }

    /// Part of the window inside a raster of `extent` (columns, rows),
    /// `None` if nothing is left.
    pub fn clip(&self, extent: Coord<usize>) -> Option<Self> {
        let clipped = self.0.intersection(&Self::full(extent).0)?;
        let clipped = Self(clipped);
        (!clipped.is_empty()).then_some(clipped)
    }

    /// Grows the window by `buffer` pixels on every side without leaving
    /// `[0, extent)`.
    ///
    /// Growth that does not fit on one side is moved to the opposite side,
    /// so the result is `shape + 2 * buffer` unless the raster itself is
    /// smaller, in which case it covers the whole extent along that axis.
    pub fn buffered(&self, buffer: Coord<usize>, extent: Coord<usize>) -> Self {
        let (x, width) = grow_axis(self.offset().x, self.width(), buffer.x, extent.x);
        let (y, height) = grow_axis(self.offset().y, self.height(), buffer.y, extent.y);
        Self::new((x, y), (width, height))
    }
}

fn grow_axis(start: usize, len: usize, buffer: usize, extent: usize) -> (usize, usize) {
    let room_before = start;
    let room_after = extent.saturating_sub(start.saturating_add(len));
    // More than `extent` pixels of growth cannot fit on either side.
    let buffer = buffer.min(extent);
    let (mut before, mut after) = (buffer, buffer);
    if before > room_before {
        after += before - room_before;
        before = room_before;
    }
    if after > room_after {
        before = (before + after - room_after).min(room_before);
        after = room_after;
    }
    (start - before, len + before + after)
}

impl Display for PixelWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (offset, shape) = (self.offset(), self.shape());
        write!(
            f,
            "[x: {}, y: {}, cols: {}, rows: {}]",
            offset.x, offset.y, shape.x, shape.y
        )
    }
}

/// Sub region of a raster, either in pixel columns/rows or in world
/// coordinates of the raster reference system.
///
/// `max` values are exclusive.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoundingRegion {
    Pixel {
        xmin: i64,
        xmax: i64,
        ymin: i64,
        ymax: i64,
    },
    World {
        xmin: f64,
        xmax: f64,
        ymin: f64,
        ymax: f64,
    },
}

impl Display for BoundingRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pixel {
                xmin,
                xmax,
                ymin,
                ymax,
            } => write!(f, "pixel({xmin}, {xmax}, {ymin}, {ymax})"),
            Self::World {
                xmin,
                xmax,
                ymin,
                ymax,
            } => write!(f, "world({xmin}, {xmax}, {ymin}, {ymax})"),
        }
    }
}

impl BoundingRegion {
    /// Pixel window of the region, clamped to a raster of `extent` (columns, rows).
    pub fn to_pixel_window(
        &self,
        transform: &GeoTransform,
        extent: Coord<usize>,
    ) -> Result<PixelWindow> {
        let (xmin, xmax, ymin, ymax) = match *self {
            Self::Pixel {
                xmin,
                xmax,
                ymin,
                ymax,
            } => (xmin, xmax, ymin, ymax),
            Self::World {
                xmin,
                xmax,
                ymin,
                ymax,
            } => {
                let coordinate_transform = transform.coordinate_transform();
                let corners = [(xmin, ymax), (xmax, ymax), (xmax, ymin), (xmin, ymin)]
                    .map(|corner| coordinate_transform.world_to_pixel(Coord::from(corner)));
                let (cols, rows): (Vec<i64>, Vec<i64>) =
                    corners.iter().map(|pixel| pixel.x_y()).unzip();
                let bounds = |values: &[i64]| {
                    let min = values.iter().copied().min().unwrap_or_default();
                    let max = values.iter().copied().max().unwrap_or_default();
                    (min, max)
                };
                let ((xmin, xmax), (ymin, ymax)) = (bounds(&cols), bounds(&rows));
                (xmin, xmax, ymin, ymax)
            }
        };

        let clamp = |value: i64, limit: usize| value.clamp(0, limit as i64) as usize;
        let (xmin, xmax) = (clamp(xmin, extent.x), clamp(xmax, extent.x));
        let (ymin, ymax) = (clamp(ymin, extent.y), clamp(ymax, extent.y));

        if xmin >= xmax || ymin >= ymax {
            return Err(RusterError::InvalidRegion(self.to_string()));
        }
        Ok(PixelWindow::new((xmin, ymin), (xmax - xmin, ymax - ymin)))
    }
}
