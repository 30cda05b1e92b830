use geo::{AffineTransform, Coord, CoordNum};
use num::traits::AsPrimitive;
use std::fmt::Debug;

/// Distance under which a fractional pixel position snaps to the integer
/// next to it before flooring.
const PIXEL_SNAP: f64 = 1e-9;

/// Six coefficient affine transform, in GDAL order:
/// `[origin_x, pixel_width, row_rotation, origin_y, column_rotation, pixel_height]`.
///
/// `pixel_height` is conventionally negative (north up rasters).
#[derive(Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GeoTransform([f64; 6]);

impl GeoTransform {
    pub const fn new(coefficients: [f64; 6]) -> Self {
        Self(coefficients)
    }

    /// North up transform with the given top left corner.
    pub fn from_tie_point(tie_point: Coord<f64>, pixel_size: Coord<f64>) -> Self {
        Self([tie_point.x, pixel_size.x, 0., tie_point.y, 0., pixel_size.y])
    }

    pub fn coefficients(&self) -> [f64; 6] {
        self.0
    }

    /// World coordinate of the top left corner of pixel (0, 0).
    pub fn tie_point(&self) -> Coord<f64> {
        Coord {
            x: self.0[0],
            y: self.0[3],
        }
    }

    /// Signed pixel size, `y` is negative for north up rasters.
    pub fn pixel_size(&self) -> Coord<f64> {
        Coord {
            x: self.0[1],
            y: self.0[5],
        }
    }

    pub fn rotation(&self) -> Coord<f64> {
        Coord {
            x: self.0[2],
            y: self.0[4],
        }
    }

    /// Same pixel size and rotation anchored at another tie point,
    /// e.g. the transform of a single tile.
    pub fn with_tie_point(&self, tie_point: Coord<f64>) -> Self {
        let mut coefficients = self.0;
        coefficients[0] = tie_point.x;
        coefficients[3] = tie_point.y;
        Self(coefficients)
    }

    pub fn coordinate_transform(&self) -> CoordinateTransform {
        CoordinateTransform::new(self.pixel_size(), self.tie_point())
    }

    /// Pixel to world as a [geo] affine transform.
    pub fn affine(&self) -> AffineTransform {
        AffineTransform::new(self.0[1], self.0[2], self.0[0], self.0[4], self.0[5], self.0[3])
    }

    /// World to pixel, `None` if the pixel size is degenerate.
    pub fn inverse_affine(&self) -> Option<AffineTransform> {
        self.affine().inverse()
    }
}

impl From<[f64; 6]> for GeoTransform {
    fn from(coefficients: [f64; 6]) -> Self {
        Self(coefficients)
    }
}

impl Debug for GeoTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "GeoTransform(tie_point: ({}, {}), pixel_size: ({}, {}))",
            self.0[0], self.0[3], self.0[1], self.0[5]
        )
    }
}

/// Maps pixel positions to world coordinates and back,
/// given a pixel size and the tie point of the pixel grid.
///
/// Rotation terms are not applied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateTransform {
    pixel_size: Coord<f64>,
    tie_point: Coord<f64>,
}

impl CoordinateTransform {
    pub fn new(pixel_size: Coord<f64>, tie_point: Coord<f64>) -> Self {
        Self {
            pixel_size,
            tie_point,
        }
    }

    pub fn pixel_size(&self) -> Coord<f64> {
        self.pixel_size
    }

    pub fn tie_point(&self) -> Coord<f64> {
        self.tie_point
    }

    /// World coordinate of a pixel corner, or of its center if `use_pixel_center`.
    pub fn pixel_to_world<T: CoordNum + AsPrimitive<f64>>(
        &self,
        pixel: Coord<T>,
        use_pixel_center: bool,
    ) -> Coord<f64> {
        let offset = if use_pixel_center {
            self.pixel_size / 2.
        } else {
            Coord::zero()
        };
        Coord {
            x: self.tie_point.x + pixel.x.as_() * self.pixel_size.x + offset.x,
            y: self.tie_point.y + pixel.y.as_() * self.pixel_size.y + offset.y,
        }
    }

    /// Fractional pixel position of a world coordinate.
    pub fn to_pixel_space(&self, world: Coord<f64>) -> Coord<f64> {
        Coord {
            x: (world.x - self.tie_point.x) / self.pixel_size.x,
            y: (world.y - self.tie_point.y) / self.pixel_size.y,
        }
    }

    /// Pixel containing a world coordinate (floor division).
    pub fn world_to_pixel(&self, world: Coord<f64>) -> Coord<i64> {
        let fractional = self.to_pixel_space(world);
        Coord {
            x: snapped_floor(fractional.x),
            y: snapped_floor(fractional.y),
        }
    }

    pub fn pixels_to_world<T: CoordNum + AsPrimitive<f64>>(
        &self,
        pixels: impl IntoIterator<Item = Coord<T>>,
        use_pixel_center: bool,
    ) -> Vec<Coord<f64>> {
        pixels
            .into_iter()
            .map(|pixel| self.pixel_to_world(pixel, use_pixel_center))
            .collect()
    }

    /// `None` coordinates map to `None` instead of failing.
    pub fn worlds_to_pixel(
        &self,
        coords: impl IntoIterator<Item = Option<Coord<f64>>>,
    ) -> Vec<Option<Coord<i64>>> {
        coords
            .into_iter()
            .map(|coord| coord.map(|world| self.world_to_pixel(world)))
            .collect()
    }
}

/// `value` moved onto the integer next to it when closer than [PIXEL_SNAP].
pub(crate) fn snap_to_pixel(value: f64) -> f64 {
    let nearest = value.round();
    if (value - nearest).abs() <= PIXEL_SNAP {
        nearest
    } else {
        value
    }
}

fn snapped_floor(value: f64) -> i64 {
    snap_to_pixel(value).floor() as i64
}

/// Batch form of [CoordinateTransform::pixel_to_world].
pub fn pixel_to_world<T: CoordNum + AsPrimitive<f64>>(
    pixels: &[Coord<T>],
    pixel_size: Coord<f64>,
    tie_point: Coord<f64>,
    use_pixel_center: bool,
) -> Vec<Coord<f64>> {
    CoordinateTransform::new(pixel_size, tie_point)
        .pixels_to_world(pixels.iter().copied(), use_pixel_center)
}

/// Batch form of [CoordinateTransform::world_to_pixel].
pub fn world_to_pixel(
    coords: &[Option<Coord<f64>>],
    pixel_size: Coord<f64>,
    tie_point: Coord<f64>,
) -> Vec<Option<Coord<i64>>> {
    CoordinateTransform::new(pixel_size, tie_point).worlds_to_pixel(coords.iter().copied())
}
