use geo::{
    AffineOps, BoundingRect, Coord, Geometry, Intersects, MapCoordsInPlace, Point, Rect, Relate,
};
use ndarray::Array2;

use crate::{
    components::transforms::{snap_to_pixel, GeoTransform},
    errors::{Result, RusterError},
};

/// Burns geometries into an id mask.
pub trait Rasterizer {
    /// Mask of (rows, cols) pixels of a grid with `transform` where each
    /// pixel holds the id of the last geometry touching it, 0 if none.
    fn rasterize(
        &self,
        shapes: &[(&Geometry<f64>, u32)],
        transform: &GeoTransform,
        shape: (usize, usize),
    ) -> Result<Array2<u32>>;
}

/// Marks every pixel a geometry touches, not only pixels whose center it
/// covers.
///
/// Points burn the pixel they fall in. Lines burn every pixel they cross or
/// run along. Areas burn every pixel they overlap, pixels only sharing an
/// edge or corner with them are left out.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllTouchedRasterizer;

impl Rasterizer for AllTouchedRasterizer {
    fn rasterize(
        &self,
        shapes: &[(&Geometry<f64>, u32)],
        transform: &GeoTransform,
        shape: (usize, usize),
    ) -> Result<Array2<u32>> {
        let to_pixels = transform.inverse_affine().ok_or_else(|| {
            RusterError::InvalidGeometry(format!("{transform:?} is not invertible"))
        })?;
        let mut mask = Array2::zeros(shape);
        for (geometry, id) in shapes {
            let mut pixel_geometry = geometry.affine_transform(&to_pixels);
            pixel_geometry.map_coords_in_place(|Coord { x, y }| Coord {
                x: snap_to_pixel(x),
                y: snap_to_pixel(y),
            });
            burn(&pixel_geometry, *id, &mut mask);
        }
        Ok(mask)
    }
}

fn burn(geometry: &Geometry<f64>, id: u32, mask: &mut Array2<u32>) {
    match geometry {
        Geometry::Point(point) => burn_point(point, id, mask),
        Geometry::MultiPoint(points) => points.iter().for_each(|point| burn_point(point, id, mask)),
        Geometry::GeometryCollection(collection) => collection
            .iter()
            .for_each(|geometry| burn(geometry, id, mask)),
        Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {
            burn_touched(geometry, id, mask, |pixel| geometry.intersects(pixel))
        }
        _ => burn_touched(geometry, id, mask, |pixel| {
            let matrix = geometry.relate(pixel);
            matrix.is_intersects() && !matrix.is_touches()
        }),
    }
}

fn burn_point(point: &Point<f64>, id: u32, mask: &mut Array2<u32>) {
    let (rows, cols) = mask.dim();
    let (x, y) = (point.x().floor(), point.y().floor());
    if x >= 0. && y >= 0. && (x as usize) < cols && (y as usize) < rows {
        mask[[y as usize, x as usize]] = id;
    }
}

/// Tests every pixel under the bounding box of `geometry`.
fn burn_touched(
    geometry: &Geometry<f64>,
    id: u32,
    mask: &mut Array2<u32>,
    touches: impl Fn(&Rect<f64>) -> bool,
) {
    let Some(bounds) = geometry.bounding_rect() else {
        return;
    };
    let (rows, cols) = mask.dim();
    let range = |min: f64, max: f64, len: usize| {
        let start = min.floor().clamp(0., len as f64) as usize;
        let end = (max.floor() + 1.).clamp(0., len as f64) as usize;
        start..end
    };
    let (min, max) = (bounds.min(), bounds.max());
    for row in range(min.y, max.y, rows) {
        for col in range(min.x, max.x, cols) {
            let (x, y) = (col as f64, row as f64);
            let pixel = Rect::new(Coord { x, y }, Coord { x: x + 1., y: y + 1. });
            if touches(&pixel) {
                mask[[row, col]] = id;
            }
        }
    }
}
